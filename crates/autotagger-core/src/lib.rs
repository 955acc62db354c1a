//! Autotagger Core - query cache, filter engine and orchestration for
//! image auto-tagging.
//!
//! Images are tagged by ONNX tagger models. Each evaluation is cached by
//! pixel content and model, and every output row is replayed through an
//! ordered filter chain, so editing a filter never re-runs a model.
//!
//! # Architecture
//!
//! ```text
//! set(field) → TaggingSession ─┐
//!                              ▼
//! paths → Decode → Hash → Cache ─miss→ ModelAdapter
//!                           │               │
//!                           ▼               ▼
//!                   AggregateState ← raw ModelOutput
//!                           │
//!                           ▼
//!                 FilterSpec → QueryOutput → JSON / tags files
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use autotagger_core::{adapter, Config, Field, Interrogator, TaggingSession};
//!
//! let config = Config::load()?;
//! let mut session = TaggingSession::from_config(&config);
//! session.set(Field::InputGlob, "~/Pictures/*.png");
//! session.set(Field::Threshold, "0.5");
//!
//! let adapter = adapter::from_spec(&config.models[0], &config);
//! let mut interrogator = Interrogator::new(adapter, &config);
//! let output = interrogator.batch_interrogate(&mut session)?;
//! println!("{}", output.tag_line());
//! ```

pub mod adapter;
pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod interrogator;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use adapter::{ModelAdapter, StreamSink, StreamingAdapter};
pub use cache::{QueryCache, QueryKey};
pub use config::{Config, ModelFamily, ModelSpec};
pub use error::{
    ConfigError, FieldError, PipelineError, PipelineResult, Result, RunError, StreamError,
    TaggerError,
};
pub use filter::{FilterSettings, FilterSpec};
pub use interrogator::{Interrogator, RunMode};
pub use output::{OutputFormat, OutputWriter};
pub use registry::{ModelRegistry, RegistryEntry};
pub use session::{Field, Flag, TaggingSession, Update};
pub use types::{ModelOutput, QueryOutput, QueryStats, Tag, TagCount, TaggedImage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
