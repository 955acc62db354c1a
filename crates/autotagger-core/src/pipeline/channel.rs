//! Bounded batch streaming for the large-batch mode.
//!
//! A producer thread prepares batches ahead of the consumer while the
//! bounded channel caps how many sit in memory. Batches arrive in input
//! order and the consumer handles one at a time.

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, StreamError};

/// Create a bounded channel pair with the configured queue depth.
///
/// When the buffer is full, the sender blocks, providing backpressure
/// so preprocessing never runs far ahead of prediction.
pub fn bounded_channel<T>(config: &PipelineConfig) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(config.queue_depth.max(1))
}

/// One prepared slice of the input list.
#[derive(Debug)]
pub struct Batch<T> {
    /// Position of this batch in the stream
    pub index: usize,

    /// Each path with its prepared value or the error preparing it
    pub items: Vec<(PathBuf, Result<T, PipelineError>)>,
}

/// Prepare `paths` on a producer thread and feed the batches to `consume`.
///
/// Must be called from a blocking context; an error from `consume` stops
/// the producer at its next send.
pub fn stream_batches<T, P, C>(
    config: &PipelineConfig,
    paths: &[PathBuf],
    prepare: P,
    mut consume: C,
) -> Result<(), StreamError>
where
    T: Send,
    P: Fn(&Path) -> Result<T, PipelineError> + Sync,
    C: FnMut(Batch<T>) -> Result<(), StreamError>,
{
    let batch_size = config.batch_size.max(1);
    let expected = paths.len().div_ceil(batch_size);
    let (tx, mut rx) = bounded_channel::<Batch<T>>(config);
    let prepare = &prepare;

    std::thread::scope(move |scope| {
        scope.spawn(move || {
            for (index, chunk) in paths.chunks(batch_size).enumerate() {
                let items = chunk.iter().map(|p| (p.clone(), prepare(p))).collect();
                if tx.blocking_send(Batch { index, items }).is_err() {
                    tracing::debug!("Batch consumer stopped at batch {}", index);
                    break;
                }
            }
        });

        let mut received = 0;
        while let Some(batch) = rx.blocking_recv() {
            received += 1;
            // returning drops `rx`, which unblocks a waiting producer
            consume(batch)?;
        }
        if received < expected {
            return Err(StreamError::ProducerStopped);
        }
        Ok(())
    })
}
