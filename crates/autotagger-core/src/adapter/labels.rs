//! Label files mapping model output indices to ratings and tags.

use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;

use crate::error::PipelineError;
use crate::types::ModelOutput;

/// Number of leading rows in a waifu-diffusion label CSV that are ratings.
pub const WAIFU_RATING_ROWS: usize = 4;

/// Tag category for general (non-character, non-meta) tags.
pub const GENERAL_CATEGORY: u32 = 0;

const DANBOORU_RATING_PREFIX: &str = "rating:";

/// What one output index of a model means.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Rating(String),
    Tag { name: String, category: u32 },
}

/// Ordered labels for every output index of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    /// Load a `tag_id,name,category,count` CSV whose first rows are ratings.
    pub fn from_csv(path: &Path) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::ModelLoad {
            model: path.display().to_string(),
            message: format!("failed to open labels CSV: {}", e),
        })?;
        Self::from_csv_reader(file).map_err(|message| PipelineError::ModelLoad {
            model: path.display().to_string(),
            message,
        })
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, String> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|e| format!("invalid labels header: {}", e))?
            .clone();
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);
        let name_col = column("name").unwrap_or(1);
        let category_col = column("category");

        let mut labels = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| format!("invalid label record: {}", e))?;
            let name = record
                .get(name_col)
                .map(str::trim)
                .ok_or_else(|| format!("label row {} has no name column", row + 1))?
                .to_string();

            if row < WAIFU_RATING_ROWS {
                labels.push(Label::Rating(name));
                continue;
            }
            let category = category_col
                .and_then(|c| record.get(c))
                .and_then(|c| c.trim().parse().ok())
                .unwrap_or(GENERAL_CATEGORY);
            labels.push(Label::Tag { name, category });
        }

        if labels.len() <= WAIFU_RATING_ROWS {
            return Err("labels CSV holds no tags after the rating rows".to_string());
        }
        Ok(Self { labels })
    }

    /// Load a DeepDanbooru `tags.txt`: one tag per line, `rating:` prefixes mark ratings.
    pub fn from_tags_txt(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::ModelLoad {
            model: path.display().to_string(),
            message: format!("failed to read tags file: {}", e),
        })?;
        let set = Self::from_tag_lines(&content);
        if set.labels.is_empty() {
            return Err(PipelineError::ModelLoad {
                model: path.display().to_string(),
                message: "no labels found".to_string(),
            });
        }
        Ok(set)
    }

    pub fn from_tag_lines(content: &str) -> Self {
        let labels = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.strip_prefix(DANBOORU_RATING_PREFIX) {
                Some(rating) => Label::Rating(rating.to_string()),
                None => Label::Tag {
                    name: line.to_string(),
                    category: GENERAL_CATEGORY,
                },
            })
            .collect();
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Map one score vector onto the labels.
    pub fn decode(&self, model: &str, scores: &[f32]) -> Result<ModelOutput, PipelineError> {
        self.decode_filtered(model, scores, |_| true)
    }

    /// Like [`decode`](Self::decode) but keeps only general-category tags.
    pub fn decode_general(
        &self,
        model: &str,
        scores: &[f32],
    ) -> Result<ModelOutput, PipelineError> {
        self.decode_filtered(model, scores, |category| category == GENERAL_CATEGORY)
    }

    fn decode_filtered(
        &self,
        model: &str,
        scores: &[f32],
        keep: impl Fn(u32) -> bool,
    ) -> Result<ModelOutput, PipelineError> {
        if scores.len() != self.labels.len() {
            return Err(PipelineError::Inference {
                model: model.to_string(),
                message: format!(
                    "model produced {} scores for {} labels",
                    scores.len(),
                    self.labels.len()
                ),
            });
        }

        let mut output = ModelOutput::default();
        for (label, &score) in self.labels.iter().zip(scores) {
            match label {
                Label::Rating(name) => {
                    output.ratings.insert(name.clone(), score);
                }
                Label::Tag { name, category } if keep(*category) => {
                    output.tags.insert(name.clone(), score);
                }
                Label::Tag { .. } => {}
            }
        }
        Ok(output)
    }
}
