use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::quiz::Question;

/// Topic served when the requested one has no table of its own.
pub const DEFAULT_TOPIC: &str = "English";

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to open question table: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse question table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("question table has no default `English` topic")]
    MissingDefaultTopic,
    #[error("topic `{0}` has no questions")]
    EmptyTopic(String),
    #[error("topic `{topic}` question #{index} has repeated options or its correct answer out of range")]
    InvalidQuestion { topic: String, index: usize },
}

/// Pre-authored questions per topic, used whenever the remote generator
/// can't deliver.
#[derive(Debug, Clone)]
pub struct QuestionTable {
    topics: BTreeMap<String, Vec<Question>>,
}

impl QuestionTable {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let topics: BTreeMap<String, Vec<Question>> = serde_json::from_reader(reader)?;
        Self::new(topics)
    }

    pub fn new(topics: BTreeMap<String, Vec<Question>>) -> Result<Self, TableError> {
        if !topics.contains_key(DEFAULT_TOPIC) {
            return Err(TableError::MissingDefaultTopic);
        }
        for (topic, questions) in &topics {
            if questions.is_empty() {
                return Err(TableError::EmptyTopic(topic.clone()));
            }
            if let Some(index) = questions.iter().position(|q| !q.is_valid()) {
                return Err(TableError::InvalidQuestion {
                    topic: topic.clone(),
                    index,
                });
            }
        }

        Ok(Self { topics })
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// Questions for `topic`, or for the default topic when it is unknown.
    pub fn questions_for(&self, topic: &str) -> &[Question] {
        self.topics
            .get(topic)
            .or_else(|| self.topics.get(DEFAULT_TOPIC))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }
}
