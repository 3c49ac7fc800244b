use std::future::Future;

use rand::Rng;

use crate::quiz::ai_helper::SourceError;
use crate::quiz::table::QuestionTable;
use crate::quiz::{shuffle_pool, Question};

/// Something that can come up with questions on a topic, typically over
/// the network.
pub trait QuestionProvider {
    fn fetch(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<Vec<Question>, SourceError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Remote,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct QuestionSet {
    pub questions: Vec<Question>,
    pub origin: Origin,
}

/// Resolves the question queue for a run: remote first, static table when
/// the remote side is disabled or fails.
pub struct QuestionSource<P> {
    provider: Option<P>,
    table: QuestionTable,
}

impl<P: QuestionProvider> QuestionSource<P> {
    pub fn new(provider: Option<P>, table: QuestionTable) -> Self {
        Self { provider, table }
    }

    pub fn table(&self) -> &QuestionTable {
        &self.table
    }

    /// Remote questions, or `None` on any failure. Failures are only logged.
    pub async fn fetch_remote(&self, topic: &str) -> Option<Vec<Question>> {
        let provider = self.provider.as_ref()?;

        match provider.fetch(topic).await {
            Ok(questions) => Some(questions),
            Err(e) => {
                log::warn!("Remote questions for {topic:?} unavailable, using the table: {e}");
                None
            }
        }
    }

    pub fn fallback(&self, topic: &str) -> Vec<Question> {
        if !self.table.contains(topic) {
            log::info!("No table for {topic:?}, using the default topic");
        }
        self.table.questions_for(topic).to_vec()
    }

    pub async fn get_questions<R: Rng + ?Sized>(&self, topic: &str, rng: &mut R) -> QuestionSet {
        let (mut questions, origin) = match self.fetch_remote(topic).await {
            Some(questions) => (questions, Origin::Remote),
            None => (self.fallback(topic), Origin::Fallback),
        };
        shuffle_pool(&mut questions, rng);

        log::info!(
            "Resolved {} questions on {topic:?} ({origin:?})",
            questions.len()
        );
        QuestionSet { questions, origin }
    }
}
