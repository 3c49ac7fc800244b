use std::time::Duration;

use chatgpt::client::ChatGPT;
use chatgpt::config::ChatGPTEngine;
use chatgpt::types::CompletionResponse;
use rand::Rng;
use url::Url;

use crate::quiz::source::QuestionProvider;
use crate::quiz::Question;

/// Models the generator picks from, one at random per request.
pub const GROQ_MODELS: [&str; 3] = ["llama3-8b-8192", "mixtral-8x7b-32768", "gemma2-9b-it"];

pub const QUESTIONS_PER_REQUEST: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("chat completion failed: {0}")]
    Api(#[from] chatgpt::err::Error),
    #[error("reply is not a question array: {0}")]
    Json(#[from] serde_json::Error),
    #[error("question #{0} has repeated options or its correct answer out of range")]
    InvalidQuestion(usize),
    #[error("reply contained no questions")]
    Empty,
}

/// Asks a chat-completions model for a fresh set of questions on a topic.
pub struct QuestionGenerator {
    /// One client per entry of [`GROQ_MODELS`], in the same order.
    clients: Vec<ChatGPT>,
}

impl QuestionGenerator {
    pub fn new(
        api_key: &str,
        api_url: Url,
        timeout: Duration,
    ) -> Result<Self, chatgpt::err::Error> {
        let clients = GROQ_MODELS
            .iter()
            .map(|&model| {
                let mut gpt = ChatGPT::new(api_key)?;

                gpt.config.engine = ChatGPTEngine::Custom(model);
                gpt.config.api_url = api_url.clone();
                gpt.config.timeout = timeout;

                Ok(gpt)
            })
            .collect::<Result<Vec<_>, chatgpt::err::Error>>()?;

        Ok(Self { clients })
    }

    pub async fn generate_questions(&self, topic: &str) -> Result<Vec<Question>, SourceError> {
        let index = pick_model(&mut rand::thread_rng());
        let model = GROQ_MODELS[index];
        let gpt = &self.clients[index];
        log::info!("Requesting questions on {topic:?} from {model}");

        let response: CompletionResponse = gpt.send_message(question_prompt(topic)).await?;
        let content = &response.message().content;
        log::debug!("Completion from {model}: {content:?}");

        parse_ai_reply(content)
    }
}

impl QuestionProvider for QuestionGenerator {
    async fn fetch(&self, topic: &str) -> Result<Vec<Question>, SourceError> {
        self.generate_questions(topic).await
    }
}

pub fn question_prompt(topic: &str) -> String {
    format!(
        "Generate {QUESTIONS_PER_REQUEST} multiple-choice questions for 6th-grade {topic}. \
         Return ONLY JSON array: [{{\"q\":\"Q\", \"a\":[\"O1\",\"O2\",\"O3\",\"O4\"], \"correct\":0}}]."
    )
}

/// Index into [`GROQ_MODELS`] of the model for the next request.
pub fn pick_model<R: Rng + ?Sized>(rng: &mut R) -> usize {
    rng.gen_range(0..GROQ_MODELS.len())
}

/// Models like to wrap JSON in markdown fences, so every fence marker is
/// dropped before parsing. Anything short of a non-empty array of valid
/// questions is a failure.
pub fn parse_ai_reply(content: &str) -> Result<Vec<Question>, SourceError> {
    let stripped = content.replace("```json", "").replace("```", "");
    let questions: Vec<Question> = serde_json::from_str(stripped.trim())?;

    if questions.is_empty() {
        return Err(SourceError::Empty);
    }
    if let Some(index) = questions.iter().position(|q| !q.is_valid()) {
        return Err(SourceError::InvalidQuestion(index));
    }

    Ok(questions)
}
