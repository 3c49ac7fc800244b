pub mod ai_helper;
pub mod source;
pub mod table;

use rand::seq::SliceRandom;
use rand::Rng;

/// Every question offers exactly this many options.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// A multiple-choice question. Field names on the wire are the short ones
/// the language model is asked to produce: `q`, `a` and `correct`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    #[serde(rename = "q")]
    pub text: String,
    #[serde(rename = "a")]
    pub answers: [String; OPTIONS_PER_QUESTION],
    pub correct: usize,
}

impl Question {
    /// The correct index must point at an option, and no two options may
    /// read the same once trimmed, since answers are matched back by text.
    pub fn is_valid(&self) -> bool {
        self.correct < self.answers.len() && !self.has_duplicate_options()
    }

    fn has_duplicate_options(&self) -> bool {
        self.answers.iter().enumerate().any(|(i, a)| {
            self.answers[i + 1..]
                .iter()
                .any(|b| a.trim() == b.trim())
        })
    }

    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct
    }

    /// Position of the option whose text matches `answer`, if any.
    pub fn option_index(&self, answer: &str) -> Option<usize> {
        let answer = answer.trim();
        self.answers.iter().position(|a| a.trim() == answer)
    }
}

/// Shuffles a question pool in place with the given random source.
pub fn shuffle_pool<R: Rng + ?Sized>(questions: &mut [Question], rng: &mut R) {
    questions.shuffle(rng);
}

#[cfg(test)]
pub(crate) fn sample_question(text: &str, correct: usize) -> Question {
    Question {
        text: text.to_string(),
        answers: [
            format!("{text} / a"),
            format!("{text} / b"),
            format!("{text} / c"),
            format!("{text} / d"),
        ],
        correct,
    }
}
