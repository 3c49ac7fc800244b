use crate::battle::{Command, Cue, MONSTERS};

pub const RETRY: &str = "RETRY";
pub const PLAY_AGAIN: &str = "PLAY AGAIN";
pub const DEFEAT_TEXT: &str = "YOU HAVE FALLEN IN BATTLE...";
pub const VICTORY_TEXT: &str = "CHAMPION! All monsters defeated.";

const BAR_WIDTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave whatever keyboard the chat already shows.
    Unchanged,
    Options(Vec<String>),
    Single(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub text: String,
    pub keyboard: Keyboard,
}

/// Turns a batch of battle commands into chat messages. Status lines are
/// gathered and sent together with the next question or end-of-run text.
pub fn render(commands: &[Command]) -> Vec<Outgoing> {
    let mut messages = Vec::new();
    let mut lines: Vec<String> = Vec::new();

    for command in commands {
        match command {
            Command::ShowMonster(monster) => lines.push(format!(
                "⚔️ Monster {}/{}: the {} ({} HP) approaches!",
                monster.ordinal + 1,
                MONSTERS.len(),
                monster.name,
                monster.max_hp
            )),
            Command::MonsterHealth { name, percent } => {
                lines.push(format!("{name}: {} {percent}%", health_bar(*percent)))
            }
            Command::PlayerHealth { percent } => {
                lines.push(format!("You: {} {percent}%", health_bar(*percent)))
            }
            Command::PlayCue(Cue::Hit) => lines.push("💥 Direct hit!".to_string()),
            Command::PlayCue(Cue::Hurt) => lines.push("🩸 The monster strikes back!".to_string()),
            Command::ShowDialogue(text) => lines.push(format!("💬 {text}")),
            Command::HideDialogue | Command::Schedule { .. } => {}
            Command::ShowQuestion { prompt, options } => {
                lines.push(format!("❓ {prompt}"));
                messages.push(Outgoing {
                    text: lines.join("\n"),
                    keyboard: Keyboard::Options(options.to_vec()),
                });
                lines.clear();
            }
            Command::ShowDefeat => {
                lines.push(DEFEAT_TEXT.to_string());
                messages.push(Outgoing {
                    text: lines.join("\n"),
                    keyboard: Keyboard::Single(RETRY),
                });
                lines.clear();
            }
            Command::ShowVictory => {
                lines.push(VICTORY_TEXT.to_string());
                messages.push(Outgoing {
                    text: lines.join("\n"),
                    keyboard: Keyboard::Single(PLAY_AGAIN),
                });
                lines.clear();
            }
        }
    }

    if !lines.is_empty() {
        messages.push(Outgoing {
            text: lines.join("\n"),
            keyboard: Keyboard::Unchanged,
        });
    }
    messages
}

pub fn health_bar(percent: u8) -> String {
    let filled = (usize::from(percent.min(100)) * BAR_WIDTH + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}
