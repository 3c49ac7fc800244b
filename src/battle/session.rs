use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;

use crate::battle::monster::{Monster, MONSTERS};
use crate::quiz::{shuffle_pool, Question, OPTIONS_PER_QUESTION};

pub const PLAYER_MAX_HP: i32 = 100;
pub const DAMAGE_PER_CORRECT: i32 = 40;
pub const DAMAGE_PER_INCORRECT: i32 = 25;

/// Delay between an answer and its damage landing.
pub const STRIKE_DELAY: Duration = Duration::from_millis(200);
/// Delay between an answer and the follow-up (next question, dialogue or defeat).
pub const SETTLE_DELAY: Duration = Duration::from_millis(800);
pub const DIALOGUE_DURATION: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    QuestionActive,
    Resolving(Outcome),
    Dialogue,
    Victory,
    Defeat,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Victory | Phase::Defeat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Strike(Outcome),
    Settle(Outcome),
    DialogueEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Answer(usize),
    Timer(Timer),
}

/// Sound played when an answer is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Hit,
    Hurt,
}

/// Side effects requested by the session. The presentation layer renders
/// everything except `Schedule`, which belongs to the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowMonster(Monster),
    ShowQuestion {
        prompt: String,
        options: [String; OPTIONS_PER_QUESTION],
    },
    MonsterHealth {
        name: &'static str,
        percent: u8,
    },
    PlayerHealth {
        percent: u8,
    },
    PlayCue(Cue),
    ShowDialogue(&'static str),
    HideDialogue,
    ShowDefeat,
    ShowVictory,
    Schedule {
        after: Duration,
        timer: Timer,
    },
}

/// What happens when every question of the pool has been asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Refill the pool from the full deck and shuffle it again.
    #[default]
    Reshuffle,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BattleError {
    #[error("cannot start a battle without questions")]
    EmptyDeck,
    #[error("question pool exhausted")]
    PoolExhausted,
}

/// State of one run, from topic selection to victory or defeat.
#[derive(Debug, Clone)]
pub struct BattleSession {
    run_id: u64,
    topic: String,
    phase: Phase,
    monster: usize,
    monster_hp: i32,
    player_hp: i32,
    pool: Vec<Question>,
    deck: Vec<Question>,
    current: Option<Question>,
    input_locked: bool,
    strike_applied: bool,
    policy: ExhaustionPolicy,
    rng: StdRng,
}

impl BattleSession {
    /// `questions` are taken as already shuffled; the last one is asked first.
    pub fn new(
        topic: impl Into<String>,
        questions: Vec<Question>,
        policy: ExhaustionPolicy,
        mut rng: StdRng,
    ) -> Result<Self, BattleError> {
        if questions.is_empty() {
            return Err(BattleError::EmptyDeck);
        }

        Ok(Self {
            run_id: rng.gen(),
            topic: topic.into(),
            phase: Phase::Idle,
            monster: 0,
            monster_hp: MONSTERS[0].max_hp,
            player_hp: PLAYER_MAX_HP,
            deck: questions.clone(),
            pool: questions,
            current: None,
            input_locked: true,
            strike_applied: false,
            policy,
            rng,
        })
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn monster(&self) -> &'static Monster {
        &MONSTERS[self.monster]
    }

    pub fn monster_hp(&self) -> i32 {
        self.monster_hp
    }

    pub fn player_hp(&self) -> i32 {
        self.player_hp
    }

    pub fn is_locked(&self) -> bool {
        self.input_locked
    }

    #[cfg(test)]
    pub fn remaining_questions(&self) -> usize {
        self.pool.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    /// Applies one event. Events that make no sense in the current phase,
    /// including answers while input is locked, are ignored.
    pub fn handle(&mut self, event: Event) -> Result<Vec<Command>, BattleError> {
        match (self.phase, event) {
            (Phase::Idle, Event::Start) => self.start(),
            (Phase::QuestionActive, Event::Answer(index)) if !self.input_locked => {
                Ok(self.answer(index))
            }
            (Phase::Resolving(outcome), Event::Timer(Timer::Strike(timer))) if outcome == timer => {
                Ok(self.strike(outcome))
            }
            (Phase::Resolving(outcome), Event::Timer(Timer::Settle(timer))) if outcome == timer => {
                self.settle(outcome)
            }
            (Phase::Dialogue, Event::Timer(Timer::DialogueEnd)) => self.end_dialogue(),
            (phase, event) => {
                log::debug!("Ignoring {event:?} while {phase:?}");
                Ok(Vec::new())
            }
        }
    }

    fn start(&mut self) -> Result<Vec<Command>, BattleError> {
        log::info!("Run {:x} started on {:?}", self.run_id, self.topic);
        self.player_hp = PLAYER_MAX_HP;

        let mut commands = self.load_monster(0);
        commands.push(self.player_health());
        commands.push(self.load_question()?);
        Ok(commands)
    }

    fn answer(&mut self, index: usize) -> Vec<Command> {
        let outcome = match &self.current {
            Some(question) if question.is_correct(index) => Outcome::Correct,
            _ => Outcome::Incorrect,
        };

        self.input_locked = true;
        self.strike_applied = false;
        self.phase = Phase::Resolving(outcome);

        let cue = match outcome {
            Outcome::Correct => Cue::Hit,
            Outcome::Incorrect => Cue::Hurt,
        };
        vec![
            Command::PlayCue(cue),
            Command::Schedule {
                after: STRIKE_DELAY,
                timer: Timer::Strike(outcome),
            },
            Command::Schedule {
                after: SETTLE_DELAY,
                timer: Timer::Settle(outcome),
            },
        ]
    }

    fn strike(&mut self, outcome: Outcome) -> Vec<Command> {
        if self.strike_applied {
            return Vec::new();
        }
        self.strike_applied = true;

        match outcome {
            Outcome::Correct => {
                self.monster_hp -= DAMAGE_PER_CORRECT;
                vec![self.monster_health()]
            }
            Outcome::Incorrect => {
                self.player_hp -= DAMAGE_PER_INCORRECT;
                vec![self.player_health()]
            }
        }
    }

    fn settle(&mut self, outcome: Outcome) -> Result<Vec<Command>, BattleError> {
        // Damage always lands before the round settles, whatever order the
        // timers were delivered in.
        let mut commands = self.strike(outcome);

        match outcome {
            Outcome::Correct if self.monster_hp <= 0 => {
                log::info!("Run {:x}: {} defeated", self.run_id, self.monster().name);
                self.phase = Phase::Dialogue;
                self.current = None;
                commands.push(Command::ShowDialogue(self.monster().dialogue));
                commands.push(Command::Schedule {
                    after: DIALOGUE_DURATION,
                    timer: Timer::DialogueEnd,
                });
            }
            Outcome::Incorrect if self.player_hp <= 0 => {
                log::info!(
                    "Run {:x}: player fell to the {}",
                    self.run_id,
                    self.monster().name
                );
                self.phase = Phase::Defeat;
                self.current = None;
                commands.push(Command::ShowDefeat);
            }
            _ => commands.push(self.load_question()?),
        }

        Ok(commands)
    }

    fn end_dialogue(&mut self) -> Result<Vec<Command>, BattleError> {
        let mut commands = vec![Command::HideDialogue];

        match Monster::get(self.monster + 1) {
            Some(next) => {
                self.player_hp = PLAYER_MAX_HP;
                commands.extend(self.load_monster(next.ordinal));
                commands.push(self.player_health());
                commands.push(self.load_question()?);
            }
            None => {
                log::info!("Run {:x}: all monsters defeated", self.run_id);
                self.phase = Phase::Victory;
                commands.push(Command::ShowVictory);
            }
        }

        Ok(commands)
    }

    fn load_monster(&mut self, ordinal: usize) -> Vec<Command> {
        self.monster = ordinal;
        self.monster_hp = self.monster().max_hp;

        vec![Command::ShowMonster(*self.monster()), self.monster_health()]
    }

    fn load_question(&mut self) -> Result<Command, BattleError> {
        let question = match self.pool.pop() {
            Some(question) => question,
            None => self.refill()?,
        };

        let command = Command::ShowQuestion {
            prompt: question.text.clone(),
            options: question.answers.clone(),
        };
        self.current = Some(question);
        self.phase = Phase::QuestionActive;
        self.input_locked = false;

        Ok(command)
    }

    fn refill(&mut self) -> Result<Question, BattleError> {
        match self.policy {
            ExhaustionPolicy::Fail => Err(BattleError::PoolExhausted),
            ExhaustionPolicy::Reshuffle => {
                log::warn!(
                    "Run {:x}: question pool exhausted, reshuffling {} questions",
                    self.run_id,
                    self.deck.len()
                );
                self.pool = self.deck.clone();
                shuffle_pool(&mut self.pool, &mut self.rng);
                self.pool.pop().ok_or(BattleError::EmptyDeck)
            }
        }
    }

    fn monster_health(&self) -> Command {
        let monster = self.monster();
        Command::MonsterHealth {
            name: monster.name,
            percent: health_percent(self.monster_hp, monster.max_hp),
        }
    }

    fn player_health(&self) -> Command {
        Command::PlayerHealth {
            percent: health_percent(self.player_hp, PLAYER_MAX_HP),
        }
    }
}

/// Share of `max` left, clamped to 0..=100. Raw health may be negative.
pub fn health_percent(current: i32, max: i32) -> u8 {
    if max <= 0 {
        return 0;
    }
    (current.clamp(0, max) * 100 / max) as u8
}
