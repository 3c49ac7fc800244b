use std::time::Duration;

#[cfg(test)]
use crate::battle::session::{BattleError, BattleSession, Event};
use crate::battle::session::{Command, Timer};

#[derive(Debug, Clone)]
struct Pending {
    due: Duration,
    seq: u64,
    timer: Timer,
}

/// Timers queued on virtual time. Nothing here sleeps; callers decide what
/// a `wait` means (a real sleep in the bot, nothing at all in tests).
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn now(&self) -> Duration {
        self.now
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn schedule(&mut self, after: Duration, timer: Timer) {
        self.pending.push(Pending {
            due: self.now + after,
            seq: self.next_seq,
            timer,
        });
        self.next_seq += 1;
    }

    fn next_index(&self) -> Option<usize> {
        self.pending
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)
    }

    /// Removes the earliest timer and moves time up to it. Returns how long
    /// the caller has to wait for it.
    pub fn pop_next(&mut self) -> Option<(Duration, Timer)> {
        let index = self.next_index()?;
        let pending = self.pending.remove(index);
        let wait = pending.due.saturating_sub(self.now);
        self.now = self.now.max(pending.due);

        Some((wait, pending.timer))
    }

    /// Like [`pop_next`](Self::pop_next), but only for timers due by `until`.
    #[cfg(test)]
    pub fn pop_due(&mut self, until: Duration) -> Option<Timer> {
        let index = self.next_index()?;
        if self.pending[index].due > until {
            return None;
        }
        self.pop_next().map(|(_, timer)| timer)
    }

    #[cfg(test)]
    pub fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

/// Moves every `Schedule` command onto `clock` and returns the rest.
pub fn enqueue(clock: &mut VirtualClock, commands: Vec<Command>) -> Vec<Command> {
    commands
        .into_iter()
        .filter_map(|command| match command {
            Command::Schedule { after, timer } => {
                clock.schedule(after, timer);
                None
            }
            other => Some(other),
        })
        .collect()
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub at: Duration,
    pub command: Command,
}

/// A session wired to a virtual clock, with a timestamped log of every
/// rendered command. Lets a whole run be played without any real timers.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct BattleDriver {
    session: BattleSession,
    clock: VirtualClock,
    log: Vec<LogEntry>,
}

#[cfg(test)]
impl BattleDriver {
    pub fn new(session: BattleSession) -> Self {
        Self {
            session,
            clock: VirtualClock::new(),
            log: Vec::new(),
        }
    }

    pub fn session(&self) -> &BattleSession {
        &self.session
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn dispatch(&mut self, event: Event) -> Result<Vec<Command>, BattleError> {
        let commands = self.session.handle(event)?;
        let visible = enqueue(&mut self.clock, commands);

        let at = self.clock.now();
        self.log.extend(visible.iter().cloned().map(|command| LogEntry { at, command }));
        Ok(visible)
    }

    /// Fires every timer due within `by` from now.
    pub fn advance(&mut self, by: Duration) -> Result<Vec<Command>, BattleError> {
        let until = self.clock.now() + by;
        let mut commands = Vec::new();

        while let Some(timer) = self.clock.pop_due(until) {
            commands.extend(self.dispatch(Event::Timer(timer))?);
        }
        self.clock.advance_to(until);

        Ok(commands)
    }

    /// Fires timers until none are left.
    pub fn settle(&mut self) -> Result<Vec<Command>, BattleError> {
        let mut commands = Vec::new();

        while let Some((_, timer)) = self.clock.pop_next() {
            commands.extend(self.dispatch(Event::Timer(timer))?);
        }

        Ok(commands)
    }

    /// Submits an answer and resolves everything it sets off.
    pub fn answer_now(&mut self, index: usize) -> Result<Vec<Command>, BattleError> {
        let mut commands = self.dispatch(Event::Answer(index))?;
        commands.extend(self.settle()?);
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::monster::MONSTERS;
    use crate::battle::session::tests::{deck, right, started, wrong};
    use crate::battle::session::{
        ExhaustionPolicy, Outcome, Phase, DAMAGE_PER_CORRECT, PLAYER_MAX_HP,
    };
    use crate::quiz::source::tests::{english_table, StubProvider};
    use crate::quiz::source::{Origin, QuestionSource};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn driver(size: usize, policy: ExhaustionPolicy) -> BattleDriver {
        BattleDriver::new(started(size, policy))
    }

    fn right_now(driver: &mut BattleDriver) -> Vec<Command> {
        let index = right(driver.session());
        driver.answer_now(index).unwrap()
    }

    fn wrong_now(driver: &mut BattleDriver) -> Vec<Command> {
        let index = wrong(driver.session());
        driver.answer_now(index).unwrap()
    }

    #[test]
    fn clock_fires_in_due_then_schedule_order() {
        let mut clock = VirtualClock::new();
        clock.schedule(ms(800), Timer::Settle(Outcome::Correct));
        clock.schedule(ms(200), Timer::Strike(Outcome::Correct));
        clock.schedule(ms(800), Timer::DialogueEnd);

        assert_eq!(
            clock.pop_next(),
            Some((ms(200), Timer::Strike(Outcome::Correct)))
        );
        assert_eq!(
            clock.pop_next(),
            Some((ms(600), Timer::Settle(Outcome::Correct)))
        );
        assert_eq!(clock.pop_next(), Some((ms(0), Timer::DialogueEnd)));
        assert_eq!(clock.pop_next(), None);
        assert_eq!(clock.now(), ms(800));
        assert!(clock.is_idle());
    }

    #[test]
    fn pop_due_respects_the_horizon() {
        let mut clock = VirtualClock::new();
        clock.schedule(ms(200), Timer::Strike(Outcome::Incorrect));

        assert_eq!(clock.pop_due(ms(199)), None);
        assert_eq!(
            clock.pop_due(ms(200)),
            Some(Timer::Strike(Outcome::Incorrect))
        );
    }

    #[test]
    fn answer_round_takes_800ms() {
        let mut driver = driver(5, ExhaustionPolicy::Fail);
        let index = right(driver.session());
        driver.dispatch(Event::Answer(index)).unwrap();

        assert!(driver.advance(ms(199)).unwrap().is_empty());
        assert_eq!(driver.session().monster_hp(), 80);

        let struck = driver.advance(ms(1)).unwrap();
        assert_eq!(
            struck,
            vec![Command::MonsterHealth {
                name: "Slime",
                percent: 50
            }]
        );
        assert!(driver.session().is_locked());

        assert!(driver.advance(ms(599)).unwrap().is_empty());
        let settled = driver.advance(ms(1)).unwrap();
        assert!(matches!(settled[..], [Command::ShowQuestion { .. }]));
        assert!(!driver.session().is_locked());
        assert_eq!(driver.clock().now(), ms(800));
    }

    #[test]
    fn double_submit_inside_the_window_is_dropped() {
        let mut driver = driver(5, ExhaustionPolicy::Fail);
        let index = right(driver.session());
        driver.dispatch(Event::Answer(index)).unwrap();
        let remaining = driver.session().remaining_questions();

        driver.advance(ms(100)).unwrap();
        assert!(driver.dispatch(Event::Answer(index)).unwrap().is_empty());
        driver.advance(ms(300)).unwrap();
        assert!(driver.dispatch(Event::Answer(index)).unwrap().is_empty());
        driver.settle().unwrap();

        assert_eq!(driver.session().monster_hp(), 80 - DAMAGE_PER_CORRECT);
        assert_eq!(driver.session().player_hp(), PLAYER_MAX_HP);
        assert_eq!(driver.session().remaining_questions(), remaining - 1);
    }

    #[test]
    fn log_records_render_commands_with_timestamps() {
        let mut driver = driver(5, ExhaustionPolicy::Fail);
        wrong_now(&mut driver);

        let log = driver.log();
        assert_eq!(log[0].at, ms(0));
        assert_eq!(log[0].command, Command::PlayCue(crate::battle::session::Cue::Hurt));
        assert_eq!(log[1].at, ms(200));
        assert_eq!(log[1].command, Command::PlayerHealth { percent: 75 });
        assert_eq!(log[2].at, ms(800));
        assert!(matches!(log[2].command, Command::ShowQuestion { .. }));
        assert!(log
            .iter()
            .all(|entry| !matches!(entry.command, Command::Schedule { .. })));
    }

    #[test]
    fn monsters_are_fought_in_order_with_health_reset() {
        let mut driver = driver(40, ExhaustionPolicy::Fail);
        let mut seen = vec![driver.session().monster().max_hp];

        for monster in MONSTERS.iter().take(3) {
            wrong_now(&mut driver);
            assert_eq!(driver.session().monster().ordinal, monster.ordinal);

            while driver.session().phase() == Phase::QuestionActive
                && driver.session().monster().ordinal == monster.ordinal
            {
                right_now(&mut driver);
            }
            assert_eq!(driver.session().player_hp(), PLAYER_MAX_HP);
            assert_eq!(
                driver.session().monster_hp(),
                driver.session().monster().max_hp
            );
            seen.push(driver.session().monster().max_hp);
        }

        assert_eq!(seen, vec![80, 120, 200, 300]);
    }

    #[test]
    fn slaying_the_dragon_wins_the_run() {
        let mut driver = driver(18, ExhaustionPolicy::Fail);
        let mut commands = Vec::new();

        while driver.session().phase() == Phase::QuestionActive {
            commands = right_now(&mut driver);
        }

        assert_eq!(driver.session().phase(), Phase::Victory);
        assert_eq!(driver.session().monster().name, "Dragon");
        assert!(driver.session().monster_hp() <= 0);
        assert_eq!(commands.last(), Some(&Command::ShowVictory));
        assert!(driver.clock().is_idle());
        assert!(!driver
            .log()
            .iter()
            .any(|entry| matches!(entry.command, Command::ShowMonster(m) if m.ordinal >= MONSTERS.len())));
        assert_eq!(driver.session().remaining_questions(), 0);
    }

    #[test]
    fn dying_ends_the_run_on_any_monster() {
        for ordinal in 0..MONSTERS.len() {
            let mut driver = driver(40, ExhaustionPolicy::Fail);
            while driver.session().monster().ordinal < ordinal {
                right_now(&mut driver);
            }

            while driver.session().phase() == Phase::QuestionActive {
                wrong_now(&mut driver);
            }

            assert_eq!(driver.session().phase(), Phase::Defeat);
            assert_eq!(driver.session().monster().ordinal, ordinal);
            assert!(driver.session().player_hp() <= 0);
            assert!(driver.clock().is_idle());
        }
    }

    #[test]
    fn long_runs_survive_on_reshuffled_questions() {
        let mut driver = driver(3, ExhaustionPolicy::Reshuffle);
        while driver.session().phase() == Phase::QuestionActive {
            right_now(&mut driver);
        }
        assert_eq!(driver.session().phase(), Phase::Victory);
    }

    #[tokio::test]
    async fn english_run_with_remote_down() {
        let source = QuestionSource::new(Some(StubProvider::Fails), english_table());
        let mut rng = StdRng::seed_from_u64(11);
        let set = source.get_questions("English", &mut rng).await;
        assert_eq!(set.origin, Origin::Fallback);

        let mut expected = source.table().questions_for("English").to_vec();
        let mut pool = set.questions.clone();
        expected.sort_by(|a, b| a.text.cmp(&b.text));
        pool.sort_by(|a, b| a.text.cmp(&b.text));
        assert_eq!(pool, expected);

        let session =
            BattleSession::new("English", set.questions, ExhaustionPolicy::Fail, rng).unwrap();
        let mut driver = BattleDriver::new(session);
        driver.dispatch(Event::Start).unwrap();
        let monster_hp = driver.session().monster().max_hp;

        right_now(&mut driver);
        assert_eq!(driver.session().monster_hp(), monster_hp - 40);

        wrong_now(&mut driver);
        wrong_now(&mut driver);
        assert_eq!(driver.session().player_hp(), 100 - 25 - 25);
        assert_eq!(driver.session().monster_hp(), monster_hp - 40);
    }

    #[test]
    fn deck_helper_matches_session_order() {
        let driver = driver(4, ExhaustionPolicy::Fail);
        let shown = driver.session().current_question().unwrap();
        assert_eq!(shown, &deck(4)[3]);
    }
}
