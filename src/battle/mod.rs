//! The boss-battle state machine: four monsters fought in a fixed order,
//! one question per round, with damage and follow-ups on timers.

pub mod clock;
pub mod monster;
pub mod session;

pub use clock::{enqueue, VirtualClock};
pub use monster::MONSTERS;
pub use session::{BattleSession, Command, Cue, Event, ExhaustionPolicy};
