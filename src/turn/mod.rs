//! Turn state machine.

mod machine;

pub use machine::{NewGameSettings, TurnMachine};
