//! Look-ahead metronome: click scheduling, count-in, and click synthesis.

mod click;
mod config;
mod scheduler;

pub use click::{ClickEvent, ClickSink, ClickSound};
pub use config::MetronomeConfig;
pub use scheduler::{CountInCallback, MetronomeScheduler, SchedulerState};
