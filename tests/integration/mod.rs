//! Integration test modules for Nova
//!
//! - automation: WRITE/TOUCH recording, READ playback, snapshots, persistence
//! - metronome: click scheduling, count-in, transport sync
//! - session: builder, scheduler thread, teardown

pub mod automation;
pub mod metronome;
pub mod session;
