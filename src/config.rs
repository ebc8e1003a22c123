//! In-memory configuration record for a test run.
//!
//! The harness consumes this record as-is; populating it from a profile
//! file (or anywhere else) is the front end's job.

use crate::monitor::Watch;

/// What to do when a watch reports a regression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorReaction {
    /// Print the diagnostic and keep the run going.
    #[default]
    Log,
    /// Print the diagnostic and request termination of the test run.
    Stop,
}

/// One tracked process and the watches that apply to it.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    /// Symbolic process id; timer metrics for this process are expected
    /// under `stout.{id}.`.
    pub id: String,
    /// How many instances of the process the run drives.
    pub instance_count: u32,
    /// Assertions evaluated against this process's timers.
    pub watches: Vec<Watch>,
}

/// Top-level settings for a test run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// UDP port the ingestion server listens on.
    pub server_port: u16,
    /// Seconds to wait before any data is considered meaningful.
    pub initial_delay_s: u64,
    /// Flush period of the server, in seconds.
    pub sampling_time_s: u64,
    /// Reaction to a failed watch.
    pub error_reaction: ErrorReaction,
    /// The processes under test.
    pub processes: Vec<ProcessSpec>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            server_port: 9999,
            initial_delay_s: 5,
            sampling_time_s: 60,
            error_reaction: ErrorReaction::default(),
            processes: Vec::new(),
        }
    }
}
