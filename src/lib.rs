pub mod bench;
pub mod config;
pub mod error;
pub mod golf;
pub mod machine;
pub mod observer;
pub mod program;
pub mod scheduler;
pub mod tape;

pub use config::MachineConfig;
pub use error::{ConfigError, LoadError};
pub use machine::{Machine, RunOutcome, RunState, StepEffect, input_queue};
pub use observer::{Hooks, Observer, StepView};
pub use program::Program;
pub use scheduler::{CancelHandle, Pacer, ThreadPacer};
