pub mod cli;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod lock;
pub mod notify;
pub mod terraform;

pub use config::WatcherConfig;
pub use engine::{DriftEngine, EXIT_INTERRUPTED, RunOptions, RunReport};
pub use error::{DriftError, Result};
pub use lock::{RunLock, RunLockHandle};
pub use notify::AlertDispatcher;
pub use terraform::{Classification, DriftCheck, TerraformRunner};
