// Public modules
pub mod cleanup;
pub mod db;
pub mod deploy;
pub mod environment;
pub mod error;
pub mod ops;
pub mod pipeline;
pub mod release;
pub mod runner;
pub mod setup;
pub mod ssh;
pub mod test_suite;
pub mod tracker;
pub mod transport;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
