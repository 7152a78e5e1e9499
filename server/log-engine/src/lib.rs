//! Log classification & traceback aggregation engine: deterministic and rule-based.
//!
//! Turns free-form, bracket-timestamped engine logs into structured entries:
//! each line is classified (timestamp, category, severity, normalized message),
//! multi-line crash dumps are folded into one error carrying its traceback, and
//! every entry gets content-addressed identities for idempotent storage.
//!
//! No DB, no network, no clock; pure computation over a closed file.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod normalize;
pub mod search;
pub mod types;

pub use classify::{classify, Classifier};
pub use config::Config;
pub use engine::{dedup_by_message_hash, parse, parse_file, read_log_file, LogParser};
pub use error::EngineError;
pub use search::{line_documents, LineDocument};
pub use types::{Entry, LineRecord, Severity};
