//! Submission Coordinator and replay guard
//!
//! ```text
//! submission/
//! ├── replay.rs      - nonces and content hashes
//! ├── record.rs      - SubmissionRecord and its status machine
//! ├── tracker.rs     - records of this process, by subject and hash
//! └── coordinator.rs - bounded, per-subject serialized ledger submission
//! ```

pub mod coordinator;
pub mod record;
pub mod replay;
pub mod tracker;

pub use coordinator::{DEFAULT_LEDGER_TIMEOUT, ReplayScope, SubmissionCoordinator};
pub use record::{SubmissionRecord, SubmissionStatus};
pub use replay::{ContentHash, Nonce, NonceGenerator};
pub use tracker::{SubmissionTracker, TrackerStats};
