//! Event Quota Tracking Module
//!
//! Durable per-bucket event histories and the frequency checks built on
//! them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Quota Registry                 │
//! │   bucket name ──► Arc<EventQuotaTracker>      │
//! ├──────────────────────────────────────────────┤
//! │  ┌────────────┐  ┌────────────┐               │
//! │  │ Tracker A  │  │ Tracker B  │  QuotaPolicy  │
//! │  │ Mutex<Vec> │  │ Mutex<Vec> │  check/admit  │
//! │  └─────┬──────┘  └─────┬──────┘               │
//! ├────────┼───────────────┼─────────────────────┤
//! │   <root>/A.hist    <root>/B.hist   (codec)    │
//! └──────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod error;
pub mod policy;
pub mod registry;
pub mod tracker;

pub use error::{HistoryError, HistoryResult};
pub use policy::{QuotaDecision, QuotaPolicy};
pub use registry::QuotaRegistry;
pub use tracker::{EventQuotaTracker, HistorySnapshot};
