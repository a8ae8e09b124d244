//! Session tracking and scan assignment for ScanDesk.
//!
//! Decides, for every decoded QR payload, which logged-in user session it
//! belongs to, and makes sure each physical scan is recorded at most once
//! even when several scanners see the same code.
//!
//! # Components
//!
//! - [`SessionRegistry`]: active sessions, toggled by RFID badges
//! - [`DedupCache`]: duplicate filter with global and per-session windows
//! - [`AssignmentPolicy`]: round robin, manual, last RFID, or last login
//! - [`TagDebouncer`] / [`CachedResolver`]: RFID preprocessing
//! - [`Coordinator`] / [`CoordinatorHandle`]: the event loop tying it together
//!
//! See the [`coordinator`] module for the event flow.

pub mod clock;
pub mod coordinator;
pub mod dedup;
pub mod notify;
pub mod policy;
pub mod registry;
pub mod tags;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{
    Coordinator, CoordinatorBuilder, CoordinatorHandle, CoordinatorStats, TagOutcome,
    WorkerSnapshot,
};
pub use dedup::{DedupCache, DedupDecision, DedupStats};
pub use notify::{
    ChannelSink, DiscardReason, ManualRequestId, NotificationSink, NullSink, TagRejection, UiEvent,
};
pub use policy::{Assignment, AssignmentPolicy};
pub use registry::{SessionRegistry, ToggleOutcome};
pub use tags::{CachedResolver, TagDebouncer};
