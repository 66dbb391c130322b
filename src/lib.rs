// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod change_detector;
pub mod config;
pub mod coordinator;
pub mod deliver;
pub mod error;
pub mod metrics;
pub mod notice;
pub mod scheduler;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::change_detector::{detect_new, Watermark};
pub use crate::coordinator::{RunCoordinator, RunOutcome, RunSettings};
pub use crate::deliver::automation::{ChatAutomation, KeyAction, SettleDelays, SurfaceHandle};
pub use crate::notice::NoticeEntry;
pub use crate::source::{parser::parse_notices, HttpNoticeSource, NoticeSource};
