//! Ticket Monitor Session - one connected viewer of the shared monitor
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           VIEWER SESSION                             │
//! │                                                                      │
//! │   writes ──► BackingStore ──► change feeds (per collection)          │
//! │      │             ▲                 │                               │
//! │      │             │ poll            │ push                          │
//! │      ▼             │                 ▼                               │
//! │  ┌──────────────────────────────────────────────┐                    │
//! │  │  Replica (ArcSwap, replaced wholesale)       │                    │
//! │  │  catalog · active tickets · history          │                    │
//! │  └──────────────┬───────────────────────────────┘                    │
//! │                 │                                                    │
//! │        ┌────────▼────────┐        ┌──────────────────┐               │
//! │        │ Board (per now) │        │ Alert timer      │──► AlertSink  │
//! │        └─────────────────┘        └──────────────────┘               │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions never coordinate with each other. The store is the only source
//! of truth and every refresh replaces local data instead of merging it.

#![warn(clippy::all)]

pub mod alert;
pub mod clock;
pub mod config;
pub mod notice;
pub mod replica;
pub mod session;
mod sync;

pub use alert::{AlertSink, LogAlertSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use notice::{Notice, NoticeLevel};
pub use replica::{Fetched, Replica};
pub use session::{SessionBuilder, ViewerSession};
