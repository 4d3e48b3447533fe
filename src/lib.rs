//! # dynip
//!
//! Keeps Azure DNS A records pointed at whatever address a dynamic DNS
//! hostname currently resolves to.
//!
//! ## Features
//!
//! - Resolves the dynamic DNS hostname once per tick
//! - Reconciles the same record set across several DNS zones
//! - Conditional updates (etag / `If-Match`) so concurrent edits are never overwritten
//! - Cron-style schedule with a built-in timer, or one-shot runs from an external scheduler
//!
//! ## Usage
//!
//! ```bash
//! # One reconciliation pass (cron, systemd timer, ...)
//! dynip run
//!
//! # Built-in timer at the configured schedule
//! dynip daemon
//!
//! # Show the resolved address and each zone's current record
//! dynip status
//! ```

pub mod config;
pub mod error;
pub mod providers;
pub mod reconciler;
pub mod resolver;
pub mod schedule;
pub mod trigger;

pub use config::Config;
pub use error::{Error, Result};
pub use reconciler::{Reconciler, ReconcilerSettings, TickReport};
pub use resolver::{AddressResolver, SystemResolver};
pub use schedule::{ScheduleExpression, ScheduleProvider, TickInfo};
