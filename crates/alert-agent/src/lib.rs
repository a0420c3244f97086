//! The alert agent watches the `sync_logs` table for synchronizations between
//! modules which have failed or gone stale, and emails an alert about each one.
//!
//! An alert pass selects every sync log with status `error`, and every sync
//! log with status `stale` which hasn't synced for at least fifteen minutes,
//! excluding any sync log which already has a `sent` alert in `alert_logs`
//! from within the last day. It then renders one email per selected sync log
//! and sends it to each recipient, appending one `alert_logs` row per
//! recipient with the outcome. Since only `sent` alerts suppress later ones,
//! a sync log whose alerts all failed is picked up again by the next pass.
//!
//! Passes are run on demand through the HTTP API, and optionally on a fixed
//! interval.
pub mod api;
mod cache;
pub mod dispatch;
pub mod orchestrator;
pub mod schedule;
pub mod selector;
pub mod store;

#[cfg(test)]
mod test_support;

pub use cache::TtlCache;
pub use dispatch::{DispatchReport, Dispatcher, EmailSender, Sender};
pub use orchestrator::{Formatter, Orchestrator};
pub use store::{AlertLogStore, PgStore, SyncLogStore, WriteError};
