//! `rcpilot-middleware` – Status fan-out
//!
//! Routes status reports between connected observers (browser tabs, the
//! vision process) without caring about their content beyond stamping the
//! server-known link flag onto them.
//!
//! # Modules
//!
//! - [`broadcaster`] – [`StatusBroadcaster`]: merge-and-republish bus built
//!   on a Tokio broadcast channel, excluding the sender of each update.

pub mod broadcaster;

pub use broadcaster::{LINK_STATUS_KEY, Observer, ObserverId, StatusBroadcaster};
