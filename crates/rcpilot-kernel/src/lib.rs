//! `rcpilot-kernel` – Command interpretation & actuator safety
//!
//! Everything that decides *what the car does* lives here.  Transports only
//! hand raw command strings in; the kernel decides whether and how they
//! reach the servos.
//!
//! # Modules
//!
//! - [`command`] – tokenizer and typed [`Command`] parser for the
//!   hyphen-delimited grammar (`manual-throttle-forward-500`).
//! - [`named_values`] – [`NamedValues`]: symbolic token → servo value table.
//! - [`safety_timer`] – [`SafetyTimer`]: the throttle dead-man switch.
//! - [`dispatcher`] – [`Dispatcher`]: applies commands to the servos and
//!   [`ServerStatus`][rcpilot_types::ServerStatus].
//! - [`controller`] – single-writer actor that owns the dispatcher and
//!   serialises every input onto one queue.

pub mod command;
pub mod controller;
pub mod dispatcher;
pub mod named_values;
pub mod safety_timer;

pub use command::{Command, CommandError, tokenize};
pub use controller::{Controller, ControllerHandle};
pub use dispatcher::Dispatcher;
pub use named_values::NamedValues;
pub use safety_timer::{SafetyTimer, TimerExpiry};
