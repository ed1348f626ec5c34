//! `rcpilot-hal` – Servo hardware abstraction
//!
//! # Modules
//!
//! - [`actuator`] – the [`Actuator`] driver trait every physical or simulated
//!   servo output implements.
//! - [`servo`] – [`Servo`]: range-clamping wrapper that pairs a driver with its
//!   [`ActuatorConfig`][rcpilot_types::ActuatorConfig].
//! - [`bank`] – [`ServoBank`]: the car's two named channels, `acceleration`
//!   and `steering`.
//! - [`board`] – the [`Board`] link trait whose `connect` future is the
//!   "link ready" signal.
//! - [`sim`] – in-process stand-ins for running without hardware.

pub mod actuator;
pub mod bank;
pub mod board;
pub mod servo;
pub mod sim;

pub use actuator::Actuator;
pub use bank::{Channel, ServoBank};
pub use board::{Board, SimBoard};
pub use servo::Servo;
pub use sim::{SimActuator, SimProbe};
