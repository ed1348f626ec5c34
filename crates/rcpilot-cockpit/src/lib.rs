//! `rcpilot-cockpit` – HTTP + WebSocket transport for the car.
//!
//! One TCP listener (default port `80`) serves:
//!
//! 1. **`GET /command?command=<cmd>`** (also `/command/`) – queues `<cmd>` on
//!    the [`ControllerHandle`] and always answers `200 command: <cmd>`.
//!
//! 2. **`GET /status`** – the latest [`VehicleSnapshot`] as JSON.
//!
//! 3. **`GET /`** – the embedded cockpit page; any other path is looked up in
//!    the configured public directory.
//!
//! 4. **WebSocket upgrades** on `/` or `/ws` – `{"event", "data"}` frames:
//!    `robot command` is dispatched, `robot update` is merged with the link
//!    flag and republished as `robot status` to every other client through
//!    the [`StatusBroadcaster`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use rcpilot_cockpit::CockpitServer;
//! use rcpilot_kernel::{Controller, NamedValues};
//! use rcpilot_middleware::StatusBroadcaster;
//!
//! #[tokio::main]
//! async fn main() {
//!     let controller = Controller::spawn(NamedValues::default());
//!     let broadcaster = StatusBroadcaster::new(controller.watch_status());
//!     CockpitServer::new(controller, broadcaster)
//!         .with_port(8080)
//!         .run()
//!         .await
//!         .expect("cockpit server failed");
//! }
//! ```
//!
//! [`ControllerHandle`]: rcpilot_kernel::ControllerHandle
//! [`VehicleSnapshot`]: rcpilot_types::VehicleSnapshot
//! [`StatusBroadcaster`]: rcpilot_middleware::StatusBroadcaster

pub mod server;

pub use server::{CockpitServer, DEFAULT_PORT};
