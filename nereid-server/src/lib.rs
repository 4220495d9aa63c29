//! # Nereid Server
//!
//! NMEA 0183 / AIS instrument emulator.
//!
//! Synthesises a coherent vessel data stream - position, course, wind,
//! depth and other environmentals, a GNSS constellation and a fleet of
//! AIS contacts - and multicasts it to navigation consumers over UDP
//! datagrams and a fan-out TCP byte-stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    nereid-server                       │
//! │  ┌──────────────┐   ┌──────────────────────────────┐   │
//! │  │ Engine       │──▶│ SimWorker (tick scheduler)   │   │
//! │  │ start/stop/  │   │  own-ship + fleet + GNSS     │   │
//! │  │ restart/     │   └──────────────┬───────────────┘   │
//! │  │ status       │                  ▼                   │
//! │  └──────────────┘   ┌──────────────────────────────┐   │
//! │                     │ Publisher                    │   │
//! │                     │  UDP sender + TCP fan-out    │   │
//! │                     └──────────────────────────────┘   │
//! └────────────────────────────────────────────────────────┘
//!               sentence building: nereid-core
//! ```
//!
//! The [`engine::Engine`] owns the lifecycle; all mutable simulation
//! state lives on the scheduler worker, and observers only ever get
//! immutable copies. `nereid-core` holds the pure half: NMEA/AIS
//! codecs, geodesy, GPX timelines and the kinematic models.

pub mod engine;
pub mod publisher;
pub mod scheduler;
pub mod status;

pub use engine::{Engine, EngineError};
pub use status::StatusSnapshot;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
