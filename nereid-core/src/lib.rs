//! Nereid Core - NMEA 0183 / AIS instrument simulation library
//!
//! This crate contains the platform-independent half of the emulator:
//! sentence construction, AIS bit packing, geodesy, GPX timelines and
//! the kinematic models. It performs no I/O and has no runtime
//! dependency; the `nereid-server` crate drives it from a tokio tick
//! loop and publishes the output over UDP and TCP.
//!
//! # Example
//!
//! ```rust
//! use nereid_core::config::SimConfig;
//! use nereid_core::ownship::OwnShip;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut config = SimConfig::default();
//! config.rng_seed = Some(1);
//! config.validate().unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let mut ship = OwnShip::new(&config, chrono::Utc::now());
//! ship.step(1.0, &mut rng);
//! ```

pub mod config;
pub mod error;
pub mod fleet;
pub mod geo;
pub mod gnss;
pub mod gpx;
pub mod nmea;
pub mod ownship;
pub mod ring;

// Re-export commonly used types
pub use config::SimConfig;
pub use error::{ConfigError, GpxError};
pub use gpx::GpxTrack;
