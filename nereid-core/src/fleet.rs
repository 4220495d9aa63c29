//! Simulated AIS contact fleet.
//!
//! Contacts are bound to the own-ship reference frame: placed around it
//! at start, then either free-running (manual mode) or sampling the same
//! GPX timeline at a fixed delta. Identity (MMSI, name) is stable for
//! the lifetime of a fleet; a restart builds a new fleet and re-seeds
//! the MMSI sequence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::SimConfig;
use crate::geo;
use crate::gpx::GpxTrack;
use crate::ownship::{OwnShip, TrackCursor};

/// First MMSI of an epoch is `MMSI_BASE + 1`.
pub const MMSI_BASE: u32 = 999_000_000;

/// Interval between Type 24A static reports, simulated seconds.
const STATIC_REPORT_INTERVAL_S: i64 = 60;

/// Built-in vessel names, used when the configuration carries no pool.
const NAME_POOL: &[&str] = &[
    "ORION", "SEA SPIRIT", "ANDROMEDA", "NORTHERN STAR", "BLUE HERON",
    "WANDERER", "TRITON", "MISTRAL", "ALBATROSS", "CASSIOPEIA",
    "MERIDIAN", "SILVER GULL", "TEMPEST", "HALCYON", "AURORA",
    "PELICAN", "ARGONAUT", "ZEPHYR", "CORMORANT", "VAGABOND",
];

#[derive(Debug, Clone, Copy)]
enum Binding {
    /// Free-running after initial placement.
    Manual,
    /// Sample the timed track at own offset plus this delta (seconds).
    TimedTrack { delta_s: f64 },
    /// Sample the untimed track at own index plus this delta (points).
    IndexTrack { delta: f64 },
}

#[derive(Debug, Clone)]
pub struct AisContact {
    pub mmsi: u32,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    cog_offset_deg: f64,
    sog_offset_kn: f64,
    binding: Binding,
    last_static: Option<DateTime<Utc>>,
}

impl AisContact {
    /// A Type 24A is due immediately after construction and then every
    /// 60 simulated seconds.
    pub fn static_report_due(&self, sim_time: DateTime<Utc>) -> bool {
        match self.last_static {
            None => true,
            Some(last) => (sim_time - last).num_seconds() >= STATIC_REPORT_INTERVAL_S,
        }
    }

    pub fn mark_static_sent(&mut self, sim_time: DateTime<Utc>) {
        self.last_static = Some(sim_time);
    }
}

#[derive(Debug)]
pub struct AisFleet {
    contacts: Vec<AisContact>,
    track: Option<Arc<GpxTrack>>,
}

impl AisFleet {
    /// Build the fleet for a configuration epoch around the own-ship
    /// starting pose.
    pub fn new(config: &SimConfig, own: &OwnShip, rng: &mut StdRng) -> Self {
        let track = config.gpx_track.clone();
        let mut contacts = Vec::with_capacity(config.ais_num_targets);

        for i in 0..config.ais_num_targets {
            let mmsi = MMSI_BASE + 1 + i as u32;
            let name = if !config.ais_name_pool.is_empty() {
                config.ais_name_pool[i % config.ais_name_pool.len()].clone()
            } else if i < NAME_POOL.len() {
                NAME_POOL[i].to_string()
            } else {
                format!("VESSEL {:03}", mmsi % 1000)
            };

            let bearing = rng.gen_range(0.0..360.0);
            let range_nm = rng.gen_range(0.0..=config.ais_distribution_radius_nm.max(0.0));
            let (lat, lon) = geo::dead_reckon(own.lat, own.lon, bearing, range_nm);

            let cog_offset_deg =
                rng.gen_range(-config.ais_max_cog_offset..=config.ais_max_cog_offset);
            let sog_offset_kn =
                rng.gen_range(-config.ais_max_sog_offset..=config.ais_max_sog_offset);

            let binding = match &track {
                Some(t) if t.has_time() => {
                    let magnitude = rng.gen_range(30.0..=300.0);
                    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                    Binding::TimedTrack {
                        delta_s: sign * magnitude,
                    }
                }
                Some(_) => Binding::IndexTrack {
                    delta: rng.gen_range(-50.0..=50.0),
                },
                None => Binding::Manual,
            };

            contacts.push(AisContact {
                mmsi,
                name,
                lat,
                lon,
                sog_kn: (own.sog_kn + sog_offset_kn).max(0.0),
                cog_deg: geo::normalize_deg(own.cog_deg + cog_offset_deg),
                cog_offset_deg,
                sog_offset_kn,
                binding,
                last_static: None,
            });
        }

        AisFleet { contacts, track }
    }

    /// Per-tick pose update for every contact, tied to the own-ship
    /// state already advanced for this tick.
    pub fn step(&mut self, own: &OwnShip, dt_s: f64) {
        let cursor = own.track_cursor();
        for contact in &mut self.contacts {
            contact.cog_deg = geo::normalize_deg(own.cog_deg + contact.cog_offset_deg);
            contact.sog_kn = (own.sog_kn + contact.sog_offset_kn).max(0.0);

            match (contact.binding, &self.track, cursor) {
                (Binding::Manual, _, _) => {
                    let dist_nm = contact.sog_kn * dt_s / 3600.0;
                    let (lat, lon) =
                        geo::dead_reckon(contact.lat, contact.lon, contact.cog_deg, dist_nm);
                    contact.lat = lat;
                    contact.lon = lon;
                }
                (
                    Binding::TimedTrack { delta_s },
                    Some(track),
                    Some(TrackCursor::Timed { offset_s }),
                ) => {
                    let (lat, lon) = track.position_at(offset_s + delta_s);
                    contact.lat = lat;
                    contact.lon = lon;
                }
                (
                    Binding::IndexTrack { delta },
                    Some(track),
                    Some(TrackCursor::Untimed { index }),
                ) => {
                    let (lat, lon) = track.position_at_index(index + delta);
                    contact.lat = lat;
                    contact.lon = lon;
                }
                // Binding and cursor kinds always match within an epoch
                _ => {}
            }
        }
    }

    pub fn contacts(&self) -> &[AisContact] {
        &self.contacts
    }

    pub fn contacts_mut(&mut self) -> &mut [AisContact] {
        &mut self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
