//! Own-ship kinematic model.
//!
//! One value owned exclusively by the scheduler worker. Each tick either
//! random-walks the motion state and dead-reckons the position (manual
//! mode) or interpolates along a GPX timeline. Sensors get a small
//! bounded perturbation per tick and are re-clamped so multi-day runs
//! cannot drift into nonsense.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::SimConfig;
use crate::geo;
use crate::gpx::GpxTrack;

const MAX_SOG_KN: f64 = 40.0;
const DEPTH_RANGE_M: (f64, f64) = (0.5, 300.0);
const WATER_TEMP_RANGE_C: (f64, f64) = (-2.0, 35.0);
const AIR_TEMP_RANGE_C: (f64, f64) = (-20.0, 45.0);
const BATTERY_RANGE_V: (f64, f64) = (11.0, 14.8);

/// Tank drift per tick, percent.
const FRESH_WATER_RATE: f64 = 0.02;
const FUEL_RATE: f64 = 0.01;
const WASTE_RATE: f64 = 0.015;

/// Where the own-ship currently is on its GPX track, for binding AIS
/// contacts to the same timeline.
#[derive(Debug, Clone, Copy)]
pub enum TrackCursor {
    /// Seconds past the start of a timed track.
    Timed { offset_s: f64 },
    /// Fractional point index on an untimed track.
    Untimed { index: f64 },
}

#[derive(Debug, Clone)]
enum Playback {
    Timed { track: Arc<GpxTrack>, offset_s: f64 },
    Untimed { track: Arc<GpxTrack>, fraction: f64 },
}

#[derive(Debug)]
pub struct OwnShip {
    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    pub tws_kn: f64,
    pub twd_deg: f64,
    pub magvar_deg: f64,

    pub depth_m: f64,
    pub depth_offset_m: f64,
    pub water_temp_c: f64,
    pub battery_v: f64,
    pub air_temp_c: f64,
    pub tank_fresh_water: f64,
    pub tank_fuel: f64,
    pub tank_waste: f64,

    /// Simulated UTC clock; every sentence of a tick shares it.
    pub sim_time: DateTime<Utc>,

    playback: Option<Playback>,
}

impl OwnShip {
    /// Build the initial state from a validated configuration.
    ///
    /// `now` is the real clock, used when no `start_datetime` is given.
    pub fn new(config: &SimConfig, now: DateTime<Utc>) -> Self {
        let playback = config.gpx_track.as_ref().map(|track| {
            if track.has_time() {
                Playback::Timed {
                    track: track.clone(),
                    offset_s: config.gpx_offset_s.unwrap_or(0.0).clamp(0.0, track.duration_s()),
                }
            } else {
                Playback::Untimed {
                    track: track.clone(),
                    fraction: config.gpx_start_fraction.unwrap_or(0.0).clamp(0.0, 1.0),
                }
            }
        });

        let mut ship = OwnShip {
            lat: config.lat,
            lon: geo::wrap_longitude(config.lon),
            sog_kn: config.sog_kn.clamp(0.0, MAX_SOG_KN),
            cog_deg: geo::normalize_deg(config.cog_deg),
            tws_kn: config.tws_kn.max(0.0),
            twd_deg: geo::normalize_deg(config.twd_deg),
            magvar_deg: config.magvar_deg,
            depth_m: config.depth_m,
            depth_offset_m: config.depth_offset_m,
            water_temp_c: config.water_temp_c,
            battery_v: config.battery_v,
            air_temp_c: config.air_temp_c,
            tank_fresh_water: config.tank_fresh_water,
            tank_fuel: config.tank_fuel,
            tank_waste: config.tank_waste,
            sim_time: config.start_time().unwrap_or(now),
            playback,
        };
        // In GPX mode the initial pose comes from the track, not the
        // lat/lon fields of the configuration.
        ship.apply_playback();
        ship
    }

    /// Advance one tick of `dt_s` simulated seconds.
    pub fn step(&mut self, dt_s: f64, rng: &mut StdRng) {
        self.sim_time += Duration::milliseconds((dt_s * 1000.0).round() as i64);

        match &mut self.playback {
            Some(Playback::Timed { track, offset_s }) => {
                *offset_s = (*offset_s + dt_s).min(track.duration_s());
            }
            Some(Playback::Untimed { track, fraction }) => {
                let advance_nm = self.sog_kn * dt_s / 3600.0;
                if track.length_nm() > 0.0 {
                    *fraction = (*fraction + advance_nm / track.length_nm()).min(1.0);
                }
            }
            None => {
                self.sog_kn = (self.sog_kn + rng.gen_range(-0.2..=0.2)).clamp(0.0, MAX_SOG_KN);
                self.cog_deg = geo::normalize_deg(self.cog_deg + rng.gen_range(-2.0..=2.0));
                let dist_nm = self.sog_kn * dt_s / 3600.0;
                let (lat, lon) = geo::dead_reckon(self.lat, self.lon, self.cog_deg, dist_nm);
                self.lat = lat;
                self.lon = lon;
            }
        }
        self.apply_playback();

        self.tws_kn = (self.tws_kn + rng.gen_range(-0.3..=0.3)).max(0.0);
        self.twd_deg = geo::normalize_deg(self.twd_deg + rng.gen_range(-3.0..=3.0));

        self.depth_m = (self.depth_m + rng.gen_range(-0.1..=0.1))
            .clamp(DEPTH_RANGE_M.0, DEPTH_RANGE_M.1);
        self.water_temp_c = (self.water_temp_c + rng.gen_range(-0.05..=0.05))
            .clamp(WATER_TEMP_RANGE_C.0, WATER_TEMP_RANGE_C.1);
        self.air_temp_c = (self.air_temp_c + rng.gen_range(-0.05..=0.05))
            .clamp(AIR_TEMP_RANGE_C.0, AIR_TEMP_RANGE_C.1);
        self.battery_v = (self.battery_v + rng.gen_range(-0.01..=0.01))
            .clamp(BATTERY_RANGE_V.0, BATTERY_RANGE_V.1);

        self.tank_fresh_water = (self.tank_fresh_water - FRESH_WATER_RATE).clamp(0.0, 100.0);
        self.tank_fuel = (self.tank_fuel - FUEL_RATE).clamp(0.0, 100.0);
        self.tank_waste = (self.tank_waste + WASTE_RATE).clamp(0.0, 100.0);
    }

    /// Recompute pose from the track cursor (GPX mode only).
    fn apply_playback(&mut self) {
        match &self.playback {
            Some(Playback::Timed { track, offset_s }) => {
                let (lat, lon) = track.position_at(*offset_s);
                let (sog, cog) = track.sog_cog_at(*offset_s);
                self.lat = lat;
                self.lon = lon;
                self.sog_kn = sog;
                self.cog_deg = cog;
            }
            Some(Playback::Untimed { track, fraction }) => {
                let (lat, lon) = track.position_at_fraction(*fraction);
                self.lat = lat;
                self.lon = lon;
                self.cog_deg = track.cog_at_fraction(*fraction);
            }
            None => {}
        }
    }

    /// Magnetic course: true course minus variation, normalised.
    pub fn cog_mag_deg(&self) -> f64 {
        geo::normalize_deg(self.cog_deg - self.magvar_deg)
    }

    /// Magnetic true-wind direction.
    pub fn twd_mag_deg(&self) -> f64 {
        geo::normalize_deg(self.twd_deg - self.magvar_deg)
    }

    /// True wind angle relative to the vessel, [0, 360).
    pub fn twa_deg(&self) -> f64 {
        geo::normalize_deg(self.twd_deg - self.cog_deg)
    }

    /// Apparent wind (speed kn, angle [0, 360) relative to the bow),
    /// from the vector triangle of true wind and own motion.
    pub fn apparent_wind(&self) -> (f64, f64) {
        let twa = geo::angle_diff(self.twd_deg, self.cog_deg).to_radians();
        let aws = (self.tws_kn * self.tws_kn
            + self.sog_kn * self.sog_kn
            + 2.0 * self.tws_kn * self.sog_kn * twa.cos())
        .sqrt();
        let awa = (self.tws_kn * twa.sin())
            .atan2(self.tws_kn * twa.cos() + self.sog_kn)
            .to_degrees();
        (aws, geo::normalize_deg(awa))
    }

    /// Current GPX cursor, if a track is playing.
    pub fn track_cursor(&self) -> Option<TrackCursor> {
        match &self.playback {
            Some(Playback::Timed { offset_s, .. }) => Some(TrackCursor::Timed {
                offset_s: *offset_s,
            }),
            Some(Playback::Untimed { track, fraction }) => Some(TrackCursor::Untimed {
                index: track.index_at_fraction(*fraction),
            }),
            None => None,
        }
    }

    /// Playback progress in [0, 1], if a track is playing.
    pub fn track_progress(&self) -> Option<f64> {
        match &self.playback {
            Some(Playback::Timed { track, offset_s }) => {
                if track.duration_s() > 0.0 {
                    Some(offset_s / track.duration_s())
                } else {
                    Some(1.0)
                }
            }
            Some(Playback::Untimed { fraction, .. }) => Some(*fraction),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn manual_config() -> SimConfig {
        let mut cfg = SimConfig::default();
        cfg.start_datetime = Some("2025-01-01T12:00:00Z".to_string());
        cfg
    }

    #[test]
    fn test_invariants_over_long_run() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut ship = OwnShip::new(&manual_config(), start());
        for _ in 0..5000 {
            ship.step(1.0, &mut rng);
            assert!((-90.0..=90.0).contains(&ship.lat));
            assert!(ship.lon > -180.0 && ship.lon <= 180.0);
            assert!((0.0..360.0).contains(&ship.cog_deg));
            assert!((0.0..360.0).contains(&ship.twd_deg));
            assert!((0.0..=MAX_SOG_KN).contains(&ship.sog_kn));
            assert!(ship.tws_kn >= 0.0);
            assert!((0.0..=100.0).contains(&ship.tank_fresh_water));
            assert!((0.0..=100.0).contains(&ship.tank_waste));
            assert!((BATTERY_RANGE_V.0..=BATTERY_RANGE_V.1).contains(&ship.battery_v));
        }
    }

    #[test]
    fn test_sim_clock_advances_exactly() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ship = OwnShip::new(&manual_config(), start());
        for _ in 0..60 {
            ship.step(1.0, &mut rng);
        }
        assert_eq!(ship.sim_time, start() + Duration::seconds(60));
    }

    #[test]
    fn test_tanks_drift_monotonically() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut ship = OwnShip::new(&manual_config(), start());
        let (fresh0, fuel0, waste0) = (ship.tank_fresh_water, ship.tank_fuel, ship.tank_waste);
        for _ in 0..100 {
            ship.step(1.0, &mut rng);
        }
        assert!(ship.tank_fresh_water < fresh0);
        assert!(ship.tank_fuel < fuel0);
        assert!(ship.tank_waste > waste0);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        let mut sa = OwnShip::new(&manual_config(), start());
        let mut sb = OwnShip::new(&manual_config(), start());
        for _ in 0..100 {
            sa.step(1.0, &mut a);
            sb.step(1.0, &mut b);
        }
        assert_eq!(sa.lat, sb.lat);
        assert_eq!(sa.lon, sb.lon);
        assert_eq!(sa.sog_kn, sb.sog_kn);
    }

    #[test]
    fn test_magnetic_course() {
        let mut cfg = manual_config();
        cfg.cog_deg = 1.0;
        cfg.magvar_deg = -2.5;
        let ship = OwnShip::new(&cfg, start());
        assert!((ship.cog_mag_deg() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_apparent_wind_triangle() {
        let mut cfg = manual_config();
        cfg.cog_deg = 0.0;
        cfg.sog_kn = 5.0;
        cfg.tws_kn = 10.0;
        cfg.twd_deg = 270.0;
        let ship = OwnShip::new(&cfg, start());
        assert_eq!(ship.twa_deg(), 270.0);
        let (aws, awa) = ship.apparent_wind();
        assert!((aws - 125.0_f64.sqrt()).abs() < 1e-9);
        // Apparent wind pulls forward of the true wind angle
        assert!(awa > 270.0 && awa < 360.0);

        // Head wind: speeds add, angle stays on the bow
        cfg.twd_deg = 0.0;
        let ship = OwnShip::new(&cfg, start());
        let (aws, awa) = ship.apparent_wind();
        assert!((aws - 15.0).abs() < 1e-9);
        assert!(awa.abs() < 1e-9);
    }

    fn timed_track_config() -> SimConfig {
        let gpx = "<gpx><trk><trkseg>\
             <trkpt lat=\"47.0\" lon=\"15.0\"><time>2025-01-01T12:00:00Z</time></trkpt>\
             <trkpt lat=\"47.1\" lon=\"15.0\"><time>2025-01-01T12:10:00Z</time></trkpt>\
             <trkpt lat=\"47.2\" lon=\"15.0\"><time>2025-01-01T12:20:00Z</time></trkpt>\
             </trkseg></trk></gpx>";
        let mut cfg = SimConfig::default();
        cfg.gpx_track = Some(Arc::new(GpxTrack::parse(gpx.as_bytes()).unwrap()));
        cfg.gpx_offset_s = Some(300.0);
        cfg.start_datetime = Some("2025-01-01T12:00:00Z".to_string());
        cfg
    }

    #[test]
    fn test_gpx_timed_playback() {
        let cfg = timed_track_config();
        let track = cfg.gpx_track.clone().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut ship = OwnShip::new(&cfg, start());

        // Initial pose comes from the anchor, not cfg.lat/lon
        let (lat, lon) = track.position_at(300.0);
        assert_eq!((ship.lat, ship.lon), (lat, lon));

        for _ in 0..10 {
            ship.step(1.0, &mut rng);
        }
        let (lat, lon) = track.position_at(310.0);
        assert!((ship.lat - lat).abs() < 1e-12);
        assert!((ship.lon - lon).abs() < 1e-12);
        let (sog, cog) = track.sog_cog_at(310.0);
        assert_eq!(ship.sog_kn, sog);
        assert_eq!(ship.cog_deg, cog);
    }

    #[test]
    fn test_gpx_clamps_at_end() {
        let cfg = timed_track_config();
        let track = cfg.gpx_track.clone().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut ship = OwnShip::new(&cfg, start());
        for _ in 0..2000 {
            ship.step(1.0, &mut rng);
        }
        let last = track.points().last().unwrap();
        assert!((ship.lat - last.lat).abs() < 1e-12);
        assert_eq!(ship.track_progress(), Some(1.0));
    }

    #[test]
    fn test_gpx_untimed_playback() {
        let gpx = "<gpx><trk><trkseg>\
             <trkpt lat=\"47.0\" lon=\"15.0\"/>\
             <trkpt lat=\"48.0\" lon=\"15.0\"/>\
             </trkseg></trk></gpx>";
        let mut cfg = SimConfig::default();
        cfg.gpx_track = Some(Arc::new(GpxTrack::parse(gpx.as_bytes()).unwrap()));
        cfg.gpx_start_fraction = Some(0.0);
        cfg.sog_kn = 6.0;
        let mut rng = StdRng::seed_from_u64(0);
        let mut ship = OwnShip::new(&cfg, start());

        // 6 kn for 600 s is 1 nm along a 60 nm leg
        for _ in 0..600 {
            ship.step(1.0, &mut rng);
        }
        let progress = ship.track_progress().unwrap();
        assert!((progress - 1.0 / 60.0).abs() < 1e-3, "progress {}", progress);
        // Course follows the leg, speed stays configured
        assert!(ship.cog_deg < 0.01 || ship.cog_deg > 359.99);
        assert_eq!(ship.sog_kn, 6.0);
    }
}
