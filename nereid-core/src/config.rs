//! Simulator configuration record.
//!
//! A [`SimConfig`] is handed atomically to `start`/`restart` and never
//! mutated in place. The control plane deserializes it from JSON (all
//! fields have defaults), attaches a parsed GPX track if one was
//! uploaded, and calls [`SimConfig::validate`] before use.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gpx::GpxTrack;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// UDP destination host. `0.0.0.0` or empty normalises to loopback.
    pub udp_host: String,
    pub udp_port: u16,
    /// TCP listen host. Unlike the UDP destination, `0.0.0.0` here means
    /// bind all interfaces.
    pub tcp_host: String,
    /// TCP listen port; 0 disables the TCP server.
    pub tcp_port: u16,

    /// Tick interval in seconds.
    pub interval_s: f64,
    /// ISO-8601 start instant for the simulated clock; UTC assumed when
    /// no timezone is given. None means the real clock at start.
    pub start_datetime: Option<String>,

    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    pub magvar_deg: f64,

    pub wind_enabled: bool,
    pub tws_kn: f64,
    pub twd_deg: f64,

    pub heading_enabled: bool,

    pub depth_enabled: bool,
    pub depth_m: f64,
    pub depth_offset_m: f64,
    pub water_temp_enabled: bool,
    pub water_temp_c: f64,
    pub battery_enabled: bool,
    pub battery_v: f64,
    pub air_temp_enabled: bool,
    pub air_temp_c: f64,
    pub tanks_enabled: bool,
    pub tank_fresh_water: f64,
    pub tank_fuel: f64,
    pub tank_waste: f64,

    pub ais_num_targets: usize,
    pub ais_max_cog_offset: f64,
    pub ais_max_sog_offset: f64,
    pub ais_distribution_radius_nm: f64,
    /// Overrides the built-in vessel-name pool when non-empty.
    pub ais_name_pool: Vec<String>,

    /// Parsed GPX track, attached by the control plane after upload.
    #[serde(skip)]
    pub gpx_track: Option<Arc<GpxTrack>>,
    /// Start anchor for timed tracks: seconds past the track start.
    pub gpx_offset_s: Option<f64>,
    /// Start anchor for untimed tracks: arc-length fraction in [0, 1].
    pub gpx_start_fraction: Option<f64>,

    /// Seed for the jitter RNG. None draws from entropy; tests pass a
    /// fixed seed for reproducible streams.
    pub rng_seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            udp_host: "127.0.0.1".to_string(),
            udp_port: 10110,
            tcp_host: "0.0.0.0".to_string(),
            tcp_port: 10111,
            interval_s: 1.0,
            start_datetime: None,
            lat: 47.0707,
            lon: 15.4395,
            sog_kn: 5.0,
            cog_deg: 45.0,
            magvar_deg: -2.5,
            wind_enabled: false,
            tws_kn: 10.0,
            twd_deg: 270.0,
            heading_enabled: false,
            depth_enabled: false,
            depth_m: 12.0,
            depth_offset_m: 0.5,
            water_temp_enabled: false,
            water_temp_c: 18.0,
            battery_enabled: false,
            battery_v: 12.6,
            air_temp_enabled: false,
            air_temp_c: 21.0,
            tanks_enabled: false,
            tank_fresh_water: 80.0,
            tank_fuel: 65.0,
            tank_waste: 20.0,
            ais_num_targets: 0,
            ais_max_cog_offset: 20.0,
            ais_max_sog_offset: 2.0,
            ais_distribution_radius_nm: 1.0,
            ais_name_pool: Vec::new(),
            gpx_track: None,
            gpx_offset_s: None,
            gpx_start_fraction: None,
            rng_seed: None,
        }
    }
}

impl SimConfig {
    /// Validate the record. Returns the first violation found; a failed
    /// validation must leave the engine untouched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ConfigError::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(ConfigError::LongitudeOutOfRange(self.lon));
        }
        if !(self.interval_s > 0.0) || !self.interval_s.is_finite() {
            return Err(ConfigError::IntervalNotPositive(self.interval_s));
        }
        if self.sog_kn < 0.0 {
            return Err(ConfigError::NegativeSog(self.sog_kn));
        }
        if let Some(raw) = &self.start_datetime {
            if parse_start_datetime(raw).is_none() {
                return Err(ConfigError::BadStartDatetime(raw.clone()));
            }
        }

        for (name, value) in [
            ("fresh_water", self.tank_fresh_water),
            ("fuel", self.tank_fuel),
            ("waste", self.tank_waste),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::TankLevelOutOfRange { name, value });
            }
        }

        match (&self.gpx_track, self.gpx_offset_s, self.gpx_start_fraction) {
            (_, Some(_), Some(_)) => return Err(ConfigError::ContradictoryGpxAnchors),
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(ConfigError::AnchorWithoutTrack)
            }
            (Some(track), Some(_), None) if !track.has_time() => {
                return Err(ConfigError::OffsetOnUntimedTrack)
            }
            (Some(track), None, Some(_)) if track.has_time() => {
                return Err(ConfigError::FractionOnTimedTrack)
            }
            (Some(_), None, Some(f)) if !(0.0..=1.0).contains(&f) => {
                return Err(ConfigError::FractionOutOfRange(f))
            }
            _ => {}
        }

        Ok(())
    }

    /// Resolved start instant of the simulated clock. Call after
    /// `validate`; an unparsable string yields None here.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_datetime.as_deref().and_then(parse_start_datetime)
    }

    /// Whether the TCP fan-out server is enabled.
    pub fn tcp_enabled(&self) -> bool {
        self.tcp_port > 0
    }

    /// UDP destination with the loopback normalisation applied.
    pub fn udp_destination(&self) -> (String, u16) {
        let host = if self.udp_host.is_empty() || self.udp_host == "0.0.0.0" {
            "127.0.0.1".to_string()
        } else {
            self.udp_host.clone()
        };
        (host, self.udp_port)
    }
}

/// Parse an ISO-8601 instant, assuming UTC when the timezone is absent.
fn parse_start_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpx::GpxTrack;

    fn untimed_track() -> Arc<GpxTrack> {
        let gpx = "<gpx><trk><trkseg>\
             <trkpt lat=\"47.0\" lon=\"15.0\"/><trkpt lat=\"47.1\" lon=\"15.0\"/>\
             </trkseg></trk></gpx>";
        Arc::new(GpxTrack::parse(gpx.as_bytes()).unwrap())
    }

    fn timed_track() -> Arc<GpxTrack> {
        let gpx = "<gpx><trk><trkseg>\
             <trkpt lat=\"47.0\" lon=\"15.0\"><time>2025-01-01T12:00:00Z</time></trkpt>\
             <trkpt lat=\"47.1\" lon=\"15.0\"><time>2025-01-01T12:10:00Z</time></trkpt>\
             </trkseg></trk></gpx>";
        Arc::new(GpxTrack::parse(gpx.as_bytes()).unwrap())
    }

    #[test]
    fn test_defaults_validate() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_deserialize_partial() {
        let cfg: SimConfig =
            serde_json::from_str(r#"{"udp_port": 2000, "wind_enabled": true}"#).unwrap();
        assert_eq!(cfg.udp_port, 2000);
        assert!(cfg.wind_enabled);
        assert_eq!(cfg.interval_s, 1.0);
        assert_eq!(cfg.tcp_port, 10111);
    }

    #[test]
    fn test_invalid_ranges() {
        let mut cfg = SimConfig::default();
        cfg.lat = 91.0;
        assert_eq!(cfg.validate(), Err(ConfigError::LatitudeOutOfRange(91.0)));

        let mut cfg = SimConfig::default();
        cfg.interval_s = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::IntervalNotPositive(0.0)));

        let mut cfg = SimConfig::default();
        cfg.tank_fuel = 101.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TankLevelOutOfRange { name: "fuel", .. })
        ));
    }

    #[test]
    fn test_gpx_anchor_rules() {
        let mut cfg = SimConfig::default();
        cfg.gpx_offset_s = Some(10.0);
        cfg.gpx_start_fraction = Some(0.5);
        assert_eq!(cfg.validate(), Err(ConfigError::ContradictoryGpxAnchors));

        let mut cfg = SimConfig::default();
        cfg.gpx_offset_s = Some(10.0);
        assert_eq!(cfg.validate(), Err(ConfigError::AnchorWithoutTrack));

        let mut cfg = SimConfig::default();
        cfg.gpx_track = Some(untimed_track());
        cfg.gpx_offset_s = Some(10.0);
        assert_eq!(cfg.validate(), Err(ConfigError::OffsetOnUntimedTrack));

        let mut cfg = SimConfig::default();
        cfg.gpx_track = Some(timed_track());
        cfg.gpx_start_fraction = Some(0.5);
        assert_eq!(cfg.validate(), Err(ConfigError::FractionOnTimedTrack));

        let mut cfg = SimConfig::default();
        cfg.gpx_track = Some(untimed_track());
        cfg.gpx_start_fraction = Some(1.5);
        assert_eq!(cfg.validate(), Err(ConfigError::FractionOutOfRange(1.5)));

        // Anchors matching the track type pass
        let mut cfg = SimConfig::default();
        cfg.gpx_track = Some(timed_track());
        cfg.gpx_offset_s = Some(300.0);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_start_datetime_parsing() {
        let mut cfg = SimConfig::default();
        cfg.start_datetime = Some("2025-01-01T12:00:00Z".to_string());
        assert_eq!(cfg.validate(), Ok(()));
        assert!(cfg.start_time().is_some());

        // No timezone: UTC assumed
        cfg.start_datetime = Some("2025-01-01T12:00:00".to_string());
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(
            cfg.start_time().unwrap().to_rfc3339(),
            "2025-01-01T12:00:00+00:00"
        );

        cfg.start_datetime = Some("noonish".to_string());
        assert!(matches!(cfg.validate(), Err(ConfigError::BadStartDatetime(_))));
    }

    #[test]
    fn test_udp_destination_normalisation() {
        let mut cfg = SimConfig::default();
        cfg.udp_host = "0.0.0.0".to_string();
        assert_eq!(cfg.udp_destination().0, "127.0.0.1");
        cfg.udp_host = String::new();
        assert_eq!(cfg.udp_destination().0, "127.0.0.1");
        cfg.udp_host = "192.168.1.50".to_string();
        assert_eq!(cfg.udp_destination().0, "192.168.1.50");
    }
}
