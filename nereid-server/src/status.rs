//! Snapshot types returned to the control plane.
//!
//! Everything here is an immutable copy produced under a short-lived
//! lock; no reference to live simulation state escapes the engine.

use chrono::{DateTime, Utc};
use nereid_core::gnss::GnssSnapshot;
use serde::Serialize;

/// One TCP consumer, for status reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpClientInfo {
    pub remote: String,
    pub connected_at: DateTime<Utc>,
    /// Lines dropped for this client because its queue overflowed.
    pub dropped_lines: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnShipStatus {
    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    pub magvar_deg: f64,
    pub tws_kn: f64,
    pub twd_deg: f64,
    pub depth_m: f64,
    pub water_temp_c: f64,
    pub battery_v: f64,
    pub air_temp_c: f64,
    pub tank_fresh_water: f64,
    pub tank_fuel: f64,
    pub tank_waste: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub wind: bool,
    pub heading: bool,
    pub depth: bool,
    pub water_temp: bool,
    pub battery: bool,
    pub air_temp: bool,
    pub tanks: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactStatus {
    pub mmsi: u32,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AisStatus {
    pub num_targets: usize,
    pub contacts: Vec<ContactStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpxStatus {
    pub has_time: bool,
    pub length_nm: f64,
    pub duration_s: f64,
    /// Playback progress in [0, 1].
    pub progress: f64,
}

/// Full engine status. When the engine is idle only `running` and
/// `stream_size` carry information.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp_destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_listen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_ship: Option<OwnShipStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureFlags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gnss: Option<GnssSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ais: Option<AisStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpx: Option<GpxStatus>,
    pub tcp_clients: Vec<TcpClientInfo>,
    pub stream_size: usize,
}

impl StatusSnapshot {
    pub fn idle(stream_size: usize) -> Self {
        StatusSnapshot {
            running: false,
            udp_destination: None,
            tcp_listen: None,
            interval_s: None,
            started_at: None,
            sim_time: None,
            own_ship: None,
            features: None,
            gnss: None,
            ais: None,
            gpx: None,
            tcp_clients: Vec::new(),
            stream_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_idle_snapshot_serializes_compactly() {
        let json = serde_json::to_value(StatusSnapshot::idle(0)).unwrap();
        assert_eq!(json["running"], false);
        assert_eq!(json["streamSize"], 0);
        // Absent sections are omitted entirely, not null
        assert!(json.get("ownShip").is_none());
        assert!(json.get("gnss").is_none());
    }

    #[test]
    fn test_client_info_field_names() {
        let info = TcpClientInfo {
            remote: "10.0.0.2:4711".to_string(),
            connected_at: Utc::now(),
            dropped_lines: 3,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["remote"], "10.0.0.2:4711");
        assert_eq!(json["droppedLines"], 3);
        assert!(json["connectedAt"].as_str().unwrap().contains('T'));
    }
}
