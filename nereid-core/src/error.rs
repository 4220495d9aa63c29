//! Error types for configuration validation and GPX parsing

use thiserror::Error;

/// Errors raised when a configuration record fails validation.
///
/// These are surfaced to the caller of `start`/`restart` before any
/// state change happens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Latitude outside [-90, 90]
    #[error("Latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside [-180, 180]
    #[error("Longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),

    /// Tick interval must be positive
    #[error("Interval {0}s is not positive")]
    IntervalNotPositive(f64),

    /// Both GPX start anchors were given
    #[error("gpx_offset_s and gpx_start_fraction are mutually exclusive")]
    ContradictoryGpxAnchors,

    /// A GPX anchor was given without a track
    #[error("GPX start anchor given but no track configured")]
    AnchorWithoutTrack,

    /// Time offset anchor on a track without timestamps
    #[error("gpx_offset_s requires a track with per-point times")]
    OffsetOnUntimedTrack,

    /// Fraction anchor on a timed track
    #[error("gpx_start_fraction requires a track without times (use gpx_offset_s)")]
    FractionOnTimedTrack,

    /// Start fraction outside [0, 1]
    #[error("gpx_start_fraction {0} out of range [0, 1]")]
    FractionOutOfRange(f64),

    /// A tank level outside [0, 100]
    #[error("Tank level '{name}' = {value} out of range [0, 100]")]
    TankLevelOutOfRange { name: &'static str, value: f64 },

    /// Negative speed over ground
    #[error("SOG {0} kn is negative")]
    NegativeSog(f64),

    /// Unparsable start datetime
    #[error("Cannot parse start_datetime '{0}'")]
    BadStartDatetime(String),
}

/// Errors raised while parsing a GPX document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpxError {
    /// Malformed XML
    #[error("XML error: {0}")]
    Xml(String),

    /// The document contains no track
    #[error("No <trk> element found")]
    NoTrack,

    /// Fewer than two usable track points
    #[error("Track has {0} points, need at least 2")]
    TooFewPoints(usize),

    /// A trkpt is missing lat or lon, or carries an unparsable value
    #[error("Invalid track point: {0}")]
    InvalidPoint(String),

    /// A <time> element that cannot be parsed as ISO-8601
    #[error("Invalid timestamp '{0}'")]
    InvalidTime(String),

    /// Timed points must be non-decreasing
    #[error("Track timestamps go backwards at point {0}")]
    NonMonotonicTime(usize),
}

impl From<quick_xml::Error> for GpxError {
    fn from(e: quick_xml::Error) -> Self {
        GpxError::Xml(e.to_string())
    }
}
