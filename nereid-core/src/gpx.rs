//! GPX track timeline.
//!
//! The control plane reads the file; this module parses the raw bytes and
//! produces an immutable [`GpxTrack`] with interpolation queries. Only the
//! first `<trk>` is used; its track segments are concatenated.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::GpxError;
use crate::geo;

/// Maximum plausible segment-derived speed in knots.
const MAX_SEGMENT_SOG_KN: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub time: Option<DateTime<Utc>>,
}

/// A parsed, validated track. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct GpxTrack {
    points: Vec<TrackPoint>,
    /// Cumulative great-circle arc length in nm, same length as `points`.
    cum_nm: Vec<f64>,
    length_nm: f64,
    has_time: bool,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    duration_s: f64,
}

impl GpxTrack {
    /// Parse a GPX document from a byte buffer.
    ///
    /// Rejects documents without a track or with fewer than two track
    /// points. `has_time` is set iff every point carries a timestamp;
    /// timestamps must be non-decreasing.
    pub fn parse(bytes: &[u8]) -> Result<Self, GpxError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut points: Vec<TrackPoint> = Vec::new();
        let mut saw_trk = false;
        let mut in_trk = false;
        let mut in_trkpt = false;
        let mut in_time = false;
        let mut pending: Option<TrackPoint> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"trk" if !saw_trk => {
                        saw_trk = true;
                        in_trk = true;
                    }
                    b"trkpt" if in_trk => {
                        in_trkpt = true;
                        pending = Some(Self::point_from_attrs(&e)?);
                    }
                    b"time" if in_trkpt => {
                        in_time = true;
                    }
                    _ => {}
                },
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"trkpt" && in_trk {
                        points.push(Self::point_from_attrs(&e)?);
                    }
                }
                Event::Text(t) if in_time => {
                    let raw = t.unescape()?.into_owned();
                    let parsed = DateTime::parse_from_rfc3339(&raw)
                        .map_err(|_| GpxError::InvalidTime(raw))?;
                    if let Some(p) = pending.as_mut() {
                        p.time = Some(parsed.with_timezone(&Utc));
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"trk" => in_trk = false,
                    b"trkpt" => {
                        in_trkpt = false;
                        if let Some(p) = pending.take() {
                            points.push(p);
                        }
                    }
                    b"time" => in_time = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_trk {
            return Err(GpxError::NoTrack);
        }
        if points.len() < 2 {
            return Err(GpxError::TooFewPoints(points.len()));
        }

        let has_time = points.iter().all(|p| p.time.is_some());
        if has_time {
            for i in 1..points.len() {
                if points[i].time < points[i - 1].time {
                    return Err(GpxError::NonMonotonicTime(i));
                }
            }
        }

        let mut cum_nm = Vec::with_capacity(points.len());
        cum_nm.push(0.0);
        for i in 1..points.len() {
            let d = geo::distance_nm(
                points[i - 1].lat,
                points[i - 1].lon,
                points[i].lat,
                points[i].lon,
            );
            cum_nm.push(cum_nm[i - 1] + d);
        }
        let length_nm = *cum_nm.last().unwrap();

        let (start_time, end_time, duration_s) = if has_time {
            let start = points.first().unwrap().time.unwrap();
            let end = points.last().unwrap().time.unwrap();
            let dur = (end - start).num_milliseconds() as f64 / 1000.0;
            (Some(start), Some(end), dur)
        } else {
            (None, None, 0.0)
        };

        Ok(GpxTrack {
            points,
            cum_nm,
            length_nm,
            has_time,
            start_time,
            end_time,
            duration_s,
        })
    }

    fn point_from_attrs(e: &quick_xml::events::BytesStart) -> Result<TrackPoint, GpxError> {
        let mut lat = None;
        let mut lon = None;
        for attr in e.attributes().with_checks(false).flatten() {
            let value = String::from_utf8_lossy(&attr.value).into_owned();
            match attr.key.local_name().as_ref() {
                b"lat" => {
                    lat = Some(value.parse::<f64>().map_err(|_| {
                        GpxError::InvalidPoint(format!("bad lat '{}'", value))
                    })?)
                }
                b"lon" => {
                    lon = Some(value.parse::<f64>().map_err(|_| {
                        GpxError::InvalidPoint(format!("bad lon '{}'", value))
                    })?)
                }
                _ => {}
            }
        }
        match (lat, lon) {
            (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) => Ok(TrackPoint {
                lat,
                lon: geo::wrap_longitude(lon),
                time: None,
            }),
            (Some(lat), Some(_)) => Err(GpxError::InvalidPoint(format!("lat {} out of range", lat))),
            _ => Err(GpxError::InvalidPoint("missing lat or lon".into())),
        }
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn length_nm(&self) -> f64 {
        self.length_nm
    }

    pub fn has_time(&self) -> bool {
        self.has_time
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// Position `offset_s` seconds after the track start (timed tracks).
    ///
    /// Binary search on the time axis, linear interpolation between the
    /// bracketing points. Offsets outside [0, duration] clamp to the ends.
    pub fn position_at(&self, offset_s: f64) -> (f64, f64) {
        debug_assert!(self.has_time);
        let start = match self.start_time {
            Some(t) => t,
            None => return (self.points[0].lat, self.points[0].lon),
        };
        let offset = offset_s.clamp(0.0, self.duration_s);

        let secs_of = |p: &TrackPoint| -> f64 {
            (p.time.unwrap() - start).num_milliseconds() as f64 / 1000.0
        };

        // First point with time > offset; the segment is [i-1, i]
        let i = self.points.partition_point(|p| secs_of(p) <= offset);
        if i == 0 {
            return (self.points[0].lat, self.points[0].lon);
        }
        if i >= self.points.len() {
            let p = self.points.last().unwrap();
            return (p.lat, p.lon);
        }
        let a = &self.points[i - 1];
        let b = &self.points[i];
        let ta = secs_of(a);
        let tb = secs_of(b);
        if tb <= ta {
            return (a.lat, a.lon);
        }
        let t = (offset - ta) / (tb - ta);
        (a.lat + (b.lat - a.lat) * t, a.lon + (b.lon - a.lon) * t)
    }

    /// Position at an arc-length fraction of the whole track, `f` in [0, 1].
    pub fn position_at_fraction(&self, f: f64) -> (f64, f64) {
        self.position_at_index(self.index_at_fraction(f))
    }

    /// Position at a fractional point index, e.g. 2.5 is halfway between
    /// point 2 and point 3. Clamped to the track.
    pub fn position_at_index(&self, index: f64) -> (f64, f64) {
        let max = (self.points.len() - 1) as f64;
        let idx = index.clamp(0.0, max);
        let i = idx.trunc() as usize;
        let t = idx - i as f64;
        if t == 0.0 || i + 1 >= self.points.len() {
            return (self.points[i].lat, self.points[i].lon);
        }
        let a = &self.points[i];
        let b = &self.points[i + 1];
        (a.lat + (b.lat - a.lat) * t, a.lon + (b.lon - a.lon) * t)
    }

    /// Fractional point index at an arc-length fraction `f` in [0, 1].
    pub fn index_at_fraction(&self, f: f64) -> f64 {
        let target = f.clamp(0.0, 1.0) * self.length_nm;
        let i = self.cum_nm.partition_point(|&d| d <= target);
        if i == 0 {
            return 0.0;
        }
        if i >= self.points.len() {
            return (self.points.len() - 1) as f64;
        }
        let seg = self.cum_nm[i] - self.cum_nm[i - 1];
        if seg <= 0.0 {
            return (i - 1) as f64;
        }
        (i - 1) as f64 + (target - self.cum_nm[i - 1]) / seg
    }

    /// Segment-derived speed and course at a time offset (timed tracks):
    /// segment distance over segment duration, clamped to a plausible
    /// maximum, and the initial bearing of the segment.
    pub fn sog_cog_at(&self, offset_s: f64) -> (f64, f64) {
        debug_assert!(self.has_time);
        let start = match self.start_time {
            Some(t) => t,
            None => return (0.0, 0.0),
        };
        let offset = offset_s.clamp(0.0, self.duration_s);
        let secs_of = |p: &TrackPoint| -> f64 {
            (p.time.unwrap() - start).num_milliseconds() as f64 / 1000.0
        };
        let i = self
            .points
            .partition_point(|p| secs_of(p) <= offset)
            .clamp(1, self.points.len() - 1);
        let a = &self.points[i - 1];
        let b = &self.points[i];
        let dur_s = secs_of(b) - secs_of(a);
        let dist = geo::distance_nm(a.lat, a.lon, b.lat, b.lon);
        let sog = if dur_s > 0.0 {
            (dist / (dur_s / 3600.0)).min(MAX_SEGMENT_SOG_KN)
        } else {
            0.0
        };
        (sog, geo::initial_bearing(a.lat, a.lon, b.lat, b.lon))
    }

    /// Bearing of the segment enclosing an arc-length fraction.
    pub fn cog_at_fraction(&self, f: f64) -> f64 {
        let idx = self.index_at_fraction(f);
        let i = (idx.trunc() as usize).min(self.points.len() - 2);
        let a = &self.points[i];
        let b = &self.points[i + 1];
        geo::initial_bearing(a.lat, a.lon, b.lat, b.lon)
    }
}
