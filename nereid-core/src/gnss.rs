//! GNSS constellation synthesizer.
//!
//! Keeps a persistent set of satellites in view so PRNs stay stable
//! across ticks, with per-tick jitter and slow churn. The derived DOP
//! values are kept mutually consistent (PDOP² = HDOP² + VDOP²) so that
//! GPGGA, GPGSA and GPGSV tell one coherent story.

use rand::rngs::StdRng;
use rand::Rng;

const MIN_SATS_IN_VIEW: usize = 8;
const MAX_SATS_IN_VIEW: usize = 14;
const MIN_SATS_USED: usize = 6;
const MAX_SATS_USED: usize = 10;
/// Probability per tick of swapping one satellite out of the sky.
const CHURN_PROBABILITY: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Satellite {
    pub prn: u16,
    pub elevation_deg: u16,
    pub azimuth_deg: u16,
    pub snr_db: u16,
    pub used: bool,
}

/// Per-tick view of the constellation, copied out for the codec and
/// the status snapshot.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GnssSnapshot {
    pub satellites: Vec<Satellite>,
    pub pdop: f64,
    pub hdop: f64,
    pub vdop: f64,
}

impl GnssSnapshot {
    pub fn sats_in_view(&self) -> usize {
        self.satellites.len()
    }

    pub fn sats_used(&self) -> usize {
        self.satellites.iter().filter(|s| s.used).count()
    }

    /// PRNs used in the fix, at most 12 (the GPGSA field count).
    pub fn used_prns(&self) -> Vec<u16> {
        self.satellites
            .iter()
            .filter(|s| s.used)
            .map(|s| s.prn)
            .take(12)
            .collect()
    }
}

#[derive(Debug)]
pub struct GnssModel {
    satellites: Vec<Satellite>,
    hdop: f64,
    vdop: f64,
}

impl GnssModel {
    pub fn new(rng: &mut StdRng) -> Self {
        let count = rng.gen_range(MIN_SATS_IN_VIEW..=MAX_SATS_IN_VIEW);
        let mut satellites = Vec::with_capacity(count);
        for _ in 0..count {
            let prn = Self::free_prn(&satellites, rng);
            satellites.push(Satellite {
                prn,
                elevation_deg: rng.gen_range(5..=85),
                azimuth_deg: rng.gen_range(0..360),
                snr_db: rng.gen_range(20..=48),
                used: false,
            });
        }
        let mut model = GnssModel {
            satellites,
            hdop: rng.gen_range(0.7..2.0),
            vdop: rng.gen_range(1.0..2.5),
        };
        model.redraw_used(rng);
        model
    }

    /// Advance one tick: jitter every satellite a little, occasionally
    /// swap one out, and random-walk the DOPs.
    pub fn step(&mut self, rng: &mut StdRng) {
        for sat in &mut self.satellites {
            let elev = sat.elevation_deg as i32 + rng.gen_range(-1..=1);
            sat.elevation_deg = elev.clamp(5, 85) as u16;
            let az = sat.azimuth_deg as i32 + rng.gen_range(-2..=2);
            sat.azimuth_deg = az.rem_euclid(360) as u16;
            let snr = sat.snr_db as i32 + rng.gen_range(-1..=1);
            sat.snr_db = snr.clamp(20, 48) as u16;
        }

        if rng.gen_bool(CHURN_PROBABILITY) {
            let idx = rng.gen_range(0..self.satellites.len());
            self.satellites.remove(idx);
            let prn = Self::free_prn(&self.satellites, rng);
            self.satellites.push(Satellite {
                prn,
                elevation_deg: rng.gen_range(5..=15),
                azimuth_deg: rng.gen_range(0..360),
                snr_db: rng.gen_range(20..=30),
                used: false,
            });
            self.redraw_used(rng);
        }

        self.hdop = (self.hdop + rng.gen_range(-0.05..=0.05)).clamp(0.6, 2.5);
        self.vdop = (self.vdop + rng.gen_range(-0.05..=0.05)).clamp(1.0, 3.0);
    }

    pub fn snapshot(&self) -> GnssSnapshot {
        GnssSnapshot {
            satellites: self.satellites.clone(),
            pdop: (self.hdop * self.hdop + self.vdop * self.vdop).sqrt(),
            hdop: self.hdop,
            vdop: self.vdop,
        }
    }

    fn free_prn(satellites: &[Satellite], rng: &mut StdRng) -> u16 {
        loop {
            let prn = rng.gen_range(1..=32);
            if !satellites.iter().any(|s| s.prn == prn) {
                return prn;
            }
        }
    }

    fn redraw_used(&mut self, rng: &mut StdRng) {
        let in_view = self.satellites.len();
        let used = rng.gen_range(MIN_SATS_USED..=MAX_SATS_USED.min(in_view));
        let picks = rand::seq::index::sample(rng, in_view, used);
        for sat in &mut self.satellites {
            sat.used = false;
        }
        for i in picks {
            self.satellites[i].used = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn invariants_hold(snap: &GnssSnapshot) {
        assert!((MIN_SATS_IN_VIEW..=MAX_SATS_IN_VIEW).contains(&snap.sats_in_view()));
        assert!((MIN_SATS_USED..=MAX_SATS_USED).contains(&snap.sats_used()));
        for sat in &snap.satellites {
            assert!((1..=32).contains(&sat.prn));
            assert!((5..=85).contains(&sat.elevation_deg));
            assert!(sat.azimuth_deg < 360);
            assert!((20..=48).contains(&sat.snr_db));
        }
        assert!((0.6..=2.5).contains(&snap.hdop));
        assert!((1.0..=3.0).contains(&snap.vdop));
        let expect = (snap.hdop * snap.hdop + snap.vdop * snap.vdop).sqrt();
        assert!((snap.pdop - expect).abs() < 1e-12);
    }

    #[test]
    fn test_invariants_over_many_ticks() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut model = GnssModel::new(&mut rng);
        for _ in 0..500 {
            model.step(&mut rng);
            invariants_hold(&model.snapshot());
        }
    }

    #[test]
    fn test_prns_unique() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut model = GnssModel::new(&mut rng);
        for _ in 0..200 {
            model.step(&mut rng);
            let snap = model.snapshot();
            let mut prns: Vec<u16> = snap.satellites.iter().map(|s| s.prn).collect();
            prns.sort_unstable();
            prns.dedup();
            assert_eq!(prns.len(), snap.sats_in_view());
        }
    }

    #[test]
    fn test_prns_stable_between_ticks() {
        // Without churn the PRN set must not change; with the churn
        // probability at 2% most consecutive ticks share their set.
        let mut rng = StdRng::seed_from_u64(9);
        let mut model = GnssModel::new(&mut rng);
        let mut unchanged = 0;
        let mut total = 0;
        for _ in 0..300 {
            let before: Vec<u16> = model.snapshot().satellites.iter().map(|s| s.prn).collect();
            model.step(&mut rng);
            let after: Vec<u16> = model.snapshot().satellites.iter().map(|s| s.prn).collect();
            total += 1;
            if before == after {
                unchanged += 1;
            }
        }
        assert!(unchanged * 10 > total * 9, "{}/{} ticks changed PRNs", total - unchanged, total);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let mut ma = GnssModel::new(&mut a);
        let mut mb = GnssModel::new(&mut b);
        for _ in 0..50 {
            ma.step(&mut a);
            mb.step(&mut b);
        }
        assert_eq!(ma.snapshot().satellites, mb.snapshot().satellites);
    }

    #[test]
    fn test_used_prns_capped_at_twelve() {
        let mut rng = StdRng::seed_from_u64(3);
        let model = GnssModel::new(&mut rng);
        assert!(model.snapshot().used_prns().len() <= 12);
    }
}
