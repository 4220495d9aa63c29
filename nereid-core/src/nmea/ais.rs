//! AIS payload construction and AIVDM framing.
//!
//! Messages are assembled bit by bit with [`BitWriter`], armoured into the
//! ITU 6-bit alphabet and wrapped into one or more `!AIVDM` fragments.
//! Only the two message types a Class-B transponder emits are supported:
//! Type 18 (position report) and Type 24 Part A (static data, name).

use super::{checksum, make_sentence};

/// Maximum armoured payload characters per AIVDM fragment.
const MAX_PAYLOAD_CHARS: usize = 60;

/// Course sentinel meaning "not available" (0.1 degree units).
const COG_UNAVAILABLE: u32 = 3600;
/// Speed sentinel meaning "not available" (0.1 knot units).
const SOG_UNAVAILABLE: u32 = 1023;
/// Heading sentinel meaning "not available".
const HEADING_UNAVAILABLE: u32 = 511;

/// MSB-first bit accumulator for AIS payloads.
#[derive(Debug, Default)]
pub struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Append `width` bits of an unsigned value, MSB first.
    pub fn put_u32(&mut self, value: u32, width: usize) {
        debug_assert!(width <= 32);
        debug_assert!(width == 32 || value < (1u32 << width));
        for i in (0..width).rev() {
            self.bits.push(value >> i & 1 == 1);
        }
    }

    /// Append `width` bits of a signed value in two's complement.
    pub fn put_i32(&mut self, value: i32, width: usize) {
        debug_assert!(width <= 32);
        let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
        self.put_u32(value as u32 & mask, width);
    }

    /// Append one character of 6-bit ASCII text.
    ///
    /// Values 0-31 are `@A-Z[\]^_`, values 32-63 are ` !"#$%&'()*+,-./0-9:;<=>?`.
    /// Anything outside that set becomes a space.
    pub fn put_sixbit_char(&mut self, c: char) {
        let c = c.to_ascii_uppercase() as u32;
        let v = match c {
            64..=95 => c - 64,
            32..=63 => c,
            _ => 32,
        };
        self.put_u32(v, 6);
    }

    /// Append a string as 6-bit text, padded with `@` (value 0) or
    /// truncated to exactly `chars` characters.
    pub fn put_sixbit_text(&mut self, text: &str, chars: usize) {
        let mut n = 0;
        for c in text.chars().take(chars) {
            self.put_sixbit_char(c);
            n += 1;
        }
        while n < chars {
            self.put_u32(0, 6);
            n += 1;
        }
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }
}

/// Armour a bit string into the AIVDM payload alphabet.
///
/// Returns the payload characters and the number of fill bits appended
/// to pad the final 6-bit group.
pub fn armor(bits: &[bool]) -> (String, u32) {
    let fill = (6 - bits.len() % 6) % 6;
    let mut payload = String::with_capacity(bits.len() / 6 + 1);
    for group in bits.chunks(6) {
        let mut v = 0u8;
        for (i, bit) in group.iter().enumerate() {
            if *bit {
                v |= 1 << (5 - i);
            }
        }
        payload.push(if v < 40 { (48 + v) as char } else { (56 + v) as char });
    }
    (payload, fill as u32)
}

/// Wrap an armoured payload into `!AIVDM` fragments on channel A.
///
/// Fragments carry at most 60 payload characters; the fill-bit count is
/// only meaningful on the last fragment.
pub fn aivdm_fragments(bits: &[bool]) -> Vec<String> {
    let (payload, fill) = armor(bits);
    let chunks: Vec<&str> = {
        let mut v = Vec::new();
        let mut rest = payload.as_str();
        while rest.len() > MAX_PAYLOAD_CHARS {
            let (head, tail) = rest.split_at(MAX_PAYLOAD_CHARS);
            v.push(head);
            rest = tail;
        }
        v.push(rest);
        v
    };
    let total = chunks.len();
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let frag_fill = if i + 1 == total { fill } else { 0 };
            let body = format!("AIVDM,{},{},,A,{},{}", total, i + 1, chunk, frag_fill);
            format!("!{}*{}\r\n", body, checksum(&body))
        })
        .collect()
}

/// Class-B position report fields.
#[derive(Debug, Clone, Copy)]
pub struct PositionReport {
    pub mmsi: u32,
    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    /// UTC second of the fix, 0-59.
    pub timestamp_s: u32,
}

/// Encode a Type 18 Class-B position report (168 bits, one fragment).
pub fn encode_type18(report: &PositionReport) -> String {
    let mut w = BitWriter::new();
    w.put_u32(18, 6); // message type
    w.put_u32(0, 2); // repeat indicator
    w.put_u32(report.mmsi, 30);
    w.put_u32(0, 8); // regional reserved
    let sog = if report.sog_kn.is_finite() && report.sog_kn >= 0.0 {
        ((report.sog_kn * 10.0).round() as u32).min(1022)
    } else {
        SOG_UNAVAILABLE
    };
    w.put_u32(sog, 10);
    w.put_u32(1, 1); // position accuracy: high
    w.put_i32((report.lon * 600_000.0).round() as i32, 28);
    w.put_i32((report.lat * 600_000.0).round() as i32, 27);
    let cog = ((report.cog_deg * 10.0).round() as u32).min(COG_UNAVAILABLE - 1);
    w.put_u32(cog, 12);
    w.put_u32(HEADING_UNAVAILABLE, 9);
    w.put_u32(report.timestamp_s.min(59), 6);
    w.put_u32(0, 2); // regional reserved
    w.put_u32(1, 1); // Class B CS unit
    w.put_u32(0, 1); // no display
    w.put_u32(0, 1); // no DSC
    w.put_u32(0, 1); // band
    w.put_u32(0, 1); // no message 22 handling
    w.put_u32(0, 1); // autonomous mode
    w.put_u32(0, 1); // RAIM not in use
    w.put_u32(0, 20); // radio status
    debug_assert_eq!(w.len(), 168);

    let mut fragments = aivdm_fragments(w.bits());
    debug_assert_eq!(fragments.len(), 1);
    fragments.remove(0)
}

/// Encode a Type 24 Part A static report carrying the vessel name
/// (exactly 20 six-bit characters, `@`-padded).
pub fn encode_type24a(mmsi: u32, name: &str) -> Vec<String> {
    let mut w = BitWriter::new();
    w.put_u32(24, 6); // message type
    w.put_u32(0, 2); // repeat indicator
    w.put_u32(mmsi, 30);
    w.put_u32(0, 2); // part number A
    w.put_sixbit_text(name, 20);
    debug_assert_eq!(w.len(), 160);

    aivdm_fragments(w.bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Reverse of `armor` for round-trip checks.
    fn dearmor(payload: &str, fill: u32) -> Vec<bool> {
        let mut bits = Vec::new();
        for c in payload.chars() {
            let c = c as u8;
            let v = if c >= 96 { c - 56 } else { c - 48 };
            for i in (0..6).rev() {
                bits.push(v >> i & 1 == 1);
            }
        }
        bits.truncate(bits.len() - fill as usize);
        bits
    }

    /// Minimal MSB-first reader used to parse packed fields back out.
    struct BitReader<'a> {
        bits: &'a [bool],
        pos: usize,
    }

    impl<'a> BitReader<'a> {
        fn new(bits: &'a [bool]) -> Self {
            Self { bits, pos: 0 }
        }

        fn take_u32(&mut self, width: usize) -> u32 {
            let mut v = 0;
            for _ in 0..width {
                v = v << 1 | self.bits[self.pos] as u32;
                self.pos += 1;
            }
            v
        }

        fn take_i32(&mut self, width: usize) -> i32 {
            let v = self.take_u32(width);
            // sign-extend
            if v >> (width - 1) & 1 == 1 {
                (v | !((1u32 << width) - 1)) as i32
            } else {
                v as i32
            }
        }
    }

    fn payload_of(line: &str) -> (String, u32) {
        let body = line.trim_end().split('*').next().unwrap();
        let fields: Vec<&str> = body.split(',').collect();
        (fields[5].to_string(), fields[6].parse().unwrap())
    }

    #[test]
    fn test_armor_round_trip_all_lengths() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in 0..=200 {
            let bits: Vec<bool> = (0..len).map(|_| rng.gen_bool(0.5)).collect();
            let (payload, fill) = armor(&bits);
            assert_eq!(dearmor(&payload, fill), bits, "length {}", len);
        }
    }

    #[test]
    fn test_armor_alphabet() {
        // Every 6-bit value maps into the two ASCII ranges and back
        for v in 0u8..64 {
            let bits: Vec<bool> = (0..6).rev().map(|i| v >> i & 1 == 1).collect();
            let (payload, fill) = armor(&bits);
            assert_eq!(fill, 0);
            let c = payload.as_bytes()[0];
            if v < 40 {
                assert_eq!(c, 48 + v);
            } else {
                assert_eq!(c, 56 + v);
            }
        }
    }

    #[test]
    fn test_type18_round_trip() {
        let report = PositionReport {
            mmsi: 999_000_001,
            lat: 42.715768,
            lon: -16.232173,
            sog_kn: 7.3,
            cog_deg: 185.2,
            timestamp_s: 42,
        };
        let line = encode_type18(&report);
        assert!(line.starts_with("!AIVDM,1,1,,A,"));
        assert!(line.ends_with("\r\n"));

        let (payload, fill) = payload_of(&line);
        assert_eq!(fill, 0);
        let bits = dearmor(&payload, fill);
        assert_eq!(bits.len(), 168);

        let mut r = BitReader::new(&bits);
        assert_eq!(r.take_u32(6), 18);
        assert_eq!(r.take_u32(2), 0);
        assert_eq!(r.take_u32(30), 999_000_001);
        r.take_u32(8);
        assert_eq!(r.take_u32(10), 73); // 7.3 kn in 0.1 kn units
        assert_eq!(r.take_u32(1), 1);
        let lon = r.take_i32(28) as f64 / 600_000.0;
        let lat = r.take_i32(27) as f64 / 600_000.0;
        assert!((lon - report.lon).abs() < 1.0 / 600_000.0 + 1e-9);
        assert!((lat - report.lat).abs() < 1.0 / 600_000.0 + 1e-9);
        assert_eq!(r.take_u32(12), 1852); // 185.2 deg in 0.1 deg units
        assert_eq!(r.take_u32(9), 511); // heading unavailable
        assert_eq!(r.take_u32(6), 42);
    }

    #[test]
    fn test_type18_sog_clamp() {
        let report = PositionReport {
            mmsi: 999_000_002,
            lat: 0.0,
            lon: 0.0,
            sog_kn: 150.0,
            cog_deg: 0.0,
            timestamp_s: 0,
        };
        let (payload, fill) = payload_of(&encode_type18(&report));
        let bits = dearmor(&payload, fill);
        let mut r = BitReader::new(&bits);
        r.take_u32(6 + 2 + 30 + 8);
        assert_eq!(r.take_u32(10), 1022);
    }

    #[test]
    fn test_type24a_name_padding() {
        let lines = encode_type24a(999_000_001, "ORION");
        assert_eq!(lines.len(), 1);
        let (payload, fill) = payload_of(&lines[0]);
        let bits = dearmor(&payload, fill);
        assert_eq!(bits.len(), 160);

        let mut r = BitReader::new(&bits);
        assert_eq!(r.take_u32(6), 24);
        assert_eq!(r.take_u32(2), 0);
        assert_eq!(r.take_u32(30), 999_000_001);
        assert_eq!(r.take_u32(2), 0); // part A
        let expect = b"ORION";
        for i in 0..20 {
            let v = r.take_u32(6);
            if i < expect.len() {
                assert_eq!(v, (expect[i] - 64) as u32, "char {}", i);
            } else {
                assert_eq!(v, 0, "padding at {}", i);
            }
        }
    }

    #[test]
    fn test_long_name_truncated() {
        let lines = encode_type24a(999_000_003, "A VERY LONG VESSEL NAME INDEED");
        let (payload, fill) = payload_of(&lines[0]);
        assert_eq!(dearmor(&payload, fill).len(), 160);
    }

    #[test]
    fn test_multi_fragment_split() {
        // 600 bits armour to 100 characters and must split 60/40
        let mut w = BitWriter::new();
        for i in 0..600 {
            w.put_u32((i % 2) as u32, 1);
        }
        let frags = aivdm_fragments(w.bits());
        assert_eq!(frags.len(), 2);
        assert!(frags[0].starts_with("!AIVDM,2,1,,A,"));
        assert!(frags[1].starts_with("!AIVDM,2,2,,A,"));
        let (p1, f1) = payload_of(&frags[0]);
        let (p2, _) = payload_of(&frags[1]);
        assert_eq!(p1.len(), 60);
        assert_eq!(p2.len(), 40);
        assert_eq!(f1, 0);
    }

    #[test]
    fn test_fragment_checksums() {
        let line = encode_type18(&PositionReport {
            mmsi: 999_000_001,
            lat: 47.0707,
            lon: 15.4395,
            sog_kn: 5.0,
            cog_deg: 45.0,
            timestamp_s: 0,
        });
        let inner = &line[1..line.len() - 5];
        let cs = &line[line.len() - 4..line.len() - 2];
        assert_eq!(checksum(inner), cs);
    }
}
