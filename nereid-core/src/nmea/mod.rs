//! NMEA 0183 sentence construction.
//!
//! Pure formatting, no state. Each builder returns a complete line
//! `$<talker><id>,<fields>*<hh>\r\n` where `<hh>` is the XOR of every
//! byte between `$` and `*` rendered as two uppercase hex digits.
//!
//! Latitude is rendered `DDMM.mmmm` with hemisphere letter, longitude
//! `DDDMM.mmmm`. Times are UTC `HHMMSS.ss`, the GPRMC date is `DDMMYY`.

pub mod ais;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::geo;
use crate::gnss::Satellite;

/// XOR checksum over a sentence body (the bytes between `$`/`!` and `*`).
pub fn checksum(body: &str) -> String {
    let cs = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("{:02X}", cs)
}

/// Wrap a body into a full `$...*hh\r\n` line.
pub fn make_sentence(body: &str) -> String {
    format!("${}*{}\r\n", body, checksum(body))
}

/// Decimal degrees latitude to `DDMM.mmmm,H`.
pub fn format_lat(lat: f64) -> String {
    let hemi = if lat >= 0.0 { 'N' } else { 'S' };
    let abs = lat.abs();
    let degrees = abs.trunc() as u32;
    let minutes = (abs - degrees as f64) * 60.0;
    format!("{:02}{:07.4},{}", degrees, minutes, hemi)
}

/// Decimal degrees longitude to `DDDMM.mmmm,H`.
pub fn format_lon(lon: f64) -> String {
    let hemi = if lon >= 0.0 { 'E' } else { 'W' };
    let abs = lon.abs();
    let degrees = abs.trunc() as u32;
    let minutes = (abs - degrees as f64) * 60.0;
    format!("{:03}{:07.4},{}", degrees, minutes, hemi)
}

/// UTC time of day as `HHMMSS.ss`.
pub fn format_time(t: &DateTime<Utc>) -> String {
    format!(
        "{:02}{:02}{:02}.{:02}",
        t.hour(),
        t.minute(),
        t.second(),
        t.nanosecond() / 10_000_000
    )
}

/// UTC date as `DDMMYY`.
pub fn format_date(t: &DateTime<Utc>) -> String {
    format!("{:02}{:02}{:02}", t.day(), t.month(), t.year() % 100)
}

/// GPRMC - recommended minimum position, velocity and time.
pub fn gprmc(
    time: &DateTime<Utc>,
    lat: f64,
    lon: f64,
    sog_kn: f64,
    cog_deg: f64,
    magvar_deg: f64,
) -> String {
    let var_dir = if magvar_deg >= 0.0 { 'E' } else { 'W' };
    let body = format!(
        "GPRMC,{},A,{},{},{:.1},{:.1},{},{:.1},{},A",
        format_time(time),
        format_lat(lat),
        format_lon(lon),
        sog_kn,
        cog_deg,
        format_date(time),
        magvar_deg.abs(),
        var_dir
    );
    make_sentence(&body)
}

/// GPGGA - fix data. Fix quality is always 1 (GPS fix), altitude is a
/// fixed plausible value; the DGPS fields stay empty.
pub fn gpgga(time: &DateTime<Utc>, lat: f64, lon: f64, sats_used: usize, hdop: f64) -> String {
    let body = format!(
        "GPGGA,{},{},{},1,{:02},{:.1},10.0,M,0.0,M,,",
        format_time(time),
        format_lat(lat),
        format_lon(lon),
        sats_used,
        hdop
    );
    make_sentence(&body)
}

/// GPVTG - track made good and ground speed.
pub fn gpvtg(cog_true_deg: f64, cog_mag_deg: f64, sog_kn: f64) -> String {
    let body = format!(
        "GPVTG,{:.1},T,{:.1},M,{:.1},N,{:.1},K,A",
        cog_true_deg,
        cog_mag_deg,
        sog_kn,
        geo::knots_to_kmh(sog_kn)
    );
    make_sentence(&body)
}

/// GPGSA - DOP and active satellites. Up to 12 used PRNs, automatic
/// 2D/3D selection, 3D fix.
pub fn gpgsa(used_prns: &[u16], pdop: f64, hdop: f64, vdop: f64) -> String {
    let mut fields = Vec::with_capacity(12);
    for prn in used_prns.iter().take(12) {
        fields.push(format!("{:02}", prn));
    }
    while fields.len() < 12 {
        fields.push(String::new());
    }
    let body = format!(
        "GPGSA,A,3,{},{:.1},{:.1},{:.1}",
        fields.join(","),
        pdop,
        hdop,
        vdop
    );
    make_sentence(&body)
}

/// GPGSV - satellites in view, four per sentence.
pub fn gpgsv(satellites: &[Satellite]) -> Vec<String> {
    let total = satellites.len();
    let total_msgs = total.div_ceil(4).max(1);
    let mut sentences = Vec::with_capacity(total_msgs);
    for (i, chunk) in satellites.chunks(4).enumerate() {
        let mut body = format!("GPGSV,{},{},{:02}", total_msgs, i + 1, total);
        for sat in chunk {
            body.push_str(&format!(
                ",{:02},{},{},{}",
                sat.prn, sat.elevation_deg, sat.azimuth_deg, sat.snr_db
            ));
        }
        sentences.push(make_sentence(&body));
    }
    sentences
}

/// WIMWD - true wind direction and speed.
pub fn wimwd(twd_true_deg: f64, twd_mag_deg: f64, tws_kn: f64) -> String {
    let body = format!(
        "WIMWD,{:.1},T,{:.1},M,{:.1},N,{:.1},M",
        twd_true_deg,
        twd_mag_deg,
        tws_kn,
        geo::knots_to_mps(tws_kn)
    );
    make_sentence(&body)
}

/// WIMWV with reference `T`: true wind angle relative to the vessel.
pub fn wimwv_true(angle_deg: f64, tws_kn: f64) -> String {
    let body = format!("WIMWV,{:.1},T,{:.1},N,A", angle_deg, tws_kn);
    make_sentence(&body)
}

/// WIMWV with reference `R`: apparent wind angle and speed.
pub fn wimwv_apparent(awa_deg: f64, aws_kn: f64) -> String {
    let body = format!("WIMWV,{:.1},R,{:.1},N,A", awa_deg, aws_kn);
    make_sentence(&body)
}

/// HCHDT - true heading.
pub fn hchdt(heading_deg: f64) -> String {
    let body = format!("HCHDT,{:.1},T", heading_deg);
    make_sentence(&body)
}

/// SDDPT - depth below transducer plus transducer offset.
pub fn sddpt(depth_m: f64, offset_m: f64) -> String {
    let body = format!("SDDPT,{:.1},{:.1}", depth_m, offset_m);
    make_sentence(&body)
}

/// SDDBT - depth below transducer in feet, metres and fathoms.
pub fn sddbt(depth_m: f64) -> String {
    let body = format!(
        "SDDBT,{:.1},f,{:.1},M,{:.1},F",
        geo::meters_to_feet(depth_m),
        depth_m,
        geo::meters_to_fathoms(depth_m)
    );
    make_sentence(&body)
}

/// WIMTW - water temperature.
pub fn wimtw(temp_c: f64) -> String {
    let body = format!("WIMTW,{:.1},C", temp_c);
    make_sentence(&body)
}

/// IIXDR transducer record for the main battery voltage.
pub fn xdr_battery(volts: f64) -> String {
    let body = format!("IIXDR,U,{:.2},V,MAIN", volts);
    make_sentence(&body)
}

/// IIXDR transducer record for air temperature.
pub fn xdr_air_temp(temp_c: f64) -> String {
    let body = format!("IIXDR,C,{:.1},C,AIR", temp_c);
    make_sentence(&body)
}

/// IIXDR transducer record carrying all three tank levels as percentages.
pub fn xdr_tanks(fresh_water: f64, fuel: f64, waste: f64) -> String {
    let body = format!(
        "IIXDR,V,{:.1},P,FRESHWATER,V,{:.1},P,FUEL,V,{:.1},P,WASTEWATER",
        fresh_water, fuel, waste
    );
    make_sentence(&body)
}
