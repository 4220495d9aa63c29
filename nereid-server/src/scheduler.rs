//! Fixed-cadence simulation worker.
//!
//! One task owns all mutable simulation state. Tick k wakes at
//! `t0 + k * interval`; when the wake is late by more than one interval
//! the tick index skips forward instead of bursting, and the simulated
//! clock advances by the intervals actually consumed so it stays equal
//! to wall time rounded down to whole intervals.

use std::sync::Arc;

use chrono::Timelike;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

use nereid_core::fleet::AisFleet;
use nereid_core::gnss::{GnssModel, GnssSnapshot};
use nereid_core::nmea::{self, ais};
use nereid_core::ownship::OwnShip;
use nereid_core::SimConfig;

use crate::engine::SharedState;
use crate::publisher::Publisher;
use crate::status::{ContactStatus, OwnShipStatus};

pub struct SimWorker {
    config: SimConfig,
    ship: OwnShip,
    fleet: AisFleet,
    gnss: GnssModel,
    rng: StdRng,
    publisher: Publisher,
    shared: Arc<SharedState>,
    stop_rx: watch::Receiver<bool>,
}

impl SimWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SimConfig,
        ship: OwnShip,
        fleet: AisFleet,
        gnss: GnssModel,
        rng: StdRng,
        publisher: Publisher,
        shared: Arc<SharedState>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        SimWorker {
            config,
            ship,
            fleet,
            gnss,
            rng,
            publisher,
            shared,
            stop_rx,
        }
    }

    pub async fn run(mut self) {
        let interval_s = self.config.interval_s;
        let t0 = Instant::now();
        let mut k: u64 = 0;
        log::info!("Scheduler started, interval {:.3}s", interval_s);

        loop {
            k += 1;
            let target = t0 + Duration::from_secs_f64(interval_s * k as f64);
            tokio::select! {
                _ = self.stop_rx.changed() => break,
                _ = tokio::time::sleep_until(target) => {}
            }

            let late = Instant::now().saturating_duration_since(target);
            let mut ticks = 1u64;
            if late.as_secs_f64() > interval_s {
                let skipped = (late.as_secs_f64() / interval_s).floor() as u64;
                k += skipped;
                ticks += skipped;
                log::warn!(
                    "Tick deadline missed by {:.3}s, skipping {} ticks",
                    late.as_secs_f64(),
                    skipped
                );
            }

            let dt_s = interval_s * ticks as f64;
            self.ship.step(dt_s, &mut self.rng);
            self.gnss.step(&mut self.rng);
            self.fleet.step(&self.ship, dt_s);

            let gnss = self.gnss.snapshot();
            let lines = build_batch(&self.config, &self.ship, &gnss, &mut self.fleet);
            for line in &lines {
                self.publisher.publish(line).await;
                self.shared.ring.push(line.clone());
            }

            log::debug!(
                "Tick {}: lat={:.4} lon={:.4} sog={:.1}kn cog={:.0} {} lines",
                k,
                self.ship.lat,
                self.ship.lon,
                self.ship.sog_kn,
                self.ship.cog_deg,
                lines.len()
            );

            self.update_observed(gnss);
        }

        log::info!("Scheduler stopped after {} ticks", k);
    }

    fn update_observed(&self, gnss: GnssSnapshot) {
        let mut observed = self.shared.observed.lock().unwrap();
        observed.sim_time = self.ship.sim_time;
        observed.own = own_ship_status(&self.ship);
        observed.gnss = gnss;
        observed.contacts = contact_statuses(&self.fleet);
        observed.gpx_progress = self.ship.track_progress();
    }
}

pub fn own_ship_status(ship: &OwnShip) -> OwnShipStatus {
    OwnShipStatus {
        lat: ship.lat,
        lon: ship.lon,
        sog_kn: ship.sog_kn,
        cog_deg: ship.cog_deg,
        magvar_deg: ship.magvar_deg,
        tws_kn: ship.tws_kn,
        twd_deg: ship.twd_deg,
        depth_m: ship.depth_m,
        water_temp_c: ship.water_temp_c,
        battery_v: ship.battery_v,
        air_temp_c: ship.air_temp_c,
        tank_fresh_water: ship.tank_fresh_water,
        tank_fuel: ship.tank_fuel,
        tank_waste: ship.tank_waste,
    }
}

pub fn contact_statuses(fleet: &AisFleet) -> Vec<ContactStatus> {
    fleet
        .contacts()
        .iter()
        .map(|c| ContactStatus {
            mmsi: c.mmsi,
            name: c.name.clone(),
            lat: c.lat,
            lon: c.lon,
            sog_kn: c.sog_kn,
            cog_deg: c.cog_deg,
        })
        .collect()
}

/// Assemble the ordered sentence batch for one tick.
///
/// Core GNSS sentences always come first so consumers see position
/// before wind and sensors; AIS closes the batch.
pub fn build_batch(
    config: &SimConfig,
    ship: &OwnShip,
    gnss: &GnssSnapshot,
    fleet: &mut AisFleet,
) -> Vec<String> {
    let t = &ship.sim_time;
    let mut lines = Vec::with_capacity(8 + fleet.len());

    lines.push(nmea::gprmc(
        t,
        ship.lat,
        ship.lon,
        ship.sog_kn,
        ship.cog_deg,
        ship.magvar_deg,
    ));
    lines.push(nmea::gpgga(t, ship.lat, ship.lon, gnss.sats_used(), gnss.hdop));
    lines.push(nmea::gpvtg(ship.cog_deg, ship.cog_mag_deg(), ship.sog_kn));
    lines.push(nmea::gpgsa(&gnss.used_prns(), gnss.pdop, gnss.hdop, gnss.vdop));
    lines.extend(nmea::gpgsv(&gnss.satellites));

    if config.heading_enabled {
        // Heading tracks COG; there is no separate heading state
        lines.push(nmea::hchdt(ship.cog_deg));
    }
    if config.wind_enabled {
        lines.push(nmea::wimwd(ship.twd_deg, ship.twd_mag_deg(), ship.tws_kn));
        lines.push(nmea::wimwv_true(ship.twa_deg(), ship.tws_kn));
        let (aws, awa) = ship.apparent_wind();
        lines.push(nmea::wimwv_apparent(awa, aws));
    }
    if config.depth_enabled {
        lines.push(nmea::sddpt(ship.depth_m, ship.depth_offset_m));
        lines.push(nmea::sddbt(ship.depth_m));
    }
    if config.water_temp_enabled {
        lines.push(nmea::wimtw(ship.water_temp_c));
    }
    if config.battery_enabled {
        lines.push(nmea::xdr_battery(ship.battery_v));
    }
    if config.air_temp_enabled {
        lines.push(nmea::xdr_air_temp(ship.air_temp_c));
    }
    if config.tanks_enabled {
        lines.push(nmea::xdr_tanks(
            ship.tank_fresh_water,
            ship.tank_fuel,
            ship.tank_waste,
        ));
    }

    let timestamp_s = ship.sim_time.second();
    for contact in fleet.contacts() {
        lines.push(ais::encode_type18(&ais::PositionReport {
            mmsi: contact.mmsi,
            lat: contact.lat,
            lon: contact.lon,
            sog_kn: contact.sog_kn,
            cog_deg: contact.cog_deg,
            timestamp_s,
        }));
    }
    let sim_time = ship.sim_time;
    for contact in fleet.contacts_mut() {
        if contact.static_report_due(sim_time) {
            lines.extend(ais::encode_type24a(contact.mmsi, &contact.name));
            contact.mark_static_sent(sim_time);
        }
    }

    lines
}
