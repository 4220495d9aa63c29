//! Engine lifecycle: Idle -> Running -> Idle.
//!
//! One engine value owns the whole simulator. `start`/`stop`/`restart`
//! are serialised by an async mutex so rapid repeats behave; `status`
//! and `stream_tail` only take a short std lock to copy state out and
//! never block the scheduler beyond a tick's slack.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use nereid_core::fleet::AisFleet;
use nereid_core::gnss::{GnssModel, GnssSnapshot};
use nereid_core::ownship::OwnShip;
use nereid_core::ring::StreamRing;
use nereid_core::{ConfigError, SimConfig};

use crate::publisher::{ClientRegistry, Publisher};
use crate::scheduler::{self, SimWorker};
use crate::status::{
    AisStatus, FeatureFlags, GpxStatus, OwnShipStatus, StatusSnapshot,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Simulator already running")]
    AlreadyRunning,
    #[error("Simulator not running")]
    NotRunning,
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Socket setup failed: {0}")]
    Bind(#[from] std::io::Error),
}

/// Fields the scheduler copies out after every tick for observers.
#[derive(Debug, Clone)]
pub struct Observed {
    pub sim_time: DateTime<Utc>,
    pub own: OwnShipStatus,
    pub gnss: GnssSnapshot,
    pub contacts: Vec<crate::status::ContactStatus>,
    pub gpx_progress: Option<f64>,
}

/// State shared between the scheduler worker and observers. The mutex
/// is held only while copying in or out.
#[derive(Debug)]
pub struct SharedState {
    pub ring: StreamRing,
    pub observed: Mutex<Observed>,
}

struct Running {
    config: SimConfig,
    shared: Arc<SharedState>,
    clients: ClientRegistry,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    started_at: DateTime<Utc>,
    udp_destination: String,
    tcp_listen: Option<SocketAddr>,
}

pub struct Engine {
    /// Serialises lifecycle transitions.
    lifecycle: tokio::sync::Mutex<()>,
    inner: RwLock<Option<Running>>,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            lifecycle: tokio::sync::Mutex::new(()),
            inner: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.read().unwrap().is_some()
    }

    /// Start from Idle with a validated configuration.
    pub async fn start(&self, config: SimConfig) -> Result<StatusSnapshot, EngineError> {
        let _guard = self.lifecycle.lock().await;
        self.start_locked(config).await
    }

    /// Stop the scheduler, waiting for its current tick to complete.
    pub async fn stop(&self) -> Result<StatusSnapshot, EngineError> {
        let _guard = self.lifecycle.lock().await;
        self.stop_locked().await
    }

    /// `stop` followed by `start`, atomic from the caller's view and
    /// idempotent against rapid repeats.
    pub async fn restart(&self, config: SimConfig) -> Result<StatusSnapshot, EngineError> {
        let _guard = self.lifecycle.lock().await;
        match self.stop_locked().await {
            Ok(_) | Err(EngineError::NotRunning) => {}
            Err(e) => return Err(e),
        }
        self.start_locked(config).await
    }

    async fn start_locked(&self, config: SimConfig) -> Result<StatusSnapshot, EngineError> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }
        config.validate()?;

        // Bind sockets before any state change; a failure leaves Idle
        let publisher = Publisher::bind(&config).await?;
        let udp_destination = publisher.udp_destination().to_string();
        let tcp_listen = publisher.tcp_local_addr();
        let clients = publisher.client_registry();

        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::thread_rng().gen()),
        };
        let started_at = Utc::now();
        let ship = OwnShip::new(&config, started_at);
        let fleet = AisFleet::new(&config, &ship, &mut rng);
        let gnss = GnssModel::new(&mut rng);

        let shared = Arc::new(SharedState {
            ring: StreamRing::default(),
            observed: Mutex::new(Observed {
                sim_time: ship.sim_time,
                own: scheduler::own_ship_status(&ship),
                gnss: gnss.snapshot(),
                contacts: scheduler::contact_statuses(&fleet),
                gpx_progress: ship.track_progress(),
            }),
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = SimWorker::new(
            config.clone(),
            ship,
            fleet,
            gnss,
            rng,
            publisher,
            shared.clone(),
            stop_rx,
        );
        let task = tokio::spawn(worker.run());

        log::info!(
            "Simulator started: UDP {}, TCP {}",
            udp_destination,
            tcp_listen
                .map(|a| a.to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );

        *self.inner.write().unwrap() = Some(Running {
            config,
            shared,
            clients,
            stop_tx,
            task: Some(task),
            started_at,
            udp_destination,
            tcp_listen,
        });

        Ok(self.status())
    }

    async fn stop_locked(&self) -> Result<StatusSnapshot, EngineError> {
        let mut running = self
            .inner
            .write()
            .unwrap()
            .take()
            .ok_or(EngineError::NotRunning)?;

        let _ = running.stop_tx.send(true);
        let grace = Duration::from_secs_f64(running.config.interval_s * 2.0 + 1.0);
        if let Some(mut task) = running.task.take() {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                log::warn!("Scheduler did not stop within {:?}, aborting", grace);
                task.abort();
            }
        }
        // The worker owned the publisher, so its sockets are closed now

        let snapshot = snapshot_of(&running, false);
        log::info!("Simulator stopped");
        Ok(snapshot)
    }

    /// Copy out the current status; callable concurrently with ticks.
    pub fn status(&self) -> StatusSnapshot {
        let inner = self.inner.read().unwrap();
        match &*inner {
            None => StatusSnapshot::idle(0),
            Some(running) => snapshot_of(running, true),
        }
    }

    /// The most recent `limit` emitted lines, oldest first.
    pub fn stream_tail(&self, limit: usize) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        match &*inner {
            None => Vec::new(),
            Some(running) => running.shared.ring.tail(limit),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_of(running: &Running, is_running: bool) -> StatusSnapshot {
    let config = &running.config;
    let observed = running.shared.observed.lock().unwrap().clone();

    let gpx = config.gpx_track.as_ref().map(|track| GpxStatus {
        has_time: track.has_time(),
        length_nm: track.length_nm(),
        duration_s: track.duration_s(),
        progress: observed.gpx_progress.unwrap_or(0.0),
    });

    StatusSnapshot {
        running: is_running,
        udp_destination: Some(running.udp_destination.clone()),
        tcp_listen: running.tcp_listen.map(|a| a.to_string()),
        interval_s: Some(config.interval_s),
        started_at: Some(running.started_at),
        sim_time: Some(observed.sim_time),
        own_ship: Some(observed.own),
        features: Some(FeatureFlags {
            wind: config.wind_enabled,
            heading: config.heading_enabled,
            depth: config.depth_enabled,
            water_temp: config.water_temp_enabled,
            battery: config.battery_enabled,
            air_temp: config.air_temp_enabled,
            tanks: config.tanks_enabled,
        }),
        gnss: Some(observed.gnss),
        ais: Some(AisStatus {
            num_targets: config.ais_num_targets,
            contacts: observed.contacts,
        }),
        gpx,
        tcp_clients: running.clients.snapshot(),
        stream_size: running.shared.ring.len(),
    }
}
