use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use miette::{miette, Result};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

use nereid_core::{GpxTrack, SimConfig};
use nereid_server::{Engine, EngineError};

#[derive(Parser, Clone, Debug)]
#[command(name = "nereid-server", version, about = "NMEA 0183 / AIS instrument emulator")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// UDP destination host
    #[arg(long, default_value = "127.0.0.1")]
    pub udp_host: String,

    /// UDP destination port
    #[arg(long, default_value_t = 10110)]
    pub udp_port: u16,

    /// TCP listen host
    #[arg(long, default_value = "0.0.0.0")]
    pub tcp_host: String,

    /// TCP listen port, 0 disables the TCP server
    #[arg(long, default_value_t = 10111)]
    pub tcp_port: u16,

    /// Seconds between ticks
    #[arg(short, long, default_value_t = 1.0)]
    pub interval: f64,

    /// Start datetime in ISO format (UTC assumed). Default: real clock
    #[arg(long)]
    pub start_datetime: Option<String>,

    /// Starting latitude
    #[arg(long, default_value_t = 47.0707, allow_hyphen_values = true)]
    pub lat: f64,

    /// Starting longitude
    #[arg(long, default_value_t = 15.4395, allow_hyphen_values = true)]
    pub lon: f64,

    /// Initial speed over ground (knots)
    #[arg(long, default_value_t = 5.0)]
    pub sog: f64,

    /// Initial course over ground (degrees true)
    #[arg(long, default_value_t = 45.0)]
    pub cog: f64,

    /// Magnetic variation (degrees, E positive / W negative)
    #[arg(long, default_value_t = -2.5, allow_hyphen_values = true)]
    pub magvar: f64,

    /// Emit wind sentences (MWD, MWV true and apparent)
    #[arg(long)]
    pub wind: bool,

    /// Initial true wind speed (knots)
    #[arg(long, default_value_t = 10.0)]
    pub tws: f64,

    /// Initial true wind direction (degrees true)
    #[arg(long, default_value_t = 270.0)]
    pub twd: f64,

    /// Emit heading (HDT)
    #[arg(long)]
    pub heading: bool,

    /// Emit depth sentences (DPT, DBT)
    #[arg(long)]
    pub depth: bool,

    /// Emit water temperature (MTW)
    #[arg(long)]
    pub water_temp: bool,

    /// Emit battery voltage (XDR)
    #[arg(long)]
    pub battery: bool,

    /// Emit air temperature (XDR)
    #[arg(long)]
    pub air_temp: bool,

    /// Emit tank levels (XDR)
    #[arg(long)]
    pub tanks: bool,

    /// Number of simulated AIS contacts
    #[arg(long, default_value_t = 0)]
    pub ais_targets: usize,

    /// Radius around own-ship for AIS contact placement (nm)
    #[arg(long, default_value_t = 1.0)]
    pub ais_radius: f64,

    /// GPX file to play back instead of the random-walk model
    #[arg(long)]
    pub gpx: Option<PathBuf>,

    /// Playback start offset into a timed GPX track (seconds)
    #[arg(long)]
    pub gpx_offset: Option<f64>,

    /// Playback start fraction on an untimed GPX track (0..1)
    #[arg(long)]
    pub gpx_start_fraction: Option<f64>,

    /// Seed for the jitter RNG, for reproducible streams
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    fn to_config(&self) -> Result<SimConfig> {
        let mut config = SimConfig {
            udp_host: self.udp_host.clone(),
            udp_port: self.udp_port,
            tcp_host: self.tcp_host.clone(),
            tcp_port: self.tcp_port,
            interval_s: self.interval,
            start_datetime: self.start_datetime.clone(),
            lat: self.lat,
            lon: self.lon,
            sog_kn: self.sog,
            cog_deg: self.cog,
            magvar_deg: self.magvar,
            wind_enabled: self.wind,
            tws_kn: self.tws,
            twd_deg: self.twd,
            heading_enabled: self.heading,
            depth_enabled: self.depth,
            water_temp_enabled: self.water_temp,
            battery_enabled: self.battery,
            air_temp_enabled: self.air_temp,
            tanks_enabled: self.tanks,
            ais_num_targets: self.ais_targets,
            ais_distribution_radius_nm: self.ais_radius,
            gpx_offset_s: self.gpx_offset,
            gpx_start_fraction: self.gpx_start_fraction,
            rng_seed: self.seed,
            ..SimConfig::default()
        };

        if let Some(path) = &self.gpx {
            let bytes = std::fs::read(path)
                .map_err(|e| miette!("Cannot read GPX file {}: {}", path.display(), e))?;
            let track = GpxTrack::parse(&bytes)
                .map_err(|e| miette!("Cannot parse GPX file {}: {}", path.display(), e))?;
            config.gpx_track = Some(std::sync::Arc::new(track));
        }

        config.validate().map_err(|e| miette!("{}", e))?;
        Ok(config)
    }
}

async fn run_emulator(subsys: SubsystemHandle, config: SimConfig) -> Result<(), EngineError> {
    let engine = Engine::new();
    engine.start(config).await?;

    subsys.on_shutdown_requested().await;
    let _ = engine.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    log::info!("nereid-server {}", nereid_server::VERSION);
    let config = args.to_config()?;

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("Emulator", move |subsys| {
            run_emulator(subsys, config)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .map_err(|e| miette!("{}", e))
}
