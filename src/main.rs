//! IAQ Monitor CLI
//!
//! Indoor air quality ingest server, simulator and local tools.

use anyhow::Context;
use clap::{Parser, Subcommand};
use iaq_monitor::{
    config::Config,
    core::{Category, Classifier, ExposureWindow},
    ingest::{Ingestor, SeedRequest},
    store::{ReadingQuery, Store},
    VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "iaq")]
#[command(version = VERSION)]
#[command(about = "Indoor air quality monitor (PM2.5, CPCB AQI)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP ingest and query server
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Post simulated readings to a running server
    Simulate {
        /// Base URL of the ingest API
        #[arg(long)]
        api: Option<String>,

        /// Seconds between posts
        #[arg(long)]
        period: Option<f64>,

        /// Jitter as a fraction of the period
        #[arg(long)]
        jitter: Option<f64>,

        /// Site to tag readings with
        #[arg(long)]
        site: Option<String>,
    },

    /// Backfill synthetic history into the local database
    Seed {
        /// Hours of history to generate
        #[arg(long, default_value = "24")]
        hours: u32,

        /// Site to seed
        #[arg(long)]
        site: Option<String>,

        /// Seconds between seeded readings
        #[arg(long, default_value = "60")]
        period_seconds: u32,

        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Classify a PM2.5 concentration (µg/m³)
    Classify {
        /// Concentration in µg/m³
        value: f64,
    },

    /// Show minutes per AQI category from the local database
    Exposure {
        /// Look-back window (e.g. 30m, 24h, 7d)
        #[arg(long)]
        window: Option<String>,

        /// Restrict to one site
        #[arg(long)]
        site: Option<String>,

        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show database status and the latest reading
    Status {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show configuration
    Config,

    /// Delete readings and events
    Reset {
        /// Only delete data for this site
        #[arg(long)]
        site: Option<String>,

        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config ({e}), using defaults");
        let mut config = Config::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    });

    match cli.command {
        Commands::Serve { port, host, db } => cmd_serve(config, port, host, db).await,
        Commands::Simulate {
            api,
            period,
            jitter,
            site,
        } => cmd_simulate(config, api, period, jitter, site).await,
        Commands::Seed {
            hours,
            site,
            period_seconds,
            db,
        } => cmd_seed(config, hours, site, period_seconds, db).await,
        Commands::Classify { value } => {
            cmd_classify(value);
            Ok(())
        }
        Commands::Exposure { window, site, db } => cmd_exposure(config, window, site, db).await,
        Commands::Status { db } => cmd_status(config, db).await,
        Commands::Config => {
            cmd_config(&config);
            Ok(())
        }
        Commands::Reset { site, db } => cmd_reset(config, site, db).await,
    }
}

fn open_store(config: &Config, db: Option<PathBuf>) -> anyhow::Result<Store> {
    let path = db.unwrap_or_else(|| config.db_path.clone());
    Store::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn ingestor(config: &Config, db: Option<PathBuf>) -> anyhow::Result<Ingestor> {
    Ok(Ingestor::new(open_store(config, db)?, Classifier::cpcb_pm25())
        .with_default_site(config.default_site.clone()))
}

#[cfg(feature = "server")]
async fn cmd_serve(
    config: Config,
    port: Option<u16>,
    host: Option<String>,
    db: Option<PathBuf>,
) -> anyhow::Result<()> {
    use iaq_monitor::server::{self, ServerConfig};

    println!("IAQ Monitor v{VERSION}");
    println!();

    let ingestor = ingestor(&config, db)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let server_config = ServerConfig {
        host: host
            .parse()
            .with_context(|| format!("Invalid bind address '{host}'"))?,
        port: port.unwrap_or(config.server.port),
        default_window: config.default_window.clone(),
    };

    println!("  Database: {}", ingestor.store().path().display());
    let (addr, shutdown) = server::run(server_config, ingestor).await?;
    println!("  Listening on http://{addr}");
    println!();
    println!("Press Ctrl+C to stop");

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    println!();
    println!("Stopping server...");
    let _ = shutdown.send(());
    // Let in-flight requests drain.
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn cmd_serve(
    _config: Config,
    _port: Option<u16>,
    _host: Option<String>,
    _db: Option<PathBuf>,
) -> anyhow::Result<()> {
    eprintln!("Error: serve requires the server feature (not enabled at compile time)");
    std::process::exit(1);
}

#[cfg(feature = "simulator")]
async fn cmd_simulate(
    config: Config,
    api: Option<String>,
    period: Option<f64>,
    jitter: Option<f64>,
    site: Option<String>,
) -> anyhow::Result<()> {
    use iaq_monitor::simulator::{SimulatorClient, SimulatorConfig};

    let period = match period {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .with_context(|| format!("Invalid period '{secs}'"))?,
        None => config.simulator.period,
    };
    let sim_config = SimulatorConfig {
        api: api.unwrap_or_else(|| config.simulator.api.clone()),
        period,
        jitter: jitter.unwrap_or(config.simulator.jitter),
        site: site.filter(|s| !s.is_empty()),
    };
    let client = SimulatorClient::new(sim_config)?;

    println!("IAQ Simulator v{VERSION}");
    println!("  API: {}", client.config().api);
    println!("  Source: {}", client.source());
    println!("  Period: {:.1}s", client.config().period.as_secs_f64());

    match client.test_connection().await {
        Ok(true) => println!("  API connection: OK"),
        Ok(false) => eprintln!("Warning: API health check failed"),
        Err(e) => eprintln!("Warning: Could not connect to API: {e}"),
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;
    let accepted = client.run(running).await;

    println!();
    println!("Posted {accepted} readings");
    Ok(())
}

#[cfg(not(feature = "simulator"))]
async fn cmd_simulate(
    _config: Config,
    _api: Option<String>,
    _period: Option<f64>,
    _jitter: Option<f64>,
    _site: Option<String>,
) -> anyhow::Result<()> {
    eprintln!("Error: simulate requires the simulator feature (not enabled at compile time)");
    std::process::exit(1);
}

async fn cmd_seed(
    config: Config,
    hours: u32,
    site: Option<String>,
    period_seconds: u32,
    db: Option<PathBuf>,
) -> anyhow::Result<()> {
    let ingestor = ingestor(&config, db)?;
    let request = SeedRequest {
        hours,
        site: site.filter(|s| !s.is_empty()),
        period_seconds,
    };

    let outcome = ingestor.seed(request).await?;
    println!(
        "Seeded {} readings for site '{}' ({}s apart)",
        outcome.seeded, outcome.site, outcome.period_seconds
    );
    Ok(())
}

fn cmd_classify(value: f64) {
    let classifier = Classifier::cpcb_pm25();
    let result = classifier.classify(Some(value));

    match (result.index, result.category) {
        (Some(index), Some(category)) => {
            println!("PM2.5 {value:.1} µg/m³");
            println!("  AQI: {index}");
            println!("  Category: {category}");
            if let Some(band) = classifier.table().band_for(category) {
                println!("  Colour: {}", band.color);
            }
            if let Some(severity) = category.alert_severity() {
                println!("  Alert: {severity}");
            }
        }
        _ => println!("PM2.5 value {value} cannot be classified"),
    }
}

async fn cmd_exposure(
    config: Config,
    window: Option<String>,
    site: Option<String>,
    db: Option<PathBuf>,
) -> anyhow::Result<()> {
    let text = window.unwrap_or_else(|| config.default_window.clone());
    let window: ExposureWindow = text
        .parse()
        .with_context(|| format!("Invalid window '{text}'"))?;

    let ingestor = ingestor(&config, db)?;
    let report = ingestor
        .exposure(&window, site.filter(|s| !s.is_empty()))
        .await?;

    println!("Exposure over {}", report.window);
    println!("================");
    for category in Category::ALL {
        println!("  {:<13} {:>6} min", category.label(), report.totals.get(category));
    }
    println!("  {:<13} {:>6} min", "Total", report.totals.total());
    Ok(())
}

async fn cmd_status(config: Config, db: Option<PathBuf>) -> anyhow::Result<()> {
    let tz = config.timezone()?;
    let store = open_store(&config, db)?;

    println!("IAQ Monitor Status");
    println!("==================");
    println!();
    println!("Database: {}", store.path().display());

    let summary = store.summary().await?;
    println!("Readings: {}", summary.count);

    let sites = store.sites().await?;
    if !sites.is_empty() {
        println!("Sites: {}", sites.join(", "));
    }

    let latest = store
        .readings(ReadingQuery {
            limit: 1,
            site: None,
            window: None,
        })
        .await?;

    match latest.last() {
        Some(reading) => {
            println!();
            println!("Latest reading ({}):", reading.site);
            println!("  Time: {}", reading.ts.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z"));
            if let Some(pm25) = reading.pm25 {
                println!("  PM2.5: {pm25:.1} µg/m³");
            }
            if let (Some(index), Some(category)) = (reading.pm25_index, reading.pm25_category) {
                println!("  AQI: {index} ({category})");
            }
            if let Some(co2) = reading.co2 {
                println!("  CO2: {co2:.0} ppm");
            }
            if let Some(temp) = reading.temp {
                println!("  Temperature: {temp:.1} °C");
            }
            if let Some(rh) = reading.rh {
                println!("  Humidity: {rh:.0} %");
            }
        }
        None => {
            println!();
            println!("No readings yet.");
            println!("Run 'iaq seed' or 'iaq simulate' to generate data.");
        }
    }

    let unacknowledged = store
        .events(100, None)
        .await?
        .into_iter()
        .filter(|e| !e.acknowledged)
        .count();
    println!();
    println!("Unacknowledged alerts (latest 100): {unacknowledged}");
    Ok(())
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}

async fn cmd_reset(config: Config, site: Option<String>, db: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_store(&config, db)?;
    let site = site.filter(|s| !s.is_empty());
    store.reset(site.clone()).await?;

    match site {
        Some(site) => println!("Deleted readings and events for site '{site}'"),
        None => println!("Deleted all readings and events"),
    }
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
