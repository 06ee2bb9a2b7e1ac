//! Live sensor simulator posting synthetic readings to the ingest API.

use crate::generator::{simulator_ambient, AmbientRanges, RandomWalk};
use crate::ingest::{IngestOutcome, ReadingIn};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shortest pause between two posts.
pub const MIN_SLEEP: Duration = Duration::from_millis(500);

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Base URL of the ingest API
    pub api: String,
    /// Nominal time between posts
    pub period: Duration,
    /// Random jitter as a fraction of the period
    pub jitter: f64,
    /// Site to tag readings with (server default when None)
    pub site: Option<String>,
}

impl SimulatorConfig {
    pub fn new(api: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            period: Duration::from_secs(5),
            jitter: 0.2,
            site: None,
        }
    }

    fn base(&self) -> &str {
        self.api.trim_end_matches('/')
    }

    /// Get the ingest endpoint URL.
    pub fn ingest_url(&self) -> String {
        format!("{}/ingest", self.base())
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base())
    }

    /// Sleep before the next post: `period * (1 ± jitter)`, never below
    /// [`MIN_SLEEP`].
    pub fn next_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter = self.jitter.abs();
        let factor = if jitter > 0.0 {
            1.0 + rng.gen_range(-jitter..=jitter)
        } else {
            1.0
        };
        let secs = (self.period.as_secs_f64() * factor).max(MIN_SLEEP.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(MIN_SLEEP)
    }
}

/// Simulator error types.
#[derive(Debug)]
pub enum SimulatorError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// JSON serialization error
    Serialization(String),
}

impl std::fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulatorError::Config(msg) => write!(f, "Simulator config error: {msg}"),
            SimulatorError::Network(msg) => write!(f, "Simulator network error: {msg}"),
            SimulatorError::Server { status, message } => {
                write!(f, "Ingest server error ({status}): {message}")
            }
            SimulatorError::Serialization(msg) => {
                write!(f, "Simulator serialization error: {msg}")
            }
        }
    }
}

impl std::error::Error for SimulatorError {}

/// Build the source tag for this simulator instance.
pub fn source_tag(hostname: &str) -> String {
    format!("sim-{}-{}", hostname, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// HTTP client posting readings to the ingest API.
pub struct SimulatorClient {
    config: SimulatorConfig,
    client: reqwest::Client,
    source: String,
}

impl SimulatorClient {
    /// Create a new simulator client.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SimulatorError::Config(format!("Failed to create HTTP client: {e}")))?;

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(Self {
            config,
            client,
            source: source_tag(&hostname),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Source tag attached to every posted reading.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Test connection to the ingest API.
    pub async fn test_connection(&self) -> Result<bool, SimulatorError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| SimulatorError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Post one reading.
    pub async fn post_reading(&self, reading: &ReadingIn) -> Result<IngestOutcome, SimulatorError> {
        let response = self
            .client
            .post(self.config.ingest_url())
            .json(reading)
            .send()
            .await
            .map_err(|e| SimulatorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SimulatorError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| SimulatorError::Serialization(e.to_string()))
    }

    /// Build the next reading from the walk.
    pub fn next_reading<R: Rng>(
        &self,
        walk: &mut RandomWalk,
        rng: &mut R,
        ambient: &AmbientRanges,
    ) -> ReadingIn {
        let sample = walk.next_sample(rng, ambient);
        ReadingIn {
            ts: Some(Utc::now()),
            pm25: Some(sample.pm25),
            co2: Some(sample.co2),
            temp: Some(sample.temp),
            rh: Some(sample.rh),
            site: self.config.site.clone(),
            source: Some(self.source.clone()),
        }
    }

    /// Post readings until `running` is cleared. Failed posts are logged
    /// and skipped. Returns the number of readings accepted.
    pub async fn run(&self, running: Arc<AtomicBool>) -> u64 {
        let mut rng = StdRng::from_entropy();
        let mut walk = RandomWalk::new();
        let ambient = simulator_ambient();
        let mut accepted = 0u64;

        tracing::info!(
            "Simulator posting to {} as {}",
            self.config.ingest_url(),
            self.source
        );

        while running.load(Ordering::SeqCst) {
            let reading = self.next_reading(&mut walk, &mut rng, &ambient);
            match self.post_reading(&reading).await {
                Ok(outcome) => {
                    accepted += 1;
                    tracing::info!(
                        "pm25={:.1} index={:?} category={}",
                        reading.pm25.unwrap_or_default(),
                        outcome.pm25_index,
                        outcome
                            .pm25_category
                            .map(|c| c.label())
                            .unwrap_or("unclassified")
                    );
                }
                Err(e) => tracing::warn!("Post failed: {}", e),
            }

            sleep_while_running(self.config.next_delay(&mut rng), &running).await;
        }

        tracing::info!("Simulator stopped after {} readings", accepted);
        accepted
    }
}

async fn sleep_while_running(delay: Duration, running: &AtomicBool) {
    let slice = Duration::from_millis(100);
    let deadline = tokio::time::Instant::now() + delay;
    while running.load(Ordering::SeqCst) {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(slice.min(deadline - now)).await;
    }
}
