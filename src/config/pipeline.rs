//! Pipeline run configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix shared by every environment variable read by [`PipelineConfig::from_env`].
pub const ENV_PREFIX: &str = "REPAIR_PIPELINE_";

/// Concurrency strategy used to drive the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One long-lived worker per stage, polling its queue.
    #[default]
    Persistent,
    /// One dispatcher per stage spawning a task per item.
    FanOut,
}

impl Strategy {
    /// Both strategies, in comparison order.
    pub const ALL: [Self; 2] = [Self::Persistent, Self::FanOut];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => f.write_str("persistent"),
            Self::FanOut => f.write_str("fan_out"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" | "p" => Ok(Self::Persistent),
            "fan_out" | "fan-out" | "fanout" | "w" => Ok(Self::FanOut),
            other => Err(format!("unknown strategy `{other}`")),
        }
    }
}

/// Parameters for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of bays.
    pub bay_capacity: u32,
    /// Number of technicians.
    pub technician_capacity: u32,
    /// Strategy driving the stages.
    pub strategy: Strategy,
    /// Length of one phase unit in milliseconds.
    pub time_unit_ms: u64,
    /// Sleep between checks of an empty stage queue.
    pub idle_backoff_ms: u64,
    /// Interval at which the persistent strategy checks for completion.
    pub completion_poll_ms: u64,
    /// Upper bound of the random pause between submissions. 0 disables it.
    pub submission_jitter_ms: u64,
    /// How long shutdown waits for each worker before detaching it.
    pub shutdown_timeout_ms: u64,
    /// Seed for submission order and jitter. `None` draws from the OS.
    pub seed: Option<u64>,
    /// Worker threads for the fan-out runtime. `None` uses one per CPU.
    pub worker_threads: Option<usize>,
    /// Maximum number of events kept in the run history.
    pub event_history: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bay_capacity: 5,
            technician_capacity: 3,
            strategy: Strategy::Persistent,
            time_unit_ms: 1000,
            idle_backoff_ms: 50,
            completion_poll_ms: 100,
            submission_jitter_ms: 100,
            shutdown_timeout_ms: 2000,
            seed: None,
            worker_threads: None,
            event_history: 100_000,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn env_var<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let key = format!("{ENV_PREFIX}{name}");
    match std::env::var(&key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{key}: {e}")),
    }
}

impl PipelineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.bay_capacity == 0 {
            return Err("bay_capacity must be greater than 0".into());
        }
        if self.technician_capacity == 0 {
            return Err("technician_capacity must be greater than 0".into());
        }
        if self.time_unit_ms == 0 {
            return Err("time_unit_ms must be greater than 0".into());
        }
        if self.idle_backoff_ms == 0 {
            return Err("idle_backoff_ms must be greater than 0".into());
        }
        if self.completion_poll_ms == 0 {
            return Err("completion_poll_ms must be greater than 0".into());
        }
        if self.worker_threads == Some(0) {
            return Err("worker_threads must be greater than 0 when set".into());
        }
        if self.event_history == 0 {
            return Err("event_history must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    /// Missing fields take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `REPAIR_PIPELINE_*` environment variables,
    /// loading a `.env` file first if one exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(v) = env_var("BAYS")? {
            cfg.bay_capacity = v;
        }
        if let Some(v) = env_var("TECHNICIANS")? {
            cfg.technician_capacity = v;
        }
        if let Some(v) = env_var("STRATEGY")? {
            cfg.strategy = v;
        }
        if let Some(v) = env_var("TIME_UNIT_MS")? {
            cfg.time_unit_ms = v;
        }
        if let Some(v) = env_var("IDLE_BACKOFF_MS")? {
            cfg.idle_backoff_ms = v;
        }
        if let Some(v) = env_var("COMPLETION_POLL_MS")? {
            cfg.completion_poll_ms = v;
        }
        if let Some(v) = env_var("SUBMISSION_JITTER_MS")? {
            cfg.submission_jitter_ms = v;
        }
        if let Some(v) = env_var("SHUTDOWN_TIMEOUT_MS")? {
            cfg.shutdown_timeout_ms = v;
        }
        if let Some(v) = env_var("SEED")? {
            cfg.seed = Some(v);
        }
        if let Some(v) = env_var("WORKER_THREADS")? {
            cfg.worker_threads = Some(v);
        }
        if let Some(v) = env_var("EVENT_HISTORY")? {
            cfg.event_history = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Set the number of bays.
    #[must_use]
    pub const fn with_bay_capacity(mut self, capacity: u32) -> Self {
        self.bay_capacity = capacity;
        self
    }

    /// Set the number of technicians.
    #[must_use]
    pub const fn with_technician_capacity(mut self, capacity: u32) -> Self {
        self.technician_capacity = capacity;
        self
    }

    /// Set the strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the length of one phase unit.
    #[must_use]
    pub fn with_time_unit(mut self, unit: Duration) -> Self {
        self.time_unit_ms = millis(unit);
        self
    }

    /// Set the idle backoff.
    #[must_use]
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff_ms = millis(backoff);
        self
    }

    /// Set the completion polling interval.
    #[must_use]
    pub fn with_completion_poll(mut self, interval: Duration) -> Self {
        self.completion_poll_ms = millis(interval);
        self
    }

    /// Set the maximum pause between submissions.
    #[must_use]
    pub fn with_submission_jitter(mut self, jitter: Duration) -> Self {
        self.submission_jitter_ms = millis(jitter);
        self
    }

    /// Set the per-worker shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = millis(timeout);
        self
    }

    /// Set the RNG seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the fan-out runtime's worker thread count.
    #[must_use]
    pub const fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Set the maximum event history length.
    #[must_use]
    pub const fn with_event_history(mut self, events: usize) -> Self {
        self.event_history = events;
        self
    }

    /// Length of one phase unit.
    #[must_use]
    pub const fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    /// Idle backoff.
    #[must_use]
    pub const fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Completion polling interval.
    #[must_use]
    pub const fn completion_poll(&self) -> Duration {
        Duration::from_millis(self.completion_poll_ms)
    }

    /// Maximum pause between submissions.
    #[must_use]
    pub const fn submission_jitter(&self) -> Duration {
        Duration::from_millis(self.submission_jitter_ms)
    }

    /// Per-worker shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Worker threads for the fan-out runtime, resolved against the CPU count.
    #[must_use]
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}
