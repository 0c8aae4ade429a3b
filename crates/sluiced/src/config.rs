use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_PORT: u16 = 3333;

const fn default_shutdown_timeout_secs() -> u64 {
    20
}

const fn default_slow_work_ms() -> u64 {
    5_000
}

const fn default_tick_interval_ms() -> u64 {
    1_000
}

const fn default_tick_work_ms() -> u64 {
    2_000
}

fn default_as_true() -> bool {
    true
}

fn default_bind_addr() -> SocketAddr {
    (Ipv4Addr::LOCALHOST, DEFAULT_API_PORT).into()
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub ticker: TickerConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(alias = "addr", default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// How long `/slow` works when left alone
    #[serde(default = "default_slow_work_ms")]
    pub slow_work_ms: u64,
}

impl ApiConfig {
    pub fn slow_work(&self) -> Duration {
        Duration::from_millis(self.slow_work_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            slow_work_ms: default_slow_work_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 0 waits for in-flight work indefinitely
    #[serde(default = "default_shutdown_timeout_secs")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerConfig {
    #[serde(default = "default_as_true")]
    pub enabled: bool,
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_tick_work_ms")]
    pub work_ms: u64,
}

impl TickerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn work(&self) -> Duration {
        Duration::from_millis(self.work_ms)
    }
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_tick_interval_ms(),
            work_ms: default_tick_work_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_as_true")]
    pub colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            colors: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plaintext,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reads configuration from an optional TOML file, given its path.
    /// `SLUICED__`-prefixed environment variables override whatever is set
    /// in the file, e.g. `SLUICED__SHUTDOWN__TIMEOUT_SECS=5`.
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(
                config::File::new(config_path, config::FileFormat::Toml).required(false),
            )
            .add_source(
                config::Environment::with_prefix("SLUICED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    bind_addr: Option<SocketAddr>,
    slow_work: Option<Duration>,
    shutdown_timeout: Option<Duration>,
    ticker: Option<TickerConfig>,
    log: Option<LogConfig>,
}

impl ConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    pub fn slow_work(mut self, work: Duration) -> Self {
        self.slow_work = Some(work);
        self
    }

    /// A zero duration waits indefinitely
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    pub fn ticker(mut self, ticker: TickerConfig) -> Self {
        self.ticker = Some(ticker);
        self
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = Some(log);
        self
    }

    pub fn build(self) -> Config {
        Config {
            api: ApiConfig {
                bind_addr: self.bind_addr.unwrap_or_else(default_bind_addr),
                slow_work_ms: self
                    .slow_work
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                    .unwrap_or_else(default_slow_work_ms),
            },
            shutdown: ShutdownConfig {
                timeout_secs: self
                    .shutdown_timeout
                    .map(|d| d.as_secs())
                    .unwrap_or_else(default_shutdown_timeout_secs),
            },
            ticker: self.ticker.unwrap_or_default(),
            log: self.log.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{assert, let_assert};

    #[test]
    fn defaults_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let_assert!(Ok(config) = Config::load(path.to_str().unwrap()));
        assert!(config.api.bind_addr.port() == DEFAULT_API_PORT);
        assert!(config.shutdown.timeout() == Some(Duration::from_secs(20)));
        assert!(config.ticker.enabled);
        assert!(config.log.format == LogFormat::Plaintext);
    }

    #[test]
    fn reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sluiced.toml");
        std::fs::write(
            &path,
            r#"
            [api]
            addr = "127.0.0.1:8080"

            [shutdown]
            timeout_secs = 0

            [ticker]
            enabled = false

            [log]
            format = "json"
            "#,
        )
        .unwrap();

        let_assert!(Ok(config) = Config::load(path.to_str().unwrap()));
        assert!(config.api.bind_addr == "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(config.shutdown.timeout().is_none());
        assert!(!config.ticker.enabled);
        assert!(config.log.format == LogFormat::Json);
        assert!(config.log.colors);
    }

    #[test]
    fn builder_zero_timeout_is_unbounded() {
        let config = Config::builder()
            .shutdown_timeout(Duration::ZERO)
            .slow_work(Duration::from_millis(250))
            .build();
        assert!(config.shutdown.timeout().is_none());
        assert!(config.api.slow_work() == Duration::from_millis(250));
    }

    #[test]
    fn builder_saturates_oversized_durations() {
        let config = Config::builder().slow_work(Duration::MAX).build();
        assert!(config.api.slow_work_ms == u64::MAX);
    }
}
