use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::model::SerialEndpoint;

pub const CONFIG_VERSION: u32 = 1;

/// Huawei sticks expose three ttyUSB ports; only one is the control port.
pub const DEFAULT_CANDIDATES: &[&str] = &["/dev/ttyUSB0", "/dev/ttyUSB1", "/dev/ttyUSB2"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config version {0}")]
    Version(u32),
    #[error("no candidate ports configured")]
    NoCandidates,
    #[error("{0} must be at least 1")]
    ZeroBudget(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnlockConfigInput {
    pub version: u32,
    pub candidates: Option<Vec<String>>,
    pub baud_rate: Option<u32>,
    pub probe_timeout_s: Option<u64>,
    pub probe_read_budget: Option<usize>,
    pub settle_s: Option<u64>,
    pub read_budget: Option<usize>,
    pub verify_delay_s: Option<u64>,
    pub write_timeout_ms: Option<u64>,
}

/// Resolved session configuration.
#[derive(Debug, Clone)]
pub struct UnlockConfig {
    pub version: u32,
    /// Endpoints tried in order during port discovery.
    pub candidates: Vec<SerialEndpoint>,
    pub baud_rate: u32,
    /// How long a probe blocks waiting for spontaneous activity.
    pub probe_timeout: Duration,
    pub probe_read_budget: usize,
    /// Sleep between writing a command and reading the reply.
    pub settle: Duration,
    pub read_budget: usize,
    /// Sleep between sending the unlock code and re-querying the status.
    pub verify_delay: Duration,
    pub write_timeout: Duration,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            candidates: DEFAULT_CANDIDATES
                .iter()
                .map(|p| SerialEndpoint::from(*p))
                .collect(),
            baud_rate: 115_200,
            probe_timeout: Duration::from_secs(15),
            probe_read_budget: 5,
            settle: Duration::from_secs(5),
            read_budget: 4096,
            verify_delay: Duration::from_secs(5),
            write_timeout: Duration::from_millis(1000),
        }
    }
}

impl UnlockConfigInput {
    pub fn resolve(self) -> Result<UnlockConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::Version(version));
        }

        let defaults = UnlockConfig::default();

        let candidates = match self.candidates {
            Some(paths) => dedup_candidates(paths)?,
            None => defaults.candidates,
        };

        let probe_read_budget = self
            .probe_read_budget
            .unwrap_or(defaults.probe_read_budget);
        if probe_read_budget == 0 {
            return Err(ConfigError::ZeroBudget("probe_read_budget"));
        }
        let read_budget = self.read_budget.unwrap_or(defaults.read_budget);
        if read_budget == 0 {
            return Err(ConfigError::ZeroBudget("read_budget"));
        }

        Ok(UnlockConfig {
            version,
            candidates,
            baud_rate: self.baud_rate.unwrap_or(defaults.baud_rate),
            probe_timeout: self
                .probe_timeout_s
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
            probe_read_budget,
            settle: self
                .settle_s
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle),
            read_budget,
            verify_delay: self
                .verify_delay_s
                .map(Duration::from_secs)
                .unwrap_or(defaults.verify_delay),
            write_timeout: self
                .write_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_timeout),
        })
    }
}

impl UnlockConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(UnlockConfig::default());
        }
        let parsed: UnlockConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Replace the candidate list, e.g. from `--port` flags.
    pub fn with_candidates<I, S>(mut self, paths: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = dedup_candidates(paths.into_iter().map(Into::into).collect())?;
        Ok(self)
    }
}

/// Trim, drop empties, keep the first occurrence of duplicates.
fn dedup_candidates(paths: Vec<String>) -> Result<Vec<SerialEndpoint>, ConfigError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for path in paths {
        let trimmed = path.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        out.push(SerialEndpoint::from(trimmed));
    }
    if out.is_empty() {
        return Err(ConfigError::NoCandidates);
    }
    Ok(out)
}
