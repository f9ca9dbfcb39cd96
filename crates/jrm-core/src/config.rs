//! Poll profiles and the TOML configuration file.
//!
//! Configuration is read once, when a monitoring session is built. The
//! resolved [`PollIntervals`] are handed to each source at construction
//! and never change on a live source.
//!
//! ```toml
//! profile = "leak-hunt"
//!
//! [intervals]
//! set_breakdown = 60000   # milliseconds
//!
//! [visibility]
//! uss = true
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::metric::MetricKind;
use crate::source::SourceKind;

/// Named set of poll intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollProfile {
    /// Balanced cadence: cheap counters every second or two.
    #[default]
    Default,
    /// Fast feedback while developing.
    Dev,
    /// Low overhead for long-running services.
    Production,
    /// Frequent breakdowns to follow slow leaks.
    LeakHunt,
}

impl PollProfile {
    /// Poll interval of `kind` under this profile.
    pub fn interval(&self, kind: SourceKind) -> Duration {
        let secs = match (self, kind) {
            (Self::Default, kind) => return kind.default_interval(),

            (Self::Dev, SourceKind::ResidentSet | SourceKind::WorkingSet | SourceKind::Jvm) => 1,
            (Self::Dev, SourceKind::PrivateWorkingSet) => 5,
            (Self::Dev, SourceKind::SetBreakdown | SourceKind::PrivateBytes) => 10,

            (Self::Production, SourceKind::ResidentSet | SourceKind::WorkingSet | SourceKind::Jvm) => 2,
            (Self::Production, SourceKind::PrivateWorkingSet | SourceKind::PrivateBytes) => 15,
            (Self::Production, SourceKind::SetBreakdown) => 30,

            (Self::LeakHunt, SourceKind::ResidentSet | SourceKind::WorkingSet) => 2,
            (Self::LeakHunt, _) => 5,
        };
        Duration::from_secs(secs)
    }
}

/// Resolved poll interval per source kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollIntervals {
    intervals: BTreeMap<SourceKind, Duration>,
}

impl PollIntervals {
    /// Intervals of a profile without overrides.
    pub fn from_profile(profile: PollProfile) -> Self {
        let intervals = SourceKind::ALL
            .iter()
            .map(|kind| (*kind, profile.interval(*kind)))
            .collect();
        Self { intervals }
    }

    /// Uses the same interval for every source kind.
    pub fn uniform(interval: Duration) -> Self {
        let intervals = SourceKind::ALL.iter().map(|kind| (*kind, interval)).collect();
        Self { intervals }
    }

    /// Replaces the interval of one source kind.
    #[must_use]
    pub fn with(mut self, kind: SourceKind, interval: Duration) -> Self {
        self.intervals.insert(kind, interval);
        self
    }

    /// Returns the interval for `kind`.
    pub fn get(&self, kind: SourceKind) -> Duration {
        self.intervals
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_interval())
    }
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self::from_profile(PollProfile::Default)
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base poll profile.
    pub profile: PollProfile,

    /// Interval overrides in milliseconds, keyed by source kind name.
    pub intervals: BTreeMap<String, u64>,

    /// Visibility overrides keyed by metric name.
    pub visibility: BTreeMap<String, bool>,
}

impl Config {
    /// Returns `<config dir>/jrm/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jrm").join("config.toml"))
    }

    /// Loads the config at `path`.
    ///
    /// A missing file is not an error and yields the defaults.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file exists but cannot be read
    /// - `ConfigError::Parse` if the file is not valid TOML for this struct
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses config text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let config: Self = toml::from_str(text)?;
        config.warn_unknown_keys();
        Ok(config)
    }

    /// Resolves the profile plus overrides into concrete intervals.
    pub fn poll_intervals(&self) -> PollIntervals {
        let mut intervals = PollIntervals::from_profile(self.profile);
        for kind in SourceKind::ALL {
            if let Some(millis) = self.intervals.get(kind.as_str()) {
                intervals = intervals.with(kind, Duration::from_millis(*millis));
            }
        }
        intervals
    }

    /// Whether `kind` starts out enabled.
    pub fn is_visible(&self, kind: MetricKind) -> bool {
        self.visibility
            .get(kind.name())
            .copied()
            .unwrap_or_else(|| kind.visible_by_default())
    }

    fn warn_unknown_keys(&self) {
        for key in self.intervals.keys() {
            if !SourceKind::ALL.iter().any(|k| k.as_str() == key) {
                warn!(key = %key, "Ignoring interval for unknown source kind");
            }
        }
        for key in self.visibility.keys() {
            if !MetricKind::ALL.iter().any(|k| k.name() == key) {
                warn!(key = %key, "Ignoring visibility for unknown metric");
            }
        }
    }
}
