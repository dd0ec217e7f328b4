use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct OrbitConfig {
    pub api_port: u16,
    pub paths: OrbitPaths,
    pub proximity: ProximityConfig,
}

impl OrbitConfig {
    pub fn from_env() -> Result<Self> {
        let paths = OrbitPaths::discover()?;
        let api_port = env::var("ORBIT_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let proximity = ProximityConfig::from_env();
        Ok(Self {
            api_port,
            paths,
            proximity,
        })
    }

    pub fn new(api_port: u16, paths: OrbitPaths, proximity: ProximityConfig) -> Self {
        Self {
            api_port,
            paths,
            proximity,
        }
    }
}

/// Tunables for the proximity engine. All liveness rules are enforced lazily
/// at read time, so these values only flow into timestamp comparisons.
#[derive(Debug, Clone, Copy)]
pub struct ProximityConfig {
    /// Seconds a reported location stays usable before queries treat it as absent.
    pub location_ttl_secs: i64,
    /// Seconds during which a repeat "entered proximity" alert for the same
    /// pair is suppressed.
    pub alert_cooldown_secs: i64,
    /// Radius assigned to freshly registered devices.
    pub default_radius_meters: i64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            location_ttl_secs: 24 * 60 * 60,
            alert_cooldown_secs: 30 * 60,
            default_radius_meters: 5000,
        }
    }
}

impl ProximityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let location_ttl_secs = env::var("ORBIT_LOCATION_TTL_HOURS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|hours| hours * 60 * 60)
            .unwrap_or(defaults.location_ttl_secs);
        let alert_cooldown_secs = env::var("ORBIT_ALERT_COOLDOWN_MINUTES")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|minutes| minutes * 60)
            .unwrap_or(defaults.alert_cooldown_secs);
        let default_radius_meters = env::var("ORBIT_DEFAULT_RADIUS_METERS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(defaults.default_radius_meters);
        Self {
            location_ttl_secs,
            alert_cooldown_secs,
            default_radius_meters,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OrbitPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl OrbitPaths {
    pub fn discover() -> Result<Self> {
        let base = match env::var("ORBIT_DATA_DIR") {
            Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw),
            _ => {
                let exe_path = std::env::current_exe()
                    .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
                exe_path
                    .parent()
                    .ok_or_else(|| anyhow!("executable path missing parent"))?
                    .to_path_buf()
            }
        };
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("orbit.db");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}
