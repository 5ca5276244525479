use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkewError};
use crate::model::bias::BiasStatistic;
use crate::time::parse_duration_str;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct HostAliases(BTreeMap<String, String>);

impl HostAliases {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: &str, addr: &str) -> Self {
        self.0.insert(name.to_string(), addr.to_string());
        self
    }

    pub fn resolve(&self, host: &str) -> String {
        self.0
            .get(host)
            .cloned()
            .unwrap_or_else(|| host.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for HostAliases {
    fn default() -> Self {
        Self::empty()
            .with("thebeast", "192.168.1.187")
            .with("thebeast.en", "192.168.1.187")
            .with("epyc3451", "192.168.1.195")
            .with("epyc3451.en", "192.168.1.195")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub host_aliases: HostAliases,
    pub outlier_sigmas: f64,
    pub max_packet_interval: Duration,
    pub bias_statistic: BiasStatistic,
    pub prefer_original_start_time: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_aliases: HostAliases::default(),
            outlier_sigmas: 3.0,
            max_packet_interval: Duration::from_secs(1),
            bias_statistic: BiasStatistic::Mean,
            prefer_original_start_time: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    host_aliases: Option<BTreeMap<String, String>>,
    outlier_sigmas: Option<f64>,
    max_packet_interval: Option<String>,
    bias_statistic: Option<String>,
    prefer_original_start_time: Option<bool>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("SKEWADJUST_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("skewadjust/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| SkewError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| SkewError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let outlier_sigmas = match env::var("SKEWADJUST_OUTLIER_SIGMAS") {
        Ok(v) => Some(v.parse::<f64>().map_err(|e| {
            SkewError::Config(format!("bad SKEWADJUST_OUTLIER_SIGMAS in environment: {e}"))
        })?),
        Err(_) => None,
    };

    let host_aliases = match env::var("SKEWADJUST_HOST_ALIASES") {
        Ok(v) => Some(parse_host_aliases(&v).map_err(|e| {
            SkewError::Config(format!(
                "bad SKEWADJUST_HOST_ALIASES in environment: {e} (value={v})"
            ))
        })?),
        Err(_) => None,
    };

    let prefer_original_start_time = match env::var("SKEWADJUST_PREFER_ORIGINAL_START_TIME") {
        Ok(v) => Some(parse_bool(&v).ok_or_else(|| {
            SkewError::Config(format!(
                "bad SKEWADJUST_PREFER_ORIGINAL_START_TIME in environment (value={v})"
            ))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        host_aliases,
        outlier_sigmas,
        max_packet_interval: env::var("SKEWADJUST_MAX_PACKET_INTERVAL").ok(),
        bias_statistic: env::var("SKEWADJUST_BIAS_STATISTIC").ok(),
        prefer_original_start_time,
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.host_aliases {
        cfg.host_aliases = HostAliases(v);
    }
    if let Some(v) = overrides.outlier_sigmas {
        if !v.is_finite() || v <= 0.0 {
            return Err(SkewError::Config(format!(
                "bad outlier_sigmas in {source}: must be a positive number (value={v})"
            )));
        }
        cfg.outlier_sigmas = v;
    }
    if let Some(v) = overrides.max_packet_interval {
        cfg.max_packet_interval = parse_duration_str(&v)
            .map_err(|e| SkewError::Config(format!("bad max_packet_interval in {source}: {e}")))?;
    }
    if let Some(v) = overrides.bias_statistic {
        cfg.bias_statistic = BiasStatistic::from_str(&v).map_err(|e| {
            SkewError::Config(format!("bad bias_statistic in {source}: {e}"))
        })?;
    }
    if let Some(v) = overrides.prefer_original_start_time {
        cfg.prefer_original_start_time = v;
    }
    Ok(())
}

fn parse_host_aliases(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for entry in raw.split(',') {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((name, addr)) = trimmed.split_once('=') else {
            return Err(SkewError::Config(
                "alias entries must use name=address syntax".to_string(),
            ));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(SkewError::Config("alias name cannot be empty".to_string()));
        }
        out.insert(name.to_string(), addr.trim().to_string());
    }
    Ok(out)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    fn default_has_expected_aliases() {
        let cfg = Config::default();
        assert_eq!(cfg.host_aliases.resolve("thebeast"), "192.168.1.187");
        assert_eq!(cfg.host_aliases.resolve("epyc3451.en"), "192.168.1.195");
        assert_eq!(cfg.host_aliases.resolve("10.1.1.1"), "10.1.1.1");
    }

    #[test]
    fn default_has_statistics_settings() {
        let cfg = Config::default();
        assert_eq!(cfg.outlier_sigmas, 3.0);
        assert_eq!(cfg.max_packet_interval, Duration::from_secs(1));
        assert_eq!(cfg.bias_statistic, BiasStatistic::Mean);
        assert!(cfg.prefer_original_start_time);
    }

    #[test]
    fn parse_host_aliases_accepts_list() {
        let aliases = parse_host_aliases("web=10.0.0.1, db = 10.0.0.2").unwrap();
        assert_eq!(aliases.get("web").map(String::as_str), Some("10.0.0.1"));
        assert_eq!(aliases.get("db").map(String::as_str), Some("10.0.0.2"));
    }

    #[test]
    fn parse_host_aliases_rejects_bad_entries() {
        assert!(parse_host_aliases("web").is_err());
        assert!(parse_host_aliases("=10.0.0.1").is_err());
    }

    #[test]
    fn apply_overrides_updates_fields() {
        let mut cfg = Config::default();
        let overrides = ConfigOverrides {
            outlier_sigmas: Some(2.5),
            max_packet_interval: Some("250ms".to_string()),
            bias_statistic: Some("median".to_string()),
            prefer_original_start_time: Some(false),
            ..ConfigOverrides::default()
        };

        apply_overrides(&mut cfg, overrides, "config file").unwrap();

        assert_eq!(cfg.outlier_sigmas, 2.5);
        assert_eq!(cfg.max_packet_interval, Duration::from_millis(250));
        assert_eq!(cfg.bias_statistic, BiasStatistic::Median);
        assert!(!cfg.prefer_original_start_time);
    }

    #[test]
    fn apply_overrides_rejects_bad_values() {
        let mut cfg = Config::default();
        let overrides = ConfigOverrides {
            outlier_sigmas: Some(-1.0),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, overrides, "environment").is_err());

        let overrides = ConfigOverrides {
            max_packet_interval: Some("forever".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, overrides, "environment").is_err());
    }

    #[test]
    #[serial]
    fn load_reads_toml_file_then_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "outlier_sigmas = 4.0\nmax_packet_interval = \"2s\"\n\n[host_aliases]\nweb = \"10.0.0.1\""
        )
        .unwrap();

        unsafe {
            env::set_var("SKEWADJUST_CONFIG", file.path());
            env::set_var("SKEWADJUST_BIAS_STATISTIC", "median");
        }
        let cfg = Config::load();
        unsafe {
            env::remove_var("SKEWADJUST_CONFIG");
            env::remove_var("SKEWADJUST_BIAS_STATISTIC");
        }

        let cfg = cfg.unwrap();
        assert_eq!(cfg.outlier_sigmas, 4.0);
        assert_eq!(cfg.max_packet_interval, Duration::from_secs(2));
        assert_eq!(cfg.host_aliases.resolve("web"), "10.0.0.1");
        assert_eq!(cfg.host_aliases.resolve("thebeast"), "thebeast");
        assert_eq!(cfg.bias_statistic, BiasStatistic::Median);
    }
}
