use anyhow::Result;
use clap::ValueEnum;
use config::{Config, File as ConfigFile};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sled,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "sled" => Ok(StoreBackend::Sled),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("STORE_BACKEND must be 'sled' or 'memory', got '{other}'"),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            StoreBackend::Sled => "sled",
            StoreBackend::Memory => "memory",
        };
        f.write_str(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeploymentProfile {
    Dev,
    Production,
}

#[derive(Clone, Copy, Debug)]
struct ProfileDefaults {
    name: &'static str,
    config_filename: &'static str,
    node_id: &'static str,
    rpc_host: &'static str,
    rpc_port: u16,
    db_path: &'static str,
    store_backend: &'static str,
    store_timeout_ms: u64,
    log_level: &'static str,
    log_format: &'static str,
    prometheus_enabled: bool,
}

impl ProfileDefaults {
    fn config_path(&self) -> PathBuf {
        PathBuf::from("config").join(self.config_filename)
    }
}

impl DeploymentProfile {
    fn defaults(&self) -> ProfileDefaults {
        match self {
            DeploymentProfile::Dev => ProfileDefaults {
                name: "dev",
                config_filename: "dev.toml",
                node_id: "gigboard-dev",
                rpc_host: "127.0.0.1",
                rpc_port: 18_080,
                db_path: "./data/dev/profiles",
                store_backend: "memory",
                store_timeout_ms: 2_000,
                log_level: "debug",
                log_format: "pretty",
                prometheus_enabled: false,
            },
            DeploymentProfile::Production => ProfileDefaults {
                name: "production",
                config_filename: "production.toml",
                node_id: "gigboard-handles",
                rpc_host: "0.0.0.0",
                rpc_port: 8_080,
                db_path: "/var/lib/gigboard/profiles",
                store_backend: "sled",
                store_timeout_ms: 2_000,
                log_level: "info",
                log_format: "json",
                prometheus_enabled: true,
            },
        }
    }
}

impl fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.defaults().name)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profile: DeploymentProfile,
    pub config_path: Option<PathBuf>,
    pub node_id: String,

    // RPC
    pub rpc_host: String,
    pub rpc_port: u16,

    // Profile store
    pub store_backend: StoreBackend,
    pub db_path: String,
    pub seed_file: Option<PathBuf>,
    pub store_timeout_ms: u64,

    // Username format
    pub username_min_len: usize,
    pub username_max_len: usize,

    // Observability
    pub prometheus_enabled: bool,
    pub log_level: String,
    pub log_format: String,
}

impl AppConfig {
    pub fn load(profile: DeploymentProfile, config_path_override: Option<&str>) -> Result<Self> {
        let defaults = profile.defaults();
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = defaults.config_path();
            if path.exists() {
                Some(path)
            } else {
                None
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::with_prefix("GIGBOARD"));
        let config = builder.build()?;

        Ok(Self {
            profile,
            config_path: resolved_path,
            node_id: get_string_value(&config, &["NODE_ID", "node.id"])
                .unwrap_or_else(|| defaults.node_id.to_string()),
            rpc_host: get_string_value(&config, &["RPC_HOST", "rpc.host"])
                .unwrap_or_else(|| defaults.rpc_host.to_string()),
            rpc_port: get_parsed_value(&config, &["RPC_PORT", "rpc.port"])
                .unwrap_or(defaults.rpc_port),
            store_backend: get_string_value(&config, &["STORE_BACKEND", "storage.backend"])
                .unwrap_or_else(|| defaults.store_backend.to_string())
                .parse()?,
            db_path: get_string_value(&config, &["DB_PATH", "storage.db_path"])
                .unwrap_or_else(|| defaults.db_path.to_string()),
            seed_file: get_string_value(&config, &["SEED_FILE", "storage.seed_file"])
                .map(PathBuf::from),
            store_timeout_ms: get_parsed_value(
                &config,
                &["STORE_TIMEOUT_MS", "handles.store_timeout_ms"],
            )
            .unwrap_or(defaults.store_timeout_ms),
            username_min_len: get_parsed_value(
                &config,
                &["USERNAME_MIN_LEN", "handles.username_min_len"],
            )
            .unwrap_or(gigboard_handles::UsernameFormatValidator::MIN_LEN),
            username_max_len: get_parsed_value(
                &config,
                &["USERNAME_MAX_LEN", "handles.username_max_len"],
            )
            .unwrap_or(gigboard_handles::UsernameFormatValidator::MAX_LEN),
            prometheus_enabled: get_bool_value(
                &config,
                &["PROMETHEUS_ENABLED", "metrics.enabled"],
                defaults.prometheus_enabled,
            ),
            log_level: get_string_value(&config, &["LOG_LEVEL", "log.level"])
                .unwrap_or_else(|| defaults.log_level.to_string()),
            log_format: get_string_value(&config, &["LOG_FORMAT", "log.format"])
                .unwrap_or_else(|| defaults.log_format.to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            anyhow::bail!("NODE_ID must not be empty");
        }
        if self.rpc_port == 0 {
            anyhow::bail!("RPC_PORT must be greater than zero");
        }
        if self.store_backend == StoreBackend::Sled && self.db_path.trim().is_empty() {
            anyhow::bail!("DB_PATH must not be empty when STORE_BACKEND is sled");
        }
        if self.store_timeout_ms == 0 {
            anyhow::bail!("STORE_TIMEOUT_MS must be greater than zero");
        }
        if self.username_min_len == 0 || self.username_min_len > self.username_max_len {
            anyhow::bail!(
                "USERNAME_MIN_LEN ({}) must be between 1 and USERNAME_MAX_LEN ({})",
                self.username_min_len,
                self.username_max_len
            );
        }
        if self.log_format != "json" && self.log_format != "pretty" {
            anyhow::bail!(
                "LOG_FORMAT must be 'json' or 'pretty', got '{}'",
                self.log_format
            );
        }
        Ok(())
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_parsed_value<T: std::str::FromStr>(config: &Config, keys: &[&str]) -> Option<T> {
    get_string_value(config, keys).and_then(|value| value.parse().ok())
}

fn get_bool_value(config: &Config, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Ok(value) = config.get_bool(key) {
            return value;
        }
        if let Ok(raw) = config.get_string(key) {
            if let Ok(parsed) = raw.parse::<bool>() {
                return parsed;
            }
        }
    }
    default
}
