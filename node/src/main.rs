use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use gigboard_handles::resolution::AVAILABILITY_CHECKS_METRIC;
use gigboard_handles::{
    HandleReservationResolver, MemoryProfileStore, ProfileStore, UsernameFormatValidator,
};
use gigboard_rpc::{start_server, AppState};
use gigboard_storage::{SledProfileStore, StoredProfile};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app_config;
mod version;

use app_config::{AppConfig, DeploymentProfile, StoreBackend};
use version::{git_commit_hash, GIGBOARD_VERSION};

fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    // Environment wins over the CLI default, as for the other settings
    let profile = match std::env::var("GIGBOARD_PROFILE")
        .ok()
        .map(|value| value.to_lowercase())
        .as_deref()
    {
        Some("dev") => DeploymentProfile::Dev,
        Some("production") => DeploymentProfile::Production,
        _ => *matches
            .get_one::<DeploymentProfile>("profile")
            .unwrap_or(&DeploymentProfile::Dev),
    };
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(profile, config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if let Some(db_path) = matches.get_one::<String>("db-path") {
        config.db_path = db_path.clone();
    }

    if let Some(seed_file) = matches.get_one::<String>("seed-file") {
        config.seed_file = Some(seed_file.into());
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    if let Some(rpc_host) = matches.get_one::<String>("rpc-host") {
        config.rpc_host = rpc_host.clone();
    }

    if let Some(rpc_port) = matches.get_one::<u16>("rpc-port") {
        config.rpc_port = *rpc_port;
    }

    if let Some(timeout_ms) = matches.get_one::<u64>("store-timeout-ms") {
        config.store_timeout_ms = *timeout_ms;
    }

    if matches.get_flag("memory-store") {
        config.store_backend = StoreBackend::Memory;
    }

    if matches.get_flag("disable-metrics") {
        config.prometheus_enabled = false;
    }
}

async fn check_status(config: &AppConfig, health_path: &str) -> Result<()> {
    let mut path = health_path.to_string();
    if !path.starts_with('/') {
        path = format!("/{path}");
    }
    let url = format!("http://{}{}", config.rpc_addr(), path);
    let response = reqwest::Client::new().get(&url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    println!("GET {url} -> {status}");
    println!("{body}");
    if status.is_success() {
        Ok(())
    } else {
        anyhow::bail!("Health check failed with status {status}")
    }
}

fn build_cli() -> Command {
    Command::new("gigboard-node")
        .version(GIGBOARD_VERSION)
        .about("Gigboard profile handle availability service")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("PROFILE")
                .value_parser(value_parser!(DeploymentProfile))
                .default_value("dev")
                .help("Select deployment profile (dev, production). Can also be set via GIGBOARD_PROFILE")
                .global(true),
        )
        .arg(
            Arg::new("db-path")
                .long("db-path")
                .value_name("DIR")
                .help("Profile database directory")
                .global(true),
        )
        .arg(
            Arg::new("seed-file")
                .long("seed-file")
                .value_name("FILE")
                .help("JSON array of profiles loaded into the store at startup")
                .global(true),
        )
        .arg(
            Arg::new("memory-store")
                .long("memory-store")
                .action(ArgAction::SetTrue)
                .help("Keep profiles in memory instead of sled")
                .global(true),
        )
        .arg(
            Arg::new("store-timeout-ms")
                .long("store-timeout-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Timeout applied to each profile snapshot fetch")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .arg(
            Arg::new("rpc-host")
                .long("rpc-host")
                .value_name("HOST")
                .help("Override RPC bind host")
                .global(true),
        )
        .arg(
            Arg::new("rpc-port")
                .long("rpc-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Override RPC port")
                .global(true),
        )
        .arg(
            Arg::new("disable-metrics")
                .long("disable-metrics")
                .action(ArgAction::SetTrue)
                .help("Disable the Prometheus metrics endpoint")
                .global(true),
        )
        .arg(
            Arg::new("version_flag")
                .short('V')
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print detailed version information and exit")
                .global(true),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Run configuration and environment self-checks, then exit")
                .global(true),
        )
        .subcommand(Command::new("start").about("Start the availability service"))
        .subcommand(
            Command::new("status")
                .about("Check the /health endpoint of a running service")
                .arg(
                    Arg::new("health-path")
                        .long("health-path")
                        .value_name("PATH")
                        .default_value("/health")
                        .help("Health endpoint path to query"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    if let Some(status_matches) = matches.subcommand_matches("status") {
        let config = load_config_with_overrides(status_matches)?;
        let health_path = status_matches
            .get_one::<String>("health-path")
            .map(|value| value.as_str())
            .unwrap_or("/health");
        check_status(&config, health_path).await?;
        return Ok(());
    }

    let start_matches = matches.subcommand_matches("start").unwrap_or(&matches);
    let config = load_config_with_overrides(start_matches)?;

    if start_matches.get_flag("version_flag") {
        println!(
            "gigboard-node {} (commit {})",
            GIGBOARD_VERSION,
            git_commit_hash()
        );
        return Ok(());
    }

    if start_matches.get_flag("check") {
        run_self_check(&config)?;
        return Ok(());
    }

    init_logging(&config)?;
    let prometheus_handle = init_metrics(&config);

    info!("Starting gigboard-node: {}", config.node_id);
    info!("Deployment profile: {}", config.profile);
    if let Some(path) = &config.config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let (store, sled_store) = build_store(&config)?;
    let validator = UsernameFormatValidator::with_limits(
        config.username_min_len,
        config.username_max_len,
    );
    let resolver = HandleReservationResolver::new(store)
        .with_validator(Arc::new(validator))
        .with_store_timeout(config.store_timeout());

    let app_state = AppState::new(resolver, config.node_id.clone()).with_metrics(prometheus_handle);
    let rpc_addr = config.rpc_addr();
    info!("Starting RPC server on {}", rpc_addr);

    let rpc_addr_clone = rpc_addr.clone();
    let rpc_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, &rpc_addr_clone).await {
            error!("RPC server error: {}", e);
        }
    });

    info!(
        "Handle availability API at: http://{}/profile/handle-availability",
        rpc_addr
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down gigboard-node");
    rpc_handle.abort();

    if let Some(sled_store) = sled_store {
        sled_store.flush()?;
    }

    info!("gigboard-node shutdown complete");
    Ok(())
}

/// Open the configured profile store and apply the seed file, if any.
///
/// The sled handle is returned separately so shutdown can flush it.
fn build_store(config: &AppConfig) -> Result<(Arc<dyn ProfileStore>, Option<SledProfileStore>)> {
    let seed = match &config.seed_file {
        Some(path) => load_seed_profiles(path)?,
        None => Vec::new(),
    };

    match config.store_backend {
        StoreBackend::Memory => {
            let store = MemoryProfileStore::new();
            for profile in &seed {
                store.upsert(
                    profile.account_id.clone(),
                    profile.username.as_deref(),
                    profile.display_name.as_deref(),
                    profile.is_premium,
                );
            }
            info!("Using in-memory profile store ({} seeded profiles)", seed.len());
            let store: Arc<dyn ProfileStore> = Arc::new(store);
            Ok((store, None))
        }
        StoreBackend::Sled => {
            if let Some(parent) = Path::new(&config.db_path).parent() {
                fs::create_dir_all(parent)?;
            }
            let store = SledProfileStore::new(&config.db_path)
                .with_context(|| format!("failed to open profile database at {}", config.db_path))?;
            for profile in &seed {
                store.put_profile(profile)?;
            }
            info!(
                "Using sled profile store at {} ({} profiles)",
                config.db_path,
                store.count()
            );
            let shared: Arc<dyn ProfileStore> = Arc::new(store.clone());
            Ok((shared, Some(store)))
        }
    }
}

fn load_seed_profiles(path: &Path) -> Result<Vec<StoredProfile>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let profiles: Vec<StoredProfile> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid seed file {}", path.display()))?;
    Ok(profiles)
}

fn init_metrics(config: &AppConfig) -> Option<PrometheusHandle> {
    if !config.prometheus_enabled {
        info!("Prometheus metrics exporter disabled via configuration");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics exporter registered");
            describe_counter!(
                AVAILABILITY_CHECKS_METRIC,
                "Handle availability checks answered, by handle kind and reason code"
            );
            Some(handle)
        }
        Err(err) => {
            warn!("Failed to install Prometheus metrics exporter: {}", err);
            None
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

fn run_self_check(config: &AppConfig) -> Result<()> {
    println!("Running gigboard-node self-check...");
    let mut issues = Vec::new();

    if let Err(err) = config.validate() {
        issues.push(err.to_string());
    }

    if let Err(err) = ensure_port_available(&config.rpc_host, config.rpc_port) {
        issues.push(err);
    }

    if let Some(path) = &config.seed_file {
        if let Err(err) = load_seed_profiles(path) {
            issues.push(format!("{err:#}"));
        }
    }

    if config.store_backend == StoreBackend::Sled {
        match Path::new(&config.db_path).parent() {
            Some(parent) if parent.as_os_str().is_empty() || parent.exists() => {}
            Some(parent) => issues.push(format!(
                "Database directory {} does not exist",
                parent.display()
            )),
            None => issues.push(format!("DB_PATH '{}' is invalid", config.db_path)),
        }
    }

    if issues.is_empty() {
        println!("OK");
        Ok(())
    } else {
        for issue in &issues {
            eprintln!("- {issue}");
        }
        anyhow::bail!("self-check failed")
    }
}

fn ensure_port_available(host: &str, port: u16) -> Result<(), String> {
    let addr = format!("{host}:{port}");
    match std::net::TcpListener::bind(&addr) {
        Ok(listener) => drop(listener),
        Err(err) => return Err(format!("RPC port {addr} is not available for binding: {err}")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigboard_handles::HandleKind;
    use std::path::PathBuf;

    fn test_config(backend: StoreBackend, db_path: String, seed_file: Option<PathBuf>) -> AppConfig {
        AppConfig {
            profile: DeploymentProfile::Dev,
            config_path: None,
            node_id: "test-node".to_string(),
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 18_080,
            store_backend: backend,
            db_path,
            seed_file,
            store_timeout_ms: 2_000,
            username_min_len: 3,
            username_max_len: 30,
            prometheus_enabled: false,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }

    fn seed_fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("config")
            .join("dev-profiles.json")
    }

    #[test]
    fn seed_fixture_parses() {
        let profiles = load_seed_profiles(&seed_fixture()).unwrap();
        assert_eq!(profiles.len(), 3);
        assert!(profiles.iter().any(|p| p.is_premium));
    }

    #[tokio::test]
    async fn memory_store_is_seeded() {
        let config = test_config(StoreBackend::Memory, String::new(), Some(seed_fixture()));
        let (store, sled) = build_store(&config).unwrap();
        assert!(sled.is_none());
        assert_eq!(store.profile_count().unwrap(), 3);

        let records = store
            .fetch_profile_handle_records(HandleKind::Username)
            .await
            .unwrap();
        assert_eq!(records.iter().filter(|r| r.handle_value.is_some()).count(), 2);
    }

    #[test]
    fn sled_store_is_opened_and_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("profiles").to_string_lossy().to_string();
        let config = test_config(StoreBackend::Sled, db_path, Some(seed_fixture()));

        let (store, sled) = build_store(&config).unwrap();
        assert!(sled.is_some());
        assert_eq!(store.profile_count().unwrap(), 3);
    }

    #[test]
    fn invalid_seed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_seed_profiles(&path).unwrap_err();
        assert!(err.to_string().contains("invalid seed file"));
    }

    #[test]
    fn cli_parses_overrides() {
        let matches = build_cli()
            .try_get_matches_from([
                "gigboard-node",
                "--memory-store",
                "--rpc-port",
                "19090",
                "--store-timeout-ms",
                "500",
            ])
            .unwrap();
        let mut config = test_config(StoreBackend::Sled, "./db".to_string(), None);
        apply_overrides(&matches, &mut config);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.rpc_port, 19_090);
        assert_eq!(config.store_timeout_ms, 500);
    }
}
