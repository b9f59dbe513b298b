use crate::config::parse::{load_config_unvalidated, validate_config, ConfigError};
use crate::config::types::{Config, Overrides, StoreConfig};
use crate::sink::{SinkError, SinkRegistry, TracingReporter};
use crate::store::{AwsCredentials, HttpLogStore, LogStore, MemoryLogStore, Signer, StoreError};
use crate::web::{run_server, Credentials, DrainState};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("web server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("shutdown error: {0}")]
    Drain(#[from] SinkError),
}

pub async fn run(
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config_unvalidated(path)?
        }
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };

    overrides.apply_to(&mut config);
    validate_config(&config)?;

    run_drain(config).await.map_err(|e| e.into())
}

fn build_store(config: &StoreConfig) -> Result<Arc<dyn LogStore>, RunError> {
    match config {
        StoreConfig::Memory { retain_events } => {
            warn!(
                retain_events,
                "Using the in-memory store; delivered events are not persisted"
            );
            Ok(Arc::new(MemoryLogStore::bounded(*retain_events)))
        }
        StoreConfig::Http { endpoint, timeout } => {
            warn!(endpoint = %endpoint, "Using HTTP log store without request signing");
            Ok(Arc::new(HttpLogStore::new(endpoint, *timeout)?))
        }
        StoreConfig::Cloudwatch {
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            session_token,
            timeout,
        } => {
            let credentials = match (access_key_id, secret_access_key) {
                (Some(access_key_id), Some(secret_access_key)) => AwsCredentials {
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                    session_token: session_token.clone(),
                },
                _ => AwsCredentials::from_env().ok_or_else(|| {
                    ConfigError::Validation(
                        "no AWS credentials: set store.access_key_id and store.secret_access_key \
                         or AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY"
                            .to_string(),
                    )
                })?,
            };

            let endpoint = StoreConfig::cloudwatch_endpoint(region, endpoint.as_deref());
            info!(endpoint = %endpoint, region = %region, "Using CloudWatch Logs store");
            let signer = Signer::new(credentials, region.clone(), "logs");
            Ok(Arc::new(HttpLogStore::new(&endpoint, *timeout)?.with_signer(signer)))
        }
    }
}

/// Serve until SIGINT/SIGTERM, then stop accepting requests and drain every
/// sink.
pub async fn run_drain(config: Config) -> Result<(), RunError> {
    let addr = config.server.socket_addr().ok_or_else(|| {
        ConfigError::Validation(format!("invalid bind address '{}'", config.server.bind))
    })?;

    let store = build_store(&config.store)?;
    let registry = Arc::new(SinkRegistry::new(
        store,
        Arc::new(TracingReporter),
        config.sink.clone(),
    ));

    let state = Arc::new(DrainState {
        registry: Arc::clone(&registry),
        credentials: Credentials::new(
            config.server.username.clone(),
            config.server.password.clone(),
        ),
        message_format: config.server.message_format,
        strip_ansi_codes: config.server.strip_ansi_codes,
    });

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    info!(
        retention_days = config.sink.retention_days,
        flush_interval = ?config.sink.flush_interval,
        "Drain started, press Ctrl+C to shutdown"
    );
    let served = run_server(addr, state, shutdown.clone(), config.server.shutdown_grace).await;

    // The listener may have failed on its own; sinks still get drained
    shutdown.cancel();
    info!(sinks = registry.len(), "Draining sinks");
    let drained = registry.stop_all_within(config.sink.drain_timeout).await;

    served?;
    drained?;
    info!("Shutdown complete");
    Ok(())
}

async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Could not install SIGTERM handler");
                let _ = signal::ctrl_c().await;
                info!("Shutdown signal received");
                shutdown.cancel();
                return;
            }
        };

        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = terminate.recv() => {}
            _ = shutdown.cancelled() => return,
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = shutdown.cancelled() => return,
        }
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
