//! Chat token gateway entry point.
//!
//! # Purpose
//! Loads configuration, initializes observability, and serves the token API
//! alongside the Prometheus metrics listener.
use std::future::Future;
use token_gateway::app::{AppState, build_router};
use token_gateway::config::{AuthMode, GatewayConfig};
use token_gateway::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env_or_yaml()?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: GatewayConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("token-gateway")?;
    let state = build_state(config.clone());
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, metrics = %config.metrics_bind, "token gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

/// Report startup conditions an operator should know about, then build state.
/// Only the presence of secrets is logged, never their values.
fn build_state(config: GatewayConfig) -> AppState {
    match config.auth_mode {
        AuthMode::Anonymous => tracing::warn!(
            subject = %config.demo_subject,
            "anonymous mode: chat tokens are issued without authentication; never expose this outside a demo"
        ),
        AuthMode::Oidc => {
            let issuers: Vec<&str> = config
                .issuers
                .iter()
                .map(|issuer| issuer.issuer.as_str())
                .collect();
            tracing::info!(?issuers, "verifying identity assertions");
            if config.allowed_domains.is_none() {
                tracing::warn!("ALLOWED_DOMAINS not set; token requests will fail");
            }
        }
    }
    match &config.signing_keys {
        Some(keys) => tracing::info!(
            kid = %keys.current.kid,
            previous = keys.previous.len(),
            ttl_secs = config.token_ttl.as_secs(),
            "chat token signing configured"
        ),
        None => tracing::warn!("ENSEMBLE_KEY_ID/ENSEMBLE_KEY_SECRET not set; token requests will fail"),
    }
    AppState::from_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_token::{KeyRegistry, SigningKey};
    use serial_test::serial;

    fn local_config() -> GatewayConfig {
        GatewayConfig {
            bind_addr: "127.0.0.1:0".parse().expect("bind"),
            metrics_bind: "127.0.0.1:0".parse().expect("metrics"),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn build_state_without_secrets_has_no_issuer() {
        let state = build_state(local_config());
        assert!(state.token_issuer.is_none());
        assert_eq!(state.config.auth_mode, AuthMode::Oidc);
    }

    #[test]
    fn build_state_with_secrets_has_issuer() {
        let state = build_state(GatewayConfig {
            auth_mode: AuthMode::Anonymous,
            signing_keys: Some(KeyRegistry::new(SigningKey::new("kid-1", "secret"))),
            ..local_config()
        });
        assert!(state.token_issuer.is_some());
    }

    #[tokio::test]
    #[serial]
    async fn run_with_shutdown_starts_and_stops() {
        run_with_shutdown(local_config(), async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        })
        .await
        .expect("run should stop cleanly");
    }
}
