use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::{
    cli::{Cli, Command},
    domain::{
        self,
        events::{EngineEvent, InboundEvent},
    },
    infra::{
        self,
        config::{AppConfig, FileConfigAdapter},
        contracts::ConfigAdapter,
        stubs::{MemoryCacheStore, NoopNotifier},
    },
    transport::{
        self,
        api::HttpApi,
        manager::ConnectionManager,
        session::{SessionScope, SharedGateway, WsConnector},
    },
    usecases::{
        self,
        engine::{EngineTuning, SyncEngine},
    },
};

const ENGINE_SHUTDOWN: &str = "ENGINE_SHUTDOWN";
const ACCOUNT_LOGGED_OUT_REMOTELY: &str = "ACCOUNT_LOGGED_OUT_REMOTELY";

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let _log_guard = infra::logging::init(&config.logging)?;

    tracing::debug!(
        domain = domain::module_name(),
        transport = transport::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    match cli.command_or_default() {
        Command::Run => run_engine(config).await,
    }
}

fn load_config(config_path: Option<&Path>) -> Result<AppConfig> {
    FileConfigAdapter::new(config_path).load()
}

async fn run_engine(config: AppConfig) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<EngineEvent>();

    let gateway = SharedGateway::new();
    let connector = Arc::new(WsConnector::new(config.server.ws_url.clone(), gateway.clone()));
    let scope = SessionScope::from_config(&config.session);
    let mut manager =
        ConnectionManager::new(connector, scope, events_tx.clone(), config.sync.clone());

    let api = Arc::new(HttpApi::new(&config.server, &config.session));
    let tuning = EngineTuning {
        ack_timeout: Duration::from_millis(config.sync.ack_timeout_ms),
        failed_op_retention_ms: (config.sync.failed_op_retention_hours * 60 * 60 * 1_000) as i64,
    };
    // The in-memory cache and no-op notifier are the default collaborators;
    // embedders swap in platform-backed ones through the same contracts.
    let mut engine = SyncEngine::new(
        Box::new(MemoryCacheStore::default()),
        Box::new(NoopNotifier),
        api.clone(),
        api,
        Arc::new(gateway),
        tuning,
    );

    manager.connect().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(code = ENGINE_SHUTDOWN, "shutdown requested, closing session");
                manager.disconnect();
                break;
            }
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                route_event(event, &mut manager, &mut engine, &config.session.account_id).await;
            }
        }
    }

    Ok(())
}

/// One serialized dispatch point: connection lifecycle events go to the
/// manager, everything else mutates inbox state through the engine.
async fn route_event(
    event: EngineEvent,
    manager: &mut ConnectionManager,
    engine: &mut SyncEngine,
    account_id: &str,
) {
    match event {
        EngineEvent::Connect | EngineEvent::Transport(_) => manager.handle_event(event).await,
        EngineEvent::Inbound(InboundEvent::TeamMemberLogout { accounts }) => {
            if accounts.iter().any(|account| account == account_id) {
                tracing::info!(
                    code = ACCOUNT_LOGGED_OUT_REMOTELY,
                    "this account was logged out remotely, closing session"
                );
                manager.disconnect();
            }
            engine
                .handle_event(EngineEvent::Inbound(InboundEvent::TeamMemberLogout {
                    accounts,
                }))
                .await;
        }
        other => engine.handle_event(other).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_default_config_when_file_is_missing() {
        let config = load_config(Some(Path::new("./missing-config.toml")))
            .expect("config should build from defaults");

        assert_eq!(config, AppConfig::default());
    }
}
