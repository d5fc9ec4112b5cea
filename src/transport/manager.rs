//! Connection lifecycle: exactly one logical session per authenticated
//! identity, with retry budgeting, downtime tracking, and the reconnect and
//! settle timers that drive backfill and queue replay.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    domain::{
        connection::{now_unix_ms, ConnectionPhase, ConnectionStatus},
        events::{EngineEvent, RefreshMode, TransportEvent},
    },
    infra::config::SyncConfig,
    transport::{
        scheduler::TaskScheduler,
        session::{SessionHandle, SessionScope, SocketConnector},
    },
};

const SESSION_CONNECTING: &str = "SESSION_CONNECTING";
const SESSION_CONNECTED: &str = "SESSION_CONNECTED";
const SESSION_DISCONNECTED: &str = "SESSION_DISCONNECTED";
const SESSION_CONNECT_RETRYING: &str = "SESSION_CONNECT_RETRYING";
const SESSION_CONNECT_FAILED: &str = "SESSION_CONNECT_FAILED";
const SESSION_SCOPE_SWITCHED: &str = "SESSION_SCOPE_SWITCHED";
const SESSION_SKIPPED_UNAUTHENTICATED: &str = "SESSION_SKIPPED_UNAUTHENTICATED";

pub struct ConnectionManager {
    connector: Arc<dyn SocketConnector>,
    scope: Option<SessionScope>,
    status: ConnectionStatus,
    session: Option<SessionHandle>,
    retry_count: u32,
    events_tx: UnboundedSender<EngineEvent>,
    scheduler: TaskScheduler,
    config: SyncConfig,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn SocketConnector>,
        scope: Option<SessionScope>,
        events_tx: UnboundedSender<EngineEvent>,
        config: SyncConfig,
    ) -> Self {
        let scheduler = TaskScheduler::new(events_tx.clone());
        Self {
            connector,
            scope,
            status: ConnectionStatus::default(),
            session: None,
            retry_count: 0,
            events_tx,
            scheduler,
            config,
        }
    }

    /// The one place connection state is owned; everyone else reads copies.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Routes the connection-related engine events. Everything else belongs
    /// to the engine.
    pub async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Connect => self.connect().await,
            EngineEvent::Transport(TransportEvent::Disconnected { server_initiated }) => {
                self.handle_session_drop(server_initiated)
            }
            _ => {}
        }
    }

    /// Opens a session under the current scope. No-op while connected; fails
    /// silently (stays disconnected) when no credentials are configured.
    pub async fn connect(&mut self) {
        if self.session.is_some() || self.status.phase == ConnectionPhase::Connected {
            return;
        }
        let Some(scope) = self.scope.clone() else {
            tracing::debug!(
                code = SESSION_SKIPPED_UNAUTHENTICATED,
                "connect skipped, no credentials configured"
            );
            return;
        };

        self.status.phase = ConnectionPhase::Connecting;
        tracing::info!(
            code = SESSION_CONNECTING,
            tenant = %scope.tenant_id,
            attempt = self.retry_count + 1,
            "opening transport session"
        );

        match self.connector.open(&scope, self.events_tx.clone()).await {
            Ok(session) => self.on_connected(session),
            Err(error) => self.on_connect_failure(&error.to_string()),
        }
    }

    /// Local teardown: cancels pending timers and drops the session without
    /// scheduling a reconnect.
    pub fn disconnect(&mut self) {
        self.scheduler.cancel_all();
        self.session = None;
        if self.status.phase != ConnectionPhase::Disconnected {
            self.status.phase = ConnectionPhase::Disconnected;
            self.status.disconnected_at = Some(now_unix_ms());
            tracing::info!(
                code = SESSION_DISCONNECTED,
                phase = self.status.phase.as_label(),
                server_initiated = false,
                "session closed locally"
            );
        }
    }

    /// Credential or tenant change while possibly connected: tear down,
    /// settle, reconnect under the new scope. In-flight work from the old
    /// scope dies with its session.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn switch_scope(&mut self, scope: SessionScope) {
        tracing::info!(
            code = SESSION_SCOPE_SWITCHED,
            tenant = %scope.tenant_id,
            "switching session scope"
        );
        self.disconnect();
        self.scope = Some(scope);
        self.retry_count = 0;
        self.scheduler.schedule(
            "scope-switch-reconnect",
            Duration::from_millis(self.config.scope_switch_delay_ms),
            EngineEvent::Connect,
        );
    }

    fn on_connected(&mut self, session: SessionHandle) {
        self.session = Some(session);
        self.retry_count = 0;

        let first_connection = !self.status.has_ever_connected;
        let downtime_ms = self.status.downtime_ms(now_unix_ms());
        self.status.phase = ConnectionPhase::Connected;
        self.status.has_ever_connected = true;

        let mode = if first_connection {
            RefreshMode::Full
        } else {
            RefreshMode::AfterDowntime { downtime_ms }
        };
        tracing::info!(
            code = SESSION_CONNECTED,
            phase = self.status.phase.as_label(),
            first_connection,
            downtime_ms = downtime_ms.unwrap_or(-1),
            "transport session established"
        );
        let _ = self.events_tx.send(EngineEvent::RefreshChats(mode));

        // Let the transport settle before draining the send queue.
        self.scheduler.schedule(
            "queue-settle",
            Duration::from_millis(self.config.settle_delay_ms),
            EngineEvent::ProcessQueue,
        );
    }

    fn on_connect_failure(&mut self, error: &str) {
        self.retry_count += 1;
        if self.retry_count <= self.config.max_connect_retries {
            // Recoverable: stay in the transient connecting state and try
            // again shortly.
            self.status.phase = ConnectionPhase::Connecting;
            tracing::warn!(
                code = SESSION_CONNECT_RETRYING,
                attempt = self.retry_count,
                budget = self.config.max_connect_retries,
                error = %error,
                "connect failed, retry scheduled"
            );
            self.scheduler.schedule(
                "connect-retry",
                Duration::from_millis(self.config.reconnect_delay_ms),
                EngineEvent::Connect,
            );
        } else {
            self.status.phase = ConnectionPhase::Error;
            tracing::error!(
                code = SESSION_CONNECT_FAILED,
                attempts = self.retry_count,
                error = %error,
                "retry budget exhausted, connection in terminal error state"
            );
        }
    }

    /// The live session dropped underneath us. Server-initiated drops get an
    /// automatic reconnect after a fixed interval; local teardown already
    /// went through `disconnect`.
    fn handle_session_drop(&mut self, server_initiated: bool) {
        if self.session.is_none() {
            return;
        }
        self.session = None;
        self.status.phase = ConnectionPhase::Disconnected;
        self.status.disconnected_at = Some(now_unix_ms());
        tracing::warn!(
            code = SESSION_DISCONNECTED,
            server_initiated,
            "transport session dropped"
        );

        if server_initiated {
            self.scheduler.schedule(
                "auto-reconnect",
                Duration::from_millis(self.config.reconnect_delay_ms),
                EngineEvent::Connect,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;
    use crate::transport::session::SessionOpenError;

    struct ScriptedConnector {
        /// Outcomes per attempt; exhausted entries mean success.
        failures_before_success: Mutex<u32>,
        captured_scopes: Mutex<Vec<SessionScope>>,
    }

    impl ScriptedConnector {
        fn succeeding() -> Self {
            Self {
                failures_before_success: Mutex::new(0),
                captured_scopes: Mutex::new(Vec::new()),
            }
        }

        fn failing_times(failures: u32) -> Self {
            Self {
                failures_before_success: Mutex::new(failures),
                captured_scopes: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> usize {
            self.captured_scopes.lock().expect("scope lock").len()
        }
    }

    #[async_trait]
    impl SocketConnector for ScriptedConnector {
        async fn open(
            &self,
            scope: &SessionScope,
            _events_tx: UnboundedSender<EngineEvent>,
        ) -> Result<SessionHandle, SessionOpenError> {
            self.captured_scopes
                .lock()
                .expect("scope lock")
                .push(scope.clone());
            let mut failures = self.failures_before_success.lock().expect("failure lock");
            if *failures > 0 {
                *failures -= 1;
                return Err(SessionOpenError::InvalidUrl("scripted".to_owned()));
            }
            Ok(SessionHandle::inert())
        }
    }

    fn scope(tenant: &str) -> SessionScope {
        SessionScope {
            account_id: "agent-7".to_owned(),
            tenant_id: tenant.to_owned(),
            auth_token: "secret".to_owned(),
        }
    }

    fn fast_config() -> SyncConfig {
        SyncConfig {
            settle_delay_ms: 5,
            reconnect_delay_ms: 5,
            scope_switch_delay_ms: 5,
            ..SyncConfig::default()
        }
    }

    fn manager_with(
        connector: Arc<ScriptedConnector>,
        scope: Option<SessionScope>,
    ) -> (ConnectionManager, UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(connector, scope, tx, fast_config());
        (manager, rx)
    }

    async fn next_event(rx: &mut UnboundedReceiver<EngineEvent>) -> EngineEvent {
        tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("event must arrive in time")
            .expect("channel must stay open")
    }

    #[tokio::test]
    async fn connect_without_credentials_stays_silently_disconnected() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut manager, _rx) = manager_with(connector.clone(), None);

        manager.connect().await;

        assert_eq!(manager.status().phase, ConnectionPhase::Disconnected);
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn first_connect_triggers_full_refresh_then_settled_queue_pass() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut manager, mut rx) = manager_with(connector, Some(scope("acme")));

        manager.connect().await;

        assert_eq!(manager.status().phase, ConnectionPhase::Connected);
        assert!(manager.status().has_ever_connected);
        assert_eq!(
            next_event(&mut rx).await,
            EngineEvent::RefreshChats(RefreshMode::Full)
        );
        assert_eq!(next_event(&mut rx).await, EngineEvent::ProcessQueue);
    }

    #[tokio::test]
    async fn connect_while_connected_is_a_no_op() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut manager, _rx) = manager_with(connector.clone(), Some(scope("acme")));

        manager.connect().await;
        manager.connect().await;

        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn reconnect_reports_downtime_for_the_backfill_tier() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut manager, mut rx) = manager_with(connector, Some(scope("acme")));

        manager.connect().await;
        let _ = next_event(&mut rx).await;
        let _ = next_event(&mut rx).await;

        manager
            .handle_event(EngineEvent::Transport(TransportEvent::Disconnected {
                server_initiated: true,
            }))
            .await;
        // The drop schedules an automatic reconnect request.
        assert_eq!(next_event(&mut rx).await, EngineEvent::Connect);

        manager.connect().await;
        let refresh = next_event(&mut rx).await;
        let EngineEvent::RefreshChats(RefreshMode::AfterDowntime { downtime_ms }) = refresh else {
            panic!("reconnect must carry a downtime-based refresh, got {refresh:?}");
        };
        assert!(downtime_ms.is_some());
    }

    #[tokio::test]
    async fn local_disconnect_schedules_no_reconnect() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (tx, mut rx) = mpsc::unbounded_channel();
        // A generous settle delay keeps the queue timer pending until the
        // disconnect cancels it.
        let config = SyncConfig {
            settle_delay_ms: 5_000,
            reconnect_delay_ms: 5,
            scope_switch_delay_ms: 5,
            ..SyncConfig::default()
        };
        let mut manager = ConnectionManager::new(connector, Some(scope("acme")), tx, config);

        manager.connect().await;
        let _ = next_event(&mut rx).await;

        manager.disconnect();

        assert_eq!(manager.status().phase, ConnectionPhase::Disconnected);
        assert!(manager.status().disconnected_at.is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        // Only the pre-disconnect queue settle could be pending, and it was
        // canceled; nothing else may arrive.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failures_under_the_budget_keep_a_recoverable_connecting_state() {
        let connector = Arc::new(ScriptedConnector::failing_times(1));
        let (mut manager, mut rx) = manager_with(connector.clone(), Some(scope("acme")));

        manager.connect().await;

        assert_eq!(manager.status().phase, ConnectionPhase::Connecting);
        // The scheduled retry request lands and the next attempt succeeds.
        assert_eq!(next_event(&mut rx).await, EngineEvent::Connect);
        manager.connect().await;
        assert_eq!(manager.status().phase, ConnectionPhase::Connected);
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn exhausted_retry_budget_becomes_a_terminal_error() {
        let connector = Arc::new(ScriptedConnector::failing_times(100));
        let (mut manager, mut rx) = manager_with(connector, Some(scope("acme")));

        for _ in 0..(fast_config().max_connect_retries + 1) {
            manager.connect().await;
            // Drain the retry request if one was scheduled.
            let _ = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        }

        assert_eq!(manager.status().phase, ConnectionPhase::Error);
    }

    #[tokio::test]
    async fn scope_switch_reconnects_under_the_new_tenant() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut manager, mut rx) = manager_with(connector.clone(), Some(scope("acme")));

        manager.connect().await;
        let _ = next_event(&mut rx).await;

        manager.switch_scope(scope("globex"));
        assert_eq!(manager.status().phase, ConnectionPhase::Disconnected);
        assert_eq!(next_event(&mut rx).await, EngineEvent::Connect);

        manager.connect().await;

        let scopes = connector.captured_scopes.lock().expect("scope lock");
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[1].tenant_id, "globex");
    }

    #[tokio::test]
    async fn stray_session_drop_without_a_session_is_ignored() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut manager, mut rx) = manager_with(connector, Some(scope("acme")));

        manager
            .handle_event(EngineEvent::Transport(TransportEvent::Disconnected {
                server_initiated: true,
            }))
            .await;

        assert_eq!(manager.status().disconnected_at, None);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());
    }
}
