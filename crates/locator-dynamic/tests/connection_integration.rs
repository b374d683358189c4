//! Integration tests for the session lifecycle: connect, disconnect grace,
//! expiry, reconnect and bootstrap retries.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use locator_core::{Location, Locator, LocatorError, LocatorResult, StaticLocator};
use locator_coord::{MemoryEnsemble, SessionState};
use locator_dynamic::{
    ConnectionState, DynamicLocator, DynamicLocatorConfig, EventKind, LocatorEvent,
};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};

// ============================================================================
// Test Helpers
// ============================================================================

const WAIT: Duration = Duration::from_secs(120);

fn config() -> DynamicLocatorConfig {
    DynamicLocatorConfig::new("/services")
        .with_session_timeout(Duration::from_secs(3))
        .with_spin_delay(Duration::from_millis(500))
}

fn start_with(
    ensemble: &MemoryEnsemble,
    bootstrap: Arc<dyn Locator>,
    config: DynamicLocatorConfig,
) -> DynamicLocator {
    DynamicLocator::new(config, bootstrap, Arc::new(ensemble.connector())).expect("create locator")
}

fn start(ensemble: &MemoryEnsemble) -> DynamicLocator {
    let bootstrap = Arc::new(StaticLocator::new("zk1:2181").expect("bootstrap"));
    start_with(ensemble, bootstrap, config())
}

async fn wait_for_kind(
    rx: &mut broadcast::Receiver<LocatorEvent>,
    kind: EventKind,
) -> LocatorEvent {
    timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if event.kind() == kind => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event bus closed: {e}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

fn count(locator: &DynamicLocator, kind: EventKind) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    locator.on(kind, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    hits
}

/// Bootstrap locator failing a fixed number of times before answering.
struct FlakyBootstrap {
    failures_left: AtomicUsize,
    location: Location,
}

#[async_trait]
impl Locator for FlakyBootstrap {
    async fn locate(&self) -> LocatorResult<Location> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(LocatorError::Bootstrap("cluster registry unavailable".to_string()));
        }
        Ok(self.location.clone())
    }
}

// ============================================================================
// Connect
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_publishes_lifecycle_events() {
    let ensemble = MemoryEnsemble::new();
    let locator = start(&ensemble);
    let mut events = locator.subscribe();

    let mut seen = Vec::new();
    while seen.last() != Some(&LocatorEvent::Connected) {
        seen.push(timeout(WAIT, events.recv()).await.unwrap().unwrap());
    }

    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], LocatorEvent::Connecting);
    assert!(matches!(
        seen[1],
        LocatorEvent::StateChange {
            state: SessionState::Connected,
            ..
        }
    ));
    assert_eq!(locator.connection_state(), ConnectionState::Connected);
    assert_eq!(ensemble.sessions_opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_idempotent() {
    let ensemble = MemoryEnsemble::new();
    let locator = start(&ensemble);
    let mut events = locator.subscribe();

    assert!(!locator.connection().connect());
    wait_for_kind(&mut events, EventKind::Connected).await;
    assert!(!locator.connection().connect());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(ensemble.sessions_opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_failures_retry_until_found() {
    let ensemble = MemoryEnsemble::new();
    let bootstrap = Arc::new(FlakyBootstrap {
        failures_left: AtomicUsize::new(2),
        location: Location::new("zk1", 2181),
    });
    let locator = start_with(&ensemble, bootstrap, config());
    let failures = count(&locator, EventKind::BootstrapError);
    let mut events = locator.subscribe();

    wait_for_kind(&mut events, EventKind::Connected).await;
    assert_eq!(failures.load(Ordering::SeqCst), 2);
    assert_eq!(ensemble.sessions_opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refused_connection_retries_after_spin_delay() {
    let ensemble = MemoryEnsemble::new();
    ensemble.refuse_connections(true);
    let started = Instant::now();
    let locator = start(&ensemble);
    let mut events = locator.subscribe();

    wait_for_kind(&mut events, EventKind::Connecting).await;
    wait_for_kind(&mut events, EventKind::Connecting).await;
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(locator.connection_state(), ConnectionState::Connecting);

    ensemble.refuse_connections(false);
    wait_for_kind(&mut events, EventKind::Connected).await;
    assert_eq!(ensemble.sessions_opened(), 1);
}

// ============================================================================
// Disconnect and Expiry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_short_disconnect_keeps_session() {
    let ensemble = MemoryEnsemble::new();
    let locator = start(&ensemble);
    let expired = count(&locator, EventKind::Expired);
    let mut events = locator.subscribe();
    wait_for_kind(&mut events, EventKind::Connected).await;
    let session = locator.connection_state();
    assert_eq!(session, ConnectionState::Connected);

    assert_eq!(ensemble.disconnect_sessions(), 1);
    wait_for_kind(&mut events, EventKind::Disconnected).await;
    assert_eq!(locator.connection_state(), ConnectionState::Disconnected);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(ensemble.reconnect_sessions(), 1);
    wait_for_kind(&mut events, EventKind::Connected).await;

    // Well past the original grace deadline
    sleep(Duration::from_secs(10)).await;
    assert_eq!(expired.load(Ordering::SeqCst), 0);
    assert_eq!(ensemble.sessions_opened(), 1);
    assert_eq!(locator.connection_state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_long_disconnect_forces_expiry() {
    let ensemble = MemoryEnsemble::new();
    let locator = start(&ensemble);
    let mut events = locator.subscribe();
    wait_for_kind(&mut events, EventKind::Connected).await;

    ensemble.disconnect_sessions();
    let disconnected_at = Instant::now();
    wait_for_kind(&mut events, EventKind::Expired).await;
    assert!(disconnected_at.elapsed() >= Duration::from_secs(3));

    wait_for_kind(&mut events, EventKind::Connected).await;
    assert_eq!(ensemble.sessions_opened(), 2);
    assert_eq!(ensemble.connected_sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_opens_new_session() {
    let ensemble = MemoryEnsemble::new();
    let locator = start(&ensemble);
    let mut events = locator.subscribe();

    let first = match wait_for_kind(&mut events, EventKind::StateChange).await {
        LocatorEvent::StateChange { session_id, .. } => session_id,
        other => panic!("unexpected event {other:?}"),
    };

    assert_eq!(ensemble.expire_sessions(), 1);
    wait_for_kind(&mut events, EventKind::Expired).await;
    wait_for_kind(&mut events, EventKind::Connected).await;

    let pool = locator.for_path("/svc").unwrap();
    let status = pool.status().await.unwrap();
    assert_ne!(status.session_id, Some(first));
    assert_eq!(ensemble.sessions_opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_reconnecting() {
    let ensemble = MemoryEnsemble::new();
    let locator = start(&ensemble);
    let mut events = locator.subscribe();
    wait_for_kind(&mut events, EventKind::Connected).await;

    locator.shutdown().await;
    assert_eq!(locator.connection_state(), ConnectionState::Disconnected);
    assert_eq!(ensemble.connected_sessions(), 0);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(ensemble.sessions_opened(), 1);
    assert!(!locator.connection().connect());
}
