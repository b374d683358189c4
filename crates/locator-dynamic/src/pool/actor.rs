//! Pool actor - owns one service path's pool, cache and request queue.
//!
//! The actor is the single owner of all per-path state. Every mutation
//! happens inside `handle_command`, one command at a time, so dispatch,
//! queue draining and pool replacement never interleave.
//!
//! Coordination I/O never runs inside the actor. Existence checks, child
//! fetches, watch forwarding and request timers are spawned as tasks that
//! report back through a weak sender, so in-flight work does not keep a
//! dropped pool alive.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Pool access goes through `.get()`; the cursor is reduced modulo the
//!   pool length before use
//! - Reply send failures (caller went away) are ignored

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use locator_core::{DataExtractor, Location, LocatorError, LocatorResult};
use locator_coord::{CoordResult, SessionId, WatchedEvent};

use super::commands::{FetchOutcome, PoolCommand, PoolStatus};
use crate::events::{EventBus, LocatorEvent};
use crate::path::child_path;
use crate::session::SharedClient;

/// Dispatch policy of one pool manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// How long a queued request waits; `None` waits forever.
    pub timeout: Option<Duration>,

    /// Disables the fallback to the cached pool when the live pool is empty.
    pub strict: bool,
}

struct PendingRequest {
    id: u64,
    respond_to: oneshot::Sender<LocatorResult<Location>>,
}

// ============================================================================
// Pool Actor
// ============================================================================

/// The pool actor for one normalized service path.
pub struct PoolActor {
    path: String,
    receiver: mpsc::Receiver<PoolCommand>,
    /// Handed to background tasks; never keeps the actor alive.
    sender: mpsc::WeakSender<PoolCommand>,
    session: watch::Receiver<Option<SharedClient>>,
    events: EventBus,
    extractor: Arc<dyn DataExtractor>,
    settings: PoolSettings,

    /// `None` while loading, `Some(empty)` when known to be empty.
    pool: Option<Vec<Location>>,
    cached_pool: Option<Vec<Location>>,
    queue: VecDeque<PendingRequest>,
    next_request_id: u64,
    cursor: u64,
    stale: bool,

    generation: u64,
    client: Option<SharedClient>,
    session_id: Option<SessionId>,
    exists_in_flight: bool,
    fetch_seq: u64,
    applied_seq: u64,
    last_updated: Option<DateTime<Utc>>,
}

impl PoolActor {
    pub fn new(
        path: String,
        receiver: mpsc::Receiver<PoolCommand>,
        sender: mpsc::WeakSender<PoolCommand>,
        session: watch::Receiver<Option<SharedClient>>,
        events: EventBus,
        extractor: Arc<dyn DataExtractor>,
        settings: PoolSettings,
    ) -> Self {
        Self {
            path,
            receiver,
            sender,
            session,
            events,
            extractor,
            settings,
            pool: None,
            cached_pool: None,
            queue: VecDeque::new(),
            next_request_id: 0,
            cursor: 0,
            stale: false,
            generation: 0,
            client: None,
            session_id: None,
            exists_in_flight: false,
            fetch_seq: 0,
            applied_seq: 0,
            last_updated: None,
        }
    }

    /// Runs the actor until every handle is dropped.
    pub async fn run(mut self) {
        info!(path = %self.path, "Pool manager starting");

        let initial = self.session.borrow_and_update().clone();
        if let Some(client) = initial {
            self.start_generation(client);
        }

        let mut session_open = true;
        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(PoolCommand::Shutdown) => {
                        self.abandon_queue();
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                changed = self.session.changed(), if session_open => match changed {
                    Ok(()) => {
                        let current = self.session.borrow_and_update().clone();
                        match current {
                            Some(client) => self.start_generation(client),
                            None => debug!(path = %self.path, "Session cleared"),
                        }
                    }
                    Err(_) => session_open = false,
                },
            }
        }

        info!(
            path = %self.path,
            queued = self.queue.len(),
            "Pool manager stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: PoolCommand) {
        match cmd {
            PoolCommand::Resolve { respond_to } => self.handle_resolve(respond_to),
            PoolCommand::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status());
            }
            PoolCommand::Shutdown => self.abandon_queue(),
            PoolCommand::RequestTimedOut { request_id } => self.handle_timeout(request_id),
            PoolCommand::ExistsChecked { generation, result } => {
                self.handle_exists(generation, result)
            }
            PoolCommand::PoolFetched {
                generation,
                seq,
                outcome,
            } => self.handle_fetched(generation, seq, outcome),
            PoolCommand::ChildrenChanged { generation, event } => {
                self.handle_children_changed(generation, event)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Session generations
    // ------------------------------------------------------------------------

    /// Forgets everything derived from the previous session and re-arms.
    /// Queued requests survive.
    fn start_generation(&mut self, client: SharedClient) {
        self.generation += 1;
        self.session_id = Some(client.session_id());
        self.client = Some(client);
        self.exists_in_flight = false;
        self.stale = false;

        info!(
            path = %self.path,
            generation = self.generation,
            session_id = ?self.session_id,
            queued = self.queue.len(),
            "Arming pool against new session"
        );

        self.set_pool(None);
        self.check_exists();
    }

    fn check_exists(&mut self) {
        if self.exists_in_flight {
            debug!(path = %self.path, "Existence check already in flight");
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };
        self.exists_in_flight = true;

        let path = self.path.clone();
        let generation = self.generation;
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let result = client.exists(&path).await;
            send_back(&sender, PoolCommand::ExistsChecked { generation, result }).await;
        });
    }

    fn start_fetch(&mut self) {
        let Some(client) = self.client.clone() else {
            return;
        };
        self.fetch_seq += 1;

        let job = FetchJob {
            client,
            path: self.path.clone(),
            extractor: Arc::clone(&self.extractor),
            events: self.events.clone(),
            generation: self.generation,
            seq: self.fetch_seq,
            sender: self.sender.clone(),
        };
        tokio::spawn(job.run());
    }

    // ------------------------------------------------------------------------
    // Background completions
    // ------------------------------------------------------------------------

    fn handle_exists(&mut self, generation: u64, result: CoordResult<bool>) {
        if generation != self.generation {
            debug!(path = %self.path, generation, "Dropping existence result from an old session");
            return;
        }
        self.exists_in_flight = false;

        match result {
            Ok(true) => {
                self.stale = false;
                info!(path = %self.path, "Service path found");
                self.events.publish(LocatorEvent::PathFound {
                    path: self.path.clone(),
                });
                self.start_fetch();
            }
            Ok(false) => self.path_missing(),
            Err(e) => {
                warn!(path = %self.path, error = %e, "Existence check failed, treating path as missing");
                self.path_missing();
            }
        }
    }

    fn handle_fetched(&mut self, generation: u64, seq: u64, outcome: FetchOutcome) {
        if generation != self.generation || seq <= self.applied_seq {
            debug!(
                path = %self.path,
                generation,
                seq,
                "Dropping superseded fetch result"
            );
            return;
        }
        self.applied_seq = seq;

        match outcome {
            FetchOutcome::Built(pool) => {
                info!(path = %self.path, size = pool.len(), "Pool refreshed");
                self.set_pool(Some(pool.clone()));
                self.events.publish(LocatorEvent::NewPool {
                    path: self.path.clone(),
                    pool,
                });
                self.drain_queue();
            }
            FetchOutcome::ListFailed(e) if e.is_no_node() => {
                debug!(path = %self.path, "Service path vanished while listing children");
                self.path_missing();
            }
            FetchOutcome::ListFailed(error) => {
                warn!(path = %self.path, error = %error, "Failed to list children");
                self.events.publish(LocatorEvent::FailedToGetChildren {
                    path: self.path.clone(),
                    error,
                });
                // No child watch is armed after a failed listing
                self.stale = true;
                self.set_pool(Some(Vec::new()));
                self.drain_queue();
            }
        }
    }

    fn handle_children_changed(&mut self, generation: u64, event: WatchedEvent) {
        if generation != self.generation {
            return;
        }
        debug!(path = %self.path, event = %event, "Child watch fired, refreshing");
        self.events.publish(LocatorEvent::ChildrenChanged {
            path: self.path.clone(),
            event,
        });
        self.start_fetch();
    }

    /// Marks the path stale and publishes an empty pool.
    fn path_missing(&mut self) {
        self.stale = true;
        warn!(path = %self.path, "Service path not found");
        self.events.publish(LocatorEvent::PathNotFound {
            path: self.path.clone(),
        });
        self.set_pool(Some(Vec::new()));
        self.drain_queue();
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    fn handle_resolve(&mut self, respond_to: oneshot::Sender<LocatorResult<Location>>) {
        if self.stale && self.client.is_some() {
            debug!(path = %self.path, "Path was missing at last check, re-probing");
            self.set_pool(None);
            self.check_exists();
        }

        if self.pool.is_some() {
            let _ = respond_to.send(self.dispatch());
        } else {
            self.enqueue(respond_to);
        }
    }

    fn enqueue(&mut self, respond_to: oneshot::Sender<LocatorResult<Location>>) {
        self.next_request_id += 1;
        let id = self.next_request_id;
        self.queue.push_back(PendingRequest { id, respond_to });
        debug!(
            path = %self.path,
            request_id = id,
            queued = self.queue.len(),
            "Queued request until a pool is available"
        );

        if let Some(timeout) = self.settings.timeout {
            let sender = self.sender.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                send_back(&sender, PoolCommand::RequestTimedOut { request_id: id }).await;
            });
        }
    }

    fn handle_timeout(&mut self, request_id: u64) {
        let Some(position) = self.queue.iter().position(|r| r.id == request_id) else {
            return;
        };
        if let Some(request) = self.queue.remove(position) {
            let timeout_ms = self
                .settings
                .timeout
                .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
            warn!(path = %self.path, request_id, timeout_ms, "Request timed out waiting for a pool");
            let _ = request.respond_to.send(Err(LocatorError::ResolutionTimeout {
                path: self.path.clone(),
                timeout_ms,
            }));
        }
    }

    /// Answers every queued request, oldest first.
    fn drain_queue(&mut self) {
        if !self.queue.is_empty() {
            debug!(path = %self.path, queued = self.queue.len(), "Draining request queue");
        }
        while let Some(request) = self.queue.pop_front() {
            let result = self.dispatch();
            let _ = request.respond_to.send(result);
        }
    }

    fn abandon_queue(&mut self) {
        for request in self.queue.drain(..) {
            let _ = request.respond_to.send(Err(LocatorError::ChannelClosed));
        }
    }

    /// Picks the next location from the effective pool.
    fn dispatch(&mut self) -> LocatorResult<Location> {
        let picked = match self.effective_pool() {
            Some(pool) if !pool.is_empty() => {
                let index = self.cursor % pool.len() as u64;
                usize::try_from(index).ok().and_then(|i| pool.get(i)).cloned()
            }
            _ => None,
        };

        match picked {
            Some(location) => {
                self.cursor = self.cursor.wrapping_add(1);
                Ok(location)
            }
            None => {
                let error = LocatorError::EmptyPool {
                    path: self.path.clone(),
                };
                debug!(path = %self.path, "Dispatch against an empty pool");
                self.events.publish(LocatorEvent::EmptyPool {
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// The live pool, or the cache when the live pool is empty and strict
    /// mode is off.
    fn effective_pool(&self) -> Option<&Vec<Location>> {
        let live = self.pool.as_ref()?;
        if self.settings.strict || !live.is_empty() {
            return Some(live);
        }
        match &self.cached_pool {
            Some(cached) if !cached.is_empty() => Some(cached),
            _ => Some(live),
        }
    }

    /// Replaces the live pool. The cache only takes non-empty pools, except
    /// for the very first assignment.
    fn set_pool(&mut self, pool: Option<Vec<Location>>) {
        let non_empty = pool.as_ref().is_some_and(|p| !p.is_empty());
        if self.cached_pool.is_none() || non_empty {
            self.cached_pool.clone_from(&pool);
        }
        if pool.is_some() {
            self.last_updated = Some(Utc::now());
        }
        self.pool = pool;
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            path: self.path.clone(),
            pool: self.pool.clone(),
            cached_pool: self.cached_pool.clone(),
            queued: self.queue.len(),
            stale: self.stale,
            generation: self.generation,
            session_id: self.session_id,
            last_updated: self.last_updated,
        }
    }
}

// ============================================================================
// Background Work
// ============================================================================

async fn send_back(sender: &mpsc::WeakSender<PoolCommand>, cmd: PoolCommand) {
    if let Some(sender) = sender.upgrade() {
        // The actor may have stopped in the meantime
        let _ = sender.send(cmd).await;
    }
}

/// One list-children-then-fetch-data round.
struct FetchJob {
    client: SharedClient,
    path: String,
    extractor: Arc<dyn DataExtractor>,
    events: EventBus,
    generation: u64,
    seq: u64,
    sender: mpsc::WeakSender<PoolCommand>,
}

impl FetchJob {
    async fn run(self) {
        let outcome = match self.client.get_children(&self.path).await {
            Err(e) => FetchOutcome::ListFailed(e),
            Ok((children, watch)) => {
                let generation = self.generation;
                let watch_sender = self.sender.clone();
                tokio::spawn(async move {
                    if let Some(event) = watch.fired().await {
                        send_back(&watch_sender, PoolCommand::ChildrenChanged { generation, event })
                            .await;
                    }
                });

                debug!(path = %self.path, children = children.len(), "Fetching child payloads");
                FetchOutcome::Built(self.fetch_children(children).await)
            }
        };

        send_back(
            &self.sender,
            PoolCommand::PoolFetched {
                generation: self.generation,
                seq: self.seq,
                outcome,
            },
        )
        .await;
    }

    /// Reads every child concurrently; the result keeps listing order.
    async fn fetch_children(&self, children: Vec<String>) -> Vec<Location> {
        let mut slots: Vec<Option<Location>> = vec![None; children.len()];
        let mut fetches = JoinSet::new();
        for (index, child) in children.into_iter().enumerate() {
            let client = Arc::clone(&self.client);
            let child = child_path(&self.path, &child);
            fetches.spawn(async move {
                let result = client.get_data(&child).await;
                (index, child, result)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, child, Ok(data))) => {
                    let location = self.extractor.extract(&data);
                    if location.is_none() {
                        debug!(child = %child, "Child payload has no usable location, skipping");
                    }
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = location;
                    }
                }
                Ok((_, child, Err(error))) if error.is_no_node() => {
                    debug!(child = %child, "Child removed before its payload was read, skipping");
                }
                Ok((_, child, Err(error))) => {
                    warn!(child = %child, error = %error, "Failed to read child, skipping");
                    self.events.publish(LocatorEvent::FailedToGetChildInfo {
                        path: child,
                        error,
                    });
                }
                Err(e) => warn!(path = %self.path, error = %e, "Child fetch task failed"),
            }
        }

        slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::session::SessionHandle;
    use locator_core::JsonAddressExtractor;
    use locator_coord::{ClientOptions, Connector, CoordError, MemoryEnsemble};

    const STRICT: PoolSettings = PoolSettings {
        timeout: Some(Duration::from_millis(100)),
        strict: true,
    };
    const LENIENT: PoolSettings = PoolSettings {
        timeout: Some(Duration::from_millis(100)),
        strict: false,
    };

    fn actor(settings: PoolSettings) -> (PoolActor, mpsc::Sender<PoolCommand>, EventBus) {
        let (tx, rx) = mpsc::channel(16);
        let session = SessionHandle::new();
        let events = EventBus::new();
        let actor = PoolActor::new(
            "/svc/a".to_string(),
            rx,
            tx.downgrade(),
            session.subscribe(),
            events.clone(),
            Arc::new(JsonAddressExtractor),
            settings,
        );
        (actor, tx, events)
    }

    fn loc(host: &str) -> Location {
        Location::new(host, 8080)
    }

    fn resolve(actor: &mut PoolActor) -> oneshot::Receiver<LocatorResult<Location>> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(PoolCommand::Resolve { respond_to: tx });
        rx
    }

    fn fetched(actor: &mut PoolActor, pool: Vec<Location>) {
        let seq = actor.applied_seq + 1;
        actor.handle_command(PoolCommand::PoolFetched {
            generation: actor.generation,
            seq,
            outcome: FetchOutcome::Built(pool),
        });
    }

    async fn answer(rx: oneshot::Receiver<LocatorResult<Location>>) -> LocatorResult<Location> {
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_requests_queue_while_loading() {
        let (mut actor, _tx, _) = actor(STRICT);

        let mut first = resolve(&mut actor);
        let second = resolve(&mut actor);
        assert!(first.try_recv().is_err());
        assert_eq!(actor.status().queued, 2);

        fetched(&mut actor, vec![loc("a"), loc("b")]);
        assert_eq!(answer(first).await, Ok(loc("a")));
        assert_eq!(answer(second).await, Ok(loc("b")));
        assert_eq!(actor.status().queued, 0);
    }

    #[tokio::test]
    async fn test_round_robin() {
        let (mut actor, _tx, _) = actor(STRICT);
        fetched(&mut actor, vec![loc("a"), loc("b")]);

        assert_eq!(answer(resolve(&mut actor)).await, Ok(loc("a")));
        assert_eq!(answer(resolve(&mut actor)).await, Ok(loc("b")));
        assert_eq!(answer(resolve(&mut actor)).await, Ok(loc("a")));
    }

    #[tokio::test]
    async fn test_cursor_wraps() {
        let (mut actor, _tx, _) = actor(STRICT);
        actor.cursor = u64::MAX;
        fetched(&mut actor, vec![loc("a"), loc("b")]);

        assert_eq!(answer(resolve(&mut actor)).await, Ok(loc("b")));
        assert_eq!(actor.cursor, 0);
        assert_eq!(answer(resolve(&mut actor)).await, Ok(loc("a")));
    }

    #[tokio::test]
    async fn test_strict_empty_pool_fails() {
        let (mut actor, _tx, events) = actor(STRICT);
        let mut rx = events.subscribe();
        fetched(&mut actor, vec![loc("a"), loc("b")]);
        fetched(&mut actor, vec![]);

        let result = answer(resolve(&mut actor)).await;
        assert_eq!(
            result,
            Err(LocatorError::EmptyPool {
                path: "/svc/a".to_string()
            })
        );

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(
            kinds,
            vec![EventKind::NewPool, EventKind::NewPool, EventKind::EmptyPool]
        );
    }

    #[tokio::test]
    async fn test_lenient_falls_back_to_cache() {
        let (mut actor, _tx, _) = actor(LENIENT);
        fetched(&mut actor, vec![loc("a"), loc("b")]);
        fetched(&mut actor, vec![]);

        assert_eq!(answer(resolve(&mut actor)).await, Ok(loc("a")));
        assert_eq!(answer(resolve(&mut actor)).await, Ok(loc("b")));

        let status = actor.status();
        assert_eq!(status.pool, Some(vec![]));
        assert_eq!(status.cached_pool, Some(vec![loc("a"), loc("b")]));
    }

    #[tokio::test]
    async fn test_first_pool_seeds_cache_even_if_empty() {
        let (mut actor, _tx, _) = actor(LENIENT);
        fetched(&mut actor, vec![]);
        assert_eq!(actor.status().cached_pool, Some(vec![]));
        assert!(answer(resolve(&mut actor)).await.is_err());

        fetched(&mut actor, vec![loc("a")]);
        assert_eq!(actor.status().cached_pool, Some(vec![loc("a")]));
    }

    #[tokio::test]
    async fn test_out_of_order_fetch_is_dropped() {
        let (mut actor, _tx, _) = actor(STRICT);
        actor.handle_command(PoolCommand::PoolFetched {
            generation: 0,
            seq: 2,
            outcome: FetchOutcome::Built(vec![loc("new")]),
        });
        actor.handle_command(PoolCommand::PoolFetched {
            generation: 0,
            seq: 1,
            outcome: FetchOutcome::Built(vec![loc("old")]),
        });
        assert_eq!(actor.status().pool, Some(vec![loc("new")]));
    }

    #[tokio::test]
    async fn test_old_generation_results_are_dropped() {
        let (mut actor, _tx, _) = actor(STRICT);
        let ensemble = MemoryEnsemble::new();
        let client = ensemble
            .connector()
            .create_client("zk:2181", &ClientOptions::default())
            .unwrap();
        actor.start_generation(client);
        assert_eq!(actor.generation, 1);

        actor.handle_command(PoolCommand::PoolFetched {
            generation: 0,
            seq: 1,
            outcome: FetchOutcome::Built(vec![loc("old")]),
        });
        actor.handle_command(PoolCommand::ExistsChecked {
            generation: 0,
            result: Ok(false),
        });

        let status = actor.status();
        assert!(status.is_loading());
        assert!(!status.stale);
    }

    #[tokio::test]
    async fn test_timeout_answers_only_that_request() {
        let (mut actor, _tx, _) = actor(STRICT);
        let first = resolve(&mut actor);
        let mut second = resolve(&mut actor);

        actor.handle_command(PoolCommand::RequestTimedOut { request_id: 1 });
        assert_eq!(
            answer(first).await,
            Err(LocatorError::ResolutionTimeout {
                path: "/svc/a".to_string(),
                timeout_ms: 100,
            })
        );
        assert!(second.try_recv().is_err());

        // Unknown or already answered ids are ignored
        actor.handle_command(PoolCommand::RequestTimedOut { request_id: 1 });
        actor.handle_command(PoolCommand::RequestTimedOut { request_id: 99 });
        assert_eq!(actor.status().queued, 1);

        fetched(&mut actor, vec![loc("a")]);
        assert_eq!(answer(second).await, Ok(loc("a")));
    }

    #[tokio::test]
    async fn test_missing_path_marks_stale_and_drains() {
        let (mut actor, _tx, events) = actor(STRICT);
        let mut rx = events.subscribe();
        let pending = resolve(&mut actor);

        actor.handle_command(PoolCommand::ExistsChecked {
            generation: 0,
            result: Ok(false),
        });

        assert!(matches!(
            answer(pending).await,
            Err(LocatorError::EmptyPool { .. })
        ));
        assert!(actor.status().stale);
        assert_eq!(
            rx.try_recv().unwrap(),
            LocatorEvent::PathNotFound {
                path: "/svc/a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_list_failure_publishes_empties_and_marks_stale() {
        let (mut actor, _tx, events) = actor(STRICT);
        let mut rx = events.subscribe();
        actor.handle_command(PoolCommand::PoolFetched {
            generation: 0,
            seq: 1,
            outcome: FetchOutcome::ListFailed(CoordError::ConnectionLoss),
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            LocatorEvent::FailedToGetChildren {
                path: "/svc/a".to_string(),
                error: CoordError::ConnectionLoss,
            }
        );
        assert_eq!(actor.status().pool, Some(vec![]));
        assert!(actor.status().stale);
    }

    #[tokio::test]
    async fn test_list_no_node_marks_stale() {
        let (mut actor, _tx, _) = actor(STRICT);
        actor.handle_command(PoolCommand::PoolFetched {
            generation: 0,
            seq: 1,
            outcome: FetchOutcome::ListFailed(CoordError::NoNode("/svc/a".to_string())),
        });
        assert!(actor.status().stale);
    }

    #[tokio::test]
    async fn test_shutdown_answers_queued_requests() {
        let (mut actor, _tx, _) = actor(STRICT);
        let pending = resolve(&mut actor);
        actor.handle_command(PoolCommand::Shutdown);
        assert_eq!(answer(pending).await, Err(LocatorError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_last_updated_tracks_pool_replacement() {
        let (mut actor, _tx, _) = actor(STRICT);
        assert!(actor.status().last_updated.is_none());
        fetched(&mut actor, vec![loc("a")]);
        assert!(actor.status().last_updated.is_some());
        assert_eq!(actor.status().size(), 1);
    }
}
