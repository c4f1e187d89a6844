//! Engine client that survives credential rotation.
//!
//! When a call fails with 401 or 403 the client builds a new connection and
//! retries once. Concurrent failures share one refresh: the first caller
//! starts it and the others await the same shared future. A caller whose
//! failed connection has already been replaced skips refreshing and retries
//! straight away. Refreshes closer together than the cooldown are skipped
//! and the original failure is returned.

use crate::engine::{Connection, ConnectionFactory, EngineError, GetResponse, SearchResponse};
use crate::query::{GetRequest, SearchRequest};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Default minimum interval between two refreshes.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

type SharedRefresh = Shared<BoxFuture<'static, Result<(), EngineError>>>;

struct State {
    connection: Arc<dyn Connection>,
    /// Incremented each time `connection` is replaced.
    generation: u64,
    /// When the last refresh started.
    last_refresh: Option<Instant>,
    in_flight: Option<SharedRefresh>,
}

struct Inner {
    state: Mutex<State>,
    factory: Arc<dyn ConnectionFactory>,
    cooldown: Duration,
}

pub struct ResilientClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("cooldown", &self.inner.cooldown)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refresh {
    /// A new connection is in place, built by us or by a refresh we joined.
    Refreshed,
    /// The connection we used had already been replaced.
    Superseded,
    /// Within the cooldown; nothing was done.
    Throttled,
}

enum Call<'a> {
    Search(&'a SearchRequest),
    Get(&'a GetRequest),
    ClusterHealth,
}

impl Call<'_> {
    async fn dispatch(&self, connection: &dyn Connection) -> Result<Value, EngineError> {
        match self {
            Self::Search(request) => connection.search(request).await,
            Self::Get(request) => connection.get(request).await,
            Self::ClusterHealth => connection.cluster_health().await,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Search(_) => "search",
            Self::Get(_) => "get",
            Self::ClusterHealth => "cluster_health",
        }
    }
}

impl ResilientClient {
    pub fn new(
        connection: Arc<dyn Connection>,
        factory: Arc<dyn ConnectionFactory>,
        cooldown: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    connection,
                    generation: 0,
                    last_refresh: None,
                    in_flight: None,
                }),
                factory,
                cooldown,
            }),
        }
    }

    /// Build the initial connection from `factory`.
    pub async fn connect(
        factory: Arc<dyn ConnectionFactory>,
        cooldown: Duration,
    ) -> Result<Self, EngineError> {
        let connection = factory.connect().await?;
        Ok(Self::new(connection, factory, cooldown))
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, EngineError> {
        decode(self.call(Call::Search(request)).await?)
    }

    pub async fn get(&self, request: &GetRequest) -> Result<GetResponse, EngineError> {
        decode(self.call(Call::Get(request)).await?)
    }

    pub async fn cluster_health(&self) -> Result<Value, EngineError> {
        self.call(Call::ClusterHealth).await
    }

    /// Number of times the connection has been replaced.
    pub async fn generation(&self) -> u64 {
        self.inner.state.lock().await.generation
    }

    async fn current(&self) -> (Arc<dyn Connection>, u64) {
        let state = self.inner.state.lock().await;
        (state.connection.clone(), state.generation)
    }

    async fn call(&self, call: Call<'_>) -> Result<Value, EngineError> {
        let mut attempt = Attempt::First;
        loop {
            let (connection, generation) = self.current().await;
            let err = match call.dispatch(connection.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt == Attempt::Retry || !err.is_auth_failure() {
                return Err(err);
            }

            tracing::warn!(
                call = call.name(),
                status = err.status(),
                generation,
                "Engine rejected credentials"
            );
            match self.refresh(generation).await? {
                Refresh::Throttled => return Err(err),
                Refresh::Refreshed | Refresh::Superseded => attempt = Attempt::Retry,
            }
        }
    }

    /// Make sure the connection of generation `seen` has been replaced.
    async fn refresh(&self, seen: u64) -> Result<Refresh, EngineError> {
        let pending = {
            let mut state = self.inner.state.lock().await;
            if state.generation != seen {
                tracing::debug!(seen, current = state.generation, "Connection already replaced");
                return Ok(Refresh::Superseded);
            }

            if let Some(in_flight) = &state.in_flight {
                tracing::debug!("Awaiting in-flight connection refresh");
                in_flight.clone()
            } else {
                if let Some(last) = state.last_refresh
                    && last.elapsed() < self.inner.cooldown
                {
                    tracing::warn!(
                        since_ms = last.elapsed().as_millis() as u64,
                        "Skipping connection refresh during cooldown"
                    );
                    return Ok(Refresh::Throttled);
                }

                state.last_refresh = Some(Instant::now());
                let refresh = start_refresh(self.inner.clone());
                state.in_flight = Some(refresh.clone());
                refresh
            }
        };

        pending.await?;
        Ok(Refresh::Refreshed)
    }
}

/// Run a refresh on its own task so it completes even if every caller
/// waiting on it goes away.
fn start_refresh(inner: Arc<Inner>) -> SharedRefresh {
    let task = tokio::spawn(async move { inner.replace_connection().await });
    let refresh: BoxFuture<'static, Result<(), EngineError>> = Box::pin(async move {
        match task.await {
            Ok(result) => result,
            Err(err) => Err(EngineError::Refresh(err.to_string())),
        }
    });
    refresh.shared()
}

impl Inner {
    async fn replace_connection(&self) -> Result<(), EngineError> {
        tracing::info!("Refreshing engine connection");

        let fresh = match self.factory.connect().await {
            Ok(fresh) => fresh,
            Err(err) => {
                tracing::error!(error = %err, "Failed to refresh engine connection");
                self.state.lock().await.in_flight = None;
                return Err(EngineError::Refresh(err.to_string()));
            }
        };

        // Publish the new connection before anyone waiting is released.
        let (old, generation) = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.in_flight = None;
            (std::mem::replace(&mut state.connection, fresh), state.generation)
        };
        old.close().await;

        tracing::info!(generation, "Engine connection refreshed");
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, EngineError> {
    serde_json::from_value(value).map_err(|err| EngineError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Answers each call with the next scripted result, then succeeds.
    struct Scripted {
        id: usize,
        script: StdMutex<VecDeque<Result<Value, EngineError>>>,
        calls: AtomicUsize,
        closed: AtomicUsize,
        delay: Duration,
    }

    impl Scripted {
        fn new(id: usize, script: Vec<Result<Value, EngineError>>) -> Arc<Self> {
            Arc::new(Self {
                id,
                script: StdMutex::new(script.into()),
                calls: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn failing(id: usize, status: u16) -> Arc<Self> {
            Self::failing_slowly(id, status, Duration::ZERO)
        }

        fn failing_slowly(id: usize, status: u16, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id,
                script: StdMutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                delay,
            })
            .with_default_failure(status)
        }

        fn with_default_failure(self: Arc<Self>, status: u16) -> Arc<Self> {
            self.script
                .lock()
                .unwrap()
                .extend((0..1000).map(|_| Err(rejected(status))));
            self
        }

        async fn answer(&self) -> Result<Value, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(json!({ "connection": self.id })))
        }
    }

    impl Connection for Scripted {
        fn search<'a>(&'a self, _: &'a SearchRequest) -> BoxFuture<'a, Result<Value, EngineError>> {
            Box::pin(self.answer())
        }

        fn get<'a>(&'a self, _: &'a GetRequest) -> BoxFuture<'a, Result<Value, EngineError>> {
            Box::pin(self.answer())
        }

        fn cluster_health(&self) -> BoxFuture<'_, Result<Value, EngineError>> {
            Box::pin(self.answer())
        }

        fn close(&self) -> BoxFuture<'_, ()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    /// Hands out healthy connections numbered from 1.
    #[derive(Default)]
    struct Factory {
        built: AtomicUsize,
        fail: bool,
    }

    impl ConnectionFactory for Factory {
        fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Connection>, EngineError>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let id = self.built.fetch_add(1, Ordering::SeqCst) + 1;
                if self.fail {
                    return Err(EngineError::Transport {
                        status: None,
                        message: "no route to host".to_string(),
                    });
                }
                Ok(Scripted::new(id, Vec::new()) as Arc<dyn Connection>)
            })
        }
    }

    fn rejected(status: u16) -> EngineError {
        EngineError::Response {
            status,
            reason: "security_exception".to_string(),
        }
    }

    fn client(connection: Arc<Scripted>, factory: Arc<Factory>, cooldown: Duration) -> ResilientClient {
        ResilientClient::new(connection, factory, cooldown)
    }

    #[tokio::test]
    async fn success_needs_no_refresh() {
        let factory = Arc::new(Factory::default());
        let client = client(Scripted::new(0, Vec::new()), factory.clone(), Duration::ZERO);

        check!(client.cluster_health().await == Ok(json!({ "connection": 0 })));
        check!(factory.built.load(Ordering::SeqCst) == 0);
    }

    #[rstest::rstest]
    #[case(401)]
    #[case(403)]
    #[tokio::test]
    async fn auth_failures_refresh_and_retry(#[case] status: u16) {
        let factory = Arc::new(Factory::default());
        let original = Scripted::failing(0, status);
        let client = client(original.clone(), factory.clone(), Duration::ZERO);

        check!(client.cluster_health().await == Ok(json!({ "connection": 1 })));
        check!(factory.built.load(Ordering::SeqCst) == 1);
        check!(original.closed.load(Ordering::SeqCst) == 1);
        check!(client.generation().await == 1);
    }

    #[rstest::rstest]
    #[case(404)]
    #[case(500)]
    #[tokio::test]
    async fn other_failures_are_returned(#[case] status: u16) {
        let factory = Arc::new(Factory::default());
        let client = client(Scripted::failing(0, status), factory.clone(), Duration::ZERO);

        check!(client.cluster_health().await == Err(rejected(status)));
        check!(factory.built.load(Ordering::SeqCst) == 0);
    }

    #[tokio::test]
    async fn retries_only_once() {
        struct Rejecting(AtomicUsize);

        impl ConnectionFactory for Rejecting {
            fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Connection>, EngineError>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(Scripted::failing(9, 401) as Arc<dyn Connection>) })
            }
        }

        let factory = Arc::new(Rejecting(AtomicUsize::new(0)));
        let client = ResilientClient::new(Scripted::failing(0, 401), factory.clone(), Duration::ZERO);

        check!(client.cluster_health().await == Err(rejected(401)));
        check!(factory.0.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn cooldown_skips_back_to_back_refreshes() {
        struct Rejecting(AtomicUsize);

        impl ConnectionFactory for Rejecting {
            fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn Connection>, EngineError>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(Scripted::failing(9, 401) as Arc<dyn Connection>) })
            }
        }

        let factory = Arc::new(Rejecting(AtomicUsize::new(0)));
        let client = ResilientClient::new(
            Scripted::failing(0, 401),
            factory.clone(),
            Duration::from_millis(100),
        );

        // First call refreshes; the second lands inside the cooldown.
        check!(client.cluster_health().await.is_err());
        check!(client.cluster_health().await == Err(rejected(401)));
        check!(factory.0.load(Ordering::SeqCst) == 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        check!(client.cluster_health().await.is_err());
        check!(factory.0.load(Ordering::SeqCst) == 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_share_one_refresh() {
        let factory = Arc::new(Factory::default());
        let original = Scripted::failing_slowly(0, 401, Duration::from_millis(10));
        let client = Arc::new(client(original.clone(), factory.clone(), Duration::ZERO));

        let calls: Vec<_> = (0..10)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.cluster_health().await })
            })
            .collect();

        for call in calls {
            let_assert!(Ok(result) = call.await);
            check!(result == Ok(json!({ "connection": 1 })));
        }
        check!(factory.built.load(Ordering::SeqCst) == 1);
        check!(original.closed.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn stale_failures_retry_without_refreshing() {
        let factory = Arc::new(Factory::default());
        let original = Scripted::failing(0, 401);
        let client = client(original, factory.clone(), Duration::from_secs(60));

        check!(client.cluster_health().await.is_ok());
        // A failure observed on generation 0 after generation 1 is live.
        check!(client.refresh(0).await == Ok(Refresh::Superseded));
        check!(factory.built.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn refresh_failures_are_reported() {
        let factory = Arc::new(Factory {
            built: AtomicUsize::new(0),
            fail: true,
        });
        let client = client(Scripted::failing(0, 401), factory.clone(), Duration::ZERO);

        let_assert!(Err(EngineError::Refresh(message)) = client.cluster_health().await);
        check!(message.contains("no route to host"));
        check!(client.generation().await == 0);
    }

    #[tokio::test]
    async fn responses_are_decoded() {
        let connection = Scripted::new(
            0,
            vec![Ok(json!({ "hits": { "total": { "value": 0 }, "hits": [] } })), Ok(json!({ "nope": true }))],
        );
        let client = client(connection, Arc::new(Factory::default()), Duration::ZERO);
        let request = SearchRequest {
            index: "works".to_string(),
            body: json!({}),
        };

        let_assert!(Ok(response) = client.search(&request).await);
        check!(response.hits.total() == 0);
        let_assert!(Err(EngineError::Decode(_)) = client.search(&request).await);
    }
}
