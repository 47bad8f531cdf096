use futures_util::{SinkExt, StreamExt};
use nas_core::api::subscription_channel;
use nas_core::{ApiError, Subscription};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::{debug, info, warn};

use crate::ClientConfig;

const SUBSCRIPTION_BUFFER: usize = 64;
const COLLECTION_UPDATE: &str = "collection_update";

type Pending = HashMap<u64, oneshot::Sender<Result<Value, ApiError>>>;

/// What happened to one collection payload handed to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    /// The subscriber's buffer was full.
    Dropped,
    /// The subscriber is gone.
    Gone,
}

type Deliver = Box<dyn Fn(Result<Value, ApiError>) -> Delivery + Send + Sync>;

struct Route {
    token: u64,
    deliver: Deliver,
    dropped: u64,
}

#[derive(Default)]
struct Tables {
    pending: Pending,
    routes: HashMap<String, Route>,
    closed: bool,
}

struct Shared {
    outbound: mpsc::UnboundedSender<Message>,
    tables: Mutex<Tables>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Inbound {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CollectionUpdate {
    collection: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    fields: Value,
}

/// JSON-RPC 2.0 session over one WebSocket connection.
///
/// A reader task routes responses to waiting callers and collection updates to
/// subscribers; a writer task drains the outbound queue. When the socket ends
/// every waiter and subscriber receives [`ApiError::Closed`].
#[derive(Clone)]
pub struct RpcClient {
    shared: Arc<Shared>,
}

impl RpcClient {
    pub(crate) fn from_outbound(
        outbound: mpsc::UnboundedSender<Message>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                outbound,
                tables: Mutex::new(Tables::default()),
                next_id: AtomicU64::new(1),
                request_timeout,
            }),
        }
    }

    /// Dials the appliance, starts the socket tasks and logs in.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ApiError> {
        let endpoint = config.endpoint()?;
        let connector = if config.tls {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(config.insecure_skip_verify)
                .danger_accept_invalid_hostnames(config.insecure_skip_verify)
                .build()
                .map_err(|err| ApiError::Transport(err.to_string()))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let (socket, _) = connect_async_tls_with_config(endpoint.as_str(), None, false, connector)
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        info!(endpoint = %endpoint, "appliance socket connected");

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let client = Self::from_outbound(outbound_tx, config.request_timeout);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(err) = sink.send(message).await {
                    warn!("rpc_write_error: {err}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = client.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => reader.dispatch(&text),
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "appliance closed socket");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("rpc_read_error: {err}");
                        break;
                    }
                }
            }
            reader.fail_all(ApiError::Closed);
        });

        client.login(&config.username, &config.api_key).await?;
        Ok(client)
    }

    async fn login(&self, username: &str, api_key: &str) -> Result<(), ApiError> {
        let response = self
            .call(
                "auth.login_ex",
                json!([{
                    "mechanism": "API_KEY_PLAIN",
                    "username": username,
                    "api_key": api_key,
                }]),
            )
            .await?;
        match response.get("response_type").and_then(Value::as_str) {
            Some("SUCCESS") => Ok(()),
            Some(other) => Err(ApiError::Auth(other.to_string())),
            None => Err(ApiError::Auth("unexpected login response".to_string())),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.tables().closed
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ApiError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut tables = self.shared.tables();
            if tables.closed {
                return Err(ApiError::Closed);
            }
            tables.pending.insert(id, tx);
        }

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        if self
            .shared
            .outbound
            .send(Message::Text(body.to_string()))
            .is_err()
        {
            self.shared.tables().pending.remove(&id);
            return Err(ApiError::Closed);
        }
        debug!(id, method, "rpc call sent");

        let timeout = self.shared.request_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ApiError::Closed),
            Err(_) => {
                self.shared.tables().pending.remove(&id);
                Err(ApiError::Timeout(timeout))
            }
        }
    }

    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ApiError> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribes to a collection and decodes each update with `decode`.
    ///
    /// The route is registered before `core.subscribe` is sent so the first
    /// update cannot race past it. Closing the handle unregisters the route
    /// and sends `core.unsubscribe` in the background.
    pub async fn subscribe<T, F>(
        &self,
        collection: &str,
        decode: F,
    ) -> Result<Subscription<T>, ApiError>
    where
        T: Send + 'static,
        F: Fn(Value) -> Result<T, ApiError> + Send + Sync + 'static,
    {
        let (tx, subscription) = subscription_channel::<T>(SUBSCRIPTION_BUFFER);
        let token = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let deliver: Deliver = Box::new(move |payload| {
            let item = payload.and_then(&decode);
            match tx.try_send(item) {
                Ok(()) => Delivery::Sent,
                Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
                Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Gone,
            }
        });
        {
            let mut tables = self.shared.tables();
            if tables.closed {
                return Err(ApiError::Closed);
            }
            tables
                .routes
                .insert(
                    collection.to_string(),
                    Route {
                        token,
                        deliver,
                        dropped: 0,
                    },
                );
        }

        let subscription_id = match self.call("core.subscribe", json!([collection])).await {
            Ok(id) => id,
            Err(err) => {
                self.release_route(collection, token);
                return Err(err);
            }
        };

        let client = self.clone();
        let name = collection.to_string();
        Ok(subscription.with_closer(move || {
            client.release_route(&name, token);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(err) = client
                        .call("core.unsubscribe", json!([subscription_id]))
                        .await
                    {
                        debug!(collection = %name, "unsubscribe failed: {err}");
                    }
                });
            }
        }))
    }

    fn release_route(&self, collection: &str, token: u64) {
        let mut tables = self.shared.tables();
        if tables
            .routes
            .get(collection)
            .is_some_and(|route| route.token == token)
        {
            tables.routes.remove(collection);
        }
    }

    pub(crate) fn dispatch(&self, text: &str) {
        let frame: Inbound = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("rpc_decode_error: {err}");
                return;
            }
        };

        if let Some(id) = frame.id {
            let outcome = match frame.error {
                Some(err) => Err(ApiError::Rpc {
                    code: err.code,
                    message: err.message,
                }),
                None => Ok(frame.result.unwrap_or(Value::Null)),
            };
            let waiter = self.shared.tables().pending.remove(&id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(outcome);
                }
                None => debug!(id, "response for unknown request"),
            }
            return;
        }

        if frame.method.as_deref() != Some(COLLECTION_UPDATE) {
            return;
        }
        let Some(params) = frame.params else {
            return;
        };
        let update: CollectionUpdate = match serde_json::from_value(params) {
            Ok(update) => update,
            Err(err) => {
                warn!("collection_update_decode_error: {err}");
                return;
            }
        };
        if update.msg == "removed" {
            return;
        }

        let mut tables = self.shared.tables();
        let Some(route) = tables.routes.get_mut(&update.collection) else {
            return;
        };
        match (route.deliver)(Ok(update.fields)) {
            Delivery::Sent => {}
            Delivery::Dropped => {
                route.dropped += 1;
                warn!(
                    collection = %update.collection,
                    dropped = route.dropped,
                    "subscriber lagging; dropped update"
                );
            }
            Delivery::Gone => {
                tables.routes.remove(&update.collection);
            }
        }
    }

    #[cfg(test)]
    fn dropped_updates(&self, collection: &str) -> Option<u64> {
        self.shared
            .tables()
            .routes
            .get(collection)
            .map(|route| route.dropped)
    }

    pub(crate) fn fail_all(&self, err: ApiError) {
        let (pending, routes) = {
            let mut tables = self.shared.tables();
            tables.closed = true;
            (
                std::mem::take(&mut tables.pending),
                std::mem::take(&mut tables.routes),
            )
        };
        for (_, tx) in pending {
            let _ = tx.send(Err(err.clone()));
        }
        for (_, route) in routes {
            (route.deliver)(Err(err.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn sent_request(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        loop {
            match rx.try_recv() {
                Ok(Message::Text(text)) => return serde_json::from_str(&text).expect("json"),
                Ok(other) => panic!("unexpected frame {other:?}"),
                Err(mpsc::error::TryRecvError::Empty) => tokio::task::yield_now().await,
                Err(mpsc::error::TryRecvError::Disconnected) => panic!("outbound closed"),
            }
        }
    }

    #[tokio::test]
    async fn call_resolves_with_matching_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = RpcClient::from_outbound(tx, Duration::from_secs(5));

        let caller = client.clone();
        let call = tokio::spawn(async move { caller.call("system.version", json!([])).await });
        let request = sent_request(&mut rx).await;
        assert_eq!(request["method"], "system.version");
        let id = request["id"].as_u64().expect("id");
        client.dispatch(&json!({"jsonrpc": "2.0", "id": id, "result": "TrueNAS-25.04"}).to_string());

        let value = call.await.expect("join").expect("result");
        assert_eq!(value, json!("TrueNAS-25.04"));
    }

    #[tokio::test]
    async fn rpc_error_maps_to_api_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = RpcClient::from_outbound(tx, Duration::from_secs(5));

        let caller = client.clone();
        let call = tokio::spawn(async move { caller.call("zfs.snapshot.query", json!([])).await });
        let id = sent_request(&mut rx).await["id"].as_u64().expect("id");
        client.dispatch(
            &json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "Method not found"}
            })
            .to_string(),
        );

        let err = call.await.expect("join").expect_err("rpc error");
        assert!(err.is_method_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn call_times_out_without_response() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = RpcClient::from_outbound(tx, Duration::from_millis(50));
        let err = client.call("pool.query", json!([])).await.expect_err("timeout");
        assert_eq!(err, ApiError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn subscription_receives_collection_updates_then_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = RpcClient::from_outbound(tx, Duration::from_secs(5));

        let subscriber = client.clone();
        let pending = tokio::spawn(async move {
            subscriber
                .subscribe("reporting.realtime", |fields| Ok(fields))
                .await
        });
        let id = sent_request(&mut rx).await["id"].as_u64().expect("id");
        client.dispatch(&json!({"jsonrpc": "2.0", "id": id, "result": "sub-1"}).to_string());
        let mut subscription = pending.await.expect("join").expect("subscribed");

        client.dispatch(
            &json!({
                "jsonrpc": "2.0",
                "method": "collection_update",
                "params": {"msg": "changed", "collection": "reporting.realtime", "fields": {"n": 1}}
            })
            .to_string(),
        );
        let update = subscription.recv().await.expect("update").expect("ok");
        assert_eq!(update, json!({"n": 1}));

        client.fail_all(ApiError::Closed);
        assert_eq!(subscription.recv().await, Some(Err(ApiError::Closed)));
        assert_eq!(subscription.recv().await, None);
        assert!(client.is_closed());
    }

    fn realtime_update(n: u64) -> String {
        json!({
            "jsonrpc": "2.0",
            "method": "collection_update",
            "params": {"msg": "changed", "collection": "reporting.realtime", "fields": {"n": n}}
        })
        .to_string()
    }

    #[tokio::test]
    async fn full_subscriber_buffer_counts_dropped_updates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = RpcClient::from_outbound(tx, Duration::from_secs(5));

        let subscriber = client.clone();
        let pending = tokio::spawn(async move {
            subscriber
                .subscribe("reporting.realtime", |fields| Ok(fields))
                .await
        });
        let id = sent_request(&mut rx).await["id"].as_u64().expect("id");
        client.dispatch(&json!({"jsonrpc": "2.0", "id": id, "result": "sub-1"}).to_string());
        let mut subscription = pending.await.expect("join").expect("subscribed");

        let overflow = 3;
        for n in 0..SUBSCRIPTION_BUFFER as u64 + overflow {
            client.dispatch(&realtime_update(n));
        }
        assert_eq!(client.dropped_updates("reporting.realtime"), Some(overflow));

        let first = subscription.recv().await.expect("update").expect("ok");
        assert_eq!(first, json!({"n": 0}));
        client.dispatch(&realtime_update(99));
        assert_eq!(client.dropped_updates("reporting.realtime"), Some(overflow));
    }

    #[tokio::test]
    async fn calls_after_close_fail_fast() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = RpcClient::from_outbound(tx, Duration::from_secs(5));
        client.fail_all(ApiError::Closed);
        let err = client.call("pool.query", json!([])).await.expect_err("closed");
        assert_eq!(err, ApiError::Closed);
    }
}
