use async_trait::async_trait;
use nas_core::{
    ApiError, App, AppService, AppStats, Dataset, DatasetService, InterfaceService,
    NetworkInterface, Pool, RealtimeUpdate, ReportingService, Services, Snapshot, SnapshotService,
    Subscription, SystemInfo, SystemService,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::rpc::RpcClient;
use crate::wire;

/// Implements every service seam on top of one [`RpcClient`].
#[derive(Clone)]
pub struct ApplianceApi {
    client: RpcClient,
}

impl ApplianceApi {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    pub fn services(self) -> Services {
        let api = Arc::new(self);
        Services {
            datasets: api.clone(),
            snapshots: api.clone(),
            system: api.clone(),
            reporting: api.clone(),
            interfaces: api.clone(),
            apps: api,
        }
    }
}

#[async_trait]
impl DatasetService for ApplianceApi {
    async fn list_pools(&self) -> Result<Vec<Pool>, ApiError> {
        wire::pools(self.client.call("pool.query", json!([])).await?)
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, ApiError> {
        let params = json!([[], {"extra": {"flat": true, "retrieve_children": true}}]);
        wire::datasets(self.client.call("pool.dataset.query", params).await?)
    }
}

#[async_trait]
impl SnapshotService for ApplianceApi {
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, ApiError> {
        let params = json!([[], {"extra": {"properties": ["used", "referenced", "userrefs"], "holds": true}}]);
        match self.client.call("pool.snapshot.query", params.clone()).await {
            Ok(value) => wire::snapshots(value),
            Err(err) if err.is_method_not_found() => {
                info!("pool.snapshot.query unavailable; using zfs.snapshot.query");
                wire::snapshots(self.client.call("zfs.snapshot.query", params).await?)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl SystemService for ApplianceApi {
    async fn info(&self) -> Result<SystemInfo, ApiError> {
        wire::system_info(self.client.call("system.info", json!([])).await?)
    }

    async fn version(&self) -> Result<String, ApiError> {
        self.client.call_as("system.version", json!([])).await
    }
}

#[async_trait]
impl InterfaceService for ApplianceApi {
    async fn list_interfaces(&self) -> Result<Vec<NetworkInterface>, ApiError> {
        wire::interfaces(self.client.call("interface.query", json!([])).await?)
    }
}

#[async_trait]
impl ReportingService for ApplianceApi {
    async fn subscribe_realtime(&self) -> Result<Subscription<RealtimeUpdate>, ApiError> {
        self.client
            .subscribe("reporting.realtime", wire::realtime)
            .await
    }
}

#[async_trait]
impl AppService for ApplianceApi {
    async fn list_apps(&self) -> Result<Vec<App>, ApiError> {
        wire::apps(self.client.call("app.query", json!([])).await?)
    }

    async fn subscribe_stats(&self) -> Result<Subscription<Vec<AppStats>>, ApiError> {
        self.client.subscribe("app.stats", wire::app_stats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    async fn next_request(rx: &mut mpsc::UnboundedReceiver<Message>) -> serde_json::Value {
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
    async fn snapshots_fall_back_when_method_missing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = RpcClient::from_outbound(tx, std::time::Duration::from_secs(5));
        let services = ApplianceApi::new(client.clone()).services();

        let call = tokio::spawn(async move { services.snapshots.list_snapshots().await });

        let first = next_request(&mut rx).await;
        assert_eq!(first["method"], "pool.snapshot.query");
        client.dispatch(
            &json!({
                "jsonrpc": "2.0",
                "id": first["id"],
                "error": {"code": -32601, "message": "Method not found"}
            })
            .to_string(),
        );

        let second = next_request(&mut rx).await;
        assert_eq!(second["method"], "zfs.snapshot.query");
        client.dispatch(
            &json!({
                "jsonrpc": "2.0",
                "id": second["id"],
                "result": [{"id": "tank@daily", "properties": {"used": {"parsed": 1}}}]
            })
            .to_string(),
        );

        let snapshots = call.await.expect("join").expect("snapshots");
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].snapshot_name, "daily");
    }

    #[tokio::test]
    async fn other_snapshot_errors_do_not_fall_back() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = RpcClient::from_outbound(tx, std::time::Duration::from_secs(5));
        let api = ApplianceApi::new(client.clone());

        let call = tokio::spawn(async move { api.list_snapshots().await });
        let first = next_request(&mut rx).await;
        client.dispatch(
            &json!({
                "jsonrpc": "2.0",
                "id": first["id"],
                "error": {"code": 13, "message": "EACCES"}
            })
            .to_string(),
        );

        let err = call.await.expect("join").expect_err("rpc error");
        assert_eq!(
            err,
            ApiError::Rpc {
                code: 13,
                message: "EACCES".to_string()
            }
        );
    }
}
