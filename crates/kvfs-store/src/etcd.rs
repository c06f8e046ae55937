//! etcd v3 store.
//!
//! Keys are written verbatim. Prefix operations use etcd's range-end
//! encoding, and `move_key` is a single compare-and-swap transaction.

use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{
    Client, Compare, CompareOp, ConnectOptions, DeleteOptions, GetOptions, Txn, TxnOp,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::traits::{KvPair, Store, StoreCapabilities};

/// Store backed by an etcd cluster.
pub struct EtcdStore {
    client: Mutex<Client>,
}

fn etcd_err(e: etcd_client::Error) -> StoreError {
    StoreError::Other(format!("etcd: {}", e))
}

fn to_pair(kv: &etcd_client::KeyValue) -> KvPair {
    KvPair {
        key: String::from_utf8_lossy(kv.key()).into_owned(),
        value: kv.value().to_vec(),
    }
}

impl EtcdStore {
    /// Connect to the given endpoints.
    pub async fn connect(endpoints: &[String], timeout: Duration) -> Result<Self, StoreError> {
        let options = ConnectOptions::new()
            .with_connect_timeout(timeout)
            .with_timeout(timeout);
        let client = Client::connect(endpoints, Some(options))
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                backend: "etcd".to_string(),
                source: Box::new(e),
            })?;
        info!(endpoints = ?endpoints, "connected to etcd");
        Ok(EtcdStore {
            client: Mutex::new(client),
        })
    }
}

#[async_trait]
impl Store for EtcdStore {
    fn name(&self) -> &'static str {
        "etcd"
    }

    async fn get(&self, key: &str) -> Result<KvPair, StoreError> {
        let mut client = self.client.lock().await;
        let resp = client.get(key, None).await.map_err(etcd_err)?;
        resp.kvs()
            .first()
            .map(to_pair)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut client = self.client.lock().await;
        client
            .put(key, value.to_vec(), None)
            .await
            .map_err(etcd_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut client = self.client.lock().await;
        let resp = client.delete(key, None).await.map_err(etcd_err)?;
        if resp.deleted() == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn delete_tree(&self, prefix: &str) -> Result<(), StoreError> {
        let mut client = self.client.lock().await;
        let resp = client
            .delete(prefix, Some(DeleteOptions::new().with_prefix()))
            .await
            .map_err(etcd_err)?;
        debug!(prefix, deleted = resp.deleted(), "etcd delete_tree");
        if resp.deleted() == 0 {
            return Err(StoreError::NotFound(prefix.to_string()));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvPair>, StoreError> {
        let mut client = self.client.lock().await;
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .map_err(etcd_err)?;
        let mut pairs: Vec<KvPair> = resp.kvs().iter().map(to_pair).collect();
        if pairs.is_empty() {
            return Err(StoreError::NotFound(prefix.to_string()));
        }
        pairs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(pairs)
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities { atomic_move: true }
    }

    async fn move_key(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let mut client = self.client.lock().await;
        let current = client.get(from, None).await.map_err(etcd_err)?;
        let kv = current
            .kvs()
            .first()
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        if from == to {
            return Ok(());
        }
        let value = kv.value().to_vec();
        let mod_revision = kv.mod_revision();

        // Only commit if the source is unchanged since it was read.
        let txn = Txn::new()
            .when(vec![Compare::mod_revision(
                from,
                CompareOp::Equal,
                mod_revision,
            )])
            .and_then(vec![TxnOp::put(to, value, None), TxnOp::delete(from, None)]);

        let resp = client.txn(txn).await.map_err(etcd_err)?;
        if !resp.succeeded() {
            return Err(StoreError::Other(format!(
                "etcd: '{}' changed during move",
                from
            )));
        }
        Ok(())
    }
}
