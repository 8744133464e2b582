//! In-memory implementation of the data-access collaborator.
//!
//! Useful for testing, development, and hosts that do not need durable
//! stump storage.

use super::DataAccess;
use crate::server::ServerConfig;
use crate::stump::StumpContract;
use anyhow::Result;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct Store {
    servers: HashMap<String, ServerConfig>,
    /// Stumps and their detached body blobs, keyed by server id.
    stumps: HashMap<String, Vec<StumpRecord>>,
}

struct StumpRecord {
    contract: StumpContract,
    request_body: Option<Bytes>,
    response_body: Option<Bytes>,
}

/// HashMap-backed [`DataAccess`] implementation.
#[derive(Default)]
pub struct InMemoryDataAccess {
    store: Mutex<Store>,
}

impl InMemoryDataAccess {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(server_id: &str) -> String {
        server_id.to_lowercase()
    }

    /// The body blobs stored with a stump: `(request_body, response_body)`.
    pub fn stump_bodies(
        &self,
        server_id: &str,
        stump_id: &str,
    ) -> Option<(Option<Bytes>, Option<Bytes>)> {
        let store = self.store.lock();
        store
            .stumps
            .get(&Self::key(server_id))?
            .iter()
            .find(|r| r.contract.stump_id.as_deref() == Some(stump_id))
            .map(|r| (r.request_body.clone(), r.response_body.clone()))
    }
}

impl DataAccess for InMemoryDataAccess {
    fn proxy_server_find(&self, server_id: &str) -> Result<Option<ServerConfig>> {
        let store = self.store.lock();
        Ok(store.servers.get(&Self::key(server_id)).cloned())
    }

    fn proxy_server_find_all(&self) -> Result<Vec<ServerConfig>> {
        let store = self.store.lock();
        Ok(store.servers.values().cloned().collect())
    }

    fn proxy_server_create(&self, entity: ServerConfig) -> Result<()> {
        let mut store = self.store.lock();
        store.servers.insert(Self::key(&entity.server_id), entity);
        Ok(())
    }

    fn proxy_server_delete(&self, server_id: &str) -> Result<()> {
        let mut store = self.store.lock();
        store.servers.remove(&Self::key(server_id));
        store.stumps.remove(&Self::key(server_id));
        Ok(())
    }

    fn stump_find_all(&self, server_id: &str) -> Result<Vec<StumpContract>> {
        let store = self.store.lock();
        Ok(store
            .stumps
            .get(&Self::key(server_id))
            .map(|records| records.iter().map(|r| r.contract.clone()).collect())
            .unwrap_or_default())
    }

    fn stump_create(
        &self,
        server_id: &str,
        entity: StumpContract,
        request_body: Option<Bytes>,
        response_body: Option<Bytes>,
    ) -> Result<()> {
        let mut store = self.store.lock();
        store
            .stumps
            .entry(Self::key(server_id))
            .or_default()
            .push(StumpRecord {
                contract: entity,
                request_body,
                response_body,
            });
        Ok(())
    }

    fn stump_delete(&self, server_id: &str, stump_id: &str) -> Result<()> {
        let mut store = self.store.lock();
        if let Some(records) = store.stumps.get_mut(&Self::key(server_id)) {
            records.retain(|r| r.contract.stump_id.as_deref() != Some(stump_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str) -> ServerConfig {
        ServerConfig {
            server_id: id.to_string(),
            external_host_name: "example.invalid".to_string(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_server_round_trip() {
        let data = InMemoryDataAccess::new();
        data.proxy_server_create(config("srv-1")).unwrap();

        let found = data.proxy_server_find("SRV-1").unwrap();
        assert_eq!(found.unwrap().server_id, "srv-1");
        assert_eq!(data.proxy_server_find_all().unwrap().len(), 1);

        data.proxy_server_delete("srv-1").unwrap();
        assert!(data.proxy_server_find("srv-1").unwrap().is_none());
    }

    #[test]
    fn test_stump_round_trip() {
        let data = InMemoryDataAccess::new();
        let contract = StumpContract {
            stump_id: Some("st-1".to_string()),
            stump_name: "ping".to_string(),
            rules: Vec::new(),
            response: None,
        };
        data.stump_create(
            "srv-1",
            contract,
            Some(Bytes::from_static(b"ping")),
            Some(Bytes::from_static(b"pong")),
        )
        .unwrap();

        let stumps = data.stump_find_all("srv-1").unwrap();
        assert_eq!(stumps.len(), 1);
        assert_eq!(stumps[0].stump_name, "ping");

        let (request_body, response_body) = data.stump_bodies("srv-1", "st-1").unwrap();
        assert_eq!(request_body.unwrap().as_ref(), b"ping");
        assert_eq!(response_body.unwrap().as_ref(), b"pong");

        data.stump_delete("srv-1", "st-1").unwrap();
        assert!(data.stump_find_all("srv-1").unwrap().is_empty());
        assert!(data.stump_bodies("srv-1", "st-1").is_none());
    }

    #[test]
    fn test_deleting_server_drops_its_stumps() {
        let data = InMemoryDataAccess::new();
        data.proxy_server_create(config("srv-1")).unwrap();
        let contract = StumpContract {
            stump_id: Some("st-1".to_string()),
            stump_name: "ping".to_string(),
            rules: Vec::new(),
            response: None,
        };
        data.stump_create("srv-1", contract, None, None).unwrap();

        data.proxy_server_delete("srv-1").unwrap();
        assert!(data.stump_find_all("srv-1").unwrap().is_empty());
    }
}
