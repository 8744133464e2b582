//! Per-instance stump registry.

use super::{Stump, StumpContract};
use crate::error::Error;
use crate::persistence::DataAccess;
use crate::recording::RecordedContext;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

struct StumpEntry {
    contract: StumpContract,
    stump: Arc<Stump>,
}

#[derive(Default)]
struct Inner {
    /// Insertion-ordered entries; this order is the match tie-break.
    entries: Vec<StumpEntry>,
    by_id: HashMap<String, Arc<Stump>>,
}

/// Ordered directory of the stumps registered on one instance.
///
/// Single-writer/multiple-reader: creates and deletes take the write lock,
/// lookups and snapshots take the read lock. The lock is not reentrant, so
/// no method calls back into another registry method while holding it.
pub struct StumpRegistry {
    server_id: String,
    data_access: Arc<dyn DataAccess>,
    inner: RwLock<Inner>,
}

impl StumpRegistry {
    pub fn new(server_id: &str, data_access: Arc<dyn DataAccess>) -> Self {
        Self {
            server_id: server_id.to_string(),
            data_access,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register a new stump from its contract.
    ///
    /// Assigns an id when the contract carries none, enforces
    /// case-insensitive name uniqueness, persists through the data-access
    /// collaborator, and returns the completed contract.
    pub fn create_stump(&self, contract: StumpContract) -> Result<StumpContract, Error> {
        self.register(contract, None)
    }

    /// Describe a recorded exchange as a stump and register it. The
    /// recorded request body is persisted alongside the contract so the
    /// collaborator can store the blob out of band.
    pub fn create_stump_from_recording(
        &self,
        name: &str,
        context: &RecordedContext,
    ) -> Result<StumpContract, Error> {
        let contract = StumpContract::from_recording(name, context);
        let request_body = if context.request.body.is_empty() {
            None
        } else {
            Some(context.request.body.clone())
        };
        self.register(contract, request_body)
    }

    fn register(
        &self,
        mut contract: StumpContract,
        request_body: Option<Bytes>,
    ) -> Result<StumpContract, Error> {
        if contract.stump_name.trim().is_empty() {
            return Err(Error::invalid_argument("stump name must not be empty"));
        }

        let mut inner = self.inner.write();
        if Self::name_taken(&inner, &contract.stump_name) {
            return Err(Error::invalid_argument(format!(
                "a stump named {:?} already exists",
                contract.stump_name
            )));
        }

        let stump = Arc::new(Stump::from_contract(&contract)?);
        if inner.by_id.contains_key(stump.id()) {
            return Err(Error::invalid_argument(format!(
                "a stump with id {:?} already exists",
                stump.id()
            )));
        }
        contract.stump_id = Some(stump.id().to_string());

        let response_body = contract.response.as_ref().map(|r| r.body.clone());
        self.data_access
            .stump_create(&self.server_id, contract.clone(), request_body, response_body)?;

        inner.by_id.insert(stump.id().to_string(), stump.clone());
        inner.entries.push(StumpEntry {
            contract: contract.clone(),
            stump,
        });
        debug!(
            "Registered stump {:?} on server {}",
            contract.stump_name, self.server_id
        );
        Ok(contract)
    }

    /// Remove a stump by id. Unknown ids fail with `NotFound`.
    pub fn delete_stump(&self, stump_id: &str) -> Result<(), Error> {
        let mut inner = self.inner.write();
        let position = inner
            .entries
            .iter()
            .position(|entry| entry.stump.id() == stump_id)
            .ok_or_else(|| Error::not_found(format!("stump {stump_id}")))?;

        self.data_access.stump_delete(&self.server_id, stump_id)?;

        inner.entries.remove(position);
        inner.by_id.remove(stump_id);
        debug!("Deleted stump {} on server {}", stump_id, self.server_id);
        Ok(())
    }

    pub fn find_stump(&self, stump_id: &str) -> Result<Arc<Stump>, Error> {
        self.inner
            .read()
            .by_id
            .get(stump_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("stump {stump_id}")))
    }

    /// Owned snapshot of every contract, in insertion order. Safe to iterate
    /// while other threads mutate the registry.
    pub fn find_all_contracts(&self) -> Vec<StumpContract> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|entry| entry.contract.clone())
            .collect()
    }

    /// Case-insensitive name check.
    pub fn stump_name_exists(&self, name: &str) -> bool {
        Self::name_taken(&self.inner.read(), name)
    }

    pub fn count(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Snapshot of the live stumps in evaluation order. The pipeline takes
    /// one of these at the start of each request; later mutations are not
    /// visible to a request already in flight.
    pub fn snapshot(&self) -> Vec<Arc<Stump>> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|entry| entry.stump.clone())
            .collect()
    }

    /// Restore stumps previously persisted for this server. Contracts that
    /// no longer materialize are skipped with a warning.
    pub fn load(&self) -> Result<usize, Error> {
        let contracts = self.data_access.stump_find_all(&self.server_id)?;
        let mut inner = self.inner.write();
        let mut restored = 0;
        for contract in contracts {
            match Stump::from_contract(&contract) {
                Ok(stump) => {
                    let stump = Arc::new(stump);
                    inner.by_id.insert(stump.id().to_string(), stump.clone());
                    inner.entries.push(StumpEntry { contract, stump });
                    restored += 1;
                }
                Err(e) => {
                    warn!(
                        "Skipping persisted stump {:?} on server {}: {}",
                        contract.stump_name, self.server_id, e
                    );
                }
            }
        }
        Ok(restored)
    }

    fn name_taken(inner: &Inner, name: &str) -> bool {
        inner
            .entries
            .iter()
            .any(|entry| entry.stump.name().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryDataAccess;
    use crate::rules::RuleContract;
    use crate::stump::CannedResponse;

    fn registry() -> StumpRegistry {
        StumpRegistry::new("srv-1", Arc::new(InMemoryDataAccess::new()))
    }

    fn contract(name: &str) -> StumpContract {
        StumpContract {
            stump_id: None,
            stump_name: name.to_string(),
            rules: vec![RuleContract::PathMatches {
                pattern: "/ping".to_string(),
            }],
            response: Some(CannedResponse::new(200, "OK").unwrap()),
        }
    }

    #[test]
    fn test_create_assigns_id() {
        let registry = registry();
        let created = registry.create_stump(contract("ping")).unwrap();
        let id = created.stump_id.expect("id assigned");
        assert!(!id.is_empty());
        assert_eq!(registry.find_stump(&id).unwrap().name(), "ping");
    }

    #[test]
    fn test_duplicate_name_rejected_case_insensitively() {
        let registry = registry();
        registry.create_stump(contract("Foo")).unwrap();

        let result = registry.create_stump(contract("foo"));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_name_exists_is_case_insensitive() {
        let registry = registry();
        registry.create_stump(contract("Widget")).unwrap();
        assert!(registry.stump_name_exists("widget"));
        assert!(registry.stump_name_exists("WIDGET"));
        assert!(!registry.stump_name_exists("gadget"));
    }

    #[test]
    fn test_delete_removes_everywhere() {
        let registry = registry();
        let id = registry
            .create_stump(contract("ping"))
            .unwrap()
            .stump_id
            .unwrap();
        assert_eq!(registry.count(), 1);

        registry.delete_stump(&id).unwrap();
        assert_eq!(registry.count(), 0);
        assert!(matches!(registry.find_stump(&id), Err(Error::NotFound(_))));
        assert!(registry
            .find_all_contracts()
            .iter()
            .all(|c| c.stump_id.as_deref() != Some(id.as_str())));
    }

    #[test]
    fn test_delete_unknown_id_is_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.delete_stump("missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_contract_snapshot_is_stable() {
        let registry = registry();
        registry.create_stump(contract("first")).unwrap();

        let snapshot = registry.find_all_contracts();
        registry.create_stump(contract("second")).unwrap();
        let id = snapshot[0].stump_id.clone().unwrap();
        registry.delete_stump(&id).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].stump_name, "first");
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let registry = registry();
        registry.create_stump(contract("a")).unwrap();
        registry.create_stump(contract("b")).unwrap();
        registry.create_stump(contract("c")).unwrap();

        let names: Vec<_> = registry
            .snapshot()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_create_from_recording_persists_request_body() {
        use crate::recording::{
            BodyClass, RecordedContext, RecordedRequest, RecordedResponse, ResponseOrigin,
        };
        use bytes::Bytes;

        let data: Arc<InMemoryDataAccess> = Arc::new(InMemoryDataAccess::new());
        let registry = StumpRegistry::new("srv-1", data.clone());

        let recorded_request = RecordedRequest {
            remote_addr: "127.0.0.1:50000".to_string(),
            method: "POST".to_string(),
            path: "/orders".to_string(),
            query: None,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from_static(b"{\"id\": 7}"),
            body_class: BodyClass::Text,
        };
        let recorded_response = RecordedResponse {
            status_code: 201,
            status_description: "Created".to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from_static(b"{\"ok\": true}"),
            body_class: BodyClass::Text,
            origin: ResponseOrigin::Proxy,
        };
        let context = RecordedContext::new(recorded_request.clone(), recorded_response);

        let created = registry
            .create_stump_from_recording("replayed order", &context)
            .unwrap();
        let id = created.stump_id.unwrap();

        let stump = registry.find_stump(&id).unwrap();
        assert!(stump.is_match(&recorded_request));

        let (request_body, response_body) = data.stump_bodies("srv-1", &id).unwrap();
        assert_eq!(request_body.unwrap().as_ref(), b"{\"id\": 7}");
        assert_eq!(response_body.unwrap().as_ref(), b"{\"ok\": true}");
    }

    #[test]
    fn test_load_restores_persisted_stumps() {
        let data: Arc<InMemoryDataAccess> = Arc::new(InMemoryDataAccess::new());
        let registry = StumpRegistry::new("srv-1", data.clone());
        registry.create_stump(contract("ping")).unwrap();

        let reloaded = StumpRegistry::new("srv-1", data);
        assert_eq!(reloaded.load().unwrap(), 1);
        assert_eq!(reloaded.count(), 1);
        assert!(reloaded.stump_name_exists("ping"));
    }
}
