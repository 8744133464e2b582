//! Persistence collaborator.
//!
//! The runtime does not own an on-disk format; it depends on this trait and
//! treats whatever comes back as plain records. [`InMemoryDataAccess`] is the
//! bundled implementation, used by the binary and by tests.

mod inmemory;

pub use inmemory::InMemoryDataAccess;

use crate::server::ServerConfig;
use crate::stump::StumpContract;
use anyhow::Result;
use bytes::Bytes;

/// Storage operations the proxy runtime requires from its host.
///
/// Implementations may block; callers invoke these from administrative
/// paths, never from the request pipeline. Failures propagate to the
/// administrative caller as persistence errors.
pub trait DataAccess: Send + Sync {
    fn proxy_server_find(&self, server_id: &str) -> Result<Option<ServerConfig>>;

    fn proxy_server_find_all(&self) -> Result<Vec<ServerConfig>>;

    fn proxy_server_create(&self, entity: ServerConfig) -> Result<()>;

    fn proxy_server_delete(&self, server_id: &str) -> Result<()>;

    fn stump_find_all(&self, server_id: &str) -> Result<Vec<StumpContract>>;

    /// Persist a stump. The matched request body (captured when a stump is
    /// generated from a recorded exchange) and the canned response body
    /// travel separately so an implementation can store large blobs outside
    /// the contract record.
    fn stump_create(
        &self,
        server_id: &str,
        entity: StumpContract,
        request_body: Option<Bytes>,
        response_body: Option<Bytes>,
    ) -> Result<()>;

    fn stump_delete(&self, server_id: &str, stump_id: &str) -> Result<()>;
}
