//! Process-wide directory of proxy server instances.

use crate::error::Error;
use crate::persistence::DataAccess;
use crate::server::{ProxyServer, ServerConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Owns every proxy instance in the process, keyed by server id
/// (case-insensitive).
pub struct HostRegistry {
    data_access: Arc<dyn DataAccess>,
    servers: RwLock<HashMap<String, Arc<ProxyServer>>>,
}

impl HostRegistry {
    pub fn new(data_access: Arc<dyn DataAccess>) -> Self {
        Self {
            data_access,
            servers: RwLock::new(HashMap::new()),
        }
    }

    /// Create and register a new stopped instance.
    ///
    /// The upstream host name must be non-empty and the port in 1-65535; a
    /// port already claimed by a registered instance is rejected. The new
    /// instance is persisted before it becomes visible.
    pub fn create(
        &self,
        external_host_name: &str,
        port: u16,
        use_secure_transport: bool,
        auto_start: bool,
    ) -> Result<ServerConfig, Error> {
        if external_host_name.trim().is_empty() {
            return Err(Error::invalid_argument(
                "external host name must not be empty",
            ));
        }
        if port == 0 {
            return Err(Error::invalid_argument(
                "listening port must be in 1-65535",
            ));
        }

        let mut servers = self.servers.write();
        if servers
            .values()
            .any(|server| server.listening_port() == port)
        {
            return Err(Error::PortInUse(port));
        }

        let config = ServerConfig {
            server_id: generate_server_id(),
            external_host_name: external_host_name.to_string(),
            use_secure_transport,
            listening_port: port,
            auto_start,
            ..ServerConfig::default()
        };

        self.data_access.proxy_server_create(config.clone())?;
        let server = ProxyServer::new(config.clone(), self.data_access.clone())?;
        servers.insert(config.server_id.to_lowercase(), server);
        info!(
            "Created proxy server {} for {} on port {}",
            config.server_id, config.external_host_name, config.listening_port
        );
        Ok(config)
    }

    /// Dispose and unregister an instance, removing its persisted record.
    pub async fn delete(&self, server_id: &str) -> Result<(), Error> {
        let server = self
            .servers
            .write()
            .remove(&server_id.to_lowercase())
            .ok_or_else(|| Error::not_found(format!("proxy server {server_id}")))?;

        server.dispose().await;
        self.data_access.proxy_server_delete(server_id)?;
        info!("Deleted proxy server {}", server_id);
        Ok(())
    }

    pub fn find(&self, server_id: &str) -> Result<Arc<ProxyServer>, Error> {
        self.servers
            .read()
            .get(&server_id.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::not_found(format!("proxy server {server_id}")))
    }

    /// Snapshot of every registered instance.
    pub fn find_all(&self) -> Vec<Arc<ProxyServer>> {
        self.servers.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.servers.read().len()
    }

    pub async fn start(&self, server_id: &str) -> Result<(), Error> {
        let server = self.find(server_id)?;
        server.start().await
    }

    pub async fn stop(&self, server_id: &str) -> Result<(), Error> {
        let server = self.find(server_id)?;
        server.shutdown().await
    }

    /// Start every instance marked auto-start. Instances without the flag
    /// stay stopped.
    pub async fn start_all(&self) -> Result<(), Error> {
        for server in self.find_all() {
            if server.auto_start() {
                server.start().await?;
            }
        }
        Ok(())
    }

    /// Stop every running instance. Failures are logged, not propagated, so
    /// one stuck instance cannot keep the rest alive.
    pub async fn stop_all(&self) {
        for server in self.find_all() {
            if let Err(e) = server.shutdown().await {
                warn!("Failed to stop proxy server {}: {}", server.server_id(), e);
            }
        }
    }

    /// Register previously persisted instances, without starting them.
    /// Already-registered ids and unbuildable records are skipped.
    pub fn load(&self) -> Result<usize, Error> {
        let configs = self.data_access.proxy_server_find_all()?;
        let mut restored = 0;
        for config in configs {
            let key = config.server_id.to_lowercase();
            if self.servers.read().contains_key(&key) {
                continue;
            }
            let server = match ProxyServer::new(config.clone(), self.data_access.clone()) {
                Ok(server) => server,
                Err(e) => {
                    warn!("Skipping persisted server {:?}: {}", config.server_id, e);
                    continue;
                }
            };
            if let Err(e) = server.load_stumps() {
                warn!(
                    "Failed to load stumps for server {}: {}",
                    config.server_id, e
                );
            }
            self.servers.write().insert(key, server);
            restored += 1;
        }
        if restored > 0 {
            info!("Loaded {} persisted proxy servers", restored);
        }
        Ok(restored)
    }
}

fn generate_server_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
