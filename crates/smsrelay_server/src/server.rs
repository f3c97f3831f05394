//! Relay server assembly and serving loop.

use crate::config::{ServerConfig, StorageBackend};
use crate::error::ServerResult;
use crate::handler::{HandlerContext, RequestHandler};
use crate::http::{build_router, AppState};
use axum::Router;
use smsrelay_core::{DocumentLog, MemoryLog, NotificationLog, NotificationRelay};
use smsrelay_docstore::{DirDocumentStore, StoreConfig};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// The relay server.
///
/// # Example
///
/// ```
/// use smsrelay_server::{RelayServer, ServerConfig};
///
/// let server = RelayServer::new(ServerConfig::default()).unwrap();
/// let _router = server.router();
/// ```
pub struct RelayServer {
    handler: RequestHandler,
}

impl RelayServer {
    /// Opens the configured backend and builds the relay over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the data
    /// directory cannot be opened.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let log = open_log(&config)?;
        let relay = NotificationRelay::new(log, config.relay_config());
        Ok(Self::with_relay(config, relay))
    }

    /// Creates a server around an existing relay.
    pub fn with_relay(config: ServerConfig, relay: NotificationRelay) -> Self {
        let context = Arc::new(HandlerContext::new(config, relay));
        Self {
            handler: RequestHandler::new(context),
        }
    }

    /// Returns the request handler.
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Returns the relay.
    pub fn relay(&self) -> &NotificationRelay {
        &self.handler.context().relay
    }

    /// Returns the HTTP router.
    pub fn router(&self) -> Router {
        build_router(AppState::new(self.handler.clone()))
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.handler.context().config.bind_addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "smsrelay server listening");

        axum::serve(listener, self.router().into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("smsrelay server stopped");
        Ok(())
    }
}

fn open_log(config: &ServerConfig) -> ServerResult<Arc<dyn NotificationLog>> {
    match &config.backend {
        StorageBackend::Memory => {
            info!(max_queue_length = config.max_queue_length, "using in-memory log");
            Ok(Arc::new(MemoryLog::new(config.log_config())?))
        }
        StorageBackend::Directory(dir) => {
            info!(dir = %dir.display(), max_queue_length = config.max_queue_length, "opening document store");
            let store = DirDocumentStore::open_dir(dir, StoreConfig::default())?;
            Ok(Arc::new(DocumentLog::new(Arc::new(store), config.log_config())?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_backend() {
        let server = RelayServer::new(ServerConfig::default()).unwrap();
        assert!(server.relay().latest("phone").unwrap().is_none());
    }

    #[tokio::test]
    async fn directory_backend_persists() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::default().with_data_dir(dir.path());
        let body = br#"{"address":"+1555","body":"kept","timestamp":7}"#;

        let id = {
            let server = RelayServer::new(config.clone()).unwrap();
            server.handler().handle_post("phone", body).await.unwrap().id
        };

        let server = RelayServer::new(config).unwrap();
        assert_eq!(server.handler().handle_latest("phone").await.unwrap().id, id);
    }

    #[test]
    fn directory_is_locked_while_open() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::default().with_data_dir(dir.path());
        let _first = RelayServer::new(config.clone()).unwrap();
        assert!(RelayServer::new(config).is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ServerConfig::default().with_max_queue_length(0);
        assert!(RelayServer::new(config).is_err());
    }
}
