use std::sync::Arc;

use tracing::info;

use crate::auth::AuthService;
use crate::backend::{Backend, BackendKind, MockBackend, RemoteBackend};
use crate::config::BackendConfig;
use crate::data::DataService;
use crate::notify::{AlertSink, BadgeHost, NotificationCenter};
use crate::store::StoreHandle;
use crate::AppResult;

/// The application context: one backend selected at construction, shared by
/// the auth and data facades. Build it once through `connect` and pass it by
/// reference to whatever needs auth or data access.
pub struct DealDone {
    store: StoreHandle,
    auth: AuthService,
    data: DataService,
    kind: BackendKind,
}

impl DealDone {
    /// Single factory. Resolves the backend configuration against the given
    /// store and selects the remote backing when credentials are present,
    /// the local mock otherwise. Absent configuration is a recognized mode,
    /// not an error.
    pub fn connect(store: StoreHandle) -> AppResult<Self> {
        let backend: Arc<dyn Backend> = match BackendConfig::resolve(&store)? {
            Some(config) => Arc::new(RemoteBackend::new(config)?),
            None => Arc::new(MockBackend::new(store.clone())),
        };
        let kind = backend.kind();
        info!(target: "dealdone", event = "client_connected", backend = kind.as_str());

        Ok(DealDone {
            auth: AuthService::new(backend.clone(), store.clone()),
            data: DataService::new(backend),
            store,
            kind,
        })
    }

    /// Convenience factory over the platform-default store location.
    pub fn connect_default() -> AppResult<Self> {
        Self::connect(StoreHandle::open_default())
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn db(&self) -> &DataService {
        &self.data
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// Builds the notification pipeline against this context. The shell
    /// supplies the badge anchor and the alert capability.
    pub fn notifications(
        &self,
        badge: Arc<dyn BadgeHost>,
        alerts: Arc<dyn AlertSink>,
    ) -> NotificationCenter {
        NotificationCenter::new(self.auth.clone(), self.data.clone(), badge, alerts)
    }
}
