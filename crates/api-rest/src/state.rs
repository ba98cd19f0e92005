//! Shared handler state and the bearer token registry.

use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use portal_core::{
    Account, CatalogService, CoreConfig, DocumentStore, HistoryService, IdentityProvider,
    LivenessToken, PatientDirectory, Session,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Creates one identity provider client per signed-in token.
pub type IdentityClients = Arc<dyn Fn() -> Arc<dyn IdentityProvider> + Send + Sync>;

/// Default seconds a bearer token may go unused before it is revoked.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

struct LiveSession {
    session: Arc<Session>,
    token: LivenessToken,
    last_seen: Instant,
}

impl LiveSession {
    fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.duration_since(self.last_seen) >= idle_timeout
    }
}

type Registry = HashMap<Uuid, LiveSession>;

/// Drops every session idle for `idle_timeout` and stops following its identity client.
fn sweep(sessions: &mut Registry, now: Instant, idle_timeout: Duration) {
    let before = sessions.len();
    sessions.retain(|_, live| {
        let keep = !live.is_idle(now, idle_timeout);
        if !keep {
            live.token.cancel();
        }
        keep
    });
    let expired = before - sessions.len();
    if expired > 0 {
        tracing::info!(expired, "expired idle sessions");
    }
}

/// Application state for the REST API server
///
/// Holds the startup configuration, the document store and every live session keyed by its
/// bearer token. Each session owns its own identity provider client. A token unused for the
/// idle timeout is revoked on the next registry access.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn DocumentStore>,
    identity_clients: IdentityClients,
    sessions: Arc<RwLock<Registry>>,
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn DocumentStore>,
        identity_clients: IdentityClients,
    ) -> Self {
        Self {
            cfg,
            store,
            identity_clients,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn cfg(&self) -> Arc<CoreConfig> {
        self.cfg.clone()
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.cfg.clone(), self.store.clone())
    }

    pub fn history(&self) -> HistoryService {
        HistoryService::new(self.store.clone())
    }

    pub fn patients(&self) -> PatientDirectory {
        PatientDirectory::new(self.store.clone())
    }

    /// Starts a fresh, signed-out session and waits until it has settled.
    pub async fn open_session(&self) -> (Arc<Session>, LivenessToken) {
        let session = Arc::new(Session::new(
            self.cfg.clone(),
            (self.identity_clients)(),
            self.store.clone(),
        ));
        let token = LivenessToken::new();
        session.spawn_rehydrate(token.clone());
        session.ready().await;
        (session, token)
    }

    /// Registers a signed-in session under a new bearer token, expiring idle ones first.
    pub async fn admit(&self, session: Arc<Session>, liveness: LivenessToken) -> Uuid {
        let bearer = api_shared::auth::issue_token();
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sweep(&mut sessions, now, self.idle_timeout);
        sessions.insert(
            bearer,
            LiveSession {
                session,
                token: liveness,
                last_seen: now,
            },
        );
        bearer
    }

    /// Forgets `bearer` and stops following its identity client.
    pub async fn revoke(&self, bearer: &Uuid) -> Option<Arc<Session>> {
        let live = self.sessions.write().await.remove(bearer)?;
        live.token.cancel();
        Some(live.session)
    }

    /// Finds the session for `bearer` and marks it as used. An idle session is revoked.
    async fn lookup(&self, bearer: &Uuid) -> Option<Arc<Session>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        if sessions.get(bearer)?.is_idle(now, self.idle_timeout) {
            if let Some(expired) = sessions.remove(bearer) {
                expired.token.cancel();
            }
            return None;
        }
        let live = sessions.get_mut(bearer)?;
        live.last_seen = now;
        Some(live.session.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// The authenticated caller of a request.
pub struct Caller {
    pub bearer: Uuid,
    pub session: Arc<Session>,
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let bearer = api_shared::auth::parse_bearer(header).map_err(|e| {
            tracing::debug!("rejecting request: {e}");
            ApiError::Unauthorized
        })?;

        let session = state.lookup(&bearer).await.ok_or(ApiError::Unauthorized)?;
        let account = session.current_account().ok_or(ApiError::Unauthorized)?;
        Ok(Self {
            bearer,
            session,
            account,
        })
    }
}
