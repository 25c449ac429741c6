//! Live tracker connections keyed by session id.
//!
//! Each successful connect stores a [`JiraClient`] under a fresh id that
//! the caller passes back on every later request. Sessions are independent,
//! so several trackers can be connected at once.
//!
//! Sessions idle for longer than the configured TTL are dropped, and the
//! registry never holds more than its configured maximum: when full, the
//! least recently used session is evicted to make room.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::api::error::{ApiError, Result};
use crate::api::{Credentials, FieldMap, JiraClient, Transport};

/// Opaque handle naming one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(SessionId)
            .map_err(|_| ApiError::NotConnected)
    }
}

/// Default idle time after which a session is dropped.
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Default upper bound on live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 256;

#[derive(Debug)]
struct Entry {
    client: Arc<JiraClient>,
    last_used: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_used) > ttl
    }
}

/// Registry of connected clients.
#[derive(Debug)]
pub struct SessionRegistry {
    transport: Arc<dyn Transport>,
    default_fields: FieldMap,
    idle_ttl: Duration,
    max_sessions: usize,
    sessions: RwLock<HashMap<SessionId, Entry>>,
}

impl SessionRegistry {
    /// Create a registry whose clients share one transport.
    pub fn new(transport: Arc<dyn Transport>, default_fields: FieldMap) -> Self {
        Self {
            transport,
            default_fields,
            idle_ttl: DEFAULT_SESSION_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Override the idle TTL and the session cap. A cap of zero is treated as one.
    pub fn with_limits(mut self, idle_ttl: Duration, max_sessions: usize) -> Self {
        self.idle_ttl = idle_ttl;
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Build a client for the credentials without registering it.
    ///
    /// `fields` overrides the registry's default field map.
    pub fn build_client(
        &self,
        credentials: &Credentials,
        fields: Option<FieldMap>,
    ) -> Result<JiraClient> {
        credentials.validate()?;
        let fields = match fields {
            // A caller-supplied map is request input, not server configuration.
            Some(fields) => {
                fields
                    .validate()
                    .map_err(|e| ApiError::InvalidConfiguration(e.to_string()))?;
                fields
            }
            None => {
                self.default_fields.validate()?;
                self.default_fields.clone()
            }
        };
        Ok(JiraClient::new(credentials, Arc::clone(&self.transport)).with_field_map(fields))
    }

    /// Register a client and return its session id.
    ///
    /// Idle sessions are pruned first. If the registry is still full, the
    /// least recently used session is evicted.
    #[instrument(skip(self, client), fields(base_url = %client.base_url()))]
    pub async fn insert(&self, client: JiraClient) -> SessionId {
        let now = Instant::now();
        let id = SessionId::new();
        let mut sessions = self.sessions.write().await;

        prune(&mut sessions, now, self.idle_ttl);
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(oldest) => {
                    sessions.remove(&oldest);
                    info!(session = %oldest, "Session evicted, registry full");
                }
                None => break,
            }
        }

        sessions.insert(
            id,
            Entry {
                client: Arc::new(client),
                last_used: now,
            },
        );
        info!(session = %id, live = sessions.len(), "Session connected");
        id
    }

    /// Validate credentials, build a client, and register it.
    pub async fn connect(
        &self,
        credentials: &Credentials,
        fields: Option<FieldMap>,
    ) -> Result<SessionId> {
        let client = self.build_client(credentials, fields)?;
        Ok(self.insert(client).await)
    }

    /// Look up the client for a session and mark it as used.
    ///
    /// A session idle past the TTL is removed and reported as not connected.
    pub async fn client(&self, id: &SessionId) -> Result<Arc<JiraClient>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(id) {
            None => return Err(ApiError::NotConnected),
            Some(entry) if !entry.is_expired(now, self.idle_ttl) => {
                entry.last_used = now;
                return Ok(Arc::clone(&entry.client));
            }
            Some(_) => {}
        }

        sessions.remove(id);
        info!(session = %id, "Session expired");
        Err(ApiError::NotConnected)
    }

    /// Drop every session idle at `now`. Returns how many were removed.
    pub async fn prune_idle(&self, now: Instant) -> usize {
        prune(&mut *self.sessions.write().await, now, self.idle_ttl)
    }

    /// Drop a session. Returns whether it existed.
    pub async fn disconnect(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session = %id, "Session disconnected");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn prune(sessions: &mut HashMap<SessionId, Entry>, now: Instant, ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| !entry.is_expired(now, ttl));
    let removed = before - sessions.len();
    if removed > 0 {
        debug!(removed, "Pruned idle sessions");
    }
    removed
}
