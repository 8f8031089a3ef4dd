use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::info;

/// Name of the cookie carrying the dashboard session id.
pub const SESSION_COOKIE: &str = "cricket_session";

/// Authentication state for the dashboard views, passed in explicitly.
///
/// Every call is scoped to the visitor's session id, as read from the
/// request; nothing is shared between visitors.
#[async_trait]
pub trait AuthSession: Send + Sync {
    async fn is_authenticated(&self, session: Option<&str>) -> Result<bool>;

    /// Try to sign in with a user-supplied credential. Returns the new
    /// session id on success.
    async fn sign_in(&self, credential: &str) -> Result<Option<String>>;

    /// End `session`. Returns where the user should be sent next.
    async fn sign_out(&self, session: Option<&str>, redirect: &str) -> Result<String>;
}

/// Sessions guarded by a shared access token.
///
/// With no token configured every visitor is treated as signed in.
pub struct LocalSession {
    access_token: Option<String>,
    sessions: RwLock<HashSet<String>>,
}

impl LocalSession {
    pub fn new(access_token: Option<String>) -> Self {
        LocalSession {
            access_token: access_token.filter(|t| !t.is_empty()),
            sessions: RwLock::new(HashSet::new()),
        }
    }
}

/// 128 random bits, hex encoded.
fn new_session_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl AuthSession for LocalSession {
    async fn is_authenticated(&self, session: Option<&str>) -> Result<bool> {
        if self.access_token.is_none() {
            return Ok(true);
        }
        Ok(match session {
            Some(id) => self.sessions.read().await.contains(id),
            None => false,
        })
    }

    async fn sign_in(&self, credential: &str) -> Result<Option<String>> {
        if let Some(token) = &self.access_token {
            if token != credential {
                return Ok(None);
            }
        }
        let id = new_session_id();
        self.sessions.write().await.insert(id.clone());
        info!("Dashboard user signed in");
        Ok(Some(id))
    }

    async fn sign_out(&self, session: Option<&str>, redirect: &str) -> Result<String> {
        if let Some(id) = session {
            if self.sessions.write().await.remove(id) {
                info!("Dashboard user signed out");
            }
        }
        Ok(redirect.to_string())
    }
}
