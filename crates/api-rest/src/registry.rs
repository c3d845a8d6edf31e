//! Page sessions of the REST shell.
//!
//! A successful login creates one [`PageSession`]: the signed-in user plus the upload workflow
//! for that page. The session is addressed by a random token that clients send in the
//! `x-session-token` header. Logging out drops the page session, which releases any preview the
//! workflow still holds.
//!
//! Each user has at most one page session. Logging in again closes the previous one, so the
//! registry never holds more sessions than the directory has users.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use xinsight_core::{Role, SessionError, UploadWorkflow, User, UserDirectory};
use xinsight_files::{IntakePolicy, PreviewStore};

/// Header carrying the page session token.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

#[derive(Debug)]
pub struct PageSession {
    pub user: User,
    pub workflow: UploadWorkflow,
}

pub type SharedPageSession = Arc<Mutex<PageSession>>;

#[derive(Debug, Default)]
struct Sessions {
    by_token: HashMap<Uuid, SharedPageSession>,
    /// User id to that user's current token
    by_user: HashMap<String, Uuid>,
}

/// Token to page session map.
///
/// The map lock is only held to look a session up; handlers then lock the page session itself,
/// so a slow analysis in one session never blocks another.
#[derive(Debug)]
pub struct SessionRegistry {
    directory: UserDirectory,
    policy: IntakePolicy,
    previews: PreviewStore,
    sessions: Mutex<Sessions>,
}

impl SessionRegistry {
    pub fn new(directory: UserDirectory, policy: IntakePolicy, previews: PreviewStore) -> Self {
        Self {
            directory,
            policy,
            previews,
            sessions: Mutex::new(Sessions::default()),
        }
    }

    /// Authenticates and opens a new page session, replacing the user's previous one.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<(Uuid, User), SessionError> {
        let user = self.directory.authenticate(email, password, role)?.clone();
        let token = Uuid::new_v4();
        let page = PageSession {
            user: user.clone(),
            workflow: UploadWorkflow::new(self.policy, self.previews.clone()),
        };

        let replaced = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .by_token
                .insert(token, Arc::new(Mutex::new(page)));
            let previous = sessions.by_user.insert(user.id.clone(), token);
            previous.and_then(|previous| sessions.by_token.remove(&previous))
        };
        if replaced.is_some() {
            tracing::info!(user_id = %user.id, "previous page session replaced");
        }
        tracing::info!(user_id = %user.id, role = %user.role, "page session opened");
        Ok((token, user))
    }

    pub async fn get(&self, token: &Uuid) -> Option<SharedPageSession> {
        self.sessions.lock().await.by_token.get(token).cloned()
    }

    /// Closes a page session; returns whether it existed.
    pub async fn logout(&self, token: &Uuid) -> bool {
        let removed = {
            let mut sessions = self.sessions.lock().await;
            let removed = sessions.by_token.remove(token);
            sessions.by_user.retain(|_, current| current != token);
            removed
        };
        match removed {
            Some(page) => {
                let page = page.lock().await;
                tracing::info!(user_id = %page.user.id, "page session closed");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.by_token.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }
}

/// Parses a token header value.
pub fn parse_token(value: Option<&str>) -> Result<Uuid, SessionError> {
    value
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(SessionError::NotSignedIn)
}
