//! Signed-in identity: sign-in, sign-up, sign-out and change notifications.

use std::sync::Arc;

use leikki_shared::api::{self, AuthSessionResp, PasswordGrantReq, Project, SignUpResp};
use leikki_shared::auth::{AuthSession, AuthUser};
use leikki_shared::jwt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::AppError;
use crate::config::MISSING_ENV_MESSAGE;
use crate::store::SecretStore;

pub const SESSION_KEY: &str = "session";
/// Access tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session: Option<AuthSession>,
    pub initializing: bool,
    pub env_missing: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session: None,
            initializing: true,
            env_missing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn,
    /// The backend wants the address confirmed before issuing a session.
    ConfirmationPending,
}

#[derive(Clone)]
pub struct SessionHolder {
    inner: Arc<Inner>,
}

struct Inner {
    project: Option<Project>,
    store: Arc<dyn SecretStore>,
    state: watch::Sender<SessionState>,
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

fn session_from_resp(resp: AuthSessionResp) -> AuthSession {
    let expires_at = match jwt::decode_unverified(&resp.access_token) {
        Ok(claims) => claims.exp,
        Err(e) => {
            debug!(error=%e, "access token claims unreadable; using response expiry");
            resp.expires_at
                .unwrap_or_else(|| now_secs().saturating_add(resp.expires_in))
        }
    };
    AuthSession {
        access_token: resp.access_token,
        refresh_token: resp.refresh_token,
        expires_at,
        user: resp.user,
    }
}

impl SessionHolder {
    pub fn new(project: Option<Project>, store: Arc<dyn SecretStore>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                project,
                store,
                state,
            }),
        }
    }

    pub fn project(&self) -> Result<&Project, AppError> {
        self.inner
            .project
            .as_ref()
            .ok_or_else(|| AppError::Config(MISSING_ENV_MESSAGE.into()))
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receives every later state change for as long as the holder lives.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.inner
            .state
            .borrow()
            .session
            .as_ref()
            .map(|s| s.user.clone())
    }

    /// Restores the persisted session, refreshing it when it is about to expire.
    pub async fn init(&self) -> Result<(), AppError> {
        self.inner.state.send_modify(|s| {
            s.initializing = true;
            s.env_missing = false;
        });
        let Some(project) = self.inner.project.as_ref() else {
            warn!("backend credentials missing; session disabled");
            self.inner.state.send_replace(SessionState {
                session: None,
                initializing: false,
                env_missing: true,
            });
            return Ok(());
        };

        let session = match self.load_stored() {
            Some(stored) if stored.expires_within(now_secs(), REFRESH_MARGIN_SECS) => {
                self.refresh(project, stored).await?
            }
            other => other,
        };
        if let Some(s) = &session {
            info!(user=%s.user.id, "restored session");
        }
        self.publish(session);
        Ok(())
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), AppError> {
        let project = self.project()?;
        let req = PasswordGrantReq {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let resp = api::rest::sign_in_with_password(project, &req)
            .await
            .map_err(|source| AppError::Remote {
                context: "sign-in failed",
                source,
            })?;
        let session = session_from_resp(resp);
        self.persist(&session)?;
        info!(user=%session.user.id, "signed in");
        self.publish(Some(session));
        Ok(())
    }

    pub async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, AppError> {
        let project = self.project()?;
        let req = PasswordGrantReq {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let resp = api::rest::sign_up(project, &req)
            .await
            .map_err(|source| AppError::Remote {
                context: "sign-up failed",
                source,
            })?;
        match resp {
            SignUpResp::Session(resp) => {
                let session = session_from_resp(resp);
                self.persist(&session)?;
                info!(user=%session.user.id, "signed up");
                self.publish(Some(session));
                Ok(SignUpOutcome::SignedIn)
            }
            SignUpResp::Pending(user) => {
                info!(user=%user.id, "sign-up awaiting confirmation");
                Ok(SignUpOutcome::ConfirmationPending)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        let Some(project) = self.inner.project.as_ref() else {
            return Ok(());
        };
        let current = self.inner.state.borrow().session.clone();
        if let Some(session) = current {
            match api::rest::sign_out(project, &session.access_token).await {
                Ok(()) => info!(user=%session.user.id, "signed out"),
                // The backend no longer knows this token; forget it locally.
                Err(e) if matches!(e.status(), Some(401 | 403 | 404)) => {
                    warn!(error=%e, user=%session.user.id, "remote session already gone");
                }
                Err(source) => {
                    return Err(AppError::Remote {
                        context: "sign-out failed",
                        source,
                    });
                }
            }
        }
        self.inner.store.remove_item(SESSION_KEY)?;
        self.publish(None);
        Ok(())
    }

    /// Bearer for backend requests: a fresh access token, or the anonymous key when signed out.
    pub async fn bearer(&self) -> Result<String, AppError> {
        let project = self.project()?;
        let current = self.inner.state.borrow().session.clone();
        let session = match current {
            Some(s) if s.expires_within(now_secs(), REFRESH_MARGIN_SECS) => {
                let refreshed = self.refresh(project, s).await?;
                self.publish(refreshed.clone());
                refreshed
            }
            other => other,
        };
        Ok(session
            .map(|s| s.access_token)
            .unwrap_or_else(|| project.anon_key.clone()))
    }

    fn load_stored(&self) -> Option<AuthSession> {
        let raw = match self.inner.store.get_item(SESSION_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error=%e, "could not read stored session");
                return None;
            }
        };
        match serde_json::from_str::<AuthSession>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error=%e, "discarding unreadable stored session");
                if let Err(e) = self.inner.store.remove_item(SESSION_KEY) {
                    warn!(error=%e, "could not remove stored session");
                }
                None
            }
        }
    }

    /// Exchanges the refresh token. A rejected token drops the session; a transport
    /// failure keeps the old one so the backend can decide.
    async fn refresh(
        &self,
        project: &Project,
        stale: AuthSession,
    ) -> Result<Option<AuthSession>, AppError> {
        match api::rest::refresh_session(project, &stale.refresh_token).await {
            Ok(resp) => {
                let session = session_from_resp(resp);
                self.persist(&session)?;
                info!(user=%session.user.id, "refreshed access token");
                Ok(Some(session))
            }
            Err(e) if matches!(e.status(), Some(400 | 401)) => {
                warn!(error=%e, "refresh token rejected; signing out locally");
                self.inner.store.remove_item(SESSION_KEY)?;
                Ok(None)
            }
            Err(e) => {
                warn!(error=%e, "token refresh failed; continuing with existing token");
                Ok(Some(stale))
            }
        }
    }

    fn persist(&self, session: &AuthSession) -> Result<(), AppError> {
        let raw = serde_json::to_string(session)
            .map_err(|e| AppError::Store(format!("serialize session failed: {e}")))?;
        self.inner.store.set_item(SESSION_KEY, &raw)
    }

    fn publish(&self, session: Option<AuthSession>) {
        self.inner.state.send_replace(SessionState {
            session,
            initializing: false,
            env_missing: false,
        });
    }
}
