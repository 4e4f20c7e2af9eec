//! OAuth sign-in: one token exchange per authorization code, persisted
//! across restarts.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clickpanel_core::{AccessToken, WorkspaceId};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::OAuthBackend;
use crate::error::{AuthError, StoreError};
use crate::session::{AuthSession, SessionSlot};
use crate::session_store::SessionStore;

const TOKEN_KEY: &str = "access_token";
const WORKSPACE_KEY: &str = "workspace_id";
const ESTABLISHED_KEY: &str = "established_at";
const USED_CODES_KEY: &str = "used_codes";
const CODE_PARAM: &str = "code";

/// Sign-in state as observed by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No session.
    Unauthenticated,
    /// A token exchange is running.
    Exchanging,
    /// A session is live.
    Authenticated,
    /// The last exchange failed. Behaves as unauthenticated.
    Failed(AuthError),
}

/// Result of handling an OAuth redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectOutcome {
    /// Session established or reused for the code.
    pub session: AuthSession,
    /// Redirect URL with the `code` parameter removed.
    pub cleaned_url: String,
}

struct Inner {
    state: AuthState,
    session: Option<AuthSession>,
}

/// Owns the session and is the only writer of persisted credentials.
pub struct AuthSessionManager<O> {
    backend: O,
    durable: Arc<dyn SessionStore>,
    scoped: Arc<dyn SessionStore>,
    slot: SessionSlot,
    inner: Mutex<Inner>,
    exchange_gate: tokio::sync::Mutex<()>,
}

impl<O: OAuthBackend> AuthSessionManager<O> {
    /// Create a manager without a session.
    ///
    /// `durable` keeps the token across restarts; `scoped` keeps the set of
    /// spent authorization codes.
    pub fn new(backend: O, durable: Arc<dyn SessionStore>, scoped: Arc<dyn SessionStore>) -> Self {
        Self {
            backend,
            durable,
            scoped,
            slot: SessionSlot::default(),
            inner: Mutex::new(Inner {
                state: AuthState::Unauthenticated,
                session: None,
            }),
            exchange_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read handle on the live token.
    #[must_use]
    pub fn slot(&self) -> SessionSlot {
        self.slot.clone()
    }

    /// Live session, if any.
    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        self.guard().session.clone()
    }

    /// Current sign-in state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.guard().state.clone()
    }

    /// Load the persisted session without contacting the backend.
    ///
    /// Storage failures are logged and treated as no session.
    pub fn restore(&self) -> Option<AuthSession> {
        match self.load_persisted() {
            Ok(Some(session)) => {
                info!(workspace = %session.workspace_id(), "restored persisted session");
                self.install(session.clone());
                Some(session)
            }
            Ok(None) => {
                debug!("no persisted session");
                None
            }
            Err(err) => {
                warn!(error = %err, "could not read persisted session");
                None
            }
        }
    }

    fn load_persisted(&self) -> Result<Option<AuthSession>, StoreError> {
        let Some(token) = self.durable.get(TOKEN_KEY)? else {
            return Ok(None);
        };
        let Some(workspace) = self.durable.get(WORKSPACE_KEY)? else {
            return Ok(None);
        };
        let (Ok(token), Ok(workspace)) = (AccessToken::new(token), WorkspaceId::new(workspace))
        else {
            return Ok(None);
        };
        let established_at = self
            .durable
            .get(ESTABLISHED_KEY)?
            .and_then(|raw| OffsetDateTime::parse(&raw, &Rfc3339).ok())
            .unwrap_or_else(OffsetDateTime::now_utc);
        Ok(Some(AuthSession::new(token, workspace, established_at)))
    }

    /// Exchange `code` for a session.
    ///
    /// A code that was already exchanged never reaches the backend again: the
    /// live session is returned instead. Exchanges run one at a time.
    ///
    /// # Errors
    /// See [`AuthError`]. Any failure leaves the manager without a session.
    pub async fn exchange(&self, code: &str) -> Result<AuthSession, AuthError> {
        let _serialized = self.exchange_gate.lock().await;
        let outcome = self.exchange_locked(code).await;
        match &outcome {
            Err(AuthError::CodeAlreadyUsed) => {
                info!("authorization code already spent and no session is stored");
            }
            Err(err) => {
                warn!(error = %err, "authorization code exchange failed");
                self.fail(err.clone());
            }
            Ok(_) => {}
        }
        outcome
    }

    async fn exchange_locked(&self, code: &str) -> Result<AuthSession, AuthError> {
        let mut used = self.used_codes()?;
        if used.contains(code) {
            debug!("authorization code already exchanged");
            return self.existing_session();
        }

        self.guard().state = AuthState::Exchanging;
        let response = self
            .backend
            .exchange_code(code)
            .await
            .map_err(|err| AuthError::ExchangeFailed {
                payload: err.to_string(),
            })?;
        let Some(token) = response
            .access_token
            .and_then(|raw| AccessToken::new(raw).ok())
        else {
            let payload = serde_json::Value::Object(response.rest).to_string();
            return Err(AuthError::ExchangeFailed { payload });
        };

        // A new token invalidates whatever workspace was stored with the old one.
        self.durable.set(TOKEN_KEY, token.secret())?;
        self.durable.clear(WORKSPACE_KEY)?;
        self.durable.clear(ESTABLISHED_KEY)?;
        used.insert(code.to_owned());
        self.store_used_codes(&used)?;

        let teams = self
            .backend
            .teams(&token)
            .await
            .map_err(AuthError::TeamLookupFailed)?;
        let team = teams.into_iter().next().ok_or(AuthError::NoWorkspace)?;

        let established_at = OffsetDateTime::now_utc();
        let stamp = established_at
            .format(&Rfc3339)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        self.durable.set(WORKSPACE_KEY, team.id.as_str())?;
        self.durable.set(ESTABLISHED_KEY, &stamp)?;

        let session = AuthSession::new(token, team.id, established_at);
        info!(workspace = %session.workspace_id(), team = %team.name, "signed in");
        self.install(session.clone());
        Ok(session)
    }

    /// Session for a spent code: the live one, else the persisted one.
    fn existing_session(&self) -> Result<AuthSession, AuthError> {
        if let Some(session) = self.session() {
            return Ok(session);
        }
        let session = self.load_persisted()?.ok_or(AuthError::CodeAlreadyUsed)?;
        info!(workspace = %session.workspace_id(), "reusing persisted session for spent code");
        self.install(session.clone());
        Ok(session)
    }

    fn used_codes(&self) -> Result<BTreeSet<String>, StoreError> {
        self.scoped.get(USED_CODES_KEY)?.map_or_else(
            || Ok(BTreeSet::new()),
            |raw| {
                serde_json::from_str(&raw)
                    .map_err(|err| StoreError::Corrupt(format!("used codes: {err}")))
            },
        )
    }

    fn store_used_codes(&self, used: &BTreeSet<String>) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(used).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        self.scoped.set(USED_CODES_KEY, &encoded)
    }

    fn install(&self, session: AuthSession) {
        let token = session.token().clone();
        {
            let mut inner = self.guard();
            inner.session = Some(session);
            inner.state = AuthState::Authenticated;
        }
        self.slot.publish(Some(token));
    }

    /// Drop the session in memory and on disk after a failed exchange.
    fn fail(&self, err: AuthError) {
        let had_session = {
            let mut inner = self.guard();
            inner.state = AuthState::Failed(err);
            inner.session.take().is_some()
        };
        if had_session || self.slot.is_signed_in() {
            self.slot.publish(None);
        }
        if let Err(err) = self.forget_credentials() {
            warn!(error = %err, "could not remove persisted credentials");
        }
    }

    fn forget_credentials(&self) -> Result<(), StoreError> {
        self.durable.clear(TOKEN_KEY)?;
        self.durable.clear(WORKSPACE_KEY)?;
        self.durable.clear(ESTABLISHED_KEY)
    }

    /// Drop the session and its persisted credentials.
    ///
    /// Spent authorization codes stay recorded.
    ///
    /// # Errors
    /// Returns an error when the persisted credentials cannot be removed. The
    /// in-memory session is dropped regardless.
    pub fn clear(&self) -> Result<(), AuthError> {
        {
            let mut inner = self.guard();
            inner.session = None;
            inner.state = AuthState::Unauthenticated;
        }
        self.slot.publish(None);
        self.forget_credentials()?;
        info!("session cleared");
        Ok(())
    }

    /// Drop the session after the backend rejected its token.
    pub fn report_unauthorized(&self) {
        warn!("backend rejected the session token; signing out");
        if let Err(err) = self.clear() {
            warn!(error = %err, "could not remove persisted credentials");
        }
    }

    /// Handle an OAuth redirect URL.
    ///
    /// Returns `Ok(None)` when the URL carries no authorization code.
    ///
    /// # Errors
    /// Returns the exchange error for the code.
    pub async fn accept_redirect(&self, url: &str) -> Result<Option<RedirectOutcome>, AuthError> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "ignoring unparseable redirect URL");
                return Ok(None);
            }
        };
        let Some(code) = parsed
            .query_pairs()
            .find(|(name, value)| name == CODE_PARAM && !value.is_empty())
            .map(|(_, value)| value.into_owned())
        else {
            return Ok(None);
        };

        let session = self.exchange(&code).await?;
        Ok(Some(RedirectOutcome {
            session,
            cleaned_url: without_code(&parsed),
        }))
    }
}

fn without_code(url: &Url) -> String {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != CODE_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    let mut cleaned = url.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }
    cleaned.into()
}
