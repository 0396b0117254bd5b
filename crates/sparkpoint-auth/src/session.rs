//! Client-side session state machine.
//!
//! ```text
//!   Unauthenticated ──login_start──▶ Authenticating ──login_success──▶ Authenticated
//!          ▲                          │        ▲
//!          │                   login_failure   │ login_start
//!          │                          ▼        │
//!          └───────── logout ───────── Failed ─┘
//! ```
//!
//! `logout` is accepted from every phase. Each successful transition mirrors
//! the outcome into the [`CookieStore`] so a restarted process can rehydrate.

use std::sync::Arc;

use serde::Serialize;
use serde::ser::SerializeStruct;
use sparkpoint_api::{User, UserId};
use tokio::sync::watch;

use crate::store::{CookieStore, IS_AUTHENTICATED_COOKIE, USER_DATA_COOKIE};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Failed,
}

/// Snapshot of the session. Only constructible through the transitions, so
/// `is_authenticated()` always implies `user().is_some()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    phase: SessionPhase,
    user: Option<User>,
    error: Option<String>,
}

impl Session {
    fn unauthenticated() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            user: None,
            error: None,
        }
    }

    fn authenticated(user: User) -> Self {
        Self {
            phase: SessionPhase::Authenticated,
            user: Some(user),
            error: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// True only while a login attempt is in flight.
    pub fn loading(&self) -> bool {
        self.phase == SessionPhase::Authenticating
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.user.as_ref().is_some_and(User::is_admin)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unauthenticated()
    }
}

impl Serialize for Session {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Session", 5)?;
        s.serialize_field("phase", &self.phase)?;
        s.serialize_field("isAuthenticated", &self.is_authenticated())?;
        s.serialize_field("user", &self.user)?;
        s.serialize_field("loading", &self.loading())?;
        s.serialize_field("error", &self.error)?;
        s.end()
    }
}

/// Process-wide session container.
///
/// The four transitions (plus `clear_error`) are the only way to change the
/// state; everything else reads a snapshot or subscribes to changes.
pub struct SessionStore {
    cookies: Arc<CookieStore>,
    state: watch::Sender<Session>,
}

impl SessionStore {
    /// Start a session from persisted cookies.
    ///
    /// An `isAuthenticated` flag without a `userData` record is treated as
    /// corrupt: the flag is deleted and the session starts unauthenticated.
    pub fn rehydrate(cookies: Arc<CookieStore>) -> Self {
        let flag: Option<bool> = cookies.get(IS_AUTHENTICATED_COOKIE);
        let user: Option<User> = cookies.get(USER_DATA_COOKIE);

        let session = match (flag, user) {
            (Some(true), Some(user)) => {
                tracing::debug!(user_id = %user.id, "rehydrated authenticated session");
                Session::authenticated(user)
            }
            (Some(true), None) => {
                tracing::warn!("found isAuthenticated cookie without userData; clearing stale auth");
                if let Err(e) = cookies.delete(IS_AUTHENTICATED_COOKIE) {
                    tracing::warn!(error = %e, "failed to clear stale auth cookie");
                }
                Session::unauthenticated()
            }
            _ => Session::unauthenticated(),
        };

        Self {
            cookies,
            state: watch::Sender::new(session),
        }
    }

    pub fn cookies(&self) -> &Arc<CookieStore> {
        &self.cookies
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.state.borrow().user.as_ref().map(|u| u.id.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.state.borrow().is_admin()
    }

    /// `Unauthenticated | Failed → Authenticating`, clearing any prior error.
    pub fn login_start(&self) -> Result<()> {
        self.transition("start login", |s| {
            matches!(s.phase, SessionPhase::Unauthenticated | SessionPhase::Failed)
        }, |s| {
            s.phase = SessionPhase::Authenticating;
            s.error = None;
        })?;
        tracing::debug!("login started");
        Ok(())
    }

    /// `Authenticating → Authenticated`, persisting the flag and user record.
    pub fn login_success(&self, user: User) -> Result<()> {
        let persisted = user.clone();
        self.transition("complete login", |s| s.phase == SessionPhase::Authenticating, move |s| {
            *s = Session::authenticated(user);
        })?;

        tracing::info!(user_id = %persisted.id, "login succeeded");
        self.persist(IS_AUTHENTICATED_COOKIE, &true);
        self.persist(USER_DATA_COOKIE, &persisted);
        Ok(())
    }

    /// `Authenticating → Failed`, dropping the user and persisted state.
    pub fn login_failure(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        let logged = message.clone();
        self.transition("fail login", |s| s.phase == SessionPhase::Authenticating, move |s| {
            s.phase = SessionPhase::Failed;
            s.user = None;
            s.error = Some(message);
        })?;

        tracing::error!(reason = %logged, "login failed");
        self.forget();
        Ok(())
    }

    /// Any phase `→ Unauthenticated`.
    pub fn logout(&self) {
        self.state.send_modify(|s| *s = Session::unauthenticated());
        tracing::info!("session cleared");
        self.forget();
    }

    /// Drop the error message of a failed login. The phase is unchanged.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    fn transition(
        &self,
        name: &'static str,
        allowed: impl FnOnce(&Session) -> bool,
        apply: impl FnOnce(&mut Session),
    ) -> Result<()> {
        let mut rejected = None;
        self.state.send_if_modified(|s| {
            if allowed(s) {
                apply(s);
                true
            } else {
                rejected = Some(s.phase);
                false
            }
        });
        match rejected {
            Some(from) => Err(Error::InvalidTransition { transition: name, from }),
            None => Ok(()),
        }
    }

    fn persist<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        if let Err(e) = self.cookies.set(name, value) {
            tracing::warn!(cookie = name, error = %e, "failed to persist session cookie");
        }
    }

    fn forget(&self) {
        for name in [IS_AUTHENTICATED_COOKIE, USER_DATA_COOKIE] {
            if let Err(e) = self.cookies.delete(name) {
                tracing::warn!(cookie = name, error = %e, "failed to delete session cookie");
            }
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
