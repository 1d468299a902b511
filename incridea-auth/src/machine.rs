//! Session state machine.
//!
//! Status only moves in response to provider events; nothing outside this
//! module can assign it directly. Every provider answer leaves the machine
//! authenticated or unauthenticated, never pending.
//!
//! Entering `authenticated` arms a timer for the session's expiry when a
//! tokio runtime is available. The timer only expires the session it was
//! armed for; a newer session or any other transition disarms it.

use crate::error::AuthError;
use crate::provider::IdentityProvider;
use crate::session::{Session, SessionStatus};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Something the identity provider reported.
#[derive(Debug)]
pub enum ProviderEvent {
    /// A live session was resolved.
    Resolved(Session),
    /// Nobody is signed in.
    Absent,
    /// The provider could not answer.
    Failed(AuthError),
    /// The user signed out.
    SignedOut,
    /// The current session's expiry passed.
    Expired,
}

/// Tracks the session status and broadcasts every change.
#[derive(Debug)]
pub struct SessionStateMachine {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    status: watch::Sender<SessionStatus>,
    expiry_timer: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Expires `session` if it is still the current one.
    fn expire(&self, session: &Session) {
        let expired = self.status.send_if_modified(|status| {
            if status.session() == Some(session) {
                *status = SessionStatus::Unauthenticated;
                true
            } else {
                false
            }
        });
        if expired {
            info!("Session for {} expired", session.user.email);
        }
    }

    fn replace_timer(&self, timer: Option<JoinHandle<()>>) {
        let mut slot = self.expiry_timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *slot, timer) {
            previous.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.expiry_timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = slot.take() {
            timer.abort();
        }
    }
}

impl SessionStateMachine {
    /// Creates a machine in `pending`.
    pub fn new() -> Self {
        let (status, _) = watch::channel(SessionStatus::Pending);
        Self {
            inner: Arc::new(Inner {
                status,
                expiry_timer: Mutex::new(None),
            }),
        }
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().clone()
    }

    /// Observes status changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    /// Applies one provider event and returns the resulting status.
    pub fn apply(&self, event: ProviderEvent) -> SessionStatus {
        let current = self.status();
        let next = match event {
            ProviderEvent::Resolved(session) if session.is_expired_at(Utc::now()) => {
                debug!("Resolved session for {} already expired", session.user.email);
                SessionStatus::Unauthenticated
            }
            ProviderEvent::Resolved(session) => SessionStatus::Authenticated(session),
            ProviderEvent::Absent | ProviderEvent::SignedOut => SessionStatus::Unauthenticated,
            ProviderEvent::Failed(e) => {
                warn!("Identity provider failed: {}", e);
                SessionStatus::Unauthenticated
            }
            ProviderEvent::Expired => match &current {
                SessionStatus::Authenticated(_) => SessionStatus::Unauthenticated,
                // Nothing to expire.
                other => other.clone(),
            },
        };

        if next != current {
            info!("Session {} -> {}", current, next);
            self.inner.status.send_replace(next.clone());
            match &next {
                SessionStatus::Authenticated(session) => self.arm_expiry(session.clone()),
                _ => self.inner.replace_timer(None),
            }
        }
        next
    }

    /// Schedules `session` to expire at its expiry time.
    fn arm_expiry(&self, session: Session) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime; expiry of {} relies on check_expiry", session.user.email);
            self.inner.replace_timer(None);
            return;
        };
        let delay = (session.expires - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire(&session);
            }
        });
        self.inner.replace_timer(Some(timer));
    }

    /// Asks the provider for the current session and applies the answer.
    pub async fn refresh(&self, provider: &dyn IdentityProvider) -> SessionStatus {
        debug!("Resolving session via {} provider", provider.name());
        let event = match provider.resolve().await {
            Ok(Some(session)) => ProviderEvent::Resolved(session),
            Ok(None) => ProviderEvent::Absent,
            Err(e) => ProviderEvent::Failed(e),
        };
        self.apply(event)
    }

    /// Forwards a sign-in and applies the session that follows.
    pub async fn sign_in(&self, provider: &dyn IdentityProvider) -> SessionStatus {
        match provider.sign_in().await {
            Ok(()) => self.refresh(provider).await,
            Err(e) => self.apply(ProviderEvent::Failed(e)),
        }
    }

    /// Forwards a sign-out. The machine ends unauthenticated either way.
    pub async fn sign_out(&self, provider: &dyn IdentityProvider) -> SessionStatus {
        if let Err(e) = provider.sign_out().await {
            warn!("Sign-out via {} provider failed: {}", provider.name(), e);
        }
        self.apply(ProviderEvent::SignedOut)
    }

    /// Expires the session if its expiry is at or before `now`.
    pub fn check_expiry(&self, now: DateTime<Utc>) -> SessionStatus {
        let expired = self
            .inner
            .status
            .borrow()
            .session()
            .is_some_and(|s| s.is_expired_at(now));
        if expired {
            self.apply(ProviderEvent::Expired)
        } else {
            self.status()
        }
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
