//! Identity provider abstraction.
//!
//! The session machine only needs "who is signed in, if anyone" plus the
//! sign-in and sign-out actions. Implementations cover the HTTP session
//! endpoint and tests.

use crate::error::{AuthError, AuthResult};
use crate::session::{Session, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Source of session information.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns a short name for logs.
    fn name(&self) -> &'static str;

    /// Resolves the current session; `None` when nobody is signed in.
    async fn resolve(&self) -> AuthResult<Option<Session>>;

    /// Starts a sign-in. Its outcome is observed through the next resolve.
    async fn sign_in(&self) -> AuthResult<()>;

    /// Ends the current session.
    async fn sign_out(&self) -> AuthResult<()>;
}

/// Session endpoint body. An empty object means no session.
#[derive(Debug, Deserialize)]
struct SessionBody {
    user: Option<UserBody>,
    expires: Option<DateTime<Utc>>,
}

/// User attributes, either flat or nested under `data`.
#[derive(Debug, Default, Deserialize)]
struct UserBody {
    id: Option<Value>,
    email: Option<String>,
    name: Option<String>,
    data: Option<Box<UserBody>>,
}

impl UserBody {
    fn into_user(self) -> AuthResult<User> {
        let data = self.data.map(|d| *d).unwrap_or_default();
        let email = data
            .email
            .or(self.email)
            .ok_or_else(|| AuthError::Provider("session user carries no email".into()))?;
        let id = data.id.or(self.id).and_then(|id| match id {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Ok(User {
            id,
            email,
            name: data.name.or(self.name),
        })
    }
}

impl SessionBody {
    fn into_session(self) -> AuthResult<Option<Session>> {
        let Some(user) = self.user else {
            return Ok(None);
        };
        let expires = self
            .expires
            .ok_or_else(|| AuthError::Provider("session carries no expiry".into()))?;
        Ok(Some(Session::new(user.into_user()?, expires)))
    }
}

/// Talks to an `/api/auth` session endpoint.
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionProvider {
    /// Creates a provider rooted at `base_url` (e.g. `https://incridea.in`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a provider with an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/auth/{}", self.base_url, path)
    }

    async fn post(&self, path: &str) -> AuthResult<()> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Provider(format!("{path} returned HTTP {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for HttpSessionProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn resolve(&self) -> AuthResult<Option<Session>> {
        let url = self.url("session");
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Provider(format!("session returned HTTP {status}")));
        }
        let body = response.text().await?;
        // Some deployments answer `null` instead of `{}`.
        match serde_json::from_str::<Option<SessionBody>>(&body)? {
            Some(body) => body.into_session(),
            None => Ok(None),
        }
    }

    async fn sign_in(&self) -> AuthResult<()> {
        self.post("signin").await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.post("signout").await
    }
}

/// A mock identity provider for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// Scripted provider: holds the current session and what a sign-in
    /// would produce.
    #[derive(Debug, Default)]
    pub struct MockIdentityProvider {
        current: Mutex<Option<Session>>,
        on_sign_in: Mutex<Option<Session>>,
        failure: Mutex<Option<String>>,
        fail_sign_out: Mutex<bool>,
        delay: Mutex<Option<Duration>>,
        resolves: AtomicUsize,
    }

    impl MockIdentityProvider {
        /// Creates a provider with nobody signed in.
        pub fn new() -> Self {
            Self::default()
        }

        /// Starts with `session` signed in.
        pub fn with_session(self, session: Session) -> Self {
            *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
            self
        }

        /// Sign-in produces `session`.
        pub fn signs_in_as(self, session: Session) -> Self {
            *self.on_sign_in.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
            self
        }

        /// Every call fails with `message`.
        pub fn failing(self, message: impl Into<String>) -> Self {
            self.set_failure(Some(message.into()));
            self
        }

        /// Sign-out calls fail.
        pub fn failing_sign_out(self) -> Self {
            *self.fail_sign_out.lock().unwrap_or_else(PoisonError::into_inner) = true;
            self
        }

        /// Delays every resolve.
        pub fn with_delay(self, delay: Duration) -> Self {
            *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
            self
        }

        /// Replaces the current session.
        pub fn set_session(&self, session: Option<Session>) {
            *self.current.lock().unwrap_or_else(PoisonError::into_inner) = session;
        }

        /// Sets or clears the standing failure.
        pub fn set_failure(&self, message: Option<String>) {
            *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = message;
        }

        /// Number of resolves issued.
        pub fn resolves(&self) -> usize {
            self.resolves.load(Ordering::SeqCst)
        }

        fn check_failure(&self) -> AuthResult<()> {
            match self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
                Some(message) => Err(AuthError::Provider(message)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for MockIdentityProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn resolve(&self) -> AuthResult<Option<Session>> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.check_failure()?;
            Ok(self
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone())
        }

        async fn sign_in(&self) -> AuthResult<()> {
            self.check_failure()?;
            let next = self
                .on_sign_in
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if next.is_some() {
                self.set_session(next);
            }
            Ok(())
        }

        async fn sign_out(&self) -> AuthResult<()> {
            if *self.fail_sign_out.lock().unwrap_or_else(PoisonError::into_inner) {
                return Err(AuthError::Provider("sign-out rejected".into()));
            }
            self.check_failure()?;
            self.set_session(None);
            Ok(())
        }
    }
}
