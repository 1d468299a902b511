//! Which authentication form the sign-in page shows.

use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// The form on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewState {
    #[default]
    SignIn,
    SignUp,
    ResetPassword,
}

impl ViewState {
    /// Navigation tag of the form.
    pub fn tag(&self) -> &'static str {
        match self {
            ViewState::SignIn => "signIn",
            ViewState::SignUp => "signUp",
            ViewState::ResetPassword => "resetPassword",
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ViewState {
    type Err = AuthError;

    fn from_str(s: &str) -> AuthResult<Self> {
        match s {
            "signIn" => Ok(ViewState::SignIn),
            "signUp" => Ok(ViewState::SignUp),
            "resetPassword" => Ok(ViewState::ResetPassword),
            other => Err(AuthError::InvalidTransition(other.to_string())),
        }
    }
}

/// User-triggered edges between forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    StartSignUp,
    StartReset,
    BackToSignIn,
}

impl ViewAction {
    fn target(self) -> ViewState {
        match self {
            ViewAction::StartSignUp => ViewState::SignUp,
            ViewAction::StartReset => ViewState::ResetPassword,
            ViewAction::BackToSignIn => ViewState::SignIn,
        }
    }
}

/// Holds the current form for the lifetime of the sign-in view.
#[derive(Debug, Clone, Default)]
pub struct AuthViewController {
    state: ViewState,
}

impl AuthViewController {
    /// Seeds the form from a navigation hint. Unknown or absent hints show
    /// the sign-in form.
    pub fn from_hint(hint: Option<&str>) -> Self {
        let state = hint.and_then(|h| h.parse().ok()).unwrap_or_default();
        debug!("Auth view starts in {} (hint {:?})", state, hint);
        Self { state }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Follows a user edge.
    pub fn apply(&mut self, action: ViewAction) -> ViewState {
        self.state = action.target();
        self.state
    }

    /// Switches to the form named by `tag`. Unknown tags leave the state
    /// unchanged.
    pub fn transition_to(&mut self, tag: &str) -> AuthResult<ViewState> {
        match tag.parse::<ViewState>() {
            Ok(next) => {
                self.state = next;
                Ok(next)
            }
            Err(e) => {
                warn!("Rejected auth view transition from {}: {}", self.state, e);
                Err(e)
            }
        }
    }
}
