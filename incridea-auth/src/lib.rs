//! Session and sign-in view state for Incridea.
//!
//! [`SessionStateMachine`] turns identity-provider answers into one of three
//! session states. [`AuthViewController`] tracks which authentication form
//! the sign-in page shows.
//!
//! ```
//! use incridea_auth::{AuthViewController, ViewAction, ViewState};
//!
//! let mut view = AuthViewController::from_hint(Some("resetPassword"));
//! assert_eq!(view.state(), ViewState::ResetPassword);
//! view.apply(ViewAction::BackToSignIn);
//! assert_eq!(view.state(), ViewState::SignIn);
//! ```

mod error;
mod machine;
mod session;
mod view;

pub mod provider;

pub use error::{AuthError, AuthResult};
pub use machine::{ProviderEvent, SessionStateMachine};
pub use provider::{HttpSessionProvider, IdentityProvider};
pub use session::{Session, SessionStatus, User};
pub use view::{AuthViewController, ViewAction, ViewState};
