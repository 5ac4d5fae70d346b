//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `SessionManager`: register / login / logout and the advisory expiry check
//! - `CredentialStore`: persisted token and profile (file or memory backed)
//! - `Claims`: the token claim set shared with the server
//! - `guard`: public/protected route classification and redirects
//! - `validation`: client-side form rules checked before any request
//!
//! The client never verifies token signatures; it only reads the `exp` claim
//! to avoid sending requests that are bound to be rejected.

pub mod claims;
pub mod credentials;
pub mod guard;
pub mod session;
pub mod validation;

pub use claims::{peek_claims, Claims, ClaimsError, UnverifiedClaims};
pub use credentials::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, StorageError, TOKEN_KEY, USER_KEY,
};
pub use guard::{GuardDecision, Navigator, LANDING_PATH, LOGIN_PATH, REGISTER_PATH};
pub use session::{IdentityService, SessionData, SessionError, SessionManager};
pub use validation::{RegistrationForm, ValidationError};
