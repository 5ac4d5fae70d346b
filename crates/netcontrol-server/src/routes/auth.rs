//! `POST /api/auth/register` and `POST /api/auth/login`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use netcontrol_core::models::AuthResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::{hash_password, issue_token, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::UserRecord;

// ============================================================================
// FIELD RULES
// ============================================================================

const MIN_NAME_LENGTH: usize = 3;
const MIN_PASSWORD_LENGTH: usize = 6;

/// `word(.|-word)*@word(.|-word)*(.tld)+` with 2-3 character TLD segments.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*@[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*(\.[A-Za-z0-9_]{2,3})+$",
    )
    .expect("email pattern is a valid regex")
});

/// Every rule the account fields break, in field order.
pub fn field_violations(name: &str, email: &str, password: &str) -> Vec<&'static str> {
    let mut violations = Vec::new();
    if name.chars().count() < MIN_NAME_LENGTH {
        violations.push("Name must be at least 3 characters");
    }
    if !EMAIL_RE.is_match(email) {
        violations.push("Please enter a valid email");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        violations.push("Password must be at least 6 characters");
    }
    violations
}

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Fields are optional so a missing one gets our message, not a JSON
/// rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// An unreadable body counts as every field missing.
fn read_body<T>(body: Result<Json<T>, JsonRejection>, missing: &str) -> ApiResult<T> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            debug!(status = %rejection.status(), error = %rejection.body_text(), "Unreadable auth body");
            Err(ApiError::missing_field(missing))
        }
    }
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

fn success(token: String, record: &UserRecord) -> Json<AuthResponse> {
    Json(AuthResponse {
        success: Some(true),
        token: Some(token),
        user: Some(record.profile()),
        message: None,
    })
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    const MISSING: &str = "Name, email and password are required";
    let body = read_body(body, MISSING)?;
    let (Some(name), Some(email), Some(password)) = (
        present(body.name),
        present(body.email),
        present(body.password),
    ) else {
        return Err(ApiError::missing_field(MISSING));
    };

    let violations = field_violations(&name, &email, &password);
    if !violations.is_empty() {
        debug!(email = %email, violations = violations.len(), "Registration rejected");
        return Err(ApiError::validation_failed(violations.join(", ")));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        debug!(email = %email, "Registration for existing email");
        return Err(crate::store::StoreError::Duplicate(email).into());
    }

    let password_hash = hash_password(password).await?;
    let record = UserRecord::new(name, email, password_hash);
    state.users.insert(record.clone()).await?;

    let token = issue_token(&state.auth, &record.id)?;
    info!(user_id = %record.id, email = %record.email, "Account registered");
    Ok((StatusCode::CREATED, success(token, &record)))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    const MISSING: &str = "Email and password are required";
    let body = read_body(body, MISSING)?;
    let (Some(email), Some(password)) = (present(body.email), present(body.password)) else {
        return Err(ApiError::missing_field(MISSING));
    };

    let Some(record) = state.users.find_by_email(&email).await? else {
        debug!(email = %email, "Login for unknown email");
        return Err(ApiError::invalid_credentials());
    };

    if !verify_password(password, record.password_hash.clone()).await? {
        debug!(user_id = %record.id, "Login with wrong password");
        return Err(ApiError::invalid_credentials());
    }

    let token = issue_token(&state.auth, &record.id)?;
    info!(user_id = %record.id, "Logged in");
    Ok(success(token, &record))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_violations_all_messages() {
        assert_eq!(
            field_violations("Al", "nope", "12345"),
            vec![
                "Name must be at least 3 characters",
                "Please enter a valid email",
                "Password must be at least 6 characters",
            ]
        );
        assert!(field_violations("Ana", "ana@example.com", "secret1").is_empty());
    }

    #[test]
    fn test_email_shape() {
        for ok in ["ana@example.com", "a.b-c@mail.example.org", "x_y@host.co.uk"] {
            assert!(EMAIL_RE.is_match(ok), "{ok}");
        }
        for bad in ["ana@example", "ana@example.info", "@example.com", "ana example@x.com"] {
            assert!(!EMAIL_RE.is_match(bad), "{bad}");
        }
    }
}
