use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

use crate::database::Tables;
use crate::mailer::generate_reset_code;

#[cfg(feature = "web")]
use crate::app::{
    CurrentUser, SharedState, StatusResponse, adopt_guest_cart, clear_session_cookie,
    session_cookie, session_token,
};
#[cfg(feature = "web")]
use crate::error::AppError;
#[cfg(feature = "web")]
use crate::mailer::MailError;
#[cfg(feature = "web")]
use crate::notification::{self, Notification, NotificationKind};
#[cfg(feature = "web")]
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
#[cfg(feature = "web")]
use axum_extra::extract::cookie::CookieJar;
#[cfg(feature = "web")]
use log::info;
use log::warn;

/// How long a password reset code stays valid
pub const RESET_CODE_TTL_MINUTES: i64 = 60;

/// Wrong codes allowed before a reset code is thrown away
pub const MAX_RESET_ATTEMPTS: u32 = 5;

/// User data structure representing a registered customer
///
/// This structure contains all the information about a registered user,
/// including authentication details and password reset information.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    /// Server-assigned identifier
    pub id: Uuid,

    /// Email address (login name and password recovery address)
    pub email: String,

    /// Display name
    pub username: String,

    /// Optional profile picture
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Password reset code (if a reset has been requested)
    #[serde(default)]
    pub reset_code: Option<String>,

    /// Expiration time for the reset code
    #[serde(default)]
    pub reset_code_expires: Option<DateTime<Utc>>,

    /// Wrong codes submitted against the current reset code
    #[serde(default)]
    pub reset_attempts: u32,

    pub created_at: DateTime<Utc>,
}

/// The public view of a [`User`]
///
/// Never carries the password hash or reset code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
            created_at: user.created_at,
        }
    }
}

/// Sign up form data
#[derive(Debug, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub username: String,
}

/// Login form data
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

/// Profile fields a user may change. Missing fields stay as they are.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Password reset request data
///
/// Used to receive a password reset request containing just an email address.
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    /// Email address to send the reset code to
    pub email: String,
}

/// Password reset confirmation data
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetConfirm {
    /// Email address that requested the reset
    pub email: String,

    /// Reset code that was sent to the email
    pub reset_code: String,

    /// New password to set
    pub new_password: String,
}

/// Password change request data
///
/// Used to receive a password change form from an authenticated user.
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordChangeRequest {
    /// Current password for verification
    pub current_password: String,

    /// New password to set
    pub new_password: String,

    /// Confirmation of the new password (must match new_password)
    pub confirm_password: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("{0}")]
    WeakPassword(&'static str),

    #[error("Email address is already registered")]
    EmailTaken,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("You must be logged in")]
    Unauthenticated,

    #[error("New passwords do not match")]
    PasswordMismatch,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Email not found")]
    EmailNotFound,

    #[error("No reset code found")]
    NoResetCode,

    #[error("Invalid reset code")]
    InvalidResetCode,

    #[error("Reset code expired")]
    ResetCodeExpired,

    #[error("Password hashing failed")]
    Hashing,
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref UPPERCASE_RE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref LOWERCASE_RE: Regex = Regex::new(r"[a-z]").unwrap();
    static ref DIGIT_RE: Regex = Regex::new(r"[0-9]").unwrap();
}

/// Check an email address has the `name@domain.tld` shape
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}

/// Check a new password against the storefront's password rule
///
/// # Arguments
/// * `password` - The plaintext password to check
///
/// # Errors
/// * `AuthError::WeakPassword` naming the first rule the password breaks
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if !UPPERCASE_RE.is_match(password) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one uppercase letter",
        ));
    }
    if !LOWERCASE_RE.is_match(password) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !DIGIT_RE.is_match(password) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one number",
        ));
    }
    if password.chars().count() < 6 {
        return Err(AuthError::WeakPassword(
            "Password must be at least 6 characters long",
        ));
    }

    Ok(())
}

impl Registration {
    pub fn validate(&self) -> Result<(), AuthError> {
        if [&self.email, &self.password, &self.username]
            .iter()
            .any(|f| f.trim().is_empty())
        {
            return Err(AuthError::MissingFields);
        }

        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

/// Hash a password using Argon2
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String, AuthError>` - The PHC string for the password
///
/// # Errors
/// * Returns an error if the password hashing fails
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err(AuthError::Hashing),
    }
}

/// Verify a password against a stored hash
///
/// # Arguments
/// * `password` - The plaintext password to verify
/// * `hash` - The stored password hash to check against
///
/// # Returns
/// * `Result<bool, AuthError>` - True if the password matches, false if not
///
/// # Errors
/// * Returns an error if the hash is in an invalid format
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::Hashing)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Insert a new user row
///
/// The registration must already be validated and its password hashed.
///
/// # Errors
/// * `AuthError::EmailTaken` if another user has the same email
pub fn create_user(
    tables: &mut Tables,
    registration: &Registration,
    password_hash: String,
    now: DateTime<Utc>,
) -> Result<User, AuthError> {
    if tables.user_by_email(&registration.email).is_some() {
        return Err(AuthError::EmailTaken);
    }

    let user = User {
        id: Uuid::new_v4(),
        email: registration.email.trim().to_string(),
        username: registration.username.trim().to_string(),
        avatar_url: None,
        password_hash,
        reset_code: None,
        reset_code_expires: None,
        reset_attempts: 0,
        created_at: now,
    };

    tables.users.push(user.clone());
    Ok(user)
}

/// Check login credentials
///
/// Unknown emails and wrong passwords are reported the same way.
///
/// # Returns
/// * `Result<Uuid, AuthError>` - The id of the authenticated user
pub fn authenticate(tables: &Tables, email: &str, password: &str) -> Result<Uuid, AuthError> {
    let user = tables
        .user_by_email(email)
        .ok_or(AuthError::InvalidCredentials)?;

    if verify_password(password, &user.password_hash)? {
        Ok(user.id)
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

/// Store a fresh reset code on the user with this email
///
/// # Returns
/// * `Result<String, AuthError>` - The code to send to the user
///
/// # Errors
/// * `AuthError::EmailNotFound` if no user has this email
pub fn issue_reset_code(
    tables: &mut Tables,
    email: &str,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let user = tables
        .user_by_email_mut(email)
        .ok_or(AuthError::EmailNotFound)?;

    let code = generate_reset_code();
    user.reset_code = Some(code.clone());
    user.reset_code_expires = Some(now + Duration::minutes(RESET_CODE_TTL_MINUTES));
    user.reset_attempts = 0;

    Ok(code)
}

/// Check a submitted reset code against the one stored on the user
pub fn check_reset_code(user: &User, code: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
    let stored = user.reset_code.as_deref().ok_or(AuthError::NoResetCode)?;
    let expires = user
        .reset_code_expires
        .ok_or(AuthError::ResetCodeExpired)?;

    if now > expires {
        return Err(AuthError::ResetCodeExpired);
    }
    if !codes_match(stored, code.trim()) {
        return Err(AuthError::InvalidResetCode);
    }

    Ok(())
}

/// Compares every byte so the time taken does not depend on where the
/// codes differ.
fn codes_match(stored: &str, given: &str) -> bool {
    stored.len() == given.len()
        && stored
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Check a submitted reset code, counting a wrong one against the user
///
/// After [`MAX_RESET_ATTEMPTS`] wrong codes the stored code is discarded
/// and a new one has to be requested.
///
/// # Returns
/// * The user's id when the code is valid
pub fn attempt_reset_code(
    tables: &mut Tables,
    email: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Uuid, AuthError> {
    let user = tables
        .user_by_email_mut(email)
        .ok_or(AuthError::EmailNotFound)?;

    match check_reset_code(user, code, now) {
        Ok(()) => Ok(user.id),
        Err(AuthError::InvalidResetCode) => {
            user.reset_attempts = user.reset_attempts.saturating_add(1);
            if user.reset_attempts >= MAX_RESET_ATTEMPTS {
                warn!("Too many wrong reset codes for user {}, code discarded", user.id);
                user.reset_code = None;
                user.reset_code_expires = None;
            }
            Err(AuthError::InvalidResetCode)
        }
        Err(e) => Err(e),
    }
}

/// Replace the password of the user with this email if the code checks out
///
/// The code is consumed on success.
pub fn reset_password(
    tables: &mut Tables,
    email: &str,
    code: &str,
    password_hash: String,
    now: DateTime<Utc>,
) -> Result<Uuid, AuthError> {
    let user = tables
        .user_by_email_mut(email)
        .ok_or(AuthError::EmailNotFound)?;

    check_reset_code(user, code, now)?;

    user.password_hash = password_hash;
    user.reset_code = None;
    user.reset_code_expires = None;
    user.reset_attempts = 0;

    Ok(user.id)
}

impl PasswordChangeRequest {
    /// Form checks that need no stored data
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.current_password.is_empty() || self.new_password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        if self.new_password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        validate_password(&self.new_password)
    }
}

/// Apply a profile update to the user
///
/// A blank username is rejected; a blank avatar URL removes the avatar.
pub fn update_profile(
    tables: &mut Tables,
    user_id: Uuid,
    update: &ProfileUpdate,
) -> Result<UserProfile, AuthError> {
    if update
        .username
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(AuthError::MissingFields);
    }

    let user = tables.user_mut(user_id).ok_or(AuthError::Unauthenticated)?;

    if let Some(username) = &update.username {
        user.username = username.trim().to_string();
    }
    if let Some(avatar_url) = &update.avatar_url {
        let avatar_url = avatar_url.trim();
        user.avatar_url = (!avatar_url.is_empty()).then(|| avatar_url.to_string());
    }

    Ok(UserProfile::from(&*user))
}

/// Session information
#[derive(Debug, Clone)]
struct Session {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// Active login sessions keyed by token
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    duration: Duration,
}

impl SessionStore {
    pub fn new(duration: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            duration,
        }
    }

    /// Create a new session for a user
    ///
    /// # Returns
    /// * `String` - A unique session token
    pub fn create(&self, user_id: Uuid) -> String {
        self.create_at(user_id, Utc::now())
    }

    fn create_at(&self, user_id: Uuid, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            user_id,
            expires_at: now + self.duration,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session);

        token
    }

    /// The user behind a token, if the session exists and has not expired
    pub fn validate(&self, token: &str) -> Option<Uuid> {
        self.validate_at(token, Utc::now())
    }

    fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);

        sessions
            .get(token)
            .filter(|session| session.expires_at > now)
            .map(|session| session.user_id)
    }

    pub fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(token);
    }

    /// Drop every session a user holds
    pub fn revoke_user(&self, user_id: Uuid) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.user_id != user_id);
    }
}

/// Handle user registration
///
/// Creates the account, starts a session and adopts the guest cart.
///
/// # Returns
/// * `201 Created` with the new profile and a session cookie
#[cfg(feature = "web")]
pub async fn handle_register(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, CookieJar, Json<UserProfile>), AppError> {
    registration.validate()?;
    let password_hash = hash_password(&registration.password)?;

    let user = state.db.write(|t| {
        create_user(t, &registration, password_hash, Utc::now()).map_err(AppError::from)
    })?;
    info!("Registered user {}", user.id);

    let jar = start_session(&state, jar, user.id)?;
    Ok((StatusCode::CREATED, jar, Json(UserProfile::from(&user))))
}

/// Handle user login
///
/// On success the guest cart, if any, is merged into the user's cart.
///
/// # Returns
/// * The user's profile and a session cookie, or `401` for bad credentials
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(credentials): Json<UserCredentials>,
) -> Result<(CookieJar, Json<UserProfile>), AppError> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(AuthError::MissingFields.into());
    }

    let user_id = state
        .db
        .read(|t| authenticate(t, &credentials.email, &credentials.password))
        .inspect_err(|_| warn!("Failed login for {}", credentials.email))?;

    let jar = start_session(&state, jar, user_id)?;
    let profile = state
        .db
        .read(|t| t.user(user_id).map(UserProfile::from))
        .ok_or(AuthError::Unauthenticated)?;

    info!("User {user_id} logged in");
    Ok((jar, Json(profile)))
}

#[cfg(feature = "web")]
fn start_session(state: &SharedState, jar: CookieJar, user_id: Uuid) -> Result<CookieJar, AppError> {
    let jar = adopt_guest_cart(state, jar, user_id)?;

    let token = state.sessions.create(user_id);
    Ok(jar.add(session_cookie(token)))
}

/// Handle user logout
///
/// Drops the session and clears the session cookie.
#[cfg(feature = "web")]
pub async fn handle_logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<StatusResponse>) {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }

    (
        jar.remove(clear_session_cookie()),
        Json(StatusResponse::ok("Logged out")),
    )
}

#[cfg(feature = "web")]
pub async fn handle_me(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .db
        .read(|t| t.user(user.id).map(UserProfile::from))
        .ok_or(AuthError::Unauthenticated)?;

    Ok(Json(profile))
}

#[cfg(feature = "web")]
pub async fn handle_update_profile(
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .db
        .write(|t| update_profile(t, user.id, &update).map_err(AppError::from))?;

    Ok(Json(profile))
}

/// Handle password change for authenticated users
///
/// Requires the current password. Records a notification on success.
#[cfg(feature = "web")]
pub async fn handle_change_password(
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(change_req): Json<PasswordChangeRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    change_req.validate()?;

    let current_hash = state
        .db
        .read(|t| t.user(user.id).map(|u| u.password_hash.clone()))
        .ok_or(AuthError::Unauthenticated)?;

    if !verify_password(&change_req.current_password, &current_hash)? {
        return Err(AuthError::IncorrectPassword.into());
    }

    let new_hash = hash_password(&change_req.new_password)?;

    state.db.write(|t| {
        let account = t.user_mut(user.id).ok_or(AuthError::Unauthenticated)?;
        account.password_hash = new_hash;

        t.notifications.push(Notification::new(
            user.id,
            NotificationKind::System,
            notification::PASSWORD_CHANGED,
        ));
        Ok::<_, AppError>(())
    })?;

    info!("User {} changed their password", user.id);
    Ok(Json(StatusResponse::ok("Password changed successfully")))
}

/// Handle a forgotten password
///
/// Stores a reset code valid for one hour and mails it to the user.
#[cfg(feature = "web")]
pub async fn handle_forgot_password(
    State(state): State<SharedState>,
    Json(reset_req): Json<PasswordResetRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    validate_email(&reset_req.email)?;

    let code = state
        .db
        .write(|t| issue_reset_code(t, &reset_req.email, Utc::now()).map_err(AppError::from))?;

    let mailer = state.mailer.clone();
    let email = reset_req.email.trim().to_string();
    tokio::task::spawn_blocking(move || mailer.send_password_reset(&email, &code))
        .await
        .map_err(|e| MailError::Send(e.to_string()))??;

    Ok(Json(StatusResponse::ok("Reset code sent")))
}

/// Handle password reset confirmation
///
/// Checks the reset code and replaces the password. Existing sessions
/// of the user are dropped.
#[cfg(feature = "web")]
pub async fn handle_reset_password(
    State(state): State<SharedState>,
    Json(reset_confirm): Json<PasswordResetConfirm>,
) -> Result<Json<StatusResponse>, AppError> {
    validate_password(&reset_confirm.new_password)?;

    let now = Utc::now();
    // Committed even when the code is wrong, so the attempt counts.
    state
        .db
        .write(|t| {
            Ok::<_, AppError>(attempt_reset_code(
                t,
                &reset_confirm.email,
                &reset_confirm.reset_code,
                now,
            ))
        })?
        .inspect_err(|e| warn!("Rejected reset code for {}: {e}", reset_confirm.email))?;

    let new_hash = hash_password(&reset_confirm.new_password)?;
    let user_id = state.db.write(|t| {
        reset_password(
            t,
            &reset_confirm.email,
            &reset_confirm.reset_code,
            new_hash,
            now,
        )
        .map_err(AppError::from)
    })?;

    state.sessions.revoke_user(user_id);
    info!("Password reset for user {user_id}");

    Ok(Json(StatusResponse::ok("Password reset successful")))
}
