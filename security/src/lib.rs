// security/src/lib.rs
//! Password hashing, bearer tokens and the role gate in front of the
//! dashboards. Identity comes from the token; the role is always read from
//! the account's `users` profile.

use std::fmt;
use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use chrono::Utc;
use hms_lib::config::AuthSettings;
use hms_lib::repository::users::UserRepository;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use models::medical::{Role, UserProfile};
use models::{generate_document_id, HospitalError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub mod gate;
pub mod roles;

pub use gate::{AuthGate, Redirect, Session};
pub use roles::RolesConfig;

/// Sign-in form.
#[derive(Debug, Deserialize, Serialize)]
pub struct UserLogin {
    pub email: String,
    pub password: String,
}

/// What a successful sign-in hands back to the dashboard.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub uid: String,
    pub name: String,
    pub role: Role,
    pub redirect: String,
}

/// Claims for JWT.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String, // uid
    pub exp: u64,
    pub iat: u64,
}

#[derive(Debug, PartialEq)]
pub enum AuthError {
    InvalidCredentials,
    MissingToken,
    InvalidToken(String),
    TokenExpired,
    JwtError(String),
    PasswordHashError(String),
    InternalError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid e-mail or password"),
            AuthError::MissingToken => write!(f, "No session token was provided"),
            AuthError::InvalidToken(msg) => write!(f, "Invalid session token: {}", msg),
            AuthError::TokenExpired => write!(f, "Session has expired"),
            AuthError::JwtError(msg) => write!(f, "JWT error: {}", msg),
            AuthError::PasswordHashError(msg) => write!(f, "Password hashing error: {}", msg),
            AuthError::InternalError(msg) => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<HospitalError> for AuthError {
    fn from(err: HospitalError) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

impl From<AuthError> for HospitalError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired => HospitalError::Unauthenticated(err.to_string()),
            AuthError::JwtError(_) | AuthError::PasswordHashError(_) | AuthError::InternalError(_) => {
                HospitalError::InternalError(err.to_string())
            }
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHashError(e.to_string()))
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hashed_password)
        .map_err(|e| AuthError::PasswordHashError(e.to_string()))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Issues and checks HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        let hours = settings.token_ttl_hours.max(1) as u64;
        Self::new(&settings.jwt_secret, Duration::from_secs(hours * 3600))
    }

    pub fn issue(&self, uid: &str) -> Result<String, AuthError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims { sub: uid.to_string(), iat: now, exp: now + self.ttl.as_secs() };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| AuthError::JwtError(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

/// Checks the password against the profile found by e-mail and issues a token.
/// An unknown address and a wrong password are indistinguishable to the caller.
pub async fn login_user(
    users: &UserRepository,
    tokens: &TokenService,
    login: &UserLogin,
) -> Result<LoginResponse, AuthError> {
    let profile = users
        .find_by_email(&login.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let Some(hash) = profile.password_hash.as_deref() else {
        debug!("Account {} has no password login", profile.uid);
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(&login.password, hash)? {
        return Err(AuthError::InvalidCredentials);
    }
    let token = tokens.issue(&profile.uid)?;
    info!(uid = %profile.uid, role = %profile.role, "User signed in");
    Ok(LoginResponse {
        token,
        uid: profile.uid,
        name: profile.name,
        role: profile.role,
        redirect: profile.role.dashboard_path().to_string(),
    })
}

/// Creates a staff account with a hashed password. Used by the provisioning CLI.
pub async fn create_account(
    users: &UserRepository,
    name: &str,
    email: &str,
    role: Role,
    password: &str,
) -> Result<UserProfile, AuthError> {
    if users.find_by_email(email).await?.is_some() {
        return Err(AuthError::InternalError(format!("an account for {} already exists", email)));
    }
    let profile = UserProfile {
        uid: generate_document_id(),
        name: name.trim().to_string(),
        email: email.trim().to_lowercase(),
        role,
        password_hash: Some(hash_password(password)?),
        created_at: Utc::now(),
    };
    users.put_profile(&profile).await?;
    info!(uid = %profile.uid, role = %role, "Created account");
    Ok(profile)
}
