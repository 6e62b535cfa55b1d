use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, CredentialsRequest},
        jwt::JwtKeys,
        password::{hash_password, hash_password_blocking, verify_password_blocking},
        repo::UserRepo,
    },
    db::RepoError,
    error::{ApiError, ApiResult},
};

const MIN_PASSWORD_LEN: usize = 8;
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(crate) fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

lazy_static! {
    /// Verified against when the username is unknown, so every failed login
    /// costs one Argon2 pass.
    static ref DUMMY_HASH: Option<String> = hash_password("no-such-account-password").ok();
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[^\s]{3,64}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub async fn register(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    req: CredentialsRequest,
) -> ApiResult<AuthResponse> {
    let username = normalize_username(&req.username);
    if !is_valid_username(&username) {
        warn!(%username, "invalid username");
        return Err(ApiError::BadRequest(
            "Username must be 3-64 characters without spaces".into(),
        ));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if users.find_by_username(&username).await?.is_some() {
        warn!(%username, "username already registered");
        return Err(ApiError::BadRequest("Username already taken".into()));
    }

    let hash = hash_password_blocking(req.password).await?;
    let user = match users.create(&username, &hash).await {
        Ok(u) => u,
        Err(RepoError::Duplicate) => {
            warn!(%username, "username registered concurrently");
            return Err(ApiError::BadRequest("Username already taken".into()));
        }
        Err(RepoError::Other(e)) => return Err(e.into()),
    };

    let token = keys.sign(user.id, &user.username)?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

pub async fn login(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    req: CredentialsRequest,
) -> ApiResult<AuthResponse> {
    let username = normalize_username(&req.username);
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("Username and password are required".into()));
    }

    let Some(user) = users.find_by_username(&username).await? else {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            verify_password_blocking(req.password, dummy.to_string()).await?;
        }
        warn!(%username, "login unknown username");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if !verify_password_blocking(req.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = keys.sign(user.id, &user.username)?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}
