/*!
 * # Authentication and Authorization
 *
 * Bearer-token authentication plus the per-feature permission gate.
 *
 * Tokens carry identity only (subject, username). The account snapshot
 * behind a request - role, permission set, tenant and tenant status - is
 * loaded from the database on every request, so permission edits and
 * deactivation take effect immediately instead of at token expiry.
 */

pub mod permissions;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::{restaurant, user};
use crate::errors::ServiceError;

pub use permissions::{
    check_access, keys, AccessDenied, AccountType, Action, FeatureGrant, PermissionSet,
    PermissionValue, UserRole,
};

/// How long a password-reset token stays redeemable.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const RESET_TOKEN_LEN: usize = 48;

/// JWT claims. Identity only; authorization state lives in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub username: String,
    /// Token id
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Issued on login and setup completion.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until expiry
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration_secs: i64,
    pub issuer: String,
    pub audience: String,
}

impl AuthConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            token_expiration_secs: config.jwt_expiration as i64,
            issuer: config.auth_issuer.clone(),
            audience: config.auth_audience.clone(),
        }
    }
}

/// Token issuing/validation plus credential handling. Cheap to clone;
/// handlers and the auth middleware share one instance through state.
#[derive(Clone)]
pub struct AuthService {
    config: Arc<AuthConfig>,
    db: Arc<DbPool>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DbPool>) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }

    /// Sign a token for an account. The subject is the account id; no
    /// authorization data is embedded.
    pub fn generate_token(&self, account: &user::Model) -> Result<AuthToken, ServiceError> {
        let now = Utc::now();
        let expires_in = self.config.token_expiration_secs;
        let claims = Claims {
            sub: account.id.to_string(),
            username: account.username.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::seconds(expires_in)).timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|err| ServiceError::JwtError(err.to_string()))?;

        Ok(AuthToken {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in,
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::AuthError("Token has expired".to_string())
            }
            _ => ServiceError::AuthError("Invalid token".to_string()),
        })
    }

    pub fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};

        let salt = SaltString::generate(&mut OsRng);
        argon2::Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| ServiceError::HashError(err.to_string()))
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ServiceError> {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        let parsed =
            PasswordHash::new(hash).map_err(|err| ServiceError::HashError(err.to_string()))?;
        Ok(argon2::Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Username/password login. The failure message never says whether the
    /// username exists.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(user::Model, AuthToken), ServiceError> {
        let invalid = || ServiceError::AuthError("Invalid username or password".to_string());

        let account = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(invalid)?;

        if !self.verify_password(password, &account.password_hash)? {
            warn!(username, "login rejected: bad credentials");
            return Err(invalid());
        }
        if !account.is_active {
            return Err(ServiceError::AuthError("Account is disabled".to_string()));
        }

        let mut active: user::ActiveModel = account.into();
        active.last_login_at = Set(Some(Utc::now()));
        let account = active.update(self.db.as_ref()).await?;

        let token = self.generate_token(&account)?;
        Ok((account, token))
    }

    /// Mint a password-reset token for the account, storing only its
    /// digest. Returns `None` when the username is unknown; the handler
    /// answers identically either way.
    pub async fn issue_reset_token(&self, username: &str) -> Result<Option<String>, ServiceError> {
        let Some(account) = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(None);
        };

        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RESET_TOKEN_LEN)
            .map(char::from)
            .collect();

        let mut active: user::ActiveModel = account.into();
        active.reset_token_digest = Set(Some(digest_reset_token(&token)));
        active.reset_token_expires_at =
            Set(Some(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES)));
        active.update(self.db.as_ref()).await?;

        Ok(Some(token))
    }

    /// Redeem a reset token. Single-use: the digest is cleared on success.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let expired = || ServiceError::AuthError("Reset link is invalid or has expired".to_string());

        let account = user::Entity::find()
            .filter(user::Column::ResetTokenDigest.eq(digest_reset_token(token)))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(expired)?;

        match account.reset_token_expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            _ => return Err(expired()),
        }

        let password_hash = self.hash_password(new_password)?;
        let mut active: user::ActiveModel = account.into();
        active.password_hash = Set(password_hash);
        active.reset_token_digest = Set(None);
        active.reset_token_expires_at = Set(None);
        active.update(self.db.as_ref()).await?;

        Ok(())
    }

    /// Resolve the account snapshot behind a validated token. Fails closed:
    /// missing or deactivated accounts turn into a 401, never a partial
    /// context.
    pub async fn load_current_user(&self, claims: &Claims) -> Result<CurrentUser, ServiceError> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::AuthError("Malformed token subject".to_string()))?;
        self.snapshot(user_id).await
    }

    /// Account snapshot by id. Shared by the middleware path and the login
    /// response.
    pub async fn snapshot(&self, user_id: Uuid) -> Result<CurrentUser, ServiceError> {
        let account = user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::AuthError("Account no longer exists".to_string()))?;

        if !account.is_active {
            return Err(ServiceError::AuthError("Account is disabled".to_string()));
        }

        let tenant_status = match account.restaurant_id {
            Some(restaurant_id) => {
                let tenant = restaurant::Entity::find_by_id(restaurant_id)
                    .one(self.db.as_ref())
                    .await?
                    .ok_or_else(|| {
                        ServiceError::AuthError("Tenant no longer exists".to_string())
                    })?;
                Some(tenant.status)
            }
            None => None,
        };

        let account_type = if account.restaurant_id.is_some() {
            AccountType::Client
        } else {
            AccountType::It
        };

        Ok(CurrentUser {
            user_id: account.id,
            username: account.username,
            display_name: account.display_name,
            role: UserRole::parse(&account.role),
            account_type,
            restaurant_id: account.restaurant_id,
            permissions: PermissionSet::from_stored(&account.permissions),
            tenant_status,
        })
    }
}

fn digest_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The resolved account behind a request. Inserted into request extensions
/// by [`auth_middleware`]; handlers receive it as an extractor.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub account_type: AccountType,
    /// `None` for IT operators
    pub restaurant_id: Option<Uuid>,
    pub permissions: PermissionSet,
    /// Status of the owning tenant; `None` for IT operators
    pub tenant_status: Option<String>,
}

impl CurrentUser {
    /// The tenant every query must be scoped to. IT operators have no
    /// tenant of their own and are refused here.
    pub fn tenant_id(&self) -> Result<Uuid, ServiceError> {
        self.restaurant_id.ok_or_else(|| {
            ServiceError::Forbidden("This action requires a restaurant account".to_string())
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_it(&self) -> bool {
        self.account_type == AccountType::It
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ServiceError::AuthError("Authentication required".to_string()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Validates the bearer token, loads the account snapshot and stores it in
/// request extensions. Mounted once over the protected API surface.
pub async fn auth_middleware(
    State(auth): State<AuthService>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ServiceError::AuthError("Missing authorization header".to_string()))?;

    let claims = auth.validate_token(token)?;
    let user = auth.load_current_user(&claims).await?;
    debug!(user_id = %user.user_id, account_type = ?user.account_type, "authenticated");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Per-feature gate. The action is derived from the HTTP method, so a
/// route group gets read/write/delete granularity from a single layer.
///
/// Tenants that are not `active` are cut off here, which leaves the auth
/// endpoints (login, setup, self-lookup) reachable during onboarding.
pub async fn require_feature(
    State(feature): State<&'static str>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .ok_or_else(|| ServiceError::AuthError("Authentication required".to_string()))?;

    if let Some(status) = user.tenant_status.as_deref() {
        match status {
            "active" => {}
            "pending_setup" => {
                return Err(ServiceError::Forbidden(
                    "Finish restaurant setup before using this feature".to_string(),
                ))
            }
            _ => {
                return Err(ServiceError::Forbidden(
                    "This restaurant account is suspended".to_string(),
                ))
            }
        }
    }

    let action = Action::from_method(request.method());
    check_access(
        user.account_type,
        user.role,
        &user.permissions,
        feature,
        action,
    )
    .map_err(|denied| ServiceError::Forbidden(denied.to_string()))?;

    Ok(next.run(request).await)
}

/// Attaches the feature gate to a route group.
pub trait RouterExt {
    fn with_feature(self, feature: &'static str) -> Self;
}

impl<S> RouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_feature(self, feature: &'static str) -> Self {
        debug_assert!(
            permissions::is_known_feature(feature),
            "unknown feature key `{feature}`"
        );
        self.layer(axum::middleware::from_fn_with_state(
            feature,
            require_feature,
        ))
    }
}
