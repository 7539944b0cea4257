//! Authentication Adapters
//!
//! HS256 bearer tokens and an in-memory account store.
//!
//! Tokens carry the username as `sub`. Passwords are stored as bcrypt hashes
//! with a configurable work factor; hashing and verification are CPU-bound
//! and belong on a blocking thread.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::AuthSettings;
use crate::application::ports::{AuthError, Authenticator};
use crate::domain::ledger::SubjectId;

/// Minimum username length, in characters.
pub const MIN_USERNAME_LEN: usize = 3;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Account seeded for local use.
pub const DEMO_USERNAME: &str = "demo";

/// Password of the seeded account.
pub const DEMO_PASSWORD: &str = "demo123";

// =============================================================================
// Bearer Tokens
// =============================================================================

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens.
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuthenticator {
    /// Create an authenticator signing with `secret`.
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Create an authenticator from settings.
    #[must_use]
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.jwt_secret(), settings.token_ttl)
    }

    /// Issue a token for `subject`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenIssue` if signing fails.
    pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            iat,
            exp: iat.saturating_add(ttl),
        };

        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` for a bad signature, malformed
    /// token or expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AuthError::Unauthenticated
            })
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, bearer_token: Option<&str>) -> Result<SubjectId, AuthError> {
        let token = bearer_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        self.verify(token).map(|claims| claims.sub)
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Accounts
// =============================================================================

#[derive(Clone)]
struct PasswordHash(String);

impl PasswordHash {
    fn new(password: &str, cost: u32) -> Result<Self, AuthError> {
        bcrypt::hash(password, cost)
            .map(Self)
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    fn matches(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.0).unwrap_or(false)
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

/// In-memory username/password store.
#[derive(Debug)]
pub struct UserDirectory {
    cost: u32,
    users: RwLock<HashMap<String, PasswordHash>>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl UserDirectory {
    /// Create an empty directory hashing with bcrypt `cost`.
    #[must_use]
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Create a directory from credential settings, seeding `demo` if asked.
    #[must_use]
    pub fn from_settings(settings: &AuthSettings) -> Self {
        let directory = Self::new(settings.password_cost);
        if settings.seed_demo_user {
            directory.seed_demo_user();
        }
        directory
    }

    /// Add the `demo` account.
    pub fn seed_demo_user(&self) {
        match PasswordHash::new(DEMO_PASSWORD, self.cost) {
            Ok(hash) => {
                self.users.write().insert(DEMO_USERNAME.to_string(), hash);
            }
            Err(e) => tracing::error!(error = %e, "Failed to seed demo account"),
        }
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRegistration` if a field is too short,
    /// `AuthError::UsernameTaken` if the name is in use and
    /// `AuthError::Hashing` if the password cannot be hashed.
    pub fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(AuthError::InvalidRegistration(format!(
                "username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidRegistration(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.users.read().contains_key(username) {
            return Err(AuthError::UsernameTaken(username.to_string()));
        }

        let hash = PasswordHash::new(password, self.cost)?;
        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(AuthError::UsernameTaken(username.to_string()));
        }
        users.insert(username.to_string(), hash);
        drop(users);

        tracing::info!(username, "Account registered");
        Ok(())
    }

    /// Check a username/password pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown user or a wrong
    /// password.
    pub fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let hash = self
            .users
            .read()
            .get(username)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        if hash.matches(password) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether there are no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn authenticator() -> JwtAuthenticator {
        JwtAuthenticator::new("test-secret", Duration::from_secs(3600))
    }

    fn directory() -> UserDirectory {
        UserDirectory::new(4 /* bcrypt minimum cost */)
    }

    fn demo_directory() -> UserDirectory {
        let users = directory();
        users.seed_demo_user();
        users
    }

    #[test]
    fn issued_token_authenticates_subject() {
        let auth = authenticator();
        let token = auth.issue("demo").unwrap();

        assert_eq!(auth.authenticate(Some(&token)).unwrap(), "demo");
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn missing_token_is_unauthenticated() {
        let auth = authenticator();
        assert_eq!(auth.authenticate(None), Err(AuthError::Unauthenticated));
        assert_eq!(auth.authenticate(Some("  ")), Err(AuthError::Unauthenticated));
    }

    #[test]
    fn forged_token_is_rejected() {
        let token = JwtAuthenticator::new("other-secret", Duration::from_secs(60))
            .issue("mallory")
            .unwrap();

        assert_eq!(
            authenticator().authenticate(Some(&token)),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = authenticator();
        let now = Utc::now().timestamp();
        let token = auth
            .sign(&Claims {
                sub: "demo".to_string(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        assert_eq!(auth.authenticate(Some(&token)), Err(AuthError::Unauthenticated));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert_err!(authenticator().authenticate(Some("not.a.jwt")));
        assert_err!(authenticator().verify("not.a.jwt"));
    }

    #[test]
    fn demo_user_can_log_in() {
        let users = demo_directory();
        assert_ok!(users.verify(DEMO_USERNAME, DEMO_PASSWORD));
        assert_eq!(
            users.verify(DEMO_USERNAME, "wrong-password"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            users.verify("nobody", DEMO_PASSWORD),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn register_then_verify() {
        let users = directory();
        assert_ok!(users.register("alice", "s3cret!"));

        assert_ok!(users.verify("alice", "s3cret!"));
        assert_eq!(
            users.register("alice", "another1"),
            Err(AuthError::UsernameTaken("alice".to_string()))
        );
        assert_eq!(users.len(), 1);
    }

    #[test_case("al", "secret1" ; "short username")]
    #[test_case("alice", "12345" ; "short password")]
    #[test_case("", "" ; "empty fields")]
    fn register_rejects_short_fields(username: &str, password: &str) {
        let users = directory();
        assert!(matches!(
            users.register(username, password),
            Err(AuthError::InvalidRegistration(_))
        ));
        assert!(users.is_empty());
    }

    #[test]
    fn passwords_are_stored_as_salted_bcrypt() {
        let a = PasswordHash::new("password", 4 /* bcrypt minimum cost */).unwrap();
        let b = PasswordHash::new("password", 4 /* bcrypt minimum cost */).unwrap();

        assert!(a.0.starts_with("$2b$04$"));
        assert_ne!(a.0, b.0);
        assert!(!a.0.contains("password"));
        assert!(a.matches("password") && b.matches("password"));
        assert!(!a.matches("Password"));
    }

    #[test]
    fn directory_uses_configured_cost() {
        let mut settings = AuthSettings::default();
        settings.password_cost = 5;
        let users = UserDirectory::from_settings(&settings);

        let stored = users.users.read()[DEMO_USERNAME].0.clone();
        assert!(stored.starts_with("$2b$05$"));
        assert_ok!(users.verify(DEMO_USERNAME, DEMO_PASSWORD));
    }

    #[test]
    fn invalid_cost_is_a_hashing_error() {
        let users = UserDirectory::new(99);
        assert!(matches!(
            users.register("alice", "s3cret!"),
            Err(AuthError::Hashing(_))
        ));
        assert!(users.is_empty());
    }

    #[test]
    fn debug_hides_digest() {
        let users = demo_directory();
        let debug = format!("{users:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("$2b$"));
    }
}
