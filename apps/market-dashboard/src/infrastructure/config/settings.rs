//! Dashboard Configuration Settings
//!
//! Configuration types for the dashboard service, loaded from environment
//! variables.

use std::time::Duration;

/// Signing key used when `DASHBOARD_JWT_SECRET` is not set.
const DEV_JWT_SECRET: &str = "market-dashboard-dev-secret";

/// Cost bounds accepted by `bcrypt` (mirrors the crate's private constants).
const BCRYPT_MIN_COST: u32 = 4;
const BCRYPT_MAX_COST: u32 = 31;

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP/WebSocket port.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

/// Price simulation settings.
#[derive(Debug, Clone)]
pub struct PricingSettings {
    /// Time between price ticks.
    pub tick_interval: Duration,
    /// Bound on each tick's relative change, in basis points.
    pub max_change_bps: u32,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(2_000),
            max_change_bps: 200,
        }
    }
}

/// Subscriber fan-out settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Bound on a single subscriber send before it is evicted.
    pub send_timeout: Duration,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(1_000),
        }
    }
}

/// Credential settings.
#[derive(Clone)]
pub struct AuthSettings {
    jwt_secret: String,
    default_secret: bool,
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
    operator_key: Option<String>,
    /// Whether to seed the `demo` account.
    pub seed_demo_user: bool,
    /// bcrypt work factor for stored passwords.
    pub password_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            default_secret: true,
            token_ttl: Duration::from_secs(86_400),
            operator_key: None,
            seed_demo_user: true,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AuthSettings {
    /// Create settings with an explicit signing key.
    #[must_use]
    pub fn new(jwt_secret: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            default_secret: false,
            token_ttl,
            ..Self::default()
        }
    }

    /// Require `key` on operator-only routes.
    #[must_use]
    pub fn with_operator_key(mut self, key: impl Into<String>) -> Self {
        self.operator_key = Some(key.into());
        self
    }

    /// Get the HS256 signing key.
    #[must_use]
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Whether the built-in development key is in use.
    #[must_use]
    pub const fn uses_default_secret(&self) -> bool {
        self.default_secret
    }

    /// Get the operator key, if one is configured.
    #[must_use]
    pub fn operator_key(&self) -> Option<&str> {
        self.operator_key.as_deref()
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"[REDACTED]")
            .field("default_secret", &self.default_secret)
            .field("token_ttl", &self.token_ttl)
            .field(
                "operator_key",
                &self.operator_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("seed_demo_user", &self.seed_demo_user)
            .field("password_cost", &self.password_cost)
            .finish()
    }
}

/// Complete dashboard configuration.
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Price simulation settings.
    pub pricing: PricingSettings,
    /// Subscriber fan-out settings.
    pub broadcast: BroadcastSettings,
    /// Credential settings.
    pub auth: AuthSettings,
}

impl DashboardConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparseable or zero numbers fall back to their defaults, except the
    /// tick interval and send timeout, where zero is rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server = ServerSettings {
            http_port: parse_nonzero(
                &lookup,
                "DASHBOARD_HTTP_PORT",
                ServerSettings::default().http_port,
            ),
        };

        let pricing = PricingSettings {
            tick_interval: parse_positive_millis(
                &lookup,
                "DASHBOARD_TICK_INTERVAL_MS",
                PricingSettings::default().tick_interval,
            )?,
            max_change_bps: parse_nonzero(
                &lookup,
                "DASHBOARD_MAX_CHANGE_BPS",
                PricingSettings::default().max_change_bps,
            ),
        };
        if pricing.max_change_bps >= 10_000 {
            return Err(ConfigError::InvalidValue {
                key: "DASHBOARD_MAX_CHANGE_BPS".to_string(),
                reason: "must be below 10000 (100%)".to_string(),
            });
        }

        let broadcast = BroadcastSettings {
            send_timeout: parse_positive_millis(
                &lookup,
                "DASHBOARD_SEND_TIMEOUT_MS",
                BroadcastSettings::default().send_timeout,
            )?,
        };

        let mut auth = match lookup("DASHBOARD_JWT_SECRET") {
            Some(secret) if secret.is_empty() => {
                return Err(ConfigError::EmptyValue("DASHBOARD_JWT_SECRET".to_string()));
            }
            Some(secret) => AuthSettings::new(secret, AuthSettings::default().token_ttl),
            None => AuthSettings::default(),
        };
        auth.token_ttl = Duration::from_secs(parse_nonzero(
            &lookup,
            "DASHBOARD_TOKEN_TTL_SECS",
            AuthSettings::default().token_ttl.as_secs(),
        ));
        auth.operator_key = lookup("DASHBOARD_OPERATOR_KEY").filter(|key| !key.is_empty());
        auth.seed_demo_user = lookup("DASHBOARD_DEMO_USER")
            .is_none_or(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"));
        auth.password_cost = parse_nonzero(
            &lookup,
            "DASHBOARD_BCRYPT_COST",
            AuthSettings::default().password_cost,
        );
        if !(BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(&auth.password_cost) {
            return Err(ConfigError::InvalidValue {
                key: "DASHBOARD_BCRYPT_COST".to_string(),
                reason: format!(
                    "must be between {} and {}",
                    BCRYPT_MIN_COST,
                    BCRYPT_MAX_COST
                ),
            });
        }

        Ok(Self {
            server,
            pricing,
            broadcast,
            auth,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has a value that cannot be used.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

fn parse_nonzero<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Default + PartialEq,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .filter(|v| *v != T::default())
        .unwrap_or(default)
}

fn parse_positive_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(key).and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => Ok(default),
    }
}
