use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::collections::HashSet;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub policy: PolicyConfig,
    pub identity: IdentityConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

/// Organizational sign-in policy. Read-only after load.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Literal email suffix, e.g. `@stu.example.edu`.
    pub domain_suffix: String,
    /// Allow-listed 4-character account-suffix tokens.
    pub allowed_accounts: HashSet<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_url: String,
    /// Deadline for the outbound key fetch; on expiry the request fails
    /// closed, never open.
    pub verify_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub general_max_requests: u32,
    pub general_window_seconds: u64,
    pub auth_max_requests: u32,
    pub auth_window_seconds: u64,
    pub contact_max_requests: u32,
    pub contact_window_seconds: u64,
    pub upload_max_requests: u32,
    pub upload_window_seconds: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = GatewayConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("gateway-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            policy: PolicyConfig {
                domain_suffix: get_env("POLICY_DOMAIN_SUFFIX", Some("@stu.example.edu"), is_prod)?,
                allowed_accounts: get_env("POLICY_ALLOWED_ACCOUNTS", Some("DEMO"), is_prod)?
                    .split(',')
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| !t.is_empty())
                    .collect(),
            },
            identity: IdentityConfig {
                issuer: get_env("IDENTITY_ISSUER", Some("https://idp.example.com"), is_prod)?,
                audience: get_env("IDENTITY_AUDIENCE", Some("learning-platform"), is_prod)?,
                jwks_url: get_env(
                    "IDENTITY_JWKS_URL",
                    Some("https://idp.example.com/.well-known/jwks.json"),
                    is_prod,
                )?,
                verify_timeout_seconds: parse_env(
                    "IDENTITY_VERIFY_TIMEOUT_SECONDS",
                    Some("5"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                general_max_requests: parse_env("RATE_LIMIT_GENERAL_MAX", Some("300"), is_prod)?,
                general_window_seconds: parse_env(
                    "RATE_LIMIT_GENERAL_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                auth_max_requests: parse_env("RATE_LIMIT_AUTH_MAX", Some("10"), is_prod)?,
                auth_window_seconds: parse_env(
                    "RATE_LIMIT_AUTH_WINDOW_SECONDS",
                    Some("900"),
                    is_prod,
                )?,
                contact_max_requests: parse_env("RATE_LIMIT_CONTACT_MAX", Some("5"), is_prod)?,
                contact_window_seconds: parse_env(
                    "RATE_LIMIT_CONTACT_WINDOW_SECONDS",
                    Some("3600"),
                    is_prod,
                )?,
                upload_max_requests: parse_env("RATE_LIMIT_UPLOAD_MAX", Some("30"), is_prod)?,
                upload_window_seconds: parse_env(
                    "RATE_LIMIT_UPLOAD_WINDOW_SECONDS",
                    Some("600"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if !self.policy.domain_suffix.contains('@') {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "POLICY_DOMAIN_SUFFIX must include the '@' separator"
            )));
        }

        if self.policy.allowed_accounts.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "POLICY_ALLOWED_ACCOUNTS must list at least one account token"
            )));
        }

        // Tokens are defined as the last 4 characters of the local part;
        // any other length can never match and is a configuration mistake.
        if let Some(bad) = self
            .policy
            .allowed_accounts
            .iter()
            .find(|t| t.chars().count() != 4)
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "POLICY_ALLOWED_ACCOUNTS entry '{}' is not a 4-character token",
                bad
            )));
        }

        let windows = [
            self.rate_limit.general_window_seconds,
            self.rate_limit.auth_window_seconds,
            self.rate_limit.contact_window_seconds,
            self.rate_limit.upload_window_seconds,
        ];
        let maxes = [
            self.rate_limit.general_max_requests,
            self.rate_limit.auth_max_requests,
            self.rate_limit.contact_max_requests,
            self.rate_limit.upload_max_requests,
        ];
        if windows.contains(&0) || maxes.contains(&0) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Rate limit windows and maximums must be positive"
            )));
        }

        if self.identity.verify_timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "IDENTITY_VERIFY_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!(
                    "Swagger is publicly accessible in production - consider disabling it"
                );
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} is not valid: {}", key, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
