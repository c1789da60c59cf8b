//! Application settings façade
//!
//! Typed, read-only view of the configuration a host application needs,
//! loaded once from the secret store. Missing names fall back to defaults;
//! values that are present but unparsable are a `Validation` error.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, SecretError};
use crate::secrets::SecretManager;

/// Minimum accepted JWT signing secret length
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Value that must not end up in logs or debug output
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Sensitive<String> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Sensitive<String>,
    pub name: String,
}

impl DatabaseSettings {
    /// Connection URL; carries the password
    pub fn database_url(&self) -> Sensitive<String> {
        Sensitive(format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose(),
            self.host,
            self.port,
            self.name
        ))
    }
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret_key: Sensitive<String>,
    pub algorithm: String,
    pub access_token_expire_minutes: u32,
    pub refresh_token_expire_days: u32,
}

#[derive(Debug, Clone)]
pub struct RecaptchaSettings {
    pub site_key: String,
    pub secret_key: Sensitive<String>,
    pub verify_url: String,
    pub min_score: f64,
}

#[derive(Debug, Clone)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    pub allowed_hosts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Sensitive<String>,
    pub db: u32,
}

impl RedisSettings {
    pub fn redis_url(&self) -> Sensitive<String> {
        let url = if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password.expose(),
                self.host,
                self.port,
                self.db
            )
        };
        Sensitive(url)
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Sensitive<String>,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Sensitive<String>,
    pub tls: bool,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub file: PathBuf,
}

/// Limits in `count/period` notation, e.g. `5/minute`
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub login: String,
    pub register: String,
    pub refresh: String,
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special_chars: bool,
}

#[derive(Debug, Clone)]
pub struct AccountSecurity {
    pub max_login_attempts: u32,
    pub lockout_duration_minutes: u32,
    pub session_timeout_minutes: u32,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_file_size_mb: u64,
    pub upload_dir: PathBuf,
    pub allowed_file_types: Vec<String>,
}

/// Host application configuration
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub recaptcha: RecaptchaSettings,
    pub cors: CorsSettings,
    pub redis: RedisSettings,
    pub openai: OpenAiSettings,
    pub smtp: SmtpSettings,
    pub log: LogSettings,
    pub rate_limit: RateLimitSettings,
    pub password_policy: PasswordPolicy,
    pub account_security: AccountSecurity,
    pub upload: UploadSettings,
}

/// Reads names through `get_or` and converts them
struct Loader<'a> {
    manager: &'a SecretManager,
}

impl Loader<'_> {
    fn string(&self, key: &str, default: &str) -> Result<String> {
        self.manager.get_or(key, default)
    }

    fn secret(&self, key: &str) -> Result<Sensitive<String>> {
        self.manager.get_or(key, "").map(Sensitive)
    }

    fn parse<T: FromStr>(&self, key: &str, default: &str) -> Result<T> {
        let raw = self.manager.get_or(key, default)?;
        raw.trim().parse().map_err(|_| {
            SecretError::Validation(format!(
                "{} must be a {}",
                key,
                std::any::type_name::<T>()
            ))
        })
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        let raw = self.manager.get_or(key, if default { "true" } else { "false" })?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(SecretError::Validation(format!("{} must be true or false", key))),
        }
    }

    fn list(&self, key: &str, default: &str) -> Result<Vec<String>> {
        Ok(self
            .manager
            .get_or(key, default)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl AppSettings {
    /// Read every setting from the store.
    ///
    /// Decryption failures propagate; a default never hides them.
    pub fn load(manager: &SecretManager) -> Result<Self> {
        let l = Loader { manager };

        let settings = Self {
            database: DatabaseSettings {
                host: l.string("DATABASE_HOST", "localhost")?,
                port: l.parse("DATABASE_PORT", "5432")?,
                user: l.string("POSTGRES_USER", "")?,
                password: l.secret("POSTGRES_PASSWORD")?,
                name: l.string("POSTGRES_DB", "")?,
            },
            jwt: JwtSettings {
                secret_key: l.secret("JWT_SECRET_KEY")?,
                algorithm: l.string("JWT_ALGORITHM", "HS256")?,
                access_token_expire_minutes: l.parse("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", "15")?,
                refresh_token_expire_days: l.parse("JWT_REFRESH_TOKEN_EXPIRE_DAYS", "7")?,
            },
            recaptcha: RecaptchaSettings {
                site_key: l.string("RECAPTCHA_SITE_KEY", "")?,
                secret_key: l.secret("RECAPTCHA_SECRET_KEY")?,
                verify_url: l.string(
                    "RECAPTCHA_VERIFY_URL",
                    "https://www.google.com/recaptcha/api/siteverify",
                )?,
                min_score: l.parse("RECAPTCHA_MIN_SCORE", "0.5")?,
            },
            cors: CorsSettings {
                allowed_origins: l.list(
                    "ALLOWED_ORIGINS",
                    "http://localhost:3000,http://127.0.0.1:3000",
                )?,
                allowed_hosts: l.list("ALLOWED_HOSTS", "localhost,127.0.0.1")?,
            },
            redis: RedisSettings {
                host: l.string("REDIS_HOST", "localhost")?,
                port: l.parse("REDIS_PORT", "6379")?,
                password: l.secret("REDIS_PASSWORD")?,
                db: l.parse("REDIS_DB", "0")?,
            },
            openai: OpenAiSettings {
                api_key: l.secret("OPENAI_API_KEY")?,
                model: l.string("OPENAI_MODEL", "gpt-3.5-turbo")?,
                max_tokens: l.parse("OPENAI_MAX_TOKENS", "1000")?,
            },
            smtp: SmtpSettings {
                host: l.string("SMTP_HOST", "")?,
                port: l.parse("SMTP_PORT", "587")?,
                user: l.string("SMTP_USER", "")?,
                password: l.secret("SMTP_PASSWORD")?,
                tls: l.flag("SMTP_TLS", true)?,
            },
            log: LogSettings {
                level: l.string("LOG_LEVEL", "INFO")?,
                file: PathBuf::from(l.string("LOG_FILE", "logs/app.log")?),
            },
            rate_limit: RateLimitSettings {
                login: l.string("RATE_LIMIT_LOGIN", "5/minute")?,
                register: l.string("RATE_LIMIT_REGISTER", "3/hour")?,
                refresh: l.string("RATE_LIMIT_REFRESH", "10/minute")?,
            },
            password_policy: PasswordPolicy {
                min_length: l.parse("PASSWORD_MIN_LENGTH", "8")?,
                require_uppercase: l.flag("PASSWORD_REQUIRE_UPPERCASE", true)?,
                require_lowercase: l.flag("PASSWORD_REQUIRE_LOWERCASE", true)?,
                require_numbers: l.flag("PASSWORD_REQUIRE_NUMBERS", true)?,
                require_special_chars: l.flag("PASSWORD_REQUIRE_SPECIAL_CHARS", true)?,
            },
            account_security: AccountSecurity {
                max_login_attempts: l.parse("MAX_LOGIN_ATTEMPTS", "5")?,
                lockout_duration_minutes: l.parse("ACCOUNT_LOCKOUT_DURATION_MINUTES", "30")?,
                session_timeout_minutes: l.parse("SESSION_TIMEOUT_MINUTES", "60")?,
            },
            upload: UploadSettings {
                max_file_size_mb: l.parse("MAX_FILE_SIZE_MB", "10")?,
                upload_dir: PathBuf::from(l.string("UPLOAD_DIR", "uploads")?),
                allowed_file_types: l.list(
                    "ALLOWED_FILE_TYPES",
                    "jpg,jpeg,png,gif,pdf,doc,docx",
                )?,
            },
        };

        tracing::debug!("Application settings loaded");
        Ok(settings)
    }

    /// Missing or weak critical settings; empty when usable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut require = |value_empty: bool, key: &str| {
            if value_empty {
                problems.push(format!("{} is not set", key));
            }
        };

        require(self.database.host.trim().is_empty(), "DATABASE_HOST");
        require(self.database.user.trim().is_empty(), "POSTGRES_USER");
        require(self.database.password.is_empty(), "POSTGRES_PASSWORD");
        require(self.database.name.trim().is_empty(), "POSTGRES_DB");
        require(self.recaptcha.site_key.trim().is_empty(), "RECAPTCHA_SITE_KEY");
        require(self.recaptcha.secret_key.is_empty(), "RECAPTCHA_SECRET_KEY");

        if self.jwt.secret_key.expose().chars().count() < MIN_JWT_SECRET_LEN {
            problems.push(format!(
                "JWT_SECRET_KEY is not set or shorter than {} characters",
                MIN_JWT_SECRET_LEN
            ));
        }

        problems
    }
}
