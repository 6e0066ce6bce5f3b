use crate::errors::{AppError, Result};
use std::str::FromStr;

const DEFAULT_CREDITCHEK_ONBOARDING_URL: &str = "https://app.creditchek.africa/customer/onboarding?type=short&appId=5293878414&appLink=eFd1ZNdJda&app_id=64aac9d453a97b63508946e7&status=true";
const DEFAULT_OKRA_LINK_URL: &str = "https://app.okra.ng/LANg3W7CO";

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub rate_limit_per_sec: u64,
    pub http_timeout_secs: u64,
    pub idenfy: IdenfyConfig,
    pub onebrick: OneBrickConfig,
    pub creditchek: CreditChekConfig,
    pub okra: OkraConfig,
    pub storage: StorageConfig,
    pub smtp: Option<SmtpConfig>,
    pub from_email: String,
}

#[derive(Debug, Clone, Default)]
pub struct IdenfyConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Default)]
pub struct OneBrickConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub widget_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreditChekConfig {
    pub base_url: String,
    pub public_key: String,
    pub onboarding_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct OkraConfig {
    pub link_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub base_url: String,
    pub api_key: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigurationError(format!("{} is not a valid number: {}", key, raw))),
        _ => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::ConfigurationError("JWT_SECRET must be set".to_string()))?;

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                username: env_or("SMTP_USERNAME", ""),
                password: env_or("SMTP_PASSWORD", ""),
            }),
            _ => None,
        };

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            database_url: env_or("DATABASE_URL", "sqlite:kyc.db"),
            jwt_secret,
            rate_limit_per_sec: parse_or("RATE_LIMIT_PER_SEC", 5)?,
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 15)?,
            idenfy: IdenfyConfig {
                base_url: env_or("IDENFY_BASE_URL", "https://ivs.idenfy.com"),
                api_key: env_or("IDENFY_API_KEY", ""),
                api_secret: env_or("IDENFY_API_SECRET", ""),
            },
            onebrick: OneBrickConfig {
                base_url: env_or("ONEBRICK_BASE_URL", "https://sandbox.onebrick.io/v2/payments"),
                client_id: env_or("ONEBRICK_CLIENT_ID", ""),
                client_secret: env_or("ONEBRICK_CLIENT_SECRET", ""),
                redirect_url: env_or("ONEBRICK_REDIRECT_URL", ""),
                widget_url: env_or("ONEBRICK_WIDGET_URL", "https://cdn.onebrick.io/sandbox-widget/v1/"),
            },
            creditchek: CreditChekConfig {
                base_url: env_or("CREDITCHEK_BASE_URL", "https://api.creditchek.africa/v1"),
                public_key: env_or("CREDITCHEK_PUBLIC_KEY", ""),
                onboarding_url: env_or("CREDITCHEK_ONBOARDING_URL", DEFAULT_CREDITCHEK_ONBOARDING_URL),
            },
            okra: OkraConfig {
                link_url: env_or("OKRA_LINK_URL", DEFAULT_OKRA_LINK_URL),
            },
            storage: StorageConfig {
                base_url: env_or("SUPABASE_BASE_URL", ""),
                api_key: env_or("SUPABASE_API_KEY", ""),
                bucket: env_or("SUPABASE_BUCKET", "kyc-documents"),
            },
            smtp,
            from_email: env_or("FROM_EMAIL", "noreply@kyc.local"),
        })
    }

    /// Config for tests and local tooling: in-memory database, no outbound mail.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: jwt_secret.to_string(),
            rate_limit_per_sec: 100,
            http_timeout_secs: 2,
            idenfy: IdenfyConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                ..Default::default()
            },
            onebrick: OneBrickConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                widget_url: "https://cdn.onebrick.io/sandbox-widget/v1/".to_string(),
                ..Default::default()
            },
            creditchek: CreditChekConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                public_key: String::new(),
                onboarding_url: DEFAULT_CREDITCHEK_ONBOARDING_URL.to_string(),
            },
            okra: OkraConfig {
                link_url: DEFAULT_OKRA_LINK_URL.to_string(),
            },
            storage: StorageConfig::default(),
            smtp: None,
            from_email: "noreply@kyc.local".to_string(),
        }
    }
}
