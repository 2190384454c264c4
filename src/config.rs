use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Settings for the upstream financial API (Paxos-compatible).
#[derive(Debug, Clone, Deserialize)]
pub struct PaxosConfig {
    pub base_url: String,
    pub api_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub paxos: PaxosConfig,
    /// Marks Set-Cookie with `Secure`. On by default; disable for local http.
    pub cookie_secure: bool,
    /// Enables the operator instant-approval endpoint. Never set in production.
    pub sandbox_mode: bool,
    pub poll_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "vaultbank".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "vaultbank-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        let paxos = PaxosConfig {
            base_url: std::env::var("PAXOS_BASE_URL")
                .unwrap_or_else(|_| "https://api.sandbox.paxos.com/v2".into()),
            api_token: std::env::var("PAXOS_API_TOKEN")?,
        };
        Ok(Self {
            database_url,
            jwt,
            paxos,
            cookie_secure: std::env::var("COOKIE_SECURE")
                .map(|v| v != "false")
                .unwrap_or(true),
            sandbox_mode: std::env::var("SANDBOX_MODE")
                .map(|v| v == "true")
                .unwrap_or(false),
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        })
    }
}
