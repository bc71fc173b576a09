//! Server configuration, loaded from environment variables at startup.

use std::fmt;

/// Runtime configuration for finchat-server.
///
/// Built once in `main` and shared through [`crate::state::AppState`]; no
/// handler reads the environment directly.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`).
    pub bind_address: String,

    /// sqlx connection URL. Composed from the `DB_*` variables unless
    /// `DATABASE_URL` is set (e.g. `sqlite://finchat.db` for local runs).
    pub database_url: String,

    /// Upper bound on pooled database connections.
    pub db_max_connections: u32,

    /// Bearer key for the completion service.
    pub groq_api_key: String,

    /// Base URL of the OpenAI-compatible completion API.
    pub groq_base_url: String,

    /// Model identifier sent with every completion request.
    pub groq_model: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                mysql_url(
                    &env_or("DB_HOST", "localhost"),
                    parse_env("DB_PORT", 3306),
                    &env_or("DB_USER", "user"),
                    &env_or("DB_PASSWORD", "password"),
                    &env_or("DB_NAME", "finance_app"),
                )
            });

        Self {
            bind_address: env_or("FINCHAT_BIND", "0.0.0.0:5000"),
            database_url,
            db_max_connections: parse_env("FINCHAT_DB_MAX_CONNECTIONS", 5),
            groq_api_key: env_or("GROQ_API_KEY", ""),
            groq_base_url: env_or("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            groq_model: env_or("GROQ_MODEL", "llama3-70b-8192"),
            log_level: env_or("FINCHAT_LOG", "info"),
            log_json: env_flag("FINCHAT_LOG_JSON", false),
            cors_allowed_origins: std::env::var("FINCHAT_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            enable_swagger: env_flag("FINCHAT_ENABLE_SWAGGER", true),
        }
    }

    /// Database URL with the password masked, safe for log output.
    pub fn redacted_database_url(&self) -> String {
        match (self.database_url.find("://"), self.database_url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                let creds = &self.database_url[scheme_end + 3..at];
                let user = creds.split(':').next().unwrap_or_default();
                format!(
                    "{}{}:***{}",
                    &self.database_url[..scheme_end + 3],
                    user,
                    &self.database_url[at..]
                )
            }
            _ => self.database_url.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("database_url", &self.redacted_database_url())
            .field("db_max_connections", &self.db_max_connections)
            .field("groq_api_key", &if self.groq_api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("groq_base_url", &self.groq_base_url)
            .field("groq_model", &self.groq_model)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("enable_swagger", &self.enable_swagger)
            .finish()
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn mysql_url(host: &str, port: u16, user: &str, password: &str, database: &str) -> String {
    format!(
        "mysql://{}:{}@{}:{}/{}",
        urlencoding::encode(user),
        urlencoding::encode(password),
        host,
        port,
        database
    )
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
