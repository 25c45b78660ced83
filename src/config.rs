//! Configuration management for TaskChat
//!
//! Defaults work out of the box; every knob has a `TASKCHAT_*` environment
//! override for production.

use std::env;
use std::path::PathBuf;
use tracing::info;

/// Overwrites `target` when the variable is set and parses.
fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = env::var(key) {
        if let Ok(value) = raw.parse() {
            *target = value;
        }
    }
}

/// Comma-separated variable as a trimmed list; `None` when unset.
fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// `TASKCHAT_ENV` set to `production` or `prod`.
fn env_is_production() -> bool {
    env::var("TASKCHAT_ENV")
        .map(|v| {
            let v = v.to_lowercase();
            v == "production" || v == "prod"
        })
        .unwrap_or(false)
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Origins allowlist; empty means every origin is accepted
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Whether to allow credentials
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "PATCH".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "X-API-Key".to_string(),
                "X-Request-ID".to_string(),
            ],
            allow_credentials: false,
            max_age_seconds: 86400, // 24 hours
        }
    }
}

impl CorsConfig {
    /// Reads the `TASKCHAT_CORS_*` family. A production deployment with no
    /// origins configured gets a loud warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(origins) = env_list("TASKCHAT_CORS_ORIGINS") {
            config.allowed_origins = origins;
        }
        if let Some(methods) = env_list("TASKCHAT_CORS_METHODS") {
            config.allowed_methods = methods.into_iter().map(|m| m.to_uppercase()).collect();
        }
        if let Some(headers) = env_list("TASKCHAT_CORS_HEADERS") {
            config.allowed_headers = headers;
        }
        if let Ok(val) = env::var("TASKCHAT_CORS_CREDENTIALS") {
            config.allow_credentials = val.to_lowercase() == "true" || val == "1";
        }
        env_parse("TASKCHAT_CORS_MAX_AGE", &mut config.max_age_seconds);

        if env_is_production() && config.allowed_origins.is_empty() {
            tracing::warn!(
                "⚠️  PRODUCTION WARNING: CORS allows all origins. Set TASKCHAT_CORS_ORIGINS for security."
            );
        }

        config
    }

    /// True when an origins allowlist is active.
    pub fn is_restricted(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    /// Origins policy: permissive with no list, otherwise the parseable
    /// entries. A list where nothing parses denies every origin rather
    /// than opening up.
    fn resolve_origins(&self) -> tower_http::cors::AllowOrigin {
        use tower_http::cors::AllowOrigin;

        if self.allowed_origins.is_empty() {
            return AllowOrigin::any();
        }

        let mut valid = Vec::new();
        for origin in &self.allowed_origins {
            match origin.parse::<axum::http::HeaderValue>() {
                Ok(parsed) => valid.push(parsed),
                Err(_) => tracing::warn!("CORS: Invalid origin '{}' - skipping", origin),
            }
        }

        if valid.is_empty() {
            tracing::error!(
                "CORS: none of the {} configured origin(s) parsed; rejecting all \
                 cross-origin requests. Fix TASKCHAT_CORS_ORIGINS.",
                self.allowed_origins.len()
            );
            return AllowOrigin::list(Vec::<axum::http::HeaderValue>::new());
        }

        if valid.len() < self.allowed_origins.len() {
            tracing::info!(
                "CORS: using {} of {} configured origin(s)",
                valid.len(),
                self.allowed_origins.len()
            );
        }
        AllowOrigin::list(valid)
    }

    /// Assembles the tower-http layer.
    pub fn to_layer(&self) -> tower_http::cors::CorsLayer {
        use tower_http::cors::{Any, CorsLayer};

        let methods: Vec<axum::http::Method> = self
            .allowed_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        let headers: Vec<axum::http::HeaderName> = self
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();

        let mut layer = CorsLayer::new()
            .allow_origin(self.resolve_origins())
            .max_age(std::time::Duration::from_secs(self.max_age_seconds));

        layer = if methods.is_empty() {
            layer.allow_methods(Any)
        } else {
            layer.allow_methods(methods)
        };
        layer = if headers.is_empty() {
            layer.allow_headers(Any)
        } else {
            layer.allow_headers(headers)
        };

        if self.allow_credentials {
            layer = layer.allow_credentials(true);
        }

        layer
    }
}

/// Runtime settings for the server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address; 0.0.0.0 for Docker or anything network-facing
    /// (default: 127.0.0.1)
    pub host: String,

    /// Server port (default: 3040)
    pub port: u16,

    /// Storage path for RocksDB (default: ./taskchat_data)
    pub storage_path: PathBuf,

    /// Per-user cap on stored audit entries (default: 10000)
    pub audit_max_entries_per_user: usize,

    /// Days an audit entry survives before pruning (default: 30)
    pub audit_retention_days: u64,

    /// Rate limit: requests per second (default: 100)
    pub rate_limit_per_second: u64,

    /// Rate limit burst, sized for short chat exchanges (default: 200)
    pub rate_limit_burst: u32,

    /// Upper bound on in-flight requests (default: 200)
    pub max_concurrent_requests: usize,

    /// Seconds before an in-flight request is abandoned (default: 60)
    pub request_timeout_secs: u64,

    /// Whether running in production mode
    pub is_production: bool,

    /// CORS configuration
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
            storage_path: PathBuf::from("./taskchat_data"),
            audit_max_entries_per_user: 10_000,
            audit_retention_days: 30,
            rate_limit_per_second: 100,
            rate_limit_burst: 200,
            max_concurrent_requests: 200,
            request_timeout_secs: 60,
            is_production: false,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Environment overrides applied on top of the defaults.
    #[allow(clippy::field_reassign_with_default)] // Environment overrides require mutable config
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.is_production = env_is_production();
        env_parse("TASKCHAT_HOST", &mut config.host);
        env_parse("TASKCHAT_PORT", &mut config.port);
        env_parse("TASKCHAT_DATA_PATH", &mut config.storage_path);
        env_parse(
            "TASKCHAT_AUDIT_MAX_ENTRIES",
            &mut config.audit_max_entries_per_user,
        );
        env_parse(
            "TASKCHAT_AUDIT_RETENTION_DAYS",
            &mut config.audit_retention_days,
        );
        env_parse("TASKCHAT_RATE_LIMIT", &mut config.rate_limit_per_second);
        env_parse("TASKCHAT_RATE_BURST", &mut config.rate_limit_burst);
        env_parse(
            "TASKCHAT_MAX_CONCURRENT",
            &mut config.max_concurrent_requests,
        );
        env_parse("TASKCHAT_REQUEST_TIMEOUT", &mut config.request_timeout_secs);
        config.cors = CorsConfig::from_env();

        config
    }

    /// Log the current configuration
    pub fn log(&self) {
        info!("📋 Configuration:");
        info!(
            "   Mode: {}",
            if self.is_production {
                "PRODUCTION"
            } else {
                "Development"
            }
        );
        info!("   Host: {}", self.host);
        info!("   Port: {}", self.port);
        info!("   Storage: {}", self.storage_path.display());
        if self.rate_limit_per_second > 0 {
            info!(
                "   Rate limit: {}/s, burst {}",
                self.rate_limit_per_second, self.rate_limit_burst
            );
        } else {
            info!("   Rate limit: disabled");
        }
        info!("   Concurrency cap: {}", self.max_concurrent_requests);
        info!("   Request timeout: {}s", self.request_timeout_secs);
        info!("   Audit retention: {} days", self.audit_retention_days);
        if self.cors.is_restricted() {
            info!("   CORS origins: {:?}", self.cors.allowed_origins);
        } else {
            info!("   CORS: Permissive (all origins allowed)");
        }
    }
}

/// Environment variable documentation
pub fn print_env_help() {
    println!("TaskChat Configuration Environment Variables:");
    println!();
    println!("  TASKCHAT_ENV               - Set to 'production' or 'prod' for production mode");
    println!(
        "  TASKCHAT_HOST              - Bind address (default: 127.0.0.1, use 0.0.0.0 for Docker)"
    );
    println!("  TASKCHAT_PORT              - Server port (default: 3040)");
    println!("  TASKCHAT_DATA_PATH         - Storage directory (default: ./taskchat_data)");
    println!("  TASKCHAT_API_KEYS          - Comma-separated API keys (required in production)");
    println!("  TASKCHAT_DEV_API_KEY       - Development API key (used in dev if TASKCHAT_API_KEYS not set)");
    println!("  TASKCHAT_RATE_LIMIT        - Requests per second (default: 100)");
    println!("  TASKCHAT_RATE_BURST        - Burst size (default: 200)");
    println!("  TASKCHAT_MAX_CONCURRENT    - Max concurrent requests (default: 200)");
    println!("  TASKCHAT_REQUEST_TIMEOUT   - Request timeout in seconds (default: 60)");
    println!("  TASKCHAT_AUDIT_MAX_ENTRIES     - Max audit entries per user (default: 10000)");
    println!("  TASKCHAT_AUDIT_RETENTION_DAYS  - Audit log retention days (default: 30)");
    println!();
    println!("AI Service:");
    println!("  LLM_API_KEY            - API key for the fallback language model (optional)");
    println!("  LLM_API_URL            - Chat completions endpoint (default: OpenAI)");
    println!("  LLM_MODEL              - Model name (default: gpt-4o-mini)");
    println!("  LLM_TIMEOUT_SECS       - LLM request timeout in seconds (default: 30)");
    println!();
    println!("CORS Configuration:");
    println!("  TASKCHAT_CORS_ORIGINS      - Comma-separated allowed origins (default: all)");
    println!("  TASKCHAT_CORS_METHODS      - Comma-separated allowed methods (default: GET,POST,PUT,PATCH,DELETE,OPTIONS)");
    println!("  TASKCHAT_CORS_HEADERS      - Comma-separated allowed headers (default: Content-Type,Authorization,X-API-Key,X-Request-ID)");
    println!("  TASKCHAT_CORS_CREDENTIALS  - Allow credentials true/false (default: false)");
    println!("  TASKCHAT_CORS_MAX_AGE      - Preflight cache seconds (default: 86400)");
    println!();
    println!("  RUST_LOG               - Log level (e.g. info, debug, trace)");
    println!();
}
