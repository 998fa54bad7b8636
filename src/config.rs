use std::path::Path;

use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub cookie_secure: bool,
    pub cookie_same_site: String,
}

impl AuthConfig {
    /// Normalized `SameSite` attribute for the session cookie (`Lax` unless configured otherwise).
    pub fn same_site(&self) -> &'static str {
        match self.cookie_same_site.trim().to_ascii_lowercase().as_str() {
            "strict" => "Strict",
            "none" => "None",
            _ => "Lax",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewsConfig {
    pub max_depth: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub presign_ttl_seconds: u64,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

/// First administrator, created at startup when no account with the id exists.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub admin_external_id: String,
    pub admin_password: String,
    pub admin_full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub reviews: ReviewsConfig,
    pub catalog: CatalogConfig,
    pub storage: StorageConfig,
    pub security: Option<SecurityConfig>,
    pub bootstrap: Option<BootstrapConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: biblioteca.toml (in CWD)
        .add_source(::config::File::with_name("biblioteca").required(false));

    if let Ok(custom_path) = std::env::var("BIBLIOTECA_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("BIBLIOTECA").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Layers a TOML document over the embedded defaults and validates the result.
pub fn from_toml(overrides: &str) -> anyhow::Result<AppConfig> {
    let cfg = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::from_str(overrides, ::config::FileFormat::Toml))
        .build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    // Warn for privileged ports on Unix-like systems
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    // Auth
    if cfg.auth.jwt_secret.len() < 16 {
        return Err(anyhow::anyhow!(
            "auth.jwt_secret must be at least 16 bytes (set BIBLIOTECA__AUTH__JWT_SECRET)"
        ));
    }
    if cfg.auth.token_ttl_hours == 0 {
        return Err(anyhow::anyhow!("auth.token_ttl_hours must be > 0"));
    }

    // Reviews
    if cfg.reviews.max_depth == 0 {
        return Err(anyhow::anyhow!("reviews.max_depth must be >= 1"));
    }

    // Catalog
    if cfg.catalog.max_limit < 1 {
        return Err(anyhow::anyhow!("catalog.max_limit must be >= 1"));
    }
    if cfg.catalog.default_limit < 1 || cfg.catalog.default_limit > cfg.catalog.max_limit {
        return Err(anyhow::anyhow!("catalog.default_limit must be in 1..=catalog.max_limit"));
    }

    // Storage
    match cfg.storage.backend.as_str() {
        "memory" => {}
        "s3" => {
            if cfg.storage.bucket.trim().is_empty() {
                return Err(anyhow::anyhow!("storage.bucket is required for the s3 backend"));
            }
        }
        other => return Err(anyhow::anyhow!("unknown storage.backend: {}", other)),
    }
    if cfg.storage.presign_ttl_seconds == 0 {
        return Err(anyhow::anyhow!("storage.presign_ttl_seconds must be > 0"));
    }
    if cfg.storage.max_upload_bytes == 0 {
        return Err(anyhow::anyhow!("storage.max_upload_bytes must be > 0"));
    }

    // Bootstrap admin
    if let Some(bootstrap) = &cfg.bootstrap {
        if bootstrap.admin_external_id.trim().is_empty() {
            return Err(anyhow::anyhow!("bootstrap.admin_external_id must not be empty"));
        }
        if bootstrap.admin_password.chars().count() < crate::accounts::MIN_PASSWORD_LEN {
            return Err(anyhow::anyhow!(
                "bootstrap.admin_password must be at least {} characters",
                crate::accounts::MIN_PASSWORD_LEN
            ));
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
