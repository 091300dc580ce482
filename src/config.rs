use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use clap::Parser;
use std::{env, str::FromStr};

const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub session_ttl: Duration,
    pub max_upload_mb: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            storage_dir: "./data/files".into(),
            database_url: "sqlite://./data/meta/deposits.db".into(),
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            max_upload_mb: 100,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Deposit file management API")]
pub struct Args {
    /// Host to bind to (overrides DEPOSIT_FILES_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DEPOSIT_FILES_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where file payloads are stored (overrides DEPOSIT_FILES_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides DEPOSIT_FILES_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Lifetime of login sessions in hours (overrides DEPOSIT_FILES_SESSION_TTL_HOURS)
    #[arg(long)]
    pub session_ttl_hours: Option<i64>,

    /// Largest accepted request body in MiB (overrides DEPOSIT_FILES_MAX_UPLOAD_MB)
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Create a user from EMAIL:PASSWORD and exit
    #[arg(long, value_name = "EMAIL:PASSWORD", conflicts_with = "issue_token")]
    pub create_user: Option<String>,

    /// Issue an access token for the user EMAIL, print it and exit
    #[arg(long, value_name = "EMAIL")]
    pub issue_token: Option<String>,

    /// Scope granted to the issued token (repeatable)
    #[arg(long = "scope", value_name = "SCOPE", requires = "issue_token")]
    pub scopes: Vec<String>,
}

/// Convert a session lifetime in hours, rejecting values chrono cannot hold.
fn session_ttl(hours: i64) -> Result<Duration> {
    Duration::try_hours(hours)
        .filter(|ttl| *ttl > Duration::zero())
        .ok_or_else(|| anyhow!("session ttl of {} hours is out of range", hours))
}

/// Read a numeric environment variable, falling back to `default` when unset.
fn env_number<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig, returning the
    /// args for the one-shot commands (`--migrate`, `--create-user`, ...).
    pub fn from_env_and_args() -> Result<(Self, Args)> {
        let args = Args::parse();
        let cfg = Self::merge(&args)?;
        Ok((cfg, args))
    }

    fn merge(args: &Args) -> Result<Self> {
        let defaults = Self::default();

        // --- Environment fallback ---
        let env_host = env::var("DEPOSIT_FILES_HOST").unwrap_or(defaults.host);
        let env_port = env_number("DEPOSIT_FILES_PORT", defaults.port)?;
        let env_storage = env::var("DEPOSIT_FILES_STORAGE_DIR").unwrap_or(defaults.storage_dir);
        let env_db = env::var("DEPOSIT_FILES_DATABASE_URL").unwrap_or(defaults.database_url);
        let env_ttl = env_number("DEPOSIT_FILES_SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        let env_upload = env_number("DEPOSIT_FILES_MAX_UPLOAD_MB", defaults.max_upload_mb)?;

        // --- Merge ---
        Ok(Self {
            host: args.host.clone().unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.clone().unwrap_or(env_storage),
            database_url: args.database_url.clone().unwrap_or(env_db),
            session_ttl: session_ttl(args.session_ttl_hours.unwrap_or(env_ttl))?,
            max_upload_mb: args.max_upload_mb.unwrap_or(env_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
