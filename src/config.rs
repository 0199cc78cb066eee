//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_API_BASE_URL: &str = "https://drive.api.hscc.bdpa.org/v1";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
pub const SESSION_COOKIE_NAME: &str = "BDPA_SESSION";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_LOGIN_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOGIN_WINDOW_SECS: u64 = 5 * 60;
pub const DEFAULT_LOGIN_LOCKOUT_SECS: u64 = 10 * 60;
pub const DEFAULT_LOCK_POLL_SECS: u64 = 30;
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 2000;
pub const DEFAULT_PREVIEW_DEBOUNCE_MS: u64 = 50;
pub const DEFAULT_SEARCH_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;
pub const SESSION_PRUNE_INTERVAL_SECS: u64 = 300;
pub const CACHE_PRUNE_INTERVAL_SECS: u64 = 120;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "bdpa-drive", version = VERSION_INFO, about = "BDPADrive web front end")]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        env = "BDPA_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP/HTTPS"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "BDPA_HTTP_PORT",
        default_value_t = 3000,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(
        short = 'P',
        long,
        env = "BDPA_HTTPS_PORT",
        help = "HTTPS port (HTTPS is disabled when unset)"
    )]
    pub https_port: Option<u16>,
    #[arg(short = 'c', long, env = "BDPA_TLS_CERT", help = "TLS cert path")]
    pub tls_cert: Option<String>,
    #[arg(short = 'k', long, env = "BDPA_TLS_KEY", help = "TLS key path")]
    pub tls_key: Option<String>,
    #[arg(long, env = "BDPA_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "BDPA_API_BASE_URL",
        default_value = DEFAULT_API_BASE_URL,
        help = "Base URL of the remote drive API"
    )]
    pub api_base_url: String,
    #[arg(long, env = "BDPA_API_KEY", help = "Service API key sent on every remote call")]
    pub api_key: Option<String>,
    #[arg(
        long,
        env = "BDPA_API_TIMEOUT_SECS",
        default_value_t = DEFAULT_API_TIMEOUT_SECS,
        help = "Remote API request timeout in seconds"
    )]
    pub api_timeout_secs: u64,
    #[arg(
        long,
        env = "BDPA_SESSION_TTL_SECS",
        default_value_t = DEFAULT_SESSION_TTL_SECS,
        help = "Session expiration in seconds"
    )]
    pub session_ttl_secs: u64,
    #[arg(
        long,
        env = "BDPA_LOGIN_MAX_ATTEMPTS",
        default_value_t = DEFAULT_LOGIN_MAX_ATTEMPTS,
        help = "Max login attempts before lockout (0 to disable)"
    )]
    pub login_max_attempts: u32,
    #[arg(
        long,
        env = "BDPA_LOGIN_WINDOW_SECS",
        default_value_t = DEFAULT_LOGIN_WINDOW_SECS,
        help = "Login attempt window in seconds"
    )]
    pub login_window_secs: u64,
    #[arg(
        long,
        env = "BDPA_LOGIN_LOCKOUT_SECS",
        default_value_t = DEFAULT_LOGIN_LOCKOUT_SECS,
        help = "Login lockout time after max attempts"
    )]
    pub login_lockout_secs: u64,
    #[arg(
        long,
        env = "BDPA_LOCK_POLL_SECS",
        default_value_t = DEFAULT_LOCK_POLL_SECS,
        help = "Editor lock status poll interval in seconds"
    )]
    pub lock_poll_secs: u64,
    #[arg(
        long,
        env = "BDPA_AUTOSAVE_DELAY_MS",
        default_value_t = DEFAULT_AUTOSAVE_DELAY_MS,
        help = "Editor autosave delay after the last edit in milliseconds"
    )]
    pub autosave_delay_ms: u64,
    #[arg(
        long,
        env = "BDPA_PREVIEW_DEBOUNCE_MS",
        default_value_t = DEFAULT_PREVIEW_DEBOUNCE_MS,
        help = "Editor live preview debounce in milliseconds"
    )]
    pub preview_debounce_ms: u64,
    #[arg(
        long,
        env = "BDPA_SEARCH_CACHE_TTL_SECS",
        default_value_t = DEFAULT_SEARCH_CACHE_TTL_SECS,
        help = "Search result cache lifetime in seconds (0 to disable)"
    )]
    pub search_cache_ttl_secs: u64,
}
