use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use raiz_common::{parse_boolean_flag, parse_list, Secret};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use raiz_engine::search::{DEFAULT_SOURCE_DELAY, DEFAULT_SOURCE_TIMEOUT};
use stripe_tools::StripeConfig;

use crate::errors::ServerError;

const DEFAULT_RAIZ_HOST: &str = "127.0.0.1";
const DEFAULT_RAIZ_PORT: u16 = 8000;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/raiz_store.db";
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:5173";
const DEFAULT_EMAIL_SENDER: &str = "no-reply@raizdigital.com.br";
const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 60 * 24;
const DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS: i64 = 7;
const DEFAULT_SEARCH_WORKERS: usize = 2;
const DEFAULT_WORKER_POLL_INTERVAL: StdDuration = StdDuration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    /// Shared secret for the trusted search robots that post results to `/internal/search_results`.
    pub internal_api_key: Secret<String>,
    /// Used for checkout return urls and links in emails.
    pub frontend_base_url: String,
    pub mail: MailConfig,
    pub workers: WorkerConfig,
    /// Origins allowed to make cross-origin requests. Empty means CORS headers are never sent.
    pub cors_origins: Vec<String>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RAIZ_HOST.to_string(),
            port: DEFAULT_RAIZ_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            stripe: StripeConfig::default(),
            internal_api_key: Secret::default(),
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
            mail: MailConfig::default(),
            workers: WorkerConfig::default(),
            cors_origins: vec![DEFAULT_FRONTEND_BASE_URL.to_string()],
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RAIZ_HOST").ok().unwrap_or_else(|| DEFAULT_RAIZ_HOST.into());
        let port = env::var("RAIZ_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for RAIZ_PORT. {e} Using the default, {DEFAULT_RAIZ_PORT}, instead."
                    );
                    DEFAULT_RAIZ_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_RAIZ_PORT);
        let database_url = env::var("RAIZ_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ RAIZ_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let stripe = StripeConfig::new_from_env_or_default();
        let internal_api_key = Secret::new(env::var("RAIZ_INTERNAL_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ RAIZ_INTERNAL_API_KEY is not set. All calls to /internal endpoints will be refused.");
            String::default()
        }));
        let frontend_base_url = env::var("RAIZ_FRONTEND_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                info!("🪛️ RAIZ_FRONTEND_BASE_URL is not set. Using the default, {DEFAULT_FRONTEND_BASE_URL}.");
                DEFAULT_FRONTEND_BASE_URL.to_string()
            });
        let cors_origins = env::var("RAIZ_CORS_ORIGINS").map(|s| parse_list(&s)).unwrap_or_else(|_| {
            info!("🪛️ RAIZ_CORS_ORIGINS is not set. Only {frontend_base_url} may make cross-origin requests.");
            vec![frontend_base_url.clone()]
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("RAIZ_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("RAIZ_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            auth,
            stripe,
            internal_api_key,
            frontend_base_url,
            mail: MailConfig::from_env_or_default(),
            workers: WorkerConfig::from_env_or_default(),
            cors_origins,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

fn env_number<T: std::str::FromStr>(name: &str, default: T) -> T
where T::Err: std::fmt::Display {
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name}. {e}. Using the default.");
            default
        }),
        Err(_) => default,
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to sign and verify JWTs.
    pub jwt_secret: Secret<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT signing secret has not been set. I'm using a random value for this session. DO NOT \
             operate on production like this, since every restart logs all users out. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        Self {
            jwt_secret: Secret::new(secret),
            access_token_ttl: Duration::minutes(DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES),
            refresh_token_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS),
        }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(jwt_secret: S) -> Self {
        Self {
            jwt_secret: Secret::new(jwt_secret.into()),
            access_token_ttl: Duration::minutes(DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES),
            refresh_token_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS),
        }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("RAIZ_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [RAIZ_JWT_SECRET]")))?;
        if secret.trim().len() < 32 {
            return Err(ServerError::ConfigurationError(
                "RAIZ_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        let access_minutes = env_number("RAIZ_ACCESS_TOKEN_EXPIRE_MINUTES", DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES);
        let refresh_days = env_number("RAIZ_REFRESH_TOKEN_EXPIRE_DAYS", DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS);
        Ok(Self {
            jwt_secret: Secret::new(secret),
            access_token_ttl: Duration::minutes(access_minutes.max(1)),
            refresh_token_ttl: Duration::days(refresh_days.max(1)),
        })
    }
}

//-------------------------------------------------  MailConfig  -------------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct MailConfig {
    pub sender: String,
    /// The HTTP endpoint of the transactional mail provider. If unset, emails are written to the log instead.
    pub api_url: Option<String>,
    pub api_key: Secret<String>,
}

impl MailConfig {
    pub fn from_env_or_default() -> Self {
        let sender = env::var("RAIZ_EMAIL_SENDER").unwrap_or_else(|_| DEFAULT_EMAIL_SENDER.to_string());
        let api_url = env::var("RAIZ_MAIL_API_URL").ok().filter(|s| !s.trim().is_empty());
        if api_url.is_none() {
            warn!("🪛️ RAIZ_MAIL_API_URL is not set. Emails will be written to the log and not delivered.");
        }
        let api_key = Secret::new(env::var("RAIZ_MAIL_API_KEY").unwrap_or_default());
        Self { sender, api_url, api_key }
    }
}

//-------------------------------------------------  WorkerConfig  -----------------------------------------------------
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub search_workers: usize,
    /// How often idle workers check the job queue.
    pub poll_interval: StdDuration,
    /// The longest a single search source may take.
    pub source_timeout: StdDuration,
    /// The simulated latency of the built-in search sources.
    pub source_delay: StdDuration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            search_workers: DEFAULT_SEARCH_WORKERS,
            poll_interval: DEFAULT_WORKER_POLL_INTERVAL,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            source_delay: DEFAULT_SOURCE_DELAY,
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let search_workers = env_number("RAIZ_SEARCH_WORKERS", DEFAULT_SEARCH_WORKERS).max(1);
        let poll_interval =
            StdDuration::from_secs(env_number("RAIZ_WORKER_POLL_INTERVAL", DEFAULT_WORKER_POLL_INTERVAL.as_secs()).max(1));
        let source_timeout =
            StdDuration::from_secs(env_number("RAIZ_SEARCH_SOURCE_TIMEOUT", DEFAULT_SOURCE_TIMEOUT.as_secs()).max(1));
        let delay_ms = u64::try_from(DEFAULT_SOURCE_DELAY.as_millis()).unwrap_or(1000);
        let source_delay = StdDuration::from_millis(env_number("RAIZ_SEARCH_SOURCE_DELAY_MS", delay_ms));
        info!(
            "🪛️ {search_workers} search workers. Polling every {poll_interval:?}. Source timeout {source_timeout:?}"
        );
        Self { search_workers, poll_interval, source_timeout, source_delay }
    }
}
