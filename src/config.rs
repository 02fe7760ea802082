use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

pub struct Config {
    pub port: u16,
    pub scheme: String,
    pub host: String,
    pub jwt_secret: String,
    pub jwt_expiration: Duration,
    pub admin_api_key: String,
    pub database_url: Option<String>,
    pub telegram_api_base: String,
    pub telegram_timeout: Duration,
    pub staging_chat_id: Option<i64>,
    pub broadcast_base_delay: Duration,
    pub registry_max_sessions: usize,
    pub registry_max_age: Duration,
}

impl Config {
    pub fn try_parse() -> Result<Config, &'static str> {
        let _ = dotenv();

        Ok(Config {
            port: var("PORT")
                .map_err(|_| "An error occured while getting PORT env param")?
                .parse::<u16>()
                .map_err(|_| "An error occured while parsing PORT env param")?,
            scheme: var("SCHEME").map_err(|_| "An error occured while getting SCHEME env param")?,
            host: var("HOST").map_err(|_| "An error occured while getting HOST env param")?,
            jwt_secret: var("JWT_SECRET")
                .map_err(|_| "An error occured while getting JWT_SECRET env param")?,
            jwt_expiration: Duration::from_secs(
                optional("JWT_EXPIRATION_SECONDS", 3600)
                    .map_err(|_| "An error occured while parsing JWT_EXPIRATION_SECONDS env param")?,
            ),
            admin_api_key: var("ADMIN_API_KEY")
                .map_err(|_| "An error occured while getting ADMIN_API_KEY env param")?,
            database_url: var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            telegram_api_base: var("TELEGRAM_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            telegram_timeout: Duration::from_secs(
                optional("TELEGRAM_TIMEOUT_SECONDS", 30)
                    .map_err(|_| "An error occured while parsing TELEGRAM_TIMEOUT_SECONDS env param")?,
            ),
            staging_chat_id: match var("STAGING_CHAT_ID") {
                Ok(value) if !value.is_empty() => Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| "An error occured while parsing STAGING_CHAT_ID env param")?,
                ),
                _ => None,
            },
            broadcast_base_delay: Duration::from_millis(
                optional("BROADCAST_BASE_DELAY_MS", 20)
                    .map_err(|_| "An error occured while parsing BROADCAST_BASE_DELAY_MS env param")?,
            ),
            registry_max_sessions: optional("REGISTRY_MAX_SESSIONS", 100)
                .map_err(|_| "An error occured while parsing REGISTRY_MAX_SESSIONS env param")?,
            registry_max_age: Duration::from_secs(
                optional("REGISTRY_MAX_AGE_SECONDS", 86_400)
                    .map_err(|_| "An error occured while parsing REGISTRY_MAX_AGE_SECONDS env param")?,
            ),
        })
    }
}

fn optional<T: std::str::FromStr>(key: &str, default: T) -> Result<T, T::Err> {
    match var(key) {
        Ok(value) if !value.is_empty() => value.parse::<T>(),
        _ => Ok(default),
    }
}
