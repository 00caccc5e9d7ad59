use serde::Deserialize;
use std::env;

use crate::models::prize::{DEFAULT_FIREPROOF_LEVELS, DEFAULT_PRIZES};

/// 35 minutes per game.
pub const DEFAULT_TIME_LIMIT_SECONDS: u64 = 35 * 60;
const DEFAULT_SWEEPER_INTERVAL_SECS: u64 = 60;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8081";

#[derive(Debug, Clone, Deserialize)]
pub struct GameSettings {
    pub time_limit_seconds: u64,
    pub allow_cash_out_at_start: bool,
    pub prizes: Vec<i64>,
    pub fireproof_levels: Vec<usize>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECONDS,
            allow_cash_out_at_start: false,
            prizes: DEFAULT_PRIZES.to_vec(),
            fireproof_levels: DEFAULT_FIREPROOF_LEVELS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: Option<String>,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub sweeper_interval_secs: u64,
    pub game: GameSettings,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017/quizladder".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "quizladder".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .ok()
            .filter(|uri| !uri.trim().is_empty());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                tracing::warn!("Using default JWT secret (dev mode only)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let sweeper_interval_secs = settings
            .get_int("sweeper.interval_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SWEEPER_INTERVAL_SECS);

        let game = Self::game_settings(&settings)?;

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            bind_addr,
            sweeper_interval_secs,
            game,
        })
    }

    fn game_settings(settings: &config::Config) -> Result<GameSettings, config::ConfigError> {
        let defaults = GameSettings::default();

        let time_limit_seconds = settings
            .get_int("game.time_limit_seconds")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.time_limit_seconds);

        let allow_cash_out_at_start = settings
            .get_bool("game.allow_cash_out_at_start")
            .unwrap_or(defaults.allow_cash_out_at_start);

        let prizes = match settings.get::<Vec<i64>>("game.prizes") {
            Ok(prizes) => prizes,
            Err(config::ConfigError::NotFound(_)) => defaults.prizes,
            Err(err) => return Err(err),
        };

        let fireproof_levels = match settings.get::<Vec<usize>>("game.fireproof_levels") {
            Ok(levels) => levels,
            Err(config::ConfigError::NotFound(_)) => defaults.fireproof_levels,
            Err(err) => return Err(err),
        };

        Ok(GameSettings {
            time_limit_seconds,
            allow_cash_out_at_start,
            prizes,
            fireproof_levels,
        })
    }

    /// Configuration for in-process use (tests, tooling) without any file or
    /// environment lookups.
    pub fn for_tests() -> Self {
        Config {
            mongo_uri: "mongodb://localhost:27017/quizladder_test".to_string(),
            redis_uri: None,
            mongo_database: "quizladder_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            sweeper_interval_secs: DEFAULT_SWEEPER_INTERVAL_SECS,
            game: GameSettings::default(),
        }
    }
}
