use serde::Deserialize;
use std::env;

use voya_reservation::HoldPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub hold_rules: HoldRules,
}

/// Hold lifetimes, in seconds. Loaded from config files and overridable per
/// environment.
#[derive(Debug, Deserialize, Clone)]
pub struct HoldRules {
    pub seat_hold_seconds: i64,
    pub room_hold_seconds: i64,
    #[serde(default = "default_payment_extension")]
    pub payment_extension_seconds: i64,
}

fn default_payment_extension() -> i64 {
    1800
}

impl HoldRules {
    pub fn seat_policy(&self) -> HoldPolicy {
        HoldPolicy {
            hold_seconds: self.seat_hold_seconds,
            payment_extension_seconds: self.payment_extension_seconds,
        }
    }

    pub fn room_policy(&self) -> HoldPolicy {
        HoldPolicy {
            hold_seconds: self.room_hold_seconds,
            payment_extension_seconds: self.payment_extension_seconds,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("VOYA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
