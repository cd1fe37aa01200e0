use chrono_tz::Tz;
use thiserror::Error;

use crate::api::DEFAULT_CATALOG_URL;
use crate::broadcast::Zones;

pub const DEFAULT_DATABASE: &str = "airing-rs";
pub const DEFAULT_SOURCE_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;
pub const DEFAULT_KEEP_ALIVE_PORT: u16 = 8080;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
   #[error("environment variable {0} is required")]
   Missing(&'static str),
   #[error("{key}: unknown timezone \"{value}\"")]
   Timezone { key: &'static str, value: String },
   #[error("{key}: invalid port \"{value}\"")]
   Port { key: &'static str, value: String },
}

/// Settings injected at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
   pub bot_token: String,
   pub mongodb_uri: String,
   pub database: String,
   pub catalog_url: String,
   pub zones: Zones,
   /// `None` disables the keep-alive responder.
   pub keep_alive_port: Option<u16>,
}

impl Config {
   /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
   pub fn from_env() -> Result<Self, ConfigError> {
      Self::from_lookup(|key| std::env::var(key).ok())
   }

   pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
      let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
      let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

      let source = match var("SOURCE_TIMEZONE") {
         Some(value) => parse_timezone("SOURCE_TIMEZONE", value)?,
         None => DEFAULT_SOURCE_TIMEZONE,
      };

      let viewer = match var("VIEWER_TIMEZONE") {
         Some(value) => parse_timezone("VIEWER_TIMEZONE", value)?,
         // TZ may hold POSIX rules rather than a zone name
         None => var("TZ")
            .and_then(|value| value.trim_start_matches(':').parse().ok())
            .unwrap_or(chrono_tz::UTC),
      };

      let keep_alive_port = match var("KEEP_ALIVE_PORT") {
         Some(value) => match value.trim().parse::<u16>() {
            Ok(0) => None,
            Ok(port) => Some(port),
            Err(_) => {
               return Err(ConfigError::Port {
                  key: "KEEP_ALIVE_PORT",
                  value,
               })
            }
         },
         None => Some(DEFAULT_KEEP_ALIVE_PORT),
      };

      Ok(Self {
         bot_token: required("TELOXIDE_TOKEN")?,
         mongodb_uri: required("MONGODB_URI")?,
         database: var("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
         catalog_url: var("CATALOG_URL").unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
         zones: Zones { source, viewer },
         keep_alive_port,
      })
   }
}

pub fn parse_timezone(key: &'static str, value: String) -> Result<Tz, ConfigError> {
   match value.trim().parse::<Tz>() {
      Ok(tz) => Ok(tz),
      Err(_) => Err(ConfigError::Timezone { key, value }),
   }
}
