use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::engagement::Calendar;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub path: String,
    /// Insert the demo topics on startup
    pub seed_sample_topics: bool,
}

#[derive(Debug, Deserialize)]
pub struct Engagement {
    /// Offset of the calendar that decides where a streak day begins
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub engagement: Engagement,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Try to load from settings.toml (optional for deployment)
        let config_file_name = "settings.toml";

        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Workspace root during development
        let dev_path = PathBuf::from("tally-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        builder = builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "tally.db")?
            .set_default("database.seed_sample_topics", false)?
            .set_default("engagement.utc_offset_minutes", 0)?;

        // 2. Environment variables take priority over the file
        if let Ok(db_path) = std::env::var("DATABASE_PATH") {
            builder = builder.set_override("database.path", db_path)?;
        }
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }
        if let Ok(host) = std::env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(offset) = std::env::var("TALLY_UTC_OFFSET_MINUTES") {
            builder = builder.set_override("engagement.utc_offset_minutes", offset)?;
        }

        let s = builder.build()?;
        s.try_deserialize()
    }

    /// Calendar used to bucket votes into streak days
    pub fn calendar(&self) -> Result<Calendar, ConfigError> {
        let minutes = self.engagement.utc_offset_minutes;
        Calendar::from_offset_minutes(minutes).ok_or_else(|| {
            ConfigError::Message(format!(
                "engagement.utc_offset_minutes out of range: {}",
                minutes
            ))
        })
    }
}
