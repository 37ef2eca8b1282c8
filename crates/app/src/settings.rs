//! Application settings.
//!
//! Read from an optional `settings.toml` in the working directory, then
//! overridden by `SPENDWISE__<SECTION>__<KEY>` environment variables
//! (`SPENDWISE__DATABASE__URL=postgres://...`).
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use store::{DuplicateCriteria, MoneyCents, SyncPolicy};

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Sync {
    pub staleness_minutes: u64,
}

#[derive(Debug, Deserialize)]
pub struct Categories {
    pub max_tree_depth: u32,
}

#[derive(Debug, Deserialize)]
pub struct Duplicates {
    pub amount_tolerance_minor: i64,
    pub day_tolerance: u32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub sync: Sync,
    pub categories: Categories,
    pub duplicates: Duplicates,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .set_default("database.url", "sqlite::memory:")?
            .set_default("database.max_connections", 5)?
            .set_default("sync.staleness_minutes", 60)?
            .set_default("categories.max_tree_depth", 10)?
            .set_default("duplicates.amount_tolerance_minor", 0)?
            .set_default("duplicates.day_tolerance", 1)?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("SPENDWISE").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            staleness: i64::try_from(self.sync.staleness_minutes)
                .ok()
                .and_then(chrono::Duration::try_minutes)
                .unwrap_or_else(|| SyncPolicy::default().staleness),
        }
    }

    pub fn duplicate_criteria(&self) -> DuplicateCriteria {
        DuplicateCriteria {
            amount_tolerance: MoneyCents::new(self.duplicates.amount_tolerance_minor),
            day_tolerance: self.duplicates.day_tolerance,
            require_same_description: false,
        }
    }
}
