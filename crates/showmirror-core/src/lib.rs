pub mod app_config;
pub mod catalog;
pub mod config;
pub mod refresh;
pub mod run;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    genre_key, normalize_genre_name, Country, Episode, Externals, Network, Season, ShowDetail,
    ShowStub, WebChannel,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use refresh::{PlacedEpisode, RefreshError, RefreshStats, ShowRefresh};
pub use run::{RunMode, TriggerSource};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
