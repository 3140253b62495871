use crate::model::IdentificationMode;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_CRS: &str = "EPSG:3857";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GraphSettings {
    /// Polygons closer than this are treated as adjacent.
    pub tolerance: f64,
    pub crs: String,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            crs: DEFAULT_CRS.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IdentificationSettings {
    pub mode: IdentificationMode,
    pub parallel: bool,
}

impl Default for IdentificationSettings {
    fn default() -> Self {
        Self {
            mode: IdentificationMode::Corner,
            parallel: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TimelineSettings {
    pub mode: IdentificationMode,
    pub use_cached: bool,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            mode: IdentificationMode::Interior,
            use_cached: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub graph: GraphSettings,
    pub identification: IdentificationSettings,
    pub timeline: TimelineSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Layer `dir/default`, `dir/{RUN_MODE}` and `GEOGRAPH__*` variables.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        debug!(run_mode = %run_mode, dir = %dir.display(), "loading configuration");

        let default_path = dir.join("default");
        let mode_path = dir.join(&run_mode);
        let builder = Config::builder()
            .add_source(File::with_name(&default_path.to_string_lossy()).required(false))
            .add_source(File::with_name(&mode_path.to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("GEOGRAPH").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
