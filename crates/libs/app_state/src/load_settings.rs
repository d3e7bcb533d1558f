use crate::{AppSettings, RawSettings};
use color_eyre::eyre::Result;
use std::path::Path;
use tracing::debug;

const SETTINGS_PATH: &str = "config/settings.yaml";

/// Loads settings from `config/settings.yaml`, with `APP__SECTION__KEY` environment overrides.
pub fn load_app_settings() -> Result<AppSettings> {
    // Need to load from dotenv to get it to overwrite the secrets from env.
    dotenv::from_path(".env").ok();
    load_settings_from_path(Path::new(SETTINGS_PATH))
}

pub fn load_settings_from_path(path: &Path) -> Result<AppSettings> {
    let config_path = path.canonicalize()?;
    debug!("Loading settings from {}", config_path.display());

    let builder = config::Config::builder()
        .add_source(config::File::from(config_path))
        .add_source(
            config::Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );

    let raw_settings = builder.build()?.try_deserialize::<RawSettings>()?;
    Ok(raw_settings.into())
}
