use evict_config::load_config;
use evict_config::shared::CheckerConfig;

/// Loads the [`CheckerConfig`] and validates it.
pub fn load_checker_config() -> anyhow::Result<CheckerConfig> {
    let config = load_config::<CheckerConfig>()?;
    config.validate()?;

    Ok(config)
}
