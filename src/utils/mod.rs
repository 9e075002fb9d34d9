/// TOML configuration loading and the reloadable config manager.
pub mod toml_config;
