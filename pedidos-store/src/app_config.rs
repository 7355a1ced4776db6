use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Layered files, all optional: defaults, then the environment
            // file, then a local override kept out of version control
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `PEDIDOS__DATABASE__URL` sets `database.url`
            .add_source(config::Environment::with_prefix("PEDIDOS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        env::set_var("PEDIDOS__DATABASE__URL", "postgres://localhost/pedidos");

        let config = Config::load().unwrap();
        assert_eq!(config.database.url, "postgres://localhost/pedidos");
        assert_eq!(config.database.max_connections, 5);

        env::remove_var("PEDIDOS__DATABASE__URL");
    }
}
