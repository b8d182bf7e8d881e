use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where the stores get their initial contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    Demo,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    pub seed: Option<SeedSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5433,
            max_connections: 256,
            metrics_port: None,
            seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let max_connections = parse_var(&lookup, "CARAVAN_MAX_CONNECTIONS")?
            .unwrap_or(defaults.max_connections);
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "CARAVAN_MAX_CONNECTIONS",
                value: "0".into(),
            });
        }
        let seed = lookup("CARAVAN_SEED")
            .filter(|s| !s.is_empty())
            .map(|s| match s.as_str() {
                "demo" => SeedSource::Demo,
                _ => SeedSource::File(PathBuf::from(s)),
            });

        Ok(Self {
            bind: lookup("CARAVAN_BIND").unwrap_or(defaults.bind),
            port: parse_var(&lookup, "CARAVAN_PORT")?.unwrap_or(defaults.port),
            max_connections,
            metrics_port: parse_var(&lookup, "CARAVAN_METRICS_PORT")?,
            seed,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => write!(f, "invalid {key}: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.listen_addr(), "0.0.0.0:5433");
    }

    #[test]
    fn overrides_apply() {
        let config = from_pairs(&[
            ("CARAVAN_BIND", "127.0.0.1"),
            ("CARAVAN_PORT", "6000"),
            ("CARAVAN_MAX_CONNECTIONS", "8"),
            ("CARAVAN_METRICS_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:6000");
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.metrics_port, Some(9000));
    }

    #[test]
    fn unparseable_number_is_an_error() {
        let err = from_pairs(&[("CARAVAN_PORT", "fifty")]).unwrap_err();
        assert_eq!(err.to_string(), "invalid CARAVAN_PORT: \"fifty\"");
        assert!(from_pairs(&[("CARAVAN_METRICS_PORT", "70000")]).is_err());
        assert!(from_pairs(&[("CARAVAN_MAX_CONNECTIONS", "0")]).is_err());
    }

    #[test]
    fn seed_source() {
        assert_eq!(from_pairs(&[]).unwrap().seed, None);
        assert_eq!(
            from_pairs(&[("CARAVAN_SEED", "demo")]).unwrap().seed,
            Some(SeedSource::Demo)
        );
        assert_eq!(
            from_pairs(&[("CARAVAN_SEED", "/etc/caravans.json")]).unwrap().seed,
            Some(SeedSource::File(PathBuf::from("/etc/caravans.json")))
        );
    }
}
