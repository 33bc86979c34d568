// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::env;
use std::fs::read_to_string;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Fallible;
use crate::error::fail;

/// The config file looked up in the working directory when none is given.
const DEFAULT_CONFIG_FILE: &str = "flashcards.toml";

const ENV_BIND: &str = "FLASHCARDS_BIND";
const ENV_PORT: &str = "FLASHCARDS_PORT";
const ENV_DATABASE: &str = "FLASHCARDS_DATABASE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The address to bind the HTTP server to.
    pub bind: String,
    pub port: u16,
    /// Path to the SQLite database.
    pub database: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            database: PathBuf::from("flashcards.db"),
        }
    }
}

impl Config {
    /// Load the config from `path` if given, else from `flashcards.toml` if it
    /// exists, else use the defaults. Environment variables then override the
    /// file.
    pub fn load(path: Option<&Path>) -> Fallible<Self> {
        Self::load_file(path)?.with_env(|key| env::var(key).ok())
    }

    fn load_file(path: Option<&Path>) -> Fallible<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return fail(format!("config file {} does not exist.", path.display()));
                }
                Self::from_file(path)
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    log::debug!("No config file, using defaults.");
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Fallible<Self> {
        log::debug!("Loading config from {}", path.display());
        let content = read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Fallible<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `FLASHCARDS_BIND`, `FLASHCARDS_PORT` and `FLASHCARDS_DATABASE`
    /// as found by `lookup`.
    fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Fallible<Self> {
        if let Some(bind) = lookup(ENV_BIND) {
            log::debug!("{ENV_BIND} overrides bind address");
            self.bind = bind;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = match port.trim().parse() {
                Ok(port) => port,
                Err(e) => return fail(format!("invalid {ENV_PORT} value {port:?}: {e}")),
            };
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database = PathBuf::from(database);
        }
        Ok(self)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, port: Option<u16>, database: Option<PathBuf>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(database) = database {
            self.database = database;
        }
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs::write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_defaults() -> Fallible<()> {
        let config = Config::parse("")?;
        assert_eq!(config, Config::default());
        assert_eq!(config.address(), "0.0.0.0:8080");
        Ok(())
    }

    #[test]
    fn test_partial_file() -> Fallible<()> {
        let config = Config::parse("port = 9000\ndatabase = \"/var/lib/flashcards.db\"\n")?;
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.database, PathBuf::from("/var/lib/flashcards.db"));
        Ok(())
    }

    #[test]
    fn test_unknown_key() {
        let result = Config::parse("prot = 9000\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() -> Fallible<()> {
        let config = Config::parse("port = 9000\n")?
            .with_overrides(Some(9001), Some(PathBuf::from("other.db")));
        assert_eq!(config.port, 9001);
        assert_eq!(config.database, PathBuf::from("other.db"));
        let config = Config::parse("port = 9000\n")?.with_overrides(None, None);
        assert_eq!(config.port, 9000);
        Ok(())
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file() -> Fallible<()> {
        let config = Config::parse("bind = \"127.0.0.1\"\nport = 9000\n")?.with_env(env(&[
            ("FLASHCARDS_PORT", "9100"),
            ("FLASHCARDS_DATABASE", "/srv/cards.db"),
        ]))?;
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, 9100);
        assert_eq!(config.database, PathBuf::from("/srv/cards.db"));

        let config = Config::parse("")?.with_env(env(&[("FLASHCARDS_BIND", "::1")]))?;
        assert_eq!(config.bind, "::1");
        assert_eq!(config.port, 8080);
        Ok(())
    }

    #[test]
    fn test_flags_override_env() -> Fallible<()> {
        let config = Config::parse("port = 9000\n")?
            .with_env(env(&[("FLASHCARDS_PORT", "9100")]))?
            .with_overrides(Some(9200), None);
        assert_eq!(config.port, 9200);
        let config = Config::parse("port = 9000\n")?
            .with_env(env(&[("FLASHCARDS_PORT", "9100")]))?
            .with_overrides(None, None);
        assert_eq!(config.port, 9100);
        Ok(())
    }

    #[test]
    fn test_invalid_env_port() -> Fallible<()> {
        let result = Config::parse("")?.with_env(env(&[("FLASHCARDS_PORT", "eighty")]));
        let err = result.unwrap_err();
        assert!(err.message().starts_with("invalid FLASHCARDS_PORT value"));
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("custom.toml");
        write(&path, "bind = \"127.0.0.1\"\nport = 3000\n")?;
        let config = Config::load(Some(&path))?;
        assert_eq!(config.address(), "127.0.0.1:3000");
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Some(Path::new("./derpherp.toml")));
        assert!(result.is_err());
    }
}
