use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    /// Four-character magic the header must carry
    #[serde(default = "default_signature")]
    pub signature: String,
    #[serde(default = "default_true")]
    pub verify_signature: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_signature() -> String {
    String::from_utf8_lossy(&tzfence::format::DEFAULT_SIGNATURE).into_owned()
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            signature: default_signature(),
            verify_signature: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl DatabaseConfig {
    /// Signature to enforce on lookup, `None` when verification is off.
    pub fn expected_signature(&self) -> Result<Option<[u8; 4]>> {
        if !self.verify_signature {
            return Ok(None);
        }
        match <[u8; 4]>::try_from(self.signature.as_bytes()) {
            Ok(sig) => Ok(Some(sig)),
            Err(_) => bail!(
                "database.signature must be exactly 4 bytes, got {:?}",
                self.signature
            ),
        }
    }
}
