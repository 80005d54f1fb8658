// ABOUTME: Configuration management for atest-render
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::template::{
    ChainedSecretResolver, EnvSecretResolver, SecretResolver, StaticSecretResolver,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub template_vars: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub strict_mode: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Secrets available to `secretValue` by name
    #[serde(default)]
    pub values: HashMap<String, String>,

    /// Environment variable prefix consulted after `values`
    #[serde(default)]
    pub env_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl SecretsConfig {
    /// `None` when no secret source is configured, leaving lookups to fail with
    /// "no secret server".
    pub fn resolver(&self) -> Option<Arc<dyn SecretResolver>> {
        let mut resolvers: Vec<Box<dyn SecretResolver>> = Vec::new();

        if !self.values.is_empty() {
            resolvers.push(Box::new(StaticSecretResolver::new(self.values.clone())));
        }
        if let Some(prefix) = &self.env_prefix {
            resolvers.push(Box::new(EnvSecretResolver::new(prefix.clone())));
        }

        match resolvers.len() {
            0 => None,
            _ => Some(Arc::new(ChainedSecretResolver::new(resolvers))),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config '{}'", config_path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid config '{}'", config_path.display()))?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = vec![
            PathBuf::from("atest-render.yaml"),
            PathBuf::from("atest-render.yml"),
            PathBuf::from(".atest-render.yaml"),
            PathBuf::from(".atest-render.yml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".atest-render").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Return default path (may not exist)
        PathBuf::from("atest-render.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("ATEST_RENDER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ATEST_RENDER_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(strict) = std::env::var("ATEST_RENDER_STRICT") {
            self.render.strict_mode = strict
                .parse()
                .with_context(|| format!("ATEST_RENDER_STRICT must be true or false, got '{}'", strict))?;
        }

        if let Ok(prefix) = std::env::var("ATEST_RENDER_SECRET_PREFIX") {
            self.secrets.env_prefix = Some(prefix);
        }

        Ok(())
    }

    /// Merge additional variables into template variables
    pub fn merge_variables(&mut self, vars: HashMap<String, String>) {
        self.template_vars.extend(vars);
    }
}
