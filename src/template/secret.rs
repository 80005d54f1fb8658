// ABOUTME: Secret resolution capability consulted by the secretValue template function
// ABOUTME: Provides the resolver trait, the always-failing default and map/env backed resolvers

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use super::error::{InlineText, SecretError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretValue {
    pub value: String,
}

pub trait SecretResolver: Send + Sync {
    fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError>;
}

/// Installed when no resolver is configured; every lookup fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecretServer;

impl SecretResolver for NoSecretServer {
    fn get_secret(&self, _name: &str) -> Result<SecretValue, SecretError> {
        Err(SecretError::NoSecretServer)
    }
}

#[derive(Debug, Default, Clone)]
pub struct StaticSecretResolver {
    secrets: HashMap<String, String>,
}

impl StaticSecretResolver {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.insert(name.into(), value.into());
    }
}

impl SecretResolver for StaticSecretResolver {
    fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError> {
        self.secrets
            .get(name)
            .map(|value| SecretValue {
                value: value.clone(),
            })
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

/// Reads `<prefix><NAME>` from the process environment, with the secret name upper-cased.
#[derive(Debug, Clone)]
pub struct EnvSecretResolver {
    prefix: String,
}

impl EnvSecretResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn variable_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.to_uppercase().replace(['-', '.'], "_"))
    }
}

impl SecretResolver for EnvSecretResolver {
    fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError> {
        env::var(self.variable_name(name))
            .map(|value| SecretValue { value })
            .map_err(|_| SecretError::NotFound(name.to_string()))
    }
}

/// Tries each resolver in order and returns the first hit, or the last error.
pub struct ChainedSecretResolver {
    resolvers: Vec<Box<dyn SecretResolver>>,
}

impl ChainedSecretResolver {
    pub fn new(resolvers: Vec<Box<dyn SecretResolver>>) -> Self {
        Self { resolvers }
    }
}

impl SecretResolver for ChainedSecretResolver {
    fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError> {
        let mut last_error = SecretError::NoSecretServer;
        for resolver in &self.resolvers {
            match resolver.get_secret(name) {
                Ok(value) => return Ok(value),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

/// Resolve a secret for template output; the resolver's error message is
/// rendered in place of the value on failure.
pub fn secret_value(resolver: &dyn SecretResolver, name: &str) -> InlineText {
    match resolver.get_secret(name) {
        Ok(secret) => InlineText::Value(secret.value),
        Err(e) => InlineText::Fallback(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_secret_server() {
        let result = secret_value(&NoSecretServer, "x");
        assert_eq!(result, InlineText::Fallback("no secret server".to_string()));
    }

    #[test]
    fn test_static_resolver() {
        let mut resolver = StaticSecretResolver::default();
        resolver.insert("token", "abc123");

        assert_eq!(
            secret_value(&resolver, "token"),
            InlineText::Value("abc123".to_string())
        );
        assert_eq!(
            secret_value(&resolver, "missing").into_text(),
            "secret not found: missing"
        );
    }

    #[test]
    fn test_env_resolver() {
        std::env::set_var("ATEST_SECRET_TEST_DB_PASSWORD", "hunter2");
        let resolver = EnvSecretResolver::new("ATEST_SECRET_TEST_");

        assert_eq!(resolver.variable_name("db-password"), "ATEST_SECRET_TEST_DB_PASSWORD");
        assert_eq!(
            resolver.get_secret("db-password").unwrap().value,
            "hunter2"
        );
        assert!(resolver.get_secret("absent").is_err());
    }

    #[test]
    fn test_chained_resolver() {
        let mut first = StaticSecretResolver::default();
        first.insert("a", "from-first");
        let mut second = StaticSecretResolver::default();
        second.insert("b", "from-second");

        let chained = ChainedSecretResolver::new(vec![Box::new(first), Box::new(second)]);
        assert_eq!(chained.get_secret("a").unwrap().value, "from-first");
        assert_eq!(chained.get_secret("b").unwrap().value, "from-second");
        assert_eq!(
            chained.get_secret("c"),
            Err(SecretError::NotFound("c".to_string()))
        );

        let empty = ChainedSecretResolver::new(Vec::new());
        assert_eq!(empty.get_secret("a"), Err(SecretError::NoSecretServer));
    }
}
