// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides temp directories with template, data and config files plus the key fixtures

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use tokio::fs;

pub const RSA_PRIVATE_KEY: &str = include_str!("../fixtures/rsa_private.pem");
pub const RSA_PUBLIC_KEY: &str = include_str!("../fixtures/rsa_public.pem");
pub const EC_PUBLIC_KEY: &str = include_str!("../fixtures/ec_public.pem");

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    pub async fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, contents)
            .await
            .expect("Failed to write test file");
        path
    }

    /// Writes a config with no secrets so the host's config files are ignored
    pub async fn write_config(&self, contents: &str) -> PathBuf {
        self.write_file("atest-render.yaml", contents).await
    }
}

/// Run the binary through cargo with `args`, using `config` as the config file
pub fn run_cli(config: &Path, args: &[&str]) -> Output {
    let mut full_args = vec!["run", "--quiet", "--", "--no-color", "--config"];
    full_args.push(config.to_str().expect("non-UTF-8 temp path"));
    full_args.extend_from_slice(args);

    Command::new("cargo")
        .args(&full_args)
        .env_remove("ATEST_RENDER_SECRET_PREFIX")
        .env_remove("ATEST_RENDER_STRICT")
        .output()
        .expect("Failed to execute command")
}
