// ABOUTME: Command implementations for the atest-render CLI
// ABOUTME: Handles execution of render, validate, functions, usage and emit commands

use anyhow::{Context, Result};
use serde_json::{Map, Value as JsonValue};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::config::Config;
use crate::template::{ExecutionContext, FunctionRegistry, TemplateEngine};

/// Build an engine from configuration
pub fn build_engine(config: &Config, strict: bool) -> TemplateEngine {
    let registry = FunctionRegistry::new(config.secrets.resolver());
    let mut engine = TemplateEngine::from_registry(registry);
    engine.set_strict_mode(strict || config.render.strict_mode);
    engine
}

/// Render a template file to stdout or `output`
pub async fn render_template(
    template_path: PathBuf,
    data: Option<PathBuf>,
    output: Option<PathBuf>,
    strict: bool,
    config: &Config,
) -> Result<()> {
    info!("Rendering template: {}", template_path.display());

    let text = tokio::fs::read_to_string(&template_path)
        .await
        .with_context(|| format!("Failed to read template '{}'", template_path.display()))?;

    let mut context = match data {
        Some(path) => load_data(&path).await?,
        None => Map::new(),
    };
    // Command-line and configured variables win over the data file
    for (key, value) in &config.template_vars {
        context.insert(key.clone(), JsonValue::String(value.clone()));
    }
    debug!("Template context has {} top-level keys", context.len());

    let engine = build_engine(config, strict);
    let name = template_path.display().to_string();
    let rendered = engine
        .render_as_bytes(&name, &text, &JsonValue::Object(context))
        .map_err(|e| anyhow::anyhow!("Failed to render '{}': {}", name, e))?;

    match output {
        Some(output_path) => {
            tokio::fs::write(&output_path, &rendered)
                .await
                .with_context(|| format!("Failed to write output file '{}'", output_path.display()))?;
            info!("Rendered output written to: {}", output_path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Load a YAML or JSON mapping to use as the render context
async fn load_data(path: &Path) -> Result<Map<String, JsonValue>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read data file '{}'", path.display()))?;

    let value: JsonValue = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))?,
        _ => serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid YAML in '{}'", path.display()))?,
    };

    match value {
        JsonValue::Object(map) => Ok(map),
        JsonValue::Null => Ok(Map::new()),
        _ => Err(anyhow::anyhow!(
            "Data file '{}' must contain a mapping at the top level",
            path.display()
        )),
    }
}

/// Validate template syntax
pub async fn validate_template(template_path: PathBuf, config: &Config) -> Result<()> {
    info!("Validating template: {}", template_path.display());

    let text = tokio::fs::read_to_string(&template_path)
        .await
        .with_context(|| format!("Failed to read template '{}'", template_path.display()))?;

    build_engine(config, false)
        .validate_template(&text)
        .map_err(|e| anyhow::anyhow!("Template validation failed: {}", e))?;

    println!("✓ Template '{}' is valid", template_path.display());
    Ok(())
}

/// List every registered function, one per line
pub fn list_functions(config: &Config) -> Result<()> {
    let engine = build_engine(config, false);
    let names = engine.function_names();
    info!("{} template functions available", names.len());

    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Print usage notes for one function
pub fn show_usage(name: &str, config: &Config) -> Result<()> {
    let engine = build_engine(config, false);
    let usage = engine.func_usage(name);

    if usage.is_empty() {
        if engine.function_names().iter().any(|known| known == name) {
            println!("{}: no usage notes", name);
            return Ok(());
        }
        return Err(anyhow::anyhow!("Unknown template function '{}'", name));
    }

    println!("{}", usage.trim_end());
    Ok(())
}

/// Print the snippet emitted for a natural-language step
pub fn emit_step(step: &str, config: &Config) -> Result<()> {
    let matcher = build_engine(config, false)
        .registry()
        .step_matcher()
        .context("Failed to compile step patterns")?;

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let context = ExecutionContext::with_buffer(buffer.clone());

    if !matcher.emit(&context, step)? {
        return Err(anyhow::anyhow!("No step pattern matches '{}'", step));
    }

    let snippet = buffer
        .lock()
        .map_err(|_| anyhow::anyhow!("Snippet buffer lock poisoned"))?
        .clone();
    println!("{}", String::from_utf8_lossy(&snippet));
    Ok(())
}
