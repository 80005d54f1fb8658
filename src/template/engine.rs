// ABOUTME: Main template engine implementation using Handlebars
// ABOUTME: Renders template text against a caller supplied context with a freshly assembled function table

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::io::{Cursor, Write};
use std::sync::Arc;
use tracing::debug;

use super::error::{Result, TemplateError};
use super::function::{MissingFunctionHelper, HELPER_MISSING};
use super::registry::{AdvancedFunction, FunctionRegistry, UPTIME};
use super::secret::SecretResolver;
use super::usage;

#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    registry: FunctionRegistry,
    strict_mode: bool,
}

impl TemplateEngine {
    /// Create an engine without a secret resolver
    pub fn new() -> Self {
        Self::from_registry(FunctionRegistry::default())
    }

    /// Create an engine whose `secretValue` lookups go to `resolver`
    pub fn with_secret_resolver(resolver: Arc<dyn SecretResolver>) -> Self {
        Self::from_registry(FunctionRegistry::new(Some(resolver)))
    }

    pub fn from_registry(registry: FunctionRegistry) -> Self {
        Lazy::force(&UPTIME);
        Self {
            registry,
            strict_mode: false,
        }
    }

    /// Strict mode also rejects missing paths such as `{{user.name}}`
    pub fn set_strict_mode(&mut self, strict_mode: bool) {
        self.strict_mode = strict_mode;
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Register an additional function for all subsequent renders
    pub fn register_function(&mut self, function: AdvancedFunction) {
        self.registry.register(function);
    }

    fn build_handlebars(&self) -> Handlebars<'static> {
        let mut handlebars = Handlebars::new();

        handlebars.set_strict_mode(self.strict_mode);
        handlebars.set_dev_mode(false);

        // Rendered output is test data, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        self.registry.function_table().register_handlebars(&mut handlebars);
        // Unknown names abort instead of rendering as empty text
        handlebars.register_helper(HELPER_MISSING, Box::new(MissingFunctionHelper));
        handlebars
    }

    /// Render `text` registered under `name`. Nothing is returned on failure.
    pub fn render<T: Serialize>(&self, name: &str, text: &str, context: &T) -> Result<String> {
        let mut handlebars = self.build_handlebars();
        handlebars.register_template_string(name, text)?;

        let rendered = handlebars.render(name, context)?;
        debug!("Rendered template '{}' ({} bytes)", name, rendered.len());
        Ok(rendered)
    }

    pub fn render_as_bytes<T: Serialize>(
        &self,
        name: &str,
        text: &str,
        context: &T,
    ) -> Result<Vec<u8>> {
        self.render(name, text, context).map(String::into_bytes)
    }

    pub fn render_as_reader<T: Serialize>(
        &self,
        name: &str,
        text: &str,
        context: &T,
    ) -> Result<Cursor<Vec<u8>>> {
        self.render_as_bytes(name, text, context).map(Cursor::new)
    }

    /// Render then write the result to `writer`
    pub fn render_then_print<T: Serialize, W: Write>(
        &self,
        name: &str,
        text: &str,
        context: &T,
        writer: &mut W,
    ) -> Result<()> {
        let report = self.render(name, text, context)?;
        writer.write_all(report.as_bytes())?;
        Ok(())
    }

    /// Recursively render every string (and templated key) in a JSON value
    pub fn resolve_json_templates(&self, value: &JsonValue, context: &JsonValue) -> Result<JsonValue> {
        let handlebars = self.build_handlebars();
        resolve_json(&handlebars, value, context)
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .map_err(|e| TemplateError::SyntaxError(e.to_string()))
    }

    /// Check if a string contains template expressions
    pub fn has_templates(&self, text: &str) -> bool {
        text.contains("{{") && text.contains("}}")
    }

    pub fn function_names(&self) -> Vec<String> {
        self.registry
            .function_table()
            .names()
            .map(str::to_string)
            .collect()
    }

    pub fn func_usage(&self, name: &str) -> String {
        usage::func_usage(name)
    }
}

fn resolve_json(
    handlebars: &Handlebars<'static>,
    value: &JsonValue,
    context: &JsonValue,
) -> Result<JsonValue> {
    match value {
        JsonValue::String(s) => Ok(JsonValue::String(handlebars.render_template(s, context)?)),
        JsonValue::Array(arr) => arr
            .iter()
            .map(|v| resolve_json(handlebars, v, context))
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),
        JsonValue::Object(obj) => {
            let mut resolved = serde_json::Map::new();
            for (key, val) in obj {
                let resolved_key = if key.contains("{{") {
                    handlebars.render_template(key, context)?
                } else {
                    key.clone()
                };
                resolved.insert(resolved_key, resolve_json(handlebars, val, context)?);
            }
            Ok(JsonValue::Object(resolved))
        }
        // Numbers, booleans, and null values don't need template resolution
        other => Ok(other.clone()),
    }
}
