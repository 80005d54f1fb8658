// ABOUTME: Emits template source snippets for natural-language authoring steps
// ABOUTME: Writes `{{name args}}` expressions into an output buffer carried by the execution context

use regex::Regex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::error::EmitError;
use super::registry::AdvancedFunction;

/// Key under which the output buffer is stored in an [`ExecutionContext`].
pub const CONTEXT_BUFFER_KEY: &str = "ContextBufferKey";

pub type SharedBuffer = Arc<Mutex<dyn Write + Send>>;

/// Writes a snippet for one step; `args` is the free-form argument text.
pub type Generator = Arc<dyn Fn(&ExecutionContext, &str) -> Result<(), EmitError> + Send + Sync>;

#[derive(Clone)]
pub enum ContextValue {
    Buffer(SharedBuffer),
    Text(String),
}

/// Key-indexed bag of values available to snippet generators.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    values: HashMap<String, ContextValue>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: SharedBuffer) -> Self {
        let mut context = Self::new();
        context.insert(CONTEXT_BUFFER_KEY, ContextValue::Buffer(buffer));
        context
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ContextValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn buffer(&self) -> Option<&SharedBuffer> {
        match self.get(CONTEXT_BUFFER_KEY) {
            Some(ContextValue::Buffer(buffer)) => Some(buffer),
            _ => None,
        }
    }
}

/// Write `text` to the context's output buffer. Without a buffer this is a no-op.
pub fn write_with_context(context: &ExecutionContext, text: &str) -> Result<(), EmitError> {
    let Some(buffer) = context.buffer() else {
        return Ok(());
    };

    let mut writer = buffer.lock().map_err(|_| EmitError::Poisoned)?;
    writer.write_all(text.as_bytes())?;
    Ok(())
}

/// `format_call("X", "a, b")` yields `{{X a b}}`.
pub fn format_call(name: &str, args: &str) -> String {
    let args: Vec<&str> = split_fields(args).collect();
    if args.is_empty() {
        format!("{{{{{}}}}}", name)
    } else {
        format!("{{{{{} {}}}}}", name, args.join(" "))
    }
}

/// `format_quoted_call("X", "a, b")` yields `{{X "a" "b"}}`.
pub fn format_quoted_call(name: &str, fields: &str) -> String {
    let mut expression = format!("{{{{{}", name);
    for field in split_fields(fields) {
        expression.push_str(" \"");
        expression.push_str(&field.replace('\\', "\\\\").replace('"', "\\\""));
        expression.push('"');
    }
    expression.push_str("}}");
    expression
}

fn split_fields(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|field| !field.is_empty())
}

/// Generator emitting `{{name args}}` with the arguments passed through as-is.
pub fn call_generator(name: &str) -> Generator {
    let name = name.to_string();
    Arc::new(move |context, args| write_with_context(context, &format_call(&name, args)))
}

/// Generator emitting `{{name "field" ...}}` with every argument quoted.
pub fn quoted_call_generator(name: &str) -> Generator {
    let name = name.to_string();
    Arc::new(move |context, fields| {
        write_with_context(context, &format_quoted_call(&name, fields))
    })
}

/// Generator emitting a fixed snippet, ignoring the step arguments.
pub fn literal_generator(snippet: &str) -> Generator {
    let snippet = snippet.to_string();
    Arc::new(move |context, _| write_with_context(context, &snippet))
}

/// Matches authoring steps against the patterns of advanced functions.
pub struct StepMatcher {
    entries: Vec<(Regex, AdvancedFunction)>,
}

impl StepMatcher {
    /// Functions without both a pattern and a generator are ignored.
    pub fn new(functions: &[AdvancedFunction]) -> Result<Self, EmitError> {
        let mut entries = Vec::new();
        for function in functions {
            let (Some(pattern), Some(_)) = (&function.pattern, &function.generator) else {
                continue;
            };
            let regex = Regex::new(pattern).map_err(|e| EmitError::Pattern {
                name: function.name.clone(),
                message: e.to_string(),
            })?;
            entries.push((regex, function.clone()));
        }

        debug!("Compiled {} step patterns", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First function whose pattern matches, with its first capture group.
    pub fn find(&self, step: &str) -> Option<(&AdvancedFunction, String)> {
        self.entries.iter().find_map(|(regex, function)| {
            regex.captures(step).map(|captures| {
                let args = captures
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                (function, args)
            })
        })
    }

    /// Emit the snippet for `step`. Returns `false` when no pattern matches.
    pub fn emit(&self, context: &ExecutionContext, step: &str) -> Result<bool, EmitError> {
        let Some((function, args)) = self.find(step) else {
            return Ok(false);
        };

        if let Some(generator) = &function.generator {
            debug!("Step '{}' matched function '{}'", step, function.name);
            generator(context, &args)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::function::TemplateFunction;

    fn buffer_context() -> (Arc<Mutex<Vec<u8>>>, ExecutionContext) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let context = ExecutionContext::with_buffer(buffer.clone());
        (buffer, context)
    }

    fn contents(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_format_call() {
        assert_eq!(format_call("X", "a, b"), "{{X a b}}");
        assert_eq!(format_call("X", ""), "{{X}}");
        assert_eq!(format_call("randAlpha", " 8 "), "{{randAlpha 8}}");
    }

    #[test]
    fn test_format_quoted_call() {
        assert_eq!(
            format_quoted_call("generateJSONString", "hello, world"),
            "{{generateJSONString \"hello\" \"world\"}}"
        );
        assert_eq!(
            format_quoted_call("X", "say \"hi\""),
            "{{X \"say \\\"hi\\\"\"}}"
        );
    }

    #[test]
    fn test_write_with_context() {
        let (buffer, context) = buffer_context();
        write_with_context(&context, "{{md5 \"a\"}}").unwrap();
        write_with_context(&context, "!").unwrap();
        assert_eq!(contents(&buffer), "{{md5 \"a\"}}!");
    }

    #[test]
    fn test_write_without_buffer_is_noop() {
        let context = ExecutionContext::new();
        assert!(write_with_context(&context, "ignored").is_ok());

        let mut context = ExecutionContext::new();
        context.insert(CONTEXT_BUFFER_KEY, ContextValue::Text("not a buffer".into()));
        assert!(context.buffer().is_none());
        assert!(write_with_context(&context, "ignored").is_ok());
    }

    #[test]
    fn test_generators() {
        let (buffer, context) = buffer_context();
        call_generator("randNorm")(&context, "10, 2").unwrap();
        literal_generator("{{uuid}}")(&context, "whatever").unwrap();
        quoted_call_generator("randEnum")(&context, "a,b").unwrap();
        assert_eq!(
            contents(&buffer),
            "{{randNorm 10 2}}{{uuid}}{{randEnum \"a\" \"b\"}}"
        );
    }

    #[test]
    fn test_step_matcher() {
        let functions = vec![
            AdvancedFunction::step(r"^a random string of length (.*)$", call_generator("randAlpha")),
            AdvancedFunction::new("x", TemplateFunction::nullary(|| Ok(serde_json::json!(1))))
                .with_pattern(r"^no generator (.*)$"),
        ];
        let matcher = StepMatcher::new(&functions).unwrap();
        assert_eq!(matcher.len(), 1);

        let (buffer, context) = buffer_context();
        assert!(matcher.emit(&context, "a random string of length 6").unwrap());
        assert!(!matcher.emit(&context, "no generator here").unwrap());
        assert_eq!(contents(&buffer), "{{randAlpha 6}}");
    }

    #[test]
    fn test_step_matcher_rejects_bad_pattern() {
        let functions = vec![AdvancedFunction::step("(unclosed", call_generator("x"))];
        assert!(matches!(
            StepMatcher::new(&functions),
            Err(EmitError::Pattern { .. })
        ));
    }
}
