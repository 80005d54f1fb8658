// ABOUTME: Assembles the name-to-function table used by every render
// ABOUTME: Layers the base library, the advanced functions and the fixed binary/crypto/file functions

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::assets;
use super::crypto;
use super::emitter::{
    call_generator, literal_generator, quoted_call_generator, Generator, StepMatcher,
};
use super::error::{EmitError, FunctionError};
use super::function::{text_arg, FunctionHelper, TemplateFunction};
use super::helpers;
use super::random::{self, WeightedItem};
use super::secret::{secret_value, NoSecretServer, SecretResolver};

/// Reference point for the uptime functions.
pub struct Uptime {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Uptime {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Format a duration as `1h2m3.5s`, `1.5ms`, `250ns` or `0s`.
///
/// Seconds and larger units are spelled out hour/minute/second; shorter
/// durations use the single largest sub-second unit. Fractions drop trailing zeros.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    match nanos {
        0 => "0s".to_string(),
        1..=999 => format!("{}ns", nanos),
        1_000..=999_999 => format!("{}µs", decimal(nanos, 3)),
        1_000_000..=999_999_999 => format!("{}ms", decimal(nanos, 6)),
        _ => {
            let total_secs = duration.as_secs();
            let hours = total_secs / 3600;
            let minutes = (total_secs % 3600) / 60;
            let second_nanos = u128::from(total_secs % 60) * 1_000_000_000
                + u128::from(duration.subsec_nanos());
            let seconds = format!("{}s", decimal(second_nanos, 9));

            if hours > 0 {
                format!("{}h{}m{}", hours, minutes, seconds)
            } else if minutes > 0 {
                format!("{}m{}", minutes, seconds)
            } else {
                seconds
            }
        }
    }
}

/// `value / 10^digits` as a decimal without trailing zeros.
fn decimal(value: u128, digits: u32) -> String {
    let scale = 10u128.pow(digits);
    let fraction = value % scale;
    if fraction == 0 {
        return (value / scale).to_string();
    }

    let fraction = format!("{:0width$}", fraction, width = digits as usize);
    format!("{}.{}", value / scale, fraction.trim_end_matches('0'))
}

pub static UPTIME: Lazy<Uptime> = Lazy::new(|| Uptime {
    started: Instant::now(),
    started_at: Utc::now(),
});

/// A named function added on top of the base library, optionally paired with a
/// natural-language step pattern and a snippet generator.
#[derive(Clone, Default)]
pub struct AdvancedFunction {
    pub name: String,
    pub function: Option<TemplateFunction>,
    pub pattern: Option<String>,
    pub generator: Option<Generator>,
}

impl AdvancedFunction {
    pub fn new(name: impl Into<String>, function: TemplateFunction) -> Self {
        Self {
            name: name.into(),
            function: Some(function),
            ..Self::default()
        }
    }

    /// Step-only entry: emits a snippet but adds no function of its own.
    pub fn step(pattern: impl Into<String>, generator: Generator) -> Self {
        Self {
            pattern: Some(pattern.into()),
            generator: Some(generator),
            ..Self::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.generator = Some(generator);
        self
    }
}

impl fmt::Debug for AdvancedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvancedFunction")
            .field("name", &self.name)
            .field("function", &self.function)
            .field("pattern", &self.pattern)
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

/// Immutable name to function mapping built for a single render.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: BTreeMap<String, TemplateFunction>,
}

impl FunctionTable {
    /// Later insertions under the same name replace earlier ones.
    pub fn insert(&mut self, name: impl Into<String>, function: TemplateFunction) {
        self.functions.insert(name.into(), function);
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TemplateFunction)> {
        self.functions.iter().map(|(name, f)| (name.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn register_handlebars(&self, handlebars: &mut Handlebars<'_>) {
        for (name, function) in &self.functions {
            handlebars.register_helper(name, Box::new(FunctionHelper::new(name, function.clone())));
        }
    }
}

#[derive(Clone)]
pub struct FunctionRegistry {
    secret_resolver: Arc<dyn SecretResolver>,
    custom: Vec<AdvancedFunction>,
}

impl FunctionRegistry {
    /// Without a resolver every `secretValue` lookup renders "no secret server".
    pub fn new(secret_resolver: Option<Arc<dyn SecretResolver>>) -> Self {
        Self {
            secret_resolver: secret_resolver.unwrap_or_else(|| Arc::new(NoSecretServer)),
            custom: Vec::new(),
        }
    }

    /// Add a function after the built-in advanced functions.
    pub fn register(&mut self, function: AdvancedFunction) {
        self.custom.push(function);
    }

    pub fn secret_resolver(&self) -> &Arc<dyn SecretResolver> {
        &self.secret_resolver
    }

    pub fn advanced_functions(&self) -> Vec<AdvancedFunction> {
        let mut functions = builtin_advanced_functions(Arc::clone(&self.secret_resolver));
        functions.extend(self.custom.iter().cloned());
        functions
    }

    pub fn function_table(&self) -> FunctionTable {
        let mut table = FunctionTable::default();

        for (name, function) in helpers::base_functions() {
            table.insert(name, function);
        }

        for advanced in self.advanced_functions() {
            match advanced.function {
                Some(function) if !advanced.name.is_empty() => table.insert(advanced.name, function),
                _ => debug!(
                    "Skipping advanced function without name or callable (pattern: {:?})",
                    advanced.pattern
                ),
            }
        }

        for (name, function) in fixed_functions() {
            table.insert(name, function);
        }

        debug!("Assembled function table with {} entries", table.len());
        table
    }

    pub fn step_matcher(&self) -> Result<StepMatcher, EmitError> {
        StepMatcher::new(&self.advanced_functions())
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("custom", &self.custom)
            .finish_non_exhaustive()
    }
}

fn text_args(args: &[JsonValue]) -> Result<Vec<String>, FunctionError> {
    (0..args.len()).map(|index| text_arg(args, index)).collect()
}

/// `{"field": "random", ...}` serialized as a JSON string.
pub fn generate_json_string(fields: &[String]) -> Result<String, FunctionError> {
    let object: Map<String, JsonValue> = fields
        .iter()
        .map(|field| (field.clone(), json!("random")))
        .collect();
    Ok(serde_json::to_string(&object)?)
}

fn builtin_advanced_functions(resolver: Arc<dyn SecretResolver>) -> Vec<AdvancedFunction> {
    vec![
        AdvancedFunction::new(
            "generateJSONString",
            TemplateFunction::variadic(|args| Ok(json!(generate_json_string(&text_args(args)?)?))),
        )
        .with_pattern(r"^generate an object with fields (.*)$")
        .with_generator(quoted_call_generator("generateJSONString")),
        AdvancedFunction::new(
            "randomKubernetesName",
            TemplateFunction::nullary(|| Ok(json!(random::random_alphanumeric(8)))),
        )
        .with_pattern(r"^a dynamic kubernetes name(.*)$")
        .with_generator(literal_generator("{{randomKubernetesName}}")),
        AdvancedFunction::step(
            r"^a random string of length (.*)$",
            call_generator("randAlpha"),
        ),
        AdvancedFunction::new(
            "secretValue",
            TemplateFunction::text(move |name| {
                Ok(json!(secret_value(resolver.as_ref(), name).into_text()))
            }),
        ),
        AdvancedFunction::new(
            "md5",
            TemplateFunction::text(|text| Ok(json!(crypto::md5_hex(text)))),
        )
        .with_pattern(r"^the md5 digest of (.*)$")
        .with_generator(quoted_call_generator("md5")),
        AdvancedFunction::new(
            "base64",
            TemplateFunction::text(|text| Ok(json!(crypto::base64_encode(text)))),
        )
        .with_pattern(r"^the base64 encoding of (.*)$")
        .with_generator(quoted_call_generator("base64")),
        AdvancedFunction::new(
            "base64Decode",
            TemplateFunction::text(|text| Ok(json!(crypto::base64_decode(text).into_text()))),
        ),
        AdvancedFunction::new(
            "sha256sumBytes",
            TemplateFunction::bytes(|data| Ok(json!(crypto::sha256_hex(data)))),
        ),
        AdvancedFunction::new(
            "randNorm",
            TemplateFunction::float_pair(|mean, std_dev| Ok(json!(random::random_float(mean, std_dev)))),
        )
        .with_pattern(r"^a normally distributed number with mean and deviation (.*)$")
        .with_generator(call_generator("randNorm")),
        AdvancedFunction::new(
            "randNormInt",
            TemplateFunction::float_pair(|mean, std_dev| {
                Ok(json!(random::random_float(mean, std_dev) as i64))
            }),
        ),
        AdvancedFunction::new(
            "randLogNorm",
            TemplateFunction::float_pair(|mean, std_dev| {
                Ok(json!(random::random_log_normal_float(mean, std_dev)))
            }),
        ),
        AdvancedFunction::new(
            "randLogNormInt",
            TemplateFunction::float_pair(|mean, std_dev| {
                Ok(json!(random::random_log_normal_float(mean, std_dev)))
            }),
        ),
        AdvancedFunction::new(
            "randFloat",
            TemplateFunction::float_pair(|from, to| Ok(json!(random::uniform_float(from, to)))),
        )
        .with_pattern(r"^a random float between (.*)$")
        .with_generator(call_generator("randFloat")),
        AdvancedFunction::new(
            "randEnum",
            TemplateFunction::variadic(|args| Ok(json!(random::uniform_choice(&text_args(args)?)?))),
        )
        .with_pattern(r"^one of (.*)$")
        .with_generator(quoted_call_generator("randEnum")),
        AdvancedFunction::new(
            "randEnumByStr",
            TemplateFunction::text(|items| {
                let items: Vec<&str> = items.split(',').collect();
                Ok(json!(random::uniform_choice(&items)?))
            }),
        ),
        AdvancedFunction::new(
            "randEnumByJSON",
            TemplateFunction::text(|items| {
                match serde_json::from_str::<Vec<JsonValue>>(items) {
                    Ok(items) if !items.is_empty() => random::uniform_choice(&items),
                    _ => Ok(serde_json::to_value(WeightedItem::default())?),
                }
            }),
        ),
        AdvancedFunction::new(
            "weightObject",
            TemplateFunction::int_value(|weight, value| {
                Ok(serde_json::to_value(WeightedItem::new(weight, value.clone()))?)
            }),
        ),
        AdvancedFunction::new(
            "randWeightEnum",
            TemplateFunction::variadic(|args| {
                let items = args
                    .iter()
                    .enumerate()
                    .map(|(index, arg)| {
                        serde_json::from_value::<WeightedItem>(arg.clone()).map_err(|_| {
                            FunctionError::invalid(index, "expected a weightObject value")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                random::weighted_choice(&items)
            }),
        ),
        AdvancedFunction::new(
            "randEmail",
            TemplateFunction::nullary(|| Ok(json!(random::random_email()))),
        )
        .with_pattern(r"^a random email(.*)$")
        .with_generator(literal_generator("{{randEmail}}")),
        AdvancedFunction::new(
            "uptimeDate",
            TemplateFunction::nullary(|| Ok(json!(UPTIME.started_at().to_rfc3339()))),
        ),
        AdvancedFunction::new(
            "uptime",
            TemplateFunction::nullary(|| Ok(json!(format_duration(UPTIME.elapsed())))),
        ),
        AdvancedFunction::new(
            "uptimeSeconds",
            TemplateFunction::nullary(|| Ok(json!(UPTIME.elapsed().as_secs_f64()))),
        ),
        AdvancedFunction::new(
            "urlEncode",
            TemplateFunction::text(|text| Ok(json!(crypto::url_encode(text)))),
        ),
        AdvancedFunction::new(
            "urlDecode",
            TemplateFunction::text(|text| Ok(json!(crypto::url_decode(text).into_text()))),
        ),
        AdvancedFunction::new(
            "arange",
            TemplateFunction::int_triple(|from, to, step| Ok(json!(random::arange(from, to, step)?))),
        ),
        AdvancedFunction::new(
            "arangeIP",
            TemplateFunction::text_int(|start, count| Ok(json!(random::ip_sequence(start, count)))),
        )
        .with_pattern(r"^ip addresses starting from (.*)$")
        .with_generator(quoted_call_generator("arangeIP")),
    ]
}

fn fixed_functions() -> Vec<(&'static str, TemplateFunction)> {
    vec![
        (
            "rasEncryptWithPublicKey",
            TemplateFunction::text_pair(|content, key| {
                Ok(json!(crypto::rsa_encrypt_with_public_key(content, key)?))
            }),
        ),
        ("randImage", TemplateFunction::nullary(|| Ok(json!(assets::random_image())))),
        ("randPdf", TemplateFunction::nullary(|| Ok(json!(assets::random_pdf())))),
        ("randZip", TemplateFunction::nullary(|| Ok(json!(assets::random_archive()?)))),
        (
            "readFile",
            TemplateFunction::text(|path| Ok(json!(std::fs::read_to_string(path)?))),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::secret::StaticSecretResolver;

    #[test]
    fn test_function_table_contents() {
        let table = FunctionRegistry::default().function_table();

        for name in [
            "md5",
            "base64",
            "base64Decode",
            "sha256sumBytes",
            "randNorm",
            "randNormInt",
            "randLogNorm",
            "randLogNormInt",
            "randFloat",
            "randEnum",
            "randEnumByStr",
            "randEnumByJSON",
            "weightObject",
            "randWeightEnum",
            "randEmail",
            "uptime",
            "uptimeSeconds",
            "uptimeDate",
            "urlEncode",
            "urlDecode",
            "arange",
            "arangeIP",
            "secretValue",
            "rasEncryptWithPublicKey",
            "randImage",
            "randPdf",
            "randZip",
            "readFile",
            "generateJSONString",
            "randomKubernetesName",
            "upper",
            "randAlpha",
        ] {
            assert!(table.contains(name), "missing function {}", name);
        }
        assert!(!table.contains(""));
    }

    #[test]
    fn test_unnamed_functions_are_skipped() {
        let mut registry = FunctionRegistry::default();
        let before = registry.function_table().len();

        registry.register(AdvancedFunction::new(
            "",
            TemplateFunction::nullary(|| Ok(json!("x"))),
        ));
        registry.register(AdvancedFunction {
            name: "noCallable".to_string(),
            ..AdvancedFunction::default()
        });

        let table = registry.function_table();
        assert_eq!(table.len(), before);
        assert!(!table.contains("noCallable"));
    }

    #[test]
    fn test_later_registration_overwrites_base_library() {
        let mut registry = FunctionRegistry::default();
        registry.register(AdvancedFunction::new(
            "upper",
            TemplateFunction::text(|_| Ok(json!("overridden"))),
        ));

        let table = registry.function_table();
        let upper = table.get("upper").unwrap();
        assert_eq!(upper.call(&[json!("abc")]).unwrap(), json!("overridden"));
    }

    #[test]
    fn test_fixed_functions_take_precedence() {
        let mut registry = FunctionRegistry::default();
        registry.register(AdvancedFunction::new(
            "readFile",
            TemplateFunction::text(|_| Ok(json!("shadowed"))),
        ));

        let table = registry.function_table();
        let read_file = table.get("readFile").unwrap();
        assert!(read_file.call(&[json!("/definitely/not/here")]).is_err());
    }

    #[test]
    fn test_secret_value_uses_bound_resolver() {
        let table = FunctionRegistry::default().function_table();
        let secret = table.get("secretValue").unwrap();
        assert_eq!(secret.call(&[json!("x")]).unwrap(), json!("no secret server"));

        let mut resolver = StaticSecretResolver::default();
        resolver.insert("x", "s3cr3t");
        let table = FunctionRegistry::new(Some(Arc::new(resolver))).function_table();
        let secret = table.get("secretValue").unwrap();
        assert_eq!(secret.call(&[json!("x")]).unwrap(), json!("s3cr3t"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_nanos(42)), "42ns");
        assert_eq!(format_duration(Duration::from_nanos(1_500)), "1.5µs");
        assert_eq!(format_duration(Duration::from_nanos(2_288_550)), "2.28855ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1s");
        assert_eq!(format_duration(Duration::from_millis(62_500)), "1m2.5s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 5)), "3h0m5s");
        assert_eq!(format_duration(Duration::from_nanos(1_000_000_001)), "1.000000001s");
    }

    #[test]
    fn test_generate_json_string() {
        let fields = vec!["name".to_string(), "age".to_string()];
        assert_eq!(
            generate_json_string(&fields).unwrap(),
            r#"{"age":"random","name":"random"}"#
        );
    }

    #[test]
    fn test_weighted_functions() {
        let table = FunctionRegistry::default().function_table();
        let weight_object = table.get("weightObject").unwrap();
        let item = weight_object.call(&[json!(3), json!("a")]).unwrap();
        assert_eq!(item, json!({"weight": 3, "value": "a"}));

        let rand_weight_enum = table.get("randWeightEnum").unwrap();
        assert_eq!(rand_weight_enum.call(&[item]).unwrap(), json!("a"));
        assert!(rand_weight_enum.call(&[json!("plain")]).is_err());
        assert!(rand_weight_enum
            .call(&[json!({"weight": 0, "value": "a"})])
            .is_err());
    }

    #[test]
    fn test_rand_enum_by_str_empty_list() {
        let table = FunctionRegistry::default().function_table();
        let by_str = table.get("randEnumByStr").unwrap();
        assert_eq!(by_str.call(&[json!("")]).unwrap(), json!(""));

        let rand_enum = table.get("randEnum").unwrap();
        assert!(matches!(rand_enum.call(&[]), Err(FunctionError::EmptyChoice)));
    }

    #[test]
    fn test_rand_enum_by_json() {
        let table = FunctionRegistry::default().function_table();
        let by_json = table.get("randEnumByJSON").unwrap();

        let picked = by_json.call(&[json!(r#"[1, "two", {"three": 3}]"#)]).unwrap();
        assert!([json!(1), json!("two"), json!({"three": 3})].contains(&picked));

        let fallback = by_json.call(&[json!("not json")]).unwrap();
        assert_eq!(fallback, json!({"weight": 0, "value": null}));
    }

    #[test]
    fn test_step_matcher_from_registry() {
        let matcher = FunctionRegistry::default().step_matcher().unwrap();
        let (function, args) = matcher
            .find("generate an object with fields name, age")
            .unwrap();
        assert_eq!(function.name, "generateJSONString");
        assert_eq!(args, "name, age");

        let (function, args) = matcher
            .find("ip addresses starting from 10.0.0.1, 4")
            .unwrap();
        assert_eq!(function.name, "arangeIP");
        assert_eq!(args, "10.0.0.1, 4");

        let (function, args) = matcher.find("a random string of length 8").unwrap();
        assert!(function.name.is_empty());
        assert_eq!(args, "8");
    }
}
