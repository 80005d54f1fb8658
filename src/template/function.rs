// ABOUTME: Closed set of template function signatures and their Handlebars adapter
// ABOUTME: Validates argument count and kinds before dispatching to the wrapped callable

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
    ScopedJson,
};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use super::error::FunctionError;

pub type FunctionResult = Result<JsonValue, FunctionError>;

type NullaryFn = dyn Fn() -> FunctionResult + Send + Sync;
type TextFn = dyn Fn(&str) -> FunctionResult + Send + Sync;
type TextPairFn = dyn Fn(&str, &str) -> FunctionResult + Send + Sync;
type TextIntFn = dyn Fn(&str, i64) -> FunctionResult + Send + Sync;
type IntFn = dyn Fn(i64) -> FunctionResult + Send + Sync;
type IntPairFn = dyn Fn(i64, i64) -> FunctionResult + Send + Sync;
type IntTripleFn = dyn Fn(i64, i64, i64) -> FunctionResult + Send + Sync;
type FloatPairFn = dyn Fn(f64, f64) -> FunctionResult + Send + Sync;
type BytesFn = dyn Fn(&[u8]) -> FunctionResult + Send + Sync;
type IntValueFn = dyn Fn(i64, &JsonValue) -> FunctionResult + Send + Sync;
type VariadicFn = dyn Fn(&[JsonValue]) -> FunctionResult + Send + Sync;

/// A callable exposed to templates. The variant fixes the accepted arguments.
#[derive(Clone)]
pub enum TemplateFunction {
    Nullary(Arc<NullaryFn>),
    Text(Arc<TextFn>),
    TextPair(Arc<TextPairFn>),
    TextInt(Arc<TextIntFn>),
    Int(Arc<IntFn>),
    IntPair(Arc<IntPairFn>),
    IntTriple(Arc<IntTripleFn>),
    FloatPair(Arc<FloatPairFn>),
    Bytes(Arc<BytesFn>),
    IntValue(Arc<IntValueFn>),
    Variadic(Arc<VariadicFn>),
}

impl TemplateFunction {
    pub fn nullary(f: impl Fn() -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::Nullary(Arc::new(f))
    }

    pub fn text(f: impl Fn(&str) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::Text(Arc::new(f))
    }

    pub fn text_pair(f: impl Fn(&str, &str) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::TextPair(Arc::new(f))
    }

    pub fn text_int(f: impl Fn(&str, i64) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::TextInt(Arc::new(f))
    }

    pub fn int(f: impl Fn(i64) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::Int(Arc::new(f))
    }

    pub fn int_pair(f: impl Fn(i64, i64) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::IntPair(Arc::new(f))
    }

    pub fn int_triple(f: impl Fn(i64, i64, i64) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::IntTriple(Arc::new(f))
    }

    pub fn float_pair(f: impl Fn(f64, f64) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::FloatPair(Arc::new(f))
    }

    pub fn bytes(f: impl Fn(&[u8]) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::Bytes(Arc::new(f))
    }

    pub fn int_value(f: impl Fn(i64, &JsonValue) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::IntValue(Arc::new(f))
    }

    pub fn variadic(f: impl Fn(&[JsonValue]) -> FunctionResult + Send + Sync + 'static) -> Self {
        Self::Variadic(Arc::new(f))
    }

    /// Human readable argument list, e.g. `(text, int)`.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Nullary(_) => "()",
            Self::Text(_) => "(text)",
            Self::TextPair(_) => "(text, text)",
            Self::TextInt(_) => "(text, int)",
            Self::Int(_) => "(int)",
            Self::IntPair(_) => "(int, int)",
            Self::IntTriple(_) => "(int, int, int)",
            Self::FloatPair(_) => "(float, float)",
            Self::Bytes(_) => "(bytes)",
            Self::IntValue(_) => "(int, any)",
            Self::Variadic(_) => "(any...)",
        }
    }

    /// Fixed argument count; `None` for variadic functions.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::Nullary(_) => Some(0),
            Self::Text(_) | Self::Int(_) | Self::Bytes(_) => Some(1),
            Self::TextPair(_)
            | Self::TextInt(_)
            | Self::IntPair(_)
            | Self::FloatPair(_)
            | Self::IntValue(_) => Some(2),
            Self::IntTriple(_) => Some(3),
            Self::Variadic(_) => None,
        }
    }

    pub fn call(&self, args: &[JsonValue]) -> FunctionResult {
        if let Some(expected) = self.arity() {
            if args.len() != expected {
                return Err(FunctionError::ArgumentCount {
                    expected: expected.to_string(),
                    actual: args.len(),
                });
            }
        }

        match self {
            Self::Nullary(f) => f(),
            Self::Text(f) => f(&text_arg(args, 0)?),
            Self::TextPair(f) => f(&text_arg(args, 0)?, &text_arg(args, 1)?),
            Self::TextInt(f) => f(&text_arg(args, 0)?, int_arg(args, 1)?),
            Self::Int(f) => f(int_arg(args, 0)?),
            Self::IntPair(f) => f(int_arg(args, 0)?, int_arg(args, 1)?),
            Self::IntTriple(f) => f(int_arg(args, 0)?, int_arg(args, 1)?, int_arg(args, 2)?),
            Self::FloatPair(f) => f(float_arg(args, 0)?, float_arg(args, 1)?),
            Self::Bytes(f) => f(&bytes_arg(args, 0)?),
            Self::IntValue(f) => f(int_arg(args, 0)?, &args[1]),
            Self::Variadic(f) => f(args),
        }
    }
}

impl fmt::Debug for TemplateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemplateFunction{}", self.signature())
    }
}

/// Scalars are accepted as text; objects, arrays and null are not.
pub fn text_arg(args: &[JsonValue], index: usize) -> Result<String, FunctionError> {
    match args.get(index) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(JsonValue::Number(n)) => Ok(n.to_string()),
        Some(JsonValue::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(FunctionError::invalid(
            index,
            format!("expected text, got {}", other),
        )),
        None => Err(FunctionError::invalid(index, "missing text argument")),
    }
}

/// Integers, floats (truncated) and numeric strings are accepted.
pub fn int_arg(args: &[JsonValue], index: usize) -> Result<i64, FunctionError> {
    let parsed = match args.get(index) {
        Some(JsonValue::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(JsonValue::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    };
    parsed.ok_or_else(|| FunctionError::invalid(index, "expected an integer"))
}

pub fn float_arg(args: &[JsonValue], index: usize) -> Result<f64, FunctionError> {
    let parsed = match args.get(index) {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| FunctionError::invalid(index, "expected a number"))
}

/// Text is taken as its UTF-8 bytes; arrays must hold values in `0..=255`.
pub fn bytes_arg(args: &[JsonValue], index: usize) -> Result<Vec<u8>, FunctionError> {
    match args.get(index) {
        Some(JsonValue::String(s)) => Ok(s.as_bytes().to_vec()),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| FunctionError::invalid(index, "expected byte values"))
            })
            .collect(),
        _ => Err(FunctionError::invalid(index, "expected text or a byte array")),
    }
}

/// Exposes a [`TemplateFunction`] as a Handlebars helper. Function errors abort
/// the render.
pub struct FunctionHelper {
    name: String,
    function: TemplateFunction,
}

impl FunctionHelper {
    pub fn new(name: impl Into<String>, function: TemplateFunction) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

impl HelperDef for FunctionHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let args: Vec<JsonValue> = h.params().iter().map(|p| p.value().clone()).collect();

        self.function
            .call(&args)
            .map(ScopedJson::Derived)
            .map_err(|e| RenderError::from_error(&format!("{}: {}", self.name, e), e))
    }
}

/// Name under which Handlebars looks up the hook for unknown helpers and
/// unresolved bare names.
pub const HELPER_MISSING: &str = "helperMissing";

/// Fails the render for any name that is neither a function nor a context value.
pub struct MissingFunctionHelper;

impl HelperDef for MissingFunctionHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        _: &mut dyn Output,
    ) -> HelperResult {
        Err(RenderError::new(format!("function `{}` not defined", h.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arity_is_checked() {
        let upper = TemplateFunction::text(|s| Ok(json!(s.to_uppercase())));
        assert_eq!(upper.call(&[json!("abc")]).unwrap(), json!("ABC"));

        let err = upper.call(&[]).unwrap_err();
        assert!(matches!(err, FunctionError::ArgumentCount { actual: 0, .. }));
        assert!(upper.call(&[json!("a"), json!("b")]).is_err());
    }

    #[test]
    fn test_argument_coercion() {
        let args = [json!(3), json!("4"), json!(2.9), json!("x"), json!(null)];
        assert_eq!(int_arg(&args, 0).unwrap(), 3);
        assert_eq!(int_arg(&args, 1).unwrap(), 4);
        assert_eq!(int_arg(&args, 2).unwrap(), 2);
        assert!(int_arg(&args, 3).is_err());

        assert_eq!(float_arg(&args, 1).unwrap(), 4.0);
        assert_eq!(text_arg(&args, 0).unwrap(), "3");
        assert!(text_arg(&args, 4).is_err());
        assert!(text_arg(&args, 9).is_err());
    }

    #[test]
    fn test_bytes_argument() {
        assert_eq!(bytes_arg(&[json!("ab")], 0).unwrap(), b"ab".to_vec());
        assert_eq!(bytes_arg(&[json!([1, 2, 255])], 0).unwrap(), vec![1, 2, 255]);
        assert!(bytes_arg(&[json!([256])], 0).is_err());
        assert!(bytes_arg(&[json!({})], 0).is_err());
    }

    #[test]
    fn test_signatures() {
        let triple = TemplateFunction::int_triple(|a, b, c| Ok(json!(a + b + c)));
        assert_eq!(triple.signature(), "(int, int, int)");
        assert_eq!(triple.call(&[json!(1), json!(2), json!(3)]).unwrap(), json!(6));

        let variadic = TemplateFunction::variadic(|args| Ok(json!(args.len())));
        assert_eq!(variadic.arity(), None);
        assert_eq!(variadic.call(&[json!(1), json!(2)]).unwrap(), json!(2));
    }

    #[test]
    fn test_helper_renders_value() {
        let mut handlebars = Handlebars::new();
        handlebars.register_helper(
            "twice",
            Box::new(FunctionHelper::new(
                "twice",
                TemplateFunction::int(|n| Ok(json!(n * 2))),
            )),
        );

        let result = handlebars.render_template("{{twice 21}}", &json!({})).unwrap();
        assert_eq!(result, "42");

        let err = handlebars
            .render_template("{{twice \"x\"}}", &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_missing_function_helper() {
        let mut handlebars = Handlebars::new();
        handlebars.register_helper(HELPER_MISSING, Box::new(MissingFunctionHelper));

        assert_eq!(
            handlebars
                .render_template("{{present}}", &json!({"present": "yes"}))
                .unwrap(),
            "yes"
        );

        let err = handlebars.render_template("{{absent}}", &json!({})).unwrap_err();
        assert!(err.to_string().contains("function `absent` not defined"));

        let err = handlebars
            .render_template("{{absent \"arg\"}}", &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("absent"));
    }
}
