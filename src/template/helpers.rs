// ABOUTME: Base library of general purpose template functions
// ABOUTME: String, math, date, environment and random string utilities available to every template

use chrono::{DateTime, TimeZone, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value as JsonValue};
use std::env;
use std::fmt::Write as _;
use uuid::Uuid;

use super::error::FunctionError;
use super::function::{text_arg, FunctionResult, TemplateFunction};

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// Hostname of the machine rendering the template
pub fn hostname() -> FunctionResult {
    let hostname = hostname::get()?;
    Ok(json!(hostname.to_string_lossy()))
}

/// Current UTC time, formatted with an optional strftime pattern
pub fn timestamp(args: &[JsonValue]) -> FunctionResult {
    let format = optional_text(args, 0)?.unwrap_or_else(|| DEFAULT_TIME_FORMAT.to_string());
    format_datetime(&Utc::now(), &format, 0).map(JsonValue::from)
}

/// Reformat an RFC 3339 or unix-seconds timestamp
pub fn format_time(args: &[JsonValue]) -> FunctionResult {
    let input = text_arg(args, 0)?;
    let format = optional_text(args, 1)?.unwrap_or_else(|| DEFAULT_TIME_FORMAT.to_string());

    let datetime = match DateTime::parse_from_rfc3339(&input) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(_) => input
            .parse::<i64>()
            .ok()
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .ok_or_else(|| {
                FunctionError::invalid(0, format!("Failed to parse timestamp: {}", input))
            })?,
    };

    format_datetime(&datetime, &format, 1).map(JsonValue::from)
}

fn format_datetime(
    datetime: &DateTime<Utc>,
    format: &str,
    index: usize,
) -> Result<String, FunctionError> {
    let mut formatted = String::new();
    write!(formatted, "{}", datetime.format(format))
        .map_err(|_| FunctionError::invalid(index, format!("invalid time format: {}", format)))?;
    Ok(formatted)
}

pub fn uuid() -> FunctionResult {
    Ok(json!(Uuid::new_v4().to_string()))
}

/// Environment variable value with an optional default
pub fn env_var(args: &[JsonValue]) -> FunctionResult {
    let name = text_arg(args, 0)?;
    let default_value = optional_text(args, 1)?.unwrap_or_default();
    Ok(json!(env::var(name).unwrap_or(default_value)))
}

pub fn upper(input: &str) -> FunctionResult {
    Ok(json!(input.to_uppercase()))
}

pub fn lower(input: &str) -> FunctionResult {
    Ok(json!(input.to_lowercase()))
}

pub fn trim(input: &str) -> FunctionResult {
    Ok(json!(input.trim()))
}

/// Returns the first argument unless it is empty, otherwise the fallback
pub fn default_value(args: &[JsonValue]) -> FunctionResult {
    let value = optional_text(args, 0)?.unwrap_or_default();
    let fallback = text_arg(args, 1)?;
    Ok(json!(if value.is_empty() { fallback } else { value }))
}

/// Joins array elements with a separator
pub fn join(args: &[JsonValue]) -> FunctionResult {
    let separator = text_arg(args, 0)?;
    let items = args
        .get(1)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| FunctionError::invalid(1, "join requires an array parameter"))?;

    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    Ok(json!(parts.join(&separator)))
}

pub fn rand_alpha(length: i64) -> FunctionResult {
    Ok(json!(random_from(LETTERS, length)))
}

pub fn rand_numeric(length: i64) -> FunctionResult {
    Ok(json!(random_from(DIGITS, length)))
}

pub fn rand_alpha_num(length: i64) -> FunctionResult {
    let text: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length.max(0) as usize)
        .map(char::from)
        .collect();
    Ok(json!(text))
}

/// Random integer in `[min, max)`
pub fn rand_int(min: i64, max: i64) -> FunctionResult {
    if min >= max {
        return Err(FunctionError::invalid(
            1,
            format!("max ({}) must be greater than min ({})", max, min),
        ));
    }
    Ok(json!(rand::thread_rng().gen_range(min..max)))
}

fn random_from(alphabet: &[u8], length: i64) -> String {
    let mut rng = rand::thread_rng();
    (0..length.max(0))
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

fn optional_text(args: &[JsonValue], index: usize) -> Result<Option<String>, FunctionError> {
    match args.get(index) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(_) => text_arg(args, index).map(Some),
    }
}

/// All base library functions, in registration order
pub fn base_functions() -> Vec<(&'static str, TemplateFunction)> {
    vec![
        ("hostname", TemplateFunction::nullary(hostname)),
        ("timestamp", TemplateFunction::variadic(timestamp)),
        ("formatTime", TemplateFunction::variadic(format_time)),
        ("uuid", TemplateFunction::nullary(uuid)),
        ("env", TemplateFunction::variadic(env_var)),
        ("upper", TemplateFunction::text(upper)),
        ("lower", TemplateFunction::text(lower)),
        ("trim", TemplateFunction::text(trim)),
        ("default", TemplateFunction::variadic(default_value)),
        ("join", TemplateFunction::variadic(join)),
        ("randAlpha", TemplateFunction::int(rand_alpha)),
        ("randAlphaNum", TemplateFunction::int(rand_alpha_num)),
        ("randNumeric", TemplateFunction::int(rand_numeric)),
        ("randInt", TemplateFunction::int_pair(rand_int)),
        ("add", TemplateFunction::int_pair(|a, b| Ok(json!(a.saturating_add(b))))),
        ("sub", TemplateFunction::int_pair(|a, b| Ok(json!(a.saturating_sub(b))))),
        ("mul", TemplateFunction::int_pair(|a, b| Ok(json!(a.saturating_mul(b))))),
    ]
}
