// ABOUTME: Random value generators backing the randomized template functions
// ABOUTME: Normal/log-normal/uniform draws, weighted and uniform choices, strings and IPv4 sequences

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error::FunctionError;

/// Alphabet shared by random names and email segments.
pub const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A value paired with its relative draw weight. Weights `<= 0` never win a draw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedItem {
    pub weight: i64,
    pub value: JsonValue,
}

impl WeightedItem {
    pub fn new(weight: i64, value: JsonValue) -> Self {
        Self { weight, value }
    }
}

/// Draw from a normal distribution with the given mean and standard deviation.
pub fn random_float(mean: f64, std_dev: f64) -> f64 {
    let sample: f64 = rand::thread_rng().sample(StandardNormal);
    mean + std_dev * sample
}

pub fn random_log_normal_float(mean: f64, std_dev: f64) -> f64 {
    random_float(mean, std_dev).exp()
}

/// Uniform draw in `[from, to)`.
pub fn uniform_float(from: f64, to: f64) -> f64 {
    let unit: f64 = rand::thread_rng().gen();
    unit * (to - from) + from
}

pub fn uniform_choice<T: Clone>(items: &[T]) -> Result<T, FunctionError> {
    items
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or(FunctionError::EmptyChoice)
}

/// Draw one value with probability proportional to its weight.
///
/// Equivalent to expanding every item into `weight` copies and drawing one
/// uniformly, without materializing the copies. A total weight of zero is
/// reported as [`FunctionError::EmptyChoice`]; a total that overflows `i64` is
/// rejected.
pub fn weighted_choice(items: &[WeightedItem]) -> Result<JsonValue, FunctionError> {
    let total = items.iter().try_fold(0i64, |total, item| {
        total
            .checked_add(item.weight.max(0))
            .ok_or_else(|| FunctionError::invalid(0, "total weight overflows"))
    })?;
    if total == 0 {
        return Err(FunctionError::EmptyChoice);
    }

    let mut remaining = rand::thread_rng().gen_range(0..total);
    for item in items.iter().filter(|item| item.weight > 0) {
        if remaining < item.weight {
            return Ok(item.value.clone());
        }
        remaining -= item.weight;
    }
    Err(FunctionError::EmptyChoice)
}

pub fn random_alphanumeric(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

pub fn random_email() -> String {
    format!("{}@{}.com", random_alphanumeric(3), random_alphanumeric(3))
}

/// Longest list `arange` will produce.
pub const MAX_RANGE_LEN: i128 = 1_000_000;

/// Inclusive integer range. A non-positive step over a non-empty range is
/// rejected, as is a range longer than [`MAX_RANGE_LEN`].
pub fn arange(from: i64, to: i64, step: i64) -> Result<Vec<i64>, FunctionError> {
    if from > to {
        return Ok(Vec::new());
    }
    if step <= 0 {
        return Err(FunctionError::invalid(
            2,
            format!("step must be positive, got {}", step),
        ));
    }

    let len = (to as i128 - from as i128) / step as i128 + 1;
    if len > MAX_RANGE_LEN {
        return Err(FunctionError::invalid(
            1,
            format!("range of {} values exceeds the limit of {}", len, MAX_RANGE_LEN),
        ));
    }

    Ok((from..=to).step_by(step as usize).collect())
}

/// Generate up to `count` IPv4 addresses starting with `start`.
///
/// The sequence ends early once an address can no longer be advanced.
pub fn ip_sequence(start: &str, count: i64) -> Vec<String> {
    let mut result = vec![start.to_string()];

    for _ in 1..count {
        let last = &result[result.len() - 1];
        let next = next_ipv4(last);
        if &next == last {
            break;
        }
        result.push(next);
    }

    result
}

/// Increment the fourth segment; a segment at 255 or above resets to 1 and
/// carries left. Segments past the fourth are kept but never touched. Returns
/// the input unchanged when there are fewer than four segments, the carry runs
/// past the first one, or a segment it reaches is not a number.
fn next_ipv4(address: &str) -> String {
    let mut octets: Vec<String> = address.split('.').map(str::to_string).collect();
    if octets.len() < 4 {
        return address.to_string();
    }

    for index in (0..4).rev() {
        let Ok(value) = octets[index].parse::<i64>() else {
            return address.to_string();
        };

        if value >= 255 {
            octets[index] = "1".to_string();
        } else {
            octets[index] = (value + 1).to_string();
            return octets.join(".");
        }
    }

    address.to_string()
}
