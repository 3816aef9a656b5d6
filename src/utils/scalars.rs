//! Scalar normalisation for fragments written with YAML 1.1 habits

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Number, Value};

static UNDERSCORED_INT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?[0-9]+(_[0-9]+)+$").unwrap());
static EXPONENT_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?([0-9][0-9_]*)?\.?[0-9]*[eE][-+]?[0-9]+$").unwrap());

fn normalize_scalar(text: &str) -> Option<Value> {
    match text {
        "True" | "TRUE" => return Some(Value::Bool(true)),
        "False" | "FALSE" => return Some(Value::Bool(false)),
        _ => {}
    }
    if UNDERSCORED_INT.is_match(text) {
        let digits = text.replace('_', "");
        if let Ok(n) = digits.parse::<i64>() {
            return Some(Value::Number(Number::from(n)));
        }
        if let Ok(n) = digits.parse::<u64>() {
            return Some(Value::Number(Number::from(n)));
        }
    }
    if EXPONENT_FLOAT.is_match(text) && text.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(f) = text.replace('_', "").parse::<f64>() {
            return Some(Value::Number(Number::from(f)));
        }
    }
    None
}

/// Rewrite `10_000`, `True`, `1e-4` style string scalars into their typed form.
///
/// The YAML parser follows the 1.2 core schema and leaves these as strings.
/// Quoted strings of the same shape are converted too: the parsed tree no
/// longer carries the quoting style.
pub fn normalize_scalars(value: &mut Value) {
    match value {
        Value::String(text) => {
            if let Some(typed) = normalize_scalar(text) {
                *value = typed;
            }
        }
        Value::Sequence(seq) => seq.iter_mut().for_each(normalize_scalars),
        Value::Mapping(map) => map.iter_mut().for_each(|(_, v)| normalize_scalars(v)),
        Value::Tagged(tagged) => normalize_scalars(&mut tagged.value),
        _ => {}
    }
}
