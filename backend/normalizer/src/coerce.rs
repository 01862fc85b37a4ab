//! Lenient readers for individual JSON fields.

use serde_json::{Map, Value};

/// Outcome of reading one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Field<T> {
    Present(T),
    Missing,
    Invalid,
}

/// First of `names` present and non-null in `object`.
pub(crate) fn lookup<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find(|value| !value.is_null())
}

/// Finite number, or a string holding one.
pub(crate) fn number(value: Option<&Value>) -> Field<f64> {
    let parsed = match value {
        None | Some(Value::Null) => return Field::Missing,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Field::Present(v),
        _ => Field::Invalid,
    }
}

/// Boolean, or a string spelling one.
pub(crate) fn boolean(value: Option<&Value>) -> Field<bool> {
    match value {
        None | Some(Value::Null) => Field::Missing,
        Some(Value::Bool(b)) => Field::Present(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Field::Present(true),
            "false" | "no" => Field::Present(false),
            _ => Field::Invalid,
        },
        Some(_) => Field::Invalid,
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_numbers_and_numeric_strings() {
        assert_eq!(number(Some(&json!(0.5))), Field::Present(0.5));
        assert_eq!(number(Some(&json!(" 0.25 "))), Field::Present(0.25));
        assert_eq!(number(Some(&json!(2))), Field::Present(2.0));
        assert_eq!(number(None), Field::Missing);
        assert_eq!(number(Some(&Value::Null)), Field::Missing);
        assert_eq!(number(Some(&json!("high"))), Field::Invalid);
        assert_eq!(number(Some(&json!("NaN"))), Field::Invalid);
        assert_eq!(number(Some(&json!([0.1]))), Field::Invalid);
    }

    #[test]
    fn reads_booleans_and_spelled_booleans() {
        assert_eq!(boolean(Some(&json!(true))), Field::Present(true));
        assert_eq!(boolean(Some(&json!("False"))), Field::Present(false));
        assert_eq!(boolean(Some(&json!(1))), Field::Invalid);
        assert_eq!(boolean(None), Field::Missing);
    }

    #[test]
    fn lookup_skips_nulls_and_honours_alias_order() {
        let object = json!({"w": null, "width": 0.3});
        let object = object.as_object().unwrap();
        assert_eq!(lookup(object, &["w", "width"]), Some(&json!(0.3)));
        assert_eq!(lookup(object, &["h", "height"]), None);
    }

    #[test]
    fn clamping_is_idempotent() {
        for v in [-3.0, -0.0001, 0.0, 0.42, 1.0, 1.7] {
            let once = clamp_unit(v);
            assert!((0.0..=1.0).contains(&once));
            assert_eq!(clamp_unit(once), once);
        }
    }
}
