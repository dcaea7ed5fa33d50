//! Converts a JSON document into the `Record`/`Value` shape the template
//! pipeline evaluates against — the one boundary where outside input
//! becomes a render-data value (spec.md §3's data model).

use dtx_template::{Record, Value};

pub fn record_from_json(json: serde_json::Value) -> Record {
    match value_from_json(json) {
        Value::Record(rec) => rec,
        _ => Record::new(),
    }
}

fn value_from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(value_from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Record(map.into_iter().map(|(k, v)| (k, value_from_json(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_nested_json_into_record() {
        let json: serde_json::Value = serde_json::json!({
            "name": "Ada",
            "scores": [1, 2, 3],
            "address": { "city": "Paris" },
        });
        let rec = record_from_json(json);
        assert_eq!(rec.get("name"), Some(&Value::Str("Ada".into())));
        assert_eq!(
            rec.get("scores"),
            Some(&Value::List(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ]))
        );
    }
}
