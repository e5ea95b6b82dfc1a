use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field::FieldPath;

/// Placeholder the catalog and the extractor use for a value nobody knows.
pub const UNKNOWN: &str = "Unknown";

/// One vehicle as scraped into the catalog.
///
/// The record keeps the document shape untouched (`vehicle_name`, `vin`,
/// `price`, `annual_mileage`, `parsed_name{..}`, `specifications{..}`,
/// `features{..}`, `warranty{..}`) so that raw-data responses hand back
/// exactly what was loaded. Any field may be absent or hold `"Unknown"`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleRecord(Map<String, Value>);

impl VehicleRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Accepts only JSON objects.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn vehicle_name(&self) -> Option<&str> {
        self.0.get("vehicle_name").and_then(Value::as_str)
    }

    pub fn vin(&self) -> Option<&str> {
        self.0.get("vin").and_then(Value::as_str)
    }

    /// Key under which the record is filed in its catalog category.
    pub fn catalog_key(&self) -> Option<&str> {
        self.vehicle_name().or_else(|| self.vin())
    }

    pub fn label(&self) -> &str {
        self.catalog_key().unwrap_or("unknown")
    }

    /// Resolves a path. A nested path only resolves when the outer key holds a mapping.
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        match path {
            FieldPath::Simple(name) => self.0.get(name),
            FieldPath::Nested { outer, inner } => match self.0.get(outer) {
                Some(Value::Object(nested)) => nested.get(inner),
                _ => None,
            },
        }
    }

    /// Value at `path`, or the `"Unknown"` placeholder.
    pub fn value_or_unknown(&self, path: &FieldPath) -> Value {
        self.get(path).cloned().unwrap_or_else(|| Value::String(UNKNOWN.to_string()))
    }
}

impl From<Map<String, Value>> for VehicleRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Flat text rendering of a JSON value used for substring matching and prompts.
///
/// Lists join their items, mappings render `key: value` pairs, so a feature
/// list or warranty table can be matched by any of its entries.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, value)| format!("{key}: {}", value_text(value)))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{value_text, VehicleRecord, UNKNOWN};
    use crate::domain::field::FieldPath;

    fn escape() -> VehicleRecord {
        VehicleRecord::from_value(json!({
            "vehicle_name": "2024 Escape ST-Line",
            "vin": "1FMCU9MN0RUA00001",
            "parsed_name": {"year": "2024", "model": "Escape", "trim": "ST-Line"},
            "specifications": {"horsepower": "250"},
            "features": {"exterior": ["LED Headlamps", "Roof Rails"]},
            "warranty": "Unknown"
        }))
        .expect("object record")
    }

    #[test]
    fn resolves_nested_and_simple_paths() {
        let record = escape();
        assert_eq!(
            record.get(&FieldPath::nested("specifications", "horsepower")),
            Some(&json!("250"))
        );
        assert_eq!(record.get(&FieldPath::simple("vin")), Some(&json!("1FMCU9MN0RUA00001")));
        assert_eq!(record.get(&FieldPath::nested("specifications", "torque")), None);
    }

    #[test]
    fn nested_path_into_non_mapping_is_absent() {
        let record = escape();
        assert_eq!(record.get(&FieldPath::nested("warranty", "basic")), None);
        assert_eq!(
            record.value_or_unknown(&FieldPath::nested("warranty", "basic")),
            json!(UNKNOWN)
        );
    }

    #[test]
    fn catalog_key_falls_back_to_vin() {
        let record = VehicleRecord::from_value(json!({"vin": "VIN-ONLY"})).expect("object");
        assert_eq!(record.catalog_key(), Some("VIN-ONLY"));
        assert_eq!(VehicleRecord::default().label(), "unknown");
    }

    #[test]
    fn non_objects_are_not_records() {
        assert!(VehicleRecord::from_value(json!(["not", "a", "record"])).is_none());
        assert!(VehicleRecord::from_value(json!("Not in stock")).is_none());
    }

    #[test]
    fn text_rendering_flattens_lists_and_mappings() {
        assert_eq!(value_text(&json!(["LED Headlamps", "Roof Rails"])), "LED Headlamps, Roof Rails");
        assert_eq!(value_text(&json!({"basic": "3yr"})), "basic: 3yr");
        assert_eq!(value_text(&json!(31500)), "31500");
        assert_eq!(value_text(&json!(null)), "");
    }
}
