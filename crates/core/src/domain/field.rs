use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Every field the parameter extractor is allowed to emit.
pub const SCHEMA_FIELDS: [&str; 19] = [
    "parsed_name[year]",
    "parsed_name[make]",
    "parsed_name[model]",
    "parsed_name[trim]",
    "parsed_name[vehicle_type]",
    "price",
    "annual_mileage",
    "specifications[horsepower]",
    "specifications[epa_range]",
    "specifications[torque]",
    "specifications[exterior_color]",
    "specifications[interior_color]",
    "specifications[wheel_type]",
    "specifications[drive]",
    "features[exterior]",
    "features[interior]",
    "features[functional]",
    "warranty",
    "vin",
];

/// Fields that identify a set of vehicles rather than describe one.
pub const IDENTITY_FIELDS: [&str; 5] = [
    "parsed_name[make]",
    "parsed_name[model]",
    "parsed_name[vehicle_type]",
    "parsed_name[year]",
    "parsed_name[trim]",
];

/// Path into a vehicle record: either a top-level key (`price`) or one level
/// into a nested mapping (`specifications[horsepower]`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldPath {
    Simple(String),
    Nested { outer: String, inner: String },
}

impl FieldPath {
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple(name.into())
    }

    pub fn nested(outer: impl Into<String>, inner: impl Into<String>) -> Self {
        Self::Nested { outer: outer.into(), inner: inner.into() }
    }

    /// The fixed extraction schema, in prompt order.
    pub fn schema() -> Vec<FieldPath> {
        SCHEMA_FIELDS.iter().filter_map(|field| field.parse().ok()).collect()
    }

    pub fn is_schema_field(&self) -> bool {
        let rendered = self.to_string();
        SCHEMA_FIELDS.contains(&rendered.as_str())
    }

    pub fn is_identity(&self) -> bool {
        let rendered = self.to_string();
        IDENTITY_FIELDS.contains(&rendered.as_str())
    }

    pub fn top_level(&self) -> &str {
        match self {
            Self::Simple(name) => name,
            Self::Nested { outer, .. } => outer,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(name) => f.write_str(name),
            Self::Nested { outer, inner } => write!(f, "{outer}[{inner}]"),
        }
    }
}

impl FromStr for FieldPath {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        let invalid = || DomainError::InvalidFieldPath(raw.to_string());

        if value.is_empty() {
            return Err(invalid());
        }

        let Some((outer, rest)) = value.split_once('[') else {
            if value.contains(']') {
                return Err(invalid());
            }
            return Ok(Self::Simple(value.to_string()));
        };

        let inner = rest.strip_suffix(']').ok_or_else(invalid)?;
        let (outer, inner) = (outer.trim(), inner.trim());
        if outer.is_empty() || inner.is_empty() || inner.contains(['[', ']']) {
            return Err(invalid());
        }

        Ok(Self::nested(outer, inner))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldPath, IDENTITY_FIELDS, SCHEMA_FIELDS};
    use crate::errors::DomainError;

    #[test]
    fn parses_nested_and_simple_paths() {
        assert_eq!(
            "specifications[horsepower]".parse::<FieldPath>(),
            Ok(FieldPath::nested("specifications", "horsepower"))
        );
        assert_eq!(" price ".parse::<FieldPath>(), Ok(FieldPath::simple("price")));
    }

    #[test]
    fn rejects_malformed_bracket_paths() {
        for raw in ["", "specifications[", "[horsepower]", "a[b]c", "a[b[c]]", "price]"] {
            assert_eq!(
                raw.parse::<FieldPath>(),
                Err(DomainError::InvalidFieldPath(raw.to_string())),
                "`{raw}` should not parse"
            );
        }
    }

    #[test]
    fn display_round_trips_every_schema_field() {
        let schema = FieldPath::schema();
        assert_eq!(schema.len(), SCHEMA_FIELDS.len());
        for (path, raw) in schema.iter().zip(SCHEMA_FIELDS) {
            assert_eq!(path.to_string(), raw);
            assert!(path.is_schema_field());
        }
    }

    #[test]
    fn identity_fields_are_a_subset_of_the_schema() {
        for raw in IDENTITY_FIELDS {
            let path: FieldPath = raw.parse().expect("identity field parses");
            assert!(path.is_identity());
            assert!(path.is_schema_field());
        }
        assert!(!FieldPath::nested("specifications", "horsepower").is_identity());
    }

    #[test]
    fn serializes_as_bracket_string() {
        let path = FieldPath::nested("parsed_name", "model");
        let json = serde_json::to_string(&path).expect("serialize");
        assert_eq!(json, "\"parsed_name[model]\"");
        let back: FieldPath = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, path);
    }
}
