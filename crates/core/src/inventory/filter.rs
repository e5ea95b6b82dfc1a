use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::field::FieldPath;
use crate::domain::vehicle::{value_text, VehicleRecord, UNKNOWN};

/// Search parameters pulled out of one query.
///
/// `constraints` narrow the catalog; `requested_fields` are fields the user
/// asked about without giving a value. The extractor marks the latter with
/// `"Unknown"`, which is why one sentinel covers both "unconstrained" and
/// "wanted in the answer".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchPredicate {
    constraints: Vec<(FieldPath, String)>,
    requested_fields: Vec<FieldPath>,
}

impl SearchPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a predicate from raw extractor output.
    ///
    /// Keys outside the schema are dropped. `None`, blank or `"Unknown"`
    /// values become requested fields.
    pub fn from_extraction(fields: &BTreeMap<String, Option<String>>) -> Self {
        let mut predicate = Self::new();
        for (key, value) in fields {
            let Ok(path) = key.parse::<FieldPath>() else {
                continue;
            };
            if !path.is_schema_field() {
                continue;
            }
            match value.as_deref().map(str::trim) {
                Some(value) if !is_unconstrained(value) => {
                    predicate = predicate.constrain(path, value);
                }
                _ => predicate = predicate.request(path),
            }
        }
        predicate
    }

    pub fn constrain(mut self, path: FieldPath, value: impl Into<String>) -> Self {
        self.constraints.retain(|(existing, _)| existing != &path);
        self.requested_fields.retain(|existing| existing != &path);
        self.constraints.push((path, value.into()));
        self
    }

    pub fn request(mut self, path: FieldPath) -> Self {
        if !self.requested_fields.contains(&path) {
            self.constraints.retain(|(existing, _)| existing != &path);
            self.requested_fields.push(path);
        }
        self
    }

    /// Union of two predicates; `other` wins on overlapping constraints.
    pub fn merge(mut self, other: SearchPredicate) -> Self {
        for path in other.requested_fields {
            self = self.request(path);
        }
        for (path, value) in other.constraints {
            self = self.constrain(path, value);
        }
        self
    }

    pub fn constraints(&self) -> &[(FieldPath, String)] {
        &self.constraints
    }

    pub fn requested_fields(&self) -> &[FieldPath] {
        &self.requested_fields
    }

    pub fn constraint(&self, path: &FieldPath) -> Option<&str> {
        self.constraints
            .iter()
            .find(|(existing, _)| existing == path)
            .map(|(_, value)| value.as_str())
    }

    /// Whether a make, model, type, year or trim narrows the search.
    pub fn has_identity_filter(&self) -> bool {
        self.constraints.iter().any(|(path, _)| path.is_identity())
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.requested_fields.is_empty()
    }
}

fn is_unconstrained(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case(UNKNOWN)
}

/// Result of narrowing the catalog.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOutcome {
    Matched(Vec<VehicleRecord>),
    NotInStock,
}

impl FilterOutcome {
    pub fn is_in_stock(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    pub fn count(&self) -> usize {
        self.records().len()
    }

    pub fn records(&self) -> &[VehicleRecord] {
        match self {
            Self::Matched(records) => records,
            Self::NotInStock => &[],
        }
    }

    pub fn into_records(self) -> Option<Vec<VehicleRecord>> {
        match self {
            Self::Matched(records) => Some(records),
            Self::NotInStock => None,
        }
    }
}

/// Applies every constraint as an AND filter using trimmed, case-insensitive
/// substring matching. An empty result is reported as [`FilterOutcome::NotInStock`].
pub fn filter(records: &[VehicleRecord], predicate: &SearchPredicate) -> FilterOutcome {
    let mut remaining: Vec<&VehicleRecord> = records.iter().collect();

    for (path, target) in predicate.constraints() {
        let needle = target.trim().to_lowercase();
        remaining.retain(|record| matches(record, path, &needle));
    }

    if remaining.is_empty() {
        FilterOutcome::NotInStock
    } else {
        FilterOutcome::Matched(remaining.into_iter().cloned().collect())
    }
}

/// `needle` must already be trimmed and lower-cased.
fn matches(record: &VehicleRecord, path: &FieldPath, needle: &str) -> bool {
    record
        .get(path)
        .map(|actual| value_text(actual).trim().to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Requested field values per matched record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Projection {
    /// One requested field: its value per record.
    Values(Vec<Value>),
    /// Several requested fields: one mapping per record keyed by field path.
    Rows(Vec<Map<String, Value>>),
}

pub fn project(records: &[VehicleRecord], fields: &[FieldPath]) -> Projection {
    if let [field] = fields {
        return Projection::Values(
            records.iter().map(|record| record.value_or_unknown(field)).collect(),
        );
    }

    Projection::Rows(
        records
            .iter()
            .map(|record| {
                fields
                    .iter()
                    .map(|field| (field.to_string(), record.value_or_unknown(field)))
                    .collect::<Map<String, Value>>()
            })
            .collect(),
    )
}
