//! Listing records
//!
//! A `CandidateRecord` is built from exactly one product container. It is
//! promoted to a `ValidRecord` only when every required field is present;
//! otherwise it is dropped with a `Rejection` that explains why.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::selector::ScopeKey;

/// Normalized value of one extracted field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Record derived from one container, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub scope: ScopeKey,
    pub page_number: u32,
    /// 1-based position among the page's surviving containers
    pub position: u32,
    pub fields: BTreeMap<String, Option<FieldValue>>,
    pub container_attrs: HashMap<String, String>,
}

impl CandidateRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).and_then(Option::as_ref)
    }

    /// Promote to a `ValidRecord` when every required field is present.
    ///
    /// The first required field found missing (in `required` order) is
    /// reported in the rejection.
    pub fn promote(
        self,
        required: &[String],
        identity_fields: &[String],
    ) -> Result<ValidRecord, Rejection> {
        if let Some(missing) = required.iter().find(|name| self.get(name).is_none()) {
            return Err(Rejection {
                page_number: self.page_number,
                position: self.position,
                reason: RejectionReason::MissingField(missing.clone()),
            });
        }

        let fields: BTreeMap<String, FieldValue> = self
            .fields
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        let record_key = record_key(&fields, identity_fields);

        Ok(ValidRecord {
            scope: self.scope,
            page_number: self.page_number,
            position: self.position,
            record_key,
            fields,
            collected_at: Utc::now(),
        })
    }
}

/// Identity used for duplicate detection: the first present identity field,
/// otherwise a digest over all field values.
fn record_key(fields: &BTreeMap<String, FieldValue>, identity_fields: &[String]) -> String {
    if let Some(value) = identity_fields.iter().find_map(|name| fields.get(name)) {
        return value.to_string();
    }

    let mut hasher = blake3::Hasher::new();
    for (name, value) in fields {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// Validated, normalized record; immutable after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidRecord {
    pub scope: ScopeKey,
    pub page_number: u32,
    pub position: u32,
    pub record_key: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub collected_at: DateTime<Utc>,
}

impl ValidRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// Rank if the page type extracts one
    pub fn rank(&self) -> Option<i64> {
        self.fields.values().find_map(FieldValue::as_integer)
    }
}

/// Why a candidate was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    MissingField(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "missing_field:{name}"),
        }
    }
}

/// A dropped candidate; an expected filtering outcome, not an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub page_number: u32,
    pub position: u32,
    pub reason: RejectionReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {} position {}: {}",
            self.page_number, self.position, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(fields: &[(&str, Option<FieldValue>)]) -> CandidateRecord {
        CandidateRecord {
            scope: ScopeKey::new("Amazon", "main_page"),
            page_number: 1,
            position: 3,
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            container_attrs: HashMap::new(),
        }
    }

    fn text(s: &str) -> Option<FieldValue> {
        Some(FieldValue::Text(s.to_string()))
    }

    #[test]
    fn promotes_when_required_fields_present() {
        let record = candidate(&[("product_name", text("TV")), ("deal_badge", None)])
            .promote(&["product_name".to_string()], &[])
            .unwrap();

        assert_eq!(record.text("product_name"), Some("TV"));
        // absent optional fields are not carried into the valid record
        assert!(record.get("deal_badge").is_none());
    }

    #[test]
    fn rejects_with_missing_field_reason() {
        let rejection = candidate(&[("product_name", None), ("final_price", text("$5"))])
            .promote(&["product_name".to_string()], &[])
            .unwrap_err();

        assert_eq!(rejection.reason.to_string(), "missing_field:product_name");
        assert_eq!(rejection.position, 3);
    }

    #[test]
    fn record_key_prefers_identity_field() {
        let record = candidate(&[("asin", text("B0ABC")), ("product_name", text("TV"))])
            .promote(&[], &["asin".to_string()])
            .unwrap();
        assert_eq!(record.record_key, "B0ABC");
    }

    #[test]
    fn record_key_falls_back_to_stable_digest() {
        let a = candidate(&[("product_name", text("TV"))])
            .promote(&[], &["asin".to_string()])
            .unwrap();
        let b = candidate(&[("product_name", text("TV"))])
            .promote(&[], &["asin".to_string()])
            .unwrap();
        assert_eq!(a.record_key, b.record_key);
        assert_eq!(a.record_key.len(), 64);
    }
}
