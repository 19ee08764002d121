//! Import row adapter
//!
//! Builds [`Record`]s from loosely keyed rows. Keys are canonicalized
//! (quotes, case, `_`, `-`, `.` and spaces ignored) and looked up in an
//! alias table, so `firstName`, `"First Name"` and `fname` all land in
//! `first_name`. Unknown keys are kept in `attributes` under their trimmed
//! original name.

use serde_json::Value;
use tracing::debug;

use crate::error::MatchingError;
use crate::types::{fields::*, Record};

/// Canonical key -> record field
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("firstname", FIRST_NAME),
    ("fname", FIRST_NAME),
    ("givenname", FIRST_NAME),
    ("forename", FIRST_NAME),
    ("middlename", MIDDLE_NAME),
    ("mname", MIDDLE_NAME),
    ("fathername", MIDDLE_NAME),
    ("lastname", LAST_NAME),
    ("lname", LAST_NAME),
    ("surname", LAST_NAME),
    ("familyname", LAST_NAME),
    ("grandfathername", LAST_NAME),
    ("gender", GENDER),
    ("sex", GENDER),
    ("birthdate", BIRTH_DATE),
    ("dateofbirth", BIRTH_DATE),
    ("dob", BIRTH_DATE),
    ("village", VILLAGE),
    ("subvillage", SUB_VILLAGE),
    ("phone", PHONE),
    ("phonenumber", PHONE),
    ("mobile", PHONE),
    ("telephone", PHONE),
    ("householdhead", HOUSEHOLD_HEAD),
    ("headofhousehold", HOUSEHOLD_HEAD),
    ("communityleader", COMMUNITY_LEADER),
    ("housenumber", HOUSE_NUMBER),
    ("houseno", HOUSE_NUMBER),
];

/// Canonical keys carrying the record id
const ID_ALIASES: &[&str] = &["id", "recordid", "uuid", "key"];

/// Canonical key -> identifier type
const IDENTIFIER_ALIASES: &[(&str, &str)] = &[
    ("nationalid", "national_id"),
    ("mrn", "mrn"),
    ("medicalrecordnumber", "mrn"),
    ("passport", "passport"),
    ("passportnumber", "passport"),
    ("healthid", "health_id"),
];

/// Where a raw key lands on a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    Id,
    Field(&'static str),
    Identifier(&'static str),
    Attribute(String),
}

/// Lowercase a key and drop quotes and separators
pub fn canonical_key(raw: &str) -> String {
    raw.chars()
        .filter(|&c| !matches!(c, '"' | '\'' | '_' | '-' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve a raw key against the alias tables
pub fn resolve_key(raw: &str) -> FieldTarget {
    let key = canonical_key(raw);

    if ID_ALIASES.contains(&key.as_str()) {
        return FieldTarget::Id;
    }
    if let Some(&(_, field)) = FIELD_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return FieldTarget::Field(field);
    }
    if let Some(&(_, id_type)) = IDENTIFIER_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return FieldTarget::Identifier(id_type);
    }

    FieldTarget::Attribute(raw.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
}

/// Build a record from key/value pairs. Blank values are skipped.
pub fn record_from_pairs<K, V, I>(pairs: I) -> Result<Record, MatchingError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut id: Option<String> = None;
    let mut record = Record::default();

    for (key, value) in pairs {
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }

        match resolve_key(key.as_ref()) {
            FieldTarget::Id => id = Some(value.to_string()),
            FieldTarget::Field(field) => record.set_field(field, value),
            FieldTarget::Identifier(id_type) => {
                record = record.with_identifier(id_type, value);
            }
            FieldTarget::Attribute(name) => {
                if name.is_empty() {
                    debug!(value, "Skipping value with an empty key");
                    continue;
                }
                record.attributes.insert(name, value.to_string());
            }
        }
    }

    record.id = id.ok_or_else(|| MatchingError::InvalidRecord("row has no id".to_string()))?;
    Ok(record)
}

/// Build a record from a JSON object. Numbers and booleans are read as text;
/// nested values are ignored.
pub fn record_from_json(value: &Value) -> Result<Record, MatchingError> {
    let object = value
        .as_object()
        .ok_or_else(|| MatchingError::InvalidRecord("expected a JSON object".to_string()))?;

    let pairs = object.iter().filter_map(|(key, value)| {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        Some((key.as_str(), text))
    });

    record_from_pairs(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key("First_Name"), "firstname");
        assert_eq!(canonical_key("\"firstName\""), "firstname");
        assert_eq!(canonical_key("date-of.birth"), "dateofbirth");
    }

    #[test]
    fn test_resolve_key() {
        assert_eq!(resolve_key("fname"), FieldTarget::Field(FIRST_NAME));
        assert_eq!(resolve_key("Surname"), FieldTarget::Field(LAST_NAME));
        assert_eq!(resolve_key("Record ID"), FieldTarget::Id);
        assert_eq!(resolve_key("National_ID"), FieldTarget::Identifier("national_id"));
        assert_eq!(resolve_key(" \"Kebele\" "), FieldTarget::Attribute("Kebele".to_string()));
    }

    #[test]
    fn test_record_from_pairs() {
        let record = record_from_pairs([
            ("ID", "r-1"),
            ("firstName", "Abebe"),
            ("\"Last Name\"", "Kebede"),
            ("DOB", "1980-05-01"),
            ("mobile", "0911 234 567"),
            ("MRN", "A-100"),
            ("kebele", "03"),
            ("house_no", "12"),
            ("village", "  "),
        ])
        .unwrap();

        assert_eq!(record.id, "r-1");
        assert_eq!(record.text(FIRST_NAME), Some("Abebe"));
        assert_eq!(record.text(LAST_NAME), Some("Kebede"));
        assert_eq!(record.text(BIRTH_DATE), Some("1980-05-01"));
        assert_eq!(record.text(PHONE), Some("0911 234 567"));
        assert_eq!(record.text("kebele"), Some("03"));
        assert_eq!(record.text(HOUSE_NUMBER), Some("12"));
        assert_eq!(record.text(VILLAGE), None);
        assert_eq!(record.identifiers.len(), 1);
        assert_eq!(record.identifiers[0].id_type, "mrn");
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let result = record_from_pairs([("first_name", "Abebe")]);
        assert!(matches!(result, Err(MatchingError::InvalidRecord(_))));
    }

    #[test]
    fn test_record_from_json() {
        let record = record_from_json(&json!({
            "id": 42,
            "given_name": "Almaz",
            "sex": "F",
            "tags": ["ignored"]
        }))
        .unwrap();

        assert_eq!(record.id, "42");
        assert_eq!(record.text(FIRST_NAME), Some("Almaz"));
        assert_eq!(record.text(GENDER), Some("F"));
        assert!(record.attributes.is_empty());

        assert!(record_from_json(&json!(["not", "an", "object"])).is_err());
    }
}
