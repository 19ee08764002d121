//! Core types for record linkage

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical field names understood by the comparator registry
pub mod fields {
    pub const FIRST_NAME: &str = "first_name";
    pub const MIDDLE_NAME: &str = "middle_name";
    pub const LAST_NAME: &str = "last_name";
    pub const GENDER: &str = "gender";
    pub const BIRTH_DATE: &str = "birth_date";
    pub const VILLAGE: &str = "village";
    pub const SUB_VILLAGE: &str = "sub_village";
    pub const PHONE: &str = "phone";
    pub const HOUSEHOLD_HEAD: &str = "household_head";
    pub const COMMUNITY_LEADER: &str = "community_leader";
    pub const IDENTIFIERS: &str = "identifiers";
    pub const HOUSE_NUMBER: &str = "house_number";

    /// Birth date components scored independently by the probabilistic scorer
    pub const BIRTH_YEAR: &str = "birth_year";
    pub const BIRTH_MONTH: &str = "birth_month";
    pub const BIRTH_DAY: &str = "birth_day";
}

use fields::*;

/// A typed identifier attached to a record (national id, medical record number, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// Identifier scheme
    pub id_type: String,
    /// Identifier value
    pub value: String,
}

impl Identifier {
    pub fn new(id_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id_type: id_type.into(),
            value: value.into(),
        }
    }
}

/// One person-entity from either the source or the target collection.
///
/// Only `id` is required. Custom fields (regional administrative names,
/// house number, ...) live in `attributes` under their canonical name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique identifier
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// ISO `YYYY-MM-DD`, or a partial `YYYY` / `YYYY-MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_village: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub household_head: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_leader: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Identifier>,
    /// Extension fields keyed by canonical name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set a field by canonical name, builder style
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn with_identifier(mut self, id_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.push(Identifier::new(id_type, value));
        self
    }

    /// Set a field by canonical name. Unknown names go to `attributes`.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match name {
            FIRST_NAME => self.first_name = value,
            MIDDLE_NAME => self.middle_name = value,
            LAST_NAME => self.last_name = value,
            GENDER => self.gender = value,
            BIRTH_DATE => self.birth_date = value,
            VILLAGE => self.village = value,
            SUB_VILLAGE => self.sub_village = value,
            PHONE => self.phone = value,
            HOUSEHOLD_HEAD => self.household_head = value,
            COMMUNITY_LEADER => self.community_leader = value,
            _ => {
                if let Some(value) = value {
                    self.attributes.insert(name.to_string(), value);
                }
            }
        }
    }

    /// Text value of a field, `None` when absent or blank
    pub fn text(&self, name: &str) -> Option<&str> {
        let raw = match name {
            FIRST_NAME => self.first_name.as_deref(),
            MIDDLE_NAME => self.middle_name.as_deref(),
            LAST_NAME => self.last_name.as_deref(),
            GENDER => self.gender.as_deref(),
            BIRTH_DATE => self.birth_date.as_deref(),
            VILLAGE => self.village.as_deref(),
            SUB_VILLAGE => self.sub_village.as_deref(),
            PHONE => self.phone.as_deref(),
            HOUSEHOLD_HEAD => self.household_head.as_deref(),
            COMMUNITY_LEADER => self.community_leader.as_deref(),
            _ => self.attributes.get(name).map(String::as_str),
        };
        raw.filter(|value| !value.trim().is_empty())
    }

    /// Comparable value of a field, `None` when absent or blank
    pub fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        if name == IDENTIFIERS {
            let has_value = self
                .identifiers
                .iter()
                .any(|identifier| !identifier.value.trim().is_empty());
            return has_value.then_some(FieldValue::Identifiers(&self.identifiers));
        }
        self.text(name).map(FieldValue::Text)
    }
}

/// A borrowed field value handed to comparators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Identifiers(&'a [Identifier]),
}

/// Scoring algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Weighted sum of per-field similarity scores
    #[default]
    Deterministic,
    /// Fellegi-Sunter log-likelihood weights
    Probabilistic,
}

/// Score of one record pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Overall score (0 - 100)
    pub score: u8,
    /// Labels of fields that contributed to the match
    pub matched_on: Vec<String>,
    /// Per-field score (0 - 100) keyed by field name
    pub field_scores: BTreeMap<String, u8>,
}

impl ScoreBreakdown {
    /// Attach the scored target record
    pub fn into_candidate(self, record: Record) -> CandidateMatch {
        CandidateMatch {
            record,
            score: self.score,
            matched_on: self.matched_on,
            field_scores: self.field_scores,
        }
    }
}

/// A ranked target record proposed for one source record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    /// The target record
    pub record: Record,
    /// Match score (0 - 100)
    pub score: u8,
    /// Labels of fields that contributed to the match
    pub matched_on: Vec<String>,
    /// Per-field score (0 - 100) keyed by field name
    pub field_scores: BTreeMap<String, u8>,
}
