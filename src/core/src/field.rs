//! Device identity fields and typed field sets.
//!
//! A [`BuildField`] names one entry of the platform's build identity
//! (`Build.MODEL`, `Build.VERSION.SECURITY_PATCH`, ...). An
//! [`IdentityFieldSet`] is an ordered, immutable collection of field
//! overrides that can be handed to the applier in one piece.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed set of identity fields the engine knows how to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildField {
    Brand,
    Manufacturer,
    Id,
    Device,
    Product,
    Model,
    Fingerprint,
    Type,
    Tags,
    SecurityPatch,
    DeviceInitialSdkInt,
    /// Build time in epoch milliseconds, refreshed on every certification probe.
    Time,
    /// Real build incremental. Read-only on every platform we target.
    Incremental,
}

impl BuildField {
    /// Every field, in declaration order.
    pub const ALL: [BuildField; 13] = [
        BuildField::Brand,
        BuildField::Manufacturer,
        BuildField::Id,
        BuildField::Device,
        BuildField::Product,
        BuildField::Model,
        BuildField::Fingerprint,
        BuildField::Type,
        BuildField::Tags,
        BuildField::SecurityPatch,
        BuildField::DeviceInitialSdkInt,
        BuildField::Time,
        BuildField::Incremental,
    ];

    /// Platform name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brand => "BRAND",
            Self::Manufacturer => "MANUFACTURER",
            Self::Id => "ID",
            Self::Device => "DEVICE",
            Self::Product => "PRODUCT",
            Self::Model => "MODEL",
            Self::Fingerprint => "FINGERPRINT",
            Self::Type => "TYPE",
            Self::Tags => "TAGS",
            Self::SecurityPatch => "SECURITY_PATCH",
            Self::DeviceInitialSdkInt => "DEVICE_INITIAL_SDK_INT",
            Self::Time => "TIME",
            Self::Incremental => "INCREMENTAL",
        }
    }
}

impl std::fmt::Display for BuildField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BuildField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown build field: '{}'", s))
    }
}

/// Typed value of an identity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Str(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Ordered set of field overrides.
///
/// Built once through [`IdentityFieldSet::builder`] and never mutated after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityFieldSet {
    fields: BTreeMap<BuildField, FieldValue>,
}

impl IdentityFieldSet {
    pub fn builder() -> IdentityFieldSetBuilder {
        IdentityFieldSetBuilder::default()
    }

    pub fn get(&self, field: BuildField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn contains(&self, field: BuildField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BuildField, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`IdentityFieldSet`]. Later writes to the same field win.
#[derive(Debug, Default)]
pub struct IdentityFieldSetBuilder {
    fields: BTreeMap<BuildField, FieldValue>,
}

impl IdentityFieldSetBuilder {
    pub fn set(mut self, field: BuildField, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn set_if(self, cond: bool, field: BuildField, value: impl Into<FieldValue>) -> Self {
        if cond {
            self.set(field, value)
        } else {
            self
        }
    }

    pub fn build(self) -> IdentityFieldSet {
        IdentityFieldSet {
            fields: self.fields,
        }
    }
}
