use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One dictionary entry: a business display name and its technical identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Short field code (e.g. `custId`)
    pub id: String,
    /// Business display name, the cache key
    pub longname: String,
    /// Semantic type reference (e.g. `MBaseType.U_KE_HU_BIAN_HAO`)
    #[serde(rename = "type")]
    pub field_type: String,
    /// Physical column name
    pub dbname: String,
    /// Fully-qualified reference, `schema.group.id`
    #[serde(rename = "ref")]
    pub reference: String,
}

impl FieldRecord {
    pub fn new(
        schema_id: &str,
        group_id: &str,
        id: impl Into<String>,
        longname: impl Into<String>,
        field_type: impl Into<String>,
        dbname: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let reference = format!("{schema_id}.{group_id}.{id}");
        Self {
            id,
            longname: longname.into(),
            field_type: field_type.into(),
            dbname: dbname.into(),
            reference,
        }
    }
}

/// A complete mapping from display name to field record, produced by exactly
/// one parse pass and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryTable {
    schema_id: String,
    fields: HashMap<String, FieldRecord>,
    duplicates: usize,
}

impl DictionaryTable {
    pub(crate) fn new(
        schema_id: String,
        fields: HashMap<String, FieldRecord>,
        duplicates: usize,
    ) -> Self {
        Self {
            schema_id,
            fields,
            duplicates,
        }
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn get(&self, longname: &str) -> Option<&FieldRecord> {
        self.fields.get(longname)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of field elements whose display name overwrote an earlier one.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Display names in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.fields.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldRecord)> {
        self.fields.iter()
    }
}
