//! Dictionary schema parser.
//!
//! The input is a nested definition:
//!
//! ```text
//! <schema id="MDict">
//!     <complexType id="A">
//!         <element id="custId" longname="客户ID" type="..." dbname="cust_id"/>
//!     </complexType>
//! </schema>
//! ```
//!
//! Every `element` becomes a [`FieldRecord`] keyed by its `longname`, with
//! `ref = schemaId.groupId.elementId`. Later elements win on duplicate names.

use crate::{DictError, DictionaryTable, FieldRecord, Result};
use log::{debug, info, trace, warn};
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::HashMap;

const SCHEMA_TAG: &str = "schema";
const GROUP_TAG: &str = "complexType";
const FIELD_TAG: &str = "element";

/// Parse raw dictionary bytes into a fresh table.
pub fn parse_schema(raw: &[u8]) -> Result<DictionaryTable> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| DictError::MalformedSchema(format!("input is not UTF-8: {e}")))?;
    let text = text.trim_start_matches('\u{feff}');

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(text, options)?;

    let schema = document
        .descendants()
        .find(|node| node.has_tag_name(SCHEMA_TAG))
        .ok_or_else(|| {
            DictError::MalformedSchema(format!("missing <{SCHEMA_TAG}> container element"))
        })?;
    let schema_id = attr(&schema, "id");
    debug!("Parsing schema {schema_id}");

    let mut fields: HashMap<String, FieldRecord> = HashMap::new();
    let mut duplicates = 0usize;

    for group in schema
        .descendants()
        .filter(|node| node.has_tag_name(GROUP_TAG))
    {
        let group_id = attr(&group, "id");
        debug!("Parsing group {group_id}");

        for element in group
            .descendants()
            .filter(|node| node.has_tag_name(FIELD_TAG))
        {
            let record = FieldRecord::new(
                schema_id,
                group_id,
                attr(&element, "id"),
                attr(&element, "longname"),
                attr(&element, "type"),
                attr(&element, "dbname"),
            );
            trace!("Parsed field {} -> {}", record.longname, record.reference);

            if let Some(previous) = fields.insert(record.longname.clone(), record) {
                duplicates += 1;
                debug!(
                    "Duplicate display name {}; {} overwritten",
                    previous.longname, previous.reference
                );
            }
        }
    }

    if duplicates > 0 {
        warn!("Schema {schema_id}: {duplicates} duplicate display names overwritten");
    }
    info!("Parsed dictionary schema {schema_id}: {} fields", fields.len());

    Ok(DictionaryTable::new(
        schema_id.to_string(),
        fields,
        duplicates,
    ))
}

// Absent attributes read as empty strings.
fn attr<'a>(node: &Node<'a, '_>, name: &str) -> &'a str {
    node.attribute(name).unwrap_or("")
}
