//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};
use pixelprops_core::field::{BuildField, FieldValue};

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Table of identity fields in `BuildField` declaration order.
pub fn fields_table<'a>(fields: impl IntoIterator<Item = (BuildField, &'a FieldValue)>) -> Table {
    let mut rows: Vec<(BuildField, &FieldValue)> = fields.into_iter().collect();
    rows.sort_by_key(|(field, _)| *field);

    let mut table = new_table(&["FIELD", "VALUE"]);
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value.to_string()]);
    }
    table
}

/// Print `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render an empty value as `-`.
pub fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
