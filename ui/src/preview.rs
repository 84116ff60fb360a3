use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use db::Record;
use serde_json::Value;

/// Renders records as a table. Columns follow the first record.
#[must_use]
pub fn table(records: &[Record]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let Some(first) = records.first() else {
        return table;
    };

    table.set_header(first.keys().cloned().collect::<Vec<_>>());
    for record in records {
        table.add_row(
            first
                .keys()
                .map(|column| cell(record.get(column)))
                .collect::<Vec<_>>(),
        );
    }

    table
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
