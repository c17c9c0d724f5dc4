//! Output formatting utilities for the CLI.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            warn!(error = %err, "failed to serialize command output");
            Value::Null
        })
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        match serde_json::to_string_pretty(&result.to_json()) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => warn!(error = %err, "failed to render command output"),
        }
    } else {
        println!("{}", result.to_human());
    }
}

/// A borderless table with upper-cased, left-aligned headers.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|header| Cell::new(header.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Join a list for a table cell, showing `-` for an empty list.
pub fn join_or_dash<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    }
}
