// Result rendering for the shell
// Draws result sets as boxed tables

use crate::storage::Row;

/// Render rows under their column names as a boxed table
pub fn table(column_names: &[String], rows: &[Row]) -> String {
    if rows.is_empty() {
        return "No rows found".to_string();
    }

    let mut widths: Vec<usize> = column_names.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, value) in row.values.iter().enumerate() {
            let len = value.to_string().chars().count();
            match widths.get_mut(i) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    let mut result = String::new();

    result.push_str(&border(&widths, '┌', '┬', '┐'));
    result.push_str(&line(
        &widths,
        column_names.iter().map(String::as_str).collect(),
    ));
    result.push_str(&border(&widths, '├', '┼', '┤'));
    for row in rows {
        let cells: Vec<String> = row.values.iter().map(ToString::to_string).collect();
        result.push_str(&line(&widths, cells.iter().map(String::as_str).collect()));
    }
    result.push_str(&border(&widths, '└', '┴', '┘'));

    result.push_str(&format!("\n{} row(s) returned", rows.len()));
    result
}

/// Render rows as a JSON array of objects keyed by column name
pub fn json(column_names: &[String], rows: &[Row]) -> serde_json::Value {
    serde_json::Value::Array(
        rows.iter()
            .map(|row| {
                serde_json::Value::Object(
                    column_names
                        .iter()
                        .cloned()
                        .zip(row.values.iter().map(|v| v.to_json()))
                        .collect(),
                )
            })
            .collect(),
    )
}

fn border(widths: &[usize], left: char, middle: char, right: char) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{}{}{}\n", left, segments.join(&middle.to_string()), right)
}

fn line(widths: &[usize], cells: Vec<&str>) -> String {
    let mut result = String::from("│");
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).copied().unwrap_or("");
        let padding = width - cell.chars().count();
        result.push_str(&format!(" {}{} │", cell, " ".repeat(padding)));
    }
    result.push('\n');
    result
}
