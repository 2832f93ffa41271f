//! Output formatting for query outcomes.
//!
//! Renders an [`ExecutionOutcome`] as the plain-text report returned by the
//! query tool. Formatting is pure: the same outcome always renders to the
//! same text.

use crate::db::Row;
use crate::error::ErrorKind;
use crate::models::{ExecutionOutcome, QueryFailure, QuerySuccess};
use serde_json::Value as JsonValue;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Widest a single cell may render, in terminal columns.
pub const MAX_CELL_WIDTH: usize = 50;

const ELLIPSIS: &str = "...";

/// Render an outcome as the tool's text response.
pub fn format_outcome(outcome: &ExecutionOutcome) -> String {
    match outcome {
        ExecutionOutcome::Success(success) => format_success(success),
        ExecutionOutcome::Failure(failure) => format_failure(failure),
    }
}

fn format_success(result: &QuerySuccess) -> String {
    let mut lines = vec![
        "✅ Query executed successfully".to_string(),
        String::new(),
        format!("SQL: {}", result.sql),
        String::new(),
        format!(
            "Context: Database={}, Schema={}, Warehouse={}",
            result.context.database, result.context.schema, result.context.warehouse
        ),
        String::new(),
    ];

    lines.push(match result.affected_rows {
        Some(affected) => format!("Rows affected: {affected}"),
        None if result.truncated => format!(
            "Results: {} rows (showing first {}), {} columns",
            result.total_rows, result.row_count, result.column_count
        ),
        None => format!(
            "Results: {} rows, {} columns",
            result.row_count, result.column_count
        ),
    });

    lines.push(String::new());
    lines.push("Data:".to_string());

    match render_table(&result.columns, &result.numeric_columns, &result.rows) {
        Ok(table) => lines.push(table.trim_end().to_string()),
        Err(reason) => {
            tracing::warn!(reason = %reason, "Error formatting results");
            lines.push("Error formatting results for display.".to_string());
            lines.push(format!(
                "Data shape: ({}, {})",
                result.rows.len(),
                result.columns.len()
            ));
            lines.push("Raw data available but too complex to display.".to_string());
        }
    }

    if result.truncated {
        lines.push(String::new());
        lines.push(format!(
            "⚠️  Results truncated. Showing first {} rows only.",
            result.row_count
        ));
        lines.push(
            "Consider adding LIMIT clause or filtering your query for better performance."
                .to_string(),
        );
    }

    lines.join("\n")
}

fn format_failure(failure: &QueryFailure) -> String {
    let mut lines = vec![
        format!("❌ Query failed ({})", failure.kind),
        String::new(),
        format!("SQL: {}", failure.sql),
        String::new(),
        format!("Error: {}", failure.message),
    ];

    let tips: &[&str] = match failure.kind {
        ErrorKind::Sql => &[
            "- Check your SQL syntax",
            "- Verify table and column names",
            "- Ensure you have proper permissions",
        ],
        ErrorKind::Database => &[
            "- Check your connection settings",
            "- Verify database/schema exists",
            "- Ensure warehouse is running",
        ],
        ErrorKind::Config | ErrorKind::System => &[],
    };
    if !tips.is_empty() {
        lines.push(String::new());
        lines.push("💡 Tips:".to_string());
        lines.extend(tips.iter().map(|tip| tip.to_string()));
    }

    lines.join("\n")
}

pub fn format_value(value: &JsonValue) -> String {
    let text = match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    };
    text.replace('\r', "\\r").replace('\n', "\\n")
}

/// Shorten `text` to at most `max` display columns, ending in `...` when cut.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(ELLIPSIS.len());
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push_str(ELLIPSIS);
    out
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right_align {
        format!("{fill}{text}")
    } else {
        format!("{text}{fill}")
    }
}

fn center(text: &str, width: usize) -> String {
    let gap = width.saturating_sub(text.width());
    let left = gap / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(gap - left))
}

/// Format rows as an ASCII grid table.
///
/// Cells of `numeric` columns, and JSON numbers anywhere, are right-aligned.
/// Fails when a row does not have one cell per column.
pub fn render_table(
    columns: &[String],
    numeric: &[bool],
    rows: &[Row],
) -> Result<String, String> {
    if columns.is_empty() {
        return Ok("Empty set".to_string());
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
        return Err(format!(
            "row {} has {} cells but the result has {} columns",
            i,
            row.len(),
            columns.len()
        ));
    }

    let headers: Vec<String> = columns
        .iter()
        .map(|c| truncate_to_width(&format_value(&JsonValue::String(c.clone())), MAX_CELL_WIDTH))
        .collect();
    let cells: Vec<Vec<(String, bool)>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, v)| {
                    let right_align = numeric.get(i).copied().unwrap_or(false)
                        || matches!(v, JsonValue::Number(_));
                    (truncate_to_width(&format_value(v), MAX_CELL_WIDTH), right_align)
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in &cells {
        for (i, (text, _)) in row.iter().enumerate() {
            widths[i] = widths[i].max(text.width());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("| {} ", center(h, *w)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in &cells {
        let line: String = row
            .iter()
            .zip(&widths)
            .map(|((text, numeric), w)| format!("| {} ", pad(text, *w, *numeric)))
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }

    output.push_str(&separator);
    Ok(output)
}
