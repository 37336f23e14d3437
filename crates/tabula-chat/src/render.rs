//! HTML preview of a result table for the chat transcript.

use std::fmt::Write;

use tabula_core::types::{Table, Value};

/// Render the first `max_rows` rows of `table` as an HTML table.
///
/// When rows are cut off a notice with the full row count follows the table.
pub fn table_to_html(table: &Table, max_rows: usize) -> String {
    let shown = table.head(max_rows);
    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n");
    for col in shown.columns() {
        let _ = writeln!(html, "      <th>{}</th>", escape(&col.name));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for row in shown.rows() {
        html.push_str("    <tr>\n");
        for value in row {
            let _ = writeln!(html, "      <td>{}</td>", escape(&cell(value)));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>");

    if shown.num_rows() != table.num_rows() {
        let _ = write!(
            html,
            "\n\n(Showing only the first {} rows out of {}.)\n",
            max_rows,
            table.num_rows()
        );
    }
    html
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::types::{Column, DataType};

    fn numbers(n: i64) -> Table {
        Table::new(
            vec![Column::new("n", DataType::Integer)],
            (1..=n).map(|i| vec![Value::Integer(i)]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_small_table_has_no_notice() {
        let html = table_to_html(&numbers(3), 5);
        assert!(html.contains("<th>n</th>"));
        assert_eq!(html.matches("<td>").count(), 3);
        assert!(!html.contains("Showing only"));
        assert!(html.ends_with("</table>"));
    }

    #[test]
    fn test_exact_limit_has_no_notice() {
        let html = table_to_html(&numbers(5), 5);
        assert_eq!(html.matches("<td>").count(), 5);
        assert!(!html.contains("Showing only"));
    }

    #[test]
    fn test_truncated_table_has_notice() {
        let html = table_to_html(&numbers(891), 5);
        assert_eq!(html.matches("<td>").count(), 5);
        assert!(html.ends_with("\n\n(Showing only the first 5 rows out of 891.)\n"));
    }

    #[test]
    fn test_cells_are_escaped() {
        let table = Table::new(
            vec![Column::new("a<b", DataType::Text)],
            vec![vec!["Tom & \"Jerry\"".into()], vec![Value::Null]],
        )
        .unwrap();
        let html = table_to_html(&table, 5);
        assert!(html.contains("<th>a&lt;b</th>"));
        assert!(html.contains("<td>Tom &amp; &quot;Jerry&quot;</td>"));
        assert!(html.contains("<td>None</td>"));
    }

    #[test]
    fn test_empty_result_keeps_header() {
        let table = Table::empty(vec![Column::new("name", DataType::Text)]);
        let html = table_to_html(&table, 5);
        assert!(html.contains("<th>name</th>"));
        assert!(!html.contains("<td>"));
    }
}
