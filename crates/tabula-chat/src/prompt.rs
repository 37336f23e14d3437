//! System prompt rendering.
//!
//! Templates use a small mustache subset:
//! - `{{key}}` (or `{{{key}}}`) inserts a value, empty when absent
//! - `{{#key}}...{{/key}}` keeps its body only when the value is present and non-blank
//! - `{{^key}}...{{/key}}` keeps its body only when it is not
//!
//! Section tags on a line of their own take the line break with them.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use tabula_core::error::Result;
use tabula_source::DataSource;

/// Built-in template.
pub const DEFAULT_TEMPLATE: &str = include_str!("prompt/prompt.md");

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{?\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}?\}\}").expect("Invalid variable regex")
});

static SECTION_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([#^])\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("Invalid section regex")
});

/// Optional inputs to the system prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInputs<'a> {
    pub data_description: Option<&'a str>,
    pub extra_instructions: Option<&'a str>,
    /// Replaces [`DEFAULT_TEMPLATE`].
    pub template: Option<&'a str>,
}

/// Render the system prompt for `source`.
///
/// Introspects the source's schema, which fails for a missing table.
pub fn system_prompt(
    source: &dyn DataSource,
    categorical_threshold: usize,
    inputs: PromptInputs<'_>,
) -> Result<String> {
    let schema = source.schema(categorical_threshold)?;

    let mut values = HashMap::new();
    values.insert("db_engine", source.db_engine().to_string());
    values.insert("schema", schema.to_string());
    if let Some(text) = inputs.data_description {
        values.insert("data_description", text.to_string());
    }
    if let Some(text) = inputs.extra_instructions {
        values.insert("extra_instructions", text.to_string());
    }

    let prompt = render_template(inputs.template.unwrap_or(DEFAULT_TEMPLATE), &values);
    debug!(
        chars = prompt.len(),
        columns = schema.columns.len(),
        "System prompt rendered"
    );
    Ok(prompt)
}

/// Render `template` against `values`.
pub fn render_template(template: &str, values: &HashMap<&str, String>) -> String {
    let expanded = render_sections(template, values);
    VARIABLE
        .replace_all(&expanded, |caps: &regex::Captures<'_>| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn render_sections(template: &str, values: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = SECTION_OPEN.captures(rest) {
        let Some(tag) = open.get(0) else { break };
        let inverted = &open[1] == "^";
        let key = open[2].to_string();
        let close_tag = format!("{{{{/{}}}}}", key);

        let body_start = skip_standalone(rest, tag.start(), tag.end());
        let Some(close_rel) = rest[body_start..].find(&close_tag) else {
            // Unclosed section: leave the remaining text untouched.
            break;
        };
        let close_start = body_start + close_rel;
        let close_end = close_start + close_tag.len();
        let after = skip_standalone(rest, close_start, close_end);

        out.push_str(&rest[..tag.start()]);
        let present = values.get(key.as_str()).is_some_and(|v| !v.trim().is_empty());
        if present != inverted {
            out.push_str(&render_sections(&rest[body_start..close_start], values));
        }
        rest = &rest[after..];
    }

    out.push_str(rest);
    out
}

/// End offset of a tag, extended past its line break when the tag sits
/// alone on its line.
fn skip_standalone(text: &str, start: usize, end: usize) -> usize {
    let line_start = start == 0 || text[..start].ends_with('\n');
    if line_start && text[end..].starts_with('\n') {
        end + 1
    } else {
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::types::{Column, DataType, Table, Value};
    use tabula_source::InMemoryTable;

    fn values(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    fn penguins() -> InMemoryTable {
        let table = Table::new(
            vec![
                Column::new("species", DataType::Text),
                Column::new("body_mass_g", DataType::Integer),
            ],
            vec![
                vec!["Adelie".into(), Value::Integer(3750)],
                vec!["Gentoo".into(), Value::Integer(5400)],
            ],
        )
        .unwrap();
        InMemoryTable::new(table, "penguins").unwrap()
    }

    #[test]
    fn test_variables() {
        let out = render_template(
            "Engine: {{db_engine}}, raw: {{{ db_engine }}}, missing: [{{nope}}]",
            &values(&[("db_engine", "SQLite")]),
        );
        assert_eq!(out, "Engine: SQLite, raw: SQLite, missing: []");
    }

    #[test]
    fn test_section_present() {
        let out = render_template(
            "a{{#desc}}[{{desc}}]{{/desc}}b",
            &values(&[("desc", "penguins")]),
        );
        assert_eq!(out, "a[penguins]b");
    }

    #[test]
    fn test_section_blank_or_absent() {
        let tpl = "a{{#desc}}[{{desc}}]{{/desc}}b";
        assert_eq!(render_template(tpl, &values(&[("desc", "   ")])), "ab");
        assert_eq!(render_template(tpl, &values(&[])), "ab");
    }

    #[test]
    fn test_inverted_section() {
        let tpl = "{{^desc}}no description{{/desc}}";
        assert_eq!(render_template(tpl, &values(&[])), "no description");
        assert_eq!(render_template(tpl, &values(&[("desc", "x")])), "");
    }

    #[test]
    fn test_standalone_section_lines_removed() {
        let tpl = "top\n{{#desc}}\n{{desc}}\n{{/desc}}\nbottom\n";
        assert_eq!(
            render_template(tpl, &values(&[("desc", "middle")])),
            "top\nmiddle\nbottom\n"
        );
        assert_eq!(render_template(tpl, &values(&[])), "top\nbottom\n");
    }

    #[test]
    fn test_nested_sections() {
        let tpl = "{{#a}}A{{#b}}B{{/b}}{{/a}}";
        assert_eq!(render_template(tpl, &values(&[("a", "1"), ("b", "1")])), "AB");
        assert_eq!(render_template(tpl, &values(&[("a", "1")])), "A");
        assert_eq!(render_template(tpl, &values(&[("b", "1")])), "");
    }

    #[test]
    fn test_unclosed_section_left_alone() {
        let out = render_template("x {{#a}} y", &values(&[("a", "1")]));
        assert_eq!(out, "x {{#a}} y");
    }

    #[test]
    fn test_default_prompt_includes_schema_and_engine() {
        let prompt = system_prompt(&penguins(), 10, PromptInputs::default()).unwrap();
        assert!(prompt.contains("SQLite SQL"));
        assert!(prompt.contains("Table: penguins\nColumns:\n- species (TEXT)"));
        assert!(prompt.contains("Categorical values: 'Adelie', 'Gentoo'"));
        assert!(!prompt.contains("<DATA_DESCRIPTION>"));
        assert!(!prompt.contains("Additional instructions"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_default_prompt_optional_sections() {
        let inputs = PromptInputs {
            data_description: Some("Palmer penguins, 2007-2009."),
            extra_instructions: Some("Answer in French."),
            template: None,
        };
        let prompt = system_prompt(&penguins(), 10, inputs).unwrap();
        assert!(prompt.contains("<DATA_DESCRIPTION>\nPalmer penguins, 2007-2009.\n</DATA_DESCRIPTION>"));
        assert!(prompt.contains("## Additional instructions\n\nAnswer in French."));
    }

    #[test]
    fn test_custom_template() {
        let inputs = PromptInputs {
            template: Some("{{db_engine}} / {{schema}}"),
            ..PromptInputs::default()
        };
        let prompt = system_prompt(&penguins(), 0, inputs).unwrap();
        assert!(prompt.starts_with("SQLite / Table: penguins"));
        assert!(!prompt.contains("Categorical values"));
    }
}
