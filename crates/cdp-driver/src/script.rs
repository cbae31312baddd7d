//! Generated page scripts.
//!
//! Selectors and field tables are embedded as JSON string literals, which
//! keeps quoting in user-supplied selectors from breaking the script.

use serde_json::{json, Value};
use webharvest_core_types::FieldSpec;

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

pub(crate) fn count(selector: &str) -> String {
    format!(
        "document.querySelectorAll({}).length",
        js_string(selector)
    )
}

pub(crate) fn clear_value(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (el) {{ el.value = ''; el.dispatchEvent(new Event('input', {{ bubbles: true }})); }} }})()",
        sel = js_string(selector)
    )
}

/// One record per element matching `selector`. A field whose sub-selector
/// matches nothing, or whose attribute is absent, comes back as `null`.
pub(crate) fn extract(selector: &str, fields: &[FieldSpec]) -> String {
    let table: Vec<Value> = fields
        .iter()
        .map(|field| {
            json!({
                "name": field.name,
                "selector": field.selector,
                "attribute": field.attribute,
            })
        })
        .collect();
    format!(
        r#"(() => {{
  const fields = {table};
  return Array.from(document.querySelectorAll({sel})).map(el => {{
    const record = {{}};
    for (const field of fields) {{
      const child = field.selector ? el.querySelector(field.selector) : el;
      if (!child) {{ record[field.name] = null; continue; }}
      if (field.attribute) {{
        record[field.name] = child.getAttribute(field.attribute);
      }} else {{
        const text = child.textContent;
        record[field.name] = text === null ? null : text.trim();
      }}
    }}
    return record;
  }});
}})()"#,
        table = Value::Array(table),
        sel = js_string(selector)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, selector: &str, attribute: Option<&str>) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            selector: selector.into(),
            attribute: attribute.map(Into::into),
        }
    }

    #[test]
    fn selectors_with_quotes_are_escaped() {
        let script = count(r#"a[href="x"]"#);
        assert!(script.contains(r#""a[href=\"x\"]""#));
    }

    #[test]
    fn count_queries_all_matches() {
        assert_eq!(
            count(".item"),
            r#"document.querySelectorAll(".item").length"#
        );
    }

    #[test]
    fn extract_embeds_the_field_table() {
        let script = extract(
            ".product",
            &[
                field("title", ".name", None),
                field("link", "a", Some("href")),
            ],
        );
        assert!(script.contains(r#""name":"title""#));
        assert!(script.contains(r#""attribute":"href""#));
        assert!(script.contains(r#""attribute":null"#));
        assert!(script.contains(r#"querySelectorAll(".product")"#));
    }

    #[test]
    fn extract_yields_null_for_missing_children() {
        let script = extract(".row", &[field("v", ".gone", None)]);
        assert!(script.contains("record[field.name] = null"));
        assert!(script.contains("text.trim()"));
    }

    #[test]
    fn clear_value_dispatches_an_input_event() {
        let script = clear_value("#q");
        assert!(script.contains(r##"document.querySelector("#q")"##));
        assert!(script.contains("new Event('input'"));
    }
}
