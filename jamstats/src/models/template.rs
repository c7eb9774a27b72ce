use std::sync::OnceLock;

use regex::Regex;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"))
}

/// Placeholder names in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    placeholder_pattern()
        .captures_iter(template)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect()
}

/// Check that every placeholder is one of `fields` and that no stray braces remain.
pub fn validate_template(template: &str, fields: &[&str]) -> Result<(), String> {
    for name in placeholders(template) {
        if !fields.contains(&name) {
            return Err(format!(
                "template placeholder {{{name}}} is not a field this intent produces"
            ));
        }
    }
    let stripped = placeholder_pattern().replace_all(template, "");
    if stripped.contains('{') || stripped.contains('}') {
        return Err("template has an unbalanced or malformed placeholder".to_string());
    }
    Ok(())
}

/// Substitute every placeholder using `lookup`. Returns the first name
/// `lookup` has no value for.
pub fn render_template<F>(template: &str, lookup: F) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for cap in placeholder_pattern().captures_iter(template) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        let value = lookup(name.as_str()).ok_or_else(|| name.as_str().to_string())?;
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}
