/// `{{name}}` template-variable substitution.
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Result of rendering a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders with no value; they are left in the text untouched.
    pub missing: Vec<String>,
}

/// Replace every `{{name}}` with `vars[name]`.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> Rendered {
    let mut missing = BTreeSet::new();
    let text = PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => (*value).to_string(),
            None => {
                missing.insert(caps[1].to_string());
                caps[0].to_string()
            }
        })
        .into_owned();

    Rendered {
        text,
        missing: missing.into_iter().collect(),
    }
}

/// Names of all placeholders in `template`, deduplicated and sorted.
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all() {
        let vars = HashMap::from([("name", "widget"), ("price", "19.95")]);
        let out = render("{{name}} costs {{ price }} ({{name}})", &vars);
        assert_eq!(out.text, "widget costs 19.95 (widget)");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn test_render_keeps_unknown() {
        let vars = HashMap::from([("a", "1")]);
        let out = render("{{a}} {{b}} {{b}}", &vars);
        assert_eq!(out.text, "1 {{b}} {{b}}");
        assert_eq!(out.missing, vec!["b"]);
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let vars = HashMap::from([("a", "{{b}}"), ("b", "x")]);
        assert_eq!(render("{{a}}", &vars).text, "{{b}}");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{{question}} {{ context }} {{question}} {{ 1bad }}"),
            vec!["context", "question"]
        );
    }
}
