//! Text templates used for action options and filters.
//!
//! The syntax is the familiar `{{ }}` action language: field access
//! (`{{.user.name}}`), pipelines (`{{.text | ToUpper}}`), `if`/`else if`/
//! `else`, `range`, comments and `{{-`/`-}}` whitespace trimming. Missing
//! fields evaluate to nothing rather than failing.
//!
//! ```ignore
//! let out = hive_framework::template::render("hi {{.user}}", &data)?;
//! ```

mod exec;
mod funcs;
mod parse;

use hive_core::{Value, ValueMap};

use crate::error::TemplateResult;
use parse::Node;

/// A parsed template, reusable across renders.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(name: impl Into<String>, source: &str) -> TemplateResult<Self> {
        Ok(Self {
            name: name.into(),
            nodes: parse::parse(source)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renders the template with `data` as the dot value.
    pub fn render(&self, data: &ValueMap) -> TemplateResult<String> {
        self.render_value(&Value::Map(data.clone()))
    }

    pub fn render_value(&self, dot: &Value) -> TemplateResult<String> {
        let mut out = String::new();
        exec::render_nodes(&self.nodes, dot, &mut out)?;
        Ok(out)
    }
}

/// Parses and renders `source` in one step.
pub fn render(source: &str, data: &ValueMap) -> TemplateResult<String> {
    Template::parse("inline", source)?.render(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;

    fn data() -> ValueMap {
        let mut user = ValueMap::new();
        user.insert("name".into(), Value::from("Alice"));
        user.insert("age".into(), Value::Int(31));

        let mut map = ValueMap::new();
        map.insert("user".into(), Value::from("alice"));
        map.insert("text".into(), Value::from("  Hello World  "));
        map.insert("count".into(), Value::Int(3));
        map.insert("profile".into(), Value::Map(user));
        map.insert(
            "tags".into(),
            Value::from(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
        );
        map
    }

    #[test]
    fn test_field_substitution() {
        assert_eq!(render("hi {{.user}}", &data()).unwrap(), "hi alice");
        assert_eq!(render("{{.profile.name}}", &data()).unwrap(), "Alice");
        assert_eq!(render("[{{.missing}}]", &data()).unwrap(), "[<no value>]");
        assert_eq!(render("{{.missing.deeper}}", &data()).unwrap(), "<no value>");
    }

    #[test]
    fn test_conditionals() {
        let source = "{{if gt .count 5}}big{{else if eq .count 3}}three{{else}}small{{end}}";
        assert_eq!(render(source, &data()).unwrap(), "three");
        assert_eq!(render("{{if .missing}}x{{else}}y{{end}}", &data()).unwrap(), "y");
        assert_eq!(
            render("{{if and .user (eq .profile.age 31)}}ok{{end}}", &data()).unwrap(),
            "ok"
        );
        assert_eq!(render("{{if not .user}}no{{end}}", &data()).unwrap(), "");
    }

    #[test]
    fn test_range() {
        assert_eq!(render("{{range .tags}}<{{.}}>{{end}}", &data()).unwrap(), "<a><b><c>");
        assert_eq!(
            render("{{range .missing}}x{{else}}empty{{end}}", &data()).unwrap(),
            "empty"
        );
    }

    #[test]
    fn test_pipelines_and_helpers() {
        let d = data();
        assert_eq!(render("{{.text | TrimSpace | ToUpper}}", &d).unwrap(), "HELLO WORLD");
        assert_eq!(render("{{Left .user 3}}", &d).unwrap(), "ali");
        assert_eq!(render("{{Right .user 2}}", &d).unwrap(), "ce");
        assert_eq!(render("{{Mid .user 1 3}}", &d).unwrap(), "li");
        assert_eq!(render("{{Mid .user 2}}", &d).unwrap(), "ice");
        assert_eq!(render("{{Last (Split \"a,b,c\" \",\")}}", &d).unwrap(), "c");
        assert_eq!(render("{{Join .tags \"-\"}}", &d).unwrap(), "a-b-c");
        assert_eq!(render("{{Replace \"aaa\" \"a\" \"b\" 2}}", &d).unwrap(), "bba");
        assert_eq!(render("{{Replace \"aaa\" \"a\" \"b\" -1}}", &d).unwrap(), "bbb");
        assert_eq!(render("{{Title \"hello world\"}}", &d).unwrap(), "Hello World");
        assert_eq!(render("{{Trim \"xxhixx\" \"x\"}}", &d).unwrap(), "hi");
        assert_eq!(render("{{TrimPrefix .user \"al\"}}", &d).unwrap(), "ice");
        assert_eq!(render("{{Index .user \"ice\"}}", &d).unwrap(), "2");
        assert_eq!(render("{{len .tags}}", &d).unwrap(), "3");
        assert_eq!(render("{{index .tags 1}}", &d).unwrap(), "b");
        assert_eq!(render("{{Json .tags}}", &d).unwrap(), r#"["a","b","c"]"#);
    }

    #[test]
    fn test_matches() {
        let d = data();
        assert_eq!(render("{{Matches .user \"^a.*e$\"}}", &d).unwrap(), "true");
        assert_eq!(render("{{Matches .user \"^b\"}}", &d).unwrap(), "false");
        assert!(render("{{Matches .user \"(\"}}", &d).is_err());
    }

    #[test]
    fn test_errors() {
        let d = data();
        assert!(matches!(
            render("{{Nope .user}}", &d),
            Err(TemplateError::UnknownFunction(name)) if name == "Nope"
        ));
        assert!(matches!(
            render("{{Left .user}}", &d),
            Err(TemplateError::Arity { got: 1, .. })
        ));
        assert!(matches!(render("{{if .user}}x", &d), Err(TemplateError::Parse { .. })));
        assert!(render("{{.user.name}}", &d).is_err());
    }

    #[test]
    fn test_repeat_is_bounded() {
        let d = data();
        assert_eq!(render("{{Repeat \"ab\" 3}}", &d).unwrap(), "ababab");
        assert!(matches!(
            render("{{Repeat \"x\" 9999999999}}", &d),
            Err(TemplateError::Exec(_))
        ));
        assert!(matches!(
            render("{{Repeat \"x\" -1}}", &d),
            Err(TemplateError::Exec(_))
        ));
    }

    #[test]
    fn test_reuse_parsed_template() {
        let template = Template::parse("greeting", "hello {{.user}}").unwrap();
        assert_eq!(template.name(), "greeting");

        let mut other = ValueMap::new();
        other.insert("user".into(), Value::from("bob"));
        assert_eq!(template.render(&data()).unwrap(), "hello alice");
        assert_eq!(template.render(&other).unwrap(), "hello bob");
    }
}
