//! Template language filter.

use hive_core::ValueMap;

use super::{FilterEvaluator, TEMPLATE_EVALUATOR};
use crate::error::FilterResult;
use crate::template::Template;

/// Evaluates filters written in the template language.
///
/// `{{test X}}` is shorthand for `{{if X}}true{{end}}`. Sources without it
/// are rendered as written. The filter passes when the rendered output is
/// exactly `true` after trimming whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFilter;

impl TemplateFilter {
    fn expand(source: &str) -> String {
        if source.contains("{{test") {
            format!("{}true{{{{end}}}}", source.replace("{{test", "{{if"))
        } else {
            source.to_string()
        }
    }
}

impl FilterEvaluator for TemplateFilter {
    fn name(&self) -> &str {
        TEMPLATE_EVALUATOR
    }

    fn description(&self) -> &str {
        "Go-style text template filter"
    }

    fn passes(&self, data: &ValueMap, source: &str) -> FilterResult<bool> {
        let template = Template::parse("filter", &Self::expand(source))?;
        let output = template.render(data)?;
        Ok(output.trim() == "true")
    }
}
