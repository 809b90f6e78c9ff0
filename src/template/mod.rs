//! Template registry and prompt resolution
//!
//! Templates are named, parameterized prompt-shaping units. The registry is
//! built once, immutable afterwards, and explicitly passed to whichever
//! client needs it. Resolution is pure text substitution with no I/O, safe to
//! call repeatedly and concurrently.

mod builtin;

pub use builtin::builtin_registry;

use crate::error::{AiError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Matches ${name} placeholders in template bodies
static SLOT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid slot pattern"));

/// A scalar parameter value supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    /// Textual rendering used during slot substitution
    pub fn render(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Float(x) => x.to_string(),
            ParamValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Parameter bag passed from the caller through to resolution
pub type ParamBag = HashMap<String, ParamValue>;

/// A named prompt template with declared required parameter slots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Stable identifier callers reference
    pub id: String,
    /// Slots that must be present in the parameter bag
    pub required_params: Vec<String>,
    /// Prompt body with ${name} placeholders
    pub body: String,
}

impl Template {
    pub fn new(
        id: impl Into<String>,
        required_params: &[&str],
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            required_params: required_params.iter().map(|s| s.to_string()).collect(),
            body: body.into(),
        }
    }

    /// Substitute the parameter bag into the body.
    ///
    /// Missing required slots fail with a validation error. Placeholders with
    /// no supplied value substitute empty (optional context), and extra
    /// parameters without a matching slot are ignored.
    fn render(&self, parameters: &ParamBag) -> Result<String> {
        for required in &self.required_params {
            if !parameters.contains_key(required) {
                return Err(AiError::validation(format!(
                    "template '{}' missing required parameter: {}",
                    self.id, required
                )));
            }
        }

        let rendered = SLOT_REGEX.replace_all(&self.body, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            parameters
                .get(name)
                .map(|v| v.render())
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

/// Immutable mapping from template id to template, built once at startup
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

/// Builder for [`TemplateRegistry`]
#[derive(Debug, Default)]
pub struct TemplateRegistryBuilder {
    templates: HashMap<String, Template>,
}

impl TemplateRegistryBuilder {
    pub fn register(mut self, template: Template) -> Self {
        self.templates.insert(template.id.clone(), template);
        self
    }

    pub fn build(self) -> TemplateRegistry {
        TemplateRegistry {
            templates: self.templates,
        }
    }
}

impl TemplateRegistry {
    pub fn builder() -> TemplateRegistryBuilder {
        TemplateRegistryBuilder::default()
    }

    /// Look up a template by id
    pub fn get(&self, template_id: &str) -> Option<&Template> {
        self.templates.get(template_id)
    }

    /// Registered template ids, unordered
    pub fn template_ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|s| s.as_str())
    }

    /// Resolve a template id and parameter bag into a concrete prompt string.
    ///
    /// Fails with a validation error if the id is unknown or a required
    /// parameter is absent. Deterministic: identical inputs always yield the
    /// identical prompt.
    pub fn resolve(&self, template_id: &str, parameters: &ParamBag) -> Result<String> {
        let template = self.templates.get(template_id).ok_or_else(|| {
            AiError::validation(format!("unknown template: {template_id}"))
        })?;
        template.render(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::builder()
            .register(Template::new(
                "greeting",
                &["name"],
                "Hello ${name}, welcome to ${place}.",
            ))
            .build()
    }

    fn params(pairs: &[(&str, &str)]) -> ParamBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ParamValue::from(*v)))
            .collect()
    }

    #[test]
    fn resolves_with_all_slots_filled() {
        let prompt = registry()
            .resolve("greeting", &params(&[("name", "Ada"), ("place", "the lab")]))
            .unwrap();
        assert_eq!(prompt, "Hello Ada, welcome to the lab.");
    }

    #[test]
    fn optional_slots_substitute_empty() {
        let prompt = registry()
            .resolve("greeting", &params(&[("name", "Ada")]))
            .unwrap();
        assert_eq!(prompt, "Hello Ada, welcome to .");
    }

    #[test]
    fn extra_parameters_are_ignored() {
        let prompt = registry()
            .resolve(
                "greeting",
                &params(&[("name", "Ada"), ("place", "x"), ("references", "many")]),
            )
            .unwrap();
        assert_eq!(prompt, "Hello Ada, welcome to x.");
    }

    #[test]
    fn missing_required_parameter_is_validation() {
        let err = registry()
            .resolve("greeting", &params(&[("place", "the lab")]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("name"));
    }

    #[test]
    fn unknown_template_is_validation() {
        let err = registry().resolve("nope", &ParamBag::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn resolution_is_deterministic() {
        let bag = params(&[("name", "Ada"), ("place", "the lab")]);
        let reg = registry();
        let first = reg.resolve("greeting", &bag).unwrap();
        let second = reg.resolve("greeting", &bag).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn numeric_and_bool_values_render_textually() {
        let reg = TemplateRegistry::builder()
            .register(Template::new("counts", &["n"], "exactly ${n} items (${flag})"))
            .build();
        let mut bag = ParamBag::new();
        bag.insert("n".to_string(), ParamValue::Int(7));
        bag.insert("flag".to_string(), ParamValue::Bool(true));
        assert_eq!(
            reg.resolve("counts", &bag).unwrap(),
            "exactly 7 items (true)"
        );
    }
}
