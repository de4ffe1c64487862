//! Prompt templates with `{{var}}` substitution.

use std::collections::HashMap;
use tracing::debug;

/// A prompt template rendered against a chain input's variables.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Substitute every `{{name}}` placeholder with its variable value.
    /// A missing variable renders as empty and is logged at debug.
    pub fn render(&self, vars: &HashMap<String, String>) -> String {
        let mut output = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let name = after[..end].trim();
                    match vars.get(name) {
                        Some(value) => output.push_str(value),
                        None => {
                            debug!(var = %name, "Template variable missing, rendering empty");
                        }
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    // Unterminated placeholder: emit literally.
                    output.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        output.push_str(rest);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_variables() {
        let template = PromptTemplate::new("Answer {{query}} using {{context}}.");
        let rendered = template.render(&vars(&[("query", "Q"), ("context", "C")]));
        assert_eq!(rendered, "Answer Q using C.");
    }

    #[test]
    fn missing_variable_renders_empty() {
        let template = PromptTemplate::new("Hello {{name}}!");
        assert_eq!(template.render(&vars(&[])), "Hello !");
    }

    #[test]
    fn whitespace_in_placeholder_tolerated() {
        let template = PromptTemplate::new("{{ query }}");
        assert_eq!(template.render(&vars(&[("query", "hi")])), "hi");
    }

    #[test]
    fn unterminated_placeholder_emitted_literally() {
        let template = PromptTemplate::new("text {{broken");
        assert_eq!(template.render(&vars(&[])), "text {{broken");
    }

    #[test]
    fn repeated_variable() {
        let template = PromptTemplate::new("{{x}} and {{x}}");
        assert_eq!(template.render(&vars(&[("x", "a")])), "a and a");
    }
}
