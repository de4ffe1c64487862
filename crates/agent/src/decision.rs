//! Parsing of the model's decide-step output.
//!
//! The tool-decision chain asks the model to reply either with a
//! `<tool>{"name": ..., "arguments": {...}}</tool>` block or with final
//! answer text. A present-but-unparseable block is its own case: the
//! loop feeds the parse failure back to the model as an observation
//! instead of surfacing it to the user.

const TOOL_OPEN: &str = "<tool>";
const TOOL_CLOSE: &str = "</tool>";

/// What the model decided to do this iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    /// Call the named tool with the given arguments.
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
    /// Answer the user directly with this text.
    FinalAnswer(String),
    /// A tool block was present but could not be parsed.
    Malformed { reason: String },
}

impl AgentDecision {
    pub fn parse(text: &str) -> Self {
        let Some(open) = text.find(TOOL_OPEN) else {
            return Self::FinalAnswer(text.trim().to_string());
        };

        let body_start = open + TOOL_OPEN.len();
        let Some(close) = text[body_start..].find(TOOL_CLOSE) else {
            return Self::Malformed {
                reason: "tool block opened but never closed".into(),
            };
        };

        let body = &text[body_start..body_start + close];
        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                return Self::Malformed {
                    reason: format!("tool block is not valid JSON: {e}"),
                }
            }
        };

        let Some(name) = value["name"].as_str().filter(|n| !n.is_empty()) else {
            return Self::Malformed {
                reason: "tool block missing 'name'".into(),
            };
        };

        let arguments = value
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        Self::ToolCall {
            name: name.to_string(),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_final_answer() {
        let decision = AgentDecision::parse("  Rust is a systems language.  ");
        assert_eq!(
            decision,
            AgentDecision::FinalAnswer("Rust is a systems language.".into())
        );
    }

    #[test]
    fn tool_block_parsed() {
        let decision = AgentDecision::parse(
            r#"I should search. <tool>{"name": "search", "arguments": {"q": "rust"}}</tool>"#,
        );
        match decision {
            AgentDecision::ToolCall { name, arguments } => {
                assert_eq!(name, "search");
                assert_eq!(arguments["q"], "rust");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn missing_arguments_default_to_empty_object() {
        let decision = AgentDecision::parse(r#"<tool>{"name": "now"}</tool>"#);
        match decision {
            AgentDecision::ToolCall { arguments, .. } => {
                assert_eq!(arguments, serde_json::json!({}));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_block_is_malformed() {
        let decision = AgentDecision::parse(r#"<tool>{"name": "search"}"#);
        assert!(matches!(decision, AgentDecision::Malformed { .. }));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let decision = AgentDecision::parse("<tool>call search please</tool>");
        assert!(matches!(decision, AgentDecision::Malformed { .. }));
    }

    #[test]
    fn missing_name_is_malformed() {
        let decision = AgentDecision::parse(r#"<tool>{"arguments": {}}</tool>"#);
        assert!(matches!(decision, AgentDecision::Malformed { .. }));
    }
}
