//! Postprocessing routines applied to raw model output.
//!
//! A postprocessing failure (e.g. an expected tag absent from the output)
//! is a hard error for that chain invocation — a chain must never
//! silently return an empty or partial answer. Retry and fallback policy
//! belong to the caller.

use ragline_core::error::ChainError;

/// A postprocessing routine over raw model text.
#[derive(Debug, Clone)]
pub enum Postprocessor {
    /// Return the raw output unchanged.
    Passthrough,

    /// Extract the content of `<tag>...</tag>`. Absent tag is a hard error.
    ExtractTag { tag: String },

    /// Parse the output as a numeric score. Unparsable output is a hard
    /// error.
    ParseScore,

    /// Truncate the output at the first occurrence of any stop sequence.
    TruncateAtStop { stops: Vec<String> },
}

impl Postprocessor {
    pub fn extract_tag(tag: impl Into<String>) -> Self {
        Self::ExtractTag { tag: tag.into() }
    }

    /// Apply the routine. `ParseScore` callers read the score back with
    /// `text.parse::<f32>()` on the normalized output.
    pub fn apply(&self, raw: &str) -> Result<String, ChainError> {
        match self {
            Self::Passthrough => Ok(raw.to_string()),

            Self::ExtractTag { tag } => {
                let open = format!("<{tag}>");
                let close = format!("</{tag}>");
                let start = raw.find(&open).ok_or_else(|| {
                    ChainError::Postprocess(format!("expected tag <{tag}> absent from output"))
                })?;
                let body = &raw[start + open.len()..];
                let end = body.find(&close).ok_or_else(|| {
                    ChainError::Postprocess(format!("tag <{tag}> not closed in output"))
                })?;
                Ok(body[..end].trim().to_string())
            }

            Self::ParseScore => {
                let trimmed = raw.trim();
                let score: f32 = trimmed.parse().map_err(|_| {
                    ChainError::Postprocess(format!("expected numeric score, got '{trimmed}'"))
                })?;
                Ok(score.to_string())
            }

            Self::TruncateAtStop { stops } => {
                let cut = stops
                    .iter()
                    .filter_map(|stop| raw.find(stop.as_str()))
                    .min()
                    .unwrap_or(raw.len());
                Ok(raw[..cut].to_string())
            }
        }
    }
}
