use crate::summarizer::{heuristic_summary, Summarizer};
use std::fmt;
use tracing::warn;

pub const SUMMARY_HEADER: &str = "Summary:";
pub const PROCEDURE_HEADER: &str = "Procedure:";
pub const NO_CONTENT_EXTRACTED: &str = "No content could be extracted from this document.";

/// Line prefixes that mark a procedure step.
pub const STEP_MARKERS: [&str; 7] = ["1.", "2.", "3.", "4.", "5.", "•", "-"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredBody {
    Extracted { summary: String, steps: Vec<String> },
    NoContent,
}

impl StructuredBody {
    pub fn is_no_content(&self) -> bool {
        matches!(self, Self::NoContent)
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::Extracted { summary, .. } => summary,
            Self::NoContent => "",
        }
    }

    pub fn steps(&self) -> &[String] {
        match self {
            Self::Extracted { steps, .. } => steps,
            Self::NoContent => &[],
        }
    }

    /// The record body as stored.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StructuredBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extracted { summary, steps } => {
                write!(f, "{SUMMARY_HEADER}\n{summary}\n\n{PROCEDURE_HEADER}")?;
                for step in steps {
                    write!(f, "\n- {step}")?;
                }
                Ok(())
            }
            Self::NoContent => {
                write!(f, "{SUMMARY_HEADER}\n\n{PROCEDURE_HEADER}\n{NO_CONTENT_EXTRACTED}")
            }
        }
    }
}

/// Trimmed lines starting with one of [`STEP_MARKERS`], in document order.
pub fn extract_steps(raw_text: &str) -> Vec<String> {
    raw_text
        .lines()
        .map(str::trim)
        .filter(|line| STEP_MARKERS.iter().any(|marker| line.starts_with(marker)))
        .map(str::to_string)
        .collect()
}

/// Builds the summary + procedure body. A summarizer failure or empty answer
/// falls back to the heuristic summary; blank input never reaches the
/// summarizer.
pub fn normalize_content(raw_text: &str, summarizer: &dyn Summarizer) -> StructuredBody {
    if raw_text.trim().is_empty() {
        return StructuredBody::NoContent;
    }

    let summary = match summarizer.summarize(raw_text) {
        Ok(summary) if !summary.trim().is_empty() => summary,
        Ok(_) => {
            warn!(summarizer = summarizer.name(), "empty summary, using heuristic");
            heuristic_summary(raw_text)
        }
        Err(error) => {
            warn!(summarizer = summarizer.name(), %error, "summarizer failed, using heuristic");
            heuristic_summary(raw_text)
        }
    };

    StructuredBody::Extracted {
        summary,
        steps: extract_steps(raw_text),
    }
}
