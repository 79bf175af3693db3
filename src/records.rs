//! Built-in record shapes for model replies.
//!
//! [`ContentExtraction`] is what the vision call is asked to return for a
//! page sequence; [`DocumentAnalysis`] is what the text call is asked to
//! return for the extracted content. Both are lenient about optional fields
//! and strict about the one field that makes the record meaningful.

use crate::pipeline::recover::ExpectedShape;
use serde::{Deserialize, Serialize};

/// Subject used when none was given or recovery degraded.
pub const UNKNOWN_SUBJECT: &str = "unknown";

fn unknown_subject() -> String {
    UNKNOWN_SUBJECT.to_string()
}

/// Assessment of a document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// Overall score, 0–100. Required.
    pub score: f64,
    #[serde(default = "unknown_subject")]
    pub subject: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub errors: Vec<AnalysisIssue>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ExpectedShape for DocumentAnalysis {
    fn required_fields() -> &'static [&'static str] {
        &["score"]
    }

    fn collection_fields() -> &'static [&'static str] {
        &["errors", "strengths", "suggestions"]
    }

    fn neutral() -> Self {
        Self {
            score: 0.0,
            subject: unknown_subject(),
            summary: String::new(),
            errors: vec![],
            strengths: vec![],
            suggestions: vec![],
        }
    }
}

/// One problem found in the document.
///
/// Models return either an object or a bare string; both are accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "IssueRepr")]
pub struct AnalysisIssue {
    pub description: String,
    pub location: Option<String>,
    pub correction: Option<String>,
    pub severity: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IssueRepr {
    Text(String),
    Detailed {
        #[serde(default, alias = "error", alias = "message")]
        description: String,
        #[serde(default)]
        location: Option<String>,
        #[serde(default, alias = "fix")]
        correction: Option<String>,
        #[serde(default)]
        severity: Option<String>,
    },
}

impl From<IssueRepr> for AnalysisIssue {
    fn from(repr: IssueRepr) -> Self {
        match repr {
            IssueRepr::Text(description) => AnalysisIssue {
                description,
                ..Default::default()
            },
            IssueRepr::Detailed {
                description,
                location,
                correction,
                severity,
            } => AnalysisIssue {
                description,
                location,
                correction,
                severity,
            },
        }
    }
}

/// Content the vision call read off the pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentExtraction {
    #[serde(default = "unknown_subject")]
    pub subject: String,
    #[serde(default)]
    pub title: String,
    /// Full transcribed text. Required.
    pub content: String,
    #[serde(default)]
    pub sections: Vec<ExtractedSection>,
}

/// A headed block of the transcribed content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedSection {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub text: String,
}

impl ExpectedShape for ContentExtraction {
    fn required_fields() -> &'static [&'static str] {
        &["content"]
    }

    fn collection_fields() -> &'static [&'static str] {
        &["sections"]
    }

    fn neutral() -> Self {
        Self {
            subject: unknown_subject(),
            title: String::new(),
            content: String::new(),
            sections: vec![],
        }
    }
}

impl ContentExtraction {
    /// Title, content and section text joined for a follow-up text prompt.
    pub fn to_prompt_text(&self) -> String {
        let mut out = String::new();
        if !self.title.is_empty() {
            out.push_str(&self.title);
            out.push_str("\n\n");
        }
        out.push_str(self.content.trim());
        for section in &self.sections {
            out.push_str("\n\n");
            if !section.heading.is_empty() {
                out.push_str(&section.heading);
                out.push('\n');
            }
            out.push_str(section.text.trim());
        }
        out
    }
}
