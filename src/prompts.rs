//! Default instructions sent to the generative model.
//!
//! Every prompt lives here so a change to what the model is asked for is a
//! one-place edit, and so tests can check that each prompt names the fields
//! its record shape requires.

/// Instruction for the vision call: read the pages, reply with a
/// [`crate::records::ContentExtraction`] object.
pub const EXTRACTION_INSTRUCTION: &str = r#"You are reading scanned document pages. The pages are given in order.

Transcribe what they say and reply with ONE JSON object of this shape:

{
  "subject": "<the subject or discipline, e.g. mathematics, chemistry, history>",
  "title": "<the document title, or an empty string>",
  "content": "<the full text of all pages in reading order>",
  "sections": [ { "heading": "<section heading>", "text": "<section text>" } ]
}

Rules:
- "content" is required and must contain all legible text
- Preserve numbers, formulas and units exactly as written
- Mark illegible passages as [illegible]
- Use an empty list for "sections" if the document has no headings
- Reply with the JSON object only: no markdown fences, no commentary"#;

/// System prompt for plain text completions.
pub const DEFAULT_TEXT_SYSTEM_PROMPT: &str =
    "You are a careful reviewer. You always reply with a single valid JSON object and nothing else.";

/// Default analysis instruction used when the caller gives none.
pub const DEFAULT_ANALYSIS_INSTRUCTION: &str =
    "Assess the document for correctness, completeness and clarity.";

/// Build the text prompt asking for a [`crate::records::DocumentAnalysis`].
///
/// `instruction` says what to assess; `content` is the extracted document text.
pub fn analysis_prompt(content: &str, instruction: &str) -> String {
    let instruction = if instruction.trim().is_empty() {
        DEFAULT_ANALYSIS_INSTRUCTION
    } else {
        instruction.trim()
    };
    format!(
        r#"{instruction}

Reply with ONE JSON object of this shape:

{{
  "score": <number from 0 to 100>,
  "subject": "<the subject or discipline>",
  "summary": "<two or three sentences>",
  "errors": [ {{ "description": "<what is wrong>", "location": "<where>", "correction": "<the fix>" }} ],
  "strengths": [ "<strength>" ],
  "suggestions": [ "<suggestion>" ]
}}

"score" is required. Use empty lists when there is nothing to report.
Reply with the JSON object only: no markdown fences, no commentary.

Document:
"""
{content}
""""#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_instruction_names_required_field() {
        assert!(EXTRACTION_INSTRUCTION.contains("\"content\""));
        assert!(EXTRACTION_INSTRUCTION.contains("\"sections\""));
    }

    #[test]
    fn analysis_prompt_embeds_content_and_instruction() {
        let p = analysis_prompt("x = 2 + 2 = 5", "Check the arithmetic.");
        assert!(p.starts_with("Check the arithmetic."));
        assert!(p.contains("x = 2 + 2 = 5"));
        assert!(p.contains("\"score\""));
        assert!(p.contains("\"errors\""));
    }

    #[test]
    fn blank_instruction_uses_default() {
        let p = analysis_prompt("text", "   ");
        assert!(p.starts_with(DEFAULT_ANALYSIS_INSTRUCTION));
    }
}
