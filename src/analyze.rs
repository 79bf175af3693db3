//! End-to-end helpers: pages → content → analysis.
//!
//! ```text
//! RawDocument ──normalize──▶ PageSequence ──vision──▶ Recovered<ContentExtraction>
//!                                                          │
//!                                              text ──────┘──▶ Recovered<DocumentAnalysis>
//! ```
//!
//! Capability failures are errors. Unparseable replies are not: they come
//! back as degraded records with the raw reply attached.

use crate::document::{PageSequence, RawDocument};
use crate::error::Scan2StructError;
use crate::normalize::{NormalizeReport, Normalizer};
use crate::pipeline::llm::GenerativeCapability;
use crate::pipeline::recover::{recover, Recovered};
use crate::prompts::{analysis_prompt, EXTRACTION_INSTRUCTION};
use crate::records::{ContentExtraction, DocumentAnalysis};
use serde::Serialize;
use tracing::info;

/// Everything produced for one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub name: String,
    pub normalization: NormalizeReport,
    pub extraction: Recovered<ContentExtraction>,
    /// `None` when the pages yielded no text to analyse.
    pub analysis: Option<Recovered<DocumentAnalysis>>,
}

/// Ask the vision model to transcribe `pages` with the default instruction.
pub async fn extract_content(
    capability: &dyn GenerativeCapability,
    pages: &PageSequence,
) -> Result<Recovered<ContentExtraction>, Scan2StructError> {
    extract_content_with(capability, pages, EXTRACTION_INSTRUCTION).await
}

/// Ask the vision model to transcribe `pages` with a custom instruction.
pub async fn extract_content_with(
    capability: &dyn GenerativeCapability,
    pages: &PageSequence,
    instruction: &str,
) -> Result<Recovered<ContentExtraction>, Scan2StructError> {
    let raw = capability.describe_pages(pages, instruction).await?;
    Ok(recover(&raw))
}

/// Ask the text model to assess `text`.
pub async fn analyze_text(
    capability: &dyn GenerativeCapability,
    text: &str,
    instruction: &str,
) -> Result<Recovered<DocumentAnalysis>, Scan2StructError> {
    let prompt = analysis_prompt(text, instruction);
    let raw = capability.complete(&prompt).await?;
    Ok(recover(&raw))
}

/// Text to analyse from an extraction: the parsed content, or the raw reply
/// when extraction degraded.
pub fn extraction_text(extraction: &Recovered<ContentExtraction>) -> String {
    match extraction {
        Recovered::Parsed { value, .. } => value.to_prompt_text(),
        Recovered::Degraded { raw_text, .. } => raw_text.trim().to_string(),
    }
}

/// Normalize `doc`, transcribe its pages, then analyse the transcription.
pub async fn process_document(
    normalizer: &Normalizer,
    capability: &dyn GenerativeCapability,
    doc: &RawDocument,
    instruction: &str,
) -> Result<DocumentResult, Scan2StructError> {
    let normalization = normalizer.normalize_with_report(doc).await?;
    let extraction = extract_content(capability, &normalization.pages).await?;
    info!("'{}': extraction {:?}", doc.name(), extraction.state());

    let text = extraction_text(&extraction);
    let analysis = if text.is_empty() {
        info!("'{}': no text to analyse", doc.name());
        None
    } else {
        let analysis = analyze_text(capability, &text, instruction).await?;
        info!("'{}': analysis {:?}", doc.name(), analysis.state());
        Some(analysis)
    };

    Ok(DocumentResult {
        name: doc.name().to_string(),
        normalization,
        extraction,
        analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapabilityError;
    use crate::pipeline::recover::RecoveryState;
    use futures::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies in order; records every prompt it was given.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, CapabilityError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, CapabilityError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(vec![]),
            }
        }

        fn next(&self, prompt: &str) -> Result<String, CapabilityError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CapabilityError::EmptyContent))
        }
    }

    impl GenerativeCapability for Scripted {
        fn describe_pages<'a>(
            &'a self,
            _pages: &'a PageSequence,
            instruction: &'a str,
        ) -> BoxFuture<'a, Result<String, CapabilityError>> {
            Box::pin(async move { self.next(instruction) })
        }

        fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, CapabilityError>> {
            Box::pin(async move { self.next(prompt) })
        }
    }

    #[tokio::test]
    async fn extraction_is_recovered_from_fenced_reply() {
        let cap = Scripted::new(vec![Ok(
            "```json\n{\"subject\": \"physics\", \"content\": \"F = ma\"}\n```".into(),
        )]);
        let r = extract_content(&cap, &PageSequence::default()).await.unwrap();
        assert_eq!(r.state(), RecoveryState::Parsed);
        assert_eq!(r.value().subject, "physics");
        assert_eq!(r.value().content, "F = ma");
    }

    #[tokio::test]
    async fn analysis_prompt_carries_the_text() {
        let cap = Scripted::new(vec![Ok("{\"score\": 40}".into())]);
        let r = analyze_text(&cap, "2 + 2 = 5", "Grade it.").await.unwrap();
        assert_eq!(r.value().score, 40.0);
        let prompts = cap.prompts.lock().unwrap();
        assert!(prompts[0].contains("2 + 2 = 5"));
    }

    #[tokio::test]
    async fn capability_failure_is_an_error() {
        let cap = Scripted::new(vec![Err(CapabilityError::NoResponse {
            attempts: 4,
            detail: "connection reset".into(),
        })]);
        let err = analyze_text(&cap, "text", "").await.unwrap_err();
        assert!(matches!(
            err,
            Scan2StructError::Capability(CapabilityError::NoResponse { attempts: 4, .. })
        ));
    }

    #[tokio::test]
    async fn process_document_runs_both_calls() {
        let png = {
            use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
            let mut buf = Vec::new();
            DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([255, 255, 255])))
                .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
                .unwrap();
            buf
        };
        let cap = Scripted::new(vec![
            Ok("The page says: photosynthesis needs light.".into()),
            Ok("{\"score\": 88, \"subject\": \"biology\"}".into()),
        ]);
        let normalizer = Normalizer::new(Default::default());
        let doc = RawDocument::image(png, "page.png");

        let result = process_document(&normalizer, &cap, &doc, "").await.unwrap();
        assert_eq!(result.normalization.pages.len(), 1);
        assert!(result.extraction.is_degraded());
        let analysis = result.analysis.expect("analysis ran");
        assert_eq!(analysis.value().score, 88.0);

        // The degraded extraction's raw text is what got analysed.
        let prompts = cap.prompts.lock().unwrap();
        assert!(prompts[1].contains("photosynthesis needs light"));
    }

    #[tokio::test]
    async fn empty_extraction_skips_analysis() {
        let cap = Scripted::new(vec![Ok("{\"content\": \"\"}".into())]);
        let extraction = extract_content(&cap, &PageSequence::default()).await.unwrap();
        assert!(extraction_text(&extraction).is_empty());
    }
}
