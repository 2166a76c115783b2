use tracing::{debug, info, warn};

use super::gateway::run_gateway;
use super::progress::ProgressSink;
use super::PipelineError;
use crate::pipeline::gemini::{preview, VisionClient, CUSTOM_PROMPT_MAX_OUTPUT_TOKENS};
use crate::pipeline::parse::{parse_correction_json, parse_qac_response, CorrectionSummary, QacResult};
use crate::pipeline::prompt_templates::{correction_prompt, qac_prompt};
use crate::pipeline::render::PageBitmap;

/// Second-pass quality assurance check on extracted text.
///
/// The source canvas is sent along when available. A model failure is not
/// an error: the text comes back unchanged with no fixes.
pub fn perform_qac(
    client: &dyn VisionClient,
    text: &str,
    canvas: Option<&PageBitmap>,
    progress: &dyn ProgressSink,
) -> Result<QacResult, PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::EmptyText);
    }

    progress.report(0, "Initializing advanced quality assurance check...");
    progress.report(20, "Analyzing text...");
    progress.report(40, "Connecting to Gemini AI for comprehensive text correction...");

    let image = canvas.map(PageBitmap::to_base64);
    let gateway = run_gateway(client, image.as_deref(), None, Some(&qac_prompt(text)));
    progress.report(70, "Processing comprehensive correction results...");

    match gateway.answer() {
        Some(answer) => {
            debug!(preview = %preview(answer), "QAC answer");
            let result = parse_qac_response(answer);
            info!(
                fixes = result.fixes.len(),
                with_canvas = canvas.is_some(),
                "Quality assurance check complete"
            );
            progress.report(100, "Advanced quality assurance check completed!");
            Ok(result)
        }
        None => {
            warn!("Quality assurance check got no answer, keeping original text");
            progress.report(100, "QAC completed with basic corrections");
            Ok(QacResult {
                corrected_text: text.to_string(),
                fixes: Vec::new(),
            })
        }
    }
}

/// Structured correction: corrected text plus an original/corrected list.
///
/// Unlike `perform_qac`, any model or parse failure is an error.
pub fn correct_and_summarize(
    client: &dyn VisionClient,
    text: &str,
) -> Result<CorrectionSummary, PipelineError> {
    if text.is_empty() {
        return Err(PipelineError::EmptyText);
    }

    let answer = client
        .generate_text(&correction_prompt(text), None, CUSTOM_PROMPT_MAX_OUTPUT_TOKENS)
        .map_err(|e| {
            warn!(error = %e, "Correction request failed");
            PipelineError::CorrectionFailed
        })?;

    let summary = parse_correction_json(&answer).map_err(|e| {
        warn!(error = %e, preview = %preview(&answer), "Correction answer unusable");
        PipelineError::CorrectionFailed
    })?;

    info!(
        corrections = summary.corrections_summary.len(),
        "Text correction complete"
    );
    Ok(summary)
}
