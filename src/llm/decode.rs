//! Recovering the epic/story tree from free-text model output.

use tracing::{debug, warn};

use crate::error::AiFormatError;
use crate::pipeline::types::AnalysisResult;

/// Decode model output into an [`AnalysisResult`].
///
/// Tries, in order: the text with one leading/trailing code fence removed, then
/// the slice from the first `{` to the last `}`. The tree is then checked for
/// blank summaries and trimmed.
pub fn decode_analysis(raw: &str) -> Result<AnalysisResult, AiFormatError> {
    let stripped = strip_code_fences(raw);

    let parsed = match serde_json::from_str::<AnalysisResult>(stripped) {
        Ok(result) => result,
        Err(direct_err) => {
            debug!(error = %direct_err, "Direct parse failed, slicing object bounds");
            match object_slice(stripped) {
                Some(slice) => serde_json::from_str::<AnalysisResult>(slice).map_err(|e| {
                    warn!(error = %e, "Could not parse AI response as JSON");
                    AiFormatError {
                        reason: e.to_string(),
                        raw: raw.to_string(),
                    }
                })?,
                None => {
                    warn!("AI response contains no JSON object");
                    return Err(AiFormatError {
                        reason: direct_err.to_string(),
                        raw: raw.to_string(),
                    });
                }
            }
        }
    };

    validate(parsed).map_err(|reason| AiFormatError {
        reason,
        raw: raw.to_string(),
    })
}

/// Remove one leading fence (with optional language tag) and one trailing fence.
pub fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        let tag_end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '+' || c == '_'))
            .unwrap_or(rest.len());
        s = rest[tag_end..].trim_start();
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }
    s
}

fn object_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn validate(mut result: AnalysisResult) -> Result<AnalysisResult, String> {
    for (i, epic) in result.epics.iter_mut().enumerate() {
        epic.summary = epic.summary.trim().to_string();
        if epic.summary.is_empty() {
            return Err(format!("epic {} has a blank summary", i + 1));
        }
        for (j, story) in epic.stories.iter_mut().enumerate() {
            story.summary = story.summary.trim().to_string();
            if story.summary.is_empty() {
                return Err(format!("story {} of epic {} has a blank summary", j + 1, i + 1));
            }
        }
    }
    Ok(result)
}
