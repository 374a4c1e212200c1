use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::models::Category;

pub const SKIPPED_REASON: &str = "Image analysis skipped - API key not configured";
pub const UNCONFIGURED_REASON: &str = "Image analysis unavailable - API key not configured";
pub const UNPARSEABLE_REASON: &str = "Could not analyze image - technical error";

/// Outcome of classifying one candidate image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub is_approved: bool,
    pub detected_items: Vec<String>,
    /// Category suggested by the model, as it wrote it
    pub category: Option<String>,
    /// In `[0, 1]`
    pub confidence: f64,
    pub reason: String,
    pub is_modest: bool,
}

impl ImageAnalysis {
    /// Fail-closed result for anything that went wrong
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_approved: false,
            detected_items: Vec::new(),
            category: None,
            confidence: 0.0,
            reason: reason.into(),
            is_modest: false,
        }
    }

    /// Result used when moderation is explicitly bypassed
    pub fn skipped() -> Self {
        Self {
            is_approved: true,
            detected_items: Vec::new(),
            category: None,
            confidence: 0.0,
            reason: SKIPPED_REASON.to_string(),
            is_modest: false,
        }
    }

    /// Suggested category when it names one the marketplace knows
    pub fn suggested_category(&self) -> Option<Category> {
        self.category.as_deref().and_then(|c| c.parse().ok())
    }
}

/// Lenient view of the model's JSON; every field may be missing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    is_approved: Option<bool>,
    detected_items: Option<Vec<String>>,
    category: Option<String>,
    confidence: Option<f64>,
    reason: Option<String>,
    is_modest: Option<bool>,
}

impl From<RawAnalysis> for ImageAnalysis {
    fn from(raw: RawAnalysis) -> Self {
        Self {
            is_approved: raw.is_approved.unwrap_or(false),
            detected_items: raw.detected_items.unwrap_or_default(),
            category: raw.category.filter(|c| !c.trim().is_empty()),
            confidence: raw.confidence.unwrap_or(0.8).clamp(0.0, 1.0),
            reason: raw
                .reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "Analysis complete".to_string()),
            is_modest: raw.is_modest.unwrap_or(false),
        }
    }
}

/// First well-formed top-level JSON object in `text`, ignoring prose and code fences.
///
/// A `{` that fails to parse is skipped together with everything up to its
/// matching `}`, so objects nested inside a malformed one are never picked.
pub fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            return Some(map);
        }
        // Unbalanced means the rest of the text sits inside the broken object
        from = start + balanced_span(&text[start..])?;
    }
    None
}

/// Byte length of the brace-delimited span opening at `text[0]`, strings respected
fn balanced_span(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Turn model output into an analysis. Never fails: unusable output is a rejection.
pub fn parse_analysis(text: &str) -> ImageAnalysis {
    let Some(object) = extract_json_object(text) else {
        warn!(response = %text, "No JSON object in moderation response");
        return ImageAnalysis::rejected(UNPARSEABLE_REASON);
    };

    match serde_json::from_value::<RawAnalysis>(Value::Object(object)) {
        Ok(raw) => raw.into(),
        Err(e) => {
            warn!(error = %e, "Moderation response has unexpected field types");
            ImageAnalysis::rejected(UNPARSEABLE_REASON)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_with_prose() {
        let text = "Sure! Here is my analysis:\n```json\n{\n  \"isApproved\": true,\n  \"detectedItems\": [\"abaya\"],\n  \"category\": \"Abaya\",\n  \"confidence\": 0.93,\n  \"reason\": \"Loose, full-length abaya\",\n  \"isModest\": true\n}\n```\nLet me know if you need more.";

        let analysis = parse_analysis(text);
        assert!(analysis.is_approved);
        assert!(analysis.is_modest);
        assert_eq!(analysis.detected_items, vec!["abaya"]);
        assert_eq!(analysis.suggested_category(), Some(Category::Abaya));
        assert!((analysis.confidence - 0.93).abs() < f64::EPSILON);
    }

    #[test]
    fn skips_braces_that_are_not_json() {
        let text = "Format {like this} is wrong, real answer: {\"isApproved\": false, \"reason\": \"Sleeveless\"} {\"isApproved\": true}";
        let analysis = parse_analysis(text);
        assert!(!analysis.is_approved);
        assert_eq!(analysis.reason, "Sleeveless");
    }

    #[test]
    fn malformed_object_never_yields_its_nested_fragment() {
        let text = r#"{"isApproved": false, "reason": "Sleeveless", "example": {"isApproved": true},}"#;
        let analysis = parse_analysis(text);
        assert!(!analysis.is_approved);
        assert_eq!(analysis.reason, UNPARSEABLE_REASON);

        // Truncated output: the inner object is still inside the broken outer one
        let text = r#"```json
{"reason": "Crop top", "details": {"isApproved": true, "isModest": true}"#;
        assert!(!parse_analysis(text).is_approved);
    }

    #[test]
    fn braces_inside_strings_do_not_end_a_skipped_span() {
        let text = r#"{"note": "a } brace", "isApproved": false,,} then {"isApproved": true, "reason": "Loose thobe"}"#;
        let analysis = parse_analysis(text);
        assert!(analysis.is_approved);
        assert_eq!(analysis.reason, "Loose thobe");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let analysis = parse_analysis("{}");
        assert!(!analysis.is_approved);
        assert_eq!(analysis.confidence, 0.8);
        assert_eq!(analysis.reason, "Analysis complete");
        assert!(analysis.category.is_none());
    }

    #[test]
    fn confidence_is_clamped() {
        let analysis = parse_analysis(r#"{"isApproved": true, "confidence": 7}"#);
        assert_eq!(analysis.confidence, 1.0);
    }

    #[test]
    fn no_json_is_a_rejection() {
        let analysis = parse_analysis("I cannot help with that.");
        assert!(!analysis.is_approved);
        assert_eq!(analysis.reason, UNPARSEABLE_REASON);
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn wrong_types_are_a_rejection() {
        let analysis = parse_analysis(r#"{"isApproved": "yes please"}"#);
        assert!(!analysis.is_approved);
        assert_eq!(analysis.reason, UNPARSEABLE_REASON);
    }

    #[test]
    fn unknown_category_is_not_suggested() {
        let analysis = parse_analysis(r#"{"isApproved": true, "category": "kimono"}"#);
        assert_eq!(analysis.category.as_deref(), Some("kimono"));
        assert_eq!(analysis.suggested_category(), None);
    }
}
