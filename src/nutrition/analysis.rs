//! Result of the meal analysis route.

use serde::{Deserialize, Serialize};

/// Nutritional breakdown of one meal, in the shape the client renders.
///
/// Every field is optional: the model may report only `error` when the input
/// is not a meal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dish_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<Macros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub micronutrients: Option<Vec<Micronutrient>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub protein: MacroShare,
    pub carbs: MacroShare,
    pub fat: MacroShare,
    pub fiber: Fiber,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroShare {
    pub grams: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fiber {
    pub grams: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Micronutrient {
    pub name: String,
    pub amount: String,
    pub daily_value: f64,
}

/// Parse model output into an analysis.
///
/// Markdown code fences are stripped first. If that still does not parse, the
/// outermost `{...}` span is tried, which covers prose around the object.
pub fn parse_analysis(text: &str) -> Result<NutritionAnalysis, serde_json::Error> {
    let body = strip_code_fences(text);
    match serde_json::from_str(body) {
        Ok(analysis) => Ok(analysis),
        Err(e) => match outer_object(body) {
            Some(object) if object.len() < body.len() => serde_json::from_str(object),
            _ => Err(e),
        },
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) when the fence spans several lines.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
