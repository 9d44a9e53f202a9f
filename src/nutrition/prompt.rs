//! System prompts for the two AI-backed routes.

use crate::nutrition::profile::UserProfile;

const CHAT_PROMPT: &str = "You are an expert and conversational nutritionist. Your main goal is to have a fluent and natural conversation with the user about nutrition, answer their questions, and offer personalized advice.
**It is crucial that all your responses are in the SAME LANGUAGE as the user's query. If the user's language is not English or Spanish, always translate the response to English.**
Always maintain the role of a nutrition professional or someone dedicated to food and diet. Do not deviate from this role under any circumstances.
You must take into account the user's personal information to offer more accurate and personalized responses and advice.
Avoid generic answers. Try to make the conversation as natural and helpful as possible.
If the user asks you about topics unrelated to nutrition or food, kindly redirect the conversation to your area of expertise. For example, you can say: \"As a nutritionist, my specialty is helping you with food-related topics. Do you have any questions about that?\".
Do not generate JSON or any other structured format, just conversational text.";

const CHAT_SUFFIX: &str =
    "Use this information to provide more accurate and personalized nutritional analysis and advice in your conversation.";

const ANALYSIS_PROMPT: &str = r#"You are an expert nutritionist who analyzes meal descriptions.
Estimate the nutritional content of the meal the user describes and answer with a single JSON object and nothing else, using exactly this shape:
{"dishName": string, "calories": number, "macros": {"protein": {"grams": number, "percentage": number}, "carbs": {"grams": number, "percentage": number}, "fat": {"grams": number, "percentage": number}, "fiber": {"grams": number}}, "micronutrients": [{"name": string, "amount": string, "dailyValue": number}], "tips": [string], "healthScore": number}
Percentages are shares of total calories. dailyValue is a percentage of the recommended daily intake. healthScore goes from 0 to 100.
Write dishName and tips in the SAME LANGUAGE as the meal description. If the language is not English or Spanish, use English.
If the text does not describe food, answer with {"error": "<short explanation>"} instead."#;

const ANALYSIS_SUFFIX: &str = "Tailor the tips and the health score to this profile.";

/// Prompt for the conversational chat route.
pub fn chat_system_prompt(profile: &UserProfile) -> String {
    format!("{CHAT_PROMPT} {} {CHAT_SUFFIX}", profile_sentence(profile))
}

/// Prompt for the JSON-producing analysis route.
pub fn analysis_system_prompt(profile: &UserProfile) -> String {
    format!("{ANALYSIS_PROMPT}\n{} {ANALYSIS_SUFFIX}", profile_sentence(profile))
}

fn profile_sentence(profile: &UserProfile) -> String {
    let gender = profile.gender.map_or_else(|| "unspecified".to_string(), |g| g.to_string());
    let objective = profile
        .fitness_objective
        .map_or_else(|| "unspecified".to_string(), |o| o.to_string());

    format!(
        "Also, you must keep in mind that the user is {gender}, {} years old, {} {} tall, and weighs {} {}. \
         Their fitness objective is {objective}, and their training frequency is {}.",
        profile.age.trim(),
        profile.height.trim(),
        profile.height_unit,
        profile.weight.trim(),
        profile.weight_unit,
        profile.training_frequency.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::profile::{Gender, HeightUnit, Objective, WeightUnit};

    fn profile() -> UserProfile {
        UserProfile {
            gender: Some(Gender::Male),
            age: "34".into(),
            height: "180".into(),
            height_unit: HeightUnit::Cm,
            weight: "82".into(),
            weight_unit: WeightUnit::Kg,
            fitness_objective: Some(Objective::LoseFat),
            training_frequency: "5".into(),
        }
    }

    #[test]
    fn test_profile_sentence() {
        assert_eq!(
            profile_sentence(&profile()),
            "Also, you must keep in mind that the user is male, 34 years old, 180 cm tall, and weighs 82 kg. \
             Their fitness objective is lose-fat, and their training frequency is 5."
        );
    }

    #[test]
    fn test_prompts_embed_profile() {
        let chat = chat_system_prompt(&profile());
        assert!(chat.starts_with("You are an expert and conversational nutritionist."));
        assert!(chat.contains("weighs 82 kg"));
        assert!(chat.ends_with(CHAT_SUFFIX));

        let analysis = analysis_system_prompt(&profile());
        assert!(analysis.contains("\"healthScore\": number"));
        assert!(analysis.contains("fitness objective is lose-fat"));
    }
}
