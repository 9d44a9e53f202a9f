//! Onboarding profile sent with every AI request.
//!
//! Numeric fields are kept as the text the client sent, since the onboarding
//! form submits strings. JSON numbers are accepted and rendered back to text.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Objective {
    GainMuscle,
    LoseFat,
    Longevity,
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Objective::GainMuscle => "gain-muscle",
            Objective::LoseFat => "lose-fat",
            Objective::Longevity => "longevity",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeightUnit {
    #[default]
    Cm,
    Ft,
}

impl HeightUnit {
    fn bounds(self) -> (f64, f64, &'static str) {
        match self {
            HeightUnit::Cm => (50.0, 300.0, "cm"),
            HeightUnit::Ft => (2.0, 10.0, "feet"),
        }
    }
}

impl fmt::Display for HeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HeightUnit::Cm => "cm",
            HeightUnit::Ft => "ft",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lbs,
}

impl WeightUnit {
    fn bounds(self) -> (f64, f64, &'static str) {
        match self {
            WeightUnit::Kg => (20.0, 500.0, "kg"),
            WeightUnit::Lbs => (44.0, 1100.0, "lbs"),
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WeightUnit::Kg => "kg",
            WeightUnit::Lbs => "lbs",
        })
    }
}

/// The user's onboarding answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub gender: Option<Gender>,
    #[serde(deserialize_with = "text_or_number")]
    pub age: String,
    #[serde(deserialize_with = "text_or_number")]
    pub height: String,
    pub height_unit: HeightUnit,
    #[serde(deserialize_with = "text_or_number")]
    pub weight: String,
    pub weight_unit: WeightUnit,
    pub fitness_objective: Option<Objective>,
    #[serde(deserialize_with = "text_or_number")]
    pub training_frequency: String,
}

/// Per-field validation messages, keyed by wire field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[serde(transparent)]
#[error("invalid profile: {} field(s) rejected", .0.len())]
pub struct ProfileErrors(pub BTreeMap<&'static str, String>);

impl ProfileErrors {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl UserProfile {
    /// Check the onboarding rules, reporting every failing field.
    pub fn validate(&self) -> Result<(), ProfileErrors> {
        let mut errors = BTreeMap::new();

        let (min, max, unit) = self.height_unit.bounds();
        if let Some(message) = check_measure(&self.height, "Height", "height", min, max, unit) {
            errors.insert("height", message);
        }

        let (min, max, unit) = self.weight_unit.bounds();
        if let Some(message) = check_measure(&self.weight, "Weight", "weight", min, max, unit) {
            errors.insert("weight", message);
        }

        let age = self.age.trim();
        if age.is_empty() {
            errors.insert("age", "Age is required".to_string());
        } else if !parse_number(age).is_some_and(|age| (13.0..=120.0).contains(&age)) {
            errors.insert("age", "Age must be between 13-120 years".to_string());
        }

        if self.gender.is_none() {
            errors.insert("gender", "Please select your gender".to_string());
        }
        if self.training_frequency.trim().is_empty() {
            errors.insert("trainingFrequency", "Please select your training frequency".to_string());
        }
        if self.fitness_objective.is_none() {
            errors.insert("fitnessObjective", "Please select your fitness objective".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProfileErrors(errors))
        }
    }
}

fn check_measure(value: &str, label: &str, noun: &str, min: f64, max: f64, unit: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return Some(format!("{label} is required"));
    }
    match parse_number(value) {
        Some(n) if n > 0.0 => {
            if (min..=max).contains(&n) {
                None
            } else {
                Some(format!("{label} must be between {min}-{max} {unit}"))
            }
        }
        _ => Some(format!("Please enter a valid {noun}")),
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
        Null(()),
    }

    Ok(match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Text(text) => text,
        TextOrNumber::Number(number) => number.to_string(),
        TextOrNumber::Null(()) => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> UserProfile {
        serde_json::from_value(json!({
            "gender": "female",
            "age": "29",
            "height": "168",
            "heightUnit": "cm",
            "weight": 61,
            "weightUnit": "kg",
            "fitnessObjective": "gain-muscle",
            "trainingFrequency": "3-4"
        }))
        .unwrap()
    }

    #[test]
    fn test_accepts_strings_and_numbers() {
        let profile = valid();
        assert_eq!(profile.weight, "61");
        assert_eq!(profile.fitness_objective, Some(Objective::GainMuscle));
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_reported_together() {
        let profile: UserProfile = serde_json::from_value(json!({})).unwrap();
        let errors = profile.validate().unwrap_err();

        assert_eq!(errors.get("height"), Some("Height is required"));
        assert_eq!(errors.get("weight"), Some("Weight is required"));
        assert_eq!(errors.get("age"), Some("Age is required"));
        assert_eq!(errors.get("gender"), Some("Please select your gender"));
        assert_eq!(errors.get("trainingFrequency"), Some("Please select your training frequency"));
        assert_eq!(errors.get("fitnessObjective"), Some("Please select your fitness objective"));
    }

    #[test]
    fn test_range_checks_follow_units() {
        let mut profile = valid();
        profile.height = "6".into();
        profile.height_unit = HeightUnit::Ft;
        profile.weight = "30".into();
        profile.weight_unit = WeightUnit::Lbs;
        profile.age = "12".into();

        let errors = profile.validate().unwrap_err();
        assert!(errors.get("height").is_none());
        assert_eq!(errors.get("weight"), Some("Weight must be between 44-1100 lbs"));
        assert_eq!(errors.get("age"), Some("Age must be between 13-120 years"));
    }

    #[test]
    fn test_non_numeric_and_non_positive() {
        let mut profile = valid();
        profile.height = "tall".into();
        profile.weight = "-3".into();

        let errors = profile.validate().unwrap_err();
        assert_eq!(errors.get("height"), Some("Please enter a valid height"));
        assert_eq!(errors.get("weight"), Some("Please enter a valid weight"));

        profile.height = "NaN".into();
        assert_eq!(profile.validate().unwrap_err().get("height"), Some("Please enter a valid height"));
    }

    #[test]
    fn test_errors_serialize_as_field_map() {
        let mut profile = valid();
        profile.gender = None;
        let errors = profile.validate().unwrap_err();
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({"gender": "Please select your gender"})
        );
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        let result: Result<UserProfile, _> = serde_json::from_value(json!({"fitnessObjective": "bulk"}));
        assert!(result.is_err());
    }
}
