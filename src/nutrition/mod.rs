//! Nutrition domain: who the user is, what the model is told, and what the
//! analysis endpoint returns.

pub mod analysis;
pub mod profile;
pub mod prompt;

pub use analysis::{parse_analysis, NutritionAnalysis};
pub use profile::{Gender, HeightUnit, Objective, ProfileErrors, UserProfile, WeightUnit};
pub use prompt::{analysis_system_prompt, chat_system_prompt};
