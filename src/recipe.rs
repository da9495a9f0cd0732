//! Recipe records consumed by the voice session.
//!
//! The session receives a recipe once at construction and never mutates it.

use serde::{Deserialize, Serialize};

/// A single recipe step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Optional short heading, e.g. "Prep the vegetables".
    #[serde(default)]
    pub title: Option<String>,
    /// Free-text instructions that are read aloud.
    pub details: String,
}

impl Step {
    pub fn new(title: Option<&str>, details: impl Into<String>) -> Self {
        Self {
            title: title.map(str::to_owned),
            details: details.into(),
        }
    }
}

/// The recipe a session guides the user through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// Context handed to the AI fallback alongside the user's question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeContext {
    pub recipe_name: String,
    /// 1-based step number, absent before cooking starts.
    pub current_step_number: Option<usize>,
    pub total_steps: usize,
    pub current_step_details: Option<String>,
    pub ingredients: Vec<String>,
    pub difficulty: Option<String>,
}

impl RecipeContext {
    /// Context without a current step (questions asked during activation).
    #[must_use]
    pub fn without_step(recipe: &Recipe) -> Self {
        Self {
            recipe_name: recipe.title.clone(),
            current_step_number: None,
            total_steps: recipe.steps.len(),
            current_step_details: None,
            ingredients: recipe.ingredients.clone(),
            difficulty: recipe.difficulty.clone(),
        }
    }

    /// Context for a question asked while on step `index`.
    #[must_use]
    pub fn at_step(recipe: &Recipe, index: usize) -> Self {
        let mut context = Self::without_step(recipe);
        if let Some(step) = recipe.steps.get(index) {
            context.current_step_number = Some(index + 1);
            context.current_step_details = Some(step.details.clone());
        }
        context
    }
}
