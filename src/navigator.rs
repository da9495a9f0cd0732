//! Step position within the recipe and the text spoken for each step.

use crate::recipe::Step;

/// Result of moving between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMove {
    /// Moved to this index.
    Moved(usize),
    /// Already on the last step; the index did not change.
    AtEnd,
    /// Already on the first step; the index did not change.
    AtStart,
    /// Cooking has not started.
    NotStarted,
}

/// Tracks the current step of a recipe. Never wraps.
#[derive(Debug, Clone)]
pub struct StepNavigator {
    steps: Vec<Step>,
    index: Option<usize>,
}

impl StepNavigator {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps, index: None }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.index
    }

    /// Position on the first step. Returns `None` for a recipe without steps.
    pub fn begin(&mut self) -> Option<usize> {
        if self.steps.is_empty() {
            return None;
        }
        self.index = Some(0);
        self.index
    }

    pub fn advance(&mut self) -> StepMove {
        let Some(index) = self.index else {
            return StepMove::NotStarted;
        };
        if index + 1 >= self.steps.len() {
            return StepMove::AtEnd;
        }
        self.index = Some(index + 1);
        StepMove::Moved(index + 1)
    }

    pub fn retreat(&mut self) -> StepMove {
        match self.index {
            None => StepMove::NotStarted,
            Some(0) => StepMove::AtStart,
            Some(index) => {
                self.index = Some(index - 1);
                StepMove::Moved(index - 1)
            }
        }
    }

    pub fn reset(&mut self) {
        self.index = None;
    }

    /// Spoken text for step `index`: "Step 2 of 5. Title. Details".
    #[must_use]
    pub fn announcement(&self, index: usize) -> Option<String> {
        let step = self.steps.get(index)?;
        let total = self.steps.len();
        let mut text = format!("Step {} of {total}. ", index + 1);
        if let Some(title) = step.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            text.push_str(title.trim_end_matches('.'));
            text.push_str(". ");
        }
        text.push_str(step.details.trim());
        Some(text)
    }

    /// Announcement for the current step.
    #[must_use]
    pub fn current_announcement(&self) -> Option<String> {
        self.index.and_then(|i| self.announcement(i))
    }
}
