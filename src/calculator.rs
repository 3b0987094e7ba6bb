//! Form state for the calculator.
//!
//! Holds the current field values and the last valid estimate. Every accepted
//! change recomputes the estimate; a rejected change leaves the state as it was.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{Estimate, LiftInput};
use crate::error::CalcError;
use crate::formulas::Formula;
use crate::mailer::EmailPayload;

/// A partial update of the form fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateUpdate {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub formula: Option<String>,
    pub exercise: Option<String>,
}

/// Calculator form state and its current estimate.
#[derive(Debug, Clone)]
pub struct CalculatorState {
    exercise: String,
    estimate: Estimate,
    updated_at: DateTime<Utc>,
}

impl Default for CalculatorState {
    fn default() -> Self {
        Self {
            exercise: String::new(),
            estimate: Estimate::compute(LiftInput::default()),
            updated_at: Utc::now(),
        }
    }
}

impl CalculatorState {
    pub fn weight_kg(&self) -> f64 {
        self.estimate.input.weight_kg()
    }

    pub fn reps(&self) -> u32 {
        self.estimate.input.reps()
    }

    pub fn formula(&self) -> Formula {
        self.estimate.input.formula()
    }

    pub fn exercise(&self) -> &str {
        &self.exercise
    }

    /// The last valid estimate.
    pub fn estimate(&self) -> &Estimate {
        &self.estimate
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies a partial update. All fields are validated before any is
    /// written, so a rejected update changes nothing.
    pub fn apply(&mut self, update: StateUpdate) -> Result<&Estimate, CalcError> {
        let weight = update.weight.unwrap_or(self.weight_kg());
        let reps = update.reps.unwrap_or(self.reps());
        let formula = match update.formula.as_deref() {
            Some(name) => name.parse::<Formula>()?,
            None => self.formula(),
        };
        let input = LiftInput::new(weight, reps, formula)?;

        if let Some(exercise) = update.exercise {
            self.exercise = exercise;
        }
        Ok(self.recompute(input))
    }

    /// Heading shown above the result.
    pub fn title(&self) -> String {
        if self.exercise.is_empty() {
            "Your 1RM (One rep max for the exercise)".to_string()
        } else {
            format!("Your 1RM for {}", self.exercise)
        }
    }

    /// Builds the email payload for the current estimate.
    pub fn email_payload(&self, name: &str, email: &str) -> EmailPayload {
        EmailPayload::new(name, email, &self.exercise, &self.estimate)
    }

    fn recompute(&mut self, input: LiftInput) -> &Estimate {
        self.estimate = Estimate::compute(input);
        self.updated_at = Utc::now();
        log::debug!(
            "Recomputed 1RM: {:.1} kg ({} x {} reps, {})",
            self.estimate.one_rm,
            input.weight_kg(),
            input.reps(),
            input.formula()
        );
        &self.estimate
    }
}
