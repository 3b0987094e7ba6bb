//! Domain types for lift inputs and the estimates derived from them.

use serde::Serialize;

use crate::error::InputError;
use crate::formulas::{
    Formula, MAX_REPS, MIN_REPS, compute_hypertrophy_table, compute_percentage_table,
    format_tenths,
};

/// Form values shown before the user types anything.
const DEFAULT_WEIGHT_KG: f64 = 100.0;
const DEFAULT_REPS: u32 = 5;

/// A validated weight/reps pair together with the chosen formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiftInput {
    weight_kg: f64,
    reps: u32,
    formula: Formula,
}

impl LiftInput {
    /// Creates a new lift input, rejecting values outside the accepted range.
    pub fn new(weight_kg: f64, reps: u32, formula: Formula) -> Result<Self, InputError> {
        validate_weight(weight_kg)?;
        validate_reps(reps)?;

        Ok(Self {
            weight_kg,
            reps,
            formula,
        })
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn formula(&self) -> Formula {
        self.formula
    }

    /// Estimated 1RM for this input.
    pub fn one_rm(&self) -> f64 {
        self.formula.estimate(self.weight_kg, self.reps)
    }
}

impl Default for LiftInput {
    fn default() -> Self {
        Self {
            weight_kg: DEFAULT_WEIGHT_KG,
            reps: DEFAULT_REPS,
            formula: Formula::default(),
        }
    }
}

/// Checks that a weight is finite and not negative.
fn validate_weight(weight_kg: f64) -> Result<(), InputError> {
    if !weight_kg.is_finite() {
        return Err(InputError::NonFiniteWeight);
    }
    if weight_kg < 0.0 {
        return Err(InputError::NegativeWeight(weight_kg));
    }
    Ok(())
}

/// Checks that a rep count is within `[MIN_REPS, MAX_REPS]`.
fn validate_reps(reps: u32) -> Result<(), InputError> {
    if !(MIN_REPS..=MAX_REPS).contains(&reps) {
        return Err(InputError::RepsOutOfRange {
            value: reps,
            min: MIN_REPS,
            max: MAX_REPS,
        });
    }
    Ok(())
}

/// One row of the percentage-of-1RM ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentageEntry {
    pub percentage: u32,
    pub weight: f64,
}

impl PercentageEntry {
    /// Weight with one decimal for display.
    pub fn display_weight(&self) -> String {
        format_tenths(self.weight)
    }
}

/// One row of the hypertrophy table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HypertrophyEntry {
    pub reps: u32,
    pub weight: f64,
}

impl HypertrophyEntry {
    /// Weight with one decimal for display.
    pub fn display_weight(&self) -> String {
        format_tenths(self.weight)
    }
}

/// Result of one recomputation: the 1RM and both derived tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub input: LiftInput,
    pub one_rm: f64,
    pub percentages: Vec<PercentageEntry>,
    pub hypertrophy: Vec<HypertrophyEntry>,
}

impl Estimate {
    /// Computes the estimate and its tables from a validated input.
    pub fn compute(input: LiftInput) -> Self {
        let one_rm = input.one_rm();

        Self {
            input,
            one_rm,
            percentages: compute_percentage_table(one_rm),
            hypertrophy: compute_hypertrophy_table(one_rm),
        }
    }

    /// 1RM with one decimal for display.
    pub fn display_one_rm(&self) -> String {
        format_tenths(self.one_rm)
    }
}

/// Formats a weight as `"116.7 kg"`.
pub fn format_kg(weight_kg: f64) -> String {
    format!("{} kg", format_tenths(weight_kg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lift_input_valid() {
        let input = LiftInput::new(100.0, 5, Formula::Brzycki).unwrap();
        assert_eq!(input.weight_kg(), 100.0);
        assert_eq!(input.reps(), 5);
        assert_eq!(input.formula(), Formula::Brzycki);
        assert_eq!(input.one_rm(), 112.5);
    }

    #[test]
    fn test_lift_input_bounds() {
        assert!(LiftInput::new(100.0, 1, Formula::Epley).is_ok());
        assert!(LiftInput::new(100.0, 20, Formula::Epley).is_ok());
        assert!(LiftInput::new(0.0, 5, Formula::Epley).is_ok());
    }

    #[test]
    fn test_lift_input_rejects_invalid() {
        assert_eq!(
            LiftInput::new(100.0, 21, Formula::Epley).unwrap_err(),
            InputError::RepsOutOfRange {
                value: 21,
                min: 1,
                max: 20
            }
        );
        assert!(LiftInput::new(100.0, 0, Formula::Epley).is_err());
        assert_eq!(
            LiftInput::new(-0.5, 5, Formula::Epley).unwrap_err(),
            InputError::NegativeWeight(-0.5)
        );
        assert_eq!(
            LiftInput::new(f64::NAN, 5, Formula::Epley).unwrap_err(),
            InputError::NonFiniteWeight
        );
        assert!(LiftInput::new(f64::INFINITY, 5, Formula::Epley).is_err());
    }

    #[test]
    fn test_estimate_compute() {
        let input = LiftInput::new(100.0, 5, Formula::Epley).unwrap();
        let estimate = Estimate::compute(input);

        assert_eq!(estimate.display_one_rm(), "116.7");
        assert_eq!(estimate.percentages.len(), 8);
        assert_eq!(estimate.hypertrophy.len(), 4);
        assert_eq!(estimate.percentages[0].display_weight(), "105.0");
        // 116.67 / (1 + 5/30) = 100
        assert_eq!(estimate.hypertrophy[0].display_weight(), "100.0");
        // Full precision kept underneath the display rounding
        assert_ne!(estimate.one_rm, 116.7);
    }

    #[test]
    fn test_format_kg() {
        assert_eq!(format_kg(100.0 * (1.0 + 5.0 / 30.0)), "116.7 kg");
        assert_eq!(format_kg(105.0), "105.0 kg");
        assert_eq!(format_kg(0.0), "0.0 kg");
        assert_eq!(format_kg(0.25), "0.3 kg");
        assert_eq!(format_kg(100.5 * 30.0 / 100.0), "30.1 kg");
    }
}
