//! Strength formulas for estimating a one-rep max and the training tables
//! derived from it.

use std::str::FromStr;

use crate::domain::{HypertrophyEntry, LiftInput, PercentageEntry};
use crate::error::{CalcError, FormulaError};

/// Lowest accepted repetition count.
pub const MIN_REPS: u32 = 1;

/// Highest accepted repetition count. Brzycki diverges at 37 reps.
pub const MAX_REPS: u32 = 20;

/// Percentages of the 1RM listed in the training ladder, heaviest first.
pub const LADDER_PERCENTAGES: [u32; 8] = [90, 80, 70, 60, 50, 40, 30, 20];

/// Target rep counts for the hypertrophy table.
pub const HYPERTROPHY_REPS: [u32; 4] = [6, 8, 10, 12];

/// Empirical 1RM estimation formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Formula {
    #[default]
    Epley,
    Brzycki,
    Lombardi,
}

impl Formula {
    /// Returns all formula variants in menu order.
    pub fn all() -> &'static [Formula] {
        &[Formula::Epley, Formula::Brzycki, Formula::Lombardi]
    }

    /// Returns the display name for the formula.
    pub fn name(&self) -> &'static str {
        match self {
            Formula::Epley => "Epley",
            Formula::Brzycki => "Brzycki",
            Formula::Lombardi => "Lombardi",
        }
    }

    /// Estimates the 1RM for input that has already been validated.
    ///
    /// * Epley: `w × (1 + r/30)`
    /// * Brzycki: `w × 36 / (37 - r)`
    /// * Lombardi: `w × r^0.1`
    pub fn estimate(&self, weight_kg: f64, reps: u32) -> f64 {
        let r = reps as f64;
        match self {
            Formula::Epley => weight_kg * (1.0 + r / 30.0),
            Formula::Brzycki => weight_kg * (36.0 / (37.0 - r)),
            Formula::Lombardi => weight_kg * r.powf(0.1),
        }
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "epley" => Ok(Formula::Epley),
            "brzycki" => Ok(Formula::Brzycki),
            "lombardi" => Ok(Formula::Lombardi),
            _ => Err(FormulaError::Unknown(s.to_string())),
        }
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Calculates the estimated 1RM from a weight, a rep count and a formula name.
///
/// Rejects negative weight, reps outside `[MIN_REPS, MAX_REPS]` and unknown
/// formula names instead of clamping.
pub fn compute_one_rm(weight_kg: f64, reps: u32, formula: &str) -> Result<f64, CalcError> {
    let formula = formula.parse::<Formula>()?;
    let input = LiftInput::new(weight_kg, reps, formula)?;
    Ok(input.one_rm())
}

/// Builds the percentage-of-1RM ladder (90% down to 20%).
pub fn compute_percentage_table(one_rm: f64) -> Vec<PercentageEntry> {
    LADDER_PERCENTAGES
        .iter()
        .map(|&percentage| PercentageEntry {
            percentage,
            weight: one_rm * percentage as f64 / 100.0,
        })
        .collect()
}

/// Builds the hypertrophy table by solving Epley for the load at each
/// target rep count, whichever formula produced the 1RM.
pub fn compute_hypertrophy_table(one_rm: f64) -> Vec<HypertrophyEntry> {
    HYPERTROPHY_REPS
        .iter()
        .map(|&reps| HypertrophyEntry {
            reps,
            weight: one_rm / (1.0 + (reps as f64 - 1.0) / 30.0),
        })
        .collect()
}

/// Formats a value with one decimal, rounding the exact binary value.
///
/// Exact ties (`x.25`, `x.75`) round away from zero, the way JavaScript's
/// `toFixed(1)` does; `{:.1}` alone would round them to even.
pub fn format_tenths(value: f64) -> String {
    let quarters = value.abs() * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 == 1.0 {
        let tenths = (value.abs() * 10.0 + 0.5) as u64;
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{}.{}", tenths / 10, tenths % 10);
    }
    format!("{:.1}", value)
}
