//! Classifier: one reading to a severity tier and quality score
//!
//! ## Fail-Safe Aggregation
//!
//! The overall tier is the *worst* per-parameter tier. A reading with
//! excellent pH and temperature but critical turbidity is critical. Severity
//! is never averaged out.
//!
//! ## Score
//!
//! The 0-100 score exists for trend display only; event logic never reads it.
//! Each tier owns a 20-point interval:
//!
//! ```text
//! Critical  Poor   Fair   Good   Excellent
//! 0────20────40────60────80────100
//! ```
//!
//! Within a band the parameter score moves linearly toward the tier's floor
//! as the value approaches an edge bordering a more severe tier. The overall
//! score is the weighted mean (pH 40%, turbidity 40%, temperature 20%),
//! clamped into the overall tier's interval so the score can never rank a
//! reading above a less severe one.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigResult;
use crate::reading::{Parameter, Reading, PARAMETER_COUNT};
use crate::thresholds::{BandMatch, ThresholdTable, Tier};
use crate::time::Timestamp;

/// Score weights in `Parameter::ALL` order
pub const SCORE_WEIGHTS: [f32; PARAMETER_COUNT] = [0.4, 0.4, 0.2];

/// Classification of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterClass {
    pub parameter: Parameter,
    pub value: f32,
    pub tier: Tier,
    pub score: f32,
}

/// Result of classifying one reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// The classified reading
    pub reading: Reading,
    /// Worst per-parameter tier
    pub tier: Tier,
    /// 0-100, higher is better
    pub score: f32,
    /// Per-parameter detail in `Parameter::ALL` order
    pub parameters: [ParameterClass; PARAMETER_COUNT],
}

impl ClassificationResult {
    pub fn timestamp(&self) -> Timestamp {
        self.reading.timestamp
    }

    /// Detail for one parameter
    pub fn parameter(&self, parameter: Parameter) -> &ParameterClass {
        &self.parameters[parameter.index()]
    }

    /// Number of parameters at or above a tier
    pub fn count_at_least(&self, tier: Tier) -> usize {
        self.parameters.iter().filter(|p| p.tier >= tier).count()
    }

    /// Parameter driving the overall tier
    pub fn worst_parameter(&self) -> &ParameterClass {
        // First of the worst in canonical order
        self.parameters
            .iter()
            .rev()
            .max_by_key(|p| p.tier)
            .unwrap_or(&self.parameters[0])
    }
}

/// Classify a reading against a threshold table
///
/// Pure and total: every finite or non-finite input yields one of the five
/// tiers.
pub fn classify(reading: &Reading, thresholds: &ThresholdTable) -> ClassificationResult {
    let parameters = Parameter::ALL.map(|parameter| {
        let value = reading.value(parameter);
        let hit = thresholds.locate(parameter, value);
        ParameterClass {
            parameter,
            value,
            tier: hit.tier,
            score: parameter_score(&hit, value),
        }
    });

    let tier = parameters
        .iter()
        .map(|p| p.tier)
        .max()
        .unwrap_or(Tier::Critical);

    let weighted: f32 = parameters
        .iter()
        .zip(SCORE_WEIGHTS)
        .map(|(p, w)| p.score * w)
        .sum();
    let score = weighted.clamp(tier.floor_score(), tier.base_score());

    ClassificationResult {
        reading: *reading,
        tier,
        score,
        parameters,
    }
}

/// Score of one parameter within its tier interval
fn parameter_score(hit: &BandMatch, value: f32) -> f32 {
    let Some(band) = hit.band else {
        return 0.0;
    };

    let worse_below = hit.worse_below();
    let worse_above = hit.worse_above();
    let width = band.width();

    // Relative distance from the edge(s) bordering a worse tier
    let headroom = match (worse_below, worse_above) {
        (true, true) => (value - band.low).min(band.high - value) / (width / 2.0),
        (true, false) => (value - band.low) / width,
        (false, true) => (band.high - value) / width,
        (false, false) => 1.0,
    };

    band.tier.floor_score() + 20.0 * headroom.clamp(0.0, 1.0)
}

/// Classifier bound to a validated threshold table
#[derive(Debug, Clone)]
pub struct Classifier {
    thresholds: ThresholdTable,
}

impl Classifier {
    /// Validate the table and build a classifier from it
    pub fn new(thresholds: ThresholdTable) -> ConfigResult<Self> {
        Ok(Self {
            thresholds: thresholds.validated()?,
        })
    }

    pub fn classify(&self, reading: &Reading) -> ClassificationResult {
        classify(reading, &self.thresholds)
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(ph: f32, turbidity: f32, temperature: f32) -> ClassificationResult {
        classify(
            &Reading::new(0, ph, turbidity, temperature),
            &ThresholdTable::default(),
        )
    }

    #[test]
    fn reference_cases() {
        assert_eq!(check(7.2, 3.5, 20.0).tier, Tier::Excellent);
        assert_eq!(check(8.7, 8.0, 28.0).tier, Tier::Good);
        assert_eq!(check(9.2, 15.0, 33.0).tier, Tier::Fair);
        assert_eq!(check(5.2, 50.0, 38.0).tier, Tier::Poor);
        assert_eq!(check(4.5, 150.0, 42.0).tier, Tier::Critical);
    }

    #[test]
    fn worst_parameter_wins() {
        let result = check(7.0, 150.0, 20.0);
        assert_eq!(result.tier, Tier::Critical);
        assert_eq!(result.parameter(Parameter::Ph).tier, Tier::Excellent);
        assert_eq!(result.worst_parameter().parameter, Parameter::Turbidity);
        assert!(result.score <= Tier::Critical.base_score());
    }

    #[test]
    fn score_stays_in_tier_interval() {
        let result = check(7.5, 0.0, 20.0);
        assert!(result.score > 80.0 && result.score <= 100.0);

        let result = check(5.2, 50.0, 38.0);
        assert!(result.score >= 20.0 && result.score <= 40.0);
    }

    #[test]
    fn score_drops_toward_worse_edge() {
        // Turbidity gets worse as it rises inside the excellent band
        let clear = check(7.5, 0.5, 20.0).parameter(Parameter::Turbidity).score;
        let hazy = check(7.5, 4.5, 20.0).parameter(Parameter::Turbidity).score;
        assert!(clear > hazy);
        assert_eq!(check(7.5, 0.0, 20.0).parameter(Parameter::Turbidity).score, 100.0);

        // pH centre of the excellent band scores highest
        let centre = check(7.5, 1.0, 20.0).parameter(Parameter::Ph).score;
        let edge = check(6.6, 1.0, 20.0).parameter(Parameter::Ph).score;
        assert!(centre > edge);
        assert!((centre - 100.0).abs() < 1e-4);
    }

    #[test]
    fn outside_every_band_is_critical() {
        let result = check(f32::NAN, 1.0, 20.0);
        assert_eq!(result.tier, Tier::Critical);
        assert_eq!(result.parameter(Parameter::Ph).score, 0.0);
    }

    #[test]
    fn counts_degraded_parameters() {
        let result = check(5.2, 50.0, 20.0);
        assert_eq!(result.count_at_least(Tier::Poor), 2);
    }

    #[test]
    fn classifier_rejects_invalid_table() {
        let table = ThresholdTable::default().with_bands(Parameter::Ph, vec![]);
        assert!(Classifier::new(table).is_err());
    }
}
