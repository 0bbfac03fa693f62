//! Threshold Table: severity bands per parameter
//!
//! ## Band Model
//!
//! Each parameter owns an ordered list of half-open bands `[low, high)`, each
//! tagged with a tier. Together the explicit bands must cover one contiguous
//! span with no gaps and no overlaps. Everything outside that span is
//! implicitly `Critical`, so the bands plus the implicit outer regions
//! partition the whole real line:
//!
//! ```text
//! pH   Critical │Poor│Fair│Good│ Excellent │Good│Fair│Poor│ Critical
//!          ─────┼────┼────┼────┼───────────┼────┼────┼────┼─────
//!              5.0  5.5  6.0  6.5         8.5  9.0  9.5  10.0
//! ```
//!
//! A gap would make some value unclassifiable, an overlap would make it
//! ambiguous. Both are rejected by [`ThresholdTable::validated`] and the
//! engine refuses to start with such a table.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, ConfigResult};
use crate::reading::Parameter;

/// Severity tier, totally ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl Tier {
    /// All tiers from best to worst
    pub const ALL: [Tier; 5] = [Tier::Excellent, Tier::Good, Tier::Fair, Tier::Poor, Tier::Critical];

    /// Severity rank, 0 = Excellent
    pub const fn rank(&self) -> u8 {
        *self as u8
    }

    /// Upper end of this tier's score interval
    pub const fn base_score(&self) -> f32 {
        match self {
            Tier::Excellent => 100.0,
            Tier::Good => 80.0,
            Tier::Fair => 60.0,
            Tier::Poor => 40.0,
            Tier::Critical => 20.0,
        }
    }

    /// Lower end of this tier's score interval
    pub const fn floor_score(&self) -> f32 {
        self.base_score() - 20.0
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Tier::Excellent => "excellent",
            Tier::Good => "good",
            Tier::Fair => "fair",
            Tier::Poor => "poor",
            Tier::Critical => "critical",
        }
    }

    /// Human-readable description of the water condition
    pub const fn description(&self) -> &'static str {
        match self {
            Tier::Excellent => "Water quality is excellent. Safe for all uses including drinking (after proper treatment).",
            Tier::Good => "Water quality is good. Generally safe for most uses with minimal treatment.",
            Tier::Fair => "Water quality is fair. Suitable for uses with appropriate treatment. Monitor closely.",
            Tier::Poor => "Water quality is poor. Not recommended for sensitive uses. Investigation recommended.",
            Tier::Critical => "Water quality is critical. Immediate pollution event detected. Urgent action required.",
        }
    }

    /// Suggested operator actions
    pub const fn recommendations(&self) -> &'static [&'static str] {
        match self {
            Tier::Excellent => &[
                "Continue routine monitoring",
                "Maintain current conditions",
                "Regular maintenance of monitoring equipment",
            ],
            Tier::Good => &[
                "Continue monitoring",
                "Review any recent changes in water source",
                "Ensure proper filtration if used for drinking",
            ],
            Tier::Fair => &[
                "Increase monitoring frequency",
                "Investigate potential sources of degradation",
                "Consider additional treatment measures",
                "Review environmental factors",
            ],
            Tier::Poor => &[
                "Immediately increase monitoring frequency",
                "Investigate pollution sources",
                "Restrict use for sensitive applications",
                "Consider implementing corrective measures",
                "Notify relevant authorities if required",
            ],
            Tier::Critical => &[
                "IMMEDIATE ACTION REQUIRED",
                "Stop use for all sensitive applications",
                "Identify and isolate pollution source",
                "Notify environmental authorities",
                "Implement emergency treatment measures",
            ],
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One half-open severity band `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub tier: Tier,
    pub low: f32,
    pub high: f32,
}

impl Band {
    pub const fn new(tier: Tier, low: f32, high: f32) -> Self {
        Self { tier, low, high }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.low && value < self.high
    }

    pub fn width(&self) -> f32 {
        self.high - self.low
    }
}

/// Where a value landed in a parameter's bands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandMatch {
    /// Tier of the containing band, `Critical` when no band matched
    pub tier: Tier,
    /// The containing band, if any
    pub band: Option<Band>,
    /// Tier of the band sharing the lower edge, `None` at the outer edge
    pub below: Option<Tier>,
    /// Tier of the band sharing the upper edge, `None` at the outer edge
    pub above: Option<Tier>,
    /// Least severe tier configured for the parameter
    pub best: Tier,
}

impl BandMatch {
    /// Whether the lower edge borders a more severe tier
    pub fn worse_below(&self) -> bool {
        self.borders_worse(self.below)
    }

    /// Whether the upper edge borders a more severe tier
    pub fn worse_above(&self) -> bool {
        self.borders_worse(self.above)
    }

    fn borders_worse(&self, neighbour: Option<Tier>) -> bool {
        match neighbour {
            Some(tier) => tier > self.tier,
            // Outer edges lead into implicit Critical, except where the band
            // is already the best the parameter offers (0 NTU cannot get clearer)
            None => self.tier > self.best,
        }
    }
}

/// Severity bands for every parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    pub ph: Vec<Band>,
    pub turbidity: Vec<Band>,
    pub temperature: Vec<Band>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        use Tier::*;
        Self {
            ph: vec![
                Band::new(Poor, 5.0, 5.5),
                Band::new(Fair, 5.5, 6.0),
                Band::new(Good, 6.0, 6.5),
                Band::new(Excellent, 6.5, 8.5),
                Band::new(Good, 8.5, 9.0),
                Band::new(Fair, 9.0, 9.5),
                Band::new(Poor, 9.5, 10.0),
            ],
            turbidity: vec![
                Band::new(Excellent, 0.0, 5.0),
                Band::new(Good, 5.0, 10.0),
                Band::new(Fair, 10.0, 25.0),
                Band::new(Poor, 25.0, 100.0),
            ],
            temperature: vec![
                Band::new(Poor, 0.0, 5.0),
                Band::new(Fair, 5.0, 10.0),
                Band::new(Good, 10.0, 15.0),
                Band::new(Excellent, 15.0, 25.0),
                Band::new(Good, 25.0, 30.0),
                Band::new(Fair, 30.0, 35.0),
                Band::new(Poor, 35.0, 40.0),
            ],
        }
    }
}

impl ThresholdTable {
    /// Bands configured for one parameter
    pub fn bands(&self, parameter: Parameter) -> &[Band] {
        match parameter {
            Parameter::Ph => &self.ph,
            Parameter::Turbidity => &self.turbidity,
            Parameter::Temperature => &self.temperature,
        }
    }

    fn bands_mut(&mut self, parameter: Parameter) -> &mut Vec<Band> {
        match parameter {
            Parameter::Ph => &mut self.ph,
            Parameter::Turbidity => &mut self.turbidity,
            Parameter::Temperature => &mut self.temperature,
        }
    }

    /// Replace the bands of one parameter
    pub fn with_bands(mut self, parameter: Parameter, bands: Vec<Band>) -> Self {
        *self.bands_mut(parameter) = bands;
        self
    }

    /// Sort every parameter's bands and check they form one contiguous span
    pub fn validated(mut self) -> ConfigResult<Self> {
        for parameter in Parameter::ALL {
            let bands = self.bands_mut(parameter);
            bands.sort_by(|a, b| a.low.total_cmp(&b.low));
            check_contiguous(parameter, bands)?;
        }
        Ok(self)
    }

    /// Check the table without reordering it
    pub fn validate(&self) -> ConfigResult<()> {
        self.clone().validated().map(|_| ())
    }

    /// Locate a value among a parameter's bands
    ///
    /// Total for every input: values outside all bands, and NaN, resolve to
    /// `Critical`.
    pub fn locate(&self, parameter: Parameter, value: f32) -> BandMatch {
        let bands = self.bands(parameter);
        let best = bands.iter().map(|b| b.tier).min().unwrap_or(Tier::Critical);

        let Some(band) = bands.iter().find(|b| b.contains(value)).copied() else {
            return BandMatch {
                tier: Tier::Critical,
                band: None,
                below: None,
                above: None,
                best,
            };
        };

        // Neighbours are found by shared edge so lookup works on unsorted tables
        let below = bands.iter().find(|b| b.high == band.low).map(|b| b.tier);
        let above = bands.iter().find(|b| b.low == band.high).map(|b| b.tier);

        BandMatch {
            tier: band.tier,
            band: Some(band),
            below,
            above,
            best,
        }
    }
}

fn check_contiguous(parameter: Parameter, bands: &[Band]) -> ConfigResult<()> {
    if bands.is_empty() {
        return Err(ConfigError::EmptyBands(parameter));
    }

    for band in bands {
        if !band.low.is_finite() || !band.high.is_finite() || band.low >= band.high {
            return Err(ConfigError::MalformedBand {
                parameter,
                low: band.low,
                high: band.high,
            });
        }
    }

    for pair in bands.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if next.low > current.high {
            return Err(ConfigError::GappedBands {
                parameter,
                high: current.high,
                next_low: next.low,
            });
        }
        if next.low < current.high {
            return Err(ConfigError::OverlappingBands {
                parameter,
                high: current.high,
                next_low: next.low,
            });
        }
    }

    Ok(())
}
