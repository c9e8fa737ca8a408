/// Severity bands for velocity and streamflow.
///
/// Both scales are six ordered bands over half-open intervals, inclusive on
/// the lower bound. The functions are total: anything below the first band
/// edge lands in the lowest band. Negative and non-finite inputs are rejected
/// by validation in `transform` before they get here.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Velocity
// ---------------------------------------------------------------------------

/// Velocity band, m/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityCategory {
    /// [0, 0.1)
    VerySlow,
    /// [0.1, 0.3)
    Slow,
    /// [0.3, 0.6)
    Moderate,
    /// [0.6, 1.0)
    Fast,
    /// [1.0, 2.0)
    VeryFast,
    /// [2.0, ∞)
    Extreme,
}

impl VelocityCategory {
    pub const ALL: [VelocityCategory; 6] = [
        VelocityCategory::VerySlow,
        VelocityCategory::Slow,
        VelocityCategory::Moderate,
        VelocityCategory::Fast,
        VelocityCategory::VeryFast,
        VelocityCategory::Extreme,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            VelocityCategory::VerySlow => "very_slow",
            VelocityCategory::Slow => "slow",
            VelocityCategory::Moderate => "moderate",
            VelocityCategory::Fast => "fast",
            VelocityCategory::VeryFast => "very_fast",
            VelocityCategory::Extreme => "extreme",
        }
    }

    /// Inclusive lower edge of the band, m/s.
    pub fn lower_bound(&self) -> f64 {
        match self {
            VelocityCategory::VerySlow => 0.0,
            VelocityCategory::Slow => 0.1,
            VelocityCategory::Moderate => 0.3,
            VelocityCategory::Fast => 0.6,
            VelocityCategory::VeryFast => 1.0,
            VelocityCategory::Extreme => 2.0,
        }
    }
}

/// Classifies a velocity in m/s.
pub fn velocity_category(velocity_ms: f64) -> VelocityCategory {
    if velocity_ms < 0.1 {
        VelocityCategory::VerySlow
    } else if velocity_ms < 0.3 {
        VelocityCategory::Slow
    } else if velocity_ms < 0.6 {
        VelocityCategory::Moderate
    } else if velocity_ms < 1.0 {
        VelocityCategory::Fast
    } else if velocity_ms < 2.0 {
        VelocityCategory::VeryFast
    } else {
        VelocityCategory::Extreme
    }
}

// ---------------------------------------------------------------------------
// Streamflow
// ---------------------------------------------------------------------------

/// Streamflow band, m³/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowCategory {
    /// [0, 1)
    VeryLow,
    /// [1, 10)
    Low,
    /// [10, 50)
    Moderate,
    /// [50, 200)
    High,
    /// [200, 1000)
    VeryHigh,
    /// [1000, ∞)
    Extreme,
}

impl FlowCategory {
    pub const ALL: [FlowCategory; 6] = [
        FlowCategory::VeryLow,
        FlowCategory::Low,
        FlowCategory::Moderate,
        FlowCategory::High,
        FlowCategory::VeryHigh,
        FlowCategory::Extreme,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FlowCategory::VeryLow => "very_low",
            FlowCategory::Low => "low",
            FlowCategory::Moderate => "moderate",
            FlowCategory::High => "high",
            FlowCategory::VeryHigh => "very_high",
            FlowCategory::Extreme => "extreme",
        }
    }

    /// Inclusive lower edge of the band, m³/s.
    pub fn lower_bound(&self) -> f64 {
        match self {
            FlowCategory::VeryLow => 0.0,
            FlowCategory::Low => 1.0,
            FlowCategory::Moderate => 10.0,
            FlowCategory::High => 50.0,
            FlowCategory::VeryHigh => 200.0,
            FlowCategory::Extreme => 1000.0,
        }
    }
}

/// Classifies a streamflow in m³/s.
pub fn flow_category(streamflow_cms: f64) -> FlowCategory {
    if streamflow_cms < 1.0 {
        FlowCategory::VeryLow
    } else if streamflow_cms < 10.0 {
        FlowCategory::Low
    } else if streamflow_cms < 50.0 {
        FlowCategory::Moderate
    } else if streamflow_cms < 200.0 {
        FlowCategory::High
    } else if streamflow_cms < 1000.0 {
        FlowCategory::VeryHigh
    } else {
        FlowCategory::Extreme
    }
}
