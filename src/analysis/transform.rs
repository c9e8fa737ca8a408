/// Record transformer: validation, unit conversion, and classification.
///
/// Consumes the decoded measurements of one cycle and produces the per-reach
/// map that goes into the snapshot. Invalid reaches are dropped and counted;
/// they never receive a guessed category.

use std::collections::BTreeMap;

use crate::analysis::categories::{flow_category, velocity_category};
use crate::analysis::groupings::{group_by_reach, JoinStats, ReachPair};
use crate::model::{
    ChannelData, ClassifiedRecord, RecordError, ReachId, Variable, CUBIC_FEET_PER_CUBIC_METER,
    FEET_PER_METER,
};

// ---------------------------------------------------------------------------
// Conversion and classification
// ---------------------------------------------------------------------------

pub fn ms_to_fps(velocity_ms: f64) -> f64 {
    velocity_ms * FEET_PER_METER
}

pub fn cms_to_cfs(streamflow_cms: f64) -> f64 {
    streamflow_cms * CUBIC_FEET_PER_CUBIC_METER
}

/// Builds the record for one reach from already validated canonical values.
pub fn classify(velocity_ms: f64, streamflow_cms: f64) -> ClassifiedRecord {
    ClassifiedRecord {
        velocity_ms,
        streamflow_cms,
        velocity_fps: ms_to_fps(velocity_ms),
        streamflow_cfs: cms_to_cfs(streamflow_cms),
        velocity_category: velocity_category(velocity_ms),
        flow_category: flow_category(streamflow_cms),
    }
}

/// Checks that a raw value is present, finite, and non-negative.
pub fn validate(reach_id: &ReachId, variable: Variable, value: Option<f64>) -> Result<f64, RecordError> {
    let value = value.ok_or_else(|| RecordError::Missing {
        reach_id: reach_id.clone(),
        variable,
    })?;

    if !value.is_finite() {
        return Err(RecordError::NonFinite {
            reach_id: reach_id.clone(),
            variable,
            value,
        });
    }

    if value < 0.0 {
        return Err(RecordError::Negative {
            reach_id: reach_id.clone(),
            variable,
            value,
        });
    }

    Ok(value)
}

/// Validates and classifies one joined reach.
pub fn classify_pair(pair: &ReachPair) -> Result<ClassifiedRecord, RecordError> {
    let velocity_ms = validate(&pair.reach_id, Variable::Velocity, pair.velocity_ms)?;
    let streamflow_cms = validate(&pair.reach_id, Variable::Streamflow, pair.streamflow_cms)?;
    Ok(classify(velocity_ms, streamflow_cms))
}

// ---------------------------------------------------------------------------
// Whole-cycle transform
// ---------------------------------------------------------------------------

/// Counters describing what happened to every input reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Reaches present in both sets.
    pub joined: usize,
    /// Reaches that made it into the output.
    pub classified: usize,
    /// Reaches dropped for missing/negative/non-finite values.
    pub invalid: usize,
    /// Reaches dropped by the minimum streamflow filter.
    pub below_min_flow: usize,
    pub velocity_only: usize,
    pub streamflow_only: usize,
    pub duplicates: usize,
}

impl TransformStats {
    fn from_join(join: JoinStats, joined: usize) -> Self {
        Self {
            joined,
            velocity_only: join.velocity_only,
            streamflow_only: join.streamflow_only,
            duplicates: join.duplicates,
            ..Self::default()
        }
    }

    /// Reaches that were seen upstream but are absent from the output.
    pub fn dropped(&self) -> usize {
        self.invalid + self.below_min_flow + self.velocity_only + self.streamflow_only
    }
}

/// Result of transforming one cycle.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub sites: BTreeMap<ReachId, ClassifiedRecord>,
    pub stats: TransformStats,
    /// Per-reach data-quality errors, in input order.
    pub rejected: Vec<RecordError>,
}

/// Joins, validates, and classifies a decoded channel file.
///
/// Reaches whose validated streamflow is below `min_streamflow_cms` are left
/// out; pass `0.0` to keep everything.
pub fn transform(data: ChannelData, min_streamflow_cms: f64) -> TransformOutput {
    let joined = group_by_reach(data.velocity, data.streamflow);
    let mut stats = TransformStats::from_join(joined.stats, joined.pairs.len());
    let mut sites = BTreeMap::new();
    let mut rejected = Vec::new();

    for pair in joined.pairs {
        match classify_pair(&pair) {
            Ok(record) if record.streamflow_cms < min_streamflow_cms => {
                stats.below_min_flow += 1;
            }
            Ok(record) => {
                sites.insert(pair.reach_id, record);
            }
            Err(e) => {
                log::debug!("Dropping {}", e);
                stats.invalid += 1;
                rejected.push(e);
            }
        }
    }

    stats.classified = sites.len();

    TransformOutput {
        sites,
        stats,
        rejected,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::categories::{FlowCategory, VelocityCategory};
    use crate::ingest::fixtures::{fixture_channel_data, fixture_partial_cycle};
    use crate::model::Measurement;

    fn channel(pairs: &[(&str, Option<f64>, Option<f64>)]) -> ChannelData {
        ChannelData {
            velocity: pairs
                .iter()
                .map(|(id, v, _)| Measurement::new(*id, Variable::Velocity, *v))
                .collect(),
            streamflow: pairs
                .iter()
                .map(|(id, _, q)| Measurement::new(*id, Variable::Streamflow, *q))
                .collect(),
        }
    }

    #[test]
    fn test_classify_moderate_reach() {
        let record = classify(0.45, 12.5);

        assert!((record.velocity_fps - 1.4764).abs() < 1e-3);
        assert!((record.streamflow_cfs - 441.43).abs() < 1e-2);
        assert_eq!(record.velocity_category, VelocityCategory::Moderate);
        assert_eq!(record.flow_category, FlowCategory::Moderate);
    }

    #[test]
    fn test_classify_velocity_exactly_one_is_very_fast() {
        let record = classify(1.0, 5.0);
        assert_eq!(record.velocity_category, VelocityCategory::VeryFast);
    }

    #[test]
    fn test_derived_units_are_exact_conversions() {
        let record = classify(0.731, 187.2);
        assert_eq!(record.velocity_fps, 0.731 * FEET_PER_METER);
        assert_eq!(record.streamflow_cfs, 187.2 * CUBIC_FEET_PER_CUBIC_METER);
    }

    #[test]
    fn test_velocity_conversion_round_trips() {
        for v in [0.0001, 0.05, 0.45, 1.0, 3.7, 12.0, 123.456] {
            let back = ms_to_fps(v) / FEET_PER_METER;
            assert!(((back - v) / v).abs() < 1e-6, "{} round-tripped to {}", v, back);
        }
    }

    #[test]
    fn test_validate_rejects_missing_negative_and_nan() {
        let id = ReachId::new("7");

        assert!(matches!(
            validate(&id, Variable::Velocity, None),
            Err(RecordError::Missing { .. })
        ));
        assert!(matches!(
            validate(&id, Variable::Velocity, Some(-0.5)),
            Err(RecordError::Negative { value, .. }) if value == -0.5
        ));
        assert!(matches!(
            validate(&id, Variable::Streamflow, Some(f64::NAN)),
            Err(RecordError::NonFinite { .. })
        ));
        assert_eq!(validate(&id, Variable::Streamflow, Some(0.0)), Ok(0.0));
    }

    #[test]
    fn test_transform_excludes_negative_velocity_and_counts_it() {
        let output = transform(
            channel(&[("1", Some(-0.5), Some(3.0)), ("2", Some(0.45), Some(12.5))]),
            0.0,
        );

        assert!(!output.sites.contains_key(&ReachId::new("1")));
        assert!(output.sites.contains_key(&ReachId::new("2")));
        assert_eq!(output.stats.invalid, 1);
        assert_eq!(output.stats.classified, 1);
        assert_eq!(output.rejected.len(), 1);
    }

    #[test]
    fn test_transform_drops_reaches_with_missing_values() {
        let output = transform(
            channel(&[("1", None, Some(3.0)), ("2", Some(0.2), None), ("3", Some(0.2), Some(3.0))]),
            0.0,
        );

        assert_eq!(output.sites.len(), 1);
        assert_eq!(output.stats.invalid, 2);
    }

    #[test]
    fn test_transform_inner_join_on_partial_cycle() {
        let output = transform(fixture_partial_cycle(), 0.0);

        for id in ["9001", "9002"] {
            assert!(
                !output.sites.contains_key(&ReachId::new(id)),
                "one-sided reach {} must not be published",
                id
            );
        }
        assert_eq!(output.stats.velocity_only, 1);
        assert_eq!(output.stats.streamflow_only, 1);
    }

    #[test]
    fn test_transform_min_flow_filter() {
        let output = transform(
            channel(&[("1", Some(0.2), Some(4.0)), ("2", Some(0.2), Some(40.0))]),
            10.0,
        );

        assert_eq!(output.sites.len(), 1);
        assert!(output.sites.contains_key(&ReachId::new("2")));
        assert_eq!(output.stats.below_min_flow, 1);
        assert_eq!(output.stats.invalid, 0);
    }

    #[test]
    fn test_transform_fixture_cycle_counts_add_up() {
        let data = fixture_channel_data();
        let inputs = data.velocity.len();
        let output = transform(data, 0.0);

        let s = output.stats;
        assert_eq!(s.classified, output.sites.len());
        assert_eq!(s.joined, s.classified + s.invalid + s.below_min_flow);
        assert_eq!(inputs, s.joined + s.velocity_only + s.duplicates);
    }
}
