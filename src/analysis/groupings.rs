/// Reach grouping: joins the velocity and streamflow sets by reach id.
///
/// `group_by_reach` takes the two flat measurement lists produced by the
/// ingest layer and pairs them up per reach, so the transformer can ask
/// "what are the velocity and flow at reach 101?" without scanning both
/// lists every time.
///
/// The join is an inner join. A reach that appears in only one set (for
/// example because the upstream cycle was only partially published) is
/// counted and dropped, never padded with a guessed value.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::model::{Measurement, ReachId};

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Both raw values for one reach. Either may still be missing (`None`) if
/// the upstream file carried a fill value; validation happens downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ReachPair {
    pub reach_id: ReachId,
    pub velocity_ms: Option<f64>,
    pub streamflow_cms: Option<f64>,
}

/// Reaches that did not make it through the join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub velocity_only: usize,
    pub streamflow_only: usize,
    /// Repeated reach ids inside one variable set; the first one wins.
    pub duplicates: usize,
}

/// Output of `group_by_reach`: paired reaches in velocity-set order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedReaches {
    pub pairs: Vec<ReachPair>,
    pub stats: JoinStats,
}

/// Inner-joins velocity and streamflow measurements on reach id.
pub fn group_by_reach(velocity: Vec<Measurement>, streamflow: Vec<Measurement>) -> JoinedReaches {
    let mut stats = JoinStats::default();

    let mut flows: HashMap<ReachId, Option<f64>> = HashMap::with_capacity(streamflow.len());
    for m in streamflow {
        match flows.entry(m.reach_id) {
            Entry::Occupied(_) => stats.duplicates += 1,
            Entry::Vacant(slot) => {
                slot.insert(m.value);
            }
        }
    }

    let mut pairs = Vec::with_capacity(velocity.len().min(flows.len()));
    let mut seen: HashSet<ReachId> = HashSet::with_capacity(velocity.len());

    for m in velocity {
        if !seen.insert(m.reach_id.clone()) {
            stats.duplicates += 1;
            continue;
        }

        match flows.remove(&m.reach_id) {
            Some(streamflow_cms) => pairs.push(ReachPair {
                reach_id: m.reach_id,
                velocity_ms: m.value,
                streamflow_cms,
            }),
            None => stats.velocity_only += 1,
        }
    }

    // Whatever is left never matched a velocity entry
    stats.streamflow_only = flows.len();

    JoinedReaches { pairs, stats }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variable;

    fn vel(id: &str, v: f64) -> Measurement {
        Measurement::new(id, Variable::Velocity, Some(v))
    }

    fn flow(id: &str, q: f64) -> Measurement {
        Measurement::new(id, Variable::Streamflow, Some(q))
    }

    #[test]
    fn test_group_by_reach_pairs_matching_ids() {
        let joined = group_by_reach(
            vec![vel("101", 0.45), vel("102", 1.2)],
            vec![flow("102", 80.0), flow("101", 12.5)],
        );

        assert_eq!(joined.pairs.len(), 2);
        assert_eq!(joined.pairs[0].reach_id.as_str(), "101");
        assert_eq!(joined.pairs[0].velocity_ms, Some(0.45));
        assert_eq!(joined.pairs[0].streamflow_cms, Some(12.5));
        assert_eq!(joined.stats, JoinStats::default());
    }

    #[test]
    fn test_group_by_reach_drops_one_sided_reaches() {
        let joined = group_by_reach(
            vec![vel("101", 0.45), vel("200", 0.2)],
            vec![flow("101", 12.5), flow("300", 4.0), flow("301", 5.0)],
        );

        let ids: Vec<&str> = joined.pairs.iter().map(|p| p.reach_id.as_str()).collect();
        assert_eq!(ids, vec!["101"]);
        assert_eq!(joined.stats.velocity_only, 1);
        assert_eq!(joined.stats.streamflow_only, 2);
    }

    #[test]
    fn test_group_by_reach_keeps_first_duplicate() {
        let joined = group_by_reach(
            vec![vel("101", 0.45), vel("101", 9.9)],
            vec![flow("101", 12.5), flow("101", 999.0)],
        );

        assert_eq!(joined.pairs.len(), 1);
        assert_eq!(joined.pairs[0].velocity_ms, Some(0.45));
        assert_eq!(joined.pairs[0].streamflow_cms, Some(12.5));
        assert_eq!(joined.stats.duplicates, 2);
    }

    #[test]
    fn test_group_by_reach_carries_missing_values_through() {
        let joined = group_by_reach(
            vec![Measurement::new("101", Variable::Velocity, None)],
            vec![flow("101", 12.5)],
        );

        assert_eq!(joined.pairs.len(), 1);
        assert_eq!(joined.pairs[0].velocity_ms, None);
    }

    #[test]
    fn test_group_by_reach_empty_inputs() {
        let joined = group_by_reach(Vec::new(), Vec::new());
        assert!(joined.pairs.is_empty());
        assert_eq!(joined.stats, JoinStats::default());
    }
}
