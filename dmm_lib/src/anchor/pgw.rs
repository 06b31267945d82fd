//! Network-wide fallback anchor (P-GW).
//!
//! Each gateway is scored by how uniformly it reaches the access points:
//! `median / (1 + variance)` of its distances to every AP. A gateway that
//! cannot reach some AP is not a candidate.

use common::{SwitchId, Topology};

use crate::routing::RoutingResult;

/// Score for a gateway given its distances to all access points, or `None`
/// when there are no distances.
pub fn pgw_score(distances: &[u64]) -> Option<f64> {
    if distances.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = distances.iter().map(|d| *d as f64).collect();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
    Some(median / (1.0 + variance))
}

/// Highest-scoring gateway. Ties go to the lowest switch id.
pub fn select_pgw(topology: &Topology, routing: &RoutingResult) -> Option<SwitchId> {
    let aps: Vec<SwitchId> = topology.access_points().map(|s| s.id()).collect();
    let mut best: Option<(SwitchId, f64)> = None;
    for gw in topology.gateways().map(|s| s.id()) {
        let Some(distances) = aps
            .iter()
            .map(|ap| routing.distance(gw, *ap))
            .collect::<Option<Vec<u64>>>()
        else {
            tracing::debug!(
                gw = format_args!("{gw:#x}"),
                "gateway does not reach every access point"
            );
            continue;
        };
        let Some(score) = pgw_score(&distances) else {
            continue;
        };
        tracing::trace!(gw = format_args!("{gw:#x}"), score, "p-gw candidate");
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((gw, score));
        }
    }
    best.map(|(id, _)| id)
}
