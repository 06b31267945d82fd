use common::{switch::hw_addr_from_id, Topology};
use itertools::Itertools;

use super::{extract_path, Path, RoutingResult};
use crate::rule::{add_rule, output_port, Action, Match, Rule, RuleSet, TABLE_ROUTING};

/// One routing-table rule per hop: frames for the terminal switch's MAC
/// leave through the hop's egress port.
pub fn synthesize_routing_rules(path: &Path) -> impl Iterator<Item = Rule> + '_ {
    let dst_mac = hw_addr_from_id(path.dst);
    path.links().iter().map(move |link| {
        let matches = Match::default().eth_dst(dst_mac);
        let out = output_port(matches.in_port, link.src_port);
        Rule::new(link.src, TABLE_ROUTING, matches, vec![Action::Output(out)])
    })
}

/// Desired routing rules for every ordered pair of switches. Pairs without
/// a path are skipped.
pub fn routing_rules(topology: &Topology, routing: &RoutingResult) -> RuleSet {
    let ids: Vec<_> = topology.ids().collect();
    let mut rules = RuleSet::new();
    for (src, dst) in ids
        .iter()
        .copied()
        .cartesian_product(ids.iter().copied())
        .filter(|(src, dst)| src != dst)
    {
        match extract_path(routing, src, dst) {
            Ok(path) => synthesize_routing_rules(&path).for_each(|r| add_rule(&mut rules, r)),
            Err(e) => tracing::trace!(error = %e, "skipping pair"),
        }
    }
    rules
}
