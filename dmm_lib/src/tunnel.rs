//! Per-UE tunnel rules between the point of attachment and each anchor.
//!
//! Uplink rules match the anchor prefix as source and hand frames hop by
//! hop towards the anchor gateway. Downlink rules match the UE's link-local
//! and global addresses (plus Neighbor Discovery for them) from the gateway
//! back to the access point, where a final rule delivers to the UE itself.

use common::{
    ipv6::Ipv6Prefix,
    switch::hw_addr_from_id,
    ue::{Anchor, Attachment},
    PortNo, Topology, Ue, UeId,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::{
    flow_table::{reconcile, RuleSink, Scope},
    routing::{extract_path, Path, RoutingResult},
    rule::{
        add_rule, output_port, Action, Match, Rule, RuleSet, ND_NEIGHBOR_ADVERT,
        ND_NEIGHBOR_SOLICIT, TABLE_UES,
    },
};

#[derive(Debug, Default)]
pub struct TunnelSynthesizer {
    topology: Topology,
    routing: Arc<RoutingResult>,
    ues: BTreeMap<UeId, Ue>,
    installed: HashMap<UeId, RuleSet>,
}

impl TunnelSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the tunnels of every known UE over the new paths.
    pub fn handle_routing_update<S: RuleSink + ?Sized>(
        &mut self,
        topology: Topology,
        routing: Arc<RoutingResult>,
        sink: &mut S,
    ) {
        self.topology = topology;
        self.routing = routing;
        let ids: Vec<UeId> = self.ues.keys().copied().collect();
        for id in ids {
            self.reconcile_ue(id, sink);
        }
    }

    pub fn handle_anchors_changed<S: RuleSink + ?Sized>(&mut self, ue: Ue, sink: &mut S) {
        let id = ue.id;
        self.ues.insert(id, ue);
        self.reconcile_ue(id, sink);
    }

    /// Removes every rule installed for the UE.
    pub fn handle_ue_detached<S: RuleSink + ?Sized>(&mut self, id: UeId, sink: &mut S) {
        self.ues.remove(&id);
        if let Some(previous) = self.installed.remove(&id) {
            reconcile(Scope::Ue(id), RuleSet::new(), &previous, sink);
        }
    }

    pub fn installed(&self, id: UeId) -> Option<&RuleSet> {
        self.installed.get(&id)
    }

    fn reconcile_ue<S: RuleSink + ?Sized>(&mut self, id: UeId, sink: &mut S) {
        let Some(ue) = self.ues.get(&id) else {
            return;
        };
        let desired = ue_rules(&self.topology, &self.routing, ue);
        let previous = self.installed.remove(&id).unwrap_or_default();
        let installed = reconcile(Scope::Ue(id), desired, &previous, sink);
        self.installed.insert(id, installed);
    }
}

/// Desired rules for one UE across all of its anchors. Anchors without an
/// uplink or downlink path contribute nothing.
pub fn ue_rules(topology: &Topology, routing: &RoutingResult, ue: &Ue) -> RuleSet {
    let mut rules = RuleSet::new();
    let Some(attachment) = ue.attachment() else {
        return rules;
    };
    for anchor in attachment.anchors.values() {
        let Some(gw_port) = topology
            .get(anchor.gw)
            .and_then(|s| s.gw_conf())
            .map(|c| c.port)
        else {
            tracing::debug!(
                ue = ue.id,
                gw = format_args!("{:#x}", anchor.gw),
                "anchor is not a gateway"
            );
            continue;
        };
        let paths = extract_path(routing, attachment.switch, anchor.gw)
            .and_then(|ul| Ok((ul, extract_path(routing, anchor.gw, attachment.switch)?)));
        let (ul, dl) = match paths {
            Ok(paths) => paths,
            Err(e) => {
                tracing::debug!(ue = ue.id, error = %e, "omitting tunnel");
                continue;
            }
        };
        uplink_rules(&ul, anchor, attachment.port).for_each(|r| add_rule(&mut rules, r));
        downlink_rules(ue, &dl, anchor, gw_port, attachment).for_each(|r| add_rule(&mut rules, r));
    }
    rules
}

fn uplink_rules(path: &Path, anchor: &Anchor, ingress: PortNo) -> impl Iterator<Item = Rule> {
    let mut in_port = ingress;
    let mut rules = Vec::with_capacity(path.len());
    for link in path.links() {
        let matches = Match::default().in_port(in_port).ipv6_src(anchor.prefix);
        let actions = vec![
            Action::SetEthSrc(hw_addr_from_id(link.src)),
            Action::SetEthDst(hw_addr_from_id(link.dst)),
            Action::Output(output_port(Some(in_port), link.src_port)),
        ];
        rules.push(Rule::new(link.src, TABLE_UES, matches, actions));
        in_port = link.dst_port;
    }
    rules.into_iter()
}

fn downlink_rules(
    ue: &Ue,
    path: &Path,
    anchor: &Anchor,
    ingress: PortNo,
    attachment: &Attachment,
) -> impl Iterator<Item = Rule> {
    let addrs = [ue.ipv6_addr, ue.global_addr(anchor)];
    let mut in_port = ingress;
    let mut rules = Vec::new();
    for link in path.links() {
        let out = Action::Output(output_port(Some(in_port), link.src_port));
        for addr in addrs {
            let matches = Match::default()
                .in_port(in_port)
                .ipv6_dst(Ipv6Prefix::host(addr));
            let actions = vec![
                Action::SetEthSrc(hw_addr_from_id(link.src)),
                Action::SetEthDst(hw_addr_from_id(link.dst)),
                out.clone(),
            ];
            rules.push(Rule::new(link.src, TABLE_UES, matches, actions));
            for icmpv6_type in [ND_NEIGHBOR_SOLICIT, ND_NEIGHBOR_ADVERT] {
                let matches = Match::default().in_port(in_port).nd(icmpv6_type, addr);
                rules.push(Rule::new(link.src, TABLE_UES, matches, vec![out.clone()]));
            }
        }
        in_port = link.dst_port;
    }

    let matches = Match::default().in_port(in_port).ipv6_dst(anchor.prefix);
    let actions = vec![
        Action::SetEthSrc(anchor.gw_hw_addr()),
        Action::SetEthDst(ue.hw_addr),
        Action::Output(output_port(Some(in_port), attachment.port)),
    ];
    rules.push(Rule::new(attachment.switch, TABLE_UES, matches, actions));
    rules.into_iter()
}
