use common::{
    ipv6::ue_prefix,
    ue::{Anchor, Attachment, DEFAULT_ANCHOR_LIFETIME},
    SwitchId, Topology, Ue, UeId,
};
use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, Instant},
};

use super::select_pgw;
use crate::{
    error::{AnchorError, AnchorResult},
    routing::RoutingResult,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnchorPolicy {
    /// Router/valid/preferred lifetime (seconds) of a new default anchor
    pub lifetime: u32,
    /// Deprecated anchors older than this are dropped. `None` keeps them
    /// until the UE detaches.
    pub deprecated_ttl: Option<Duration>,
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_ANCHOR_LIFETIME,
            deprecated_ttl: None,
        }
    }
}

/// Outcome of re-running the anchor policy for one UE.
#[derive(Clone, Debug)]
pub struct AnchorUpdate {
    pub ue: Ue,
    /// Whether the anchor map differs from the one before the run.
    pub changed: bool,
}

/// Picks default and deprecated anchors for every attached UE.
#[derive(Debug, Default)]
pub struct AnchorSelector {
    policy: AnchorPolicy,
    topology: Topology,
    routing: Arc<RoutingResult>,
    ues: BTreeMap<UeId, Ue>,
    pgw: Option<SwitchId>,
}

impl AnchorSelector {
    pub fn new(policy: AnchorPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> &AnchorPolicy {
        &self.policy
    }

    /// Current fallback anchor.
    pub fn pgw(&self) -> Option<SwitchId> {
        self.pgw
    }

    pub fn ue(&self, id: UeId) -> Option<&Ue> {
        self.ues.get(&id)
    }

    pub fn anchors(&self, id: UeId) -> AnchorResult<BTreeMap<SwitchId, Anchor>> {
        let ue = self.ues.get(&id).ok_or(AnchorError::UnknownUe(id))?;
        ue.attachment()
            .map(|a| a.anchors.clone())
            .ok_or(AnchorError::NotAttached(id))
    }

    /// Stores the new routing state, re-selects the P-GW and re-evaluates
    /// every attached UE. Every re-evaluated UE is returned so its anchors
    /// can be advertised again.
    pub fn handle_routing_update(
        &mut self,
        topology: Topology,
        routing: Arc<RoutingResult>,
        now: Instant,
    ) -> Vec<AnchorUpdate> {
        self.topology = topology;
        self.routing = routing;

        let pgw = select_pgw(&self.topology, &self.routing);
        if pgw != self.pgw {
            tracing::info!(pgw = ?pgw.map(|id| format!("{id:#x}")), "fallback anchor changed");
        }
        self.pgw = pgw;

        let ids: Vec<UeId> = self.ues.keys().copied().collect();
        let mut updates = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(mut ue) = self.ues.remove(&id) else {
                continue;
            };
            if ue.attachment().is_none() {
                self.ues.insert(id, ue);
                continue;
            }
            let before = ue.attachment().map(|a| a.anchors.clone());
            self.assign_anchors(&mut ue, now);
            let changed = ue.attachment().map(|a| &a.anchors) != before.as_ref();
            updates.push(AnchorUpdate {
                ue: ue.clone(),
                changed,
            });
            self.ues.insert(id, ue);
        }
        updates
    }

    /// Records a new attachment for `ue` and selects its anchors.
    pub fn handle_ue_attached(&mut self, ue: Ue, now: Instant) -> AnchorResult<Ue> {
        let incoming = ue
            .attachment()
            .cloned()
            .ok_or(AnchorError::NotAttached(ue.id))?;
        if !self.topology.contains(incoming.switch) {
            let e = AnchorError::UnknownSwitch(incoming.switch);
            tracing::debug!(ue = ue.id, error = %e, "attachment switch not in topology yet");
        }

        let mut entry = match self.ues.remove(&ue.id) {
            Some(mut known) => {
                if !known.attachment().is_some_and(|a| a.same_point(&incoming)) {
                    known.set_attachment(Some(Attachment::new(incoming.switch, incoming.port)));
                }
                known
            }
            None => ue,
        };
        self.assign_anchors(&mut entry, now);
        self.ues.insert(entry.id, entry.clone());
        Ok(entry)
    }

    /// Forgets a UE and releases its anchors.
    pub fn handle_ue_detached(&mut self, id: UeId) -> Option<Ue> {
        let mut ue = self.ues.remove(&id)?;
        if let Some(att) = ue.attachment_mut() {
            att.anchors.clear();
        }
        ue.set_attachment(None);
        tracing::info!(ue = id, "anchors released");
        Some(ue)
    }

    /// Anchor map for the current attachment: the previous attachment's
    /// anchors, all deprecated, plus the default candidate. Deprecated
    /// anchors that expire or whose gateway is gone are removed from the
    /// previous attachment as well, so they never come back.
    fn assign_anchors(&self, ue: &mut Ue, now: Instant) {
        let Some(current) = ue.attachment() else {
            return;
        };
        let switch = current.switch;
        let advertised: BTreeMap<SwitchId, Instant> = current
            .anchors
            .iter()
            .filter_map(|(gw, a)| a.last_advertised.map(|t| (*gw, t)))
            .collect();

        let id = ue.id;
        let mut anchors = BTreeMap::new();
        if let Some(prev) = ue.prev_attachment_mut() {
            prev.anchors.retain(|gw, anchor| {
                if !self.topology.is_gateway(*gw) {
                    let e = AnchorError::UnknownGateway(*gw);
                    tracing::debug!(ue = id, error = %e, "dropping stale anchor");
                    return false;
                }
                anchor.deprecate(now);
                let expired = self.policy.deprecated_ttl.is_some_and(|ttl| {
                    anchor
                        .deprecated_since
                        .is_some_and(|t| now.saturating_duration_since(t) > ttl)
                });
                if expired {
                    tracing::debug!(
                        ue = id,
                        gw = format_args!("{gw:#x}"),
                        "deprecated anchor expired"
                    );
                }
                !expired
            });
            anchors = prev.anchors.clone();
        }
        for (gw, anchor) in anchors.iter_mut() {
            anchor.last_advertised = advertised.get(gw).copied().or(anchor.last_advertised);
        }

        if let Some(gw) = self.default_candidate(switch) {
            if let Some(conf) = self.topology.get(gw).and_then(|s| s.gw_conf()) {
                let prefix = ue_prefix(&conf.nw_prefix, ue.id);
                let mut anchor = Anchor::new(gw, prefix, self.policy.lifetime);
                anchor.last_advertised = advertised.get(&gw).copied();
                anchors.insert(gw, anchor);
            }
        }

        let default = anchors.values().find(|a| a.is_default()).map(|a| a.gw);
        tracing::info!(
            ue = ue.id,
            switch = format_args!("{switch:#x}"),
            default = ?default.map(|id| format!("{id:#x}")),
            deprecated = anchors.len() - usize::from(default.is_some()),
            "anchors assigned"
        );
        if let Some(att) = ue.attachment_mut() {
            att.anchors = anchors;
        }
    }

    /// Closest reachable gateway from `switch`, falling back to the P-GW.
    fn default_candidate(&self, switch: SwitchId) -> Option<SwitchId> {
        let mut best: Option<(u64, SwitchId)> = None;
        for gw in self.topology.gateways().map(|s| s.id()) {
            let Some(d) = self.routing.distance(switch, gw) else {
                continue;
            };
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, gw));
            }
        }
        best.map(|(_, gw)| gw).or(self.pgw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::compute_shortest_paths;
    use crate::test_helpers::util::{
        add_access_point, add_gateway, connect, mk_topology, mk_ue, move_ue,
    };

    fn two_gateways() -> Topology {
        let mut topo = mk_topology();
        add_access_point(&mut topo, 1);
        add_gateway(&mut topo, 2);
        add_gateway(&mut topo, 3);
        connect(&mut topo, 1, 2, 2, 1, 1);
        connect(&mut topo, 1, 3, 3, 1, 3);
        topo
    }

    fn selector_for(topo: &Topology, policy: AnchorPolicy) -> AnchorSelector {
        let mut sel = AnchorSelector::new(policy);
        let routing = Arc::new(compute_shortest_paths(topo));
        sel.handle_routing_update(topo.snapshot(), routing, Instant::now());
        sel
    }

    #[test]
    fn closest_gateway_becomes_default() {
        let topo = two_gateways();
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        let ue = sel.handle_ue_attached(mk_ue(5, 1), Instant::now()).unwrap();
        let anchors = &ue.attachment().unwrap().anchors;
        assert_eq!(anchors.len(), 1);
        let a = &anchors[&2];
        assert!(a.is_default());
        assert_eq!(a.prefix.to_string(), "2020:2:0:5::/64");
        assert_eq!((a.router_lft, a.valid_lft, a.preferred_lft), (15, 15, 15));
    }

    #[test]
    fn detached_ue_is_unknown() {
        let topo = two_gateways();
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        sel.handle_ue_attached(mk_ue(5, 1), Instant::now()).unwrap();
        let ue = sel.handle_ue_detached(5).unwrap();
        assert!(ue.attachment().is_none());
        assert_eq!(sel.anchors(5).unwrap_err(), AnchorError::UnknownUe(5));
        assert!(sel.handle_ue_detached(5).is_none());
    }

    #[test]
    fn unattached_ue_is_rejected() {
        let mut sel = AnchorSelector::default();
        let ue = Ue::new(1, crate::test_helpers::util::ue_mac(1));
        assert_eq!(
            sel.handle_ue_attached(ue, Instant::now()).unwrap_err(),
            AnchorError::NotAttached(1)
        );
    }

    fn reroute(sel: &mut AnchorSelector, topo: &Topology) -> Vec<AnchorUpdate> {
        let routing = Arc::new(compute_shortest_paths(topo));
        sel.handle_routing_update(topo.snapshot(), routing, Instant::now())
    }

    #[test]
    fn topology_change_replaces_default_without_handover() {
        let mut topo = two_gateways();
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        sel.handle_ue_attached(mk_ue(5, 1), Instant::now()).unwrap();

        topo.remove_link(&common::Link::new(1, 2, 2, 1)).unwrap();
        topo.remove_link(&common::Link::new(2, 1, 1, 2)).unwrap();
        let updates = reroute(&mut sel, &topo);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].changed);
        // no previous attachment, so nothing is carried as deprecated
        let anchors = sel.anchors(5).unwrap();
        assert_eq!(anchors.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert!(anchors[&3].is_default());
    }

    #[test]
    fn restored_link_leaves_only_the_default() {
        let mut topo = two_gateways();
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        sel.handle_ue_attached(mk_ue(5, 1), Instant::now()).unwrap();

        let link = common::Link::new(1, 2, 2, 1);
        topo.remove_link(&link).unwrap();
        topo.remove_link(&link.reversed()).unwrap();
        reroute(&mut sel, &topo);
        topo.add_bidirectional_link(link).unwrap();
        reroute(&mut sel, &topo);

        let anchors = sel.anchors(5).unwrap();
        assert_eq!(
            anchors.values().map(|a| (a.gw, a.preferred_lft)).collect::<Vec<_>>(),
            vec![(2, 15)]
        );
    }

    #[test]
    fn every_attached_ue_is_republished() {
        let topo = two_gateways();
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        sel.handle_ue_attached(mk_ue(5, 1), Instant::now()).unwrap();
        sel.handle_ue_attached(mk_ue(6, 1), Instant::now()).unwrap();

        let updates = reroute(&mut sel, &topo);
        let ids: Vec<UeId> = updates.iter().map(|u| u.ue.id).collect();
        assert_eq!(ids, vec![5, 6]);
        assert!(updates.iter().all(|u| !u.changed));
    }

    #[test]
    fn handover_deprecates_previous_default() {
        let mut topo = two_gateways();
        add_access_point(&mut topo, 4);
        connect(&mut topo, 4, 3, 3, 4, 1);
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        let ue = sel.handle_ue_attached(mk_ue(5, 1), Instant::now()).unwrap();
        let moved = sel.handle_ue_attached(move_ue(&ue, 4), Instant::now()).unwrap();

        let anchors = &moved.attachment().unwrap().anchors;
        assert_eq!(anchors[&2].preferred_lft, 0);
        assert!(anchors[&2].deprecated_since.is_some());
        assert!(anchors[&3].is_default());
        // the previous attachment records the demotion too
        let prev = moved.prev_attachment().unwrap();
        assert_eq!(prev.anchors[&2].preferred_lft, 0);
    }

    #[test]
    fn gateway_role_loss_drops_anchor() {
        let mut topo = two_gateways();
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        sel.handle_ue_attached(mk_ue(5, 1), Instant::now()).unwrap();

        topo.remove_port(2, crate::test_helpers::util::GW_PORT).unwrap();
        sel.handle_routing_update(
            topo.snapshot(),
            Arc::new(compute_shortest_paths(&topo)),
            Instant::now(),
        );
        let anchors = sel.anchors(5).unwrap();
        assert_eq!(anchors.keys().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn carried_anchor_of_former_gateway_is_dropped() {
        let mut topo = two_gateways();
        add_access_point(&mut topo, 4);
        connect(&mut topo, 4, 3, 3, 4, 1);
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        let ue = sel.handle_ue_attached(mk_ue(5, 1), Instant::now()).unwrap();
        sel.handle_ue_attached(move_ue(&ue, 4), Instant::now()).unwrap();
        assert_eq!(sel.anchors(5).unwrap().len(), 2);

        topo.remove_port(2, crate::test_helpers::util::GW_PORT).unwrap();
        reroute(&mut sel, &topo);
        let anchors = sel.anchors(5).unwrap();
        assert_eq!(anchors.keys().copied().collect::<Vec<_>>(), vec![3]);
        let prev = sel.ue(5).and_then(|u| u.prev_attachment()).unwrap();
        assert!(prev.anchors.is_empty());
    }

    #[test]
    fn deprecated_anchor_expires_with_ttl() {
        let mut topo = two_gateways();
        add_access_point(&mut topo, 4);
        connect(&mut topo, 4, 3, 3, 4, 1);
        let policy = AnchorPolicy {
            deprecated_ttl: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let mut sel = selector_for(&topo, policy);
        let t0 = Instant::now();
        let ue = sel.handle_ue_attached(mk_ue(5, 1), t0).unwrap();
        sel.handle_ue_attached(move_ue(&ue, 4), t0).unwrap();
        assert_eq!(sel.anchors(5).unwrap().len(), 2);

        let routing = Arc::new(compute_shortest_paths(&topo));
        let later = t0 + Duration::from_secs(10);
        sel.handle_routing_update(topo.snapshot(), routing.clone(), later);
        assert_eq!(sel.anchors(5).unwrap().len(), 2);

        sel.handle_routing_update(topo.snapshot(), routing, t0 + Duration::from_secs(31));
        let anchors = sel.anchors(5).unwrap();
        assert_eq!(anchors.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert!(anchors[&3].is_default());
    }

    #[test]
    fn unreachable_gateways_fall_back_to_pgw() {
        let mut topo = two_gateways();
        add_access_point(&mut topo, 9);
        // gateways reach AP 9 through 2, but AP 9 has no way out
        topo.add_link(common::Link::new(2, 9, 9, 2)).unwrap();
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        assert_eq!(sel.pgw(), Some(3));

        let ue = sel.handle_ue_attached(mk_ue(1, 9), Instant::now()).unwrap();
        let anchors = &ue.attachment().unwrap().anchors;
        assert_eq!(anchors.len(), 1);
        assert!(anchors[&3].is_default());
    }

    #[test]
    fn isolated_attachment_gets_no_anchor() {
        let mut topo = two_gateways();
        add_access_point(&mut topo, 9);
        let mut sel = selector_for(&topo, AnchorPolicy::default());
        assert_eq!(sel.pgw(), None);
        let ue = sel.handle_ue_attached(mk_ue(1, 9), Instant::now()).unwrap();
        assert!(ue.attachment().unwrap().anchors.is_empty());
    }

    #[test]
    fn expired_anchor_stays_gone() {
        let mut topo = two_gateways();
        add_access_point(&mut topo, 4);
        connect(&mut topo, 4, 3, 3, 4, 1);
        let policy = AnchorPolicy {
            deprecated_ttl: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let mut sel = selector_for(&topo, policy);
        let t0 = Instant::now();
        let ue = sel.handle_ue_attached(mk_ue(5, 1), t0).unwrap();
        sel.handle_ue_attached(move_ue(&ue, 4), t0).unwrap();
        let routing = Arc::new(compute_shortest_paths(&topo));
        for secs in [6, 7, 8] {
            let now = t0 + Duration::from_secs(secs);
            sel.handle_routing_update(topo.snapshot(), routing.clone(), now);
            assert_eq!(sel.anchors(5).unwrap().len(), 1);
        }
    }
}
