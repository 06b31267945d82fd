use common::{switch::hw_addr_from_id, Link, PortNo, SwitchId, Topology};
use dmm_lib::error::RoutingError;
use dmm_lib::flow_table::FlowTable;
use dmm_lib::routing::{compute_shortest_paths, extract_path, routing_rules, RoutingEngine};
use dmm_lib::rule::{Action, Match, OutPort, RuleKey, TABLE_ROUTING};
use dmm_lib::test_helpers::util::{add_plain, chain, connect, mk_topology, RecordingWriter};
use proptest::prelude::*;

fn route_key(switch: SwitchId, dst: SwitchId) -> RuleKey {
    RuleKey {
        switch,
        table: TABLE_ROUTING,
        matches: Match::default().eth_dst(hw_addr_from_id(dst)),
    }
}

fn abc() -> Topology {
    let mut topo = mk_topology();
    for id in 1..=3 {
        add_plain(&mut topo, id);
    }
    chain(&mut topo, &[1, 2, 3]);
    topo
}

#[test]
fn shortcut_link_rewrites_first_hop() {
    dmm_lib::init_test_tracing();
    let writer = RecordingWriter::new();
    let mut table = FlowTable::new(writer.clone());
    let mut engine = RoutingEngine::new();

    let mut topo = abc();
    let res = engine.handle_topology_update(topo.snapshot(), &mut table);
    assert_eq!(res.distance(1, 3), Some(2));
    let path = extract_path(&res, 1, 3).unwrap();
    assert_eq!(
        path.links().iter().map(|l| (l.src, l.dst)).collect::<Vec<_>>(),
        vec![(1, 2), (2, 3)]
    );
    assert_eq!(
        table.get(&route_key(1, 3)).map(|r| r.actions.clone()),
        Some(vec![Action::Output(OutPort::Port(102))])
    );

    writer.clear();
    connect(&mut topo, 1, 13, 3, 31, 1);
    let res = engine.handle_topology_update(topo.snapshot(), &mut table);
    assert_eq!(res.distance(1, 3), Some(1));
    assert_eq!(extract_path(&res, 1, 3).unwrap().len(), 1);

    // Only the two end switches change their next hop; the rules keep their
    // slots so nothing is deleted.
    assert!(writer.deletes().is_empty());
    let mut rewritten: Vec<_> = writer
        .writes()
        .iter()
        .map(|r| (r.switch, r.actions.clone()))
        .collect();
    rewritten.sort_by_key(|(s, _)| *s);
    assert_eq!(
        rewritten,
        vec![
            (1, vec![Action::Output(OutPort::Port(13))]),
            (3, vec![Action::Output(OutPort::Port(31))]),
        ]
    );
    assert_eq!(
        table.get(&route_key(1, 3)).map(|r| r.actions.clone()),
        Some(vec![Action::Output(OutPort::Port(13))])
    );
}

#[test]
fn stale_link_target_is_excluded() {
    let mut topo = abc();
    topo.remove_switch(3).unwrap();
    // switch 2 still carries its link towards 3
    assert_eq!(topo.get(2).map(|s| s.links_to(3).len()), Some(1));

    let res = compute_shortest_paths(&topo);
    assert_eq!(res.len(), 2);
    assert_eq!(res.distance(1, 3), None);
    assert_eq!(res.distance(2, 3), None);
    assert!(matches!(
        extract_path(&res, 1, 3),
        Err(RoutingError::RouteNotFound { src: 1, dst: 3 })
    ));
    assert!(matches!(
        extract_path(&res, 3, 1),
        Err(RoutingError::UnknownSwitch(3))
    ));

    let rules = routing_rules(&topo, &res);
    assert_eq!(rules.len(), 2);
    assert!(rules
        .values()
        .all(|r| r.matches.eth_dst != Some(hw_addr_from_id(3)) && r.switch != 3));
}

#[test]
fn recompute_is_idempotent() {
    let writer = RecordingWriter::new();
    let mut table = FlowTable::new(writer.clone());
    let mut engine = RoutingEngine::new();
    let topo = abc();

    engine.handle_topology_update(topo.snapshot(), &mut table);
    let installed = table.len();
    writer.clear();
    for _ in 0..3 {
        engine.handle_topology_update(topo.snapshot(), &mut table);
    }
    assert!(writer.ops().is_empty());
    assert_eq!(table.len(), installed);
}

#[test]
fn partitioned_topology_keeps_reachable_routes() {
    let mut topo = abc();
    add_plain(&mut topo, 7);
    let res = compute_shortest_paths(&topo);
    assert_eq!(res.distance(7, 7), Some(0));
    assert_eq!(res.distance(1, 7), None);
    // 6 ordered pairs among 1..=3, one rule per hop
    let hops: u64 = [(1, 2), (1, 3), (2, 1), (2, 3), (3, 1), (3, 2)]
        .iter()
        .map(|(s, d)| res.distance(*s, *d).unwrap())
        .sum();
    assert_eq!(routing_rules(&topo, &res).len() as u64, hops);
}

fn arb_topology() -> impl Strategy<Value = Topology> {
    (2u64..8).prop_flat_map(|n| {
        prop::collection::vec((1..=n, 1..=n, 1u32..10), 0..20).prop_map(move |edges| {
            let mut topo = mk_topology();
            for id in 1..=n {
                add_plain(&mut topo, id);
            }
            for (i, (a, b, w)) in edges.into_iter().enumerate() {
                if a == b {
                    continue;
                }
                let port = 100 + 2 * i as PortNo;
                let link = Link::new(a, port, b, port + 1).with_weight(w);
                topo.add_bidirectional_link(link).unwrap();
            }
            topo
        })
    })
}

proptest! {
    #[test]
    fn distance_to_self_is_zero(topo in arb_topology()) {
        let res = compute_shortest_paths(&topo);
        for id in topo.ids() {
            prop_assert_eq!(res.distance(id, id), Some(0));
        }
    }

    #[test]
    fn triangle_inequality_holds(topo in arb_topology()) {
        let res = compute_shortest_paths(&topo);
        let ids: Vec<_> = topo.ids().collect();
        for &a in &ids {
            for &b in &ids {
                for &c in &ids {
                    if let (Some(ab), Some(bc)) = (res.distance(a, b), res.distance(b, c)) {
                        let ac = res.distance(a, c);
                        prop_assert!(ac.is_some_and(|ac| ac <= ab + bc));
                    }
                }
            }
        }
    }

    #[test]
    fn extracted_path_costs_its_distance(topo in arb_topology()) {
        let res = compute_shortest_paths(&topo);
        let ids: Vec<_> = topo.ids().collect();
        for &a in &ids {
            for &b in &ids {
                match res.distance(a, b) {
                    Some(d) => {
                        let path = extract_path(&res, a, b).unwrap();
                        prop_assert_eq!(path.cost(), d);
                        prop_assert_eq!(path.links().first().map(|l| l.src).unwrap_or(a), a);
                        prop_assert_eq!(path.links().last().map(|l| l.dst).unwrap_or(b), b);
                    }
                    None => prop_assert!(extract_path(&res, a, b).is_err()),
                }
            }
        }
    }
}
