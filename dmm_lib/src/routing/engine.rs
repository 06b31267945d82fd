use common::Topology;
use std::sync::Arc;

use super::{compute_shortest_paths, routing_rules, RoutingResult};
use crate::{
    flow_table::{pipeline_rules, reconcile, RuleSink, Scope},
    metrics,
    rule::{add_rule, RuleSet},
};

/// Owns the routing state. Every topology update replaces the result
/// wholesale and reconciles the pipeline and routing scopes.
#[derive(Debug, Default)]
pub struct RoutingEngine {
    topology: Topology,
    routing: Arc<RoutingResult>,
    pipeline: RuleSet,
    routes: RuleSet,
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_topology_update<S: RuleSink + ?Sized>(
        &mut self,
        topology: Topology,
        sink: &mut S,
    ) -> Arc<RoutingResult> {
        metrics::inc_routing_recomputation();
        let routing = Arc::new(compute_shortest_paths(&topology));

        let mut pipeline = RuleSet::new();
        for id in topology.ids() {
            pipeline_rules(id).for_each(|r| add_rule(&mut pipeline, r));
        }
        self.pipeline = reconcile(Scope::Pipeline, pipeline, &self.pipeline, sink);

        let routes = routing_rules(&topology, &routing);
        self.routes = reconcile(Scope::Routing, routes, &self.routes, sink);

        tracing::debug!(
            switches = topology.len(),
            routing_rules = self.routes.len(),
            "routing recomputed"
        );
        self.topology = topology;
        self.routing = routing.clone();
        routing
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn routing(&self) -> Arc<RoutingResult> {
        self.routing.clone()
    }

    /// Routing-table rules currently believed installed.
    pub fn routes(&self) -> &RuleSet {
        &self.routes
    }

    pub fn pipeline(&self) -> &RuleSet {
        &self.pipeline
    }
}
