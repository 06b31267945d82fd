//! Mailbox message types, one closed enum per component.

use common::{ue::Anchor, SwitchId, Topology, Ue, UeId};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::oneshot;

use crate::{
    error::AnchorResult,
    routing::RoutingResult,
    rule::{Rule, RuleKey},
};

#[derive(Debug)]
pub enum FlowCommand {
    Install(Rule),
    Remove(RuleKey),
    Installed(oneshot::Sender<Vec<Rule>>),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
pub enum RoutingEvent {
    TopologyUpdate(Topology),
    Snapshot(oneshot::Sender<Arc<RoutingResult>>),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
pub enum AnchorEvent {
    RouteComputed {
        topology: Topology,
        routing: Arc<RoutingResult>,
    },
    UeAttached(Ue),
    UeDetached(UeId),
    Anchors {
        ue: UeId,
        reply: oneshot::Sender<AnchorResult<BTreeMap<SwitchId, Anchor>>>,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
pub enum TunnelEvent {
    RouteComputed {
        topology: Topology,
        routing: Arc<RoutingResult>,
    },
    AnchorsChanged(Ue),
    UeDetached(UeId),
    Flush(oneshot::Sender<()>),
}

/// Outbound notifications for advertisement and monitoring collaborators.
#[derive(Clone, Debug)]
pub enum ControllerEvent {
    RouteComputed(Arc<RoutingResult>),
    UeAnchorsChanged(Ue),
    UeDetached(UeId),
}
