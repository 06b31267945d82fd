//! Component runtime.
//!
//! Each component (flow table, routing engine, anchor selector, tunnel
//! synthesizer) runs as its own task and processes its mailbox strictly in
//! arrival order. Components only talk through those mailboxes; queries are
//! a message carrying a oneshot reply channel, bounded by a timeout.

pub mod anchor;
pub mod events;
pub mod flow;
pub mod routing;
pub mod tunnel;

use arc_swap::ArcSwapOption;
use common::{ue::Anchor, SwitchId, Topology, Ue, UeId};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::{
    sync::{
        broadcast,
        mpsc::{self, UnboundedSender},
        oneshot,
    },
    task::JoinHandle,
};

pub use events::{AnchorEvent, ControllerEvent, FlowCommand, RoutingEvent, TunnelEvent};
pub use flow::FlowTableHandle;

use crate::{
    anchor::AnchorPolicy,
    error::{ControlError, ControlResult},
    flow_table::RuleWriter,
    routing::{extract_path, Path, RoutingResult},
    rule::Rule,
};

const EVENT_BUFFER: usize = 256;

#[derive(Debug)]
pub struct Controller {
    routing_tx: UnboundedSender<RoutingEvent>,
    anchor_tx: UnboundedSender<AnchorEvent>,
    flow_tx: UnboundedSender<FlowCommand>,
    events: broadcast::Sender<ControllerEvent>,
    snapshot: Arc<ArcSwapOption<RoutingResult>>,
    request_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Spawns the four component tasks. Must be called within a tokio runtime.
    pub fn spawn<W: RuleWriter>(
        writer: W,
        policy: AnchorPolicy,
        request_timeout: Duration,
    ) -> Self {
        let (routing_tx, routing_rx) = mpsc::unbounded_channel();
        let (anchor_tx, anchor_rx) = mpsc::unbounded_channel();
        let (tunnel_tx, tunnel_rx) = mpsc::unbounded_channel();
        let (flow_tx, flow_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let snapshot = Arc::new(ArcSwapOption::empty());

        let tasks = vec![
            flow::spawn(flow_rx, writer),
            tunnel::spawn(tunnel_rx, FlowTableHandle::new(flow_tx.clone())),
            anchor::AnchorTask {
                rx: anchor_rx,
                tunnel_tx: tunnel_tx.clone(),
                events: events.clone(),
                policy,
            }
            .spawn(),
            routing::RoutingTask {
                rx: routing_rx,
                anchor_tx: anchor_tx.clone(),
                tunnel_tx,
                flow: FlowTableHandle::new(flow_tx.clone()),
                events: events.clone(),
                snapshot: snapshot.clone(),
            }
            .spawn(),
        ];
        tracing::info!(?policy, ?request_timeout, "controller started");

        Self {
            routing_tx,
            anchor_tx,
            flow_tx,
            events,
            snapshot,
            request_timeout,
            tasks,
        }
    }

    /// Hands a new topology snapshot to the routing engine.
    pub fn update_topology(&self, topology: Topology) -> ControlResult<()> {
        self.routing_tx
            .send(RoutingEvent::TopologyUpdate(topology))
            .map_err(|_| ControlError::ChannelClosed("routing engine"))
    }

    pub fn ue_attached(&self, ue: Ue) -> ControlResult<()> {
        self.anchor_tx
            .send(AnchorEvent::UeAttached(ue))
            .map_err(|_| ControlError::ChannelClosed("anchor selector"))
    }

    pub fn ue_detached(&self, id: UeId) -> ControlResult<()> {
        self.anchor_tx
            .send(AnchorEvent::UeDetached(id))
            .map_err(|_| ControlError::ChannelClosed("anchor selector"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Latest routing result without going through the routing mailbox.
    pub fn routing_snapshot(&self) -> Option<Arc<RoutingResult>> {
        self.snapshot.load_full()
    }

    pub async fn routing_result(&self) -> ControlResult<Arc<RoutingResult>> {
        self.request("routing engine", &self.routing_tx, RoutingEvent::Snapshot)
            .await
    }

    /// Shortest path between two switches under the latest routing result.
    pub async fn path(&self, src: SwitchId, dst: SwitchId) -> ControlResult<Path> {
        let routing = self.routing_result().await?;
        Ok(extract_path(&routing, src, dst)?)
    }

    /// Rules the flow table currently holds, in no particular order.
    pub async fn installed_rules(&self) -> ControlResult<Vec<Rule>> {
        self.request("flow table", &self.flow_tx, FlowCommand::Installed)
            .await
    }

    pub async fn anchors(&self, ue: UeId) -> ControlResult<BTreeMap<SwitchId, Anchor>> {
        let anchors = self
            .request("anchor selector", &self.anchor_tx, |reply| {
                AnchorEvent::Anchors { ue, reply }
            })
            .await?;
        Ok(anchors?)
    }

    /// Resolves once every event sent before the call has been processed by
    /// all components and the resulting rules reached the flow table.
    pub async fn settle(&self) -> ControlResult<()> {
        self.request("routing engine", &self.routing_tx, RoutingEvent::Flush)
            .await
    }

    /// Closes every mailbox and waits for the tasks to drain.
    pub async fn shutdown(self) {
        let Controller {
            routing_tx,
            anchor_tx,
            flow_tx,
            tasks,
            ..
        } = self;
        drop((routing_tx, anchor_tx, flow_tx));
        for res in futures::future::join_all(tasks).await {
            if let Err(e) = res {
                tracing::error!(error = %e, "component task failed");
            }
        }
        tracing::info!("controller stopped");
    }

    async fn request<T, E>(
        &self,
        component: &'static str,
        tx: &UnboundedSender<E>,
        make: impl FnOnce(oneshot::Sender<T>) -> E,
    ) -> ControlResult<T> {
        let (reply, rx) = oneshot::channel();
        tx.send(make(reply))
            .map_err(|_| ControlError::ChannelClosed(component))?;
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(ControlError::ChannelClosed(component)),
            Err(_) => Err(ControlError::Timeout {
                component,
                waited: self.request_timeout,
            }),
        }
    }
}
