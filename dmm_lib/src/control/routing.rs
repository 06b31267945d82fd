use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::{
    sync::{
        broadcast,
        mpsc::{UnboundedReceiver, UnboundedSender},
    },
    task::JoinHandle,
};

use super::{
    events::{AnchorEvent, ControllerEvent, RoutingEvent, TunnelEvent},
    flow::FlowTableHandle,
};
use crate::routing::{RoutingEngine, RoutingResult};

pub(crate) struct RoutingTask {
    pub rx: UnboundedReceiver<RoutingEvent>,
    pub anchor_tx: UnboundedSender<AnchorEvent>,
    pub tunnel_tx: UnboundedSender<TunnelEvent>,
    pub flow: FlowTableHandle,
    pub events: broadcast::Sender<ControllerEvent>,
    pub snapshot: Arc<ArcSwapOption<RoutingResult>>,
}

impl RoutingTask {
    pub fn spawn(self) -> JoinHandle<()> {
        let Self {
            mut rx,
            anchor_tx,
            tunnel_tx,
            mut flow,
            events,
            snapshot,
        } = self;

        tokio::task::spawn(async move {
            let mut engine = RoutingEngine::new();
            while let Some(event) = rx.recv().await {
                match event {
                    RoutingEvent::TopologyUpdate(topology) => {
                        let routing = engine.handle_topology_update(topology, &mut flow);
                        snapshot.store(Some(routing.clone()));

                        // Tunnels first so they see the new paths before any
                        // anchor change derived from them.
                        if tunnel_tx
                            .send(TunnelEvent::RouteComputed {
                                topology: engine.topology().snapshot(),
                                routing: routing.clone(),
                            })
                            .is_err()
                        {
                            tracing::warn!("tunnel synthesizer mailbox closed");
                        }
                        if anchor_tx
                            .send(AnchorEvent::RouteComputed {
                                topology: engine.topology().snapshot(),
                                routing: routing.clone(),
                            })
                            .is_err()
                        {
                            tracing::warn!("anchor selector mailbox closed");
                        }
                        // No subscribers is fine.
                        let _ = events.send(ControllerEvent::RouteComputed(routing));
                    }
                    RoutingEvent::Snapshot(reply) => {
                        let _ = reply.send(engine.routing());
                    }
                    RoutingEvent::Flush(reply) => {
                        if let Err(e) = anchor_tx.send(AnchorEvent::Flush(reply)) {
                            tracing::warn!(error = %e, "could not forward flush");
                        }
                    }
                }
            }
            tracing::debug!("routing engine stopped");
        })
    }
}
