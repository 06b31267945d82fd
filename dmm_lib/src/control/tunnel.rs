use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};

use super::{events::TunnelEvent, flow::FlowTableHandle};
use crate::tunnel::TunnelSynthesizer;

pub(crate) fn spawn(
    mut rx: UnboundedReceiver<TunnelEvent>,
    mut flow: FlowTableHandle,
) -> JoinHandle<()> {
    tokio::task::spawn(async move {
        let mut tunnels = TunnelSynthesizer::new();
        while let Some(event) = rx.recv().await {
            match event {
                TunnelEvent::RouteComputed { topology, routing } => {
                    tunnels.handle_routing_update(topology, routing, &mut flow)
                }
                TunnelEvent::AnchorsChanged(ue) => tunnels.handle_anchors_changed(ue, &mut flow),
                TunnelEvent::UeDetached(id) => tunnels.handle_ue_detached(id, &mut flow),
                TunnelEvent::Flush(reply) => flow.flush(reply),
            }
        }
        tracing::debug!("tunnel synthesizer stopped");
    })
}
