use common::{Ue, UeId};
use std::time::Instant;
use tokio::{
    sync::{
        broadcast,
        mpsc::{UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    task::JoinHandle,
};

use super::events::{AnchorEvent, ControllerEvent, TunnelEvent};
use crate::anchor::{AnchorPolicy, AnchorSelector};

pub(crate) struct AnchorTask {
    pub rx: UnboundedReceiver<AnchorEvent>,
    pub tunnel_tx: UnboundedSender<TunnelEvent>,
    pub events: broadcast::Sender<ControllerEvent>,
    pub policy: AnchorPolicy,
}

impl AnchorTask {
    pub fn spawn(self) -> JoinHandle<()> {
        let Self {
            mut rx,
            tunnel_tx,
            events,
            policy,
        } = self;
        let outbox = Outbox { tunnel_tx, events };

        tokio::task::spawn(async move {
            let mut selector = AnchorSelector::new(policy);
            while let Some(event) = rx.recv().await {
                match event {
                    AnchorEvent::RouteComputed { topology, routing } => {
                        let now = Instant::now();
                        for update in selector.handle_routing_update(topology, routing, now) {
                            if update.changed {
                                outbox.anchors_changed(update.ue);
                            } else {
                                outbox.publish(update.ue);
                            }
                        }
                    }
                    AnchorEvent::UeAttached(ue) => {
                        match selector.handle_ue_attached(ue, Instant::now()) {
                            Ok(ue) => outbox.anchors_changed(ue),
                            Err(e) => tracing::warn!(error = %e, "ignoring attachment"),
                        }
                    }
                    AnchorEvent::UeDetached(id) => {
                        let known = selector.handle_ue_detached(id).is_some();
                        outbox.detached(id, known);
                    }
                    AnchorEvent::Anchors { ue, reply } => {
                        let _ = reply.send(selector.anchors(ue));
                    }
                    AnchorEvent::Flush(reply) => outbox.flush(reply),
                }
            }
            tracing::debug!("anchor selector stopped");
        })
    }
}

struct Outbox {
    tunnel_tx: UnboundedSender<TunnelEvent>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Outbox {
    fn to_tunnels(&self, event: TunnelEvent) {
        if self.tunnel_tx.send(event).is_err() {
            tracing::warn!("tunnel synthesizer mailbox closed");
        }
    }

    /// Re-advertises anchors without touching tunnels.
    fn publish(&self, ue: Ue) {
        let _ = self.events.send(ControllerEvent::UeAnchorsChanged(ue));
    }

    fn anchors_changed(&self, ue: Ue) {
        self.publish(ue.clone());
        self.to_tunnels(TunnelEvent::AnchorsChanged(ue));
    }

    /// Tunnels are torn down even for UEs this selector never anchored.
    fn detached(&self, id: UeId, known: bool) {
        if known {
            let _ = self.events.send(ControllerEvent::UeDetached(id));
        }
        self.to_tunnels(TunnelEvent::UeDetached(id));
    }

    fn flush(&self, reply: oneshot::Sender<()>) {
        self.to_tunnels(TunnelEvent::Flush(reply));
    }
}
