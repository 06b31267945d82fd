use tokio::{
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    task::JoinHandle,
};

use super::events::FlowCommand;
use crate::{
    flow_table::{FlowTable, RuleSink, RuleWriter},
    rule::{Rule, RuleKey},
};

/// Sink that forwards reconciled rules to the flow-table task.
#[derive(Clone, Debug)]
pub struct FlowTableHandle {
    tx: UnboundedSender<FlowCommand>,
}

impl FlowTableHandle {
    pub fn new(tx: UnboundedSender<FlowCommand>) -> Self {
        Self { tx }
    }

    /// Replies once every command queued before it has been applied.
    pub fn flush(&self, reply: oneshot::Sender<()>) {
        self.send(FlowCommand::Flush(reply));
    }

    fn send(&self, cmd: FlowCommand) {
        if self.tx.send(cmd).is_err() {
            tracing::warn!("flow table mailbox closed, dropping command");
        }
    }
}

impl RuleSink for FlowTableHandle {
    fn install(&mut self, rule: Rule) {
        self.send(FlowCommand::Install(rule));
    }

    fn remove(&mut self, key: RuleKey) {
        self.send(FlowCommand::Remove(key));
    }
}

pub(crate) fn spawn<W: RuleWriter>(
    mut rx: UnboundedReceiver<FlowCommand>,
    writer: W,
) -> JoinHandle<()> {
    tokio::task::spawn(async move {
        let mut table = FlowTable::new(writer);
        while let Some(cmd) = rx.recv().await {
            match cmd {
                FlowCommand::Install(rule) => table.install(rule),
                FlowCommand::Remove(key) => RuleSink::remove(&mut table, key),
                FlowCommand::Installed(reply) => {
                    let _ = reply.send(table.installed().cloned().collect());
                }
                FlowCommand::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }
        tracing::debug!(rules = table.len(), "flow table stopped");
    })
}
