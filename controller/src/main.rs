mod topology;

use anyhow::Result;
use clap::Parser;
use common::UeRegistry;
use dmm_lib::{ControllerArgs, ControllerBuilder, ControllerEvent};
use tokio::{signal, sync::broadcast::error::RecvError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use topology::{TopologyConfig, UeScript};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_thread_ids(true).compact())
        .with(EnvFilter::from_default_env())
        .init();

    let args = ControllerArgs::parse();
    let builder = ControllerBuilder::from_args(&args);
    let topology = TopologyConfig::from_file(&args.topology)?.build(builder.port_roles().clone())?;
    let controller = builder.build()?;

    let mut registry = UeRegistry::new();
    let ues = match &args.ues {
        Some(path) => UeScript::from_file(path)?.attach(&mut registry)?,
        None => Vec::new(),
    };

    let mut events = controller.subscribe();
    let logger = tokio::task::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::RouteComputed(routing)) => {
                    tracing::info!(switches = routing.len(), "routes computed");
                }
                Ok(ControllerEvent::UeAnchorsChanged(ue)) => {
                    registry.update_anchors(&ue);
                    let anchors = ue.attachment().map(|a| a.anchors.len()).unwrap_or_default();
                    let default = ue
                        .attachment()
                        .and_then(|a| a.default_anchor())
                        .map(|a| a.prefix.to_string());
                    tracing::info!(
                        ue = ue.id,
                        hw_addr = %ue.hw_addr,
                        anchors,
                        ?default,
                        "advertise anchors"
                    );
                }
                Ok(ControllerEvent::UeDetached(id)) => tracing::info!(ue = id, "ue detached"),
                Err(RecvError::Lagged(n)) => tracing::warn!(missed = n, "event logger lagging"),
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!(ues = registry.len(), "event logger stopped");
    });

    controller.update_topology(topology)?;
    for ue in ues {
        controller.ue_attached(ue)?;
    }
    controller.settle().await?;
    let rules = controller.installed_rules().await?.len();
    tracing::info!(rules, "network converged");

    let _ = signal::ctrl_c().await;
    controller.shutdown().await;
    let _ = logger.await;
    Ok(())
}
