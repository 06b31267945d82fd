//! Topology and UE script files.
//!
//! Both are read through the `config` crate, so YAML, TOML and JSON work
//! alike, and deserialized into the plain structures below before being
//! turned into a live [`Topology`] or a list of attached UEs.

use anyhow::{Context, Result};
use common::{
    switch::DEFAULT_LINK_WEIGHT, topology::PortRoles, Link, Port, PortNo, SwitchId, Topology, Ue,
    UeRegistry,
};
use config::Config;
use mac_address::MacAddress;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PortConfig {
    pub port_no: PortNo,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SwitchConfig {
    pub id: SwitchId,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LinkConfig {
    pub src: SwitchId,
    pub src_port: PortNo,
    pub dst: SwitchId,
    pub dst_port: PortNo,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

fn default_weight() -> u32 {
    DEFAULT_LINK_WEIGHT
}

fn default_bidirectional() -> bool {
    true
}

/// Switches and links making up the initial network.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TopologyConfig {
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

impl TopologyConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let config = load_config(path)?;
        Self::from_config(config).with_context(|| format!("invalid topology file {path}"))
    }

    pub fn from_config(config: Config) -> Result<Self> {
        config.try_deserialize().map_err(Into::into)
    }

    /// Builds the live topology, classifying ports with `roles`.
    pub fn build(&self, roles: PortRoles) -> Result<Topology> {
        let mut topology = Topology::new(roles);
        for switch in &self.switches {
            let ports = switch
                .ports
                .iter()
                .map(|p| Port::new(p.port_no, p.name.clone()));
            topology
                .add_switch(switch.id, ports)
                .with_context(|| format!("switch {:#x}", switch.id))?;
        }
        for link in &self.links {
            let l = Link::new(link.src, link.src_port, link.dst, link.dst_port)
                .with_weight(link.weight);
            let res = if link.bidirectional {
                topology.add_bidirectional_link(l)
            } else {
                topology.add_link(l)
            };
            res.with_context(|| format!("link {l}"))?;
        }
        tracing::info!(
            switches = topology.len(),
            access_points = topology.access_points().count(),
            gateways = topology.gateways().count(),
            "topology loaded"
        );
        Ok(topology)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UeConfig {
    pub hw_addr: String,
    pub switch: SwitchId,
    pub port: PortNo,
}

/// UE attachments to replay at startup, in file order.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct UeScript {
    #[serde(default)]
    pub ues: Vec<UeConfig>,
}

impl UeScript {
    pub fn from_file(path: &str) -> Result<Self> {
        let config = load_config(path)?;
        config
            .try_deserialize()
            .with_context(|| format!("invalid UE script {path}"))
    }

    /// Registers every entry and returns the resulting UEs. A hardware
    /// address seen twice moves the UE rather than creating a new one.
    pub fn attach(&self, registry: &mut UeRegistry) -> Result<Vec<Ue>> {
        self.ues
            .iter()
            .map(|entry| {
                let hw_addr: MacAddress = entry
                    .hw_addr
                    .parse()
                    .with_context(|| format!("invalid hardware address {}", entry.hw_addr))?;
                Ok(registry.attach(hw_addr, entry.switch, entry.port))
            })
            .collect()
    }
}

fn load_config(path: &str) -> Result<Config> {
    Config::builder()
        .add_source(config::File::with_name(path))
        .build()
        .map_err(Into::into)
}
