use mac_address::MacAddress;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result},
    net::Ipv6Addr,
};

use crate::ipv6::Ipv6Prefix;

/// OpenFlow datapath id.
pub type SwitchId = u64;
pub type PortNo = u32;

pub const DEFAULT_LINK_WEIGHT: u32 = 1;

/// Length of the prefix every gateway announces for itself.
pub const GATEWAY_PREFIX_LEN: u8 = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Port {
    pub port_no: PortNo,
    pub name: String,
}

impl Port {
    pub fn new(port_no: PortNo, name: impl Into<String>) -> Self {
        Self {
            port_no,
            name: name.into(),
        }
    }
}

/// Directed edge between two switch ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    pub src: SwitchId,
    pub src_port: PortNo,
    pub dst: SwitchId,
    pub dst_port: PortNo,
    pub weight: u32,
}

impl Link {
    pub fn new(src: SwitchId, src_port: PortNo, dst: SwitchId, dst_port: PortNo) -> Self {
        Self {
            src,
            src_port,
            dst,
            dst_port,
            weight: DEFAULT_LINK_WEIGHT,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// The same physical link seen from the other end.
    pub fn reversed(&self) -> Self {
        Self {
            src: self.dst,
            src_port: self.dst_port,
            dst: self.src,
            dst_port: self.src_port,
            weight: self.weight,
        }
    }

    /// Links are identified by their endpoints; weight is not part of identity.
    pub fn same_endpoints(&self, other: &Link) -> bool {
        self.src == other.src
            && self.src_port == other.src_port
            && self.dst == other.dst
            && self.dst_port == other.dst_port
    }
}

impl Display for Link {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{:#x}:{} => {:#x}:{} (weight {})",
            self.src, self.src_port, self.dst, self.dst_port, self.weight
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessPointConf {
    /// Wireless port UEs attach through
    pub port: PortNo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayConf {
    /// Port facing the external network
    pub port: PortNo,
    pub nw_prefix: Ipv6Prefix,
}

impl GatewayConf {
    /// Gateway configuration derived from the datapath id: `2020:<low 16 bits>::/32`.
    pub fn for_switch(id: SwitchId, port: PortNo) -> Self {
        let hextet = u128::from(id & 0xffff);
        let addr = Ipv6Addr::from((0x2020u128 << 112) | (hextet << 96));
        Self {
            port,
            nw_prefix: Ipv6Prefix::masked(addr, GATEWAY_PREFIX_LEN),
        }
    }
}

/// Hardware address of a switch: the 48 low bits of its datapath id.
pub fn hw_addr_from_id(id: SwitchId) -> MacAddress {
    let b = id.to_be_bytes();
    MacAddress::new([b[2], b[3], b[4], b[5], b[6], b[7]])
}

#[derive(Clone, Debug, PartialEq)]
pub struct Switch {
    id: SwitchId,
    hw_addr: MacAddress,
    ports: BTreeMap<PortNo, Port>,
    pub(crate) ap_conf: Option<AccessPointConf>,
    pub(crate) gw_conf: Option<GatewayConf>,
    pub(crate) links: BTreeMap<SwitchId, Vec<Link>>,
}

impl Switch {
    pub fn new(id: SwitchId, ports: impl IntoIterator<Item = Port>) -> Self {
        Self {
            id,
            hw_addr: hw_addr_from_id(id),
            ports: ports.into_iter().map(|p| (p.port_no, p)).collect(),
            ap_conf: None,
            gw_conf: None,
            links: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> SwitchId {
        self.id
    }

    pub fn hw_addr(&self) -> MacAddress {
        self.hw_addr
    }

    pub fn port(&self, port_no: PortNo) -> Option<&Port> {
        self.ports.get(&port_no)
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub(crate) fn ports_mut(&mut self) -> &mut BTreeMap<PortNo, Port> {
        &mut self.ports
    }

    pub fn is_access_point(&self) -> bool {
        self.ap_conf.is_some()
    }

    pub fn is_gateway(&self) -> bool {
        self.gw_conf.is_some()
    }

    pub fn ap_conf(&self) -> Option<&AccessPointConf> {
        self.ap_conf.as_ref()
    }

    pub fn gw_conf(&self) -> Option<&GatewayConf> {
        self.gw_conf.as_ref()
    }

    /// All outgoing links, grouped by neighbor in ascending id order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values().flatten()
    }

    /// Parallel links towards `neighbor`.
    pub fn links_to(&self, neighbor: SwitchId) -> &[Link] {
        self.links.get(&neighbor).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn neighbors(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.links
            .iter()
            .filter(|(_, links)| !links.is_empty())
            .map(|(id, _)| *id)
    }
}
