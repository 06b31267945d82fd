use common::{
    topology::Topology, ue::Attachment, Link, Port, PortNo, SwitchId, Ue, UeId,
};
use mac_address::MacAddress;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use crate::{flow_table::RuleWriter, rule::Rule};

/// Port UEs attach through on switches created by [`add_access_point`].
pub const AP_PORT: PortNo = 10;
/// External port on switches created by [`add_gateway`].
pub const GW_PORT: PortNo = 20;

pub fn mk_topology() -> Topology {
    Topology::default()
}

pub fn add_plain(topo: &mut Topology, id: SwitchId) {
    topo.add_switch(id, [Port::new(1, "eth1")]).unwrap();
}

pub fn add_access_point(topo: &mut Topology, id: SwitchId) {
    topo.add_switch(id, [Port::new(1, "eth1"), Port::new(AP_PORT, "wlan0")])
        .unwrap();
}

pub fn add_gateway(topo: &mut Topology, id: SwitchId) {
    topo.add_switch(id, [Port::new(1, "eth1"), Port::new(GW_PORT, "gw0")])
        .unwrap();
}

/// Adds a bidirectional link `a:a_port <-> b:b_port`.
pub fn connect(
    topo: &mut Topology,
    a: SwitchId,
    a_port: PortNo,
    b: SwitchId,
    b_port: PortNo,
    weight: u32,
) {
    topo.add_bidirectional_link(Link::new(a, a_port, b, b_port).with_weight(weight))
        .unwrap();
}

/// Chain `ids[0] - ids[1] - ...` with unit weights. Switch `i` uses port
/// 100 + next id towards its successor and 100 + previous id backwards.
pub fn chain(topo: &mut Topology, ids: &[SwitchId]) {
    for pair in ids.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        connect(topo, a, 100 + b as PortNo, b, 100 + a as PortNo, 1);
    }
}

pub fn ue_mac(id: u8) -> MacAddress {
    MacAddress::new([0x02, 0xaa, 0, 0, 0, id])
}

/// UE attached at `switch` on the access-point port.
pub fn mk_ue(id: UeId, switch: SwitchId) -> Ue {
    let mut ue = Ue::new(id, ue_mac(id as u8));
    ue.set_attachment(Some(Attachment::new(switch, AP_PORT)));
    ue
}

/// Moves `ue` to `switch`, keeping the old attachment in its history.
pub fn move_ue(ue: &Ue, switch: SwitchId) -> Ue {
    let mut moved = ue.clone();
    moved.set_attachment(Some(Attachment::new(switch, AP_PORT)));
    moved
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Write(Rule),
    Delete(Rule),
}

/// Rule writer that records successful operations and can be told to fail
/// for specific switches. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingWriter {
    ops: Arc<Mutex<Vec<WriteOp>>>,
    failing: Arc<Mutex<HashSet<SwitchId>>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, switch: SwitchId) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(switch);
    }

    pub fn heal(&self, switch: SwitchId) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&switch);
    }

    pub fn ops(&self) -> Vec<WriteOp> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn writes(&self) -> Vec<Rule> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                WriteOp::Write(r) => Some(r),
                WriteOp::Delete(_) => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<Rule> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                WriteOp::Delete(r) => Some(r),
                WriteOp::Write(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, rule: &Rule, op: WriteOp) -> anyhow::Result<()> {
        if self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&rule.switch)
        {
            anyhow::bail!("switch {:#x} rejected the request", rule.switch);
        }
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).push(op);
        Ok(())
    }
}

impl RuleWriter for RecordingWriter {
    fn write(&mut self, rule: &Rule) -> anyhow::Result<()> {
        self.record(rule, WriteOp::Write(rule.clone()))
    }

    fn delete(&mut self, rule: &Rule) -> anyhow::Result<()> {
        self.record(rule, WriteOp::Delete(rule.clone()))
    }
}
