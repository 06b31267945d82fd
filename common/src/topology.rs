//! Live switch topology.
//!
//! The topology is owned by whoever consumes discovery notifications (switch
//! enter/leave, link add/delete, port add/modify/delete). Consumers of the
//! routing pipeline only ever see an owned [`Topology::snapshot`].

use std::collections::BTreeMap;

use crate::{
    error::{TopologyError, TopologyResult},
    switch::{AccessPointConf, GatewayConf, Link, Port, PortNo, Switch, SwitchId},
};

pub const DEFAULT_AP_PORT_PREFIX: &str = "wlan";
pub const DEFAULT_GW_PORT_PREFIX: &str = "gw";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortRole {
    AccessPoint,
    Gateway,
}

/// Port-name prefixes that assign a role to the owning switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortRoles {
    pub ap_prefix: String,
    pub gw_prefix: String,
}

impl Default for PortRoles {
    fn default() -> Self {
        Self {
            ap_prefix: DEFAULT_AP_PORT_PREFIX.to_string(),
            gw_prefix: DEFAULT_GW_PORT_PREFIX.to_string(),
        }
    }
}

impl PortRoles {
    pub fn classify(&self, port: &Port) -> Option<PortRole> {
        if port.name.starts_with(&self.ap_prefix) {
            Some(PortRole::AccessPoint)
        } else if port.name.starts_with(&self.gw_prefix) {
            Some(PortRole::Gateway)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Topology {
    switches: BTreeMap<SwitchId, Switch>,
    roles: PortRoles,
}

impl Topology {
    pub fn new(roles: PortRoles) -> Self {
        Self {
            switches: BTreeMap::new(),
            roles,
        }
    }

    /// Owned copy handed to other components.
    pub fn snapshot(&self) -> Topology {
        self.clone()
    }

    pub fn roles(&self) -> &PortRoles {
        &self.roles
    }

    pub fn get(&self, id: SwitchId) -> Option<&Switch> {
        self.switches.get(&id)
    }

    pub fn contains(&self, id: SwitchId) -> bool {
        self.switches.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Switch ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.switches.keys().copied()
    }

    pub fn switches(&self) -> impl Iterator<Item = &Switch> {
        self.switches.values()
    }

    pub fn access_points(&self) -> impl Iterator<Item = &Switch> {
        self.switches.values().filter(|s| s.is_access_point())
    }

    pub fn gateways(&self) -> impl Iterator<Item = &Switch> {
        self.switches.values().filter(|s| s.is_gateway())
    }

    pub fn is_gateway(&self, id: SwitchId) -> bool {
        self.get(id).is_some_and(Switch::is_gateway)
    }

    pub fn add_switch(
        &mut self,
        id: SwitchId,
        ports: impl IntoIterator<Item = Port>,
    ) -> TopologyResult<&Switch> {
        if self.switches.contains_key(&id) {
            return Err(TopologyError::DuplicateSwitch(id));
        }
        let mut switch = Switch::new(id, ports);
        let ports: Vec<Port> = switch.ports().cloned().collect();
        for port in &ports {
            self.apply_role(&mut switch, port);
        }
        tracing::info!(
            switch = format_args!("{id:#x}"),
            access_point = switch.is_access_point(),
            gateway = switch.is_gateway(),
            "switch connected"
        );
        Ok(self.switches.entry(id).or_insert(switch))
    }

    /// Removes the switch. Links other switches hold towards it are left in
    /// place until discovery reports them gone; path computation ignores them.
    pub fn remove_switch(&mut self, id: SwitchId) -> TopologyResult<Switch> {
        let switch = self
            .switches
            .remove(&id)
            .ok_or(TopologyError::UnknownSwitch(id))?;
        tracing::info!(switch = format_args!("{id:#x}"), "switch disconnected");
        Ok(switch)
    }

    pub fn add_link(&mut self, link: Link) -> TopologyResult<()> {
        let switch = self
            .switches
            .get_mut(&link.src)
            .ok_or(TopologyError::UnknownSwitch(link.src))?;
        switch.links.entry(link.dst).or_default().push(link);
        tracing::info!(%link, "link appeared");
        Ok(())
    }

    /// Adds `link` and its reverse.
    pub fn add_bidirectional_link(&mut self, link: Link) -> TopologyResult<()> {
        if !self.contains(link.dst) {
            return Err(TopologyError::UnknownSwitch(link.dst));
        }
        self.add_link(link)?;
        self.add_link(link.reversed())
    }

    /// Removes the link with the same endpoints. Returns whether one was found.
    pub fn remove_link(&mut self, link: &Link) -> TopologyResult<bool> {
        let switch = self
            .switches
            .get_mut(&link.src)
            .ok_or(TopologyError::UnknownSwitch(link.src))?;
        let Some(links) = switch.links.get_mut(&link.dst) else {
            return Ok(false);
        };
        let before = links.len();
        links.retain(|l| !l.same_endpoints(link));
        let removed = links.len() != before;
        if links.is_empty() {
            switch.links.remove(&link.dst);
        }
        if removed {
            tracing::info!(%link, "link disappeared");
        }
        Ok(removed)
    }

    pub fn add_port(&mut self, id: SwitchId, port: Port) -> TopologyResult<()> {
        let mut switch = self
            .switches
            .remove(&id)
            .ok_or(TopologyError::UnknownSwitch(id))?;
        self.apply_role(&mut switch, &port);
        tracing::info!(
            switch = format_args!("{id:#x}"),
            port = port.port_no,
            name = %port.name,
            "port added"
        );
        switch.ports_mut().insert(port.port_no, port);
        self.switches.insert(id, switch);
        Ok(())
    }

    pub fn modify_port(&mut self, id: SwitchId, port: Port) -> TopologyResult<()> {
        let switch = self
            .switches
            .get_mut(&id)
            .ok_or(TopologyError::UnknownSwitch(id))?;
        let slot = switch
            .ports_mut()
            .get_mut(&port.port_no)
            .ok_or(TopologyError::UnknownPort {
                switch: id,
                port: port.port_no,
            })?;
        tracing::info!(switch = format_args!("{id:#x}"), port = port.port_no, "port modified");
        *slot = port;
        Ok(())
    }

    /// Removes a port, clearing the AP/GW role it carried.
    pub fn remove_port(&mut self, id: SwitchId, port_no: PortNo) -> TopologyResult<bool> {
        let switch = self
            .switches
            .get_mut(&id)
            .ok_or(TopologyError::UnknownSwitch(id))?;
        let Some(port) = switch.ports_mut().remove(&port_no) else {
            return Ok(false);
        };
        if switch.ap_conf.is_some_and(|c| c.port == port_no) {
            switch.ap_conf = None;
        }
        if switch.gw_conf.is_some_and(|c| c.port == port_no) {
            switch.gw_conf = None;
        }
        tracing::info!(
            switch = format_args!("{id:#x}"),
            port = port_no,
            name = %port.name,
            "port deleted"
        );
        Ok(true)
    }

    /// Marks a switch as access point regardless of port naming.
    pub fn set_access_point(&mut self, id: SwitchId, port: PortNo) -> TopologyResult<()> {
        let switch = self
            .switches
            .get_mut(&id)
            .ok_or(TopologyError::UnknownSwitch(id))?;
        switch.ap_conf = Some(AccessPointConf { port });
        Ok(())
    }

    /// Marks a switch as gateway regardless of port naming.
    pub fn set_gateway(&mut self, id: SwitchId, conf: GatewayConf) -> TopologyResult<()> {
        let switch = self
            .switches
            .get_mut(&id)
            .ok_or(TopologyError::UnknownSwitch(id))?;
        switch.gw_conf = Some(conf);
        Ok(())
    }

    fn apply_role(&self, switch: &mut Switch, port: &Port) {
        match self.roles.classify(port) {
            Some(PortRole::AccessPoint) => {
                switch.ap_conf = Some(AccessPointConf { port: port.port_no });
            }
            Some(PortRole::Gateway) => {
                switch.gw_conf = Some(GatewayConf::for_switch(switch.id(), port.port_no));
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(names: &[(PortNo, &str)]) -> Vec<Port> {
        names.iter().map(|(n, s)| Port::new(*n, *s)).collect()
    }

    #[test]
    fn roles_are_derived_from_port_names() {
        let mut topo = Topology::default();
        topo.add_switch(1, ports(&[(1, "eth1"), (2, "wlan0")])).unwrap();
        topo.add_switch(2, ports(&[(1, "eth1"), (3, "gw0")])).unwrap();
        topo.add_switch(3, ports(&[(1, "eth1")])).unwrap();

        assert_eq!(topo.get(1).and_then(|s| s.ap_conf()).map(|c| c.port), Some(2));
        assert!(topo.is_gateway(2));
        assert_eq!(topo.get(2).and_then(|s| s.gw_conf()).map(|c| c.port), Some(3));
        assert!(!topo.get(3).unwrap().is_access_point());
        assert_eq!(topo.access_points().count(), 1);
        assert_eq!(topo.gateways().count(), 1);
    }

    #[test]
    fn duplicate_switch_is_rejected() {
        let mut topo = Topology::default();
        topo.add_switch(1, []).unwrap();
        assert_eq!(
            topo.add_switch(1, []).unwrap_err(),
            TopologyError::DuplicateSwitch(1)
        );
    }

    #[test]
    fn link_from_unknown_switch_is_rejected() {
        let mut topo = Topology::default();
        let err = topo.add_link(Link::new(9, 1, 1, 1)).unwrap_err();
        assert_eq!(err, TopologyError::UnknownSwitch(9));
        assert!(topo.is_empty());
    }

    #[test]
    fn remove_link_matches_endpoints() {
        let mut topo = Topology::default();
        topo.add_switch(1, []).unwrap();
        topo.add_switch(2, []).unwrap();
        topo.add_bidirectional_link(Link::new(1, 1, 2, 1)).unwrap();
        topo.add_link(Link::new(1, 2, 2, 2)).unwrap();

        assert_eq!(topo.get(1).unwrap().links_to(2).len(), 2);
        assert!(topo.remove_link(&Link::new(1, 1, 2, 1).with_weight(5)).unwrap());
        assert!(!topo.remove_link(&Link::new(1, 1, 2, 1)).unwrap());
        assert_eq!(topo.get(1).unwrap().links_to(2).len(), 1);
        assert_eq!(topo.get(2).unwrap().links_to(1).len(), 1);
    }

    #[test]
    fn removing_role_port_clears_role() {
        let mut topo = Topology::default();
        topo.add_switch(1, ports(&[(1, "eth1")])).unwrap();
        topo.add_port(1, Port::new(5, "gw-uplink")).unwrap();
        assert!(topo.is_gateway(1));

        assert!(topo.remove_port(1, 5).unwrap());
        assert!(!topo.is_gateway(1));
        assert!(!topo.remove_port(1, 5).unwrap());
    }

    #[test]
    fn modify_unknown_port_fails() {
        let mut topo = Topology::default();
        topo.add_switch(1, ports(&[(1, "eth1")])).unwrap();
        assert!(topo.modify_port(1, Port::new(1, "eth1-renamed")).is_ok());
        assert_eq!(
            topo.modify_port(1, Port::new(2, "eth2")).unwrap_err(),
            TopologyError::UnknownPort { switch: 1, port: 2 }
        );
    }

    #[test]
    fn snapshot_is_independent_of_live_state() {
        let mut topo = Topology::default();
        topo.add_switch(1, []).unwrap();
        let snap = topo.snapshot();
        topo.remove_switch(1).unwrap();
        assert!(snap.contains(1));
        assert!(!topo.contains(1));
    }

    #[test]
    fn custom_roles() {
        let roles = PortRoles {
            ap_prefix: "radio".into(),
            gw_prefix: "wan".into(),
        };
        let mut topo = Topology::new(roles);
        topo.add_switch(1, ports(&[(1, "radio0"), (2, "wan0")])).unwrap();
        let sw = topo.get(1).unwrap();
        assert!(sw.is_access_point());
        assert!(sw.is_gateway());
    }
}
