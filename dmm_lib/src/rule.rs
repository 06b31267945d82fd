//! Forwarding rule model.
//!
//! A rule's identity is its [`RuleKey`]: switch, table and match predicate.
//! Two rules with the same key occupy the same flow-table slot whatever their
//! actions are, and installing the second one overwrites the first.

use common::{ipv6::Ipv6Prefix, PortNo, SwitchId};
use indexmap::IndexMap;
use mac_address::MacAddress;
use std::{
    fmt::{Display, Formatter, Result},
    net::Ipv6Addr,
};

pub const TABLE_DEFAULT: u8 = 0;
pub const TABLE_UES: u8 = 1;
pub const TABLE_ROUTING: u8 = 2;
pub const TABLE_UNKNOWN: u8 = 3;
pub const TABLE_COUNT: u8 = 4;

/// OpenFlow default priority.
pub const DEFAULT_PRIORITY: u16 = 0x8000;
pub const PIPELINE_PRIORITY: u16 = 0;

pub const COOKIE: u64 = 0x00d3_3f00_0000_0000;
pub const COOKIE_MASK: u64 = 0xffff_ff00_0000_0000;

pub const ETH_TYPE_IPV6: u16 = 0x86dd;
pub const IPPROTO_ICMPV6: u8 = 58;
pub const ND_NEIGHBOR_SOLICIT: u8 = 135;
pub const ND_NEIGHBOR_ADVERT: u8 = 136;

/// Match predicate. Unset fields are wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Match {
    pub in_port: Option<PortNo>,
    pub eth_dst: Option<MacAddress>,
    pub eth_type: Option<u16>,
    pub ip_proto: Option<u8>,
    pub ipv6_src: Option<Ipv6Prefix>,
    pub ipv6_dst: Option<Ipv6Prefix>,
    pub icmpv6_type: Option<u8>,
    pub ipv6_nd_target: Option<Ipv6Addr>,
}

impl Match {
    pub fn in_port(mut self, port: PortNo) -> Self {
        self.in_port = Some(port);
        self
    }

    pub fn eth_dst(mut self, mac: MacAddress) -> Self {
        self.eth_dst = Some(mac);
        self
    }

    pub fn ipv6_src(mut self, prefix: Ipv6Prefix) -> Self {
        self.eth_type = Some(ETH_TYPE_IPV6);
        self.ipv6_src = Some(prefix);
        self
    }

    pub fn ipv6_dst(mut self, prefix: Ipv6Prefix) -> Self {
        self.eth_type = Some(ETH_TYPE_IPV6);
        self.ipv6_dst = Some(prefix);
        self
    }

    /// Neighbor Discovery message of `icmpv6_type` about `target`.
    pub fn nd(mut self, icmpv6_type: u8, target: Ipv6Addr) -> Self {
        self.eth_type = Some(ETH_TYPE_IPV6);
        self.ip_proto = Some(IPPROTO_ICMPV6);
        self.icmpv6_type = Some(icmpv6_type);
        self.ipv6_nd_target = Some(target);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Match::default()
    }
}

impl Display for Match {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let mut fields = Vec::new();
        if let Some(p) = self.in_port {
            fields.push(format!("in_port={p}"));
        }
        if let Some(m) = self.eth_dst {
            fields.push(format!("eth_dst={m}"));
        }
        if let Some(t) = self.eth_type {
            fields.push(format!("eth_type={t:#06x}"));
        }
        if let Some(p) = self.ip_proto {
            fields.push(format!("ip_proto={p}"));
        }
        if let Some(p) = self.ipv6_src {
            fields.push(format!("ipv6_src={p}"));
        }
        if let Some(p) = self.ipv6_dst {
            fields.push(format!("ipv6_dst={p}"));
        }
        if let Some(t) = self.icmpv6_type {
            fields.push(format!("icmpv6_type={t}"));
        }
        if let Some(t) = self.ipv6_nd_target {
            fields.push(format!("ipv6_nd_target={t}"));
        }
        if fields.is_empty() {
            write!(f, "*")
        } else {
            write!(f, "{}", fields.join(","))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutPort {
    Port(PortNo),
    /// OFPP_IN_PORT: send back out the port the packet came in on.
    InPort,
}

/// Output port for a rule matching `in_port`. OpenFlow drops packets output
/// on their own ingress port unless the in-port pseudo-port is used.
pub fn output_port(in_port: Option<PortNo>, out: PortNo) -> OutPort {
    if in_port == Some(out) {
        OutPort::InPort
    } else {
        OutPort::Port(out)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    SetEthSrc(MacAddress),
    SetEthDst(MacAddress),
    Output(OutPort),
    GotoTable(u8),
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Action::SetEthSrc(m) => write!(f, "set_eth_src:{m}"),
            Action::SetEthDst(m) => write!(f, "set_eth_dst:{m}"),
            Action::Output(OutPort::Port(p)) => write!(f, "output:{p}"),
            Action::Output(OutPort::InPort) => write!(f, "output:in_port"),
            Action::GotoTable(t) => write!(f, "goto_table:{t}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub switch: SwitchId,
    pub table: u8,
    pub matches: Match,
}

impl Display for RuleKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:#x}:{}:{}", self.switch, self.table, self.matches)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub switch: SwitchId,
    pub table: u8,
    pub priority: u16,
    pub matches: Match,
    pub actions: Vec<Action>,
    pub cookie: u64,
    pub cookie_mask: u64,
}

impl Rule {
    pub fn new(switch: SwitchId, table: u8, matches: Match, actions: Vec<Action>) -> Self {
        Self {
            switch,
            table,
            priority: DEFAULT_PRIORITY,
            matches,
            actions,
            cookie: COOKIE,
            cookie_mask: COOKIE_MASK,
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn key(&self) -> RuleKey {
        RuleKey {
            switch: self.switch,
            table: self.table,
            matches: self.matches.clone(),
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{:#x}:{}:{} prio={} actions=[",
            self.switch, self.table, self.matches, self.priority
        )?;
        for (i, a) in self.actions.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, "]")
    }
}

/// Rules keyed by identity, in insertion order.
pub type RuleSet = IndexMap<RuleKey, Rule>;

/// Inserts `rule`, replacing whatever occupied its slot.
pub fn add_rule(set: &mut RuleSet, rule: Rule) {
    set.insert(rule.key(), rule);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0, 0, 0, 0, 0, last])
    }

    #[test]
    fn key_ignores_actions_and_priority() {
        let m = Match::default().eth_dst(mac(3));
        let a = Rule::new(1, TABLE_ROUTING, m.clone(), vec![Action::Output(OutPort::Port(1))]);
        let b = Rule::new(1, TABLE_ROUTING, m, vec![Action::Output(OutPort::Port(2))])
            .with_priority(10);
        assert_eq!(a.key(), b.key());
        assert_ne!(a, b);
    }

    #[test]
    fn key_distinguishes_switch_table_and_match() {
        let m = Match::default().eth_dst(mac(3));
        let base = Rule::new(1, TABLE_ROUTING, m.clone(), vec![]);
        assert_ne!(base.key(), Rule::new(2, TABLE_ROUTING, m.clone(), vec![]).key());
        assert_ne!(base.key(), Rule::new(1, TABLE_UES, m, vec![]).key());
        assert_ne!(
            base.key(),
            Rule::new(1, TABLE_ROUTING, Match::default().eth_dst(mac(4)), vec![]).key()
        );
    }

    #[test]
    fn later_insert_overwrites_slot() {
        let m = Match::default().eth_dst(mac(3));
        let mut set = RuleSet::new();
        let out = |port| vec![Action::Output(OutPort::Port(port))];
        add_rule(&mut set, Rule::new(1, TABLE_ROUTING, m.clone(), out(1)));
        add_rule(&mut set, Rule::new(1, TABLE_ROUTING, m, out(2)));
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.values().next().map(|r| r.actions.clone()),
            Some(vec![Action::Output(OutPort::Port(2))])
        );
    }

    #[test]
    fn output_on_ingress_uses_in_port() {
        assert_eq!(output_port(Some(3), 3), OutPort::InPort);
        assert_eq!(output_port(Some(3), 4), OutPort::Port(4));
        assert_eq!(output_port(None, 3), OutPort::Port(3));
    }

    #[test]
    fn ip_matches_imply_ethertype() {
        let p = Ipv6Prefix::host("2001:db8::1".parse().unwrap());
        let m = Match::default().in_port(2).ipv6_dst(p);
        assert_eq!(m.eth_type, Some(ETH_TYPE_IPV6));
        assert_eq!(
            m.to_string(),
            "in_port=2,eth_type=0x86dd,ipv6_dst=2001:db8::1/128"
        );
        let nd = Match::default().nd(ND_NEIGHBOR_SOLICIT, "2001:db8::1".parse().unwrap());
        assert_eq!(nd.ip_proto, Some(IPPROTO_ICMPV6));
        assert!(Match::default().is_empty());
        assert_eq!(Match::default().to_string(), "*");
    }

    #[test]
    fn rule_display() {
        let r = Rule::new(
            0x2,
            TABLE_DEFAULT,
            Match::default(),
            vec![Action::GotoTable(TABLE_UES)],
        )
        .with_priority(PIPELINE_PRIORITY);
        assert_eq!(r.to_string(), "0x2:0:* prio=0 actions=[goto_table:1]");
    }
}
