//! User equipment, attachment points and anchors.

use mac_address::MacAddress;
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    net::Ipv6Addr,
    time::Instant,
};

use crate::{
    ipv6::{global_from_mac, link_local_from_mac, Ipv6Prefix},
    switch::{hw_addr_from_id, PortNo, SwitchId},
};

pub type UeId = u32;

/// Default router/valid/preferred lifetime (seconds) for a fresh anchor.
pub const DEFAULT_ANCHOR_LIFETIME: u32 = 15;

const MAX_HISTORY: usize = 16;

/// A gateway that serves as mobility anchor for a UE, together with the
/// prefix it delegated and the lifetimes to advertise for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Anchor {
    pub gw: SwitchId,
    pub prefix: Ipv6Prefix,
    pub router_lft: u32,
    pub valid_lft: u32,
    pub preferred_lft: u32,
    pub last_advertised: Option<Instant>,
    pub deprecated_since: Option<Instant>,
}

impl Anchor {
    pub fn new(gw: SwitchId, prefix: Ipv6Prefix, lifetime: u32) -> Self {
        Self {
            gw,
            prefix,
            router_lft: lifetime,
            valid_lft: lifetime,
            preferred_lft: lifetime,
            last_advertised: None,
            deprecated_since: None,
        }
    }

    /// The default anchor is the only one new sessions should use.
    pub fn is_default(&self) -> bool {
        self.preferred_lft > 0
    }

    /// Keeps the prefix valid for ongoing sessions but stops new ones.
    pub fn deprecate(&mut self, now: Instant) {
        self.preferred_lft = 0;
        self.deprecated_since.get_or_insert(now);
    }

    pub fn gw_hw_addr(&self) -> MacAddress {
        hw_addr_from_id(self.gw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub switch: SwitchId,
    pub port: PortNo,
    pub active: bool,
    /// Anchors keyed by gateway id.
    pub anchors: BTreeMap<SwitchId, Anchor>,
}

impl Attachment {
    pub fn new(switch: SwitchId, port: PortNo) -> Self {
        Self {
            switch,
            port,
            active: true,
            anchors: Default::default(),
        }
    }

    pub fn same_point(&self, other: &Attachment) -> bool {
        self.switch == other.switch && self.port == other.port
    }

    pub fn default_anchor(&self) -> Option<&Anchor> {
        self.anchors.values().find(|a| a.is_default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ue {
    pub id: UeId,
    pub hw_addr: MacAddress,
    pub ipv6_addr: Ipv6Addr,
    attachment: Option<Attachment>,
    history: VecDeque<Attachment>,
}

impl Ue {
    pub fn new(id: UeId, hw_addr: MacAddress) -> Self {
        Self {
            id,
            hw_addr,
            ipv6_addr: link_local_from_mac(hw_addr),
            attachment: None,
            history: VecDeque::new(),
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn attachment_mut(&mut self) -> Option<&mut Attachment> {
        self.attachment.as_mut()
    }

    /// Replaces the current attachment. The previous one is kept, inactive,
    /// as the most recent history entry.
    pub fn set_attachment(&mut self, attachment: Option<Attachment>) {
        if let Some(mut old) = self.attachment.take() {
            old.active = false;
            self.history.push_front(old);
            self.history.truncate(MAX_HISTORY);
        }
        self.attachment = attachment;
    }

    pub fn prev_attachment(&self) -> Option<&Attachment> {
        self.history.front()
    }

    pub fn prev_attachment_mut(&mut self) -> Option<&mut Attachment> {
        self.history.front_mut()
    }

    /// Past attachments, most recent first.
    pub fn history(&self) -> impl Iterator<Item = &Attachment> {
        self.history.iter()
    }

    /// Global address the UE autoconfigures from an anchor prefix.
    pub fn global_addr(&self, anchor: &Anchor) -> Ipv6Addr {
        global_from_mac(&anchor.prefix, self.hw_addr)
    }
}

/// Assigns stable ids to UEs as they first attach and tracks where each one is.
#[derive(Debug, Default)]
pub struct UeRegistry {
    last_id: UeId,
    ues: HashMap<MacAddress, Ue>,
}

impl UeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attachment and returns the updated UE. Unknown hardware
    /// addresses get the next free id.
    pub fn attach(&mut self, hw_addr: MacAddress, switch: SwitchId, port: PortNo) -> Ue {
        let ue = self.ues.entry(hw_addr).or_insert_with(|| {
            self.last_id += 1;
            tracing::debug!(id = self.last_id, %hw_addr, "new UE");
            Ue::new(self.last_id, hw_addr)
        });
        ue.set_attachment(Some(Attachment::new(switch, port)));
        ue.clone()
    }

    /// Marks the UE as detached. Its anchors are released.
    pub fn detach(&mut self, hw_addr: &MacAddress) -> Option<Ue> {
        let ue = self.ues.get_mut(hw_addr)?;
        if let Some(att) = ue.attachment_mut() {
            att.anchors.clear();
        }
        ue.set_attachment(None);
        Some(ue.clone())
    }

    /// Stores anchors computed elsewhere for an already known UE.
    pub fn update_anchors(&mut self, updated: &Ue) {
        let Some(ue) = self.ues.get_mut(&updated.hw_addr) else {
            return;
        };
        if let (Some(cur), Some(new)) = (ue.attachment.as_mut(), updated.attachment()) {
            if cur.same_point(new) {
                cur.anchors = new.anchors.clone();
            }
        }
    }

    pub fn get(&self, hw_addr: &MacAddress) -> Option<&Ue> {
        self.ues.get(hw_addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ue> {
        self.ues.values()
    }

    pub fn len(&self) -> usize {
        self.ues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ues.is_empty()
    }
}
