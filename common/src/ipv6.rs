//! IPv6 address derivation helpers.
//!
//! Switches and UEs are identified by MAC address; their link-local, global
//! and solicited-node addresses are all derived from it (modified EUI-64).
//! Anchors hand out a /64 carved from the gateway prefix using the UE id.

use mac_address::MacAddress;
use std::{
    fmt::{Display, Formatter},
    net::Ipv6Addr,
};

use crate::error::{TopologyError, TopologyResult};

/// Length of the prefix delegated to every UE anchor.
pub const UE_PREFIX_LEN: u8 = 64;

const LINK_LOCAL: u128 = 0xfe80 << 112;

/// An IPv6 network prefix. The address is always kept masked to `len` bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv6Prefix {
    addr: Ipv6Addr,
    len: u8,
}

impl Ipv6Prefix {
    pub fn new(addr: Ipv6Addr, len: u8) -> TopologyResult<Self> {
        if len > 128 {
            return Err(TopologyError::InvalidPrefix { prefix: addr, len });
        }
        Ok(Self::masked(addr, len))
    }

    /// A /128 prefix matching exactly one address.
    pub fn host(addr: Ipv6Addr) -> Self {
        Self { addr, len: 128 }
    }

    pub(crate) fn masked(addr: Ipv6Addr, len: u8) -> Self {
        Self {
            addr: Ipv6Addr::from(u128::from(addr) & mask_bits(len)),
            len,
        }
    }

    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    pub fn netmask(&self) -> Ipv6Addr {
        Ipv6Addr::from(mask_bits(self.len))
    }

    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        u128::from(addr) & mask_bits(self.len) == u128::from(self.addr)
    }
}

impl Display for Ipv6Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

fn mask_bits(len: u8) -> u128 {
    match len {
        0 => 0,
        len => u128::MAX << (128 - u32::from(len.min(128))),
    }
}

/// Modified EUI-64 interface identifier for a MAC address.
pub fn eui64_suffix(mac: MacAddress) -> u64 {
    let b = mac.bytes();
    u64::from_be_bytes([b[0] ^ 0x02, b[1], b[2], 0xff, 0xfe, b[3], b[4], b[5]])
}

pub fn link_local_from_mac(mac: MacAddress) -> Ipv6Addr {
    Ipv6Addr::from(LINK_LOCAL | u128::from(eui64_suffix(mac)))
}

/// SLAAC global address: upper 64 bits from `prefix`, lower 64 from the MAC.
pub fn global_from_mac(prefix: &Ipv6Prefix, mac: MacAddress) -> Ipv6Addr {
    let network = u128::from(prefix.addr()) & mask_bits(UE_PREFIX_LEN);
    Ipv6Addr::from(network | u128::from(eui64_suffix(mac)))
}

/// Prefix delegated to UE `ue_id` by a gateway owning `gw_prefix`.
///
/// The UE id fills the bits between the gateway prefix length and /64, so a
/// /32 gateway prefix `2020:1::/32` gives UE 5 the prefix `2020:1:0:5::/64`.
pub fn ue_prefix(gw_prefix: &Ipv6Prefix, ue_id: u32) -> Ipv6Prefix {
    let subnet_bits = !mask_bits(gw_prefix.prefix_len()) & mask_bits(UE_PREFIX_LEN);
    let subnet = (u128::from(ue_id) << (128 - u32::from(UE_PREFIX_LEN))) & subnet_bits;
    Ipv6Prefix::masked(
        Ipv6Addr::from(u128::from(gw_prefix.addr()) | subnet),
        UE_PREFIX_LEN,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0, 0, 0, 0, 0, last])
    }

    #[test]
    fn link_local_uses_modified_eui64() {
        let addr = link_local_from_mac(mac(1));
        assert_eq!(addr, "fe80::200:ff:fe00:1".parse::<Ipv6Addr>().unwrap());
    }

    #[test]
    fn universal_local_bit_is_flipped() {
        let m = MacAddress::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(eui64_suffix(m), 0x0011_22ff_fe33_4455);
    }

    #[test]
    fn prefix_is_masked_on_construction() {
        let p = Ipv6Prefix::new("2020:1:2:3::1".parse().unwrap(), 32).unwrap();
        assert_eq!(p.addr(), "2020:1::".parse::<Ipv6Addr>().unwrap());
        assert_eq!(p.to_string(), "2020:1::/32");
        assert_eq!(
            p.netmask(),
            "ffff:ffff::".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn prefix_longer_than_128_is_rejected() {
        assert!(Ipv6Prefix::new(Ipv6Addr::UNSPECIFIED, 129).is_err());
    }

    #[test]
    fn ue_prefix_places_id_below_gateway_prefix() {
        let gw = Ipv6Prefix::new("2020:1::".parse().unwrap(), 32).unwrap();
        let p = ue_prefix(&gw, 5);
        assert_eq!(p.to_string(), "2020:1:0:5::/64");

        let p = ue_prefix(&gw, 0x0001_0002);
        assert_eq!(p.to_string(), "2020:1:1:2::/64");
    }

    #[test]
    fn global_address_combines_prefix_and_mac() {
        let gw = Ipv6Prefix::new("2020:1::".parse().unwrap(), 32).unwrap();
        let p = ue_prefix(&gw, 5);
        let addr = global_from_mac(&p, mac(9));
        assert_eq!(addr, "2020:1:0:5:200:ff:fe00:9".parse::<Ipv6Addr>().unwrap());
        assert!(p.contains(addr));
    }

    #[test]
    fn host_prefix_contains_only_itself() {
        let a: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let h = Ipv6Prefix::host(a);
        assert!(h.contains(a));
        assert!(!h.contains("2001:db8::2".parse().unwrap()));
    }
}
