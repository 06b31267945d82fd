use std::net::Ipv6Addr;
use thiserror::Error;

use crate::switch::{PortNo, SwitchId};

/// Domain-specific errors for topology bookkeeping
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Unknown switch {0:#x}")]
    UnknownSwitch(SwitchId),

    #[error("Unknown port {port} on switch {switch:#x}")]
    UnknownPort { switch: SwitchId, port: PortNo },

    #[error("Switch {0:#x} is already part of the topology")]
    DuplicateSwitch(SwitchId),

    #[error("Invalid IPv6 prefix {prefix}/{len}")]
    InvalidPrefix { prefix: Ipv6Addr, len: u8 },
}

/// Convenience type alias for Results using TopologyError
pub type TopologyResult<T> = Result<T, TopologyError>;
