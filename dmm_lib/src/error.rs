use common::{SwitchId, UeId};
use std::time::Duration;
use thiserror::Error;

use crate::rule::RuleKey;

/// Domain-specific errors for path computation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("No route from {src:#x} to {dst:#x}")]
    RouteNotFound { src: SwitchId, dst: SwitchId },

    #[error("Unknown switch {0:#x}")]
    UnknownSwitch(SwitchId),
}

/// Domain-specific errors for anchor selection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    #[error("Switch {0:#x} is not a gateway")]
    UnknownGateway(SwitchId),

    #[error("Unknown switch {0:#x}")]
    UnknownSwitch(SwitchId),

    #[error("UE {0} is not attached")]
    NotAttached(UeId),

    #[error("Unknown UE {0}")]
    UnknownUe(UeId),
}

/// Failures reported by the external flow-table primitive
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Failed to write rule {key}: {reason}")]
    RuleWriteFailed { key: RuleKey, reason: String },

    #[error("Failed to delete rule {key}: {reason}")]
    RuleDeleteFailed { key: RuleKey, reason: String },
}

/// Errors surfaced by the component runtime
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("{0} mailbox is closed")]
    ChannelClosed(&'static str),

    #[error("{component} did not reply within {waited:?}")]
    Timeout {
        component: &'static str,
        waited: Duration,
    },

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Anchor error: {0}")]
    Anchor(#[from] AnchorError),
}

/// Convenience type alias for Results using RoutingError
pub type RouteResult<T> = Result<T, RoutingError>;

/// Convenience type alias for Results using AnchorError
pub type AnchorResult<T> = Result<T, AnchorError>;

/// Convenience type alias for Results using FlowError
pub type FlowResult<T> = Result<T, FlowError>;

/// Convenience type alias for Results using ControlError
pub type ControlResult<T> = Result<T, ControlError>;
