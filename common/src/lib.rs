pub mod error;
pub mod ipv6;
pub mod switch;
pub mod topology;
pub mod ue;

pub use switch::{Link, Port, PortNo, Switch, SwitchId};
pub use topology::Topology;
pub use ue::{Anchor, Attachment, Ue, UeId, UeRegistry};
