//! Mobility anchor selection.

pub mod pgw;
pub mod selector;

pub use pgw::{pgw_score, select_pgw};
pub use selector::{AnchorPolicy, AnchorSelector, AnchorUpdate};
