//! All-pairs shortest paths over the switch graph and the destination-based
//! forwarding rules derived from them.

pub mod dijkstra;
pub mod engine;
pub mod path;
pub mod rules;

pub use dijkstra::{compute_shortest_paths, shortest_path_tree, RoutingResult, SourceTree};
pub use engine::RoutingEngine;
pub use path::{extract_path, Path};
pub use rules::{routing_rules, synthesize_routing_rules};
