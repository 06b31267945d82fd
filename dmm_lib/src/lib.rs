pub mod anchor;
pub mod args;
pub use args::{ControllerArgs, ControllerParameters};

pub mod builder;
pub use builder::ControllerBuilder;

pub mod control;
pub use control::{Controller, ControllerEvent};

pub mod error;
pub mod flow_table;
pub mod metrics;
pub mod routing;
pub mod rule;
pub mod tunnel;

// Always exported so integration tests and benches can build topologies
// and record rule writes without a feature flag.
pub mod test_helpers {
    pub mod util;
}

/// Initialize a tracing subscriber for tests. Safe to call multiple times.
pub fn init_test_tracing() {
    use std::sync::Once;
    static START: Once = Once::new();
    START.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}
