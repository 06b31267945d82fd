use anyhow::{bail, Result};
use common::topology::{PortRoles, Topology};
use std::time::Duration;

use crate::{
    anchor::AnchorPolicy,
    args::{ControllerArgs, ControllerParameters},
    control::Controller,
    flow_table::{LoggingWriter, RuleWriter},
};

/// Builder for constructing a [`Controller`] with flexible configuration
///
/// # Examples
///
/// ```no_run
/// use dmm_lib::builder::ControllerBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let controller = ControllerBuilder::new()
///     .with_request_timeout(Duration::from_millis(500))
///     .with_deprecated_ttl(Some(Duration::from_secs(60)))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ControllerBuilder<W = LoggingWriter> {
    request_timeout: Duration,
    policy: AnchorPolicy,
    roles: PortRoles,
    writer: W,
}

impl Default for ControllerBuilder<LoggingWriter> {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder<LoggingWriter> {
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_millis(1000),
            policy: AnchorPolicy::default(),
            roles: PortRoles::default(),
            writer: LoggingWriter,
        }
    }

    /// Create builder from existing ControllerArgs
    pub fn from_args(args: &ControllerArgs) -> Self {
        Self::from_params(&args.params)
    }

    pub fn from_params(params: &ControllerParameters) -> Self {
        Self::new()
            .with_request_timeout(Duration::from_millis(params.request_timeout_ms))
            .with_anchor_lifetime(params.anchor_lifetime_secs)
            .with_deprecated_ttl(params.deprecated_anchor_ttl_secs.map(Duration::from_secs))
            .with_port_roles(PortRoles {
                ap_prefix: params.ap_port_prefix.clone(),
                gw_prefix: params.gw_port_prefix.clone(),
            })
    }
}

impl<W: RuleWriter> ControllerBuilder<W> {
    /// Set the timeout for queries between components (default: 1s)
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_anchor_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the lifetime of new default anchors in seconds (default: 15)
    pub fn with_anchor_lifetime(mut self, secs: u32) -> Self {
        self.policy.lifetime = secs;
        self
    }

    /// Set how long deprecated anchors survive (default: until detach)
    pub fn with_deprecated_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.policy.deprecated_ttl = ttl;
        self
    }

    pub fn with_port_roles(mut self, roles: PortRoles) -> Self {
        self.roles = roles;
        self
    }

    /// Replace the flow-table write primitive (default: log only)
    pub fn with_writer<V: RuleWriter>(self, writer: V) -> ControllerBuilder<V> {
        ControllerBuilder {
            request_timeout: self.request_timeout,
            policy: self.policy,
            roles: self.roles,
            writer,
        }
    }

    pub fn port_roles(&self) -> &PortRoles {
        &self.roles
    }

    /// Empty live topology classifying ports with the configured roles.
    pub fn topology(&self) -> Topology {
        Topology::new(self.roles.clone())
    }

    /// Spawn the controller tasks
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the request timeout is zero
    /// - the anchor lifetime is zero
    /// - no tokio runtime is running
    pub fn build(self) -> Result<Controller> {
        if self.request_timeout.is_zero() {
            bail!("request timeout must be greater than zero");
        }
        if self.policy.lifetime == 0 {
            bail!("anchor lifetime must be greater than zero");
        }
        tokio::runtime::Handle::try_current()?;
        Ok(Controller::spawn(self.writer, self.policy, self.request_timeout))
    }
}
