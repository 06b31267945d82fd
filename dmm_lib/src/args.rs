use clap::Parser;

#[derive(clap::Args, Clone, Debug)]
pub struct ControllerParameters {
    /// Timeout in milliseconds for queries between components
    #[arg(long, default_value_t = 1000)]
    pub request_timeout_ms: u64,

    /// Port-name prefix that marks a switch as access point
    #[arg(long, default_value = "wlan")]
    pub ap_port_prefix: String,

    /// Port-name prefix that marks a switch as gateway
    #[arg(long, default_value = "gw")]
    pub gw_port_prefix: String,

    /// Drop deprecated anchors after this many seconds (kept until detach if unset)
    #[arg(long)]
    pub deprecated_anchor_ttl_secs: Option<u64>,

    /// Router/valid/preferred lifetime in seconds of a new default anchor
    #[arg(long, default_value_t = 15)]
    pub anchor_lifetime_secs: u32,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ControllerArgs {
    /// Topology file (YAML, TOML or JSON)
    #[arg(short, long)]
    pub topology: String,

    /// UE attachment script
    #[arg(short, long)]
    pub ues: Option<String>,

    /// Controller Parameters
    #[command(flatten)]
    pub params: ControllerParameters,
}
