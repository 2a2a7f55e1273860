//! Port traits for the collaborators the core consumes.

pub mod command_log_port;
pub mod config_port;
pub mod event_sink_port;
pub mod market_meta_port;
pub mod price_port;
pub mod rate_port;
pub mod report_port;
