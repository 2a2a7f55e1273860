//! Concrete adapter implementations for ports.

pub mod command_log_adapter;
pub mod csv_adapter;
pub mod event_store_adapter;
pub mod file_config_adapter;
pub mod market_calendar_adapter;
pub mod text_report_adapter;
