//! Core domain types and logic.

pub mod alarm;
pub mod backup;
pub mod cmd_parser;
pub mod config_validation;
pub mod error;
pub mod event_record;
pub mod fetch_config;
pub mod holding;
pub mod market;
pub mod portfolio;
pub mod price_bar;
pub mod report;
pub mod sector;
pub mod sref;
pub mod stalker;
pub mod stalker_cmd;
pub mod threshold;
