#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod cli;
pub mod config;
pub mod error;
pub mod extension;
pub mod launch;
pub mod list_output;
pub mod logging;
pub mod notifier;
pub mod paths;
pub mod pick;
pub mod provider;
pub mod record;
pub mod registry;
pub mod registry_xml;
pub mod source;
pub mod watch;
