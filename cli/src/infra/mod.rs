//! Infrastructure layer: concrete adapters behind the application ports.
//!
//! This module contains all I/O-performing code: process execution, the
//! OpenSSH transport, filesystem access, configuration loading and event
//! logging.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod config;
pub mod notify;
pub mod secrets;
pub mod source;
pub mod ssh;
