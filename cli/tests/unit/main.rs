//! Unit tests for ephemera CLI
//!
//! These tests use mocked dependencies and run fast without external I/O.

mod architecture;
mod exec;
mod flows;
mod stages;
