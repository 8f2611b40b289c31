//! Integration tests for ephemera CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! None of them reach the network.

mod cli_tests;
