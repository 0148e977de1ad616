//! Integration test modules for fleet-collector.
//!
//! This module organizes all integration tests that verify
//! end-to-end behaviour of a collection run against fake transports.

mod common;
