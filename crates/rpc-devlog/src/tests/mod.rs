//! Test module for rpc-devlog
//!
//! Scenario tests for the interceptors and property-based tests using
//! proptest for redaction, header ordering and buffer reuse.



#[cfg(test)]
pub mod unary_tests;
