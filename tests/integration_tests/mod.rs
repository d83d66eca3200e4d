//! End-to-end tests against a mock upstream
//!
//! Each test starts its own `wiremock` server standing in for USNO and the
//! NASA catalogs and writes into a fresh temporary directory.

mod error_scenarios;
mod pipeline_test;
mod relay_test;
