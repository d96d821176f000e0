//! Integration tests for ledgersync-xero
//!
//! Uses wiremock to simulate the Xero accounting API and identity
//! endpoints, and verifies paging, normalization, 429 back-off and the
//! token exchange end to end.

mod common;

mod test_fetch;
mod test_retry;
mod test_token;
