//! Integration tests for ledgersync-server

mod common;
mod test_http;
