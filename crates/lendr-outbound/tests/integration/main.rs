//! Integration tests for lendr-outbound
//!
//! Uses wiremock to simulate the image host and a temporary directory for
//! local photo storage.

mod common;

mod test_http_upload;
mod test_local_store;
