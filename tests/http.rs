// Root of the 'http' integration test crate. The test modules live in
// tests/http/.
#![cfg(unix)]

mod common;

mod http {
    mod api_tests;
    mod server_tests;
}
