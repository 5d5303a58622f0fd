//! Global subscriber installation
//!
//! Kept in its own test binary so the subscriber it installs never leaks
//! into the library's unit tests.

use ticketflow::logging::init_tracing;
use ticketflow::LogFormat;

#[test]
fn test_second_init_is_an_error() {
    assert!(init_tracing("debug", LogFormat::Text).is_ok());
    assert!(init_tracing("info", LogFormat::Json).is_err());
}
