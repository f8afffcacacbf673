//! Unit tests for error handling.
//!
//! This module contains tests for error types and error reporting.

use crate::errors::errors::{Error, ErrorImpl, ErrorTip};
use crate::Position;
use std::rc::Rc;

fn position(offset: u32) -> Position {
    Position::new(offset, 1, offset, Rc::new("test.py".to_string()))
}

#[test]
fn test_error_creation() {
    let error = Error::new(
        ErrorImpl::UnrecognisedToken {
            token: "$".to_string(),
        },
        position(10),
    );

    assert_eq!(error.get_error_name(), "UnrecognisedToken");
}

#[test]
fn test_error_position() {
    let error = Error::new(
        ErrorImpl::UnexpectedToken {
            token: "identifier".to_string(),
        },
        position(42),
    );

    assert_eq!(error.get_position().offset, 42);
    assert_eq!(error.get_position().line, 1);
}

#[test]
fn test_unrecognised_token_has_no_tip() {
    let error = Error::new(
        ErrorImpl::UnrecognisedToken {
            token: "?".to_string(),
        },
        position(0),
    );

    assert!(matches!(error.get_tip(), ErrorTip::None));
    assert_eq!(format!("{}", error.get_tip()), "");
}

#[test]
fn test_cant_set_attribute_tip() {
    let error = Error::new(
        ErrorImpl::CantSetAttribute {
            attribute: "real".to_string(),
            type_: "int".to_string(),
        },
        position(0),
    );

    assert_eq!(error.get_error_name(), "CantSetAttribute");
    let tip = format!("{}", error.get_tip());
    assert!(tip.contains("real"));
    assert!(tip.contains("int"));
}

#[test]
fn test_unsupported_target_error() {
    let error = Error::new(
        ErrorImpl::UnsupportedTarget {
            target: "f()".to_string(),
        },
        position(3),
    );

    assert_eq!(error.get_error_name(), "UnsupportedTarget");
    assert!(format!("{}", error.get_tip()).contains("f()"));
}

#[test]
fn test_error_display_includes_location() {
    let error = Error::new(
        ErrorImpl::InconsistentDedent { width: 3 },
        Position::new(20, 4, 3, Rc::new("mod.py".to_string())),
    );

    let rendered = format!("{}", error);
    assert!(rendered.contains("mod.py:4:3"));
    assert!(rendered.contains("inconsistent dedent"));
}

#[test]
fn test_error_clone() {
    let error = Error::new(
        ErrorImpl::NumberParseError {
            token: "0xZZ".to_string(),
        },
        position(5),
    );

    let cloned = error.clone();
    assert_eq!(cloned.get_error_name(), error.get_error_name());
    assert_eq!(cloned.get_position().offset, 5);
}
