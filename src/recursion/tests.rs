//! Unit tests for the recursion guard.

use super::recursion::{GuardState, RecursionGuard};

#[test]
fn test_unseen_is_available() {
    let guard = RecursionGuard::new();
    assert_eq!(guard.state("f"), GuardState::Available);
    assert!(!guard.is_busy("f"));
}

#[test]
fn test_enter_and_exit() {
    let mut guard = RecursionGuard::new();
    assert!(guard.try_enter("f"));
    assert_eq!(guard.state("f"), GuardState::Busy);
    assert!(!guard.try_enter("f"));
    assert_eq!(guard.depth(), 1);

    guard.exit("f");
    assert_eq!(guard.state("f"), GuardState::Available);
    assert_eq!(guard.depth(), 0);
    assert!(guard.try_enter("f"));
}

#[test]
fn test_mutual_recursion_busy() {
    let mut guard = RecursionGuard::new();
    assert!(guard.try_enter("a"));
    assert!(guard.try_enter("b"));
    assert!(!guard.try_enter("a"));
    guard.exit("b");
    assert!(!guard.try_enter("a"));
    guard.exit("a");
    assert!(guard.try_enter("a"));
}

#[test]
fn test_exit_unknown_is_noop() {
    let mut guard = RecursionGuard::new();
    guard.exit("never");
    assert_eq!(guard.depth(), 0);

    guard.try_enter("x");
    guard.reset();
    assert!(!guard.is_busy("x"));
    assert_eq!(guard.depth(), 0);
}
