//! Merge guarantees checked over every small cart.
//!
//! Carts are drawn from three keys, each absent or present with quantity 1
//! or 3 and timestamp 5 or 20, and every (guest, account) pair is merged.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::{HashMap, HashSet};

use cartline_core::{CartLine, LineKey, reconcile_at};
use cartline_integration_tests::{at, line};

const NOW: i64 = 1_000;

const KEYS: [(i32, Option<&str>); 3] = [(1, None), (1, Some("Box of 6")), (2, None)];

/// Each key is absent or one of four (quantity, timestamp) states.
const STATES: [Option<(u32, i64)>; 5] = [
    None,
    Some((1, 5)),
    Some((1, 20)),
    Some((3, 5)),
    Some((3, 20)),
];

fn all_carts() -> Vec<Vec<CartLine>> {
    let mut carts = vec![Vec::new()];
    for (product, variant) in KEYS {
        carts = carts
            .into_iter()
            .flat_map(|cart| {
                STATES.iter().map(move |state| {
                    let mut cart = cart.clone();
                    if let Some((quantity, modified)) = state {
                        cart.push(line(product, variant, *quantity, *modified));
                    }
                    cart
                })
            })
            .collect();
    }
    carts
}

fn by_key(lines: &[CartLine]) -> HashMap<LineKey, &CartLine> {
    lines.iter().map(|line| (line.key(), line)).collect()
}

fn keys(lines: &[CartLine]) -> HashSet<LineKey> {
    lines.iter().map(CartLine::key).collect()
}

#[test]
fn test_merge_guarantees_hold_for_every_pair() {
    let carts = all_carts();
    assert_eq!(carts.len(), 125);

    for local in &carts {
        for remote in &carts {
            let merged = reconcile_at(local.clone(), remote.clone(), at(NOW));
            let merged_by_key = by_key(&merged);

            // One line per key, and every key from either side survives.
            assert_eq!(merged_by_key.len(), merged.len());
            let expected: HashSet<LineKey> = keys(local).union(&keys(remote)).cloned().collect();
            assert_eq!(keys(&merged), expected);

            // No quantity is lost.
            for side in [local, remote] {
                for line in side {
                    assert!(merged_by_key[&line.key()].quantity >= line.quantity);
                }
            }

            // Key coverage does not depend on argument order.
            let swapped = reconcile_at(remote.clone(), local.clone(), at(NOW));
            assert_eq!(keys(&swapped), keys(&merged));
        }
    }
}

#[test]
fn test_empty_side_is_identity_modulo_stamping() {
    for cart in all_carts() {
        assert_eq!(reconcile_at(Vec::new(), cart.clone(), at(NOW)), cart);

        let merged = reconcile_at(cart.clone(), Vec::new(), at(NOW));
        assert_eq!(merged.len(), cart.len());
        for (merged, original) in merged.iter().zip(&cart) {
            assert_eq!(merged.id, original.id);
            assert_eq!(merged.key(), original.key());
            assert_eq!(merged.quantity, original.quantity);
            assert_eq!(merged.last_modified, at(NOW));
        }
    }
}

#[test]
fn test_equal_quantity_older_guest_line_leaves_account_untouched() {
    let remote = vec![line(1, None, 2, 20)];
    let merged = reconcile_at(vec![line(1, None, 2, 5)], remote.clone(), at(NOW));
    assert_eq!(merged, remote);
}
