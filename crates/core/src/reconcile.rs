//! Merging a guest cart into an account cart at sign-in.
//!
//! The remote (account) lines form the base. Each local (guest) line is
//! folded in by [`LineKey`]:
//!
//! - an unseen key is appended and stamped with the reconciliation time;
//! - a known key is updated only when the local line is strictly newer or
//!   carries a larger quantity, and then takes the larger quantity.
//!
//! No key is ever dropped and no quantity ever shrinks. This is a heuristic
//! for the rare case of editing the same cart on two devices, not a CRDT.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{CartLine, LineKey};

/// Merge guest lines into account lines, stamping changes with the current time.
#[must_use]
pub fn reconcile(local: Vec<CartLine>, remote: Vec<CartLine>) -> Vec<CartLine> {
    reconcile_at(local, remote, Utc::now())
}

/// Merge guest lines into account lines, stamping changes with `now`.
///
/// Output order is the remote lines as given, followed by new local keys in
/// the order they first appear. A remote line updated by a local one keeps
/// its ID, product, variant label and unit price.
#[must_use]
pub fn reconcile_at(
    local: Vec<CartLine>,
    remote: Vec<CartLine>,
    now: DateTime<Utc>,
) -> Vec<CartLine> {
    let mut merged = remote;
    let mut index: HashMap<LineKey, usize> = HashMap::with_capacity(merged.len() + local.len());
    for (position, line) in merged.iter().enumerate() {
        index.entry(line.key()).or_insert(position);
    }

    for mut incoming in local {
        let key = incoming.key();
        match index.get(&key).and_then(|&position| merged.get_mut(position)) {
            Some(existing) => {
                let newer = incoming.last_modified > existing.last_modified;
                let larger = incoming.quantity > existing.quantity;
                if newer || larger {
                    existing.quantity = existing.quantity.max(incoming.quantity);
                    existing.last_modified = now;
                }
            }
            None => {
                incoming.last_modified = now;
                index.insert(key, merged.len());
                merged.push(incoming);
            }
        }
    }

    merged
}
