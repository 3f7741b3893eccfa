//! Ordering for origin version strings.
//!
//! Origin versions are dotted runs (`6.4`, `2.1.0`, `3.25.4`) rather than
//! strict semver, so they are compared segment by segment: numeric segments
//! numerically, anything else lexically, and a missing segment sorts first
//! (`6.4` < `6.4.0`).

use std::cmp::Ordering;

/// Compare two dotted version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    (Ok(_), Err(_)) => Ordering::Greater,
                    (Err(_), Ok(_)) => Ordering::Less,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
