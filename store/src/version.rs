use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A write version: a wall-clock timestamp paired with the id of the
/// replica that authored the write. Totally ordered by the arbitration
/// rule (spec.md §3): compare timestamps first, break ties on node id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub timestamp: f64,
    pub node: i64,
}

impl Version {
    pub fn new(timestamp: f64, node: i64) -> Self {
        Self { timestamp, node }
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.timestamp.partial_cmp(&other.timestamp) {
            Some(Ordering::Equal) | None => self.node.cmp(&other.node),
            Some(ord) => ord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arbitration_order_prefers_later_timestamp() {
        let a = Version::new(1.0, 9);
        let b = Version::new(2.0, 0);
        assert!(a < b);
    }

    #[test]
    fn arbitration_order_breaks_ties_on_node() {
        let a = Version::new(5.0, 1);
        let b = Version::new(5.0, 2);
        assert!(a < b);
        assert!(b > a);
        assert_eq!(a, a);
    }
}
