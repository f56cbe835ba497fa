//! Savepoint naming and statements
//!
//! Savepoint names are issued by a per-transaction [`SavepointSeq`]. The counter
//! only ever moves forward, so names are unique within a transaction even after
//! earlier savepoints were released or rolled back to.

use std::fmt;

/// A named savepoint inside an open transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Savepoint {
    seq: u64,
    name: String,
}

impl Savepoint {
    /// Position in the issuing transaction, starting at 1
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns the savepoint name (`sp_0001`, `sp_0002`, ...)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `SAVEPOINT <name>`
    pub fn create_sql(&self) -> String {
        format!("SAVEPOINT {}", self.name)
    }

    /// `ROLLBACK TO SAVEPOINT <name>`
    pub fn rollback_sql(&self) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", self.name)
    }

    /// `RELEASE SAVEPOINT <name>`
    pub fn release_sql(&self) -> String {
        format!("RELEASE SAVEPOINT {}", self.name)
    }
}

impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Monotonic savepoint counter owned by one transaction
#[derive(Debug, Default)]
pub(crate) struct SavepointSeq {
    issued: u64,
}

impl SavepointSeq {
    /// Issues the next savepoint name
    pub(crate) fn next(&mut self) -> Savepoint {
        self.issued += 1;
        Savepoint {
            seq: self.issued,
            name: format!("sp_{:04}", self.issued),
        }
    }

    /// Number of savepoints issued so far
    pub(crate) fn issued(&self) -> u64 {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_statements() {
        let sp = SavepointSeq::default().next();
        assert_eq!(sp.name(), "sp_0001");
        assert_eq!(sp.seq(), 1);
        assert_eq!(sp.create_sql(), "SAVEPOINT sp_0001");
        assert_eq!(sp.rollback_sql(), "ROLLBACK TO SAVEPOINT sp_0001");
        assert_eq!(sp.release_sql(), "RELEASE SAVEPOINT sp_0001");
    }

    #[test]
    fn test_counters_are_independent() {
        let mut first = SavepointSeq::default();
        let mut second = SavepointSeq::default();
        first.next();
        first.next();
        assert_eq!(second.next().name(), "sp_0001");
        assert_eq!(first.issued(), 2);
    }

    proptest! {
        #[test]
        fn prop_names_are_unique_and_ordered(count in 1usize..2000) {
            let mut seq = SavepointSeq::default();
            let names: Vec<String> = (0..count).map(|_| seq.next().name().to_string()).collect();

            let unique: HashSet<&String> = names.iter().collect();
            prop_assert_eq!(unique.len(), count);
            prop_assert!(names.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(seq.issued(), count as u64);
        }
    }
}
