//! The coterie: the assignment of a voting set to every process, and the
//! two correctness properties the protocol's guarantees rest on.

use crate::ProcessId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Why a coterie cannot be used for a simulation. Any of these is a fatal
/// configuration error detected before a single process starts running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoterieViolation {
    #[error("intersection property violated: the voting sets of process {i} and process {j} are disjoint")]
    Intersection { i: ProcessId, j: ProcessId },
    #[error("minimality property violated: the voting set of process {i} is contained in the voting set of process {j}")]
    Minimality { i: ProcessId, j: ProcessId },
    #[error("process {process} lists member {member} twice in its voting set")]
    DuplicateMember { process: ProcessId, member: ProcessId },
    #[error("process {process} lists member {member}, which is not a process id")]
    UnknownMember { process: ProcessId, member: ProcessId },
}

/// The full assignment of voting sets, indexed by process id. A voting set
/// may or may not contain the process itself; both variants occur in
/// published quorum constructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coterie(pub Vec<Vec<ProcessId>>);

impl Coterie {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn voting_set(&self, id: ProcessId) -> &[ProcessId] {
        &self.0[id]
    }

    /// Checks that every pair of voting sets shares at least one member.
    /// That common member is what serializes two conflicting requests, so a
    /// disjoint pair makes mutual exclusion unsound. Returns the first
    /// violating pair in ascending order.
    pub fn validate_intersection(&self) -> Result<(), CoterieViolation> {
        for i in 0..self.0.len() {
            let members: HashSet<ProcessId> = self.0[i].iter().copied().collect();
            for j in i + 1..self.0.len() {
                if !self.0[j].iter().any(|m| members.contains(m)) {
                    return Err(CoterieViolation::Intersection { i, j });
                }
            }
        }
        Ok(())
    }

    /// Checks that no voting set is contained in another (equal sets count
    /// as contained). A contained set would make some process's vote
    /// redundant. Returns the first violating pair in ascending order.
    pub fn validate_minimality(&self) -> Result<(), CoterieViolation> {
        for i in 0..self.0.len() {
            for j in i + 1..self.0.len() {
                if is_subset(&self.0[i], &self.0[j]) {
                    return Err(CoterieViolation::Minimality { i, j });
                }
                if is_subset(&self.0[j], &self.0[i]) {
                    return Err(CoterieViolation::Minimality { i: j, j: i });
                }
            }
        }
        Ok(())
    }

    /// Structural checks plus both correctness properties.
    pub fn validate(&self) -> Result<(), CoterieViolation> {
        for (process, set) in self.0.iter().enumerate() {
            let mut seen = HashSet::new();
            for &member in set {
                if member >= self.0.len() {
                    return Err(CoterieViolation::UnknownMember { process, member });
                }
                if !seen.insert(member) {
                    return Err(CoterieViolation::DuplicateMember { process, member });
                }
            }
        }
        self.validate_intersection()?;
        self.validate_minimality()
    }
}

fn is_subset(a: &[ProcessId], b: &[ProcessId]) -> bool {
    let members: HashSet<ProcessId> = b.iter().copied().collect();
    a.iter().all(|m| members.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cyclic quorums for five processes: each set is `{i, i+1, i+2}` mod 5.
    fn cyclic_five() -> Coterie {
        Coterie(vec![
            vec![0, 1, 2],
            vec![1, 2, 3],
            vec![2, 3, 4],
            vec![3, 4, 0],
            vec![4, 0, 1],
        ])
    }

    #[test]
    fn cyclic_five_satisfies_both_properties() {
        let coterie = cyclic_five();
        assert_eq!(coterie.validate_intersection(), Ok(()));
        assert_eq!(coterie.validate_minimality(), Ok(()));
        assert_eq!(coterie.validate(), Ok(()));
    }

    #[test]
    fn disjoint_pair_fails_intersection() {
        // Voting sets {1}, {0, 2}, {1}: the first disjoint pair is (0, 1).
        let coterie = Coterie(vec![vec![1], vec![0, 2], vec![1]]);
        assert_eq!(
            coterie.validate_intersection(),
            Err(CoterieViolation::Intersection { i: 0, j: 1 })
        );
    }

    #[test]
    fn contained_set_fails_minimality() {
        let coterie = Coterie(vec![vec![1, 2], vec![1, 2, 3]]);
        assert_eq!(
            coterie.validate_minimality(),
            Err(CoterieViolation::Minimality { i: 0, j: 1 })
        );
    }

    #[test]
    fn containment_is_reported_in_either_direction() {
        let coterie = Coterie(vec![vec![0, 1, 2], vec![1, 2]]);
        assert_eq!(
            coterie.validate_minimality(),
            Err(CoterieViolation::Minimality { i: 1, j: 0 })
        );
    }

    #[test]
    fn equal_sets_fail_minimality() {
        let coterie = Coterie(vec![vec![0, 1], vec![0, 1]]);
        assert!(matches!(
            coterie.validate_minimality(),
            Err(CoterieViolation::Minimality { .. })
        ));
    }

    #[test]
    fn duplicate_member_is_rejected() {
        let coterie = Coterie(vec![vec![1, 1], vec![0]]);
        assert_eq!(
            coterie.validate(),
            Err(CoterieViolation::DuplicateMember { process: 0, member: 1 })
        );
    }

    #[test]
    fn out_of_range_member_is_rejected() {
        let coterie = Coterie(vec![vec![1], vec![5]]);
        assert_eq!(
            coterie.validate(),
            Err(CoterieViolation::UnknownMember { process: 1, member: 5 })
        );
    }

    #[test]
    fn single_process_coterie_is_trivially_valid() {
        let coterie = Coterie(vec![vec![0]]);
        assert_eq!(coterie.validate(), Ok(()));
    }

    #[test]
    fn json_shape_is_an_array_of_voting_sets() {
        let coterie = Coterie(vec![vec![1], vec![0]]);
        assert_eq!(serde_json::to_string(&coterie).unwrap(), "[[1],[0]]");
        let parsed: Coterie = serde_json::from_str("[[1],[0]]").unwrap();
        assert_eq!(parsed, coterie);
    }
}
