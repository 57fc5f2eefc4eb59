//! Deterministic merging of atom sets.
//!
//! Two strategies:
//! - [`merge_newer_wins`]: the stage barrier. Everything a stage emits
//!   replaces what came before, regardless of origin.
//! - [`merge_by_precedence`]: the patch engine. Collisions resolve by origin
//!   rank, then confidence, then the `id|code|source` string.
//!
//! Neither mutates its inputs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::{Atom, AtomSet, Origin};

/// Result of a merge, including which ids changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MergeOutcome {
    pub atoms: AtomSet,
    /// Ids absent from the base.
    pub added: Vec<String>,
    /// Ids present in the base and replaced by an incoming atom.
    pub overridden: Vec<String>,
    /// Incoming ids that lost to the base atom.
    pub rejected: Vec<String>,
}

/// Compare two atoms competing for the same id.
///
/// `Ordering::Greater` means `incoming` wins.
pub fn compare_precedence(incoming: &Atom, existing: &Atom) -> Ordering {
    incoming
        .origin
        .precedence()
        .cmp(&existing.origin.precedence())
        .then_with(|| {
            incoming
                .confidence
                .partial_cmp(&existing.confidence)
                .unwrap_or(Ordering::Equal)
        })
        // smaller tie-break string wins, so reverse the natural order
        .then_with(|| existing.tiebreak_key().cmp(&incoming.tiebreak_key()))
}

/// Stage-barrier merge: every atom in `added` wins.
pub fn merge_newer_wins(base: &AtomSet, added: &[Atom]) -> MergeOutcome {
    let mut atoms = base.clone();
    let mut outcome = MergeOutcome::default();

    for atom in added {
        let id = atom.id_str();
        if base.contains(&id) {
            push_unique(&mut outcome.overridden, id);
        } else {
            push_unique(&mut outcome.added, id);
        }
        atoms.insert(atom.clone());
    }

    outcome.atoms = atoms;
    outcome
}

/// Patch merge: colliding ids resolve by origin, confidence, then tie-break.
///
/// Repeated ids within `added` compete with each other too. Base ids are
/// reported once, as overridden or rejected by the final winner.
pub fn merge_by_precedence(base: &AtomSet, added: &[Atom]) -> MergeOutcome {
    let mut atoms = base.clone();
    let mut outcome = MergeOutcome::default();
    // base ids whose current holder came from `added`
    let mut replaced: BTreeSet<String> = BTreeSet::new();
    let mut contested: Vec<String> = Vec::new();

    for atom in added {
        let id = atom.id_str();
        let in_base = base.contains(&id);
        if in_base {
            push_unique(&mut contested, id.clone());
        } else {
            push_unique(&mut outcome.added, id.clone());
        }

        let wins = atoms
            .get(&id)
            .map_or(true, |existing| compare_precedence(atom, existing) != Ordering::Less);
        if wins {
            atoms.insert(atom.clone());
            if in_base {
                replaced.insert(id);
            }
        }
    }

    for id in contested {
        if replaced.contains(&id) {
            outcome.overridden.push(id);
        } else {
            outcome.rejected.push(id);
        }
    }

    outcome.atoms = atoms;
    outcome
}

/// Re-apply override atoms on top of a set so later derivations cannot
/// displace them.
pub fn pin_overrides(set: &AtomSet, overrides: &[Atom]) -> MergeOutcome {
    let pinned: Vec<Atom> = overrides
        .iter()
        .filter(|a| a.origin == Origin::Override)
        .cloned()
        .collect();
    merge_by_precedence(set, &pinned)
}

fn push_unique(list: &mut Vec<String>, id: String) {
    if !list.contains(&id) {
        list.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::AtomKey;

    fn x(origin: Origin, magnitude: f64) -> Atom {
        Atom::new(AtomKey::custom("x", &["value"]), origin, magnitude)
    }

    #[test]
    fn test_newer_wins_ignores_origin() {
        let base = AtomSet::from_atoms([x(Origin::Override, 0.1)]);
        let outcome = merge_newer_wins(&base, &[x(Origin::Derived, 0.7)]);

        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.7);
        assert_eq!(outcome.overridden, vec!["x:value"]);
        assert!(outcome.added.is_empty());
        // input untouched
        assert_eq!(base.get("x:value").unwrap().magnitude, 0.1);
    }

    #[test]
    fn test_precedence_beats_magnitude() {
        let base = AtomSet::from_atoms([x(Origin::Obs, 0.4)]);
        let outcome = merge_by_precedence(&base, &[x(Origin::World, 0.9)]);

        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.4);
        assert_eq!(outcome.rejected, vec!["x:value"]);
    }

    #[test]
    fn test_confidence_tiebreak() {
        let base = AtomSet::from_atoms([x(Origin::World, 0.4).with_confidence(0.5)]);
        let outcome = merge_by_precedence(&base, &[x(Origin::World, 0.9).with_confidence(0.8)]);
        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.9);
        assert_eq!(outcome.overridden, vec!["x:value"]);
    }

    #[test]
    fn test_string_tiebreak_is_order_independent() {
        let a = x(Origin::World, 0.2).with_source("alpha");
        let b = x(Origin::World, 0.8).with_source("beta");

        let ab = merge_by_precedence(&AtomSet::from_atoms([a.clone()]), &[b.clone()]);
        let ba = merge_by_precedence(&AtomSet::from_atoms([b]), &[a]);

        // "alpha" sorts first and wins both ways
        assert_eq!(ab.atoms.get("x:value").unwrap().magnitude, 0.2);
        assert_eq!(ba.atoms.get("x:value").unwrap().magnitude, 0.2);
    }

    #[test]
    fn test_repeated_id_in_one_batch_is_only_added() {
        let newer = merge_newer_wins(&AtomSet::new(), &[x(Origin::World, 0.2), x(Origin::World, 0.7)]);
        assert_eq!(newer.added, vec!["x:value"]);
        assert!(newer.overridden.is_empty());
        assert_eq!(newer.atoms.get("x:value").unwrap().magnitude, 0.7);

        let ranked = merge_by_precedence(&AtomSet::new(), &[x(Origin::Obs, 0.2), x(Origin::Memory, 0.7)]);
        assert_eq!(ranked.added, vec!["x:value"]);
        assert!(ranked.rejected.is_empty());
        assert!(ranked.overridden.is_empty());
        assert_eq!(ranked.atoms.get("x:value").unwrap().magnitude, 0.2);
    }

    #[test]
    fn test_repeated_base_id_reported_once() {
        let base = AtomSet::from_atoms([x(Origin::World, 0.5)]);
        let outcome = merge_by_precedence(&base, &[x(Origin::Memory, 0.1), x(Origin::Obs, 0.9)]);
        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.9);
        assert_eq!(outcome.overridden, vec!["x:value"]);
        assert!(outcome.rejected.is_empty());
        assert!(outcome.added.is_empty());

        let outcome = merge_by_precedence(&base, &[x(Origin::Memory, 0.1), x(Origin::Derived, 0.9)]);
        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.5);
        assert_eq!(outcome.rejected, vec!["x:value"]);
        assert!(outcome.overridden.is_empty());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let set = AtomSet::from_atoms([
            x(Origin::World, 0.3),
            Atom::new(AtomKey::ctx("danger", "A"), Origin::Derived, 0.6),
        ]);
        let atoms = set.to_vec();

        assert_eq!(merge_newer_wins(&set, &atoms).atoms, set);
        assert_eq!(merge_by_precedence(&set, &atoms).atoms, set);
    }

    #[test]
    fn test_pin_overrides() {
        let set = AtomSet::from_atoms([x(Origin::Derived, 0.9)]);
        let overrides = [x(Origin::Override, 0.1), Atom::new(AtomKey::ctx("danger", "A"), Origin::World, 1.0)];
        let outcome = pin_overrides(&set, &overrides);

        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.1);
        assert!(!outcome.atoms.contains("ctx:danger:A"));
    }
}
