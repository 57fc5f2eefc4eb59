//! Add/update/remove patches and their application as a fold.

use serde::{Deserialize, Serialize};

use crate::atoms::{merge_by_precedence, Atom, AtomSet, Origin};

/// Changes one producer wants made to the working set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Patch {
    /// Merged by origin precedence.
    #[serde(default)]
    pub add: Vec<Atom>,

    /// Replace unconditionally, except that only an override replaces an override.
    #[serde(default)]
    pub update: Vec<Atom>,

    /// Ids to delete.
    #[serde(default)]
    pub remove: Vec<String>,

    /// Rule references explaining the change.
    #[serde(default)]
    pub why: Vec<String>,
}

/// What applying a patch did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatchOutcome {
    pub atoms: AtomSet,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Incoming ids that lost to the atom already present.
    pub rejected: Vec<String>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_add(mut self, atom: Atom) -> Self {
        self.add.push(atom);
        self
    }

    pub fn with_update(mut self, atom: Atom) -> Self {
        self.update.push(atom);
        self
    }

    pub fn with_remove(mut self, id: impl Into<String>) -> Self {
        self.remove.push(id.into());
        self
    }

    pub fn with_why(mut self, why: impl Into<String>) -> Self {
        self.why.push(why.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    /// Apply to `base`, returning a new set. `base` is not modified.
    pub fn apply(&self, base: &AtomSet) -> PatchOutcome {
        let merged = merge_by_precedence(base, &self.add);
        let mut outcome = PatchOutcome {
            atoms: merged.atoms,
            added: merged.added,
            updated: merged.overridden,
            removed: Vec::new(),
            rejected: merged.rejected,
        };

        for atom in &self.update {
            let id = atom.id_str();
            let blocked = outcome
                .atoms
                .get(&id)
                .map_or(false, |existing| existing.origin == Origin::Override && atom.origin != Origin::Override);
            let listed = outcome.added.contains(&id) || outcome.updated.contains(&id);
            if blocked {
                if !listed {
                    push_unique(&mut outcome.rejected, id);
                }
                continue;
            }
            outcome.atoms.insert(atom.clone());
            if base.contains(&id) {
                outcome.rejected.retain(|r| r != &id);
                push_unique(&mut outcome.updated, id);
            } else {
                push_unique(&mut outcome.added, id);
            }
        }

        for id in &self.remove {
            if outcome.atoms.remove(id).is_some() {
                outcome.added.retain(|a| a != id);
                outcome.updated.retain(|u| u != id);
                outcome.rejected.retain(|r| r != id);
                push_unique(&mut outcome.removed, id.clone());
            }
        }
        outcome
    }
}

fn push_unique(list: &mut Vec<String>, id: String) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// Fold patches over `base` in order.
pub fn apply_all<'a>(base: &AtomSet, patches: impl IntoIterator<Item = &'a Patch>) -> AtomSet {
    patches
        .into_iter()
        .fold(base.clone(), |atoms, patch| patch.apply(&atoms).atoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::AtomKey;

    fn x(origin: Origin, magnitude: f64) -> Atom {
        Atom::new(AtomKey::custom("x", &["value"]), origin, magnitude)
    }

    #[test]
    fn test_add_uses_precedence() {
        let base = AtomSet::from_atoms([x(Origin::Obs, 0.4)]);
        let outcome = Patch::new().with_add(x(Origin::World, 0.9)).apply(&base);
        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.4);
        assert_eq!(outcome.rejected, vec!["x:value"]);
        assert!(outcome.updated.is_empty());
    }

    #[test]
    fn test_update_respects_override() {
        let base = AtomSet::from_atoms([x(Origin::Override, 0.1)]);
        let outcome = Patch::new().with_update(x(Origin::Derived, 0.8)).apply(&base);
        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.1);

        let base = AtomSet::from_atoms([x(Origin::Obs, 0.1)]);
        let outcome = Patch::new().with_update(x(Origin::Derived, 0.8)).apply(&base);
        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.8);
        assert_eq!(outcome.updated, vec!["x:value"]);
    }

    #[test]
    fn test_each_id_listed_once() {
        let outcome = Patch::new()
            .with_add(x(Origin::Derived, 0.3))
            .with_add(x(Origin::Derived, 0.4))
            .with_update(x(Origin::Derived, 0.6))
            .apply(&AtomSet::new());
        assert_eq!(outcome.added, vec!["x:value"]);
        assert!(outcome.updated.is_empty());
        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.atoms.get("x:value").unwrap().magnitude, 0.6);

        // add loses to the base, update then replaces it
        let base = AtomSet::from_atoms([x(Origin::Obs, 0.4)]);
        let outcome = Patch::new()
            .with_add(x(Origin::World, 0.9))
            .with_update(x(Origin::Derived, 0.7))
            .apply(&base);
        assert_eq!(outcome.updated, vec!["x:value"]);
        assert!(outcome.rejected.is_empty());
        assert!(outcome.added.is_empty());
    }

    #[test]
    fn test_remove_and_base_untouched() {
        let base = AtomSet::from_atoms([x(Origin::World, 0.5)]);
        let outcome = Patch::new().with_remove("x:value").with_remove("missing").apply(&base);
        assert!(outcome.atoms.is_empty());
        assert_eq!(outcome.removed, vec!["x:value"]);
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn test_fold_sees_earlier_patches() {
        let first = Patch::new().with_add(x(Origin::Derived, 0.3));
        let second = Patch::new().with_update(x(Origin::Derived, 0.6));
        let third = Patch::new().with_add(x(Origin::Derived, 0.9));
        let atoms = apply_all(&AtomSet::new(), [&first, &second, &third]);
        // full tie: the incoming atom wins
        assert_eq!(atoms.get("x:value").unwrap().magnitude, 0.9);
    }
}
