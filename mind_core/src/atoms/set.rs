//! Id-indexed atom collection.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{Atom, AtomKey};

/// An ordered, id-unique collection of atoms.
///
/// Lookups are by exact id or by indexed prefix range; nothing relies on
/// insertion order. Building from a sequence keeps the last atom written for
/// each id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AtomSet {
    atoms: BTreeMap<String, Atom>,
}

impl AtomSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, later atoms replacing earlier ones with the same id.
    pub fn from_atoms(atoms: impl IntoIterator<Item = Atom>) -> Self {
        let mut set = Self::new();
        for atom in atoms {
            set.insert(atom);
        }
        set
    }

    /// Insert an atom, returning the one it replaced.
    pub fn insert(&mut self, atom: Atom) -> Option<Atom> {
        self.atoms.insert(atom.id_str(), atom)
    }

    pub fn remove(&mut self, id: &str) -> Option<Atom> {
        self.atoms.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn get_key(&self, key: &AtomKey) -> Option<&Atom> {
        self.atoms.get(&key.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.atoms.contains_key(id)
    }

    /// Magnitude of an atom, if present.
    pub fn value(&self, key: &AtomKey) -> Option<f64> {
        self.get_key(key).map(|a| a.magnitude)
    }

    /// Magnitude of an atom, or `default` when it is absent.
    pub fn value_or(&self, key: &AtomKey, default: f64) -> f64 {
        self.value(key).unwrap_or(default)
    }

    /// First present key among `keys`, with its magnitude.
    pub fn first_of<'a>(&self, keys: &'a [AtomKey]) -> Option<(&'a AtomKey, f64)> {
        keys.iter()
            .find_map(|k| self.value(k).map(|v| (k, v)))
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Atoms in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.atoms.keys()
    }

    /// Atoms whose id starts with `prefix`, found by range scan.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Atom> + 'a {
        self.atoms
            .range(prefix.to_string()..)
            .take_while(move |(id, _)| id.starts_with(prefix))
            .map(|(_, atom)| atom)
    }

    /// Targets of relational atoms under `prefix`, e.g. every `B` in `obs:nearby:A:B`.
    pub fn targets_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        self.with_prefix(prefix)
            .filter_map(|a| a.target().map(str::to_string))
            .collect()
    }

    pub fn into_atoms(self) -> Vec<Atom> {
        self.atoms.into_values().collect()
    }

    pub fn to_vec(&self) -> Vec<Atom> {
        self.atoms.values().cloned().collect()
    }
}

impl FromIterator<Atom> for AtomSet {
    fn from_iter<T: IntoIterator<Item = Atom>>(iter: T) -> Self {
        Self::from_atoms(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::Origin;

    #[test]
    fn test_last_write_wins() {
        let set = AtomSet::from_atoms([
            Atom::new(AtomKey::ctx("danger", "A"), Origin::World, 0.2),
            Atom::new(AtomKey::ctx("danger", "A"), Origin::World, 0.9),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.value(&AtomKey::ctx("danger", "A")), Some(0.9));
    }

    #[test]
    fn test_value_fallbacks() {
        let set = AtomSet::from_atoms([Atom::new(AtomKey::ctx("danger", "A"), Origin::World, 0.3)]);
        assert_eq!(set.value_or(&AtomKey::ctx("uncertainty", "A"), 0.5), 0.5);

        let keys = [AtomKey::lens("danger", "A"), AtomKey::ctx("danger", "A")];
        let (key, value) = set.first_of(&keys).unwrap();
        assert_eq!(key.to_string(), "ctx:danger:A");
        assert_eq!(value, 0.3);
    }

    #[test]
    fn test_prefix_scan() {
        let set = AtomSet::from_atoms([
            Atom::new(AtomKey::obs("nearby", "A", Some("B")), Origin::Obs, 0.5),
            Atom::new(AtomKey::obs("nearby", "A", Some("C")), Origin::Obs, 0.5),
            Atom::new(AtomKey::obs("nearby", "AB", Some("C")), Origin::Obs, 0.5),
            Atom::new(AtomKey::obs("hostile", "A", Some("D")), Origin::Obs, 0.5),
        ]);

        let targets = set.targets_with_prefix("obs:nearby:A:");
        assert_eq!(targets.into_iter().collect::<Vec<_>>(), vec!["B", "C"]);
        assert_eq!(set.with_prefix("obs:").count(), 4);
    }
}
