//! Invariant checks over atom collections.
//!
//! Validation never fails. It returns a [`ValidationReport`] that the caller
//! may surface, act on, or repair with [`auto_fix`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Atom, AtomSet, Origin};
use crate::graph::AtomGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    NonFinite,
    OutOfRange,
    SelfReference,
    MissingTrace,
    EmptyProvenance,
    DuplicateId,
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub atom_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when no issue has error severity.
    pub fn ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warn)
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    pub fn extend(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    fn push(&mut self, severity: Severity, code: IssueCode, atom_id: Option<String>, message: String) {
        self.issues.push(ValidationIssue {
            severity,
            code,
            atom_id,
            message,
        });
    }
}

/// Check per-atom invariants and duplicate ids.
pub fn validate_atoms(atoms: &[Atom]) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for atom in atoms {
        let id = atom.id_str();
        *seen.entry(id.clone()).or_default() += 1;

        if !atom.magnitude.is_finite() || !atom.confidence.is_finite() {
            report.push(
                Severity::Error,
                IssueCode::NonFinite,
                Some(id.clone()),
                format!("magnitude={} confidence={}", atom.magnitude, atom.confidence),
            );
        } else {
            if !atom.range.contains(atom.magnitude) {
                report.push(
                    Severity::Warn,
                    IssueCode::OutOfRange,
                    Some(id.clone()),
                    format!("magnitude {} outside {:?}", atom.magnitude, atom.range),
                );
            }
            if !(0.0..=1.0).contains(&atom.confidence) {
                report.push(
                    Severity::Warn,
                    IssueCode::OutOfRange,
                    Some(id.clone()),
                    format!("confidence {} outside [0, 1]", atom.confidence),
                );
            }
        }

        if atom.used_ids().iter().any(|u| *u == id) {
            report.push(
                Severity::Error,
                IssueCode::SelfReference,
                Some(id.clone()),
                "trace lists the atom as its own input".to_string(),
            );
        }

        if atom.origin == Origin::Derived {
            match &atom.trace {
                None => report.push(
                    Severity::Error,
                    IssueCode::MissingTrace,
                    Some(id.clone()),
                    "derived atom has no trace".to_string(),
                ),
                Some(trace) if trace.used_atom_ids.is_empty() => report.push(
                    Severity::Error,
                    IssueCode::EmptyProvenance,
                    Some(id.clone()),
                    "derived atom trace has no inputs".to_string(),
                ),
                Some(_) => {}
            }
        }
    }

    for (id, count) in seen.into_iter().filter(|(_, c)| *c > 1) {
        report.push(
            Severity::Warn,
            IssueCode::DuplicateId,
            Some(id),
            format!("{} atoms share this id; the last one wins", count),
        );
    }

    report
}

/// Check per-atom invariants plus acyclicity of the dependency graph.
pub fn validate_set(set: &AtomSet) -> ValidationReport {
    let mut report = validate_atoms(&set.to_vec());
    let topo = AtomGraph::build(set).topo_order();
    if !topo.ok {
        report.push(
            Severity::Error,
            IssueCode::Cycle,
            topo.cycle_sample.first().cloned(),
            format!("dependency cycle among: {}", topo.cycle_sample.join(", ")),
        );
    }
    report
}

/// Repair what can be repaired: strip self references and normalize values.
///
/// Returns the repaired atoms and a description of each fix.
pub fn auto_fix(atoms: Vec<Atom>) -> (Vec<Atom>, Vec<String>) {
    let mut fixes = Vec::new();
    let fixed = atoms
        .into_iter()
        .map(|mut atom| {
            let id = atom.id_str();
            if let Some(trace) = atom.trace.as_mut() {
                let before = trace.used_atom_ids.len();
                trace.used_atom_ids.retain(|u| *u != id);
                if trace.used_atom_ids.len() != before {
                    fixes.push(format!("{}: removed self reference", id));
                }
            }
            let out_of_range = !atom.magnitude.is_finite()
                || !atom.range.contains(atom.magnitude)
                || !(0.0..=1.0).contains(&atom.confidence);
            if out_of_range {
                fixes.push(format!("{}: normalized values", id));
            }
            atom.normalize()
        })
        .collect();
    (fixed, fixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{AtomKey, Trace};

    #[test]
    fn test_clean_atoms_pass() {
        let atoms = vec![
            Atom::new(AtomKey::world("hazard", "A"), Origin::World, 0.3),
            Atom::derived(AtomKey::ctx("danger", "A"), 0.3, ["world:hazard:A"]),
        ];
        let report = validate_atoms(&atoms);
        assert!(report.ok());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_self_reference_flagged_and_fixed() {
        let atoms = vec![Atom::derived(
            AtomKey::ctx("danger", "A"),
            0.3,
            ["ctx:danger:A", "world:hazard:A"],
        )];
        let report = validate_atoms(&atoms);
        assert!(!report.ok());
        assert!(report.has_code(IssueCode::SelfReference));

        let (fixed, fixes) = auto_fix(atoms);
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixed[0].used_ids(), &["world:hazard:A".to_string()]);
        assert!(validate_atoms(&fixed).ok());
    }

    #[test]
    fn test_derived_without_provenance() {
        let missing = Atom::new(AtomKey::emo("fear", "A"), Origin::Derived, 0.5);
        let empty = Atom::new(AtomKey::emo("anger", "A"), Origin::Derived, 0.5).with_trace(Trace::new());
        let report = validate_atoms(&[missing, empty]);

        assert!(report.has_code(IssueCode::MissingTrace));
        assert!(report.has_code(IssueCode::EmptyProvenance));
        assert_eq!(report.errors().count(), 2);
    }

    #[test]
    fn test_duplicates_and_range_warn() {
        let atoms = vec![
            Atom::new(AtomKey::ctx("danger", "A"), Origin::World, 0.3),
            Atom::new(AtomKey::ctx("danger", "A"), Origin::World, 1.3),
        ];
        let report = validate_atoms(&atoms);
        assert!(report.ok());
        assert!(report.has_code(IssueCode::DuplicateId));
        assert!(report.has_code(IssueCode::OutOfRange));
        assert_eq!(report.warnings().count(), 2);
    }

    #[test]
    fn test_non_finite_is_error() {
        let atoms = vec![Atom::new(AtomKey::ctx("danger", "A"), Origin::World, f64::INFINITY)];
        assert!(validate_atoms(&atoms).has_code(IssueCode::NonFinite));
    }

    #[test]
    fn test_cycle_detected_in_set() {
        let set = AtomSet::from_atoms([
            Atom::derived(AtomKey::custom("x", &["a"]), 0.5, ["x:b"]),
            Atom::derived(AtomKey::custom("x", &["b"]), 0.5, ["x:a"]),
        ]);
        let report = validate_set(&set);
        assert!(!report.ok());
        assert!(report.has_code(IssueCode::Cycle));
    }
}
