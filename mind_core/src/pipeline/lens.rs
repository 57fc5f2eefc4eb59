//! Subjective lens: `lens:<axis>:<self>`, each context axis bent by a trait.

use sim_world::TraitKind;

use super::axes::AXES;
use super::{Reader, TickContext};
use crate::atoms::{Atom, AtomKey, AtomSet};
use crate::math::{centered, clamp01};

/// Trait bending an axis, and the sign of its effect.
fn lens_trait(axis: &str) -> Option<(TraitKind, f64)> {
    match axis {
        "danger" | "publicness" | "crowd" => Some((TraitKind::Paranoia, 1.0)),
        "uncertainty" | "scarcity" => Some((TraitKind::Experience, -1.0)),
        "timePressure" | "normPressure" | "stakes" => Some((TraitKind::Conscientiousness, 1.0)),
        "intimacy" => Some((TraitKind::Empathy, 1.0)),
        _ => None,
    }
}

/// Largest shift a trait at either extreme applies at full gain.
const MAX_SHIFT: f64 = 0.4;

pub(super) fn derive(ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Vec<Atom> {
    let s = ctx.subject();
    let gain = ctx.config.pipeline.lens_gain;
    let mut out = Vec::new();

    for axis in AXES {
        let mut reader = Reader::new(atoms);
        let Some(base) = reader.get(&AtomKey::ctx(axis, s)) else {
            continue;
        };
        let (trait_value, sign) = match lens_trait(axis) {
            Some((kind, sign)) => (
                reader.value_or(&AtomKey::trait_(kind.as_str(), s), 0.5),
                sign,
            ),
            None => (0.5, 0.0),
        };
        let shift = gain * MAX_SHIFT * sign * centered(trait_value);
        let value = clamp01(base + shift);
        if let Some(atom) = reader.emit(AtomKey::lens(axis, s), value) {
            out.push(atom.with_part("base", base).with_part("shift", shift));
        }
    }
    out
}
