//! Context axes: `ctx:<axis>:<self>`.
//!
//! Axes already supplied as non-derived atoms are taken as given and not
//! recomputed. Later axes read earlier ones from the same pass.

use std::collections::BTreeMap;

use super::{pinned_value, relational_prefix, Reader, TickContext};
use crate::atoms::{Atom, AtomKey, AtomSet};
use crate::math::{clamp01, noisy_or};

pub const AXES: [&str; 9] = [
    "danger",
    "uncertainty",
    "timePressure",
    "normPressure",
    "publicness",
    "scarcity",
    "intimacy",
    "crowd",
    "stakes",
];

struct AxisPass<'a> {
    atoms: &'a AtomSet,
    subject: &'a str,
    values: BTreeMap<&'static str, f64>,
    out: Vec<Atom>,
}

impl<'a> AxisPass<'a> {
    /// Value of an axis settled earlier in this pass.
    fn earlier(&self, reader: &mut Reader<'_>, axis: &'static str) -> Option<f64> {
        let value = self.values.get(axis).copied()?;
        reader.note_used(&AtomKey::ctx(axis, self.subject).to_string());
        Some(value)
    }

    fn settle<F>(&mut self, axis: &'static str, compute: F)
    where
        F: FnOnce(&Self, &mut Reader<'a>) -> (f64, Vec<(&'static str, f64)>),
    {
        let key = AtomKey::ctx(axis, self.subject);
        if let Some(given) = pinned_value(self.atoms, &key) {
            self.values.insert(axis, given);
            return;
        }
        let mut reader = Reader::new(self.atoms);
        let (value, parts) = compute(self, &mut reader);
        let value = clamp01(value);
        if let Some(mut atom) = reader.emit(key, value) {
            for (name, part) in parts {
                atom = atom.with_part(name, part);
            }
            self.values.insert(axis, value);
            self.out.push(atom);
        }
    }
}

pub(super) fn derive(ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Vec<Atom> {
    let s = ctx.subject().to_string();
    let mut pass = AxisPass {
        atoms,
        subject: &s,
        values: BTreeMap::new(),
        out: Vec::new(),
    };

    pass.settle("danger", |p, r| {
        let hazard = r.get(&AtomKey::world("hazard", p.subject)).unwrap_or(0.0);
        let cover = r.get(&AtomKey::world("cover", p.subject)).unwrap_or(0.0);
        let health = r.get(&AtomKey::world("health", p.subject)).unwrap_or(1.0);
        let hostile = r
            .max_with_prefix(&relational_prefix("obs", "hostile", p.subject))
            .unwrap_or(0.0);
        let remembered = r
            .max_with_prefix(&relational_prefix("mem", "hostile", p.subject))
            .unwrap_or(0.0);
        let hostility = r
            .max_with_prefix(&relational_prefix("rel", "hostility", p.subject))
            .unwrap_or(0.0);
        let env = hazard * (1.0 - 0.5 * cover);
        (
            noisy_or([env, hostile, 0.6 * hostility, 0.5 * remembered, 0.5 * (1.0 - health)]),
            vec![("env", env), ("hostile", hostile), ("hostility", hostility)],
        )
    });

    pass.settle("uncertainty", |p, r| {
        let visibility = r.get(&AtomKey::world("visibility", p.subject)).unwrap_or(1.0);
        let experience = r.get(&AtomKey::trait_("experience", p.subject)).unwrap_or(0.5);
        let nearby = r.targets(&relational_prefix("obs", "nearby", p.subject));
        let mut unfamiliar = 0usize;
        for other in &nearby {
            r.note_used(&AtomKey::obs("nearby", p.subject, Some(other.as_str())).to_string());
            if r.get(&AtomKey::rel("trust", p.subject, other)).is_none() {
                unfamiliar += 1;
            }
        }
        let unfamiliar_share = if nearby.is_empty() {
            0.0
        } else {
            unfamiliar as f64 / nearby.len() as f64
        };
        (
            0.45 * (1.0 - visibility) + 0.35 * unfamiliar_share + 0.2 * (1.0 - experience),
            vec![("unfamiliar", unfamiliar_share)],
        )
    });

    // Danger doubles as time pressure: threats must be answered quickly.
    pass.settle("timePressure", |p, r| {
        let scene = r.get(&AtomKey::scene("timePressure", p.subject)).unwrap_or(0.0);
        let danger = p.earlier(r, "danger").unwrap_or(0.0);
        (scene.max(danger), vec![("scene", scene), ("danger", danger)])
    });

    pass.settle("normPressure", |p, r| {
        let scene = r.get(&AtomKey::scene("normPressure", p.subject)).unwrap_or(0.0);
        let crowd = r.get(&AtomKey::world("crowd", p.subject)).unwrap_or(0.0);
        (noisy_or([scene, 0.3 * crowd]), vec![("scene", scene)])
    });

    pass.settle("publicness", |p, r| {
        let scene = r.get(&AtomKey::scene("publicness", p.subject)).unwrap_or(0.5);
        let privacy = r.get(&AtomKey::world("privacy", p.subject)).unwrap_or(0.0);
        (scene * (1.0 - 0.6 * privacy), vec![("privacy", privacy)])
    });

    pass.settle("scarcity", |p, r| {
        let scene = r.get(&AtomKey::scene("scarcity", p.subject)).unwrap_or(0.0);
        let resources = r.get(&AtomKey::world("resources", p.subject)).unwrap_or(0.5);
        (noisy_or([scene, 0.6 * (1.0 - resources)]), vec![("resources", resources)])
    });

    pass.settle("intimacy", |p, r| {
        let mut closest = 0.0f64;
        for other in r.targets(&relational_prefix("rel", "closeness", p.subject)) {
            let closeness = r.value_or(&AtomKey::rel("closeness", p.subject, &other), 0.0);
            let proximity = r
                .get(&AtomKey::obs("nearby", p.subject, Some(other.as_str())))
                .unwrap_or(0.0);
            closest = closest.max(closeness * proximity);
        }
        let publicness = p.earlier(r, "publicness").unwrap_or(0.5);
        (closest * (1.0 - 0.5 * publicness), vec![("closest", closest)])
    });

    pass.settle("crowd", |p, r| {
        (r.value_or(&AtomKey::world("crowd", p.subject), 0.0), Vec::new())
    });

    pass.settle("stakes", |p, r| {
        let danger = p.earlier(r, "danger").unwrap_or(0.0);
        let norm = p.earlier(r, "normPressure").unwrap_or(0.0);
        let publicness = p.earlier(r, "publicness").unwrap_or(0.5);
        (
            0.3 + 0.7 * danger + 0.2 * norm * publicness,
            vec![("danger", danger)],
        )
    });

    pass.out
}
