//! Appraisals (`app:*`) and the emotions computed from them (`emo:*`).

use std::collections::BTreeMap;

use super::{relational_prefix, Reader, TickContext};
use crate::atoms::{Atom, AtomKey, AtomSet};
use crate::math::{clamp01, noisy_or};

/// Appraisals emitted in this pass, by name, with their atom ids.
#[derive(Default)]
struct Appraised {
    values: BTreeMap<&'static str, (f64, String)>,
}

impl Appraised {
    /// Reads an appraisal and records it as used. `None` when it was never emitted.
    fn read(&self, reader: &mut Reader<'_>, name: &str) -> Option<f64> {
        let (value, id) = self.values.get(name)?;
        reader.note_used(id);
        Some(*value)
    }
}

pub(super) fn derive(ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Vec<Atom> {
    let s = ctx.subject();
    let mut out = Vec::new();
    let mut appraised = Appraised::default();

    let mut push_appraisal = |name: &'static str, value: f64, reader: &mut Reader<'_>, out: &mut Vec<Atom>| {
        let key = AtomKey::app(name, s);
        let value = clamp01(value);
        if let Some(atom) = reader.emit(key, value) {
            appraised.values.insert(name, (value, atom.id_str()));
            out.push(atom);
        }
    };

    // threat: the fused channel, else the perceived danger axis
    let mut r = Reader::new(atoms);
    if let Some(threat) = r.get(&AtomKey::threat("final", s)).or_else(|| r.axis("danger", s)) {
        push_appraisal("threat", threat, &mut r, &mut out);
    }
    let mut r = Reader::new(atoms);
    let threat_in = r
        .get(&AtomKey::threat("final", s))
        .or_else(|| r.axis("danger", s))
        .unwrap_or(0.0);
    let resources = r.value_or(&AtomKey::world("resources", s), 0.5);
    let experience = r.value_or(&AtomKey::trait_("experience", s), 0.5);
    let control = 0.5 * (1.0 - threat_in) + 0.3 * resources + 0.2 * experience;
    push_appraisal("control", control, &mut r, &mut out);

    let mut r = Reader::new(atoms);
    let mut support: Option<f64> = None;
    for other in r.targets(&format!("tom:belief:{}:", s)) {
        let Some(helpful) = r.get(&AtomKey::tom_belief(s, &other, "helpfulness")) else {
            continue;
        };
        let nearby = r.value_or(&AtomKey::obs("nearby", s, Some(other.as_str())), 0.0);
        let value = helpful * (0.5 + 0.5 * nearby);
        support = Some(support.map_or(value, |v| v.max(value)));
    }
    if support.is_none() {
        support = r
            .max_with_prefix(&relational_prefix("rel", "trust", s))
            .map(|trust| 0.7 * trust);
    }
    if let Some(support) = support {
        push_appraisal("support", support, &mut r, &mut out);
    }

    let mut r = Reader::new(atoms);
    if let Some(uncertainty) = r.axis("uncertainty", s) {
        push_appraisal("uncertainty", uncertainty, &mut r, &mut out);
    }

    let mut r = Reader::new(atoms);
    let mut blamed = r.targets(&relational_prefix("obs", "hostile", s));
    blamed.extend(r.targets(&relational_prefix("mem", "hostile", s)));
    let mut blame: Option<f64> = None;
    for other in &blamed {
        let seen = r.value_or(&AtomKey::obs("hostile", s, Some(other.as_str())), 0.0);
        let remembered = r.value_or(&AtomKey::mem("hostile", s, other), 0.0);
        let value = noisy_or([seen, 0.5 * remembered]);
        blame = Some(blame.map_or(value, |b| b.max(value)));
    }
    if let Some(blame) = blame {
        push_appraisal("blame", blame, &mut r, &mut out);
    }

    let emit = |name: &str, value: f64, reader: &mut Reader<'_>, out: &mut Vec<Atom>| {
        if let Some(atom) = reader.emit(AtomKey::emo(name, s), clamp01(value)) {
            out.push(atom);
        }
    };

    let mut r = Reader::new(atoms);
    if let (Some(threat), Some(control)) = (appraised.read(&mut r, "threat"), appraised.read(&mut r, "control")) {
        emit("fear", threat * (1.0 - 0.5 * control), &mut r, &mut out);
    }

    let mut r = Reader::new(atoms);
    if let Some(blame) = appraised.read(&mut r, "blame") {
        let control = appraised.read(&mut r, "control").unwrap_or(0.5);
        emit("anger", blame * (0.5 + 0.5 * control), &mut r, &mut out);
    }

    let mut r = Reader::new(atoms);
    if let Some(uncertainty) = appraised.read(&mut r, "uncertainty") {
        let threat = appraised.read(&mut r, "threat").unwrap_or(0.0);
        emit("anxiety", uncertainty * (0.5 + 0.5 * threat), &mut r, &mut out);
    }

    let mut r = Reader::new(atoms);
    let support = appraised.read(&mut r, "support");
    let control = appraised.read(&mut r, "control");
    if support.is_some() || control.is_some() {
        let threat = appraised.read(&mut r, "threat").unwrap_or(0.0);
        let hope = (0.6 * support.unwrap_or(0.0) + 0.4 * control.unwrap_or(0.0)) * (1.0 - 0.5 * threat);
        emit("hope", hope, &mut r, &mut out);
    }

    let mut r = Reader::new(atoms);
    let norm = r.axis("normPressure", s);
    let publicness = r.axis("publicness", s);
    if let (Some(norm), Some(publicness)) = (norm, publicness) {
        let stress = r.value_or(&AtomKey::world("stress", s), 0.0);
        emit("shame", norm * publicness * (0.5 + 0.5 * stress), &mut r, &mut out);
    }

    let mut r = Reader::new(atoms);
    let health = r.get(&AtomKey::world("health", s));
    let fatigue = r.get(&AtomKey::world("fatigue", s));
    let scarcity = r.axis("scarcity", s);
    if health.is_some() || fatigue.is_some() || scarcity.is_some() {
        let support = appraised.read(&mut r, "support").unwrap_or(0.0);
        let loss = noisy_or([
            1.0 - health.unwrap_or(1.0),
            0.5 * fatigue.unwrap_or(0.0),
            0.4 * scarcity.unwrap_or(0.0),
        ]);
        emit("sadness", (1.0 - support) * loss, &mut r, &mut out);
    }

    out
}
