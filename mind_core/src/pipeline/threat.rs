//! Threat channels: `threat:{env,social,body,final}:<self>`.

use std::collections::BTreeSet;

use super::{relational_prefix, Reader, TickContext};
use crate::atoms::{Atom, AtomKey, AtomSet};
use crate::math::{clamp01, noisy_or};

pub(super) fn derive(ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Vec<Atom> {
    let s = ctx.subject();
    let prior_harm = ctx.config.tom.prior_harmfulness;
    let mut out = Vec::new();
    let mut channels: Vec<(String, f64)> = Vec::new();

    let mut r = Reader::new(atoms);
    let hazard = r.get(&AtomKey::world("hazard", s));
    let cover = r.value_or(&AtomKey::world("cover", s), 0.0);
    let visibility = r.value_or(&AtomKey::world("visibility", s), 1.0);
    let env = noisy_or([hazard.unwrap_or(0.0) * (1.0 - 0.5 * cover), 0.3 * (1.0 - visibility)]);
    if let Some(atom) = r.emit(AtomKey::threat("env", s), env) {
        channels.push((atom.id_str(), env));
        out.push(atom.with_part("cover", cover));
    }

    let mut others = BTreeSet::new();
    for (ns, metric) in [("obs", "hostile"), ("mem", "hostile")] {
        others.extend(r.targets(&relational_prefix(ns, metric, s)));
    }
    others.extend(r.targets(&format!("tom:dyad:{}:", s)));
    let mut social = 0.0f64;
    let mut worst: Option<String> = None;
    for other in &others {
        let o = other.as_str();
        let seen = r.value_or(&AtomKey::obs("hostile", s, Some(o)), 0.0);
        let remembered = r.value_or(&AtomKey::mem("hostile", s, o), 0.0);
        let dyad_threat = r.value_or(&AtomKey::tom_dyad(s, o, "threat"), 0.0);
        let harm = r.value_or(&AtomKey::tom_belief(s, o, "harmfulness"), prior_harm);
        let score = noisy_or([seen, 0.6 * remembered, harm * dyad_threat]);
        if score > social {
            social = score;
            worst = Some(other.clone());
        }
    }
    if let Some(mut atom) = r.emit(AtomKey::threat("social", s), social) {
        if let Some(worst) = worst {
            atom = atom.with_part("source_agent", worst);
        }
        channels.push((atom.id_str(), social));
        out.push(atom);
    }

    let health = r.value_or(&AtomKey::world("health", s), 1.0);
    let fatigue = r.value_or(&AtomKey::world("fatigue", s), 0.0);
    let stress = r.value_or(&AtomKey::world("stress", s), 0.0);
    let body = clamp01(0.6 * (1.0 - health) + 0.25 * fatigue + 0.15 * stress);
    if let Some(atom) = r.emit(AtomKey::threat("body", s), body) {
        channels.push((atom.id_str(), body));
        out.push(atom);
    }

    let mut combined: Vec<f64> = Vec::new();
    for (id, value) in &channels {
        r.note_used(id);
        let weight = if id.starts_with("threat:body:") { 0.5 } else { 1.0 };
        combined.push(weight * value);
    }
    let raw = noisy_or(combined);
    let final_value = match r.axis("danger", s) {
        Some(perceived) => 0.7 * raw + 0.3 * perceived,
        None => raw,
    };
    if let Some(atom) = r.emit(AtomKey::threat("final", s), clamp01(final_value)) {
        out.push(atom.with_part("channels", raw));
    }
    out
}
