//! Theory of mind: dyad metrics, System-2 mode, beliefs and policy per other agent.

use std::collections::{BTreeMap, BTreeSet};

use super::{pinned_value, relational_prefix, Reader, TickContext};
use crate::atoms::{Atom, AtomKey, AtomSet};
use crate::math::noisy_or;
use crate::tom::{
    compute_policy, system2_intensity, update_beliefs, DyadFeature, DyadFeatures, LatentTrait,
    PolicyInputs, System2Estimate, System2Inputs,
};

/// Every other agent self has any evidence about.
fn others(atoms: &AtomSet, s: &str) -> BTreeSet<String> {
    let mut others = BTreeSet::new();
    for (ns, metric) in [
        ("obs", "nearby"),
        ("obs", "hostile"),
        ("obs", "helpful"),
        ("mem", "hostile"),
        ("mem", "helpful"),
        ("rel", "trust"),
        ("rel", "hostility"),
        ("rel", "closeness"),
    ] {
        others.extend(atoms.targets_with_prefix(&relational_prefix(ns, metric, s)));
    }
    others.extend(atoms.targets_with_prefix(&format!("tom:dyad:{}:", s)));
    others.remove(s);
    others
}

/// One dyad metric from raw evidence, `None` when there is none.
fn dyad_metric(reader: &mut Reader<'_>, feature: DyadFeature, s: &str, o: &str) -> Option<f64> {
    let obs = |metric: &str| AtomKey::obs(metric, s, Some(o));
    match feature {
        DyadFeature::Trust => reader.get(&AtomKey::rel("trust", s, o)),
        DyadFeature::Threat => {
            let seen = reader.get(&obs("hostile"));
            let remembered = reader.get(&AtomKey::mem("hostile", s, o));
            let hostility = reader.get(&AtomKey::rel("hostility", s, o));
            if seen.is_none() && remembered.is_none() && hostility.is_none() {
                return None;
            }
            Some(noisy_or([
                seen.unwrap_or(0.0),
                0.6 * remembered.unwrap_or(0.0),
                0.8 * hostility.unwrap_or(0.0),
            ]))
        }
        DyadFeature::Support => {
            let seen = reader.get(&obs("helpful"));
            let remembered = reader.get(&AtomKey::mem("helpful", s, o));
            if seen.is_none() && remembered.is_none() {
                return None;
            }
            Some(noisy_or([seen.unwrap_or(0.0), 0.6 * remembered.unwrap_or(0.0)]))
        }
        DyadFeature::Alignment => {
            let trust = reader.get(&AtomKey::rel("trust", s, o));
            let hostility = reader.get(&AtomKey::rel("hostility", s, o));
            if trust.is_none() && hostility.is_none() {
                return None;
            }
            Some(0.5 + 0.5 * (trust.unwrap_or(0.5) - hostility.unwrap_or(0.0)))
        }
        DyadFeature::Familiarity => {
            let closeness = reader.get(&AtomKey::rel("closeness", s, o));
            let nearby = reader.get(&obs("nearby"));
            if closeness.is_none() && nearby.is_none() {
                return None;
            }
            Some(noisy_or([closeness.unwrap_or(0.0), 0.5 * nearby.unwrap_or(0.0)]))
        }
    }
}

/// System-2 inputs with their fallbacks: time pressure falls back to danger,
/// stakes to `0.3 + 0.7 x danger`, uncertainty to 0.5.
fn system2(reader: &mut Reader<'_>, s: &str, gain: f64) -> System2Estimate {
    let danger = reader.axis("danger", s).unwrap_or(0.0);
    let uncertainty = reader.axis("uncertainty", s).unwrap_or(0.5);
    let time_pressure = reader.axis("timePressure", s).unwrap_or(danger);
    let stakes = reader.axis("stakes", s).unwrap_or(0.3 + 0.7 * danger);
    system2_intensity(
        System2Inputs {
            uncertainty,
            stakes,
            time_pressure,
        },
        gain,
    )
}

pub(super) fn derive(ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Vec<Atom> {
    let s = ctx.subject();
    let config = &ctx.config.tom;
    let mut out = Vec::new();

    let mut reader = Reader::new(atoms);
    let estimate = system2(&mut reader, s, config.s2_gain);
    let mode_key = AtomKey::tom_mode(s);
    let mode_id = mode_key.to_string();
    let mode_emitted = match reader.emit(mode_key, estimate.intensity) {
        Some(atom) => {
            out.push(
                atom.with_label(estimate.label())
                    .with_part("voi", estimate.voi)
                    .with_part("uncertainty", estimate.inputs.uncertainty)
                    .with_part("stakes", estimate.inputs.stakes)
                    .with_part("time_pressure", estimate.inputs.time_pressure)
                    .with_part("gain", estimate.gain),
            );
            true
        }
        None => false,
    };
    let s2 = estimate.intensity;
    let mut danger_reader = Reader::new(atoms);
    let danger = danger_reader.axis("danger", s).unwrap_or(0.0);
    let danger_used = danger_reader.take_used();

    for other in others(atoms, s) {
        let o = other.as_str();

        let mut features = DyadFeatures::default();
        let mut dyad_ids = Vec::new();
        for feature in DyadFeature::ALL {
            let key = AtomKey::tom_dyad(s, o, feature.as_str());
            if let Some(given) = pinned_value(atoms, &key) {
                features.set(feature, given);
                dyad_ids.push(key.to_string());
                continue;
            }
            let mut r = Reader::new(atoms);
            if let Some(value) = dyad_metric(&mut r, feature, s, o) {
                if let Some(atom) = r.emit(key.clone(), value.clamp(0.0, 1.0)) {
                    features.set(feature, value);
                    dyad_ids.push(key.to_string());
                    out.push(atom);
                }
            }
        }
        if features.count() < config.min_dyad_metrics {
            continue;
        }

        let mut priors = BTreeMap::new();
        let mut prior_ids = BTreeMap::new();
        for latent in LatentTrait::ALL {
            let key = AtomKey::belief(latent.as_str(), s, o);
            if let Some(prior) = atoms.value(&key) {
                priors.insert(latent, prior);
                prior_ids.insert(latent, key.to_string());
            }
        }

        let beliefs = update_beliefs(&features, &priors, s2, config);
        let mut belief_ids = Vec::new();
        for (latent, post) in &beliefs {
            let key = AtomKey::tom_belief(s, o, latent.as_str());
            let mut used = dyad_ids.clone();
            if let Some(id) = prior_ids.get(latent) {
                used.push(id.clone());
            }
            if mode_emitted {
                used.push(mode_id.clone());
            }
            belief_ids.push(key.to_string());
            out.push(
                Atom::derived(key, post.posterior, used)
                    .with_part("prior", post.prior)
                    .with_part("prior_logit", post.prior_logit)
                    .with_part("evidence", post.evidence)
                    .with_part("contributions", &post.contributions)
                    .with_part("precision", post.precision)
                    .with_part("posterior_logit", post.posterior_logit),
            );
        }

        let policy = compute_policy(PolicyInputs::from_beliefs(&beliefs, danger), s2, config);
        let mut policy_used = belief_ids.clone();
        policy_used.extend(danger_used.iter().cloned());
        if mode_emitted {
            policy_used.push(mode_id.clone());
        }
        for (action, probability) in &policy.probabilities {
            let eu = policy.expected_utility.get(action).copied().unwrap_or(0.0);
            out.push(
                Atom::derived(AtomKey::tom_policy(s, o, action.as_str()), *probability, policy_used.clone())
                    .with_part("expected_utility", eu)
                    .with_part("temperature", policy.temperature)
                    .with_part("s2", s2)
                    .with_part("terms", policy.terms.get(action)),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::Origin;
    use crate::config::EngineConfig;
    use crate::session::SimulationSession;
    use crate::tom::TomAction;
    use sim_world::AgentId;

    fn tom_of(atoms: &AtomSet) -> AtomSet {
        let id = AgentId::new("A");
        let config = EngineConfig::default();
        let mut session = SimulationSession::new();
        let mut ctx = TickContext {
            self_id: &id,
            tick: 0,
            world: None,
            scene: None,
            manual_atoms: &[],
            config: &config,
            session: &mut session,
        };
        AtomSet::from_atoms(derive(&mut ctx, atoms))
    }

    #[test]
    fn test_mode_without_dyads() {
        let atoms = AtomSet::from_atoms([
            Atom::new(AtomKey::ctx("danger", "A"), Origin::Obs, 0.8),
            Atom::new(AtomKey::ctx("uncertainty", "A"), Origin::Obs, 0.6),
        ]);
        let out = tom_of(&atoms);
        let mode = out.get_key(&AtomKey::tom_mode("A")).unwrap();
        assert_eq!(mode.label.as_deref(), Some("System-1"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_sparse_dyad_skipped() {
        let atoms = AtomSet::from_atoms([Atom::new(
            AtomKey::obs("nearby", "A", Some("B")),
            Origin::Obs,
            0.9,
        )]);
        let out = tom_of(&atoms);
        assert!(out.get_key(&AtomKey::tom_dyad("A", "B", "familiarity")).is_some());
        assert_eq!(out.with_prefix("tom:belief:").count(), 0);
    }

    #[test]
    fn test_hostile_other_is_feared() {
        let atoms = AtomSet::from_atoms([
            Atom::new(AtomKey::rel("trust", "A", "B"), Origin::World, 0.1),
            Atom::new(AtomKey::rel("hostility", "A", "B"), Origin::World, 0.9),
            Atom::new(AtomKey::obs("hostile", "A", Some("B")), Origin::Obs, 0.8),
        ]);
        let out = tom_of(&atoms);
        let harm = out.value(&AtomKey::tom_belief("A", "B", "harmfulness")).unwrap();
        assert!(harm > 0.2);

        let assist = out
            .value(&AtomKey::tom_policy("A", "B", TomAction::Assist.as_str()))
            .unwrap();
        let avoid = out
            .value(&AtomKey::tom_policy("A", "B", TomAction::Avoid.as_str()))
            .unwrap();
        assert!(avoid > assist);

        let belief = out.get_key(&AtomKey::tom_belief("A", "B", "harmfulness")).unwrap();
        let parts = &belief.trace.as_ref().unwrap().parts;
        for name in ["prior", "evidence", "precision", "posterior_logit"] {
            assert!(parts.contains_key(name), "missing {}", name);
        }
    }

    #[test]
    fn test_stored_belief_is_prior() {
        let base = [
            Atom::new(AtomKey::rel("trust", "A", "B"), Origin::World, 0.5),
            Atom::new(AtomKey::rel("hostility", "A", "B"), Origin::World, 0.0),
        ];
        let mut with_prior = AtomSet::from_atoms(base.clone());
        with_prior.insert(Atom::new(AtomKey::belief("truthfulness", "A", "B"), Origin::Belief, 0.05));

        let plain = tom_of(&AtomSet::from_atoms(base));
        let primed = tom_of(&with_prior);
        let key = AtomKey::tom_belief("A", "B", "truthfulness");
        assert!(primed.value(&key).unwrap() < plain.value(&key).unwrap());
        assert!(primed
            .get_key(&key)
            .unwrap()
            .used_ids()
            .contains(&"belief:truthfulness:A:B".to_string()));
    }
}
