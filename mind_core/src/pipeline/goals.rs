//! Goal ecology stage.
//!
//! Felt channels come from energy propagated over the agent's own atoms. They
//! score the modes, the mode gate biases domain pressures, and hysteresis picks
//! the active domains. Goal state integrates in the session across ticks.

use std::collections::BTreeMap;

use tracing::debug;

use super::{Reader, TickContext};
use crate::atoms::{Atom, AtomKey, AtomSet};
use crate::goals::{domain_pressures, select_active, DomainDrivers, GoalDomain, ModeGate};
use crate::graph::{propagate, AtomGraph, ChannelKind, EnergyResult, SignalField};
use crate::math::clamp01;

/// Energy that ends on an atom of another channel counts at this weight.
const SPILL_WEIGHT: f64 = 0.5;

/// Felt intensity of one channel and the seeds that drove it.
struct Felt {
    value: f64,
    drivers: Vec<String>,
}

fn felt_channels(field: &SignalField, energy: &EnergyResult, atoms: &AtomSet, top_k: usize) -> BTreeMap<ChannelKind, Felt> {
    let mut felt = BTreeMap::new();
    for (kind, result) in &energy.channels {
        let Some(channel) = field.channel(*kind) else {
            continue;
        };
        let mut total = 0.0;
        let mut seeds: BTreeMap<String, f64> = BTreeMap::new();
        for (node, e) in result.state.iter_energies() {
            let own = channel.sources.contains_key(node)
                || atoms
                    .get(node)
                    .and_then(ChannelKind::for_atom)
                    .map_or(false, |k| k == *kind);
            total += if own { *e } else { SPILL_WEIGHT * e };
            for (seed, share) in result.top_drivers(node, top_k) {
                *seeds.entry(seed).or_insert(0.0) += share;
            }
        }
        let mut ranked: Vec<(String, f64)> = seeds.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k.max(1));
        felt.insert(
            *kind,
            Felt {
                value: clamp01(1.0 - (-total.max(0.0)).exp()),
                drivers: ranked.into_iter().map(|(id, _)| id).collect(),
            },
        );
    }
    felt
}

fn read_drivers(reader: &mut Reader<'_>, s: &str) -> DomainDrivers {
    let base = DomainDrivers::default();
    DomainDrivers {
        threat: reader
            .get(&AtomKey::threat("final", s))
            .or_else(|| reader.axis("danger", s))
            .unwrap_or(base.threat),
        fear: reader.value_or(&AtomKey::emo("fear", s), base.fear),
        health: reader.value_or(&AtomKey::world("health", s), base.health),
        uncertainty: reader.axis("uncertainty", s).unwrap_or(base.uncertainty),
        control: reader.value_or(&AtomKey::app("control", s), base.control),
        support: reader.value_or(&AtomKey::app("support", s), base.support),
        sadness: reader.value_or(&AtomKey::emo("sadness", s), base.sadness),
        norm_pressure: reader.axis("normPressure", s).unwrap_or(base.norm_pressure),
        publicness: reader.axis("publicness", s).unwrap_or(base.publicness),
        shame: reader.value_or(&AtomKey::emo("shame", s), base.shame),
        curiosity: reader.value_or(&AtomKey::trait_("curiosity", s), base.curiosity),
        conscientiousness: reader.value_or(&AtomKey::trait_("conscientiousness", s), base.conscientiousness),
        fatigue: reader.value_or(&AtomKey::world("fatigue", s), base.fatigue),
        stress: reader.value_or(&AtomKey::world("stress", s), base.stress),
        scarcity: reader.axis("scarcity", s).unwrap_or(base.scarcity),
        resources: reader.value_or(&AtomKey::world("resources", s), base.resources),
    }
}

pub(super) fn derive(ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Vec<Atom> {
    let agent = ctx.self_id;
    let config = ctx.config;
    let tick = ctx.tick;
    let s = agent.as_str();
    let mut out = Vec::new();

    let own = AtomSet::from_atoms(atoms.iter().filter(|a| a.subject() == Some(s)).cloned());
    let field = SignalField::from_atoms(&own, Some(s));
    let energy = propagate(&AtomGraph::build(&own), &field, &config.energy);
    let felt = felt_channels(&field, &energy, &own, config.energy.top_k);

    let mut felt_values = BTreeMap::new();
    let mut feel_ids = Vec::new();
    for (kind, f) in &felt {
        let key = AtomKey::feel(kind.as_str(), s);
        feel_ids.push(key.to_string());
        felt_values.insert(*kind, f.value);
        out.push(Atom::derived(key, f.value, f.drivers.clone()));
    }

    let mut reader = Reader::new(atoms);
    let drivers = read_drivers(&mut reader, s);
    if felt.is_empty() && !reader.has_inputs() {
        return out;
    }
    let driver_ids = reader.take_used();

    let gate = ModeGate::compute(&felt_values, config.goals.mode_temperature);
    let mut mode_ids = Vec::new();
    if !feel_ids.is_empty() {
        let dominant = gate.dominant();
        for (mode, weight) in &gate.weights {
            let key = AtomKey::goal(&["mode", mode.as_str()], s);
            mode_ids.push(key.to_string());
            let mut atom = Atom::derived(key, *weight, feel_ids.clone())
                .with_part("score", gate.scores.get(mode).copied().unwrap_or(0.0))
                .with_part("temperature", gate.temperature);
            if *mode == dominant {
                atom = atom.with_label("dominant");
            }
            out.push(atom);
        }
    }

    let base = domain_pressures(&drivers);
    let gated = if feel_ids.is_empty() {
        base.clone()
    } else {
        gate.apply(&base, config.goals.mode_bias_gain)
    };
    let mut domain_used = driver_ids;
    domain_used.extend(mode_ids.iter().cloned());
    for (domain, score) in &gated {
        out.push(
            Atom::derived(AtomKey::goal(&["domain", domain.as_str()], s), *score, domain_used.clone())
                .with_part("base", base.get(domain).copied().unwrap_or(0.0))
                .with_part("bias", gate.bias(*domain)),
        );
    }

    let previously_active = ctx.session.previously_active(agent);
    let lock_in = ctx.session.lock_in(agent);
    let selection = select_active(&gated, &previously_active, &lock_in, &config.goals);

    for domain in GoalDomain::ALL {
        let active = selection.is_active(domain);
        let known = ctx
            .session
            .goal_states(agent)
            .map_or(false, |states| states.contains_key(&domain));
        if !active && !known {
            continue;
        }
        let score = gated.get(&domain).copied().unwrap_or(0.0);
        let margin = selection.win_margin.get(&domain).copied().unwrap_or(0.0);
        let step = ctx
            .session
            .goal_state(agent, domain)
            .step(active, score, margin, tick, &config.goals);
        ctx.session.set_goal_state(agent, domain, step.after);

        if active {
            let effective = selection.candidate(domain).map_or(score, |c| c.effective);
            let domain_id = AtomKey::goal(&["domain", domain.as_str()], s).to_string();
            out.push(
                Atom::derived(AtomKey::goal(&["active", domain.as_str()], s), score, [domain_id])
                    .with_label(domain.as_str())
                    .with_part("effective", effective)
                    .with_part("held", selection.held.contains(&domain))
                    .with_part("win_margin", margin)
                    .with_part("state", step.after)
                    .with_part("completed", step.completed),
            );
        }
    }

    debug!(
        agent = %agent,
        tick,
        mode = gate.dominant().as_str(),
        active = ?selection.active,
        activated = ?selection.activated,
        dropped = ?selection.dropped,
        "goals selected"
    );
    ctx.session.set_active(agent, selection.active);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::Origin;
    use crate::config::EngineConfig;
    use crate::session::SimulationSession;
    use sim_world::AgentId;

    fn goals_of(atoms: &AtomSet, session: &mut SimulationSession, tick: u64) -> AtomSet {
        let id = AgentId::new("A");
        let config = EngineConfig::default();
        let mut ctx = TickContext {
            self_id: &id,
            tick,
            world: None,
            scene: None,
            manual_atoms: &[],
            config: &config,
            session,
        };
        AtomSet::from_atoms(derive(&mut ctx, atoms))
    }

    fn threatened() -> AtomSet {
        AtomSet::from_atoms([
            Atom::new(AtomKey::world("hazard", "A"), Origin::World, 0.9),
            Atom::derived(AtomKey::threat("final", "A"), 0.85, ["world:hazard:A"]),
            Atom::derived(AtomKey::emo("fear", "A"), 0.7, ["threat:final:A"]),
        ])
    }

    #[test]
    fn test_nothing_in_nothing_out() {
        let mut session = SimulationSession::new();
        assert!(goals_of(&AtomSet::new(), &mut session, 0).is_empty());
        assert_eq!(session.agents().count(), 0);
    }

    #[test]
    fn test_threat_activates_safety() {
        let mut session = SimulationSession::new();
        let out = goals_of(&threatened(), &mut session, 0);
        assert!(out.get_key(&AtomKey::feel("threat", "A")).is_some());
        let mode = out.get_key(&AtomKey::goal(&["mode", "threat"], "A")).unwrap();
        assert_eq!(mode.label.as_deref(), Some("dominant"));
        assert!(out.get_key(&AtomKey::goal(&["active", "safety"], "A")).is_some());
        assert!(session
            .previously_active(&AgentId::new("A"))
            .contains(&GoalDomain::Safety));
    }

    #[test]
    fn test_steady_input_locks_in_without_flicker() {
        let mut session = SimulationSession::new();
        let atoms = threatened();
        let agent = AgentId::new("A");
        let mut last_lock = 0.0;
        let mut last_active = None;
        for tick in 0..5 {
            let out = goals_of(&atoms, &mut session, tick);
            let active: Vec<String> = out.with_prefix("goal:active:").map(|a| a.id_str()).collect();
            if let Some(previous) = &last_active {
                assert_eq!(&active, previous, "active set changed at tick {}", tick);
            }
            last_active = Some(active);

            let state = session.goal_state(&agent, GoalDomain::Safety);
            assert!(state.lock_in >= last_lock);
            assert!(state.lock_in <= EngineConfig::default().goals.lock_max);
            last_lock = state.lock_in;
        }
        assert!(last_lock > 0.0);
    }

    #[test]
    fn test_feel_traces_its_seeds() {
        let mut session = SimulationSession::new();
        let out = goals_of(&threatened(), &mut session, 0);
        let feel = out.get_key(&AtomKey::feel("threat", "A")).unwrap();
        assert!(!feel.used_ids().is_empty());
        assert!(feel.used_ids().iter().all(|id| threatened().contains(id)));
    }
}
