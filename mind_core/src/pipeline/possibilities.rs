//! Candidate actions (`poss:*`) and the best of them (`decision:best:<self>`).

use std::collections::BTreeMap;

use super::{Reader, TickContext};
use crate::atoms::{Atom, AtomKey, AtomSet};
use crate::decision::{rank, Candidate};
use crate::goals::GoalDomain;
use crate::math::clamp01;
use crate::tom::TomAction;

/// Social possibilities kept per other agent.
const PER_TARGET: usize = 3;

const POLICY_WEIGHT: f64 = 0.6;
const GOAL_WEIGHT: f64 = 0.4;

/// How well a social action serves a goal domain.
fn goal_affinity(action: TomAction, domain: GoalDomain) -> f64 {
    use GoalDomain::*;
    use TomAction::*;
    match (action, domain) {
        (Assist, Affiliation) => 0.8,
        (Assist, Status) => 0.3,
        (ShareInfo, Affiliation) => 0.5,
        (ShareInfo, Order) => 0.4,
        (ShareInfo, Control) => 0.3,
        (Negotiate, Control) => 0.5,
        (Negotiate, Status) | (Negotiate, Wealth) => 0.4,
        (Monitor, Control) => 0.6,
        (Monitor, Safety) => 0.5,
        (Avoid, Safety) => 0.8,
        (Avoid, Rest) => 0.3,
        (SetBoundary, Control) => 0.5,
        (SetBoundary, Safety) => 0.4,
        (SetBoundary, Status) => 0.3,
        (Confront, Status) => 0.5,
        (Confront, Control) => 0.4,
        (Confront, Safety) => 0.2,
        (Defer, Order) => 0.5,
        (Defer, Affiliation) | (Defer, Rest) => 0.3,
        _ => 0.0,
    }
}

/// Active goals with their scores and atom ids.
fn active_goals(atoms: &AtomSet, s: &str) -> Vec<(GoalDomain, f64, String)> {
    atoms
        .with_prefix("goal:active:")
        .filter(|a| a.subject() == Some(s))
        .filter_map(|a| {
            let domain = GoalDomain::parse(a.id.parts().get(1)?)?;
            Some((domain, a.magnitude, a.id_str()))
        })
        .collect()
}

/// Score-weighted affinity of `action` with the active goals.
fn alignment(action: TomAction, goals: &[(GoalDomain, f64, String)]) -> f64 {
    let total: f64 = goals.iter().map(|(_, score, _)| score).sum();
    if total <= 0.0 {
        return 0.0;
    }
    goals
        .iter()
        .map(|(domain, score, _)| score * goal_affinity(action, *domain))
        .sum::<f64>()
        / total
}

pub(super) fn derive(ctx: &mut TickContext<'_>, atoms: &AtomSet) -> Vec<Atom> {
    let s = ctx.subject();
    let mut out = Vec::new();
    let goals = active_goals(atoms, s);
    let goal_ids: Vec<String> = goals.iter().map(|(_, _, id)| id.clone()).collect();

    let mut by_target: BTreeMap<String, Vec<(Candidate, Atom)>> = BTreeMap::new();
    for other in atoms.targets_with_prefix(&format!("tom:policy:{}:", s)) {
        for action in TomAction::ALL {
            let key = AtomKey::tom_policy(s, &other, action.as_str());
            let Some(probability) = atoms.value(&key) else {
                continue;
            };
            let align = alignment(action, &goals);
            let score = clamp01(POLICY_WEIGHT * probability + GOAL_WEIGHT * align);
            let mut used = vec![key.to_string()];
            used.extend(goal_ids.iter().cloned());
            let atom = Atom::derived(AtomKey::poss(action.as_str(), s, Some(other.as_str())), score, used)
                .with_part("policy", probability)
                .with_part("alignment", align);
            let candidate = Candidate {
                atom_id: atom.id_str(),
                action: action.as_str().to_string(),
                target: Some(other.as_str().into()),
                score,
            };
            by_target.entry(other.clone()).or_default().push((candidate, atom));
        }
    }

    let mut candidates = Vec::new();
    for (_, mut options) in by_target {
        options.sort_by(|a, b| {
            b.0.score
                .partial_cmp(&a.0.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.atom_id.cmp(&b.0.atom_id))
        });
        for (candidate, atom) in options.into_iter().take(PER_TARGET) {
            candidates.push(candidate);
            out.push(atom);
        }
    }

    let mut self_action = |action: &str, reader: &mut Reader<'_>, score: f64| {
        if let Some(atom) = reader.emit(AtomKey::poss(action, s, None), clamp01(score)) {
            candidates.push(Candidate {
                atom_id: atom.id_str(),
                action: action.to_string(),
                target: None,
                score: clamp01(score),
            });
            out.push(atom);
        }
    };
    let goal = |domain: GoalDomain| AtomKey::goal(&["domain", domain.as_str()], s);

    let mut r = Reader::new(atoms);
    let threat = r.value_or(&AtomKey::threat("final", s), 0.0);
    let safety = r.value_or(&goal(GoalDomain::Safety), 0.0);
    self_action("flee", &mut r, 0.5 * safety + 0.5 * threat);

    let mut r = Reader::new(atoms);
    let exposed = r.value_or(&AtomKey::threat("env", s), 0.0);
    let safety = r.value_or(&goal(GoalDomain::Safety), 0.0);
    self_action("seek_cover", &mut r, 0.4 * safety + 0.6 * exposed);

    for (action, domain, damping) in [
        ("rest", GoalDomain::Rest, 1.0),
        ("explore", GoalDomain::Exploration, 1.0),
        ("forage", GoalDomain::Wealth, 0.5),
    ] {
        let mut r = Reader::new(atoms);
        let Some(pressure) = r.get(&goal(domain)) else {
            continue;
        };
        let threat = r.value_or(&AtomKey::threat("final", s), 0.0);
        self_action(action, &mut r, pressure * (1.0 - damping * threat));
    }

    rank(&mut candidates);
    if let Some(best) = candidates.first() {
        let used: Vec<String> = candidates.iter().map(|c| c.atom_id.clone()).collect();
        out.push(
            Atom::derived(AtomKey::decision("best", s), best.score, used)
                .with_label(best.action.as_str())
                .with_code(best.atom_id.as_str())
                .with_part("candidates", candidates.len()),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::Origin;
    use crate::config::EngineConfig;
    use crate::session::SimulationSession;
    use sim_world::AgentId;

    fn possibilities_of(atoms: &AtomSet) -> AtomSet {
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

    fn policy(other: &str, probs: &[(TomAction, f64)]) -> Vec<Atom> {
        probs
            .iter()
            .map(|(action, p)| Atom::derived(AtomKey::tom_policy("A", other, action.as_str()), *p, ["tom:mode:A"]))
            .collect()
    }

    #[test]
    fn test_top_three_per_target() {
        let atoms = AtomSet::from_atoms(policy(
            "B",
            &[
                (TomAction::Assist, 0.05),
                (TomAction::Avoid, 0.5),
                (TomAction::Monitor, 0.2),
                (TomAction::Confront, 0.15),
                (TomAction::Defer, 0.1),
            ],
        ));
        let out = possibilities_of(&atoms);
        let social: Vec<String> = out.with_prefix("poss:").map(|a| a.id_str()).collect();
        assert_eq!(social.len(), 3);
        assert!(social.contains(&"poss:avoid:A:B".to_string()));
        assert!(!social.contains(&"poss:assist:A:B".to_string()));

        let best = out.get_key(&AtomKey::decision("best", "A")).unwrap();
        assert_eq!(best.label.as_deref(), Some("avoid"));
        assert_eq!(best.code.as_deref(), Some("poss:avoid:A:B"));
        assert!((best.magnitude - 0.3).abs() < 1e-9);
        assert_eq!(best.used_ids().len(), 3);
    }

    #[test]
    fn test_active_goal_steers_choice() {
        let mut atoms: Vec<Atom> = policy("B", &[(TomAction::Assist, 0.4), (TomAction::Avoid, 0.45)]);
        atoms.push(Atom::derived(
            AtomKey::goal(&["active", "affiliation"], "A"),
            0.9,
            ["goal:domain:affiliation:A"],
        ));
        let out = possibilities_of(&AtomSet::from_atoms(atoms));
        let assist = out.value(&AtomKey::poss("assist", "A", Some("B"))).unwrap();
        let avoid = out.value(&AtomKey::poss("avoid", "A", Some("B"))).unwrap();
        assert!(assist > avoid);
        let best = out.get_key(&AtomKey::decision("best", "A")).unwrap();
        assert_eq!(best.label.as_deref(), Some("assist"));
    }

    #[test]
    fn test_threat_favours_flight_over_rest() {
        let atoms = AtomSet::from_atoms([
            Atom::derived(AtomKey::threat("final", "A"), 0.9, ["world:hazard:A"]),
            Atom::derived(AtomKey::goal(&["domain", "safety"], "A"), 0.9, ["threat:final:A"]),
            Atom::derived(AtomKey::goal(&["domain", "rest"], "A"), 0.6, ["world:fatigue:A"]),
            Atom::new(AtomKey::world("hazard", "A"), Origin::World, 0.9),
        ]);
        let out = possibilities_of(&atoms);
        let flee = out.value(&AtomKey::poss("flee", "A", None)).unwrap();
        let rest = out.value(&AtomKey::poss("rest", "A", None)).unwrap();
        assert!(flee > rest);
        assert!(out.get_key(&AtomKey::poss("explore", "A", None)).is_none());
    }

    #[test]
    fn test_nothing_in_nothing_out() {
        assert!(possibilities_of(&AtomSet::new()).is_empty());
    }
}
