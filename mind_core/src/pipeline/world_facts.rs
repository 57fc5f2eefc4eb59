//! World snapshot to fact atoms.

use sim_world::{EventValence, TraitKind, WorldSnapshot};
use std::collections::BTreeMap;

use super::TickContext;
use crate::atoms::{merge_by_precedence, Atom, AtomKey, AtomSet, Origin};
use crate::math::{clamp01, noisy_or};

/// Nearby agents at which `world:crowd` saturates.
const CROWD_SATURATION: f64 = 5.0;

/// Events at most this old count as direct observations; older ones are memories.
const OBSERVATION_AGE: u64 = 1;

pub(super) fn derive(ctx: &mut TickContext<'_>, _atoms: &AtomSet) -> Vec<Atom> {
    let mut facts = Vec::new();
    if let Some(world) = ctx.world {
        body_and_traits(ctx, world, &mut facts);
        surroundings(ctx, world, &mut facts);
        relationships(ctx, world, &mut facts);
        events(ctx, world, &mut facts);
    }
    if let Some(scene) = ctx.scene {
        let s = ctx.subject();
        for (metric, value) in [
            ("timePressure", scene.time_pressure),
            ("normPressure", scene.norm_pressure),
            ("publicness", scene.publicness),
            ("scarcity", scene.scarcity),
        ] {
            facts.push(Atom::new(AtomKey::scene(metric, s), Origin::World, value));
        }
    }

    let base = AtomSet::from_atoms(facts);
    merge_by_precedence(&base, ctx.manual_atoms).atoms.into_atoms()
}

fn body_and_traits(ctx: &TickContext<'_>, world: &WorldSnapshot, facts: &mut Vec<Atom>) {
    let Some(agent) = world.get_agent(ctx.self_id) else {
        return;
    };
    let s = ctx.subject();
    let body = &agent.body;
    for (metric, value) in [
        ("health", body.health),
        ("fatigue", body.fatigue),
        ("stress", body.stress),
        ("resources", body.resources),
    ] {
        facts.push(Atom::new(AtomKey::world(metric, s), Origin::World, value));
    }
    for kind in TraitKind::ALL {
        facts.push(Atom::new(
            AtomKey::trait_(kind.as_str(), s),
            Origin::World,
            agent.traits.get(kind),
        ));
    }
    for record in &agent.beliefs {
        facts.push(
            Atom::new(
                AtomKey::belief(&record.trait_name, s, record.about.as_str()),
                Origin::Belief,
                record.value,
            )
            .with_confidence(record.confidence),
        );
    }
}

fn surroundings(ctx: &TickContext<'_>, world: &WorldSnapshot, facts: &mut Vec<Atom>) {
    let s = ctx.subject();
    if let Some(cell) = world.cell_of(ctx.self_id) {
        let privacy = if cell.private { 1.0 } else { 0.0 };
        for (metric, value) in [
            ("hazard", cell.hazard),
            ("cover", cell.cover),
            ("visibility", cell.visibility),
            ("privacy", privacy),
        ] {
            facts.push(Atom::new(AtomKey::world(metric, s), Origin::World, value));
        }
    }

    if !world.positions.contains_key(ctx.self_id) {
        return;
    }
    let radius = ctx.config.pipeline.nearby_radius;
    let nearby = world.agents_near(ctx.self_id, radius);
    facts.push(
        Atom::new(
            AtomKey::world("crowd", s),
            Origin::World,
            clamp01(nearby.len() as f64 / CROWD_SATURATION),
        )
        .with_part("nearby", nearby.len()),
    );
    for (other, distance) in nearby {
        let proximity = if radius > 0.0 { 1.0 - distance / radius } else { 1.0 };
        facts.push(
            Atom::new(AtomKey::obs("nearby", s, Some(other.as_str())), Origin::Obs, proximity)
                .with_part("distance", distance),
        );
    }
}

fn relationships(ctx: &TickContext<'_>, world: &WorldSnapshot, facts: &mut Vec<Atom>) {
    let s = ctx.subject();
    for edge in world.relationships_of(ctx.self_id) {
        let other = edge.to.as_str();
        facts.push(Atom::new(AtomKey::rel("trust", s, other), Origin::World, edge.trust));
        facts.push(Atom::new(AtomKey::rel("hostility", s, other), Origin::World, edge.hostility));
        facts.push(Atom::new(AtomKey::rel("closeness", s, other), Origin::World, edge.closeness));
    }
}

/// Hostile and helpful events aimed at self. Recent ones become observations,
/// older ones memories weighted by a half-life.
fn events(ctx: &TickContext<'_>, world: &WorldSnapshot, facts: &mut Vec<Atom>) {
    let s = ctx.subject();
    let window = ctx.config.pipeline.memory_window;
    let half_life = ctx.config.pipeline.memory_half_life;

    // (is_observation, metric, actor) -> (weights, event ids)
    let mut grouped: BTreeMap<(bool, &'static str, String), (Vec<f64>, Vec<String>)> = BTreeMap::new();
    for event in world.events_targeting(ctx.self_id) {
        if event.tick > ctx.tick || &event.actor == ctx.self_id {
            continue;
        }
        let age = event.age(ctx.tick);
        if age > window {
            continue;
        }
        let metric = match event.kind.valence() {
            EventValence::Hostile => "hostile",
            EventValence::Helpful => "helpful",
            EventValence::Neutral => continue,
        };
        let weight = event.intensity * 0.5f64.powf(age as f64 / half_life);
        let entry = grouped
            .entry((age <= OBSERVATION_AGE, metric, event.actor.as_str().to_string()))
            .or_default();
        entry.0.push(weight);
        entry.1.push(event.id.to_string());
    }

    for ((observed, metric, actor), (weights, ids)) in grouped {
        let (key, origin) = if observed {
            (AtomKey::obs(metric, s, Some(&actor)), Origin::Obs)
        } else {
            (AtomKey::mem(metric, s, &actor), Origin::Memory)
        };
        facts.push(
            Atom::new(key, origin, noisy_or(weights))
                .with_part("events", ids),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::session::SimulationSession;
    use sim_world::{Agent, AgentId, EventKind, Position, SceneControls, WorldEvent};

    fn derive_for(world: Option<&WorldSnapshot>, manual: &[Atom], tick: u64) -> AtomSet {
        let id = AgentId::new("A");
        let config = EngineConfig::default();
        let mut session = SimulationSession::new();
        let mut ctx = TickContext {
            self_id: &id,
            tick,
            world,
            scene: Some(SceneControls::default()),
            manual_atoms: manual,
            config: &config,
            session: &mut session,
        };
        AtomSet::from_atoms(derive(&mut ctx, &AtomSet::new()))
    }

    #[test]
    fn test_scene_only() {
        let atoms = derive_for(None, &[], 0);
        assert_eq!(atoms.len(), 4);
        assert_eq!(atoms.value(&AtomKey::scene("publicness", "A")), Some(0.5));
    }

    #[test]
    fn test_events_split_by_age() {
        let mut world = WorldSnapshot::new();
        let a = world.add_agent(Agent::new("A", "Ada"));
        let b = world.add_agent(Agent::new("B", "Bo"));
        world.events.push(WorldEvent::new(10, EventKind::Attack, b.clone()).with_target(a.clone()));
        world.events.push(WorldEvent::new(2, EventKind::Help, b.clone()).with_target(a.clone()));
        world.events.push(WorldEvent::new(10, EventKind::Talk, b).with_target(a));

        let atoms = derive_for(Some(&world), &[], 10);
        assert_eq!(atoms.value(&AtomKey::obs("hostile", "A", Some("B"))), Some(1.0));
        let helpful = atoms.value(&AtomKey::mem("helpful", "A", "B")).unwrap();
        assert!(helpful > 0.0 && helpful < 1.0);
        assert_eq!(atoms.with_prefix("obs:helpful:").count(), 0);
    }

    #[test]
    fn test_nearby_and_crowd() {
        let mut world = WorldSnapshot::new();
        let a = world.add_agent(Agent::new("A", "Ada"));
        let b = world.add_agent(Agent::new("B", "Bo"));
        world.set_position(&a, Position::new(0, 0)).unwrap();
        world.set_position(&b, Position::new(3, 0)).unwrap();

        let atoms = derive_for(Some(&world), &[], 0);
        let proximity = atoms.value(&AtomKey::obs("nearby", "A", Some("B"))).unwrap();
        assert!((proximity - 0.5).abs() < 1e-9);
        assert!((atoms.value(&AtomKey::world("crowd", "A")).unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_manual_atoms_merge_by_precedence() {
        let mut world = WorldSnapshot::new();
        world.add_agent(Agent::new("A", "Ada"));
        let manual = [
            Atom::new(AtomKey::world("health", "A"), Origin::Derived, 0.1),
            Atom::new(AtomKey::world("stress", "A"), Origin::Override, 0.9),
        ];
        let atoms = derive_for(Some(&world), &manual, 0);
        assert_eq!(atoms.value(&AtomKey::world("health", "A")), Some(1.0));
        assert_eq!(atoms.value(&AtomKey::world("stress", "A")), Some(0.9));
    }
}
