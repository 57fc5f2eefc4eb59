//! Signal field - atoms aggregated into named channels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::atoms::{Atom, AtomKind, AtomSet};

/// Named output channels of the signal field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Threat,
    Uncertainty,
    Attachment,
    Norm,
    Resource,
    Curiosity,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 6] = [
        ChannelKind::Threat,
        ChannelKind::Uncertainty,
        ChannelKind::Attachment,
        ChannelKind::Norm,
        ChannelKind::Resource,
        ChannelKind::Curiosity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Threat => "threat",
            ChannelKind::Uncertainty => "uncertainty",
            ChannelKind::Attachment => "attachment",
            ChannelKind::Norm => "norm",
            ChannelKind::Resource => "resource",
            ChannelKind::Curiosity => "curiosity",
        }
    }

    /// Which channel, if any, an atom feeds.
    ///
    /// Goal, feeling, possibility and decision atoms are outputs of the field
    /// and never feed it.
    pub fn for_atom(atom: &Atom) -> Option<ChannelKind> {
        let metric = atom.id.metric();
        let metric = metric.as_str();
        match atom.kind {
            AtomKind::ContextAxis | AtomKind::LensAxis => match metric {
                "danger" | "timePressure" => Some(ChannelKind::Threat),
                "uncertainty" => Some(ChannelKind::Uncertainty),
                "normPressure" | "publicness" | "crowd" => Some(ChannelKind::Norm),
                "scarcity" => Some(ChannelKind::Resource),
                "intimacy" => Some(ChannelKind::Attachment),
                _ => None,
            },
            AtomKind::ThreatChannel => Some(ChannelKind::Threat),
            AtomKind::TomDyad => match metric {
                "trust" | "support" | "familiarity" => Some(ChannelKind::Attachment),
                "threat" => Some(ChannelKind::Threat),
                "alignment" => Some(ChannelKind::Norm),
                _ => None,
            },
            AtomKind::TomMode => Some(ChannelKind::Uncertainty),
            AtomKind::TomBelief | AtomKind::Belief => match metric {
                "helpfulness" => Some(ChannelKind::Attachment),
                "harmfulness" => Some(ChannelKind::Threat),
                _ => None,
            },
            AtomKind::Emotion => match metric {
                "fear" | "anxiety" | "anger" => Some(ChannelKind::Threat),
                "shame" => Some(ChannelKind::Norm),
                "sadness" => Some(ChannelKind::Attachment),
                "hope" => Some(ChannelKind::Curiosity),
                _ => None,
            },
            AtomKind::Appraisal => match metric {
                "threat" => Some(ChannelKind::Threat),
                "uncertainty" => Some(ChannelKind::Uncertainty),
                "support" => Some(ChannelKind::Attachment),
                _ => None,
            },
            AtomKind::WorldFact => match metric {
                "hazard" => Some(ChannelKind::Threat),
                _ => None,
            },
            AtomKind::Observation | AtomKind::Memory => match metric {
                "hostile" => Some(ChannelKind::Threat),
                "helpful" => Some(ChannelKind::Attachment),
                _ => None,
            },
            AtomKind::Relation => match metric {
                "trust" | "closeness" => Some(ChannelKind::Attachment),
                "hostility" => Some(ChannelKind::Threat),
                _ => None,
            },
            AtomKind::Trait => match metric {
                "curiosity" => Some(ChannelKind::Curiosity),
                _ => None,
            },
            AtomKind::Scene => match metric {
                "normPressure" | "publicness" => Some(ChannelKind::Norm),
                "scarcity" => Some(ChannelKind::Resource),
                _ => None,
            },
            AtomKind::TomPolicy
            | AtomKind::Feeling
            | AtomKind::GoalMode
            | AtomKind::GoalPressure
            | AtomKind::GoalActive
            | AtomKind::Possibility
            | AtomKind::Decision
            | AtomKind::Custom => None,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contributors to one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub kind: ChannelKind,
    /// Atom id -> magnitude x confidence.
    pub sources: BTreeMap<String, f64>,
}

impl Channel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            sources: BTreeMap::new(),
        }
    }

    /// Sum of source weights.
    pub fn total(&self) -> f64 {
        self.sources.values().sum()
    }

    /// Saturating [0, 1] intensity: `1 - exp(-total)`.
    pub fn intensity(&self) -> f64 {
        1.0 - (-self.total().max(0.0)).exp()
    }

    /// Sources sorted by weight, heaviest first; ties by id.
    pub fn top_sources(&self, n: usize) -> Vec<(&String, f64)> {
        let mut sources: Vec<_> = self.sources.iter().map(|(id, w)| (id, *w)).collect();
        sources.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        sources.truncate(n);
        sources
    }
}

/// Per-channel aggregation of an atom set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SignalField {
    channels: BTreeMap<ChannelKind, Channel>,
}

impl SignalField {
    /// Aggregate every atom, optionally restricted to one subject.
    pub fn from_atoms(set: &AtomSet, subject: Option<&str>) -> Self {
        let mut field = Self::default();
        for atom in set.iter() {
            if let Some(subject) = subject {
                if atom.subject() != Some(subject) {
                    continue;
                }
            }
            if let Some(kind) = ChannelKind::for_atom(atom) {
                let weight = atom.weight();
                if weight.is_finite() && weight > 0.0 {
                    field
                        .channels
                        .entry(kind)
                        .or_insert_with(|| Channel::new(kind))
                        .sources
                        .insert(atom.id_str(), weight);
                }
            }
        }
        field
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&Channel> {
        self.channels.get(&kind)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Channel intensity, 0 when the channel has no sources.
    pub fn intensity(&self, kind: ChannelKind) -> f64 {
        self.channel(kind).map(Channel::intensity).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{AtomKey, Origin};

    fn sample() -> AtomSet {
        AtomSet::from_atoms([
            Atom::new(AtomKey::ctx("danger", "A"), Origin::Derived, 0.8).with_confidence(0.5),
            Atom::new(AtomKey::threat("final", "A"), Origin::Derived, 0.6),
            Atom::new(AtomKey::tom_dyad("A", "B", "trust"), Origin::Derived, 0.7),
            Atom::new(AtomKey::ctx("danger", "B"), Origin::Derived, 0.9),
            Atom::new(AtomKey::goal(&["domain", "safety"], "A"), Origin::Derived, 0.9),
        ])
    }

    #[test]
    fn test_channel_weights() {
        let field = SignalField::from_atoms(&sample(), Some("A"));
        let threat = field.channel(ChannelKind::Threat).unwrap();

        assert_eq!(threat.sources.len(), 2);
        assert!((threat.total() - 1.0).abs() < 1e-9);
        assert!(field.channel(ChannelKind::Attachment).is_some());
        assert!(field.channel(ChannelKind::Resource).is_none());
    }

    #[test]
    fn test_goal_atoms_do_not_feed_field() {
        let field = SignalField::from_atoms(&sample(), None);
        assert!(field
            .channels()
            .all(|c| !c.sources.contains_key("goal:domain:safety:A")));
        assert_eq!(field.channel(ChannelKind::Threat).unwrap().sources.len(), 3);
    }

    #[test]
    fn test_intensity_saturates() {
        let field = SignalField::from_atoms(&sample(), Some("A"));
        let intensity = field.intensity(ChannelKind::Threat);
        assert!((intensity - (1.0 - (-1.0f64).exp())).abs() < 1e-9);
        assert_eq!(field.intensity(ChannelKind::Curiosity), 0.0);
    }

    #[test]
    fn test_top_sources_order() {
        let field = SignalField::from_atoms(&sample(), Some("A"));
        let top = field.channel(ChannelKind::Threat).unwrap().top_sources(1);
        assert_eq!(top[0].0, "threat:final:A");
    }
}
