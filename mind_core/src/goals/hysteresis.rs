//! Hysteretic active-set selection.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{GoalConfig, GoalDomain};

/// One domain's standing in a selection round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalCandidate {
    pub domain: GoalDomain,
    pub score: f64,
    pub previously_active: bool,
    pub lock_in: f64,
    /// Score plus the incumbency bonus.
    pub effective: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActiveSelection {
    /// Candidates ranked by effective score, then domain order.
    pub ranked: Vec<GoalCandidate>,
    pub active: BTreeSet<GoalDomain>,
    /// Active only because of the incumbency bonus.
    pub held: BTreeSet<GoalDomain>,
    pub activated: BTreeSet<GoalDomain>,
    pub dropped: BTreeSet<GoalDomain>,
    /// Lead of each active domain over the best inactive candidate.
    pub win_margin: BTreeMap<GoalDomain, f64>,
}

impl ActiveSelection {
    pub fn is_active(&self, domain: GoalDomain) -> bool {
        self.active.contains(&domain)
    }

    pub fn candidate(&self, domain: GoalDomain) -> Option<&GoalCandidate> {
        self.ranked.iter().find(|c| c.domain == domain)
    }
}

fn incumbency_bonus(margin: f64, lock_in: f64) -> f64 {
    margin * (1.0 + lock_in.clamp(0.0, 1.0))
}

fn rank(candidates: &mut [GoalCandidate], by_effective: bool) {
    candidates.sort_by(|a, b| {
        let (x, y) = if by_effective {
            (a.effective, b.effective)
        } else {
            (a.score, b.score)
        };
        y.total_cmp(&x).then(a.domain.cmp(&b.domain))
    });
}

fn take_top(ranked: &[GoalCandidate], config: &GoalConfig, by_effective: bool) -> BTreeSet<GoalDomain> {
    ranked
        .iter()
        .filter(|c| {
            let value = if by_effective { c.effective } else { c.score };
            value >= config.min_score
        })
        .take(config.max_active)
        .map(|c| c.domain)
        .collect()
}

/// Select up to `max_active` domains, favouring incumbents.
pub fn select_active(
    scores: &BTreeMap<GoalDomain, f64>,
    previously_active: &BTreeSet<GoalDomain>,
    lock_in: &BTreeMap<GoalDomain, f64>,
    config: &GoalConfig,
) -> ActiveSelection {
    let mut ranked: Vec<GoalCandidate> = scores
        .iter()
        .map(|(domain, score)| {
            let previously_active = previously_active.contains(domain);
            let lock = lock_in.get(domain).copied().unwrap_or(0.0);
            let bonus = if previously_active {
                incumbency_bonus(config.margin, lock)
            } else {
                0.0
            };
            GoalCandidate {
                domain: *domain,
                score: *score,
                previously_active,
                lock_in: lock,
                effective: score + bonus,
            }
        })
        .collect();

    let mut plain = ranked.clone();
    rank(&mut plain, false);
    let without_bonus = take_top(&plain, config, false);

    rank(&mut ranked, true);
    let active = take_top(&ranked, config, true);

    let best_inactive = ranked
        .iter()
        .filter(|c| !active.contains(&c.domain))
        .map(|c| c.effective)
        .fold(None, |acc: Option<f64>, e| Some(acc.map_or(e, |a| a.max(e))));

    let win_margin = ranked
        .iter()
        .filter(|c| active.contains(&c.domain))
        .map(|c| {
            let rival = best_inactive.unwrap_or(config.min_score);
            (c.domain, (c.effective - rival).max(0.0))
        })
        .collect();

    ActiveSelection {
        held: active.difference(&without_bonus).copied().collect(),
        activated: active.difference(previously_active).copied().collect(),
        dropped: previously_active.difference(&active).copied().collect(),
        ranked,
        active,
        win_margin,
    }
}
