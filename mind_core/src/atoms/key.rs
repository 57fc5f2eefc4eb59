//! Structured atom keys.
//!
//! Atom ids are colon-delimited, namespace first: `ctx:danger:A`,
//! `obs:nearby:A:B`, `tom:dyad:A:B:trust`. External tooling matches on these
//! strings by prefix, so the canonical form must round-trip exactly. Inside the
//! engine the key is held as a namespace plus segments, and the namespace's
//! [`KeyShape`] says where the subject and target live.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtomKeyError {
    #[error("atom id is empty")]
    Empty,

    #[error("atom id `{0}` has an empty segment")]
    EmptySegment(String),

    #[error("atom id `{id}` does not fit its namespace: {reason}")]
    Shape { id: String, reason: &'static str },
}

/// Coarse classification of an atom, the first id segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Namespace {
    World,
    Obs,
    Rel,
    Belief,
    Mem,
    Trait,
    Scene,
    Ctx,
    Lens,
    Tom,
    Threat,
    App,
    Emo,
    Feel,
    Goal,
    Poss,
    Decision,
    /// Anything outside the engine's own vocabulary.
    Custom(String),
}

/// Where subject and target sit inside a key's segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    /// `ns:<metric...>:<subject>`
    Trailing,
    /// `ns:<metric>:<subject>[:<target>]`
    Head,
    /// `tom:<head>:<self>:<other>:<metric>` or `tom:mode:<self>`
    Tom,
    /// Opaque segments, no subject.
    Opaque,
}

impl Namespace {
    pub fn as_str(&self) -> &str {
        match self {
            Namespace::World => "world",
            Namespace::Obs => "obs",
            Namespace::Rel => "rel",
            Namespace::Belief => "belief",
            Namespace::Mem => "mem",
            Namespace::Trait => "trait",
            Namespace::Scene => "scene",
            Namespace::Ctx => "ctx",
            Namespace::Lens => "lens",
            Namespace::Tom => "tom",
            Namespace::Threat => "threat",
            Namespace::App => "app",
            Namespace::Emo => "emo",
            Namespace::Feel => "feel",
            Namespace::Goal => "goal",
            Namespace::Poss => "poss",
            Namespace::Decision => "decision",
            Namespace::Custom(s) => s,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "world" => Namespace::World,
            "obs" => Namespace::Obs,
            "rel" => Namespace::Rel,
            "belief" => Namespace::Belief,
            "mem" => Namespace::Mem,
            "trait" => Namespace::Trait,
            "scene" => Namespace::Scene,
            "ctx" => Namespace::Ctx,
            "lens" => Namespace::Lens,
            "tom" => Namespace::Tom,
            "threat" => Namespace::Threat,
            "app" => Namespace::App,
            "emo" => Namespace::Emo,
            "feel" => Namespace::Feel,
            "goal" => Namespace::Goal,
            "poss" => Namespace::Poss,
            "decision" => Namespace::Decision,
            other => Namespace::Custom(other.to_string()),
        }
    }

    pub fn shape(&self) -> KeyShape {
        match self {
            Namespace::World
            | Namespace::Trait
            | Namespace::Scene
            | Namespace::Ctx
            | Namespace::Lens
            | Namespace::Threat
            | Namespace::App
            | Namespace::Emo
            | Namespace::Feel
            | Namespace::Goal
            | Namespace::Decision => KeyShape::Trailing,
            Namespace::Obs | Namespace::Rel | Namespace::Belief | Namespace::Mem | Namespace::Poss => {
                KeyShape::Head
            }
            Namespace::Tom => KeyShape::Tom,
            Namespace::Custom(_) => KeyShape::Opaque,
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dyadic ToM heads carry `<self>:<other>:<metric>`.
const TOM_DYADIC_HEADS: [&str; 3] = ["dyad", "belief", "policy"];

/// A parsed atom id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtomKey {
    namespace: Namespace,
    parts: Vec<String>,
}

fn segment(raw: &str) -> String {
    let cleaned = raw.replace(':', "_");
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

impl AtomKey {
    /// Build a key from a namespace and raw segments, checking the shape.
    pub fn new(namespace: Namespace, parts: Vec<String>) -> Result<Self, AtomKeyError> {
        let key = Self { namespace, parts };
        key.check()?;
        Ok(key)
    }

    fn unchecked(namespace: Namespace, parts: Vec<String>) -> Self {
        Self { namespace, parts }
    }

    fn check(&self) -> Result<(), AtomKeyError> {
        if self.parts.iter().any(|p| p.is_empty() || p.contains(':')) {
            return Err(AtomKeyError::EmptySegment(self.to_string()));
        }
        let n = self.parts.len();
        let reason = match self.namespace.shape() {
            KeyShape::Trailing if n < 2 => Some("expected <metric>:<subject>"),
            KeyShape::Head if !(2..=3).contains(&n) => Some("expected <metric>:<subject>[:<target>]"),
            KeyShape::Tom => {
                let head = self.parts.first().map(String::as_str).unwrap_or("");
                if TOM_DYADIC_HEADS.contains(&head) {
                    (n != 4).then_some("expected <head>:<self>:<other>:<metric>")
                } else {
                    (n != 2).then_some("expected <head>:<self>")
                }
            }
            KeyShape::Opaque if n == 0 => Some("expected at least one segment"),
            _ => None,
        };
        match reason {
            Some(reason) => Err(AtomKeyError::Shape {
                id: self.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// `ns:<metric>:<subject>` for trailing-subject namespaces.
    pub fn scalar(namespace: Namespace, metric: &str, subject: &str) -> Self {
        Self::unchecked(namespace, vec![segment(metric), segment(subject)])
    }

    /// `ns:<path...>:<subject>` for trailing-subject namespaces.
    pub fn path(namespace: Namespace, path: &[&str], subject: &str) -> Self {
        let mut parts: Vec<String> = path.iter().map(|p| segment(p)).collect();
        parts.push(segment(subject));
        Self::unchecked(namespace, parts)
    }

    /// `ns:<metric>:<subject>[:<target>]` for head namespaces.
    pub fn relational(namespace: Namespace, metric: &str, subject: &str, target: Option<&str>) -> Self {
        let mut parts = vec![segment(metric), segment(subject)];
        if let Some(target) = target {
            parts.push(segment(target));
        }
        Self::unchecked(namespace, parts)
    }

    pub fn world(metric: &str, subject: &str) -> Self {
        Self::scalar(Namespace::World, metric, subject)
    }

    pub fn trait_(metric: &str, subject: &str) -> Self {
        Self::scalar(Namespace::Trait, metric, subject)
    }

    pub fn scene(metric: &str, subject: &str) -> Self {
        Self::scalar(Namespace::Scene, metric, subject)
    }

    pub fn ctx(axis: &str, subject: &str) -> Self {
        Self::scalar(Namespace::Ctx, axis, subject)
    }

    pub fn lens(axis: &str, subject: &str) -> Self {
        Self::scalar(Namespace::Lens, axis, subject)
    }

    pub fn threat(channel: &str, subject: &str) -> Self {
        Self::scalar(Namespace::Threat, channel, subject)
    }

    pub fn app(metric: &str, subject: &str) -> Self {
        Self::scalar(Namespace::App, metric, subject)
    }

    pub fn emo(emotion: &str, subject: &str) -> Self {
        Self::scalar(Namespace::Emo, emotion, subject)
    }

    pub fn feel(channel: &str, subject: &str) -> Self {
        Self::scalar(Namespace::Feel, channel, subject)
    }

    pub fn goal(path: &[&str], subject: &str) -> Self {
        Self::path(Namespace::Goal, path, subject)
    }

    pub fn decision(metric: &str, subject: &str) -> Self {
        Self::scalar(Namespace::Decision, metric, subject)
    }

    pub fn obs(metric: &str, subject: &str, target: Option<&str>) -> Self {
        Self::relational(Namespace::Obs, metric, subject, target)
    }

    pub fn rel(metric: &str, subject: &str, target: &str) -> Self {
        Self::relational(Namespace::Rel, metric, subject, Some(target))
    }

    pub fn belief(trait_name: &str, subject: &str, target: &str) -> Self {
        Self::relational(Namespace::Belief, trait_name, subject, Some(target))
    }

    pub fn mem(metric: &str, subject: &str, target: &str) -> Self {
        Self::relational(Namespace::Mem, metric, subject, Some(target))
    }

    pub fn poss(action: &str, subject: &str, target: Option<&str>) -> Self {
        Self::relational(Namespace::Poss, action, subject, target)
    }

    pub fn tom_dyad(self_id: &str, other: &str, metric: &str) -> Self {
        Self::tom_dyadic("dyad", self_id, other, metric)
    }

    pub fn tom_belief(self_id: &str, other: &str, trait_name: &str) -> Self {
        Self::tom_dyadic("belief", self_id, other, trait_name)
    }

    pub fn tom_policy(self_id: &str, other: &str, action: &str) -> Self {
        Self::tom_dyadic("policy", self_id, other, action)
    }

    fn tom_dyadic(head: &str, self_id: &str, other: &str, metric: &str) -> Self {
        Self::unchecked(
            Namespace::Tom,
            vec![head.to_string(), segment(self_id), segment(other), segment(metric)],
        )
    }

    pub fn tom_mode(self_id: &str) -> Self {
        Self::unchecked(Namespace::Tom, vec!["mode".to_string(), segment(self_id)])
    }

    /// Key in a caller-defined namespace. Reserved names resolve to their
    /// built-in namespace, so `custom("ctx", ..)` equals the parsed id.
    pub fn custom(namespace: &str, parts: &[&str]) -> Self {
        Self::unchecked(
            Namespace::parse(&segment(namespace)),
            parts.iter().map(|p| segment(p)).collect(),
        )
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// First segment after the namespace.
    pub fn head(&self) -> &str {
        self.parts.first().map(String::as_str).unwrap_or("")
    }

    /// The agent this atom is about.
    pub fn subject(&self) -> Option<&str> {
        match self.namespace.shape() {
            KeyShape::Trailing => self.parts.last().map(String::as_str),
            KeyShape::Head | KeyShape::Tom => self.parts.get(1).map(String::as_str),
            KeyShape::Opaque => None,
        }
    }

    /// The other agent of a relational atom.
    pub fn target(&self) -> Option<&str> {
        match self.namespace.shape() {
            KeyShape::Head | KeyShape::Tom => self.parts.get(2).map(String::as_str),
            KeyShape::Trailing | KeyShape::Opaque => None,
        }
    }

    /// The measured quantity: `danger` in `ctx:danger:A`, `trust` in
    /// `tom:dyad:A:B:trust`, `active:safety` in `goal:active:safety:A`.
    pub fn metric(&self) -> String {
        match self.namespace.shape() {
            KeyShape::Trailing => {
                let end = self.parts.len().saturating_sub(1);
                self.parts[..end].join(":")
            }
            KeyShape::Head => self.head().to_string(),
            KeyShape::Tom => {
                if self.parts.len() == 4 {
                    self.parts[3].clone()
                } else {
                    self.head().to_string()
                }
            }
            KeyShape::Opaque => self.parts.join(":"),
        }
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.to_string().starts_with(prefix)
    }
}

impl std::fmt::Display for AtomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.namespace.as_str())?;
        for part in &self.parts {
            write!(f, ":{}", part)?;
        }
        Ok(())
    }
}

impl FromStr for AtomKey {
    type Err = AtomKeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Err(AtomKeyError::Empty);
        }
        let mut segments = raw.split(':');
        let namespace = match segments.next() {
            Some(ns) if !ns.is_empty() => Namespace::parse(ns),
            _ => return Err(AtomKeyError::EmptySegment(raw.to_string())),
        };
        let parts: Vec<String> = segments.map(str::to_string).collect();
        Self::new(namespace, parts)
    }
}

impl TryFrom<String> for AtomKey {
    type Error = AtomKeyError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<AtomKey> for String {
    fn from(key: AtomKey) -> Self {
        key.to_string()
    }
}
