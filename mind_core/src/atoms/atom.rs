//! Atom definitions - the universal unit of fact and signal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AtomKey, Namespace};

/// Where an atom came from. Determines merge precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    World,
    Obs,
    Derived,
    Override,
    Belief,
    Memory,
}

impl Origin {
    /// Higher ranks win conflicts: override > obs > world > belief > memory > derived.
    pub fn precedence(&self) -> u8 {
        match self {
            Origin::Override => 5,
            Origin::Obs => 4,
            Origin::World => 3,
            Origin::Belief => 2,
            Origin::Memory => 1,
            Origin::Derived => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::World => "world",
            Origin::Obs => "obs",
            Origin::Derived => "derived",
            Origin::Override => "override",
            Origin::Belief => "belief",
            Origin::Memory => "memory",
        }
    }
}

/// Declared range of an atom's magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MagnitudeRange {
    /// [0, 1]
    #[default]
    Unit,
    /// [-1, 1]
    Signed,
}

impl MagnitudeRange {
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            MagnitudeRange::Unit => (0.0, 1.0),
            MagnitudeRange::Signed => (-1.0, 1.0),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let (lo, hi) = self.bounds();
        value >= lo && value <= hi
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let (lo, hi) = self.bounds();
        value.clamp(lo, hi)
    }
}

/// Fine classification of an atom, derived from its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomKind {
    WorldFact,
    Trait,
    Scene,
    Observation,
    Relation,
    Belief,
    Memory,
    ContextAxis,
    LensAxis,
    TomDyad,
    TomMode,
    TomBelief,
    TomPolicy,
    ThreatChannel,
    Appraisal,
    Emotion,
    Feeling,
    GoalMode,
    GoalPressure,
    GoalActive,
    Possibility,
    Decision,
    Custom,
}

impl AtomKind {
    pub fn from_key(key: &AtomKey) -> Self {
        match key.namespace() {
            Namespace::World => AtomKind::WorldFact,
            Namespace::Trait => AtomKind::Trait,
            Namespace::Scene => AtomKind::Scene,
            Namespace::Obs => AtomKind::Observation,
            Namespace::Rel => AtomKind::Relation,
            Namespace::Belief => AtomKind::Belief,
            Namespace::Mem => AtomKind::Memory,
            Namespace::Ctx => AtomKind::ContextAxis,
            Namespace::Lens => AtomKind::LensAxis,
            Namespace::Tom => match key.head() {
                "dyad" => AtomKind::TomDyad,
                "belief" => AtomKind::TomBelief,
                "policy" => AtomKind::TomPolicy,
                _ => AtomKind::TomMode,
            },
            Namespace::Threat => AtomKind::ThreatChannel,
            Namespace::App => AtomKind::Appraisal,
            Namespace::Emo => AtomKind::Emotion,
            Namespace::Feel => AtomKind::Feeling,
            Namespace::Goal => match key.head() {
                "active" => AtomKind::GoalActive,
                "mode" => AtomKind::GoalMode,
                _ => AtomKind::GoalPressure,
            },
            Namespace::Poss => AtomKind::Possibility,
            Namespace::Decision => AtomKind::Decision,
            Namespace::Custom(_) => AtomKind::Custom,
        }
    }
}

/// Provenance of an atom: which atoms fed it and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Trace {
    #[serde(default)]
    pub used_atom_ids: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Partial quantities of the computation, keyed by name.
    #[serde(default)]
    pub parts: BTreeMap<String, serde_json::Value>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace from a set of input ids.
    pub fn from_used<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            used_atom_ids: ids.into_iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_part(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.parts.insert(name.into(), value);
        self
    }

    pub fn uses(&self, id: &str) -> bool {
        self.used_atom_ids.iter().any(|u| u == id)
    }
}

/// A single typed fact or signal.
///
/// `kind` is serialized for readers but always re-derived from the id when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AtomRecord")]
pub struct Atom {
    pub id: AtomKey,
    pub kind: AtomKind,
    pub origin: Origin,
    pub magnitude: f64,
    pub confidence: f64,
    #[serde(default)]
    pub range: MagnitudeRange,
    #[serde(default)]
    pub trace: Option<Trace>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Producer or stage that emitted this atom.
    #[serde(default)]
    pub source: Option<String>,
}

/// Wire form of [`Atom`]. Any `kind` field in the input is ignored.
#[derive(Deserialize)]
struct AtomRecord {
    id: AtomKey,
    origin: Origin,
    magnitude: f64,
    confidence: f64,
    #[serde(default)]
    range: MagnitudeRange,
    #[serde(default)]
    trace: Option<Trace>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl From<AtomRecord> for Atom {
    fn from(record: AtomRecord) -> Self {
        Self {
            kind: AtomKind::from_key(&record.id),
            id: record.id,
            origin: record.origin,
            magnitude: record.magnitude,
            confidence: record.confidence,
            range: record.range,
            trace: record.trace,
            code: record.code,
            label: record.label,
            source: record.source,
        }
    }
}

impl Atom {
    /// Create an atom with full confidence and no trace.
    pub fn new(id: AtomKey, origin: Origin, magnitude: f64) -> Self {
        let kind = AtomKind::from_key(&id);
        Self {
            id,
            kind,
            origin,
            magnitude,
            confidence: 1.0,
            range: MagnitudeRange::Unit,
            trace: None,
            code: None,
            label: None,
            source: None,
        }
    }

    /// Create a derived atom with a trace built from its inputs.
    pub fn derived<I, S>(id: AtomKey, magnitude: f64, used: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self::new(id, Origin::Derived, magnitude).with_trace(Trace::from_used(used))
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_range(mut self, range: MagnitudeRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Append a note, creating the trace if needed.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.trace.get_or_insert_with(Trace::new).notes.push(note.into());
        self
    }

    /// Record a partial quantity, creating the trace if needed.
    pub fn with_part(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let trace = self.trace.take().unwrap_or_default().with_part(name, value);
        self.trace = Some(trace);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Canonical string id.
    pub fn id_str(&self) -> String {
        self.id.to_string()
    }

    pub fn subject(&self) -> Option<&str> {
        self.id.subject()
    }

    pub fn target(&self) -> Option<&str> {
        self.id.target()
    }

    /// Input ids recorded in the trace.
    pub fn used_ids(&self) -> &[String] {
        self.trace
            .as_ref()
            .map(|t| t.used_atom_ids.as_slice())
            .unwrap_or(&[])
    }

    /// Combined weight used by signal fields.
    pub fn weight(&self) -> f64 {
        self.magnitude * self.confidence
    }

    /// Tie-break key for deterministic conflict resolution.
    pub fn tiebreak_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.id,
            self.code.as_deref().unwrap_or(""),
            self.source.as_deref().unwrap_or("")
        )
    }

    /// Clamp magnitude and confidence into range, zero non-finite values,
    /// and drop repeated trace inputs.
    pub fn normalize(mut self) -> Self {
        let mut notes = Vec::new();
        if !self.magnitude.is_finite() {
            notes.push(format!("magnitude {} replaced with 0", self.magnitude));
            self.magnitude = 0.0;
        }
        if !self.confidence.is_finite() {
            notes.push(format!("confidence {} replaced with 0", self.confidence));
            self.confidence = 0.0;
        }
        self.magnitude = self.range.clamp(self.magnitude);
        self.confidence = self.confidence.clamp(0.0, 1.0);

        if let Some(trace) = self.trace.as_mut() {
            let mut seen = std::collections::HashSet::new();
            trace.used_atom_ids.retain(|id| seen.insert(id.clone()));
            trace.notes.extend(notes);
        } else if !notes.is_empty() {
            self.trace = Some(Trace {
                notes,
                ..Trace::default()
            });
        }
        self
    }
}
