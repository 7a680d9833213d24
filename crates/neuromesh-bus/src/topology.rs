//! Weighted connection topology with online (Hebbian) learning.
//!
//! Edges are keyed by (source, target) in a sharded map, so a weight update
//! on one edge never blocks lookups on unrelated edges. Weights always stay
//! in [-1, 1]; an absent edge reads as weight 1.0 so unconfigured traffic is
//! never suppressed.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use neuromesh_core::NeuronId;
use serde::Serialize;

/// Plasticity rate used when none is given explicitly.
pub const DEFAULT_PLASTICITY: f64 = 0.1;

/// Weight read for edges that were never configured.
const DEFAULT_WEIGHT: f64 = 1.0;

/// A directed weighted edge between two unit identities.
#[derive(Clone, Debug, Serialize)]
pub struct Connection {
    pub weight: f64,
    pub plasticity: f64,
    pub frozen: bool,
    pub activations: u64,
    pub last_activation: Option<DateTime<Utc>>,
}

impl Connection {
    pub fn new(weight: f64, plasticity: f64) -> Self {
        Self {
            weight: weight.clamp(-1.0, 1.0),
            plasticity,
            frozen: false,
            activations: 0,
            last_activation: None,
        }
    }
}

/// One edge with its endpoints, as returned by [`Topology::snapshot`].
#[derive(Clone, Debug, Serialize)]
pub struct EdgeView {
    pub source: NeuronId,
    pub target: NeuronId,
    pub connection: Connection,
}

/// The weighted directed graph of learned influence between units.
#[derive(Default)]
pub struct Topology {
    edges: DashMap<(NeuronId, NeuronId), Connection>,
}

impl Topology {
    pub fn new() -> Self {
        Self {
            edges: DashMap::new(),
        }
    }

    /// Replace any existing edge with a fresh one. This is an explicit
    /// reconfiguration: activation history and the frozen flag reset.
    pub fn set_connection(&self, source: &NeuronId, target: &NeuronId, weight: f64, plasticity: f64) {
        self.edges.insert(
            (source.clone(), target.clone()),
            Connection::new(weight, plasticity),
        );
    }

    /// Seed a default edge only if none exists in this direction.
    /// Returns whether an edge was inserted.
    pub fn connect_default(&self, source: &NeuronId, target: &NeuronId, weight: f64) -> bool {
        let mut inserted = false;
        self.edges
            .entry((source.clone(), target.clone()))
            .or_insert_with(|| {
                inserted = true;
                Connection::new(weight, DEFAULT_PLASTICITY)
            });
        inserted
    }

    /// Edge weight, defaulting to 1.0 (fully excitatory) when unconfigured.
    pub fn weight(&self, source: &NeuronId, target: &NeuronId) -> f64 {
        self.edges
            .get(&(source.clone(), target.clone()))
            .map(|e| e.weight)
            .unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn get(&self, source: &NeuronId, target: &NeuronId) -> Option<Connection> {
        self.edges
            .get(&(source.clone(), target.clone()))
            .map(|e| e.clone())
    }

    pub fn contains(&self, source: &NeuronId, target: &NeuronId) -> bool {
        self.edges.contains_key(&(source.clone(), target.clone()))
    }

    /// Apply one Hebbian step to an existing edge.
    ///
    /// Frozen edges and inactive sources are no-ops. Both ends active grows
    /// the weight toward saturation; an active source with an inactive
    /// target decays the weight toward zero. The result is always clamped.
    pub fn hebbian_update(
        &self,
        source: &NeuronId,
        target: &NeuronId,
        source_active: bool,
        target_active: bool,
    ) {
        let Some(mut edge) = self.edges.get_mut(&(source.clone(), target.clone())) else {
            return;
        };
        if edge.frozen || !source_active {
            return;
        }
        if target_active {
            edge.weight += edge.plasticity * (1.0 - edge.weight.abs());
        } else {
            edge.weight -= edge.plasticity * edge.weight.abs() * 0.5;
        }
        edge.weight = edge.weight.clamp(-1.0, 1.0);
    }

    /// Record a delivery along an edge. Feeds the learning statistics; a
    /// no-op for edges that were never configured.
    pub fn record_activation(&self, source: &NeuronId, target: &NeuronId) {
        if let Some(mut edge) = self.edges.get_mut(&(source.clone(), target.clone())) {
            edge.activations += 1;
            edge.last_activation = Some(Utc::now());
        }
    }

    /// Net input to `target`: sum of `weight * activation(source)` over every
    /// incoming edge.
    pub fn net_input(&self, target: &NeuronId, activation: impl Fn(&NeuronId) -> f64) -> f64 {
        self.edges
            .iter()
            .filter(|e| &e.key().1 == target)
            .map(|e| e.weight * activation(&e.key().0))
            .sum()
    }

    pub fn set_frozen(&self, source: &NeuronId, target: &NeuronId, frozen: bool) -> bool {
        match self.edges.get_mut(&(source.clone(), target.clone())) {
            Some(mut edge) => {
                edge.frozen = frozen;
                true
            }
            None => false,
        }
    }

    /// Freeze every edge (suspends all learning).
    pub fn freeze_all(&self) {
        for mut e in self.edges.iter_mut() {
            e.frozen = true;
        }
    }

    /// Thaw every edge (resumes learning).
    pub fn thaw_all(&self) {
        for mut e in self.edges.iter_mut() {
            e.frozen = false;
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Point-in-time copy of every edge, ordered by (source, target).
    pub fn snapshot(&self) -> Vec<EdgeView> {
        let mut edges: Vec<EdgeView> = self
            .edges
            .iter()
            .map(|e| EdgeView {
                source: e.key().0.clone(),
                target: e.key().1.clone(),
                connection: e.value().clone(),
            })
            .collect();
        edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        edges
    }
}
