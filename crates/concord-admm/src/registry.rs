//! Consensus variables.
//!
//! One slot per distinct atom referenced by the round's terms. Slots are
//! addressed by index; terms store slot indices, never references, and the
//! registry records which `(term, local)` pairs read each slot.

use std::collections::HashMap;

use concord_knapsack::Bounds;
use concord_model::{AtomId, AtomStore};
use rayon::prelude::*;

use crate::term::ObjectiveTerm;

/// A local variable of a term that copies a consensus slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLocation {
    pub term: usize,
    pub local: usize,
}

/// Sums gathered while updating the consensus values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanUpdate {
    /// `Σ (z_old − z_new)²` over slots.
    pub dual_sq: f64,
    /// `Σ (x − z_new)²` over local copies.
    pub primal_sq: f64,
    /// `Σ y·(x − z)`
    pub lagrange_penalty: f64,
    /// `Σ ρ/2·(x − z)²`
    pub augmented_lagrange_penalty: f64,
}

impl MeanUpdate {
    fn merge(self, other: Self) -> Self {
        Self {
            dual_sq: self.dual_sq + other.dual_sq,
            primal_sq: self.primal_sq + other.primal_sq,
            lagrange_penalty: self.lagrange_penalty + other.lagrange_penalty,
            augmented_lagrange_penalty: self.augmented_lagrange_penalty
                + other.augmented_lagrange_penalty,
        }
    }
}

/// Arena of consensus slots.
#[derive(Debug, Default, Clone)]
pub struct ConsensusRegistry {
    z: Vec<f64>,
    bounds: Vec<Bounds>,
    locations: Vec<Vec<VariableLocation>>,
    atoms: Vec<AtomId>,
    lookup: HashMap<AtomId, usize>,
}

impl ConsensusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of `atom`, allocating one at `value` (clamped into `bounds`) on
    /// first reference. Records that `term`'s local variable `local` copies it.
    pub fn resolve(
        &mut self,
        term: usize,
        atom: AtomId,
        local: usize,
        value: f64,
        bounds: Bounds,
    ) -> usize {
        let slot = match self.lookup.get(&atom) {
            Some(&slot) => slot,
            None => {
                let slot = self.z.len();
                self.z.push(bounds.clamp(value));
                self.bounds.push(bounds);
                self.locations.push(Vec::new());
                self.atoms.push(atom);
                self.lookup.insert(atom, slot);
                slot
            }
        };
        self.locations[slot].push(VariableLocation { term, local });
        slot
    }

    /// Recompute every slot from the terms' local copies.
    ///
    /// `z = clamp(mean(x + y/ρ))` over the slot's references. While the dual
    /// variables of a slot sum to zero this is the plain mean of `x`.
    pub fn mean_update(
        &mut self,
        terms: &[ObjectiveTerm],
        step_size: f64,
        parallel: bool,
    ) -> MeanUpdate {
        let update = |((z, bounds), locations): ((&mut f64, &Bounds), &Vec<VariableLocation>)| {
            update_slot(z, bounds, locations, terms, step_size)
        };

        if parallel {
            self.z
                .par_iter_mut()
                .zip(self.bounds.par_iter())
                .zip(self.locations.par_iter())
                .map(update)
                .reduce(MeanUpdate::default, MeanUpdate::merge)
        } else {
            self.z
                .iter_mut()
                .zip(self.bounds.iter())
                .zip(self.locations.iter())
                .map(update)
                .fold(MeanUpdate::default(), MeanUpdate::merge)
        }
    }

    /// Consensus values, indexed by slot.
    pub fn values(&self) -> &[f64] {
        &self.z
    }

    /// Atom of a slot.
    pub fn atom(&self, slot: usize) -> Option<AtomId> {
        self.atoms.get(slot).copied()
    }

    /// Slot of an atom.
    pub fn slot_of(&self, atom: AtomId) -> Option<usize> {
        self.lookup.get(&atom).copied()
    }

    /// Local variables copying a slot.
    pub fn references(&self, slot: usize) -> &[VariableLocation] {
        self.locations.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    /// Write every consensus value back to its atom.
    pub fn commit_into<S: AtomStore + ?Sized>(&self, atoms: &mut S) {
        for (atom, z) in self.atoms.iter().zip(&self.z) {
            atoms.commit(*atom, *z);
        }
    }
}

fn update_slot(
    z: &mut f64,
    bounds: &Bounds,
    locations: &[VariableLocation],
    terms: &[ObjectiveTerm],
    step_size: f64,
) -> MeanUpdate {
    let mut update = MeanUpdate::default();
    if locations.is_empty() {
        return update;
    }

    let total: f64 = locations
        .iter()
        .map(|loc| {
            let term = &terms[loc.term];
            term.x()[loc.local] + term.y()[loc.local] / step_size
        })
        .sum();
    let new_z = bounds.clamp(total / locations.len() as f64);

    let diff = *z - new_z;
    update.dual_sq = diff * diff;
    *z = new_z;

    for loc in locations {
        let term = &terms[loc.term];
        let x = term.x()[loc.local];
        let y = term.y()[loc.local];
        let diff = x - new_z;
        update.primal_sq += diff * diff;
        update.lagrange_penalty += y * diff;
        update.augmented_lagrange_penalty += 0.5 * step_size * diff * diff;
    }
    update
}
