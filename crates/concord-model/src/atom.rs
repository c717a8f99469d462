//! Atom identities, kinds and value stores.

use std::collections::HashMap;

/// Opaque identity of a ground atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomId(pub u64);

impl AtomId {
    /// Get the raw id value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AtomId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atom#{}", self.0)
    }
}

/// How the reasoner treats an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AtomKind {
    /// Inferred atom with a truth value in [0, 1].
    #[default]
    Random,
    /// Evidence. Its value is folded into rule constants.
    Observed,
    /// Unconstrained helper variable used inside arithmetic expressions.
    Helper,
}

impl AtomKind {
    /// Box bounds `(lower, upper)` for atoms of this kind.
    pub const fn bounds(&self) -> (f64, f64) {
        match self {
            AtomKind::Random | AtomKind::Observed => (0.0, 1.0),
            AtomKind::Helper => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    /// Whether the reasoner optimizes atoms of this kind.
    pub const fn is_variable(&self) -> bool {
        !matches!(self, AtomKind::Observed)
    }
}

/// The atom layer as seen by the reasoner.
///
/// Object safe so activation policies can receive a `&dyn AtomStore`.
pub trait AtomStore {
    /// Current value of an atom.
    fn value(&self, atom: AtomId) -> f64;

    /// Kind of an atom.
    fn kind(&self, atom: AtomId) -> AtomKind;

    /// Write a settled value back.
    fn commit(&mut self, atom: AtomId, value: f64);
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AtomRecord {
    value: f64,
    kind: AtomKind,
}

/// In-memory atom store.
///
/// Atoms that were never inserted read as value `0.0` and kind
/// [`AtomKind::Random`], which is how a lazy atom looks before it is
/// activated.
#[derive(Debug, Clone, Default)]
pub struct MemoryAtomStore {
    atoms: HashMap<AtomId, AtomRecord>,
}

impl MemoryAtomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            atoms: HashMap::new(),
        }
    }

    /// Insert or replace an atom.
    pub fn insert(&mut self, atom: AtomId, value: f64, kind: AtomKind) {
        self.atoms.insert(atom, AtomRecord { value, kind });
    }

    /// Insert a random variable atom.
    pub fn insert_random(&mut self, atom: AtomId, value: f64) {
        self.insert(atom, value, AtomKind::Random);
    }

    /// Insert an observed atom.
    pub fn insert_observed(&mut self, atom: AtomId, value: f64) {
        self.insert(atom, value, AtomKind::Observed);
    }

    /// Value of a stored atom, `None` if it was never inserted.
    pub fn get(&self, atom: AtomId) -> Option<f64> {
        self.atoms.get(&atom).map(|r| r.value)
    }

    /// Whether the atom was inserted.
    pub fn contains(&self, atom: AtomId) -> bool {
        self.atoms.contains_key(&atom)
    }

    /// Remove an atom.
    pub fn remove(&mut self, atom: AtomId) -> Option<f64> {
        self.atoms.remove(&atom).map(|r| r.value)
    }

    /// Number of stored atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Iterate over `(atom, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (AtomId, f64)> + '_ {
        self.atoms.iter().map(|(id, r)| (*id, r.value))
    }
}

impl AtomStore for MemoryAtomStore {
    fn value(&self, atom: AtomId) -> f64 {
        self.atoms.get(&atom).map_or(0.0, |r| r.value)
    }

    fn kind(&self, atom: AtomId) -> AtomKind {
        self.atoms.get(&atom).map_or(AtomKind::Random, |r| r.kind)
    }

    fn commit(&mut self, atom: AtomId, value: f64) {
        self.atoms
            .entry(atom)
            .and_modify(|r| r.value = value)
            .or_insert(AtomRecord {
                value,
                kind: AtomKind::Random,
            });
    }
}

impl<S: AtomStore + ?Sized> AtomStore for &mut S {
    fn value(&self, atom: AtomId) -> f64 {
        (**self).value(atom)
    }

    fn kind(&self, atom: AtomId) -> AtomKind {
        (**self).kind(atom)
    }

    fn commit(&mut self, atom: AtomId, value: f64) {
        (**self).commit(atom, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_atoms_are_lazy_zero() {
        let store = MemoryAtomStore::new();
        assert_eq!(store.value(AtomId(3)), 0.0);
        assert_eq!(store.kind(AtomId(3)), AtomKind::Random);
        assert!(!store.contains(AtomId(3)));
    }

    #[test]
    fn commit_keeps_kind() {
        let mut store = MemoryAtomStore::new();
        store.insert(AtomId(1), 0.2, AtomKind::Helper);
        store.commit(AtomId(1), 4.5);

        assert_eq!(store.get(AtomId(1)), Some(4.5));
        assert_eq!(store.kind(AtomId(1)), AtomKind::Helper);
    }

    #[test]
    fn commit_creates_missing_atom() {
        let mut store = MemoryAtomStore::new();
        store.commit(AtomId(9), 0.75);
        assert_eq!(store.get(AtomId(9)), Some(0.75));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn kind_bounds() {
        assert_eq!(AtomKind::Random.bounds(), (0.0, 1.0));
        let (lo, hi) = AtomKind::Helper.bounds();
        assert!(lo.is_infinite() && hi.is_infinite());
        assert!(!AtomKind::Observed.is_variable());
        assert!(AtomKind::Helper.is_variable());
    }

    #[test]
    fn borrowed_store_forwards() {
        fn settle<S: AtomStore>(mut atoms: S) {
            let v = atoms.value(AtomId(2));
            atoms.commit(AtomId(2), v + 0.2);
        }

        let mut store = MemoryAtomStore::new();
        store.insert_random(AtomId(2), 0.4);
        settle(&mut store);
        assert!((store.get(AtomId(2)).unwrap() - 0.6).abs() < 1e-12);
    }
}
