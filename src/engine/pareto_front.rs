use crate::engine::metric::{Dominance, JourneyComparator, Metric};
use crate::journey::Journey;
use std::slice::Iter as SliceIter;

/// Outcome of [`ParetoFront::try_add`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FrontInsertion {
    Added,
    DominatedByExisting,
    DominatesExisting { removed: usize },
    /// The journey was equivalent to an existing entry with a different
    /// path : both now share one joined entry.
    JoinedWithExisting,
}

impl FrontInsertion {
    pub fn mutated(&self) -> bool {
        !matches!(self, FrontInsertion::DominatedByExisting)
    }
}

/// A set of journeys in which no entry dominates another.
///
/// Kept as a flat list iterated in insertion order ; insertion is a
/// bidirectional domination scan over the whole front.
#[derive(Debug, Clone)]
pub struct ParetoFront<M: Metric, C: JourneyComparator<M>> {
    comparator: C,
    elements: Vec<Journey<M>>,
}

impl<M: Metric, C: JourneyComparator<M>> ParetoFront<M, C> {
    pub fn new(comparator: C) -> Self {
        Self {
            comparator,
            elements: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn iter(&self) -> SliceIter<'_, Journey<M>> {
        self.elements.iter()
    }

    /// `true` when some entry strictly dominates `journey`.
    pub fn dominates(&self, journey: &Journey<M>) -> bool {
        self.elements
            .iter()
            .any(|existing| self.comparator.compare(existing, journey) == Dominance::FirstDominates)
    }

    /// Inserts `journey` unless it is dominated.
    ///
    /// An equivalent entry absorbs the newcomer : when their paths are
    /// structurally equal the first inserted entry is kept, otherwise the
    /// two fan out behind one joined entry (only possible when they stand at
    /// the same place and time).
    pub fn try_add(&mut self, journey: Journey<M>) -> FrontInsertion {
        let mut equivalent_at = None;
        for (index, existing) in self.elements.iter().enumerate() {
            match self.comparator.compare(existing, &journey) {
                Dominance::FirstDominates => return FrontInsertion::DominatedByExisting,
                Dominance::Equivalent => {
                    equivalent_at = Some(index);
                    break;
                }
                Dominance::SecondDominates | Dominance::Incomparable => {}
            }
        }
        if let Some(index) = equivalent_at {
            let existing = &self.elements[index];
            if existing.same_path(&journey) {
                return FrontInsertion::DominatedByExisting;
            }
            if existing.location() == journey.location() && existing.time() == journey.time() {
                let joined = existing.join(&journey);
                self.elements[index] = joined;
                return FrontInsertion::JoinedWithExisting;
            }
            // equivalent but not joinable : keep the first inserted
            return FrontInsertion::DominatedByExisting;
        }
        let before = self.elements.len();
        let comparator = &self.comparator;
        self.elements
            .retain(|existing| comparator.compare(&journey, existing) != Dominance::FirstDominates);
        let removed = before - self.elements.len();
        self.elements.push(journey);
        if removed > 0 {
            FrontInsertion::DominatesExisting { removed }
        } else {
            FrontInsertion::Added
        }
    }

    pub fn merge(&mut self, other: ParetoFront<M, C>) {
        for journey in other.elements {
            self.try_add(journey);
        }
    }

    /// Keeps only the entries satisfying `keep`. Used by guesser pruning.
    pub fn retain(&mut self, keep: impl FnMut(&Journey<M>) -> bool) {
        self.elements.retain(keep);
    }
}
