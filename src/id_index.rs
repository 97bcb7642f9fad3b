use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// External identifier of an object or a subject.
///
/// Objects and subjects share this type but occupy disjoint namespaces:
/// an object id is never compared against a subject id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(pub i64);

impl From<i64> for Id {
    fn from(raw: i64) -> Self {
        Id(raw)
    }
}

/// Mapping between external sparse ids and dense 0-based matrix indices.
///
/// Built by scanning a sequence of ids and assigning dense indices in
/// first-occurrence order; a duplicate keeps the index of its first
/// occurrence. Dense indices are contiguous and exactly cover `[0, len)`.
///
/// Serializes as the first-occurrence order vector alone; the reverse map
/// is rebuilt on decode, so the encoding is self-contained.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Id>", into = "Vec<Id>")]
pub struct IdIndex {
    order: Vec<Id>,
    positions: HashMap<Id, usize>,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from a sequence of ids, deduplicating by first occurrence.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = Id>,
    {
        let mut index = Self::new();
        for id in ids {
            index.insert(id);
        }
        index
    }

    /// Registers `id`, assigning the next dense index unless it is already present.
    /// Returns the dense index of `id` either way.
    pub fn insert(&mut self, id: Id) -> usize {
        match self.positions.get(&id) {
            Some(&position) => position,
            None => {
                let position = self.order.len();
                self.order.push(id);
                self.positions.insert(id, position);
                position
            }
        }
    }

    /// Dense index of `id`.
    ///
    /// An id that was never indexed yields `0`. This conflates "unknown id"
    /// with "legitimately dense row 0" and is kept deliberately; callers that
    /// need the distinction must check [`contains`](Self::contains) first.
    pub fn position(&self, id: Id) -> usize {
        self.positions.get(&id).copied().unwrap_or(0)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.positions.contains_key(&id)
    }

    /// Ids in dense-index order. `ids()[i]` is the id mapped to dense index `i`.
    pub fn ids(&self) -> &[Id] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl From<Vec<Id>> for IdIndex {
    fn from(order: Vec<Id>) -> Self {
        let positions = order
            .iter()
            .enumerate()
            .map(|(position, &id)| (id, position))
            .collect();
        Self { order, positions }
    }
}

impl From<IdIndex> for Vec<Id> {
    fn from(index: IdIndex) -> Self {
        index.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_indices_in_first_occurrence_order() {
        let index = IdIndex::from_ids([Id(7), Id(3), Id(7), Id(9), Id(3)]);

        assert_eq!(index.len(), 3);
        assert_eq!(index.position(Id(7)), 0);
        assert_eq!(index.position(Id(3)), 1);
        assert_eq!(index.position(Id(9)), 2);
        assert_eq!(index.ids(), &[Id(7), Id(3), Id(9)]);
    }

    #[test]
    fn duplicate_insert_keeps_first_index() {
        let mut index = IdIndex::new();
        assert_eq!(index.insert(Id(5)), 0);
        assert_eq!(index.insert(Id(6)), 1);
        assert_eq!(index.insert(Id(5)), 0);
        assert_eq!(index.len(), 2);
    }

    // Known sharp edge: an unindexed id maps to dense index 0, which is
    // indistinguishable from the first indexed id.
    #[test]
    fn unknown_id_maps_to_index_zero() {
        let index = IdIndex::from_ids([Id(42), Id(43)]);
        assert!(!index.contains(Id(999)));
        assert_eq!(index.position(Id(999)), 0);
        assert_eq!(index.position(Id(42)), 0);
    }

    #[test]
    fn empty_index() {
        let index = IdIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.position(Id(1)), 0);
    }

    #[test]
    fn rebuilds_positions_from_order_vector() {
        let original = IdIndex::from_ids([Id(10), Id(20), Id(30)]);
        let order: Vec<Id> = original.clone().into();
        let rebuilt = IdIndex::from(order);
        assert_eq!(rebuilt, original);
        assert_eq!(rebuilt.position(Id(20)), 1);
    }
}
