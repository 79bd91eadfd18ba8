//! Identity-keyed, order-aware collection of workbook records.
//!
//! Keys are unique by construction because identity is derived from each
//! record. Insertion order is the canonical index ordering for positional
//! lookups; [`WorkbookCollection::sort_by_identity`] provides the stable
//! secondary ordering used before presenting positions to a user.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::workbook::record::WorkbookRecord;

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Result of an attribute search, explicit about match cardinality so
/// callers pattern-match exhaustively instead of branching on shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrMatch {
    NoMatch,
    SingleMatch(usize),
    MultipleMatches(Vec<usize>),
}

/// Ordered mapping from derived identity to [`WorkbookRecord`].
///
/// Collections are small (dozens to low thousands), so membership checks
/// are linear scans against current contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookCollection {
    records: Vec<WorkbookRecord>,
}

impl WorkbookCollection {
    pub fn new() -> Self {
        WorkbookCollection {
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert the record, or replace the existing record with the same
    /// derived identity in place.
    pub fn upsert(&mut self, record: WorkbookRecord) -> Upsert {
        let wb_id = record.wb_id();
        match self.records.iter().position(|r| r.wb_id() == wb_id) {
            Some(pos) => {
                self.records[pos] = record;
                Upsert::Replaced
            }
            None => {
                self.records.push(record);
                Upsert::Inserted
            }
        }
    }

    /// Record at the given position in current iteration order. Out of
    /// range yields `None`, never a panic, so UI loops can over-ask.
    pub fn by_index(&self, position: usize) -> Option<&WorkbookRecord> {
        self.records.get(position)
    }

    /// Position of the record with the given identity.
    pub fn index_of(&self, wb_id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.wb_id() == wb_id)
    }

    pub fn get(&self, wb_id: &str) -> Option<&WorkbookRecord> {
        self.records.iter().find(|r| r.wb_id() == wb_id)
    }

    pub fn get_mut(&mut self, wb_id: &str) -> Option<&mut WorkbookRecord> {
        self.records.iter_mut().find(|r| r.wb_id() == wb_id)
    }

    pub fn contains(&self, wb_id: &str) -> bool {
        self.index_of(wb_id).is_some()
    }

    /// Remove and return the record with the given identity.
    pub fn remove(&mut self, wb_id: &str) -> Option<WorkbookRecord> {
        self.index_of(wb_id).map(|pos| self.records.remove(pos))
    }

    /// Find positions whose attribute `name` has the canonical string form
    /// `value`. Unknown attribute names match nothing.
    pub fn find_by_attribute(&self, name: &str, value: &str) -> AttrMatch {
        let positions: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.attribute(name).as_deref() == Some(value))
            .map(|(pos, _)| pos)
            .collect();
        match positions.len() {
            0 => AttrMatch::NoMatch,
            1 => AttrMatch::SingleMatch(positions[0]),
            _ => AttrMatch::MultipleMatches(positions),
        }
    }

    /// Re-sort into the stable display order by identity string. Called
    /// before any operation that presents positional indices, so "index 3"
    /// means the same record across repeated listings.
    pub fn sort_by_identity(&mut self) {
        self.records.sort_by_key(|r| r.wb_id());
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkbookRecord> {
        self.records.iter()
    }

    /// Identities in current iteration order.
    pub fn identities(&self) -> Vec<String> {
        self.records.iter().map(|r| r.wb_id()).collect()
    }
}

// Persisted shape is a map keyed by derived identity, matching the snapshot
// layout. Keys are redundant on decode (identity is re-derived from each
// record) but keep the stored file readable and diffable.

impl Serialize for WorkbookCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.wb_id(), record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WorkbookCollection {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct CollectionVisitor;

        impl<'de> Visitor<'de> for CollectionVisitor {
            type Value = WorkbookCollection;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of workbook id to workbook record")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut collection = WorkbookCollection::new();
                while let Some((_, record)) =
                    access.next_entry::<String, WorkbookRecord>()?
                {
                    collection.upsert(record);
                }
                Ok(collection)
            }
        }

        deserializer.deserialize_map(CollectionVisitor)
    }
}
