//! Name → id resolution for records that arrive without a shared identifier.
//!
//! Names are not unique. Among duplicates the earliest created record (lowest
//! id) wins, and the number of candidates is reported so the caller can flag
//! the ambiguity.

use std::collections::HashMap;

use shopledger_core::{Entity, NaturalKey};

/// Outcome of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<Id> {
    pub id: Id,
    /// How many records carry the name; above 1 the pick was a tie-break.
    pub candidates: usize,
}

impl<Id> Resolved<Id> {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// Exact-match index over trimmed names.
#[derive(Debug, Clone)]
pub struct NameIndex<Id> {
    entries: HashMap<String, Resolved<Id>>,
}

impl<Id: Copy + Ord> NameIndex<Id> {
    pub fn build<'a, E>(records: impl IntoIterator<Item = &'a E>) -> Self
    where
        E: NaturalKey<Id = Id> + 'a,
    {
        let mut index = Self {
            entries: HashMap::new(),
        };
        for record in records {
            index.insert(record.natural_key(), record.id());
        }
        index
    }

    /// Register one more record under `name`. Blank names are not indexed.
    pub fn insert(&mut self, name: &str, id: Id) {
        let key = name.trim();
        if key.is_empty() {
            return;
        }
        self.entries
            .entry(key.to_string())
            .and_modify(|entry| {
                entry.candidates += 1;
                entry.id = entry.id.min(id);
            })
            .or_insert(Resolved { id, candidates: 1 });
    }

    /// Exact, case-sensitive match on the trimmed name.
    pub fn resolve(&self, name: &str) -> Option<Resolved<Id>> {
        self.entries.get(name.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<Id> Default for NameIndex<Id> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}
