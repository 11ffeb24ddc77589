//! Data objects and the transient work items scans produce for them.

use std::{cmp::Ordering, time::SystemTime};

use ulid::Ulid;

use crate::{id::ObjectId, pool::Order};

/// Inclusive key span covered by a data object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRange {
    /// First key in sort order.
    pub first: Vec<u8>,
    /// Last key in sort order.
    pub last: Vec<u8>,
}

impl KeyRange {
    /// Range from `first` to `last`, as stored in the object.
    pub fn new(first: impl Into<Vec<u8>>, last: impl Into<Vec<u8>>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }

    /// Lowest and highest key regardless of layout order.
    pub fn bounds(&self) -> (&[u8], &[u8]) {
        match self.first.cmp(&self.last) {
            Ordering::Greater => (self.last.as_slice(), self.first.as_slice()),
            _ => (self.first.as_slice(), self.last.as_slice()),
        }
    }

    /// Whether the two ranges share at least one key.
    pub fn overlaps(&self, other: &KeyRange) -> bool {
        let (lo, hi) = self.bounds();
        let (other_lo, other_hi) = other.bounds();
        lo <= other_hi && other_lo <= hi
    }

    /// Smallest range covering both, expressed in `order`.
    pub fn union(&self, other: &KeyRange, order: Order) -> KeyRange {
        let (lo, hi) = self.bounds();
        let (other_lo, other_hi) = other.bounds();
        let lo = lo.min(other_lo).to_vec();
        let hi = hi.max(other_hi).to_vec();
        match order {
            Order::Asc => KeyRange::new(lo, hi),
            Order::Desc => KeyRange::new(hi, lo),
        }
    }
}

/// Immutable stored chunk of records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataObject {
    /// Object identifier; its timestamp is the creation time.
    pub id: ObjectId,
    /// Stored size in bytes.
    pub size: u64,
    /// Number of records.
    pub count: u64,
    /// Keys covered by the object.
    pub range: KeyRange,
}

impl DataObject {
    /// Creation time encoded in the object id.
    pub fn created(&self) -> SystemTime {
        self.id.datetime()
    }
}

/// Objects selected together for compaction into one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    objects: Vec<DataObject>,
}

impl Run {
    /// Returns `None` for an empty selection; a run always holds an object.
    pub fn new(objects: Vec<DataObject>) -> Option<Self> {
        if objects.is_empty() {
            return None;
        }
        Some(Self { objects })
    }

    /// Objects in scan order.
    pub fn objects(&self) -> &[DataObject] {
        &self.objects
    }

    /// Identifiers of the objects, in scan order.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|o| o.id).collect()
    }

    /// Number of objects in the run.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Total stored bytes across the run.
    pub fn size(&self) -> u64 {
        self.objects.iter().map(|o| o.size).sum()
    }

    /// Key span covered by the whole run, expressed in `order`.
    pub fn span(&self, order: Order) -> KeyRange {
        let mut ranges = self.objects.iter().map(|o| &o.range);
        let Some(first) = ranges.next() else {
            return KeyRange::new(Vec::new(), Vec::new());
        };
        ranges.fold(first.union(first, order), |span, range| {
            span.union(range, order)
        })
    }
}

/// What kind of secondary index a rule builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Index the values of the listed fields.
    Field {
        /// Dotted field paths.
        fields: Vec<String>,
    },
    /// Index every value of the named type.
    Type {
        /// Type name, e.g. `ip`.
        value_type: String,
    },
}

/// Named specification of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexRule {
    /// Rule identifier.
    pub id: Ulid,
    /// Name configuration refers to; several rules may share one.
    pub name: String,
    /// What the rule indexes.
    pub kind: RuleKind,
}

impl IndexRule {
    /// Field rule over `fields`.
    pub fn field(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            name: name.into(),
            kind: RuleKind::Field {
                fields: fields.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Type rule over `value_type`.
    pub fn value_type(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            name: name.into(),
            kind: RuleKind::Type {
                value_type: value_type.into(),
            },
        }
    }
}

/// A data object paired with the index rules it still lacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIndexes {
    /// Object to index.
    pub object: DataObject,
    /// Rules not yet applied to the object.
    pub needs_index: Vec<IndexRule>,
}
