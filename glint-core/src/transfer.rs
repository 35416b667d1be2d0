//! Cross-stage transfer values.
//!
//! A transfer is a scalar or vector computed by (or only available to) the
//! vertex stage and read by the fragment stage. Transfers are collected as
//! a set during type checking, then packed into fixed 4-wide interpolated
//! channel slots in a deterministic order so that vertex-side packing and
//! fragment-side unpacking always agree, independent of insertion order.

use crate::types::Ty;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransferKind {
    /// A variable declared by the vertex fragment and read by a later one.
    Authored,
    /// A per-vertex input field read from a non-vertex stage.
    VertexInput,
    /// Added by the compiler itself (e.g. the lit purpose's world normal).
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferEntry {
    pub kind: TransferKind,
    /// Identifier sequence: `["n"]` for an authored variable,
    /// `["normal"]` for `vert.normal`.
    pub path: Vec<String>,
    pub ty: Ty,
}

impl TransferEntry {
    pub fn authored(name: impl Into<String>, ty: Ty) -> Self {
        TransferEntry {
            kind: TransferKind::Authored,
            path: vec![name.into()],
            ty,
        }
    }

    pub fn vertex_input(field: impl Into<String>, ty: Ty) -> Self {
        TransferEntry {
            kind: TransferKind::VertexInput,
            path: vec![field.into()],
            ty,
        }
    }

    pub fn internal(name: impl Into<String>, ty: Ty) -> Self {
        TransferEntry {
            kind: TransferKind::Internal,
            path: vec![name.into()],
            ty,
        }
    }

    /// Scalar channels this entry occupies.
    pub fn dim(&self) -> u8 {
        self.ty.dim().unwrap_or(1)
    }

    /// Name of the local variable the fragment stage unpacks this entry
    /// into. Authored variables keep their source name; the others are
    /// prefixed so they cannot collide with authored identifiers.
    pub fn local_name(&self) -> String {
        match self.kind {
            TransferKind::Authored => self.path.join("_"),
            TransferKind::VertexInput => format!("xv_{}", self.path.join("_")),
            TransferKind::Internal => format!("xi_{}", self.path.join("_")),
        }
    }
}

/// Set of transfer entries, keyed by `(kind, path)`. Repeated reads of the
/// same value collapse to one channel.
#[derive(Debug, Clone, Default)]
pub struct TransferSet {
    entries: HashMap<(TransferKind, Vec<String>), TransferEntry>,
}

impl TransferSet {
    pub fn new() -> Self {
        TransferSet {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, entry: TransferEntry) {
        self.entries
            .entry((entry.kind, entry.path.clone()))
            .or_insert(entry);
    }

    pub fn contains(&self, kind: TransferKind, path: &[String]) -> bool {
        self.entries.contains_key(&(kind, path.to_vec()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn merge(&mut self, other: &TransferSet) {
        for entry in other.entries.values() {
            self.insert(entry.clone());
        }
    }

    /// The entries in packing order: by kind, then by path. This order is
    /// a function of set contents only, never of insertion order.
    pub fn ordered(&self) -> Vec<&TransferEntry> {
        let mut v: Vec<_> = self.entries.values().collect();
        v.sort_by(|a, b| (a.kind, &a.path).cmp(&(b.kind, &b.path)));
        v
    }
}

/// Placement of one transfer entry inside the interpolated channel slots.
#[derive(Debug, Clone)]
pub struct PackedField {
    pub entry: TransferEntry,
    pub slot: u8,
    pub offset: u8,
}

impl PackedField {
    /// Swizzle selecting this field's components within its slot.
    pub fn swizzle(&self) -> String {
        const LANES: [char; 4] = ['x', 'y', 'z', 'w'];
        (self.offset..self.offset + self.entry.dim())
            .map(|i| LANES[i as usize])
            .collect()
    }
}

/// Assignment of every transfer entry to a 4-wide slot, shared verbatim by
/// the vertex-stage packer and the fragment-stage unpacker.
#[derive(Debug, Clone, Default)]
pub struct PackPlan {
    pub fields: Vec<PackedField>,
    pub slot_count: u8,
}

impl PackPlan {
    /// Greedy first-fit packing of the ordered entry sequence into 4-wide
    /// slots. Entries never span a slot boundary.
    pub fn build(set: &TransferSet) -> PackPlan {
        let mut fill: Vec<u8> = Vec::new();
        let mut fields = Vec::new();
        for entry in set.ordered() {
            let dim = entry.dim();
            let slot = match fill.iter().position(|&used| used + dim <= 4) {
                Some(i) => i,
                None => {
                    fill.push(0);
                    fill.len() - 1
                }
            };
            fields.push(PackedField {
                entry: entry.clone(),
                slot: slot as u8,
                offset: fill[slot],
            });
            fill[slot] += dim;
        }
        PackPlan {
            fields,
            slot_count: fill.len() as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_semantics_collapse_duplicates() {
        let mut set = TransferSet::new();
        set.insert(TransferEntry::authored("n", Ty::Float(3)));
        set.insert(TransferEntry::authored("n", Ty::Float(3)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_ordering_independent_of_insertion() {
        let mut a = TransferSet::new();
        a.insert(TransferEntry::authored("n", Ty::Float(3)));
        a.insert(TransferEntry::vertex_input("texcoord", Ty::Float(2)));
        a.insert(TransferEntry::authored("fog", Ty::Float(1)));

        let mut b = TransferSet::new();
        b.insert(TransferEntry::vertex_input("texcoord", Ty::Float(2)));
        b.insert(TransferEntry::authored("fog", Ty::Float(1)));
        b.insert(TransferEntry::authored("n", Ty::Float(3)));

        let order_a: Vec<_> = a.ordered().into_iter().cloned().collect();
        let order_b: Vec<_> = b.ordered().into_iter().cloned().collect();
        assert_eq!(order_a, order_b);
        // Authored entries sort before vertex inputs, paths alphabetical.
        assert_eq!(order_a[0].path, vec!["fog".to_string()]);
        assert_eq!(order_a[1].path, vec!["n".to_string()]);
        assert_eq!(order_a[2].kind, TransferKind::VertexInput);
    }

    #[test]
    fn test_pack_plan_first_fit() {
        let mut set = TransferSet::new();
        set.insert(TransferEntry::authored("a", Ty::Float(3)));
        set.insert(TransferEntry::authored("b", Ty::Float(2)));
        set.insert(TransferEntry::authored("c", Ty::Float(1)));

        let plan = PackPlan::build(&set);
        assert_eq!(plan.slot_count, 2);
        // Ordered: a(3), b(2), c(1). a -> slot0 @0; b does not fit slot0 ->
        // slot1 @0; c back-fills slot0 @3.
        assert_eq!(plan.fields[0].entry.path, vec!["a".to_string()]);
        assert_eq!((plan.fields[0].slot, plan.fields[0].offset), (0, 0));
        assert_eq!(plan.fields[0].swizzle(), "xyz");
        assert_eq!((plan.fields[1].slot, plan.fields[1].offset), (1, 0));
        assert_eq!(plan.fields[1].swizzle(), "xy");
        assert_eq!((plan.fields[2].slot, plan.fields[2].offset), (0, 3));
        assert_eq!(plan.fields[2].swizzle(), "w");
    }

    #[test]
    fn test_pack_plan_round_trip_dims() {
        let mut set = TransferSet::new();
        set.insert(TransferEntry::internal("normal", Ty::Float(3)));
        set.insert(TransferEntry::vertex_input("colour", Ty::Float(4)));
        let plan = PackPlan::build(&set);
        for field in &plan.fields {
            assert_eq!(field.swizzle().len() as u8, field.entry.dim());
            assert!(field.offset + field.entry.dim() <= 4);
        }
    }
}
