//! Fixed-width component-set bitset.

use crate::component::ComponentKind;

/// Maximum number of distinct component kinds a [`Signature`] can name.
pub const MAX_COMPONENT_KINDS: u32 = 64;

/// A bitset over component kinds, one bit per kind, identifying the exact
/// set of components an archetype or a [`ComponentGroup`](crate::system::ComponentGroup)
/// touches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Signature(u64);

impl Signature {
    pub const EMPTY: Signature = Signature(0);

    pub fn empty() -> Self {
        Signature(0)
    }

    pub fn single(kind: ComponentKind) -> Self {
        Signature(1u64 << kind.0)
    }

    pub fn set(&mut self, kind: ComponentKind) {
        self.0 |= 1u64 << kind.0;
    }

    pub fn unset(&mut self, kind: ComponentKind) {
        self.0 &= !(1u64 << kind.0);
    }

    pub fn with(mut self, kind: ComponentKind) -> Self {
        self.set(kind);
        self
    }

    pub fn contains(&self, kind: ComponentKind) -> bool {
        self.0 & (1u64 << kind.0) != 0
    }

    pub fn union(&self, other: Signature) -> Signature {
        Signature(self.0 | other.0)
    }

    pub fn intersection(&self, other: Signature) -> Signature {
        Signature(self.0 & other.0)
    }

    /// `self` with every bit set in `other` cleared.
    pub fn difference(&self, other: Signature) -> Signature {
        Signature(self.0 & !other.0)
    }

    pub fn is_subset_of(&self, other: Signature) -> bool {
        self.0 & other.0 == self.0
    }

    pub fn intersects(&self, other: Signature) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn popcount(&self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate over the set component kinds in ascending order.
    pub fn iter(&self) -> SignatureIter {
        SignatureIter { bits: self.0 }
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature(")?;
        let mut first = true;
        for kind in self.iter() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", kind.0)?;
            first = false;
        }
        write!(f, ")")
    }
}

/// Iterator over the component kinds set in a [`Signature`], lowest bit first.
pub struct SignatureIter {
    bits: u64,
}

impl Iterator for SignatureIter {
    type Item = ComponentKind;

    fn next(&mut self) -> Option<ComponentKind> {
        if self.bits == 0 {
            return None;
        }
        let bit = self.bits.trailing_zeros();
        self.bits &= self.bits - 1;
        Some(ComponentKind(bit as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(n: u16) -> ComponentKind {
        ComponentKind(n)
    }

    #[test]
    fn union_intersection_difference() {
        let a = Signature::empty().with(kind(0)).with(kind(2));
        let b = Signature::empty().with(kind(2)).with(kind(3));
        assert_eq!(a.union(b), Signature::empty().with(kind(0)).with(kind(2)).with(kind(3)));
        assert_eq!(a.intersection(b), Signature::single(kind(2)));
        assert_eq!(a.difference(b), Signature::single(kind(0)));
    }

    #[test]
    fn subset_and_popcount() {
        let a = Signature::single(kind(1));
        let b = a.with(kind(5));
        assert!(a.is_subset_of(b));
        assert!(!b.is_subset_of(a));
        assert_eq!(b.popcount(), 2);
    }

    #[test]
    fn iterate_set_bits_ascending() {
        let sig = Signature::empty().with(kind(40)).with(kind(1)).with(kind(20));
        let collected: Vec<u16> = sig.iter().map(|k| k.0).collect();
        assert_eq!(collected, vec![1, 20, 40]);
    }
}
