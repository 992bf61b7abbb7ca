//! Backing collection trait for detector objects.
//!
//! A [`Container`] is an externally owned, randomly indexable list of
//! detector objects (tracks, calorimeter clusters, ...) that can also tell
//! whether the object at a position passes its selection. Views in
//! [`crate::iterable`] are built on top of this trait and never own or
//! mutate the container.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bitmask describing why an object was rejected.
///
/// The bits are owned by the container implementation; views carry the
/// mask around without interpreting it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RejectionMask(pub u32);

impl RejectionMask {
    /// No rejection reason set.
    pub const NONE: Self = Self(0);

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if all bits of `other` are set.
    #[inline]
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the bits of `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for RejectionMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Outcome of a per-object selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceptance {
    /// Whether the object passed.
    pub accepted: bool,
    /// Reasons for rejection (empty when accepted).
    pub rejection: RejectionMask,
}

impl Acceptance {
    /// An accepted object.
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            rejection: RejectionMask::NONE,
        }
    }

    /// A rejected object. An empty mask still counts as rejected.
    #[must_use]
    pub fn rejected(rejection: RejectionMask) -> Self {
        Self {
            accepted: false,
            rejection,
        }
    }

    /// Builds the outcome from a rejection mask: accepted iff no bit is set.
    #[must_use]
    pub fn from_mask(rejection: RejectionMask) -> Self {
        Self {
            accepted: rejection.is_empty(),
            rejection,
        }
    }
}

/// Randomly indexable collection with a per-object acceptance test.
pub trait Container {
    /// Element type stored in the container.
    type Item;

    /// Total number of objects.
    fn len(&self) -> usize;

    /// Returns true if the container holds no objects.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expected number of accepted objects.
    ///
    /// Only used to pre-size index storage; it may be stale or wrong.
    fn accepted_hint(&self) -> usize;

    /// Evaluates the selection for the object at `position`.
    fn accept(&self, position: usize) -> Acceptance;

    /// Returns the object at `position`, or `None` past the end.
    fn get(&self, position: usize) -> Option<&Self::Item>;
}

/// Plain slices are containers where every element is accepted.
impl<T> Container for [T] {
    type Item = T;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn accepted_hint(&self) -> usize {
        <[T]>::len(self)
    }

    fn accept(&self, position: usize) -> Acceptance {
        if position < <[T]>::len(self) {
            Acceptance::accepted()
        } else {
            Acceptance::rejected(RejectionMask::NONE)
        }
    }

    fn get(&self, position: usize) -> Option<&T> {
        <[T]>::get(self, position)
    }
}

impl<T> Container for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn accepted_hint(&self) -> usize {
        self.as_slice().len()
    }

    fn accept(&self, position: usize) -> Acceptance {
        Container::accept(self.as_slice(), position)
    }

    fn get(&self, position: usize) -> Option<&T> {
        self.as_slice().get(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_mask_bits() {
        let mut mask = RejectionMask::NONE;
        assert!(mask.is_empty());

        mask.insert(RejectionMask(0b0100));
        mask.insert(RejectionMask(0b0001));
        assert_eq!(mask.bits(), 0b0101);
        assert!(mask.contains(RejectionMask(0b0100)));
        assert!(!mask.contains(RejectionMask(0b0010)));
        assert_eq!(RejectionMask(1) | RejectionMask(2), RejectionMask(3));
    }

    #[test]
    fn test_acceptance_from_mask() {
        assert!(Acceptance::from_mask(RejectionMask::NONE).accepted);
        let rejected = Acceptance::from_mask(RejectionMask(8));
        assert!(!rejected.accepted);
        assert_eq!(rejected.rejection.bits(), 8);
    }

    #[test]
    fn test_vec_container_accepts_everything() {
        let values = vec![1, 2, 3];
        assert_eq!(Container::len(&values), 3);
        assert_eq!(values.accepted_hint(), 3);
        assert!(Container::accept(&values, 2).accepted);
        assert!(!Container::accept(&values, 3).accepted);
        assert_eq!(Container::get(&values, 1), Some(&2));
        assert_eq!(Container::get(&values, 3), None);
    }
}
