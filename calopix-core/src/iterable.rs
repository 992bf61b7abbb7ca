//! Filtered, iterable views over detector containers.
//!
//! A [`FilteredView`] borrows a [`Container`] and exposes either all of its
//! objects or only the accepted ones. In accepted mode the view scans the
//! container once at construction and keeps the positions that passed;
//! after that every access is a single index lookup.
//!
//! Traversal works in two flavours:
//! - [`Cursor`]: a bidirectional position with begin/end sentinels, for code
//!   that needs to step back and forth or compare positions.
//! - [`Iter`]: a regular double-ended Rust iterator over the same elements.
//!
//! ```
//! use calopix_core::iterable::FilteredView;
//!
//! let energies = vec![0.2, 1.5, 0.1, 3.0];
//! let view = FilteredView::all(&energies);
//!
//! let mut cursor = view.begin();
//! let mut total = 0.0;
//! while cursor != view.end() {
//!     total += cursor.get().copied().unwrap_or_default();
//!     cursor.advance();
//! }
//! assert!((total - 4.8_f64).abs() < 1e-12);
//! ```
//!
//! The view holds a shared borrow of the container, so the container can't
//! be modified while a view (and thus its index list) is alive.
#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::container::Container;
use std::fmt;
use std::iter::FusedIterator;

/// Which objects of the container a view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Every object, rejected ones included.
    All,
    /// Only objects accepted by the container's selection.
    Accepted,
}

/// Traversal direction of a [`Cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Advancing moves towards higher positions.
    Forward,
    /// Advancing moves towards lower positions.
    Backward,
}

/// Collects the positions of all accepted objects, in increasing order.
///
/// The container's accepted hint only sizes the initial allocation; the
/// result grows as needed when the hint is too small.
#[must_use]
pub fn build_accepted_indices<C>(source: &C) -> Vec<usize>
where
    C: Container + ?Sized,
{
    let len = source.len();
    let mut indices = Vec::with_capacity(source.accepted_hint().min(len));
    for position in 0..len {
        if source.accept(position).accepted {
            indices.push(position);
        }
    }
    indices
}

/// Read-only view over all or only the accepted objects of a container.
pub struct FilteredView<'a, C: ?Sized> {
    source: &'a C,
    mode: Mode,
    accepted_indices: Vec<usize>,
}

impl<'a, C> FilteredView<'a, C>
where
    C: Container + ?Sized,
{
    /// Creates a view; with `use_accepted` the acceptance index is built now.
    #[must_use]
    pub fn new(source: &'a C, use_accepted: bool) -> Self {
        if use_accepted {
            Self::with_mode(source, Mode::Accepted)
        } else {
            Self::with_mode(source, Mode::All)
        }
    }

    /// Creates a view in the given mode.
    #[must_use]
    pub fn with_mode(source: &'a C, mode: Mode) -> Self {
        let accepted_indices = match mode {
            Mode::All => Vec::new(),
            Mode::Accepted => build_accepted_indices(source),
        };
        Self {
            source,
            mode,
            accepted_indices,
        }
    }

    /// View over every object of the container.
    #[must_use]
    pub fn all(source: &'a C) -> Self {
        Self::with_mode(source, Mode::All)
    }

    /// View over the accepted objects of the container.
    #[must_use]
    pub fn accepted(source: &'a C) -> Self {
        Self::with_mode(source, Mode::Accepted)
    }

    /// The underlying container.
    #[must_use]
    pub fn container(&self) -> &'a C {
        self.source
    }

    /// The mode fixed at construction.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Container positions of the accepted objects (empty in [`Mode::All`]).
    #[must_use]
    pub fn accepted_indices(&self) -> &[usize] {
        &self.accepted_indices
    }

    /// Number of objects reachable through the view.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.mode {
            Mode::All => self.source.len(),
            Mode::Accepted => self.accepted_indices.len(),
        }
    }

    /// Returns true if the view yields no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maps a logical index of the view to a position in the container.
    #[must_use]
    pub fn source_position(&self, logical: isize) -> Option<usize> {
        if logical < 0 || logical as usize >= self.len() {
            return None;
        }
        let logical = logical as usize;
        match self.mode {
            Mode::All => Some(logical),
            Mode::Accepted => Some(self.accepted_indices[logical]),
        }
    }

    /// Object at a logical index, `None` outside `[0, len())`.
    #[must_use]
    pub fn element_at(&self, logical: isize) -> Option<&'a C::Item> {
        let source = self.source;
        self.source_position(logical)
            .and_then(|position| source.get(position))
    }

    /// Object at a logical index given as `usize`.
    #[must_use]
    pub fn get(&self, logical: usize) -> Option<&'a C::Item> {
        isize::try_from(logical)
            .ok()
            .and_then(|logical| self.element_at(logical))
    }

    /// Forward cursor on the first object.
    #[must_use]
    pub fn begin(&self) -> Cursor<'_, 'a, C> {
        Cursor::new(self, 0, Direction::Forward)
    }

    /// Forward end sentinel, one past the last object.
    #[must_use]
    pub fn end(&self) -> Cursor<'_, 'a, C> {
        Cursor::new(self, self.len() as isize, Direction::Forward)
    }

    /// Backward cursor on the last object.
    #[must_use]
    pub fn rbegin(&self) -> Cursor<'_, 'a, C> {
        Cursor::new(self, self.len() as isize - 1, Direction::Backward)
    }

    /// Backward end sentinel, one before the first object.
    #[must_use]
    pub fn rend(&self) -> Cursor<'_, 'a, C> {
        Cursor::new(self, -1, Direction::Backward)
    }

    /// Double-ended iterator over the objects of the view.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, 'a, C> {
        Iter {
            view: self,
            front: 0,
            back: self.len(),
        }
    }
}

impl<C: ?Sized> Clone for FilteredView<'_, C> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            mode: self.mode,
            accepted_indices: self.accepted_indices.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for FilteredView<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredView")
            .field("mode", &self.mode)
            .field("accepted_indices", &self.accepted_indices)
            .finish_non_exhaustive()
    }
}

impl<'v, 'a, C> IntoIterator for &'v FilteredView<'a, C>
where
    C: Container + ?Sized,
{
    type Item = &'a C::Item;
    type IntoIter = Iter<'v, 'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Bidirectional position inside a [`FilteredView`].
///
/// Cursors compare equal when their positions are equal. Direction and the
/// view they belong to are not part of the comparison, so a cursor is
/// normally compared against the `end()`/`rend()` sentinel of its own view.
pub struct Cursor<'v, 'a, C: ?Sized> {
    view: &'v FilteredView<'a, C>,
    position: isize,
    direction: Direction,
}

impl<'v, 'a, C> Cursor<'v, 'a, C>
where
    C: Container + ?Sized,
{
    /// Creates a cursor at `position`. Prefer the view's `begin`/`end`/`rbegin`/`rend`.
    #[must_use]
    pub fn new(view: &'v FilteredView<'a, C>, position: isize, direction: Direction) -> Self {
        Self {
            view,
            position,
            direction,
        }
    }

    /// Logical position inside the view.
    #[must_use]
    pub fn position(&self) -> isize {
        self.position
    }

    /// Traversal direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The view this cursor walks.
    #[must_use]
    pub fn view(&self) -> &'v FilteredView<'a, C> {
        self.view
    }

    /// Moves one step in the cursor's direction.
    pub fn advance(&mut self) -> &mut Self {
        match self.direction {
            Direction::Forward => self.position += 1,
            Direction::Backward => self.position -= 1,
        }
        self
    }

    /// Moves one step in the cursor's direction, returning the prior state.
    pub fn post_advance(&mut self) -> Self {
        let previous = *self;
        self.advance();
        previous
    }

    /// Moves one step against the cursor's direction.
    pub fn retreat(&mut self) -> &mut Self {
        match self.direction {
            Direction::Forward => self.position -= 1,
            Direction::Backward => self.position += 1,
        }
        self
    }

    /// Moves one step against the cursor's direction, returning the prior state.
    pub fn post_retreat(&mut self) -> Self {
        let previous = *self;
        self.retreat();
        previous
    }

    /// Object under the cursor; `None` on a sentinel or out of range.
    #[must_use]
    pub fn get(&self) -> Option<&'a C::Item> {
        self.view.element_at(self.position)
    }
}

impl<C: ?Sized> Clone for Cursor<'_, '_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for Cursor<'_, '_, C> {}

impl<C: ?Sized, D: ?Sized> PartialEq<Cursor<'_, '_, D>> for Cursor<'_, '_, C> {
    fn eq(&self, other: &Cursor<'_, '_, D>) -> bool {
        self.position == other.position
    }
}

impl<C: ?Sized> Eq for Cursor<'_, '_, C> {}

impl<C: ?Sized> fmt::Debug for Cursor<'_, '_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("position", &self.position)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

/// Iterator over the objects of a [`FilteredView`].
pub struct Iter<'v, 'a, C: ?Sized> {
    view: &'v FilteredView<'a, C>,
    front: usize,
    back: usize,
}

impl<'a, C> Iterator for Iter<'_, 'a, C>
where
    C: Container + ?Sized,
{
    type Item = &'a C::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.view.get(self.front);
        self.front += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<C> DoubleEndedIterator for Iter<'_, '_, C>
where
    C: Container + ?Sized,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.view.get(self.back)
    }
}

impl<C> ExactSizeIterator for Iter<'_, '_, C> where C: Container + ?Sized {}

impl<C> FusedIterator for Iter<'_, '_, C> where C: Container + ?Sized {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Acceptance, RejectionMask};

    /// Five labelled objects, positions {1, 3, 4} accepted.
    struct Fixture {
        labels: Vec<&'static str>,
        accepted: Vec<bool>,
        hint: usize,
    }

    impl Fixture {
        fn five() -> Self {
            Self {
                labels: vec!["a", "b", "c", "d", "e"],
                accepted: vec![false, true, false, true, true],
                hint: 3,
            }
        }
    }

    impl Container for Fixture {
        type Item = &'static str;

        fn len(&self) -> usize {
            self.labels.len()
        }

        fn accepted_hint(&self) -> usize {
            self.hint
        }

        fn accept(&self, position: usize) -> Acceptance {
            if self.accepted[position] {
                Acceptance::accepted()
            } else {
                Acceptance::rejected(RejectionMask(1 << position))
            }
        }

        fn get(&self, position: usize) -> Option<&&'static str> {
            self.labels.get(position)
        }
    }

    #[test]
    fn test_accepted_view_maps_indices() {
        let fixture = Fixture::five();
        let view = FilteredView::new(&fixture, true);

        assert_eq!(view.mode(), Mode::Accepted);
        assert_eq!(view.len(), 3);
        assert_eq!(view.accepted_indices(), &[1, 3, 4]);
        assert_eq!(view.element_at(0), Some(&"b"));
        assert_eq!(view.element_at(2), Some(&"e"));
        assert_eq!(view.element_at(3), None);
        assert_eq!(view.element_at(-1), None);
    }

    #[test]
    fn test_all_view_passes_through() {
        let fixture = Fixture::five();
        let view = FilteredView::new(&fixture, false);

        assert_eq!(view.len(), 5);
        assert!(view.accepted_indices().is_empty());
        for i in 0..5 {
            assert_eq!(view.get(i), fixture.labels.get(i));
        }
        assert_eq!(view.element_at(5), None);
    }

    #[test]
    fn test_forward_and_backward_traversal() {
        let fixture = Fixture::five();
        let view = FilteredView::accepted(&fixture);

        let mut forward = Vec::new();
        let mut cursor = view.begin();
        while cursor != view.end() {
            forward.push(*cursor.get().unwrap());
            cursor.advance();
        }
        assert_eq!(forward, vec!["b", "d", "e"]);

        let mut backward = Vec::new();
        let mut cursor = view.rbegin();
        while cursor != view.rend() {
            backward.push(*cursor.get().unwrap());
            cursor.advance();
        }
        assert_eq!(backward, vec!["e", "d", "b"]);
    }

    #[test]
    fn test_post_advance_returns_snapshot() {
        let fixture = Fixture::five();
        let view = FilteredView::all(&fixture);

        let mut cursor = view.begin();
        let before = cursor.post_advance();
        assert_eq!(before.position(), 0);
        assert_eq!(cursor.position(), 1);

        let before = cursor.post_retreat();
        assert_eq!(before.position(), 1);
        assert_eq!(cursor.position(), 0);

        let mut reverse = view.rbegin();
        reverse.advance().advance();
        assert_eq!(reverse.position(), 2);
        reverse.retreat();
        assert_eq!(reverse.position(), 3);
    }

    #[test]
    fn test_sentinels_yield_nothing() {
        let fixture = Fixture::five();
        let view = FilteredView::accepted(&fixture);

        assert_eq!(view.end().position(), 3);
        assert_eq!(view.rend().position(), -1);
        assert!(view.end().get().is_none());
        assert!(view.rend().get().is_none());

        let mut past = view.end();
        past.advance().advance();
        assert!(past.get().is_none());
    }

    #[test]
    fn test_cursor_equality_ignores_direction() {
        let fixture = Fixture::five();
        let view = FilteredView::all(&fixture);
        let forward = Cursor::new(&view, 2, Direction::Forward);
        let backward = Cursor::new(&view, 2, Direction::Backward);
        assert_eq!(forward, backward);
        assert_ne!(forward, view.begin());
    }

    #[test]
    fn test_iter_is_double_ended() {
        let fixture = Fixture::five();
        let view = FilteredView::accepted(&fixture);

        let mut iter = view.iter();
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some(&"b"));
        assert_eq!(iter.next_back(), Some(&"e"));
        assert_eq!(iter.next(), Some(&"d"));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);

        let reversed: Vec<_> = view.iter().rev().copied().collect();
        assert_eq!(reversed, vec!["e", "d", "b"]);
    }

    #[test]
    fn test_clone_copies_indices() {
        let fixture = Fixture::five();
        let view = FilteredView::accepted(&fixture);
        let copy = view.clone();
        assert_eq!(copy.accepted_indices(), view.accepted_indices());
        assert!(std::ptr::eq(copy.container(), view.container()));
    }
}
