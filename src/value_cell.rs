//! Change-tracked value containers.
//!
//! A [`ValueCell`] is the only channel through which property changes are observed by
//! renderables. Writing to a cell marks it dirty; a consumer (usually a renderable's
//! `update`) clears that mark with [`ValueCell::consume`]. This lets a renderable ask "did
//! this buffer change since I last looked?" without diffing its contents.

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

struct Inner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    consumed: Cell<Option<u64>>,
}

/// A shared, change-tracked value.
///
/// Cloning a `ValueCell` clones the handle, not the value: both handles observe the same
/// value and the same dirty marker. A freshly created cell is dirty since it has never been
/// consumed.
///
/// # Example
/// ```
/// # use primgl::value_cell::ValueCell;
/// let cell = ValueCell::new(vec![1.0f32, 2.0, 3.0]);
/// assert!(cell.consume().1);
/// assert!(!cell.is_dirty());
///
/// cell.write(vec![4.0, 5.0, 6.0]);
/// let (value, was_dirty) = cell.consume();
/// assert!(was_dirty);
/// assert_eq!(value[0], 4.0);
/// ```
pub struct ValueCell<T> {
    inner: Rc<Inner<T>>,
}

impl<T> ValueCell<T> {
    /// Creates a new dirty cell holding `value`.
    pub fn new(value: T) -> ValueCell<T> {
        ValueCell {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                version: Cell::new(0),
                consumed: Cell::new(None),
            }),
        }
    }

    /// Borrows the current value without clearing the dirty marker.
    ///
    /// # Panics
    /// Panics if the value is currently borrowed by an in-progress [`ValueCell::update`].
    #[inline]
    pub fn read(&self) -> Ref<'_, T> {
        self.inner.value.borrow()
    }

    /// Replaces the value and marks the cell dirty.
    pub fn write(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.bump();
    }

    /// Mutates the value in place and marks the cell dirty.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut *self.inner.value.borrow_mut());
        self.bump();
        result
    }

    /// Borrows the value and clears the dirty marker.
    ///
    /// The returned flag tells whether the cell was dirty before this call.
    pub fn consume(&self) -> (Ref<'_, T>, bool) {
        let was_dirty = self.is_dirty();
        self.inner.consumed.set(Some(self.inner.version.get()));
        (self.read(), was_dirty)
    }

    /// Returns `true` if the value was written since it was last consumed.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.inner.consumed.get() != Some(self.inner.version.get())
    }

    /// The number of writes this cell has seen.
    #[inline]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Returns `true` if both handles point to the same cell.
    #[inline]
    pub fn ptr_eq(&self, other: &ValueCell<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // Identity of the shared cell, stable for as long as any handle is alive.
    fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    fn bump(&self) {
        self.inner.version.set(self.inner.version.get() + 1);
    }
}

impl<T> ValueCell<Vec<T>> {
    /// Length of the stored vector.
    ///
    /// Shape checks only need this, never the contents.
    #[inline]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the stored vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl<T> Clone for ValueCell<T> {
    fn clone(&self) -> Self {
        ValueCell {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCell")
            .field("version", &self.version())
            .field("dirty", &self.is_dirty())
            .field("value", &*self.read())
            .finish()
    }
}

/// The versions of the cells one consumer last uploaded.
///
/// The dirty marker of a [`ValueCell`] is shared by every handle, so a cell referenced by
/// two renderables is clean for the second one as soon as the first one consumed it. Each
/// renderable therefore also records the version it uploaded, and compares against that.
#[derive(Clone, Debug, Default)]
pub struct VersionLog {
    versions: HashMap<usize, u64>,
}

impl VersionLog {
    /// Creates an empty log.
    pub fn new() -> VersionLog {
        VersionLog::default()
    }

    /// Records the current version of `cell` as uploaded.
    pub fn record<T>(&mut self, cell: &ValueCell<T>) {
        let _ = self.versions.insert(cell.key(), cell.version());
    }

    /// Returns `true` if `cell` was never recorded, or was written since.
    pub fn is_stale<T>(&self, cell: &ValueCell<T>) -> bool {
        self.versions.get(&cell.key()) != Some(&cell.version())
    }

    /// Forgets every recorded cell.
    pub fn clear(&mut self) {
        self.versions.clear();
    }
}
