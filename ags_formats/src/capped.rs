use std::ops::{Deref, DerefMut};

/// Growable list with a hard upper bound taken from the file format limits.
#[derive(Debug, Clone, PartialEq)]
pub struct CappedVec<T, const N: usize> {
    items: Vec<T>,
}

impl<T, const N: usize> Default for CappedVec<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> CappedVec<T, N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Appends `item`, handing it back when the list is already full.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.items.len() >= N {
            return Err(item);
        }
        self.items.push(item);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= N
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Resizes to `len` entries; refuses lengths above the capacity.
    pub fn resize_with<F>(&mut self, len: usize, f: F) -> bool
    where
        F: FnMut() -> T,
    {
        if len > N {
            return false;
        }
        self.items.resize_with(len, f);
        true
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T, const N: usize> Deref for CappedVec<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T, const N: usize> DerefMut for CappedVec<T, N> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<T, const N: usize> TryFrom<Vec<T>> for CappedVec<T, N> {
    type Error = Vec<T>;

    fn try_from(items: Vec<T>) -> Result<Self, Self::Error> {
        if items.len() > N {
            return Err(items);
        }
        Ok(Self { items })
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a CappedVec<T, N> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
