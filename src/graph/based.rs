//! Base-adjusted arrays.
//!
//! Graph data may be numbered from any base value (0 for C-style callers, 1
//! for Fortran-style ones). A [`BasedVec`] stores its elements contiguously
//! and is indexed with based numbers, so that `tab[baseval]` is the first
//! element whatever `baseval` is.

use crate::Gnum;
use std::ops::{Index, IndexMut, Range};

/// Vector indexed by based `Gnum` values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasedVec<T> {
    base: Gnum,
    data: Vec<T>,
}

impl<T> BasedVec<T> {
    /// Wrap `data` so that `data[0]` is reached with index `base`.
    pub fn from_vec(base: Gnum, data: Vec<T>) -> Self {
        Self { base, data }
    }

    /// Empty array with room for `cap` elements.
    pub fn with_capacity(base: Gnum, cap: usize) -> Self {
        Self {
            base,
            data: Vec::with_capacity(cap),
        }
    }

    /// Fallible allocation of `len` copies of `val`.
    pub fn try_filled(base: Gnum, len: usize, val: T) -> Result<Self, std::collections::TryReserveError>
    where
        T: Clone,
    {
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, val);
        Ok(Self { base, data })
    }

    #[inline]
    pub fn base(&self) -> Gnum {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Based index range covered by the array.
    #[inline]
    pub fn range(&self) -> Range<Gnum> {
        self.base..self.base + self.data.len() as Gnum
    }

    #[inline]
    pub fn get(&self, i: Gnum) -> Option<&T> {
        if i < self.base {
            return None;
        }
        self.data.get((i - self.base) as usize)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Slice of the based range `r`.
    #[inline]
    pub fn slice(&self, r: Range<Gnum>) -> &[T] {
        &self.data[(r.start - self.base) as usize..(r.end - self.base) as usize]
    }

    pub fn push(&mut self, val: T) {
        self.data.push(val);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn fill(&mut self, val: T)
    where
        T: Clone,
    {
        self.data.fill(val);
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T> Index<Gnum> for BasedVec<T> {
    type Output = T;

    #[inline]
    fn index(&self, i: Gnum) -> &T {
        &self.data[(i - self.base) as usize]
    }
}

impl<T> IndexMut<Gnum> for BasedVec<T> {
    #[inline]
    fn index_mut(&mut self, i: Gnum) -> &mut T {
        &mut self.data[(i - self.base) as usize]
    }
}
