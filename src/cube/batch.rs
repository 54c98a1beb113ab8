use std::collections::HashMap;
use std::collections::hash_map::{Entry, IntoIter, Iter};

use crate::cube::address::Address;
use crate::cube::op::Op;

/// Writes staged for one flush, merged per address.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    writes: HashMap<Address, T>,
}

impl<T: Op> Batch<T> {
    pub fn new() -> Self {
        Self {
            writes: HashMap::new(),
        }
    }

    /// A batch holding a single write.
    pub fn single(address: Address, op: T) -> Self {
        let mut batch = Self::new();
        batch.put(address, op);
        batch
    }

    /// Merges `op` into the value already staged at `address`, if any.
    pub fn put(&mut self, address: Address, op: T) {
        match self.writes.entry(address) {
            Entry::Occupied(mut existing) => {
                let merged = existing.get().merge(&op);
                existing.insert(merged);
            }
            Entry::Vacant(slot) => {
                slot.insert(op);
            }
        }
    }

    pub fn put_all(&mut self, other: Batch<T>) {
        if self.writes.is_empty() {
            self.writes = other.writes;
            return;
        }
        for (address, op) in other.writes {
            self.put(address, op);
        }
    }

    pub fn get(&self, address: &Address) -> Option<&T> {
        self.writes.get(address)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, Address, T> {
        self.writes.iter()
    }
}

impl<T: Op> Default for Batch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Op> FromIterator<(Address, T)> for Batch<T> {
    fn from_iter<I: IntoIterator<Item = (Address, T)>>(iter: I) -> Self {
        let mut batch = Self::new();
        for (address, op) in iter {
            batch.put(address, op);
        }
        batch
    }
}

impl<T> IntoIterator for Batch<T> {
    type Item = (Address, T);
    type IntoIter = IntoIter<Address, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = (&'a Address, &'a T);
    type IntoIter = Iter<'a, Address, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.iter()
    }
}
