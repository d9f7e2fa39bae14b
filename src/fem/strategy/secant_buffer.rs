use russell_lab::Vector;
use serde::{Deserialize, Serialize};

/// Holds a fixed-capacity history of secant vector pairs
///
/// The pairs are stored in a ring: `head` points to the oldest pair and `count` tells
/// how many slots are occupied. When the ring is full, a new pair either overwrites the
/// oldest one (cycling) or is rejected.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SecantBuffer {
    capacity: usize,
    cycle: bool,
    head: usize,
    count: usize,
    first: Vec<Vector>,
    second: Vec<Vector>,
}

impl SecantBuffer {
    /// Allocates a new instance with `capacity` pairs of vectors of dimension `neq`
    pub fn new(capacity: usize, cycle: bool, neq: usize) -> Self {
        SecantBuffer {
            capacity,
            cycle,
            head: 0,
            count: 0,
            first: (0..capacity).map(|_| Vector::new(neq)).collect(),
            second: (0..capacity).map(|_| Vector::new(neq)).collect(),
        }
    }

    /// Returns the max number of pairs
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of stored pairs
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if there are no pairs
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if all slots are occupied
    pub fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    /// Discards all pairs
    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    /// Stores a new pair
    ///
    /// Returns false if the buffer is full and cycling is disabled (or the capacity is zero).
    pub fn push(&mut self, a: &Vector, b: &Vector) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let slot = if self.count < self.capacity {
            let slot = (self.head + self.count) % self.capacity;
            self.count += 1;
            slot
        } else if self.cycle {
            let slot = self.head;
            self.head = (self.head + 1) % self.capacity;
            slot
        } else {
            return false;
        };
        self.first[slot].as_mut_data().copy_from_slice(a.as_data());
        self.second[slot].as_mut_data().copy_from_slice(b.as_data());
        true
    }

    /// Returns the k-th pair, from the oldest (k = 0) to the newest (k = len - 1)
    pub fn get(&self, k: usize) -> (&Vector, &Vector) {
        let slot = (self.head + k) % self.capacity;
        (&self.first[slot], &self.second[slot])
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
