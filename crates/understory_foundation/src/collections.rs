//! Paged sparse collections and hash-table sizing helpers.
//!
//! Entity ids are split into `page = id >> 10` and `slot = id & 1023`; pages
//! are allocated lazily on first use by any id in their range, bounding
//! memory to the populated ranges of the 32-bit id space.

/// Number of slots per page. Ids map as `page = id >> 10`, `slot = id & 1023`.
pub const PAGE_SIZE: usize = 1024;

const PAGE_SHIFT: u32 = 10;
const PAGE_MASK: u32 = (PAGE_SIZE as u32) - 1;

/// A paged sparse map from a `u32` id to a copyable value.
///
/// Used for entity-to-slot indices, filter position indices, and parent
/// links. `get`/`set`/`remove` are O(1); pages materialize on first write.
pub struct PagedSparse<T: Copy> {
    pages: Vec<Option<Box<[Option<T>; PAGE_SIZE]>>>,
    len: usize,
}

impl<T: Copy> Default for PagedSparse<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> PagedSparse<T> {
    /// Creates an empty map with no pages allocated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of ids with a value set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no id has a value set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Gets the value stored for `id`.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<T> {
        let page = (id >> PAGE_SHIFT) as usize;
        let slot = (id & PAGE_MASK) as usize;
        self.pages.get(page)?.as_ref()?[slot]
    }

    /// Returns true if `id` has a value set.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// Sets the value for `id`, returning the previous value if any.
    pub fn set(&mut self, id: u32, value: T) -> Option<T> {
        let page = (id >> PAGE_SHIFT) as usize;
        let slot = (id & PAGE_MASK) as usize;
        if page >= self.pages.len() {
            self.pages.resize_with(page + 1, || None);
        }
        let entries = self.pages[page].get_or_insert_with(|| Box::new([None; PAGE_SIZE]));
        let previous = entries[slot].replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Removes the value for `id`, returning it if it was set.
    pub fn remove(&mut self, id: u32) -> Option<T> {
        let page = (id >> PAGE_SHIFT) as usize;
        let slot = (id & PAGE_MASK) as usize;
        let entries = self.pages.get_mut(page)?.as_mut()?;
        let previous = entries[slot].take();
        if previous.is_some() {
            self.len -= 1;
        }
        previous
    }

    /// Removes every value while keeping allocated pages for reuse.
    pub fn clear(&mut self) {
        for page in self.pages.iter_mut().flatten() {
            for slot in page.iter_mut() {
                *slot = None;
            }
        }
        self.len = 0;
    }
}

/// A paged sparse map from a `u32` id to a small growable bucket of `u32`s.
///
/// Backs relation adjacency (dense indices per participant) and child lists.
/// Buckets use swap-remove, so element order is not preserved.
pub struct PagedBuckets {
    pages: Vec<Option<Box<[Vec<u32>; PAGE_SIZE]>>>,
}

impl Default for PagedBuckets {
    fn default() -> Self {
        Self::new()
    }
}

impl PagedBuckets {
    /// Creates an empty bucket map with no pages allocated.
    #[must_use]
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Returns the bucket for `id`, empty if none was ever populated.
    #[must_use]
    pub fn bucket(&self, id: u32) -> &[u32] {
        let page = (id >> PAGE_SHIFT) as usize;
        let slot = (id & PAGE_MASK) as usize;
        match self.pages.get(page).and_then(Option::as_ref) {
            Some(entries) => &entries[slot],
            None => &[],
        }
    }

    /// Returns the number of values in the bucket for `id`.
    #[must_use]
    pub fn len(&self, id: u32) -> usize {
        self.bucket(id).len()
    }

    /// Returns true if the bucket for `id` holds no values.
    #[must_use]
    pub fn is_empty(&self, id: u32) -> bool {
        self.bucket(id).is_empty()
    }

    /// Returns the last value in the bucket for `id`.
    #[must_use]
    pub fn last(&self, id: u32) -> Option<u32> {
        self.bucket(id).last().copied()
    }

    /// Appends a value to the bucket for `id`, allocating its page on demand.
    pub fn push(&mut self, id: u32, value: u32) {
        let page = (id >> PAGE_SHIFT) as usize;
        let slot = (id & PAGE_MASK) as usize;
        if page >= self.pages.len() {
            self.pages.resize_with(page + 1, || None);
        }
        let entries = self.pages[page]
            .get_or_insert_with(|| Box::new([const { Vec::new() }; PAGE_SIZE]));
        entries[slot].push(value);
    }

    /// Removes one occurrence of `value` from the bucket for `id`.
    ///
    /// Returns false if the value was not present.
    pub fn remove_value(&mut self, id: u32, value: u32) -> bool {
        let Some(bucket) = self.bucket_mut(id) else {
            return false;
        };
        match bucket.iter().position(|&v| v == value) {
            Some(pos) => {
                bucket.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Replaces one occurrence of `old` with `new` in the bucket for `id`.
    ///
    /// Returns false if `old` was not present.
    pub fn replace_value(&mut self, id: u32, old: u32, new: u32) -> bool {
        let Some(bucket) = self.bucket_mut(id) else {
            return false;
        };
        match bucket.iter().position(|&v| v == old) {
            Some(pos) => {
                bucket[pos] = new;
                true
            }
            None => false,
        }
    }

    /// Takes the whole bucket for `id`, leaving it empty.
    pub fn drain(&mut self, id: u32) -> Vec<u32> {
        self.bucket_mut(id).map(std::mem::take).unwrap_or_default()
    }

    /// Empties every bucket while keeping allocated pages for reuse.
    pub fn clear(&mut self) {
        for page in self.pages.iter_mut().flatten() {
            for bucket in page.iter_mut() {
                bucket.clear();
            }
        }
    }

    fn bucket_mut(&mut self, id: u32) -> Option<&mut Vec<u32>> {
        let page = (id >> PAGE_SHIFT) as usize;
        let slot = (id & PAGE_MASK) as usize;
        Some(&mut self.pages.get_mut(page)?.as_mut()?[slot])
    }
}

/// Fixed prime ladder for bucket-table sizing.
///
/// Roughly doubling steps; rehashing walks this ladder so table sizes stay
/// prime and chain distribution stays even under the modulo hash.
const PRIMES: &[usize] = &[
    3, 7, 17, 37, 79, 163, 331, 673, 1_361, 2_729, 5_471, 10_949, 21_911, 43_853, 87_719, 175_447,
    350_899, 701_819, 1_403_641, 2_807_303, 5_614_657, 11_229_331, 22_458_671, 44_917_381,
    89_834_777, 179_669_557, 359_339_171, 718_678_369, 1_437_356_741,
];

/// Returns the smallest ladder prime that is at least `n`.
///
/// Falls back to an odd-candidate search above the ladder's top entry.
#[must_use]
pub fn next_prime(n: usize) -> usize {
    for &p in PRIMES {
        if p >= n {
            return p;
        }
    }
    let mut candidate = n | 1;
    while !is_prime(candidate) {
        candidate += 2;
    }
    candidate
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
