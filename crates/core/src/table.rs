//! Open-addressed hash table keyed by interned strings.
//!
//! Used for two purposes that share the exact same probing machinery: the
//! VM's string intern set (`Table<()>`, see [`crate::object::Interner`]) and
//! the globals table (`Table<Value>`). Linear probing with tombstones, 0.75
//! max load factor, capacity doubling from 8. Keys are compared by pointer
//! identity (`Rc::ptr_eq`) since all keys that ever reach this table have
//! already been interned.

use std::rc::Rc;

use crate::object::ObjString;

const MAX_LOAD_FACTOR: f64 = 0.75;

enum Slot<V> {
    Empty,
    Tombstone,
    Occupied(Rc<ObjString>, V),
}

pub struct Table<V> {
    entries: Vec<Slot<V>>,
    /// Occupied entries plus tombstones -- tombstones count against the load
    /// factor so a table doesn't grow unboundedly from delete/insert churn
    /// without ever compacting.
    count: usize,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Table {
            entries: Vec::new(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn find_entry(entries: &[Slot<V>], key: &Rc<ObjString>) -> usize {
        let capacity = entries.len();
        let mut index = (key.hash() as usize) % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            match &entries[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied(k, _) => {
                    if Rc::ptr_eq(k, key) {
                        return index;
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.entries.is_empty() {
            8
        } else {
            self.entries.len() * 2
        };
        tracing::trace!(target: "ash_core::table", new_capacity, "table resized");
        let mut new_entries: Vec<Slot<V>> = (0..new_capacity).map(|_| Slot::Empty).collect();
        let mut new_count = 0;
        for slot in self.entries.drain(..) {
            if let Slot::Occupied(key, value) = slot {
                let index = Self::find_entry(&new_entries, &key);
                new_entries[index] = Slot::Occupied(key, value);
                new_count += 1;
            }
        }
        self.entries = new_entries;
        self.count = new_count;
    }

    /// Insert or overwrite `key => value`. Returns `true` iff this created a
    /// brand new entry (the key was not previously present, whether the slot
    /// was truly empty or a reused tombstone).
    pub fn set(&mut self, key: Rc<ObjString>, value: V) -> bool {
        if self.entries.is_empty()
            || (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD_FACTOR
        {
            self.grow();
        }
        let index = Self::find_entry(&self.entries, &key);
        let was_empty = matches!(self.entries[index], Slot::Empty);
        let is_new_key = !matches!(self.entries[index], Slot::Occupied(_, _));
        if was_empty {
            self.count += 1;
        }
        self.entries[index] = Slot::Occupied(key, value);
        is_new_key
    }

    pub fn get(&self, key: &Rc<ObjString>) -> Option<&V> {
        if self.entries.is_empty() {
            return None;
        }
        match &self.entries[Self::find_entry(&self.entries, key)] {
            Slot::Occupied(_, value) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, key: &Rc<ObjString>) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`, leaving a tombstone. Returns `true` iff the key was
    /// present.
    pub fn delete(&mut self, key: &Rc<ObjString>) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = Self::find_entry(&self.entries, key);
        if matches!(self.entries[index], Slot::Occupied(_, _)) {
            self.entries[index] = Slot::Tombstone;
            true
        } else {
            false
        }
    }

    /// De-duplication primitive for interning: find an existing key whose
    /// hash, length, and bytes all match, without needing to have allocated a
    /// candidate `ObjString` first.
    pub fn find_string(&self, bytes: &[u8], hash: u32) -> Option<Rc<ObjString>> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = (hash as usize) % capacity;
        loop {
            match &self.entries[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied(key, _) => {
                    if key.hash() == hash && key.as_bytes() == bytes {
                        return Some(key.clone());
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }
}
