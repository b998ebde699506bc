//! Object heap: heap-allocated values that live behind `Value::Obj`.
//!
//! The only object kind defined by this core is an interned string. There is
//! no tracing collector -- the [`Interner`] doubles as the object heap: every
//! string it hands out is also kept alive in `heap` until the interner itself
//! is dropped (VM teardown), matching the spec's "free en masse at VM
//! teardown" lifecycle without needing unsafe intrusive linking.

use std::rc::Rc;

use crate::table::Table;

/// FNV-1a, 32-bit, matching the reference VM's string hash exactly.
pub fn fnv1a_hash(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// An interned, immutable string object.
#[derive(Debug)]
pub struct ObjString {
    bytes: Box<[u8]>,
    hash: u32,
}

impl ObjString {
    fn new(bytes: Box<[u8]>) -> Self {
        let hash = fnv1a_hash(&bytes);
        ObjString { bytes, hash }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).expect("ObjString bytes are always valid UTF-8")
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }
}

impl PartialEq for ObjString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

/// Owns the string intern table and the object heap it backs.
///
/// One `Interner` is shared by the compiler (interning string literals and
/// global-variable names as it emits constants) and the VM (interning the
/// result of `+` on two strings), exactly as the reference implementation
/// shares a single process-wide string table between `compile` and `run`.
pub struct Interner {
    strings: Table<()>,
    heap: Vec<Rc<ObjString>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        Interner {
            strings: Table::new(),
            heap: Vec::new(),
        }
    }

    /// Intern `s`, returning the canonical (pointer-identical for equal
    /// content) heap object. Allocates a new object only the first time a
    /// given byte sequence is seen.
    pub fn intern(&mut self, s: &str) -> Rc<ObjString> {
        self.intern_bytes(s.as_bytes())
    }

    pub fn intern_bytes(&mut self, bytes: &[u8]) -> Rc<ObjString> {
        let hash = fnv1a_hash(bytes);
        if let Some(existing) = self.strings.find_string(bytes, hash) {
            return existing;
        }
        let obj = Rc::new(ObjString::new(bytes.to_vec().into_boxed_slice()));
        self.strings.set(obj.clone(), ());
        self.heap.push(obj.clone());
        obj
    }

    /// Concatenate two strings and intern the result, exactly as `ADD`
    /// requires when both operands are strings.
    pub fn concat(&mut self, a: &ObjString, b: &ObjString) -> Rc<ObjString> {
        let mut bytes = Vec::with_capacity(a.len() + b.len());
        bytes.extend_from_slice(a.as_bytes());
        bytes.extend_from_slice(b.as_bytes());
        self.intern_bytes(&bytes)
    }

    /// Number of distinct strings ever interned (objects live in the heap
    /// list for the lifetime of the `Interner`, same as the reference's
    /// object list rooted in the VM).
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }
}
