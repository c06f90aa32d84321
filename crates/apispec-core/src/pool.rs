use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::BuildHasherDefault;

/// A 32-bit handle into the [`StringPool`]. Equality on handles is the
/// canonical identity test for any string-valued attribute in the program
/// model — two handles are equal iff the underlying strings are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(u32);

impl Handle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Thread-safe string interner handing out stable [`Handle`]s.
///
/// `intern` is atomic and idempotent: concurrent callers interning the same
/// string race harmlessly and converge on the same handle. Readers
/// (`resolve`) never block a writer out for more than the lookup itself —
/// the fast path takes a read lock, and only a genuine miss upgrades to a
/// write lock.
#[derive(Debug)]
pub struct StringPool {
    by_str: RwLock<HashMap<Arc<str>, Handle, BuildHasherDefault<FxHasher>>>,
    by_handle: RwLock<Vec<Arc<str>>>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            by_str: RwLock::new(HashMap::with_hasher(BuildHasherDefault::<FxHasher>::default())),
            by_handle: RwLock::new(Vec::new()),
        }
    }

    /// Interns `s`, returning the same handle for equal strings regardless
    /// of call order or concurrent races.
    pub fn intern(&self, s: &str) -> Handle {
        if let Some(handle) = self.by_str.read().get(s).copied() {
            return handle;
        }

        let mut by_str = self.by_str.write();
        // Re-check under the write lock: another writer may have interned
        // `s` between our read-lock miss and acquiring the write lock.
        if let Some(handle) = by_str.get(s).copied() {
            return handle;
        }

        let mut by_handle = self.by_handle.write();
        let handle = Handle(by_handle.len() as u32);
        let arc: Arc<str> = Arc::from(s);
        by_handle.push(arc.clone());
        by_str.insert(arc, handle);
        handle
    }

    /// Resolves a handle back to its string. Panics if the handle was not
    /// produced by this pool — handles are never valid across pool
    /// instances.
    pub fn resolve(&self, handle: Handle) -> Arc<str> {
        self.by_handle.read()[handle.index()].clone()
    }

    pub fn len(&self) -> usize {
        self.by_handle.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All interned strings in handle order — the on-disk form, whether
    /// embedded in a combined dump or written standalone in the split form.
    pub fn to_vec(&self) -> Vec<String> {
        self.by_handle.read().iter().map(|s| s.to_string()).collect()
    }

    /// Rebuilds a pool from a handle-ordered string list. Only round-trips
    /// correctly when fed a list with no duplicates and in the exact order
    /// `to_vec` produced, since handles are assigned positionally.
    pub fn from_vec(strings: Vec<String>) -> Self {
        let pool = Self::new();
        for s in &strings {
            pool.intern(s);
        }
        pool
    }
}

impl Serialize for StringPool {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_vec().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StringPool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<String>::deserialize(deserializer).map(StringPool::from_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let pool = StringPool::new();
        let a = pool.intern("net/http");
        let b = pool.intern("net/http");
        assert_eq!(a, b);
    }

    #[test]
    fn resolve_roundtrips() {
        let pool = StringPool::new();
        let h = pool.intern("github.com/gin-gonic/gin");
        assert_eq!(&*pool.resolve(h), "github.com/gin-gonic/gin");
    }

    #[test]
    fn distinct_strings_get_distinct_handles() {
        let pool = StringPool::new();
        let a = pool.intern("a");
        let b = pool.intern("b");
        assert_ne!(a, b);
    }

    #[test]
    fn concurrent_intern_converges_on_one_handle() {
        use std::thread;

        let pool = Arc::new(StringPool::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || pool.intern("concurrent"))
            })
            .collect();

        let results: Vec<Handle> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn serialized_pool_round_trips_handles_and_text() {
        let pool = StringPool::new();
        let a = pool.intern("net/http");
        let b = pool.intern("github.com/go-chi/chi/v5");

        let json = serde_json::to_string(&pool).expect("pool serializes");
        let restored: StringPool = serde_json::from_str(&json).expect("pool deserializes");

        assert_eq!(&*restored.resolve(a), "net/http");
        assert_eq!(&*restored.resolve(b), "github.com/go-chi/chi/v5");
    }
}
