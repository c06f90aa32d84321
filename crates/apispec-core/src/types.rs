use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::pool::Handle;

/// Handle into a [`TypeTable`]. Distinct from a string [`Handle`] — this one
/// identifies a (possibly structural) type descriptor, not raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChanDirection {
    Send,
    Recv,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Byte,
    Rune,
    Error,
    Any,
}

/// A field within a struct type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: Handle,
    pub ty: TypeId,
    /// Raw struct tag text (e.g. `` `json:"name" validate:"required"` ``),
    /// interpreted lazily by the schema synthesizer (C8).
    pub tag: Option<Handle>,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub parameters: Vec<TypeId>,
    pub results: Vec<TypeId>,
    pub variadic: bool,
}

/// A tagged variant describing a source-language type. Nested references are
/// always by [`TypeId`]; the invariant that structurally identical
/// descriptors share one id is enforced by [`TypeTable::intern`], which
/// hashes and deduplicates on this type's `Eq`/`Hash` impl.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDesc {
    /// A named type: `(package import path, type name, type arguments)`.
    /// `type_args` is empty for non-generic types.
    Named {
        package: Handle,
        name: Handle,
        type_args: Vec<TypeId>,
    },
    Pointer(TypeId),
    Slice(TypeId),
    Array(u64, TypeId),
    Map {
        key: TypeId,
        value: TypeId,
    },
    Chan {
        direction: ChanDirection,
        elem: TypeId,
    },
    Func(Signature),
    Interface {
        methods: Vec<(Handle, Signature)>,
    },
    Struct {
        fields: Vec<Field>,
    },
    /// A generic type parameter, e.g. `T` bound by `constraint`.
    TypeParam {
        name: Handle,
        constraint: Option<TypeId>,
    },
    Basic(BasicKind),
    /// Type information was unavailable for this expression (opaque).
    Unknown,
}

/// Interning table for [`TypeDesc`] values, structurally deduplicated the
/// same way the string pool deduplicates text: two structurally equal
/// descriptors always resolve to the same [`TypeId`].
#[derive(Debug, Default)]
pub struct TypeTable {
    by_desc: RwLock<HashMap<TypeDesc, TypeId>>,
    by_id: RwLock<Vec<TypeDesc>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, desc: TypeDesc) -> TypeId {
        if let Some(id) = self.by_desc.read().get(&desc).copied() {
            return id;
        }
        let mut by_desc = self.by_desc.write();
        if let Some(id) = by_desc.get(&desc).copied() {
            return id;
        }
        let mut by_id = self.by_id.write();
        let id = TypeId(by_id.len() as u32);
        by_id.push(desc.clone());
        by_desc.insert(desc, id);
        id
    }

    pub fn resolve(&self, id: TypeId) -> TypeDesc {
        self.by_id.read()[id.index()].clone()
    }

    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All interned descriptors in id order — the on-disk form for both the
    /// combined dump and the split form's `call-graph` section.
    pub fn to_vec(&self) -> Vec<TypeDesc> {
        self.by_id.read().clone()
    }

    /// Rebuilds a table from an id-ordered descriptor list. Only round-trips
    /// correctly when fed a list with no duplicates and in the exact order
    /// `to_vec` produced, since ids are assigned positionally.
    pub fn from_vec(descs: Vec<TypeDesc>) -> Self {
        let table = Self::new();
        for desc in descs {
            table.intern(desc);
        }
        table
    }
}

impl Serialize for TypeTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_vec().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TypeTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<TypeDesc>::deserialize(deserializer).map(TypeTable::from_vec)
    }
}
