use crate::config::lookup_by_type;
use crate::parser::{path_to_string, ParsedFile, SourceUnit};
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Type resolver - indexes struct definitions of the analysed crate by canonical name
pub struct TypeResolver {
    structs: BTreeMap<String, StructDef>,
}

/// Struct definition with its serialized shape
#[derive(Debug, Clone)]
pub struct StructDef {
    /// Canonical name, `crate::…::Type`
    pub name: String,
    pub shape: StructShape,
    /// Named fields in declaration order
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructShape {
    Named,
    Tuple,
    Unit,
}

/// Field definition in a struct
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Type information for the field
    pub type_info: TypeInfo,
    /// Whether the field is optional (wrapped in `Option<T>`)
    pub optional: bool,
    /// Serde attributes applied to this field
    pub serde_attrs: SerdeAttributes,
}

impl FieldDef {
    /// Key the field serializes under
    pub fn serialized_name(&self) -> &str {
        self.serde_attrs.rename.as_deref().unwrap_or(&self.name)
    }
}

/// Type information extracted from a field type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// The base type name (e.g., "String", "crate::models::User", "i32")
    pub name: String,
    /// Generic type arguments (e.g., for `HashMap<String, u32>`)
    pub generic_args: Vec<TypeInfo>,
    /// Whether this type is wrapped in `Option<T>`
    pub is_option: bool,
    /// Whether this type is a `Vec<T>` (array type)
    pub is_vec: bool,
}

impl TypeInfo {
    pub fn new(name: String) -> Self {
        Self {
            name,
            generic_args: Vec::new(),
            is_option: false,
            is_vec: false,
        }
    }
}

/// Primitive types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Bool,
    Char,
}

impl PrimitiveType {
    /// Parse a primitive type name
    pub fn parse(type_name: &str) -> Option<Self> {
        match type_name {
            "String" | "str" => Some(PrimitiveType::String),
            "i8" => Some(PrimitiveType::I8),
            "i16" => Some(PrimitiveType::I16),
            "i32" => Some(PrimitiveType::I32),
            "i64" => Some(PrimitiveType::I64),
            "i128" => Some(PrimitiveType::I128),
            "isize" => Some(PrimitiveType::Isize),
            "u8" => Some(PrimitiveType::U8),
            "u16" => Some(PrimitiveType::U16),
            "u32" => Some(PrimitiveType::U32),
            "u64" => Some(PrimitiveType::U64),
            "u128" => Some(PrimitiveType::U128),
            "usize" => Some(PrimitiveType::Usize),
            "f32" => Some(PrimitiveType::F32),
            "f64" => Some(PrimitiveType::F64),
            "bool" => Some(PrimitiveType::Bool),
            "char" => Some(PrimitiveType::Char),
            _ => None,
        }
    }

    /// Swagger type keyword of the primitive
    pub fn schema_type(self) -> &'static str {
        match self {
            PrimitiveType::String | PrimitiveType::Char => "string",
            PrimitiveType::F32 | PrimitiveType::F64 => "number",
            PrimitiveType::Bool => "boolean",
            _ => "integer",
        }
    }

    fn placeholder(self) -> Value {
        match self.schema_type() {
            "integer" => Value::from(0),
            "number" => Value::from(0.0),
            "boolean" => Value::Bool(false),
            _ => Value::String("string".to_string()),
        }
    }
}

/// Serde attributes for a field
#[derive(Debug, Clone, Default)]
pub struct SerdeAttributes {
    /// Renamed field name
    pub rename: Option<String>,
    /// Whether to skip this field during serialization
    pub skip: bool,
    /// Whether to flatten this field
    pub flatten: bool,
}

/// Nested struct placeholders stop at this depth
const MAX_PLACEHOLDER_DEPTH: usize = 4;

impl TypeResolver {
    /// Indexes every struct declared in `parsed_files`, inline modules included.
    pub fn new(parsed_files: &[ParsedFile]) -> Self {
        let mut structs = BTreeMap::new();

        for file in parsed_files {
            for unit in SourceUnit::scopes(file) {
                for item in &unit.items {
                    if let syn::Item::Struct(item_struct) = item {
                        let def = Self::parse_struct_definition(&unit, item_struct);
                        structs.insert(def.name.clone(), def);
                    }
                }
            }
        }

        debug!("Indexed {} struct definitions", structs.len());
        Self { structs }
    }

    /// Struct definition by canonical name, or by unique short name
    pub fn struct_def(&self, type_name: &str) -> Option<&StructDef> {
        lookup_by_type(&self.structs, type_name)
    }

    /// Swagger type of a domain object's route key: `integer` for integer
    /// primitives, `string` otherwise.
    pub fn key_type(&self, domain_type: &str, key_field: &str) -> &'static str {
        self.struct_def(domain_type)
            .and_then(|def| def.fields.iter().find(|f| f.name == key_field))
            .and_then(|field| PrimitiveType::parse(&field.type_info.name))
            .filter(|p| p.schema_type() == "integer")
            .map(|_| "integer")
            .unwrap_or("string")
    }

    /// Placeholder example for a value of the given type.
    pub fn example_value(&self, type_info: &TypeInfo) -> Value {
        self.placeholder(type_info, 0)
    }

    fn placeholder(&self, type_info: &TypeInfo, depth: usize) -> Value {
        if type_info.is_vec {
            let mut item = type_info.clone();
            item.is_vec = false;
            item.is_option = false;
            return Value::Array(vec![self.placeholder(&item, depth + 1)]);
        }

        if let Some(primitive) = PrimitiveType::parse(&type_info.name) {
            return primitive.placeholder();
        }

        match self.struct_def(&type_info.name) {
            Some(def) if depth < MAX_PLACEHOLDER_DEPTH && def.shape == StructShape::Named => {
                let mut object = Map::new();
                for field in def.fields.iter().filter(|f| !f.serde_attrs.skip) {
                    object.insert(
                        field.serialized_name().to_string(),
                        self.placeholder(&field.type_info, depth + 1),
                    );
                }
                Value::Object(object)
            }
            _ => Value::Null,
        }
    }

    /// Parse a struct definition
    fn parse_struct_definition(unit: &SourceUnit, item_struct: &syn::ItemStruct) -> StructDef {
        let name = format!("{}::{}", unit.module_name(), item_struct.ident);
        let (shape, fields) = match &item_struct.fields {
            syn::Fields::Named(named) => (
                StructShape::Named,
                named
                    .named
                    .iter()
                    .filter_map(|field| Self::parse_field(unit, field))
                    .collect(),
            ),
            syn::Fields::Unnamed(_) => (StructShape::Tuple, Vec::new()),
            syn::Fields::Unit => (StructShape::Unit, Vec::new()),
        };

        StructDef { name, shape, fields }
    }

    /// Parse a single field
    fn parse_field(unit: &SourceUnit, field: &syn::Field) -> Option<FieldDef> {
        let field_name = field.ident.as_ref()?.to_string();

        let type_info = Self::extract_type_info(unit, &field.ty);
        let optional = type_info.is_option;
        let serde_attrs = Self::parse_serde_attributes(&field.attrs);

        Some(FieldDef {
            name: field_name,
            type_info,
            optional,
            serde_attrs,
        })
    }

    /// Parse Serde attributes from field attributes
    fn parse_serde_attributes(attrs: &[syn::Attribute]) -> SerdeAttributes {
        let mut serde_attrs = SerdeAttributes::default();

        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            let parsed = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    serde_attrs.rename = Some(value.value());
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    serde_attrs.skip = true;
                } else if meta.path.is_ident("flatten") {
                    serde_attrs.flatten = true;
                } else if meta.input.peek(syn::Token![=]) {
                    // skip_serializing_if = "...", default = "...", with = "..."
                    let _: syn::Expr = meta.value()?.parse()?;
                }
                Ok(())
            });
            if let Err(e) = parsed {
                debug!("Malformed serde attribute: {}", e);
            }
        }

        serde_attrs
    }

    /// Extract TypeInfo from a syn::Type
    fn extract_type_info(unit: &SourceUnit, ty: &syn::Type) -> TypeInfo {
        match ty {
            syn::Type::Path(type_path) => Self::extract_type_info_from_path(unit, &type_path.path),
            syn::Type::Reference(reference) => Self::extract_type_info(unit, &reference.elem),
            _ => TypeInfo::new("Unknown".to_string()),
        }
    }

    /// Extract TypeInfo from a syn::Path
    fn extract_type_info_from_path(unit: &SourceUnit, path: &syn::Path) -> TypeInfo {
        let Some(segment) = path.segments.last() else {
            return TypeInfo::new("Unknown".to_string());
        };
        let type_name = segment.ident.to_string();

        let generic_args: Vec<TypeInfo> = match &segment.arguments {
            syn::PathArguments::AngleBracketed(args) => args
                .args
                .iter()
                .filter_map(|arg| match arg {
                    syn::GenericArgument::Type(inner) => Some(Self::extract_type_info(unit, inner)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        match (type_name.as_str(), generic_args.first()) {
            ("Option", Some(inner)) => TypeInfo {
                is_option: true,
                ..inner.clone()
            },
            ("Vec", Some(inner)) => TypeInfo {
                is_vec: true,
                ..inner.clone()
            },
            _ if PrimitiveType::parse(&type_name).is_some() => TypeInfo::new(type_name),
            _ => TypeInfo {
                name: unit.resolve(&path_to_string(path)),
                generic_args,
                is_option: false,
                is_vec: false,
            },
        }
    }
}
