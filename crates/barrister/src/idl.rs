//! # IDL schema model
//!
//! In-memory representation of a parsed Barrister IDL document. The model is
//! built once from the document's element sequence and is read-only
//! afterwards; wrap it in an `Arc` to share it between servers, proxies and
//! concurrent calls.
//!
//! Index construction is a second pass over the loaded elements because
//! structs may extend or reference structs and enums declared later in the
//! document.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};

/// Primitive IDL type names. Anything else names a struct or an enum.
pub const PRIMITIVE_TYPES: [&str; 4] = ["string", "int", "float", "bool"];

/// Upper-case the first character. Used wherever the runtime tolerates the
/// two casing conventions `name` / `Name` for fields and methods.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One struct member, function parameter or function return descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Empty for anonymous return types
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "is_array", alias = "isArray")]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            optional: false,
            is_array: false,
            comment: String::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// The descriptor of a single element of this (array) field.
    pub fn element(&self) -> Field {
        Field {
            is_array: false,
            ..self.clone()
        }
    }

    pub fn is_primitive(&self) -> bool {
        PRIMITIVE_TYPES.contains(&self.type_name.as_str())
    }
}

/// One allowed value of an IDL enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl EnumValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            comment: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub values: Vec<EnumValue>,
}

/// An IDL struct. `computed` is filled in during schema finalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Struct {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extends: String,
    pub fields: Vec<Field>,
    #[serde(skip)]
    computed: IndexMap<String, Field>,
}

impl Struct {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            extends: String::new(),
            fields,
            computed: IndexMap::new(),
        }
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = parent.into();
        self
    }

    pub fn parent(&self) -> Option<&str> {
        if self.extends.is_empty() {
            None
        } else {
            Some(&self.extends)
        }
    }

    /// Own fields plus all inherited fields, ancestors first, keyed by name.
    pub fn computed_fields(&self) -> &IndexMap<String, Field> {
        &self.computed
    }
}

/// An interface method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default)]
    pub params: Vec<Field>,
    pub returns: Field,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Field>, returns: Field) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            params,
            returns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub functions: Vec<Function>,
}

/// Provenance of the IDL document, used by clients for compatibility checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub barrister_version: String,
    #[serde(default)]
    pub date_generated: i64,
    #[serde(default)]
    pub checksum: String,
}

/// Top-level element of an IDL document, in source order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IdlElement {
    Comment {
        #[serde(default)]
        value: String,
    },
    Enum(EnumDef),
    Struct(Struct),
    Interface(InterfaceDef),
    Meta(Meta),
}

/// The finalised schema
#[derive(Debug, Clone)]
pub struct Idl {
    elements: Vec<Value>,
    structs: IndexMap<String, Struct>,
    enums: IndexMap<String, Vec<EnumValue>>,
    interfaces: IndexMap<String, Vec<Function>>,
    methods: HashMap<String, Function>,
    meta: Meta,
}

impl Idl {
    /// Decode an IDL JSON document (an array of elements) and build the schema.
    ///
    /// The raw elements are kept as decoded so `barrister-idl` can serve them
    /// back verbatim.
    pub fn from_json(bytes: &[u8]) -> SchemaResult<Self> {
        let raw: Vec<Value> = serde_json::from_slice(bytes)?;
        let elements = raw
            .iter()
            .map(|v| serde_json::from_value::<IdlElement>(v.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::assemble(raw, elements)
    }

    /// Build the schema from already-materialised elements.
    pub fn build(elements: Vec<IdlElement>) -> SchemaResult<Self> {
        let raw = elements
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Self::assemble(raw, elements)
    }

    fn assemble(raw: Vec<Value>, elements: Vec<IdlElement>) -> SchemaResult<Self> {
        let mut idl = Idl {
            elements: raw,
            structs: IndexMap::new(),
            enums: IndexMap::new(),
            interfaces: IndexMap::new(),
            methods: HashMap::new(),
            meta: Meta::default(),
        };

        for element in elements {
            match element {
                IdlElement::Comment { .. } => {}
                IdlElement::Enum(def) => {
                    idl.check_type_name_free("enum", &def.name)?;
                    idl.enums.insert(def.name, def.values);
                }
                IdlElement::Struct(def) => {
                    idl.check_type_name_free("struct", &def.name)?;
                    idl.structs.insert(def.name.clone(), def);
                }
                IdlElement::Interface(def) => {
                    if idl.interfaces.contains_key(&def.name) {
                        return Err(SchemaError::DuplicateName {
                            kind: "interface",
                            name: def.name,
                        });
                    }
                    idl.interfaces.insert(def.name, def.functions);
                }
                IdlElement::Meta(meta) => idl.meta = meta,
            }
        }

        idl.finalize()?;

        debug!(
            "Built IDL schema: {} structs, {} enums, {} interfaces, {} methods",
            idl.structs.len(),
            idl.enums.len(),
            idl.interfaces.len(),
            idl.methods.len()
        );
        Ok(idl)
    }

    fn check_type_name_free(&self, kind: &'static str, name: &str) -> SchemaResult<()> {
        if self.structs.contains_key(name) || self.enums.contains_key(name) {
            return Err(SchemaError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Second pass: flatten inheritance, check type references and index
    /// methods by their full `Interface.function` key.
    fn finalize(&mut self) -> SchemaResult<()> {
        let mut computed = Vec::with_capacity(self.structs.len());
        for name in self.structs.keys() {
            computed.push((name.clone(), self.compute_struct_fields(name)?));
        }
        for (name, fields) in computed {
            if let Some(def) = self.structs.get_mut(&name) {
                def.computed = fields;
            }
        }

        for def in self.structs.values() {
            for field in &def.fields {
                self.check_type_known(&format!("{}.{}", def.name, field.name), field)?;
            }
        }

        let mut methods = HashMap::new();
        for (iface, functions) in &self.interfaces {
            for function in functions {
                let key = format!("{}.{}", iface, function.name);
                for (i, param) in function.params.iter().enumerate() {
                    self.check_type_known(&format!("{} param[{}]", key, i), param)?;
                }
                self.check_type_known(&format!("{} returns", key), &function.returns)?;
                if methods.insert(key.clone(), function.clone()).is_some() {
                    return Err(SchemaError::DuplicateMethod(key));
                }
            }
        }
        self.methods = methods;
        Ok(())
    }

    fn compute_struct_fields(&self, name: &str) -> SchemaResult<IndexMap<String, Field>> {
        let mut chain = vec![name.to_string()];
        let mut seen = HashSet::from([name.to_string()]);
        let mut current = &self.structs[name];

        while let Some(parent) = current.parent() {
            if !seen.insert(parent.to_string()) {
                chain.push(parent.to_string());
                return Err(SchemaError::InheritanceCycle { chain });
            }
            current = self
                .structs
                .get(parent)
                .ok_or_else(|| SchemaError::UnknownParent {
                    name: current.name.clone(),
                    parent: parent.to_string(),
                })?;
            chain.push(parent.to_string());
        }

        let mut fields = IndexMap::new();
        for ancestor in chain.iter().rev() {
            for field in &self.structs[ancestor.as_str()].fields {
                fields.insert(field.name.clone(), field.clone());
            }
        }
        Ok(fields)
    }

    fn check_type_known(&self, context: &str, field: &Field) -> SchemaResult<()> {
        if field.is_primitive()
            || self.structs.contains_key(&field.type_name)
            || self.enums.contains_key(&field.type_name)
        {
            return Ok(());
        }
        Err(SchemaError::UnknownType {
            context: context.to_string(),
            type_name: field.type_name.clone(),
        })
    }

    /// Look up a method by its full `Interface.function` key
    pub fn method(&self, key: &str) -> Option<&Function> {
        self.methods.get(key)
    }

    pub fn struct_def(&self, name: &str) -> Option<&Struct> {
        self.structs.get(name)
    }

    pub fn enum_values(&self, name: &str) -> Option<&[EnumValue]> {
        self.enums.get(name).map(Vec::as_slice)
    }

    pub fn interface(&self, name: &str) -> Option<&[Function]> {
        self.interfaces.get(name).map(Vec::as_slice)
    }

    /// Structs in declaration order
    pub fn structs(&self) -> impl Iterator<Item = &Struct> {
        self.structs.values()
    }

    /// Enums in declaration order
    pub fn enums(&self) -> impl Iterator<Item = (&str, &[EnumValue])> {
        self.enums.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Interfaces in declaration order
    pub fn interfaces(&self) -> impl Iterator<Item = (&str, &[Function])> {
        self.interfaces.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The original element sequence, as served by `barrister-idl`
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }
}
