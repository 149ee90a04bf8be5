use std::collections::HashSet;
use std::fmt::Write;

use barrister::idl::{EnumValue, Field, Function, Idl, Struct};
use tracing::debug;

use crate::GenerateError;
use crate::names::{check, dedupe, escape, type_ident, value_ident, variant_ident};

// Names the generated code uses unqualified
const RESERVED_TYPES: &[&str] = &[
    "Arc", "Box", "Deserialize", "Option", "Result", "Send", "Serialize", "String", "Sync", "Vec",
];

/// Output options
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Text for the generated module's `//!` doc comment
    pub module_doc: Option<String>,

    /// Path of the runtime crate in the generated code
    pub runtime_crate: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            module_doc: None,
            runtime_crate: "barrister".to_string(),
        }
    }
}

/// Generate Rust bindings for `idl`.
pub fn generate_rust(idl: &Idl, options: &GenerateOptions) -> Result<String, GenerateError> {
    let mut generator = Generator::new(idl, &options.runtime_crate)?;

    generator.header(options.module_doc.as_deref())?;
    generator.meta()?;
    for (name, values) in idl.enums() {
        generator.enumeration(name, values)?;
    }
    for def in idl.structs() {
        generator.structure(def)?;
    }
    for (name, functions) in idl.interfaces() {
        generator.interface(name, functions)?;
    }
    generator.idl_loader()?;
    generator.server()?;

    debug!(
        "Generated {} bytes of bindings for {} interfaces",
        generator.out.len(),
        idl.interfaces().count()
    );
    Ok(generator.out)
}

struct Generator<'a> {
    idl: &'a Idl,
    rt: &'a str,
    /// Prefix for generic parameters; no IDL type name starts with it
    generic: String,
    out: String,
}

impl<'a> Generator<'a> {
    fn new(idl: &'a Idl, rt: &'a str) -> Result<Self, GenerateError> {
        let mut type_names: Vec<&str> = Vec::new();
        type_names.extend(idl.enums().map(|(name, _)| name));
        type_names.extend(idl.structs().map(|def| def.name.as_str()));
        type_names.extend(idl.interfaces().map(|(name, _)| name));

        for name in &type_names {
            check("type", name)?;
            if RESERVED_TYPES.contains(name) {
                return Err(GenerateError::ReservedName(name.to_string()));
            }
        }
        for (interface, _) in idl.interfaces() {
            for suffix in ["Handler", "Proxy"] {
                let generated = format!("{}{}", interface, suffix);
                if type_names.contains(&generated.as_str()) {
                    return Err(GenerateError::ReservedName(generated));
                }
            }
        }

        let mut generic = "T".to_string();
        while type_names.iter().any(|name| name.starts_with(&generic)) {
            generic.push('_');
        }

        Ok(Self {
            idl,
            rt,
            generic,
            out: String::new(),
        })
    }

    fn header(&mut self, module_doc: Option<&str>) -> Result<(), GenerateError> {
        if let Some(doc) = module_doc {
            for line in doc.lines() {
                writeln!(self.out, "//! {}", line.trim_end())?;
            }
            writeln!(self.out, "//!")?;
        }
        writeln!(self.out, "//! Generated by barrister-gen. Do not edit.")?;
        writeln!(self.out)?;
        writeln!(self.out, "use std::sync::Arc;")?;
        writeln!(self.out)?;
        writeln!(self.out, "#[allow(unused_imports)]")?;
        writeln!(self.out, "use {}::serde::{{Deserialize, Serialize}};", self.rt)?;
        Ok(())
    }

    fn meta(&mut self) -> Result<(), GenerateError> {
        let meta = self.idl.meta();
        writeln!(self.out)?;
        writeln!(self.out, "pub const BARRISTER_VERSION: &str = {:?};", meta.barrister_version)?;
        writeln!(self.out, "pub const BARRISTER_CHECKSUM: &str = {:?};", meta.checksum)?;
        writeln!(self.out, "pub const BARRISTER_DATE_GENERATED: i64 = {};", meta.date_generated)?;
        Ok(())
    }

    fn enumeration(&mut self, name: &str, values: &[EnumValue]) -> Result<(), GenerateError> {
        let variants = dedupe(values.iter().map(|v| variant_ident(&v.value)).collect());

        writeln!(self.out)?;
        writeln!(
            self.out,
            "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]"
        )?;
        writeln!(self.out, "#[serde(crate = \"{}::serde\")]", self.rt)?;
        writeln!(self.out, "pub enum {} {{", type_ident(name))?;
        for (value, variant) in values.iter().zip(variants) {
            doc(&mut self.out, "    ", &value.comment)?;
            writeln!(self.out, "    #[serde(rename = {:?})]", value.value)?;
            writeln!(self.out, "    {},", variant)?;
        }
        writeln!(self.out, "}}")?;
        Ok(())
    }

    fn structure(&mut self, def: &Struct) -> Result<(), GenerateError> {
        let fields: Vec<&Field> = def.computed_fields().values().collect();
        for field in &fields {
            check("field", &field.name)?;
        }
        let idents = dedupe(fields.iter().map(|f| value_ident(&f.name)).collect());

        writeln!(self.out)?;
        doc(&mut self.out, "", &def.comment)?;
        writeln!(self.out, "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]")?;
        writeln!(self.out, "#[serde(crate = \"{}::serde\")]", self.rt)?;
        writeln!(self.out, "pub struct {} {{", type_ident(&def.name))?;
        for (field, ident) in fields.into_iter().zip(idents) {
            doc(&mut self.out, "    ", &field.comment)?;
            if field.optional {
                writeln!(
                    self.out,
                    "    #[serde(rename = {:?}, default, skip_serializing_if = \"Option::is_none\")]",
                    field.name
                )?;
            } else {
                writeln!(self.out, "    #[serde(rename = {:?})]", field.name)?;
            }
            let boxed = !field.is_array && self.reaches(&field.type_name, &def.name);
            writeln!(self.out, "    pub {}: {},", ident, rust_type(field, boxed))?;
        }
        writeln!(self.out, "}}")?;
        Ok(())
    }

    /// Whether a value of struct `from` can contain a `target` without an
    /// intervening `Vec`. Such members need boxing to have a finite size.
    fn reaches(&self, from: &str, target: &str) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(name) = stack.pop() {
            if name == target {
                return true;
            }
            if !visited.insert(name) {
                continue;
            }
            if let Some(def) = self.idl.struct_def(name) {
                stack.extend(
                    def.computed_fields()
                        .values()
                        .filter(|f| !f.is_array)
                        .map(|f| f.type_name.as_str()),
                );
            }
        }
        false
    }

    fn interface(&mut self, name: &str, functions: &[Function]) -> Result<(), GenerateError> {
        for function in functions {
            check("function", &function.name)?;
            for param in &function.params {
                check("param", &param.name)?;
            }
        }
        let methods = dedupe(functions.iter().map(|f| value_ident(&f.name)).collect());
        let signatures: Vec<String> = functions
            .iter()
            .zip(&methods)
            .map(|(function, method)| self.signature(function, method))
            .collect();

        let rt = self.rt;
        let generic = self.generic.clone();
        let client = format!("{}Client", generic);
        let trait_name = type_ident(name);

        // Implementation trait
        writeln!(self.out)?;
        writeln!(self.out, "/// Implementation of interface `{}`", name)?;
        writeln!(self.out, "#[{}::async_trait]", rt)?;
        writeln!(self.out, "pub trait {}: Send + Sync {{", trait_name)?;
        for (function, signature) in functions.iter().zip(&signatures) {
            doc(&mut self.out, "    ", &function.comment)?;
            writeln!(self.out, "    {};", signature)?;
        }
        writeln!(self.out, "}}")?;

        // Server side adapter
        writeln!(self.out)?;
        writeln!(self.out, "/// Binds a [`{}`] implementation to a server", trait_name)?;
        writeln!(self.out, "pub struct {}Handler<{}>(pub {});", name, generic, generic)?;
        writeln!(self.out)?;
        writeln!(self.out, "#[{}::async_trait]", rt)?;
        writeln!(
            self.out,
            "impl<{g}: {t} + 'static> {rt}::Handler for {n}Handler<{g}> {{",
            g = generic,
            t = trait_name,
            rt = rt,
            n = name
        )?;
        writeln!(self.out, "    fn operations(&self) -> Vec<{}::OperationSignature> {{", rt)?;
        writeln!(self.out, "        vec![")?;
        for function in functions {
            writeln!(self.out, "            {}::OperationSignature::new({:?})", rt, function.name)?;
            for _ in &function.params {
                writeln!(self.out, "                .param({}::Shape::Schema)", rt)?;
            }
            writeln!(self.out, "                .returns({}::Shape::Schema),", rt)?;
        }
        writeln!(self.out, "        ]")?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out)?;
        writeln!(self.out, "    async fn invoke(")?;
        writeln!(self.out, "        &self,")?;
        writeln!(self.out, "        operation: &str,")?;
        writeln!(self.out, "        params: Vec<{}::TypedValue>,", rt)?;
        writeln!(self.out, "    ) -> Result<{rt}::TypedValue, {rt}::RpcError> {{", rt = rt)?;
        writeln!(self.out, "        #[allow(unused_mut)]")?;
        writeln!(self.out, "        let mut params = params.into_iter();")?;
        writeln!(self.out, "        match operation {{")?;
        for (function, method) in functions.iter().zip(&methods) {
            writeln!(self.out, "            {:?} => {{", function.name)?;
            let mut args = Vec::with_capacity(function.params.len());
            for (i, param) in function.params.iter().enumerate() {
                writeln!(
                    self.out,
                    "                let arg{i}: {ty} = {rt}::codec::from_typed(params.next().unwrap_or({rt}::TypedValue::Null))?;",
                    i = i,
                    ty = rust_type(param, false),
                    rt = rt
                )?;
                args.push(format!("arg{}", i));
            }
            writeln!(
                self.out,
                "                let result = self.0.{}({}).await?;",
                method,
                args.join(", ")
            )?;
            writeln!(self.out, "                {}::codec::to_typed(&result)", rt)?;
            writeln!(self.out, "            }}")?;
        }
        writeln!(
            self.out,
            "            _ => Err({}::RpcError::method_not_found(operation)),",
            rt
        )?;
        writeln!(self.out, "        }}")?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out, "}}")?;

        // Client proxy
        writeln!(self.out)?;
        writeln!(self.out, "/// Calls interface `{}` through a client", name)?;
        writeln!(self.out, "pub struct {}Proxy<{}> {{", name, client)?;
        writeln!(self.out, "    inner: {}::Proxy<{}>,", rt, client)?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "impl<{c}: {rt}::Client> {n}Proxy<{c}> {{",
            c = client,
            rt = rt,
            n = name
        )?;
        writeln!(
            self.out,
            "    pub fn new(client: {}) -> Result<Self, {}::SchemaError> {{",
            client, rt
        )?;
        writeln!(self.out, "        Ok(Self::with_idl(client, idl()?))")?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "    pub fn with_idl(client: {}, idl: Arc<{}::Idl>) -> Self {{",
            client, rt
        )?;
        writeln!(self.out, "        Self {{")?;
        writeln!(self.out, "            inner: {}::Proxy::new(client, idl),", rt)?;
        writeln!(self.out, "        }}")?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out)?;
        writeln!(self.out, "    pub fn proxy(&self) -> &{}::Proxy<{}> {{", rt, client)?;
        writeln!(self.out, "        &self.inner")?;
        writeln!(self.out, "    }}")?;
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;
        writeln!(self.out, "#[{}::async_trait]", rt)?;
        writeln!(
            self.out,
            "impl<{c}: {rt}::Client> {t} for {n}Proxy<{c}> {{",
            c = client,
            rt = rt,
            t = trait_name,
            n = name
        )?;
        for (i, (function, signature)) in functions.iter().zip(&signatures).enumerate() {
            if i > 0 {
                writeln!(self.out)?;
            }
            let params = param_idents(function);
            let typed: Vec<String> = params
                .iter()
                .map(|p| format!("{}::codec::to_typed(&{})?", rt, p))
                .collect();
            writeln!(self.out, "    {} {{", signature)?;
            writeln!(self.out, "        let params = vec![{}];", typed.join(", "))?;
            writeln!(
                self.out,
                "        let result = self.inner.call_typed({:?}, params, &{}::Shape::Schema).await?;",
                format!("{}.{}", name, function.name),
                rt
            )?;
            writeln!(self.out, "        {}::codec::from_typed(result)", rt)?;
            writeln!(self.out, "    }}")?;
        }
        writeln!(self.out, "}}")?;
        Ok(())
    }

    fn signature(&self, function: &Function, method: &str) -> String {
        let params: Vec<String> = param_idents(function)
            .into_iter()
            .zip(&function.params)
            .map(|(ident, field)| format!(", {}: {}", ident, rust_type(field, false)))
            .collect();
        format!(
            "async fn {}(&self{}) -> Result<{}, {}::RpcError>",
            method,
            params.concat(),
            rust_type(&function.returns, false),
            self.rt
        )
    }

    fn idl_loader(&mut self) -> Result<(), GenerateError> {
        let json = serde_json::to_string_pretty(self.idl.elements())?;
        let hashes = "#".repeat(raw_string_hashes(&json));

        writeln!(self.out)?;
        writeln!(self.out, "/// The IDL these bindings were generated from")?;
        writeln!(self.out, "pub const IDL_JSON_RAW: &str = r{h}\"{json}\"{h};", h = hashes, json = json)?;
        writeln!(self.out)?;
        writeln!(self.out, "/// Parse [`IDL_JSON_RAW`].")?;
        writeln!(
            self.out,
            "pub fn idl() -> Result<Arc<{rt}::Idl>, {rt}::SchemaError> {{",
            rt = self.rt
        )?;
        writeln!(
            self.out,
            "    {}::Idl::from_json(IDL_JSON_RAW.as_bytes()).map(Arc::new)",
            self.rt
        )?;
        writeln!(self.out, "}}")?;
        Ok(())
    }

    fn server(&mut self) -> Result<(), GenerateError> {
        let rt = self.rt;
        let interfaces: Vec<&str> = self.idl.interfaces().map(|(name, _)| name).collect();
        let args = dedupe(
            interfaces
                .iter()
                .map(|name| format!("{}_handler", heck::ToSnakeCase::to_snake_case(*name)))
                .collect(),
        );

        let generics: Vec<String> = interfaces
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{}{}: {} + 'static", self.generic, i, type_ident(name)))
            .collect();
        let params: Vec<String> = args
            .iter()
            .enumerate()
            .map(|(i, arg)| format!("{}: {}{}", arg, self.generic, i))
            .collect();
        let generics = if generics.is_empty() {
            String::new()
        } else {
            format!("<{}>", generics.join(", "))
        };

        writeln!(self.out)?;
        writeln!(self.out, "/// Build a server with one implementation bound to each interface.")?;
        writeln!(
            self.out,
            "pub fn new_server{}({}) -> Result<{rt}::Server, {rt}::SchemaError> {{",
            generics,
            params.join(", "),
            rt = rt
        )?;
        let forwarded: Vec<String> = std::iter::once(format!("{}::ServerConfig::default()", rt))
            .chain(args.iter().cloned())
            .collect();
        writeln!(self.out, "    new_server_with_config({})", forwarded.join(", "))?;
        writeln!(self.out, "}}")?;

        let config_params: Vec<String> = std::iter::once(format!("config: {}::ServerConfig", rt))
            .chain(params.iter().cloned())
            .collect();
        writeln!(self.out)?;
        writeln!(self.out, "/// Like [`new_server`], with explicit serializer and dispatch options.")?;
        writeln!(
            self.out,
            "pub fn new_server_with_config{}({}) -> Result<{rt}::Server, {rt}::SchemaError> {{",
            generics,
            config_params.join(", "),
            rt = rt
        )?;
        writeln!(self.out, "    #[allow(unused_mut)]")?;
        writeln!(self.out, "    let mut server = {}::Server::with_config(idl()?, config);", rt)?;
        for (name, arg) in interfaces.iter().zip(&args) {
            writeln!(
                self.out,
                "    server.add_handler({:?}, {}Handler({}));",
                name, name, arg
            )?;
        }
        writeln!(self.out, "    Ok(server)")?;
        writeln!(self.out, "}}")?;
        Ok(())
    }
}

fn param_idents(function: &Function) -> Vec<String> {
    dedupe(function.params.iter().map(|p| value_ident(&p.name)).collect())
}

/// The Rust type for a field. `boxed` wraps a struct member that would
/// otherwise make its container infinitely sized.
fn rust_type(field: &Field, boxed: bool) -> String {
    let base = match field.type_name.as_str() {
        "string" => "String".to_string(),
        "int" => "i64".to_string(),
        "float" => "f64".to_string(),
        "bool" => "bool".to_string(),
        other => escape(other),
    };
    let base = if field.is_array {
        format!("Vec<{}>", base)
    } else if boxed {
        format!("Box<{}>", base)
    } else {
        base
    };
    if field.optional {
        format!("Option<{}>", base)
    } else {
        base
    }
}

fn doc(out: &mut String, indent: &str, comment: &str) -> Result<(), GenerateError> {
    for line in comment.lines() {
        writeln!(out, "{}/// {}", indent, line.trim_end())?;
    }
    Ok(())
}

/// Number of `#` needed to wrap `text` in a raw string literal
fn raw_string_hashes(text: &str) -> usize {
    let mut longest = 0;
    let mut run = None;
    for c in text.chars() {
        run = match (c, run) {
            ('"', _) => Some(0),
            ('#', Some(n)) => {
                longest = longest.max(n + 1);
                Some(n + 1)
            }
            _ => None,
        };
    }
    longest + 1
}
