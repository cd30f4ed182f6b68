//! Rust emitter: renders generated models and the client surface into one
//! self-contained source file.
//!
//! The output only needs `serde` (with `derive`) and `serde_json` in the
//! consuming crate. It has no inner attributes so it can be pulled in with
//! `include!`.

mod client;
mod models;
mod runtime;

use std::collections::{BTreeMap, HashMap, HashSet};

use heck::{ToSnakeCase, ToUpperCamelCase};
use indexmap::IndexMap;
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use syn::Item;
use tracing::debug;

use crate::client::ClientSurface;
use crate::error::Result;
use crate::mapper::{PrimitiveKind, ResolvedType};
use crate::models::GeneratedModel;

/// Items the runtime always defines; models must not shadow them.
const RUNTIME_NAMES: &[&str] = &[
    "Transport",
    "TransportError",
    "ClientError",
    "RenderValue",
    "ToParam",
    "Result",
    "Option",
    "Vec",
    "String",
    "Box",
    "T",
];

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "try",
    "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Renders `models` and `client` as formatted Rust source.
///
/// `header` is written as line comments above the code.
pub fn emit_source(
    models: &[GeneratedModel],
    client: &ClientSurface,
    header: Option<&str>,
) -> Result<String> {
    let names = Names::new(models, client);
    let mut state = EmitState::default();

    for item in runtime::items()? {
        state.add_runtime(item);
    }
    for model in models {
        let ident = names.type_ident(&model.name);
        for item in models::items(model, &names)? {
            state.add_object(&ident, item)?;
        }
    }
    for item in client::items(client, &names)? {
        state.add_client(item);
    }

    let file = syn::File {
        attrs: vec![],
        items: state.into_items(),
        shebang: None,
    };
    let mut source = String::new();
    if let Some(header) = header {
        for line in header.lines() {
            source.push_str("// ");
            source.push_str(line);
            source.push('\n');
        }
        source.push('\n');
    }
    source.push_str(&prettyplease::unparse(&file));
    debug!(
        models = models.len(),
        operations = client.operations.len(),
        bytes = source.len(),
        "emitted rust source"
    );
    Ok(source)
}

/// Like [`emit_source`], keyed by output file name.
pub fn emit_files(
    file_name: &str,
    models: &[GeneratedModel],
    client: &ClientSurface,
    header: Option<&str>,
) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    files.insert(file_name.to_owned(), emit_source(models, client, header)?);
    Ok(files)
}

#[derive(Default)]
struct EmitState {
    runtime: Vec<Item>,
    objects: IndexMap<String, Vec<Item>>,
    client: Vec<Item>,
}

impl EmitState {
    fn add_runtime(&mut self, item: Item) {
        self.runtime.push(item);
    }

    fn add_object(&mut self, ident: &Ident, item: Item) -> Result<()> {
        let name = ident.to_string();
        let is_struct = matches!(item, Item::Struct(_));
        let items = self.objects.entry(name.clone()).or_default();
        if is_struct && items.iter().any(|item| matches!(item, Item::Struct(_))) {
            return Err(
                syn::Error::new(ident.span(), format!("type `{}` is emitted twice", name)).into(),
            );
        }
        items.push(item);
        Ok(())
    }

    fn add_client(&mut self, item: Item) {
        self.client.push(item);
    }

    fn into_items(self) -> Vec<Item> {
        let mut items = self.runtime;
        items.extend(self.objects.into_values().flatten());
        items.extend(self.client);
        items
    }
}

/// Rust identifiers for everything the document names.
pub(crate) struct Names {
    types: HashMap<String, String>,
    client: String,
}

impl Names {
    fn new(models: &[GeneratedModel], client: &ClientSurface) -> Self {
        let client_name = sanitize(&client.name.to_upper_camel_case(), "Client");
        let mut taken: HashSet<String> =
            RUNTIME_NAMES.iter().map(|name| name.to_string()).collect();
        taken.insert(client_name.clone());
        let mut types = HashMap::new();
        for model in models {
            let base = sanitize(&model.name.to_upper_camel_case(), "Model");
            let name = unique(&base, "Model", &mut taken);
            types.insert(model.name.clone(), name);
        }
        Names {
            types,
            client: client_name,
        }
    }

    pub(crate) fn type_ident(&self, model: &str) -> Ident {
        match self.types.get(model) {
            Some(name) => ident(name),
            None => ident(&sanitize(&model.to_upper_camel_case(), "Model")),
        }
    }

    pub(crate) fn client_ident(&self) -> Ident {
        ident(&self.client)
    }

    /// The Rust type for a resolved type. With `boxed`, a direct model
    /// reference (possibly nullable) goes behind a `Box`.
    pub(crate) fn rust_type(&self, ty: &ResolvedType, boxed: bool) -> TokenStream {
        match ty {
            ResolvedType::Primitive(kind) => primitive_type(*kind),
            ResolvedType::ArrayOf(inner) => {
                let inner = self.rust_type(inner, false);
                quote!(Vec<#inner>)
            }
            ResolvedType::MapOf(inner) => {
                let inner = self.rust_type(inner, false);
                quote!(std::collections::BTreeMap<String, #inner>)
            }
            ResolvedType::Nullable(inner) => {
                let inner = self.rust_type(inner, boxed);
                quote!(Option<#inner>)
            }
            ResolvedType::ModelReference(name) => {
                let ident = self.type_ident(name);
                if boxed {
                    quote!(Box<#ident>)
                } else {
                    quote!(#ident)
                }
            }
        }
    }
}

fn primitive_type(kind: PrimitiveKind) -> TokenStream {
    match kind {
        PrimitiveKind::String | PrimitiveKind::DateTime => quote!(String),
        PrimitiveKind::Int64 => quote!(i64),
        PrimitiveKind::Float64 => quote!(f64),
        PrimitiveKind::Bool => quote!(bool),
        PrimitiveKind::Json => quote!(serde_json::Value),
    }
}

/// Keeps ASCII letters, digits and `_`; fixes up leading digits and keywords.
fn sanitize(name: &str, fallback: &str) -> String {
    let mut clean: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if clean.is_empty() || clean.chars().all(|c| c == '_') {
        return fallback.to_owned();
    }
    if clean.starts_with(|c: char| c.is_ascii_digit()) {
        clean.insert_str(0, fallback);
    }
    if KEYWORDS.contains(&clean.as_str()) {
        clean.push('_');
    }
    clean
}

fn unique(base: &str, suffix: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_owned();
    let mut counter = 1;
    while taken.contains(&name) {
        name = if counter == 1 {
            format!("{}{}", base, suffix)
        } else {
            format!("{}{}{}", base, suffix, counter)
        };
        counter += 1;
    }
    taken.insert(name.clone());
    name
}

/// Snake-case identifiers for a list of names, unique within the list and
/// distinct from `reserved`.
pub(crate) fn snake_idents<'a>(
    names: impl IntoIterator<Item = &'a str>,
    reserved: &[&str],
) -> Vec<Ident> {
    let mut taken: HashSet<String> = reserved.iter().map(|name| name.to_string()).collect();
    names
        .into_iter()
        .map(|name| {
            let snake = name.to_snake_case();
            let base = if snake.starts_with(|c: char| c.is_ascii_digit()) {
                sanitize(&format!("_{}", snake), "field")
            } else {
                sanitize(&snake, "field")
            };
            ident(&unique(&base, "_", &mut taken))
        })
        .collect()
}

fn ident(name: &str) -> Ident {
    format_ident!("{}", name)
}

/// Doc lines for `text`, wrapped at 80 columns, each with the leading
/// space rustdoc expects.
pub(crate) fn doc_lines(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(line, 80)
                    .into_iter()
                    .map(|wrapped| format!(" {}", wrapped))
                    .collect()
            }
        })
        .collect()
}
