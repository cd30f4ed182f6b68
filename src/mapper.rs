//! Type mapper: schema type references to target-neutral resolved types.

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{GenError, Result};
use crate::schema::{SchemaDocument, SchemaOperation, SchemaProperty, TypeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Int64,
    Float64,
    Bool,
    /// `string` with a `date` or `date-time` format.
    DateTime,
    /// Free-form JSON.
    Json,
}

impl PrimitiveKind {
    fn from_schema(name: &str, format: Option<&str>) -> Option<Self> {
        let kind = match (name, format) {
            ("string", Some("date-time" | "date")) => PrimitiveKind::DateTime,
            ("string", _) => PrimitiveKind::String,
            ("integer", _) => PrimitiveKind::Int64,
            ("number", _) => PrimitiveKind::Float64,
            ("boolean", _) => PrimitiveKind::Bool,
            ("object", _) => PrimitiveKind::Json,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    Primitive(PrimitiveKind),
    ArrayOf(Box<ResolvedType>),
    /// String-keyed map.
    MapOf(Box<ResolvedType>),
    Nullable(Box<ResolvedType>),
    /// Always names a model in the [`ResolvedTypeTable`].
    ModelReference(String),
}

impl ResolvedType {
    /// Wraps in `Nullable` unless already nullable.
    pub fn nullable(self) -> Self {
        match self {
            nullable @ ResolvedType::Nullable(_) => nullable,
            other => ResolvedType::Nullable(Box::new(other)),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, ResolvedType::Nullable(_))
    }

    /// The type with an outer `Nullable` removed.
    pub fn non_null(&self) -> &ResolvedType {
        match self {
            ResolvedType::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Model named directly (possibly behind `Nullable`), not through a
    /// collection.
    pub fn direct_model(&self) -> Option<&str> {
        match self.non_null() {
            ResolvedType::ModelReference(name) => Some(name),
            _ => None,
        }
    }

    /// Appends every model this type mentions, skipping ones already listed.
    pub fn collect_models(&self, into: &mut Vec<String>) {
        match self {
            ResolvedType::Primitive(_) => {}
            ResolvedType::ArrayOf(inner)
            | ResolvedType::MapOf(inner)
            | ResolvedType::Nullable(inner) => inner.collect_models(into),
            ResolvedType::ModelReference(name) => {
                if !into.contains(name) {
                    into.push(name.clone());
                }
            }
        }
    }

    /// True for primitives and (nullable) arrays of primitives, the shapes
    /// that fit in a path, query string or header.
    pub fn is_scalar_like(&self) -> bool {
        match self.non_null() {
            ResolvedType::Primitive(PrimitiveKind::Json) => false,
            ResolvedType::Primitive(_) => true,
            ResolvedType::ArrayOf(inner) => matches!(
                inner.non_null(),
                ResolvedType::Primitive(kind) if *kind != PrimitiveKind::Json
            ),
            _ => false,
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Primitive(kind) => write!(f, "{:?}", kind),
            ResolvedType::ArrayOf(inner) => write!(f, "ArrayOf({})", inner),
            ResolvedType::MapOf(inner) => write!(f, "MapOf({})", inner),
            ResolvedType::Nullable(inner) => write!(f, "Nullable({})", inner),
            ResolvedType::ModelReference(name) => write!(f, "ModelReference({})", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub name: String,
    pub ty: ResolvedType,
    pub required: bool,
    pub description: Option<String>,
    /// Values allowed by an `enum`, in declaration order.
    pub allowed_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub name: String,
    pub description: Option<String>,
    /// Inherited fields first, then the definition's own.
    pub fields: Vec<ResolvedField>,
    /// Models mentioned by any field, first use first.
    pub dependencies: Vec<String>,
}

/// Why a single type reference failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MapError {
    Unresolved(String),
    UnknownPrimitive(String),
    AliasCycle(String),
}

impl MapError {
    pub(crate) fn at(self, location: impl Into<String>) -> GenError {
        match self {
            MapError::Unresolved(name) => GenError::unresolved(name, location),
            MapError::UnknownPrimitive(name) => {
                GenError::parse(location, format!("unknown primitive type `{}`", name))
            }
            MapError::AliasCycle(name) => {
                GenError::parse(location, format!("alias `{}` refers to itself", name))
            }
        }
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Unresolved(name) => write!(f, "unresolved reference `{}`", name),
            MapError::UnknownPrimitive(name) => write!(f, "unknown primitive type `{}`", name),
            MapError::AliasCycle(name) => write!(f, "alias `{}` refers to itself", name),
        }
    }
}

/// Output of [`resolve`]: every definition as a [`ResolvedModel`], in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTypeTable {
    models: IndexMap<String, ResolvedModel>,
    aliases: IndexMap<String, ResolvedType>,
}

impl ResolvedTypeTable {
    pub fn models(&self) -> impl Iterator<Item = &ResolvedModel> {
        self.models.values()
    }

    pub fn model(&self, name: &str) -> Option<&ResolvedModel> {
        self.models.get(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.models.get_index_of(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Resolves a type reference against the finished table. Aliases are
    /// substituted; the result is not wrapped in `Nullable`.
    pub(crate) fn map(&self, type_ref: &TypeRef) -> std::result::Result<ResolvedType, MapError> {
        map_type(type_ref, &mut |name| {
            if self.models.contains_key(name) {
                Ok(ResolvedType::ModelReference(name.to_owned()))
            } else {
                self.aliases
                    .get(name)
                    .cloned()
                    .ok_or_else(|| MapError::Unresolved(name.to_owned()))
            }
        })
    }

    /// Operations may only fail on shapes the synthesizer rejects; a
    /// dangling reference is fatal.
    fn check_operation(&self, operation: &SchemaOperation) -> Result<()> {
        let type_refs = operation
            .parameters
            .iter()
            .map(|parameter| (format!("parameter `{}`", parameter.name), &parameter.type_ref))
            .chain(
                operation
                    .response
                    .iter()
                    .map(|response| ("response".to_owned(), &response.type_ref)),
            );
        for (what, type_ref) in type_refs {
            if let Err(MapError::Unresolved(name)) = self.map(type_ref) {
                return Err(GenError::unresolved(
                    name,
                    format!("{} {}", operation.label(), what),
                ));
            }
        }
        Ok(())
    }
}

fn map_type(
    type_ref: &TypeRef,
    reference: &mut dyn FnMut(&str) -> std::result::Result<ResolvedType, MapError>,
) -> std::result::Result<ResolvedType, MapError> {
    let resolved = match type_ref {
        TypeRef::Primitive { name, format, .. } => {
            let kind = PrimitiveKind::from_schema(name, format.as_deref())
                .ok_or_else(|| MapError::UnknownPrimitive(name.clone()))?;
            ResolvedType::Primitive(kind)
        }
        TypeRef::Array(items) => ResolvedType::ArrayOf(Box::new(map_type(items, reference)?)),
        TypeRef::Map(values) => ResolvedType::MapOf(Box::new(map_type(values, reference)?)),
        TypeRef::Reference(name) => reference(name)?,
        TypeRef::Any => ResolvedType::Primitive(PrimitiveKind::Json),
    };
    Ok(resolved)
}

fn allowed_values(type_ref: &TypeRef) -> Vec<String> {
    match type_ref {
        TypeRef::Primitive { enum_values, .. } => enum_values.clone(),
        TypeRef::Array(items) => allowed_values(items),
        _ => vec![],
    }
}

/// Builds the resolved type table for `document`.
///
/// Every reference in definitions, aliases and operations must name a
/// definition or alias; the first one that does not aborts with
/// [`GenError::UnresolvedReference`] and nothing is returned.
pub fn resolve(document: &SchemaDocument) -> Result<ResolvedTypeTable> {
    let mut resolver = Resolver {
        document,
        aliases: IndexMap::new(),
        resolving: HashSet::new(),
        flattened: HashMap::new(),
        inheriting: HashSet::new(),
    };

    for name in document.aliases.keys() {
        resolver
            .alias(name)
            .map_err(|err| err.at(format!("definitions.{}", name)))?;
    }

    let mut models = IndexMap::new();
    for (name, definition) in &document.definitions {
        let properties = resolver.flatten(name)?;
        let mut fields = Vec::with_capacity(properties.len());
        let mut dependencies = vec![];
        for property in properties {
            let location = format!("definitions.{}.properties.{}", name, property.name);
            let ty = resolver
                .map(&property.type_ref)
                .map_err(|err| err.at(location))?;
            let ty = if property.required && !property.nullable {
                ty
            } else {
                ty.nullable()
            };
            ty.collect_models(&mut dependencies);
            fields.push(ResolvedField {
                allowed_values: allowed_values(&property.type_ref),
                name: property.name,
                ty,
                required: property.required,
                description: property.description,
            });
        }
        debug!(model = %name, fields = fields.len(), "resolved definition");
        models.insert(
            name.clone(),
            ResolvedModel {
                name: name.clone(),
                description: definition.description.clone(),
                fields,
                dependencies,
            },
        );
    }

    let table = ResolvedTypeTable {
        models,
        aliases: resolver.aliases,
    };
    for operation in &document.operations {
        table.check_operation(operation)?;
    }
    info!(
        models = table.models.len(),
        aliases = table.aliases.len(),
        "resolved type table"
    );
    Ok(table)
}

struct Resolver<'d> {
    document: &'d SchemaDocument,
    aliases: IndexMap<String, ResolvedType>,
    /// Aliases currently being resolved.
    resolving: HashSet<String>,
    flattened: HashMap<String, Vec<SchemaProperty>>,
    /// Definitions whose inheritance chain is being flattened.
    inheriting: HashSet<String>,
}

impl Resolver<'_> {
    fn map(&mut self, type_ref: &TypeRef) -> std::result::Result<ResolvedType, MapError> {
        map_type(type_ref, &mut |name| self.reference(name))
    }

    fn reference(&mut self, name: &str) -> std::result::Result<ResolvedType, MapError> {
        // Model references stop here, which is what makes self-referential
        // and mutually recursive definitions terminate.
        if self.document.definitions.contains_key(name) {
            return Ok(ResolvedType::ModelReference(name.to_owned()));
        }
        self.alias(name)
    }

    fn alias(&mut self, name: &str) -> std::result::Result<ResolvedType, MapError> {
        if let Some(resolved) = self.aliases.get(name) {
            return Ok(resolved.clone());
        }
        let document = self.document;
        let Some(type_ref) = document.aliases.get(name) else {
            return Err(MapError::Unresolved(name.to_owned()));
        };
        if !self.resolving.insert(name.to_owned()) {
            return Err(MapError::AliasCycle(name.to_owned()));
        }
        let resolved = self.map(type_ref);
        self.resolving.remove(name);
        let resolved = resolved?;
        self.aliases.insert(name.to_owned(), resolved.clone());
        Ok(resolved)
    }

    /// Properties of `name` including everything inherited through `allOf`.
    /// A redeclared property keeps the inherited position but takes the new
    /// declaration.
    fn flatten(&mut self, name: &str) -> Result<Vec<SchemaProperty>> {
        if let Some(properties) = self.flattened.get(name) {
            return Ok(properties.clone());
        }
        let document = self.document;
        let location = format!("definitions.{}", name);
        let Some(definition) = document.definitions.get(name) else {
            return Err(GenError::unresolved(name, location));
        };
        if !self.inheriting.insert(name.to_owned()) {
            return Err(GenError::parse(
                location,
                format!("inheritance cycle through `{}`", name),
            ));
        }

        let mut properties: Vec<SchemaProperty> = vec![];
        let mut merge = |property: SchemaProperty| {
            match properties.iter_mut().find(|seen| seen.name == property.name) {
                Some(seen) => *seen = property,
                None => properties.push(property),
            }
        };
        for base in &definition.bases {
            if !document.definitions.contains_key(base) {
                self.inheriting.remove(name);
                if document.aliases.contains_key(base) {
                    return Err(GenError::parse(
                        format!("{}.allOf", location),
                        format!("`{}` is not an object definition", base),
                    ));
                }
                return Err(GenError::unresolved(base, format!("{}.allOf", location)));
            }
            let inherited = match self.flatten(base) {
                Ok(inherited) => inherited,
                Err(err) => {
                    self.inheriting.remove(name);
                    return Err(err);
                }
            };
            inherited.into_iter().for_each(&mut merge);
        }
        definition.properties.iter().cloned().for_each(&mut merge);

        self.inheriting.remove(name);
        self.flattened.insert(name.to_owned(), properties.clone());
        Ok(properties)
    }
}
