//! In-memory schema graph produced by the loader.
//!
//! Types here still speak the document's vocabulary: primitive names are the
//! raw `type`/`format` strings and references are definition names. Turning
//! them into target types is the mapper's job.

use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDocument {
    /// Definitions keyed by name, in declaration order. Hoisted inline
    /// objects follow the declared ones.
    pub definitions: IndexMap<String, SchemaDefinition>,
    /// Named non-object schemas (`Status: {type: string, enum: [...]}`); a
    /// reference to one of these stands for the aliased type.
    pub aliases: IndexMap<String, TypeRef>,
    /// One entry per (path, verb) pair, path order then verb order.
    pub operations: Vec<SchemaOperation>,
    /// Base endpoint declared by the document, if any.
    pub base_endpoint: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDefinition {
    pub name: String,
    pub description: Option<String>,
    /// Definitions this one extends through `allOf`, in declaration order.
    pub bases: Vec<String>,
    pub properties: Vec<SchemaProperty>,
}

impl SchemaDefinition {
    pub fn property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.iter().find(|property| property.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaProperty {
    pub name: String,
    pub type_ref: TypeRef,
    pub required: bool,
    /// `x-nullable` / `nullable` marker.
    pub nullable: bool,
    pub description: Option<String>,
}

/// A type reference as written in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive {
        name: String,
        format: Option<String>,
        enum_values: Vec<String>,
    },
    Array(Box<TypeRef>),
    /// String-keyed map from `additionalProperties`.
    Map(Box<TypeRef>),
    /// Name of a definition in [`SchemaDocument::definitions`].
    Reference(String),
    /// Free-form value (`oneOf`, `anyOf`, untyped or property-less objects).
    Any,
}

impl TypeRef {
    pub fn primitive(name: impl Into<String>) -> Self {
        TypeRef::Primitive {
            name: name.into(),
            format: None,
            enum_values: vec![],
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        TypeRef::Reference(name.into())
    }

    pub fn array_of(items: TypeRef) -> Self {
        TypeRef::Array(Box::new(items))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpVerb {
    pub fn from_key(key: &str) -> Option<Self> {
        let verb = match key.to_ascii_lowercase().as_str() {
            "get" => HttpVerb::Get,
            "put" => HttpVerb::Put,
            "post" => HttpVerb::Post,
            "delete" => HttpVerb::Delete,
            "options" => HttpVerb::Options,
            "head" => HttpVerb::Head,
            "patch" => HttpVerb::Patch,
            "trace" => HttpVerb::Trace,
            _ => return None,
        };
        Some(verb)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Put => "PUT",
            HttpVerb::Post => "POST",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Head => "HEAD",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
    Cookie,
}

impl ParameterLocation {
    pub fn from_key(key: &str) -> Option<Self> {
        let location = match key {
            "path" => ParameterLocation::Path,
            "query" => ParameterLocation::Query,
            "header" => ParameterLocation::Header,
            "body" => ParameterLocation::Body,
            "formData" => ParameterLocation::FormData,
            "cookie" => ParameterLocation::Cookie,
            _ => return None,
        };
        Some(location)
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Body => "body",
            ParameterLocation::FormData => "formData",
            ParameterLocation::Cookie => "cookie",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaParameter {
    pub name: String,
    pub location: ParameterLocation,
    pub type_ref: TypeRef,
    pub required: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaResponse {
    pub type_ref: TypeRef,
    /// Set when a successful call may come back without content.
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaOperation {
    pub verb: HttpVerb,
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub parameters: Vec<SchemaParameter>,
    /// Media types the request body may be sent as.
    pub request_media: Vec<String>,
    pub response: Option<SchemaResponse>,
    /// Media types of the selected response.
    pub response_media: Vec<String>,
}

impl SchemaOperation {
    pub fn new(verb: HttpVerb, path: impl Into<String>) -> Self {
        SchemaOperation {
            verb,
            path: path.into(),
            operation_id: None,
            summary: None,
            description: None,
            deprecated: false,
            parameters: vec![],
            request_media: vec![],
            response: None,
            response_media: vec![],
        }
    }

    /// Label used in diagnostics, e.g. `POST /pet (addPet)`.
    pub fn label(&self) -> String {
        match &self.operation_id {
            Some(id) => format!("{} {} ({})", self.verb, self.path, id),
            None => format!("{} {}", self.verb, self.path),
        }
    }
}
