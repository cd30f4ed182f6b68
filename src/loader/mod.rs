//! Schema loader: Swagger 2.0 / OpenAPI 3.x text in, [`SchemaDocument`] out.

mod openapi3;
mod swagger2;

use std::collections::HashSet;
use std::path::Path;

use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{GenError, Result};
use crate::schema::{SchemaDefinition, SchemaDocument, SchemaParameter, TypeRef};

/// Parses a schema document from JSON or YAML text.
pub fn load(document_text: &str) -> Result<SchemaDocument> {
    let raw = parse_value(document_text)?;
    let document = match Dialect::detect(&raw)? {
        Dialect::Swagger2 => swagger2::convert(raw)?,
        Dialect::OpenApi3 => openapi3::convert(raw)?,
    };
    debug!(
        definitions = document.definitions.len(),
        aliases = document.aliases.len(),
        operations = document.operations.len(),
        "loaded schema document"
    );
    Ok(document)
}

/// Reads and parses the schema document at `path`.
pub fn load_file(path: impl AsRef<Path>) -> Result<SchemaDocument> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| GenError::Io {
        path: path.to_owned(),
        source,
    })?;
    load(&content)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Swagger2,
    OpenApi3,
}

impl Dialect {
    fn detect(raw: &Value) -> Result<Self> {
        let version = |key: &str| {
            raw.get(key).and_then(|value| match value {
                Value::String(version) => Some(version.clone()),
                Value::Number(version) => Some(version.to_string()),
                _ => None,
            })
        };
        if let Some(version) = version("swagger") {
            if version.starts_with('2') {
                return Ok(Dialect::Swagger2);
            }
            return Err(GenError::parse(
                "swagger",
                format!("unsupported Swagger version `{}`", version),
            ));
        }
        if let Some(version) = version("openapi") {
            if version.starts_with("3.") {
                return Ok(Dialect::OpenApi3);
            }
            return Err(GenError::parse(
                "openapi",
                format!("unsupported OpenAPI version `{}`", version),
            ));
        }
        Err(GenError::parse(
            "document root",
            "neither a `swagger` nor an `openapi` version field is present",
        ))
    }
}

fn parse_value(text: &str) -> Result<Value> {
    let value = if text.trim_start().starts_with('{') {
        serde_json::from_str::<Value>(text).map_err(|err| {
            GenError::parse(
                format!("line {}, column {}", err.line(), err.column()),
                err.to_string(),
            )
        })?
    } else {
        serde_yaml::from_str::<Value>(text).map_err(|err| {
            let location = err
                .location()
                .map(|at| format!("line {}, column {}", at.line(), at.column()))
                .unwrap_or_else(|| "document root".to_owned());
            GenError::parse(location, err.to_string())
        })?
    };
    if !value.is_mapping() {
        return Err(GenError::parse("document root", "expected a mapping"));
    }
    Ok(stringify_keys(value))
}

/// YAML reads `200:` as a number; every consumer wants string keys.
fn stringify_keys(value: Value) -> Value {
    match value {
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::Number(number) => Value::String(number.to_string()),
                        Value::Bool(flag) => Value::String(flag.to_string()),
                        key => key,
                    };
                    (key, stringify_keys(value))
                })
                .collect::<Mapping>(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(stringify_keys).collect()),
        Value::Tagged(tagged) => stringify_keys(tagged.value),
        value => value,
    }
}

pub(crate) fn from_value<T: serde::de::DeserializeOwned>(
    value: Value,
    location: &str,
) -> Result<T> {
    serde_yaml::from_value(value).map_err(|err| GenError::parse(location, err.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefKind {
    Schema,
    Parameter,
    Response,
    RequestBody,
}

impl RefKind {
    fn prefixes(self) -> &'static [&'static str] {
        match self {
            RefKind::Schema => &["#/definitions/", "#/components/schemas/"],
            RefKind::Parameter => &["#/parameters/", "#/components/parameters/"],
            RefKind::Response => &["#/responses/", "#/components/responses/"],
            RefKind::RequestBody => &["#/components/requestBodies/"],
        }
    }
}

/// Extracts the target name from a local `$ref`. Remote and nested pointers
/// are rejected.
pub(crate) fn parse_ref(reference: &str, kind: RefKind, location: &str) -> Result<String> {
    let name = kind
        .prefixes()
        .iter()
        .find_map(|prefix| reference.strip_prefix(prefix));
    match name {
        Some(name) if !name.is_empty() && !name.contains('/') => {
            Ok(name.replace("~1", "/").replace("~0", "~"))
        }
        _ => Err(GenError::parse(
            location,
            format!("unrecognized $ref `{}`", reference),
        )),
    }
}

pub(crate) fn is_json_media(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "*/*" || essence == "application/*" || essence.ends_with("json")
}

/// Folds operation-level parameters over path-level ones. A parameter with
/// the same name and location replaces the inherited one in place.
pub(crate) fn merge_parameters(
    inherited: Vec<SchemaParameter>,
    own: Vec<SchemaParameter>,
) -> Vec<SchemaParameter> {
    let mut merged = inherited;
    for parameter in own {
        match merged
            .iter_mut()
            .find(|seen| seen.name == parameter.name && seen.location == parameter.location)
        {
            Some(seen) => *seen = parameter,
            None => merged.push(parameter),
        }
    }
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseKind {
    Success,
    Default,
    Other,
}

impl ResponseKind {
    pub(crate) fn from_key(key: &str) -> Self {
        if key == "default" {
            ResponseKind::Default
        } else if key.starts_with('2') {
            ResponseKind::Success
        } else {
            ResponseKind::Other
        }
    }
}

/// Picks the response a generated method returns. Input is one
/// `(kind, has_schema)` pair per declared response; output is the index of the
/// chosen one and whether the call may succeed without content.
pub(crate) fn select_response(responses: &[(ResponseKind, bool)]) -> Option<(usize, bool)> {
    let successes = || {
        responses
            .iter()
            .enumerate()
            .filter(|(_, (kind, _))| *kind == ResponseKind::Success)
    };
    if let Some((index, _)) = successes().find(|(_, (_, has_schema))| *has_schema) {
        let optional = successes().any(|(_, (_, has_schema))| !has_schema);
        return Some((index, optional));
    }
    if successes().next().is_some() {
        return None;
    }
    responses
        .iter()
        .position(|(kind, has_schema)| *kind == ResponseKind::Default && *has_schema)
        .map(|index| (index, true))
}

/// Collects definitions while converting, handing out unique names for
/// hoisted inline objects.
pub(crate) struct DefinitionSink {
    declared: IndexMap<String, SchemaDefinition>,
    hoisted: IndexMap<String, SchemaDefinition>,
    aliases: IndexMap<String, TypeRef>,
    taken: HashSet<String>,
}

impl DefinitionSink {
    pub(crate) fn new<'a>(declared_names: impl IntoIterator<Item = &'a String>) -> Self {
        DefinitionSink {
            declared: IndexMap::new(),
            hoisted: IndexMap::new(),
            aliases: IndexMap::new(),
            taken: declared_names.into_iter().cloned().collect(),
        }
    }

    /// Reserves a fresh definition name derived from `base`.
    pub(crate) fn claim(&mut self, base: &str) -> String {
        let mut base = base.to_upper_camel_case();
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
            base.insert_str(0, "Inline");
        }
        let mut name = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&name) {
            name = format!("{}{}", base, suffix);
            suffix += 1;
        }
        self.taken.insert(name.clone());
        name
    }

    pub(crate) fn declare(&mut self, definition: SchemaDefinition) {
        self.declared.insert(definition.name.clone(), definition);
    }

    pub(crate) fn alias(&mut self, name: &str, type_ref: TypeRef) {
        self.aliases.insert(name.to_owned(), type_ref);
    }

    pub(crate) fn hoist(&mut self, definition: SchemaDefinition) -> TypeRef {
        let type_ref = TypeRef::reference(definition.name.clone());
        debug!(name = %definition.name, "hoisted inline object schema");
        self.hoisted.insert(definition.name.clone(), definition);
        type_ref
    }

    pub(crate) fn finish(
        self,
    ) -> (
        IndexMap<String, SchemaDefinition>,
        IndexMap<String, TypeRef>,
    ) {
        let mut definitions = self.declared;
        definitions.extend(self.hoisted);
        (definitions, self.aliases)
    }
}

/// Turns `enum` entries into their textual form.
pub(crate) fn enum_strings(values: &[serde_json::Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|value| match value {
            serde_json::Value::String(text) => Some(text.clone()),
            serde_json::Value::Number(number) => Some(number.to_string()),
            serde_json::Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{HttpVerb, ParameterLocation};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ref_forms() {
        assert_eq!(
            parse_ref("#/definitions/Pet", RefKind::Schema, "here").unwrap(),
            "Pet"
        );
        assert_eq!(
            parse_ref("#/components/schemas/a~1b~0c", RefKind::Schema, "here").unwrap(),
            "a/b~c"
        );
        assert_eq!(
            parse_ref("#/parameters/limit", RefKind::Parameter, "here").unwrap(),
            "limit"
        );
    }

    #[test]
    fn test_parse_ref_rejects_unknown_syntax() {
        for reference in [
            "other.yaml#/definitions/Pet",
            "#/definitions/",
            "#/definitions/Pet/properties/id",
            "#/parameters/Pet",
        ] {
            let err = parse_ref(reference, RefKind::Schema, "definitions.Owner").unwrap_err();
            match err {
                GenError::Parse { location, reason } => {
                    assert_eq!(location, "definitions.Owner");
                    assert!(reason.contains(reference));
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_select_response() {
        use ResponseKind::*;
        assert_eq!(select_response(&[(Success, true), (Other, true)]), Some((0, false)));
        assert_eq!(select_response(&[(Success, false), (Success, true)]), Some((1, true)));
        assert_eq!(select_response(&[(Other, true), (Default, true)]), Some((1, true)));
        assert_eq!(select_response(&[(Success, false), (Default, true)]), None);
        assert_eq!(select_response(&[(Other, false)]), None);
    }

    #[test]
    fn test_json_media() {
        assert!(is_json_media("application/json"));
        assert!(is_json_media("application/json; charset=utf-8"));
        assert!(is_json_media("application/vnd.api+json"));
        assert!(is_json_media("*/*"));
        assert!(!is_json_media("multipart/form-data"));
        assert!(!is_json_media("application/xml"));
    }

    #[test]
    fn test_claim_avoids_declared_names() {
        let declared = vec!["PetTags".to_string()];
        let mut sink = DefinitionSink::new(&declared);
        assert_eq!(sink.claim("Pet_tags"), "PetTags2");
        assert_eq!(sink.claim("PetTags"), "PetTags3");
        assert_eq!(sink.claim("200"), "Inline200");
    }

    #[test]
    fn test_merge_parameters_replaces_in_place() {
        let param = |name: &str, location, required| SchemaParameter {
            name: name.to_owned(),
            location,
            type_ref: TypeRef::primitive("string"),
            required,
            description: None,
        };
        let merged = merge_parameters(
            vec![
                param("petId", ParameterLocation::Path, true),
                param("trace", ParameterLocation::Header, false),
            ],
            vec![
                param("trace", ParameterLocation::Header, true),
                param("limit", ParameterLocation::Query, false),
            ],
        );
        let summary: Vec<_> = merged
            .iter()
            .map(|p| (p.name.as_str(), p.required))
            .collect();
        assert_eq!(summary, vec![("petId", true), ("trace", true), ("limit", false)]);
    }

    #[test]
    fn test_detect_rejects_unknown_documents() {
        let err = load("info:\n  title: nothing\n").unwrap_err();
        assert!(matches!(err, GenError::Parse { .. }));
        let err = load("swagger: \"1.2\"\n").unwrap_err();
        assert_eq!(err.location(), Some("swagger"));
    }

    #[test]
    fn test_syntax_errors_carry_line_and_column() {
        let err = load("{\"swagger\": \"2.0\",,}").unwrap_err();
        assert!(matches!(err, GenError::Parse { .. }));
        let location = err.location().unwrap().to_owned();
        assert!(location.starts_with("line 1"), "{}", location);

        let err = load("swagger: '2.0'\npaths: [unclosed\n").unwrap_err();
        assert!(matches!(err, GenError::Parse { .. }));
    }

    #[test]
    fn test_json_and_yaml_load_the_same_document() {
        let yaml = r##"
swagger: "2.0"
paths:
  /pet:
    post:
      operationId: addPet
      parameters:
        - in: body
          name: body
          required: true
          schema:
            $ref: "#/definitions/Tag"
      responses:
        405:
          description: Invalid input
definitions:
  Tag:
    type: object
    properties:
      id:
        type: integer
      name:
        type: string
"##;
        let json = r##"{
  "swagger": "2.0",
  "paths": {"/pet": {"post": {
    "operationId": "addPet",
    "parameters": [{"in": "body", "name": "body", "required": true,
                    "schema": {"$ref": "#/definitions/Tag"}}],
    "responses": {"405": {"description": "Invalid input"}}}}},
  "definitions": {"Tag": {"type": "object", "properties": {
    "id": {"type": "integer"}, "name": {"type": "string"}}}}
}"##;
        let from_yaml = load(yaml).unwrap();
        let from_json = load(json).unwrap();
        assert_eq!(from_yaml, from_json);
        assert_eq!(from_yaml.operations[0].verb, HttpVerb::Post);
    }
}
