//! Operation synthesizer: one client method per (path, verb) pair.

use std::collections::HashSet;

use heck::ToUpperCamelCase;
use tracing::{debug, warn};

use crate::error::{GenError, Result, UnsupportedOperation};
use crate::loader::is_json_media;
use crate::mapper::{MapError, ResolvedType, ResolvedTypeTable};
use crate::schema::{HttpVerb, ParameterLocation, SchemaOperation, TypeRef};

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedParameter {
    /// Name as declared in the document.
    pub name: String,
    pub location: ParameterLocation,
    /// Path parameters are never nullable; query, header and body
    /// parameters are nullable unless required.
    pub ty: ResolvedType,
    pub required: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedOperation {
    /// UpperCamelCase method name, unique within a run.
    pub name: String,
    pub verb: HttpVerb,
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    /// Same order as the document's parameters.
    pub parameters: Vec<GeneratedParameter>,
    /// `None` when the operation declares no response content.
    pub returns: Option<ResolvedType>,
}

impl GeneratedOperation {
    pub fn body(&self) -> Option<&GeneratedParameter> {
        self.parameters
            .iter()
            .find(|parameter| parameter.location == ParameterLocation::Body)
    }

    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &GeneratedParameter> {
        self.parameters
            .iter()
            .filter(move |parameter| parameter.location == location)
    }
}

/// Derives the method name for an operation.
///
/// An operation id wins and is converted to UpperCamelCase (`addPet` →
/// `AddPet`). Otherwise the name is a verb word followed by every path
/// segment in UpperCamelCase, with `{param}` segments spelled `ByParam`:
/// `POST /pet` → `AddPet`, `GET /pet/{petId}` → `GetPetByPetId`,
/// `GET /` → `GetRoot`.
pub fn method_name(operation_id: Option<&str>, verb: HttpVerb, path: &str) -> String {
    if let Some(id) = operation_id {
        let name = id.to_upper_camel_case();
        if !name.is_empty() {
            return name;
        }
    }

    let mut name = verb_word(verb).to_owned();
    let mut segments = 0;
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        let segment = match segment
            .strip_prefix('{')
            .and_then(|segment| segment.strip_suffix('}'))
        {
            Some(parameter) => format!("By{}", parameter.to_upper_camel_case()),
            None => segment.to_upper_camel_case(),
        };
        if !segment.is_empty() {
            name.push_str(&segment);
            segments += 1;
        }
    }
    if segments == 0 {
        name.push_str("Root");
    }
    name
}

fn verb_word(verb: HttpVerb) -> &'static str {
    match verb {
        HttpVerb::Get => "Get",
        HttpVerb::Post => "Add",
        HttpVerb::Put => "Update",
        HttpVerb::Patch => "Patch",
        HttpVerb::Delete => "Delete",
        HttpVerb::Head => "Head",
        HttpVerb::Options => "Options",
        HttpVerb::Trace => "Trace",
    }
}

/// Synthesizes one [`GeneratedOperation`] per schema operation, in document
/// order.
///
/// Operations with a shape the client cannot express are skipped and
/// returned as diagnostics. A reference that does not resolve against
/// `table` is fatal.
pub fn synthesize_operations(
    table: &ResolvedTypeTable,
    operations: &[SchemaOperation],
) -> Result<(Vec<GeneratedOperation>, Vec<UnsupportedOperation>)> {
    let mut generated = vec![];
    let mut skipped = vec![];
    let mut names = HashSet::new();

    for operation in operations {
        let label = operation.label();
        let outcome = synthesize_operation(table, operation).and_then(|generated| {
            if names.insert(generated.name.clone()) {
                Ok(generated)
            } else {
                Err(Rejection::Unsupported(format!(
                    "method name `{}` is already taken",
                    generated.name
                )))
            }
        });
        match outcome {
            Ok(operation) => {
                debug!(
                    method = %operation.name,
                    parameters = operation.parameters.len(),
                    "synthesized operation"
                );
                generated.push(operation);
            }
            Err(Rejection::Unsupported(reason)) => {
                let diagnostic = UnsupportedOperation::new(label, reason);
                warn!("{}", diagnostic);
                skipped.push(diagnostic);
            }
            Err(Rejection::Fatal(err)) => return Err(err),
        }
    }
    Ok((generated, skipped))
}

enum Rejection {
    Unsupported(String),
    Fatal(GenError),
}

fn map(
    table: &ResolvedTypeTable,
    type_ref: &TypeRef,
    operation: &SchemaOperation,
    what: &str,
) -> std::result::Result<ResolvedType, Rejection> {
    table.map(type_ref).map_err(|err| match err {
        MapError::Unresolved(_) => {
            Rejection::Fatal(err.at(format!("{} {}", operation.label(), what)))
        }
        other => Rejection::Unsupported(format!("{} uses {}", what, other)),
    })
}

fn synthesize_operation(
    table: &ResolvedTypeTable,
    operation: &SchemaOperation,
) -> std::result::Result<GeneratedOperation, Rejection> {
    let mut parameters = Vec::with_capacity(operation.parameters.len());
    let mut has_body = false;

    for parameter in &operation.parameters {
        let what = format!("parameter `{}`", parameter.name);
        let ty = match parameter.location {
            ParameterLocation::FormData | ParameterLocation::Cookie => {
                return Err(Rejection::Unsupported(format!(
                    "{} is passed in {}",
                    what, parameter.location
                )));
            }
            ParameterLocation::Path => {
                let ty = map(table, &parameter.type_ref, operation, &what)?;
                scalar(ty, &what)?
            }
            ParameterLocation::Query | ParameterLocation::Header => {
                let ty = scalar(map(table, &parameter.type_ref, operation, &what)?, &what)?;
                if parameter.required {
                    ty
                } else {
                    ty.nullable()
                }
            }
            ParameterLocation::Body => {
                if has_body {
                    return Err(Rejection::Unsupported(
                        "more than one body parameter".to_owned(),
                    ));
                }
                has_body = true;
                let ty = map(table, &parameter.type_ref, operation, &what)?;
                if parameter.required {
                    ty
                } else {
                    ty.nullable()
                }
            }
        };
        parameters.push(GeneratedParameter {
            name: parameter.name.clone(),
            location: parameter.location,
            ty,
            // Path parameters are always required, whatever the document says.
            required: parameter.required || parameter.location == ParameterLocation::Path,
            description: parameter.description.clone(),
        });
    }

    if has_body && !json_compatible(&operation.request_media) {
        return Err(Rejection::Unsupported(format!(
            "request media type {} has no JSON form",
            operation.request_media.join(", ")
        )));
    }

    let returns = match &operation.response {
        Some(response) => {
            if !json_compatible(&operation.response_media) {
                return Err(Rejection::Unsupported(format!(
                    "response media type {} has no JSON form",
                    operation.response_media.join(", ")
                )));
            }
            let ty = map(table, &response.type_ref, operation, "response")?;
            Some(if response.optional { ty.nullable() } else { ty })
        }
        None => None,
    };

    Ok(GeneratedOperation {
        name: method_name(operation.operation_id.as_deref(), operation.verb, &operation.path),
        verb: operation.verb,
        path: operation.path.clone(),
        operation_id: operation.operation_id.clone(),
        summary: operation.summary.clone(),
        description: operation.description.clone(),
        deprecated: operation.deprecated,
        parameters,
        returns,
    })
}

/// Undeclared media types count as JSON.
fn json_compatible(media: &[String]) -> bool {
    media.is_empty() || media.iter().any(|media_type| is_json_media(media_type))
}

fn scalar(ty: ResolvedType, what: &str) -> std::result::Result<ResolvedType, Rejection> {
    if ty.is_scalar_like() {
        Ok(ty)
    } else {
        Err(Rejection::Unsupported(format!(
            "{} has type {}, only primitives and arrays of primitives are supported",
            what, ty
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loader::load;
    use crate::mapper::{resolve, PrimitiveKind};
    use pretty_assertions::assert_eq;

    fn synthesize(text: &str) -> (Vec<GeneratedOperation>, Vec<UnsupportedOperation>) {
        let document = load(text).unwrap();
        let table = resolve(&document).unwrap();
        synthesize_operations(&table, &document.operations).unwrap()
    }

    const PETS: &str = r##"
swagger: "2.0"
host: petstore.swagger.io
basePath: /v2
consumes: [application/json]
produces: [application/json]
paths:
  /pet:
    post:
      operationId: addPet
      parameters:
        - in: body
          name: body
          required: true
          schema:
            $ref: "#/definitions/Pet"
      responses:
        405:
          description: Invalid input
    get:
      parameters:
        - in: query
          name: status
          type: array
          items:
            type: string
        - in: header
          name: X-Trace
          required: true
          type: string
      responses:
        200:
          description: ok
          schema:
            type: array
            items:
              $ref: "#/definitions/Pet"
  /pet/{petId}:
    get:
      parameters:
        - in: path
          name: petId
          required: true
          type: integer
          format: int64
      responses:
        200:
          description: ok
          schema:
            $ref: "#/definitions/Pet"
        204:
          description: gone
    delete:
      operationId: deletePet
      parameters:
        - in: path
          name: petId
          required: true
          type: integer
  /pet/{petId}/uploadImage:
    post:
      operationId: uploadFile
      consumes: [multipart/form-data]
      parameters:
        - in: path
          name: petId
          required: true
          type: integer
        - in: formData
          name: file
          type: file
      responses:
        200:
          description: ok
definitions:
  Pet:
    type: object
    required: [name]
    properties:
      id:
        type: integer
      name:
        type: string
"##;

    #[test]
    fn test_method_names() {
        assert_eq!(method_name(Some("addPet"), HttpVerb::Post, "/pet"), "AddPet");
        assert_eq!(method_name(None, HttpVerb::Post, "/pet"), "AddPet");
        assert_eq!(
            method_name(None, HttpVerb::Get, "/pet/{petId}"),
            "GetPetByPetId"
        );
        assert_eq!(
            method_name(None, HttpVerb::Put, "/store/order-items/{order_id}"),
            "UpdateStoreOrderItemsByOrderId"
        );
        assert_eq!(method_name(None, HttpVerb::Get, "/"), "GetRoot");
        assert_eq!(method_name(Some("__"), HttpVerb::Delete, "/x"), "DeleteX");
    }

    #[test]
    fn test_add_pet() {
        let (operations, _) = synthesize(PETS);
        let add_pet = &operations[0];
        assert_eq!(add_pet.name, "AddPet");
        assert_eq!(add_pet.verb, HttpVerb::Post);
        assert_eq!(add_pet.parameters.len(), 1);
        assert_eq!(add_pet.parameters[0].location, ParameterLocation::Body);
        assert_eq!(
            add_pet.parameters[0].ty,
            ResolvedType::ModelReference("Pet".into())
        );
        assert_eq!(add_pet.returns, None);
    }

    #[test]
    fn test_parameter_binding() {
        let (operations, _) = synthesize(PETS);
        let find = &operations[1];
        assert_eq!(find.name, "GetPet");
        assert_eq!(
            find.parameters[0].ty,
            ResolvedType::ArrayOf(Box::new(ResolvedType::Primitive(PrimitiveKind::String)))
                .nullable()
        );
        assert_eq!(
            find.parameters[1].ty,
            ResolvedType::Primitive(PrimitiveKind::String)
        );
        assert_eq!(
            find.returns,
            Some(ResolvedType::ArrayOf(Box::new(ResolvedType::ModelReference(
                "Pet".into()
            ))))
        );

        let get = &operations[2];
        assert_eq!(get.name, "GetPetByPetId");
        assert_eq!(get.parameters[0].ty, ResolvedType::Primitive(PrimitiveKind::Int64));
        assert!(get.parameters[0].required);
        assert_eq!(
            get.returns,
            Some(ResolvedType::ModelReference("Pet".into()).nullable())
        );
    }

    #[test]
    fn test_unsupported_operations_are_skipped() {
        let (operations, skipped) = synthesize(PETS);
        let names: Vec<_> = operations.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["AddPet", "GetPet", "GetPetByPetId", "DeletePet"]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(
            skipped[0].operation,
            "POST /pet/{petId}/uploadImage (uploadFile)"
        );
        assert!(skipped[0].reason.contains("formData"));
    }

    #[test]
    fn test_duplicate_method_name_is_skipped() {
        let text = r##"
swagger: "2.0"
paths:
  /a:
    get:
      operationId: fetch
  /b:
    get:
      operationId: Fetch
"##;
        let (operations, skipped) = synthesize(text);
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].path, "/a");
        assert!(skipped[0].reason.contains("already taken"));
    }

    #[test]
    fn test_model_in_query_is_unsupported() {
        let text = r##"
openapi: "3.0.0"
info: {title: t, version: "1"}
paths:
  /search:
    get:
      parameters:
        - in: query
          name: filter
          schema:
            $ref: "#/components/schemas/Filter"
      responses:
        "200":
          description: ok
components:
  schemas:
    Filter:
      type: object
      properties:
        q:
          type: string
"##;
        let (operations, skipped) = synthesize(text);
        assert!(operations.is_empty());
        assert!(skipped[0].reason.contains("parameter `filter`"));
    }

    #[test]
    fn test_non_json_response_is_unsupported() {
        let text = r##"
openapi: "3.0.0"
info: {title: t, version: "1"}
paths:
  /report:
    get:
      responses:
        "200":
          description: ok
          content:
            text/csv:
              schema:
                type: string
"##;
        let (operations, skipped) = synthesize(text);
        assert!(operations.is_empty());
        assert!(skipped[0].reason.contains("text/csv"));
    }

    #[test]
    fn test_multipart_body_is_unsupported() {
        let text = r##"
openapi: "3.0.0"
info: {title: t, version: "1"}
paths:
  /receipt:
    post:
      operationId: uploadReceipt
      requestBody:
        content:
          multipart/form-data:
            schema:
              type: object
              properties:
                file:
                  type: string
                  format: binary
      responses:
        "204":
          description: stored
  /receipt/{id}:
    get:
      operationId: getReceipt
      parameters:
        - in: path
          name: id
          required: true
          schema:
            type: integer
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                type: string
"##;
        let (operations, skipped) = synthesize(text);
        let names: Vec<_> = operations.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["GetReceipt"]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].operation, "POST /receipt (uploadReceipt)");
        assert_eq!(
            skipped[0].reason,
            "request media type multipart/form-data has no JSON form"
        );
    }

    #[test]
    fn test_second_body_parameter_is_unsupported() {
        let text = r##"
swagger: "2.0"
paths:
  /pair:
    post:
      operationId: addPair
      parameters:
        - in: body
          name: left
          schema:
            $ref: "#/definitions/Tag"
        - in: body
          name: right
          schema:
            $ref: "#/definitions/Tag"
    put:
      operationId: updatePair
      parameters:
        - in: body
          name: body
          required: true
          schema:
            $ref: "#/definitions/Tag"
definitions:
  Tag:
    type: object
    properties:
      name:
        type: string
"##;
        let (operations, skipped) = synthesize(text);
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].name, "UpdatePair");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].operation, "POST /pair (addPair)");
        assert_eq!(skipped[0].reason, "more than one body parameter");
    }

    #[test]
    fn test_regeneration_is_deterministic() {
        let first = synthesize(PETS);
        let second = synthesize(PETS);
        assert_eq!(first, second);
    }
}
