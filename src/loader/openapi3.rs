use std::borrow::Borrow;

use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use openapiv3::{
    AdditionalProperties, Components, MediaType, OpenAPI, Operation, Parameter,
    ParameterSchemaOrContent, PathItem, ReferenceOr, Schema, SchemaKind, StatusCode, StringFormat,
    Type, VariantOrUnknownOrEmpty,
};
use serde_yaml::Value;

use super::{
    from_value, is_json_media, merge_parameters, parse_ref, select_response, DefinitionSink,
    RefKind, ResponseKind,
};
use crate::error::{GenError, Result};
use crate::operations::method_name;
use crate::schema::{
    HttpVerb, ParameterLocation, SchemaDefinition, SchemaDocument, SchemaOperation,
    SchemaParameter, SchemaProperty, SchemaResponse, TypeRef,
};

type Properties = IndexMap<String, ReferenceOr<Box<Schema>>>;

pub(super) fn convert(raw: Value) -> Result<SchemaDocument> {
    // `PathItem` has one field per verb, so the textual order is taken from
    // the raw mapping before it is discarded.
    let verb_order = verb_order(&raw);
    let document: OpenAPI = from_value(raw, "document root")?;
    let empty = Components::default();
    let components = document.components.as_ref().unwrap_or(&empty);
    let mut converter = Converter {
        components,
        sink: DefinitionSink::new(components.schemas.keys()),
    };

    for (name, schema) in &components.schemas {
        converter.definition(name, schema)?;
    }

    let mut operations = vec![];
    for (path, item) in &document.paths.paths {
        let location = format!("paths.{}", path);
        let item = match item {
            ReferenceOr::Reference { .. } => {
                return Err(GenError::parse(
                    location,
                    "path item references are not supported",
                ));
            }
            ReferenceOr::Item(item) => item,
        };
        for verb in verb_order.get(path).into_iter().flatten() {
            let Some(operation) = operation_for(item, *verb) else {
                continue;
            };
            let operation_location =
                format!("{}.{}", location, verb.as_str().to_ascii_lowercase());
            operations.push(converter.operation(
                *verb,
                path,
                item,
                operation,
                &operation_location,
            )?);
        }
    }

    let (definitions, aliases) = converter.sink.finish();
    Ok(SchemaDocument {
        definitions,
        aliases,
        operations,
        base_endpoint: document.servers.first().map(|server| server.url.clone()),
        title: Some(document.info.title.clone()),
    })
}

fn verb_order(raw: &Value) -> IndexMap<String, Vec<HttpVerb>> {
    let Some(paths) = raw.get("paths").and_then(Value::as_mapping) else {
        return IndexMap::new();
    };
    paths
        .iter()
        .filter_map(|(path, item)| {
            let verbs = item
                .as_mapping()
                .map(|item| {
                    item.iter()
                        .filter_map(|(key, _)| key.as_str().and_then(HttpVerb::from_key))
                        .collect()
                })
                .unwrap_or_default();
            Some((path.as_str()?.to_owned(), verbs))
        })
        .collect()
}

fn operation_for(item: &PathItem, verb: HttpVerb) -> Option<&Operation> {
    match verb {
        HttpVerb::Get => item.get.as_ref(),
        HttpVerb::Put => item.put.as_ref(),
        HttpVerb::Post => item.post.as_ref(),
        HttpVerb::Delete => item.delete.as_ref(),
        HttpVerb::Options => item.options.as_ref(),
        HttpVerb::Head => item.head.as_ref(),
        HttpVerb::Patch => item.patch.as_ref(),
        HttpVerb::Trace => item.trace.as_ref(),
    }
}

/// Follows component references until an item is found.
fn resolve<'c, T>(
    components: &'c IndexMap<String, ReferenceOr<T>>,
    item: &'c ReferenceOr<T>,
    kind: RefKind,
    location: &str,
) -> Result<&'c T> {
    let mut current = item;
    for _ in 0..8 {
        match current {
            ReferenceOr::Item(item) => return Ok(item),
            ReferenceOr::Reference { reference } => {
                let name = parse_ref(reference, kind, location)?;
                current = components.get(&name).ok_or_else(|| {
                    GenError::parse(location, format!("unknown component `{}`", name))
                })?;
            }
        }
    }
    Err(GenError::parse(location, "reference chain does not end"))
}

/// Prefers a JSON media type, falling back to the first one declared.
fn preferred_media(content: &IndexMap<String, MediaType>) -> Option<(&String, &MediaType)> {
    content
        .iter()
        .find(|(media_type, _)| is_json_media(media_type))
        .or_else(|| content.first())
}

fn string_format(format: &VariantOrUnknownOrEmpty<StringFormat>) -> Option<String> {
    match format {
        VariantOrUnknownOrEmpty::Item(format) => Some(
            match format {
                StringFormat::Date => "date",
                StringFormat::DateTime => "date-time",
                StringFormat::Password => "password",
                StringFormat::Byte => "byte",
                StringFormat::Binary => "binary",
            }
            .to_owned(),
        ),
        VariantOrUnknownOrEmpty::Unknown(format) => Some(format.clone()),
        VariantOrUnknownOrEmpty::Empty => None,
    }
}

fn is_object(schema: &Schema) -> bool {
    match &schema.schema_kind {
        SchemaKind::Type(Type::Object(object)) => {
            !object.properties.is_empty()
                || !matches!(
                    object.additional_properties,
                    Some(AdditionalProperties::Schema(_))
                )
        }
        SchemaKind::AllOf { .. } => true,
        SchemaKind::Any(any) => !any.properties.is_empty(),
        _ => false,
    }
}

/// Gathers the property maps, required names and bases of an object schema,
/// descending into inline `allOf` parts.
fn collect_object_parts<'s>(
    schema: &'s Schema,
    location: &str,
    definition: &mut SchemaDefinition,
    required: &mut Vec<String>,
    property_sets: &mut Vec<&'s Properties>,
) -> Result<()> {
    if definition.description.is_none() {
        definition.description = schema.schema_data.description.clone();
    }
    match &schema.schema_kind {
        SchemaKind::Type(Type::Object(object)) => {
            property_sets.push(&object.properties);
            required.extend(object.required.iter().cloned());
        }
        SchemaKind::Any(any) => {
            property_sets.push(&any.properties);
            required.extend(any.required.iter().cloned());
        }
        SchemaKind::AllOf { all_of } => {
            for (index, part) in all_of.iter().enumerate() {
                let part_location = format!("{}.allOf[{}]", location, index);
                match part {
                    ReferenceOr::Reference { reference } => definition.bases.push(parse_ref(
                        reference,
                        RefKind::Schema,
                        &part_location,
                    )?),
                    ReferenceOr::Item(part) => collect_object_parts(
                        part,
                        &part_location,
                        definition,
                        required,
                        property_sets,
                    )?,
                }
            }
        }
        _ => {}
    }
    Ok(())
}

struct Converter<'a> {
    components: &'a Components,
    sink: DefinitionSink,
}

impl Converter<'_> {
    fn definition(&mut self, name: &str, schema: &ReferenceOr<Schema>) -> Result<()> {
        let location = format!("components.schemas.{}", name);
        match schema {
            ReferenceOr::Item(schema) if is_object(schema) => {
                let definition = self.object(name.to_owned(), schema, &location)?;
                self.sink.declare(definition);
            }
            schema => {
                let type_ref = self.schema_type(schema, name, &location)?;
                self.sink.alias(name, type_ref);
            }
        }
        Ok(())
    }

    fn object(
        &mut self,
        name: String,
        schema: &Schema,
        location: &str,
    ) -> Result<SchemaDefinition> {
        let mut definition = SchemaDefinition {
            name,
            ..SchemaDefinition::default()
        };
        let mut required = vec![];
        let mut property_sets = vec![];
        collect_object_parts(
            schema,
            location,
            &mut definition,
            &mut required,
            &mut property_sets,
        )?;

        for properties in property_sets {
            for (property_name, property) in properties {
                let property_location = format!("{}.properties.{}", location, property_name);
                let hoist_base = format!(
                    "{}{}",
                    definition.name,
                    property_name.to_upper_camel_case()
                );
                let type_ref = self.schema_type(property, &hoist_base, &property_location)?;
                let (nullable, description) = match property {
                    ReferenceOr::Item(schema) => (
                        schema.schema_data.nullable,
                        schema.schema_data.description.clone(),
                    ),
                    ReferenceOr::Reference { .. } => (false, None),
                };
                let property = SchemaProperty {
                    name: property_name.clone(),
                    type_ref,
                    required: required.contains(property_name),
                    nullable,
                    description,
                };
                match definition
                    .properties
                    .iter_mut()
                    .find(|seen| seen.name == property.name)
                {
                    Some(seen) => *seen = property,
                    None => definition.properties.push(property),
                }
            }
        }
        Ok(definition)
    }

    fn schema_type<S: Borrow<Schema>>(
        &mut self,
        schema: &ReferenceOr<S>,
        hoist_base: &str,
        location: &str,
    ) -> Result<TypeRef> {
        match schema {
            ReferenceOr::Reference { reference } => Ok(TypeRef::Reference(parse_ref(
                reference,
                RefKind::Schema,
                location,
            )?)),
            ReferenceOr::Item(schema) => {
                self.inline_type(<S as Borrow<Schema>>::borrow(schema), hoist_base, location)
            }
        }
    }

    fn inline_type(
        &mut self,
        schema: &Schema,
        hoist_base: &str,
        location: &str,
    ) -> Result<TypeRef> {
        let type_ref = match &schema.schema_kind {
            SchemaKind::Type(Type::String(string)) => TypeRef::Primitive {
                name: "string".to_owned(),
                format: string_format(&string.format),
                enum_values: string.enumeration.iter().flatten().cloned().collect(),
            },
            SchemaKind::Type(Type::Number(_)) => TypeRef::primitive("number"),
            SchemaKind::Type(Type::Integer(_)) => TypeRef::primitive("integer"),
            SchemaKind::Type(Type::Boolean(_)) => TypeRef::primitive("boolean"),
            SchemaKind::Type(Type::Array(array)) => {
                let items = match &array.items {
                    Some(items) => self.schema_type(
                        items,
                        &format!("{}Item", hoist_base),
                        &format!("{}.items", location),
                    )?,
                    None => TypeRef::Any,
                };
                TypeRef::Array(Box::new(items))
            }
            SchemaKind::Type(Type::Object(object)) if object.properties.is_empty() => {
                match &object.additional_properties {
                    Some(AdditionalProperties::Schema(values)) => {
                        let values = self.schema_type(
                            &**values,
                            &format!("{}Value", hoist_base),
                            &format!("{}.additionalProperties", location),
                        )?;
                        TypeRef::Map(Box::new(values))
                    }
                    Some(AdditionalProperties::Any(_)) | None => TypeRef::Any,
                }
            }
            SchemaKind::AllOf { all_of } => match all_of.as_slice() {
                [ReferenceOr::Reference { reference }] => TypeRef::Reference(parse_ref(
                    reference,
                    RefKind::Schema,
                    &format!("{}.allOf[0]", location),
                )?),
                _ => self.hoist(schema, hoist_base, location)?,
            },
            SchemaKind::Type(Type::Object(_)) => self.hoist(schema, hoist_base, location)?,
            SchemaKind::Any(any) if !any.properties.is_empty() => {
                self.hoist(schema, hoist_base, location)?
            }
            SchemaKind::OneOf { .. }
            | SchemaKind::AnyOf { .. }
            | SchemaKind::Not { .. }
            | SchemaKind::Any(_) => TypeRef::Any,
        };
        Ok(type_ref)
    }

    fn hoist(&mut self, schema: &Schema, hoist_base: &str, location: &str) -> Result<TypeRef> {
        let name = self.sink.claim(hoist_base);
        let definition = self.object(name, schema, location)?;
        Ok(self.sink.hoist(definition))
    }

    fn operation(
        &mut self,
        verb: HttpVerb,
        path: &str,
        item: &PathItem,
        raw: &Operation,
        location: &str,
    ) -> Result<SchemaOperation> {
        let components = self.components;
        let base = method_name(raw.operation_id.as_deref(), verb, path);
        let mut operation = SchemaOperation::new(verb, path);
        operation.operation_id = raw.operation_id.clone();
        operation.summary = raw.summary.clone();
        operation.description = raw.description.clone();
        operation.deprecated = raw.deprecated;

        let inherited =
            self.parameters(&item.parameters, &format!("paths.{}.parameters", path), &base)?;
        let own = self.parameters(&raw.parameters, &format!("{}.parameters", location), &base)?;
        operation.parameters = merge_parameters(inherited, own);

        if let Some(body) = &raw.request_body {
            let body_location = format!("{}.requestBody", location);
            let body = resolve(
                &components.request_bodies,
                body,
                RefKind::RequestBody,
                &body_location,
            )?;
            operation.request_media = body.content.keys().cloned().collect();
            if let Some((media_type, media)) = preferred_media(&body.content) {
                let type_ref = match &media.schema {
                    Some(schema) => self.schema_type(
                        schema,
                        &format!("{}Body", base),
                        &format!("{}.content.{}.schema", body_location, media_type),
                    )?,
                    None => TypeRef::Any,
                };
                operation.parameters.push(SchemaParameter {
                    name: "body".to_owned(),
                    location: ParameterLocation::Body,
                    type_ref,
                    required: body.required,
                    description: body.description.clone(),
                });
            }
        }

        let mut responses = vec![];
        for (code, response) in &raw.responses.responses {
            let key = match code {
                StatusCode::Code(code) => code.to_string(),
                StatusCode::Range(range) => format!("{}XX", range),
            };
            let response_location = format!("{}.responses.{}", location, key);
            let response = resolve(
                &components.responses,
                response,
                RefKind::Response,
                &response_location,
            )?;
            responses.push((key, response));
        }
        if let Some(response) = &raw.responses.default {
            let response_location = format!("{}.responses.default", location);
            let response = resolve(
                &components.responses,
                response,
                RefKind::Response,
                &response_location,
            )?;
            responses.push(("default".to_owned(), response));
        }

        let kinds: Vec<_> = responses
            .iter()
            .map(|(key, response)| {
                let has_schema = preferred_media(&response.content)
                    .is_some_and(|(_, media)| media.schema.is_some());
                (ResponseKind::from_key(key), has_schema)
            })
            .collect();
        if let Some((index, optional)) = select_response(&kinds) {
            let (key, response) = &responses[index];
            if let Some((media_type, MediaType { schema: Some(schema), .. })) =
                preferred_media(&response.content)
            {
                let type_ref = self.schema_type(
                    schema,
                    &format!("{}Response", base),
                    &format!(
                        "{}.responses.{}.content.{}.schema",
                        location, key, media_type
                    ),
                )?;
                operation.response = Some(SchemaResponse { type_ref, optional });
                operation.response_media = response.content.keys().cloned().collect();
            }
        }
        Ok(operation)
    }

    fn parameters(
        &mut self,
        raw: &[ReferenceOr<Parameter>],
        location: &str,
        base: &str,
    ) -> Result<Vec<SchemaParameter>> {
        let components = self.components;
        let mut parameters = vec![];
        for (index, parameter) in raw.iter().enumerate() {
            let location = format!("{}[{}]", location, index);
            let parameter = resolve(
                &components.parameters,
                parameter,
                RefKind::Parameter,
                &location,
            )?;
            let (kind, data) = match parameter {
                Parameter::Query { parameter_data, .. } => {
                    (ParameterLocation::Query, parameter_data)
                }
                Parameter::Header { parameter_data, .. } => {
                    (ParameterLocation::Header, parameter_data)
                }
                Parameter::Path { parameter_data, .. } => (ParameterLocation::Path, parameter_data),
                Parameter::Cookie { parameter_data, .. } => {
                    (ParameterLocation::Cookie, parameter_data)
                }
            };
            let hoist_base = format!("{}{}", base, data.name.to_upper_camel_case());
            let type_ref = match &data.format {
                ParameterSchemaOrContent::Schema(schema) => {
                    self.schema_type(schema, &hoist_base, &format!("{}.schema", location))?
                }
                ParameterSchemaOrContent::Content(content) => {
                    match content.first().and_then(|(_, media)| media.schema.as_ref()) {
                        Some(schema) => self.schema_type(
                            schema,
                            &hoist_base,
                            &format!("{}.content", location),
                        )?,
                        None => TypeRef::Any,
                    }
                }
            };
            parameters.push(SchemaParameter {
                name: data.name.clone(),
                location: kind,
                type_ref,
                required: data.required,
                description: data.description.clone(),
            });
        }
        Ok(parameters)
    }
}

#[cfg(test)]
mod test {
    use super::super::load;
    use super::*;
    use pretty_assertions::assert_eq;

    const STORE: &str = r##"
openapi: 3.0.3
info:
  title: Store
  version: "1"
servers:
  - url: https://store.example.com/api
paths:
  /orders/{orderId}:
    parameters:
      - $ref: "#/components/parameters/OrderId"
    put:
      operationId: replaceOrder
      requestBody:
        $ref: "#/components/requestBodies/OrderBody"
      responses:
        "2XX":
          description: replaced
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Order"
        "204":
          description: nothing to say
    get:
      responses:
        default:
          description: the order
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Order"
  /orders/{orderId}/receipt:
    post:
      operationId: uploadReceipt
      parameters:
        - $ref: "#/components/parameters/OrderId"
        - name: session
          in: cookie
          schema:
            type: string
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
        "201":
          description: stored
components:
  parameters:
    OrderId:
      name: orderId
      in: path
      required: true
      schema:
        type: integer
        format: int64
  requestBodies:
    OrderBody:
      required: true
      content:
        application/xml:
          schema:
            $ref: "#/components/schemas/Order"
        application/json:
          schema:
            $ref: "#/components/schemas/Order"
  schemas:
    Order:
      type: object
      required: [id]
      properties:
        id:
          type: integer
        placed:
          type: string
          format: date-time
          nullable: true
        lines:
          type: array
          items:
            type: object
            properties:
              sku:
                type: string
    Code:
      type: string
      enum: [a, b]
"##;

    #[test]
    fn test_components_become_definitions() {
        let document = load(STORE).unwrap();
        let names: Vec<_> = document.definitions.keys().cloned().collect();
        assert_eq!(names, vec!["Order", "OrderLinesItem", "UploadReceiptBody"]);

        let order = &document.definitions["Order"];
        assert_eq!(order.properties[0].name, "id");
        assert!(order.properties[0].required);
        assert!(order.properties[1].nullable);
        assert_eq!(
            order.properties[1].type_ref,
            TypeRef::Primitive {
                name: "string".into(),
                format: Some("date-time".into()),
                enum_values: vec![],
            }
        );
        assert_eq!(
            order.properties[2].type_ref,
            TypeRef::array_of(TypeRef::reference("OrderLinesItem"))
        );
        assert!(document.aliases.contains_key("Code"));
        assert_eq!(
            document.base_endpoint.as_deref(),
            Some("https://store.example.com/api")
        );
    }

    #[test]
    fn test_operations_follow_document_order() {
        let document = load(STORE).unwrap();
        let labels: Vec<_> = document.operations.iter().map(|op| op.label()).collect();
        assert_eq!(
            labels,
            vec![
                "PUT /orders/{orderId} (replaceOrder)",
                "GET /orders/{orderId}",
                "POST /orders/{orderId}/receipt (uploadReceipt)",
            ]
        );
    }

    #[test]
    fn test_request_bodies_and_responses() {
        let document = load(STORE).unwrap();
        let replace = &document.operations[0];
        let body = replace.parameters.last().unwrap();
        assert_eq!(body.location, ParameterLocation::Body);
        assert_eq!(body.type_ref, TypeRef::reference("Order"));
        assert!(body.required);
        assert_eq!(
            replace.response,
            Some(SchemaResponse {
                type_ref: TypeRef::reference("Order"),
                optional: true,
            })
        );

        let get = &document.operations[1];
        assert_eq!(get.response.as_ref().map(|r| r.optional), Some(true));

        let upload = &document.operations[2];
        assert_eq!(upload.request_media, vec!["multipart/form-data".to_string()]);
        let locations: Vec<_> = upload.parameters.iter().map(|p| p.location).collect();
        assert_eq!(
            locations,
            vec![
                ParameterLocation::Path,
                ParameterLocation::Cookie,
                ParameterLocation::Body
            ]
        );
        assert_eq!(upload.response, None);
    }
}
