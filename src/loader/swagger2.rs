use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;

use super::{
    enum_strings, from_value, merge_parameters, parse_ref, select_response, DefinitionSink,
    RefKind, ResponseKind,
};
use crate::error::{GenError, Result};
use crate::operations::method_name;
use crate::schema::{
    HttpVerb, ParameterLocation, SchemaDefinition, SchemaDocument, SchemaOperation,
    SchemaParameter, SchemaProperty, SchemaResponse, TypeRef,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SwaggerDocument {
    info: Option<Info>,
    host: Option<String>,
    base_path: Option<String>,
    schemes: Vec<String>,
    consumes: Vec<String>,
    produces: Vec<String>,
    /// Path items stay raw so verb keys keep their declaration order. Vendor
    /// extensions may sit next to them.
    paths: IndexMap<String, Value>,
    definitions: IndexMap<String, RawSchema>,
    parameters: IndexMap<String, RawParameter>,
    responses: IndexMap<String, RawResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Info {
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSchema {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    #[serde(rename = "type")]
    schema_type: Option<String>,
    format: Option<String>,
    description: Option<String>,
    items: Option<Box<RawSchema>>,
    properties: IndexMap<String, RawSchema>,
    required: Vec<String>,
    additional_properties: Option<RawAdditionalProperties>,
    all_of: Vec<RawSchema>,
    one_of: Vec<RawSchema>,
    any_of: Vec<RawSchema>,
    #[serde(rename = "enum")]
    enum_values: Vec<serde_json::Value>,
    #[serde(rename = "x-nullable")]
    x_nullable: bool,
    nullable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAdditionalProperties {
    Schema(Box<RawSchema>),
    /// `true` / `false`; either way the values are free-form.
    Flag(serde::de::IgnoredAny),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawOperation {
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    deprecated: bool,
    parameters: Vec<RawParameter>,
    consumes: Option<Vec<String>>,
    produces: Option<Vec<String>>,
    responses: IndexMap<String, RawResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawParameter {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    name: Option<String>,
    #[serde(rename = "in")]
    location: Option<String>,
    required: bool,
    description: Option<String>,
    schema: Option<Box<RawSchema>>,
    #[serde(rename = "type")]
    schema_type: Option<String>,
    format: Option<String>,
    items: Option<Box<RawSchema>>,
    #[serde(rename = "enum")]
    enum_values: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawResponse {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    schema: Option<RawSchema>,
}

pub(super) fn convert(raw: Value) -> Result<SchemaDocument> {
    let document: SwaggerDocument = from_value(raw, "document root")?;
    let mut converter = Converter {
        document: &document,
        sink: DefinitionSink::new(document.definitions.keys()),
    };

    for (name, schema) in &document.definitions {
        converter.definition(name, schema)?;
    }

    let mut operations = vec![];
    for (path, item) in &document.paths {
        if path.starts_with("x-") {
            continue;
        }
        let item: IndexMap<String, Value> =
            from_value(item.clone(), &format!("paths.{}", path))?;
        operations.extend(converter.path_item(path, &item)?);
    }

    let base_endpoint = document.host.as_ref().map(|host| {
        let scheme = document
            .schemes
            .first()
            .map(String::as_str)
            .unwrap_or("http");
        format!(
            "{}://{}{}",
            scheme,
            host,
            document.base_path.as_deref().unwrap_or_default()
        )
    });
    let (definitions, aliases) = converter.sink.finish();
    Ok(SchemaDocument {
        definitions,
        aliases,
        operations,
        base_endpoint,
        title: document.info.as_ref().and_then(|info| info.title.clone()),
    })
}

struct Converter<'a> {
    document: &'a SwaggerDocument,
    sink: DefinitionSink,
}

impl Converter<'_> {
    fn definition(&mut self, name: &str, schema: &RawSchema) -> Result<()> {
        let location = format!("definitions.{}", name);
        if is_object(schema) {
            let definition = self.object(name.to_owned(), schema, &location)?;
            self.sink.declare(definition);
        } else {
            let type_ref = self.schema_type(schema, name, &location)?;
            self.sink.alias(name, type_ref);
        }
        Ok(())
    }

    fn object(
        &mut self,
        name: String,
        schema: &RawSchema,
        location: &str,
    ) -> Result<SchemaDefinition> {
        let mut definition = SchemaDefinition {
            name,
            description: schema.description.clone(),
            bases: vec![],
            properties: vec![],
        };
        let mut required: Vec<&String> = schema.required.iter().collect();
        let mut parts = vec![schema];
        for (index, part) in schema.all_of.iter().enumerate() {
            match &part.reference {
                Some(reference) => {
                    let part_location = format!("{}.allOf[{}]", location, index);
                    definition
                        .bases
                        .push(parse_ref(reference, RefKind::Schema, &part_location)?);
                }
                None => {
                    required.extend(part.required.iter());
                    if definition.description.is_none() {
                        definition.description = part.description.clone();
                    }
                    parts.push(part);
                }
            }
        }

        for part in parts {
            for (property_name, property) in &part.properties {
                let property_location = format!("{}.properties.{}", location, property_name);
                let hoist_base = format!(
                    "{}{}",
                    definition.name,
                    property_name.to_upper_camel_case()
                );
                let type_ref = self.schema_type(property, &hoist_base, &property_location)?;
                let property = SchemaProperty {
                    name: property_name.clone(),
                    type_ref,
                    required: required.contains(&property_name),
                    nullable: property.x_nullable || property.nullable,
                    description: property.description.clone(),
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

    fn schema_type(
        &mut self,
        schema: &RawSchema,
        hoist_base: &str,
        location: &str,
    ) -> Result<TypeRef> {
        if let Some(reference) = &schema.reference {
            return Ok(TypeRef::Reference(parse_ref(reference, RefKind::Schema, location)?));
        }
        if !schema.all_of.is_empty() {
            if let [single] = schema.all_of.as_slice() {
                if let (Some(reference), true) = (&single.reference, schema.properties.is_empty()) {
                    return Ok(TypeRef::Reference(parse_ref(
                        reference,
                        RefKind::Schema,
                        &format!("{}.allOf[0]", location),
                    )?));
                }
            }
            return self.hoist(schema, hoist_base, location);
        }
        if !schema.one_of.is_empty() || !schema.any_of.is_empty() {
            return Ok(TypeRef::Any);
        }
        match schema.schema_type.as_deref() {
            Some("array") => {
                let items = match &schema.items {
                    Some(items) => self.schema_type(
                        items,
                        &format!("{}Item", hoist_base),
                        &format!("{}.items", location),
                    )?,
                    None => TypeRef::Any,
                };
                Ok(TypeRef::Array(Box::new(items)))
            }
            Some("object") | None => {
                if !schema.properties.is_empty() {
                    return self.hoist(schema, hoist_base, location);
                }
                match &schema.additional_properties {
                    Some(RawAdditionalProperties::Schema(values)) => {
                        let values = self.schema_type(
                            values,
                            &format!("{}Value", hoist_base),
                            &format!("{}.additionalProperties", location),
                        )?;
                        Ok(TypeRef::Map(Box::new(values)))
                    }
                    Some(RawAdditionalProperties::Flag(_)) | None => Ok(TypeRef::Any),
                }
            }
            Some(name) => Ok(TypeRef::Primitive {
                name: name.to_owned(),
                format: schema.format.clone(),
                enum_values: enum_strings(&schema.enum_values),
            }),
        }
    }

    fn hoist(&mut self, schema: &RawSchema, hoist_base: &str, location: &str) -> Result<TypeRef> {
        let name = self.sink.claim(hoist_base);
        let definition = self.object(name, schema, location)?;
        Ok(self.sink.hoist(definition))
    }

    fn path_item(
        &mut self,
        path: &str,
        item: &IndexMap<String, Value>,
    ) -> Result<Vec<SchemaOperation>> {
        let location = format!("paths.{}", path);
        if item.contains_key("$ref") {
            return Err(GenError::parse(
                location,
                "path item references are not supported",
            ));
        }
        let shared: Vec<RawParameter> = match item.get("parameters") {
            Some(parameters) => {
                from_value(parameters.clone(), &format!("{}.parameters", location))?
            }
            None => vec![],
        };

        let mut operations = vec![];
        for (key, value) in item {
            let Some(verb) = HttpVerb::from_key(key) else {
                continue;
            };
            let operation_location = format!("{}.{}", location, key);
            let raw: RawOperation = from_value(value.clone(), &operation_location)?;
            operations.push(self.operation(verb, path, &shared, &raw, &operation_location)?);
        }
        Ok(operations)
    }

    fn operation(
        &mut self,
        verb: HttpVerb,
        path: &str,
        shared: &[RawParameter],
        raw: &RawOperation,
        location: &str,
    ) -> Result<SchemaOperation> {
        let document = self.document;
        let base = method_name(raw.operation_id.as_deref(), verb, path);
        let mut operation = SchemaOperation::new(verb, path);
        operation.operation_id = raw.operation_id.clone();
        operation.summary = raw.summary.clone();
        operation.description = raw.description.clone();
        operation.deprecated = raw.deprecated;

        let inherited = self.parameters(shared, &format!("paths.{}.parameters", path), &base)?;
        let own = self.parameters(&raw.parameters, &format!("{}.parameters", location), &base)?;
        operation.parameters = merge_parameters(inherited, own);
        operation.request_media = raw
            .consumes
            .clone()
            .unwrap_or_else(|| document.consumes.clone());

        let mut responses = vec![];
        for (code, response) in &raw.responses {
            let response = match &response.reference {
                Some(reference) => {
                    let response_location = format!("{}.responses.{}", location, code);
                    let name = parse_ref(reference, RefKind::Response, &response_location)?;
                    document.responses.get(&name).ok_or_else(|| {
                        GenError::parse(response_location, format!("unknown response `{}`", name))
                    })?
                }
                None => response,
            };
            responses.push((code, response));
        }
        let kinds: Vec<_> = responses
            .iter()
            .map(|(code, response)| (ResponseKind::from_key(code), response.schema.is_some()))
            .collect();
        if let Some((index, optional)) = select_response(&kinds) {
            let (code, response) = responses[index];
            if let Some(schema) = &response.schema {
                let type_ref = self.schema_type(
                    schema,
                    &format!("{}Response", base),
                    &format!("{}.responses.{}.schema", location, code),
                )?;
                operation.response = Some(SchemaResponse { type_ref, optional });
                operation.response_media = raw
                    .produces
                    .clone()
                    .unwrap_or_else(|| document.produces.clone());
            }
        }
        Ok(operation)
    }

    fn parameters(
        &mut self,
        raw: &[RawParameter],
        location: &str,
        base: &str,
    ) -> Result<Vec<SchemaParameter>> {
        let document = self.document;
        let mut parameters = vec![];
        for (index, parameter) in raw.iter().enumerate() {
            let location = format!("{}[{}]", location, index);
            let parameter = match &parameter.reference {
                Some(reference) => {
                    let name = parse_ref(reference, RefKind::Parameter, &location)?;
                    document.parameters.get(&name).ok_or_else(|| {
                        GenError::parse(&location, format!("unknown parameter `{}`", name))
                    })?
                }
                None => parameter,
            };
            let name = parameter
                .name
                .clone()
                .ok_or_else(|| GenError::parse(&location, "parameter without a name"))?;
            let key = parameter.location.as_deref().unwrap_or_default();
            let kind = ParameterLocation::from_key(key).ok_or_else(|| {
                GenError::parse(&location, format!("unknown parameter location `{}`", key))
            })?;
            let type_ref = match (kind, &parameter.schema) {
                (ParameterLocation::Body, Some(schema)) => self.schema_type(
                    schema,
                    &format!("{}Body", base),
                    &format!("{}.schema", location),
                )?,
                (ParameterLocation::Body, None) => {
                    return Err(GenError::parse(location, "body parameter without a schema"));
                }
                _ => self.simple_type(parameter, &location)?,
            };
            parameters.push(SchemaParameter {
                name,
                location: kind,
                type_ref,
                required: parameter.required,
                description: parameter.description.clone(),
            });
        }
        Ok(parameters)
    }

    /// Non-body parameters describe their type inline, without a `schema`.
    fn simple_type(&mut self, parameter: &RawParameter, location: &str) -> Result<TypeRef> {
        match parameter.schema_type.as_deref() {
            Some("array") => {
                let items = match &parameter.items {
                    Some(items) => self.schema_type(items, "Item", &format!("{}.items", location))?,
                    None => TypeRef::Any,
                };
                Ok(TypeRef::Array(Box::new(items)))
            }
            Some(name) => Ok(TypeRef::Primitive {
                name: name.to_owned(),
                format: parameter.format.clone(),
                enum_values: enum_strings(&parameter.enum_values),
            }),
            None => Ok(TypeRef::Any),
        }
    }
}

fn is_object(schema: &RawSchema) -> bool {
    if schema.reference.is_some() {
        return false;
    }
    if !schema.properties.is_empty() || !schema.all_of.is_empty() {
        return true;
    }
    schema.schema_type.as_deref() == Some("object")
        && !matches!(
            schema.additional_properties,
            Some(RawAdditionalProperties::Schema(_))
        )
}
