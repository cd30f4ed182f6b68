//! Model synthesizer: one [`GeneratedModel`] per resolved definition.

use std::collections::HashMap;

use itertools::Itertools;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::mapper::{PrimitiveKind, ResolvedModel, ResolvedType, ResolvedTypeTable};

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedField {
    /// Property name as declared in the document.
    pub name: String,
    pub ty: ResolvedType,
    pub required: bool,
    pub description: Option<String>,
    pub allowed_values: Vec<String>,
    /// The field names a model that leads back to the owner through direct
    /// (non-collection) fields. Such a field needs indirection in targets
    /// with by-value records.
    pub cyclic: bool,
}

impl GeneratedField {
    /// True when the constructor may be given nothing for this field.
    pub fn is_optional(&self) -> bool {
        self.ty.is_nullable()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedModel {
    pub name: String,
    pub description: Option<String>,
    /// Declaration order; also the constructor's parameter order.
    pub fields: Vec<GeneratedField>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructError {
    #[error("{model} takes {expected} arguments, got {found}")]
    Arity {
        model: String,
        expected: usize,
        found: usize,
    },
    #[error("{model}.{field} is required")]
    MissingRequired { model: String, field: String },
}

impl GeneratedModel {
    pub fn field(&self, name: &str) -> Option<&GeneratedField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Builds an instance from positional arguments, one per field in
    /// declaration order. `None` leaves an optional field absent.
    pub fn construct(&self, args: Vec<Option<Value>>) -> Result<Value, ConstructError> {
        if args.len() != self.fields.len() {
            return Err(ConstructError::Arity {
                model: self.name.clone(),
                expected: self.fields.len(),
                found: args.len(),
            });
        }
        let mut instance = Map::new();
        for (field, arg) in self.fields.iter().zip(args) {
            match arg {
                Some(value) => {
                    instance.insert(field.name.clone(), value);
                }
                None if field.is_optional() => {}
                None => {
                    return Err(ConstructError::MissingRequired {
                        model: self.name.clone(),
                        field: field.name.clone(),
                    })
                }
            }
        }
        Ok(Value::Object(instance))
    }

    /// Renders an instance as `Name { a=1, b=foo }`.
    ///
    /// Every present field appears as `name=value` in declaration order;
    /// absent and null fields are left out. Strings are unquoted, arrays are
    /// `[x, y]`, maps are `{k=v}` sorted by key, and nested models render
    /// recursively using `models` for lookup.
    pub fn render(&self, instance: &Value, models: &[GeneratedModel]) -> String {
        let mut out = format!("{} {{", self.name);
        let mut first = true;
        for field in &self.fields {
            let value = match instance.get(&field.name) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            out.push_str(if first { " " } else { ", " });
            first = false;
            out.push_str(&field.name);
            out.push('=');
            out.push_str(&render_value(&field.ty, value, models));
        }
        out.push_str(" }");
        out
    }
}

fn render_value(ty: &ResolvedType, value: &Value, models: &[GeneratedModel]) -> String {
    match (ty, value) {
        (_, Value::Null) => "null".to_owned(),
        (ResolvedType::Nullable(inner), _) => render_value(inner, value, models),
        (ResolvedType::Primitive(PrimitiveKind::Json), _) => value.to_string(),
        (ResolvedType::Primitive(_), Value::String(text)) => text.clone(),
        (ResolvedType::Primitive(PrimitiveKind::Float64), Value::Number(number)) => {
            match number.as_f64() {
                Some(number) => number.to_string(),
                None => number.to_string(),
            }
        }
        (ResolvedType::ArrayOf(inner), Value::Array(items)) => format!(
            "[{}]",
            items
                .iter()
                .map(|item| render_value(inner, item, models))
                .join(", ")
        ),
        (ResolvedType::MapOf(inner), Value::Object(entries)) => format!(
            "{{{}}}",
            entries
                .iter()
                .sorted_by(|a, b| a.0.cmp(b.0))
                .map(|(key, value)| format!("{}={}", key, render_value(inner, value, models)))
                .join(", ")
        ),
        (ResolvedType::ModelReference(name), Value::Object(_)) => {
            match models.iter().find(|model| &model.name == name) {
                Some(model) => model.render(value, models),
                None => value.to_string(),
            }
        }
        _ => value.to_string(),
    }
}

/// Synthesizes every model in the table.
///
/// Models come out dependencies first. Independent models keep declaration
/// order, and inside a reference cycle the earliest declared member goes
/// first.
pub fn synthesize_models(table: &ResolvedTypeTable) -> Vec<GeneratedModel> {
    let resolved: Vec<&ResolvedModel> = table.models().collect();
    let direct = direct_edges(&resolved);

    let mut models = Vec::with_capacity(resolved.len());
    for index in topological_order(table, &resolved) {
        let model = resolved[index];
        let fields = model
            .fields
            .iter()
            .map(|field| GeneratedField {
                name: field.name.clone(),
                ty: field.ty.clone(),
                required: field.required,
                description: field.description.clone(),
                allowed_values: field.allowed_values.clone(),
                cyclic: field
                    .ty
                    .direct_model()
                    .map_or(false, |target| reaches(&direct, target, &model.name)),
            })
            .collect();
        debug!(model = %model.name, position = models.len(), "synthesized model");
        models.push(GeneratedModel {
            name: model.name.clone(),
            description: model.description.clone(),
            fields,
        });
    }
    models
}

fn direct_edges<'t>(models: &[&'t ResolvedModel]) -> HashMap<&'t str, Vec<&'t str>> {
    models
        .iter()
        .copied()
        .map(|model| {
            let targets = model
                .fields
                .iter()
                .filter_map(|field| field.ty.direct_model())
                .collect();
            (model.name.as_str(), targets)
        })
        .collect()
}

fn reaches(edges: &HashMap<&str, Vec<&str>>, from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen = vec![];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if seen.contains(&node) {
            continue;
        }
        seen.push(node);
        if let Some(targets) = edges.get(node) {
            stack.extend(targets.iter().copied());
        }
    }
    false
}

fn topological_order(table: &ResolvedTypeTable, models: &[&ResolvedModel]) -> Vec<usize> {
    let dependencies: Vec<Vec<usize>> = models
        .iter()
        .enumerate()
        .map(|(index, model)| {
            model
                .dependencies
                .iter()
                .filter_map(|name| table.position(name))
                .filter(|dependency| *dependency != index)
                .collect()
        })
        .collect();

    let mut emitted = vec![false; models.len()];
    let mut order = Vec::with_capacity(models.len());
    while order.len() < models.len() {
        let ready = (0..models.len()).find(|&index| {
            !emitted[index] && dependencies[index].iter().all(|&dependency| emitted[dependency])
        });
        let next = match ready {
            Some(index) => index,
            // Every remaining model waits on another remaining one, so at
            // least one of them sits on a cycle.
            None => (0..models.len())
                .find(|&index| !emitted[index] && on_cycle(&dependencies, &emitted, index))
                .or_else(|| (0..models.len()).find(|&index| !emitted[index]))
                .unwrap_or_default(),
        };
        emitted[next] = true;
        order.push(next);
    }
    order
}

fn on_cycle(dependencies: &[Vec<usize>], emitted: &[bool], start: usize) -> bool {
    let mut stack: Vec<usize> = dependencies[start].clone();
    let mut seen = vec![false; dependencies.len()];
    while let Some(node) = stack.pop() {
        if node == start {
            return true;
        }
        if emitted[node] || seen[node] {
            continue;
        }
        seen[node] = true;
        stack.extend(dependencies[node].iter().copied());
    }
    false
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loader::load;
    use crate::mapper::resolve;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn models(text: &str) -> Vec<GeneratedModel> {
        synthesize_models(&resolve(&load(text).unwrap()).unwrap())
    }

    fn names(models: &[GeneratedModel]) -> Vec<&str> {
        models.iter().map(|model| model.name.as_str()).collect()
    }

    const PETS: &str = r##"
swagger: "2.0"
paths: {}
definitions:
  Pet:
    type: object
    required: [name, photoUrls]
    properties:
      id:
        type: integer
        format: int64
      category:
        $ref: "#/definitions/Category"
      name:
        type: string
      photoUrls:
        type: array
        items:
          type: string
      tags:
        type: array
        items:
          $ref: "#/definitions/Tag"
      status:
        type: string
        enum: [available, pending, sold]
  Category:
    type: object
    properties:
      id:
        type: integer
      name:
        type: string
  Tag:
    type: object
    required: [name]
    properties:
      name:
        type: string
      id:
        type: integer
        format: int64
"##;

    #[test]
    fn test_dependencies_come_first() {
        let models = models(PETS);
        assert_eq!(names(&models), vec!["Category", "Tag", "Pet"]);
        let pet = &models[2];
        let fields: Vec<_> = pet.fields.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(
            fields,
            vec!["id", "category", "name", "photoUrls", "tags", "status"]
        );
        assert_eq!(pet.field("status").unwrap().allowed_values.len(), 3);
    }

    #[test]
    fn test_tag_rendering() {
        let models = models(PETS);
        let tag = models.iter().find(|model| model.name == "Tag").unwrap();
        assert_eq!(tag.fields.len(), 2);
        assert!(tag.field("id").unwrap().ty.is_nullable());

        let instance = tag.construct(vec![Some(json!("foo")), None]).unwrap();
        let rendered = tag.render(&instance, &models);
        assert!(rendered.contains("name=foo"));
        assert!(!rendered.contains("id="));

        let instance = tag
            .construct(vec![Some(json!("foo")), Some(json!(1337))])
            .unwrap();
        let rendered = tag.render(&instance, &models);
        assert_eq!(rendered, "Tag { name=foo, id=1337 }");
        assert_eq!(rendered, tag.render(&instance, &models));
    }

    #[test]
    fn test_nested_rendering() {
        let models = models(PETS);
        let pet = models.iter().find(|model| model.name == "Pet").unwrap();
        let instance = pet
            .construct(vec![
                Some(json!(7)),
                Some(json!({"name": "dogs"})),
                Some(json!("rex")),
                Some(json!(["a.png", "b.png"])),
                Some(json!([{"name": "good"}])),
                None,
            ])
            .unwrap();
        assert_eq!(
            pet.render(&instance, &models),
            "Pet { id=7, category=Category { name=dogs }, name=rex, \
             photoUrls=[a.png, b.png], tags=[Tag { name=good }] }"
        );
    }

    #[test]
    fn test_construct_checks_arguments() {
        let models = models(PETS);
        let tag = models.iter().find(|model| model.name == "Tag").unwrap();
        assert_eq!(
            tag.construct(vec![None, Some(json!(1))]),
            Err(ConstructError::MissingRequired {
                model: "Tag".into(),
                field: "name".into()
            })
        );
        assert!(matches!(
            tag.construct(vec![Some(json!("x"))]),
            Err(ConstructError::Arity { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_map_and_float_rendering() {
        let text = r##"
swagger: "2.0"
paths: {}
definitions:
  Stats:
    type: object
    required: [counts, ratio]
    properties:
      counts:
        type: object
        additionalProperties:
          type: integer
      ratio:
        type: number
"##;
        let models = models(text);
        let instance = json!({"counts": {"b": 2, "a": 1}, "ratio": 0.5});
        assert_eq!(
            models[0].render(&instance, &models),
            "Stats { counts={a=1, b=2}, ratio=0.5 }"
        );
    }

    #[test]
    fn test_cycles_are_ordered_and_flagged() {
        let text = r##"
swagger: "2.0"
paths: {}
definitions:
  Owner:
    type: object
    properties:
      pet:
        $ref: "#/definitions/Pet"
  Pet:
    type: object
    properties:
      owner:
        $ref: "#/definitions/Owner"
      friends:
        type: array
        items:
          $ref: "#/definitions/Pet"
  Node:
    type: object
    properties:
      next:
        $ref: "#/definitions/Node"
      label:
        $ref: "#/definitions/Label"
  Label:
    type: object
    properties:
      text:
        type: string
"##;
        let models = models(text);
        assert_eq!(names(&models), vec!["Label", "Node", "Owner", "Pet"]);
        let node = &models[1];
        let owner = &models[2];
        let pet = &models[3];
        assert!(owner.fields[0].cyclic);
        assert!(pet.fields[0].cyclic);
        assert!(!pet.fields[1].cyclic);
        assert!(node.fields[0].cyclic);
        assert!(!node.fields[1].cyclic);
    }

    #[test]
    fn test_every_definition_yields_one_model() {
        let document = load(PETS).unwrap();
        let models = models(PETS);
        assert_eq!(models.len(), document.definitions.len());
        for model in &models {
            let definition = &document.definitions[&model.name];
            assert_eq!(model.fields.len(), definition.properties.len());
        }
    }
}
