use oapi_client_generator::loader::load;
use oapi_client_generator::schema::ParameterLocation;
use oapi_client_generator::{
    assemble, resolve, synthesize_models, synthesize_operations, GenError, Generator,
    PrimitiveKind, ResolvedType,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const PETSTORE: &str = include_str!("../petstore_client/petstore.yaml");

#[test]
fn test_petstore_models() {
    let document = load(PETSTORE).unwrap();
    let table = resolve(&document).unwrap();
    let models = synthesize_models(&table);

    let names: Vec<_> = models.iter().map(|model| model.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Order", "Category", "User", "Tag", "Pet", "ApiResponse"]
    );
    for model in &models {
        assert_eq!(
            model.fields.len(),
            document.definitions[&model.name].properties.len()
        );
    }

    let pet = models.iter().find(|model| model.name == "Pet").unwrap();
    let fields: Vec<_> = pet.fields.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(
        fields,
        vec!["id", "category", "name", "photoUrls", "tags", "status"]
    );
    let order = models.iter().find(|model| model.name == "Order").unwrap();
    assert_eq!(
        order.field("shipDate").unwrap().ty,
        ResolvedType::Primitive(PrimitiveKind::DateTime).nullable()
    );
}

#[test]
fn test_tag_scenario() {
    let table = resolve(&load(PETSTORE).unwrap()).unwrap();
    let models = synthesize_models(&table);
    let tag = models.iter().find(|model| model.name == "Tag").unwrap();
    assert_eq!(tag.fields.len(), 2);
    assert!(tag.field("id").unwrap().ty.is_nullable());

    let only_name = tag.construct(vec![None, Some(json!("foo"))]).unwrap();
    let rendered = tag.render(&only_name, &models);
    assert!(rendered.contains("name=foo"));
    assert!(!rendered.contains("id="));

    let both = tag
        .construct(vec![Some(json!(1337)), Some(json!("foo"))])
        .unwrap();
    assert!(tag.render(&both, &models).contains("id=1337"));
}

#[test]
fn test_petstore_operations() {
    let document = load(PETSTORE).unwrap();
    let table = resolve(&document).unwrap();
    let (operations, skipped) = synthesize_operations(&table, &document.operations).unwrap();

    let client = assemble(document.base_endpoint.clone().unwrap(), operations);
    assert_eq!(client.base_endpoint, "https://petstore.swagger.io/v2");
    assert_eq!(
        client.method_names().collect::<Vec<_>>(),
        vec![
            "AddPet",
            "UpdatePet",
            "FindPetsByStatus",
            "FindPetsByTags",
            "GetPetById",
            "DeletePet",
            "GetInventory",
            "PlaceOrder",
            "GetOrderById",
            "DeleteOrder",
            "CreateUser",
            "CreateUsersWithArrayInput",
            "LoginUser",
            "LogoutUser",
            "GetUserByName",
            "UpdateUser",
            "DeleteUser",
        ]
    );

    let skipped: Vec<_> = skipped.iter().map(|skip| skip.operation.as_str()).collect();
    assert_eq!(
        skipped,
        vec![
            "POST /pet/{petId} (updatePetWithForm)",
            "POST /pet/{petId}/uploadImage (uploadFile)",
        ]
    );

    let add_pet = client.operation("AddPet").unwrap();
    assert_eq!(add_pet.parameters.len(), 1);
    assert_eq!(add_pet.parameters[0].location, ParameterLocation::Body);
    assert_eq!(
        add_pet.parameters[0].ty,
        ResolvedType::ModelReference("Pet".into())
    );
    assert_eq!(add_pet.returns, None);

    let inventory = client.operation("GetInventory").unwrap();
    assert_eq!(
        inventory.returns,
        Some(ResolvedType::MapOf(Box::new(ResolvedType::Primitive(
            PrimitiveKind::Int64
        ))))
    );
}

#[test]
fn test_regeneration_is_byte_identical() {
    let generator = Generator::default();
    let first = generator.generate(PETSTORE).unwrap().to_source().unwrap();
    let second = generator.generate(PETSTORE).unwrap().to_source().unwrap();
    assert_eq!(first, second);
    assert!(first.contains("pub fn add_pet(&self, body: &Pet) -> Result<(), ClientError> {"));
}

#[test]
fn test_dangling_reference_fails_the_run() {
    let text = PETSTORE.replace("#/definitions/Category", "#/definitions/Kind");
    match Generator::default().generate(&text) {
        Err(GenError::UnresolvedReference { name, location }) => {
            assert_eq!(name, "Kind");
            assert_eq!(location, "definitions.Pet.properties.category");
        }
        other => panic!("expected an unresolved reference, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_json_and_yaml_agree() {
    let yaml: serde_yaml::Value = serde_yaml::from_str(PETSTORE).unwrap();
    let json_text = serde_json::to_string(&yaml).unwrap();
    let from_yaml = Generator::default().generate(PETSTORE).unwrap();
    let from_json = Generator::default().generate(&json_text).unwrap();
    assert_eq!(from_yaml.models, from_json.models);
    assert_eq!(from_yaml.client, from_json.client);
}

#[test]
fn test_generate_all_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("petstore.yaml");
    let bad = dir.path().join("broken.yaml");
    std::fs::write(&good, PETSTORE).unwrap();
    std::fs::write(&bad, "openapi: 9.0.0\n").unwrap();
    let missing = dir.path().join("missing.yaml");

    let results = Generator::default().generate_all(&[good.clone(), bad.clone(), missing.clone()]);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, good);
    assert!(results[0].1.is_ok());
    assert!(matches!(results[1].1, Err(GenError::Parse { .. })));
    assert!(matches!(results[2].1, Err(GenError::Io { .. })));
}
