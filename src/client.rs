//! Client container: the generated operations behind one typed entry point.

use crate::operations::GeneratedOperation;

pub const DEFAULT_CLIENT_NAME: &str = "Client";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSurface {
    pub name: String,
    /// Endpoint requests are resolved against unless the caller overrides it.
    pub base_endpoint: String,
    /// Generation order.
    pub operations: Vec<GeneratedOperation>,
}

impl ClientSurface {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn operation(&self, name: &str) -> Option<&GeneratedOperation> {
        self.operations
            .iter()
            .find(|operation| operation.name == name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|operation| operation.name.as_str())
    }
}

/// Aggregates `operations` into a client named [`DEFAULT_CLIENT_NAME`].
pub fn assemble(
    base_endpoint: impl Into<String>,
    operations: Vec<GeneratedOperation>,
) -> ClientSurface {
    let base_endpoint: String = base_endpoint.into();
    ClientSurface {
        name: DEFAULT_CLIENT_NAME.to_owned(),
        base_endpoint: base_endpoint.trim_end_matches('/').to_owned(),
        operations,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::HttpVerb;
    use pretty_assertions::assert_eq;

    fn operation(name: &str, path: &str) -> GeneratedOperation {
        GeneratedOperation {
            name: name.to_owned(),
            verb: HttpVerb::Get,
            path: path.to_owned(),
            operation_id: None,
            summary: None,
            description: None,
            deprecated: false,
            parameters: vec![],
            returns: None,
        }
    }

    #[test]
    fn test_assemble_keeps_order_and_endpoint() {
        let client = assemble(
            "https://petstore.swagger.io/v2/",
            vec![operation("GetPet", "/pet"), operation("GetStore", "/store")],
        );
        assert_eq!(client.name, "Client");
        assert_eq!(client.base_endpoint, "https://petstore.swagger.io/v2");
        assert_eq!(
            client.method_names().collect::<Vec<_>>(),
            vec!["GetPet", "GetStore"]
        );
        assert_eq!(client.operation("GetStore").unwrap().path, "/store");
        assert!(client.operation("AddPet").is_none());
    }

    #[test]
    fn test_with_name() {
        let client = assemble("http://localhost", vec![]).with_name("PetStore");
        assert_eq!(client.name, "PetStore");
        assert!(client.operations.is_empty());
    }
}
