//! Typed Rust clients from Swagger 2.0 and OpenAPI 3 documents.
//!
//! A run is a straight pipeline: [`loader::load`] parses the document,
//! [`mapper::resolve`] builds the resolved type table,
//! [`models::synthesize_models`] and [`operations::synthesize_operations`]
//! derive the declarations, and [`client::assemble`] puts the operations
//! behind one client. [`Generator`] drives the whole thing and
//! [`emitter`] turns the result into Rust source.

pub mod cache;
pub mod client;
pub mod emitter;
pub mod error;
pub mod loader;
pub mod mapper;
pub mod models;
pub mod operations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, info_span};

pub use cache::{Resolved, TypeTableCache};
pub use client::{assemble, ClientSurface};
pub use error::{GenError, Result, UnsupportedOperation};
pub use mapper::{resolve, PrimitiveKind, ResolvedType, ResolvedTypeTable};
pub use models::{synthesize_models, GeneratedField, GeneratedModel};
pub use operations::{synthesize_operations, GeneratedOperation, GeneratedParameter};

/// Used when neither the settings nor the document name an endpoint.
pub const DEFAULT_BASE_ENDPOINT: &str = "http://localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSettings {
    client_name: String,
    base_endpoint: Option<String>,
    module_doc: bool,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            client_name: client::DEFAULT_CLIENT_NAME.to_owned(),
            base_endpoint: None,
            module_doc: true,
        }
    }
}

impl GeneratorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    /// Replaces the endpoint the document declares.
    pub fn with_base_endpoint(mut self, base_endpoint: impl Into<String>) -> Self {
        self.base_endpoint = Some(base_endpoint.into());
        self
    }

    /// Whether emitted source starts with a "generated" header comment.
    pub fn with_module_doc(mut self, module_doc: bool) -> Self {
        self.module_doc = module_doc;
        self
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn base_endpoint(&self) -> Option<&str> {
        self.base_endpoint.as_deref()
    }

    pub fn module_doc(&self) -> bool {
        self.module_doc
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub title: Option<String>,
    /// Dependencies first.
    pub models: Vec<GeneratedModel>,
    pub client: ClientSurface,
    /// Operations that were skipped.
    pub diagnostics: Vec<UnsupportedOperation>,
    header: Option<String>,
}

impl Generation {
    /// Formatted Rust source for the models and the client.
    pub fn to_source(&self) -> Result<String> {
        emitter::emit_source(&self.models, &self.client, self.header.as_deref())
    }

    pub fn to_files(&self, file_name: &str) -> Result<BTreeMap<String, String>> {
        emitter::emit_files(file_name, &self.models, &self.client, self.header.as_deref())
    }

    pub fn model(&self, name: &str) -> Option<&GeneratedModel> {
        self.models.iter().find(|model| model.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Generator {
    settings: GeneratorSettings,
    cache: Option<Arc<TypeTableCache>>,
}

impl Generator {
    pub fn new(settings: GeneratorSettings) -> Self {
        Generator {
            settings,
            cache: None,
        }
    }

    /// Shares resolved type tables with every other generator holding the
    /// same cache.
    pub fn with_cache(mut self, cache: Arc<TypeTableCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Runs the pipeline over one document.
    ///
    /// Load and resolve failures abort the run. Unsupported operations are
    /// reported in [`Generation::diagnostics`].
    pub fn generate(&self, document_text: &str) -> Result<Generation> {
        let resolved = match &self.cache {
            Some(cache) => cache.get_or_resolve(document_text, || load_and_resolve(document_text))?,
            None => Arc::new(load_and_resolve(document_text)?),
        };
        let document = &resolved.document;

        let models = synthesize_models(&resolved.types);
        let (operations, diagnostics) =
            synthesize_operations(&resolved.types, &document.operations)?;
        let base_endpoint = self
            .settings
            .base_endpoint
            .as_deref()
            .or(document.base_endpoint.as_deref())
            .unwrap_or(DEFAULT_BASE_ENDPOINT);
        let client = assemble(base_endpoint, operations).with_name(&self.settings.client_name);

        let header = self.settings.module_doc.then(|| {
            format!(
                "Generated by oapi_client_generator from {}.\nDo not edit by hand.",
                document.title.as_deref().unwrap_or("a schema document")
            )
        });
        info!(
            models = models.len(),
            operations = client.operations.len(),
            skipped = diagnostics.len(),
            "generated client"
        );
        Ok(Generation {
            title: document.title.clone(),
            models,
            client,
            diagnostics,
            header,
        })
    }

    pub fn generate_file(&self, path: impl AsRef<Path>) -> Result<Generation> {
        let path = path.as_ref();
        let _span = info_span!("generate", path = %path.display()).entered();
        let text = std::fs::read_to_string(path).map_err(|source| GenError::Io {
            path: path.to_owned(),
            source,
        })?;
        self.generate(&text)
    }

    /// Generates every document independently and in parallel. Results come
    /// back in input order.
    pub fn generate_all(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<Generation>)> {
        paths
            .par_iter()
            .map(|path| (path.clone(), self.generate_file(path)))
            .collect()
    }
}

fn load_and_resolve(document_text: &str) -> Result<Resolved> {
    let document = loader::load(document_text)?;
    let types = resolve(&document)?;
    Ok(Resolved { document, types })
}
