use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use syn::Item;

use super::{doc_lines, snake_idents, Names};
use crate::client::ClientSurface;
use crate::error::Result;
use crate::operations::{GeneratedOperation, GeneratedParameter};
use crate::schema::ParameterLocation;

/// Locals every method body declares.
const LOCALS: &[&str] = &["url", "path", "query", "headers", "payload", "response", "value"];

/// Inherent client methods that operations must not shadow.
const CLIENT_METHODS: &[&str] = &["new", "with_base_url", "base_url", "transport"];

pub(super) fn items(client: &ClientSurface, names: &Names) -> Result<Vec<Item>> {
    let client_ident = names.client_ident();
    let base_endpoint = &client.base_endpoint;
    let method_idents = snake_idents(client.method_names(), CLIENT_METHODS);
    let methods: Vec<TokenStream> = client
        .operations
        .iter()
        .zip(&method_idents)
        .map(|(operation, ident)| generate_operation(operation, ident, names))
        .collect();
    let client_docs = doc_lines(
        "Typed client for the API. Every operation becomes one method; requests go \
         through the `Transport` it was built with.",
    );

    let tokens = quote! {
        /// Base endpoint declared by the schema document.
        pub const DEFAULT_BASE_URL: &str = #base_endpoint;

        #( #[doc = #client_docs] )*
        #[derive(Debug, Clone)]
        pub struct #client_ident<T: Transport> {
            base_url: String,
            transport: T,
        }

        impl<T: Transport> #client_ident<T> {
            /// Client for [`DEFAULT_BASE_URL`].
            pub fn new(transport: T) -> Self {
                Self::with_base_url(DEFAULT_BASE_URL, transport)
            }

            pub fn with_base_url(base_url: impl Into<String>, transport: T) -> Self {
                let base_url: String = base_url.into();
                #client_ident {
                    base_url: base_url.trim_end_matches('/').to_owned(),
                    transport,
                }
            }

            pub fn base_url(&self) -> &str {
                &self.base_url
            }

            pub fn transport(&self) -> &T {
                &self.transport
            }

            #( #methods )*
        }
    };
    Ok(syn::parse2::<syn::File>(tokens)?.items)
}

fn generate_operation_docs(operation: &GeneratedOperation) -> Vec<String> {
    let mut docs = vec![format!(" [{}] {}", operation.verb, operation.path)];
    let present = |text: &&String| !text.trim().is_empty();
    if let Some(summary) = operation.summary.as_ref().filter(present) {
        docs.push(format!(" {}", summary.trim()));
    }
    if let Some(description) = operation.description.as_ref().filter(present) {
        docs.push(String::new());
        docs.extend(doc_lines(description));
    }
    docs
}

fn generate_operation(
    operation: &GeneratedOperation,
    ident: &Ident,
    names: &Names,
) -> TokenStream {
    let docs = generate_operation_docs(operation);
    let deprecated = if operation.deprecated {
        quote!(#[deprecated])
    } else {
        quote!()
    };
    let param_idents = snake_idents(
        operation.parameters.iter().map(|parameter| parameter.name.as_str()),
        LOCALS,
    );
    let allow = if operation.parameters.len() > 6 {
        quote!(#[allow(clippy::too_many_arguments)])
    } else {
        quote!()
    };

    let mut args = vec![];
    let mut replaces = vec![];
    let mut query = vec![];
    let mut headers = vec![];
    let mut payload = quote!(let payload: Option<Vec<u8>> = None;);
    for (parameter, param) in operation.parameters.iter().zip(&param_idents) {
        match parameter.location {
            ParameterLocation::Body => {
                let ty = names.rust_type(parameter.ty.non_null(), false);
                if parameter.ty.is_nullable() {
                    args.push(quote!(#param: Option<&#ty>));
                    payload = quote! {
                        let payload = match #param {
                            Some(value) => Some(serde_json::to_vec(value)?),
                            None => None,
                        };
                    };
                } else {
                    args.push(quote!(#param: &#ty));
                    payload = quote!(let payload = Some(serde_json::to_vec(#param)?););
                }
                continue;
            }
            ParameterLocation::Path => {
                let placeholder = format!("{{{}}}", parameter.name);
                replaces.push(quote! {
                    .replace(#placeholder, &encode_path_segment(&#param.to_param()))
                });
            }
            ParameterLocation::Query => {
                query.push(push_param(&format_ident!("query"), parameter, param))
            }
            ParameterLocation::Header => {
                headers.push(push_param(&format_ident!("headers"), parameter, param))
            }
            // Rejected by the operation synthesizer.
            ParameterLocation::FormData | ParameterLocation::Cookie => continue,
        }
        let ty = names.rust_type(&parameter.ty, false);
        args.push(quote!(#param: #ty));
    }

    let path = &operation.path;
    let path = quote!(let path = #path #( #replaces )*;);
    let query = pairs(&format_ident!("query"), &query);
    let headers = pairs(&format_ident!("headers"), &headers);
    let verb = operation.verb.as_str();
    let send = quote!(self.transport.send(#verb, &url, &query, &headers, payload)?);

    let (returns, finish) = match &operation.returns {
        None => (
            quote!(()),
            quote! {
                #send;
                Ok(())
            },
        ),
        Some(ty) if ty.is_nullable() => (
            names.rust_type(ty, false),
            quote! {
                let response = #send;
                if response.is_empty() {
                    return Ok(None);
                }
                Ok(serde_json::from_slice(&response)?)
            },
        ),
        Some(ty) => (
            names.rust_type(ty, false),
            quote! {
                let response = #send;
                Ok(serde_json::from_slice(&response)?)
            },
        ),
    };

    quote! {
        #( #[doc = #docs] )*
        #deprecated
        #allow
        pub fn #ident(&self, #( #args ),* ) -> Result<#returns, ClientError> {
            #path
            let url = format!("{}{}", self.base_url, path);
            #query
            #headers
            #payload
            #finish
        }
    }
}

fn push_param(target: &Ident, parameter: &GeneratedParameter, param: &Ident) -> TokenStream {
    let name = &parameter.name;
    if parameter.ty.is_nullable() {
        quote! {
            if let Some(value) = &#param {
                #target.push((#name.to_owned(), value.to_param()));
            }
        }
    } else {
        quote! {
            #target.push((#name.to_owned(), #param.to_param()));
        }
    }
}

fn pairs(target: &Ident, pushes: &[TokenStream]) -> TokenStream {
    if pushes.is_empty() {
        quote!(let #target: Vec<(String, String)> = Vec::new();)
    } else {
        quote! {
            let mut #target: Vec<(String, String)> = Vec::new();
            #( #pushes )*
        }
    }
}
