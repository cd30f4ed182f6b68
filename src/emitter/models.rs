use proc_macro2::TokenStream;
use quote::quote;
use syn::Item;

use super::{doc_lines, snake_idents, Names};
use crate::error::Result;
use crate::mapper::{PrimitiveKind, ResolvedType};
use crate::models::{GeneratedField, GeneratedModel};

/// Struct, constructor, `Display` and `RenderValue` for one model.
pub(super) fn items(model: &GeneratedModel, names: &Names) -> Result<Vec<Item>> {
    let ident = names.type_ident(&model.name);
    let model_name = &model.name;
    let docs = model
        .description
        .as_deref()
        .map(doc_lines)
        .unwrap_or_default();
    let field_idents = snake_idents(model.fields.iter().map(|field| field.name.as_str()), &[]);

    let mut fields = vec![];
    let mut params = vec![];
    let mut pushes = vec![];
    for (field, field_ident) in model.fields.iter().zip(&field_idents) {
        let ty = names.rust_type(&field.ty, field.cyclic);
        let field_docs = field_docs(field);
        let serde_attr = serde_attr(field, &field_ident.to_string());
        fields.push(quote! {
            #( #[doc = #field_docs] )*
            #serde_attr
            pub #field_ident: #ty
        });
        params.push(quote!(#field_ident: #ty));

        let label = &field.name;
        let free_form = matches!(
            field.ty.non_null(),
            ResolvedType::Primitive(PrimitiveKind::Json)
        );
        pushes.push(match (field.is_optional(), free_form) {
            (true, false) => quote! {
                if let Some(value) = &self.#field_ident {
                    parts.push(format!("{}={}", #label, value.render_value()));
                }
            },
            (true, true) => quote! {
                if let Some(value) = self.#field_ident.as_ref().filter(|value| !value.is_null()) {
                    parts.push(format!("{}={}", #label, value.render_value()));
                }
            },
            (false, true) => quote! {
                if !self.#field_ident.is_null() {
                    parts.push(format!("{}={}", #label, self.#field_ident.render_value()));
                }
            },
            (false, false) => quote! {
                parts.push(format!("{}={}", #label, self.#field_ident.render_value()));
            },
        });
    }

    let parts = if pushes.is_empty() {
        quote!(let parts: Vec<String> = Vec::new();)
    } else {
        quote!(let mut parts: Vec<String> = Vec::new();)
    };
    let allow = if params.len() > 7 {
        quote!(#[allow(clippy::too_many_arguments)])
    } else {
        quote!()
    };
    let constructor_doc = " Creates a value with every field given in declaration order.";

    let tokens = quote! {
        #( #[doc = #docs] )*
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct #ident {
            #( #fields, )*
        }

        impl #ident {
            #[doc = #constructor_doc]
            #allow
            pub fn new( #( #params ),* ) -> Self {
                #ident {
                    #( #field_idents ),*
                }
            }
        }

        impl std::fmt::Display for #ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                #parts
                #( #pushes )*
                if parts.is_empty() {
                    write!(f, "{} {{ }}", #model_name)
                } else {
                    write!(f, "{} {{ {} }}", #model_name, parts.join(", "))
                }
            }
        }

        impl RenderValue for #ident {
            fn render_value(&self) -> String {
                self.to_string()
            }
        }
    };
    Ok(syn::parse2::<syn::File>(tokens)?.items)
}

fn field_docs(field: &GeneratedField) -> Vec<String> {
    let mut docs = field
        .description
        .as_deref()
        .map(doc_lines)
        .unwrap_or_default();
    if !field.allowed_values.is_empty() {
        if !docs.is_empty() {
            docs.push(String::new());
        }
        let values: Vec<_> = field
            .allowed_values
            .iter()
            .map(|value| format!("`{}`", value))
            .collect();
        docs.push(format!(" Allowed values: {}.", values.join(", ")));
    }
    docs
}

fn serde_attr(field: &GeneratedField, ident: &str) -> TokenStream {
    let mut args = vec![];
    if field.name != ident {
        let name = &field.name;
        args.push(quote!(rename = #name));
    }
    if field.is_optional() {
        args.push(quote!(default));
        args.push(quote!(skip_serializing_if = "Option::is_none"));
    }
    if args.is_empty() {
        quote!()
    } else {
        quote!(#[serde( #( #args ),* )])
    }
}
