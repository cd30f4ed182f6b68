//! Support items every generated file carries: the transport seam, the
//! client error type and the rendering/parameter helpers.

use quote::quote;
use syn::Item;

use crate::error::Result;

pub(super) fn items() -> Result<Vec<Item>> {
    let tokens = quote! {
        /// Failure reported by a [`Transport`].
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct TransportError {
            pub message: String,
        }

        impl TransportError {
            pub fn new(message: impl Into<String>) -> Self {
                TransportError {
                    message: message.into(),
                }
            }
        }

        impl std::fmt::Display for TransportError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.message)
            }
        }

        impl std::error::Error for TransportError {}

        /// Error returned by client methods. Transport and serialization
        /// failures are passed through unchanged.
        #[derive(Debug)]
        pub enum ClientError {
            Transport(TransportError),
            Serialization(serde_json::Error),
        }

        impl std::fmt::Display for ClientError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    ClientError::Transport(err) => write!(f, "transport error: {}", err),
                    ClientError::Serialization(err) => write!(f, "serialization error: {}", err),
                }
            }
        }

        impl std::error::Error for ClientError {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                match self {
                    ClientError::Transport(err) => Some(err),
                    ClientError::Serialization(err) => Some(err),
                }
            }
        }

        impl From<TransportError> for ClientError {
            fn from(err: TransportError) -> Self {
                ClientError::Transport(err)
            }
        }

        impl From<serde_json::Error> for ClientError {
            fn from(err: serde_json::Error) -> Self {
                ClientError::Serialization(err)
            }
        }

        /// Sends one request and returns the raw response body.
        ///
        /// `url` is absolute with path parameters already substituted and
        /// percent-encoded. The body, when present, is JSON.
        pub trait Transport {
            fn send(
                &self,
                verb: &str,
                url: &str,
                query: &[(String, String)],
                headers: &[(String, String)],
                body: Option<Vec<u8>>,
            ) -> Result<Vec<u8>, TransportError>;
        }

        impl<T: Transport + ?Sized> Transport for &T {
            fn send(
                &self,
                verb: &str,
                url: &str,
                query: &[(String, String)],
                headers: &[(String, String)],
                body: Option<Vec<u8>>,
            ) -> Result<Vec<u8>, TransportError> {
                (**self).send(verb, url, query, headers, body)
            }
        }

        /// Value text used by the models' `Display` implementations.
        pub trait RenderValue {
            fn render_value(&self) -> String;
        }

        impl RenderValue for String {
            fn render_value(&self) -> String {
                self.clone()
            }
        }

        impl RenderValue for i64 {
            fn render_value(&self) -> String {
                self.to_string()
            }
        }

        impl RenderValue for f64 {
            fn render_value(&self) -> String {
                self.to_string()
            }
        }

        impl RenderValue for bool {
            fn render_value(&self) -> String {
                self.to_string()
            }
        }

        impl RenderValue for serde_json::Value {
            fn render_value(&self) -> String {
                self.to_string()
            }
        }

        impl<T: RenderValue> RenderValue for Option<T> {
            fn render_value(&self) -> String {
                match self {
                    Some(value) => value.render_value(),
                    None => "null".to_owned(),
                }
            }
        }

        impl<T: RenderValue + ?Sized> RenderValue for Box<T> {
            fn render_value(&self) -> String {
                (**self).render_value()
            }
        }

        impl<T: RenderValue> RenderValue for Vec<T> {
            fn render_value(&self) -> String {
                let items: Vec<String> = self.iter().map(RenderValue::render_value).collect();
                format!("[{}]", items.join(", "))
            }
        }

        impl<T: RenderValue> RenderValue for std::collections::BTreeMap<String, T> {
            fn render_value(&self) -> String {
                let entries: Vec<String> = self
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value.render_value()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
        }

        /// Text form of a path, query or header parameter.
        pub trait ToParam {
            fn to_param(&self) -> String;
        }

        impl ToParam for String {
            fn to_param(&self) -> String {
                self.clone()
            }
        }

        impl ToParam for i64 {
            fn to_param(&self) -> String {
                self.to_string()
            }
        }

        impl ToParam for f64 {
            fn to_param(&self) -> String {
                self.to_string()
            }
        }

        impl ToParam for bool {
            fn to_param(&self) -> String {
                self.to_string()
            }
        }

        impl<T: ToParam> ToParam for Vec<T> {
            fn to_param(&self) -> String {
                let items: Vec<String> = self.iter().map(ToParam::to_param).collect();
                items.join(",")
            }
        }

        /// Percent-encodes everything outside the RFC 3986 unreserved set so a
        /// path parameter stays a single segment.
        pub fn encode_path_segment(value: &str) -> String {
            let mut encoded = String::with_capacity(value.len());
            for byte in value.bytes() {
                match byte {
                    b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                        encoded.push(byte as char)
                    }
                    _ => encoded.push_str(&format!("%{:02X}", byte)),
                }
            }
            encoded
        }
    };
    Ok(syn::parse2::<syn::File>(tokens)?.items)
}
