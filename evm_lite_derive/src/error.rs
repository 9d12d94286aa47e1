//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations.
//! Replacement for `thiserror` crate.
//!
//! # Usage
//!
//! ```ignore
//! use evm_lite_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum MyError {
//!     #[error("unknown opcode 0x{0:02x}")]
//!     UnknownOpcode(u8),
//!
//!     #[error("stack underflow: wanted {requested} items, have {depth}")]
//!     StackUnderflow { requested: usize, depth: usize },
//!
//!     #[error("line {line}: {source}")]
//!     Located { line: usize, source: Box<MyError> },
//!
//!     #[error("halted")]
//!     Halted,
//! }
//! ```
//!
//! # Supported Features
//!
//! - Unit variants: `#[error("message")]`
//! - Tuple variants with positional args: `#[error("error: {0}")]`
//! - Struct variants with named args: `#[error("expected {expected}")]`
//! - Fields the message does not mention are ignored when formatting
//! - A named field called `source` is returned from `Error::source`

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, FieldsNamed, Ident, Lit, Meta, parse_macro_input};

const SOURCE_FIELD: &str = "source";

/// Derives `Display` and `Error` for an enum or struct.
///
/// Each variant must have an `#[error("...")]` attribute specifying
/// the display message. Supports field interpolation using `{0}`, `{1}`
/// for tuple fields or `{field_name}` for struct fields.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_error_derive(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_error_derive(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (display_body, source_fn) = match &input.data {
        Data::Enum(data_enum) => {
            let mut display_arms = Vec::with_capacity(data_enum.variants.len());
            let mut source_arms = Vec::new();

            for variant in &data_enum.variants {
                let variant_name = &variant.ident;
                let message = extract_error_message(variant)?;

                match &variant.fields {
                    Fields::Unit => {
                        display_arms.push(quote! {
                            Self::#variant_name => write!(f, #message),
                        });
                    }
                    Fields::Unnamed(fields) => {
                        let message = convert_positional_to_named(&message, fields.unnamed.len());
                        let referenced = referenced_arguments(&message);
                        let mut bindings = Vec::with_capacity(fields.unnamed.len());
                        let mut args = Vec::new();
                        for i in 0..fields.unnamed.len() {
                            let ident = format_ident!("f{}", i);
                            if referenced.contains(&ident.to_string()) {
                                bindings.push(quote!(#ident));
                                args.push(ident);
                            } else {
                                bindings.push(quote!(_));
                            }
                        }
                        display_arms.push(quote! {
                            Self::#variant_name(#(#bindings),*) => write!(f, #message #(, #args = #args)*),
                        });
                    }
                    Fields::Named(fields) => {
                        let args = referenced_named_fields(fields, &message);
                        display_arms.push(quote! {
                            Self::#variant_name { #(#args,)* .. } => write!(f, #message #(, #args = #args)*),
                        });
                        if has_source_field(fields) {
                            source_arms.push(quote! {
                                Self::#variant_name { source, .. } => Some(source as &(dyn ::std::error::Error + 'static)),
                            });
                        }
                    }
                }
            }

            let display_body = quote! {
                match self {
                    #(#display_arms)*
                }
            };
            let source_fn = if source_arms.is_empty() {
                quote! {}
            } else {
                quote! {
                    #[allow(unreachable_patterns)]
                    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
                        match self {
                            #(#source_arms)*
                            _ => None,
                        }
                    }
                }
            };
            (display_body, source_fn)
        }
        Data::Struct(data_struct) => {
            let message = extract_error_message_from_attrs(
                &input.attrs,
                &input.ident,
                &format!("type `{}`", input.ident),
            )?;

            match &data_struct.fields {
                Fields::Unit => (quote! { write!(f, #message) }, quote! {}),
                Fields::Named(fields) => {
                    let args = referenced_named_fields(fields, &message);
                    let source_fn = if has_source_field(fields) {
                        quote! {
                            fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
                                Some(&self.source as &(dyn ::std::error::Error + 'static))
                            }
                        }
                    } else {
                        quote! {}
                    };
                    (
                        quote! { write!(f, #message #(, #args = self.#args)*) },
                        source_fn,
                    )
                }
                Fields::Unnamed(fields) => {
                    let message = convert_positional_to_named(&message, fields.unnamed.len());
                    let referenced = referenced_arguments(&message);
                    let (idents, indices): (Vec<_>, Vec<_>) = (0..fields.unnamed.len())
                        .map(|i| (format_ident!("f{}", i), syn::Index::from(i)))
                        .filter(|(ident, _)| referenced.contains(&ident.to_string()))
                        .unzip();
                    (
                        quote! { write!(f, #message #(, #idents = self.#indices)*) },
                        quote! {},
                    )
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #display_body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {
            #source_fn
        }
    })
}

/// Extracts the error message from a variant's `#[error("...")]` attribute.
fn extract_error_message(variant: &syn::Variant) -> syn::Result<String> {
    extract_error_message_from_attrs(
        &variant.attrs,
        &variant.ident,
        &format!("variant `{}`", variant.ident),
    )
}

/// Extracts the error message from attributes.
fn extract_error_message_from_attrs<T: ToTokens>(
    attrs: &[syn::Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<String> {
    for attr in attrs {
        if !attr.path().is_ident("error") {
            continue;
        }
        let Meta::List(meta_list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")] to describe the error",
            ));
        };
        let lit = syn::parse2::<Lit>(meta_list.tokens.clone()).map_err(|_| {
            syn::Error::new_spanned(
                &attr.meta,
                "failed to parse #[error] attribute; expected a string literal like #[error(\"stack underflow\")]",
            )
        })?;
        return match lit {
            Lit::Str(lit_str) => Ok(lit_str.value()),
            _ => Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute: message must be a string literal, e.g. #[error(\"unknown opcode {opcode}\")]",
            )),
        };
    }

    Err(syn::Error::new_spanned(
        target,
        format!(
            "missing #[error(\"...\")] attribute on {}; every error variant must declare a display message",
            target_desc
        ),
    ))
}

/// Named fields of `fields` that appear as `{name}` arguments in `message`.
fn referenced_named_fields<'a>(fields: &'a FieldsNamed, message: &str) -> Vec<&'a Ident> {
    let referenced = referenced_arguments(message);
    fields
        .named
        .iter()
        .filter_map(|field| field.ident.as_ref())
        .filter(|ident| referenced.contains(&ident.to_string()))
        .collect()
}

fn has_source_field(fields: &FieldsNamed) -> bool {
    fields
        .named
        .iter()
        .any(|field| field.ident.as_ref().is_some_and(|i| i == SOURCE_FIELD))
}

/// Collects the argument names used by a format string, in order of first use.
///
/// `{{` escapes are skipped and format specs (`{name:02x}`) are stripped.
fn referenced_arguments(format_str: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = format_str.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            continue;
        }
        let inner: String = chars.by_ref().take_while(|c| *c != '}').collect();
        let name = inner.split(':').next().unwrap_or_default().trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Converts positional format args `{0}`, `{1:x}` to named args `{f0}`, `{f1:x}`.
fn convert_positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result
            .replace(&format!("{{{}}}", i), &format!("{{f{}}}", i))
            .replace(&format!("{{{}:", i), &format!("{{f{}:", i));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenced_arguments_skips_escapes_and_specs() {
        let names = referenced_arguments("{{literal}} {opcode:02x} at {offset} ({opcode})");
        assert_eq!(names, vec!["opcode".to_string(), "offset".to_string()]);
    }

    #[test]
    fn referenced_arguments_empty_message() {
        assert!(referenced_arguments("stack overflow").is_empty());
    }

    #[test]
    fn positional_args_become_named() {
        assert_eq!(
            convert_positional_to_named("{0} then {1:02x}", 2),
            "{f0} then {f1:02x}"
        );
    }

    #[test]
    fn derive_rejects_missing_message() {
        let input: DeriveInput = syn::parse_quote! {
            enum Broken {
                NoMessage,
            }
        };
        assert!(expand_error_derive(&input).is_err());
    }

    #[test]
    fn derive_emits_source_for_source_field() {
        let input: DeriveInput = syn::parse_quote! {
            enum Wrapped {
                #[error("line {line}: {source}")]
                Located { line: usize, source: Box<Wrapped> },
            }
        };
        let tokens = expand_error_derive(&input).map(|t| t.to_string());
        assert!(tokens.is_ok_and(|t| t.contains("fn source")));
    }
}
