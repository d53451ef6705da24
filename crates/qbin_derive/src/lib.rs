//! Derive macro for the `Message` trait of `qbin`.
//!
//! `#[derive(Message)]` describes a struct with named fields to the schema
//! reader and implements `Templated` through `StructTemplate`.
//!
//! # Field Attributes
//!
//! | Attribute | Effect |
//! |-----------|--------|
//! | `#[message(ignore)]` | never serialized, no template needed |
//! | `#[message(required)]` | always serialized |
//! | `#[message(optional)]` | nil or missing keeps the default |
//! | `#[message(not_nullable)]` | nil is rejected both ways |
//! | `#[message(transient)]` | excluded unless a type policy applies |
//! | `#[message(index = N)]` | pins the array position |
//! | `#[message(base)]` | the field's own fields come first |
//!
//! Without attributes, `pub` fields are required and the others are not
//! serialized. `Option<_>` fields are nullable.
//!
//! A field's template is looked up only if the schema serializes the field.
//! Fields without `ignore` must still have a `Templated` type, since the
//! policy of a struct embedding this one as `base` may serialize them.
//!
//! # Type Attributes
//!
//! `#[message(policy = "required" | "optional" | "not_nullable" |
//! "ignore")]` applies to every field without explicit markers.
//!
//! # Example
//!
//! ```ignore
//! use qbin::{Identifiable, Message};
//!
//! #[derive(Default, Identifiable, Message)]
//! struct Entity {
//!     pub id: u64,
//! }
//!
//! #[derive(Default, Identifiable, Message)]
//! struct Player {
//!     #[message(base)]
//!     entity: Entity,
//!     #[message(index = 3)]
//!     pub name: String,
//!     pub score: Option<u32>,
//! }
//! // wire layout: [id, hole, hole, name, score]
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Field, Fields, LitInt, LitStr, Token, Type,
    parse_macro_input,
};

/// Markers parsed from `#[message(...)]` on a field.
#[derive(Default)]
#[allow(clippy::struct_excessive_bools)]
struct FieldAttrs {
    ignore: bool,
    required: bool,
    optional: bool,
    not_nullable: bool,
    transient: bool,
    base: bool,
    index: Option<i64>,
}

fn parse_field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("ignore") {
                attrs.ignore = true;
            } else if meta.path.is_ident("required") {
                attrs.required = true;
            } else if meta.path.is_ident("optional") {
                attrs.optional = true;
            } else if meta.path.is_ident("not_nullable") {
                attrs.not_nullable = true;
            } else if meta.path.is_ident("transient") {
                attrs.transient = true;
            } else if meta.path.is_ident("base") {
                attrs.base = true;
            } else if meta.path.is_ident("index") {
                let value = meta.value()?;
                let negative = value.peek(Token![-]);
                if negative {
                    value.parse::<Token![-]>()?;
                }

                let index: i64 = value.parse::<LitInt>()?.base10_parse()?;
                attrs.index = Some(if negative { -index } else { index });
            } else {
                return Err(meta.error("unknown message attribute"));
            }

            Ok(())
        })?;
    }

    Ok(attrs)
}

fn parse_policy(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let mut policy = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident("policy") {
                return Err(meta.error("unknown message attribute"));
            }

            let value: LitStr = meta.value()?.parse()?;
            let variant = match value.value().as_str() {
                "required" => quote!(Required),
                "optional" => quote!(Optional),
                "not_nullable" => quote!(NotNullable),
                "ignore" => quote!(Ignore),
                "default" => quote!(Default),
                _ => {
                    return Err(syn::Error::new_spanned(
                        &value,
                        "expected one of `required`, `optional`, \
                         `not_nullable`, `ignore`, `default`",
                    ));
                }
            };

            policy = Some(quote! {
                .with_policy(::qbin::schema::FieldOption::#variant)
            });
            Ok(())
        })?;
    }

    Ok(policy.unwrap_or_default())
}

/// Whether the field type is spelled `Option<_>`.
fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}

/// Derive macro for `Message`.
///
/// Only structs with named fields are supported. Every field type not
/// marked `ignore` must implement `Templated` and `Default`.
///
/// ```ignore
/// #[derive(Default, Identifiable, Message)]
/// #[message(policy = "optional")]
/// struct Settings {
///     #[message(required)]
///     version: u32,
///     theme: Option<String>,
///     #[message(ignore)]
///     dirty: bool,
/// }
/// ```
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match implements_message(&input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

#[allow(clippy::too_many_lines)]
fn implements_message(
    input: &DeriveInput,
) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Message can only be derived for structs with named \
                     fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Message can only be derived for structs",
            ));
        }
    };

    let policy = parse_policy(input)?;

    let mut base = None;
    let mut decls = Vec::new();
    let mut bindings = Vec::new();

    for field in fields {
        let attrs = parse_field_attrs(field)?;
        let ident = field.ident.as_ref().ok_or_else(|| {
            syn::Error::new_spanned(field, "expected a named field")
        })?;
        let ty = &field.ty;

        if attrs.base {
            if base.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field can be marked `#[message(base)]`",
                ));
            }

            base = Some((ident, ty));
            continue;
        }

        let nullable = is_option(ty);

        let mut decl = quote! {
            ::qbin::schema::FieldDecl::new(::core::stringify!(#ident))
        };
        if matches!(field.vis, syn::Visibility::Public(_)) {
            decl.extend(quote!(.public()));
        }
        if nullable {
            decl.extend(quote!(.nullable()));
        }
        if attrs.transient {
            decl.extend(quote!(.transient()));
        }
        if attrs.ignore {
            decl.extend(quote!(.ignore()));
        }
        if attrs.required {
            decl.extend(quote!(.required()));
        }
        if attrs.optional {
            decl.extend(quote!(.optional()));
        }
        if attrs.not_nullable {
            decl.extend(quote!(.not_nullable()));
        }
        if let Some(index) = attrs.index {
            decl.extend(quote!(.index(#index)));
        }
        decls.push(decl);

        // ignored fields are never part of the schema
        if attrs.ignore {
            continue;
        }

        let nil_check = nullable.then(|| {
            quote! {
                .with_nil_check(|value: &#ty| ::core::option::Option::is_none(value))
            }
        });

        bindings.push(quote! {
            bindings.push(::qbin::message::FieldBinding::<Self>::new(
                ::core::stringify!(#ident),
                |registry: &::qbin::TemplateRegistry| {
                    ::core::result::Result::Ok(
                        ::qbin::message::Field::<Self, #ty>::bind(
                            registry,
                            |value| &value.#ident,
                            |value| &mut value.#ident,
                        )?
                        #nil_check,
                    )
                },
            ));
        });
    }

    let (base_decl, base_bindings) = match base {
        Some((ident, ty)) => (
            quote! {
                .with_base(
                    <#ty as ::qbin::message::Message>::declaration()
                )
            },
            quote! {
                bindings.extend(
                    <#ty as ::qbin::message::Message>::bind_fields()
                        .into_iter()
                        .map(|binding| binding.project::<Self>(
                            |value| &value.#ident,
                            |value| &mut value.#ident,
                        )),
                );
            },
        ),
        None => (quote!(), quote!()),
    };

    let (impl_generics, ty_generics, where_clause) =
        input.generics.split_for_impl();

    let mut where_clause =
        where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));

    for param in &input.generics.params {
        if let syn::GenericParam::Type(type_param) = param {
            let ident = &type_param.ident;
            where_clause.predicates.push(syn::parse_quote!(
                #ident: ::qbin::Templated + ::core::default::Default
            ));
        }
    }

    Ok(quote! {
        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics ::qbin::message::Message for #name #ty_generics
            #where_clause
        {
            fn declaration() -> ::qbin::schema::StructDecl {
                ::qbin::schema::StructDecl::new(::core::stringify!(#name))
                    #policy
                    #base_decl
                    #(.field(#decls))*
            }

            fn bind_fields(
            ) -> ::std::vec::Vec<::qbin::message::FieldBinding<Self>> {
                #[allow(unused_mut)]
                let mut bindings: ::std::vec::Vec<
                    ::qbin::message::FieldBinding<Self>,
                > = ::std::vec::Vec::new();
                #base_bindings
                #(#bindings)*
                bindings
            }
        }

        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics ::qbin::Templated for #name #ty_generics
            #where_clause
        {
            fn build_template(
                registry: &::qbin::TemplateRegistry,
            ) -> ::qbin::Result<
                ::std::sync::Arc<dyn ::qbin::Template<Self>>,
            > {
                ::core::result::Result::Ok(::std::sync::Arc::new(
                    ::qbin::message::StructTemplate::<Self>::build(registry)?,
                ))
            }
        }
    })
}
