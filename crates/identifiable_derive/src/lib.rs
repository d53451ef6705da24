//! Derive macro for `qbin_stable_type_id::Identifiable`.
//!
//! The generated identifier hashes
//! `package@version::module::path::TypeName` at compile time. Type parameters
//! are bounded by `Identifiable` and folded into the identifier, so each
//! instantiation of a generic type gets its own key.
//!
//! ```ignore
//! # use qbin_stable_type_id::Identifiable;
//! #[derive(Identifiable)]
//! struct Container<T> {
//!     value: T,
//! }
//!
//! // Container<i32>::STABLE_TYPE_ID != Container<String>::STABLE_TYPE_ID
//! ```
//!
//! Lifetime and const parameters are rejected:
//!
//! ```compile_fail
//! # use qbin_stable_type_id::Identifiable;
//! #[derive(Identifiable)]
//! struct WithLifetime<'a> {
//!     data: &'a str,
//! }
//! ```

use proc_macro::TokenStream;
use syn::Generics;

/// Derives `Identifiable` for a struct or enum.
///
/// The path of the `qbin_stable_type_id` crate can be overridden with
/// `#[qbin_stable_type_id(path)]`, which is needed inside that crate itself
/// or when it is re-exported under another name.
#[proc_macro_derive(Identifiable, attributes(qbin_stable_type_id))]
pub fn derive_identifiable(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let crate_path: syn::Path = match input
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident("qbin_stable_type_id"))
    {
        Some(attr) => match attr.parse_args::<syn::Path>() {
            Ok(path) => path,
            Err(_) => {
                return syn::Error::new_spanned(
                    attr,
                    "expected `#[qbin_stable_type_id(path::to::crate)]`",
                )
                .to_compile_error()
                .into();
            }
        },
        None => syn::parse_quote!(::qbin_stable_type_id),
    };

    implements_identifiable(&input.ident, input.generics, &crate_path).into()
}

fn implements_identifiable(
    name: &syn::Ident,
    mut generics: Generics,
    crate_path: &syn::Path,
) -> proc_macro2::TokenStream {
    if let Some(lt_param) = generics.lifetimes().next() {
        return syn::Error::new_spanned(
            lt_param,
            "lifetime parameters are not allowed on identifiable types",
        )
        .to_compile_error();
    }
    if let Some(const_param) = generics.const_params().next() {
        return syn::Error::new_spanned(
            const_param,
            "constant parameters are not allowed on identifiable types",
        )
        .to_compile_error();
    }

    let identifiable: syn::Path = syn::parse_quote!(#crate_path::Identifiable);
    let stable_type_id: syn::Path =
        syn::parse_quote!(#crate_path::StableTypeID);

    for ty_param in generics.type_params_mut() {
        ty_param.bounds.push(syn::parse_quote!(#identifiable));
    }

    let type_params = generics.type_params().map(|x| &x.ident);

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    quote::quote! {
        #[allow(clippy::trait_duplication_in_bounds)]
        impl #impl_generics #identifiable for #name #ty_generics #where_clause {
            const STABLE_TYPE_ID: #stable_type_id = {
                let unique_type_name = concat!(
                    env!("CARGO_PKG_NAME"),
                    "@",
                    env!("CARGO_PKG_VERSION"),
                    "::",
                    module_path!(),
                    "::",
                    stringify!(#name),
                );
                #[allow(unused_mut)]
                let mut hash =
                    #stable_type_id::from_unique_type_name(unique_type_name);

                #(
                    hash = <#type_params as #identifiable>::STABLE_TYPE_ID
                        .combine(hash);
                )*

                hash
            };
        }
    }
}
