// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use proc_macro::TokenStream;
use quote::format_ident;
use quote::quote;
use syn::DeriveInput;
use syn::Field;
use syn::FieldsNamed;
use syn::FieldsUnnamed;
use syn::Ident;
use syn::parse_macro_input;

/// Generate a [`deparser::engine::counter::CounterProvider`]
/// implementation given a struct of named fields of type
/// [`deparser::engine::counter::WrapCounter`].
///
/// ```Rust
/// #[derive(CounterProvider)]
/// struct EgressCounters {
///     phv: WrapCounter<48>,
///     hdr_too_long: WrapCounter<16>,
/// }
/// ```
///
/// This macro generates the following code based on the struct above.
///
/// ```Rust
/// #[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
/// pub struct EgressCountersSnap {
///     pub phv: u64,
///     pub hdr_too_long: u64,
/// }
///
/// impl EgressCountersSnap {
///     pub fn pairs(&self) -> [(&'static str, u64); 2] { ... }
/// }
///
/// impl CounterProvider for EgressCounters {
///     const NUM_FIELDS: u32 = 2;
///     const NAMES: &'static [&'static str] = &["phv", "hdr_too_long"];
///     type Snap = EgressCountersSnap;
///
///     fn new() -> Self {
///         Self {
///             phv: WrapCounter::new(),
///             hdr_too_long: WrapCounter::new(),
///         }
///     }
///
///     fn snapshot(&self) -> Self::Snap { ... }
///     fn counter(&self, name: &str) -> Option<&dyn Counter> { ... }
///     fn counter_mut(&mut self, name: &str) -> Option<&mut dyn Counter> {
///         ...
///     }
/// }
/// ````
#[proc_macro_derive(CounterProvider)]
pub fn derive_counter_provider(input: TokenStream) -> TokenStream {
    let DeriveInput { ident, data, .. } = parse_macro_input!(input);
    let fields: Vec<Field> = match data {
        syn::Data::Struct(s) => match s.fields {
            syn::Fields::Named(FieldsNamed { named, .. }) => {
                named.into_iter().collect()
            }

            syn::Fields::Unnamed(FieldsUnnamed { unnamed: _, .. }) => {
                panic!("A CounterProvider cannot have unnamed fields");
            }

            syn::Fields::Unit => {
                panic!("A unit struct cannot be a CounterProvider");
            }
        },

        _ => panic!("Only a struct may be a CounterProvider"),
    };

    let num_fields = fields.len() as u32;
    let num_fields_usize = fields.len();
    let fields_ident: Vec<Ident> =
        fields.iter().map(|f| f.ident.clone().unwrap()).collect();
    let fields_name: Vec<String> =
        fields_ident.iter().map(|i| i.to_string()).collect();
    let ident_snap = format_ident!("{}Snap", ident);

    let output = quote! {
        #[derive(Clone, Debug, Default, Eq, PartialEq, ::serde::Serialize)]
        pub struct #ident_snap {
            #( pub #fields_ident: u64, )*
        }

        impl #ident_snap {
            /// The counter values paired with their names, in
            /// declaration order.
            pub fn pairs(&self) -> [(&'static str, u64); #num_fields_usize] {
                [ #( (#fields_name, self.#fields_ident), )* ]
            }
        }

        impl ::deparser::engine::counter::CounterProvider for #ident {
            const NUM_FIELDS: u32 = #num_fields;
            const NAMES: &'static [&'static str] = &[ #( #fields_name, )* ];
            type Snap = #ident_snap;

            fn new() -> Self {
                use ::deparser::engine::counter::WrapCounter;

                Self {
                    #( #fields_ident: WrapCounter::new(), )*
                }
            }

            fn snapshot(&self) -> Self::Snap {
                #ident_snap {
                    #( #fields_ident: self.#fields_ident.val(), )*
                }
            }

            fn counter(
                &self,
                name: &str,
            ) -> Option<&dyn ::deparser::engine::counter::Counter> {
                match name {
                    #( #fields_name => Some(&self.#fields_ident), )*
                    _ => None,
                }
            }

            fn counter_mut(
                &mut self,
                name: &str,
            ) -> Option<&mut dyn ::deparser::engine::counter::Counter> {
                match name {
                    #( #fields_name => Some(&mut self.#fields_ident), )*
                    _ => None,
                }
            }
        }
    };

    output.into()
}
