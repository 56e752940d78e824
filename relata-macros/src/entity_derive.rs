use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::crate_path::relata_data_path;

pub fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match generate(&input) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parsed information about a single mapped field.
struct FieldInfo {
    ident: syn::Ident,
    /// Rust name without the `r#` prefix.
    name: String,
    /// Column override from `#[column("...")]`.
    column: Option<String>,
    identity: bool,
}

impl FieldInfo {
    fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// `#[table("...")]` on the struct, defaulting to the struct's own name.
fn extract_table(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if attr.path().is_ident("table") {
            let lit: syn::LitStr = attr.parse_args()?;
            return Ok(lit.value());
        }
    }
    Ok(input.ident.unraw().to_string())
}

fn extract_fields(input: &DeriveInput) -> syn::Result<Vec<FieldInfo>> {
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "#[derive(Entity)] requires named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "#[derive(Entity)] can only be used on structs",
            ))
        }
    };

    let mut fields = Vec::with_capacity(named.len());
    for field in named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let mut column = None;
        let mut identity = false;
        for attr in &field.attrs {
            if attr.path().is_ident("column") {
                let lit: syn::LitStr = attr.parse_args()?;
                if lit.value().is_empty() {
                    return Err(syn::Error::new_spanned(lit, "column name must not be empty"));
                }
                column = Some(lit.value());
            } else if attr.path().is_ident("identity") {
                attr.meta.require_path_only()?;
                identity = true;
            }
        }
        fields.push(FieldInfo {
            name: ident.unraw().to_string(),
            ident,
            column,
            identity,
        });
    }
    Ok(fields)
}

fn generate(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[derive(Entity)] does not support generic structs",
        ));
    }

    let name = &input.ident;
    let table = extract_table(input)?;
    let fields = extract_fields(input)?;
    let krate = relata_data_path();

    let metas = fields.iter().map(|f| {
        let field_name = &f.name;
        let column = f.column.as_ref().map(|c| quote!(.column(#c)));
        let identity = f.identity.then(|| quote!(.identity()));
        quote! { #krate::FieldMeta::new(#field_name) #column #identity }
    });

    let setter_arms = fields.iter().map(|f| {
        let ident = &f.ident;
        let field_name = &f.name;
        let column = f.column_name();
        quote! {
            #field_name => {
                let set: #krate::Setter<Self> = |entity, value| {
                    entity.#ident = #krate::convert(value, #column)?;
                    ::core::result::Result::Ok(())
                };
                ::core::option::Option::Some(set)
            }
        }
    });

    let assign_body = if fields.is_empty() {
        quote! {
            let _ = (field, value);
            ::core::result::Result::Ok(false)
        }
    } else {
        let arms = fields.iter().map(|f| {
            let ident = &f.ident;
            let field_name = &f.name;
            let column = f.column_name();
            quote! { #field_name => self.#ident = #krate::convert(value, #column)?, }
        });
        quote! {
            match field {
                #(#arms)*
                _ => return ::core::result::Result::Ok(false),
            }
            ::core::result::Result::Ok(true)
        }
    };

    let get_arms = fields.iter().map(|f| {
        let ident = &f.ident;
        let field_name = &f.name;
        quote! {
            #field_name => ::core::option::Option::Some(#krate::Value::from(::core::clone::Clone::clone(&self.#ident))),
        }
    });

    let param_inserts = fields.iter().map(|f| {
        let ident = &f.ident;
        let column = f.column_name();
        quote! { params.insert(#column, ::core::clone::Clone::clone(&self.#ident)); }
    });

    let lookup_body = if fields.is_empty() {
        quote! {
            let _ = name;
            ::core::option::Option::None
        }
    } else {
        let lookups = fields.iter().map(|f| {
            let ident = &f.ident;
            let field_name = &f.name;
            let column = f.column_name();
            quote! {
                if name.eq_ignore_ascii_case(#field_name) || name.eq_ignore_ascii_case(#column) {
                    return ::core::option::Option::Some(#krate::Value::from(::core::clone::Clone::clone(&self.#ident)));
                }
            }
        });
        quote! {
            let name = #krate::params::normalize_name(name);
            #(#lookups)*
            ::core::option::Option::None
        }
    };

    let handles = fields.iter().map(|f| {
        let field_name = &f.name;
        let const_name = format_ident!("{}", f.name.to_uppercase());
        let doc = format!("Column handle for `{}` (`{}`).", f.name, f.column_name());
        quote! {
            #[doc = #doc]
            pub const #const_name: #krate::Column<Self> = #krate::Column::new(#field_name);
        }
    });

    let field_count = fields.len();

    Ok(quote! {
        impl #krate::Entity for #name {
            fn table_name() -> &'static str {
                #table
            }

            fn fields() -> &'static [#krate::FieldMeta] {
                const FIELDS: &[#krate::FieldMeta] = &[#(#metas),*];
                FIELDS
            }

            fn setter(field: &str) -> ::core::option::Option<#krate::Setter<Self>> {
                match field {
                    #(#setter_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn assign(
                &mut self,
                field: &str,
                value: #krate::Value,
            ) -> ::core::result::Result<bool, #krate::DataError> {
                #assign_body
            }

            fn get(&self, field: &str) -> ::core::option::Option<#krate::Value> {
                match field {
                    #(#get_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl #krate::ToParams for #name {
            fn to_params(&self) -> #krate::Params {
                #[allow(unused_mut)]
                let mut params = #krate::Params::with_capacity(#field_count);
                #(#param_inserts)*
                params
            }

            fn lookup(&self, name: &str) -> ::core::option::Option<#krate::Value> {
                #lookup_body
            }
        }

        #[allow(dead_code)]
        impl #name {
            #(#handles)*
        }
    })
}
