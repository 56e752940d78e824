//! Crate path resolution for generated code.
//!
//! Detects whether the user depends on `relata` (facade) or `relata-data`
//! directly, and returns the appropriate path prefix for generated code.

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;

/// Returns the token stream for accessing `relata_data` types.
///
/// If the user depends on `relata`, returns `::relata::relata_data`.
/// Otherwise returns `::relata_data`. Inside `relata` and `relata-data`
/// themselves the path resolves through their `extern crate self` aliases,
/// which also covers their integration tests.
pub fn relata_data_path() -> TokenStream {
    if let Ok(found) = crate_name("relata") {
        match found {
            FoundCrate::Itself => quote!(::relata::relata_data),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident::relata_data)
            }
        }
    } else if let Ok(found) = crate_name("relata-data") {
        match found {
            FoundCrate::Itself => quote!(::relata_data),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else {
        // Fallback - assume relata_data is available (for error messages)
        quote!(::relata_data)
    }
}
