mod value;

use proc_macro::TokenStream;

/// Implements `uliquid::ToValue` for a struct with named fields, producing a
/// `Value::Dictionary` keyed by field name.
///
/// Field attributes:
/// * `#[value(rename = "key")]` stores the field under `key`.
/// * `#[value(ignore)]` leaves the field out.
#[proc_macro_derive(ToValue, attributes(value))]
pub fn derive_to_value(input: TokenStream) -> TokenStream {
    value::derive_to_value_impl(input)
}
