use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

pub fn derive_to_value_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(name, "ToValue only supports structs with named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "ToValue only supports structs")
                .to_compile_error()
                .into();
        }
    };

    let mut inserts = Vec::with_capacity(fields.len());
    for field in fields {
        let attrs = match parse_field_attrs(field) {
            Ok(attrs) => attrs,
            Err(e) => return e.to_compile_error().into(),
        };
        if attrs.ignore {
            continue;
        }
        let field_name = &field.ident;
        let key = LitStr::new(&attrs.key, Span::call_site());
        inserts.push(quote! {
            map.insert(
                #key.to_string(),
                ::uliquid::ToValue::to_value(&self.#field_name),
            );
        });
    }

    let capacity = inserts.len();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    TokenStream::from(quote! {
        impl #impl_generics ::uliquid::ToValue for #name #ty_generics #where_clause {
            fn to_value(&self) -> ::uliquid::Value {
                let mut map = ::std::collections::HashMap::with_capacity(#capacity);
                #(#inserts)*
                ::uliquid::Value::Dictionary(map)
            }
        }
    })
}

struct FieldAttrs {
    key: String,
    ignore: bool,
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs {
        key: field
            .ident
            .as_ref()
            .map(|ident| ident.to_string().trim_start_matches("r#").to_string())
            .unwrap_or_default(),
        ignore: false,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("value") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("ignore") {
                attrs.ignore = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let s: LitStr = meta.value()?.parse()?;
                attrs.key = s.value();
                Ok(())
            } else {
                Err(meta.error("expected `rename = \"...\"` or `ignore`"))
            }
        })?;
    }
    Ok(attrs)
}
