use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Ident, LitStr};

pub fn derive_read_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let fields = named_fields(input)?;
    let collection = collection_name(input)?;
    let id_field = id_field(input, &fields)?;
    let indexed = indexed_fields(&fields)?;

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::view_store::ReadModel for #name #ty_generics #where_clause {
            const COLLECTION: &'static str = #collection;
            const INDEXED_FIELDS: &'static [&'static str] = &[#(#indexed),*];

            fn id(&self) -> &str {
                &self.#id_field
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> syn::Result<Vec<&Field>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => Ok(named.named.iter().collect()),
            _ => Err(syn::Error::new_spanned(
                &input.ident,
                "ReadModel derive requires a struct with named fields",
            )),
        },
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            "ReadModel derive only supports structs",
        )),
    }
}

/// Flags set by `#[readmodel(...)]` on a field.
#[derive(Default)]
struct FieldFlags {
    id: bool,
    index: bool,
}

fn field_flags(field: &Field) -> syn::Result<FieldFlags> {
    let mut flags = FieldFlags::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("readmodel")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                flags.id = true;
                Ok(())
            } else if meta.path.is_ident("index") {
                flags.index = true;
                Ok(())
            } else {
                Err(meta.error("expected `id` or `index`"))
            }
        })?;
    }
    Ok(flags)
}

fn collection_name(input: &DeriveInput) -> syn::Result<String> {
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("readmodel")) {
        let mut collection = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;
        if let Some(collection) = collection {
            return Ok(collection);
        }
    }

    Ok(format!("{}s", to_snake_case(&input.ident.to_string())))
}

fn id_field<'a>(input: &DeriveInput, fields: &[&'a Field]) -> syn::Result<&'a Ident> {
    for field in fields.iter().copied() {
        if field_flags(field)?.id {
            return field
                .ident
                .as_ref()
                .ok_or_else(|| syn::Error::new_spanned(field, "id field must be named"));
        }
    }

    fields
        .iter()
        .copied()
        .filter_map(|field| field.ident.as_ref())
        .find(|ident| *ident == "id")
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "ReadModel derive: no field marked with #[readmodel(id)] and no field named `id`",
            )
        })
}

fn indexed_fields(fields: &[&Field]) -> syn::Result<Vec<String>> {
    let mut indexed = Vec::new();
    for field in fields {
        if field_flags(field)?.index {
            if let Some(ident) = &field.ident {
                indexed.push(ident.to_string());
            }
        }
    }
    Ok(indexed)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
