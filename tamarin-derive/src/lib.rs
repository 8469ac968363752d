//! Derive macros for Tamarin arbitrary instance generation.
//!
//! This crate provides `#[derive(Reflect)]`, which describes a struct or a
//! fieldless enum to the engine and converts generated values back into it.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{
    parse_macro_input, parse_quote, Data, DataEnum, DeriveInput, Expr, Fields, Generics, LitStr,
    Token,
};

/// Derive macro implementing `tamarin::Reflect` and `tamarin::IntoValue`.
///
/// Fields may carry `#[reflect(...)]` metadata read by the constraint
/// resolver:
///
/// | attribute                                   | meaning                              |
/// |---------------------------------------------|--------------------------------------|
/// | `not_null`                                  | never null, even for `Option` fields |
/// | `min = expr`, `max = expr`                  | inclusive integer bounds             |
/// | `decimal_min = expr`, `decimal_max = expr`  | inclusive decimal bounds             |
/// | `decimal_min(value = expr, inclusive = b)`  | decimal bound with explicit flag     |
/// | `positive`, `positive_or_zero`              | sign bounds                          |
/// | `negative`, `negative_or_zero`              | sign bounds                          |
/// | `digits(integer = n, fraction = n)`         | decimal digit counts                 |
/// | `size(min = n, max = n)`                    | string length or element count       |
/// | `not_empty`, `not_blank`                    | at least one (visible) element       |
/// | `charset = "numeric"`                       | `alphabetic`, `numeric`, `alphanumeric`, `ascii` |
/// | `past`, `past_or_present`                   | date bounds relative to now          |
/// | `future`, `future_or_present`               | date bounds relative to now          |
/// | `custom(kind = "..", value = "..")`         | metadata for a custom resolver       |
///
/// # Example
///
/// ```rust,ignore
/// use tamarin::Reflect;
///
/// #[derive(Reflect, Debug, Clone, PartialEq)]
/// struct User {
///     #[reflect(size(min = 1, max = 20), not_blank)]
///     name: String,
///     #[reflect(min = 18, max = 120)]
///     age: u32,
///     email: Option<String>,
/// }
///
/// let user: User = tamarin::Tamarin::new().give_me_one()?;
/// ```
#[proc_macro_derive(Reflect, attributes(reflect))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match reflect_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Generate the `Reflect` and `IntoValue` implementations.
fn reflect_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    let name_str = name.to_string();

    let (descriptor, from_value, into_value) = match &input.data {
        Data::Struct(data) => struct_bodies(&name_str, &data.fields)?,
        Data::Enum(data) => enum_bodies(&name_str, data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Reflect derive macro does not support unions",
            ));
        }
    };

    let reflect_generics = bounded(&input.generics, parse_quote!(::tamarin::Reflect));
    let (impl_generics, ty_generics, where_clause) = reflect_generics.split_for_impl();
    let into_generics = bounded(&input.generics, parse_quote!(::tamarin::IntoValue));
    let (into_impl_generics, _, into_where_clause) = into_generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::tamarin::Reflect for #name #ty_generics #where_clause {
            fn descriptor() -> ::tamarin::TypeDescriptor {
                #descriptor
            }

            fn from_value(value: ::tamarin::Value) -> ::tamarin::Result<Self> {
                let value = match value.take_opaque::<Self>() {
                    ::std::result::Result::Ok(built) => return ::std::result::Result::Ok(built),
                    ::std::result::Result::Err(value) => value,
                };
                #from_value
            }
        }

        impl #into_impl_generics ::tamarin::IntoValue for #name #ty_generics #into_where_clause {
            fn into_value(self) -> ::tamarin::Value {
                #into_value
            }
        }
    })
}

/// Add `bound` to every type parameter.
fn bounded(generics: &Generics, bound: syn::TypeParamBound) -> Generics {
    let mut generics = generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(bound.clone());
        param.bounds.push(parse_quote!('static));
    }
    generics
}

/// Descriptor, conversion and decomposition bodies for a struct.
fn struct_bodies(
    name: &str,
    fields: &Fields,
) -> Result<(TokenStream2, TokenStream2, TokenStream2), syn::Error> {
    let members: Vec<(String, TokenStream2)> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|field| field.ident.as_ref())
            .map(|ident| (ident.to_string(), quote!(#ident)))
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| {
                let index = syn::Index::from(i);
                (i.to_string(), quote!(#index))
            })
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let descriptors = fields
        .iter()
        .zip(&members)
        .map(|(field, (field_name, _))| {
            let ty = &field.ty;
            let metadata = field_metadata(field)?;
            Ok(quote! {
                ::tamarin::FieldDescriptor::new(#field_name, <#ty as ::tamarin::Reflect>::descriptor)
                    .with_metadata(::std::vec![#(#metadata),*])
            })
        })
        .collect::<Result<Vec<_>, syn::Error>>()?;

    let descriptor = quote! {
        ::tamarin::TypeDescriptor::record::<Self>(#name, ::std::vec![#(#descriptors),*])
    };

    let takes = members
        .iter()
        .map(|(field_name, _)| quote! { fields.take(#field_name)? });
    let construct = match fields {
        Fields::Named(_) => {
            let idents = members.iter().map(|(_, member)| member);
            quote! { Self { #(#idents: #takes),* } }
        }
        Fields::Unnamed(_) => quote! { Self(#(#takes),*) },
        Fields::Unit => quote! { Self },
    };
    let from_value = quote! {
        #[allow(unused_mut, unused_variables)]
        let mut fields = ::tamarin::RecordFields::new::<Self>(value)?;
        ::std::result::Result::Ok(#construct)
    };

    let entries = members.iter().map(|(field_name, member)| {
        quote! {
            (::std::string::String::from(#field_name), ::tamarin::IntoValue::into_value(self.#member))
        }
    });
    let into_value = quote! {
        ::tamarin::Value::Record(::std::vec![#(#entries),*])
    };

    Ok((descriptor, from_value, into_value))
}

/// Descriptor, conversion and decomposition bodies for a fieldless enum.
fn enum_bodies(
    name: &str,
    data: &DataEnum,
) -> Result<(TokenStream2, TokenStream2, TokenStream2), syn::Error> {
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Reflect derive macro only supports enums without fields",
            ));
        }
    }
    let idents: Vec<_> = data.variants.iter().map(|variant| &variant.ident).collect();
    let labels: Vec<String> = idents.iter().map(|ident| ident.to_string()).collect();

    let descriptor = quote! {
        ::tamarin::TypeDescriptor::enumeration::<Self>(#name, ::std::vec![#(#labels),*])
    };
    let from_value = quote! {
        match value {
            ::tamarin::Value::Variant(label) => match label.as_str() {
                #(#labels => ::std::result::Result::Ok(Self::#idents),)*
                other => ::std::result::Result::Err(::tamarin::TamarinError::Conversion {
                    expected: ::std::string::String::from(#name),
                    found: ::std::format!("variant `{}`", other),
                }),
            },
            other => ::std::result::Result::Err(::tamarin::TamarinError::Conversion {
                expected: ::std::string::String::from(#name),
                found: ::std::string::String::from(other.kind_name()),
            }),
        }
    };
    let into_value = quote! {
        let label = match self {
            #(Self::#idents => #labels,)*
        };
        ::tamarin::Value::Variant(::std::string::String::from(label))
    };

    Ok((descriptor, from_value, into_value))
}

/// Parse the `#[reflect(...)]` attributes of one field into metadata expressions.
fn field_metadata(field: &syn::Field) -> Result<Vec<TokenStream2>, syn::Error> {
    let mut metadata = Vec::new();
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("reflect")) {
        attr.parse_nested_meta(|meta| {
            metadata.push(metadata_entry(&meta)?);
            Ok(())
        })?;
    }
    Ok(metadata)
}

fn metadata_entry(meta: &ParseNestedMeta<'_>) -> Result<TokenStream2, syn::Error> {
    let flag = |variant: &str| -> TokenStream2 {
        let variant = syn::Ident::new(variant, proc_macro2::Span::call_site());
        quote! { ::tamarin::Metadata::#variant }
    };
    let Some(key) = meta.path.get_ident().map(|ident| ident.to_string()) else {
        return Err(meta.error("expected a reflect attribute name"));
    };
    let entry = match key.as_str() {
        "not_null" => flag("NotNull"),
        "positive" => flag("Positive"),
        "positive_or_zero" => flag("PositiveOrZero"),
        "negative" => flag("Negative"),
        "negative_or_zero" => flag("NegativeOrZero"),
        "not_empty" => flag("NotEmpty"),
        "not_blank" => flag("NotBlank"),
        "past" => flag("Past"),
        "past_or_present" => flag("PastOrPresent"),
        "future" => flag("Future"),
        "future_or_present" => flag("FutureOrPresent"),
        "min" => {
            let value: Expr = meta.value()?.parse()?;
            quote! { ::tamarin::Metadata::Min((#value) as i128) }
        }
        "max" => {
            let value: Expr = meta.value()?.parse()?;
            quote! { ::tamarin::Metadata::Max((#value) as i128) }
        }
        "decimal_min" => {
            let (value, inclusive) = decimal_bound(meta)?;
            quote! { ::tamarin::Metadata::DecimalMin { value: (#value) as f64, inclusive: #inclusive } }
        }
        "decimal_max" => {
            let (value, inclusive) = decimal_bound(meta)?;
            quote! { ::tamarin::Metadata::DecimalMax { value: (#value) as f64, inclusive: #inclusive } }
        }
        "digits" => {
            let mut integer: Option<Expr> = None;
            let mut fraction: Option<Expr> = None;
            meta.parse_nested_meta(|inner| {
                if inner.path.is_ident("integer") {
                    integer = Some(inner.value()?.parse()?);
                } else if inner.path.is_ident("fraction") {
                    fraction = Some(inner.value()?.parse()?);
                } else {
                    return Err(inner.error("expected `integer` or `fraction`"));
                }
                Ok(())
            })?;
            let (Some(integer), Some(fraction)) = (integer, fraction) else {
                return Err(meta.error("digits needs both `integer` and `fraction`"));
            };
            quote! {
                ::tamarin::Metadata::Digits { integer: (#integer) as u32, fraction: (#fraction) as u32 }
            }
        }
        "size" => {
            let mut min: Option<Expr> = None;
            let mut max: Option<Expr> = None;
            meta.parse_nested_meta(|inner| {
                if inner.path.is_ident("min") {
                    min = Some(inner.value()?.parse()?);
                } else if inner.path.is_ident("max") {
                    max = Some(inner.value()?.parse()?);
                } else {
                    return Err(inner.error("expected `min` or `max`"));
                }
                Ok(())
            })?;
            let min = min.map_or_else(|| quote!(0usize), |min| quote!((#min) as usize));
            let max = max.map_or_else(|| quote!(usize::MAX), |max| quote!((#max) as usize));
            quote! { ::tamarin::Metadata::Size { min: #min, max: #max } }
        }
        "charset" => {
            let name: LitStr = meta.value()?.parse()?;
            let variant = match name.value().as_str() {
                "alphabetic" => "Alphabetic",
                "numeric" => "Numeric",
                "alphanumeric" => "Alphanumeric",
                "ascii" => "Ascii",
                _ => {
                    return Err(syn::Error::new_spanned(
                        name,
                        "expected \"alphabetic\", \"numeric\", \"alphanumeric\" or \"ascii\"",
                    ))
                }
            };
            let variant = syn::Ident::new(variant, name.span());
            quote! { ::tamarin::Metadata::Charset(::tamarin::CharSet::#variant) }
        }
        "custom" => {
            let mut kind: Option<LitStr> = None;
            let mut value: Option<LitStr> = None;
            meta.parse_nested_meta(|inner| {
                if inner.path.is_ident("kind") {
                    kind = Some(inner.value()?.parse()?);
                } else if inner.path.is_ident("value") {
                    value = Some(inner.value()?.parse()?);
                } else {
                    return Err(inner.error("expected `kind` or `value`"));
                }
                Ok(())
            })?;
            let Some(kind) = kind else {
                return Err(meta.error("custom metadata needs a `kind`"));
            };
            let value = value.map_or_else(String::new, |value| value.value());
            quote! {
                ::tamarin::Metadata::Custom {
                    kind: ::std::string::String::from(#kind),
                    value: ::std::string::String::from(#value),
                }
            }
        }
        other => return Err(meta.error(format!("unknown reflect attribute `{other}`"))),
    };
    Ok(entry)
}

/// `decimal_min = expr` (inclusive) or `decimal_min(value = expr, inclusive = bool)`.
fn decimal_bound(meta: &ParseNestedMeta<'_>) -> Result<(Expr, syn::LitBool), syn::Error> {
    if meta.input.peek(Token![=]) {
        let value: Expr = meta.value()?.parse()?;
        return Ok((value, syn::LitBool::new(true, proc_macro2::Span::call_site())));
    }
    let mut value: Option<Expr> = None;
    let mut inclusive = syn::LitBool::new(true, proc_macro2::Span::call_site());
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("value") {
            value = Some(inner.value()?.parse()?);
        } else if inner.path.is_ident("inclusive") {
            inclusive = inner.value()?.parse()?;
        } else {
            return Err(inner.error("expected `value` or `inclusive`"));
        }
        Ok(())
    })?;
    let value = value.ok_or_else(|| meta.error("decimal bound needs a `value`"))?;
    Ok((value, inclusive))
}
