use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Fields, LitStr, parse_macro_input};

mod shape;

/// Attribute macro that turns a struct into a registrable astral object.
///
/// This is syntax sugar that expands to:
/// ```ignore
/// #[derive(Debug, Clone, Default, Objectify)]
/// #[astral(type = "name")]
/// ```
///
/// # Example
///
/// ```ignore
/// use astral_core::object;
///
/// #[object("point")]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
/// ```
#[proc_macro_attribute]
pub fn object(attr: TokenStream, item: TokenStream) -> TokenStream {
    let type_name = parse_macro_input!(attr as LitStr);
    let input = parse_macro_input!(item as DeriveInput);

    let output = quote! {
        #[derive(
            ::std::fmt::Debug,
            ::std::clone::Clone,
            ::std::default::Default,
            ::astral_core::Objectify
        )]
        #[astral(type = #type_name)]
        #input
    };

    output.into()
}

/// Derive macro for the `Objectify` trait.
///
/// Records encode their fields in declaration order with no framing. In JSON,
/// structs with named fields are objects keyed by field name and tuple structs
/// are arrays.
///
/// # Example
///
/// ```ignore
/// use astral_core::Objectify;
///
/// #[derive(Debug, Clone, Default, Objectify)]
/// #[astral(type = "note")]
/// struct Note {
///     title: String,
///     #[astral(rename = "body")]
///     text: String,
///     #[astral(skip)]
///     cached_len: usize,
/// }
/// ```
///
/// # Attributes
///
/// On the struct:
/// - `#[astral(type = "name")]` - Register as an object type; also implements `Object`
/// - `#[astral(opaque)]` - Nested occurrences defer to the type's own `Object`
///   impl, which must be written by hand; requires `type`
/// - `#[astral(crate = "path")]` - Path of the core crate (default `::astral_core`)
///
/// On fields:
/// - `#[astral(skip)]` - Leave the field out of every encoding
/// - `#[astral(rename = "name")]` - Use a custom name in JSON and the shape
#[proc_macro_derive(Objectify, attributes(astral))]
pub fn derive_objectify(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_objectify_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_objectify_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let data = match &input.data {
        syn::Data::Struct(data) => data,
        syn::Data::Enum(_) => {
            return Err(syn::Error::new_spanned(input, "Objectify cannot be derived for enums"));
        }
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(input, "Objectify cannot be derived for unions"));
        }
    };

    let container = parse_container_attrs(input)?;
    let krate = &container.krate;
    let name = &input.ident;
    let record = name.to_string();
    let fields = collect_fields(&data.fields)?;

    let where_objectify = build_where_clause(input, &fields, krate, false);
    let (impl_generics, ty_generics, _) = input.generics.split_for_impl();

    let type_name = container.type_name.as_ref().map(LitStr::value).unwrap_or_default();
    let shape = match (&container.type_name, container.opaque) {
        (Some(type_name), true) => quote! { #krate::Shape::object(#type_name) },
        _ => shape::struct_shape(name, data, krate)?,
    };

    let writes = fields.iter().map(|f| {
        let access = &f.access;
        quote! { + #krate::Objectify::write_value(&self.#access, w)? }
    });
    let reads = fields.iter().map(|f| {
        let access = &f.access;
        quote! { + #krate::Objectify::read_value(&mut self.#access, src)? }
    });
    let (to_json, from_json) = json_bodies(&data.fields, &fields, &record, krate);

    let walk = quote! {
        fn write_root(&self, w: &mut dyn ::std::io::Write) -> #krate::Result<u64> {
            let _ = &w;
            Ok(0u64 #(#writes)*)
        }

        fn read_root(&mut self, src: &mut #krate::Source<'_>) -> #krate::Result<u64> {
            let _ = &src;
            Ok(0u64 #(#reads)*)
        }

        fn json_root(&self) -> #krate::Result<#krate::json::Value> {
            #to_json
        }

        fn set_json_root(
            &mut self,
            value: &#krate::json::Value,
            blueprints: &#krate::Blueprints,
        ) -> #krate::Result<()> {
            let _ = blueprints;
            #from_json
        }
    };

    // Opaque records are values through their Object impl and walk their
    // fields only at the root.
    let values = if container.opaque {
        quote! {
            fn write_value(&self, w: &mut dyn ::std::io::Write) -> #krate::Result<u64> {
                #krate::Object::write_to(self, w)
            }

            fn read_value(&mut self, src: &mut #krate::Source<'_>) -> #krate::Result<u64> {
                #krate::Object::read_from(self, src)
            }

            fn json_value(&self) -> #krate::Result<#krate::json::Value> {
                #krate::Object::to_json(self)
            }

            fn set_json_value(
                &mut self,
                value: &#krate::json::Value,
                blueprints: &#krate::Blueprints,
            ) -> #krate::Result<()> {
                #krate::Object::from_json(self, value, blueprints)
            }
        }
    } else {
        quote! {
            fn write_value(&self, w: &mut dyn ::std::io::Write) -> #krate::Result<u64> {
                #krate::Objectify::write_root(self, w)
            }

            fn read_value(&mut self, src: &mut #krate::Source<'_>) -> #krate::Result<u64> {
                #krate::Objectify::read_root(self, src)
            }

            fn json_value(&self) -> #krate::Result<#krate::json::Value> {
                #krate::Objectify::json_root(self)
            }

            fn set_json_value(
                &mut self,
                value: &#krate::json::Value,
                blueprints: &#krate::Blueprints,
            ) -> #krate::Result<()> {
                #krate::Objectify::set_json_root(self, value, blueprints)
            }
        }
    };

    let objectify = quote! {
        impl #impl_generics #krate::Objectify for #name #ty_generics #where_objectify {
            fn shape() -> #krate::Shape {
                #shape
            }

            fn type_name(&self) -> &str {
                #type_name
            }

            #values
            #walk
        }
    };

    // Opaque types bring their own Object impl.
    let object = match (&container.type_name, container.opaque) {
        (Some(type_name), false) => {
            let where_object = build_where_clause(input, &fields, krate, true);
            quote! {
                impl #impl_generics #krate::Object for #name #ty_generics #where_object {
                    fn object_type(&self) -> &str {
                        #type_name
                    }

                    fn write_to(&self, w: &mut dyn ::std::io::Write) -> #krate::Result<u64> {
                        #krate::Objectify::write_root(self, w)
                    }

                    fn read_from(&mut self, src: &mut #krate::Source<'_>) -> #krate::Result<u64> {
                        #krate::Objectify::read_root(self, src)
                    }

                    fn to_json(&self) -> #krate::Result<#krate::json::Value> {
                        #krate::Objectify::json_root(self)
                    }

                    fn from_json(
                        &mut self,
                        value: &#krate::json::Value,
                        blueprints: &#krate::Blueprints,
                    ) -> #krate::Result<()> {
                        #krate::Objectify::set_json_root(self, value, blueprints)
                    }
                }
            }
        }
        _ => quote! {},
    };

    Ok(quote! {
        #objectify
        #object
    })
}

/// Bodies of `json_root` and `set_json_root`.
fn json_bodies(
    shape: &Fields,
    fields: &[Field],
    record: &str,
    krate: &TokenStream2,
) -> (TokenStream2, TokenStream2) {
    match shape {
        Fields::Unnamed(_) => {
            let len = fields.len();
            let to = fields.iter().map(|f| {
                let access = &f.access;
                quote! { #krate::Objectify::json_value(&self.#access)? }
            });
            let from = fields.iter().enumerate().map(|(i, f)| {
                let access = &f.access;
                quote! { #krate::Objectify::set_json_value(&mut self.#access, &items[#i], blueprints)?; }
            });
            (
                quote! {
                    Ok(#krate::json::Value::Array(::std::vec![#(#to),*]))
                },
                quote! {
                    let Some(items) = #krate::json::tuple_fields(value, #record, #len)? else {
                        return Ok(());
                    };
                    let _ = &items;
                    #(#from)*
                    Ok(())
                },
            )
        }
        _ => {
            let to = fields.iter().map(|f| {
                let (access, key) = (&f.access, &f.name);
                quote! {
                    fields.insert(
                        ::std::string::String::from(#key),
                        #krate::Objectify::json_value(&self.#access)?,
                    );
                }
            });
            let from = fields.iter().map(|f| {
                let (access, key) = (&f.access, &f.name);
                quote! {
                    if let Some(field) = fields.get(#key) {
                        #krate::Objectify::set_json_value(&mut self.#access, field, blueprints)?;
                    }
                }
            });
            (
                quote! {
                    #[allow(unused_mut)]
                    let mut fields = #krate::json::Map::new();
                    #(#to)*
                    Ok(#krate::json::Value::Object(fields))
                },
                quote! {
                    let Some(fields) = #krate::json::record_fields(value, #record)? else {
                        return Ok(());
                    };
                    let _ = &fields;
                    #(#from)*
                    Ok(())
                },
            )
        }
    }
}

/// An encoded field: how to reach it on `self` and its name in JSON.
struct Field {
    access: TokenStream2,
    name: String,
    ty: syn::Type,
}

fn collect_fields(fields: &Fields) -> syn::Result<Vec<Field>> {
    let mut out = Vec::new();
    for (i, f) in fields.iter().enumerate() {
        let attrs = parse_field_attrs(&f.attrs)?;
        if attrs.skip {
            continue;
        }
        let access = match &f.ident {
            Some(ident) => quote! { #ident },
            None => {
                let index = syn::Index::from(i);
                quote! { #index }
            }
        };
        out.push(Field {
            access,
            name: shape::field_name(f, &attrs),
            ty: f.ty.clone(),
        });
    }
    Ok(out)
}

/// Bounds every type parameter and every field type built from one, so
/// containers such as `Vec<T>` carry their own requirements on `T`.
/// Field types that refer back to the record are left unbounded.
fn build_where_clause(input: &DeriveInput, fields: &[Field], krate: &TokenStream2, object: bool) -> TokenStream2 {
    let generics = &input.generics;
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();
    let existing = generics.where_clause.as_ref();

    if type_params.is_empty() && existing.is_none() {
        return quote! {};
    }

    let mut bounded = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for p in &type_params {
        if seen.insert(p.to_string()) {
            bounded.push(quote! { #p });
        }
    }
    for f in fields {
        let generic = shape::mentions(&f.ty, |ident| type_params.iter().any(|p| *p == ident));
        let recursive = shape::mentions(&f.ty, |ident| *ident == input.ident || ident == "Self");
        let ty = &f.ty;
        if generic && !recursive && seen.insert(quote! { #ty }.to_string()) {
            bounded.push(quote! { #ty });
        }
    }
    let bounds = bounded.iter().map(|ty| quote! { #ty: #krate::Objectify });

    let existing_predicates = existing
        .map(|w| {
            let predicates = w.predicates.iter();
            quote! { #(#predicates,)* }
        })
        .unwrap_or_default();

    let object_bounds = if object && !type_params.is_empty() {
        quote! {
            Self: ::std::clone::Clone
                + ::std::fmt::Debug
                + ::std::marker::Send
                + ::std::marker::Sync
                + 'static,
        }
    } else {
        quote! {}
    };

    quote! {
        where
            #existing_predicates
            #object_bounds
            #(#bounds),*
    }
}

struct ContainerAttrs {
    type_name: Option<LitStr>,
    opaque: bool,
    krate: TokenStream2,
}

fn parse_container_attrs(input: &DeriveInput) -> syn::Result<ContainerAttrs> {
    let mut type_name = None;
    let mut opaque = false;
    let mut krate = quote! { ::astral_core };

    for attr in &input.attrs {
        if !attr.path().is_ident("astral") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("object type must not be empty"));
                }
                type_name = Some(value);
            } else if meta.path.is_ident("opaque") {
                opaque = true;
            } else if meta.path.is_ident("crate") {
                let value: LitStr = meta.value()?.parse()?;
                let path: syn::Path = value.parse()?;
                krate = quote! { #path };
            } else {
                return Err(meta.error("unknown astral attribute"));
            }
            Ok(())
        })?;
    }

    if opaque && type_name.is_none() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "#[astral(opaque)] requires #[astral(type = \"...\")]",
        ));
    }

    Ok(ContainerAttrs {
        type_name,
        opaque,
        krate,
    })
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
    pub rename: Option<String>,
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("astral") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
            } else {
                return Err(meta.error("unknown astral field attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}
