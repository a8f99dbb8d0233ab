use proc_macro2::TokenStream;
use quote::quote;
use syn::{DataStruct, Fields, Type};

use crate::{FieldAttrs, parse_field_attrs};

/// The `Shape` expression describing the fields of a struct.
pub fn struct_shape(self_type: &syn::Ident, data: &DataStruct, krate: &TokenStream) -> syn::Result<TokenStream> {
    Ok(match &data.fields {
        Fields::Named(_) => {
            let mut fields = Vec::new();
            for f in &data.fields {
                let attrs = parse_field_attrs(&f.attrs)?;
                if attrs.skip {
                    continue;
                }
                let name = field_name(f, &attrs);
                let shape = type_to_shape(&f.ty, self_type, krate)?;
                fields.push(quote! { (#name, #shape) });
            }
            quote! {
                #krate::Shape::record(
                    ::std::vec::Vec::<(&'static str, #krate::Shape)>::from([#(#fields),*])
                )
            }
        }
        Fields::Unnamed(_) => {
            let mut elements = Vec::new();
            for f in &data.fields {
                if parse_field_attrs(&f.attrs)?.skip {
                    continue;
                }
                elements.push(type_to_shape(&f.ty, self_type, krate)?);
            }
            quote! {
                #krate::Shape::tuple(::std::vec::Vec::<#krate::Shape>::from([#(#elements),*]))
            }
        }
        Fields::Unit => quote! {
            #krate::Shape::record(::std::vec::Vec::<(&'static str, #krate::Shape)>::new())
        },
    })
}

pub fn field_name(field: &syn::Field, attrs: &FieldAttrs) -> String {
    match (&attrs.rename, &field.ident) {
        (Some(rename), _) => rename.clone(),
        (None, Some(ident)) => ident.to_string(),
        (None, None) => String::new(),
    }
}

/// Convert a field type to its Shape expression.
/// Self-references become SelfRef(0) so recursive records have a finite shape.
/// A self-reference inside a container the derive cannot see through is an error.
fn type_to_shape(ty: &Type, self_type: &syn::Ident, krate: &TokenStream) -> syn::Result<TokenStream> {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => {
            if is_self_reference(type_path, self_type) {
                return Ok(quote! { #krate::Shape::SelfRef(0) });
            }

            if let Some(segment) = type_path.path.segments.last() {
                let args = generic_args(&segment.arguments);
                match (segment.ident.to_string().as_str(), args.as_slice()) {
                    ("Vec", [inner]) => {
                        let elem = type_to_shape(inner, self_type, krate)?;
                        return Ok(quote! { #krate::Shape::sequence(#elem) });
                    }
                    ("Option", [inner]) => {
                        let elem = type_to_shape(inner, self_type, krate)?;
                        return Ok(quote! { #krate::Shape::option(#elem) });
                    }
                    // Box<T> is laid out like T
                    ("Box", [inner]) => return type_to_shape(inner, self_type, krate),
                    ("BTreeMap" | "HashMap" | "IndexMap", [key, value]) => {
                        let key = type_to_shape(key, self_type, krate)?;
                        let value = type_to_shape(value, self_type, krate)?;
                        return Ok(quote! { #krate::Shape::map(#key, #value) });
                    }
                    _ => {}
                }
                if args.iter().any(|arg| mentions_self(arg, self_type)) {
                    return Err(syn::Error::new_spanned(
                        ty,
                        format!("recursive field through `{}` has no derivable shape", segment.ident),
                    ));
                }
            }

            Ok(quote! { <#type_path as #krate::Objectify>::shape() })
        }
        Type::Array(array) => {
            let elem = type_to_shape(&array.elem, self_type, krate)?;
            let len = &array.len;
            Ok(quote! { #krate::Shape::array((#len) as usize, #elem) })
        }
        Type::Paren(paren) => type_to_shape(&paren.elem, self_type, krate),
        _ if mentions_self(ty, self_type) => Err(syn::Error::new_spanned(
            ty,
            "recursive field has no derivable shape",
        )),
        _ => Ok(quote! { <#ty as #krate::Objectify>::shape() }),
    }
}

/// Whether the type names the derived type anywhere inside it.
fn mentions_self(ty: &Type, self_type: &syn::Ident) -> bool {
    mentions(ty, |ident| ident == self_type || ident == "Self")
}

/// Whether any identifier inside the type satisfies `pred`.
pub(crate) fn mentions(ty: &Type, pred: impl Fn(&syn::Ident) -> bool + Copy) -> bool {
    fn walk(tokens: TokenStream, pred: impl Fn(&syn::Ident) -> bool + Copy) -> bool {
        tokens.into_iter().any(|tree| match tree {
            proc_macro2::TokenTree::Ident(ident) => pred(&ident),
            proc_macro2::TokenTree::Group(group) => walk(group.stream(), pred),
            _ => false,
        })
    }
    walk(quote! { #ty }, pred)
}

/// The last segment names the type being derived, or is `Self`.
fn is_self_reference(type_path: &syn::TypePath, self_type: &syn::Ident) -> bool {
    let path = &type_path.path;
    if path.is_ident("Self") {
        return true;
    }
    path.segments.len() == 1 && path.segments[0].ident == *self_type
}

/// The type arguments of `Wrapper<A, B, ..>`.
fn generic_args(args: &syn::PathArguments) -> Vec<&Type> {
    let syn::PathArguments::AngleBracketed(angle) = args else {
        return Vec::new();
    };
    angle
        .args
        .iter()
        .filter_map(|arg| match arg {
            syn::GenericArgument::Type(ty) => Some(ty),
            _ => None,
        })
        .collect()
}
