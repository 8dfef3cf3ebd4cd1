//! Derive macro for argument types.
//!
//! Expands `#[arg_type(...)]` into an `ArgType` impl whose `capabilities()`
//! chains one builder call per declared mechanism.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    DeriveInput, Error, Expr, Meta, Path, Result, Token,
};

/// Container attributes: `#[arg_type(constructor = path, explicit, implicit, parse)]`
#[derive(Default)]
struct ArgTypeAttrs {
    constructor: Option<Path>,
    explicit: bool,
    implicit: bool,
    parse: bool,
}

impl ArgTypeAttrs {
    fn merge(&mut self, other: ArgTypeAttrs, span: proc_macro2::Span) -> Result<()> {
        if let Some(path) = other.constructor {
            if self.constructor.is_some() {
                return Err(Error::new(span, "duplicate `constructor` attribute"));
            }
            self.constructor = Some(path);
        }
        self.explicit |= other.explicit;
        self.implicit |= other.implicit;
        self.parse |= other.parse;
        Ok(())
    }
}

impl Parse for ArgTypeAttrs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attrs = ArgTypeAttrs::default();

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                Meta::NameValue(nv) if nv.path.is_ident("constructor") => {
                    if attrs.constructor.is_some() {
                        return Err(Error::new(nv.span(), "duplicate `constructor` attribute"));
                    }
                    if let Expr::Path(expr_path) = &nv.value {
                        attrs.constructor = Some(expr_path.path.clone());
                    } else {
                        return Err(Error::new(nv.value.span(), "expected path"));
                    }
                }
                Meta::Path(p) if p.is_ident("explicit") => {
                    attrs.explicit = true;
                }
                Meta::Path(p) if p.is_ident("implicit") => {
                    attrs.implicit = true;
                }
                Meta::Path(p) if p.is_ident("parse") => {
                    attrs.parse = true;
                }
                _ => {
                    return Err(Error::new(
                        meta.span(),
                        "unknown attribute, expected one of: constructor = path, explicit, implicit, parse",
                    ));
                }
            }
        }

        Ok(attrs)
    }
}

/// Collects every `#[arg_type(...)]` on the item.
fn parse_attrs(input: &DeriveInput) -> Result<ArgTypeAttrs> {
    let mut attrs = ArgTypeAttrs::default();
    for attr in &input.attrs {
        if attr.path().is_ident("arg_type") {
            attrs.merge(attr.parse_args::<ArgTypeAttrs>()?, attr.span())?;
        }
    }
    Ok(attrs)
}

/// Main implementation of the ArgType derive macro
pub fn arg_type_derive_impl(input: DeriveInput) -> Result<TokenStream> {
    let attrs = parse_attrs(&input)?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut chain = Vec::new();
    if let Some(path) = &attrs.constructor {
        chain.push(quote! { .constructor(#path) });
    }
    if attrs.explicit {
        chain.push(quote! { .explicit() });
    }
    if attrs.implicit {
        chain.push(quote! { .implicit() });
    }
    if attrs.parse {
        chain.push(quote! { .parse() });
    }

    Ok(quote! {
        impl #impl_generics ::typed_invoke::ArgType for #name #ty_generics #where_clause {
            fn capabilities() -> ::typed_invoke::Capabilities<Self> {
                ::typed_invoke::Capabilities::none() #(#chain)*
            }
        }
    })
}
