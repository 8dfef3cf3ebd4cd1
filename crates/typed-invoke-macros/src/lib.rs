//! Procedural macros for `typed-invoke`.
//!
//! This crate provides `#[derive(ArgType)]`, which declares the string
//! conversions a type offers to the default parser layer. It is re-exported
//! by `typed-invoke`; depend on that crate instead of this one.

mod arg_type;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `ArgType` from a list of declared conversions.
///
/// The derive only declares which mechanisms exist. The default parser layer
/// always picks the highest-priority one, whatever order they are listed in.
///
/// # Attributes
///
/// Applied to the type with `#[arg_type(...)]`:
///
/// | Attribute | Mechanism | Requires |
/// |-----------|-----------|----------|
/// | `constructor = path` | Constructor | `fn(&str) -> Result<Self, E>` |
/// | `explicit` | Explicit conversion | `TryFrom<String>` |
/// | `implicit` | Implicit conversion | `From<String>` |
/// | `parse` | Static parse | `FromStr` |
///
/// Without any attribute the type declares no conversion and can only be
/// parsed by a custom parser installed on the invoker.
///
/// # Example
///
/// ```rust,ignore
/// use typed_invoke::ArgType;
///
/// #[derive(ArgType)]
/// #[arg_type(constructor = Color::from_name, parse)]
/// struct Color(u32);
///
/// impl Color {
///     fn from_name(name: &str) -> Result<Self, String> {
///         match name {
///             "red" => Ok(Color(0xff0000)),
///             other => Err(format!("unknown color '{}'", other)),
///         }
///     }
/// }
/// ```
///
/// For working examples, see `typed-invoke/tests/derive.rs`.
#[proc_macro_derive(ArgType, attributes(arg_type))]
pub fn arg_type_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    arg_type::arg_type_derive_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
