//! Argument types and their string-conversion capabilities.
//!
//! A type becomes usable as a handler parameter by implementing [`ArgType`].
//! The implementation does not parse anything itself; it *declares* which
//! conversion mechanisms the type offers via a [`Capabilities`] record. The
//! default parser layer then picks one of them in a fixed order:
//!
//! | Order | Mechanism | Rust capability |
//! |-------|-----------|-----------------|
//! | 1 | Identity | the type is `String` |
//! | 2 | Character | the type is `char` |
//! | 3 | Constructor | [`Capabilities::constructor`] |
//! | 4 | Explicit conversion | [`Capabilities::explicit`] (`TryFrom<String>`) |
//! | 5 | Implicit conversion | [`Capabilities::implicit`] (`From<String>`) |
//! | 6 | Static parse | [`Capabilities::parse`] (`FromStr`) |
//!
//! When none applies, the type has no default parser. It can still be used
//! as a parameter as long as a custom parser is installed for it on the
//! invoker.
//!
//! # Example
//!
//! ```rust
//! use typed_invoke::{ArgType, Capabilities};
//!
//! struct Port(u16);
//!
//! impl std::str::FromStr for Port {
//!     type Err = std::num::ParseIntError;
//!
//!     fn from_str(s: &str) -> Result<Self, Self::Err> {
//!         s.parse().map(Port)
//!     }
//! }
//!
//! impl ArgType for Port {
//!     fn capabilities() -> Capabilities<Self> {
//!         Capabilities::none().parse()
//!     }
//! }
//! ```
//!
//! The same impl can be generated with `#[derive(ArgType)]` and
//! `#[arg_type(parse)]`.

use std::ffi::OsString;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::num::{
    NonZeroI16, NonZeroI32, NonZeroI64, NonZeroI8, NonZeroU16, NonZeroU32, NonZeroU64,
    NonZeroU8, NonZeroUsize,
};
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::BoxError;
use crate::parser::ParserKind;

/// A typed string conversion, as stored in [`Capabilities`].
pub(crate) type ConvertFn<T> = Arc<dyn Fn(&str) -> Result<T, BoxError> + Send + Sync>;

/// A type that may appear as a handler parameter or rest element.
pub trait ArgType: Sized + 'static {
    /// The conversions this type offers to the default parser layer.
    ///
    /// The default is no capability at all, which means values of this type
    /// can only be parsed by a custom parser.
    fn capabilities() -> Capabilities<Self> {
        Capabilities::none()
    }
}

/// The set of string conversions a type declares.
///
/// Declaring more than one is allowed; the default layer picks the first in
/// probe order regardless of the order the builder methods were called.
pub struct Capabilities<T> {
    constructor: Option<ConvertFn<T>>,
    explicit: Option<ConvertFn<T>>,
    implicit: Option<ConvertFn<T>>,
    parse: Option<ConvertFn<T>>,
}

impl<T: 'static> Capabilities<T> {
    /// No capabilities. A type declaring this has no default parser.
    pub fn none() -> Self {
        Self {
            constructor: None,
            explicit: None,
            implicit: None,
            parse: None,
        }
    }

    /// Declares a construction-from-string function.
    pub fn constructor<F, E>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.constructor = Some(Arc::new(move |s: &str| -> Result<T, BoxError> {
            f(s).map_err(Into::into)
        }));
        self
    }

    /// Declares an explicit (fallible) conversion through `TryFrom<String>`.
    pub fn explicit(mut self) -> Self
    where
        T: TryFrom<String>,
        <T as TryFrom<String>>::Error: Into<BoxError>,
    {
        self.explicit = Some(Arc::new(|s: &str| -> Result<T, BoxError> {
            T::try_from(s.to_owned()).map_err(Into::into)
        }));
        self
    }

    /// Declares an implicit (infallible) conversion through `From<String>`.
    pub fn implicit(mut self) -> Self
    where
        T: From<String>,
    {
        self.implicit = Some(Arc::new(|s: &str| -> Result<T, BoxError> {
            Ok(T::from(s.to_owned()))
        }));
        self
    }

    /// Declares a static parse operation through `FromStr`.
    pub fn parse(mut self) -> Self
    where
        T: FromStr,
        <T as FromStr>::Err: Into<BoxError>,
    {
        self.parse = Some(Arc::new(|s: &str| -> Result<T, BoxError> {
            s.parse::<T>().map_err(Into::into)
        }));
        self
    }

    /// Returns true if no capability has been declared.
    pub fn is_empty(&self) -> bool {
        self.constructor.is_none()
            && self.explicit.is_none()
            && self.implicit.is_none()
            && self.parse.is_none()
    }

    /// The mechanism the default layer would select, if any.
    pub fn selected_kind(&self) -> Option<ParserKind> {
        if self.constructor.is_some() {
            Some(ParserKind::Constructor)
        } else if self.explicit.is_some() {
            Some(ParserKind::ExplicitConversion)
        } else if self.implicit.is_some() {
            Some(ParserKind::ImplicitConversion)
        } else if self.parse.is_some() {
            Some(ParserKind::StaticParse)
        } else {
            None
        }
    }

    /// Consumes the record, keeping only the highest-priority conversion.
    pub(crate) fn select(self) -> Option<(ParserKind, ConvertFn<T>)> {
        let Self {
            constructor,
            explicit,
            implicit,
            parse,
        } = self;

        constructor
            .map(|f| (ParserKind::Constructor, f))
            .or_else(|| explicit.map(|f| (ParserKind::ExplicitConversion, f)))
            .or_else(|| implicit.map(|f| (ParserKind::ImplicitConversion, f)))
            .or_else(|| parse.map(|f| (ParserKind::StaticParse, f)))
    }
}

impl<T: 'static> Default for Capabilities<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> fmt::Debug for Capabilities<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("constructor", &self.constructor.is_some())
            .field("explicit", &self.explicit.is_some())
            .field("implicit", &self.implicit.is_some())
            .field("parse", &self.parse.is_some())
            .finish()
    }
}

// String and char are served by the identity and character rules, which are
// checked before any declared capability.
impl ArgType for String {}
impl ArgType for char {}

macro_rules! impl_arg_type {
    ($capability:ident => $($ty:ty),* $(,)?) => {
        $(
            impl ArgType for $ty {
                fn capabilities() -> Capabilities<Self> {
                    Capabilities::none().$capability()
                }
            }
        )*
    };
}

impl_arg_type!(parse =>
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64, bool,
    IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr,
    NonZeroI8, NonZeroI16, NonZeroI32, NonZeroI64,
    NonZeroU8, NonZeroU16, NonZeroU32, NonZeroU64, NonZeroUsize,
);

impl_arg_type!(implicit => PathBuf, OsString, Box<str>, Rc<str>, Arc<str>);

#[cfg(test)]
mod tests {
    use super::*;

    // `From<String>` implies `TryFrom<String>` through the std blanket impl,
    // so the explicit rule is exercised on a separate type.
    struct Implicit(&'static str);

    impl From<String> for Implicit {
        fn from(_: String) -> Self {
            Implicit("implicit")
        }
    }

    impl FromStr for Implicit {
        type Err = std::convert::Infallible;

        fn from_str(_: &str) -> Result<Self, Self::Err> {
            Ok(Implicit("parse"))
        }
    }

    struct Explicit(&'static str);

    impl TryFrom<String> for Explicit {
        type Error = String;

        fn try_from(s: String) -> Result<Self, Self::Error> {
            if s.is_empty() {
                Err("empty".to_string())
            } else {
                Ok(Explicit("explicit"))
            }
        }
    }

    impl FromStr for Explicit {
        type Err = std::convert::Infallible;

        fn from_str(_: &str) -> Result<Self, Self::Err> {
            Ok(Explicit("parse"))
        }
    }

    #[test]
    fn test_none_is_empty() {
        let caps = Capabilities::<Implicit>::none();
        assert!(caps.is_empty());
        assert_eq!(caps.selected_kind(), None);
        assert!(caps.select().is_none());
    }

    #[test]
    fn test_constructor_wins_regardless_of_declaration_order() {
        let caps = Capabilities::none()
            .parse()
            .implicit()
            .constructor(|_: &str| Ok::<_, BoxError>(Implicit("constructor")));
        assert_eq!(caps.selected_kind(), Some(ParserKind::Constructor));

        let (_, f) = caps.select().unwrap();
        assert_eq!(f("x").unwrap().0, "constructor");
    }

    #[test]
    fn test_explicit_beats_parse() {
        let caps = Capabilities::<Explicit>::none().parse().explicit();
        assert_eq!(caps.selected_kind(), Some(ParserKind::ExplicitConversion));

        let (_, f) = caps.select().unwrap();
        assert_eq!(f("x").unwrap().0, "explicit");
        assert_eq!(f("").err().unwrap().to_string(), "empty");
    }

    #[test]
    fn test_explicit_beats_implicit() {
        let caps = Capabilities::<Implicit>::none().implicit().explicit();
        assert_eq!(caps.selected_kind(), Some(ParserKind::ExplicitConversion));

        let (kind, _) = caps.select().unwrap();
        assert_eq!(kind, ParserKind::ExplicitConversion);
    }

    #[test]
    fn test_implicit_beats_parse() {
        let caps = Capabilities::<Implicit>::none().parse().implicit();
        assert_eq!(caps.selected_kind(), Some(ParserKind::ImplicitConversion));

        let (_, f) = caps.select().unwrap();
        assert_eq!(f("x").unwrap().0, "implicit");
    }

    #[test]
    fn test_parse_alone() {
        let caps = Capabilities::<Implicit>::none().parse();
        assert_eq!(caps.selected_kind(), Some(ParserKind::StaticParse));

        let (_, f) = caps.select().unwrap();
        assert_eq!(f("x").unwrap().0, "parse");
    }

    #[test]
    fn test_builtin_integer_uses_from_str() {
        let (kind, f) = i32::capabilities().select().unwrap();
        assert_eq!(kind, ParserKind::StaticParse);
        assert_eq!(f("-12").unwrap(), -12);
        assert!(f("twelve").is_err());
    }

    #[test]
    fn test_builtin_path_uses_implicit_conversion() {
        let (kind, f) = PathBuf::capabilities().select().unwrap();
        assert_eq!(kind, ParserKind::ImplicitConversion);
        assert_eq!(f("/tmp/x").unwrap(), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_string_and_char_declare_nothing() {
        assert!(String::capabilities().is_empty());
        assert!(char::capabilities().is_empty());
    }

    #[test]
    fn test_debug_lists_capabilities() {
        let caps = Capabilities::<i32>::none().parse();
        let debug = format!("{:?}", caps);
        assert!(debug.contains("parse: true"));
        assert!(debug.contains("constructor: false"));
    }
}
