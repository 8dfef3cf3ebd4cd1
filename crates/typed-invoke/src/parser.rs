//! String-to-value parsers and the two-layer parser registry.
//!
//! # Layers
//!
//! - **User layer** ([`ParserRegistry`]): owned by an invoker, fully mutable
//!   by the embedder. Always consulted first.
//! - **Default layer** ([`DefaultParsers`]): process-wide, keyed by
//!   [`TypeId`]. An entry is derived from a type's [`ArgType`] declaration the
//!   first time the type is seen and never recomputed. A type with nothing
//!   derivable is cached as "no parser".
//!
//! Resolution walks user layer, then default layer, and fails with
//! [`InvokeError::NoParser`] when both come up empty.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::trace;

use crate::arg_type::{ArgType, ConvertFn};
use crate::error::{BoxError, CharError, InvokeError};

/// A parsed argument value, erased until the handler downcasts it.
pub type Value = Box<dyn Any>;

/// The mechanism that produced a [`Parser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    /// `String` passes through unchanged.
    Identity,
    /// `char` accepts exactly one character.
    Character,
    /// A declared construction-from-string function.
    Constructor,
    /// `TryFrom<String>`.
    ExplicitConversion,
    /// `From<String>`.
    ImplicitConversion,
    /// `FromStr`.
    StaticParse,
    /// Supplied by the embedder.
    Custom,
}

struct ParserInner {
    kind: ParserKind,
    output: TypeId,
    output_name: &'static str,
    parse: Box<dyn Fn(&str) -> Result<Value, BoxError> + Send + Sync>,
}

/// A shareable function from `&str` to a value of one fixed type.
///
/// Cloning is cheap and clones compare equal under [`Parser::ptr_eq`].
#[derive(Clone)]
pub struct Parser {
    inner: Arc<ParserInner>,
}

impl Parser {
    /// Creates a custom parser producing values of type `T`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use typed_invoke::{Parser, ParserKind};
    ///
    /// let hex = Parser::new(|s: &str| u32::from_str_radix(s, 16));
    /// assert_eq!(hex.kind(), ParserKind::Custom);
    /// assert_eq!(hex.parse_as::<u32>("ff").unwrap(), 255);
    /// ```
    pub fn new<T, F, E>(f: F) -> Self
    where
        T: 'static,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::with_kind::<T>(
            ParserKind::Custom,
            Arc::new(move |s: &str| -> Result<T, BoxError> { f(s).map_err(Into::into) }),
        )
    }

    pub(crate) fn with_kind<T: 'static>(kind: ParserKind, convert: ConvertFn<T>) -> Self {
        Self {
            inner: Arc::new(ParserInner {
                kind,
                output: TypeId::of::<T>(),
                output_name: type_name::<T>(),
                parse: Box::new(move |s: &str| -> Result<Value, BoxError> {
                    convert(s).map(|v| Box::new(v) as Value)
                }),
            }),
        }
    }

    /// The mechanism behind this parser.
    pub fn kind(&self) -> ParserKind {
        self.inner.kind
    }

    /// The type of the values this parser produces.
    pub fn output_type(&self) -> TypeId {
        self.inner.output
    }

    /// The name of the type this parser produces.
    pub fn output_type_name(&self) -> &'static str {
        self.inner.output_name
    }

    /// Runs the parser, returning the erased value.
    pub fn parse(&self, input: &str) -> Result<Value, BoxError> {
        (self.inner.parse)(input)
    }

    /// Runs the parser and downcasts the result to `T`.
    pub fn parse_as<T: 'static>(&self, input: &str) -> Result<T, BoxError> {
        let value = self.parse(input)?;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            format!(
                "parser produces {}, not {}",
                self.inner.output_name,
                type_name::<T>()
            )
            .into()
        })
    }

    /// Returns true if both handles refer to the same parser.
    pub fn ptr_eq(a: &Parser, b: &Parser) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("kind", &self.inner.kind)
            .field("output", &self.inner.output_name)
            .finish_non_exhaustive()
    }
}

/// Identity and name of a parameter type, plus how to derive its default parser.
#[derive(Clone, Copy)]
pub struct ArgTypeInfo {
    id: TypeId,
    name: &'static str,
    derive: Option<fn() -> Option<Parser>>,
}

impl ArgTypeInfo {
    /// Describes an [`ArgType`].
    pub fn of<T: ArgType>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            derive: Some(derive_default_parser::<T>),
        }
    }

    /// Describes a type without consulting its string conversions.
    ///
    /// Parameters described this way need a custom parser. An opaque info
    /// never reads or writes the default layer, so it cannot hide the
    /// default parser of a type that does implement [`ArgType`].
    pub fn opaque<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            derive: None,
        }
    }

    /// Returns true if this info was built with [`ArgTypeInfo::opaque`].
    pub fn is_opaque(&self) -> bool {
        self.derive.is_none()
    }

    /// The type's [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type's name, for messages.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ArgTypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.is_opaque() == other.is_opaque()
    }
}

impl Eq for ArgTypeInfo {}

impl fmt::Debug for ArgTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Default layer probe for `T`, in contract order.
fn derive_default_parser<T: ArgType>() -> Option<Parser> {
    let id = TypeId::of::<T>();

    if id == TypeId::of::<String>() {
        return Some(Parser::with_kind::<String>(
            ParserKind::Identity,
            Arc::new(|s: &str| -> Result<String, BoxError> { Ok(s.to_owned()) }),
        ));
    }

    if id == TypeId::of::<char>() {
        return Some(Parser::with_kind::<char>(
            ParserKind::Character,
            Arc::new(|s: &str| -> Result<char, BoxError> {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(Box::new(CharError {
                        found: s.chars().count(),
                    })),
                }
            }),
        ));
    }

    T::capabilities()
        .select()
        .map(|(kind, convert)| Parser::with_kind::<T>(kind, convert))
}

type DefaultMap = HashMap<TypeId, Option<Parser>>;

static DEFAULT_PARSERS: Lazy<RwLock<DefaultMap>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// The process-wide default parser layer.
///
/// Entries are insert-only, so a poisoned lock still holds consistent data
/// and is recovered rather than propagated.
pub struct DefaultParsers;

impl DefaultParsers {
    /// Returns the default parser for a type, probing it on first use.
    ///
    /// Two threads probing the same type concurrently may both derive a
    /// parser; only the first insert is kept and both observe it. Opaque
    /// infos always get `None` and leave the layer untouched.
    pub fn probe(info: &ArgTypeInfo) -> Option<Parser> {
        let derive = info.derive?;

        {
            let map = DEFAULT_PARSERS
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = map.get(&info.id) {
                return entry.clone();
            }
        }

        let derived = derive();
        trace!(
            type_name = info.name,
            kind = ?derived.as_ref().map(Parser::kind),
            "probed default parser"
        );

        let mut map = DEFAULT_PARSERS
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(info.id).or_insert(derived).clone()
    }

    /// Shorthand for [`DefaultParsers::probe`] on an [`ArgType`].
    pub fn get<T: ArgType>() -> Option<Parser> {
        Self::probe(&ArgTypeInfo::of::<T>())
    }

    /// Returns true if the type has been probed, whatever the outcome.
    pub fn is_probed(id: TypeId) -> bool {
        DEFAULT_PARSERS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

/// The user parser layer: explicit per-type overrides.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<TypeId, Parser>,
}

impl ParserRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a parser for `T` built from a closure.
    ///
    /// Returns the parser it replaces, if any.
    pub fn register<T, F, E>(&mut self, f: F) -> Option<Parser>
    where
        T: 'static,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.insert(Parser::new(f))
    }

    /// Installs an already built parser under its output type.
    ///
    /// Returns the parser it replaces, if any.
    pub fn insert(&mut self, parser: Parser) -> Option<Parser> {
        self.parsers.insert(parser.output_type(), parser)
    }

    /// The user-layer parser for a type, without consulting the default layer.
    pub fn get(&self, id: TypeId) -> Option<&Parser> {
        self.parsers.get(&id)
    }

    /// Returns true if the user layer holds a parser for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.parsers.contains_key(&TypeId::of::<T>())
    }

    /// Number of user-layer parsers.
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Returns true if the user layer is empty.
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Resolves a parser for `T`: user layer, then default layer.
    pub fn resolve<T: ArgType>(&self) -> Result<Parser, InvokeError> {
        self.resolve_info(&ArgTypeInfo::of::<T>())
    }

    /// Resolves a parser for a described type: user layer, then default layer.
    pub fn resolve_info(&self, info: &ArgTypeInfo) -> Result<Parser, InvokeError> {
        if let Some(parser) = self.parsers.get(&info.id) {
            return Ok(parser.clone());
        }
        DefaultParsers::probe(info).ok_or(InvokeError::NoParser {
            type_name: info.name,
        })
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.parsers.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Opaque;
    impl ArgType for Opaque {}

    #[test]
    fn test_identity_parser() {
        let parser = DefaultParsers::get::<String>().unwrap();
        assert_eq!(parser.kind(), ParserKind::Identity);
        assert_eq!(parser.parse_as::<String>("hello").unwrap(), "hello");
        assert_eq!(parser.parse_as::<String>("").unwrap(), "");
    }

    #[test]
    fn test_char_parser() {
        let parser = DefaultParsers::get::<char>().unwrap();
        assert_eq!(parser.kind(), ParserKind::Character);
        assert_eq!(parser.parse_as::<char>("A").unwrap(), 'A');
        assert_eq!(parser.parse_as::<char>("é").unwrap(), 'é');
        assert!(parser.parse_as::<char>("AB").is_err());
        assert!(parser.parse_as::<char>("").is_err());
    }

    #[test]
    fn test_char_error_reports_length() {
        let parser = DefaultParsers::get::<char>().unwrap();
        let err = parser.parse("AB").unwrap_err();
        assert!(err.downcast_ref::<CharError>().is_some());
        assert_eq!(err.to_string(), "expected exactly one character, found 2");
    }

    #[test]
    fn test_default_layer_is_stable() {
        let first = DefaultParsers::get::<u16>().unwrap();
        let second = DefaultParsers::get::<u16>().unwrap();
        assert!(Parser::ptr_eq(&first, &second));
        assert!(DefaultParsers::is_probed(TypeId::of::<u16>()));
    }

    #[test]
    fn test_sentinel_is_cached() {
        assert!(DefaultParsers::get::<Opaque>().is_none());
        assert!(DefaultParsers::is_probed(TypeId::of::<Opaque>()));
        assert!(DefaultParsers::get::<Opaque>().is_none());
    }

    #[test]
    fn test_opaque_info_has_no_default() {
        struct Unregistered;
        let info = ArgTypeInfo::opaque::<Unregistered>();
        assert!(info.is_opaque());
        assert!(DefaultParsers::probe(&info).is_none());
        assert!(!DefaultParsers::is_probed(TypeId::of::<Unregistered>()));
    }

    #[test]
    fn test_opaque_info_does_not_hide_default() {
        struct Millis(u64);
        impl std::str::FromStr for Millis {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Millis)
            }
        }
        impl ArgType for Millis {
            fn capabilities() -> crate::Capabilities<Self> {
                crate::Capabilities::none().parse()
            }
        }

        let opaque = ArgTypeInfo::opaque::<Millis>();
        assert!(DefaultParsers::probe(&opaque).is_none());
        assert!(!DefaultParsers::is_probed(TypeId::of::<Millis>()));

        let parser = DefaultParsers::get::<Millis>().unwrap();
        assert_eq!(parser.kind(), ParserKind::StaticParse);
        assert_eq!(parser.parse_as::<Millis>("250").unwrap().0, 250);
        assert!(DefaultParsers::probe(&opaque).is_none());
    }

    #[test]
    fn test_info_equality_tracks_opacity() {
        assert_eq!(ArgTypeInfo::of::<u32>(), ArgTypeInfo::of::<u32>());
        assert_ne!(ArgTypeInfo::of::<u32>(), ArgTypeInfo::opaque::<u32>());
        assert_eq!(ArgTypeInfo::opaque::<u32>(), ArgTypeInfo::opaque::<u32>());
    }

    #[test]
    fn test_concurrent_first_probe_converges() {
        use std::sync::Barrier;
        use std::thread;

        struct Fresh;
        impl std::str::FromStr for Fresh {
            type Err = std::convert::Infallible;

            fn from_str(_: &str) -> Result<Self, Self::Err> {
                Ok(Fresh)
            }
        }
        impl ArgType for Fresh {
            fn capabilities() -> crate::Capabilities<Self> {
                crate::Capabilities::none().parse()
            }
        }

        const THREADS: usize = 16;
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    DefaultParsers::get::<Fresh>()
                })
            })
            .collect();

        let parsers: Vec<Parser> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect();

        let first = &parsers[0];
        assert!(parsers.iter().all(|p| Parser::ptr_eq(first, p)));
        assert!(Parser::ptr_eq(first, &DefaultParsers::get::<Fresh>().unwrap()));
    }

    #[test]
    fn test_user_layer_wins() {
        let mut registry = ParserRegistry::new();
        registry.register(|_: &str| Ok::<i64, BoxError>(7));

        let parser = registry.resolve::<i64>().unwrap();
        assert_eq!(parser.kind(), ParserKind::Custom);
        assert_eq!(parser.parse_as::<i64>("99").unwrap(), 7);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let registry = ParserRegistry::new();
        let parser = registry.resolve::<u8>().unwrap();
        assert_eq!(parser.kind(), ParserKind::StaticParse);
        assert!(Parser::ptr_eq(&parser, &DefaultParsers::get::<u8>().unwrap()));
    }

    #[test]
    fn test_resolve_without_any_parser() {
        let registry = ParserRegistry::new();
        let err = registry.resolve::<Opaque>().unwrap_err();
        assert!(err.is_no_parser());
        assert!(err.to_string().contains("Opaque"));
    }

    #[test]
    fn test_insert_returns_replaced() {
        let mut registry = ParserRegistry::new();
        assert!(registry.register(|s: &str| s.parse::<i8>()).is_none());
        let previous = registry.register(|_: &str| Ok::<i8, BoxError>(0)).unwrap();
        assert_eq!(previous.parse_as::<i8>("5").unwrap(), 5);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains::<i8>());
    }

    #[test]
    fn test_parse_as_wrong_type() {
        let parser = Parser::new(|s: &str| s.parse::<u32>());
        let err = parser.parse_as::<String>("1").unwrap_err();
        assert!(err.to_string().contains("not alloc::string::String"));
    }
}
