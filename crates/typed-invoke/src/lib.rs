//! Dispatch text commands to handlers with strongly-typed parameters.
//!
//! `typed-invoke` binds command names to ordinary closures. When a command is
//! invoked with raw string arguments, each argument is parsed into the type
//! the handler declares and the handler's integer exit code is returned.
//!
//! # Features
//!
//! - **Typed handlers**: plain closures such as `|a: i32, b: i32| a + b`
//! - **Rest parameters**: a trailing [`Rest<T>`] absorbs surplus arguments
//! - **Two parser layers**: per-invoker overrides over process-wide defaults
//! - **Derived defaults**: `#[derive(ArgType)]` picks a string conversion
//! - **Line entry point**: shell-style tokenizing via [`Invoker::invoke_line`]
//!
//! # Parser Resolution
//!
//! For every parameter type the invoker asks its user layer
//! ([`ParserRegistry`]) first, then the process-wide default layer
//! ([`DefaultParsers`]). Default parsers are derived once per type, in this
//! order: `String` identity, `char`, a declared constructor, `TryFrom<String>`,
//! `From<String>`, `FromStr`. See [`ArgType`] for how a type declares its
//! conversions.
//!
//! # Example
//!
//! ```rust
//! use typed_invoke::{ArgType, Invoker, Rest};
//!
//! #[derive(Debug, ArgType)]
//! #[arg_type(parse)]
//! struct Level(u8);
//!
//! impl std::str::FromStr for Level {
//!     type Err = String;
//!
//!     fn from_str(s: &str) -> Result<Self, Self::Err> {
//!         match s {
//!             "low" => Ok(Level(1)),
//!             "high" => Ok(Level(9)),
//!             other => Err(format!("unknown level '{}'", other)),
//!         }
//!     }
//! }
//!
//! let mut invoker = Invoker::new();
//! invoker.register("level", |level: Level| level.0 as i32)?;
//! invoker.register("sum", |first: i32, rest: Rest<i32>| {
//!     first + rest.iter().sum::<i32>()
//! })?;
//!
//! assert_eq!(invoker.invoke("level", &["high"])?, 9);
//! assert_eq!(invoker.invoke_line("sum 1 2 3 4")?, 10);
//! assert!(invoker.invoke("level", &["medium"]).is_err());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Logging
//!
//! Registration and dispatch emit [`tracing`] events. Nothing is printed
//! unless the embedding application installs a subscriber.

mod arg_type;
mod descriptor;
mod error;
mod handler;
mod invoker;
mod parser;
mod tokenize;

pub use arg_type::{ArgType, Capabilities};

pub use descriptor::{FixedParam, HandlerDescriptor, ParamKind, ParamSpec, Signature};

pub use error::{Arity, BoxError, CharError, InvokeError, RegistrationError};

pub use handler::{
    Dynamic, DynamicHandler, Handler, IntoExitCode, ParsedArgs, Rest, Variadic,
};

pub use invoker::{Command, Invoker, InvokerBuilder};

pub use parser::{ArgTypeInfo, DefaultParsers, Parser, ParserKind, ParserRegistry, Value};

pub use tokenize::{ShellTokenizer, TokenizeError, Tokenizer, WhitespaceTokenizer};

// Derive macro
pub use typed_invoke_macros::ArgType;
