//! Command handler types.
//!
//! A handler is any closure or function whose parameters are [`ArgType`]s,
//! optionally followed by one [`Rest<T>`], and whose return value converts
//! into an exit code via [`IntoExitCode`]:
//!
//! ```rust
//! use typed_invoke::{Invoker, Rest};
//!
//! let mut invoker = Invoker::new();
//! invoker.register("add", |a: i32, b: i32| a + b)?;
//! invoker.register("sum", |first: i32, rest: Rest<i32>| first + rest.iter().sum::<i32>())?;
//! invoker.register("greet", |name: String| -> anyhow::Result<i32> {
//!     anyhow::ensure!(!name.is_empty(), "name must not be empty");
//!     Ok(0)
//! })?;
//!
//! assert_eq!(invoker.invoke("add", &["2", "3"])?, 5);
//! assert_eq!(invoker.invoke("sum", &["1", "2", "3", "4"])?, 10);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Shape rules
//!
//! The parameter shape is checked by the compiler: every fixed parameter must
//! be an [`ArgType`], only the last parameter may be a [`Rest`], and the
//! return type must be `i32` or `Result<i32, E>`. Handlers whose shape is only
//! known at runtime go through [`DynamicHandler`], where the same rules are
//! checked when the handler is registered.
//!
//! # Core Types
//!
//! - [`Handler`]: the trait implemented for typed closures and [`DynamicHandler`]
//! - [`Rest`]: the trailing parameter that absorbs surplus arguments
//! - [`ParsedArgs`]: parsed values handed to a handler in declared order
//! - [`IntoExitCode`]: what a handler may return

use std::any::type_name;
use std::marker::PhantomData;
use std::ops::Deref;

use crate::arg_type::ArgType;
use crate::descriptor::{ParamSpec, Signature};
use crate::parser::Value;

/// Trait for values a handler may return.
///
/// `i32` is passed through as the exit code. `Result<i32, E>` either yields
/// its code or fails the invocation with the handler's error.
///
/// # Example
///
/// ```rust
/// use typed_invoke::IntoExitCode;
///
/// assert_eq!(3i32.into_exit_code().unwrap(), 3);
///
/// let failed: Result<i32, std::io::Error> = Err(std::io::Error::other("gone"));
/// assert!(failed.into_exit_code().is_err());
/// ```
pub trait IntoExitCode {
    /// Convert this value into an exit code or a handler failure.
    fn into_exit_code(self) -> anyhow::Result<i32>;
}

impl IntoExitCode for i32 {
    fn into_exit_code(self) -> anyhow::Result<i32> {
        Ok(self)
    }
}

impl<E> IntoExitCode for Result<i32, E>
where
    E: Into<anyhow::Error>,
{
    fn into_exit_code(self) -> anyhow::Result<i32> {
        self.map_err(Into::into)
    }
}

/// The trailing "rest of the arguments" parameter.
///
/// Receives every argument past the fixed parameters, each parsed as `T`.
/// May be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Rest<T>(pub Vec<T>);

impl<T> Rest<T> {
    /// Unwraps the collected values.
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Rest<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> From<Vec<T>> for Rest<T> {
    fn from(values: Vec<T>) -> Self {
        Rest(values)
    }
}

impl<T> IntoIterator for Rest<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Rest<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Parsed argument values, in declared parameter order.
///
/// Typed handlers consume this internally. [`DynamicHandler`] callables
/// receive it directly and pull values with [`ParsedArgs::next_fixed`] and
/// [`ParsedArgs::rest`].
#[derive(Debug)]
pub struct ParsedArgs {
    fixed: std::vec::IntoIter<Value>,
    rest: Option<Vec<Value>>,
    position: usize,
}

impl ParsedArgs {
    pub(crate) fn new(fixed: Vec<Value>, rest: Option<Vec<Value>>) -> Self {
        Self {
            fixed: fixed.into_iter(),
            rest,
            position: 0,
        }
    }

    /// Number of fixed values not yet taken.
    pub fn remaining_fixed(&self) -> usize {
        self.fixed.len()
    }

    /// Returns true if the handler declared a rest parameter.
    pub fn has_rest(&self) -> bool {
        self.rest.is_some()
    }

    /// Takes the next fixed value as `T`.
    pub fn next_fixed<T: 'static>(&mut self) -> anyhow::Result<T> {
        let position = self.position;
        let value = self
            .fixed
            .next()
            .ok_or_else(|| anyhow::anyhow!("no argument at position {}", position))?;
        self.position += 1;

        value.downcast::<T>().map(|v| *v).map_err(|_| {
            anyhow::anyhow!(
                "argument at position {} is not a {}",
                position,
                type_name::<T>()
            )
        })
    }

    /// Takes the next fixed value without downcasting it.
    pub fn next_value(&mut self) -> Option<Value> {
        let value = self.fixed.next()?;
        self.position += 1;
        Some(value)
    }

    /// Takes the rest values as a homogeneous `Rest<T>`.
    pub fn rest<T: 'static>(&mut self) -> anyhow::Result<Rest<T>> {
        let values = self
            .rest
            .take()
            .ok_or_else(|| anyhow::anyhow!("handler has no rest parameter"))?;

        values
            .into_iter()
            .map(|value| {
                value.downcast::<T>().map(|v| *v).map_err(|_| {
                    anyhow::anyhow!("rest argument is not a {}", type_name::<T>())
                })
            })
            .collect::<anyhow::Result<Vec<T>>>()
            .map(Rest)
    }

    /// Takes the rest values without downcasting them.
    pub fn rest_values(&mut self) -> Option<Vec<Value>> {
        self.rest.take()
    }
}

/// Trait for command handlers.
///
/// `Args` is a marker that keeps the implementations for different closure
/// shapes apart; callers never name it.
pub trait Handler<Args>: 'static {
    /// The parameter shape and return type of this handler.
    fn signature(&self) -> Signature;

    /// Calls the handler with already parsed values.
    fn call(&mut self, args: ParsedArgs) -> anyhow::Result<i32>;
}

/// Marker for handlers ending in a [`Rest`] parameter.
pub struct Variadic<Fixed, T>(PhantomData<fn() -> (Fixed, T)>);

/// Marker for [`DynamicHandler`].
pub struct Dynamic;

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnMut($($ty),*) -> R + 'static,
            R: IntoExitCode,
            $($ty: ArgType,)*
        {
            fn signature(&self) -> Signature {
                Signature::new(vec![$(ParamSpec::scalar::<$ty>()),*])
            }

            fn call(&mut self, mut args: ParsedArgs) -> anyhow::Result<i32> {
                $(let $ty = args.next_fixed::<$ty>()?;)*
                (self)($($ty),*).into_exit_code()
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, $($ty,)* T> Handler<Variadic<($($ty,)*), T>> for F
        where
            F: FnMut($($ty,)* Rest<T>) -> R + 'static,
            R: IntoExitCode,
            $($ty: ArgType,)*
            T: ArgType,
        {
            fn signature(&self) -> Signature {
                Signature::new(vec![$(ParamSpec::scalar::<$ty>(),)* ParamSpec::sequence::<T>()])
            }

            fn call(&mut self, mut args: ParsedArgs) -> anyhow::Result<i32> {
                $(let $ty = args.next_fixed::<$ty>()?;)*
                let rest = args.rest::<T>()?;
                (self)($($ty,)* rest).into_exit_code()
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);
impl_handler!(A1, A2, A3, A4, A5, A6, A7);

/// A handler whose shape is described at runtime.
///
/// The callable receives [`ParsedArgs`] and returns a boxed value that must
/// be an `i32`. The declared [`Signature`] is validated when the handler is
/// registered, so a malformed shape is rejected before any invocation.
///
/// # Example
///
/// ```rust
/// use typed_invoke::{DynamicHandler, Invoker, ParamSpec, Signature};
///
/// let signature = Signature::new(vec![ParamSpec::scalar::<i64>(), ParamSpec::sequence::<i64>()]);
/// let handler = DynamicHandler::new(signature, |mut args| {
///     let base = args.next_fixed::<i64>()?;
///     let rest = args.rest::<i64>()?;
///     let total = (base + rest.iter().sum::<i64>()) as i32;
///     Ok(Box::new(total) as Box<dyn std::any::Any>)
/// });
///
/// let mut invoker = Invoker::new();
/// invoker.register("total", handler)?;
/// assert_eq!(invoker.invoke("total", &["1", "2", "3"])?, 6);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct DynamicHandler {
    signature: Signature,
    call: Box<dyn FnMut(ParsedArgs) -> anyhow::Result<Value>>,
}

impl DynamicHandler {
    /// Creates a dynamic handler from a declared signature and a callable.
    pub fn new<F>(signature: Signature, call: F) -> Self
    where
        F: FnMut(ParsedArgs) -> anyhow::Result<Value> + 'static,
    {
        Self {
            signature,
            call: Box::new(call),
        }
    }
}

impl std::fmt::Debug for DynamicHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicHandler")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl Handler<Dynamic> for DynamicHandler {
    fn signature(&self) -> Signature {
        self.signature.clone()
    }

    fn call(&mut self, args: ParsedArgs) -> anyhow::Result<i32> {
        let value = (self.call)(args)?;
        value
            .downcast::<i32>()
            .map(|code| *code)
            .map_err(|_| anyhow::anyhow!("handler returned a value that is not an i32"))
    }
}
