//! The command table and the invoke algorithm.
//!
//! An [`Invoker`] maps command names to validated handlers. Invoking a
//! command checks the argument count against the handler's shape, parses
//! every argument left to right through the parser layers, and calls the
//! handler with the typed values.
//!
//! ```rust
//! use typed_invoke::{Invoker, Rest};
//!
//! let mut invoker = Invoker::builder()
//!     .command("add", |a: i32, b: i32| a + b)
//!     .command("count", |words: Rest<String>| words.len() as i32)
//!     .fallback(|_args: &[String]| 127)
//!     .build()?;
//!
//! assert_eq!(invoker.invoke_line("add 2 3")?, 5);
//! assert_eq!(invoker.invoke_line("count 'one word' two")?, 2);
//! assert_eq!(invoker.invoke_line("missing")?, 127);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Names are case-sensitive. `register` only binds free names and `update`
//! only replaces bound ones; `register_or_update` accepts either.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace};

use crate::descriptor::{BoxedCall, HandlerDescriptor, Signature};
use crate::error::{BoxError, InvokeError, RegistrationError};
use crate::handler::{Handler, IntoExitCode, ParsedArgs};
use crate::parser::{Parser, ParserRegistry, Value};
use crate::tokenize::{ShellTokenizer, Tokenizer};

type Fallback = Box<dyn FnMut(&[String]) -> anyhow::Result<i32>>;

/// A command name paired with a handler that has not been validated yet.
///
/// Lets [`Invoker::register_many`] and [`Invoker::update_many`] take
/// handlers of different shapes in one batch.
pub struct Command {
    name: String,
    signature: Signature,
    call: BoxedCall,
}

impl Command {
    /// Pairs a name with a handler.
    pub fn new<H, Args>(name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<Args>,
    {
        let signature = handler.signature();
        let mut handler = handler;
        Self {
            name: name.into(),
            signature,
            call: Box::new(move |args: ParsedArgs| handler.call(args)),
        }
    }

    /// The command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The handler's declared shape.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    fn pack(self) -> Result<(String, HandlerDescriptor), RegistrationError> {
        let descriptor = HandlerDescriptor::check_and_pack(&self.name, self.signature, self.call)?;
        Ok((self.name, descriptor))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Dispatches named commands to typed handlers.
///
/// Not meant to be shared across threads: handlers are `FnMut` and
/// invocation takes `&mut self`.
pub struct Invoker {
    handlers: HashMap<String, HandlerDescriptor>,
    fallback: Option<Fallback>,
    parsers: ParserRegistry,
    tokenizer: Box<dyn Tokenizer>,
}

impl Default for Invoker {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
            parsers: ParserRegistry::new(),
            tokenizer: Box::new(ShellTokenizer),
        }
    }
}

impl Invoker {
    /// Creates an empty invoker using [`ShellTokenizer`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building an invoker.
    pub fn builder() -> InvokerBuilder {
        InvokerBuilder::new()
    }

    /// Binds a free command name to a handler.
    ///
    /// Fails with [`RegistrationError::AlreadyBound`] if the name is taken;
    /// the existing binding is left untouched.
    pub fn register<H, Args>(&mut self, name: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.register_command(Command::new(name, handler))
    }

    /// Binds a prepared [`Command`] to its free name.
    pub fn register_command(&mut self, command: Command) -> Result<(), RegistrationError> {
        if self.handlers.contains_key(command.name()) {
            return Err(RegistrationError::AlreadyBound(command.name));
        }
        let (name, descriptor) = command.pack()?;
        debug!(command = %name, arity = %descriptor.arity(), "registered command");
        self.handlers.insert(name, descriptor);
        Ok(())
    }

    /// Registers commands in order, stopping at the first failure.
    ///
    /// Commands registered before the failure stay registered.
    pub fn register_many<I>(&mut self, commands: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = Command>,
    {
        commands
            .into_iter()
            .try_for_each(|command| self.register_command(command))
    }

    /// Replaces the handler of a bound command.
    ///
    /// Fails with [`RegistrationError::NotBound`] if the name is free.
    pub fn update<H, Args>(&mut self, name: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.update_command(Command::new(name, handler))
    }

    /// Replaces a bound command with a prepared [`Command`].
    pub fn update_command(&mut self, command: Command) -> Result<(), RegistrationError> {
        if !self.handlers.contains_key(command.name()) {
            return Err(RegistrationError::NotBound(command.name));
        }
        let (name, descriptor) = command.pack()?;
        debug!(command = %name, arity = %descriptor.arity(), "updated command");
        self.handlers.insert(name, descriptor);
        Ok(())
    }

    /// Updates commands in order, stopping at the first failure.
    ///
    /// Commands updated before the failure stay updated.
    pub fn update_many<I>(&mut self, commands: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = Command>,
    {
        commands
            .into_iter()
            .try_for_each(|command| self.update_command(command))
    }

    /// Binds a handler whether or not the name is already bound.
    pub fn register_or_update<H, Args>(
        &mut self,
        name: &str,
        handler: H,
    ) -> Result<(), RegistrationError>
    where
        H: Handler<Args>,
    {
        self.register_or_update_command(Command::new(name, handler))
    }

    /// Binds a prepared [`Command`] whether or not its name is already bound.
    pub fn register_or_update_command(&mut self, command: Command) -> Result<(), RegistrationError> {
        let (name, descriptor) = command.pack()?;
        debug!(command = %name, arity = %descriptor.arity(), "bound command");
        self.handlers.insert(name, descriptor);
        Ok(())
    }

    /// Installs the handler for unbound command names.
    ///
    /// The fallback receives the full argument vector of the failed lookup,
    /// not including the command name itself.
    pub fn set_default<F, R>(&mut self, mut fallback: F)
    where
        F: FnMut(&[String]) -> R + 'static,
        R: IntoExitCode,
    {
        self.fallback = Some(Box::new(move |args: &[String]| fallback(args).into_exit_code()));
    }

    /// Removes the fallback handler.
    pub fn clear_default(&mut self) {
        self.fallback = None;
    }

    /// Returns true if a fallback handler is installed.
    pub fn has_default(&self) -> bool {
        self.fallback.is_some()
    }

    /// Installs a user-layer parser for `T`, overriding the default layer.
    ///
    /// Returns the user parser it replaces, if any.
    pub fn set_custom_parser<T, F, E>(&mut self, parser: F) -> Option<Parser>
    where
        T: 'static,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.set_parser(Parser::new(parser))
    }

    /// Installs an already built parser in the user layer.
    ///
    /// Installing the parser from [`DefaultParsers`](crate::DefaultParsers)
    /// restores default behavior after an override.
    pub fn set_parser(&mut self, parser: Parser) -> Option<Parser> {
        debug!(type_name = parser.output_type_name(), kind = ?parser.kind(), "installed parser");
        self.parsers.insert(parser)
    }

    /// The user parser layer.
    pub fn parser_registry(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Mutable access to the user parser layer.
    pub fn parser_registry_mut(&mut self) -> &mut ParserRegistry {
        &mut self.parsers
    }

    /// Replaces the tokenizer used by [`Invoker::invoke_line`].
    pub fn set_tokenizer<T>(&mut self, tokenizer: T)
    where
        T: Tokenizer + 'static,
    {
        self.tokenizer = Box::new(tokenizer);
    }

    /// Returns true if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// The descriptor bound to `name`.
    pub fn descriptor(&self, name: &str) -> Option<&HandlerDescriptor> {
        self.handlers.get(name)
    }

    /// All bound command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of bound commands.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no command is bound.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invokes `name` with raw string arguments.
    ///
    /// Arguments are parsed in declared order and the first failure stops
    /// the call; parsers for later arguments do not run. The handler's exit
    /// code is returned unchanged.
    pub fn invoke<S>(&mut self, name: &str, args: &[S]) -> Result<i32, InvokeError>
    where
        S: AsRef<str>,
    {
        let Self {
            handlers,
            fallback,
            parsers,
            ..
        } = self;

        let Some(descriptor) = handlers.get_mut(name) else {
            return match fallback {
                Some(fallback) => {
                    debug!(command = name, args = args.len(), "dispatching to fallback");
                    let args: Vec<String> = args
                        .iter()
                        .map(|arg| AsRef::<str>::as_ref(arg).to_owned())
                        .collect();
                    fallback(&args).map_err(InvokeError::Handler)
                }
                None => Err(InvokeError::UnknownCommand(name.to_owned())),
            };
        };

        let arity = descriptor.arity();
        if !arity.accepts(args.len()) {
            return Err(InvokeError::ArityMismatch {
                command: name.to_owned(),
                expected: arity,
                actual: args.len(),
            });
        }

        trace!(command = name, args = args.len(), "dispatching");

        let split = descriptor.fixed_params().len();
        let (fixed_args, rest_args) = args.split_at(split);

        let mut fixed = Vec::with_capacity(split);
        for (param, input) in descriptor.fixed_params().iter().zip(fixed_args) {
            let parser = parsers.resolve_info(param.type_info())?;
            fixed.push(parse_arg(
                &parser,
                param.position(),
                param.type_info().name(),
                input.as_ref(),
            )?);
        }

        let rest = match descriptor.rest_param() {
            Some(element) => {
                let parser = parsers.resolve_info(element)?;
                let values = rest_args
                    .iter()
                    .enumerate()
                    .map(|(offset, input)| {
                        parse_arg(&parser, split + offset, element.name(), input.as_ref())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(values)
            }
            None => None,
        };

        descriptor
            .call(ParsedArgs::new(fixed, rest))
            .map_err(InvokeError::Handler)
    }

    /// Tokenizes `line` and invokes the first token with the rest as arguments.
    ///
    /// A line with no tokens is a no-op returning 0.
    pub fn invoke_line(&mut self, line: &str) -> Result<i32, InvokeError> {
        let tokens = self.tokenizer.tokenize(line)?;
        match tokens.split_first() {
            Some((name, args)) => self.invoke(name, args),
            None => Ok(0),
        }
    }
}

fn parse_arg(
    parser: &Parser,
    position: usize,
    type_name: &'static str,
    input: &str,
) -> Result<Value, InvokeError> {
    parser.parse(input).map_err(|source| InvokeError::Parse {
        position,
        type_name,
        input: input.to_owned(),
        source,
    })
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("commands", &self.commands())
            .field("fallback", &self.has_default())
            .field("parsers", &self.parsers)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Invoker`].
///
/// Commands are registered in insertion order when [`InvokerBuilder::build`]
/// runs; the first registration error is returned.
pub struct InvokerBuilder {
    commands: Vec<Command>,
    fallback: Option<Fallback>,
    parsers: ParserRegistry,
    tokenizer: Option<Box<dyn Tokenizer>>,
}

impl Default for InvokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvokerBuilder {
    /// Creates a builder with no commands, no fallback and the shell tokenizer.
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            fallback: None,
            parsers: ParserRegistry::new(),
            tokenizer: None,
        }
    }

    /// Adds a command.
    pub fn command<H, Args>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<Args>,
    {
        self.commands.push(Command::new(name, handler));
        self
    }

    /// Adds prepared commands.
    pub fn commands<I>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = Command>,
    {
        self.commands.extend(commands);
        self
    }

    /// Sets the fallback for unbound command names.
    pub fn fallback<F, R>(mut self, mut fallback: F) -> Self
    where
        F: FnMut(&[String]) -> R + 'static,
        R: IntoExitCode,
    {
        self.fallback = Some(Box::new(move |args: &[String]| fallback(args).into_exit_code()));
        self
    }

    /// Installs a user-layer parser for `T`.
    pub fn parser<T, F, E>(mut self, parser: F) -> Self
    where
        T: 'static,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.parsers.register(parser);
        self
    }

    /// Sets the tokenizer used by [`Invoker::invoke_line`].
    pub fn tokenizer<T>(mut self, tokenizer: T) -> Self
    where
        T: Tokenizer + 'static,
    {
        self.tokenizer = Some(Box::new(tokenizer));
        self
    }

    /// Builds the invoker.
    pub fn build(self) -> Result<Invoker, RegistrationError> {
        let mut invoker = Invoker {
            handlers: HashMap::with_capacity(self.commands.len()),
            fallback: self.fallback,
            parsers: self.parsers,
            tokenizer: self
                .tokenizer
                .unwrap_or_else(|| Box::new(ShellTokenizer)),
        };
        invoker.register_many(self.commands)?;
        Ok(invoker)
    }
}

impl fmt::Debug for InvokerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerBuilder")
            .field("commands", &self.commands)
            .field("fallback", &self.fallback.is_some())
            .field("parsers", &self.parsers)
            .finish_non_exhaustive()
    }
}
