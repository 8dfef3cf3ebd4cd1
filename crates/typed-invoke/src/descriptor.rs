//! Handler shapes and the validated descriptors built from them.
//!
//! Every registration funnels through [`HandlerDescriptor::check_and_pack`],
//! which validates a [`Signature`] and records the fixed parameter types and
//! the optional rest element type. Checks run in this order and the first
//! failure wins:
//!
//! 1. the declared return type is `i32`,
//! 2. no parameter is optional or output-bound,
//! 3. no parameter except the last is a sequence,
//! 4. a trailing sequence becomes the rest parameter.
//!
//! Packing then probes the default parser layer for every fixed type and the
//! rest element type, so missing-parser errors at invocation time do not
//! depend on which command happened to run first.

use std::any::{type_name, TypeId};
use std::fmt;

use crate::arg_type::ArgType;
use crate::error::{Arity, RegistrationError};
use crate::handler::ParsedArgs;
use crate::parser::{ArgTypeInfo, DefaultParsers};

/// How a parameter receives its argument(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// One argument, parsed as the parameter type.
    Scalar,
    /// All remaining arguments, each parsed as the element type.
    Sequence,
    /// A parameter that may be omitted. Not supported.
    Optional,
    /// A parameter written by the handler. Not supported.
    Output,
}

/// One parameter in a [`Signature`].
///
/// For [`ParamKind::Sequence`] the type is the element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    ty: ArgTypeInfo,
    kind: ParamKind,
}

impl ParamSpec {
    /// Creates a parameter spec from its parts.
    pub fn new(ty: ArgTypeInfo, kind: ParamKind) -> Self {
        Self { ty, kind }
    }

    /// A single-argument parameter of type `T`.
    pub fn scalar<T: ArgType>() -> Self {
        Self::new(ArgTypeInfo::of::<T>(), ParamKind::Scalar)
    }

    /// A sequence parameter with element type `T`.
    pub fn sequence<T: ArgType>() -> Self {
        Self::new(ArgTypeInfo::of::<T>(), ParamKind::Sequence)
    }

    /// An optional parameter of type `T`.
    pub fn optional<T: 'static>() -> Self {
        Self::new(ArgTypeInfo::opaque::<T>(), ParamKind::Optional)
    }

    /// An output parameter of type `T`.
    pub fn output<T: 'static>() -> Self {
        Self::new(ArgTypeInfo::opaque::<T>(), ParamKind::Output)
    }

    /// The parameter type (element type for sequences).
    pub fn type_info(&self) -> &ArgTypeInfo {
        &self.ty
    }

    /// How the parameter receives its argument(s).
    pub fn kind(&self) -> ParamKind {
        self.kind
    }
}

/// The declared shape of a handler: parameters in order plus a return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<ParamSpec>,
    return_type: TypeId,
    return_type_name: &'static str,
}

impl Signature {
    /// A signature returning `i32`.
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self::returning::<i32>(params)
    }

    /// A signature with an arbitrary declared return type.
    pub fn returning<R: 'static>(params: Vec<ParamSpec>) -> Self {
        Self {
            params,
            return_type: TypeId::of::<R>(),
            return_type_name: type_name::<R>(),
        }
    }

    /// The declared parameters, in order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// The name of the declared return type.
    pub fn return_type_name(&self) -> &'static str {
        self.return_type_name
    }
}

/// A fixed (non-rest) parameter of a packed handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedParam {
    position: usize,
    ty: ArgTypeInfo,
}

impl FixedParam {
    /// Zero-based position in the argument vector.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The parameter type.
    pub fn type_info(&self) -> &ArgTypeInfo {
        &self.ty
    }
}

/// The erased call façade shared by every handler shape.
pub(crate) type BoxedCall = Box<dyn FnMut(ParsedArgs) -> anyhow::Result<i32>>;

/// A validated, immutable record describing a bound handler.
pub struct HandlerDescriptor {
    call: BoxedCall,
    fixed: Vec<FixedParam>,
    rest: Option<ArgTypeInfo>,
}

impl HandlerDescriptor {
    /// Validates a signature and packs it with its callable.
    pub(crate) fn check_and_pack(
        command: &str,
        signature: Signature,
        call: BoxedCall,
    ) -> Result<Self, RegistrationError> {
        if signature.return_type != TypeId::of::<i32>() {
            return Err(RegistrationError::invalid_handler(
                command,
                format!(
                    "return type must be i32, found {}",
                    signature.return_type_name
                ),
            ));
        }

        let params = signature.params;

        for (position, param) in params.iter().enumerate() {
            let problem = match param.kind {
                ParamKind::Optional => "optional",
                ParamKind::Output => "an output parameter",
                _ => continue,
            };
            return Err(RegistrationError::invalid_handler(
                command,
                format!(
                    "parameter {} ({}) is {}; only required parameters are supported",
                    position,
                    param.ty.name(),
                    problem
                ),
            ));
        }

        let last = params.len().saturating_sub(1);
        if let Some((position, param)) = params
            .iter()
            .enumerate()
            .find(|(position, param)| param.kind == ParamKind::Sequence && *position != last)
        {
            return Err(RegistrationError::invalid_handler(
                command,
                format!(
                    "parameter {} (sequence of {}) is not last; only the last parameter may take the rest of the arguments",
                    position,
                    param.ty.name()
                ),
            ));
        }

        let mut fixed: Vec<FixedParam> = params
            .iter()
            .enumerate()
            .map(|(position, param)| FixedParam {
                position,
                ty: param.ty,
            })
            .collect();

        let rest = match params.last() {
            Some(param) if param.kind == ParamKind::Sequence => {
                fixed.pop();
                Some(param.ty)
            }
            _ => None,
        };

        for param in &fixed {
            DefaultParsers::probe(&param.ty);
        }
        if let Some(ty) = &rest {
            DefaultParsers::probe(ty);
        }

        Ok(Self { call, fixed, rest })
    }

    /// The fixed parameters, in order.
    pub fn fixed_params(&self) -> &[FixedParam] {
        &self.fixed
    }

    /// The rest element type, if the handler takes the rest of the arguments.
    pub fn rest_param(&self) -> Option<&ArgTypeInfo> {
        self.rest.as_ref()
    }

    /// Returns true if the handler ends in a rest parameter.
    pub fn has_rest(&self) -> bool {
        self.rest.is_some()
    }

    /// The argument count this handler accepts.
    pub fn arity(&self) -> Arity {
        if self.has_rest() {
            Arity::AtLeast(self.fixed.len())
        } else {
            Arity::Exactly(self.fixed.len())
        }
    }

    pub(crate) fn call(&mut self, args: ParsedArgs) -> anyhow::Result<i32> {
        (self.call)(args)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("fixed", &self.fixed)
            .field("rest", &self.rest)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> BoxedCall {
        Box::new(|_: ParsedArgs| -> anyhow::Result<i32> { Ok(0) })
    }

    fn pack(params: Vec<ParamSpec>) -> Result<HandlerDescriptor, RegistrationError> {
        HandlerDescriptor::check_and_pack("cmd", Signature::new(params), noop())
    }

    fn reason(err: RegistrationError) -> String {
        match err {
            RegistrationError::InvalidHandler { reason, .. } => reason,
            other => panic!("expected InvalidHandler, got {:?}", other),
        }
    }

    #[test]
    fn test_pack_fixed_only() {
        let descriptor =
            pack(vec![ParamSpec::scalar::<i32>(), ParamSpec::scalar::<String>()]).unwrap();
        assert_eq!(descriptor.arity(), Arity::Exactly(2));
        assert!(!descriptor.has_rest());
        assert_eq!(descriptor.fixed_params()[1].position(), 1);
        assert_eq!(
            descriptor.fixed_params()[1].type_info(),
            &ArgTypeInfo::of::<String>()
        );
    }

    #[test]
    fn test_pack_with_rest() {
        let descriptor =
            pack(vec![ParamSpec::scalar::<i32>(), ParamSpec::sequence::<u64>()]).unwrap();
        assert_eq!(descriptor.arity(), Arity::AtLeast(1));
        assert_eq!(descriptor.fixed_params().len(), 1);
        assert_eq!(descriptor.rest_param(), Some(&ArgTypeInfo::of::<u64>()));
    }

    #[test]
    fn test_pack_rest_only() {
        let descriptor = pack(vec![ParamSpec::sequence::<String>()]).unwrap();
        assert_eq!(descriptor.arity(), Arity::AtLeast(0));
        assert!(descriptor.fixed_params().is_empty());
    }

    #[test]
    fn test_pack_empty() {
        let descriptor = pack(vec![]).unwrap();
        assert_eq!(descriptor.arity(), Arity::Exactly(0));
    }

    #[test]
    fn test_reject_non_i32_return() {
        let signature = Signature::returning::<String>(vec![]);
        let err = HandlerDescriptor::check_and_pack("cmd", signature, noop()).unwrap_err();
        assert_eq!(
            reason(err),
            "return type must be i32, found alloc::string::String"
        );
    }

    #[test]
    fn test_reject_optional() {
        let err = pack(vec![ParamSpec::scalar::<i32>(), ParamSpec::optional::<i32>()])
            .unwrap_err();
        assert!(reason(err).starts_with("parameter 1 (i32) is optional"));
    }

    #[test]
    fn test_reject_output() {
        let err = pack(vec![ParamSpec::output::<String>()]).unwrap_err();
        assert!(reason(err).contains("is an output parameter"));
    }

    #[test]
    fn test_reject_sequence_before_last() {
        let err = pack(vec![ParamSpec::sequence::<i32>(), ParamSpec::scalar::<i32>()])
            .unwrap_err();
        assert!(reason(err).starts_with("parameter 0 (sequence of i32) is not last"));
    }

    #[test]
    fn test_return_checked_before_params() {
        let signature = Signature::returning::<bool>(vec![ParamSpec::optional::<i32>()]);
        let err = HandlerDescriptor::check_and_pack("cmd", signature, noop()).unwrap_err();
        assert!(reason(err).starts_with("return type"));
    }

    #[test]
    fn test_optional_checked_before_sequence_position() {
        let err = pack(vec![ParamSpec::sequence::<i32>(), ParamSpec::optional::<i32>()])
            .unwrap_err();
        assert!(reason(err).contains("optional"));
    }

    #[test]
    fn test_pack_probes_default_layer() {
        struct ProbedFixed;
        impl ArgType for ProbedFixed {}
        struct ProbedRest;
        impl ArgType for ProbedRest {}

        assert!(!DefaultParsers::is_probed(TypeId::of::<ProbedFixed>()));
        assert!(!DefaultParsers::is_probed(TypeId::of::<ProbedRest>()));

        pack(vec![
            ParamSpec::scalar::<ProbedFixed>(),
            ParamSpec::sequence::<ProbedRest>(),
        ])
        .unwrap();

        assert!(DefaultParsers::is_probed(TypeId::of::<ProbedFixed>()));
        assert!(DefaultParsers::is_probed(TypeId::of::<ProbedRest>()));
    }

    #[test]
    fn test_invalid_handler_message_names_command() {
        let signature = Signature::returning::<()>(vec![]);
        let err = HandlerDescriptor::check_and_pack("deploy", signature, noop()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid handler for command 'deploy': return type must be i32, found ()"
        );
    }
}
