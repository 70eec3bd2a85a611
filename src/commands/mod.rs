//! Prefix-command framework.
//!
//! - [`converter`]: token-to-value converters per parameter type
//! - [`command`]: definitions, parameters and the handler trait
//! - [`registry`]: validated name/alias lookup table
//! - [`binder`]: positional binding of tokens to parameters
//! - [`module`]: the dispatcher attached to an event bus

pub mod binder;
pub mod builtin;
pub mod command;
pub mod context;
pub mod converter;
pub mod module;
pub mod registry;

pub use binder::{Argument, BoundArguments, FromArgValue, bind};
pub use command::{
    Command, CommandDefinition, CommandHandler, ParamKind, ParameterDescriptor, derive_name,
};
pub use context::CommandContext;
pub use converter::{ArgType, ArgValue, ConverterFn, ConverterRegistry};
pub use module::{
    AttachHandle, CommandFailure, CommandModule, DispatchOutcome, ErrorSink, ModuleOptions,
    tokenize,
};
pub use registry::CommandRegistry;
