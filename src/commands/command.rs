//! Command definitions, parameter descriptors and the handler trait.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::binder::{self, BoundArguments};
use super::context::CommandContext;
use super::converter::{ArgType, ArgValue, ConverterFn};
use crate::error::BindingError;

/// Executes one command invocation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn invoke(&self, ctx: CommandContext, args: BoundArguments) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandContext, BoundArguments) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn invoke(&self, ctx: CommandContext, args: BoundArguments) -> anyhow::Result<()> {
        (self)(ctx, args).await
    }
}

/// How a parameter consumes tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Must be supplied.
    Required,
    /// May be omitted; falls back to `default`, or to a missing marker.
    Optional { default: Option<ArgValue> },
    /// Collects every remaining token as raw text. Must be last.
    Rest,
}

/// Declared parameter of a command.
#[derive(Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: ArgType,
    pub kind: ParamKind,
    converter: Option<ConverterFn>,
}

impl ParameterDescriptor {
    pub fn required(name: impl Into<String>, ty: ArgType) -> Self {
        Self::with_kind(name, ty, ParamKind::Required)
    }

    /// Optional parameter that is missing when omitted.
    pub fn optional(name: impl Into<String>, ty: ArgType) -> Self {
        Self::with_kind(name, ty, ParamKind::Optional { default: None })
    }

    /// Optional parameter with a default; its type is the default's type.
    pub fn optional_or(name: impl Into<String>, default: impl Into<ArgValue>) -> Self {
        let default = default.into();
        Self::with_kind(
            name,
            default.ty(),
            ParamKind::Optional {
                default: Some(default),
            },
        )
    }

    /// Parameter collecting all remaining tokens.
    pub fn rest(name: impl Into<String>) -> Self {
        Self::with_kind(name, ArgType::String, ParamKind::Rest)
    }

    fn with_kind(name: impl Into<String>, ty: ArgType, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            ty,
            kind,
            converter: None,
        }
    }

    /// Use `converter` for this parameter instead of the registry's.
    pub fn with_converter(mut self, converter: ConverterFn) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn converter(&self) -> Option<&ConverterFn> {
        self.converter.as_ref()
    }

    pub(crate) fn set_converter(&mut self, converter: ConverterFn) {
        self.converter = Some(converter);
    }

    pub fn is_rest(&self) -> bool {
        self.kind == ParamKind::Rest
    }

    /// `<name>`, `[name]` or `[name...]`.
    pub fn usage(&self) -> String {
        match self.kind {
            ParamKind::Required => format!("<{}>", self.name),
            ParamKind::Optional { .. } => format!("[{}]", self.name),
            ParamKind::Rest => format!("[{}...]", self.name),
        }
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("kind", &self.kind)
            .field("custom_converter", &self.converter.is_some())
            .finish()
    }
}

/// Strip `Async`/`_async` then `Command`/`_command` and lower-case the rest.
///
/// `PingCommandAsync` becomes `ping`, `set_prefix_command` becomes
/// `set_prefix`. A name that is nothing but a suffix is kept.
pub fn derive_name(handler_name: &str) -> String {
    fn strip<'a>(name: &'a str, suffixes: [&str; 2]) -> &'a str {
        suffixes
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix).filter(|s| !s.is_empty()))
            .unwrap_or(name)
    }

    let name = strip(handler_name, ["Async", "_async"]);
    strip(name, ["Command", "_command"]).to_lowercase()
}

/// Builder describing a command before registration.
#[derive(Clone)]
pub struct CommandDefinition {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) params: Vec<ParameterDescriptor>,
    pub(crate) description: Option<String>,
    pub(crate) examples: Vec<String>,
    pub(crate) handler: Arc<dyn CommandHandler>,
}

impl CommandDefinition {
    pub fn new(name: impl Into<String>, handler: impl CommandHandler + 'static) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            params: Vec::new(),
            description: None,
            examples: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Name the command after its handler, see [`derive_name`].
    pub fn derived(handler_name: &str, handler: impl CommandHandler + 'static) -> Self {
        Self::new(derive_name(handler_name), handler)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `name <a> [b] [rest...]`
    pub fn usage(&self) -> String {
        usage(&self.name, &self.params)
    }

    pub fn summary(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn usage(name: &str, params: &[ParameterDescriptor]) -> String {
    params.iter().fold(name.to_string(), |mut line, param| {
        line.push(' ');
        line.push_str(&param.usage());
        line
    })
}

/// A registered, immutable command.
pub struct Command {
    name: String,
    aliases: Vec<String>,
    params: Vec<ParameterDescriptor>,
    description: Option<String>,
    examples: Vec<String>,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub(crate) fn from_definition(def: CommandDefinition) -> Self {
        Self {
            name: def.name,
            aliases: def.aliases,
            params: def.params,
            description: def.description,
            examples: def.examples,
            handler: def.handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    pub fn usage(&self) -> String {
        usage(&self.name, &self.params)
    }

    pub fn handler(&self) -> Arc<dyn CommandHandler> {
        Arc::clone(&self.handler)
    }

    /// Bind argument tokens to this command's parameters.
    pub fn bind(&self, tokens: &[String]) -> Result<BoundArguments, BindingError> {
        binder::bind(&self.params, tokens)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
