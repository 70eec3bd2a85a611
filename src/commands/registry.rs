//! Registered commands, looked up by name or alias.

use std::collections::HashMap;
use std::sync::Arc;

use super::command::{Command, CommandDefinition};
use super::converter::ConverterRegistry;
use crate::error::RegistrationError;

/// Immutable table of commands built once at startup.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<Command>>,
    by_name: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl CommandRegistry {
    /// Validate `definitions` and build the table.
    ///
    /// Each non-rest parameter is given its converter from `converters`
    /// unless it carries its own.
    ///
    /// # Errors
    ///
    /// - `DuplicateCommandName` if a name or alias is used twice, across
    ///   names and aliases alike
    /// - `MisplacedRestParameter` if a rest parameter is not last
    /// - `UnsupportedParameterType` if no converter exists for a parameter
    pub fn register<I>(definitions: I, converters: &ConverterRegistry) -> Result<Self, RegistrationError>
    where
        I: IntoIterator<Item = CommandDefinition>,
    {
        let mut registry = Self::default();
        for mut def in definitions {
            let index = registry.commands.len();
            registry.claim(&def.name, index, false)?;
            for alias in &def.aliases {
                registry.claim(alias, index, true)?;
            }

            let last = def.params.len().saturating_sub(1);
            for (position, param) in def.params.iter_mut().enumerate() {
                if param.is_rest() {
                    if position != last {
                        return Err(RegistrationError::MisplacedRestParameter {
                            command: def.name.clone(),
                            parameter: param.name.clone(),
                        });
                    }
                    continue;
                }
                if param.converter().is_some() {
                    continue;
                }
                let converter = converters.get(param.ty).ok_or_else(|| {
                    RegistrationError::UnsupportedParameterType {
                        command: def.name.clone(),
                        parameter: param.name.clone(),
                        ty: param.ty,
                    }
                })?;
                param.set_converter(converter);
            }

            tracing::debug!(command = %def.name, aliases = ?def.aliases, "Command registered");
            registry.commands.push(Arc::new(Command::from_definition(def)));
        }
        Ok(registry)
    }

    fn claim(&mut self, name: &str, index: usize, alias: bool) -> Result<(), RegistrationError> {
        if self.by_name.contains_key(name) || self.by_alias.contains_key(name) {
            return Err(RegistrationError::DuplicateCommandName {
                name: name.to_string(),
            });
        }
        let table = if alias {
            &mut self.by_alias
        } else {
            &mut self.by_name
        };
        table.insert(name.to_string(), index);
        Ok(())
    }

    /// Find a command by exact name, then by alias. Case-sensitive.
    pub fn resolve(&self, name: &str) -> Option<&Arc<Command>> {
        self.by_name
            .get(name)
            .or_else(|| self.by_alias.get(name))
            .and_then(|&index| self.commands.get(index))
    }

    /// Commands in registration order.
    pub fn commands(&self) -> &[Arc<Command>] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::binder::BoundArguments;
    use crate::commands::command::ParameterDescriptor;
    use crate::commands::context::CommandContext;
    use crate::commands::converter::ArgType;

    async fn noop(_ctx: CommandContext, _args: BoundArguments) -> anyhow::Result<()> {
        Ok(())
    }

    fn register(defs: Vec<CommandDefinition>) -> Result<CommandRegistry, RegistrationError> {
        CommandRegistry::register(defs, &ConverterRegistry::with_defaults())
    }

    #[test]
    fn resolves_by_name_and_alias() {
        let registry = register(vec![
            CommandDefinition::new("roll", noop).alias("r"),
            CommandDefinition::new("help", noop),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("roll").unwrap().name(), "roll");
        assert_eq!(registry.resolve("r").unwrap().name(), "roll");
        assert!(registry.resolve("ROLL").is_none());
        assert!(registry.resolve("unknown").is_none());
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let err = register(vec![
            CommandDefinition::new("roll", noop).alias("r"),
            CommandDefinition::new("remind", noop).alias("r"),
        ])
        .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateCommandName { name: "r".into() });
    }

    #[test]
    fn alias_colliding_with_name_is_rejected() {
        let err = register(vec![
            CommandDefinition::new("roll", noop),
            CommandDefinition::new("dice", noop).alias("roll"),
        ])
        .unwrap_err();
        assert_eq!(err.error_code(), "duplicate_command_name");

        let err = register(vec![CommandDefinition::new("roll", noop).alias("roll")]).unwrap_err();
        assert_eq!(err.error_code(), "duplicate_command_name");
    }

    #[test]
    fn rest_must_be_last() {
        let err = register(vec![
            CommandDefinition::new("say", noop)
                .param(ParameterDescriptor::rest("words"))
                .param(ParameterDescriptor::required("n", ArgType::I32)),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistrationError::MisplacedRestParameter { ref parameter, .. } if parameter == "words"));
    }

    #[test]
    fn missing_converter_is_unsupported() {
        let err = CommandRegistry::register(
            vec![CommandDefinition::new("wait", noop).param(ParameterDescriptor::required("for", ArgType::Duration))],
            &ConverterRegistry::empty(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::UnsupportedParameterType {
                command: "wait".into(),
                parameter: "for".into(),
                ty: ArgType::Duration,
            }
        );
    }

    #[test]
    fn registration_fills_converters() {
        let registry = register(vec![
            CommandDefinition::new("add", noop)
                .param(ParameterDescriptor::required("a", ArgType::I32))
                .param(ParameterDescriptor::rest("more")),
        ])
        .unwrap();

        let command = registry.resolve("add").unwrap();
        assert!(command.params()[0].converter().is_some());
        assert!(command.params()[1].converter().is_none());
    }
}
