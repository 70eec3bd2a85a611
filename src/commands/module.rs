//! Prefix-command dispatcher attached to an event bus.
//!
//! Watches `MessageCreated` events, parses messages that start with the
//! configured prefix, and spawns the matching handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use guildline_proto::{Event, EventKind, MessageEvent};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, trace, warn};

use super::context::CommandContext;
use super::registry::CommandRegistry;
use crate::bus::EventBus;
use crate::config::CommandsConfig;
use crate::error::{BindingError, ConfigurationError};
use crate::metrics;
use crate::rest::RestClient;
use crate::telemetry::{CommandTimer, spans};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Message parsing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOptions {
    /// Literal prefix at position 0. Empty matches every message.
    pub prefix: String,
    /// Characters splitting the command line.
    pub separators: Vec<char>,
    /// Drop empty tokens produced by adjacent separators.
    pub discard_empty: bool,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            separators: vec![' ', '\t', '\n'],
            discard_empty: true,
        }
    }
}

impl From<&CommandsConfig> for ModuleOptions {
    fn from(config: &CommandsConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            separators: config.separators.chars().collect(),
            discard_empty: config.discard_empty,
        }
    }
}

/// Split `input` on any of `separators`.
pub fn tokenize(input: &str, separators: &[char], discard_empty: bool) -> Vec<String> {
    input
        .split(|c: char| separators.contains(&c))
        .filter(|token| !discard_empty || !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// What happened to one message.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Not a command: no prefix, no name, or an unknown name.
    Ignored,
    /// The handler was spawned.
    Invoked(JoinHandle<()>),
    /// Arguments did not bind; the handler was not run.
    Rejected(BindingError),
}

/// A command that could not be run or that failed.
#[derive(Debug)]
pub enum CommandFailure {
    Binding { command: String, error: BindingError },
    Handler { command: String, error: anyhow::Error },
}

impl CommandFailure {
    pub fn command(&self) -> &str {
        match self {
            Self::Binding { command, .. } | Self::Handler { command, .. } => command,
        }
    }
}

/// Receives every [`CommandFailure`].
pub type ErrorSink = Arc<dyn Fn(CommandFailure) + Send + Sync>;

fn log_failure(failure: CommandFailure) {
    match failure {
        CommandFailure::Binding { command, error } => {
            warn!(command = %command, error = %error, "Command arguments rejected");
        }
        CommandFailure::Handler { command, error } => {
            warn!(command = %command, error = %format!("{error:#}"), "Command handler failed");
        }
    }
}

/// Proof of attachment, consumed by [`CommandModule::detach`].
#[derive(Debug, PartialEq, Eq)]
pub struct AttachHandle {
    bus_id: u64,
    handle_id: u64,
}

impl AttachHandle {
    /// Id of the bus this handle belongs to.
    pub fn bus_id(&self) -> u64 {
        self.bus_id
    }
}

struct Attachment {
    bus_id: u64,
    handle_id: u64,
    task: JoinHandle<()>,
}

/// Dispatches prefix commands from a bus to registered handlers.
pub struct CommandModule {
    registry: Arc<CommandRegistry>,
    options: ModuleOptions,
    error_sink: ErrorSink,
    rest: Option<Arc<dyn RestClient>>,
    attachment: Mutex<Option<Attachment>>,
}

impl CommandModule {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            options: ModuleOptions::default(),
            error_sink: Arc::new(log_failure),
            rest: None,
            attachment: Mutex::new(None),
        }
    }

    pub fn with_options(mut self, options: ModuleOptions) -> Self {
        self.options = options;
        self
    }

    /// Route failures to `sink` instead of the log.
    pub fn with_error_sink(mut self, sink: impl Fn(CommandFailure) + Send + Sync + 'static) -> Self {
        self.error_sink = Arc::new(sink);
        self
    }

    /// Client used by [`CommandContext::reply`] and friends.
    pub fn with_rest_client(mut self, client: Arc<dyn RestClient>) -> Self {
        self.rest = Some(client);
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn options(&self) -> &ModuleOptions {
        &self.options
    }

    /// Parse one message and spawn its handler if it names a command.
    ///
    /// Must be called inside a tokio runtime.
    pub fn process_message(&self, event: &MessageEvent) -> DispatchOutcome {
        let content = event.message.text();
        if content.is_empty() {
            return DispatchOutcome::Ignored;
        }
        let Some(line) = content.strip_prefix(self.options.prefix.as_str()) else {
            return DispatchOutcome::Ignored;
        };

        let mut tokens = tokenize(line, &self.options.separators, self.options.discard_empty);
        if tokens.first().is_none_or(String::is_empty) {
            return DispatchOutcome::Ignored;
        }
        let name = tokens.remove(0);

        let Some(command) = self.registry.resolve(&name) else {
            trace!(name = %name, "Unknown command");
            return DispatchOutcome::Ignored;
        };

        let args = match command.bind(&tokens) {
            Ok(args) => args,
            Err(error) => {
                debug!(command = %command.name(), error = %error, "Binding failed");
                metrics::record_command_error(command.name(), error.error_code());
                (self.error_sink)(CommandFailure::Binding {
                    command: command.name().to_string(),
                    error: error.clone(),
                });
                return DispatchOutcome::Rejected(error);
            }
        };

        let span = spans::command(
            command.name(),
            event.message.created_by.as_str(),
            &event.message.channel_id.to_string(),
        );
        let ctx = CommandContext::new(
            Arc::new(event.clone()),
            self.options.prefix.clone(),
            name,
            tokens,
            self.rest.clone(),
        );
        let handler = command.handler();
        let sink = Arc::clone(&self.error_sink);
        let command_name = command.name().to_string();

        let task = tokio::spawn(
            async move {
                let _timer = CommandTimer::new(command_name.as_str());
                if let Err(error) = handler.invoke(ctx, args).await {
                    metrics::record_command_error(&command_name, "handler");
                    sink(CommandFailure::Handler {
                        command: command_name,
                        error,
                    });
                }
            }
            .instrument(span),
        );
        DispatchOutcome::Invoked(task)
    }

    /// Start consuming `MessageCreated` events from `bus`.
    ///
    /// Attaching to a different bus moves the module there.
    ///
    /// # Errors
    ///
    /// `AlreadyAttached` if already attached to this same bus.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Result<AttachHandle, ConfigurationError> {
        let mut attachment = self.attachment.lock();
        if let Some(current) = attachment.as_ref() {
            if current.bus_id == bus.id() {
                return Err(ConfigurationError::AlreadyAttached);
            }
            info!(from = current.bus_id, to = bus.id(), "Moving command module to another bus");
        }
        if let Some(previous) = attachment.take() {
            previous.task.abort();
        }

        let mut messages = bus.subscribe(EventKind::MessageCreated);
        let module: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(event) = messages.recv().await {
                let Some(module) = module.upgrade() else {
                    break;
                };
                if let Event::MessageCreated(message) = &*event {
                    module.process_message(message);
                }
            }
        });

        let handle = AttachHandle {
            bus_id: bus.id(),
            handle_id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
        };
        *attachment = Some(Attachment {
            bus_id: handle.bus_id,
            handle_id: handle.handle_id,
            task,
        });
        debug!(bus = handle.bus_id, commands = self.registry.len(), "Command module attached");
        Ok(handle)
    }

    /// Stop consuming events.
    ///
    /// # Errors
    ///
    /// `NotAttached` if the module is not attached, `HandleMismatch` if
    /// `handle` came from an earlier attachment.
    pub fn detach(&self, handle: AttachHandle) -> Result<(), ConfigurationError> {
        let mut attachment = self.attachment.lock();
        match attachment.as_ref() {
            None => Err(ConfigurationError::NotAttached),
            Some(current) if current.handle_id != handle.handle_id => {
                Err(ConfigurationError::HandleMismatch)
            }
            Some(_) => {
                if let Some(current) = attachment.take() {
                    current.task.abort();
                    debug!(bus = current.bus_id, "Command module detached");
                }
                Ok(())
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.lock().is_some()
    }

    /// Id of the bus currently attached to.
    pub fn attached_bus(&self) -> Option<u64> {
        self.attachment.lock().as_ref().map(|a| a.bus_id)
    }
}

impl Drop for CommandModule {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.get_mut().take() {
            attachment.task.abort();
        }
    }
}

impl std::fmt::Debug for CommandModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandModule")
            .field("options", &self.options)
            .field("commands", &self.registry.len())
            .field("attached_bus", &self.attached_bus())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::binder::BoundArguments;
    use crate::commands::command::{CommandDefinition, ParameterDescriptor};
    use crate::commands::converter::{ArgType, ConverterRegistry};

    fn message(content: &str) -> MessageEvent {
        serde_json::from_value(serde_json::json!({
            "serverId": "wlVr3Ggl",
            "message": {
                "id": "00000000-0000-0000-0000-000000000001",
                "channelId": "00000000-0000-0000-0000-0000000000aa",
                "content": content,
                "createdAt": "2021-06-15T20:15:00Z",
                "createdBy": "Ann6LewA"
            }
        }))
        .unwrap()
    }

    fn module_with(prefix: &str, calls: Arc<Mutex<Vec<(String, i32)>>>) -> CommandModule {
        let greet = move |_ctx: CommandContext, args: BoundArguments| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().push((args.get::<String>(0)?, args.get::<i32>(1)?));
                Ok::<_, anyhow::Error>(())
            }
        };
        let registry = CommandRegistry::register(
            vec![
                CommandDefinition::new("greet", greet)
                    .alias("hi")
                    .param(ParameterDescriptor::required("name", ArgType::String))
                    .param(ParameterDescriptor::optional_or("times", 1i32)),
            ],
            &ConverterRegistry::with_defaults(),
        )
        .unwrap();
        CommandModule::new(registry).with_options(ModuleOptions {
            prefix: prefix.to_string(),
            ..ModuleOptions::default()
        })
    }

    #[test]
    fn tokenize_respects_discard_flag() {
        let seps = [' ', '\t', '\n'];
        assert_eq!(tokenize("a  b\tc", &seps, true), ["a", "b", "c"]);
        assert_eq!(tokenize("a  b", &seps, false), ["a", "", "b"]);
        assert!(tokenize("", &seps, true).is_empty());
    }

    proptest::proptest! {
        #[test]
        fn tokenize_never_yields_separators(input in "[a-c \t\n]{0,24}") {
            let seps = [' ', '\t', '\n'];
            let tokens = tokenize(&input, &seps, true);
            for token in &tokens {
                proptest::prop_assert!(!token.is_empty());
                proptest::prop_assert!(!token.contains(seps));
            }
            let squeezed: String = input.chars().filter(|c| !seps.contains(c)).collect();
            proptest::prop_assert_eq!(tokens.concat(), squeezed);
        }
    }

    #[tokio::test]
    async fn prefixed_command_is_invoked_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let module = module_with("!", Arc::clone(&calls));

        let DispatchOutcome::Invoked(task) = module.process_message(&message("!greet bob 3")) else {
            panic!("expected invocation");
        };
        task.await.unwrap();
        assert_eq!(*calls.lock(), vec![("bob".to_string(), 3)]);
    }

    #[tokio::test]
    async fn non_commands_are_ignored() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let module = module_with("!", Arc::clone(&calls));

        for content in ["hello", "", "!", "! greet", "!unknown x", " !greet bob"] {
            assert!(
                matches!(module.process_message(&message(content)), DispatchOutcome::Ignored),
                "{content:?} was not ignored"
            );
        }
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn alias_and_default_apply() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let module = module_with("", Arc::clone(&calls));

        let DispatchOutcome::Invoked(task) = module.process_message(&message("hi ann")) else {
            panic!("expected invocation");
        };
        task.await.unwrap();
        assert_eq!(*calls.lock(), vec![("ann".to_string(), 1)]);
    }

    #[tokio::test]
    async fn binding_failure_is_rejected_and_reported() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&reported);
        let module = module_with("!", Arc::new(Mutex::new(Vec::new()))).with_error_sink(move |f| {
            sink_log.lock().push(f.command().to_string());
        });

        let outcome = module.process_message(&message("!greet"));
        assert!(matches!(
            outcome,
            DispatchOutcome::Rejected(BindingError::MissingArgument { position: 0, .. })
        ));
        assert_eq!(*reported.lock(), vec!["greet".to_string()]);
    }

    #[tokio::test]
    async fn attach_detach_misuse() {
        let module = Arc::new(module_with("!", Arc::new(Mutex::new(Vec::new()))));
        let bus = EventBus::new();
        let other = EventBus::new();

        let stale = module.attach(&bus).unwrap();
        assert_eq!(module.attach(&bus), Err(ConfigurationError::AlreadyAttached));

        let current = module.attach(&other).unwrap();
        assert_eq!(module.attached_bus(), Some(other.id()));

        assert_eq!(module.detach(stale), Err(ConfigurationError::HandleMismatch));
        module.detach(current).unwrap();
        assert!(!module.is_attached());

        let again = module.attach(&bus).unwrap();
        module.detach(again).unwrap();
        let spare = AttachHandle {
            bus_id: bus.id(),
            handle_id: 0,
        };
        assert_eq!(module.detach(spare), Err(ConfigurationError::NotAttached));
    }
}
