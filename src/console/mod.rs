//! Serial console command registry and dispatcher.
//!
//! Clients register a name plus a fixed list of commands at start-up; the
//! console active object tokenises each received line and routes
//! `<client> <command> [args…]` to the matching handler. Handlers run
//! synchronously on the console thread — they post events to other active
//! objects and read shared snapshots, never another object's live state.
//!
//! The registry is bounded and built once: no clients come or go after
//! start-up, matching the no-allocation-after-init rule for the rest of
//! the system. Byte transport and line editing are the UART driver's
//! problem; this module starts at whole lines.

use log::info;

use crate::active::EventHandler;
use crate::error::{CmdError, Result};

/// Maximum number of registered clients.
pub const MAX_CLIENTS: usize = 10;
/// Maximum number of tokens on one line.
pub const MAX_TOKENS: usize = 10;
/// Maximum commands per client.
pub const MAX_COMMANDS: usize = 8;
/// Maximum accepted line length (bytes).
pub const LINE_MAX: usize = 128;

/// One console line, already copied out of the transport's buffer. The
/// copy happens at the producer, so the transport may reuse its buffer
/// the moment the post returns.
pub type Line = heapless::String<LINE_MAX>;

/// Events delivered to the console active object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Init,
    /// A complete line received from the operator.
    Line(Line),
}

// ---------------------------------------------------------------------------
// Commands and clients
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&[&str]) -> Result<()> + Send>;

/// A single named command with its help text and handler.
pub struct Command {
    name: &'static str,
    help: &'static str,
    handler: Handler,
}

impl Command {
    pub fn new(
        name: &'static str,
        help: &'static str,
        handler: impl Fn(&[&str]) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            name,
            help,
            handler: Box::new(handler),
        }
    }
}

/// A registered client: the first command-line token plus its commands.
pub struct Client {
    name: &'static str,
    commands: heapless::Vec<Command, MAX_COMMANDS>,
}

impl Client {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            commands: heapless::Vec::new(),
        }
    }

    /// Add a command (builder style). The per-client command list is a
    /// compile-time sizing decision; overflowing it is fatal.
    pub fn command(mut self, command: Command) -> Self {
        assert!(
            self.commands.push(command).is_ok(),
            "client '{}' exceeds {MAX_COMMANDS} commands",
            self.name
        );
        self
    }
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// The console active object: registry plus line dispatcher.
pub struct Console {
    clients: heapless::Vec<Client, MAX_CLIENTS>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            clients: heapless::Vec::new(),
        }
    }

    /// Register a client. All registration happens at start-up; a full
    /// registry is a programming error.
    pub fn register(&mut self, client: Client) {
        info!("CONSOLE: registered client '{}'", client.name);
        assert!(
            self.clients.push(client).is_ok(),
            "console client table full ({MAX_CLIENTS} clients)"
        );
    }

    /// Tokenise and execute one line. Returns the routing/handler error;
    /// the event handler turns it into a single explanatory line.
    pub fn execute(&self, line: &str) -> Result<()> {
        let mut tokens: heapless::Vec<&str, MAX_TOKENS> = heapless::Vec::new();
        for token in line.split_whitespace() {
            tokens.push(token).map_err(|_| CmdError::Overrun)?;
        }

        let Some(&first) = tokens.first() else {
            return Ok(()); // Blank line.
        };

        if first == "help" {
            self.print_help();
            return Ok(());
        }

        let client = self
            .clients
            .iter()
            .find(|c| c.name == first)
            .ok_or(CmdError::UnknownClient)?;

        match tokens.get(1) {
            None | Some(&"help") => {
                Self::print_client_help(client);
                Ok(())
            }
            Some(&name) => {
                let command = client
                    .commands
                    .iter()
                    .find(|c| c.name == name)
                    .ok_or(CmdError::UnknownCommand)?;
                (command.handler)(&tokens[2..])
            }
        }
    }

    fn print_help(&self) {
        println!("Available commands:");
        for client in &self.clients {
            Self::print_client_help(client);
        }
    }

    fn print_client_help(client: &Client) {
        for command in &client.commands {
            println!("  {} {} - {}", client.name, command.name, command.help);
        }
    }
}

impl EventHandler for Console {
    type Event = ConsoleEvent;
    const INIT: ConsoleEvent = ConsoleEvent::Init;

    fn on_event(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::Init => {
                info!("CONSOLE: ready, type 'help' for commands");
            }
            ConsoleEvent::Line(line) => {
                if let Err(e) = self.execute(&line) {
                    // One explanatory line per failure; state unchanged.
                    println!("error: {e} (type 'help' for usage)");
                }
            }
        }
    }
}
