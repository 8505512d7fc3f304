//! Scripted remote shell for tests and dry rehearsals
//!
//! Responses are keyed by command prefix. Each key holds a queue: responses
//! are handed out in order and the last one repeats. Every command and file
//! push is appended to a shared journal that outlives the shell.

use super::{CommandOutput, Connector, RemoteError, RemoteShell};
use crate::device::DeviceFamily;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One recorded interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    Command(String),
    Put { local: PathBuf, remote: String },
    Close,
}

/// Shared, cloneable view of everything a scripted shell did
#[derive(Debug, Clone, Default)]
pub struct ShellJournal {
    events: Arc<Mutex<Vec<ShellEvent>>>,
}

impl ShellJournal {
    fn push(&self, event: ShellEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<ShellEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Commands in execution order
    pub fn commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ShellEvent::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// (local, remote) pairs of every file push
    pub fn puts(&self) -> Vec<(PathBuf, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ShellEvent::Put { local, remote } => Some((local, remote)),
                _ => None,
            })
            .collect()
    }

    /// Number of commands starting with `prefix`
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn was_closed(&self) -> bool {
        self.events().contains(&ShellEvent::Close)
    }
}

struct Rule {
    prefix: String,
    responses: Vec<CommandOutput>,
}

/// In-memory `RemoteShell`
pub struct ScriptedShell {
    rules: Vec<Rule>,
    put_failure: Option<String>,
    journal: ShellJournal,
    closed: bool,
}

impl Default for ScriptedShell {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            put_failure: None,
            journal: ShellJournal::default(),
            closed: false,
        }
    }

    /// Queue a response for commands starting with `prefix`
    ///
    /// Rules are matched in the order they were first added.
    pub fn on(mut self, prefix: &str, output: CommandOutput) -> Self {
        match self.rules.iter_mut().find(|r| r.prefix == prefix) {
            Some(rule) => rule.responses.push(output),
            None => self.rules.push(Rule {
                prefix: prefix.to_string(),
                responses: vec![output],
            }),
        }
        self
    }

    /// Make every `put_file` fail with `detail`
    pub fn fail_puts(mut self, detail: &str) -> Self {
        self.put_failure = Some(detail.to_string());
        self
    }

    pub fn journal(&self) -> ShellJournal {
        self.journal.clone()
    }
}

impl RemoteShell for ScriptedShell {
    fn run_command(&mut self, command: &str) -> Result<CommandOutput, RemoteError> {
        if self.closed {
            return Err(RemoteError::Closed);
        }
        self.journal.push(ShellEvent::Command(command.to_string()));

        let rule = self
            .rules
            .iter_mut()
            .find(|r| command.starts_with(&r.prefix));
        Ok(match rule {
            Some(rule) if rule.responses.len() > 1 => rule.responses.remove(0),
            Some(rule) => rule.responses[0].clone(),
            None => CommandOutput::failed(127, format!("{}: command not scripted", command)),
        })
    }

    fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        if self.closed {
            return Err(RemoteError::Closed);
        }
        self.journal.push(ShellEvent::Put {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        match &self.put_failure {
            Some(detail) => Err(RemoteError::Transfer {
                local: local.display().to_string(),
                remote: remote.to_string(),
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.journal.push(ShellEvent::Close);
        }
    }
}

/// Hands out one scripted shell, or a canned connection error
pub struct ScriptedConnector {
    shell: Mutex<Option<Result<ScriptedShell, RemoteError>>>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(shell: ScriptedShell) -> Self {
        Self {
            shell: Mutex::new(Some(Ok(shell))),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: RemoteError) -> Self {
        Self {
            shell: Mutex::new(Some(Err(error))),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Addresses passed to `connect`, in order
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Connector for ScriptedConnector {
    fn connect(
        &self,
        address: &str,
        _family: DeviceFamily,
    ) -> Result<Box<dyn RemoteShell>, RemoteError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(address.to_string());
        }
        let taken = self.shell.lock().ok().and_then(|mut s| s.take());
        match taken {
            Some(Ok(shell)) => Ok(Box::new(shell)),
            Some(Err(e)) => Err(e),
            None => Err(RemoteError::Connect {
                host: address.to_string(),
                detail: "scripted shell already handed out".to_string(),
            }),
        }
    }
}
