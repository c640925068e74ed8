//! `SystemTool`: allow-listed local system operations.
//!
//! Input is `"<command> [arguments]"`.  The command token is matched
//! case-insensitively against a closed set ([`SystemCommand`]); anything
//! else is refused without side effects.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;

use super::notes::NoteStore;
use crate::config::Config;
use crate::tools::{Tool, ToolMeta};

/// The closed allow-list of system commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    Date,
    Time,
    SystemInfo,
    ListDirectory,
    CreateNote,
    ReadNote,
}

impl SystemCommand {
    /// Every command, in the order they are advertised.
    pub const ALL: [SystemCommand; 6] = [
        SystemCommand::Date,
        SystemCommand::Time,
        SystemCommand::SystemInfo,
        SystemCommand::ListDirectory,
        SystemCommand::CreateNote,
        SystemCommand::ReadNote,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SystemCommand::Date => "date",
            SystemCommand::Time => "time",
            SystemCommand::SystemInfo => "system_info",
            SystemCommand::ListDirectory => "list_directory",
            SystemCommand::CreateNote => "create_note",
            SystemCommand::ReadNote => "read_note",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        Self::ALL.into_iter().find(|c| c.name() == lower)
    }

    /// Comma-separated list of allowed command names.
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Split `"<command> [arguments]"` on the first whitespace run.
pub fn split_command(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim_start()),
        None => (input, ""),
    }
}

/// Local system operations plus note persistence.
pub struct SystemTool {
    notes: NoteStore,
    working_dir: PathBuf,
}

impl SystemTool {
    pub fn new(notes: NoteStore, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            notes,
            working_dir: working_dir.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(NoteStore::new(cfg.notes_dir.clone()), cfg.working_dir())
    }

    /// Parse and run one command line.
    pub async fn execute(&self, input: &str) -> String {
        let (cmd, args) = split_command(input);
        let Some(command) = SystemCommand::from_name(cmd) else {
            return format!(
                "Command '{}' is not allowed. Allowed commands: {}",
                cmd.to_lowercase(),
                SystemCommand::allowed_list()
            );
        };
        tracing::debug!(command = command.name(), "system command");
        match command {
            SystemCommand::Date => current_date(),
            SystemCommand::Time => current_time(),
            SystemCommand::SystemInfo => system_info(),
            SystemCommand::ListDirectory => self.list_directory(args).await,
            SystemCommand::CreateNote => self.create_note(args).await,
            SystemCommand::ReadNote => self.read_note(args).await,
        }
    }

    async fn list_directory(&self, path: &str) -> String {
        let dir = if path.is_empty() {
            self.working_dir.clone()
        } else {
            PathBuf::from(path)
        };
        match list_dir(&dir).await {
            Ok((folders, files)) => format!(
                "Directory: {}\n\nFolders:\n{}\n\nFiles:\n{}",
                dir.display(),
                join_or_none(&folders),
                join_or_none(&files)
            ),
            Err(e) => format!("Error listing directory: {e:#}"),
        }
    }

    async fn create_note(&self, args: &str) -> String {
        let Some((title, body)) = args.split_once('|') else {
            return "Error: Format should be 'title|content'".to_string();
        };
        let title = title.trim();
        match self.notes.create(title, body).await {
            Ok(path) => format!("Note saved as {}", path.display()),
            Err(e) => format!("Error creating note: {e:#}"),
        }
    }

    async fn read_note(&self, title: &str) -> String {
        if !self.notes.exists().await {
            return "No notes directory found.".to_string();
        }
        match self.notes.read(title).await {
            Ok(Some(note)) => format!("Note: {}\n\n{}", note.filename, note.body),
            Ok(None) => format!("No notes found matching '{title}'"),
            Err(e) => format!("Error reading note: {e:#}"),
        }
    }
}

fn current_date() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn current_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn system_info() -> String {
    format!(
        "Operating System: {} ({})\nArchitecture: {}\nRuntime Version: {} {}",
        std::env::consts::OS,
        std::env::consts::FAMILY,
        std::env::consts::ARCH,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
}

/// Folder and file names in `dir`, each sorted.
async fn list_dir(dir: &Path) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let mut rd = tokio::fs::read_dir(dir).await?;
    let mut folders = Vec::new();
    let mut files = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        // Follows symlinks, like a path-based check would.
        match tokio::fs::metadata(entry.path()).await {
            Ok(m) if m.is_dir() => folders.push(name),
            Ok(m) if m.is_file() => files.push(name),
            _ => {}
        }
    }
    folders.sort();
    files.sort();
    Ok((folders, files))
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "None".to_string()
    } else {
        names.join("\n")
    }
}

#[async_trait]
impl Tool for SystemTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta {
            name: "SystemTool".into(),
            description: "Execute system operations. Available commands:\n\
                - date: Get current date\n\
                - time: Get current time\n\
                - system_info: Get basic system information\n\
                - list_directory [path]: List contents of a directory\n\
                - create_note title|content: Create a text note\n\
                - read_note title: Read a note by title\n\
                Input should be the command name followed by arguments if needed."
                .into(),
        }
    }

    async fn invoke(&self, input: &str) -> String {
        self.execute(input).await
    }
}
