//! Ready-made firewall scripts and writing scripts to disk
//!
//! The templates are fixed text for common server roles on both platforms,
//! plus a reference sheet of commands for checking a firewall afterwards.
//! They are not generated from a ruleset; see [`crate::core::script`] for that.

use std::path::{Path, PathBuf};

use crate::core::error::{Error, Result};

/// Number of characters shown by [`ScriptTemplate::preview`]
pub const PREVIEW_CHARS: usize = 500;

/// Operating system a template targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Platform {
    #[strum(serialize = "windows")]
    Windows,
    #[strum(serialize = "linux")]
    Linux,
    /// Commands for both systems
    #[strum(serialize = "any")]
    Both,
}

/// A fixed script shipped with the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptTemplate {
    /// Short identifier used on the command line
    pub key: &'static str,
    pub title: &'static str,
    pub filename: &'static str,
    pub platform: Platform,
    pub content: &'static str,
}

impl ScriptTemplate {
    /// First [`PREVIEW_CHARS`] characters followed by `...`
    pub fn preview(&self) -> String {
        preview(self.content, PREVIEW_CHARS)
    }
}

pub const TEMPLATES: [ScriptTemplate; 4] = [
    ScriptTemplate {
        key: "windows-web",
        title: "Windows Web Server Script",
        filename: "windows-webserver-firewall.bat",
        platform: Platform::Windows,
        content: include_str!("../templates/windows-webserver-firewall.bat"),
    },
    ScriptTemplate {
        key: "linux-web",
        title: "Linux Web Server Script",
        filename: "linux-webserver-firewall.sh",
        platform: Platform::Linux,
        content: include_str!("../templates/linux-webserver-firewall.sh"),
    },
    ScriptTemplate {
        key: "windows-db",
        title: "Windows Database Server Script",
        filename: "windows-database-firewall.bat",
        platform: Platform::Windows,
        content: include_str!("../templates/windows-database-firewall.bat"),
    },
    ScriptTemplate {
        key: "linux-db",
        title: "Linux Database Server Script",
        filename: "linux-database-firewall.sh",
        platform: Platform::Linux,
        content: include_str!("../templates/linux-database-firewall.sh"),
    },
];

pub const TESTING_COMMANDS: ScriptTemplate = ScriptTemplate {
    key: "testing",
    title: "Common Testing Commands",
    filename: "firewall-testing-commands.txt",
    platform: Platform::Both,
    content: include_str!("../templates/firewall-testing-commands.txt"),
};

/// All templates including the testing-command reference.
pub fn all_templates() -> impl Iterator<Item = &'static ScriptTemplate> {
    TEMPLATES.iter().chain(std::iter::once(&TESTING_COMMANDS))
}

/// Looks up a template by key.
///
/// # Errors
///
/// Returns [`Error::UnknownTemplate`] if no template has that key.
pub fn find_template(key: &str) -> Result<&'static ScriptTemplate> {
    all_templates()
        .find(|t| t.key == key)
        .ok_or_else(|| Error::UnknownTemplate(key.to_string()))
}

/// Truncates `content` to `max_chars` characters and appends `...`.
///
/// Cuts on a character boundary. The ellipsis is always added, even for short
/// content, matching how previews are shown next to a download button.
pub fn preview(content: &str, max_chars: usize) -> String {
    let end = content
        .char_indices()
        .nth(max_chars)
        .map_or(content.len(), |(idx, _)| idx);
    format!("{}...", &content[..end])
}

/// Writes `content` to `dir/filename` using an atomic write pattern.
/// 1. Writes to a temporary file next to the target.
/// 2. Sets permissions (0o755 for `.sh`, 0o644 otherwise) before any data is written.
/// 3. Atomically renames to the target path.
///
/// Creates `dir` if missing. Returns the final path.
///
/// # Errors
///
/// Returns `Err` if the directory cannot be created or the file cannot be written.
/// The temporary file is removed when the write fails.
pub async fn write_script(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    if filename.is_empty() || filename.contains(['/', '\\']) || filename == ".." {
        return Err(Error::validation("filename", format!("invalid file name \"{filename}\"")));
    }

    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(filename);
    let temp_path = dir.join(format!("{filename}.tmp"));

    if let Err(e) = write_then_rename(&temp_path, &path, content).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    tracing::info!("Wrote {} ({} bytes)", path.display(), content.len());

    Ok(path)
}

async fn write_then_rename(temp_path: &Path, path: &Path, content: &str) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mode = if path.extension().is_some_and(|ext| ext == "sh") {
            0o755
        } else {
            0o644
        };

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(mode)
            .open(temp_path)
            .await?;

        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        tokio::fs::write(temp_path, content).await?;
    }

    tokio::fs::rename(temp_path, path).await
}
