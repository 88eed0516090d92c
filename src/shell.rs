//! Best-effort notification that a directory's contents changed, so the
//! desktop shell redraws it.

use std::io;
use std::path::Path;

/// Tells the platform shell that a directory changed.
pub trait ShellNotifier {
    fn notify(&self, dir: &Path) -> io::Result<()>;
}

/// Does nothing. Used in tests and when refreshing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl ShellNotifier for NullNotifier {
    fn notify(&self, _dir: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Refreshes Explorer through PowerShell on Windows. A no-op elsewhere, where
/// file managers watch the filesystem themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShellNotifier;

impl ShellNotifier for SystemShellNotifier {
    #[cfg(windows)]
    fn notify(&self, dir: &Path) -> io::Result<()> {
        use std::process::{Command, Stdio};

        let escaped = dir.display().to_string().replace('\'', "''");
        let script = format!(
            "(New-Object -ComObject Shell.Application).Namespace(0).ParseName('{escaped}').InvokeVerb('refresh'); \
             (New-Object -ComObject Shell.Application).Windows() | ForEach-Object {{ $_.Refresh() }}"
        );
        let status = Command::new("powershell")
            .args(["-NoProfile", "-Command", &script])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("powershell exited with {status}")))
        }
    }

    #[cfg(not(windows))]
    fn notify(&self, dir: &Path) -> io::Result<()> {
        tracing::debug!(dir = %dir.display(), "shell refresh not needed on this platform");
        Ok(())
    }
}

/// Records every notification.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: std::sync::Mutex<Vec<std::path::PathBuf>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn calls(&self) -> Vec<std::path::PathBuf> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl ShellNotifier for RecordingNotifier {
    fn notify(&self, dir: &Path) -> io::Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(dir.to_path_buf());
        Ok(())
    }
}
