use std::path::Path;

use log::{debug, info, warn};

use super::shell::Shell;
use super::{Applied, AttemptStage, OsKind, Strategy};
use crate::error::{Error, Result};

/// Escapes `path` for use inside an AppleScript string literal.
fn quote(path: &str) -> String {
    path.replace('\\', "\\\\").replace('"', "\\\"")
}

/// AppleScript variants, tried in order until one exits cleanly.
pub fn scripts(posix_path: &str) -> [String; 3] {
    let posix_path = quote(posix_path);
    [
        format!(
            r#"tell application "System Events"
    tell every desktop
        set picture to "{posix_path}"
    end tell
end tell"#
        ),
        format!(
            r#"tell application "Finder"
    set desktop picture to POSIX file "{posix_path}"
end tell"#
        ),
        format!(
            r#"tell application "System Events"
    set picture of current desktop to "{posix_path}"
end tell"#
        ),
    ]
}

pub struct MacOsStrategy;

impl Strategy for MacOsStrategy {
    fn apply(&self, path: &Path, shell: &dyn Shell) -> Result<Applied> {
        let posix_path = path.to_string_lossy().replace('\\', "/");
        relax_permissions(path);

        let mut stage = AttemptStage::NotStarted;
        let mut last_failure = String::new();
        for (attempt, script) in scripts(&posix_path).into_iter().enumerate() {
            stage = AttemptStage::Attempt(attempt + 1);
            match shell.run("osascript", &["-e".to_string(), script]) {
                Ok(output) if output.success => {
                    info!("Wallpaper set on {stage}: {posix_path}");
                    debug!("macOS wallpaper chain ended in {}", AttemptStage::Success);
                    return Ok(Applied::Set(path.to_path_buf()));
                }
                Ok(output) => {
                    warn!("osascript failed on {stage}: {}", output.stderr.trim());
                    last_failure = output.describe();
                }
                Err(e) => {
                    warn!("Could not run osascript on {stage}: {e}");
                    last_failure = e.to_string();
                }
            }
        }

        debug!("macOS wallpaper chain ended in {}", AttemptStage::Failed);
        Err(Error::SetWallpaper {
            os: OsKind::MacOS,
            stage: stage.to_string(),
            detail: format!("AppleScript error: {last_failure}"),
        })
    }
}

#[cfg(unix)]
fn relax_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)) {
        debug!("Could not chmod {}: {e}", path.display());
    }
}

#[cfg(not(unix))]
fn relax_permissions(_path: &Path) {}
