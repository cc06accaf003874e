use std::path::Path;

use log::{info, warn};

use super::shell::Shell;
use super::{Applied, Desktop, OsKind, Strategy};
use crate::error::{Error, Result};

/// Desktop environment name, lowercased. `XDG_CURRENT_DESKTOP` wins; older
/// sessions only set `DESKTOP_SESSION` or a vendor variable.
pub fn detect_desktop<F>(var: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(current) = var("XDG_CURRENT_DESKTOP").filter(|v| !v.trim().is_empty()) {
        return Some(current.trim().to_lowercase());
    }

    if let Some(desktop_session) = var("DESKTOP_SESSION").filter(|v| !v.trim().is_empty()) {
        let session = desktop_session.trim().to_lowercase();
        if session.contains("xfce") || session.starts_with("xubuntu") {
            return Some("xfce".to_string());
        } else if session.starts_with("ubuntustudio") || session.starts_with("kubuntu") {
            return Some("kde".to_string());
        } else if session.starts_with("ubuntu") {
            return Some("gnome".to_string());
        }
        return Some(session);
    }

    if var("KDE_FULL_SESSION").as_deref() == Some("true") {
        return Some("kde".to_string());
    }

    if var("GNOME_DESKTOP_SESSION_ID").is_some() {
        return Some("gnome".to_string());
    }

    None
}

/// Maps a desktop environment string onto a Linux [`Desktop`].
pub fn classify(desktop: &str) -> Desktop {
    let desktop = desktop.to_lowercase();
    if desktop.contains("gnome") || desktop.contains("unity") {
        Desktop::GnomeLike {
            dark: desktop.contains("dark"),
        }
    } else if desktop.contains("kde") {
        Desktop::Kde
    } else if desktop.contains("xfce") {
        Desktop::Xfce
    } else if desktop.contains("mate") {
        Desktop::Mate
    } else {
        Desktop::UnknownLinux(desktop)
    }
}

/// Program and arguments that set `path` as the background on `desktop`.
pub fn command_for(desktop: &Desktop, path: &str) -> Option<(&'static str, Vec<String>)> {
    let args = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
    match desktop {
        Desktop::GnomeLike { dark } => {
            let key = if *dark { "picture-uri-dark" } else { "picture-uri" };
            let uri = format!("file://{path}");
            Some((
                "gsettings",
                args(&["set", "org.gnome.desktop.background", key, uri.as_str()]),
            ))
        }
        Desktop::Kde => Some(("plasma-apply-wallpaperimage", args(&[path]))),
        Desktop::Xfce => Some((
            "xfconf-query",
            args(&[
                "-c",
                "xfce4-desktop",
                "-p",
                "/backdrop/screen0/monitor0/workspace0/last-image",
                "-s",
                path,
            ]),
        )),
        Desktop::Mate => Some((
            "gsettings",
            args(&["set", "org.mate.background", "picture-filename", path]),
        )),
        Desktop::MacOS | Desktop::Windows | Desktop::UnknownLinux(_) => None,
    }
}

pub struct LinuxStrategy {
    desktop: Desktop,
}

impl LinuxStrategy {
    pub fn new(desktop: Desktop) -> Self {
        Self { desktop }
    }
}

impl Strategy for LinuxStrategy {
    fn apply(&self, path: &Path, shell: &dyn Shell) -> Result<Applied> {
        let file_loc = path.to_string_lossy();
        let Some((program, args)) = command_for(&self.desktop, &file_loc) else {
            let desktop = match &self.desktop {
                Desktop::UnknownLinux(name) if !name.is_empty() => name.clone(),
                _ => "unknown".to_string(),
            };
            warn!(
                "Unsupported Linux desktop environment '{desktop}', image saved to {}",
                path.display()
            );
            return Ok(Applied::Unsupported {
                desktop,
                path: path.to_path_buf(),
            });
        };

        let failure = |detail: String| Error::SetWallpaper {
            os: OsKind::Linux,
            stage: program.to_string(),
            detail,
        };
        let output = shell
            .run(program, &args)
            .map_err(|e| failure(format!("could not run {program}: {e}")))?;
        if !output.success {
            return Err(failure(output.describe()));
        }

        info!("Wallpaper set with {program}: {}", path.display());
        Ok(Applied::Set(path.to_path_buf()))
    }
}
