use std::path::Path;

use log::info;

use super::shell::Shell;
use super::{Applied, OsKind, Strategy};
use crate::error::{Error, Result};

/// Single native call, persisted to the user profile and broadcast so the
/// desktop redraws immediately. No fallback.
pub struct WindowsStrategy;

impl Strategy for WindowsStrategy {
    fn apply(&self, path: &Path, shell: &dyn Shell) -> Result<Applied> {
        match shell.set_desktop_wallpaper(path) {
            Ok(()) => {
                info!("Wallpaper set: {}", path.display());
                Ok(Applied::Set(path.to_path_buf()))
            }
            Err(code) => Err(Error::SetWallpaper {
                os: OsKind::Windows,
                stage: "SystemParametersInfoW".to_string(),
                detail: format!(
                    "SystemParametersInfoW failed for {}, Windows error code: {code}",
                    path.display()
                ),
            }),
        }
    }
}
