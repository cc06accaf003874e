use std::io;
use std::path::Path;
use std::process::Command;

use log::debug;

/// Win32 `ERROR_CALL_NOT_IMPLEMENTED`, reported when the native call is not
/// available on this platform.
pub const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout and stderr, for error reports.
    pub fn describe(&self) -> String {
        format!(
            "stdout: {}; stderr: {}",
            self.stdout.trim(),
            self.stderr.trim()
        )
    }
}

/// Side effects the wallpaper strategies need from the host.
pub trait Shell: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;

    /// `SystemParametersInfoW(SPI_SETDESKWALLPAPER)`; the error is the last
    /// Win32 error code.
    fn set_desktop_wallpaper(&self, path: &Path) -> Result<(), u32>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl Shell for SystemShell {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        debug!("Running {program} {args:?}");
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    #[cfg(target_os = "windows")]
    fn set_desktop_wallpaper(&self, path: &Path) -> Result<(), u32> {
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Foundation::GetLastError;
        use windows_sys::Win32::UI::WindowsAndMessaging::{
            SystemParametersInfoW, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE, SPI_SETDESKWALLPAPER,
        };

        let mut wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        // SAFETY: `wide` is a NUL-terminated UTF-16 buffer that outlives the call.
        let ok = unsafe {
            SystemParametersInfoW(
                SPI_SETDESKWALLPAPER,
                0,
                wide.as_mut_ptr().cast(),
                SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
            )
        };
        if ok == 0 {
            // SAFETY: reads thread-local error state only.
            Err(unsafe { GetLastError() })
        } else {
            Ok(())
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn set_desktop_wallpaper(&self, _path: &Path) -> Result<(), u32> {
        Err(ERROR_CALL_NOT_IMPLEMENTED)
    }
}
