//! Persisting a chosen image and applying it as the desktop background.
//!
//! The target platform is resolved once per call into a [`Desktop`], which
//! picks one [`Strategy`]:
//! - macOS: three AppleScript variants, first clean exit wins
//! - Windows: one `SystemParametersInfoW` call
//! - Linux: one settings tool per desktop environment; unknown environments
//!   keep the saved file and report it instead of failing

mod linux;
mod macos;
mod naming;
mod shell;
mod windows;

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::http::{is_remote, Fetch};

pub use linux::{classify, command_for, detect_desktop, LinuxStrategy};
pub use macos::{scripts as macos_scripts, MacOsStrategy};
pub use naming::FileNamer;
pub use shell::{CommandOutput, Shell, SystemShell, ERROR_CALL_NOT_IMPLEMENTED};
pub use windows::WindowsStrategy;

/// Name attempts before giving up on a crowded wallpaper directory.
const MAX_NAME_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKind {
    MacOS,
    Windows,
    Linux,
}

impl OsKind {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOS
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MacOS => "macOS",
            Self::Windows => "Windows",
            Self::Linux => "Linux",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperTarget {
    pub os: OsKind,
    /// Linux only.
    pub desktop_environment: Option<String>,
}

impl WallpaperTarget {
    /// The running platform, reading the desktop environment from the
    /// process environment on Linux.
    pub fn detect() -> Self {
        let os = OsKind::current();
        let desktop_environment = match os {
            OsKind::Linux => detect_desktop(|key| std::env::var(key).ok()),
            _ => None,
        };
        Self {
            os,
            desktop_environment,
        }
    }

    pub fn macos() -> Self {
        Self {
            os: OsKind::MacOS,
            desktop_environment: None,
        }
    }

    pub fn windows() -> Self {
        Self {
            os: OsKind::Windows,
            desktop_environment: None,
        }
    }

    pub fn linux(desktop_environment: &str) -> Self {
        Self {
            os: OsKind::Linux,
            desktop_environment: Some(desktop_environment.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desktop {
    MacOS,
    Windows,
    GnomeLike { dark: bool },
    Kde,
    Xfce,
    Mate,
    UnknownLinux(String),
}

impl Desktop {
    pub fn resolve(target: &WallpaperTarget) -> Self {
        match target.os {
            OsKind::MacOS => Self::MacOS,
            OsKind::Windows => Self::Windows,
            OsKind::Linux => classify(target.desktop_environment.as_deref().unwrap_or_default()),
        }
    }

    pub fn strategy(&self) -> Box<dyn Strategy> {
        match self {
            Self::MacOS => Box::new(MacOsStrategy),
            Self::Windows => Box::new(WindowsStrategy),
            linux => Box::new(LinuxStrategy::new(linux.clone())),
        }
    }
}

/// Progress through a platform's ordered attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStage {
    NotStarted,
    Attempt(usize),
    Success,
    Failed,
}

impl fmt::Display for AttemptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::Attempt(n) => write!(f, "attempt {n}"),
            Self::Success => f.write_str("success"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Set(PathBuf),
    /// The desktop environment has no known mechanism; the image is still on
    /// disk at `path`.
    Unsupported { desktop: String, path: PathBuf },
}

impl Applied {
    pub fn path(&self) -> &Path {
        match self {
            Self::Set(path) | Self::Unsupported { path, .. } => path,
        }
    }
}

pub trait Strategy {
    fn apply(&self, path: &Path, shell: &dyn Shell) -> Result<Applied>;
}

pub struct WallpaperSetter {
    fetch: Arc<dyn Fetch>,
    shell: Arc<dyn Shell>,
    wallpaper_dir: PathBuf,
    namer: FileNamer,
}

impl WallpaperSetter {
    pub fn new(fetch: Arc<dyn Fetch>, shell: Arc<dyn Shell>, wallpaper_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetch,
            shell,
            wallpaper_dir: wallpaper_dir.into(),
            namer: FileNamer::new(),
        }
    }

    pub fn with_namer(mut self, namer: FileNamer) -> Self {
        self.namer = namer;
        self
    }

    pub fn wallpaper_dir(&self) -> &Path {
        &self.wallpaper_dir
    }

    /// Saves `input` locally if it is a URL, then applies it on `target`.
    pub fn set_wallpaper(&self, input: &str, target: &WallpaperTarget) -> Result<Applied> {
        let path = self.resolve(input)?;
        let desktop = Desktop::resolve(target);
        info!("Setting wallpaper {} on {desktop:?}", path.display());
        desktop.strategy().apply(&path, self.shell.as_ref())
    }

    /// Absolute local path for `input`. Remote images are downloaded into
    /// the wallpaper directory; local paths must already exist.
    pub fn resolve(&self, input: &str) -> Result<PathBuf> {
        let input = input.trim();
        if is_remote(input) {
            return self.persist(input);
        }
        let path = Path::new(input);
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Ok(std::path::absolute(path)?)
    }

    pub fn persist(&self, url: &str) -> Result<PathBuf> {
        let bytes = self.fetch.get_bytes(url)?;
        fs::create_dir_all(&self.wallpaper_dir)?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.wallpaper_dir.join(self.namer.next_name());
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    write_or_remove(file, &path, &bytes)?;
                    let path = std::path::absolute(&path)?;
                    info!("Saved {url} to {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("{} already exists, picking another name", path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "no free wallpaper file name in {}",
                self.wallpaper_dir.display()
            ),
        )))
    }
}

/// Writes a freshly created file, removing it again if the write fails.
fn write_or_remove<W: Write>(mut file: W, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let written = file.write_all(bytes).and_then(|()| file.flush());
    if let Err(e) = written {
        drop(file);
        if let Err(remove) = fs::remove_file(path) {
            debug!("Could not remove partial {}: {remove}", path.display());
        }
        return Err(e);
    }
    Ok(())
}
