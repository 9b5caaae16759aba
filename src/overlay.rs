//! Interface to runtime device-tree overlays.
//!
//! # Examples
//!
//! Install a precompiled overlay
//!
//! ```rust,no_run
//! # use dtovl::{action::Executor, overlay::*};
//!
//! let overlays = OverlayFs::resolve();
//! let blob = Artifact::Blob("/lib/firmware/pmod.dtb".into());
//! overlays.install("pmod", &blob, &Executor::default()).unwrap();
//! ```
//!
//! # Implementation
//!
//! This uses the configfs overlay interface: the kernel exposes one
//! directory per overlay under the configuration root, with a `dtbo` file
//! taking the compiled blob and a `status` file reflecting whether the
//! overlay is applied (`"1"`) or not (`"0"`).
//!
//! The slot directories are created and removed from userspace; everything
//! inside them is owned by the kernel.
use crate::{
    action::{Action, Executor},
    error::OverlayError,
    util::{CONFIG_OVERLAY_PATH, OVERLAY_PATH_ENV, SYS_CONFIG_OVERLAY_PATH},
};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::debug;

pub type Result<T, E = OverlayError> = std::result::Result<T, E>;

/// An overlay artifact on disk, either source text or a precompiled blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Device-tree source, compiled with `dtc` at load time.
    Source(PathBuf),

    /// Precompiled device-tree blob, copied as-is.
    Blob(PathBuf),
}

impl Artifact {
    /// Path to the underlying file.
    pub fn path(&self) -> &Path {
        match self {
            Artifact::Source(path) | Artifact::Blob(path) => path,
        }
    }

    /// The artifact's conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Artifact::Source(_) => ".dts",
            Artifact::Blob(_) => ".dtb",
        }
    }

    /// Derive an overlay name from the base filename, with the conventional
    /// extension stripped when present.
    ///
    /// Returns [`None`] if nothing is left, or the filename isn't UTF-8.
    pub fn derive_name(&self) -> Option<String> {
        let file = self.path().file_name()?.to_str()?;
        let name = file.strip_suffix(self.extension()).unwrap_or(file);
        if name.is_empty() {
            None
        } else {
            Some(name.to_owned())
        }
    }
}

/// Handle on the overlay configuration root.
///
/// Construction never touches the filesystem beyond probing for a default
/// root; whether the root actually exists is checked when an operation runs.
#[derive(Debug, Clone)]
pub struct OverlayFs {
    /// The configuration root all slots live under.
    root: PathBuf,
}

impl OverlayFs {
    /// Resolve the configuration root.
    ///
    /// `DTOVL_PATH` wins when set. Otherwise the conventional locations are
    /// probed in order, and if neither exists the standard configfs location
    /// is used as-is.
    pub fn resolve() -> Self {
        if let Some(path) = env::var_os(OVERLAY_PATH_ENV) {
            return Self { root: path.into() };
        }
        for path in [CONFIG_OVERLAY_PATH, SYS_CONFIG_OVERLAY_PATH] {
            let path = Path::new(path);
            if path.is_dir() {
                return Self { root: path.into() };
            }
        }
        Self {
            root: SYS_CONFIG_OVERLAY_PATH.into(),
        }
    }

    /// Use `root` as the configuration root.
    pub fn at<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the slot directory for `name`.
    ///
    /// The kernel picks the slot up immediately; it stays inactive until a
    /// blob is loaded.
    ///
    /// # Errors
    ///
    /// - If the root is missing
    /// - If the slot already exists
    pub fn create(&self, name: &str, exec: &Executor) -> Result<()> {
        self.ensure_root()?;
        debug!("creating overlay slot {name}");
        exec.run(&Action::MakeSlot(self.slot(name)))
    }

    /// Remove the slot directory for `name`.
    ///
    /// # Errors
    ///
    /// - If the root is missing
    /// - If the slot doesn't exist, or the kernel still holds files in it
    pub fn remove(&self, name: &str, exec: &Executor) -> Result<()> {
        self.ensure_root()?;
        debug!("removing overlay slot {name}");
        exec.run(&Action::RemoveSlot(self.slot(name)))
    }

    /// Write `artifact` into the slot's `dtbo` file, then request
    /// activation.
    ///
    /// Source artifacts are compiled with `dtc`, blobs are copied as-is.
    /// Activation is skipped silently when the slot has no `status` file.
    ///
    /// # Errors
    ///
    /// - If the root is missing
    /// - If the artifact is unreadable, or the compiler fails
    pub fn load(&self, name: &str, artifact: &Artifact, exec: &Executor) -> Result<()> {
        self.ensure_root()?;
        let slot = self.slot(name);
        let dest = slot.join("dtbo");
        debug!(
            "loading {} into overlay slot {name}",
            artifact.path().display()
        );
        match artifact {
            Artifact::Source(src) => exec.run(&Action::Compile {
                src: src.clone(),
                dest,
            })?,
            Artifact::Blob(src) => exec.run(&Action::CopyBlob {
                src: src.clone(),
                dest,
            })?,
        }
        exec.run(&Action::Activate(slot))
    }

    /// Create the slot for `name` and load `artifact` into it.
    ///
    /// Not transactional: if the load fails the created slot is left in
    /// place, unloaded, for the caller to remove or retry.
    ///
    /// # Errors
    ///
    /// - See [`OverlayFs::create`] and [`OverlayFs::load`]
    pub fn install(&self, name: &str, artifact: &Artifact, exec: &Executor) -> Result<()> {
        self.create(name, exec)?;
        self.load(name, artifact, exec)
    }

    /// Print the existing slot names, one per line.
    ///
    /// # Errors
    ///
    /// - If the root is missing or unreadable
    pub fn list(&self, exec: &Executor) -> Result<()> {
        self.ensure_root()?;
        exec.run(&Action::ListSlots(self.root.clone()))
    }

    /// Print `<path> : status = <value>` for the slot `name`, or for every
    /// slot when `name` is [`None`].
    ///
    /// # Errors
    ///
    /// - If the root is missing
    /// - If the named slot has no readable `status` file
    pub fn status(&self, name: Option<&str>, exec: &Executor) -> Result<()> {
        self.ensure_root()?;
        exec.run(&Action::ShowStatus {
            root: self.root.clone(),
            name: name.map(str::to_owned),
        })
    }

    /// Path of the slot directory for `name`.
    fn slot(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(OverlayError::RootMissing(self.root.display().to_string()))
        }
    }
}
