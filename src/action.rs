//! Typed descriptions of the controller's external calls, and the policy
//! that runs them.
//!
//! Every filesystem mutation or inspection the tool performs is built as an
//! [`Action`] first and then handed to one [`Executor`], so `--dry-run`
//! previews exactly the calls a real run would make and `--verbose` echoes
//! them as they happen.
use crate::{error::OverlayError, util::DTC};
use std::{
    fmt,
    fs,
    fs::DirEntry,
    io,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::trace;

pub type Result<T, E = OverlayError> = std::result::Result<T, E>;

/// One intended external call.
///
/// The `Display` form is the shell equivalent of the call, which is what
/// dry-run prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create a slot directory.
    MakeSlot(PathBuf),

    /// Remove a slot directory.
    RemoveSlot(PathBuf),

    /// Copy a precompiled blob into a slot's `dtbo` file.
    CopyBlob { src: PathBuf, dest: PathBuf },

    /// Compile overlay source into a slot's `dtbo` file.
    Compile { src: PathBuf, dest: PathBuf },

    /// Request activation through a slot's `status` file.
    Activate(PathBuf),

    /// Print the slot directory names under the root.
    ListSlots(PathBuf),

    /// Print `<path> : status = <value>` for one slot, or all of them.
    ShowStatus {
        root: PathBuf,
        name: Option<String>,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::MakeSlot(path) => write!(f, "mkdir {}", path.display()),
            Action::RemoveSlot(path) => write!(f, "rmdir {}", path.display()),
            Action::CopyBlob { src, dest } => {
                write!(f, "cp {} {}", src.display(), dest.display())
            }
            Action::Compile { src, dest } => write!(
                f,
                "{} -I dts -O dtb -o {} {}",
                DTC,
                dest.display(),
                src.display()
            ),
            Action::Activate(slot) => {
                write!(f, "echo 1 > {}", slot.join("status").display())
            }
            Action::ListSlots(root) => write!(f, "ls {}", root.display()),
            Action::ShowStatus { root, name } => match name {
                Some(name) => write!(f, "cat {}", root.join(name).join("status").display()),
                None => write!(f, "cat {}/*/status", root.display()),
            },
        }
    }
}

/// Execution policy for [`Action`]s.
///
/// Dry-run prints the action and skips it, verbose prints and then executes,
/// otherwise the action runs silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    pub dry_run: bool,
    pub verbose: bool,
}

impl Executor {
    pub fn new(dry_run: bool, verbose: bool) -> Self {
        Self { dry_run, verbose }
    }

    /// Run one action under the policy.
    ///
    /// # Errors
    ///
    /// - If the underlying filesystem call fails
    /// - If the compiler can't be spawned, or exits non-zero
    pub fn run(&self, action: &Action) -> Result<()> {
        if self.dry_run {
            println!("{action}");
            return Ok(());
        }
        if self.verbose {
            println!("{action}");
        }
        trace!("run: {action}");
        match action {
            Action::MakeSlot(path) => fs::create_dir(path)?,
            Action::RemoveSlot(path) => fs::remove_dir(path)?,
            Action::CopyBlob { src, dest } => {
                fs::copy(src, dest)?;
            }
            Action::Compile { src, dest } => compile(src, dest)?,
            Action::Activate(slot) => activate(slot)?,
            Action::ListSlots(root) => list_slots(root)?,
            Action::ShowStatus { root, name } => show_status(root, name.as_deref())?,
        }
        //
        Ok(())
    }
}

/// Invoke `dtc` to build a slot's `dtbo` from overlay source.
///
/// The compiler inherits stderr, so its own diagnostics reach the user
/// unchanged.
fn compile(src: &Path, dest: &Path) -> Result<()> {
    let status = Command::new(DTC)
        .args(["-I", "dts", "-O", "dtb", "-o"])
        .arg(dest)
        .arg(src)
        .status()
        .map_err(|e| OverlayError::Compile {
            file: src.display().to_string(),
            reason: e.to_string(),
            code: None,
        })?;
    if !status.success() {
        return Err(OverlayError::Compile {
            file: src.display().to_string(),
            reason: status.to_string(),
            code: status.code(),
        });
    }
    Ok(())
}

/// Toggle a slot's `status` file to enabled.
///
/// Kernel subsystems that auto-activate on `dtbo` write may not expose a
/// `status` file at all, so a missing file is not an error.
fn activate(slot: &Path) -> Result<()> {
    let path = slot.join("status");
    let current = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    match current.trim() {
        // "1" is an idempotent re-request.
        "0" | "1" => fs::write(&path, "1")?,
        // Anything else is a kernel-side state we don't touch.
        _ => (),
    }
    Ok(())
}

fn list_slots(root: &Path) -> Result<()> {
    for entry in fs::read_dir(root)? {
        let entry: DirEntry = entry?;
        if entry.file_type()?.is_dir() {
            println!("{}", entry.file_name().to_string_lossy());
        }
    }
    Ok(())
}

fn show_status(root: &Path, name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => print_status(&root.join(name)),
        None => {
            for entry in fs::read_dir(root)? {
                let entry: DirEntry = entry?;
                if entry.file_type()?.is_dir() {
                    print_status(&entry.path())?;
                }
            }
            Ok(())
        }
    }
}

fn print_status(slot: &Path) -> Result<()> {
    let value = fs::read_to_string(slot.join("status"))?;
    println!("{} : status = {}", slot.display(), value.trim());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_shell_equivalent() {
        assert_eq!(
            Action::MakeSlot("/cfg/demo".into()).to_string(),
            "mkdir /cfg/demo"
        );
        assert_eq!(
            Action::RemoveSlot("/cfg/demo".into()).to_string(),
            "rmdir /cfg/demo"
        );
        assert_eq!(
            Action::CopyBlob {
                src: "/tmp/demo.dtb".into(),
                dest: "/cfg/demo/dtbo".into(),
            }
            .to_string(),
            "cp /tmp/demo.dtb /cfg/demo/dtbo"
        );
        assert_eq!(
            Action::Compile {
                src: "/tmp/demo.dts".into(),
                dest: "/cfg/demo/dtbo".into(),
            }
            .to_string(),
            "dtc -I dts -O dtb -o /cfg/demo/dtbo /tmp/demo.dts"
        );
        assert_eq!(
            Action::Activate("/cfg/demo".into()).to_string(),
            "echo 1 > /cfg/demo/status"
        );
        assert_eq!(Action::ListSlots("/cfg".into()).to_string(), "ls /cfg");
        assert_eq!(
            Action::ShowStatus {
                root: "/cfg".into(),
                name: Some("demo".into()),
            }
            .to_string(),
            "cat /cfg/demo/status"
        );
        assert_eq!(
            Action::ShowStatus {
                root: "/cfg".into(),
                name: None,
            }
            .to_string(),
            "cat /cfg/*/status"
        );
    }
}
