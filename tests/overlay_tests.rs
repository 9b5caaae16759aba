//! Overlay slot tests: drive the directory protocol against a temporary
//! directory standing in for the configfs root.

use std::{fs, path::Path};

use anyhow::Result;
use dtovl::{
    action::Executor,
    error::OverlayError,
    overlay::{Artifact, OverlayFs},
};
use tempfile::TempDir;

fn slot_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Build a slot the way the kernel would: directory plus a `status` file.
fn seed_slot(root: &Path, name: &str, status: &str) {
    let slot = root.join(name);
    fs::create_dir(&slot).unwrap();
    fs::write(slot.join("status"), status).unwrap();
}

#[test]
fn create_then_list_includes_slot_once() -> Result<()> {
    let tmp = TempDir::new()?;
    let overlays = OverlayFs::at(tmp.path());
    let exec = Executor::default();

    overlays.create("demo", &exec)?;
    overlays.list(&exec)?;

    assert_eq!(slot_names(tmp.path()), ["demo"]);
    Ok(())
}

#[test]
fn create_existing_slot_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    let overlays = OverlayFs::at(tmp.path());
    let exec = Executor::default();

    overlays.create("demo", &exec)?;
    assert!(overlays.create("demo", &exec).is_err());
    Ok(())
}

#[test]
fn remove_deletes_slot() -> Result<()> {
    let tmp = TempDir::new()?;
    let overlays = OverlayFs::at(tmp.path());
    let exec = Executor::default();

    overlays.create("demo", &exec)?;
    overlays.remove("demo", &exec)?;

    assert!(slot_names(tmp.path()).is_empty());
    Ok(())
}

#[test]
fn remove_missing_slot_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    let overlays = OverlayFs::at(tmp.path());

    assert!(overlays.remove("demo", &Executor::default()).is_err());
    Ok(())
}

#[test]
fn missing_root_is_reported_for_every_operation() -> Result<()> {
    let tmp = TempDir::new()?;
    let overlays = OverlayFs::at(tmp.path().join("no-such-root"));
    let exec = Executor::default();
    let blob = Artifact::Blob(tmp.path().join("demo.dtb"));

    for result in [
        overlays.create("demo", &exec),
        overlays.remove("demo", &exec),
        overlays.load("demo", &blob, &exec),
        overlays.install("demo", &blob, &exec),
        overlays.list(&exec),
        overlays.status(None, &exec),
    ] {
        assert!(matches!(result, Err(OverlayError::RootMissing(_))));
    }
    Ok(())
}

#[test]
fn load_blob_writes_dtbo_and_activates() -> Result<()> {
    let tmp = TempDir::new()?;
    seed_slot(tmp.path(), "demo", "0");
    let blob_path = tmp.path().join("demo.dtb");
    fs::write(&blob_path, b"\xd0\x0d\xfe\xed")?;

    let overlays = OverlayFs::at(tmp.path());
    overlays.load("demo", &Artifact::Blob(blob_path), &Executor::default())?;

    let slot = tmp.path().join("demo");
    assert_eq!(fs::read(slot.join("dtbo"))?, b"\xd0\x0d\xfe\xed");
    assert_eq!(fs::read_to_string(slot.join("status"))?, "1");
    Ok(())
}

#[test]
fn load_is_idempotent_on_active_slot() -> Result<()> {
    let tmp = TempDir::new()?;
    seed_slot(tmp.path(), "demo", "1");
    let blob_path = tmp.path().join("demo.dtb");
    fs::write(&blob_path, b"blob")?;

    let overlays = OverlayFs::at(tmp.path());
    overlays.load("demo", &Artifact::Blob(blob_path), &Executor::default())?;

    assert_eq!(
        fs::read_to_string(tmp.path().join("demo").join("status"))?,
        "1"
    );
    Ok(())
}

#[test]
fn load_leaves_unrecognized_status_alone() -> Result<()> {
    let tmp = TempDir::new()?;
    seed_slot(tmp.path(), "demo", "-1");
    let blob_path = tmp.path().join("demo.dtb");
    fs::write(&blob_path, b"blob")?;

    let overlays = OverlayFs::at(tmp.path());
    overlays.load("demo", &Artifact::Blob(blob_path), &Executor::default())?;

    assert_eq!(
        fs::read_to_string(tmp.path().join("demo").join("status"))?,
        "-1"
    );
    Ok(())
}

#[test]
fn load_tolerates_missing_status_file() -> Result<()> {
    let tmp = TempDir::new()?;
    fs::create_dir(tmp.path().join("demo"))?;
    let blob_path = tmp.path().join("demo.dtb");
    fs::write(&blob_path, b"blob")?;

    let overlays = OverlayFs::at(tmp.path());
    overlays.load("demo", &Artifact::Blob(blob_path), &Executor::default())?;

    let slot = tmp.path().join("demo");
    assert_eq!(fs::read(slot.join("dtbo"))?, b"blob");
    assert!(!slot.join("status").exists());
    Ok(())
}

#[test]
fn load_unreadable_blob_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    seed_slot(tmp.path(), "demo", "0");

    let overlays = OverlayFs::at(tmp.path());
    let missing = Artifact::Blob(tmp.path().join("no-such.dtb"));
    assert!(matches!(
        overlays.load("demo", &missing, &Executor::default()),
        Err(OverlayError::Io(_))
    ));
    // Activation never ran.
    assert_eq!(
        fs::read_to_string(tmp.path().join("demo").join("status"))?,
        "0"
    );
    Ok(())
}

#[test]
fn install_matches_create_then_load() -> Result<()> {
    let installed = TempDir::new()?;
    let stepwise = TempDir::new()?;
    let blob_path = installed.path().join("demo.dtb");
    fs::write(&blob_path, b"blob")?;
    let blob = Artifact::Blob(blob_path);
    let exec = Executor::default();

    OverlayFs::at(installed.path()).install("demo", &blob, &exec)?;

    let overlays = OverlayFs::at(stepwise.path());
    overlays.create("demo", &exec)?;
    overlays.load("demo", &blob, &exec)?;

    assert_eq!(slot_names(installed.path()), slot_names(stepwise.path()));
    assert_eq!(
        fs::read(installed.path().join("demo").join("dtbo"))?,
        fs::read(stepwise.path().join("demo").join("dtbo"))?
    );
    Ok(())
}

#[test]
fn failed_install_leaves_slot_created_but_unloaded() -> Result<()> {
    let tmp = TempDir::new()?;
    let overlays = OverlayFs::at(tmp.path());
    let missing = Artifact::Blob(tmp.path().join("no-such.dtb"));

    assert!(overlays
        .install("demo", &missing, &Executor::default())
        .is_err());

    let slot = tmp.path().join("demo");
    assert!(slot.is_dir());
    assert!(!slot.join("dtbo").exists());
    Ok(())
}

#[test]
fn dry_run_performs_zero_mutations() -> Result<()> {
    let tmp = TempDir::new()?;
    seed_slot(tmp.path(), "existing", "0");
    let blob_path = tmp.path().join("demo.dtb");
    fs::write(&blob_path, b"blob")?;
    let blob = Artifact::Blob(blob_path.clone());

    let overlays = OverlayFs::at(tmp.path());
    let dry = Executor::new(true, false);
    overlays.create("demo", &dry)?;
    overlays.install("demo", &blob, &dry)?;
    overlays.load("existing", &blob, &dry)?;
    overlays.remove("existing", &dry)?;
    overlays.list(&dry)?;
    overlays.status(None, &dry)?;

    assert_eq!(slot_names(tmp.path()), ["existing"]);
    let existing = tmp.path().join("existing");
    assert_eq!(fs::read_to_string(existing.join("status"))?, "0");
    assert!(!existing.join("dtbo").exists());
    Ok(())
}

#[test]
fn status_reads_named_slot() -> Result<()> {
    let tmp = TempDir::new()?;
    seed_slot(tmp.path(), "demo", "1");
    seed_slot(tmp.path(), "other", "0");

    let overlays = OverlayFs::at(tmp.path());
    let exec = Executor::default();
    overlays.status(Some("demo"), &exec)?;
    overlays.status(None, &exec)?;

    assert!(overlays.status(Some("no-such-slot"), &exec).is_err());
    Ok(())
}

#[test]
fn resolve_honors_env_override() {
    std::env::set_var("DTOVL_PATH", "/tmp/dtovl-test-root");
    let overlays = OverlayFs::resolve();
    assert_eq!(overlays.root(), Path::new("/tmp/dtovl-test-root"));
    std::env::remove_var("DTOVL_PATH");
}
