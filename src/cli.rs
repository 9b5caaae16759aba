//! Command-line parsing and sequential dispatch.
//!
//! Parsing produces one immutable [`Request`]; nothing about the invocation
//! changes after that. Commands are flags rather than subcommands so several
//! can be combined in one invocation (`dtovl -c -s demo`), and they replay
//! in the order their flags appeared on the command line.
use crate::{
    action::Executor,
    error::{text, OverlayError},
    overlay::{Artifact, OverlayFs},
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{ffi::OsString, path::PathBuf};
use tracing::debug;

pub type Result<T, E = OverlayError> = std::result::Result<T, E>;

/// One overlay command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    /// Create a slot directory.
    Create,

    /// Remove a slot directory.
    Remove,

    /// Write the overlay into its slot and activate it.
    Load,

    /// Create, then load.
    Install,

    /// Print slot names.
    List,

    /// Print per-slot status.
    Status,
}

impl Cmd {
    fn needs_name(self) -> bool {
        matches!(self, Cmd::Create | Cmd::Remove | Cmd::Load | Cmd::Install)
    }

    fn needs_artifact(self) -> bool {
        matches!(self, Cmd::Load | Cmd::Install)
    }
}

/// Everything one invocation asked for, fixed at parse time.
#[derive(Debug, Clone)]
pub struct Request {
    /// Commands in command-line order.
    pub commands: Vec<Cmd>,

    /// Explicit or derived overlay name.
    pub name: Option<String>,

    /// Overlay source or blob, when load/install was asked for.
    pub artifact: Option<Artifact>,

    /// Overlay configuration root.
    pub root: PathBuf,

    /// Echo each action before running it.
    pub verbose: bool,

    /// Raise the log filter to `debug`.
    pub debug: bool,

    /// Print actions without running them.
    pub dry_run: bool,
}

impl Request {
    fn name(&self) -> Result<&str> {
        self.name
            .as_deref()
            .ok_or_else(|| OverlayError::Usage(text::NAME.into()))
    }

    fn artifact(&self) -> Result<&Artifact> {
        self.artifact
            .as_ref()
            .ok_or_else(|| OverlayError::Usage(text::SOURCE.into()))
    }
}

/// The clap command definition.
fn command() -> Command {
    Command::new("dtovl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Manage device-tree overlays through the kernel configfs interface")
        .arg(flag(
            "create",
            'c',
            "Create an overlay slot named NAME",
        ))
        .arg(flag("remove", 'r', "Remove the overlay slot named NAME"))
        .arg(flag(
            "load",
            'l',
            "Compile or copy the overlay into its slot and activate it",
        ))
        .arg(flag(
            "install",
            'i',
            "Create the slot, then load (same as --create --load)",
        ))
        .arg(
            Arg::new("list")
                .short('t')
                .long("list")
                .action(ArgAction::SetTrue)
                .help("List overlay slots, one per line"),
        )
        .arg(flag(
            "status",
            's',
            "Show status for NAME, or for every slot",
        ))
        .arg(flag("verbose", 'v', "Echo each action before running it"))
        .arg(flag("debug", 'd', "Enable debug logging"))
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print the actions a real run would take, without running them"),
        )
        .arg(
            Arg::new("dts")
                .long("dts")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Overlay source file, compiled with dtc"),
        )
        .arg(
            Arg::new("dtb")
                .long("dtb")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Precompiled overlay blob, copied as-is"),
        )
        .arg(
            Arg::new("name")
                .value_name("NAME")
                .help("Overlay name (defaults to the source file's base name)"),
        )
}

fn flag(id: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(id)
        .short(short)
        .long(id)
        .action(ArgAction::SetTrue)
        .help(help)
}

/// Parse the process arguments.
///
/// `--help` and `--version` print and exit here, as do malformed flags.
///
/// # Errors
///
/// - Usage errors: missing overlay name, zero or two source files for a
///   load/install
pub fn parse() -> Result<Request> {
    request_from(command().get_matches())
}

/// Parse an explicit argument list, `argv[0]` included.
///
/// Unlike [`parse`] this never exits the process; clap's own errors come
/// back as usage errors too.
pub fn parse_from<I, T>(argv: I) -> Result<Request>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command()
        .try_get_matches_from(argv)
        .map_err(|e| OverlayError::Usage(e.to_string()))?;
    request_from(matches)
}

/// Build a validated [`Request`].
///
/// All argument resolution happens here, before any command executes: the
/// replay order of command flags, name derivation from `--dts`/`--dtb`, and
/// the exactly-one-source rule for load/install.
fn request_from(matches: ArgMatches) -> Result<Request> {
    let mut commands: Vec<(usize, Cmd)> = Vec::new();
    for (id, cmd) in [
        ("create", Cmd::Create),
        ("remove", Cmd::Remove),
        ("load", Cmd::Load),
        ("install", Cmd::Install),
        ("list", Cmd::List),
        ("status", Cmd::Status),
    ] {
        if matches.get_flag(id) {
            // index_of reports the argv position, which is the replay order.
            if let Some(index) = matches.index_of(id) {
                commands.push((index, cmd));
            }
        }
    }
    commands.sort_by_key(|(index, _)| *index);
    let commands: Vec<Cmd> = commands.into_iter().map(|(_, cmd)| cmd).collect();

    let dts = matches.get_one::<PathBuf>("dts");
    let dtb = matches.get_one::<PathBuf>("dtb");
    let needs_artifact = commands.iter().any(|c| c.needs_artifact());
    let artifact = match (dts, dtb) {
        (Some(src), None) => Some(Artifact::Source(src.clone())),
        (None, Some(blob)) => Some(Artifact::Blob(blob.clone())),
        (Some(_), Some(_)) if needs_artifact => {
            return Err(OverlayError::Usage(text::SOURCE.into()))
        }
        _ => None,
    };
    if needs_artifact && artifact.is_none() {
        return Err(OverlayError::Usage(text::SOURCE.into()));
    }

    let name = matches
        .get_one::<String>("name")
        .cloned()
        .or_else(|| artifact.as_ref().and_then(Artifact::derive_name));
    if commands.iter().any(|c| c.needs_name()) && name.is_none() {
        return Err(OverlayError::Usage(text::NAME.into()));
    }

    Ok(Request {
        commands,
        name,
        artifact,
        root: OverlayFs::resolve().root().into(),
        verbose: matches.get_flag("verbose"),
        debug: matches.get_flag("debug"),
        dry_run: matches.get_flag("dry-run"),
    })
}

/// Run every requested command, in order, each completing before the next
/// starts.
///
/// An empty command list prints usage, matching a bare `dtovl` invocation.
///
/// # Errors
///
/// - Whatever the individual operations return; the remaining commands are
///   not run
pub fn dispatch(request: &Request) -> Result<()> {
    if request.commands.is_empty() {
        command().print_help()?;
        return Ok(());
    }
    let overlays = OverlayFs::at(&request.root);
    let exec = Executor::new(request.dry_run, request.verbose);
    debug!(
        "dispatching {} command(s) against {}",
        request.commands.len(),
        request.root.display()
    );
    for cmd in &request.commands {
        match cmd {
            Cmd::Create => overlays.create(request.name()?, &exec)?,
            Cmd::Remove => overlays.remove(request.name()?, &exec)?,
            Cmd::Load => overlays.load(request.name()?, request.artifact()?, &exec)?,
            Cmd::Install => overlays.install(request.name()?, request.artifact()?, &exec)?,
            Cmd::List => overlays.list(&exec)?,
            Cmd::Status => overlays.status(request.name.as_deref(), &exec)?,
        }
    }
    Ok(())
}
