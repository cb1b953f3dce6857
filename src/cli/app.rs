//! Main CLI application

use crate::config::find_project_file;
use crate::events::{ConsoleLogger, EventLog, Verbosity};
use crate::project::Project;
use crate::runner::Session;
use crate::tasks::TaskRegistry;
use anyhow::{bail, Context as _};
use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

/// CLI application
pub struct App {
    /// The clap command
    command: Command,
}

impl App {
    pub fn new() -> Self {
        App {
            command: build_command(),
        }
    }

    /// Run with the process arguments; returns whether the build succeeded
    pub fn run(self) -> anyhow::Result<bool> {
        let matches = self.command.clone().get_matches();
        self.run_matches(&matches)
    }

    fn run_matches(mut self, matches: &ArgMatches) -> anyhow::Result<bool> {
        if let Some(shell) = matches.get_one::<Shell>("completions") {
            let name = self.command.get_name().to_string();
            clap_complete::generate(*shell, &mut self.command, name, &mut io::stdout());
            return Ok(true);
        }

        let verbosity = get_verbosity(matches);
        let path = match matches.get_one::<String>("file") {
            Some(file) => PathBuf::from(file),
            None => find_project_file()?,
        };
        let globals = parse_global_properties(matches)?;

        let mut project = Project::load(&path, globals)
            .with_context(|| format!("failed to load project '{}'", path.display()))?;

        if matches.get_flag("list-targets") {
            for name in project.targets().names() {
                println!("{}", name);
            }
            return Ok(true);
        }

        let targets: Vec<String> = matches
            .get_many::<String>("targets")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let log = EventLog::new().with_sink(Rc::new(ConsoleLogger::new(verbosity)));
        let mut session = Session::new(TaskRegistry::new(), log);
        let summary = session.build(&mut project, &targets);

        tracing::info!(
            succeeded = summary.succeeded,
            warnings = session.log.warning_count(),
            errors = session.log.error_count(),
            "build complete"
        );
        Ok(summary.succeeded)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the clap command
fn build_command() -> Command {
    Command::new("rbuild")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Evaluate a project description and build its targets")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to the rbuild.yml project file"),
        )
        .arg(
            Arg::new("property")
                .short('p')
                .long("property")
                .value_name("NAME=VALUE")
                .help("Set a global property (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print high importance messages, warnings and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-targets")
                .long("list-targets")
                .help("List the project's targets and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .help("Print a shell completion script and exit")
                .value_parser(clap::value_parser!(Shell)),
        )
        .arg(
            Arg::new("targets")
                .value_name("TARGET")
                .help("Targets to build (default: the project's default targets)")
                .num_args(0..),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Collect `-p NAME=VALUE` pairs in command line order
fn parse_global_properties(matches: &ArgMatches) -> anyhow::Result<Vec<(String, String)>> {
    let mut properties = Vec::new();
    for entry in matches.get_many::<String>("property").into_iter().flatten() {
        let Some((name, value)) = entry.split_once('=') else {
            bail!("invalid property '{}': expected NAME=VALUE", entry);
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("invalid property '{}': empty name", entry);
        }
        properties.push((name.to_string(), value.to_string()));
    }
    Ok(properties)
}

/// Run the CLI application; returns whether the build succeeded
pub fn run() -> anyhow::Result<bool> {
    App::new().run()
}
