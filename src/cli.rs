use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::PathBuf;

use crate::chart::{create_chart, SVG_CONTENT_TYPE};
use crate::config::{AppConfig, GitHubConfig};
use crate::error::PublicError;
use crate::model::chart::{ChartDimensions, SprintKey};
use crate::persister;
use crate::storage::Storage;
use crate::timeline::build_timeline;
use crate::tracker::github::GitHubSprintSource;
use crate::tracker::SprintSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chart {
        size: Option<String>,
        sprint: Option<u64>,
        output: Option<PathBuf>,
    },
    Snapshot,
    Sprint {
        id: Option<u64>,
        organization: Option<String>,
    },
    Schedule,
    Help,
}

/// Parse everything after the program name.
///
/// Supported forms:
///   burndown chart [--size 500x200] [--sprint 12] [-o chart.svg]
///   burndown snapshot
///   burndown sprint [12] [--org my-org]
///   burndown schedule
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "chart" => parse_chart_args(rest),
        "snapshot" => no_extra_args("snapshot", rest).map(|_| Command::Snapshot),
        "sprint" => parse_sprint_args(rest),
        "schedule" => no_extra_args("schedule", rest).map(|_| Command::Schedule),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("Unknown command \"{other}\""),
    }
}

fn no_extra_args(command: &str, rest: &[String]) -> Result<()> {
    if let Some(arg) = rest.first() {
        bail!("Unexpected argument \"{arg}\" for {command}");
    }
    Ok(())
}

fn flag_value<'a>(flag: &str, iter: &mut impl Iterator<Item = &'a String>) -> Result<&'a String> {
    iter.next()
        .with_context(|| format!("Missing value for {flag} flag"))
}

fn parse_sprint_number(raw: &str) -> Result<u64> {
    raw.parse()
        .with_context(|| format!("Sprint id must be a number, got \"{raw}\""))
}

fn parse_chart_args(args: &[String]) -> Result<Command> {
    let mut size = None;
    let mut sprint = None;
    let mut output = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-s" | "--size" => size = Some(flag_value(arg, &mut iter)?.clone()),
            "--sprint" => sprint = Some(parse_sprint_number(flag_value(arg, &mut iter)?)?),
            "-o" | "--output" => output = Some(PathBuf::from(flag_value(arg, &mut iter)?)),
            other => bail!("Unexpected argument \"{other}\" for chart"),
        }
    }

    Ok(Command::Chart {
        size,
        sprint,
        output,
    })
}

fn parse_sprint_args(args: &[String]) -> Result<Command> {
    let mut id = None;
    let mut organization = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--org" | "--organization" => {
                organization = Some(flag_value(arg, &mut iter)?.clone())
            }
            other if id.is_none() && !other.starts_with('-') => {
                id = Some(parse_sprint_number(other)?)
            }
            other => bail!("Unexpected argument \"{other}\" for sprint"),
        }
    }

    Ok(Command::Sprint { id, organization })
}

fn github_config(config: &AppConfig) -> Result<&GitHubConfig, PublicError> {
    config.github.as_ref().ok_or_else(|| {
        PublicError::bad_request(
            "No GitHub organization configured. Add a [github] section to ~/.burndown/config.toml",
        )
    })
}

fn sprint_source(config: &GitHubConfig) -> Result<GitHubSprintSource, PublicError> {
    GitHubSprintSource::new(config).map_err(|e| {
        PublicError::bad_request(format!("Invalid [github] configuration: {e}")).with_internal(format!("{e:#}"))
    })
}

/// Runs a parsed command. Every failure comes back as a `PublicError`.
pub async fn run(command: Command, config: &AppConfig, storage: &dyn Storage) -> Result<(), PublicError> {
    match command {
        Command::Chart {
            size,
            sprint,
            output,
        } => handle_chart(config, storage, size.as_deref(), sprint, output).await,
        Command::Snapshot => {
            let source = sprint_source(github_config(config)?)?;
            let key = persister::persist_snapshot(&source, storage, Utc::now())
                .await
                .map_err(PublicError::from_anyhow)?;
            println!("Stored snapshot for sprint {key}");
            Ok(())
        }
        Command::Sprint { id, organization } => {
            let mut github = github_config(config)?.clone();
            if let Some(org) = organization {
                github.organization = org;
            }
            let summary = sprint_source(&github)?.sprint_summary(id).await?;
            let json = serde_json::to_string_pretty(&summary).map_err(PublicError::from_internal)?;
            println!("{json}");
            Ok(())
        }
        Command::Schedule => {
            let source = sprint_source(github_config(config)?)?;
            persister::run_schedule(&source, storage, &config.schedule)
                .await
                .map_err(PublicError::from_anyhow)
        }
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

async fn handle_chart(
    config: &AppConfig,
    storage: &dyn Storage,
    size: Option<&str>,
    sprint: Option<u64>,
    output: Option<PathBuf>,
) -> Result<(), PublicError> {
    let dimensions: ChartDimensions = match size {
        Some(raw) => raw.parse().map_err(|e| PublicError::bad_request(format!("{e}")))?,
        None => config.chart.dimensions().map_err(PublicError::from_anyhow)?,
    };

    let source = sprint_source(github_config(config)?)?;
    let summary = source.sprint_summary(sprint).await?;
    let key = SprintKey::new(source.organization(), summary.id);

    let now = Utc::now();
    let timeline = build_timeline(storage, &key, &summary, now)
        .await
        .map_err(PublicError::from_internal)?;
    let svg = create_chart(&timeline, dimensions, now).map_err(PublicError::from_internal)?;

    match output {
        Some(path) => {
            std::fs::write(&path, svg).map_err(|e| {
                PublicError::from_internal(format!("writing {}: {e}", path.display()))
            })?;
            log::info!("Wrote {SVG_CONTENT_TYPE} chart for sprint {key} to {}", path.display());
        }
        None => print!("{svg}"),
    }
    Ok(())
}

pub fn print_help() {
    println!("burndown: stacked-area sprint burndown charts\n");
    println!("USAGE:");
    println!("  burndown chart      Render the current sprint's burndown as SVG");
    println!("  burndown snapshot   Store a snapshot of the current sprint");
    println!("  burndown sprint     Print the sprint summary as JSON");
    println!("  burndown schedule   Store snapshots on the configured schedule");
    println!();
    println!("CHART OPTIONS:");
    println!("  -s, --size <WxH>    Chart size in pixels (default from config, 500x200)");
    println!("  --sprint <N>        Sprint number (default: earliest-ending active sprint)");
    println!("  -o, --output <file> Write the SVG to a file instead of stdout");
    println!();
    println!("SPRINT OPTIONS:");
    println!("  <N>                 Sprint number");
    println!("  --org <name>        Organization to read instead of the configured one");
    println!();
    println!("Configuration is read from ~/.burndown/config.toml (or $BURNDOWN_CONFIG).");
}
