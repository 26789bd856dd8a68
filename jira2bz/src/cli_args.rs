use std::{env, path::PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use jira2bz_config::Jira2BzConfig;
use jira2bz_domain::{IssueSelection, MAX_SELECTION_LEN};

/// What the command line asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Attachments,
    Transform,
    All,
}

/// One pass over the selected issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Attachments,
    Transform,
}

impl Stage {
    pub fn steps(self) -> &'static [Step] {
        match self {
            Self::Fetch => &[Step::Fetch],
            Self::Attachments => &[Step::Attachments],
            Self::Transform => &[Step::Transform],
            Self::All => &[Step::Fetch, Step::Attachments, Step::Transform],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Attachments => "attachments",
            Self::Transform => "transform",
            Self::All => "all",
        }
    }
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Attachments => "attachments",
            Self::Transform => "transform",
        }
    }

    pub fn needs_network(self) -> bool {
        matches!(self, Self::Fetch | Self::Attachments)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunArgs {
    pub stage: Stage,
    pub config_path: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub from: Option<u32>,
    pub to: Option<u32>,
    pub ids: Option<Vec<u32>>,
}

#[derive(Debug)]
pub enum CliAction {
    Run(RunArgs),
    Help,
}

impl RunArgs {
    /// Command-line ids or bounds win over the configured range.
    pub fn selection(&self, config: &Jira2BzConfig) -> Result<IssueSelection> {
        if let Some(ids) = &self.ids {
            return Ok(IssueSelection::List(ids.clone()));
        }

        let (first, last) = match (self.from, self.to) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                let (first, last) = config.issue_range()?;
                (self.from.unwrap_or(first), self.to.unwrap_or(last))
            }
        };
        if first > last {
            bail!("--from ({}) is greater than --to ({})", first, last);
        }
        let selection = IssueSelection::Range { first, last };
        if selection.count() > MAX_SELECTION_LEN {
            bail!(
                "range {}..={} names {} issues, more than the {} a run accepts",
                first,
                last,
                selection.count(),
                MAX_SELECTION_LEN
            );
        }
        Ok(selection)
    }
}

pub fn parse_cli_action() -> Result<CliAction> {
    parse_args(env::args().skip(1))
}

pub fn print_help() {
    println!("jira2bz: migrate JIRA issues into Bugzilla import documents");
    println!("Usage:");
    println!("  jira2bz [fetch|attachments|transform|all] [options]");
    println!("Commands:");
    println!("  fetch         Download the XML export of every selected issue");
    println!("  attachments   Download the attachments of fetched issues");
    println!("  transform     Write one Bugzilla document per fetched issue");
    println!("  all           Run the three stages in order (default)");
    println!("Options:");
    println!("  --config <path>     Config file (default ~/.config/jira2bz/config.yaml)");
    println!("  --work-dir <dir>    Directory holding raw, attachment and output files");
    println!("  --from <n>          First issue number (overrides migration.first_issue)");
    println!("  --to <n>            Last issue number (overrides migration.last_issue)");
    println!("  --ids <n,n,...>     Explicit issue numbers instead of a range");
    println!("Environment:");
    println!("  JIRA2BZ_PASSWORD    JIRA password or token");
    println!("  JIRA2BZ_LOG         Log filter (default info)");
}

fn parse_args<I>(args: I) -> Result<CliAction>
where
    I: IntoIterator<Item = String>,
{
    let mut stage = None;
    let mut config_path = None;
    let mut work_dir = None;
    let mut from = None;
    let mut to = None;
    let mut ids = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "fetch" | "attachments" | "transform" | "all" if stage.is_none() => {
                stage = Some(match arg.as_str() {
                    "fetch" => Stage::Fetch,
                    "attachments" => Stage::Attachments,
                    "transform" => Stage::Transform,
                    _ => Stage::All,
                });
            }
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(
                    args.next()
                        .ok_or_else(|| anyhow!("--config requires a value"))?,
                ));
            }
            "--work-dir" => {
                work_dir = Some(PathBuf::from(
                    args.next()
                        .ok_or_else(|| anyhow!("--work-dir requires a value"))?,
                ));
            }
            "--from" => {
                from = Some(parse_number(
                    "--from",
                    args.next()
                        .ok_or_else(|| anyhow!("--from requires a value"))?,
                )?);
            }
            "--to" => {
                to = Some(parse_number(
                    "--to",
                    args.next()
                        .ok_or_else(|| anyhow!("--to requires a value"))?,
                )?);
            }
            "--ids" => {
                ids = Some(parse_id_list(
                    &args
                        .next()
                        .ok_or_else(|| anyhow!("--ids requires a value"))?,
                )?);
            }
            "--help" | "-h" => {
                return Ok(CliAction::Help);
            }
            other => return Err(anyhow!("Unknown argument: {other}")),
        }
    }

    if ids.is_some() && (from.is_some() || to.is_some()) {
        return Err(anyhow!("Use either --ids or --from/--to, not both"));
    }

    Ok(CliAction::Run(RunArgs {
        stage: stage.unwrap_or(Stage::All),
        config_path,
        work_dir,
        from,
        to,
        ids,
    }))
}

fn parse_number(flag: &str, value: String) -> Result<u32> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{flag} expects an issue number, got '{value}'"))
}

fn parse_id_list(value: &str) -> Result<Vec<u32>> {
    let ids = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_number("--ids", part.to_string()))
        .collect::<Result<Vec<_>>>()?;
    if ids.is_empty() {
        bail!("--ids requires at least one issue number");
    }
    Ok(ids)
}
