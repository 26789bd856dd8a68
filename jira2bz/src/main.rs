mod cli_args;
mod layout;
mod pipeline;
mod telemetry;

use std::time::Instant;

use anyhow::{Context, Result};
use jira2bz_config::Jira2BzConfig;
use jira2bz_jira::JiraClient;
use tracing::info;

use cli_args::{CliAction, RunArgs, Step};
use layout::Layout;

fn main() -> Result<()> {
    let args = match cli_args::parse_cli_action()? {
        CliAction::Run(args) => args,
        CliAction::Help => {
            cli_args::print_help();
            return Ok(());
        }
    };

    telemetry::init();
    run(args)
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = match args.config_path.as_deref() {
        Some(path) => Jira2BzConfig::load_from_path(path)?,
        None => Jira2BzConfig::load_default()?,
    };
    if let Some(work_dir) = args.work_dir.clone() {
        config.migration.work_dir = work_dir;
    }

    let selection = args.selection(&config)?;
    let numbers = selection.numbers();
    let layout = Layout::from_config(&config)?;
    let steps = args.stage.steps();
    let client = if steps.iter().any(|step| step.needs_network()) {
        Some(JiraClient::from_config(&config)?)
    } else {
        None
    };

    info!(
        stage = args.stage.name(),
        selection = %selection.describe(),
        issues = numbers.len(),
        "starting migration"
    );

    for &step in steps {
        let started = Instant::now();
        let result = match step {
            Step::Fetch => client
                .as_ref()
                .context("fetch stage needs a Jira client")
                .and_then(|client| pipeline::fetch_issues(client, &layout, &numbers)),
            Step::Attachments => client
                .as_ref()
                .context("attachments stage needs a Jira client")
                .and_then(|client| pipeline::fetch_attachments(client, &layout, &numbers)),
            Step::Transform => pipeline::transform_issues(&config, &layout, &numbers),
        };

        match result {
            Ok(report) => telemetry::emit_success(&report, started.elapsed()),
            Err(error) => {
                telemetry::emit_failure(step.name(), started.elapsed(), &error);
                return Err(error);
            }
        }
    }

    Ok(())
}
