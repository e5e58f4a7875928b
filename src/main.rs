use anyhow::{bail, Context, Result};
use sofa_sync_lib::commands::{ControlSurface, JobStartParams};
use sofa_sync_lib::modules::jobs::domain::JobKind;
use sofa_sync_lib::shared::utils::init_logger;
use sofa_sync_lib::shared::AppConfig;
use sofa_sync_lib::{log_info, log_warn};
use std::time::Duration;

const PROGRESS_EVERY: Duration = Duration::from_secs(5);

const USAGE: &str = "usage: sofa-sync <command> [args]

commands:
  season-fixture <YYYY-YYYY> [--save]
  team <team id>
  all-teams [limit] [offset]
  league-players <league> <year>
  batch-players <year>
  populate";

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (kind, params) = parse_command(&args)?;

    let config = AppConfig::from_env().context("invalid configuration")?;
    let surface = ControlSurface::from_config(&config)
        .await
        .context("failed to build the control surface")?;

    let accepted = surface
        .start_job(kind, params)
        .with_context(|| format!("could not start {}", kind))?;
    log_info!("Started {} (poll {})", accepted.job_id, accepted.status_endpoint);

    let mut ticker = tokio::time::interval(PROGRESS_EVERY);
    loop {
        ticker.tick().await;
        let status = surface.job_status(&accepted.job_id)?;
        log_info!(
            "{} {:.1}% stage={} item={} processed={} errors={}",
            status.job_id,
            status.progress,
            status.current_stage.as_deref().unwrap_or("-"),
            status.current_item.as_deref().unwrap_or("-"),
            status.stats.processed,
            status.stats.errors
        );
        if !status.is_running {
            break;
        }
    }

    surface.shutdown().await;
    let status = surface.job_status(&accepted.job_id)?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    for error in &status.errors {
        log_warn!("{}", error);
    }
    Ok(())
}

fn parse_command(args: &[String]) -> Result<(JobKind, JobStartParams)> {
    let Some(command) = args.first() else {
        bail!("{}", USAGE);
    };
    let rest = &args[1..];
    let positional: Vec<&str> = rest
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with("--"))
        .collect();
    let flag = |name: &str| rest.iter().any(|a| a == name);
    let number = |index: usize, what: &str| -> Result<Option<usize>> {
        positional
            .get(index)
            .map(|raw| raw.parse::<usize>().with_context(|| format!("{} must be a number", what)))
            .transpose()
    };
    let required = |index: usize, what: &str| -> Result<String> {
        positional
            .get(index)
            .map(|s| s.to_string())
            .with_context(|| format!("missing {}\n\n{}", what, USAGE))
    };

    let mut params = JobStartParams::default();
    let kind = match command.as_str() {
        "season-fixture" => {
            params.season = Some(required(0, "season")?);
            params.save = Some(flag("--save"));
            JobKind::SeasonFixture
        }
        "team" => {
            let id = required(0, "team id")?;
            params.team_id = Some(id.parse().context("team id must be a number")?);
            JobKind::TeamEnrichment
        }
        "all-teams" => {
            params.limit = number(0, "limit")?;
            params.offset = number(1, "offset")?;
            JobKind::AllTeamsEnrichment
        }
        "league-players" => {
            params.league = Some(required(0, "league")?);
            params.year = Some(required(1, "year")?);
            JobKind::LeaguePlayers
        }
        "batch-players" => {
            params.year = Some(required(0, "year")?);
            JobKind::BatchPlayers
        }
        "populate" => JobKind::DatabasePopulation,
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    };
    Ok((kind, params))
}
