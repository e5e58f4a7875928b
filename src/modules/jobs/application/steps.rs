//! Fetch-then-resolve units the pipelines are assembled from.
//!
//! Each step makes one or two gateway calls and one resolver transaction; the
//! orchestrator treats a step's error as a per-item failure.

use crate::modules::catalog::domain::{Entity, ReferenceLeague, ScopeContext, UpsertResult};
use crate::modules::jobs::application::context::SyncContext;
use crate::modules::provider::domain::shapes::SeasonShape;
use crate::modules::provider::{Fidelity, Resource};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_warn};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamTarget {
    pub external_id: u64,
    pub local_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerTarget {
    pub external_id: u64,
    pub local_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueTarget {
    pub key: String,
    pub tournament_id: u64,
    pub local_id: i64,
    pub name: String,
    pub fidelity: Fidelity,
}

#[derive(Debug, Clone)]
pub struct TeamStep {
    pub target: TeamTarget,
    pub result: UpsertResult,
    pub fidelity: Fidelity,
}

#[derive(Debug, Clone)]
pub struct SquadStep {
    pub players: Vec<PlayerTarget>,
    pub created: usize,
    pub fidelity: Fidelity,
}

#[derive(Debug, Clone)]
pub struct PlayerStep {
    pub result: UpsertResult,
    pub transfers: usize,
    pub fidelity: Fidelity,
}

pub async fn enrich_team(ctx: &SyncContext, team_id: u64, force_update: bool) -> AppResult<TeamStep> {
    let data = ctx.gateway.fetch(&Resource::Team(team_id)).await?;
    let fidelity = data.fidelity;
    let shape = data.payload.into_team()?;

    let record = ctx.mapper.team(&shape, fidelity);
    let result = ctx
        .resolver
        .resolve_and_upsert(record, ScopeContext::default(), force_update)
        .await?;

    Ok(TeamStep {
        target: TeamTarget {
            external_id: team_id,
            local_id: result.id(),
            name: shape.name,
        },
        result,
        fidelity,
    })
}

/// Store a team's squad in one transaction.
pub async fn sync_squad(ctx: &SyncContext, team: &TeamTarget, force_update: bool) -> AppResult<SquadStep> {
    let data = ctx.gateway.fetch(&Resource::TeamPlayers(team.external_id)).await?;
    let fidelity = data.fidelity;
    let entries = data.payload.into_squad()?;
    let today = ctx.today();

    let records = entries
        .iter()
        .map(|entry| ctx.mapper.squad_entry(entry, fidelity, today))
        .collect();
    let results = ctx
        .resolver
        .resolve_group(records, ScopeContext::team(team.local_id), force_update)
        .await?;

    let created = results.iter().filter(|r| r.created).count();
    let players = entries
        .iter()
        .zip(results.iter())
        .map(|(entry, result)| PlayerTarget {
            external_id: entry.player.id,
            local_id: result.id(),
            name: entry.player.name.clone(),
        })
        .collect();

    log_debug!("Squad of {}: {} players ({} new)", team.name, results.len(), created);
    Ok(SquadStep {
        players,
        created,
        fidelity,
    })
}

/// Player details, plus transfer history when asked and the details were complete.
pub async fn enrich_player(
    ctx: &SyncContext,
    player_id: u64,
    with_transfers: bool,
    force_update: bool,
) -> AppResult<PlayerStep> {
    let data = ctx.gateway.fetch(&Resource::Player(player_id)).await?;
    let fidelity = data.fidelity;
    let shape = data.payload.into_player()?;
    let today = ctx.today();

    let record = ctx.mapper.player(&shape, None, fidelity, today);
    let result = ctx
        .resolver
        .resolve_and_upsert(record, ScopeContext::default(), force_update)
        .await?;

    let mut transfers = 0;
    if with_transfers && !fidelity.is_degraded() {
        match ctx.gateway.fetch(&Resource::PlayerTransfers(player_id)).await {
            Ok(history) => {
                let history_fidelity = history.fidelity;
                let history = history.payload.into_transfers()?;
                let records = ctx.mapper.transfers(&shape, &history, history_fidelity, today);
                transfers = ctx
                    .resolver
                    .resolve_group(records, ScopeContext::default(), force_update)
                    .await?
                    .len();
            }
            Err(AppError::NotFound(_)) => {
                log_debug!("No transfer history for player {}", player_id);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(PlayerStep {
        result,
        transfers,
        fidelity,
    })
}

/// Tournament id for a reference key, league name or numeric id.
pub fn tournament_id_for(query: &str) -> AppResult<(Option<&'static ReferenceLeague>, u64)> {
    let reference = ReferenceLeague::find(query);
    match (reference, query.trim().parse::<u64>()) {
        (Some(league), _) => Ok((Some(league), league.tournament_id)),
        (None, Ok(id)) => Ok((None, id)),
        (None, Err(_)) => Err(AppError::ValidationError(format!("Unknown league: {}", query))),
    }
}

/// Resolve a league by key, name or tournament id.
///
/// The tournament endpoint is preferred; leagues in the reference table
/// survive its failure with a degraded record.
pub async fn resolve_league(ctx: &SyncContext, query: &str, force_update: bool) -> AppResult<LeagueTarget> {
    let (reference, tournament_id) = tournament_id_for(query)?;

    let record = match ctx.gateway.fetch(&Resource::Tournament(tournament_id)).await {
        Ok(data) => {
            let fidelity = data.fidelity;
            let tournament = data.payload.into_tournament()?;
            ctx.mapper.league(&tournament, None, fidelity)
        }
        Err(e) => match reference {
            Some(league) => {
                log_warn!(
                    "Tournament {} unavailable ({}); using reference entry {}",
                    tournament_id,
                    e,
                    league.key
                );
                league.to_record()
            }
            None => return Err(e),
        },
    };

    let fidelity = record.fidelity;
    let name = record.entity.name().unwrap_or(query).to_string();
    let result = ctx
        .resolver
        .resolve_and_upsert(record, ScopeContext::default(), force_update)
        .await?;

    Ok(LeagueTarget {
        key: reference.map(|l| l.key.to_string()).unwrap_or_else(|| query.to_string()),
        tournament_id,
        local_id: result.id(),
        name,
        fidelity,
    })
}

pub async fn pick_season(ctx: &SyncContext, tournament_id: u64, year: Option<&str>) -> AppResult<SeasonRef> {
    let seasons = ctx
        .gateway
        .fetch(&Resource::TournamentSeasons(tournament_id))
        .await?
        .payload
        .into_seasons()?;

    select_season(&seasons, year).ok_or_else(|| {
        AppError::NotFound(format!(
            "No season {} for tournament {}",
            year.unwrap_or("current"),
            tournament_id
        ))
    })
}

/// The season matching `year` ("2024", "24/25", "2024/2025", "2024-2025"),
/// or the most recent one when no year is given.
pub fn select_season(seasons: &[SeasonShape], year: Option<&str>) -> Option<SeasonRef> {
    let to_ref = |season: &SeasonShape| SeasonRef {
        id: season.id,
        name: season
            .year
            .clone()
            .or_else(|| season.name.clone())
            .unwrap_or_else(|| season.id.to_string()),
    };

    let wanted = match year.map(str::trim).filter(|y| !y.is_empty()) {
        None => return seasons.first().map(to_ref),
        Some(year) => year,
    };

    let compact = compact_year(wanted);
    seasons
        .iter()
        .find(|season| {
            season.year.as_deref().map(str::trim) == Some(wanted)
                || season.year.as_deref().map(compact_year).as_deref() == Some(compact.as_str())
                || season
                    .year
                    .as_deref()
                    .map(|y| compact.len() == 2 && y.starts_with(&format!("{}/", compact)))
                    .unwrap_or(false)
        })
        .map(to_ref)
}

/// "2024" -> "24", "2024/2025" or "2024-2025" -> "24/25".
fn compact_year(year: &str) -> String {
    let parts: Vec<&str> = year
        .split(|c| c == '/' || c == '-')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let short = |p: &str| {
        if p.len() == 4 {
            p[2..].to_string()
        } else {
            p.to_string()
        }
    };
    parts.iter().map(|p| short(p)).collect::<Vec<_>>().join("/")
}

/// Store a league table and return the teams it lists, in table order.
pub async fn league_teams(
    ctx: &SyncContext,
    league: &LeagueTarget,
    season: &SeasonRef,
    force_update: bool,
) -> AppResult<Vec<TeamTarget>> {
    let data = ctx
        .gateway
        .fetch(&Resource::Standings {
            tournament: league.tournament_id,
            season: season.id,
        })
        .await?;
    let fidelity = data.fidelity;
    let tables = data.payload.into_standings()?;

    let records = ctx.mapper.standings(&tables, fidelity);
    let results = ctx
        .resolver
        .resolve_group(
            records,
            ScopeContext::league_season(league.local_id, season.name.clone()),
            force_update,
        )
        .await?;

    let rows = tables.iter().flat_map(|table| table.rows.iter());
    let mut seen = HashSet::new();
    let teams = rows
        .zip(results.iter())
        .filter_map(|(row, result)| {
            let local_id = match &result.entity.entity {
                Entity::Standing(standing) => standing.team_id,
                _ => None,
            }?;
            seen.insert(row.team.id).then(|| TeamTarget {
                external_id: row.team.id,
                local_id,
                name: row.team.name.clone(),
            })
        })
        .collect();
    Ok(teams)
}
