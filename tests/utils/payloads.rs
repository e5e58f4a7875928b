/// JSON documents shaped like the upstream responses
use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};

pub fn team_body(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "shortName": name,
        "country": { "name": "England", "alpha2": "EN" },
        "venue": {
            "city": { "name": "London" },
            "stadium": { "name": format!("{} Ground", name), "capacity": 40000 }
        },
        "manager": { "name": "A. Manager" }
    })
}

pub fn team(id: u64, name: &str) -> Value {
    json!({ "team": team_body(id, name) })
}

pub fn squad(players: &[(u64, &str)]) -> Value {
    let entries: Vec<Value> = players
        .iter()
        .enumerate()
        .map(|(index, (id, name))| {
            json!({
                "player": { "id": id, "name": name, "position": "M" },
                "jerseyNumber": index + 2
            })
        })
        .collect();
    json!({ "players": entries })
}

pub fn player(id: u64, name: &str, team: (u64, &str)) -> Value {
    json!({
        "player": {
            "id": id,
            "name": name,
            "shortName": name,
            "position": "F",
            "height": 181,
            "preferredFoot": "Right",
            "dateOfBirthTimestamp": 946684800,
            "country": { "name": "Spain", "alpha2": "ES" },
            "team": team_body(team.0, team.1)
        }
    })
}

pub fn kickoff(date: NaiveDate, hour: u32) -> i64 {
    date.and_hms_opt(hour, 0, 0)
        .expect("valid kickoff time")
        .and_utc()
        .timestamp()
}

pub fn event(id: u64, start_timestamp: i64, home: (u64, &str), away: (u64, &str), competition: &str) -> Value {
    json!({
        "id": id,
        "startTimestamp": start_timestamp,
        "homeTeam": { "id": home.0, "name": home.1 },
        "awayTeam": { "id": away.0, "name": away.1 },
        "status": { "code": 100, "type": "finished" },
        "homeScore": { "current": 2, "period1": 1 },
        "awayScore": { "current": 1, "period1": 0 },
        "roundInfo": { "round": 3 },
        "tournament": {
            "name": competition,
            "category": { "id": 1, "name": "England" },
            "uniqueTournament": { "id": 17, "name": competition }
        }
    })
}

/// One match kicking off on `date` plus a late match of the previous day,
/// which the per-day filter must drop.
pub fn scheduled_events(date: NaiveDate, competition: &str) -> Value {
    let ordinal = date.num_days_from_ce() as u64;
    let previous = date.pred_opt().expect("date has a predecessor");
    json!({
        "events": [
            event(ordinal * 10 + 1, kickoff(date, 15), (1, "Arsenal"), (2, "Chelsea"), competition),
            event(ordinal * 10 + 2, kickoff(previous, 23), (3, "Everton"), (4, "Fulham"), competition)
        ]
    })
}

/// One page of a season's past events.
pub fn season_events(events: Vec<Value>, has_next_page: bool) -> Value {
    json!({ "events": events, "hasNextPage": has_next_page })
}

/// `/sport/football/scheduled-events/YYYY-MM-DD` to its date.
pub fn scheduled_date(path: &str) -> Option<NaiveDate> {
    path.strip_prefix("/sport/football/scheduled-events/")
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

pub fn tournament(id: u64, name: &str) -> Value {
    json!({
        "uniqueTournament": {
            "id": id,
            "name": name,
            "category": { "id": 1, "name": "England", "alpha2": "EN" }
        }
    })
}

/// Most recent season first, as the upstream lists them.
pub fn seasons() -> Value {
    json!({
        "seasons": [
            { "id": 61627, "name": "Premier League 24/25", "year": "24/25" },
            { "id": 52186, "name": "Premier League 23/24", "year": "23/24" }
        ]
    })
}

pub fn standings(teams: &[(u64, &str)]) -> Value {
    let rows: Vec<Value> = teams
        .iter()
        .enumerate()
        .map(|(index, (id, name))| {
            json!({
                "team": { "id": id, "name": name },
                "position": index + 1,
                "matches": 10,
                "wins": 5,
                "draws": 3,
                "losses": 2,
                "points": 18
            })
        })
        .collect();
    json!({ "standings": [ { "name": "Premier League", "rows": rows } ] })
}
