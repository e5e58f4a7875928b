/// Upstream shapes to external records.
use crate::modules::catalog::domain::{
    Country, Entity, ExternalRecord, League, Link, Match, MatchStatus, Player, Standing, Team,
    TopScorer, Transfer,
};
use crate::modules::provider::domain::shapes::{
    CategoryShape, EventShape, PlayerShape, SquadEntryShape, StandingTableShape, TeamShape,
    TopPlayersShape, TransferShape, UniqueTournamentShape,
};
use crate::modules::provider::domain::Fidelity;
use crate::modules::provider::infrastructure::sofascore::Endpoints;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

#[derive(Debug, Clone)]
pub struct RecordMapper {
    endpoints: Endpoints,
}

impl RecordMapper {
    pub fn new(endpoints: Endpoints) -> Self {
        Self { endpoints }
    }

    pub fn country(&self, category: &CategoryShape, fidelity: Fidelity) -> ExternalRecord {
        ExternalRecord::new(
            Some(category.id.to_string()),
            Entity::Country(Country {
                name: category.name.clone(),
                code: category.alpha2.clone(),
                flag: category.flag.clone(),
            }),
            fidelity,
        )
    }

    /// Country known only by name (no upstream id).
    pub fn country_named(&self, name: &str, code: Option<String>) -> Option<ExternalRecord> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(ExternalRecord::new(
            None,
            Entity::Country(Country {
                name: name.to_string(),
                code,
                flag: None,
            }),
            Fidelity::Full,
        ))
    }

    pub fn league(
        &self,
        tournament: &UniqueTournamentShape,
        current_season: Option<String>,
        fidelity: Fidelity,
    ) -> ExternalRecord {
        let country = tournament.category.as_ref().map(|c| c.name.clone());
        let record = ExternalRecord::new(
            Some(tournament.id.to_string()),
            Entity::League(League {
                name: tournament.name.clone(),
                country: country.clone(),
                country_id: None,
                logo: Some(self.endpoints.tournament_image(tournament.id)),
                category: tournament.category.as_ref().and_then(|c| c.slug.clone()),
                tier: tournament.tier,
                current_season,
            }),
            fidelity,
        );

        match &tournament.category {
            Some(category) => record.with_link(Link::Country, self.country(category, fidelity)),
            None => record,
        }
    }

    pub fn team(&self, team: &TeamShape, fidelity: Fidelity) -> ExternalRecord {
        let country = team.country.as_ref().and_then(|c| c.name.clone());
        let venue = team.venue.as_ref();

        let record = ExternalRecord::new(
            Some(team.id.to_string()),
            Entity::Team(Team {
                name: team.name.clone(),
                short_name: team.short_name.clone(),
                slug: team.slug.clone(),
                country: country.clone(),
                country_id: None,
                logo: Some(self.endpoints.team_image(team.id)),
                city: venue.and_then(|v| v.city.as_ref()).and_then(|c| c.name.clone()),
                stadium: venue
                    .and_then(|v| v.stadium.as_ref())
                    .and_then(|s| s.name.clone()),
                stadium_capacity: venue.and_then(|v| v.stadium.as_ref()).and_then(|s| s.capacity),
                founded: team
                    .foundation_date_timestamp
                    .and_then(timestamp_to_datetime)
                    .map(|d| d.year()),
                manager: team.manager.as_ref().and_then(|m| m.name.clone()),
                primary_color: team.team_colors.as_ref().and_then(|c| c.primary.clone()),
                secondary_color: team.team_colors.as_ref().and_then(|c| c.secondary.clone()),
            }),
            fidelity,
        );

        let alpha2 = team.country.as_ref().and_then(|c| c.alpha2.clone());
        match country.and_then(|name| self.country_named(&name, alpha2)) {
            Some(country) => record.with_link(Link::Country, country),
            None => record,
        }
    }

    /// Player record; `team` (or the player's own team) becomes its parent.
    pub fn player(
        &self,
        player: &PlayerShape,
        team: Option<&TeamShape>,
        fidelity: Fidelity,
        today: NaiveDate,
    ) -> ExternalRecord {
        let birth_date = player
            .date_of_birth_timestamp
            .and_then(timestamp_to_datetime)
            .map(|d| d.date_naive());
        let full_name = match (&player.first_name, &player.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            _ => None,
        };

        let record = ExternalRecord::new(
            Some(player.id.to_string()),
            Entity::Player(Player {
                name: player.name.clone(),
                full_name,
                short_name: player.short_name.clone(),
                slug: player.slug.clone(),
                position: player.position.clone(),
                position_category: player
                    .position
                    .as_deref()
                    .and_then(position_category)
                    .map(str::to_string),
                nationality: player.country.as_ref().and_then(|c| c.name.clone()),
                birth_date,
                age: birth_date.map(|birth| age_on(birth, today)),
                height: player.height,
                weight: None,
                foot: player.preferred_foot.clone(),
                shirt_number: player.jersey_number,
                photo: Some(self.endpoints.player_image(player.id)),
                market_value: player.proposed_market_value_raw.as_ref().and_then(|m| {
                    m.value.map(|value| match &m.currency {
                        Some(currency) => format!("{} {}", value, currency),
                        None => value.to_string(),
                    })
                }),
                contract_until: player
                    .contract_until_timestamp
                    .and_then(timestamp_to_datetime)
                    .map(|d| d.date_naive()),
                team_id: None,
            }),
            fidelity,
        );

        match team.or(player.team.as_ref()) {
            Some(team) => record.with_link(Link::Team, self.team(team, fidelity)),
            None => record,
        }
    }

    pub fn squad_entry(
        &self,
        entry: &SquadEntryShape,
        fidelity: Fidelity,
        today: NaiveDate,
    ) -> ExternalRecord {
        let mut record = self.player(&entry.player, None, fidelity, today);
        if let (Entity::Player(player), Some(number)) = (&mut record.entity, entry.jersey_number) {
            player.shirt_number = Some(number);
        }
        record
    }

    /// Match with both teams (and the league, when known) as parents.
    pub fn event(&self, event: &EventShape, fidelity: Fidelity) -> ExternalRecord {
        let kickoff = timestamp_to_datetime(event.start_timestamp).unwrap_or_else(Utc::now);
        let record = ExternalRecord::new(
            Some(event.id.to_string()),
            Entity::Match(Match {
                kickoff,
                status: Some(MatchStatus::from_upstream(
                    event.status.as_ref().and_then(|s| s.status_type.as_deref()),
                )),
                round: event.round_info.as_ref().and_then(|r| {
                    r.name.clone().or_else(|| r.round.map(|n| n.to_string()))
                }),
                season: event
                    .season
                    .as_ref()
                    .and_then(|s| s.year.clone().or_else(|| s.name.clone())),
                competition: event.competition_name().map(str::to_string),
                league_id: None,
                home_team_id: None,
                away_team_id: None,
                home_score: event.home_score.as_ref().and_then(|s| s.current),
                away_score: event.away_score.as_ref().and_then(|s| s.current),
                half_time_home_score: event.home_score.as_ref().and_then(|s| s.period1),
                half_time_away_score: event.away_score.as_ref().and_then(|s| s.period1),
                venue: event
                    .venue
                    .as_ref()
                    .and_then(|v| v.stadium.as_ref())
                    .and_then(|s| s.name.clone()),
                referee: event.referee.as_ref().and_then(|r| r.name.clone()),
                attendance: event.attendance,
            }),
            fidelity,
        )
        .with_link(Link::HomeTeam, self.team(&event.home_team, fidelity))
        .with_link(Link::AwayTeam, self.team(&event.away_team, fidelity));

        match event
            .tournament
            .as_ref()
            .and_then(|t| t.unique_tournament.as_ref())
        {
            Some(tournament) => record.with_link(Link::League, self.league(tournament, None, fidelity)),
            None => record,
        }
    }

    /// One record per table row; league and season come from the caller's scope.
    pub fn standings(&self, tables: &[StandingTableShape], fidelity: Fidelity) -> Vec<ExternalRecord> {
        let single_table = tables.len() <= 1;
        tables
            .iter()
            .flat_map(|table| {
                let group_name = if single_table { None } else { table.name.clone() };
                table.rows.iter().map(move |row| {
                    let goal_difference = match (row.scores_for, row.scores_against) {
                        (Some(gf), Some(ga)) => Some(gf - ga),
                        _ => None,
                    };
                    ExternalRecord::new(
                        None,
                        Entity::Standing(Standing {
                            league_id: None,
                            team_id: None,
                            season: None,
                            group_name: group_name.clone(),
                            position: row.position,
                            played: row.matches,
                            won: row.wins,
                            drawn: row.draws,
                            lost: row.losses,
                            goals_for: row.scores_for,
                            goals_against: row.scores_against,
                            goal_difference,
                            points: row.points,
                            form: row.promotion.as_ref().and_then(|p| p.text.clone()),
                        }),
                        fidelity,
                    )
                    .with_link(Link::Team, self.team(&row.team, fidelity))
                })
            })
            .collect()
    }

    /// Goal scorers ranked as the upstream lists them.
    pub fn top_scorers(
        &self,
        top: &TopPlayersShape,
        fidelity: Fidelity,
        today: NaiveDate,
    ) -> Vec<ExternalRecord> {
        top.goals
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let stats = &entry.statistics;
                let goals_per_match = match (stats.goals, stats.appearances) {
                    (Some(goals), Some(apps)) if apps > 0 => {
                        Some((goals as f64 / apps as f64 * 100.0).round() / 100.0)
                    }
                    _ => None,
                };
                let record = ExternalRecord::new(
                    None,
                    Entity::TopScorer(TopScorer {
                        league_id: None,
                        player_id: None,
                        team_id: None,
                        season: None,
                        category: Some("goals".to_string()),
                        rank: Some(index as i64 + 1),
                        value: stats.goals,
                        matches: stats.appearances,
                        minutes_played: stats.minutes_played,
                        penalty_goals: stats.penalty_goals,
                        goals_per_match,
                    }),
                    fidelity,
                )
                .with_link(
                    Link::Player,
                    self.player(&entry.player, entry.team.as_ref(), fidelity, today),
                );

                match &entry.team {
                    Some(team) => record.with_link(Link::Team, self.team(team, fidelity)),
                    None => record,
                }
            })
            .collect()
    }

    pub fn transfers(
        &self,
        player: &PlayerShape,
        history: &[TransferShape],
        fidelity: Fidelity,
        today: NaiveDate,
    ) -> Vec<ExternalRecord> {
        history
            .iter()
            .map(|transfer| {
                let fee = transfer.transfer_fee_raw.as_ref();
                let mut record = ExternalRecord::new(
                    transfer.id.map(|id| id.to_string()),
                    Entity::Transfer(Transfer {
                        player_id: None,
                        from_team_id: None,
                        to_team_id: None,
                        transfer_date: transfer
                            .transfer_date_timestamp
                            .and_then(timestamp_to_datetime)
                            .map(|d| d.date_naive()),
                        transfer_type: transfer.transfer_type.map(transfer_type_label),
                        fee: fee
                            .and_then(|f| f.value.map(|v| v.to_string()))
                            .or_else(|| transfer.transfer_fee_description.clone()),
                        currency: fee.and_then(|f| f.currency.clone()),
                    }),
                    fidelity,
                )
                .with_link(Link::Player, self.player(player, None, fidelity, today));

                if let Some(from) = &transfer.transfer_from {
                    record = record.with_link(Link::FromTeam, self.team(from, fidelity));
                }
                if let Some(to) = &transfer.transfer_to {
                    record = record.with_link(Link::ToTeam, self.team(to, fidelity));
                }
                record
            })
            .collect()
    }
}

/// Position letter to category name.
pub fn position_category(position: &str) -> Option<&'static str> {
    match position.trim() {
        "G" => Some("Goalkeeper"),
        "D" => Some("Defender"),
        "M" => Some("Midfielder"),
        "F" => Some("Forward"),
        _ => None,
    }
}

/// Whole years between `birth` and `on`.
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0)
}

fn transfer_type_label(code: i64) -> String {
    match code {
        1 => "Loan".to_string(),
        2 => "End of loan".to_string(),
        3 => "Transfer".to_string(),
        other => format!("Type {}", other),
    }
}

pub fn timestamp_to_datetime(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> RecordMapper {
        RecordMapper::new(Endpoints::default())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_position_category() {
        assert_eq!(position_category("G"), Some("Goalkeeper"));
        assert_eq!(position_category("F"), Some("Forward"));
        assert_eq!(position_category("X"), None);
    }

    #[test]
    fn test_age_counts_whole_years() {
        let birth = NaiveDate::from_ymd_opt(2001, 9, 5).unwrap();
        assert_eq!(age_on(birth, today()), 23);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 9, 5).unwrap()), 23);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 9, 4).unwrap()), 22);
    }

    #[test]
    fn test_player_links_team_and_derives_fields() {
        let mut shape = PlayerShape::bare(934235, "Bukayo Saka");
        shape.position = Some("F".into());
        shape.date_of_birth_timestamp = Some(999_648_000);
        let team = TeamShape::bare(42, "Arsenal");

        let record = mapper().player(&shape, Some(&team), Fidelity::Full, today());
        let player = record.entity.as_player().unwrap();
        assert_eq!(player.position_category.as_deref(), Some("Forward"));
        assert_eq!(player.age, Some(23));
        assert!(player.photo.as_deref().unwrap().ends_with("/player/934235/image"));
        assert_eq!(record.links.len(), 1);
        assert_eq!(record.links[0].0, Link::Team);
    }

    #[test]
    fn test_squad_jersey_overrides_player_number() {
        let entry = SquadEntryShape {
            player: PlayerShape::bare(1, "Keeper"),
            jersey_number: Some(1),
        };
        let record = mapper().squad_entry(&entry, Fidelity::Degraded, today());
        assert_eq!(record.entity.as_player().unwrap().shirt_number, Some(1));
        assert!(record.fidelity.is_degraded());
    }
}
