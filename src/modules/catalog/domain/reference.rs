/// Competitions known without asking the upstream.
use super::entities::{Country, Entity, League};
use super::record::{ExternalRecord, Link};
use crate::modules::provider::domain::Fidelity;
use crate::shared::utils::normalize_name;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceLeague {
    pub key: &'static str,
    pub name: &'static str,
    pub tournament_id: u64,
    pub country: &'static str,
    pub category: &'static str,
}

const fn league(
    key: &'static str,
    name: &'static str,
    tournament_id: u64,
    country: &'static str,
    category: &'static str,
) -> ReferenceLeague {
    ReferenceLeague {
        key,
        name,
        tournament_id,
        country,
        category,
    }
}

pub const REFERENCE_LEAGUES: &[ReferenceLeague] = &[
    league("Champions League", "UEFA Champions League", 7, "Europe", "international"),
    league("Europa League", "UEFA Europa League", 679, "Europe", "international"),
    league("Europa Conference League", "UEFA Europa Conference League", 17015, "Europe", "international"),
    league("EPL", "Premier League", 17, "England", "domestic"),
    league("La Liga", "LaLiga", 8, "Spain", "domestic"),
    league("Bundesliga", "Bundesliga", 35, "Germany", "domestic"),
    league("Serie A", "Serie A", 23, "Italy", "domestic"),
    league("Ligue 1", "Ligue 1", 34, "France", "domestic"),
    league("Turkish Super Lig", "Trendyol Süper Lig", 52, "Turkey", "domestic"),
    league("Argentina Liga Profesional", "Liga Profesional de Fútbol", 155, "Argentina", "domestic"),
    league("Argentina Copa de la Liga Profesional", "Copa de la Liga Profesional", 13475, "Argentina", "domestic_cup"),
    league("Liga 1 Peru", "Liga 1", 406, "Peru", "domestic"),
    league("Copa Libertadores", "CONMEBOL Libertadores", 384, "South America", "international"),
    league("MLS", "MLS", 242, "USA", "domestic"),
    league("Saudi Pro League", "Saudi Pro League", 955, "Saudi Arabia", "domestic"),
    league("World Cup", "World Cup", 16, "World", "national_teams"),
    league("Euros", "EURO", 1, "Europe", "national_teams"),
    league("Gold Cup", "Gold Cup", 140, "North America", "national_teams"),
    league("Women's World Cup", "World Cup, Women", 290, "World", "national_teams"),
];

/// Keys of the leagues processed when a job does not name any.
pub const MAIN_LEAGUES: [&str; 5] = ["La Liga", "EPL", "Bundesliga", "Serie A", "Ligue 1"];

impl ReferenceLeague {
    /// Lookup by key, display name or tournament id, ignoring case and spacing.
    pub fn find(query: &str) -> Option<&'static ReferenceLeague> {
        let wanted = normalize_name(query);
        if let Ok(id) = wanted.parse::<u64>() {
            return REFERENCE_LEAGUES.iter().find(|l| l.tournament_id == id);
        }
        REFERENCE_LEAGUES
            .iter()
            .find(|l| normalize_name(l.key) == wanted || normalize_name(l.name) == wanted)
    }

    pub fn main_leagues() -> Vec<&'static ReferenceLeague> {
        MAIN_LEAGUES.iter().filter_map(|key| Self::find(key)).collect()
    }

    /// League record (with its country) built from the table alone.
    pub fn to_record(&self) -> ExternalRecord {
        let country = ExternalRecord::new(
            None,
            Entity::Country(Country {
                name: self.country.to_string(),
                ..Country::default()
            }),
            Fidelity::Degraded,
        );

        ExternalRecord::new(
            Some(self.tournament_id.to_string()),
            Entity::League(League {
                name: self.name.to_string(),
                country: Some(self.country.to_string()),
                category: Some(self.category.to_string()),
                ..League::default()
            }),
            Fidelity::Degraded,
        )
        .with_link(Link::Country, country)
    }
}
