use crate::modules::provider::domain::{Host, Resource};
use crate::shared::config::AppConfig;

/// Base URLs of the upstream hosts.
#[derive(Debug, Clone)]
pub struct Endpoints {
    api_base: String,
    web_base: String,
    image_base: String,
}

impl Endpoints {
    pub fn new(
        api_base: impl Into<String>,
        web_base: impl Into<String>,
        image_base: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            web_base: web_base.into().trim_end_matches('/').to_string(),
            image_base: image_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.api_base_url,
            &config.web_base_url,
            &config.image_base_url,
        )
    }

    pub fn api_url(&self, resource: &Resource) -> String {
        let (host, path) = resource.api_path();
        match host {
            Host::Api => format!("{}{}", self.api_base, path),
            Host::Web => format!("{}{}", self.web_base, path),
        }
    }

    pub fn page_url(&self, resource: &Resource) -> Option<String> {
        resource
            .page_path()
            .map(|path| format!("{}{}", self.web_base, path))
    }

    pub fn player_image(&self, player_id: u64) -> String {
        format!("{}/player/{}/image", self.image_base, player_id)
    }

    pub fn team_image(&self, team_id: u64) -> String {
        format!("{}/team/{}/image", self.image_base, team_id)
    }

    pub fn tournament_image(&self, tournament_id: u64) -> String {
        format!("{}/unique-tournament/{}/image", self.image_base, tournament_id)
    }

    pub fn event_page(&self, event_id: u64) -> String {
        format!("{}/event/{}", self.web_base, event_id)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_and_web_hosts() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.api_url(&Resource::Team(2829)),
            "https://api.sofascore.com/api/v1/team/2829"
        );
        assert_eq!(
            endpoints.page_url(&Resource::TeamPlayers(2829)).as_deref(),
            Some("https://www.sofascore.com/team/football/2829")
        );
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let endpoints = Endpoints::new("http://api/", "http://web/", "http://img/");
        assert_eq!(endpoints.player_image(5), "http://img/player/5/image");
        assert_eq!(endpoints.api_url(&Resource::Player(5)), "http://api/player/5");
    }
}
