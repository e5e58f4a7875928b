//! Control surface handed to an outer transport.
pub mod params;
pub mod surface;
pub mod views;

pub use params::{JobStartParams, StartRequest};
pub use surface::ControlSurface;
pub use views::{
    status_endpoint, Accepted, ErrorBody, JobStatusView, MatchDetails, PlayerLookup,
    SeasonsView, StandingsView, TeamLookup, TopScorersView,
};
