pub mod gateway;

pub use gateway::FetchGateway;
