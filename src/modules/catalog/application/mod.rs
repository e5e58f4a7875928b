pub mod mapper;
pub mod resolver;

pub use mapper::RecordMapper;
pub use resolver::EntityResolver;
