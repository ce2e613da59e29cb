pub mod models;
pub mod repository;
pub mod service;

pub use models::{Pledge, PledgeStatus};
pub use repository::PledgeRepository;
pub use service::PledgeService;
