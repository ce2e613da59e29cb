pub mod models;
pub mod repository;
pub mod service;

pub use models::{Campaign, CampaignPhase, DiscountBracket};
pub use repository::CampaignRepository;
pub use service::{CampaignDraft, CampaignService, CampaignUpdate, PhaseAdvanceReport};
