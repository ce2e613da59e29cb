use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

use crate::campaign::models::CampaignPhase;
use crate::payment::models::PaymentIntentStatus;
use crate::pledge::models::PledgeStatus;

/// Top-level error type for the entire engine
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Campaign error: {0}")]
    Campaign(#[from] CampaignError),

    #[error("Bracket configuration error: {0}")]
    Bracket(#[from] BracketError),

    #[error("Pledge error: {0}")]
    Pledge(#[from] PledgeError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External error: {0}")]
    External(String),
}

/// Campaign phase state machine errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Operation {operation} is not valid while the campaign is {phase:?}")]
    PhaseViolation {
        phase: CampaignPhase,
        operation: &'static str,
    },

    #[error("Invalid campaign transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: CampaignPhase,
        to: CampaignPhase,
    },

    #[error("Organization {0} does not own this campaign")]
    AccessDenied(Uuid),

    #[error("Campaign end date must be in the future")]
    EndDateInPast,
}

/// Discount bracket configuration errors
#[derive(Error, Debug)]
pub enum BracketError {
    #[error("Campaign has no discount brackets")]
    Empty,

    #[error("Quantity {quantity} is below the first bracket minimum {min}")]
    BelowFirstTier { quantity: i64, min: i64 },

    #[error("Bracket at position {position} must start at {expected}, found {found}")]
    NonContiguous {
        position: i32,
        expected: i64,
        found: i64,
    },

    #[error("Bracket at position {position} has an empty quantity range")]
    EmptyRange { position: i32 },

    #[error("Only the final bracket may be unbounded (position {position})")]
    UnboundedInterior { position: i32 },

    #[error("The final bracket must have no upper bound")]
    BoundedFinalTier,

    #[error("Bracket at position {position} must have a positive unit price")]
    NonPositivePrice { position: i32 },

    #[error("No bracket covers quantity {0}")]
    UncoveredQuantity(i64),
}

/// Pledge ledger errors
#[derive(Error, Debug)]
pub enum PledgeError {
    #[error("An active pledge already exists for this campaign and buyer")]
    DuplicateCommitment,

    #[error("Organization {0} does not own this pledge")]
    AccessDenied(Uuid),

    #[error("Organization {0} is not active")]
    OrganizationNotActive(Uuid),

    #[error("Pledge is {status:?}, expected {expected:?}")]
    InvalidStatus {
        status: PledgeStatus,
        expected: PledgeStatus,
    },
}

/// Payment intent state machine errors
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid payment transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: PaymentIntentStatus,
        to: PaymentIntentStatus,
    },

    #[error("Intent {intent} has exhausted its {max} retries")]
    RetryLimitExceeded { intent: Uuid, max: i32 },

    #[error("Intent {intent} is not retryable from {status:?}")]
    NotRetryable {
        intent: Uuid,
        status: PaymentIntentStatus,
    },

    #[error("Pledge {0} already has a payment intent")]
    DuplicateIntent(Uuid),
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::InvalidInput(format!("Decimal conversion error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
