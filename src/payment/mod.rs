pub mod models;
pub mod reconcile;
pub mod repository;
pub mod service;

pub use models::{PaymentIntent, PaymentIntentStatus, MAX_RETRIES};
pub use reconcile::{ReconciliationReport, RetryReconciliationJob};
pub use repository::PaymentIntentRepository;
pub use service::{ArDisposition, PaymentService};
