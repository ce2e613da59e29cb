// Settlement: committed pledges -> payment intents at the clearing price
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::campaign::models::Campaign;
use crate::error::AppResult;
use crate::payment::models::PaymentIntent;
use crate::payment::repository::PaymentIntentRepository;
use crate::pledge::models::PledgeStatus;
use crate::pledge::repository::PledgeRepository;
use crate::pricing;

/// Converts a locked campaign's committed pledges into payment
/// obligations, all priced at the single final-tier unit price.
///
/// Invoked exactly once per campaign - the phase compare-and-set decides
/// the winner. The one-intent-per-pledge storage constraint makes any
/// re-generation fail loudly instead of double charging.
pub struct SettlementGenerator {
    pledges: Arc<dyn PledgeRepository>,
    intents: Arc<dyn PaymentIntentRepository>,
}

impl SettlementGenerator {
    pub fn new(
        pledges: Arc<dyn PledgeRepository>,
        intents: Arc<dyn PaymentIntentRepository>,
    ) -> Self {
        Self { pledges, intents }
    }

    pub async fn generate(&self, campaign: &Campaign) -> AppResult<Vec<PaymentIntent>> {
        let committed = self
            .pledges
            .find_by_campaign_in_status(campaign.id, PledgeStatus::Committed)
            .await?;

        if committed.is_empty() {
            info!(campaign_id = %campaign.id, "no committed pledges, nothing to settle");
            return Ok(Vec::new());
        }

        let total: i64 = committed.iter().map(|p| p.quantity).sum();
        let resolution = pricing::resolve(&campaign.brackets, total)?;
        let unit_price = resolution.current.unit_price;

        let mut intents = Vec::with_capacity(committed.len());
        for pledge in &committed {
            let intent = PaymentIntent::new(
                campaign.id,
                pledge.id,
                pledge.buyer_org_id,
                unit_price * Decimal::from(pledge.quantity),
            );
            self.intents.insert(&intent).await?;
            intents.push(intent);
        }

        info!(
            campaign_id = %campaign.id,
            total_quantity = total,
            %unit_price,
            intents = intents.len(),
            "settlement generated"
        );
        Ok(intents)
    }
}
