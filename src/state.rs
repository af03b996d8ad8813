use crate::db::plan_change_repository::PlanChangeRepository;
use crate::services::billing::PaymentEventProcessor;
use crate::services::pricing::RecommendationGateway;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn PlanChangeRepository>,
    pub processor: Arc<PaymentEventProcessor>,
    pub pricing: Arc<RecommendationGateway>,
}
