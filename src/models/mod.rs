pub mod payment_event;
pub mod plan;
pub mod plan_change;
pub mod recommendation;
