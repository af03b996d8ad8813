pub mod memory_plan_change_repository;
pub mod memory_recommendation_log_repository;
pub mod plan_change_repository;
pub mod postgres_plan_change_repository;
pub mod postgres_recommendation_log_repository;
pub mod recommendation_log_repository;
