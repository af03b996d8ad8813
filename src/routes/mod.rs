pub mod admin;
pub mod billing;
pub mod pricing;
