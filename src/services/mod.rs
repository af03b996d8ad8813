pub mod billing;
pub mod pricing;
pub mod smtp_mailer;
