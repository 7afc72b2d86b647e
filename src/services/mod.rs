pub mod accounts;
pub mod content;
pub mod email_provider;
pub mod inactivity;
pub mod notifier;
pub mod scores;
pub mod sms_provider;
