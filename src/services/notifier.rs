use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::services::email_provider::{EmailError, EmailService};
use crate::services::sms_provider::{SmsError, SmsService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Sms(#[from] SmsError),
    #[error("{0}")]
    Rejected(String),
}

/// Outbound guardian messaging. Delivery is not confirmed beyond the provider
/// accepting the request.
#[async_trait]
pub trait GuardianNotifier: Send + Sync {
    async fn send(
        &self,
        channel: Channel,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError>;
}

#[derive(Clone)]
pub struct DispatchService {
    email: EmailService,
    sms: SmsService,
}

impl DispatchService {
    pub fn new(email: EmailService, sms: SmsService) -> Self {
        Self { email, sms }
    }

    pub fn from_env() -> Self {
        let service = Self::new(EmailService::from_env(), SmsService::from_env());
        tracing::info!(
            email_provider = ?service.email.provider_type(),
            email_available = service.email.is_available(),
            sms_available = service.sms.is_available(),
            "guardian notification channels configured"
        );
        service
    }
}

#[async_trait]
impl GuardianNotifier for DispatchService {
    async fn send(
        &self,
        channel: Channel,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        match channel {
            Channel::Email => self.email.send_email(address, subject, body).await?,
            Channel::Sms => self.sms.send_sms(address, body).await?,
        }
        Ok(())
    }
}
