use thiserror::Error;

use crate::services::email_provider::env_string;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01/Accounts";

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub provider: SmsProviderType,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub from_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SmsProviderType {
    Twilio,
    Log,
    None,
}

impl SmsProviderType {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("twilio") => Self::Twilio,
            Some("none") | Some("off") => Self::None,
            _ => Self::Log,
        }
    }
}

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("sms not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Clone)]
pub struct SmsService {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsService {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(SmsConfig {
            provider: SmsProviderType::parse(env_string("SMS_PROVIDER").as_deref()),
            twilio_account_sid: env_string("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: env_string("TWILIO_AUTH_TOKEN"),
            from_number: env_string("TWILIO_FROM_NUMBER"),
        })
    }

    pub fn is_available(&self) -> bool {
        match self.config.provider {
            SmsProviderType::Twilio => {
                self.config.twilio_account_sid.is_some()
                    && self.config.twilio_auth_token.is_some()
                    && self.config.from_number.is_some()
            }
            SmsProviderType::Log => true,
            SmsProviderType::None => false,
        }
    }

    pub async fn send_sms(&self, to: &str, body: &str) -> Result<(), SmsError> {
        match self.config.provider {
            SmsProviderType::Twilio => self.send_via_twilio(to, body).await,
            SmsProviderType::Log => {
                tracing::info!(to = %to, chars = body.chars().count(), "sms dispatched (log provider)");
                Ok(())
            }
            SmsProviderType::None => Err(SmsError::NotConfigured("SMS_PROVIDER")),
        }
    }

    async fn send_via_twilio(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let sid = self
            .config
            .twilio_account_sid
            .as_deref()
            .ok_or(SmsError::NotConfigured("TWILIO_ACCOUNT_SID"))?;
        let token = self
            .config
            .twilio_auth_token
            .as_deref()
            .ok_or(SmsError::NotConfigured("TWILIO_AUTH_TOKEN"))?;
        let from = self
            .config
            .from_number
            .as_deref()
            .ok_or(SmsError::NotConfigured("TWILIO_FROM_NUMBER"))?;

        let resp = self
            .client
            .post(format!("{TWILIO_API_BASE}/{sid}/Messages.json"))
            .basic_auth(sid, Some(token))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SmsError::HttpStatus { status, body });
        }

        Ok(())
    }
}
