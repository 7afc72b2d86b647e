use serde::Serialize;
use thiserror::Error;

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub provider: EmailProviderType,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub from_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmailProviderType {
    Smtp,
    SendGrid,
    Log,
    None,
}

impl EmailProviderType {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("smtp") => Self::Smtp,
            Some("sendgrid") => Self::SendGrid,
            Some("none") | Some("off") => Self::None,
            _ => Self::Log,
        }
    }
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("smtp error: {0}")]
    Smtp(String),
    #[error("refusing to send: line break in {0}")]
    HeaderInjection(&'static str),
}

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SendGridPayload<'a> {
    personalizations: Vec<SendGridPersonalization<'a>>,
    from: SendGridAddress<'a>,
    subject: &'a str,
    content: Vec<SendGridContent<'a>>,
}

#[derive(Serialize)]
struct SendGridPersonalization<'a> {
    to: Vec<SendGridAddress<'a>>,
}

#[derive(Serialize)]
struct SendGridAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SendGridContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(EmailConfig {
            provider: EmailProviderType::parse(env_string("EMAIL_PROVIDER").as_deref()),
            smtp_host: env_string("SMTP_HOST"),
            smtp_port: env_u16("SMTP_PORT").unwrap_or(587),
            smtp_user: env_string("SMTP_USER"),
            smtp_password: env_string("SMTP_PASSWORD"),
            sendgrid_api_key: env_string("SENDGRID_API_KEY"),
            from_address: env_string("EMAIL_FROM")
                .unwrap_or_else(|| "noreply@ignite.school".into()),
        })
    }

    pub fn is_available(&self) -> bool {
        match self.config.provider {
            EmailProviderType::Smtp => {
                self.config.smtp_host.is_some() && self.config.smtp_user.is_some()
            }
            EmailProviderType::SendGrid => self.config.sendgrid_api_key.is_some(),
            EmailProviderType::Log => true,
            EmailProviderType::None => false,
        }
    }

    pub fn provider_type(&self) -> &EmailProviderType {
        &self.config.provider
    }

    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        match self.config.provider {
            EmailProviderType::SendGrid => self.send_via_sendgrid(to, subject, body).await,
            EmailProviderType::Smtp => self.send_via_smtp(to, subject, body).await,
            EmailProviderType::Log => {
                tracing::info!(to = %to, subject = %subject, "email dispatched (log provider)");
                Ok(())
            }
            EmailProviderType::None => Err(EmailError::NotConfigured("EMAIL_PROVIDER")),
        }
    }

    async fn send_via_sendgrid(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let api_key = self
            .config
            .sendgrid_api_key
            .as_deref()
            .ok_or(EmailError::NotConfigured("SENDGRID_API_KEY"))?;

        let payload = SendGridPayload {
            personalizations: vec![SendGridPersonalization {
                to: vec![SendGridAddress { email: to }],
            }],
            from: SendGridAddress {
                email: &self.config.from_address,
            },
            subject,
            content: vec![SendGridContent {
                content_type: "text/plain",
                value: body,
            }],
        };

        let resp = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmailError::HttpStatus { status, body });
        }

        Ok(())
    }

    async fn send_via_smtp(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let host = self
            .config
            .smtp_host
            .clone()
            .ok_or(EmailError::NotConfigured("SMTP_HOST"))?;
        let user = self
            .config
            .smtp_user
            .clone()
            .ok_or(EmailError::NotConfigured("SMTP_USER"))?;
        let password = self
            .config
            .smtp_password
            .clone()
            .ok_or(EmailError::NotConfigured("SMTP_PASSWORD"))?;

        let envelope = SmtpEnvelope {
            host,
            port: self.config.smtp_port,
            user,
            password,
            from: self.config.from_address.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };

        tokio::task::spawn_blocking(move || send_smtp_sync(&envelope))
            .await
            .map_err(|e| EmailError::Smtp(e.to_string()))?
    }
}

struct SmtpEnvelope {
    host: String,
    port: u16,
    user: String,
    password: String,
    from: String,
    to: String,
    subject: String,
    body: String,
}

fn send_smtp_sync(envelope: &SmtpEnvelope) -> Result<(), EmailError> {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    for (field, value) in [
        ("recipient", &envelope.to),
        ("sender", &envelope.from),
        ("subject", &envelope.subject),
    ] {
        if value.contains(|c: char| c == '\r' || c == '\n') {
            return Err(EmailError::HeaderInjection(field));
        }
    }

    let addr = format!("{}:{}", envelope.host, envelope.port);
    let mut stream = TcpStream::connect(&addr).map_err(|e| EmailError::Smtp(e.to_string()))?;
    stream
        .set_read_timeout(Some(std::time::Duration::from_secs(30)))
        .ok();
    stream
        .set_write_timeout(Some(std::time::Duration::from_secs(30)))
        .ok();

    let mut buf = [0u8; 1024];

    let mut exchange = |command: Option<String>| -> Result<String, EmailError> {
        if let Some(command) = command {
            stream
                .write_all(format!("{command}\r\n").as_bytes())
                .map_err(|e| EmailError::Smtp(e.to_string()))?;
        }
        let n = stream.read(&mut buf).map_err(|e| EmailError::Smtp(e.to_string()))?;
        let reply = String::from_utf8_lossy(&buf[..n]).to_string();
        if reply.starts_with('4') || reply.starts_with('5') {
            return Err(EmailError::Smtp(reply.trim().to_string()));
        }
        Ok(reply)
    };

    let engine = &base64::engine::general_purpose::STANDARD;
    let user_b64 = base64::Engine::encode(engine, &envelope.user);
    let pass_b64 = base64::Engine::encode(engine, &envelope.password);

    exchange(None)?;
    exchange(Some(format!("EHLO {}", envelope.host)))?;
    exchange(Some("AUTH LOGIN".to_string()))?;
    exchange(Some(user_b64))?;
    exchange(Some(pass_b64))?;
    exchange(Some(format!("MAIL FROM:<{}>", envelope.from)))?;
    exchange(Some(format!("RCPT TO:<{}>", envelope.to)))?;
    exchange(Some("DATA".to_string()))?;
    exchange(Some(format!(
        "From: {}\r\nTo: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n{}\r\n.",
        envelope.from,
        envelope.to,
        envelope.subject,
        dot_stuff(&envelope.body)
    )))?;
    exchange(Some("QUIT".to_string()))?;

    Ok(())
}

/// Normalizes line endings to CRLF and doubles leading dots so the body can
/// never terminate the DATA section early.
fn dot_stuff(body: &str) -> String {
    body.replace("\r\n", "\n")
        .split('\n')
        .map(|line| {
            if line.starts_with('.') {
                format!(".{line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u16(key: &str) -> Option<u16> {
    env_string(key)?.parse().ok()
}
