//! Outbound delivery seam: one trait for the two send capabilities the
//! dispatcher needs, plus the production implementation speaking to the
//! Discord webhook and the Twilio Messages API.

use async_trait::async_trait;
use gamewatch_db::Channel;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("webhook returned status {0}")]
    WebhookStatus(u16),

    #[error("messaging provider returned status {0}")]
    ProviderStatus(u16),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Best-effort send capabilities. Every method is a single attempt; retry
/// policy belongs to the caller (and the dispatcher deliberately has none).
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Post one message to the group chat webhook.
    async fn send_chat(&self, text: &str) -> Result<(), OutboundError>;

    /// Send one direct message to a phone subscriber over the given channel.
    async fn send_direct(
        &self,
        phone: &str,
        channel: Channel,
        text: &str,
    ) -> Result<(), OutboundError>;
}

/// Production delivery over HTTP.
pub struct HttpOutbound {
    client: reqwest::Client,
    webhook_url: String,
    twilio_account_sid: String,
    twilio_auth_token: String,
    twilio_from_number: String,
}

impl HttpOutbound {
    pub fn new(
        webhook_url: String,
        twilio_account_sid: String,
        twilio_auth_token: String,
        twilio_from_number: String,
        timeout: std::time::Duration,
    ) -> Result<Self, OutboundError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url,
            twilio_account_sid,
            twilio_auth_token,
            twilio_from_number,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.twilio_account_sid
        )
    }
}

#[async_trait]
impl Outbound for HttpOutbound {
    async fn send_chat(&self, text: &str) -> Result<(), OutboundError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await?;

        // Discord answers 204 on success.
        if !response.status().is_success() {
            return Err(OutboundError::WebhookStatus(response.status().as_u16()));
        }

        debug!("sent webhook message");
        Ok(())
    }

    async fn send_direct(
        &self,
        phone: &str,
        channel: Channel,
        text: &str,
    ) -> Result<(), OutboundError> {
        let (to, from) = match channel {
            Channel::Sms => (phone.to_string(), self.twilio_from_number.clone()),
            Channel::Whatsapp => (
                with_whatsapp_prefix(phone),
                with_whatsapp_prefix(&self.twilio_from_number),
            ),
        };

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.twilio_account_sid, Some(&self.twilio_auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", text)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OutboundError::ProviderStatus(response.status().as_u16()));
        }

        debug!(%channel, "sent direct message");
        Ok(())
    }
}

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Ensure a number carries the `whatsapp:` prefix the provider expects.
pub fn with_whatsapp_prefix(number: &str) -> String {
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{number}")
    }
}

/// Strip the `whatsapp:` prefix from an inbound sender number, if present.
pub fn strip_whatsapp_prefix(number: &str) -> &str {
    number.strip_prefix(WHATSAPP_PREFIX).unwrap_or(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whatsapp_prefix_added_once() {
        assert_eq!(with_whatsapp_prefix("+15551230001"), "whatsapp:+15551230001");
        assert_eq!(
            with_whatsapp_prefix("whatsapp:+15551230001"),
            "whatsapp:+15551230001"
        );
    }

    #[test]
    fn test_whatsapp_prefix_stripped() {
        assert_eq!(strip_whatsapp_prefix("whatsapp:+15551230001"), "+15551230001");
        assert_eq!(strip_whatsapp_prefix("+15551230001"), "+15551230001");
    }
}
