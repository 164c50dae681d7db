// # Webhook Notifier
//
// This crate delivers notifications by POSTing them as JSON to an HTTP
// endpoint, one request per destination.
//
// ## Request
//
// ```http
// POST <url_template with {channel_id} replaced>
// Authorization: Bearer <token>        (when configured)
// Content-Type: application/json
//
// {
//   "guild_id": "...",
//   "channel_id": "...",
//   "notification": { "title": "地震情報", "body": [...], "thread": {...} }
// }
// ```
//
// The receiving service renders the notification for its chat platform,
// follow-up thread included.
//
// ## Scope
//
// - Makes exactly one HTTP request per `deliver()` call
// - NO retry logic: a failed delivery is logged by the aggregator and skipped
//
// ## Security Requirements
//
// - The bearer token NEVER appears in logs or Debug output

use async_trait::async_trait;
use quake_core::config::NotifierConfig;
use quake_core::traits::{Notifier, NotifierFactory};
use quake_core::{DeliveryReceipt, Destination, Error, Notification, PluginRegistry, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder replaced by the destination's channel id
const CHANNEL_PLACEHOLDER: &str = "{channel_id}";

/// Default HTTP timeout for webhook requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of a webhook request
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    guild_id: &'a str,
    channel_id: &'a str,
    notification: &'a Notification,
}

/// Optional body of a successful webhook response
#[derive(Debug, Default, Deserialize)]
struct WebhookAck {
    #[serde(default)]
    message_id: Option<String>,
}

/// Webhook notifier
pub struct WebhookNotifier {
    url_template: String,

    /// Bearer token
    /// ⚠️ NEVER log this value
    bearer_token: Option<String>,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the bearer token
impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url_template", &self.url_template)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl WebhookNotifier {
    /// Create a webhook notifier
    ///
    /// # Parameters
    ///
    /// - `url_template`: Endpoint URL; `{channel_id}` is replaced per destination
    /// - `bearer_token`: Optional token sent as `Authorization: Bearer`
    pub fn new(url_template: impl Into<String>, bearer_token: Option<String>) -> Result<Self> {
        let url_template = url_template.into();
        if url_template.is_empty() {
            return Err(Error::config("Webhook URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url_template,
            bearer_token: bearer_token.filter(|t| !t.is_empty()),
            client,
        })
    }

    /// Endpoint for one destination
    fn url_for(&self, destination: &Destination) -> String {
        self.url_template
            .replace(CHANNEL_PLACEHOLDER, &destination.channel_id)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(
        &self,
        destination: &Destination,
        notification: &Notification,
    ) -> Result<DeliveryReceipt> {
        let payload = WebhookPayload {
            guild_id: &destination.guild_id,
            channel_id: &destination.channel_id,
            notification,
        };

        let mut request = self.client.post(self.url_for(destination)).json(&payload);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::notifier("webhook", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                401 | 403 => Error::notifier(
                    "webhook",
                    format!("Authentication failed: invalid or missing token. Status: {}", status),
                ),
                404 => Error::destination(format!(
                    "Channel {} not found by webhook endpoint",
                    destination.channel_id
                )),
                429 => Error::notifier(
                    "webhook",
                    format!("Rate limit exceeded. Status: {}", status),
                ),
                _ => Error::notifier("webhook", format!("{} - {}", status, error_text)),
            });
        }

        // An empty or non-JSON success body is still a delivery
        let ack = response.json::<WebhookAck>().await.unwrap_or_default();
        tracing::debug!(
            "Webhook accepted notification for channel {}",
            destination.channel_id
        );

        Ok(DeliveryReceipt {
            channel_id: destination.channel_id.clone(),
            message_id: ack.message_id,
            messages_sent: notification.message_count(),
        })
    }

    fn notifier_name(&self) -> &'static str {
        "webhook"
    }
}

/// Factory for creating webhook notifiers
pub struct WebhookNotifierFactory;

impl NotifierFactory for WebhookNotifierFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        match config {
            NotifierConfig::Webhook {
                url_template,
                bearer_token,
            } => Ok(Box::new(WebhookNotifier::new(
                url_template.clone(),
                bearer_token.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for webhook notifier")),
        }
    }
}

/// Register the webhook notifier with a registry
///
/// # Example
///
/// ```rust
/// use quake_core::PluginRegistry;
///
/// let registry = PluginRegistry::new();
/// quake_notify_webhook::register(&registry);
/// assert!(registry.has_notifier("webhook"));
/// ```
pub fn register(registry: &PluginRegistry) {
    registry.register_notifier("webhook", Box::new(WebhookNotifierFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one request, answer with `status_line` and return the raw request
    async fn serve_once(listener: TcpListener, status_line: &'static str, body: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }

        let response = format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8(request).unwrap()
    }

    #[test]
    fn test_factory_creation() {
        let config = NotifierConfig::Webhook {
            url_template: "https://relay.example/channels/{channel_id}".to_string(),
            bearer_token: Some("token".to_string()),
        };
        assert!(WebhookNotifierFactory.create(&config).is_ok());
        assert!(WebhookNotifierFactory.create(&NotifierConfig::Log).is_err());
    }

    #[test]
    fn test_url_template_substitution() {
        let notifier =
            WebhookNotifier::new("https://relay.example/channels/{channel_id}/messages", None).unwrap();
        let destination = Destination::new("g1", "123456", 30);
        assert_eq!(
            notifier.url_for(&destination),
            "https://relay.example/channels/123456/messages"
        );
    }

    #[test]
    fn test_bearer_token_not_exposed_in_debug() {
        let notifier =
            WebhookNotifier::new("https://relay.example", Some("secret_token_12345".to_string())).unwrap();
        let debug_str = format!("{:?}", notifier);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("WebhookNotifier"));
    }

    #[tokio::test]
    async fn test_deliver_posts_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 200 OK", r#"{"message_id":"m-1"}"#));

        let notifier = WebhookNotifier::new(
            format!("http://{}/channels/{{channel_id}}", addr),
            Some("tok".to_string()),
        )
        .unwrap();
        let notification = Notification::new("地震情報").line("テスト");
        let receipt = notifier
            .deliver(&Destination::new("g1", "c1", 10), &notification)
            .await
            .unwrap();

        assert_eq!(receipt.channel_id, "c1");
        assert_eq!(receipt.message_id.as_deref(), Some("m-1"));
        assert_eq!(receipt.messages_sent, 1);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /channels/c1 "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok"));

        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["guild_id"], "g1");
        assert_eq!(json["channel_id"], "c1");
        assert_eq!(json["notification"]["title"], "地震情報");
    }

    #[tokio::test]
    async fn test_not_found_is_destination_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 404 Not Found", "{}"));

        let notifier = WebhookNotifier::new(format!("http://{}/{{channel_id}}", addr), None).unwrap();
        let result = notifier
            .deliver(&Destination::new("g1", "gone", 10), &Notification::new("地震情報"))
            .await;

        assert!(matches!(result, Err(Error::Destination(_))));
        server.await.unwrap();
    }
}
