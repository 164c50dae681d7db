//! Structured notification content and delivery targets
//!
//! The relay does not render platform payloads. It enumerates what goes
//! to whom: a [`Notification`] is the structured content, a
//! [`Destination`] is a subscriber with a minimum-intensity threshold.
//! Target-specific formatting is the [`Notifier`](crate::traits::Notifier)'s job.

use serde::{Deserialize, Serialize};

/// Red used for early warning notifications
pub const COLOR_RED: u32 = 0xED4245;

/// A configured delivery target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Guild (server/workspace) identifier
    pub guild_id: String,
    /// Guild display name, for logs
    #[serde(default)]
    pub guild_name: Option<String>,
    /// Channel identifier
    pub channel_id: String,
    /// Minimum intensity scale an event must reach to be delivered here
    #[serde(default)]
    pub min_intensity: i32,
}

impl Destination {
    /// Create a destination
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>, min_intensity: i32) -> Self {
        Self {
            guild_id: guild_id.into(),
            guild_name: None,
            channel_id: channel_id.into(),
            min_intensity,
        }
    }

    /// Set the guild display name
    pub fn with_guild_name(mut self, name: impl Into<String>) -> Self {
        self.guild_name = Some(name.into());
        self
    }

    /// Whether an event with the given maximum scale is delivered here
    pub fn accepts(&self, max_scale: i32) -> bool {
        max_scale >= self.min_intensity
    }

    /// Name used in logs
    pub fn display_name(&self) -> &str {
        self.guild_name.as_deref().unwrap_or(&self.guild_id)
    }
}

/// A named field of a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    /// Field name
    pub name: String,
    /// Field value
    pub value: String,
}

impl NotificationField {
    /// Create a field
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Follow-up messages delivered as a continuation of a primary message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpThread {
    /// Thread name
    pub name: String,
    /// Follow-up messages, in delivery order
    pub messages: Vec<Notification>,
}

/// Structured notification content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Title
    pub title: String,
    /// Body lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<String>,
    /// Named fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<NotificationField>,
    /// Link associated with the title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Accent colour (RGB)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// RFC 3339 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Threaded follow-ups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<FollowUpThread>,
}

impl Notification {
    /// Create a notification with a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Append a body line
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    /// Append a field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(NotificationField::new(name, value));
        self
    }

    /// Number of messages this notification expands to, follow-ups included
    pub fn message_count(&self) -> usize {
        1 + self.thread.as_ref().map_or(0, |t| t.messages.len())
    }
}

/// Acknowledgement of a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Channel the notification was delivered to
    pub channel_id: String,
    /// Identifier of the primary message, if the notifier reports one
    pub message_id: Option<String>,
    /// Number of messages delivered, follow-ups included
    pub messages_sent: usize,
}
