//! Message-bus protocol between the privileged context and the runtime.
//!
//! | Message          | Direction            | Payload              |
//! |------------------|----------------------|----------------------|
//! | `Bootstrap`      | privileged → runtime | [`BootstrapPayload`] |
//! | `SettingChanged` | privileged → runtime | [`SettingChange`]    |
//! | `ToolkitLoaded`  | runtime → privileged | none                 |

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::feature::FeatureSetting;
use crate::state::BootstrapPayload;
use crate::{Result, ToolkitError};

pub const TOOLKIT_LOADED_MESSAGE: &str = "toolkit-loaded";
pub const TOOLKIT_BOOTSTRAP_MESSAGE: &str = "toolkit-bootstrap";
pub const TOOLKIT_SETTING_CHANGED_MESSAGE: &str = "toolkit-setting-changed";

/// A changed setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingChange {
    pub name: String,
    pub value: FeatureSetting,
}

/// Messages the runtime receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "toolkit-bootstrap")]
    Bootstrap { toolkit: BootstrapPayload },

    #[serde(rename = "toolkit-setting-changed")]
    SettingChanged { setting: SettingChange },
}

impl InboundMessage {
    pub fn setting_changed(name: impl Into<String>, value: impl Into<FeatureSetting>) -> Self {
        Self::SettingChanged {
            setting: SettingChange {
                name: name.into(),
                value: value.into(),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bootstrap { .. } => TOOLKIT_BOOTSTRAP_MESSAGE,
            Self::SettingChanged { .. } => TOOLKIT_SETTING_CHANGED_MESSAGE,
        }
    }
}

/// Messages the runtime sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "toolkit-loaded")]
    ToolkitLoaded,
}

/// Window context a message was posted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    /// The window the runtime lives in
    SameWindow,
    /// Any other frame or window, identified by origin
    Foreign(String),
}

/// An inbound message with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub source: MessageSource,
    pub message: InboundMessage,
}

impl Envelope {
    pub fn same_window(message: InboundMessage) -> Self {
        Self {
            source: MessageSource::SameWindow,
            message,
        }
    }

    pub fn is_same_window(&self) -> bool {
        self.source == MessageSource::SameWindow
    }
}

/// Sending half of the inbound channel.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl MessageSender {
    /// Post a message from the runtime's own window.
    pub fn send(&self, message: InboundMessage) -> Result<()> {
        self.send_envelope(Envelope::same_window(message))
    }

    /// Post a message with an explicit source.
    pub fn send_envelope(&self, envelope: Envelope) -> Result<()> {
        self.tx
            .send(envelope)
            .map_err(|_| ToolkitError::ChannelClosed)
    }

    /// Parse a raw JSON message and post it.
    pub fn send_json(&self, source: MessageSource, json: &str) -> Result<()> {
        let message: InboundMessage = serde_json::from_str(json)?;
        self.send_envelope(Envelope { source, message })
    }
}

/// Receiving half of the inbound channel.
pub type MessageReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Create the inbound message channel.
pub fn message_channel() -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MessageSender { tx }, rx)
}
