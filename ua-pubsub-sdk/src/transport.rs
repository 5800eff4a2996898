use crate::config::ConnectionConfig;
use async_trait::async_trait;
use std::sync::Arc;
use ua_pubsub_error::PubSubResult;

/// Transport profile for MQTT carrying UADP-encoded messages.
pub const PROFILE_MQTT_UADP: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-mqtt-uadp";
/// Transport profile for MQTT carrying JSON-encoded messages.
pub const PROFILE_MQTT_JSON: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-mqtt-json";
/// Transport profile for UDP multicast carrying UADP-encoded messages.
pub const PROFILE_UDP_UADP: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-udp-uadp";

/// Whether a transport profile belongs to the MQTT family.
///
/// MQTT-family channels get the host's publish-received callback wired in
/// right after channel creation.
#[inline]
pub fn is_mqtt_profile(transport_profile_uri: &str) -> bool {
    transport_profile_uri.contains("/Transport/pubsub-mqtt")
}

/// Invoked by MQTT-family channels when a PUBLISH arrives on a subscribed
/// topic: `(topic, payload)`.
pub type PublishReceivedCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// An opened communication channel owned by a Connection.
#[async_trait]
pub trait PubSubChannel: Send + Sync {
    /// Register the channel for receiving, optionally with reader-group
    /// transport settings (e.g. topic filters). Called at most once per
    /// connection; the manager latches the registered flag on any outcome.
    async fn register(
        &mut self,
        transport_settings: Option<&serde_json::Value>,
    ) -> PubSubResult<()>;

    /// Store the callback to invoke on received PUBLISH messages.
    ///
    /// Only meaningful for MQTT-family channels; the default implementation
    /// ignores the callback.
    fn set_publish_received_callback(&mut self, _callback: PublishReceivedCallback) {}
}

/// A transport plugin matched by transport-profile URI.
#[async_trait]
pub trait TransportLayer: Send + Sync {
    /// The exact profile URI this layer serves.
    fn transport_profile_uri(&self) -> &str;

    /// Open a communication channel for the given connection configuration.
    async fn create_channel(
        &self,
        config: &ConnectionConfig,
    ) -> PubSubResult<Box<dyn PubSubChannel>>;
}
