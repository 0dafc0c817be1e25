use std::sync::Arc;

use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::configuration::media_engine::MediaEngine;
use crate::peer_connection::configuration::setting_engine::SettingEngine;
use crate::peer_connection::sdp::{DefaultSdpCodec, SdpCodec};
use crate::peer_connection::transport::TransportFactory;
use crate::peer_connection::transport::loopback::LoopbackTransportFactory;
use shared::error::Result;

/// API bundles the process-wide settings shared by every peer connection it
/// creates: the setting engine, the media engine, the transport factory and
/// the description codec.
pub struct API {
    pub(crate) setting_engine: Arc<SettingEngine>,
    pub(crate) media_engine: Arc<MediaEngine>,
    pub(crate) transport_factory: Arc<dyn TransportFactory>,
    pub(crate) sdp_codec: Arc<dyn SdpCodec>,
}

impl API {
    /// new_peer_connection creates a new PeerConnection with the provided configuration against the received API object
    pub async fn new_peer_connection(
        &self,
        configuration: RTCConfiguration,
    ) -> Result<RTCPeerConnection> {
        RTCPeerConnection::new(self, configuration).await
    }

    pub fn setting_engine(&self) -> &SettingEngine {
        &self.setting_engine
    }

    pub fn media_engine(&self) -> &MediaEngine {
        &self.media_engine
    }
}

#[derive(Default)]
pub struct APIBuilder {
    setting_engine: Option<Arc<SettingEngine>>,
    media_engine: Option<Arc<MediaEngine>>,
    transport_factory: Option<Arc<dyn TransportFactory>>,
    sdp_codec: Option<Arc<dyn SdpCodec>>,
}

impl APIBuilder {
    pub fn new() -> Self {
        APIBuilder::default()
    }

    /// Builds the API. A media engine that was not provided gets the
    /// default codecs registered.
    pub fn build(self) -> Result<API> {
        let media_engine = match self.media_engine {
            Some(media_engine) => media_engine,
            None => {
                let mut media_engine = MediaEngine::default();
                media_engine.register_default_codecs()?;
                Arc::new(media_engine)
            }
        };

        Ok(API {
            setting_engine: self
                .setting_engine
                .unwrap_or_else(|| Arc::new(SettingEngine::default())),
            media_engine,
            transport_factory: self
                .transport_factory
                .unwrap_or_else(|| Arc::new(LoopbackTransportFactory)),
            sdp_codec: self.sdp_codec.unwrap_or_else(|| Arc::new(DefaultSdpCodec)),
        })
    }

    /// WithSettingEngine allows providing a SettingEngine to the API.
    /// Settings should not be changed after passing the engine to an API.
    pub fn with_setting_engine(mut self, setting_engine: SettingEngine) -> Self {
        self.setting_engine = Some(Arc::new(setting_engine));
        self
    }

    /// WithMediaEngine allows providing a MediaEngine to the API.
    /// Settings can be changed after passing the engine to an API.
    pub fn with_media_engine(mut self, media_engine: MediaEngine) -> Self {
        self.media_engine = Some(Arc::new(media_engine));
        self
    }

    /// Replaces the in-process loopback transports.
    pub fn with_transport_factory(mut self, transport_factory: Arc<dyn TransportFactory>) -> Self {
        self.transport_factory = Some(transport_factory);
        self
    }

    pub fn with_sdp_codec(mut self, sdp_codec: Arc<dyn SdpCodec>) -> Self {
        self.sdp_codec = Some(sdp_codec);
        self
    }
}
