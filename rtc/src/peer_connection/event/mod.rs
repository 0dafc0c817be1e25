//! Callback types and their dispatch.
//!
//! Every callback slot owns an unbounded queue drained by one task. Events are
//! queued in the order they happen and the callback runs on the slot's task,
//! never while the connection's negotiation lock is held. A slow callback
//! only delays later invocations of the same callback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

pub mod track_event;

pub use track_event::RTCTrackEvent;

use crate::data_channel::RTCDataChannel;
use crate::peer_connection::state::{
    RTCIceConnectionState, RTCIceGatheringState, RTCPeerConnectionState, RTCSignalingState,
};
use crate::peer_connection::transport::ice::candidate::RTCIceCandidate;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub type OnSignalingStateChangeHdlrFn =
    Box<dyn (FnMut(RTCSignalingState) -> HandlerFuture) + Send + Sync>;

/// `None` marks the end of gathering.
pub type OnIceCandidateHdlrFn =
    Box<dyn (FnMut(Option<RTCIceCandidate>) -> HandlerFuture) + Send + Sync>;

pub type OnIceGatheringStateChangeHdlrFn =
    Box<dyn (FnMut(RTCIceGatheringState) -> HandlerFuture) + Send + Sync>;

pub type OnICEConnectionStateChangeHdlrFn =
    Box<dyn (FnMut(RTCIceConnectionState) -> HandlerFuture) + Send + Sync>;

pub type OnPeerConnectionStateChangeHdlrFn =
    Box<dyn (FnMut(RTCPeerConnectionState) -> HandlerFuture) + Send + Sync>;

pub type OnDataChannelHdlrFn = Box<dyn (FnMut(RTCDataChannel) -> HandlerFuture) + Send + Sync>;

pub type OnTrackHdlrFn = Box<dyn (FnMut(RTCTrackEvent) -> HandlerFuture) + Send + Sync>;

type Slot<T> = Arc<Mutex<Option<Box<dyn (FnMut(T) -> HandlerFuture) + Send + Sync>>>>;

/// One callback slot and the queue feeding it.
pub(crate) struct EventHandler<T> {
    slot: Slot<T>,
    queue: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> EventHandler<T> {
    /// Must be called from within a tokio runtime.
    pub(crate) fn new() -> Self {
        let slot: Slot<T> = Arc::new(Mutex::new(None));
        let (queue, mut events) = mpsc::unbounded_channel::<T>();

        let handler = Arc::clone(&slot);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let f = {
                    let mut handler = handler.lock().await;
                    handler.as_mut().map(|f| f(event))
                };
                if let Some(f) = f {
                    f.await;
                }
            }
        });

        EventHandler { slot, queue }
    }

    /// Replaces the callback. Events already queued run with whichever
    /// callback is installed when they are dequeued.
    pub(crate) async fn set(&self, f: Box<dyn (FnMut(T) -> HandlerFuture) + Send + Sync>) {
        *self.slot.lock().await = Some(f);
    }

    pub(crate) fn emit(&self, event: T) {
        let _ = self.queue.send(event);
    }
}

pub(crate) struct PeerConnectionEventHandlers {
    pub(crate) on_signaling_state_change: EventHandler<RTCSignalingState>,
    pub(crate) on_ice_candidate: EventHandler<Option<RTCIceCandidate>>,
    pub(crate) on_ice_gathering_state_change: EventHandler<RTCIceGatheringState>,
    pub(crate) on_ice_connection_state_change: EventHandler<RTCIceConnectionState>,
    pub(crate) on_peer_connection_state_change: EventHandler<RTCPeerConnectionState>,
    pub(crate) on_data_channel: EventHandler<RTCDataChannel>,
    pub(crate) on_track: EventHandler<RTCTrackEvent>,
}

impl PeerConnectionEventHandlers {
    pub(crate) fn new() -> Self {
        PeerConnectionEventHandlers {
            on_signaling_state_change: EventHandler::new(),
            on_ice_candidate: EventHandler::new(),
            on_ice_gathering_state_change: EventHandler::new(),
            on_ice_connection_state_change: EventHandler::new(),
            on_peer_connection_state_change: EventHandler::new(),
            on_data_channel: EventHandler::new(),
            on_track: EventHandler::new(),
        }
    }
}
