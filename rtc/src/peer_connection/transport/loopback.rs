//! In-process transports bound to `127.0.0.1`.
//!
//! Every layer speaks a minimal record format over one UDP socket per
//! connection, demultiplexed by first byte the way RFC 7983 does it:
//!
//! * connectivity checks and keepalives start with a byte in the STUN range
//!   (`0..=3`) and carry the remote username fragment;
//! * handshake records start with 22 and carry the sender's DER certificate,
//!   which the receiver checks against the fingerprints from the remote
//!   description;
//! * application records start with 23. The message transport puts one JSON
//!   encoded channel announcement in each.
//!
//! No cryptography is performed. Timeouts are taken from the
//! [`SettingEngine`].

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::dtls::fingerprint::validate_fingerprint;
use super::dtls::role::RTCDtlsRole;
use super::dtls::state::RTCDtlsTransportState;
use super::dtls::{DTLSParameters, DtlsTransport, MatchFunc};
use super::ice::candidate::{RTCIceCandidate, RTCIceProtocol};
use super::ice::server::RTCIceServer;
use super::ice::{IceAgent, RTCIceParameters, RTCIceRole};
use super::sctp::SctpTransport;
use super::{TransportBundle, TransportEvent, TransportEventSender, TransportFactory};
use crate::data_channel::parameters::DataChannelParameters;
use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::configuration::ice_transport_policy::RTCIceTransportPolicy;
use crate::peer_connection::configuration::setting_engine::SettingEngine;
use crate::peer_connection::state::RTCIceConnectionState;
use shared::error::{Error, Result};
use shared::util::{match_dtls, match_stun, math_rand_alpha, math_rand_alpha_number};

const RECEIVE_MTU: usize = 1460;
const INBOUND_CAPACITY: usize = 1024;
const CHECK_INTERVAL: Duration = Duration::from_millis(50);
const MIN_MONITOR_INTERVAL: Duration = Duration::from_millis(10);

const UFRAG_LEN: usize = 16;
const PWD_LEN: usize = 32;

const BINDING_REQUEST: u8 = 0;
const BINDING_RESPONSE: u8 = 1;
const KEEPALIVE: u8 = 2;

const CONTENT_HANDSHAKE: u8 = 22;
const CONTENT_APPLICATION_DATA: u8 = 23;
const HANDSHAKE_CLIENT_HELLO: u8 = 1;
const HANDSHAKE_SERVER_HELLO: u8 = 2;
const HANDSHAKE_FINISHED: u8 = 3;
const HANDSHAKE_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(100);

fn local_credentials(setting_engine: &SettingEngine) -> RTCIceParameters {
    let static_creds = &setting_engine.candidates;
    RTCIceParameters {
        username_fragment: if static_creds.username_fragment.is_empty() {
            math_rand_alpha(UFRAG_LEN)
        } else {
            static_creds.username_fragment.clone()
        },
        password: if static_creds.password.is_empty() {
            math_rand_alpha_number(PWD_LEN)
        } else {
            static_creds.password.clone()
        },
        ice_lite: false,
    }
}

async fn abort_all(tasks: &Mutex<Vec<JoinHandle<()>>>) {
    for task in tasks.lock().await.drain(..) {
        task.abort();
    }
}

/// Connectivity agent with a single host candidate on `127.0.0.1`.
///
/// Both sides probe every remote candidate until one answers; the first
/// address heard from becomes the selected pair.
pub struct LoopbackIceAgent {
    inner: Arc<IceAgentInner>,
}

struct IceAgentInner {
    setting_engine: Arc<SettingEngine>,
    events: TransportEventSender,

    local: Mutex<RTCIceParameters>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    remote_candidates: Mutex<Vec<SocketAddr>>,
    selected: Mutex<Option<SocketAddr>>,

    state: AtomicU8,
    nominated: AtomicBool,
    closed: AtomicBool,
    epoch: Instant,
    last_activity_ms: AtomicU64,

    inbound_tx: mpsc::Sender<Bytes>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LoopbackIceAgent {
    pub fn new(setting_engine: Arc<SettingEngine>, events: TransportEventSender) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let local = local_credentials(&setting_engine);
        LoopbackIceAgent {
            inner: Arc::new(IceAgentInner {
                setting_engine,
                events,
                local: Mutex::new(local),
                socket: Mutex::new(None),
                remote_candidates: Mutex::new(vec![]),
                selected: Mutex::new(None),
                state: AtomicU8::new(RTCIceConnectionState::New as u8),
                nominated: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                epoch: Instant::now(),
                last_activity_ms: AtomicU64::new(0),
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                tasks: Mutex::new(vec![]),
            }),
        }
    }

    pub fn state(&self) -> RTCIceConnectionState {
        self.inner.state.load(Ordering::SeqCst).into()
    }
}

impl IceAgentInner {
    fn set_state(&self, state: RTCIceConnectionState) {
        let previous: RTCIceConnectionState = self.state.load(Ordering::SeqCst).into();
        if previous == state || previous == RTCIceConnectionState::Closed {
            return;
        }
        self.state.store(state as u8, Ordering::SeqCst);
        log::debug!("loopback ICE agent state changed to {state}");
        let _ = self.events.send(TransportEvent::IceConnectionState(state));
    }

    fn touch(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.last_activity_ms.store(now, Ordering::SeqCst);
    }

    fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::SeqCst));
        self.epoch.elapsed().saturating_sub(last)
    }

    async fn handle_check(&self, socket: &UdpSocket, packet: &[u8], from: SocketAddr) {
        match packet[0] {
            BINDING_REQUEST => {
                let local_ufrag = self.local.lock().await.username_fragment.clone();
                if &packet[1..] != local_ufrag.as_bytes() {
                    log::trace!("discarding connectivity check from {from} with unknown ufrag");
                    return;
                }
                if let Err(err) = socket.send_to(&[BINDING_RESPONSE], from).await {
                    log::trace!("failed to answer connectivity check from {from}: {err}");
                }
                self.nominate(from).await;
            }
            BINDING_RESPONSE => self.nominate(from).await,
            KEEPALIVE => self.touch(),
            other => log::trace!("ignoring check packet type {other} from {from}"),
        }
    }

    async fn nominate(&self, from: SocketAddr) {
        self.touch();
        let mut selected = self.selected.lock().await;
        if selected.is_none() {
            log::trace!("selected remote {from}");
            *selected = Some(from);
        }
        self.nominated.store(true, Ordering::SeqCst);
    }

    async fn read_loop(self: Arc<Self>, socket: Arc<UdpSocket>) {
        let mut buf = vec![0u8; RECEIVE_MTU];
        loop {
            let (n, from) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(err) => {
                    log::debug!("loopback ICE agent read loop exit: {err}");
                    return;
                }
            };
            if n == 0 {
                continue;
            }

            let packet = &buf[..n];
            if match_stun(packet) {
                self.handle_check(&socket, packet, from).await;
            } else {
                self.touch();
                if let Err(err) = self.inbound_tx.try_send(Bytes::copy_from_slice(packet)) {
                    log::trace!("dropping inbound packet from {from}: {err}");
                }
            }
        }
    }

    async fn monitor(self: Arc<Self>, socket: Arc<UdpSocket>) {
        let keepalive_interval = self.setting_engine.ice_keepalive_interval();
        let disconnected_timeout = self.setting_engine.ice_disconnected_timeout();
        let failed_timeout = self.setting_engine.ice_failed_timeout();

        let period = keepalive_interval
            .min(disconnected_timeout)
            .max(MIN_MONITOR_INTERVAL);
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if self.closed.load(Ordering::SeqCst) {
                return;
            }

            let selected = *self.selected.lock().await;
            if let Some(addr) = selected {
                if let Err(err) = socket.send_to(&[KEEPALIVE], addr).await {
                    log::trace!("failed to send keepalive to {addr}: {err}");
                }
            }

            let idle = self.idle();
            let next = if idle >= failed_timeout {
                RTCIceConnectionState::Failed
            } else if idle >= disconnected_timeout {
                RTCIceConnectionState::Disconnected
            } else {
                RTCIceConnectionState::Connected
            };
            self.set_state(next);
            if next == RTCIceConnectionState::Failed {
                return;
            }
        }
    }
}

#[async_trait]
impl IceAgent for LoopbackIceAgent {
    async fn gather(
        &self,
        policy: RTCIceTransportPolicy,
        servers: &[RTCIceServer],
    ) -> Result<mpsc::Receiver<RTCIceCandidate>> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ErrIceAgentClosed);
        }
        log::trace!("loopback ICE agent ignores {} ICE servers", servers.len());

        let (tx, rx) = mpsc::channel(1);
        if policy == RTCIceTransportPolicy::Relay {
            log::debug!("relay-only policy: loopback ICE agent has no relay candidates");
            return Ok(rx);
        }
        if !self.inner.setting_engine.candidates.include_loopback_candidate {
            log::trace!("loopback ICE agent always gathers its loopback candidate");
        }

        let socket = {
            let mut guard = self.inner.socket.lock().await;
            match guard.clone() {
                Some(socket) => socket,
                None => {
                    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);
                    let reader = tokio::spawn(
                        Arc::clone(&self.inner).read_loop(Arc::clone(&socket)),
                    );
                    self.inner.tasks.lock().await.push(reader);
                    *guard = Some(Arc::clone(&socket));
                    socket
                }
            }
        };

        let local_addr = socket.local_addr()?;
        let candidate = RTCIceCandidate::host(
            "1",
            RTCIceProtocol::Udp,
            &local_addr.ip().to_string(),
            local_addr.port(),
        );
        let _ = tx.try_send(candidate);
        Ok(rx)
    }

    async fn local_parameters(&self) -> RTCIceParameters {
        self.inner.local.lock().await.clone()
    }

    async fn restart(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ErrIceAgentClosed);
        }
        *self.inner.local.lock().await = local_credentials(&self.inner.setting_engine);
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: Option<RTCIceCandidate>) -> Result<()> {
        let Some(candidate) = candidate else {
            log::trace!("end of remote candidates");
            return Ok(());
        };
        if candidate.protocol != RTCIceProtocol::Udp {
            log::debug!("skipping non-udp remote candidate {candidate}");
            return Ok(());
        }
        let ip: IpAddr = match candidate.address.parse() {
            Ok(ip) => ip,
            Err(_) => {
                log::debug!("skipping unresolvable remote candidate {candidate}");
                return Ok(());
            }
        };

        let addr = SocketAddr::new(ip, candidate.port);
        let mut remotes = self.inner.remote_candidates.lock().await;
        if !remotes.contains(&addr) {
            log::trace!("added remote candidate {addr}");
            remotes.push(addr);
        }
        Ok(())
    }

    async fn start(&self, role: RTCIceRole, remote: RTCIceParameters) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ErrIceAgentClosed);
        }
        let socket = self
            .inner
            .socket
            .lock()
            .await
            .clone()
            .ok_or(Error::ErrICEGathererNotStarted)?;

        log::debug!("loopback ICE agent starting as {role}");
        self.inner.set_state(RTCIceConnectionState::Checking);

        let mut request = BytesMut::with_capacity(1 + remote.username_fragment.len());
        request.put_u8(BINDING_REQUEST);
        request.put_slice(remote.username_fragment.as_bytes());

        let deadline = Instant::now() + self.inner.setting_engine.ice_failed_timeout();
        while !self.inner.nominated.load(Ordering::SeqCst) {
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(Error::ErrIceAgentClosed);
            }
            if Instant::now() >= deadline {
                self.inner.set_state(RTCIceConnectionState::Failed);
                return Err(Error::ErrIceConnectivityTimeout);
            }

            let remotes = self.inner.remote_candidates.lock().await.clone();
            for addr in remotes {
                if let Err(err) = socket.send_to(&request, addr).await {
                    log::trace!("failed to send connectivity check to {addr}: {err}");
                }
            }
            tokio::time::sleep(CHECK_INTERVAL).await;
        }

        self.inner.touch();
        self.inner.set_state(RTCIceConnectionState::Connected);

        let monitor = tokio::spawn(Arc::clone(&self.inner).monitor(socket));
        self.inner.tasks.lock().await.push(monitor);
        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<usize> {
        let addr = (*self.inner.selected.lock().await).ok_or(Error::ErrICEConnectionNotStarted)?;
        let socket = self
            .inner
            .socket
            .lock()
            .await
            .clone()
            .ok_or(Error::ErrICEConnectionNotStarted)?;
        Ok(socket.send_to(&data, addr).await?)
    }

    async fn take_inbound(&self) -> Option<mpsc::Receiver<Bytes>> {
        self.inner.inbound_rx.lock().await.take()
    }

    async fn stop(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        abort_all(&self.inner.tasks).await;
        self.inner.socket.lock().await.take();
        self.inner.set_state(RTCIceConnectionState::Closed);
        Ok(())
    }
}

fn handshake_record(handshake_type: u8, body: &[u8]) -> Bytes {
    let mut record = BytesMut::with_capacity(2 + body.len());
    record.put_u8(CONTENT_HANDSHAKE);
    record.put_u8(handshake_type);
    record.put_slice(body);
    record.freeze()
}

/// Emulated handshake over a [`LoopbackIceAgent`] (or any [`IceAgent`]).
///
/// The client repeats its hello until the server answers; each side checks
/// the certificate it receives against the remote fingerprints.
pub struct LoopbackDtlsTransport {
    inner: Arc<DtlsInner>,
}

struct DtlsInner {
    ice: Arc<dyn IceAgent>,
    setting_engine: Arc<SettingEngine>,
    events: TransportEventSender,
    certificate: Bytes,

    state: AtomicU8,
    matcher: Mutex<MatchFunc>,

    app_tx: mpsc::Sender<Bytes>,
    app_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LoopbackDtlsTransport {
    pub fn new(
        ice: Arc<dyn IceAgent>,
        setting_engine: Arc<SettingEngine>,
        certificate: &RTCCertificate,
        events: TransportEventSender,
    ) -> Self {
        let (app_tx, app_rx) = mpsc::channel(INBOUND_CAPACITY);
        LoopbackDtlsTransport {
            inner: Arc::new(DtlsInner {
                ice,
                setting_engine,
                events,
                certificate: Bytes::copy_from_slice(certificate.der()),
                state: AtomicU8::new(RTCDtlsTransportState::New as u8),
                matcher: Mutex::new(Arc::new(match_dtls)),
                app_tx,
                app_rx: Mutex::new(Some(app_rx)),
                tasks: Mutex::new(vec![]),
            }),
        }
    }
}

impl DtlsInner {
    fn current(&self) -> RTCDtlsTransportState {
        self.state.load(Ordering::SeqCst).into()
    }

    fn set_state(&self, state: RTCDtlsTransportState) {
        let previous = self.current();
        if previous == state || previous == RTCDtlsTransportState::Closed {
            return;
        }
        self.state.store(state as u8, Ordering::SeqCst);
        log::debug!("loopback DTLS transport state changed to {state}");
        let _ = self.events.send(TransportEvent::DtlsState(state));
    }

    async fn read_loop(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<Bytes>,
        handshake_tx: mpsc::Sender<Bytes>,
    ) {
        while let Some(packet) = inbound.recv().await {
            let matcher = Arc::clone(&*self.matcher.lock().await);
            if !matcher(&packet) {
                log::trace!("inbound matcher dropped a {} byte packet", packet.len());
                continue;
            }

            let result = match packet[0] {
                CONTENT_HANDSHAKE => handshake_tx.try_send(packet.slice(1..)),
                CONTENT_APPLICATION_DATA => self.app_tx.try_send(packet.slice(1..)),
                other => {
                    log::trace!("ignoring record with content type {other}");
                    Ok(())
                }
            };
            if let Err(err) = result {
                log::trace!("dropping inbound record: {err}");
            }
        }
    }

    async fn handshake(
        &self,
        role: RTCDtlsRole,
        remote: &DTLSParameters,
        records: &mut mpsc::Receiver<Bytes>,
    ) -> Result<()> {
        if role == RTCDtlsRole::Client {
            let hello = handshake_record(HANDSHAKE_CLIENT_HELLO, &self.certificate);
            let mut ticker = tokio::time::interval(HANDSHAKE_RETRANSMIT_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.ice.send(hello.clone()).await?;
                    }
                    record = records.recv() => {
                        let record = record.ok_or(Error::ErrConnectionClosed)?;
                        if record.first() == Some(&HANDSHAKE_SERVER_HELLO) {
                            validate_fingerprint(&remote.fingerprints, &record[1..])?;
                            self.ice.send(handshake_record(HANDSHAKE_FINISHED, &[])).await?;
                            return Ok(());
                        }
                    }
                }
            }
        } else {
            let mut verified = false;
            loop {
                let record = records.recv().await.ok_or(Error::ErrConnectionClosed)?;
                match record.first() {
                    Some(&HANDSHAKE_CLIENT_HELLO) => {
                        if !verified {
                            validate_fingerprint(&remote.fingerprints, &record[1..])?;
                            verified = true;
                        }
                        let hello = handshake_record(HANDSHAKE_SERVER_HELLO, &self.certificate);
                        self.ice.send(hello).await?;
                    }
                    Some(&HANDSHAKE_FINISHED) if verified => return Ok(()),
                    _ => log::trace!("unexpected handshake record"),
                }
            }
        }
    }

    /// Answers retransmissions from a peer that missed our last flight.
    async fn answer_retransmits(
        self: Arc<Self>,
        role: RTCDtlsRole,
        mut records: mpsc::Receiver<Bytes>,
    ) {
        while let Some(record) = records.recv().await {
            let reply = match (role, record.first()) {
                (RTCDtlsRole::Client, Some(&HANDSHAKE_SERVER_HELLO)) => {
                    handshake_record(HANDSHAKE_FINISHED, &[])
                }
                (RTCDtlsRole::Server, Some(&HANDSHAKE_CLIENT_HELLO)) => {
                    handshake_record(HANDSHAKE_SERVER_HELLO, &self.certificate)
                }
                _ => continue,
            };
            if let Err(err) = self.ice.send(reply).await {
                log::trace!("failed to answer handshake retransmit: {err}");
            }
        }
    }
}

#[async_trait]
impl DtlsTransport for LoopbackDtlsTransport {
    async fn start(&self, role: RTCDtlsRole, remote: DTLSParameters) -> Result<()> {
        if self.inner.current() != RTCDtlsTransportState::New {
            return Err(Error::ErrInvalidDTLSStart);
        }
        let inbound = self
            .inner
            .ice
            .take_inbound()
            .await
            .ok_or(Error::ErrICEConnectionNotStarted)?;
        self.inner.set_state(RTCDtlsTransportState::Connecting);

        let role = match role {
            RTCDtlsRole::Client => RTCDtlsRole::Client,
            _ => RTCDtlsRole::Server,
        };
        log::debug!("loopback DTLS transport starting as {role}");

        let (handshake_tx, mut handshake_rx) = mpsc::channel(INBOUND_CAPACITY);
        let reader = tokio::spawn(Arc::clone(&self.inner).read_loop(inbound, handshake_tx));
        self.inner.tasks.lock().await.push(reader);

        let timeout = self.inner.setting_engine.dtls_handshake_timeout();
        let result = tokio::time::timeout(
            timeout,
            self.inner.handshake(role, &remote, &mut handshake_rx),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                self.inner.set_state(RTCDtlsTransportState::Connected);
                let retransmits =
                    tokio::spawn(Arc::clone(&self.inner).answer_retransmits(role, handshake_rx));
                self.inner.tasks.lock().await.push(retransmits);
                Ok(())
            }
            Ok(Err(err)) => {
                log::warn!("loopback DTLS handshake failed: {err}");
                self.inner.set_state(RTCDtlsTransportState::Failed);
                Err(err)
            }
            Err(_) => {
                log::warn!("loopback DTLS handshake timed out after {timeout:?}");
                self.inner.set_state(RTCDtlsTransportState::Failed);
                Err(Error::ErrDtlsHandshakeTimeout)
            }
        }
    }

    fn state(&self) -> RTCDtlsTransportState {
        self.inner.current()
    }

    async fn set_inbound_matcher(&self, matcher: MatchFunc) {
        *self.inner.matcher.lock().await = matcher;
    }

    async fn send(&self, data: Bytes) -> Result<usize> {
        if self.inner.current() != RTCDtlsTransportState::Connected {
            return Err(Error::ErrDtlsTransportNotStarted);
        }
        let mut record = BytesMut::with_capacity(1 + data.len());
        record.put_u8(CONTENT_APPLICATION_DATA);
        record.put_slice(&data);
        self.inner.ice.send(record.freeze()).await?;
        Ok(data.len())
    }

    async fn take_inbound(&self) -> Option<mpsc::Receiver<Bytes>> {
        self.inner.app_rx.lock().await.take()
    }

    async fn stop(&self) -> Result<()> {
        abort_all(&self.inner.tasks).await;
        self.inner.set_state(RTCDtlsTransportState::Closed);
        Ok(())
    }
}

/// Announces data channels as JSON encoded application records.
pub struct LoopbackSctpTransport {
    dtls: Arc<dyn DtlsTransport>,
    events: TransportEventSender,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl LoopbackSctpTransport {
    pub fn new(dtls: Arc<dyn DtlsTransport>, events: TransportEventSender) -> Self {
        LoopbackSctpTransport {
            dtls,
            events,
            reader: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SctpTransport for LoopbackSctpTransport {
    async fn start(&self) -> Result<()> {
        if self.dtls.state() != RTCDtlsTransportState::Connected {
            return Err(Error::ErrSCTPTransportDTLS);
        }
        let mut inbound = self
            .dtls
            .take_inbound()
            .await
            .ok_or(Error::ErrSCTPTransportDTLS)?;

        let events = self.events.clone();
        let reader = tokio::spawn(async move {
            while let Some(record) = inbound.recv().await {
                match serde_json::from_slice::<DataChannelParameters>(&record) {
                    Ok(params) => {
                        log::debug!(
                            "remote announced data channel {} ({})",
                            params.id,
                            params.label
                        );
                        let _ = events.send(TransportEvent::DataChannelOpened(params));
                    }
                    Err(err) => log::debug!("discarding malformed channel announcement: {err}"),
                }
            }
        });
        *self.reader.lock().await = Some(reader);
        Ok(())
    }

    async fn open_channel(&self, params: &DataChannelParameters) -> Result<()> {
        let record = serde_json::to_vec(params).map_err(|e| Error::Other(e.to_string()))?;
        self.dtls.send(Bytes::from(record)).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        Ok(())
    }
}

/// Builds the loopback transports. This is the default factory.
#[derive(Default, Debug, Clone, Copy)]
pub struct LoopbackTransportFactory;

impl TransportFactory for LoopbackTransportFactory {
    fn create(
        &self,
        setting_engine: Arc<SettingEngine>,
        certificates: &[RTCCertificate],
        events: TransportEventSender,
    ) -> Result<TransportBundle> {
        let certificate = certificates.first().ok_or(Error::ErrNonCertificate)?;

        let ice = Arc::new(LoopbackIceAgent::new(
            Arc::clone(&setting_engine),
            events.clone(),
        ));
        let dtls = Arc::new(LoopbackDtlsTransport::new(
            ice.clone(),
            setting_engine,
            certificate,
            events.clone(),
        ));
        let sctp = Arc::new(LoopbackSctpTransport::new(dtls.clone(), events));

        Ok(TransportBundle { ice, dtls, sctp })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rcgen::KeyPair;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Side {
        bundle: TransportBundle,
        events: UnboundedReceiver<TransportEvent>,
        certificate: RTCCertificate,
    }

    fn new_side(setting_engine: SettingEngine) -> Result<Side> {
        let certificate = RTCCertificate::from_key_pair(KeyPair::generate()?)?;
        let (tx, events) = mpsc::unbounded_channel();
        let bundle = LoopbackTransportFactory.create(
            Arc::new(setting_engine),
            &[certificate.clone()],
            tx,
        )?;
        Ok(Side {
            bundle,
            events,
            certificate,
        })
    }

    async fn exchange_candidates(a: &Side, b: &Side) -> Result<()> {
        let mut a_found = a.bundle.ice.gather(RTCIceTransportPolicy::All, &[]).await?;
        let mut b_found = b.bundle.ice.gather(RTCIceTransportPolicy::All, &[]).await?;
        while let Some(c) = a_found.recv().await {
            b.bundle.ice.add_remote_candidate(Some(c)).await?;
        }
        while let Some(c) = b_found.recv().await {
            a.bundle.ice.add_remote_candidate(Some(c)).await?;
        }
        Ok(())
    }

    async fn connect_ice(a: &Side, b: &Side) -> Result<()> {
        exchange_candidates(a, b).await?;
        let a_params = a.bundle.ice.local_parameters().await;
        let b_params = b.bundle.ice.local_parameters().await;
        let (ra, rb) = tokio::join!(
            a.bundle.ice.start(RTCIceRole::Controlling, b_params),
            b.bundle.ice.start(RTCIceRole::Controlled, a_params),
        );
        ra?;
        rb?;
        Ok(())
    }

    fn remote_of(side: &Side, role: RTCDtlsRole) -> DTLSParameters {
        DTLSParameters {
            role,
            fingerprints: side.certificate.get_fingerprints(),
        }
    }

    fn drain(events: &mut UnboundedReceiver<TransportEvent>) -> Vec<TransportEvent> {
        let mut out = vec![];
        while let Ok(ev) = events.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_ice_connects_and_carries_data() -> Result<()> {
        let mut a = new_side(SettingEngine::default())?;
        let b = new_side(SettingEngine::default())?;
        connect_ice(&a, &b).await?;

        let mut inbound = b.bundle.ice.take_inbound().await.unwrap();
        assert!(b.bundle.ice.take_inbound().await.is_none());
        a.bundle.ice.send(Bytes::from_static(&[200, 1, 2])).await?;
        let data = tokio::time::timeout(Duration::from_secs(5), inbound.recv()).await;
        assert_eq!(data.ok().flatten(), Some(Bytes::from_static(&[200, 1, 2])));

        let states: Vec<TransportEvent> = drain(&mut a.events);
        assert_eq!(
            states,
            vec![
                TransportEvent::IceConnectionState(RTCIceConnectionState::Checking),
                TransportEvent::IceConnectionState(RTCIceConnectionState::Connected),
            ]
        );

        a.bundle.ice.stop().await?;
        b.bundle.ice.stop().await?;
        assert_eq!(
            drain(&mut a.events),
            vec![TransportEvent::IceConnectionState(RTCIceConnectionState::Closed)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_ice_start_without_remote_times_out() -> Result<()> {
        let mut setting_engine = SettingEngine::default();
        setting_engine.set_ice_timeouts(None, Some(Duration::from_millis(200)), None);
        let a = new_side(setting_engine)?;

        let _ = a.bundle.ice.gather(RTCIceTransportPolicy::All, &[]).await?;
        let params = RTCIceParameters::default();
        assert_eq!(
            a.bundle.ice.start(RTCIceRole::Controlling, params).await,
            Err(Error::ErrIceConnectivityTimeout)
        );

        a.bundle.ice.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_relay_policy_gathers_nothing() -> Result<()> {
        let a = new_side(SettingEngine::default())?;
        let mut found = a.bundle.ice.gather(RTCIceTransportPolicy::Relay, &[]).await?;
        assert_eq!(found.recv().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_static_credentials() -> Result<()> {
        let mut setting_engine = SettingEngine::default();
        setting_engine.set_ice_credentials("ufragufrag".to_owned(), "pwd".repeat(8));
        let a = new_side(setting_engine)?;
        let params = a.bundle.ice.local_parameters().await;
        assert_eq!(params.username_fragment, "ufragufrag");
        assert_eq!(params.password, "pwd".repeat(8));

        let b = new_side(SettingEngine::default())?;
        let before = b.bundle.ice.local_parameters().await;
        b.bundle.ice.restart().await?;
        assert_ne!(b.bundle.ice.local_parameters().await, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_full_stack_announces_channel() -> Result<()> {
        let a = new_side(SettingEngine::default())?;
        let mut b = new_side(SettingEngine::default())?;
        connect_ice(&a, &b).await?;

        let (ra, rb) = tokio::join!(
            a.bundle
                .dtls
                .start(RTCDtlsRole::Client, remote_of(&b, RTCDtlsRole::Server)),
            b.bundle
                .dtls
                .start(RTCDtlsRole::Server, remote_of(&a, RTCDtlsRole::Client)),
        );
        ra?;
        rb?;
        assert_eq!(a.bundle.dtls.state(), RTCDtlsTransportState::Connected);
        assert_eq!(b.bundle.dtls.state(), RTCDtlsTransportState::Connected);

        a.bundle.sctp.start().await?;
        b.bundle.sctp.start().await?;
        drain(&mut b.events);

        let params = DataChannelParameters {
            id: 1,
            label: "chat".to_owned(),
            ordered: true,
            ..Default::default()
        };
        a.bundle.sctp.open_channel(&params).await?;

        let mut opened = None;
        while let Ok(Some(ev)) =
            tokio::time::timeout(Duration::from_secs(5), b.events.recv()).await
        {
            if let TransportEvent::DataChannelOpened(p) = ev {
                opened = Some(p);
                break;
            }
        }
        assert_eq!(opened, Some(params));

        for side in [&a, &b] {
            side.bundle.sctp.stop().await?;
            side.bundle.dtls.stop().await?;
            side.bundle.ice.stop().await?;
        }
        assert_eq!(a.bundle.dtls.state(), RTCDtlsTransportState::Closed);
        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_handshake_times_out() -> Result<()> {
        let mut setting_engine = SettingEngine::default();
        setting_engine.set_dtls_handshake_timeout(Some(Duration::from_millis(300)));
        let a = new_side(setting_engine.clone())?;
        let b = new_side(setting_engine)?;
        connect_ice(&a, &b).await?;

        b.bundle.dtls.set_inbound_matcher(Arc::new(|_: &[u8]| false)).await;
        let (ra, rb) = tokio::join!(
            a.bundle
                .dtls
                .start(RTCDtlsRole::Client, remote_of(&b, RTCDtlsRole::Server)),
            b.bundle
                .dtls
                .start(RTCDtlsRole::Server, remote_of(&a, RTCDtlsRole::Client)),
        );
        assert_eq!(ra, Err(Error::ErrDtlsHandshakeTimeout));
        assert_eq!(rb, Err(Error::ErrDtlsHandshakeTimeout));
        assert_eq!(a.bundle.dtls.state(), RTCDtlsTransportState::Failed);
        assert_eq!(
            a.bundle.dtls.start(RTCDtlsRole::Client, DTLSParameters::default()).await,
            Err(Error::ErrInvalidDTLSStart)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_fails() -> Result<()> {
        let mut setting_engine = SettingEngine::default();
        setting_engine.set_dtls_handshake_timeout(Some(Duration::from_millis(500)));
        let a = new_side(setting_engine.clone())?;
        let b = new_side(setting_engine)?;
        let stranger = new_side(SettingEngine::default())?;
        connect_ice(&a, &b).await?;

        let (ra, _) = tokio::join!(
            a.bundle
                .dtls
                .start(RTCDtlsRole::Client, remote_of(&stranger, RTCDtlsRole::Server)),
            b.bundle
                .dtls
                .start(RTCDtlsRole::Server, remote_of(&a, RTCDtlsRole::Client)),
        );
        assert_eq!(ra, Err(Error::ErrNoMatchingCertificateFingerprint));
        assert_eq!(a.bundle.dtls.state(), RTCDtlsTransportState::Failed);
        assert_eq!(
            a.bundle.dtls.send(Bytes::from_static(b"x")).await,
            Err(Error::ErrDtlsTransportNotStarted)
        );
        Ok(())
    }
}
