use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::IceAgent;
use super::candidate::RTCIceCandidate;
use super::server::RTCIceServer;
use crate::peer_connection::configuration::ice_transport_policy::RTCIceTransportPolicy;
use crate::peer_connection::state::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::transport::{TransportEvent, TransportEventSender};
use shared::error::Result;

/// Lifecycle of the candidate gatherer.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCIceGathererState {
    #[default]
    Unspecified,

    /// Created, nothing gathered yet.
    New,

    /// Discovery in progress.
    Gathering,

    /// Discovery finished; the candidate set is final.
    Complete,

    /// Stopped; candidates were discarded.
    Closed,
}

const ICE_GATHERER_STATE_NEW_STR: &str = "new";
const ICE_GATHERER_STATE_GATHERING_STR: &str = "gathering";
const ICE_GATHERER_STATE_COMPLETE_STR: &str = "complete";
const ICE_GATHERER_STATE_CLOSED_STR: &str = "closed";

impl From<u8> for RTCIceGathererState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCIceGathererState::New,
            2 => RTCIceGathererState::Gathering,
            3 => RTCIceGathererState::Complete,
            4 => RTCIceGathererState::Closed,
            _ => RTCIceGathererState::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceGathererState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceGathererState::New => ICE_GATHERER_STATE_NEW_STR,
            RTCIceGathererState::Gathering => ICE_GATHERER_STATE_GATHERING_STR,
            RTCIceGathererState::Complete => ICE_GATHERER_STATE_COMPLETE_STR,
            RTCIceGathererState::Closed => ICE_GATHERER_STATE_CLOSED_STR,
            RTCIceGathererState::Unspecified => {
                crate::peer_connection::configuration::UNSPECIFIED_STR
            }
        };
        write!(f, "{s}")
    }
}

impl From<RTCIceGathererState> for RTCIceGatheringState {
    fn from(state: RTCIceGathererState) -> Self {
        match state {
            RTCIceGathererState::New => RTCIceGatheringState::New,
            RTCIceGathererState::Gathering => RTCIceGatheringState::Gathering,
            RTCIceGathererState::Complete | RTCIceGathererState::Closed => {
                RTCIceGatheringState::Complete
            }
            RTCIceGathererState::Unspecified => RTCIceGatheringState::Unspecified,
        }
    }
}

/// Drives one round of candidate discovery on the connectivity agent and
/// keeps the discovered candidates for embedding in local descriptions.
///
/// In trickle mode every candidate is reported as soon as it is found. In
/// non-trickle mode nothing is reported until the round completes, then the
/// whole set is reported at once. Either way the round ends with a `None`
/// candidate.
pub(crate) struct RTCIceGatherer {
    agent: Arc<dyn IceAgent>,
    trickle: bool,
    events: TransportEventSender,

    state: Arc<AtomicU8>,
    candidates: Arc<Mutex<Vec<RTCIceCandidate>>>,
    complete_waiters: Arc<Mutex<Vec<mpsc::Sender<()>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RTCIceGatherer {
    pub(crate) fn new(
        agent: Arc<dyn IceAgent>,
        trickle: bool,
        events: TransportEventSender,
    ) -> Self {
        RTCIceGatherer {
            agent,
            trickle,
            events,
            state: Arc::new(AtomicU8::new(RTCIceGathererState::New as u8)),
            candidates: Arc::new(Mutex::new(vec![])),
            complete_waiters: Arc::new(Mutex::new(vec![])),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> RTCIceGathererState {
        self.state.load(Ordering::SeqCst).into()
    }

    fn report_state(events: &TransportEventSender, state: RTCIceGathererState) {
        log::debug!("ICE gatherer state changed to {state}");
        let _ = events.send(TransportEvent::GathererState(state));
    }

    /// Starts a gathering round. Does nothing unless the gatherer is `New`.
    pub(crate) async fn gather(
        &self,
        policy: RTCIceTransportPolicy,
        servers: &[RTCIceServer],
    ) -> Result<()> {
        if self
            .state
            .compare_exchange(
                RTCIceGathererState::New as u8,
                RTCIceGathererState::Gathering as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Ok(());
        }
        RTCIceGatherer::report_state(&self.events, RTCIceGathererState::Gathering);

        let mut found = match self.agent.gather(policy, servers).await {
            Ok(found) => found,
            Err(err) => {
                self.state
                    .store(RTCIceGathererState::New as u8, Ordering::SeqCst);
                RTCIceGatherer::report_state(&self.events, RTCIceGathererState::New);
                return Err(err);
            }
        };

        let trickle = self.trickle;
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let candidates = Arc::clone(&self.candidates);
        let complete_waiters = Arc::clone(&self.complete_waiters);

        let handle = tokio::spawn(async move {
            while let Some(candidate) = found.recv().await {
                if state.load(Ordering::SeqCst) != RTCIceGathererState::Gathering as u8 {
                    return;
                }
                log::trace!("gathered local candidate {candidate}");
                candidates.lock().await.push(candidate.clone());
                if trickle {
                    let _ = events.send(TransportEvent::LocalCandidate(Some(candidate)));
                }
            }

            if state
                .compare_exchange(
                    RTCIceGathererState::Gathering as u8,
                    RTCIceGathererState::Complete as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_err()
            {
                return;
            }
            RTCIceGatherer::report_state(&events, RTCIceGathererState::Complete);

            if !trickle {
                let gathered = candidates.lock().await.clone();
                for candidate in gathered {
                    let _ = events.send(TransportEvent::LocalCandidate(Some(candidate)));
                }
            }
            let _ = events.send(TransportEvent::LocalCandidate(None));

            // dropping the senders resolves every pending promise
            complete_waiters.lock().await.clear();
        });

        *self.task.lock().await = Some(handle);
        Ok(())
    }

    /// Candidates found so far in the current round.
    pub(crate) async fn local_candidates(&self) -> Vec<RTCIceCandidate> {
        self.candidates.lock().await.clone()
    }

    /// A channel that closes once the current round is complete.
    pub(crate) async fn gathering_complete_promise(&self) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(1);
        let mut waiters = self.complete_waiters.lock().await;
        match self.state() {
            RTCIceGathererState::Complete | RTCIceGathererState::Closed => drop(tx),
            _ => waiters.push(tx),
        }
        rx
    }

    /// Forgets the current round so the next local commit gathers again.
    pub(crate) async fn reset(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        self.candidates.lock().await.clear();
        let previous = self
            .state
            .swap(RTCIceGathererState::New as u8, Ordering::SeqCst);
        if previous != RTCIceGathererState::New as u8 {
            RTCIceGatherer::report_state(&self.events, RTCIceGathererState::New);
        }
    }

    /// Stops discovery and discards every candidate.
    pub(crate) async fn close(&self) {
        self.state
            .store(RTCIceGathererState::Closed as u8, Ordering::SeqCst);
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        self.candidates.lock().await.clear();
        self.complete_waiters.lock().await.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peer_connection::configuration::setting_engine::SettingEngine;
    use crate::peer_connection::transport::loopback::LoopbackIceAgent;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn new_gatherer(trickle: bool) -> Result<(RTCIceGatherer, UnboundedReceiver<TransportEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let agent = Arc::new(LoopbackIceAgent::new(
            Arc::new(SettingEngine::default()),
            tx.clone(),
        ));
        Ok((RTCIceGatherer::new(agent, trickle, tx), rx))
    }

    async fn next_candidate_event(
        rx: &mut UnboundedReceiver<TransportEvent>,
    ) -> Option<Option<RTCIceCandidate>> {
        while let Ok(Some(ev)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            if let TransportEvent::LocalCandidate(c) = ev {
                return Some(c);
            }
        }
        None
    }

    #[test]
    fn test_ice_gatherer_state_string() {
        let tests = vec![
            (RTCIceGathererState::Unspecified, "Unspecified"),
            (RTCIceGathererState::New, "new"),
            (RTCIceGathererState::Gathering, "gathering"),
            (RTCIceGathererState::Complete, "complete"),
            (RTCIceGathererState::Closed, "closed"),
        ];

        for (state, expected_string) in tests {
            assert_eq!(state.to_string(), expected_string);
            assert_eq!(RTCIceGathererState::from(state as u8), state);
        }
    }

    #[tokio::test]
    async fn test_gather_trickle_reports_then_ends() -> Result<()> {
        let (gatherer, mut rx) = new_gatherer(true)?;
        gatherer.gather(RTCIceTransportPolicy::All, &[]).await?;

        let first = next_candidate_event(&mut rx).await;
        assert!(matches!(first, Some(Some(_))));
        let end = next_candidate_event(&mut rx).await;
        assert_eq!(end, Some(None));

        let mut done = gatherer.gathering_complete_promise().await;
        assert_eq!(done.recv().await, None);
        assert_eq!(gatherer.state(), RTCIceGathererState::Complete);
        assert_eq!(gatherer.local_candidates().await.len(), 1);

        gatherer.close().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_gather_is_noop_unless_new() -> Result<()> {
        let (gatherer, mut rx) = new_gatherer(false)?;
        gatherer.gather(RTCIceTransportPolicy::All, &[]).await?;
        let mut done = gatherer.gathering_complete_promise().await;
        let _ = done.recv().await;

        gatherer.gather(RTCIceTransportPolicy::All, &[]).await?;
        assert_eq!(gatherer.state(), RTCIceGathererState::Complete);
        assert_eq!(gatherer.local_candidates().await.len(), 1);

        gatherer.reset().await;
        assert_eq!(gatherer.state(), RTCIceGathererState::New);
        assert!(gatherer.local_candidates().await.is_empty());

        gatherer.close().await;
        while rx.try_recv().is_ok() {}
        Ok(())
    }
}
