//! Per-connection bridge lifecycle.
//!
//! A [`LiveBridge`] owns one accepted client connection for its whole life:
//! it opens the upstream leg, negotiates the session, relays until either side
//! stops, and then closes both legs exactly once. The same teardown runs for
//! every exit path, including a panic inside negotiation or relay.

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::base::{
    BridgeSettings, DownstreamSink, DownstreamSource, LiveError, LiveResult, Side,
    UpstreamConnector, UpstreamSink,
};
use super::forwarder::{RelayStats, TerminationCause, run_duplex};
use super::negotiator::{NegotiationOutcome, negotiate};

/// Upper bound on closing one leg during teardown.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle phase of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    Accepting,
    Negotiating,
    Relaying,
    Closing,
    Closed,
}

impl BridgePhase {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepting => "accepting",
            Self::Negotiating => "negotiating",
            Self::Relaying => "relaying",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for BridgePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary returned once a bridge has fully closed.
#[derive(Debug)]
pub struct BridgeReport {
    pub bridge_id: String,
    pub cause: TerminationCause,
    pub stats: RelayStats,
    pub negotiation: Option<NegotiationOutcome>,
    pub upstream_opened: bool,
    pub duration: Duration,
}

/// One downstream connection bridged to one upstream session.
pub struct LiveBridge {
    id: String,
    settings: Arc<BridgeSettings>,
    cancel: CancellationToken,
    phase: BridgePhase,
}

impl LiveBridge {
    pub fn new(settings: Arc<BridgeSettings>, cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            settings,
            cancel,
            phase: BridgePhase::Accepting,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    fn transition(&mut self, next: BridgePhase) {
        debug!(bridge_id = %self.id, from = %self.phase, to = %next, "Bridge phase change");
        self.phase = next;
    }

    /// Run the bridge to completion.
    ///
    /// Consumes the bridge, so a bridge serves exactly one client connection.
    /// Both legs are closed before this returns.
    pub async fn run<DSrc, DSnk, C>(
        mut self,
        mut downstream_source: DSrc,
        mut downstream_sink: DSnk,
        connector: &C,
    ) -> BridgeReport
    where
        DSrc: DownstreamSource,
        DSnk: DownstreamSink,
        C: UpstreamConnector + ?Sized,
    {
        let started = Instant::now();
        let mut upstream: Option<(C::Sink, C::Source)> = None;
        let mut stats = RelayStats::default();
        let mut negotiation = None;

        let outcome = AssertUnwindSafe(self.drive(
            &mut downstream_source,
            &mut downstream_sink,
            connector,
            &mut upstream,
            &mut stats,
            &mut negotiation,
        ))
        .catch_unwind()
        .await;

        let cause = match outcome {
            Ok(cause) => cause,
            Err(payload) => TerminationCause::Failed(LiveError::UnexpectedFailure(format!(
                "panic in bridge: {}",
                panic_message(payload.as_ref())
            ))),
        };

        self.transition(BridgePhase::Closing);
        self.log_termination(&cause);

        // Legs close concurrently, each bounded by CLOSE_TIMEOUT
        let upstream_opened = upstream.is_some();
        let close_upstream = async {
            if let Some((mut sink, _source)) = upstream.take() {
                close_leg(&self.id, Side::Upstream, sink.close()).await;
            }
        };
        let close_downstream = close_leg(&self.id, Side::Downstream, downstream_sink.close());
        tokio::join!(close_upstream, close_downstream);

        self.transition(BridgePhase::Closed);

        BridgeReport {
            bridge_id: self.id,
            cause,
            stats,
            negotiation,
            upstream_opened,
            duration: started.elapsed(),
        }
    }

    async fn drive<DSrc, DSnk, C>(
        &mut self,
        downstream_source: &mut DSrc,
        downstream_sink: &mut DSnk,
        connector: &C,
        upstream: &mut Option<(C::Sink, C::Source)>,
        stats: &mut RelayStats,
        negotiation: &mut Option<NegotiationOutcome>,
    ) -> TerminationCause
    where
        DSrc: DownstreamSource,
        DSnk: DownstreamSink,
        C: UpstreamConnector + ?Sized,
    {
        if let Err(e) = self.settings.validate() {
            return TerminationCause::Failed(e);
        }

        self.transition(BridgePhase::Negotiating);

        let connected = select! {
            result = connector.connect() => result,
            _ = self.cancel.cancelled() => return TerminationCause::Cancelled,
        };
        let (sink, source) = match connected {
            Ok(pair) => upstream.insert(pair),
            Err(e) => return TerminationCause::Failed(e),
        };

        let negotiated = select! {
            result = negotiate(sink, source, &self.settings.session) => result,
            _ = self.cancel.cancelled() => return TerminationCause::Cancelled,
        };
        match negotiated {
            Ok(outcome) => *negotiation = Some(outcome),
            Err(e) => return TerminationCause::Failed(e),
        }

        self.transition(BridgePhase::Relaying);
        info!(bridge_id = %self.id, "Relaying audio");

        let (cause, relay_stats) = run_duplex(
            downstream_source,
            downstream_sink,
            sink,
            source,
            &self.settings,
            &self.cancel,
        )
        .await;
        *stats = relay_stats;
        cause
    }

    fn log_termination(&self, cause: &TerminationCause) {
        match cause {
            TerminationCause::UpstreamClosed => {
                info!(bridge_id = %self.id, "Upstream closed the session")
            }
            TerminationCause::Cancelled => {
                info!(bridge_id = %self.id, "Bridge cancelled by server shutdown")
            }
            TerminationCause::DownstreamDisconnected => {
                warn!(bridge_id = %self.id, "Client disconnected")
            }
            TerminationCause::Failed(e @ LiveError::TransportClosed { .. }) => {
                info!(bridge_id = %self.id, error = %e, "Bridge stopped")
            }
            TerminationCause::Failed(e @ LiveError::TransportDisconnected { .. }) => {
                warn!(bridge_id = %self.id, error = %e, "Bridge connection lost")
            }
            TerminationCause::Failed(e) => {
                error!(bridge_id = %self.id, error = %e, detail = ?e, "Bridge failed")
            }
        }
    }
}

async fn close_leg(bridge_id: &str, side: Side, close: impl Future<Output = LiveResult<()>>) {
    match tokio::time::timeout(CLOSE_TIMEOUT, close).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(bridge_id, %side, error = %e, "Error closing connection"),
        Err(_) => debug!(
            bridge_id,
            %side,
            timeout_ms = CLOSE_TIMEOUT.as_millis() as u64,
            "Timed out closing connection"
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
