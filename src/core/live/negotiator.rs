//! Upstream session setup.
//!
//! Sends the setup handshake over an already-open upstream connection and
//! waits for `setupComplete`. Anything that arrives first is discarded.

use tokio::time::timeout;
use tracing::{debug, info};

use super::base::{LiveError, LiveResult, SessionSettings, UpstreamSink, UpstreamSource};
use super::codec::{encode_setup, encode_text_turn, parse_server_message};

/// What happened while the session was being set up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegotiationOutcome {
    /// Messages received before the acknowledgement.
    pub discarded: usize,
    pub warm_up_sent: bool,
}

/// Run the setup handshake. On success the session is ready for audio.
pub async fn negotiate<Si, So>(
    sink: &mut Si,
    source: &mut So,
    settings: &SessionSettings,
) -> LiveResult<NegotiationOutcome>
where
    Si: UpstreamSink + ?Sized,
    So: UpstreamSource + ?Sized,
{
    sink.send(&encode_setup(settings))
        .await
        .map_err(|e| LiveError::NegotiationFailed(format!("failed to send setup: {e}")))?;
    debug!(model = %settings.model, "Sent session setup");

    let discarded = timeout(settings.setup_timeout, await_setup_complete(source))
        .await
        .map_err(|_| {
            LiveError::NegotiationFailed(format!(
                "no setup acknowledgement within {}ms",
                settings.setup_timeout.as_millis()
            ))
        })??;

    info!(model = %settings.model, discarded, "Upstream session ready");

    let mut outcome = NegotiationOutcome {
        discarded,
        warm_up_sent: false,
    };

    if let Some(text) = settings.warm_up_text.as_deref()
        && !text.is_empty()
    {
        sink.send(&encode_text_turn(text)).await?;
        outcome.warm_up_sent = true;
        debug!(len = text.len(), "Sent warm-up turn");
    }

    Ok(outcome)
}

async fn await_setup_complete<So>(source: &mut So) -> LiveResult<usize>
where
    So: UpstreamSource + ?Sized,
{
    let mut discarded = 0;
    loop {
        match source.recv().await {
            Ok(Some(text)) => {
                let message = parse_server_message(&text)?;
                if message.is_setup_complete() {
                    return Ok(discarded);
                }
                discarded += 1;
                debug!(discarded, "Discarding message received before setup acknowledgement");
            }
            Ok(None) => {
                return Err(LiveError::NegotiationFailed(
                    "upstream closed before setup acknowledgement".to_string(),
                ));
            }
            Err(e) => {
                return Err(LiveError::NegotiationFailed(format!(
                    "upstream failed before setup acknowledgement: {e}"
                )));
            }
        }
    }
}
