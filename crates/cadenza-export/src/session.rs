//! The listener side of an export: track bookkeeping and the lazy sink
//! handshake.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cadenza_core::{Format, TrackType};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{ErrorCode, ExportError};
use crate::listener::{AssetLoaderListener, ExportEvent, SupportedOutputs};
use crate::muxer::Muxer;
use crate::sink::{SharedSink, SinkHandshake};

#[derive(Debug, Default)]
struct SessionState {
    announced_tracks: usize,
    handed_out: Vec<TrackType>,
    failed: bool,
}

/// Connects asset loaders to a [`SinkHandshake`] and reports what happens
/// as [`ExportEvent`]s.
///
/// The first `on_output_format` for a track attaches it and answers "not
/// ready"; the loader asks again after its retry interval and gets the sink
/// once every announced track is attached. Track counts from several loaders
/// sharing one session add up.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use cadenza_core::ProcessingChain;
/// use cadenza_export::{AssetLoader, AudioAssetLoader, ExportSession, LoaderOptions, ToneSource, WavMuxer};
///
/// let session = ExportSession::new(WavMuxer::new("tone.wav"));
/// let mut loader = AudioAssetLoader::new(
///     Box::new(ToneSource::new(440.0, 2_000_000, 48000, 2)),
///     ProcessingChain::new(),
///     session.clone(),
///     LoaderOptions::default(),
/// );
/// loader.start();
/// session.wait(Duration::from_secs(30))?;
/// # Ok::<(), cadenza_export::ExportError>(())
/// ```
pub struct ExportSession<M> {
    handshake: Arc<Mutex<SinkHandshake<M>>>,
    state: Mutex<SessionState>,
    events_tx: Sender<ExportEvent>,
    events_rx: Receiver<ExportEvent>,
}

impl<M: Muxer + 'static> ExportSession<M> {
    /// A session writing through `muxer`.
    pub fn new(muxer: M) -> Arc<Self> {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let handshake = SinkHandshake::new(muxer).with_events(events_tx.clone());
        Arc::new(Self {
            handshake: Arc::new(Mutex::new(handshake)),
            state: Mutex::new(SessionState::default()),
            events_tx,
            events_rx,
        })
    }

    /// The sink every track of this session feeds.
    pub fn sink(&self) -> SharedSink {
        self.handshake.clone()
    }

    /// The concrete sink, for inspecting the muxer.
    pub fn handshake(&self) -> &Arc<Mutex<SinkHandshake<M>>> {
        &self.handshake
    }

    /// Next event, waiting up to `timeout`.
    pub fn next_event(&self, timeout: Duration) -> Option<ExportEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    /// Block until the export completes or fails, consuming events.
    pub fn wait(&self, timeout: Duration) -> Result<(), ExportError> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.events_rx.recv_timeout(left) {
                Ok(ExportEvent::Completed) => return Ok(()),
                Ok(ExportEvent::Error(err)) => return Err(err),
                Ok(event) => debug!(?event, "export event"),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ExportError::new(
                        ErrorCode::Unspecified,
                        format!("export did not finish within {timeout:?}"),
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ExportError::unexpected("export event channel closed"));
                }
            }
        }
    }

    fn emit(&self, event: ExportEvent) {
        // The session owns a receiver, so the channel never disconnects.
        let _ = self.events_tx.send(event);
    }
}

impl<M: Muxer + 'static> AssetLoaderListener for ExportSession<M> {
    fn on_duration_us(&self, duration_us: u64) {
        self.emit(ExportEvent::DurationUs(duration_us));
    }

    fn on_track_count(&self, track_count: usize) {
        let mut state = self.state.lock();
        state.announced_tracks += track_count;
        self.handshake
            .lock()
            .set_expected_tracks(state.announced_tracks);
        self.emit(ExportEvent::TrackCount(track_count));
    }

    fn on_track_added(&self, input_format: &Format, supported_outputs: SupportedOutputs) {
        info!(format = %input_format, "track added");
        self.emit(ExportEvent::TrackAdded {
            format: input_format.clone(),
            supported_outputs,
        });
    }

    fn on_output_format(&self, format: &Format) -> Result<Option<SharedSink>, ExportError> {
        let mut state = self.state.lock();
        let mut handshake = self.handshake.lock();

        let first_request = format
            .track_type()
            .is_none_or(|track| !handshake.is_attached(track));
        let track = handshake.attach(format)?;
        if first_request {
            debug!(%track, "sink prepared, not ready yet");
            return Ok(None);
        }
        if !handshake.is_ready() {
            return Ok(None);
        }
        drop(handshake);

        if !state.handed_out.contains(&track) {
            state.handed_out.push(track);
            self.emit(ExportEvent::SinkReady {
                track,
                format: format.clone(),
            });
        }
        Ok(Some(self.sink()))
    }

    fn on_error(&self, err: ExportError) {
        let mut state = self.state.lock();
        if state.failed {
            debug!(%err, "dropping error after the first one");
            return;
        }
        state.failed = true;
        error!(%err, code = err.code().code(), "export failed");
        self.emit(ExportEvent::Error(err));
    }
}
