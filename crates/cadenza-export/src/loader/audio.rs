use std::borrow::Cow;
use std::sync::Arc;

use cadenza_core::{AudioFormat, Format, ProcessingChain, StreamMetadata, TrackType};
use tracing::debug;

use super::{AssetLoader, LoaderContext, LoaderOptions, LoaderShell};
use crate::error::{ErrorCode, ExportError};
use crate::listener::{AssetLoaderListener, SupportedOutputs};
use crate::progress::{ProgressState, percent_of};
use crate::sink::InputResult;
use crate::source::AudioSource;
use crate::task_queue::TaskHandle;

/// Streams an [`AudioSource`] through a [`ProcessingChain`] into the sink.
///
/// Audio is read in chunks of [`LoaderOptions::chunk_frames`]. Each chunk is
/// queued as one sample; a chunk refused with `TRY_AGAIN_LATER` is kept and
/// re-issued unchanged. Progress is the share of source frames delivered.
pub struct AudioAssetLoader {
    shell: LoaderShell<AudioState>,
    state: Option<AudioState>,
    duration_us: u64,
}

struct Chunk {
    data: Vec<u8>,
    frames: u64,
    presentation_time_us: u64,
}

struct AudioState {
    ctx: LoaderContext,
    source: Box<dyn AudioSource>,
    chain: ProcessingChain,
    chunk_frames: usize,
    read_buf: Vec<u8>,
    output: AudioFormat,
    output_format: Option<Format>,
    pending: Option<Chunk>,
    source_frames_total: u64,
    source_frames_read: u64,
    frames_emitted: u64,
    source_drained: bool,
}

impl AudioAssetLoader {
    /// Loader streaming `source` through `chain`.
    pub fn new(
        source: Box<dyn AudioSource>,
        chain: ProcessingChain,
        listener: Arc<dyn AssetLoaderListener>,
        options: LoaderOptions,
    ) -> Self {
        let shell = LoaderShell::new("cadenza-audio-loader", listener);
        let duration_us = source.duration_us();
        let state = AudioState {
            ctx: shell.context(&options),
            source_frames_total: source.total_frames(),
            source,
            chain,
            chunk_frames: options.chunk_frames.max(1),
            read_buf: Vec::new(),
            output: AudioFormat::NOT_SET,
            output_format: None,
            pending: None,
            source_frames_read: 0,
            frames_emitted: 0,
            source_drained: false,
        };
        Self {
            shell,
            state: Some(state),
            duration_us,
        }
    }
}

impl AssetLoader for AudioAssetLoader {
    fn start(&mut self) {
        let Some(state) = self.state.take() else {
            panic!("audio asset loader started twice");
        };
        self.shell
            .launch(state, self.duration_us, 1, AudioState::begin);
    }

    fn progress(&self) -> ProgressState {
        self.shell.progress()
    }

    fn release(&mut self) {
        self.shell.release();
    }
}

impl AudioState {
    fn begin(&mut self, queue: &TaskHandle<Self>) {
        if self.ctx.is_stopped() {
            return;
        }
        let input = self.source.format();
        self.ctx
            .listener
            .on_track_added(&Format::from_audio_format(input), SupportedOutputs::DECODED);

        let output = match self.chain.configure(input) {
            Ok(output) => output,
            Err(err) => {
                let err = ExportError::new(ErrorCode::AudioProcessingFailed, err.to_string())
                    .with_source(err);
                return self.ctx.fail(err);
            }
        };
        if output.bytes_per_frame().is_none() {
            return self.ctx.fail(ExportError::new(
                ErrorCode::UnsupportedFormat,
                format!("processing chain produces non-PCM audio: {output}"),
            ));
        }
        self.chain.flush(StreamMetadata::DEFAULT);
        debug!(
            %input,
            %output,
            stages = ?self.chain.active_stage_names(),
            "audio chain ready"
        );
        self.output = output;
        self.output_format = Some(Format::from_audio_format(output));
        self.pump(queue);
    }

    /// Queue the pending chunk, reading a new one if needed.
    fn pump(&mut self, queue: &TaskHandle<Self>) {
        self.ctx.retry.fired();
        if self.ctx.is_stopped() {
            return;
        }
        let Some(format) = &self.output_format else {
            return;
        };
        let sink = match self.ctx.sink_for(format) {
            Ok(Some(sink)) => sink,
            Ok(None) => return self.ctx.retry(queue, Self::pump),
            Err(err) => return self.ctx.fail(err),
        };

        if self.pending.is_none() {
            match self.next_chunk() {
                Ok(Some(chunk)) => self.pending = Some(chunk),
                Ok(None) => return self.ctx.end_track(&sink, TrackType::Audio),
                Err(err) => return self.ctx.fail(err),
            }
        }
        let Some(chunk) = &self.pending else {
            return;
        };

        let queued = sink
            .lock()
            .queue_audio(&chunk.data, chunk.presentation_time_us);
        match queued {
            Ok(InputResult::Success) => {
                self.frames_emitted += chunk.frames;
                self.pending = None;
                let percent = percent_of(self.source_frames_read, self.source_frames_total);
                self.ctx.progress().update(percent.min(99));
                if queue.post(Self::pump).is_err() {
                    debug!("queue closed while streaming audio");
                }
            }
            Ok(InputResult::TryAgainLater) => self.ctx.retry(queue, Self::pump),
            Ok(InputResult::EndOfStream) => self.ctx.complete(),
            Err(err) => self.ctx.fail(err),
        }
    }

    /// Next non-empty chunk of processed audio, `None` once everything was
    /// handed out.
    fn next_chunk(&mut self) -> Result<Option<Chunk>, ExportError> {
        while !self.source_drained {
            let frames = self.source.read_frames(self.chunk_frames, &mut self.read_buf)?;
            if frames == 0 {
                self.source_drained = true;
                let tail = self.chain.drain_end_of_stream();
                return Ok(self.chunk(tail));
            }
            self.source_frames_read += frames as u64;

            let input = std::mem::take(&mut self.read_buf);
            let processed = match self.chain.process_buffer(&input) {
                Cow::Owned(bytes) => Some(bytes),
                Cow::Borrowed(_) => None,
            };
            let data = match processed {
                Some(bytes) => {
                    self.read_buf = input;
                    bytes
                }
                None => input,
            };
            if let Some(chunk) = self.chunk(data) {
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }

    fn chunk(&self, data: Vec<u8>) -> Option<Chunk> {
        let frame_bytes = self.output.bytes_per_frame()?;
        let frames = (data.len() / frame_bytes) as u64;
        if frames == 0 {
            return None;
        }
        Some(Chunk {
            data,
            frames,
            presentation_time_us: self.output.frames_to_duration_us(self.frames_emitted),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportSession;
    use crate::muxer::MemoryMuxer;
    use crate::source::{SilenceSource, ToneSource};
    use cadenza_core::Encoding;
    use cadenza_core::processors::{channel_mapping, gain, to_int16_pcm};
    use std::time::Duration;

    fn fast() -> LoaderOptions {
        LoaderOptions {
            retry_interval: Duration::from_millis(1),
            chunk_frames: 256,
        }
    }

    #[test]
    fn bypass_delivers_every_frame() {
        let session = ExportSession::new(MemoryMuxer::new());
        let mut loader = AudioAssetLoader::new(
            Box::new(SilenceSource::new(100_000, 8000, 2)),
            ProcessingChain::new(),
            session.clone(),
            fast(),
        );
        loader.start();
        session.wait(Duration::from_secs(5)).unwrap();

        let handshake = session.handshake().lock();
        let track = handshake.muxer().track(TrackType::Audio).unwrap();
        assert_eq!(track.total_size(), 800 * 4);
        assert!(track.ended);
        let timestamps: Vec<u64> = track
            .samples
            .iter()
            .map(|s| s.presentation_time_us)
            .collect();
        assert_eq!(timestamps, vec![0, 32_000, 64_000, 96_000]);
    }

    #[test]
    fn chain_changes_output_format() {
        let session = ExportSession::new(MemoryMuxer::new());
        let mut chain = ProcessingChain::new();
        chain.push(Box::new(gain(0.5)));
        chain.push(Box::new(to_int16_pcm()));
        let mut loader = AudioAssetLoader::new(
            Box::new(ToneSource::new(440.0, 50_000, 16000, 1)),
            chain,
            session.clone(),
            fast(),
        );
        loader.start();
        session.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(loader.progress(), ProgressState::Available(100));

        let handshake = session.handshake().lock();
        let format = handshake.format(TrackType::Audio).unwrap();
        assert_eq!(format.encoding(), Some(Encoding::Pcm16));
        let track = handshake.muxer().track(TrackType::Audio).unwrap();
        assert_eq!(track.total_size(), 800 * 2);
    }

    #[test]
    fn unhandled_chain_format_is_reported() {
        let session = ExportSession::new(MemoryMuxer::new());
        let mut chain = ProcessingChain::new();
        chain.push(Box::new(channel_mapping(vec![0, 1])));
        let mut loader = AudioAssetLoader::new(
            Box::new(SilenceSource::new(10_000, 8000, 1)),
            chain,
            session.clone(),
            fast(),
        );
        loader.start();
        let err = session.wait(Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AudioProcessingFailed);
        assert_eq!(loader.progress(), ProgressState::Unavailable);
    }
}
