use std::sync::Arc;

use cadenza_core::{ColorInfo, Format, TrackType, mime};
use tracing::debug;

use super::{AssetLoader, LoaderContext, LoaderOptions, LoaderShell};
use crate::bitmap::{Bitmap, BitmapLoader};
use crate::error::ExportError;
use crate::listener::{AssetLoaderListener, SupportedOutputs};
use crate::progress::ProgressState;
use crate::sink::InputResult;
use crate::task_queue::TaskHandle;
use crate::timestamps::ConstantRateTimestamps;

/// Turns a still image into a video track of constant frame rate.
///
/// The bitmap is decoded off the queue. Once it arrives the loader announces
/// the track, obtains the sink and queues the image for every timestamp in one
/// call, retrying while the sink answers `TRY_AGAIN_LATER`.
pub struct ImageAssetLoader {
    shell: LoaderShell<ImageState>,
    state: Option<ImageState>,
    duration_us: u64,
}

struct ImageState {
    ctx: LoaderContext,
    bitmap_loader: Option<Box<dyn BitmapLoader>>,
    timestamps: ConstantRateTimestamps,
    bitmap: Option<Bitmap>,
    format: Option<Format>,
}

impl ImageAssetLoader {
    /// Loader showing the image from `bitmap_loader` for `duration_us` at
    /// `frame_rate` frames per second.
    ///
    /// # Panics
    ///
    /// Panics if `frame_rate` is not positive.
    pub fn new(
        bitmap_loader: Box<dyn BitmapLoader>,
        duration_us: u64,
        frame_rate: f32,
        listener: Arc<dyn AssetLoaderListener>,
        options: LoaderOptions,
    ) -> Self {
        let shell = LoaderShell::new("cadenza-image-loader", listener);
        let state = ImageState {
            ctx: shell.context(&options),
            bitmap_loader: Some(bitmap_loader),
            timestamps: ConstantRateTimestamps::new(duration_us, frame_rate),
            bitmap: None,
            format: None,
        };
        Self {
            shell,
            state: Some(state),
            duration_us,
        }
    }
}

impl AssetLoader for ImageAssetLoader {
    fn start(&mut self) {
        let Some(state) = self.state.take() else {
            panic!("image asset loader started twice");
        };
        self.shell
            .launch(state, self.duration_us, 1, ImageState::decode);
    }

    fn progress(&self) -> ProgressState {
        self.shell.progress()
    }

    fn release(&mut self) {
        self.shell.release();
    }
}

impl ImageState {
    fn decode(&mut self, queue: &TaskHandle<Self>) {
        if self.ctx.is_stopped() {
            return;
        }
        let Some(loader) = self.bitmap_loader.take() else {
            return;
        };
        let spawned =
            queue.spawn_blocking("cadenza-image-decode", move || loader.load(), Self::on_decoded);
        if let Err(err) = spawned {
            self.ctx.fail(ExportError::io(err));
        }
    }

    fn on_decoded(&mut self, queue: &TaskHandle<Self>, decoded: Result<Bitmap, ExportError>) {
        if self.ctx.is_stopped() {
            return;
        }
        let bitmap = match decoded {
            Ok(bitmap) => bitmap,
            Err(err) => return self.ctx.fail(err),
        };
        debug!(width = bitmap.width(), height = bitmap.height(), "bitmap decoded");

        let format = Format::builder()
            .sample_mime_type(mime::IMAGE_RAW)
            .width(bitmap.width())
            .height(bitmap.height())
            .frame_rate(self.timestamps.frame_rate())
            .color_info(ColorInfo::SDR_BT709_LIMITED)
            .build();
        self.ctx
            .listener
            .on_track_added(&format, SupportedOutputs::DECODED);
        self.bitmap = Some(bitmap);
        self.format = Some(format);
        self.queue_bitmap(queue);
    }

    fn queue_bitmap(&mut self, queue: &TaskHandle<Self>) {
        self.ctx.retry.fired();
        if self.ctx.is_stopped() {
            return;
        }
        let (Some(bitmap), Some(format)) = (&self.bitmap, &self.format) else {
            return;
        };
        let sink = match self.ctx.sink_for(format) {
            Ok(Some(sink)) => sink,
            Ok(None) => return self.ctx.retry(queue, Self::queue_bitmap),
            Err(err) => return self.ctx.fail(err),
        };

        let queued = sink.lock().queue_bitmap(bitmap, &self.timestamps);
        match queued {
            Ok(InputResult::Success) => self.ctx.end_track(&sink, TrackType::Video),
            Ok(InputResult::TryAgainLater) => self.ctx.retry(queue, Self::queue_bitmap),
            Ok(InputResult::EndOfStream) => self.ctx.complete(),
            Err(err) => self.ctx.fail(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportSession;
    use crate::muxer::MemoryMuxer;
    use std::time::Duration;

    #[test]
    fn start_twice_panics() {
        let session = ExportSession::new(MemoryMuxer::new());
        let mut loader = ImageAssetLoader::new(
            Box::new(Bitmap::solid(1, 1, [0; 4])),
            1_000_000,
            1.0,
            session,
            LoaderOptions::default(),
        );
        loader.start();
        let second = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| loader.start()));
        assert!(second.is_err());
        loader.release();
    }

    #[test]
    fn progress_reaches_full() {
        let session = ExportSession::new(MemoryMuxer::new());
        let mut loader = ImageAssetLoader::new(
            Box::new(Bitmap::solid(2, 2, [9; 4])),
            500_000,
            10.0,
            session.clone(),
            LoaderOptions {
                retry_interval: Duration::from_millis(1),
                ..LoaderOptions::default()
            },
        );
        assert_eq!(loader.progress(), ProgressState::NotStarted);
        loader.start();
        session.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(loader.progress(), ProgressState::Available(100));
        let frames = session
            .handshake()
            .lock()
            .muxer()
            .track(TrackType::Video)
            .map(|t| t.samples.len());
        assert_eq!(frames, Some(5));
    }
}
