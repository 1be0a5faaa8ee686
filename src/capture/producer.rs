use super::{CaptureError, CaptureFormat, FourCc, VideoSource};
use crate::ring::FrameWriter;
use crate::{log_error, log_info, platform};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Owns the capture thread.
///
/// The source is opened on the capture thread itself, so device handles that
/// are not `Send` never cross threads; the negotiated format comes back over a
/// one-shot channel before `spawn` returns.
pub struct CaptureProducer {
    format: CaptureFormat,
    running: Arc<AtomicBool>,
    capture_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CaptureProducer {
    pub fn spawn<S, F>(open: F, mut writer: FrameWriter) -> Result<Self, CaptureError>
    where
        S: VideoSource,
        F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (format_tx, format_rx) = crossbeam_channel::bounded(1);

        let running_flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let mut source = match open() {
                    Ok(source) => source,
                    Err(e) => {
                        let _ = format_tx.send(Err(e));
                        return;
                    }
                };
                let _ = format_tx.send(Ok(source.format()));
                drop(format_tx);

                capture_loop(&mut source, &mut writer, &running_flag);
                // `source` drops here, releasing the device on its own thread.
            })
            .map_err(|e| CaptureError::Spawn(e.to_string()))?;

        match format_rx.recv() {
            Ok(Ok(format)) => Ok(Self {
                format,
                running,
                capture_thread: Mutex::new(Some(handle)),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::Disconnected)
            }
        }
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.format.width
    }

    pub fn height(&self) -> u32 {
        self.format.height
    }

    pub fn fps(&self) -> f64 {
        self.format.fps
    }

    pub fn fourcc(&self) -> FourCc {
        self.format.fourcc
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signals the capture loop to exit and joins it. Later calls are no-ops.
    ///
    /// Returns once the device's current blocking read has completed.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.capture_thread.lock().take() {
            if handle.join().is_err() {
                log_error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<S: VideoSource>(source: &mut S, writer: &mut FrameWriter, running: &AtomicBool) {
    platform::raise_capture_thread_priority();

    let format = source.format();
    log_info!(
        "Capture thread started ({}x{} @ {:.0} fps, {})",
        format.width,
        format.height,
        format.fps,
        format.fourcc
    );

    let mut skipped = 0u64;
    while running.load(Ordering::Acquire) {
        let filled = {
            let slot = writer.acquire_write_slot();
            matches!(source.read_frame(slot), Ok(true)) && !slot.is_empty()
        };

        // Devices drop frames transiently; a bad read is retried next pass.
        if filled {
            writer.publish();
        } else {
            skipped += 1;
        }
    }

    log_info!(
        "Capture thread stopped ({} frames published, {} reads skipped)",
        writer.published(),
        skipped
    );
}
