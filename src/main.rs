use anyhow::Result;
use clap::Parser;
use display_bridge::{log_error, log_info, log_warn, Options, StateManager};

const APP_NAME: &str = "display-bridge";

fn main() -> Result<()> {
    let result = run_app();
    if let Err(e) = &result {
        log_error!("Fatal: {:#}", e);
    }
    let _ = display_bridge::logger::finalize_logs();
    result
}

fn run_app() -> Result<()> {
    let options = Options::parse();

    let state = StateManager::new()?;

    let log_retention = state.read(|s| s.log_retention_count);
    display_bridge::logger::init_logger(state.logs_dir(), APP_NAME, log_retention, options.stream_logs)?;

    log_info!("Display Bridge {} starting", env!("CARGO_PKG_VERSION"));
    log_info!("Data directory: {}", state.app_data_dir().display());
    if let Some(problem) = state.load_problem() {
        log_warn!("Stored settings are unreadable ({}); using defaults", problem);
    }
    if let Some(log_path) = display_bridge::logger::get_log_path() {
        log_info!("Log file: {}", log_path.display());
    }
    if options.stream_logs {
        log_info!("Streaming mode enabled via --stream-logs");
    } else {
        log_info!("Buffered mode - logs will be written to file on exit");
    }

    let result = bridge::run(&state, &options);
    state.shutdown();
    result
}

#[cfg(windows)]
mod bridge {
    use anyhow::{Context, Result};
    use display_bridge::capture::camera::CameraSource;
    use display_bridge::capture::{CaptureProducer, CaptureRequest, FourCc, TestPatternSource};
    use display_bridge::control::{ControlLoop, Trigger};
    use display_bridge::platform::{AsyncKeyInput, FullscreenWindow, Win32EventPump};
    use display_bridge::presenter::D3D11Presenter;
    use display_bridge::state::KeyBindings;
    use display_bridge::{frame_ring, log_info, log_warn, Options, StateManager};

    pub fn run(state: &StateManager, options: &Options) -> Result<()> {
        let request = state.read(|s| options.capture_request(s));
        let control = state.read(|s| options.initial_control(s));
        let bindings = state.key_bindings();

        let (writer, mut reader) = frame_ring(request.width, request.height);

        let producer = if options.test_pattern {
            log_info!("Using synthetic test pattern");
            let (width, height, fps) = (request.width, request.height, request.fps);
            CaptureProducer::spawn(move || Ok(TestPatternSource::new(width, height, fps)), writer)
        } else {
            CaptureProducer::spawn(move || CameraSource::open(&request), writer)
        }
        .context("Failed to start capture")?;

        report_capture_info(&producer, &request, &bindings);

        let window = FullscreenWindow::create().context("Failed to create output window")?;

        let mut presenter = D3D11Presenter::new();
        // On failure the presenter has already released what it created; the
        // producer and window are torn down by their destructors.
        presenter.initialize(window.hwnd(), window.width(), window.height())?;

        let codec = producer.fourcc().to_string();
        let mut control_loop = ControlLoop::new(
            presenter,
            Win32EventPump,
            AsyncKeyInput::new(bindings),
            control,
            codec,
        );
        control_loop.run(&mut reader);
        let (mut presenter, final_state, _) = control_loop.into_parts();

        producer.stop();
        presenter.release();
        drop(window);

        state.update(|s| {
            s.vsync_enabled = final_state.vsync_enabled;
            s.overlay_visible = final_state.overlay_visible;
        });

        log_info!("Display Bridge stopped");
        Ok(())
    }

    fn report_capture_info(producer: &CaptureProducer, request: &CaptureRequest, bindings: &KeyBindings) {
        let format = producer.format();
        log_info!("=== Capture Info ===");
        log_info!("Device: {}", request.device);
        log_info!("Resolution: {}x{}", format.width, format.height);
        log_info!("Pixel format: {}", format.fourcc);
        log_info!("Target FPS: {:.0}", format.fps);
        for trigger in Trigger::ALL {
            log_info!("{} key: 0x{:02X}", trigger.label(), bindings.key_for(trigger));
        }

        if format.fourcc == FourCc::MJPG {
            log_warn!("Device delivers MJPG; decoding adds latency. Prefer a YUY2 mode.");
        }
        if (format.width, format.height) != (request.width, request.height) {
            log_warn!(
                "Requested {}x{}, device negotiated {}x{}",
                request.width,
                request.height,
                format.width,
                format.height
            );
        }
    }
}

#[cfg(not(windows))]
mod bridge {
    use anyhow::{bail, Result};
    use display_bridge::{log_error, Options, StateManager};

    pub fn run(_state: &StateManager, _options: &Options) -> Result<()> {
        log_error!("Display output requires Windows (Direct3D 11)");
        bail!("display output requires Windows")
    }
}
