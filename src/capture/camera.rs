use super::convert::{decode_route, swap_red_blue, yuyv_to_bgr, DecodeRoute};
use super::{CaptureError, CaptureFormat, CaptureRequest, FourCc, VideoSource};
use crate::frame::Frame;
use crate::{log_info, log_warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;

/// Capture device opened through Media Foundation.
pub struct CameraSource {
    camera: Camera,
    format: CaptureFormat,
}

impl CameraSource {
    pub fn open(request: &CaptureRequest) -> Result<Self, CaptureError> {
        let open_error = |e: nokhwa::NokhwaError| CaptureError::Open {
            device: request.device,
            reason: e.to_string(),
        };

        let wanted = CameraFormat::new(
            Resolution::new(request.width, request.height),
            frame_format_for(request.fourcc),
            request.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));

        let mut camera = Camera::with_backend(
            CameraIndex::Index(request.device as u32),
            requested,
            ApiBackend::MediaFoundation,
        )
        .map_err(open_error)?;
        camera.open_stream().map_err(open_error)?;

        let negotiated = camera.camera_format();
        let format = CaptureFormat {
            width: negotiated.resolution().width(),
            height: negotiated.resolution().height(),
            fps: negotiated.frame_rate() as f64,
            fourcc: fourcc_for(negotiated.format()),
        };

        log_info!(
            "Opened capture device {} ({}): {}x{} @ {} fps, {}",
            request.device,
            camera.info().human_name(),
            format.width,
            format.height,
            format.fps,
            format.fourcc
        );
        if format.fourcc != request.fourcc {
            log_warn!(
                "Device negotiated {} instead of {}; expect extra decode latency",
                format.fourcc,
                request.fourcc
            );
        }

        Ok(Self { camera, format })
    }
}

impl VideoSource for CameraSource {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn read_frame(&mut self, dst: &mut Frame) -> Result<bool, CaptureError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CaptureError::Read(e.to_string()))?;

        let resolution = buffer.resolution();
        let (width, height) = (resolution.width(), resolution.height());
        let raw = buffer.buffer();
        if raw.is_empty() || width == 0 || height == 0 {
            return Ok(false);
        }

        match decode_route(fourcc_for(buffer.source_frame_format()))? {
            DecodeRoute::Yuyv => Ok(yuyv_to_bgr(raw, width, height, width as usize * 2, dst)),
            DecodeRoute::Library => {
                dst.resize(width, height);
                buffer
                    .decode_image_to_buffer::<RgbFormat>(dst.data_mut())
                    .map_err(|e| CaptureError::Read(e.to_string()))?;
                swap_red_blue(dst.data_mut());
                Ok(true)
            }
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log_warn!("Failed to stop capture stream: {}", e);
        }
    }
}

fn frame_format_for(fourcc: FourCc) -> FrameFormat {
    match fourcc {
        FourCc::MJPG => FrameFormat::MJPEG,
        FourCc::NV12 => FrameFormat::NV12,
        _ => FrameFormat::YUYV,
    }
}

fn fourcc_for(format: FrameFormat) -> FourCc {
    match format {
        FrameFormat::YUYV => FourCc::YUY2,
        FrameFormat::MJPEG => FourCc::MJPG,
        FrameFormat::NV12 => FourCc::NV12,
        FrameFormat::GRAY => FourCc::GREY,
        FrameFormat::RAWRGB => FourCc::RGB3,
        #[allow(unreachable_patterns)]
        _ => FourCc(*b"????"),
    }
}
