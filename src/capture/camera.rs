//! Camera frame source backed by a GStreamer pipeline
//!
//! `v4l2src ! videoconvert ! appsink(video/x-raw,format=RGBA)`. The pipeline
//! stays in Playing while the source is open so the capture screen behaves
//! like a live view; `grab` pulls the newest buffered frame.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbaImage;

use super::source::FrameSource;
use crate::config::CameraConfig;
use crate::error::FlowError;

pub struct CameraSource {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    device: String,
    frame_timeout: gst::ClockTime,
}

impl CameraSource {
    /// Open the device and start streaming
    pub fn open(config: &CameraConfig) -> Result<Self, FlowError> {
        gst::init().map_err(|e| device_error("Failed to initialize GStreamer", e))?;

        let pipeline = gst::Pipeline::new();

        let source = gst::ElementFactory::make("v4l2src")
            .property("device", config.device.as_str())
            .build()
            .map_err(|e| device_error("Failed to create v4l2src element", e))?;

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| device_error("Failed to create videoconvert element", e))?;

        let mut caps = gst::Caps::builder("video/x-raw").field("format", "RGBA");
        if let Some(width) = config.width {
            caps = caps.field("width", width as i32);
        }
        if let Some(height) = config.height {
            caps = caps.field("height", height as i32);
        }
        let caps = caps.build();

        // Keep only the newest frame so a grab never returns a stale one
        let appsink = gst_app::AppSink::builder()
            .name("booth-sink")
            .caps(&caps)
            .max_buffers(1)
            .drop(true)
            .build();

        pipeline
            .add_many([&source, &videoconvert, appsink.upcast_ref()])
            .map_err(|e| device_error("Failed to assemble camera pipeline", e))?;
        gst::Element::link_many([&source, &videoconvert, appsink.upcast_ref()])
            .map_err(|e| device_error("Failed to link camera pipeline", e))?;

        let camera = Self {
            pipeline,
            appsink,
            device: config.device.clone(),
            frame_timeout: gst::ClockTime::from_seconds(config.frame_timeout_secs.max(1)),
        };

        if camera.pipeline.set_state(gst::State::Playing).is_err() {
            let reason = camera
                .bus_error()
                .unwrap_or_else(|| format!("cannot start {}", camera.device));
            return Err(FlowError::Device(reason));
        }
        log::info!("Camera {} streaming", camera.device);

        for _ in 0..config.warmup_frames {
            camera.pull()?;
        }
        Ok(camera)
    }

    fn pull(&self) -> Result<gst::Sample, FlowError> {
        self.appsink
            .try_pull_sample(self.frame_timeout)
            .ok_or_else(|| {
                FlowError::Device(self.bus_error().unwrap_or_else(|| {
                    format!(
                        "no frame from {} within {}s",
                        self.device,
                        self.frame_timeout.seconds()
                    )
                }))
            })
    }

    /// First pending error on the pipeline bus, if any
    fn bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(err) => Some(format!(
                "{} ({})",
                err.error(),
                err.debug().unwrap_or_default()
            )),
            _ => None,
        }
    }
}

impl FrameSource for CameraSource {
    fn grab(&mut self) -> Result<RgbaImage, FlowError> {
        let sample = self.pull()?;
        let caps = sample
            .caps()
            .ok_or_else(|| FlowError::Device("frame without caps".to_string()))?;
        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| device_error("Unsupported frame caps", e))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| FlowError::Device("frame without buffer".to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|e| device_error("Failed to map frame", e))?;

        let (width, height) = (info.width(), info.height());
        let stride = info.stride()[0].max(0) as usize;
        let pixels = pack_rows(map.as_slice(), width, height, stride).ok_or_else(|| {
            FlowError::Device(format!(
                "short frame: {} bytes for {}x{} stride {}",
                map.size(),
                width,
                height,
                stride
            ))
        })?;
        log::debug!("Grabbed {}x{} frame from {}", width, height, self.device);

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| FlowError::Device("frame size mismatch".to_string()))
    }

    fn describe(&self) -> String {
        format!("camera {}", self.device)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            log::warn!("Failed to stop camera pipeline: {}", e);
        }
    }
}

/// Copy `height` rows of tightly packed RGBA out of a strided buffer
fn pack_rows(data: &[u8], width: u32, height: u32, stride: usize) -> Option<Vec<u8>> {
    let row = width as usize * 4;
    let height = height as usize;
    if height == 0 || row == 0 {
        return Some(Vec::new());
    }
    if stride < row || data.len() < stride * (height - 1) + row {
        return None;
    }
    let mut pixels = Vec::with_capacity(row * height);
    for y in 0..height {
        let start = y * stride;
        pixels.extend_from_slice(&data[start..start + row]);
    }
    Some(pixels)
}

fn device_error(what: &str, err: impl std::fmt::Display) -> FlowError {
    FlowError::Device(format!("{}: {}", what, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_rows_drops_padding() {
        // 1x2 RGBA with 8-byte stride (4 bytes padding per row)
        let data = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0];
        let packed = pack_rows(&data, 1, 2, 8).unwrap();
        assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_pack_rows_last_row_may_be_unpadded() {
        let data = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8];
        assert_eq!(pack_rows(&data, 1, 2, 8).unwrap().len(), 8);
    }

    #[test]
    fn test_pack_rows_rejects_short_buffer() {
        assert!(pack_rows(&[0; 7], 1, 2, 4).is_none());
        assert!(pack_rows(&[0; 16], 2, 1, 4).is_none());
    }

    #[test]
    fn test_missing_device_is_device_failure() {
        // Succeeds whether or not GStreamer plugins are installed
        let config = CameraConfig {
            device: "/dev/snapbooth-missing".to_string(),
            frame_timeout_secs: 1,
            ..CameraConfig::default()
        };
        if let Err(err) = CameraSource::open(&config) {
            assert!(matches!(err, FlowError::Device(_)));
        }
    }
}
