//! Frames, cameras and frame storage

use image::{DynamicImage, RgbImage};
use lasertrace_core::{ActuationError, PersistenceError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// One captured RGB frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap an RGB image
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Convert any decoded image
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    /// Decode a frame from an image file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PersistenceError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let image = image::open(path).map_err(|e| PersistenceError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_dynamic(image))
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Underlying pixels
    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Frame source
pub trait Camera {
    /// Capture one frame
    fn capture(&mut self) -> Result<Frame>;
}

/// Camera driven by an external capture program
///
/// The program is run once per frame with `args`; the literal `{output}`
/// in any argument is replaced by the scratch file path, which the program
/// must write an image to. The scratch file is removed before every run so
/// a frame is never reused.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    scratch: PathBuf,
}

impl CommandCamera {
    /// Create a camera around `program`
    pub fn new(program: impl Into<String>, args: Vec<String>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            scratch: scratch.into(),
        }
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self) -> Result<Frame> {
        let scratch = self.scratch.display().to_string();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{output}", &scratch))
            .collect();

        match std::fs::remove_file(&self.scratch) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| ActuationError::CommandRejected {
                device: format!("camera {}", self.program),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(ActuationError::CommandRejected {
                device: format!("camera {}", self.program),
                reason: format!("capture exited with {}", status),
            }
            .into());
        }
        if !self.scratch.exists() {
            return Err(ActuationError::CommandRejected {
                device: format!("camera {}", self.program),
                reason: format!("capture wrote no image to {}", scratch),
            }
            .into());
        }

        let frame = Frame::load(&self.scratch)?;
        tracing::trace!("Captured {}x{} frame", frame.width(), frame.height());
        Ok(frame)
    }
}

/// Frame persistence
pub trait FrameSink {
    /// Store a frame under a logical name
    fn store(&mut self, name: &str, frame: &Frame) -> Result<PathBuf>;
}

/// Writes frames as `<dir>/<name>.png`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink into `dir`, created on first store
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSink for DirectorySink {
    fn store(&mut self, name: &str, frame: &Frame) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.png", name));
        frame
            .image()
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| PersistenceError::Write {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!("Stored frame {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("frames"));
        let frame = Frame::new(RgbImage::from_pixel(4, 3, Rgb([10, 200, 30])));

        let path = sink.store("angle_0", &frame).unwrap();
        assert!(path.ends_with("angle_0.png"));
        assert_eq!(Frame::load(&path).unwrap(), frame);
    }

    #[test]
    fn test_load_missing_frame() {
        let err = Frame::load("/nonexistent/frame.png").unwrap_err();
        assert!(err.is_persistence_error());
    }

    #[test]
    fn test_failing_capture_program() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = CommandCamera::new(
            "/nonexistent/capture-tool",
            vec!["{output}".to_string()],
            dir.path().join("scratch.png"),
        );
        let err = camera.capture().unwrap_err();
        assert!(err.to_string().contains("camera"));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_without_output_does_not_reuse_old_frame() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch.png");
        Frame::new(RgbImage::from_pixel(2, 2, Rgb([255, 255, 255])))
            .image()
            .save(&scratch)
            .unwrap();

        let mut camera = CommandCamera::new("true", vec!["{output}".to_string()], &scratch);
        let err = camera.capture().unwrap_err();
        assert!(err.to_string().contains("no image"));
        assert!(!scratch.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_program_output_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.png");
        let frame = Frame::new(RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])));
        frame.image().save(&source).unwrap();

        let mut camera = CommandCamera::new(
            "cp",
            vec![source.display().to_string(), "{output}".to_string()],
            dir.path().join("scratch.png"),
        );
        assert_eq!(camera.capture().unwrap(), frame);
        assert_eq!(camera.capture().unwrap(), frame);
    }
}
