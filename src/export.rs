// Exporting a camera path as an image sequence

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::animation::CameraPath;
use crate::camera::CameraPose;
use crate::config::ExportConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Numbered PNG files
    #[default]
    Png,
    /// One looping animated GIF
    Gif,
}

/// Destination for rendered frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: RgbaImage) -> Result<()>;

    /// Flush everything and return where the output went.
    fn finish(self: Box<Self>) -> Result<PathBuf>;
}

pub struct PngSequence {
    directory: PathBuf,
    prefix: String,
    next: usize,
}

impl PngSequence {
    pub fn new(directory: &Path, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(directory)?;
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            next: 0,
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("{}_{index:05}.png", self.prefix))
    }
}

impl FrameSink for PngSequence {
    fn write_frame(&mut self, frame: RgbaImage) -> Result<()> {
        let path = self.frame_path(self.next);
        frame.save_with_format(&path, ImageFormat::Png)?;
        self.next += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<PathBuf> {
        log::info!("Wrote {} frames to {}", self.next, self.directory.display());
        Ok(self.directory)
    }
}

/// Streams frames into a single GIF that loops forever.
pub struct GifAnimation {
    path: PathBuf,
    encoder: GifEncoder<BufWriter<File>>,
    delay: Delay,
    frames: usize,
}

impl GifAnimation {
    pub fn new(directory: &Path, prefix: &str, fps: u32) -> Result<Self> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(format!("{prefix}.gif"));
        let file = BufWriter::new(File::create(&path)?);
        let mut encoder = GifEncoder::new_with_speed(file, 10);
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(Self {
            path,
            encoder,
            delay: Delay::from_numer_denom_ms(1000, fps.max(1)),
            frames: 0,
        })
    }
}

impl FrameSink for GifAnimation {
    fn write_frame(&mut self, frame: RgbaImage) -> Result<()> {
        self.encoder
            .encode_frame(Frame::from_parts(frame, 0, 0, self.delay))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<PathBuf> {
        let GifAnimation {
            path,
            encoder,
            frames,
            ..
        } = *self;
        // Dropping the encoder writes the GIF trailer
        drop(encoder);
        log::info!("Wrote {frames}-frame animation to {}", path.display());
        Ok(path)
    }
}

pub fn create_sink(config: &ExportConfig) -> Result<Box<dyn FrameSink>> {
    Ok(match config.format {
        ExportFormat::Png => Box::new(PngSequence::new(&config.directory, &config.prefix)?),
        ExportFormat::Gif => Box::new(GifAnimation::new(
            &config.directory,
            &config.prefix,
            config.fps,
        )?),
    })
}

/// Row pitch wgpu requires for texture-to-buffer copies of RGBA8 data.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strip per-row padding from a readback buffer.
pub fn unpad_rows(data: &[u8], width: u32, height: u32, padded_bytes_per_row: u32) -> Vec<u8> {
    let row = (width * 4) as usize;
    let padded = padded_bytes_per_row as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for chunk in data.chunks(padded).take(height as usize) {
        pixels.extend_from_slice(&chunk[..row.min(chunk.len())]);
    }
    pixels
}

pub fn bgra_to_rgba(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
}

/// A camera path being rendered frame by frame into a sink.
pub struct ExportJob {
    poses: Vec<CameraPose>,
    next: usize,
    sink: Option<Box<dyn FrameSink>>,
}

impl ExportJob {
    pub fn new(path: &CameraPath, config: &ExportConfig) -> Result<Self> {
        let poses: Vec<CameraPose> = path.frames(config.fps).collect();
        if poses.is_empty() {
            return Err(Error::Export(
                "camera path has no keyframes to export".to_string(),
            ));
        }
        let sink = create_sink(config)?;
        log::info!(
            "Exporting {} frames at {} fps as {:?} into {}",
            poses.len(),
            config.fps,
            config.format,
            config.directory.display()
        );
        Ok(Self::with_sink(poses, sink))
    }

    pub fn with_sink(poses: Vec<CameraPose>, sink: Box<dyn FrameSink>) -> Self {
        Self {
            poses,
            next: 0,
            sink: Some(sink),
        }
    }

    /// Pose for the frame that should be rendered next.
    pub fn next_pose(&self) -> Option<CameraPose> {
        self.poses.get(self.next).copied()
    }

    /// (frames written, total frames)
    pub fn progress(&self) -> (usize, usize) {
        (self.next, self.poses.len())
    }

    /// Hand over the frame rendered from [`ExportJob::next_pose`]. Returns
    /// the output location once the last frame has been written.
    pub fn push_frame(&mut self, frame: RgbaImage) -> Result<Option<PathBuf>> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| Error::Export("export already finished".to_string()))?;
        sink.write_frame(frame)?;
        self.next += 1;
        if self.next < self.poses.len() {
            return Ok(None);
        }
        match self.sink.take() {
            Some(sink) => sink.finish().map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Easing;
    use glam::Vec3;
    use image::{AnimationDecoder, Rgba};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scenecraft-export-{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn solid_frame(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(8, 6, Rgba([value, 255 - value, 0, 255]))
    }

    #[test]
    fn png_sequence_numbers_frames() {
        let dir = temp_dir("png");
        let mut sink = Box::new(PngSequence::new(&dir, "shot").unwrap());
        sink.write_frame(solid_frame(10)).unwrap();
        sink.write_frame(solid_frame(20)).unwrap();
        let second = sink.frame_path(1);
        assert_eq!(sink.finish().unwrap(), dir);

        assert!(dir.join("shot_00000.png").exists());
        let decoded = image::open(second).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 6));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([20, 235, 0, 255]));
    }

    #[test]
    fn gif_contains_every_frame() {
        let dir = temp_dir("gif");
        let mut sink = Box::new(GifAnimation::new(&dir, "orbit", 10).unwrap());
        for value in [0, 100, 200] {
            sink.write_frame(solid_frame(value)).unwrap();
        }
        let path = sink.finish().unwrap();

        let file = std::io::BufReader::new(File::open(path).unwrap());
        let decoder = image::codecs::gif::GifDecoder::new(file).unwrap();
        let frames = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(frames.len(), 3);
        let (numer, denom) = frames[0].delay().numer_denom_ms();
        assert_eq!(numer / denom, 100);
    }

    #[test]
    fn row_padding_is_removed() {
        let width = 3;
        let padded = padded_bytes_per_row(width);
        assert_eq!(padded, 256);
        let mut data = vec![0u8; (padded * 2) as usize];
        data[..12].copy_from_slice(&[1; 12]);
        data[256..268].copy_from_slice(&[2; 12]);
        let pixels = unpad_rows(&data, width, 2, padded);
        assert_eq!(pixels.len(), 24);
        assert!(pixels[..12].iter().all(|b| *b == 1));
        assert!(pixels[12..].iter().all(|b| *b == 2));
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn bgra_swizzle() {
        let mut pixels = vec![1, 2, 3, 4, 5, 6, 7, 8];
        bgra_to_rgba(&mut pixels);
        assert_eq!(pixels, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn job_finishes_after_last_frame() {
        let dir = temp_dir("job");
        let mut path = CameraPath::new(1.0, Easing::Linear);
        path.push(CameraPose::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 60.0));
        path.push(CameraPose::look_at(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, 60.0));
        let config = ExportConfig {
            directory: dir.clone(),
            fps: 2,
            ..ExportConfig::default()
        };

        let mut job = ExportJob::new(&path, &config).unwrap();
        assert_eq!(job.progress(), (0, 3));
        assert!(job.next_pose().is_some());
        assert_eq!(job.push_frame(solid_frame(1)).unwrap(), None);
        assert_eq!(job.push_frame(solid_frame(2)).unwrap(), None);
        assert_eq!(job.push_frame(solid_frame(3)).unwrap(), Some(dir.clone()));
        assert!(job.next_pose().is_none());
        assert!(job.push_frame(solid_frame(4)).is_err());
        assert!(dir.join("frame_00002.png").exists());
    }

    #[test]
    fn empty_path_cannot_be_exported() {
        let path = CameraPath::new(1.0, Easing::Linear);
        let config = ExportConfig {
            directory: temp_dir("empty"),
            ..ExportConfig::default()
        };
        assert!(matches!(ExportJob::new(&path, &config), Err(Error::Export(_))));
    }
}
