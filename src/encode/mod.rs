pub mod ffmpeg;
pub mod reorder;

use std::path::{Path, PathBuf};

use crate::error::{AmusingError, AmusingResult};
use crate::render::Frame;

/// Consumer of finished frames. Frames arrive in strictly increasing index order.
pub trait VideoSink {
    fn write_frame(&mut self, frame: &Frame) -> AmusingResult<()>;

    fn finish(self: Box<Self>) -> AmusingResult<()>;
}

pub fn frame_png_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{:06}.png", index))
}

/// Writes a frame as `frame_NNNNNN.png`. Names derive from the index, so
/// workers can write concurrently without coordination.
pub fn write_frame_png(dir: &Path, frame: &Frame) -> AmusingResult<PathBuf> {
    let path = frame_png_path(dir, frame.index);
    image::save_buffer_with_format(
        &path,
        &frame.pixels,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .map_err(|e| AmusingError::encode(format!("failed to write '{}': {}", path.display(), e)))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_names_encode_index() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::filled(42, 3, 2, [10, 20, 30, 255]);
        let path = write_frame_png(dir.path(), &frame).unwrap();
        assert_eq!(path.file_name().unwrap(), "frame_000042.png");

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }
}
