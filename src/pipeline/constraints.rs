//! Local gate run before any remote call.

use std::io::Cursor;

use crate::config::PipelineSettings;
use crate::models::{ImageCandidate, ImageDimensions, ImageOutcome};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy)]
pub struct ImageConstraints {
    pub max_file_size: usize,
    pub min_width: u32,
}

impl ImageConstraints {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            max_file_size: settings.max_file_size,
            min_width: settings.min_image_width,
        }
    }

    /// Checks size, decodability and width, in that order. A failure is
    /// returned as the rejected outcome for the image.
    pub fn check(&self, candidate: &ImageCandidate) -> Result<ImageDimensions, ImageOutcome> {
        let size = candidate.byte_size();
        if size > self.max_file_size {
            return Err(ImageOutcome::rejected(
                &candidate.filename,
                format!(
                    "File is too large ({:.2} MB). Maximum size: {:.2} MB",
                    size as f64 / MIB,
                    self.max_file_size as f64 / MIB
                ),
            ));
        }

        let dimensions = read_dimensions(&candidate.bytes).ok_or_else(|| {
            ImageOutcome::rejected(
                &candidate.filename,
                "The file is not a valid image or is damaged",
            )
        })?;

        if dimensions.width < self.min_width {
            return Err(ImageOutcome::rejected(
                &candidate.filename,
                format!(
                    "The photo is too small. Minimum width: {}px. Actual: {}px",
                    self.min_width, dimensions.width
                ),
            ));
        }

        Ok(dimensions)
    }
}

fn read_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    reader.format()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(ImageDimensions { width, height })
}
