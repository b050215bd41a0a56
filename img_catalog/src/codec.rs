//! Image codec service
//!
//! The [`Codec`] trait is the seam between the pipeline and whatever decodes
//! sources and encodes the target format. Implementations:
//! - [`ImageCrateCodec`]: in-process via the `image` crate (PNG, JPEG, WebP, TIFF)
//! - [`HeifEncCodec`]: HEIC through the external `heif-enc` tool
//! - `LibheifCodec`: in-process HEIC through libheif (`libheif` feature)

use crate::config::ConvertConfig;
use crate::{CatalogError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use shared_utils::thread_manager::WorkloadType;
use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Heic,
    Png,
    Jpeg,
    Webp,
    Tiff,
}

impl TargetFormat {
    /// Extension written on outputs and into manifests (no dot).
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Heic => "heic",
            TargetFormat::Png => "png",
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Webp => "webp",
            TargetFormat::Tiff => "tiff",
        }
    }

    /// Whether a file with extension `ext` is already in this format.
    pub fn matches_extension(self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            TargetFormat::Heic => ext == "heic" || ext == "heif",
            TargetFormat::Jpeg => ext == "jpg" || ext == "jpeg",
            TargetFormat::Tiff => ext == "tiff" || ext == "tif",
            other => ext == other.extension(),
        }
    }

    /// The `image` crate format, for targets it can encode.
    pub fn image_format(self) -> Option<ImageFormat> {
        match self {
            TargetFormat::Heic => None,
            TargetFormat::Png => Some(ImageFormat::Png),
            TargetFormat::Jpeg => Some(ImageFormat::Jpeg),
            TargetFormat::Webp => Some(ImageFormat::WebP),
            TargetFormat::Tiff => Some(ImageFormat::Tiff),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heic" | "heif" => Ok(TargetFormat::Heic),
            "png" => Ok(TargetFormat::Png),
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "webp" => Ok(TargetFormat::Webp),
            "tiff" | "tif" => Ok(TargetFormat::Tiff),
            other => Err(CatalogError::UnsupportedTarget(other.to_string())),
        }
    }
}

/// Metadata embedded in the source container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub icc_profile: Option<Vec<u8>>,
    pub exif: Option<Vec<u8>>,
}

/// A decoded source image with the metadata read alongside it.
pub struct SourceImage {
    pub image: DynamicImage,
    pub metadata: ImageMetadata,
}

pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decode `src` together with its embedded metadata.
    fn open(&self, src: &Path) -> Result<SourceImage> {
        decode_with_metadata(src)
    }

    /// Create `dst`, write the single image into it and flush it to disk.
    fn write(&self, source: &SourceImage, dst: &Path) -> Result<()>;

    fn workload(&self) -> WorkloadType {
        WorkloadType::InProcess
    }
}

fn open_error(path: &Path, reason: impl fmt::Display) -> CatalogError {
    CatalogError::ImageOpen {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn create_error(path: &Path, reason: impl fmt::Display) -> CatalogError {
    CatalogError::DestinationCreate {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Decode with the `image` crate, reading ICC and EXIF before the pixels.
pub fn decode_with_metadata(src: &Path) -> Result<SourceImage> {
    let mut decoder = ImageReader::open(src)
        .map_err(|e| open_error(src, e))?
        .with_guessed_format()
        .map_err(|e| open_error(src, e))?
        .into_decoder()
        .map_err(|e| open_error(src, e))?;

    let metadata = ImageMetadata {
        icc_profile: decoder.icc_profile().map_err(|e| open_error(src, e))?,
        exif: decoder.exif_metadata().map_err(|e| open_error(src, e))?,
    };
    let image = DynamicImage::from_decoder(decoder).map_err(|e| open_error(src, e))?;

    Ok(SourceImage { image, metadata })
}

/// Convert pixels into a layout the target encoder accepts.
fn prepare_pixels(format: TargetFormat, image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match (format, image) {
        (TargetFormat::Jpeg, DynamicImage::ImageRgb8(_)) => Cow::Borrowed(image),
        (TargetFormat::Jpeg, _) => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        (TargetFormat::Webp, DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_)) => {
            Cow::Borrowed(image)
        }
        (TargetFormat::Webp | TargetFormat::Heic, _) if image.color().has_alpha() => {
            Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8()))
        }
        (TargetFormat::Webp | TargetFormat::Heic, _) => {
            Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8()))
        }
        _ => Cow::Borrowed(image),
    }
}

/// Encode `pixels` into `dst` with `encoder`, embedding the source ICC
/// profile and EXIF block wherever the encoder can carry them.
fn encode_with_metadata<E: ImageEncoder>(
    mut encoder: E,
    pixels: &DynamicImage,
    metadata: &ImageMetadata,
    dst: &Path,
) -> Result<()> {
    if let Some(icc) = &metadata.icc_profile {
        if let Err(e) = encoder.set_icc_profile(icc.clone()) {
            debug!(dst = %dst.display(), error = %e, "ICC profile not embedded");
        }
    }
    if let Some(exif) = &metadata.exif {
        if let Err(e) = encoder.set_exif_metadata(exif.clone()) {
            debug!(dst = %dst.display(), error = %e, "EXIF not embedded");
        }
    }
    encoder
        .write_image(
            pixels.as_bytes(),
            pixels.width(),
            pixels.height(),
            pixels.color().into(),
        )
        .map_err(|e| create_error(dst, e))
}

/// In-process encoder for the formats the `image` crate writes.
pub struct ImageCrateCodec {
    format: TargetFormat,
    quality: u8,
}

impl ImageCrateCodec {
    pub fn new(format: TargetFormat, quality: u8) -> Result<Self> {
        if format.image_format().is_none() {
            return Err(CatalogError::UnsupportedTarget(format.to_string()));
        }
        Ok(Self { format, quality })
    }
}

impl Codec for ImageCrateCodec {
    fn name(&self) -> &'static str {
        "image"
    }

    fn write(&self, source: &SourceImage, dst: &Path) -> Result<()> {
        let pixels = prepare_pixels(self.format, &source.image);
        let metadata = &source.metadata;
        let file = File::create(dst).map_err(|e| create_error(dst, e))?;
        let mut writer = BufWriter::new(file);

        match self.format {
            TargetFormat::Png => {
                encode_with_metadata(PngEncoder::new(&mut writer), &pixels, metadata, dst)?
            }
            TargetFormat::Jpeg => encode_with_metadata(
                JpegEncoder::new_with_quality(&mut writer, self.quality),
                &pixels,
                metadata,
                dst,
            )?,
            TargetFormat::Webp => encode_with_metadata(
                WebPEncoder::new_lossless(&mut writer),
                &pixels,
                metadata,
                dst,
            )?,
            TargetFormat::Tiff => {
                encode_with_metadata(TiffEncoder::new(&mut writer), &pixels, metadata, dst)?
            }
            TargetFormat::Heic => {
                return Err(CatalogError::UnsupportedTarget(self.format.to_string()))
            }
        }

        writer
            .into_inner()
            .map_err(|e| create_error(dst, e.error()))?
            .sync_all()
            .map_err(|e| create_error(dst, e))
    }
}

/// HEIC through the `heif-enc` command-line encoder (libheif examples).
pub struct HeifEncCodec {
    quality: u8,
}

impl HeifEncCodec {
    pub const TOOL: &'static str = "heif-enc";

    pub fn new(quality: u8) -> Result<Self> {
        if !shared_utils::is_command_available(Self::TOOL) {
            return Err(CatalogError::ToolNotFound(Self::TOOL.to_string()));
        }
        Ok(Self { quality })
    }

    /// heif-enc reads PNG, and takes the colour profile from its iCCP chunk.
    fn write_intermediate(source: &SourceImage, dst: &Path) -> Result<tempfile::NamedTempFile> {
        let mut intermediate = tempfile::Builder::new()
            .prefix("img_catalog_")
            .suffix(".png")
            .tempfile()
            .map_err(|e| create_error(dst, e))?;
        {
            let mut writer = BufWriter::new(intermediate.as_file_mut());
            encode_with_metadata(
                PngEncoder::new(&mut writer),
                &prepare_pixels(TargetFormat::Heic, &source.image),
                &source.metadata,
                dst,
            )?;
            writer.flush().map_err(|e| create_error(dst, e))?;
        }
        Ok(intermediate)
    }
}

impl Codec for HeifEncCodec {
    fn name(&self) -> &'static str {
        Self::TOOL
    }

    fn write(&self, source: &SourceImage, dst: &Path) -> Result<()> {
        let intermediate = Self::write_intermediate(source, dst)?;

        let quality = self.quality.to_string();
        let dst_str = dst.to_string_lossy();
        let src_str = intermediate.path().to_string_lossy();
        shared_utils::logging::execute_external_command_checked(
            Self::TOOL,
            &["-q", &quality, "-o", &dst_str, &src_str],
        )
        .map_err(|e| create_error(dst, e))?;

        if dst.is_file() {
            Ok(())
        } else {
            Err(create_error(dst, "encoder reported success but wrote no file"))
        }
    }

    fn workload(&self) -> WorkloadType {
        WorkloadType::ExternalEncoder
    }
}

#[cfg(feature = "libheif")]
pub use heif::LibheifCodec;

#[cfg(feature = "libheif")]
mod heif {
    use super::{create_error, prepare_pixels, Codec, SourceImage, TargetFormat};
    use crate::Result;
    use image::DynamicImage;
    use libheif_rs::{
        Channel, ColorProfileRaw, ColorProfileType, ColorSpace, CompressionFormat,
        EncoderQuality, HeifContext, Image, LibHeif, RgbChroma,
    };
    use std::path::Path;

    /// In-process HEVC encoding through libheif.
    pub struct LibheifCodec {
        quality: u8,
    }

    impl LibheifCodec {
        pub fn new(quality: u8) -> Self {
            Self { quality }
        }
    }

    impl Codec for LibheifCodec {
        fn name(&self) -> &'static str {
            "libheif"
        }

        fn write(&self, source: &SourceImage, dst: &Path) -> Result<()> {
            let pixels = prepare_pixels(TargetFormat::Heic, &source.image);
            let (width, height) = (pixels.width(), pixels.height());
            let (chroma, channels, raw): (RgbChroma, usize, &[u8]) = match pixels.as_ref() {
                DynamicImage::ImageRgba8(buf) => (RgbChroma::Rgba, 4, buf.as_raw()),
                DynamicImage::ImageRgb8(buf) => (RgbChroma::Rgb, 3, buf.as_raw()),
                _ => return Err(create_error(dst, "unexpected pixel layout")),
            };

            let mut image = Image::new(width, height, ColorSpace::Rgb(chroma))
                .map_err(|e| create_error(dst, e))?;
            image
                .create_plane(Channel::Interleaved, width, height, 8)
                .map_err(|e| create_error(dst, e))?;
            {
                let planes = image.planes_mut();
                let mut plane = planes
                    .interleaved
                    .ok_or_else(|| create_error(dst, "no interleaved plane"))?;
                let row_len = width as usize * channels;
                for (y, row) in raw.chunks_exact(row_len).enumerate() {
                    let start = y * plane.stride;
                    plane.data[start..start + row_len].copy_from_slice(row);
                }
            }
            if let Some(icc) = &source.metadata.icc_profile {
                let profile = ColorProfileRaw::new(ColorProfileType::PROF, icc.clone());
                image
                    .set_color_profile_raw(&profile)
                    .map_err(|e| create_error(dst, e))?;
            }

            let lib_heif = LibHeif::new();
            let mut context = HeifContext::new().map_err(|e| create_error(dst, e))?;
            let mut encoder = lib_heif
                .encoder_for_format(CompressionFormat::Hevc)
                .map_err(|e| create_error(dst, e))?;
            encoder
                .set_quality(EncoderQuality::Lossy(self.quality))
                .map_err(|e| create_error(dst, e))?;
            let handle = context
                .encode_image(&image, &mut encoder, None)
                .map_err(|e| create_error(dst, e))?;
            if let Some(exif) = &source.metadata.exif {
                context
                    .add_exif_metadata(&handle, exif)
                    .map_err(|e| create_error(dst, e))?;
            }
            context
                .write_to_file(&dst.to_string_lossy())
                .map_err(|e| create_error(dst, e))
        }
    }
}

/// Pick the codec for `config.target`.
pub fn codec_for(config: &ConvertConfig) -> Result<Arc<dyn Codec>> {
    match config.target {
        TargetFormat::Heic => heic_codec(config),
        other => Ok(Arc::new(ImageCrateCodec::new(other, config.quality)?)),
    }
}

#[cfg(feature = "libheif")]
fn heic_codec(config: &ConvertConfig) -> Result<Arc<dyn Codec>> {
    Ok(Arc::new(LibheifCodec::new(config.quality)))
}

#[cfg(not(feature = "libheif"))]
fn heic_codec(config: &ConvertConfig) -> Result<Arc<dyn Codec>> {
    Ok(Arc::new(HeifEncCodec::new(config.quality)?))
}
