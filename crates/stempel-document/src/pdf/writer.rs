// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — wrap raster images in single-page PDF documents using
// `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::Path;

use image::DynamicImage;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use stempel_core::PaperSize;
use stempel_core::error::StempelError;
use tracing::{debug, info, instrument};

/// Resolution at which an image's pixel size maps to its native PDF size.
const IMAGE_DPI: f32 = 150.0;

/// Creates PDF documents from raster images.
pub struct PdfWriter {
    /// Paper size for page creation.
    paper_size: PaperSize,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

/// Where and how large an image lands on the page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Fit an image to the full page width, keeping its aspect ratio and centring
/// it vertically. Images that would then overflow the page height are fitted
/// to the height instead and centred horizontally.
pub fn fit_to_page(image_w: f32, image_h: f32, page_w: f32, page_h: f32) -> Placement {
    let mut scale = page_w / image_w;
    if image_h * scale > page_h {
        scale = page_h / image_h;
    }
    let width = image_w * scale;
    let height = image_h * scale;
    Placement {
        scale,
        x: (page_w - width) / 2.0,
        y: (page_h - height) / 2.0,
        width,
        height,
    }
}

impl PdfWriter {
    /// Create a new writer targeting the given paper size.
    pub fn new(paper_size: PaperSize) -> Self {
        Self {
            paper_size,
            title: None,
        }
    }

    /// Create a new writer defaulting to A4.
    pub fn a4() -> Self {
        Self::new(PaperSize::A4)
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    /// Create a single-page PDF containing the given image.
    ///
    /// Any alpha channel is dropped; the image is placed per [`fit_to_page`].
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn create_from_image(&self, image: &DynamicImage) -> Result<Vec<u8>, StempelError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(StempelError::ImageError(
                "cannot place an empty image on a page".into(),
            ));
        }

        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Stempel Image");

        info!(paper = ?self.paper_size, title, "Creating image PDF");

        let img_width = image.width() as usize;
        let img_height = image.height() as usize;

        // Convert to RGB8 for printpdf.
        let rgb_image = image.to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width: img_width,
            height: img_height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new(title);
        let xobject_id = doc.add_image(&raw);

        let img_w_pt = img_width as f32 / IMAGE_DPI * 72.0;
        let img_h_pt = img_height as f32 / IMAGE_DPI * 72.0;
        let placement = fit_to_page(
            img_w_pt,
            img_h_pt,
            page_w.into_pt().0,
            page_h.into_pt().0,
        );

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(placement.x)),
                translate_y: Some(Pt(placement.y)),
                scale_x: Some(placement.scale),
                scale_y: Some(placement.scale),
                dpi: Some(IMAGE_DPI),
                rotate: None,
            },
        }];

        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

        debug!(?placement, "Image placed on page");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

        Ok(output)
    }

    /// Create an image PDF and write it directly to a file.
    pub fn write_image_to_file(
        &self,
        image: &DynamicImage,
        path: impl AsRef<Path>,
    ) -> Result<(), StempelError> {
        let bytes = self.create_from_image(image)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote image PDF to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfReader;
    use image::{Rgb, RgbImage};

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 0.01, "{a} != {b}");
    }

    #[test]
    fn wide_image_spans_page_width_and_is_centred_vertically() {
        let p = fit_to_page(200.0, 100.0, 595.0, 842.0);
        assert_close(p.width, 595.0);
        assert_close(p.height, 297.5);
        assert_close(p.x, 0.0);
        assert_close(p.y, (842.0 - 297.5) / 2.0);
    }

    #[test]
    fn tall_image_is_fitted_to_page_height() {
        let p = fit_to_page(100.0, 400.0, 595.0, 842.0);
        assert_close(p.height, 842.0);
        assert_close(p.width, 210.5);
        assert_close(p.y, 0.0);
        assert_close(p.x, (595.0 - 210.5) / 2.0);
    }

    #[test]
    fn image_pdf_has_one_page() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([10, 200, 30])));
        let mut writer = PdfWriter::a4();
        writer.set_title("Receipt");

        let bytes = writer.create_from_image(&image).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(PdfReader::from_bytes(&bytes).unwrap().page_count(), 1);
    }

    #[test]
    fn write_image_to_file_creates_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let image = DynamicImage::ImageRgb8(RgbImage::new(16, 16));

        PdfWriter::new(PaperSize::Letter)
            .write_image_to_file(&image, &path)
            .unwrap();
        assert_eq!(PdfReader::open(&path).unwrap().page_count(), 1);
    }
}
