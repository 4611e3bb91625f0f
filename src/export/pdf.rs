use crate::error::ExportResult;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// A4 in PostScript points, portrait.
pub const A4_POINTS: (f32, f32) = (595.28, 841.89);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PageSize {
    /// A4, landscape when the picture is wider than tall.
    #[default]
    A4,
    /// One point per document unit.
    Fit,
}

impl PageSize {
    fn points(self, image_w: f32, image_h: f32) -> (f32, f32) {
        match self {
            PageSize::A4 => {
                let (short, long) = A4_POINTS;
                if image_w > image_h {
                    (long, short)
                } else {
                    (short, long)
                }
            }
            PageSize::Fit => (image_w, image_h),
        }
    }
}

/// Builds a one-page PDF showing `jpeg` centred and scaled to fit the page.
/// `doc_w`/`doc_h` give the picture's aspect in document units.
pub fn single_page_pdf(
    jpeg: Vec<u8>,
    pixel_w: u32,
    pixel_h: u32,
    doc_w: f32,
    doc_h: f32,
    page: PageSize,
) -> ExportResult<Vec<u8>> {
    let (page_w, page_h) = page.points(doc_w, doc_h);
    let fit = (page_w / doc_w).min(page_h / doc_h);
    let draw_w = doc_w * fit;
    let draw_h = doc_h * fit;
    let x = (page_w - draw_w) * 0.5;
    let y = (page_h - draw_h) * 0.5;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => pixel_w as i64,
            "Height" => pixel_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
    .with_compression(false);
    let image_id = doc.add_object(image);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    draw_w.into(),
                    0f32.into(),
                    0f32.into(),
                    draw_h.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0f32.into(), 0f32.into(), page_w.into(), page_h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1_i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_follows_aspect() {
        assert_eq!(PageSize::A4.points(200.0, 100.0), (A4_POINTS.1, A4_POINTS.0));
        assert_eq!(PageSize::A4.points(100.0, 200.0), A4_POINTS);
        assert_eq!(PageSize::Fit.points(100.0, 50.0), (100.0, 50.0));
    }

    #[test]
    fn writes_a_loadable_single_page() {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let jpeg = crate::export::raster::encode_jpeg(&img, 80).unwrap();
        let bytes = single_page_pdf(jpeg, 4, 4, 100.0, 100.0, PageSize::A4).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let parsed = Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }
}
