use crate::engine::assets::{decode_rgba, png_data_uri};
use crate::engine::filters::run_pipeline;
use crate::engine::geometry::object_matrix;
use crate::error::{ExportError, ExportResult};
use crate::model::{
    Background, Document, ImageData, ObjectKind, PathCommand, Point, Rgba, SceneObject, Style,
    TextAlign, TextStyle,
};
use crate::text_format;

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn rgba_to_svg_rgb(rgba: Rgba) -> (String, f32) {
    let opacity = (rgba.a as f32) / 255.0;
    (format!("rgb({},{},{})", rgba.r, rgba.g, rgba.b), opacity)
}

fn dasharray(dash: &[f32]) -> Option<String> {
    if dash.is_empty() {
        return None;
    }
    let parts: Vec<String> = dash.iter().map(|d| format!("{d:.3}")).collect();
    Some(parts.join(" "))
}

fn points_attr(points: &[Point]) -> String {
    let mut out = String::new();
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:.3},{:.3}", p.x, p.y));
    }
    out
}

fn path_data(commands: &[PathCommand]) -> String {
    let mut out = String::new();
    for (i, c) in commands.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        match *c {
            PathCommand::Move { to } => out.push_str(&format!("M {:.3} {:.3}", to.x, to.y)),
            PathCommand::Line { to } => out.push_str(&format!("L {:.3} {:.3}", to.x, to.y)),
            PathCommand::Quad { ctrl, to } => out.push_str(&format!(
                "Q {:.3} {:.3} {:.3} {:.3}",
                ctrl.x, ctrl.y, to.x, to.y
            )),
            PathCommand::Cubic { ctrl1, ctrl2, to } => out.push_str(&format!(
                "C {:.3} {:.3} {:.3} {:.3} {:.3} {:.3}",
                ctrl1.x, ctrl1.y, ctrl2.x, ctrl2.y, to.x, to.y
            )),
            PathCommand::Close => out.push('Z'),
        }
    }
    out
}

fn svg_text_anchor(align: TextAlign) -> &'static str {
    match align {
        TextAlign::Left => "start",
        TextAlign::Center => "middle",
        TextAlign::Right => "end",
    }
}

fn paint_attrs(style: &Style) -> String {
    let fill = match style.fill {
        Some(rgba) if rgba.a > 0 => {
            let (rgb, opacity) = rgba_to_svg_rgb(rgba);
            format!(r#"fill="{rgb}" fill-opacity="{opacity:.3}""#)
        }
        _ => r#"fill="none""#.to_string(),
    };
    let stroke = &style.stroke;
    if stroke.width <= 0.0 || stroke.color.a == 0 {
        return format!(r#"{fill} stroke="none""#);
    }
    let (rgb, opacity) = rgba_to_svg_rgb(stroke.color);
    let mut attrs = format!(
        r#"{fill} stroke="{rgb}" stroke-opacity="{opacity:.3}" stroke-width="{:.3}" stroke-linejoin="round""#,
        stroke.width
    );
    if let Some(dash) = dasharray(&stroke.dash) {
        attrs.push_str(&format!(r#" stroke-dasharray="{dash}""#));
    }
    attrs
}

fn shadow_filter_id(object: &SceneObject) -> String {
    format!("shadow_{}", object.id)
}

fn text_content(text: &str, style: &TextStyle, box_width: f32) -> String {
    let x = text_format::anchor_x(box_width, style.align);
    let line_height = text_format::line_height(style);
    let mut out = String::new();
    for (i, line) in text_format::lines(text).iter().enumerate() {
        // Baseline sits at roughly 80% of the em box inside each line.
        let y = line_height * i as f32 + (line_height - style.font_size) * 0.5 + style.font_size * 0.8;
        out.push_str(&format!(
            r#"<tspan x="{x:.3}" y="{y:.3}" xml:space="preserve">{}</tspan>"#,
            escape_xml(line)
        ));
    }
    out
}

/// Embedded image source with its filter list baked into the pixels.
fn filtered_image_href(image: &ImageData) -> ExportResult<String> {
    if image.filters.is_empty() {
        return Ok(image.src.clone());
    }
    let pixels = decode_rgba(&image.src).map_err(ExportError::Filter)?;
    let filtered = run_pipeline(&pixels, &image.filters);
    Ok(png_data_uri(&filtered)?)
}

struct SvgWriter {
    defs: String,
    body: String,
}

impl SvgWriter {
    fn object(&mut self, object: &SceneObject) -> ExportResult<()> {
        if !object.visible {
            return Ok(());
        }
        let mut attrs = format!(r#"transform="{}""#, object_matrix(object).to_svg());
        if object.style.opacity < 1.0 {
            attrs.push_str(&format!(r#" opacity="{:.3}""#, object.style.opacity.max(0.0)));
        }
        if let Some(shadow) = object.style.shadow {
            let id = shadow_filter_id(object);
            let (rgb, opacity) = rgba_to_svg_rgb(shadow.color);
            self.defs.push_str(&format!(
                r#"<filter id="{id}" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="{:.3}" dy="{:.3}" stdDeviation="{:.3}" flood-color="{rgb}" flood-opacity="{opacity:.3}"/></filter>"#,
                shadow.offset_x,
                shadow.offset_y,
                shadow.blur * 0.5
            ));
            self.defs.push('\n');
            attrs.push_str(&format!(r#" filter="url(#{id})""#));
        }
        self.body
            .push_str(&format!(r#"<g data-id="{}" {attrs}>"#, object.id));
        self.body.push('\n');

        let paint = paint_attrs(&object.style);
        match &object.kind {
            ObjectKind::Rect {
                width,
                height,
                corner_radius,
            } => {
                self.body.push_str(&format!(
                    r#"<rect x="0" y="0" width="{width:.3}" height="{height:.3}" rx="{corner_radius:.3}" {paint}/>"#
                ));
            }
            ObjectKind::Ellipse { width, height } => {
                self.body.push_str(&format!(
                    r#"<ellipse cx="{:.3}" cy="{:.3}" rx="{:.3}" ry="{:.3}" {paint}/>"#,
                    width * 0.5,
                    height * 0.5,
                    width * 0.5,
                    height * 0.5
                ));
            }
            ObjectKind::Polygon { points } => {
                self.body.push_str(&format!(
                    r#"<polygon points="{}" {paint}/>"#,
                    points_attr(points)
                ));
            }
            ObjectKind::Path { commands } => {
                self.body.push_str(&format!(
                    r#"<path d="{}" {paint} stroke-linecap="round"/>"#,
                    path_data(commands)
                ));
            }
            ObjectKind::Text { text, text_style } => {
                let (box_width, _) = text_format::measure(text, text_style);
                let weight = if text_style.bold { "bold" } else { "normal" };
                let font_style = if text_style.italic { "italic" } else { "normal" };
                let decoration = if text_style.underline {
                    r#" text-decoration="underline""#
                } else {
                    ""
                };
                self.body.push_str(&format!(
                    r#"<text font-size="{:.3}" font-family="{}" font-weight="{weight}" font-style="{font_style}" text-anchor="{}"{decoration} {paint}>{}</text>"#,
                    text_style.font_size,
                    escape_xml(&text_style.font_family),
                    svg_text_anchor(text_style.align),
                    text_content(text, text_style, box_width)
                ));
            }
            ObjectKind::Image { image } => {
                let href = filtered_image_href(image)?;
                self.body.push_str(&format!(
                    r#"<image x="0" y="0" width="{:.3}" height="{:.3}" preserveAspectRatio="none" xlink:href="{}"/>"#,
                    image.width,
                    image.height,
                    escape_xml(&href)
                ));
            }
            ObjectKind::Group { children } => {
                for child in children {
                    self.object(child)?;
                }
            }
            ObjectKind::Connector(connector) => {
                for part in &connector.parts {
                    self.object(part)?;
                }
            }
        }
        self.body.push('\n');
        self.body.push_str("</g>\n");
        Ok(())
    }
}

fn background_svg(doc: &Document) -> String {
    match &doc.background {
        Background::Transparent => String::new(),
        Background::Color { color } => {
            let (rgb, opacity) = rgba_to_svg_rgb(*color);
            format!(
                r#"<rect x="0" y="0" width="{:.3}" height="{:.3}" fill="{rgb}" fill-opacity="{opacity:.3}"/>"#,
                doc.width, doc.height
            ) + "\n"
        }
        Background::Image { src } => format!(
            r#"<image x="0" y="0" width="{:.3}" height="{:.3}" preserveAspectRatio="xMidYMid slice" xlink:href="{}"/>"#,
            doc.width,
            doc.height,
            escape_xml(src)
        ) + "\n",
    }
}

/// Renders the whole document at its own size: viewBox `0 0 width height`,
/// background first, then every visible object in z-order.
pub fn document_to_svg(doc: &Document) -> ExportResult<String> {
    let mut writer = SvgWriter {
        defs: String::new(),
        body: String::new(),
    };
    for object in &doc.objects {
        writer.object(object)?;
    }

    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 {w:.3} {h:.3}" width="{w:.3}" height="{h:.3}">"#,
        w = doc.width,
        h = doc.height
    ));
    out.push('\n');
    out.push_str("<defs>\n");
    out.push_str(&writer.defs);
    out.push_str("</defs>\n");
    out.push_str(&background_svg(doc));
    out.push_str(&writer.body);
    out.push_str("</svg>\n");
    Ok(out)
}
