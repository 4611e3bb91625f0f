//! 2D affine math, bounds and hit testing.
//!
//! Matrices follow the SVG convention `[a b c d e f]`:
//! `x' = a·x + c·y + e`, `y' = b·x + d·y + f`. An object's matrix is
//! `T(left, top) · R(angle) · S(scale) · Kx(skew_x) · Ky(skew_y) · F`, where `F`
//! mirrors about the centre of the object's local bounds when a flip flag is
//! set.

use crate::model::{self, Document, ObjectId, ObjectKind, SceneObject, Transform};
use crate::text_format;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn rotate_degrees(angle: f32) -> Self {
        let (sin, cos) = angle.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn skew_x_degrees(angle: f32) -> Self {
        Self {
            c: angle.to_radians().tan(),
            ..Self::IDENTITY
        }
    }

    pub fn skew_y_degrees(angle: f32) -> Self {
        Self {
            b: angle.to_radians().tan(),
            ..Self::IDENTITY
        }
    }

    /// `self · other`: `other` is applied first.
    pub fn multiply(self, other: Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() <= f32::EPSILON || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Matrix {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    pub fn apply(&self, p: egui::Pos2) -> egui::Pos2 {
        egui::pos2(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    pub fn apply_vec(&self, v: egui::Vec2) -> egui::Vec2 {
        egui::vec2(self.a * v.x + self.c * v.y, self.b * v.x + self.d * v.y)
    }

    /// Geometric mean of the axis scales, used to convert distances.
    pub fn mean_scale(&self) -> f32 {
        self.determinant().abs().sqrt()
    }

    pub fn to_svg(&self) -> String {
        format!(
            "matrix({:.6} {:.6} {:.6} {:.6} {:.4} {:.4})",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decomposed {
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub angle: f32,
    pub skew_x: f32,
    pub skew_y: f32,
}

pub fn compose(parent: Matrix, child: Matrix) -> Matrix {
    parent.multiply(child)
}

/// QR decomposition into `T · R · S · Kx`. `skew_y` is always zero.
pub fn decompose(m: Matrix) -> Decomposed {
    let angle = m.b.atan2(m.a);
    let denom = m.a * m.a + m.b * m.b;
    let scale_x = denom.sqrt();
    let (scale_y, skew_x) = if scale_x <= f32::EPSILON {
        (m.d, 0.0)
    } else {
        (
            m.determinant() / scale_x,
            (m.a * m.c + m.b * m.d).atan2(denom),
        )
    };
    Decomposed {
        translate_x: m.e,
        translate_y: m.f,
        scale_x,
        scale_y,
        angle: angle.to_degrees(),
        skew_x: skew_x.to_degrees(),
        skew_y: 0.0,
    }
}

/// Writes a decomposition into `t`, keeping its flip flags.
pub fn apply_decomposed(t: &mut Transform, d: Decomposed) {
    t.left = d.translate_x;
    t.top = d.translate_y;
    t.scale_x = d.scale_x;
    t.scale_y = d.scale_y;
    t.angle = d.angle;
    t.skew_x = d.skew_x;
    t.skew_y = d.skew_y;
}

fn flip_matrix(t: &Transform, local: egui::Rect) -> Matrix {
    if !t.flip_x && !t.flip_y {
        return Matrix::IDENTITY;
    }
    let c = local.center();
    let sx = if t.flip_x { -1.0 } else { 1.0 };
    let sy = if t.flip_y { -1.0 } else { 1.0 };
    Matrix::translate(c.x, c.y)
        .multiply(Matrix::scale(sx, sy))
        .multiply(Matrix::translate(-c.x, -c.y))
}

fn unflipped_matrix(t: &Transform) -> Matrix {
    Matrix::translate(t.left, t.top)
        .multiply(Matrix::rotate_degrees(t.angle))
        .multiply(Matrix::scale(t.scale_x, t.scale_y))
        .multiply(Matrix::skew_x_degrees(t.skew_x))
        .multiply(Matrix::skew_y_degrees(t.skew_y))
}

pub fn transform_matrix(t: &Transform, local: egui::Rect) -> Matrix {
    unflipped_matrix(t).multiply(flip_matrix(t, local))
}

/// Object space → parent space. Connectors live directly in parent space.
pub fn object_matrix(object: &SceneObject) -> Matrix {
    match &object.kind {
        ObjectKind::Connector(_) => Matrix::IDENTITY,
        _ => transform_matrix(&object.transform, local_bounds(object)),
    }
}

/// Matrix that, decomposed, gives the transform reproducing `world` for
/// `object` with its current flip flags.
pub fn flip_corrected(world: Matrix, object: &SceneObject) -> Matrix {
    world.multiply(flip_matrix(&object.transform, local_bounds(object)))
}

/// Object space → scene space, through every ancestor group.
pub fn world_matrix(doc: &Document, id: ObjectId) -> Option<Matrix> {
    let ancestors = doc.ancestors_of(id)?;
    let mut m = Matrix::IDENTITY;
    for group_id in ancestors {
        let group = doc.find(group_id)?;
        m = compose(m, object_matrix(group));
    }
    let object = doc.find(id)?;
    Some(compose(m, object_matrix(object)))
}

/// Corners of `id` in scene space, in `tl, tr, br, bl` order.
pub fn world_corners(doc: &Document, id: ObjectId) -> Option<[egui::Pos2; 4]> {
    let object = doc.find(id)?;
    Some(transformed_corners(object, world_matrix(doc, id)?))
}

pub fn world_bounds(doc: &Document, id: ObjectId) -> Option<egui::Rect> {
    Some(bounds_of(world_corners(doc, id)?))
}

pub fn bounds_of(points: impl IntoIterator<Item = egui::Pos2>) -> egui::Rect {
    let mut min = egui::pos2(f32::INFINITY, f32::INFINITY);
    let mut max = egui::pos2(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    if min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite() {
        egui::Rect::from_min_max(min, max)
    } else {
        egui::Rect::NOTHING
    }
}

/// Corners in `tl, tr, br, bl` order.
pub fn corners(rect: egui::Rect) -> [egui::Pos2; 4] {
    [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ]
}

/// Unscaled extent of the object in its own coordinate space.
pub fn local_bounds(object: &SceneObject) -> egui::Rect {
    match &object.kind {
        ObjectKind::Rect { width, height, .. } | ObjectKind::Ellipse { width, height } => {
            egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(*width, *height))
        }
        ObjectKind::Image { image } => {
            egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(image.width, image.height))
        }
        ObjectKind::Text { text, text_style } => {
            let (w, h) = text_format::measure(text, text_style);
            egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(w, h))
        }
        ObjectKind::Polygon { points } => bounds_of(points.iter().map(|p| p.to_pos2())),
        ObjectKind::Path { commands } => bounds_of(
            commands
                .iter()
                .flat_map(|c| c.points())
                .map(model::Point::to_pos2),
        ),
        ObjectKind::Group { children } => {
            let b = bounds_of(children.iter().flat_map(|c| corners(object_bounds(c))));
            if b.is_finite() {
                b
            } else {
                egui::Rect::from_min_size(egui::Pos2::ZERO, egui::Vec2::ZERO)
            }
        }
        ObjectKind::Connector(connector) => {
            let ends = [connector.endpoints.start(), connector.endpoints.end()];
            let parts = connector.parts.iter().flat_map(|p| corners(object_bounds(p)));
            bounds_of(ends.into_iter().chain(parts).filter(|p| p.x.is_finite()))
        }
    }
}

/// Intrinsic (unscaled) size, the reference for width/height edits.
pub fn intrinsic_size(object: &SceneObject) -> egui::Vec2 {
    local_bounds(object).size()
}

/// Corners of the local bounds mapped through `matrix`.
pub fn transformed_corners(object: &SceneObject, matrix: Matrix) -> [egui::Pos2; 4] {
    corners(local_bounds(object)).map(|p| matrix.apply(p))
}

/// Axis-aligned bounds in the parent's coordinate space.
pub fn object_bounds(object: &SceneObject) -> egui::Rect {
    match &object.kind {
        ObjectKind::Connector(_) => local_bounds(object),
        _ => bounds_of(transformed_corners(object, object_matrix(object))),
    }
}

pub fn selection_bounds<'a>(objects: impl IntoIterator<Item = &'a SceneObject>) -> egui::Rect {
    bounds_of(objects.into_iter().flat_map(|o| corners(object_bounds(o))))
}

/// Moves an object in its parent space. Connectors move their endpoints and
/// every composite part by exactly `delta`.
pub fn translate_object(object: &mut SceneObject, delta: egui::Vec2) {
    object.transform.left += delta.x;
    object.transform.top += delta.y;
    if let ObjectKind::Connector(connector) = &mut object.kind {
        connector.endpoints = connector.endpoints.translated(delta);
        for part in &mut connector.parts {
            translate_object(part, delta);
        }
    }
}

pub fn distance_to_segment(p: egui::Pos2, a: egui::Pos2, b: egui::Pos2) -> f32 {
    let ab = b - a;
    let ap = p - a;
    let ab_len2 = ab.x * ab.x + ab.y * ab.y;
    if ab_len2 <= f32::EPSILON {
        return (p - a).length();
    }
    let t = ((ap.x * ab.x + ap.y * ab.y) / ab_len2).clamp(0.0, 1.0);
    let closest = a + ab * t;
    (p - closest).length()
}

pub fn distance_to_polyline(p: egui::Pos2, points: &[egui::Pos2]) -> f32 {
    match points {
        [] => f32::INFINITY,
        [only] => (p - *only).length(),
        _ => points
            .windows(2)
            .map(|w| distance_to_segment(p, w[0], w[1]))
            .fold(f32::INFINITY, f32::min),
    }
}

/// Zero when `p` is inside `rect`.
pub fn distance_to_rect(p: egui::Pos2, rect: egui::Rect) -> f32 {
    let dx = (rect.min.x - p.x).max(0.0).max(p.x - rect.max.x);
    let dy = (rect.min.y - p.y).max(0.0).max(p.y - rect.max.y);
    (dx * dx + dy * dy).sqrt()
}

/// Route of a connector in parent space: 2 points when straight, 3 when elbow.
pub fn connector_route(connector: &model::Connector) -> Vec<egui::Pos2> {
    let start = connector.endpoints.start();
    let end = connector.endpoints.end();
    match connector.routing_mode {
        model::RoutingMode::Straight => vec![start, end],
        model::RoutingMode::Elbow => vec![start, egui::pos2(start.x, end.y), end],
    }
}

/// `p` and `threshold` are in the object's parent space.
pub fn hit_test(object: &SceneObject, p: egui::Pos2, threshold: f32) -> bool {
    if !object.visible {
        return false;
    }
    match &object.kind {
        ObjectKind::Connector(connector) => {
            distance_to_polyline(p, &connector_route(connector))
                <= threshold + connector.stroke_width
        }
        ObjectKind::Ellipse { width, height } => {
            let m = object_matrix(object);
            let Some(inv) = m.invert() else {
                return false;
            };
            let local = inv.apply(p);
            let pad = threshold / m.mean_scale().max(f32::EPSILON);
            let rx = width * 0.5 + pad;
            let ry = height * 0.5 + pad;
            if rx <= f32::EPSILON || ry <= f32::EPSILON {
                return false;
            }
            let dx = (local.x - width * 0.5) / rx;
            let dy = (local.y - height * 0.5) / ry;
            dx * dx + dy * dy <= 1.0
        }
        _ => {
            let m = object_matrix(object);
            let Some(inv) = m.invert() else {
                return false;
            };
            let pad = threshold / m.mean_scale().max(f32::EPSILON);
            local_bounds(object).expand(pad).contains(inv.apply(p))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    Top,
    Right,
    Bottom,
    Left,
}

impl Port {
    pub const ALL: [Port; 4] = [Port::Top, Port::Right, Port::Bottom, Port::Left];
}

/// Edge midpoints of a top-level object's world corner quad. Connectors and
/// hidden objects have none. Recomputed from live geometry on every call.
pub fn ports(object: &SceneObject) -> Option<[(Port, egui::Pos2); 4]> {
    if !object.visible || matches!(object.kind, ObjectKind::Connector(_)) {
        return None;
    }
    // Flips map the quad onto itself; label edges without them so `Left`
    // stays the edge that was left before flipping.
    let [tl, tr, br, bl] = transformed_corners(object, unflipped_matrix(&object.transform));
    let mid = |a: egui::Pos2, b: egui::Pos2| a + (b - a) * 0.5;
    Some([
        (Port::Top, mid(tl, tr)),
        (Port::Right, mid(tr, br)),
        (Port::Bottom, mid(br, bl)),
        (Port::Left, mid(bl, tl)),
    ])
}

pub fn nearest_port(object: &SceneObject, p: egui::Pos2, radius: f32) -> Option<(Port, egui::Pos2)> {
    ports(object)?
        .into_iter()
        .map(|(port, pos)| (port, pos, (pos - p).length()))
        .filter(|(_, _, d)| *d <= radius)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(port, pos, _)| (port, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Style;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn rect(id: ObjectId, t: Transform) -> SceneObject {
        SceneObject::new(
            id,
            t,
            Style::default(),
            ObjectKind::Rect {
                width: 150.0,
                height: 100.0,
                corner_radius: 0.0,
            },
        )
    }

    #[test]
    fn world_corners_follow_the_group_chain() {
        let child = rect(2, Transform::at(10.0, 20.0));
        let group = SceneObject::new(
            1,
            Transform::at(100.0, 100.0),
            Style::default(),
            ObjectKind::Group {
                children: vec![child],
            },
        );
        let mut doc = Document::new(500.0, 500.0);
        doc.objects.push(group);
        let bounds = world_bounds(&doc, 2).unwrap();
        assert!(approx(bounds.min.x, 110.0) && approx(bounds.min.y, 120.0));
        assert!(world_corners(&doc, 99).is_none());
    }

    #[test]
    fn invert_round_trips_points() {
        let m = Matrix::translate(10.0, -4.0)
            .multiply(Matrix::rotate_degrees(33.0))
            .multiply(Matrix::scale(2.0, 0.5))
            .multiply(Matrix::skew_x_degrees(12.0));
        let inv = m.invert().unwrap();
        let p = egui::pos2(7.0, 3.0);
        let q = inv.apply(m.apply(p));
        assert!(approx(p.x, q.x) && approx(p.y, q.y));
    }

    #[test]
    fn decompose_recovers_components() {
        let t = Transform {
            left: 40.0,
            top: 25.0,
            scale_x: 1.5,
            scale_y: 0.75,
            angle: 30.0,
            skew_x: 10.0,
            ..Transform::default()
        };
        let d = decompose(unflipped_matrix(&t));
        assert!(approx(d.translate_x, 40.0));
        assert!(approx(d.translate_y, 25.0));
        assert!(approx(d.scale_x, 1.5));
        assert!(approx(d.scale_y, 0.75));
        assert!(approx(d.angle, 30.0));
        assert!(approx(d.skew_x, 10.0));
    }

    #[test]
    fn decompose_folds_skew_y_into_other_terms() {
        let t = Transform {
            skew_y: 20.0,
            angle: -15.0,
            ..Transform::default()
        };
        let m = unflipped_matrix(&t);
        let mut back = Transform::default();
        apply_decomposed(&mut back, decompose(m));
        let m2 = unflipped_matrix(&back);
        for (a, b) in [(m.a, m2.a), (m.b, m2.b), (m.c, m2.c), (m.d, m2.d)] {
            assert!(approx(a, b));
        }
    }

    #[test]
    fn flip_keeps_bounds_in_place() {
        let plain = rect(1, Transform::at(100.0, 100.0));
        let mut flipped = plain.clone();
        flipped.transform.flip_x = true;
        assert_eq!(object_bounds(&plain), object_bounds(&flipped));
    }

    #[test]
    fn ports_are_edge_midpoints() {
        let r = rect(1, Transform::at(100.0, 100.0));
        let ports = ports(&r).unwrap();
        assert_eq!(ports[0], (Port::Top, egui::pos2(175.0, 100.0)));
        assert_eq!(ports[1], (Port::Right, egui::pos2(250.0, 150.0)));
        assert_eq!(ports[2], (Port::Bottom, egui::pos2(175.0, 200.0)));
        assert_eq!(ports[3], (Port::Left, egui::pos2(100.0, 150.0)));
    }

    #[test]
    fn hit_test_respects_rotation() {
        let r = rect(
            1,
            Transform {
                angle: 90.0,
                ..Transform::at(100.0, 100.0)
            },
        );
        // Rotated about its top-left corner the box now spans x 0..100.
        assert!(hit_test(&r, egui::pos2(50.0, 150.0), 0.0));
        assert!(!hit_test(&r, egui::pos2(200.0, 150.0), 0.0));
    }

    #[test]
    fn distance_to_rect_is_zero_inside() {
        let r = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(10.0, 10.0));
        assert_eq!(distance_to_rect(egui::pos2(5.0, 5.0), r), 0.0);
        assert!(approx(distance_to_rect(egui::pos2(13.0, 14.0), r), 5.0));
    }
}
