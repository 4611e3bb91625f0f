use serde::{Deserialize, Serialize};

pub type ObjectId = u64;

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_pos2(p: egui::Pos2) -> Self {
        Self { x: p.x, y: p.y }
    }

    pub fn to_pos2(self) -> egui::Pos2 {
        egui::pos2(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut it = hex.chars().map(|c| c.to_digit(16).map(|v| (v * 17) as u8));
                Some(Self::rgb(it.next()??, it.next()??, it.next()??))
            }
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: channel(&hex[6..8])?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Dash pattern for a stroke, scaled by its width.
pub fn dash_pattern(line_style: LineStyle, stroke_width: f32) -> Vec<f32> {
    let w = stroke_width.max(1.0);
    match line_style {
        LineStyle::Solid => Vec::new(),
        LineStyle::Dashed => vec![w * 4.0, w * 2.5],
        LineStyle::Dotted => vec![w * 0.5, w * 2.0],
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba,
    pub width: f32,
    #[serde(default)]
    pub line_style: LineStyle,
    #[serde(default)]
    pub dash: Vec<f32>,
}

impl StrokeStyle {
    pub fn new(color: Rgba, width: f32, line_style: LineStyle) -> Self {
        Self {
            color,
            width,
            line_style,
            dash: dash_pattern(line_style, width),
        }
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width;
        self.dash = dash_pattern(self.line_style, width);
    }

    pub fn set_line_style(&mut self, line_style: LineStyle) {
        self.line_style = line_style;
        self.dash = dash_pattern(line_style, self.width);
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self::new(Rgba::rgb(30, 30, 30), 0.0, LineStyle::Solid)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Shadow {
    pub color: Rgba,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: Rgba {
                r: 0,
                g: 0,
                b: 0,
                a: 90,
            },
            blur: 10.0,
            offset_x: 4.0,
            offset_y: 4.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Style {
    pub fill: Option<Rgba>,
    pub stroke: StrokeStyle,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub shadow: Option<Shadow>,
}

fn default_opacity() -> f32 {
    1.0
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: Some(Rgba::rgb(0x4f, 0x7c, 0xf7)),
            stroke: StrokeStyle::default(),
            opacity: 1.0,
            shadow: None,
        }
    }
}

impl Style {
    pub fn stroked(color: Rgba, width: f32) -> Self {
        Self {
            fill: None,
            stroke: StrokeStyle::new(color, width, LineStyle::Solid),
            opacity: 1.0,
            shadow: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Transform {
    pub left: f32,
    pub top: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Degrees, clockwise in screen space.
    pub angle: f32,
    pub skew_x: f32,
    pub skew_y: f32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            flip_x: false,
            flip_y: false,
        }
    }
}

impl Transform {
    pub fn at(left: f32, top: f32) -> Self {
        Self {
            left,
            top,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextStyle {
    pub font_size: f32,
    pub font_family: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub align: TextAlign,
    pub line_height: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 32.0,
            font_family: "sans-serif".to_string(),
            bold: false,
            italic: false,
            underline: false,
            align: TextAlign::Left,
            line_height: 1.2,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    Brightness,
    Contrast,
    Saturation,
    HueRotation,
    Blur,
    Noise,
    Pixelate,
    Grayscale,
    Sepia,
    Invert,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub kind: FilterKind,
    /// Ignored for presence toggles.
    #[serde(default)]
    pub value: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageData {
    /// `data:` URI holding the original encoded bytes.
    pub src: String,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PathCommand {
    Move { to: Point },
    Line { to: Point },
    Quad { ctrl: Point, to: Point },
    Cubic { ctrl1: Point, ctrl2: Point, to: Point },
    Close,
}

impl PathCommand {
    pub fn points(&self) -> Vec<Point> {
        match *self {
            PathCommand::Move { to } | PathCommand::Line { to } => vec![to],
            PathCommand::Quad { ctrl, to } => vec![ctrl, to],
            PathCommand::Cubic { ctrl1, ctrl2, to } => vec![ctrl1, ctrl2, to],
            PathCommand::Close => Vec::new(),
        }
    }

    pub fn map_points(&mut self, mut f: impl FnMut(Point) -> Point) {
        match self {
            PathCommand::Move { to } | PathCommand::Line { to } => *to = f(*to),
            PathCommand::Quad { ctrl, to } => {
                *ctrl = f(*ctrl);
                *to = f(*to);
            }
            PathCommand::Cubic { ctrl1, ctrl2, to } => {
                *ctrl1 = f(*ctrl1);
                *ctrl2 = f(*ctrl2);
                *to = f(*to);
            }
            PathCommand::Close => {}
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    #[default]
    Straight,
    Elbow,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeadStyle {
    #[default]
    Filled,
    Outline,
    Open,
    Diamond,
    Circle,
    None,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Endpoints {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Endpoints {
    pub fn new(start: egui::Pos2, end: egui::Pos2) -> Self {
        Self {
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
        }
    }

    pub fn start(&self) -> egui::Pos2 {
        egui::pos2(self.x1, self.y1)
    }

    pub fn end(&self) -> egui::Pos2 {
        egui::pos2(self.x2, self.y2)
    }

    pub fn translated(self, delta: egui::Vec2) -> Self {
        Self {
            x1: self.x1 + delta.x,
            y1: self.y1 + delta.y,
            x2: self.x2 + delta.x,
            y2: self.y2 + delta.y,
        }
    }
}

/// A line or elbow polyline plus optional arrowheads.
///
/// `parts` is derived from the other fields by `engine::connector::rebuild`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Connector {
    pub endpoints: Endpoints,
    #[serde(default)]
    pub routing_mode: RoutingMode,
    #[serde(default)]
    pub line_style: LineStyle,
    #[serde(default)]
    pub head_style: HeadStyle,
    #[serde(default)]
    pub has_start_head: bool,
    pub color: Rgba,
    pub stroke_width: f32,
    #[serde(default)]
    pub parts: Vec<SceneObject>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectKind {
    Rect {
        width: f32,
        height: f32,
        #[serde(default)]
        corner_radius: f32,
    },
    Ellipse {
        width: f32,
        height: f32,
    },
    Polygon {
        points: Vec<Point>,
    },
    Path {
        commands: Vec<PathCommand>,
    },
    Text {
        text: String,
        #[serde(default)]
        text_style: TextStyle,
    },
    Image {
        image: ImageData,
    },
    Group {
        children: Vec<SceneObject>,
    },
    Connector(Connector),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SceneObject {
    pub id: ObjectId,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub style: Style,
    #[serde(default = "default_true")]
    pub selectable: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    pub kind: ObjectKind,
}

fn default_true() -> bool {
    true
}

impl SceneObject {
    pub fn new(id: ObjectId, transform: Transform, style: Style, kind: ObjectKind) -> Self {
        Self {
            id,
            transform,
            style,
            selectable: true,
            locked: false,
            visible: true,
            kind,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ObjectKind::Group { .. })
    }

    pub fn as_connector(&self) -> Option<&Connector> {
        match &self.kind {
            ObjectKind::Connector(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_connector_mut(&mut self) -> Option<&mut Connector> {
        match &mut self.kind {
            ObjectKind::Connector(c) => Some(c),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ObjectKind::Rect { .. } => "rect",
            ObjectKind::Ellipse { .. } => "ellipse",
            ObjectKind::Polygon { .. } => "polygon",
            ObjectKind::Path { .. } => "path",
            ObjectKind::Text { .. } => "text",
            ObjectKind::Image { .. } => "image",
            ObjectKind::Group { .. } => "group",
            ObjectKind::Connector(_) => "connector",
        }
    }

    /// Calls `f` on every addressable object in this subtree, `self` included.
    /// Connector parts are not addressable and are skipped.
    pub fn visit(&self, f: &mut impl FnMut(&SceneObject)) {
        f(self);
        if let ObjectKind::Group { children } = &self.kind {
            for child in children {
                child.visit(f);
            }
        }
    }

    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut SceneObject)) {
        f(self);
        if let ObjectKind::Group { children } = &mut self.kind {
            for child in children {
                child.visit_mut(f);
            }
        }
    }

    pub fn find(&self, id: ObjectId) -> Option<&SceneObject> {
        if self.id == id {
            return Some(self);
        }
        match &self.kind {
            ObjectKind::Group { children } => children.iter().find_map(|c| c.find(id)),
            _ => None,
        }
    }

    pub fn find_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        if self.id == id {
            return Some(self);
        }
        match &mut self.kind {
            ObjectKind::Group { children } => children.iter_mut().find_map(|c| c.find_mut(id)),
            _ => None,
        }
    }
}

/// Applies `f` to every leaf under `object`, recursing through groups.
/// A connector is handed to `f` whole; its parts are derived and only
/// `engine::connector` writes them.
pub fn walk_leaves_mut(object: &mut SceneObject, f: &mut impl FnMut(&mut SceneObject)) {
    match &mut object.kind {
        ObjectKind::Group { children } => {
            for child in children {
                walk_leaves_mut(child, f);
            }
        }
        _ => f(object),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Background {
    Color { color: Rgba },
    Transparent,
    Image { src: String },
}

impl Default for Background {
    fn default() -> Self {
        Background::Color { color: Rgba::WHITE }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: u32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub background: Background,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

impl Default for Document {
    fn default() -> Self {
        Self::new(1080.0, 1080.0)
    }
}

impl Document {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            width,
            height,
            background: Background::default(),
            objects: vec![],
        }
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    pub fn find(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find_map(|o| o.find(id))
    }

    pub fn find_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find_map(|o| o.find_mut(id))
    }

    pub fn max_id(&self) -> ObjectId {
        let mut max = 0;
        for object in &self.objects {
            object.visit(&mut |o| max = max.max(o.id));
        }
        max
    }

    /// Chain of group ids from the top level down to the direct parent of `id`.
    pub fn ancestors_of(&self, id: ObjectId) -> Option<Vec<ObjectId>> {
        fn search(list: &[SceneObject], id: ObjectId, path: &mut Vec<ObjectId>) -> bool {
            for object in list {
                if object.id == id {
                    return true;
                }
                if let ObjectKind::Group { children } = &object.kind {
                    path.push(object.id);
                    if search(children, id, path) {
                        return true;
                    }
                    path.pop();
                }
            }
            false
        }
        let mut path = Vec::new();
        search(&self.objects, id, &mut path).then_some(path)
    }

    /// Checks structural invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.version > DOCUMENT_VERSION {
            return Err(format!("unsupported document version {}", self.version));
        }
        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(format!("invalid document size {}x{}", self.width, self.height));
        }
        let mut seen = std::collections::HashSet::new();
        let mut duplicate = None;
        for object in &self.objects {
            object.visit(&mut |o| {
                if !seen.insert(o.id) && duplicate.is_none() {
                    duplicate = Some(o.id);
                }
            });
        }
        if let Some(id) = duplicate {
            return Err(format!("duplicate object id {id}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours_parse() {
        assert_eq!(Rgba::from_hex("#fff"), Some(Rgba::WHITE));
        assert_eq!(Rgba::from_hex("1e1e1e"), Some(Rgba::rgb(30, 30, 30)));
        assert_eq!(Rgba::from_hex("#00000080").map(|c| c.a), Some(128));
        assert_eq!(Rgba::from_hex("#12345"), None);
    }

    #[test]
    fn non_ascii_hex_is_rejected() {
        assert_eq!(Rgba::from_hex("€€"), None);
        assert_eq!(Rgba::from_hex("#ab€d"), None);
    }
}
