//! Building and maintaining connector composites.
//!
//! A connector's `parts` are plain leaves in parent space: the stroke path
//! first, then the end head, then the optional start head. They are always
//! derivable from the connector's own fields, so every edit ends in
//! [`rebuild`]. Opacity and shadow belong to the connector object's own
//! style and apply to the composite as a whole; parts never carry them.

use super::geometry::{self, Matrix};
use super::settings::ConnectorDefaults;
use crate::model::{
    Connector, Endpoints, HeadStyle, LineStyle, ObjectId, ObjectKind, PathCommand, Point,
    Rgba, RoutingMode, SceneObject, StrokeStyle, Style, Transform,
};
use serde::{Deserialize, Serialize};

const PART_ID: ObjectId = 0;

/// Partial style edit for selected connectors. `None` leaves a field alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorStyleUpdate {
    pub color: Option<Rgba>,
    pub stroke_width: Option<f32>,
    pub line_style: Option<LineStyle>,
    pub head_style: Option<HeadStyle>,
    pub has_start_head: Option<bool>,
}

impl ConnectorStyleUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn head_length(stroke_width: f32) -> f32 {
    10.0 + stroke_width.max(0.0) * 3.0
}

fn unit_or(v: egui::Vec2, fallback: egui::Vec2) -> egui::Vec2 {
    let len = v.length();
    if len > f32::EPSILON {
        v / len
    } else {
        fallback
    }
}

fn line_part(connector: &Connector, route: &[egui::Pos2]) -> SceneObject {
    let mut commands = Vec::with_capacity(route.len());
    for (i, p) in route.iter().enumerate() {
        let to = Point::from_pos2(*p);
        commands.push(if i == 0 {
            PathCommand::Move { to }
        } else {
            PathCommand::Line { to }
        });
    }
    let style = Style {
        fill: None,
        stroke: StrokeStyle::new(connector.color, connector.stroke_width, connector.line_style),
        opacity: 1.0,
        shadow: None,
    };
    SceneObject::new(PART_ID, Transform::default(), style, ObjectKind::Path { commands })
}

/// Arrowhead with its tip at `tip`, pointing along `dir` (unit).
fn head_part(connector: &Connector, tip: egui::Pos2, dir: egui::Vec2) -> Option<SceneObject> {
    let len = head_length(connector.stroke_width);
    let normal = egui::vec2(-dir.y, dir.x);
    let base = tip - dir * len;
    let left = base + normal * (len * 0.5);
    let right = base - normal * (len * 0.5);
    let solid = StrokeStyle::new(connector.color, connector.stroke_width, LineStyle::Solid);
    let filled = Style {
        fill: Some(connector.color),
        stroke: solid,
        opacity: 1.0,
        shadow: None,
    };
    let polygon = |pts: &[egui::Pos2]| ObjectKind::Polygon {
        points: pts.iter().copied().map(Point::from_pos2).collect(),
    };
    let (style, kind, transform) = match connector.head_style {
        HeadStyle::None => return None,
        HeadStyle::Filled => (filled, polygon(&[tip, left, right]), Transform::default()),
        HeadStyle::Outline => (
            Style {
                fill: Some(Rgba::WHITE),
                ..filled
            },
            polygon(&[tip, left, right]),
            Transform::default(),
        ),
        HeadStyle::Open => (
            Style {
                fill: None,
                ..filled
            },
            ObjectKind::Path {
                commands: vec![
                    PathCommand::Move {
                        to: Point::from_pos2(left),
                    },
                    PathCommand::Line {
                        to: Point::from_pos2(tip),
                    },
                    PathCommand::Line {
                        to: Point::from_pos2(right),
                    },
                ],
            },
            Transform::default(),
        ),
        HeadStyle::Diamond => {
            let back = tip - dir * (len * 1.6);
            let mid = tip - dir * (len * 0.8);
            (
                filled,
                polygon(&[
                    tip,
                    mid + normal * (len * 0.4),
                    back,
                    mid - normal * (len * 0.4),
                ]),
                Transform::default(),
            )
        }
        HeadStyle::Circle => {
            let r = len * 0.4;
            let center = tip - dir * r;
            (
                filled,
                ObjectKind::Ellipse {
                    width: r * 2.0,
                    height: r * 2.0,
                },
                Transform::at(center.x - r, center.y - r),
            )
        }
    };
    Some(SceneObject::new(PART_ID, transform, style, kind))
}

/// Regenerates `parts` from the connector's endpoints and style flags.
pub fn rebuild(connector: &mut Connector) {
    let route = geometry::connector_route(connector);
    let start = connector.endpoints.start();
    let end = connector.endpoints.end();
    let overall = unit_or(end - start, egui::vec2(1.0, 0.0));

    let mut parts = vec![line_part(connector, &route)];
    let end_dir = match route.len() {
        3 => unit_or(end - route[1], overall),
        _ => overall,
    };
    if let Some(head) = head_part(connector, end, end_dir) {
        parts.push(head);
    }
    if connector.has_start_head {
        let start_dir = match route.len() {
            3 => unit_or(start - route[1], -overall),
            _ => -overall,
        };
        if let Some(head) = head_part(connector, start, start_dir) {
            parts.push(head);
        }
    }
    connector.parts = parts;
}

/// Refreshes the cached `left/top` from the endpoints' bounding box.
pub fn sync_cache(object: &mut SceneObject) {
    if let ObjectKind::Connector(connector) = &object.kind {
        let e = connector.endpoints;
        object.transform = Transform::at(e.x1.min(e.x2), e.y1.min(e.y2));
    }
}

pub fn new_connector(id: ObjectId, endpoints: Endpoints, defaults: &ConnectorDefaults) -> SceneObject {
    let mut connector = Connector {
        endpoints,
        routing_mode: RoutingMode::Straight,
        line_style: defaults.line_style,
        head_style: defaults.head_style,
        has_start_head: defaults.has_start_head,
        color: defaults.color,
        stroke_width: defaults.stroke_width,
        parts: Vec::new(),
    };
    rebuild(&mut connector);
    let mut object = SceneObject::new(
        id,
        Transform::default(),
        Style::stroked(defaults.color, defaults.stroke_width),
        ObjectKind::Connector(connector),
    );
    sync_cache(&mut object);
    object
}

/// Endpoints as drawn: the line part's first and last point.
pub fn endpoints_from_parts(connector: &Connector) -> Option<Endpoints> {
    let line = connector.parts.first()?;
    let ObjectKind::Path { commands } = &line.kind else {
        return None;
    };
    let m = geometry::object_matrix(line);
    let first = commands.iter().flat_map(|c| c.points()).next()?;
    let last = commands.iter().flat_map(|c| c.points()).last()?;
    Some(Endpoints::new(m.apply(first.to_pos2()), m.apply(last.to_pos2())))
}

/// Moves both endpoints through `matrix` and rebuilds.
pub fn map_endpoints(object: &mut SceneObject, matrix: Matrix) {
    if let ObjectKind::Connector(connector) = &mut object.kind {
        let e = connector.endpoints;
        connector.endpoints = Endpoints::new(matrix.apply(e.start()), matrix.apply(e.end()));
        rebuild(connector);
    }
    sync_cache(object);
}

/// Replaces the endpoints and routing, keeping id and style.
pub fn reshape(object: &mut SceneObject, endpoints: Endpoints, routing_mode: RoutingMode) {
    if let ObjectKind::Connector(connector) = &mut object.kind {
        connector.endpoints = endpoints;
        connector.routing_mode = routing_mode;
        rebuild(connector);
    }
    sync_cache(object);
}

/// Rebuilds every connector in `objects`, nested ones included, and
/// refreshes their cached position.
pub fn rebuild_all(objects: &mut [SceneObject]) {
    for object in objects {
        object.visit_mut(&mut |o| {
            if let Some(connector) = o.as_connector_mut() {
                rebuild(connector);
                sync_cache(o);
            }
        });
    }
}

/// Applies a style edit and regenerates the parts. The object's opacity and
/// shadow are left alone.
pub fn apply_style_update(object: &mut SceneObject, update: &ConnectorStyleUpdate) -> bool {
    let Some(connector) = object.as_connector_mut() else {
        return false;
    };
    let before = connector.clone();
    if let Some(color) = update.color {
        connector.color = color;
    }
    if let Some(width) = update.stroke_width {
        connector.stroke_width = width.max(0.0);
    }
    if let Some(line_style) = update.line_style {
        connector.line_style = line_style;
    }
    if let Some(head_style) = update.head_style {
        connector.head_style = head_style;
    }
    if let Some(has_start_head) = update.has_start_head {
        connector.has_start_head = has_start_head;
    }
    if *connector == before {
        return false;
    }
    rebuild(connector);
    let stroke = StrokeStyle::new(connector.color, connector.stroke_width, LineStyle::Solid);
    object.style.fill = None;
    object.style.stroke = stroke;
    true
}
