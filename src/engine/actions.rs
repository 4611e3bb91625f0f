use crate::error::Result;
use crate::model::{
    self, Background, ImageData, ObjectId, ObjectKind, PathCommand, Point, Rgba, SceneObject,
    Shadow, Style, TextStyle, Transform,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::assets::ImageSource;
use super::connector::{self, ConnectorStyleUpdate};
use super::geometry::{self, apply_decomposed, decompose, flip_corrected, object_matrix};
use super::CanvasEngine;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    Rectangle,
    RoundedRectangle,
    Ellipse,
    Circle,
    Triangle,
    Diamond,
    Parallelogram,
    Trapezoid,
    Line,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arrange {
    Front,
    Back,
    Forward,
    Backward,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    pub text_style: TextStyle,
    pub color: Rgba,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            text_style: TextStyle::default(),
            color: Rgba::rgb(30, 30, 30),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BackgroundSource {
    Color(Rgba),
    Transparent,
    Image(ImageSource),
}

fn pts(points: &[(f32, f32)]) -> Vec<Point> {
    points.iter().map(|&(x, y)| Point::new(x, y)).collect()
}

fn shape_kind(kind: ShapeKind) -> ObjectKind {
    let (w, h) = (200.0, 150.0);
    match kind {
        ShapeKind::Rectangle => ObjectKind::Rect {
            width: w,
            height: h,
            corner_radius: 0.0,
        },
        ShapeKind::RoundedRectangle => ObjectKind::Rect {
            width: w,
            height: h,
            corner_radius: 16.0,
        },
        ShapeKind::Ellipse => ObjectKind::Ellipse {
            width: w,
            height: h,
        },
        ShapeKind::Circle => ObjectKind::Ellipse {
            width: h,
            height: h,
        },
        ShapeKind::Triangle => ObjectKind::Polygon {
            points: pts(&[(w * 0.5, 0.0), (w, h), (0.0, h)]),
        },
        ShapeKind::Diamond => ObjectKind::Polygon {
            points: pts(&[(w * 0.5, 0.0), (w, h * 0.5), (w * 0.5, h), (0.0, h * 0.5)]),
        },
        ShapeKind::Parallelogram => ObjectKind::Polygon {
            points: pts(&[(w * 0.25, 0.0), (w, 0.0), (w * 0.75, h), (0.0, h)]),
        },
        ShapeKind::Trapezoid => ObjectKind::Polygon {
            points: pts(&[(w * 0.2, 0.0), (w * 0.8, 0.0), (w, h), (0.0, h)]),
        },
        ShapeKind::Line => ObjectKind::Path {
            commands: vec![
                PathCommand::Move {
                    to: Point::new(0.0, 0.0),
                },
                PathCommand::Line {
                    to: Point::new(w, 0.0),
                },
            ],
        },
    }
}

impl CanvasEngine {
    /// Inserts an object on top, giving it and its descendants fresh ids.
    /// Selects it and records one snapshot.
    pub fn add_object(&mut self, mut object: SceneObject) -> ObjectId {
        self.reassign_ids(&mut object);
        if let ObjectKind::Connector(c) = &mut object.kind {
            connector::rebuild(c);
        }
        connector::sync_cache(&mut object);
        let id = object.id;
        tracing::debug!(id, kind = object.kind_name(), "Added object");
        self.doc.objects.push(object);
        self.set_selection([id]);
        self.commit();
        id
    }

    pub(crate) fn reassign_ids(&mut self, object: &mut SceneObject) {
        object.visit_mut(&mut |o| {
            o.id = self.next_id;
            self.next_id += 1;
        });
    }

    /// Adds a default-sized shape centred on the document.
    pub fn add_shape(&mut self, kind: ShapeKind) -> ObjectId {
        let object_kind = shape_kind(kind);
        let mut object = SceneObject::new(0, Transform::default(), Style::default(), object_kind);
        if kind == ShapeKind::Line {
            object.style = Style::stroked(Rgba::rgb(30, 30, 30), 3.0);
        }
        self.center_in_document(&mut object);
        self.add_object(object)
    }

    pub fn add_text(&mut self, text: &str, options: TextOptions) -> ObjectId {
        let style = Style {
            fill: Some(options.color),
            ..Style::stroked(options.color, 0.0)
        };
        let mut object = SceneObject::new(
            0,
            Transform::default(),
            style,
            ObjectKind::Text {
                text: text.to_string(),
                text_style: options.text_style,
            },
        );
        self.center_in_document(&mut object);
        self.add_object(object)
    }

    /// Loads the image completely before inserting it. Images larger than
    /// half the document are scaled down to fit.
    pub fn add_image(&mut self, source: &ImageSource) -> Result<ObjectId> {
        let loaded = self.assets.load(source).map_err(|e| {
            tracing::warn!("Image load failed, nothing inserted: {e}");
            e
        })?;
        let (w, h) = (loaded.width as f32, loaded.height as f32);
        let limit = (self.doc.width * 0.5 / w).min(self.doc.height * 0.5 / h);
        let scale = if limit.is_finite() { limit.min(1.0) } else { 1.0 };
        let transform = Transform {
            scale_x: scale,
            scale_y: scale,
            ..Transform::default()
        };
        let mut object = SceneObject::new(
            0,
            transform,
            Style {
                fill: None,
                ..Style::default()
            },
            ObjectKind::Image {
                image: ImageData {
                    src: loaded.data_uri,
                    width: w,
                    height: h,
                    filters: Vec::new(),
                },
            },
        );
        self.center_in_document(&mut object);
        Ok(self.add_object(object))
    }

    pub fn set_background(&mut self, source: BackgroundSource) -> Result<()> {
        let background = match source {
            BackgroundSource::Color(color) => Background::Color { color },
            BackgroundSource::Transparent => Background::Transparent,
            BackgroundSource::Image(src) => {
                let loaded = self.assets.load(&src).map_err(|e| {
                    tracing::warn!("Background image load failed: {e}");
                    e
                })?;
                Background::Image {
                    src: loaded.data_uri,
                }
            }
        };
        if self.doc.background != background {
            self.doc.background = background;
            self.commit();
        }
        Ok(())
    }

    fn center_in_document(&self, object: &mut SceneObject) {
        let bounds = geometry::object_bounds(object);
        if !bounds.is_finite() {
            return;
        }
        let target = egui::pos2(self.doc.width * 0.5, self.doc.height * 0.5);
        geometry::translate_object(object, target - bounds.center());
    }

    pub fn delete_selection(&mut self) -> bool {
        if self.selected.is_empty() {
            tracing::debug!("Delete ignored: nothing selected");
            return false;
        }
        let selected = std::mem::take(&mut self.selected);
        self.doc.objects.retain(|o| !selected.contains(&o.id));
        self.events
            .push(super::EngineEvent::SelectionChanged(Vec::new()));
        self.commit();
        true
    }

    pub fn select_all(&mut self) {
        let ids: Vec<ObjectId> = self
            .doc
            .objects
            .iter()
            .filter(|o| o.selectable && o.visible)
            .map(|o| o.id)
            .collect();
        self.set_selection(ids);
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(Vec::new());
    }

    /// Selects the top-level object owning `id`.
    pub fn select(&mut self, id: ObjectId) -> bool {
        let Some(root) = self.top_level_of(id) else {
            tracing::debug!(id, "Select ignored: unknown object");
            return false;
        };
        self.set_selection([root]);
        true
    }

    pub fn toggle_selection(&mut self, id: ObjectId) -> bool {
        let Some(root) = self.top_level_of(id) else {
            return false;
        };
        let mut ids: HashSet<ObjectId> = self.selected.clone();
        if !ids.remove(&root) {
            ids.insert(root);
        }
        self.set_selection(ids);
        true
    }

    pub(crate) fn top_level_of(&self, id: ObjectId) -> Option<ObjectId> {
        let ancestors = self.doc.ancestors_of(id)?;
        Some(ancestors.first().copied().unwrap_or(id))
    }

    pub fn arrange(&mut self, arrange: Arrange) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        let before: Vec<ObjectId> = self.doc.objects.iter().map(|o| o.id).collect();
        let objects = &mut self.doc.objects;
        let selected = &self.selected;
        match arrange {
            Arrange::Front | Arrange::Back => {
                let (mut moved, kept): (Vec<_>, Vec<_>) =
                    objects.drain(..).partition(|o| selected.contains(&o.id));
                if arrange == Arrange::Front {
                    let mut all = kept;
                    all.append(&mut moved);
                    *objects = all;
                } else {
                    moved.extend(kept);
                    *objects = moved;
                }
            }
            Arrange::Forward => {
                for i in (0..objects.len().saturating_sub(1)).rev() {
                    if selected.contains(&objects[i].id) && !selected.contains(&objects[i + 1].id)
                    {
                        objects.swap(i, i + 1);
                    }
                }
            }
            Arrange::Backward => {
                for i in 0..objects.len().saturating_sub(1) {
                    if selected.contains(&objects[i + 1].id) && !selected.contains(&objects[i].id)
                    {
                        objects.swap(i, i + 1);
                    }
                }
            }
        }
        let after: Vec<ObjectId> = self.doc.objects.iter().map(|o| o.id).collect();
        if before == after {
            return false;
        }
        self.commit();
        true
    }

    /// Moves the selection in scene space without recording history.
    pub(crate) fn translate_selected_transient(&mut self, delta: egui::Vec2) {
        let selected = &self.selected;
        let locks = &self.transient_locks;
        for object in &mut self.doc.objects {
            if selected.contains(&object.id) && !object.locked && !locks.contains(&object.id) {
                geometry::translate_object(object, delta);
            }
        }
    }

    /// Locked objects stay put; nothing is recorded when nothing moved.
    pub fn translate_selected(&mut self, delta: egui::Vec2) -> bool {
        if delta == egui::Vec2::ZERO {
            return false;
        }
        let movable = self
            .selected_objects()
            .any(|o| !o.locked && !self.transient_locks.contains(&o.id));
        if !movable {
            return false;
        }
        self.translate_selected_transient(delta);
        self.commit();
        true
    }

    /// Wraps the selected top-level objects in a new group placed where the
    /// topmost of them was.
    pub fn group(&mut self) -> Option<ObjectId> {
        let ids = self.selected_ids();
        if ids.len() < 2 {
            tracing::debug!(count = ids.len(), "Group ignored: needs two objects");
            return None;
        }
        let topmost = self
            .doc
            .objects
            .iter()
            .rposition(|o| self.selected.contains(&o.id))?;
        let insert_at = topmost + 1 - ids.len();
        let (children, kept): (Vec<_>, Vec<_>) = self
            .doc
            .objects
            .drain(..)
            .partition(|o| self.selected.contains(&o.id));
        self.doc.objects = kept;
        let id = self.allocate_id();
        let group = SceneObject::new(
            id,
            Transform::default(),
            Style::default(),
            ObjectKind::Group { children },
        );
        self.doc.objects.insert(insert_at, group);
        tracing::debug!(id, "Grouped objects");
        self.set_selection([id]);
        self.commit();
        Some(id)
    }

    /// Dissolves every selected group, baking its transform into the
    /// children.
    pub fn ungroup(&mut self) -> Vec<ObjectId> {
        let groups: Vec<ObjectId> = self
            .selected_objects()
            .filter(|o| o.is_group())
            .map(|o| o.id)
            .collect();
        if groups.is_empty() {
            tracing::debug!("Ungroup ignored: no group selected");
            return Vec::new();
        }
        let mut released = Vec::new();
        for group_id in groups {
            let Some(index) = self.doc.index_of(group_id) else {
                continue;
            };
            let group = self.doc.objects.remove(index);
            let matrix = object_matrix(&group);
            let ObjectKind::Group { children } = group.kind else {
                continue;
            };
            let children: Vec<SceneObject> = children
                .into_iter()
                .map(|mut child| {
                    bake_parent_matrix(&mut child, matrix);
                    child
                })
                .collect();
            released.extend(children.iter().map(|c| c.id));
            for (offset, child) in children.into_iter().enumerate() {
                self.doc.objects.insert(index + offset, child);
            }
        }
        let keep: Vec<ObjectId> = self
            .selected_ids()
            .into_iter()
            .chain(released.iter().copied())
            .collect();
        self.set_selection(keep);
        self.commit();
        released
    }

    /// Connectors have no fill and are left alone.
    pub fn set_fill(&mut self, fill: Option<Rgba>) -> bool {
        self.style_selected_leaves(|leaf| {
            if leaf.as_connector().is_none() {
                leaf.style.fill = fill;
            }
        })
    }

    pub fn set_stroke(&mut self, color: Rgba, width: f32) -> bool {
        let update = ConnectorStyleUpdate {
            color: Some(color),
            stroke_width: Some(width),
            ..ConnectorStyleUpdate::default()
        };
        self.style_selected_leaves(|leaf| {
            if leaf.as_connector().is_some() {
                connector::apply_style_update(leaf, &update);
            } else {
                leaf.style.stroke.color = color;
                leaf.style.stroke.set_width(width);
            }
        })
    }

    pub fn set_opacity(&mut self, opacity: f32) -> bool {
        let opacity = opacity.clamp(0.0, 1.0);
        self.style_selected_leaves(|leaf| leaf.style.opacity = opacity)
    }

    pub fn set_shadow(&mut self, shadow: Option<Shadow>) -> bool {
        self.style_selected_leaves(|leaf| leaf.style.shadow = shadow)
    }

    fn style_selected_leaves(&mut self, mut f: impl FnMut(&mut SceneObject)) -> bool {
        self.style_selected(|object| model::walk_leaves_mut(object, &mut f))
    }

    /// Runs `f` on each selected object and commits once if anything changed.
    fn style_selected(&mut self, mut f: impl FnMut(&mut SceneObject)) -> bool {
        let selected = &self.selected;
        let mut changed = false;
        for object in &mut self.doc.objects {
            if !selected.contains(&object.id) {
                continue;
            }
            let before = object.clone();
            f(object);
            changed |= *object != before;
        }
        if changed {
            self.commit();
        }
        changed
    }
}

/// Moves `child` out of a group whose matrix is `parent` so it renders
/// identically at the top level.
pub(crate) fn bake_parent_matrix(child: &mut SceneObject, parent: geometry::Matrix) {
    if child.as_connector().is_some() {
        connector::map_endpoints(child, parent);
        return;
    }
    let world = parent.multiply(object_matrix(child));
    let decomposed = decompose(flip_corrected(world, child));
    apply_decomposed(&mut child.transform, decomposed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_at(engine: &mut CanvasEngine, left: f32, top: f32) -> ObjectId {
        engine.add_object(SceneObject::new(
            0,
            Transform::at(left, top),
            Style::default(),
            ObjectKind::Rect {
                width: 150.0,
                height: 100.0,
                corner_radius: 0.0,
            },
        ))
    }

    #[test]
    fn group_inserts_at_topmost_position() {
        let mut engine = CanvasEngine::new();
        let a = rect_at(&mut engine, 0.0, 0.0);
        let b = rect_at(&mut engine, 10.0, 0.0);
        let c = rect_at(&mut engine, 20.0, 0.0);
        engine.set_selection([a, b]);
        let g = engine.group().unwrap();
        let order: Vec<_> = engine.document().objects.iter().map(|o| o.id).collect();
        assert_eq!(order, vec![g, c]);
        assert_eq!(engine.selected_ids(), vec![g]);
    }

    #[test]
    fn group_with_one_object_is_noop() {
        let mut engine = CanvasEngine::new();
        rect_at(&mut engine, 0.0, 0.0);
        assert!(engine.group().is_none());
        assert!(!engine.document().objects[0].is_group());
    }

    #[test]
    fn ungroup_bakes_group_transform() {
        let mut engine = CanvasEngine::new();
        let a = rect_at(&mut engine, 0.0, 0.0);
        let b = rect_at(&mut engine, 200.0, 0.0);
        engine.set_selection([a, b]);
        let g = engine.group().unwrap();
        if let Some(group) = engine.doc.find_mut(g) {
            group.transform.left += 50.0;
            group.transform.top += 25.0;
        }
        engine.ungroup();
        let moved = engine.document().find(b).unwrap();
        assert!((moved.transform.left - 250.0).abs() < 1e-3);
        assert!((moved.transform.top - 25.0).abs() < 1e-3);
        assert_eq!(engine.selected_ids(), vec![a, b]);
    }

    #[test]
    fn arrange_front_and_back() {
        let mut engine = CanvasEngine::new();
        let a = rect_at(&mut engine, 0.0, 0.0);
        let b = rect_at(&mut engine, 0.0, 0.0);
        let c = rect_at(&mut engine, 0.0, 0.0);
        engine.set_selection([a]);
        assert!(engine.arrange(Arrange::Front));
        let order: Vec<_> = engine.document().objects.iter().map(|o| o.id).collect();
        assert_eq!(order, vec![b, c, a]);
        assert!(engine.arrange(Arrange::Backward));
        let order: Vec<_> = engine.document().objects.iter().map(|o| o.id).collect();
        assert_eq!(order, vec![b, a, c]);
        engine.set_selection([c]);
        assert!(!engine.arrange(Arrange::Forward));
    }

    #[test]
    fn fill_reaches_group_leaves() {
        let mut engine = CanvasEngine::new();
        let a = rect_at(&mut engine, 0.0, 0.0);
        let b = rect_at(&mut engine, 200.0, 0.0);
        engine.set_selection([a, b]);
        engine.group();
        let red = Rgba::rgb(255, 0, 0);
        assert!(engine.set_fill(Some(red)));
        assert_eq!(engine.document().find(a).unwrap().style.fill, Some(red));
        assert_eq!(engine.document().find(b).unwrap().style.fill, Some(red));
    }

    #[test]
    fn shapes_are_centered() {
        let mut engine = CanvasEngine::new();
        let id = engine.add_shape(ShapeKind::Triangle);
        let bounds = geometry::object_bounds(engine.document().find(id).unwrap());
        assert!((bounds.center().x - 540.0).abs() < 1e-3);
        assert!((bounds.center().y - 540.0).abs() < 1e-3);
    }

    fn connector_at(engine: &mut CanvasEngine, x1: f32, y1: f32, x2: f32, y2: f32) -> ObjectId {
        let defaults = engine.settings().connector.clone();
        engine.add_object(connector::new_connector(
            0,
            model::Endpoints::new(egui::pos2(x1, y1), egui::pos2(x2, y2)),
            &defaults,
        ))
    }

    fn grouped_rect_and_connector(engine: &mut CanvasEngine) -> (ObjectId, ObjectId) {
        let a = rect_at(engine, 0.0, 0.0);
        let c = connector_at(engine, 300.0, 475.0, 600.0, 675.0);
        engine.set_selection([a, c]);
        engine.group();
        (a, c)
    }

    #[test]
    fn connector_opacity_and_shadow_survive_restyle() {
        let mut engine = CanvasEngine::new();
        let c = connector_at(&mut engine, 0.0, 0.0, 200.0, 120.0);
        engine.select(c);
        assert!(engine.set_opacity(0.4));
        assert!(engine.set_shadow(Some(Shadow::default())));
        assert!(engine.update_connector_style(&ConnectorStyleUpdate {
            head_style: Some(model::HeadStyle::Open),
            ..ConnectorStyleUpdate::default()
        }));
        engine.flip_selected(crate::engine::doc_ops::Axis::Horizontal);

        let object = engine.document().find(c).unwrap();
        assert_eq!(object.style.opacity, 0.4);
        assert_eq!(object.style.shadow, Some(Shadow::default()));
        let parts = &object.as_connector().unwrap().parts;
        assert!(parts.iter().all(|p| p.style.opacity == 1.0 && p.style.shadow.is_none()));
    }

    #[test]
    fn fill_skips_connectors_inside_groups() {
        let mut engine = CanvasEngine::new();
        let (a, c) = grouped_rect_and_connector(&mut engine);
        let green = Rgba::rgb(0, 200, 0);
        assert!(engine.set_fill(Some(green)));

        assert_eq!(engine.document().find(a).unwrap().style.fill, Some(green));
        let connector = engine.document().find(c).unwrap().as_connector().unwrap();
        assert_eq!(connector.parts[0].style.fill, None);
        assert_eq!(connector.parts[1].style.fill, Some(connector.color));
    }

    #[test]
    fn stroke_restyles_connectors_inside_groups() {
        let mut engine = CanvasEngine::new();
        let (a, c) = grouped_rect_and_connector(&mut engine);
        let blue = Rgba::rgb(0, 0, 220);
        assert!(engine.set_stroke(blue, 4.0));

        assert_eq!(engine.document().find(a).unwrap().style.stroke.color, blue);
        let connector = engine.document().find(c).unwrap().as_connector().unwrap();
        assert_eq!(connector.color, blue);
        assert_eq!(connector.stroke_width, 4.0);
        assert!(connector.parts.iter().all(|p| p.style.stroke.color == blue));
    }

    #[test]
    fn ungroup_maps_connector_through_rotated_group() {
        let mut engine = CanvasEngine::new();
        let (_, c) = grouped_rect_and_connector(&mut engine);
        let g = engine.selected_ids()[0];
        if let Some(group) = engine.doc.find_mut(g) {
            group.transform.angle = 90.0;
        }
        let expected = {
            let world = geometry::world_matrix(engine.document(), c).unwrap();
            let ends = engine.document().find(c).unwrap().as_connector().unwrap().endpoints;
            (world.apply(ends.start()), world.apply(ends.end()))
        };
        engine.ungroup();

        let object = engine.document().find(c).unwrap();
        let connector = object.as_connector().unwrap();
        assert!((connector.endpoints.start() - expected.0).length() < 1e-3);
        assert!((connector.endpoints.end() - expected.1).length() < 1e-3);
        assert_eq!(connector::endpoints_from_parts(connector), Some(connector.endpoints));
        let e = connector.endpoints;
        assert_eq!(object.transform.left, e.x1.min(e.x2));
        assert_eq!(object.transform.top, e.y1.min(e.y2));
    }

    #[test]
    fn translating_only_locked_objects_records_nothing() {
        let mut engine = CanvasEngine::new();
        let a = rect_at(&mut engine, 0.0, 0.0);
        engine.doc.find_mut(a).unwrap().locked = true;
        engine.select(a);
        let depth = engine.history.len();
        assert!(!engine.translate_selected(egui::vec2(10.0, 0.0)));
        assert_eq!(engine.history.len(), depth);
        assert_eq!(engine.document().find(a).unwrap().transform.left, 0.0);
    }
}
