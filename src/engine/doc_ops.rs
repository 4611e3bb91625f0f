use crate::model::{Endpoints, ObjectId};
use serde::{Deserialize, Serialize};

use super::connector;
use super::geometry::{self, translate_object};
use super::CanvasEngine;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignEdge {
    Left,
    CenterH,
    Right,
    Top,
    CenterV,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

fn align_delta(bounds: egui::Rect, target: egui::Rect, edge: AlignEdge) -> egui::Vec2 {
    match edge {
        AlignEdge::Left => egui::vec2(target.min.x - bounds.min.x, 0.0),
        AlignEdge::CenterH => egui::vec2(target.center().x - bounds.center().x, 0.0),
        AlignEdge::Right => egui::vec2(target.max.x - bounds.max.x, 0.0),
        AlignEdge::Top => egui::vec2(0.0, target.min.y - bounds.min.y),
        AlignEdge::CenterV => egui::vec2(0.0, target.center().y - bounds.center().y),
        AlignEdge::Bottom => egui::vec2(0.0, target.max.y - bounds.max.y),
    }
}

impl CanvasEngine {
    fn document_rect(&self) -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(self.doc.width, self.doc.height))
    }

    /// Scene-space bounds of each selected top-level object.
    fn selected_bounds(&self) -> Vec<(ObjectId, egui::Rect)> {
        self.selected_objects()
            .map(|o| (o.id, geometry::object_bounds(o)))
            .filter(|(_, b)| b.is_finite())
            .collect()
    }

    fn move_by(&mut self, moves: Vec<(ObjectId, egui::Vec2)>) -> bool {
        let mut moved = false;
        for (id, delta) in moves {
            if delta == egui::Vec2::ZERO {
                continue;
            }
            let Some(index) = self.doc.index_of(id) else {
                continue;
            };
            translate_object(&mut self.doc.objects[index], delta);
            moved = true;
        }
        if moved {
            self.commit();
        }
        moved
    }

    /// Puts each selected object flush against a document edge. Works on
    /// scene bounds, so the current zoom has no influence and the offset
    /// between an object's origin and its bounding box is preserved.
    pub fn align_to_canvas(&mut self, edge: AlignEdge) -> bool {
        let target = self.document_rect();
        let moves = self
            .selected_bounds()
            .into_iter()
            .map(|(id, b)| (id, align_delta(b, target, edge)))
            .collect();
        self.move_by(moves)
    }

    /// Aligns the selection against its own union box.
    pub fn align_selection(&mut self, edge: AlignEdge) -> bool {
        let items = self.selected_bounds();
        if items.len() < 2 {
            return false;
        }
        let overall = items
            .iter()
            .map(|(_, r)| *r)
            .reduce(|a, b| a.union(b))
            .unwrap_or(egui::Rect::NOTHING);
        let moves = items
            .into_iter()
            .map(|(id, b)| (id, align_delta(b, overall, edge)))
            .collect();
        self.move_by(moves)
    }

    /// Spaces three or more objects evenly by their centres.
    pub fn distribute_selection(&mut self, axis: Axis) -> bool {
        let mut items = self.selected_bounds();
        if items.len() < 3 {
            return false;
        }
        let key = |r: &egui::Rect| match axis {
            Axis::Horizontal => r.center().x,
            Axis::Vertical => r.center().y,
        };
        items.sort_by(|a, b| key(&a.1).total_cmp(&key(&b.1)));
        let first = key(&items[0].1);
        let last = key(&items[items.len() - 1].1);
        let step = (last - first) / ((items.len() - 1) as f32);
        let moves = items
            .into_iter()
            .enumerate()
            .map(|(i, (id, b))| {
                let shift = first + step * (i as f32) - key(&b);
                let delta = match axis {
                    Axis::Horizontal => egui::vec2(shift, 0.0),
                    Axis::Vertical => egui::vec2(0.0, shift),
                };
                (id, delta)
            })
            .collect();
        self.move_by(moves)
    }

    /// Changes the page size. Objects keep their scene coordinates.
    pub fn resize_document(&mut self, width: f32, height: f32) -> bool {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            tracing::debug!(width, height, "Document resize ignored: invalid size");
            return false;
        }
        if self.doc.width == width && self.doc.height == height {
            return false;
        }
        self.doc.width = width;
        self.doc.height = height;
        self.commit();
        true
    }

    /// Sets the displayed size by rescaling; intrinsic dimensions stay put.
    pub fn set_size(&mut self, id: ObjectId, width: Option<f32>, height: Option<f32>) -> bool {
        let Some(object) = self.doc.find_mut(id) else {
            tracing::debug!(id, "Resize ignored: unknown object");
            return false;
        };
        if object.as_connector().is_some() {
            tracing::debug!(id, "Resize ignored: connectors are sized by endpoints");
            return false;
        }
        let intrinsic = geometry::intrinsic_size(object);
        let mut changed = false;
        if let Some(w) = width.filter(|w| w.is_finite() && *w > 0.0) {
            if intrinsic.x > f32::EPSILON {
                object.transform.scale_x = w / intrinsic.x;
                changed = true;
            }
        }
        if let Some(h) = height.filter(|h| h.is_finite() && *h > 0.0) {
            if intrinsic.y > f32::EPSILON {
                object.transform.scale_y = h / intrinsic.y;
                changed = true;
            }
        }
        if changed {
            self.commit();
        }
        changed
    }

    /// Mirrors each selected object in place. Connectors swap their endpoints
    /// across the centre of their own bounds.
    pub fn flip_selected(&mut self, axis: Axis) -> bool {
        let ids = self.selected_ids();
        if ids.is_empty() {
            return false;
        }
        for id in ids {
            let Some(index) = self.doc.index_of(id) else {
                continue;
            };
            let object = &mut self.doc.objects[index];
            if let Some(c) = object.as_connector() {
                let e = c.endpoints;
                let routing = c.routing_mode;
                let cx = (e.x1 + e.x2) * 0.5;
                let cy = (e.y1 + e.y2) * 0.5;
                let mirrored = match axis {
                    Axis::Horizontal => Endpoints {
                        x1: 2.0 * cx - e.x1,
                        x2: 2.0 * cx - e.x2,
                        ..e
                    },
                    Axis::Vertical => Endpoints {
                        y1: 2.0 * cy - e.y1,
                        y2: 2.0 * cy - e.y2,
                        ..e
                    },
                };
                connector::reshape(object, mirrored, routing);
                continue;
            }
            match axis {
                Axis::Horizontal => object.transform.flip_x = !object.transform.flip_x,
                Axis::Vertical => object.transform.flip_y = !object.transform.flip_y,
            }
        }
        self.commit();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectKind, SceneObject, Style, Transform};

    fn rect(engine: &mut CanvasEngine, left: f32, top: f32, w: f32, h: f32) -> ObjectId {
        engine.add_object(SceneObject::new(
            0,
            Transform::at(left, top),
            Style::default(),
            ObjectKind::Rect {
                width: w,
                height: h,
                corner_radius: 0.0,
            },
        ))
    }

    #[test]
    fn align_right_ignores_zoom() {
        let mut engine = CanvasEngine::new();
        let id = rect(&mut engine, 100.0, 100.0, 150.0, 100.0);
        engine.zoom_in();
        engine.zoom_in();
        assert!(engine.align_to_canvas(AlignEdge::Right));
        let object = engine.document().find(id).unwrap();
        assert!((object.transform.left - (1080.0 - 150.0)).abs() < 1e-3);
        assert_eq!(object.transform.top, 100.0);
    }

    #[test]
    fn align_keeps_origin_offset_for_rotated_objects() {
        let mut engine = CanvasEngine::new();
        let id = rect(&mut engine, 300.0, 300.0, 100.0, 100.0);
        engine.doc.find_mut(id).unwrap().transform.angle = 45.0;
        engine.align_to_canvas(AlignEdge::Left);
        let object = engine.document().find(id).unwrap();
        let bounds = geometry::object_bounds(object);
        assert!(bounds.min.x.abs() < 1e-3);
        assert!((object.transform.left - bounds.min.x - 100.0 * 45f32.to_radians().sin()).abs() < 1e-3);
    }

    #[test]
    fn distribute_spaces_centres() {
        let mut engine = CanvasEngine::new();
        let a = rect(&mut engine, 0.0, 0.0, 10.0, 10.0);
        let b = rect(&mut engine, 20.0, 0.0, 10.0, 10.0);
        let c = rect(&mut engine, 100.0, 0.0, 10.0, 10.0);
        engine.set_selection([a, b, c]);
        assert!(engine.distribute_selection(Axis::Horizontal));
        assert_eq!(engine.document().find(b).unwrap().transform.left, 50.0);
    }

    #[test]
    fn set_size_rescales() {
        let mut engine = CanvasEngine::new();
        let id = rect(&mut engine, 0.0, 0.0, 150.0, 100.0);
        assert!(engine.set_size(id, Some(300.0), None));
        let object = engine.document().find(id).unwrap();
        assert_eq!(object.transform.scale_x, 2.0);
        assert_eq!(object.transform.scale_y, 1.0);
        assert!(matches!(object.kind, ObjectKind::Rect { width, .. } if width == 150.0));
    }

    #[test]
    fn resize_document_rejects_degenerate_sizes() {
        let mut engine = CanvasEngine::new();
        assert!(!engine.resize_document(0.0, 100.0));
        assert!(!engine.resize_document(1080.0, 1080.0));
        assert!(engine.resize_document(1920.0, 1080.0));
        assert_eq!(engine.document().width, 1920.0);
        assert!(engine.undo());
        assert_eq!(engine.document().width, 1080.0);
    }

    #[test]
    fn flip_toggles_flag() {
        let mut engine = CanvasEngine::new();
        let id = rect(&mut engine, 0.0, 0.0, 150.0, 100.0);
        engine.flip_selected(Axis::Horizontal);
        assert!(engine.document().find(id).unwrap().transform.flip_x);
        engine.flip_selected(Axis::Horizontal);
        assert!(!engine.document().find(id).unwrap().transform.flip_x);
    }
}
