//! Pointer gestures: the connector state machine and selection drags.
//!
//! All positions are scene coordinates; hosts convert screen positions with
//! [`CanvasEngine::screen_to_scene`] first.

use crate::model::{self, Endpoints, ObjectId, ObjectKind, RoutingMode, SceneObject};

use super::connector::{self, ConnectorStyleUpdate};
use super::geometry::{self, Port};
use super::settings::ConnectorDefaults;
use super::CanvasEngine;

/// Screen pixels of slack when picking objects under the pointer.
const HIT_SLOP_PX: f32 = 4.0;

#[derive(Clone, Debug, PartialEq)]
pub enum ConnectorState {
    Idle,
    Hovering {
        shape: ObjectId,
        port: Option<(Port, egui::Pos2)>,
    },
    Creating {
        source: ObjectId,
        start: egui::Pos2,
        current: egui::Pos2,
        candidate: Option<(ObjectId, Port, egui::Pos2)>,
    },
    ReshapingHead {
        connector: ObjectId,
        moved: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragMove {
    last: egui::Pos2,
    moved: bool,
}

/// What a host draws while a connector is being created. Never part of the
/// document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConnectorPreview {
    pub start: egui::Pos2,
    pub current: egui::Pos2,
    pub candidate: Option<(ObjectId, Port, egui::Pos2)>,
}

fn is_port_target(object: &SceneObject) -> bool {
    object.visible && !matches!(object.kind, ObjectKind::Connector(_))
}

impl CanvasEngine {
    pub fn connector_state(&self) -> &ConnectorState {
        &self.connector_state
    }

    pub fn flowchart_mode(&self) -> bool {
        self.flowchart_mode
    }

    pub fn set_flowchart_mode(&mut self, enabled: bool) {
        if self.flowchart_mode == enabled {
            return;
        }
        tracing::debug!(enabled, "Flowchart mode");
        self.flowchart_mode = enabled;
        self.connector_state = ConnectorState::Idle;
        self.transient_locks.clear();
        self.undraggable = None;
    }

    /// Live port positions of a top-level shape.
    pub fn ports_of(&self, id: ObjectId) -> Option<[(Port, egui::Pos2); 4]> {
        let index = self.doc.index_of(id)?;
        geometry::ports(&self.doc.objects[index])
    }

    pub fn is_transiently_locked(&self, id: ObjectId) -> bool {
        self.transient_locks.contains(&id)
    }

    pub fn connector_preview(&self) -> Option<ConnectorPreview> {
        match &self.connector_state {
            ConnectorState::Creating {
                start,
                current,
                candidate,
                ..
            } => Some(ConnectorPreview {
                start: *start,
                current: *current,
                candidate: *candidate,
            }),
            _ => None,
        }
    }

    fn hit_slop(&self) -> f32 {
        HIT_SLOP_PX / self.viewport.zoom.max(f32::EPSILON)
    }

    /// Topmost interactive top-level object under `p`.
    pub fn hit(&self, p: egui::Pos2) -> Option<ObjectId> {
        let slop = self.hit_slop();
        self.doc
            .objects
            .iter()
            .rev()
            .find(|o| self.is_interactive(o) && geometry::hit_test(o, p, slop))
            .map(|o| o.id)
    }

    /// Nearest port within `radius` on any shape except `exclude`.
    fn port_near(
        &self,
        p: egui::Pos2,
        radius: f32,
        exclude: Option<ObjectId>,
    ) -> Option<(ObjectId, Port, egui::Pos2)> {
        self.doc
            .objects
            .iter()
            .filter(|o| is_port_target(o) && Some(o.id) != exclude)
            .filter_map(|o| {
                let (port, pos) = geometry::nearest_port(o, p, radius)?;
                Some((o.id, port, pos, (pos - p).length()))
            })
            .min_by(|a, b| a.3.total_cmp(&b.3))
            .map(|(id, port, pos, _)| (id, port, pos))
    }

    fn hover_target(&self, p: egui::Pos2) -> Option<ObjectId> {
        let radius = self.settings.hover_radius;
        self.doc
            .objects
            .iter()
            .rev()
            .filter(|o| is_port_target(o) && self.is_interactive(o))
            .find(|o| geometry::distance_to_rect(p, geometry::object_bounds(o)) <= radius)
            .map(|o| o.id)
    }

    fn connector_head_near(&self, p: egui::Pos2) -> Option<ObjectId> {
        let radius = self.settings.head_pick_radius;
        self.doc
            .objects
            .iter()
            .rev()
            .filter(|o| self.is_interactive(o))
            .find(|o| {
                o.as_connector()
                    .is_some_and(|c| (c.endpoints.end() - p).length() <= radius)
            })
            .map(|o| o.id)
    }

    pub fn pointer_down(&mut self, p: egui::Pos2) {
        if self.flowchart_mode {
            if let ConnectorState::Hovering {
                shape,
                port: Some((_, start)),
            } = self.connector_state
            {
                self.transient_locks = self.doc.objects.iter().map(|o| o.id).collect();
                self.connector_state = ConnectorState::Creating {
                    source: shape,
                    start,
                    current: p,
                    candidate: None,
                };
                tracing::debug!(shape, "Started connector");
                return;
            }
            if let Some(id) = self.connector_head_near(p) {
                self.connector_state = ConnectorState::ReshapingHead {
                    connector: id,
                    moved: false,
                };
                self.set_selection([id]);
                return;
            }
        }

        let Some(id) = self.hit(p) else {
            self.set_selection(Vec::new());
            return;
        };
        if !self.selected.contains(&id) {
            self.set_selection([id]);
        }
        if self.undraggable != Some(id) {
            self.drag = Some(DragMove {
                last: p,
                moved: false,
            });
        }
    }

    pub fn pointer_move(&mut self, p: egui::Pos2) {
        match self.connector_state.clone() {
            ConnectorState::Creating {
                source,
                start,
                candidate: _,
                current: _,
            } => {
                let candidate = self.port_near(p, self.settings.end_snap_radius, Some(source));
                self.connector_state = ConnectorState::Creating {
                    source,
                    start,
                    current: p,
                    candidate,
                };
                return;
            }
            ConnectorState::ReshapingHead { connector, moved } => {
                let moved = self.reshape_head(connector, p) || moved;
                self.connector_state = ConnectorState::ReshapingHead { connector, moved };
                return;
            }
            ConnectorState::Idle | ConnectorState::Hovering { .. } => {}
        }

        if let Some(drag) = self.drag {
            let delta = p - drag.last;
            if delta != egui::Vec2::ZERO {
                self.translate_selected_transient(delta);
                self.drag = Some(DragMove {
                    last: p,
                    moved: true,
                });
            }
            return;
        }

        if self.flowchart_mode {
            self.update_hover(p);
        }
    }

    fn update_hover(&mut self, p: egui::Pos2) {
        match self.hover_target(p) {
            Some(shape) => {
                let port = self.doc.index_of(shape).and_then(|i| {
                    geometry::nearest_port(&self.doc.objects[i], p, self.settings.port_snap_radius)
                });
                self.undraggable = port.map(|_| shape);
                self.connector_state = ConnectorState::Hovering { shape, port };
            }
            None => {
                self.undraggable = None;
                self.connector_state = ConnectorState::Idle;
            }
        }
    }

    /// Replaces the connector with a freshly built one ending at `p`.
    fn reshape_head(&mut self, id: ObjectId, p: egui::Pos2) -> bool {
        let Some(index) = self.doc.index_of(id) else {
            return false;
        };
        let old = self.doc.objects.remove(index);
        let Some(c) = old.as_connector() else {
            self.doc.objects.insert(index, old);
            return false;
        };
        let start = c.endpoints.start();
        let routing = if (p.y - start.y).abs() > self.settings.elbow_threshold {
            RoutingMode::Elbow
        } else {
            RoutingMode::Straight
        };
        let defaults = ConnectorDefaults {
            color: c.color,
            stroke_width: c.stroke_width,
            line_style: c.line_style,
            head_style: c.head_style,
            has_start_head: c.has_start_head,
        };
        let mut fresh = connector::new_connector(id, Endpoints::new(start, p), &defaults);
        connector::reshape(&mut fresh, Endpoints::new(start, p), routing);
        fresh.style = old.style.clone();
        fresh.selectable = old.selectable;
        fresh.locked = old.locked;
        fresh.visible = old.visible;
        let changed = fresh != old;
        self.doc.objects.insert(index, fresh);
        self.set_selection([id]);
        changed
    }

    pub fn pointer_up(&mut self, p: egui::Pos2) {
        let state = std::mem::replace(&mut self.connector_state, ConnectorState::Idle);
        match state {
            ConnectorState::Creating { source, start, .. } => {
                self.transient_locks.clear();
                self.undraggable = None;
                self.finish_connector(source, start, p);
                return;
            }
            ConnectorState::ReshapingHead { connector, moved } => {
                if moved {
                    tracing::debug!(connector, "Reshaped connector");
                    self.commit();
                }
                return;
            }
            ConnectorState::Idle | ConnectorState::Hovering { .. } => {
                self.connector_state = state;
            }
        }

        if let Some(drag) = self.drag.take() {
            if drag.moved {
                self.commit();
            }
        }
    }

    fn finish_connector(&mut self, source: ObjectId, start: egui::Pos2, p: egui::Pos2) {
        let length = (p - start).length();
        if length < self.settings.min_connector_length {
            tracing::debug!(length, "Connector aborted: drag too short");
            return;
        }
        let end = self
            .port_near(p, self.settings.end_snap_radius, Some(source))
            .map_or(p, |(_, _, pos)| pos);
        let id = self.allocate_id();
        let object =
            connector::new_connector(id, Endpoints::new(start, end), &self.settings.connector);
        self.doc.objects.push(object);
        tracing::debug!(id, "Created connector");
        self.set_selection([id]);
        self.commit();
    }

    /// Restyles every selected connector and makes the style the default for
    /// new ones.
    pub fn update_connector_style(&mut self, update: &ConnectorStyleUpdate) -> bool {
        if update.is_empty() {
            return false;
        }
        let defaults = &mut self.settings.connector;
        if let Some(color) = update.color {
            defaults.color = color;
        }
        if let Some(width) = update.stroke_width {
            defaults.stroke_width = width.max(0.0);
        }
        if let Some(line_style) = update.line_style {
            defaults.line_style = line_style;
        }
        if let Some(head_style) = update.head_style {
            defaults.head_style = head_style;
        }
        if let Some(has_start_head) = update.has_start_head {
            defaults.has_start_head = has_start_head;
        }

        let selected = &self.selected;
        let mut changed = false;
        for object in &mut self.doc.objects {
            if selected.contains(&object.id) {
                model::walk_leaves_mut(object, &mut |leaf| {
                    changed |= connector::apply_style_update(leaf, update);
                });
            }
        }
        if changed {
            self.commit();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Style, Transform};

    fn rect(engine: &mut CanvasEngine, left: f32, top: f32) -> ObjectId {
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

    fn connectors(engine: &CanvasEngine) -> Vec<&SceneObject> {
        engine
            .document()
            .objects
            .iter()
            .filter(|o| o.as_connector().is_some())
            .collect()
    }

    #[test]
    fn hovering_a_port_snaps_and_pins_shape() {
        let mut engine = CanvasEngine::new();
        let a = rect(&mut engine, 100.0, 100.0);
        engine.set_flowchart_mode(true);
        engine.pointer_move(egui::pos2(255.0, 152.0));
        assert_eq!(
            engine.connector_state(),
            &ConnectorState::Hovering {
                shape: a,
                port: Some((Port::Right, egui::pos2(250.0, 150.0))),
            }
        );
        assert_eq!(engine.undraggable, Some(a));
    }

    #[test]
    fn creating_locks_everything_and_preview_is_transient() {
        let mut engine = CanvasEngine::new();
        let a = rect(&mut engine, 100.0, 100.0);
        let b = rect(&mut engine, 400.0, 100.0);
        engine.set_flowchart_mode(true);
        let undo_depth = engine.history.len();
        engine.pointer_move(egui::pos2(250.0, 150.0));
        engine.pointer_down(egui::pos2(250.0, 150.0));
        engine.pointer_move(egui::pos2(390.0, 160.0));
        assert!(engine.is_transiently_locked(a));
        assert!(engine.is_transiently_locked(b));
        let preview = engine.connector_preview().unwrap();
        assert_eq!(preview.candidate, Some((b, Port::Left, egui::pos2(400.0, 150.0))));
        assert_eq!(engine.history.len(), undo_depth);
        assert!(connectors(&engine).is_empty());
        assert!(engine.to_document().objects.iter().all(|o| !o.locked));
    }

    #[test]
    fn short_drag_aborts() {
        let mut engine = CanvasEngine::new();
        rect(&mut engine, 100.0, 100.0);
        engine.set_flowchart_mode(true);
        engine.pointer_move(egui::pos2(250.0, 150.0));
        engine.pointer_down(egui::pos2(250.0, 150.0));
        engine.pointer_move(egui::pos2(270.0, 150.0));
        engine.pointer_up(egui::pos2(270.0, 150.0));
        assert!(connectors(&engine).is_empty());
        assert_eq!(engine.connector_state(), &ConnectorState::Idle);
        assert!(!engine.is_transiently_locked(1));
    }

    #[test]
    fn reshaping_far_off_axis_makes_elbow() {
        let mut engine = CanvasEngine::new();
        engine.set_flowchart_mode(true);
        let id = engine.allocate_id();
        let object = connector::new_connector(
            id,
            Endpoints::new(egui::pos2(0.0, 0.0), egui::pos2(200.0, 0.0)),
            &ConnectorDefaults::default(),
        );
        engine.doc.objects.push(object);
        engine.commit();

        engine.pointer_down(egui::pos2(198.0, 3.0));
        assert!(matches!(engine.connector_state(), ConnectorState::ReshapingHead { .. }));
        engine.pointer_move(egui::pos2(220.0, 100.0));
        engine.pointer_up(egui::pos2(220.0, 100.0));

        let object = engine.document().find(id).unwrap();
        let c = object.as_connector().unwrap();
        assert_eq!(c.routing_mode, RoutingMode::Elbow);
        assert_eq!(c.endpoints.end(), egui::pos2(220.0, 100.0));
        assert_eq!(engine.document().index_of(id), Some(0));

        assert!(engine.undo());
        let c = engine.document().find(id).unwrap().as_connector().unwrap().clone();
        assert_eq!(c.routing_mode, RoutingMode::Straight);
    }

    #[test]
    fn drag_moves_selection_with_one_snapshot() {
        let mut engine = CanvasEngine::new();
        let a = rect(&mut engine, 100.0, 100.0);
        let depth = engine.history.len();
        engine.pointer_down(egui::pos2(150.0, 150.0));
        engine.pointer_move(egui::pos2(160.0, 150.0));
        engine.pointer_move(egui::pos2(170.0, 160.0));
        engine.pointer_up(egui::pos2(170.0, 160.0));
        let moved = engine.document().find(a).unwrap();
        assert_eq!(moved.transform.left, 120.0);
        assert_eq!(moved.transform.top, 110.0);
        assert_eq!(engine.history.len(), depth + 1);
    }

    #[test]
    fn click_on_empty_space_clears_selection() {
        let mut engine = CanvasEngine::new();
        rect(&mut engine, 100.0, 100.0);
        engine.pointer_down(egui::pos2(900.0, 900.0));
        engine.pointer_up(egui::pos2(900.0, 900.0));
        assert!(engine.selected_ids().is_empty());
    }

    #[test]
    fn locked_shapes_offer_no_ports() {
        let mut engine = CanvasEngine::new();
        let a = rect(&mut engine, 100.0, 100.0);
        engine.doc.find_mut(a).unwrap().locked = true;
        engine.set_flowchart_mode(true);
        engine.pointer_move(egui::pos2(250.0, 150.0));
        assert_eq!(engine.connector_state(), &ConnectorState::Idle);
        engine.pointer_down(egui::pos2(250.0, 150.0));
        engine.pointer_up(egui::pos2(350.0, 150.0));
        assert!(connectors(&engine).is_empty());
    }
}
