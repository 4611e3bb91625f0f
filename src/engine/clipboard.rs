use crate::model::{ObjectId, SceneObject};

use super::geometry::translate_object;
use super::CanvasEngine;

/// Deep copies of the objects last copied or cut. Each paste first shifts
/// the stored copies by the paste offset, so repeated pastes cascade.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipboardSet {
    pub objects: Vec<SceneObject>,
    pub pastes: u32,
}

impl CanvasEngine {
    pub fn has_clipboard(&self) -> bool {
        self.clipboard.as_ref().is_some_and(|c| !c.objects.is_empty())
    }

    pub fn clipboard(&self) -> Option<&ClipboardSet> {
        self.clipboard.as_ref()
    }

    pub fn copy(&mut self) -> bool {
        let objects: Vec<SceneObject> = self.selected_objects().cloned().collect();
        if objects.is_empty() {
            tracing::debug!("Copy ignored: nothing selected");
            return false;
        }
        tracing::debug!(count = objects.len(), "Copied objects");
        self.clipboard = Some(ClipboardSet { objects, pastes: 0 });
        true
    }

    pub fn cut(&mut self) -> bool {
        self.copy() && self.delete_selection()
    }

    /// Inserts fresh copies offset from the previous paste and selects them.
    pub fn paste(&mut self) -> Vec<ObjectId> {
        let ids = self.paste_transient();
        if !ids.is_empty() {
            self.commit();
        }
        ids
    }

    pub fn duplicate(&mut self) -> Vec<ObjectId> {
        if !self.copy() {
            return Vec::new();
        }
        self.paste()
    }

    fn paste_transient(&mut self) -> Vec<ObjectId> {
        let offset = egui::vec2(self.settings.paste_offset, self.settings.paste_offset);
        let Some(clipboard) = self.clipboard.as_mut() else {
            tracing::debug!("Paste ignored: clipboard empty");
            return Vec::new();
        };
        for object in &mut clipboard.objects {
            translate_object(object, offset);
        }
        clipboard.pastes += 1;
        let mut copies = clipboard.objects.clone();
        for copy in &mut copies {
            self.reassign_ids(copy);
        }
        let ids: Vec<ObjectId> = copies.iter().map(|o| o.id).collect();
        self.doc.objects.extend(copies);
        self.set_selection(ids.iter().copied());
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectKind, Style, Transform};

    fn engine_with_rect() -> (CanvasEngine, ObjectId) {
        let mut engine = CanvasEngine::new();
        let id = engine.add_object(SceneObject::new(
            0,
            Transform::at(100.0, 100.0),
            Style::default(),
            ObjectKind::Rect {
                width: 150.0,
                height: 100.0,
                corner_radius: 0.0,
            },
        ));
        (engine, id)
    }

    #[test]
    fn pastes_cascade() {
        let (mut engine, _) = engine_with_rect();
        engine.copy();
        let first = engine.paste();
        let second = engine.paste();
        let left = |id| engine.document().find(id).unwrap().transform.left;
        assert_eq!(left(first[0]), 120.0);
        assert_eq!(left(second[0]), 140.0);
        assert_eq!(engine.selected_ids(), second);
    }

    #[test]
    fn clipboard_is_independent_of_scene() {
        let (mut engine, id) = engine_with_rect();
        engine.copy();
        engine.doc.find_mut(id).unwrap().transform.left = 900.0;
        let pasted = engine.paste();
        assert_eq!(engine.document().find(pasted[0]).unwrap().transform.left, 120.0);
    }

    #[test]
    fn cut_removes_and_records_once() {
        let (mut engine, _) = engine_with_rect();
        assert!(engine.cut());
        assert!(engine.document().objects.is_empty());
        assert!(engine.undo());
        assert_eq!(engine.document().objects.len(), 1);
    }

    #[test]
    fn duplicate_gets_new_ids() {
        let (mut engine, id) = engine_with_rect();
        let dup = engine.duplicate();
        assert_eq!(dup.len(), 1);
        assert_ne!(dup[0], id);
        assert_eq!(engine.document().objects.len(), 2);
        assert!(engine.undo());
        assert_eq!(engine.document().objects.len(), 1);
    }

    #[test]
    fn paste_without_copy_is_noop() {
        let mut engine = CanvasEngine::new();
        assert!(engine.paste().is_empty());
        assert!(!engine.can_undo());
    }
}
