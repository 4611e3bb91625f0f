//! The editing engine: one `CanvasEngine` owns a document together with its
//! selection, history, clipboard, viewport and connector state.
//!
//! Operations are spread over the submodules as `impl CanvasEngine` blocks.

use crate::error::{CanvasError, Result};
use crate::model::{Document, ObjectId, SceneObject};
use std::collections::HashSet;

pub mod actions;
pub mod assets;
pub mod clipboard;
pub mod command_palette;
pub mod connector;
pub mod doc_ops;
pub mod filters;
pub mod geometry;
pub mod history;
pub mod interaction;
pub mod settings;
pub mod viewport;

use assets::{AssetLoader, FsLoader};
use clipboard::ClipboardSet;
use history::History;
use interaction::{ConnectorState, DragMove};
use settings::EngineSettings;
use viewport::Viewport;

/// Notifications for the host, drained with [`CanvasEngine::take_events`].
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Selected ids in z-order; empty when nothing is selected.
    SelectionChanged(Vec<ObjectId>),
    DocumentModified,
    ZoomChanged(f32),
}

pub struct CanvasEngine {
    doc: Document,
    selected: HashSet<ObjectId>,
    next_id: ObjectId,
    history: History,
    clipboard: Option<ClipboardSet>,
    viewport: Viewport,
    connector_state: ConnectorState,
    flowchart_mode: bool,
    /// Objects locked for the duration of a gesture. Never serialized.
    transient_locks: HashSet<ObjectId>,
    /// Shape whose port is being aimed at; it must not start a drag.
    undraggable: Option<ObjectId>,
    drag: Option<DragMove>,
    events: Vec<EngineEvent>,
    settings: EngineSettings,
    assets: Box<dyn AssetLoader>,
}

impl Default for CanvasEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CanvasEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasEngine")
            .field("objects", &self.doc.objects.len())
            .field("selected", &self.selected.len())
            .field("zoom", &self.viewport.zoom)
            .field("connector_state", &self.connector_state)
            .finish_non_exhaustive()
    }
}

impl CanvasEngine {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let mut doc = Document::new(settings.document_width, settings.document_height);
        doc.background = settings.background.clone();
        Self::build(doc, settings, Viewport::default())
    }

    /// An engine for rendering only, with an identity viewport.
    pub fn offscreen(doc: Document) -> Self {
        Self::build(doc, EngineSettings::default(), Viewport::identity())
    }

    fn build(doc: Document, settings: EngineSettings, viewport: Viewport) -> Self {
        let mut configured = Viewport::from_settings(&settings);
        configured.zoom = viewport.zoom;
        configured.pan = viewport.pan;
        let mut engine = Self {
            next_id: doc.max_id() + 1,
            doc,
            selected: HashSet::new(),
            history: History::new(settings.history_capacity),
            clipboard: None,
            viewport: configured,
            connector_state: ConnectorState::Idle,
            flowchart_mode: false,
            transient_locks: HashSet::new(),
            undraggable: None,
            drag: None,
            events: Vec::new(),
            settings,
            assets: Box::new(FsLoader),
        };
        engine.reset_history();
        engine
    }

    pub fn with_asset_loader(mut self, loader: impl AssetLoader + 'static) -> Self {
        self.assets = Box::new(loader);
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn to_document(&self) -> Document {
        self.doc.clone()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.doc)?)
    }

    /// Replaces the document. Connector parts are regenerated from their
    /// endpoints and style. On validation failure the current document is
    /// kept untouched.
    pub fn load_document(&mut self, mut doc: Document) -> Result<()> {
        connector::rebuild_all(&mut doc.objects);
        doc.validate().map_err(CanvasError::InvalidDocument)?;
        tracing::info!(objects = doc.objects.len(), "Loaded document");
        self.doc = doc;
        self.next_id = self.doc.max_id() + 1;
        self.clear_transient();
        self.set_selection(Vec::new());
        self.reset_history();
        self.events.push(EngineEvent::DocumentModified);
        Ok(())
    }

    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let doc: Document = serde_json::from_str(json).map_err(|e| {
            tracing::warn!("Rejected corrupt document: {e}");
            CanvasError::from(e)
        })?;
        self.load_document(doc)
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn serialize_doc(&self) -> Option<String> {
        match serde_json::to_string(&self.doc) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!("Failed to serialize snapshot: {e}");
                None
            }
        }
    }

    fn reset_history(&mut self) {
        if let Some(json) = self.serialize_doc() {
            self.history.reset(json);
        }
    }

    /// Records one history entry for a finished mutation.
    pub(crate) fn commit(&mut self) {
        if let Some(json) = self.serialize_doc() {
            self.history.push(json);
        }
        self.events.push(EngineEvent::DocumentModified);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let Some(json) = self.history.undo().map(|e| e.json.clone()) else {
            tracing::debug!("Nothing to undo");
            return false;
        };
        self.restore(&json)
    }

    pub fn redo(&mut self) -> bool {
        let Some(json) = self.history.redo().map(|e| e.json.clone()) else {
            tracing::debug!("Nothing to redo");
            return false;
        };
        self.restore(&json)
    }

    fn restore(&mut self, json: &str) -> bool {
        let doc: Document = match serde_json::from_str(json) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("History entry failed to parse: {e}");
                return false;
            }
        };
        self.doc = doc;
        self.next_id = self.next_id.max(self.doc.max_id() + 1);
        self.clear_transient();
        let keep: Vec<ObjectId> = self
            .selected
            .iter()
            .copied()
            .filter(|id| self.doc.index_of(*id).is_some())
            .collect();
        self.set_selection(keep);
        self.events.push(EngineEvent::DocumentModified);
        true
    }

    fn clear_transient(&mut self) {
        self.connector_state = ConnectorState::Idle;
        self.transient_locks.clear();
        self.undraggable = None;
        self.drag = None;
    }

    pub fn selected_ids(&self) -> Vec<ObjectId> {
        self.doc
            .objects
            .iter()
            .map(|o| o.id)
            .filter(|id| self.selected.contains(id))
            .collect()
    }

    pub fn is_selected(&self, id: ObjectId) -> bool {
        self.selected.contains(&id)
    }

    pub(crate) fn selected_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.doc
            .objects
            .iter()
            .filter(|o| self.selected.contains(&o.id))
    }

    /// Replaces the selection with the top-level ids in `ids`.
    pub(crate) fn set_selection(&mut self, ids: impl IntoIterator<Item = ObjectId>) {
        let next: HashSet<ObjectId> = ids
            .into_iter()
            .filter(|id| self.doc.index_of(*id).is_some())
            .collect();
        if next != self.selected {
            self.selected = next;
            let ids = self.selected_ids();
            self.events.push(EngineEvent::SelectionChanged(ids));
        }
    }

    pub(crate) fn emit_zoom(&mut self) {
        self.events.push(EngineEvent::ZoomChanged(self.viewport.zoom));
    }

    /// Whether pointer gestures may pick or move `object`.
    pub(crate) fn is_interactive(&self, object: &SceneObject) -> bool {
        object.visible
            && object.selectable
            && !object.locked
            && !self.transient_locks.contains(&object.id)
    }
}
