use crate::error::Result;
use crate::model::FilterKind;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::actions::{Arrange, BackgroundSource, ShapeKind, TextOptions};
use super::assets::ImageSource;
use super::connector::ConnectorStyleUpdate;
use super::doc_ops::{AlignEdge, Axis};
use super::CanvasEngine;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ZoomCommand {
    In,
    Out,
    Reset,
    Fit { avail_w: f32, avail_h: f32 },
}

/// Everything a host can ask of the engine outside of pointer gestures.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    AddShape(ShapeKind),
    AddText { text: String, options: TextOptions },
    AddImage(ImageSource),
    SetBackground(BackgroundSource),
    DeleteSelection,
    SelectAll,
    Group,
    Ungroup,
    Copy,
    Cut,
    Paste,
    Duplicate,
    AlignToCanvas(AlignEdge),
    AlignSelection(AlignEdge),
    Distribute(Axis),
    Arrange(Arrange),
    Undo,
    Redo,
    Zoom(ZoomCommand),
    SetFlowchartMode(bool),
    UpdateConnectorStyle(ConnectorStyleUpdate),
    ApplyImageFilter { kind: FilterKind, value: f32 },
    RemoveImageFilters,
    Flip(Axis),
}

impl CanvasEngine {
    /// Runs one command. Returns whether it had any effect; invalid commands
    /// are no-ops, only asset loading can fail.
    pub fn execute(&mut self, command: Command) -> Result<bool> {
        tracing::debug!(?command, "Executing command");
        let changed = match command {
            Command::AddShape(kind) => {
                self.add_shape(kind);
                true
            }
            Command::AddText { text, options } => {
                self.add_text(&text, options);
                true
            }
            Command::AddImage(source) => {
                self.add_image(&source)?;
                true
            }
            Command::SetBackground(source) => {
                self.set_background(source)?;
                true
            }
            Command::DeleteSelection => self.delete_selection(),
            Command::SelectAll => {
                self.select_all();
                true
            }
            Command::Group => self.group().is_some(),
            Command::Ungroup => !self.ungroup().is_empty(),
            Command::Copy => self.copy(),
            Command::Cut => self.cut(),
            Command::Paste => !self.paste().is_empty(),
            Command::Duplicate => !self.duplicate().is_empty(),
            Command::AlignToCanvas(edge) => self.align_to_canvas(edge),
            Command::AlignSelection(edge) => self.align_selection(edge),
            Command::Distribute(axis) => self.distribute_selection(axis),
            Command::Arrange(arrange) => self.arrange(arrange),
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            Command::Zoom(zoom) => {
                let before = self.zoom();
                match zoom {
                    ZoomCommand::In => self.zoom_in(),
                    ZoomCommand::Out => self.zoom_out(),
                    ZoomCommand::Reset => self.reset_zoom(),
                    ZoomCommand::Fit { avail_w, avail_h } => self.zoom_to_fit(avail_w, avail_h),
                }
                self.zoom() != before
            }
            Command::SetFlowchartMode(enabled) => {
                let changed = self.flowchart_mode() != enabled;
                self.set_flowchart_mode(enabled);
                changed
            }
            Command::UpdateConnectorStyle(update) => self.update_connector_style(&update),
            Command::ApplyImageFilter { kind, value } => self.apply_image_filter(kind, value),
            Command::RemoveImageFilters => self.remove_image_filters(),
            Command::Flip(axis) => self.flip_selected(axis),
        };
        Ok(changed)
    }

    pub fn command_context(&self) -> CommandContext {
        CommandContext {
            selected_len: self.selected.len(),
            has_undo: self.can_undo(),
            has_redo: self.can_redo(),
            can_ungroup: self.selected_objects().any(|o| o.is_group()),
            has_clipboard: self.has_clipboard(),
            flowchart_mode: self.flowchart_mode,
        }
    }
}

/// Parameterless commands offered by the palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandId {
    AddRectangle,
    AddEllipse,
    AddTriangle,
    AddDiamond,
    AddLine,
    Undo,
    Redo,
    Copy,
    Cut,
    Paste,
    Duplicate,
    Delete,
    SelectAll,
    Group,
    Ungroup,
    BringFront,
    SendBack,
    LayerUp,
    LayerDown,
    AlignLeft,
    AlignHCenter,
    AlignRight,
    AlignTop,
    AlignVCenter,
    AlignBottom,
    DistributeH,
    DistributeV,
    FlipH,
    FlipV,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    ToggleFlowchart,
    RemoveFilters,
}

pub struct CommandSpec {
    pub id: CommandId,
    pub name: &'static str,
    pub search: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec { id: CommandId::AddRectangle, name: "Add: Rectangle", search: "add rectangle rect shape" },
    CommandSpec { id: CommandId::AddEllipse, name: "Add: Ellipse", search: "add ellipse oval circle shape" },
    CommandSpec { id: CommandId::AddTriangle, name: "Add: Triangle", search: "add triangle shape" },
    CommandSpec { id: CommandId::AddDiamond, name: "Add: Diamond", search: "add diamond decision rhombus shape" },
    CommandSpec { id: CommandId::AddLine, name: "Add: Line", search: "add line shape" },
    CommandSpec { id: CommandId::Undo, name: "Edit: Undo", search: "undo" },
    CommandSpec { id: CommandId::Redo, name: "Edit: Redo", search: "redo" },
    CommandSpec { id: CommandId::Copy, name: "Edit: Copy", search: "copy clipboard" },
    CommandSpec { id: CommandId::Cut, name: "Edit: Cut", search: "cut clipboard" },
    CommandSpec { id: CommandId::Paste, name: "Edit: Paste", search: "paste clipboard" },
    CommandSpec { id: CommandId::Duplicate, name: "Edit: Duplicate", search: "duplicate clone" },
    CommandSpec { id: CommandId::Delete, name: "Edit: Delete", search: "delete remove" },
    CommandSpec { id: CommandId::SelectAll, name: "Edit: Select all", search: "select all" },
    CommandSpec { id: CommandId::Group, name: "Group: Group", search: "group" },
    CommandSpec { id: CommandId::Ungroup, name: "Group: Ungroup", search: "ungroup" },
    CommandSpec { id: CommandId::BringFront, name: "Layer: Bring to front", search: "front bring layer" },
    CommandSpec { id: CommandId::SendBack, name: "Layer: Send to back", search: "back send layer" },
    CommandSpec { id: CommandId::LayerUp, name: "Layer: Move up", search: "layer up move forward" },
    CommandSpec { id: CommandId::LayerDown, name: "Layer: Move down", search: "layer down move backward" },
    CommandSpec { id: CommandId::AlignLeft, name: "Canvas: Align left", search: "align left canvas" },
    CommandSpec { id: CommandId::AlignHCenter, name: "Canvas: Center horizontally", search: "align center horizontal canvas" },
    CommandSpec { id: CommandId::AlignRight, name: "Canvas: Align right", search: "align right canvas" },
    CommandSpec { id: CommandId::AlignTop, name: "Canvas: Align top", search: "align top canvas" },
    CommandSpec { id: CommandId::AlignVCenter, name: "Canvas: Center vertically", search: "align middle vertical canvas" },
    CommandSpec { id: CommandId::AlignBottom, name: "Canvas: Align bottom", search: "align bottom canvas" },
    CommandSpec { id: CommandId::DistributeH, name: "Distribute: Horizontal", search: "distribute horizontal" },
    CommandSpec { id: CommandId::DistributeV, name: "Distribute: Vertical", search: "distribute vertical" },
    CommandSpec { id: CommandId::FlipH, name: "Transform: Flip horizontal", search: "flip mirror horizontal" },
    CommandSpec { id: CommandId::FlipV, name: "Transform: Flip vertical", search: "flip mirror vertical" },
    CommandSpec { id: CommandId::ZoomIn, name: "View: Zoom in", search: "zoom in view" },
    CommandSpec { id: CommandId::ZoomOut, name: "View: Zoom out", search: "zoom out view" },
    CommandSpec { id: CommandId::ZoomReset, name: "View: Reset zoom", search: "zoom reset 100 view" },
    CommandSpec { id: CommandId::ToggleFlowchart, name: "Connect: Toggle flowchart mode", search: "flowchart connector arrow mode toggle" },
    CommandSpec { id: CommandId::RemoveFilters, name: "Image: Remove filters", search: "image filters remove reset" },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandContext {
    pub selected_len: usize,
    pub has_undo: bool,
    pub has_redo: bool,
    pub can_ungroup: bool,
    pub has_clipboard: bool,
    pub flowchart_mode: bool,
}

impl CommandId {
    pub fn to_command(self, cx: CommandContext) -> Command {
        match self {
            CommandId::AddRectangle => Command::AddShape(ShapeKind::Rectangle),
            CommandId::AddEllipse => Command::AddShape(ShapeKind::Ellipse),
            CommandId::AddTriangle => Command::AddShape(ShapeKind::Triangle),
            CommandId::AddDiamond => Command::AddShape(ShapeKind::Diamond),
            CommandId::AddLine => Command::AddShape(ShapeKind::Line),
            CommandId::Undo => Command::Undo,
            CommandId::Redo => Command::Redo,
            CommandId::Copy => Command::Copy,
            CommandId::Cut => Command::Cut,
            CommandId::Paste => Command::Paste,
            CommandId::Duplicate => Command::Duplicate,
            CommandId::Delete => Command::DeleteSelection,
            CommandId::SelectAll => Command::SelectAll,
            CommandId::Group => Command::Group,
            CommandId::Ungroup => Command::Ungroup,
            CommandId::BringFront => Command::Arrange(Arrange::Front),
            CommandId::SendBack => Command::Arrange(Arrange::Back),
            CommandId::LayerUp => Command::Arrange(Arrange::Forward),
            CommandId::LayerDown => Command::Arrange(Arrange::Backward),
            CommandId::AlignLeft => Command::AlignToCanvas(AlignEdge::Left),
            CommandId::AlignHCenter => Command::AlignToCanvas(AlignEdge::CenterH),
            CommandId::AlignRight => Command::AlignToCanvas(AlignEdge::Right),
            CommandId::AlignTop => Command::AlignToCanvas(AlignEdge::Top),
            CommandId::AlignVCenter => Command::AlignToCanvas(AlignEdge::CenterV),
            CommandId::AlignBottom => Command::AlignToCanvas(AlignEdge::Bottom),
            CommandId::DistributeH => Command::Distribute(Axis::Horizontal),
            CommandId::DistributeV => Command::Distribute(Axis::Vertical),
            CommandId::FlipH => Command::Flip(Axis::Horizontal),
            CommandId::FlipV => Command::Flip(Axis::Vertical),
            CommandId::ZoomIn => Command::Zoom(ZoomCommand::In),
            CommandId::ZoomOut => Command::Zoom(ZoomCommand::Out),
            CommandId::ZoomReset => Command::Zoom(ZoomCommand::Reset),
            CommandId::ToggleFlowchart => Command::SetFlowchartMode(!cx.flowchart_mode),
            CommandId::RemoveFilters => Command::RemoveImageFilters,
        }
    }

    pub fn is_enabled(self, cx: CommandContext) -> bool {
        match self {
            CommandId::Undo => cx.has_undo,
            CommandId::Redo => cx.has_redo,
            CommandId::Paste => cx.has_clipboard,
            CommandId::Copy
            | CommandId::Cut
            | CommandId::Duplicate
            | CommandId::Delete
            | CommandId::BringFront
            | CommandId::SendBack
            | CommandId::LayerUp
            | CommandId::LayerDown
            | CommandId::AlignLeft
            | CommandId::AlignHCenter
            | CommandId::AlignRight
            | CommandId::AlignTop
            | CommandId::AlignVCenter
            | CommandId::AlignBottom
            | CommandId::FlipH
            | CommandId::FlipV
            | CommandId::RemoveFilters => cx.selected_len > 0,
            CommandId::Group => cx.selected_len >= 2,
            CommandId::Ungroup => cx.can_ungroup,
            CommandId::DistributeH | CommandId::DistributeV => cx.selected_len >= 3,
            _ => true,
        }
    }
}

/// Fuzzy search over [`COMMANDS`]. Rendering is left to the host.
#[derive(Default)]
pub struct CommandPalette {
    pub open: bool,
    pub query: String,
    pub selected: usize,
}

impl CommandPalette {
    pub fn open(&mut self, query: impl Into<String>) {
        self.open = true;
        self.query = query.into();
        self.selected = 0;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.query.clear();
        self.selected = 0;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.selected = 0;
    }

    pub fn filtered(&self) -> Vec<(&'static CommandSpec, i64)> {
        let matcher = SkimMatcherV2::default();
        let q = self.query.trim();
        if q.is_empty() {
            return COMMANDS.iter().map(|c| (c, 0)).collect();
        }
        let mut out = Vec::new();
        for c in COMMANDS {
            if let Some(score) = matcher.fuzzy_match(c.search, q) {
                out.push((c, score));
            }
        }
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name.cmp(b.0.name)));
        out
    }

    pub fn move_selection(&mut self, delta: i32) {
        let len = self.filtered().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as i64 + i64::from(delta)).clamp(0, len as i64 - 1);
        self.selected = next as usize;
    }

    /// Resolves the highlighted entry, closing the palette when it is
    /// runnable in the current context.
    pub fn accept(&mut self, cx: CommandContext) -> Option<Command> {
        let matches = self.filtered();
        let (spec, _) = matches.get(self.selected.min(matches.len().saturating_sub(1)))?;
        if !spec.id.is_enabled(cx) {
            return None;
        }
        let command = spec.id.to_command(cx);
        self.close();
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_query_ranks_matching_commands() {
        let mut palette = CommandPalette::default();
        palette.open("ungrp");
        let matches = palette.filtered();
        assert_eq!(matches.first().map(|(c, _)| c.id), Some(CommandId::Ungroup));
    }

    #[test]
    fn empty_query_lists_everything() {
        let palette = CommandPalette::default();
        assert_eq!(palette.filtered().len(), COMMANDS.len());
    }

    #[test]
    fn disabled_commands_are_not_accepted() {
        let mut engine = CanvasEngine::new();
        let mut palette = CommandPalette::default();
        palette.open("group");
        palette.selected = palette
            .filtered()
            .iter()
            .position(|(c, _)| c.id == CommandId::Group)
            .unwrap();
        assert!(palette.accept(engine.command_context()).is_none());
        assert!(palette.open);

        engine.add_shape(ShapeKind::Rectangle);
        engine.add_shape(ShapeKind::Ellipse);
        engine.select_all();
        let command = palette.accept(engine.command_context()).unwrap();
        assert_eq!(command, Command::Group);
        assert!(!palette.open);
        assert!(engine.execute(command).unwrap());
        assert_eq!(engine.document().objects.len(), 1);
    }

    #[test]
    fn every_palette_entry_resolves() {
        let cx = CanvasEngine::new().command_context();
        for spec in COMMANDS {
            let _ = spec.id.to_command(cx);
        }
        assert_eq!(
            COMMANDS.iter().filter(|c| c.id == CommandId::ToggleFlowchart).count(),
            1
        );
    }

    #[test]
    fn execute_reports_noops() {
        let mut engine = CanvasEngine::new();
        assert!(!engine.execute(Command::Ungroup).unwrap());
        assert!(!engine.execute(Command::Undo).unwrap());
        assert!(engine.execute(Command::AddShape(ShapeKind::Circle)).unwrap());
        assert!(engine.execute(Command::Undo).unwrap());
    }

    #[test]
    fn move_selection_clamps_to_matches() {
        let mut palette = CommandPalette::default();
        palette.open("");
        palette.move_selection(-1);
        assert_eq!(palette.selected, 0);
        palette.move_selection(3);
        assert_eq!(palette.selected, 3);
        palette.move_selection(1000);
        assert_eq!(palette.selected, COMMANDS.len() - 1);

        palette.set_query("qqqqzzzz");
        palette.move_selection(2);
        assert_eq!(palette.selected, 0);
        assert!(palette.accept(CanvasEngine::new().command_context()).is_none());
    }
}
