//! Presentation-only zoom and pan. Nothing here touches scene coordinates.

use super::settings::EngineSettings;
use super::CanvasEngine;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Settle {
    remaining: u32,
    last_size: Option<egui::Vec2>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    /// Screen offset of the scene origin.
    pub pan: egui::Vec2,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,
    pub padding: f32,
    fit_retry_attempts: u32,
    settle: Option<Settle>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

impl Viewport {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            zoom: 1.0,
            pan: egui::Vec2::ZERO,
            min_zoom: settings.min_zoom,
            max_zoom: settings.max_zoom.max(settings.min_zoom),
            zoom_step: settings.zoom_step.max(1.0 + f32::EPSILON),
            padding: settings.fit_padding.max(0.0),
            fit_retry_attempts: settings.fit_retry_attempts,
            settle: None,
        }
    }

    /// The identity mapping used by off-screen export targets.
    pub fn identity() -> Self {
        Self {
            zoom: 1.0,
            pan: egui::Vec2::ZERO,
            ..Self::default()
        }
    }

    pub fn scene_to_screen(&self, scene: egui::Pos2) -> egui::Pos2 {
        (self.pan + scene.to_vec2() * self.zoom).to_pos2()
    }

    pub fn screen_to_scene(&self, screen: egui::Pos2) -> egui::Pos2 {
        ((screen.to_vec2() - self.pan) / self.zoom).to_pos2()
    }

    fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Centres the document inside the available area.
    pub fn zoom_to_fit(&mut self, doc_w: f32, doc_h: f32, avail_w: f32, avail_h: f32) {
        if doc_w <= 0.0 || doc_h <= 0.0 {
            return;
        }
        let fit = ((avail_w - 2.0 * self.padding) / doc_w)
            .min((avail_h - 2.0 * self.padding) / doc_h)
            .min(self.max_zoom);
        self.zoom = fit.max(self.min_zoom);
        self.pan = egui::vec2(
            (avail_w - doc_w * self.zoom) * 0.5,
            (avail_h - doc_h * self.zoom) * 0.5,
        );
    }

    pub fn zoom_in(&mut self) {
        self.zoom = self.clamp(self.zoom * self.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = self.clamp(self.zoom / self.zoom_step);
    }

    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = egui::Vec2::ZERO;
    }

    /// Keeps the scene point under `screen_point` fixed while zooming.
    pub fn zoom_about_screen_point(&mut self, screen_point: egui::Pos2, zoom_delta: f32) {
        let before = self.screen_to_scene(screen_point);
        self.zoom = self.clamp(self.zoom * zoom_delta);
        let after = self.scene_to_screen(before);
        self.pan += screen_point - after;
    }

    /// Arms the settle loop after the host container resized.
    pub fn begin_settle(&mut self) {
        self.settle = Some(Settle {
            remaining: self.fit_retry_attempts,
            last_size: None,
        });
    }

    pub fn is_settling(&self) -> bool {
        self.settle.is_some()
    }

    /// Feeds one layout pass of the settle loop. Returns `true` when the fit
    /// was recomputed. The loop ends once the same size is reported twice in
    /// a row or the attempts run out.
    pub fn on_layout(&mut self, doc_w: f32, doc_h: f32, avail: egui::Vec2) -> bool {
        let Some(mut settle) = self.settle else {
            return false;
        };
        if settle.remaining == 0 || settle.last_size == Some(avail) {
            self.settle = None;
            return false;
        }
        self.zoom_to_fit(doc_w, doc_h, avail.x, avail.y);
        settle.remaining -= 1;
        settle.last_size = Some(avail);
        self.settle = Some(settle);
        true
    }
}

impl CanvasEngine {
    pub fn zoom(&self) -> f32 {
        self.viewport.zoom
    }

    fn zoom_changed_from(&mut self, before: f32) {
        if (self.viewport.zoom - before).abs() > f32::EPSILON {
            self.emit_zoom();
        }
    }

    pub fn zoom_in(&mut self) {
        let before = self.viewport.zoom;
        self.viewport.zoom_in();
        self.zoom_changed_from(before);
    }

    pub fn zoom_out(&mut self) {
        let before = self.viewport.zoom;
        self.viewport.zoom_out();
        self.zoom_changed_from(before);
    }

    pub fn reset_zoom(&mut self) {
        let before = self.viewport.zoom;
        self.viewport.reset();
        self.zoom_changed_from(before);
    }

    pub fn zoom_to_fit(&mut self, avail_w: f32, avail_h: f32) {
        let before = self.viewport.zoom;
        self.viewport
            .zoom_to_fit(self.doc.width, self.doc.height, avail_w, avail_h);
        self.zoom_changed_from(before);
    }

    pub fn zoom_about(&mut self, screen_point: egui::Pos2, zoom_delta: f32) {
        let before = self.viewport.zoom;
        self.viewport.zoom_about_screen_point(screen_point, zoom_delta);
        self.zoom_changed_from(before);
    }

    /// The host container changed size; refits now and keeps refitting on
    /// subsequent [`CanvasEngine::on_layout`] calls until the size settles.
    pub fn on_resize(&mut self, avail: egui::Vec2) {
        self.viewport.begin_settle();
        self.on_layout(avail);
    }

    pub fn on_layout(&mut self, avail: egui::Vec2) -> bool {
        let before = self.viewport.zoom;
        let refit = self
            .viewport
            .on_layout(self.doc.width, self.doc.height, avail);
        self.zoom_changed_from(before);
        refit
    }

    pub fn screen_to_scene(&self, screen: egui::Pos2) -> egui::Pos2 {
        self.viewport.screen_to_scene(screen)
    }

    pub fn scene_to_screen(&self, scene: egui::Pos2) -> egui::Pos2 {
        self.viewport.scene_to_screen(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_uses_the_tighter_axis() {
        let mut v = Viewport::default();
        v.zoom_to_fit(1080.0, 1080.0, 880.0, 1200.0);
        assert!((v.zoom - 800.0 / 1080.0).abs() < 1e-5);
        assert!((v.pan.x - 40.0).abs() < 1e-3);
    }

    #[test]
    fn fit_never_exceeds_max_zoom() {
        let mut v = Viewport::default();
        v.zoom_to_fit(10.0, 10.0, 5000.0, 5000.0);
        assert_eq!(v.zoom, v.max_zoom);
    }

    #[test]
    fn zoom_steps_are_clamped() {
        let mut v = Viewport::default();
        for _ in 0..100 {
            v.zoom_in();
        }
        assert_eq!(v.zoom, v.max_zoom);
        for _ in 0..200 {
            v.zoom_out();
        }
        assert_eq!(v.zoom, v.min_zoom);
    }

    #[test]
    fn screen_scene_round_trip() {
        let mut v = Viewport::default();
        v.zoom_to_fit(1080.0, 1080.0, 900.0, 700.0);
        let p = egui::pos2(123.0, 456.0);
        let back = v.screen_to_scene(v.scene_to_screen(p));
        assert!((back - p).length() < 1e-3);
    }

    #[test]
    fn zoom_about_point_keeps_anchor() {
        let mut v = Viewport::default();
        let anchor = egui::pos2(300.0, 200.0);
        let scene = v.screen_to_scene(anchor);
        v.zoom_about_screen_point(anchor, 2.0);
        assert!((v.scene_to_screen(scene) - anchor).length() < 1e-3);
    }

    #[test]
    fn settle_stops_on_stable_size() {
        let mut v = Viewport::default();
        v.begin_settle();
        assert!(v.on_layout(1080.0, 1080.0, egui::vec2(500.0, 500.0)));
        assert!(v.on_layout(1080.0, 1080.0, egui::vec2(800.0, 600.0)));
        assert!(!v.on_layout(1080.0, 1080.0, egui::vec2(800.0, 600.0)));
        assert!(!v.is_settling());
    }

    #[test]
    fn settle_gives_up_after_attempts() {
        let mut v = Viewport::default();
        v.begin_settle();
        let mut recomputed = 0;
        for i in 0..20 {
            if v.on_layout(1080.0, 1080.0, egui::vec2(400.0 + i as f32, 400.0)) {
                recomputed += 1;
            }
        }
        assert_eq!(recomputed, 5);
    }

    #[test]
    fn engine_emits_zoom_changes_only_when_zoom_moves() {
        let mut engine = CanvasEngine::new();
        engine.take_events();
        engine.zoom_in();
        engine.reset_zoom();
        engine.reset_zoom();
        let events = engine.take_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], super::super::EngineEvent::ZoomChanged(z) if z > 1.0));
    }

    #[test]
    fn zoom_never_touches_the_document() {
        let mut engine = CanvasEngine::new();
        let before = engine.to_document();
        engine.zoom_to_fit(400.0, 300.0);
        engine.zoom_about(egui::pos2(10.0, 10.0), 3.0);
        assert_eq!(engine.to_document(), before);
    }
}
