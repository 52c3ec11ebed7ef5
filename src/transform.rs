//! Stan przesuwania i przybliżania mapy.
//!
//! Macierz ma postać
//! ```text
//! | scale_x  skew_x   translate_x |
//! | skew_y   scale_y  translate_y |
//! | 0        0        1           |
//! ```
//! i jest nakładana na wynik rzutowania kartograficznego.

use geo::Coord;
use serde::Deserialize;
use tracing::trace;
use crate::projection::Projection;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AffineTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self { scale_x: 1.0, scale_y: 1.0, translate_x: 0.0, translate_y: 0.0, skew_x: 0.0, skew_y: 0.0 }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self { translate_x: dx, translate_y: dy, ..Self::identity() }
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self { scale_x: sx, scale_y: sy, ..Self::identity() }
    }

    pub fn determinant(&self) -> f64 {
        self.scale_x * self.scale_y - self.skew_x * self.skew_y
    }

    pub fn apply(&self, p: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.scale_x * p.x + self.skew_x * p.y + self.translate_x,
            y: self.skew_y * p.x + self.scale_y * p.y + self.translate_y,
        }
    }

    /// Macierz odwrotna; `None` dla macierzy osobliwej
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Self {
            scale_x: self.scale_y / det,
            skew_x: -self.skew_x / det,
            skew_y: -self.skew_y / det,
            scale_y: self.scale_x / det,
            translate_x: (self.skew_x * self.translate_y - self.scale_y * self.translate_x) / det,
            translate_y: (self.skew_y * self.translate_x - self.scale_x * self.translate_y) / det,
        })
    }

    pub fn apply_inverse(&self, p: Coord<f64>) -> Option<Coord<f64>> {
        self.inverse().map(|inv| inv.apply(p))
    }

    /// `self · other`: najpierw `other`, potem `self`
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            scale_x: self.scale_x * other.scale_x + self.skew_x * other.skew_y,
            skew_x: self.scale_x * other.skew_x + self.skew_x * other.scale_y,
            translate_x: self.scale_x * other.translate_x + self.skew_x * other.translate_y + self.translate_x,
            skew_y: self.skew_y * other.scale_x + self.scale_y * other.skew_y,
            scale_y: self.skew_y * other.skew_x + self.scale_y * other.scale_y,
            translate_y: self.skew_y * other.translate_x + self.scale_y * other.translate_y + self.translate_y,
        }
    }
}

/// Jak przesunięcie wskaźnika przekłada się na translację
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanMode {
    /// Surowa delta ekranowa: mapa jedzie razem z kursorem
    #[default]
    Screen,
    /// Delta dzielona przez bieżącą skalę
    ScaleAdjusted,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self { min: 0.5, max: 4.0 }
    }
}

impl ScaleBounds {
    /// Granice w poprawnej kolejności (min ≤ max)
    fn ordered(self) -> Self {
        if self.min <= self.max { self } else { Self { min: self.max, max: self.min } }
    }

    /// Dodatnią skalę spoza granic dociąga do najbliższej granicy
    pub fn clamp(&self, scale: f64) -> f64 {
        if scale > 0.0 { scale.clamp(self.min, self.max) } else { scale }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum DragState {
    Idle,
    Dragging { anchor: Coord<f64>, last: Coord<f64>, moved: bool },
}

/// Co oznaczało puszczenie wskaźnika
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerRelease {
    /// Wskaźnik nie ruszył się od naciśnięcia
    Click(Coord<f64>),
    Pan,
    Ignored,
}

/// Jedyny właściciel macierzy widoku mapy
#[derive(Clone, Debug)]
pub struct TransformController {
    matrix: AffineTransform,
    initial: AffineTransform,
    bounds: ScaleBounds,
    pan_mode: PanMode,
    state: DragState,
}

impl TransformController {
    pub fn new(initial: AffineTransform, bounds: ScaleBounds, pan_mode: PanMode) -> Self {
        let bounds = bounds.ordered();
        let initial = AffineTransform {
            scale_x: bounds.clamp(initial.scale_x),
            scale_y: bounds.clamp(initial.scale_y),
            ..initial
        };
        Self { matrix: initial, initial, bounds, pan_mode, state: DragState::Idle }
    }

    pub fn matrix(&self) -> &AffineTransform {
        &self.matrix
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn pointer_down(&mut self, p: Coord<f64>) {
        self.state = DragState::Dragging { anchor: p, last: p, moved: false };
    }

    /// Zwraca true, jeśli macierz się zmieniła
    pub fn pointer_move(&mut self, p: Coord<f64>) -> bool {
        let DragState::Dragging { anchor, last, .. } = self.state else {
            return false;
        };
        let (dx, dy) = (p.x - last.x, p.y - last.y);
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        self.pan(dx, dy);
        self.state = DragState::Dragging { anchor, last: p, moved: true };
        true
    }

    pub fn pointer_up(&mut self, p: Coord<f64>) -> PointerRelease {
        if !self.is_dragging() {
            return PointerRelease::Ignored;
        }
        self.pointer_move(p);
        let release = match self.state {
            DragState::Dragging { anchor, moved: false, .. } => PointerRelease::Click(anchor),
            _ => PointerRelease::Pan,
        };
        self.state = DragState::Idle;
        release
    }

    /// Wskaźnik opuścił mapę: przerywa przeciąganie bez kliknięcia
    pub fn pointer_leave(&mut self) {
        self.state = DragState::Idle;
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        let (dx, dy) = match self.pan_mode {
            PanMode::Screen => (dx, dy),
            PanMode::ScaleAdjusted => (dx / self.matrix.scale_x, dy / self.matrix.scale_y),
        };
        self.matrix.translate_x += dx;
        self.matrix.translate_y += dy;
    }

    fn clamped_factor(&self, scale: f64, factor: f64) -> f64 {
        if scale <= 0.0 {
            return factor;
        }
        (scale * factor).clamp(self.bounds.min, self.bounds.max) / scale
    }

    /// Przybliża o `factor` tak, by punkt `focal` (ekranowy) nie przesunął się na ekranie
    pub fn zoom(&mut self, factor: f64, focal: Coord<f64>) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let Some(q) = self.matrix.apply_inverse(focal) else {
            return false;
        };
        let fx = self.clamped_factor(self.matrix.scale_x, factor);
        let fy = self.clamped_factor(self.matrix.scale_y, factor);
        if fx == 1.0 && fy == 1.0 {
            return false;
        }

        self.matrix = self.matrix
            .compose(&AffineTransform::translation(q.x, q.y))
            .compose(&AffineTransform::scaling(fx, fy))
            .compose(&AffineTransform::translation(-q.x, -q.y));
        trace!(scale_x = self.matrix.scale_x, scale_y = self.matrix.scale_y, "zoom");
        true
    }

    pub fn reset(&mut self) {
        self.matrix = self.initial;
        self.state = DragState::Idle;
    }

    pub fn to_screen(&self, p: Coord<f64>) -> Coord<f64> {
        self.matrix.apply(p)
    }

    /// Punkt ekranowy → współrzędne sprzed transformacji użytkownika
    pub fn to_local(&self, p: Coord<f64>) -> Option<Coord<f64>> {
        self.matrix.apply_inverse(p)
    }

    /// (lon, lat) → ekran: najpierw rzutowanie, potem macierz
    pub fn forward(&self, lonlat: Coord<f64>, projection: &Projection) -> Coord<f64> {
        self.to_screen(projection.project(lonlat))
    }

    /// Ekran → (lon, lat); dokładna odwrotność `forward`
    pub fn invert(&self, screen: Coord<f64>, projection: &Projection) -> Option<Coord<f64>> {
        self.to_local(screen).map(|p| projection.invert(p))
    }
}

impl Default for TransformController {
    fn default() -> Self {
        Self::new(AffineTransform::identity(), ScaleBounds::default(), PanMode::default())
    }
}
