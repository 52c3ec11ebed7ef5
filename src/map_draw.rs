use geo::Coord;
use ratatui::{
    layout::Rect as TuiRect,
    style::Color,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Context, Line, Points},
        Block, Borders,
    },
    Frame,
};
use crate::{
    config::MapConfig,
    projection::{graticule, hit_test, project, GeoFeature, Projection, ProjectionKind, ScreenPath},
    transform::{AffineTransform, TransformController},
};

/// Pozycja legendy; `band` to przedział [od, do), `None` dla braku danych
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Color,
    pub band: Option<(f64, f64)>,
}

impl LegendEntry {
    /// Czy zakres wartości miesiąca `(min, max)` zahacza o ten przedział
    pub fn overlaps(&self, range: Option<(f64, f64)>) -> bool {
        match (self.band, range) {
            (Some((from, to)), Some((lo, hi))) => lo < to && hi >= from,
            _ => false,
        }
    }
}

/// Progi kolorów mapy (GWh) i kolory przedziałów
#[derive(Clone, Debug)]
pub struct ThresholdScale {
    thresholds: Vec<f64>,
    colors: Vec<Color>,
    pub no_data: Color,
}

impl Default for ThresholdScale {
    fn default() -> Self {
        Self::new(
            vec![0.0, 1000.0, 8000.0, 60000.0, 160000.0, 320000.0, 480000.0, 560000.0, 640000.0, 720000.0, 800000.0],
            [
                0x595957, 0x4A6865, 0x3A7773, 0x327F7B, 0x2B8682, 0x238E89,
                0x238689, 0x237F8A, 0x23708B, 0x23618C, 0x24598C,
            ]
            .into_iter()
            .map(Color::from_u32)
            .collect(),
        )
    }
}

impl ThresholdScale {
    pub fn new(thresholds: Vec<f64>, colors: Vec<Color>) -> Self {
        Self { thresholds, colors, no_data: Color::DarkGray }
    }

    /// Numer przedziału: liczba progów nie większych od wartości, obcięta do liczby kolorów
    pub fn bucket(&self, value: f64) -> usize {
        let n = self.thresholds.partition_point(|t| *t <= value);
        n.min(self.colors.len().saturating_sub(1))
    }

    pub fn color(&self, value: Option<f64>) -> Color {
        match value {
            Some(v) if !self.colors.is_empty() => self.colors[self.bucket(v)],
            _ => self.no_data,
        }
    }

    /// Opisy przedziałów od najwyższego, do legendy
    pub fn legend(&self) -> Vec<LegendEntry> {
        let mut out: Vec<LegendEntry> = self.thresholds.windows(2)
            .zip(self.colors.iter().skip(1))
            .map(|(w, c)| LegendEntry {
                label: format!("{:.0} – {:.0}", w[0], w[1]),
                color: *c,
                band: Some((w[0], w[1])),
            })
            .collect();
        if let (Some(last), Some(color)) = (self.thresholds.last(), self.colors.last()) {
            out.push(LegendEntry {
                label: format!("≥ {:.0}", last),
                color: *color,
                band: Some((*last, f64::INFINITY)),
            });
        }
        out.push(LegendEntry { label: "brak danych".to_string(), color: self.no_data, band: None });
        out.reverse();
        out
    }
}

struct FillCache {
    matrix: AffineTransform,
    viewport: (f64, f64),
    samples: Vec<(Coord<f64>, usize)>,
}

/// Przygotowanie geometrii i rysowanie mapy
pub struct MapView {
    features: Vec<GeoFeature>,
    kind: ProjectionKind,
    controller: TransformController,
    projection: Projection,
    viewport: (f64, f64),
    area: TuiRect,
    paths: Vec<ScreenPath>,
    graticule: Vec<Vec<Coord<f64>>>,
    graticule_paths: Vec<Vec<Coord<f64>>>,
    fill_step: u16,
    fill: Option<FillCache>,
}

impl MapView {
    pub fn new(features: Vec<GeoFeature>, config: &MapConfig) -> Self {
        let controller = TransformController::new(config.initial, config.scale, config.pan_mode);
        Self {
            features,
            kind: config.projection,
            controller,
            projection: Projection::fit(config.projection, 0.0, 0.0),
            viewport: (0.0, 0.0),
            area: TuiRect::default(),
            paths: Vec::new(),
            graticule: graticule(config.graticule_step),
            graticule_paths: Vec::new(),
            fill_step: config.fill_step,
            fill: None,
        }
    }

    /// Liczba obiektów (np. krajów)
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    pub fn controller(&self) -> &TransformController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut TransformController {
        &mut self.controller
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    /// Środek widoku w punktach ekranu
    pub fn center(&self) -> Coord<f64> {
        Coord { x: self.viewport.0 / 2.0, y: self.viewport.1 / 2.0 }
    }

    /// Ustala rozmiar widoku w punktach braille'a; rzutowanie liczone jest tylko przy zmianie
    pub fn resize(&mut self, area: TuiRect) {
        self.area = area;
        let viewport = (area.width as f64 * 2.0, area.height as f64 * 4.0);
        if viewport == self.viewport && !self.paths.is_empty() {
            return;
        }
        self.viewport = viewport;
        self.projection = Projection::fit(self.kind, viewport.0, viewport.1);
        self.paths = project(&self.features, &self.projection);
        self.graticule_paths = self.graticule.iter()
            .map(|line| line.iter().map(|c| self.projection.project(*c)).collect())
            .collect();
        self.fill = None;
    }

    /// Komórka terminala → punkt ekranu mapy (środek komórki), o ile leży na mapie
    pub fn screen_point(&self, column: u16, row: u16) -> Option<Coord<f64>> {
        let a = self.area;
        if column < a.x || row < a.y || column >= a.x + a.width || row >= a.y + a.height {
            return None;
        }
        Some(Coord {
            x: (column - a.x) as f64 * 2.0 + 1.0,
            y: (row - a.y) as f64 * 4.0 + 2.0,
        })
    }

    /// Indeks kraju pod punktem ekranu
    pub fn feature_at(&self, screen: Coord<f64>) -> Option<usize> {
        let lonlat = self.controller.invert(screen, &self.projection)?;
        hit_test(&self.features, lonlat)
    }

    fn refresh_fill(&mut self) {
        let matrix = *self.controller.matrix();
        let fresh = self.fill.as_ref()
            .is_some_and(|f| f.matrix == matrix && f.viewport == self.viewport);
        if fresh || self.fill_step == 0 {
            return;
        }

        let step = self.fill_step as f64;
        let mut samples = Vec::new();
        let mut y = step / 2.0;
        while y < self.viewport.1 {
            let mut x = step / 2.0;
            while x < self.viewport.0 {
                let p = Coord { x, y };
                if let Some(i) = self.feature_at(p) {
                    samples.push((p, i));
                }
                x += step;
            }
            y += step;
        }
        self.fill = Some(FillCache { matrix, viewport: self.viewport, samples });
    }

    fn draw_ring(&self, ctx: &mut Context<'_>, ring: &[Coord<f64>], color: Color) {
        let h = self.viewport.1;
        let screen: Vec<Coord<f64>> = ring.iter().map(|c| self.controller.to_screen(*c)).collect();
        for window in screen.windows(2) {
            let a = window[0];
            let b = window[1];
            ctx.draw(&Line { x1: a.x, y1: h - a.y, x2: b.x, y2: h - b.y, color });
        }
        if let (Some(first), Some(last)) = (screen.first(), screen.last()) {
            ctx.draw(&Line { x1: last.x, y1: h - last.y, x2: first.x, y2: h - first.y, color });
        }
    }

    /// Rysuje mapę: siatkę, wypełnienie według wartości, granice, a na końcu podświetlony kraj
    /// `values[i]` to wartość kraju `i`; brak wpisu oznacza brak danych
    pub fn render(
        &mut self,
        f: &mut Frame<'_>,
        area: TuiRect,
        title: &str,
        values: &[Option<f64>],
        scale: &ThresholdScale,
        highlight: Option<usize>,
    ) {
        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        self.resize(block.inner(area));
        self.refresh_fill();

        let colors: Vec<Color> = (0..self.features.len())
            .map(|i| scale.color(values.get(i).copied().flatten()))
            .collect();
        let mut layers: Vec<(Color, Vec<(f64, f64)>)> = Vec::new();
        if let Some(fill) = &self.fill {
            let h = self.viewport.1;
            for (p, i) in &fill.samples {
                let color = colors[*i];
                match layers.iter_mut().find(|(c, _)| *c == color) {
                    Some((_, pts)) => pts.push((p.x, h - p.y)),
                    None => layers.push((color, vec![(p.x, h - p.y)])),
                }
            }
        }

        let canvas = Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds([0.0, self.viewport.0])
            .y_bounds([0.0, self.viewport.1])
            .paint(|ctx| {
                // 1) Siatka
                for line in &self.graticule_paths {
                    self.draw_open_line(ctx, line, Color::Rgb(60, 60, 60));
                }
                ctx.layer();

                // 2) Wypełnienie kolorem progu
                for (color, coords) in &layers {
                    ctx.draw(&Points { coords, color: *color });
                }
                ctx.layer();

                // 3) Granice w kolorze kraju
                for path in &self.paths {
                    for ring in &path.rings {
                        self.draw_ring(ctx, ring, colors[path.feature]);
                    }
                }

                // 4) Podświetlamy wybrany kraj na czerwono
                if let Some(sel) = highlight {
                    ctx.layer();
                    if let Some(path) = self.paths.iter().find(|p| p.feature == sel) {
                        for ring in &path.rings {
                            self.draw_ring(ctx, ring, Color::Red);
                        }
                    }
                }
            });
        f.render_widget(canvas, area);
    }

    fn draw_open_line(&self, ctx: &mut Context<'_>, line: &[Coord<f64>], color: Color) {
        let h = self.viewport.1;
        for window in line.windows(2) {
            let a = self.controller.to_screen(window[0]);
            let b = self.controller.to_screen(window[1]);
            ctx.draw(&Line { x1: a.x, y1: h - a.y, x2: b.x, y2: h - b.y, color });
        }
    }
}
