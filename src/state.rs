use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use crate::{
    aggregation::{AggregationIndex, BreakdownEntry, RankingEntry, RankingOptions, SortDirection},
    config::AppConfig,
    data::{Dataset, LoadReport},
    energy_reader::MonthYear,
    map_draw::{MapView, ThresholdScale},
    transform::PointerRelease,
};

const DOUBLE_CLICK: Duration = Duration::from_millis(400);
const KEY_PAN: f64 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Panel { Ranking, Map, Details }

/// Dane do panelu szczegółów wybranego kraju
#[derive(Clone, Debug, PartialEq)]
pub struct CountryDetails {
    pub name: String,
    pub total: Option<f64>,
    pub breakdown: Vec<BreakdownEntry>,
    /// (numer miesiąca, wartość) w kolejności chronologicznej
    pub history: Vec<(f64, f64)>,
    pub first: Option<MonthYear>,
    pub last: Option<MonthYear>,
}

pub struct AppState {
    pub index: AggregationIndex,
    pub map: MapView,
    pub scale: ThresholdScale,
    pub ranking_options: RankingOptions,
    pub ranking_limit: usize,
    pub breakdown: Vec<String>,
    zoom_step: f64,
    pub dates: Vec<MonthYear>,
    pub date_pos: usize,
    pub order: SortDirection,
    pub ranking: Vec<RankingEntry>,
    pub selected: usize,
    pub country: Option<String>,
    pub active_panel: Panel,
    pub info: String,
    last_click: Option<(Instant, u16, u16)>,
}

impl AppState {
    pub const HELP_TEXT: &'static str = "\
Mysz: przeciąganie przesuwa, kółko przybliża, dwuklik ×1.1, klik wybiera kraj
↑/↓: ruch w rankingu, Enter: szczegóły kraju
[ / ]: poprzedni / następny miesiąc
o: najwyższe / najniższe zużycie
+ / -: zoom, h/j/k/l: przesuwanie, r: reset widoku
Tab: panel, Esc: zamknij szczegóły, q: wyjście";

    pub fn new(dataset: Dataset, config: &AppConfig, start: Option<MonthYear>) -> Self {
        let Dataset { index, features, report } = dataset;
        let dates = index.dates_chronological();
        let date_pos = start
            .and_then(|d| dates.iter().position(|x| *x == d))
            .unwrap_or(dates.len().saturating_sub(1));

        let map = MapView::new(features, &config.map);
        let info = Self::summary(&report, map.feature_count());

        let mut state = Self {
            index,
            map,
            scale: ThresholdScale::default(),
            ranking_options: config.ranking.options(),
            ranking_limit: config.ranking.limit,
            breakdown: config.ranking.breakdown.clone(),
            zoom_step: config.map.zoom_step,
            dates,
            date_pos,
            order: SortDirection::Descending,
            ranking: Vec::new(),
            selected: 0,
            country: None,
            active_panel: Panel::Map,
            info,
            last_click: None,
        };
        state.refresh_ranking();
        state
    }

    fn summary(report: &LoadReport, features: usize) -> String {
        let mut info = format!("Rekordy: {}\nKraje na mapie: {}", report.kept, features);
        if report.dropped > 0 {
            info.push_str(&format!("\nPominięte wiersze: {}", report.dropped));
        }
        format!("{}\n\n{}", info, Self::HELP_TEXT)
    }

    pub fn date(&self) -> Option<MonthYear> {
        self.dates.get(self.date_pos).copied()
    }

    pub fn refresh_ranking(&mut self) {
        self.ranking = match self.date() {
            Some(d) => self.index.top_n(&d, self.ranking_limit, self.order, &self.ranking_options),
            None => Vec::new(),
        };
        if self.selected >= self.ranking.len() {
            self.selected = self.ranking.len().saturating_sub(1);
        }
    }

    /// Wartość kraju z mapy w bieżącym miesiącu; `None` gdy kraj nic nie zgłosił
    pub fn value_of(&self, dataset_key: Option<&str>) -> Option<f64> {
        let date = self.date()?;
        let key = dataset_key?;
        let category = &self.ranking_options.category;
        self.index.has_value(&date, key, category)
            .then(|| self.index.value_for(&date, key, category))
    }

    /// Indeks obiektu mapy odpowiadającego wybranemu krajowi
    pub fn highlighted_feature(&self) -> Option<usize> {
        let country = self.country.as_deref()?;
        self.map.features().iter().position(|f| {
            f.dataset_key.as_deref() == Some(country) || f.name == country
        })
    }

    pub fn details(&self) -> Option<CountryDetails> {
        let name = self.country.clone()?;
        let date = self.date()?;
        let category = &self.ranking_options.category;

        let total = self.value_of(Some(&name));
        let breakdown = self.index.category_breakdown(&date, &name, &self.breakdown);

        let mut points: Vec<_> = self.index.history(&name, category).collect();
        points.sort_by_key(|p| p.timestamp);
        let history = points.iter().enumerate().map(|(i, p)| (i as f64, p.value)).collect();

        Some(CountryDetails {
            name,
            total,
            breakdown,
            history,
            first: points.first().map(|p| p.timestamp),
            last: points.last().map(|p| p.timestamp),
        })
    }

    fn select_country(&mut self, name: String) {
        info!(country = %name, "wybrano kraj");
        self.country = Some(name);
        self.active_panel = Panel::Details;
    }

    fn shift_date(&mut self, forward: bool) {
        if forward && self.date_pos + 1 < self.dates.len() {
            self.date_pos += 1;
        } else if !forward && self.date_pos > 0 {
            self.date_pos -= 1;
        } else {
            return;
        }
        debug!(date = ?self.date(), "zmiana miesiąca");
        self.refresh_ranking();
    }

    fn zoom_center(&mut self, factor: f64) {
        let center = self.map.center();
        self.map.controller_mut().zoom(factor, center);
    }

    /// Zwraca true, jeśli trzeba wyjść
    pub fn handle_input(&mut self, key: KeyCode) -> bool {
        use KeyCode::*;
        match key {
            Char('q') => return true,
            Tab => {
                self.active_panel = match self.active_panel {
                    Panel::Ranking => Panel::Map,
                    Panel::Map     => Panel::Details,
                    Panel::Details => Panel::Ranking,
                };
            }
            Up => if self.selected > 0 { self.selected -= 1 },
            Down => if self.selected + 1 < self.ranking.len() { self.selected += 1 },
            Enter => {
                if let Some(entry) = self.ranking.get(self.selected) {
                    let name = entry.country.clone();
                    self.select_country(name);
                }
            }
            Esc | Backspace => {
                self.country = None;
                self.active_panel = Panel::Map;
            }
            Char('[') => self.shift_date(false),
            Char(']') => self.shift_date(true),
            Char('o') => {
                self.order = self.order.toggled();
                self.selected = 0;
                self.refresh_ranking();
            }
            Char('+') | Char('=') => self.zoom_center(self.zoom_step),
            Char('-') => self.zoom_center(1.0 / self.zoom_step),
            Char('h') => self.map.controller_mut().pan(KEY_PAN, 0.0),
            Char('l') => self.map.controller_mut().pan(-KEY_PAN, 0.0),
            Char('k') => self.map.controller_mut().pan(0.0, KEY_PAN),
            Char('j') => self.map.controller_mut().pan(0.0, -KEY_PAN),
            Char('r') => self.map.controller_mut().reset(),
            _ => {}
        }
        false
    }

    fn is_double_click(&mut self, column: u16, row: u16) -> bool {
        let now = Instant::now();
        let double = self.last_click
            .is_some_and(|(t, c, r)| c == column && r == row && now.duration_since(t) <= DOUBLE_CLICK);
        self.last_click = if double { None } else { Some((now, column, row)) };
        double
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        let point = self.map.screen_point(event.column, event.row);
        match (event.kind, point) {
            (MouseEventKind::Down(MouseButton::Left), Some(p)) => {
                if self.is_double_click(event.column, event.row) {
                    self.map.controller_mut().zoom(self.zoom_step, p);
                }
                self.map.controller_mut().pointer_down(p);
            }
            (MouseEventKind::Drag(MouseButton::Left), Some(p)) => {
                self.map.controller_mut().pointer_move(p);
            }
            (MouseEventKind::Up(MouseButton::Left), Some(p)) => {
                if let PointerRelease::Click(at) = self.map.controller_mut().pointer_up(p) {
                    self.click_map(at);
                }
            }
            (MouseEventKind::ScrollUp, Some(p)) => {
                self.map.controller_mut().zoom(self.zoom_step, p);
            }
            (MouseEventKind::ScrollDown, Some(p)) => {
                self.map.controller_mut().zoom(1.0 / self.zoom_step, p);
            }
            // Wskaźnik poza mapą kończy przeciąganie
            (MouseEventKind::Drag(_) | MouseEventKind::Up(_), None) => {
                self.map.controller_mut().pointer_leave();
            }
            _ => {}
        }
    }

    fn click_map(&mut self, at: geo::Coord<f64>) {
        let Some(i) = self.map.feature_at(at) else {
            return;
        };
        let feature = &self.map.features()[i];
        let name = feature.dataset_key.clone().unwrap_or_else(|| feature.name.clone());
        self.select_country(name);
    }
}
