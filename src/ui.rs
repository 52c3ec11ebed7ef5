use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use crate::{
    aggregation::SortDirection,
    energy_reader::format_energy_value,
    state::{AppState, CountryDetails, Panel},
};

const BAR_WIDTH: usize = 10;

fn panel(title: String, active: bool) -> Block<'static> {
    let style = if active { Style::default().fg(Color::Cyan) } else { Style::default() };
    Block::default().borders(Borders::ALL).title(title).border_style(style)
}

pub fn draw(f: &mut Frame<'_>, state: &mut AppState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(50),
            Constraint::Percentage(25),
        ].as_ref())
        .split(f.area());

    draw_ranking(f, chunks[0], state);

    // Środek: mapa
    let date = state.date().map(|d| d.to_string()).unwrap_or_else(|| "brak danych".to_string());
    let title = format!(
        "Zużycie energii elektrycznej – {} (×{:.2})",
        date,
        state.map.controller().matrix().scale_x
    );
    let values: Vec<Option<f64>> = state.map.features().iter()
        .map(|ft| state.value_of(ft.dataset_key.as_deref()))
        .collect();
    let highlight = state.highlighted_feature();
    let scale = state.scale.clone();
    state.map.render(f, chunks[1], &title, &values, &scale, highlight);

    draw_details(f, chunks[2], state);
}

/// Lewy panel: ranking krajów i legenda kolorów
fn draw_ranking(f: &mut Frame<'_>, area: Rect, state: &AppState) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(state.scale.legend().len() as u16 + 2)].as_ref())
        .split(area);

    let title = match state.order {
        SortDirection::Descending => "Najwyższe zużycie",
        SortDirection::Ascending => "Najniższe zużycie",
    };
    let max = state.ranking.iter().map(|e| e.value).fold(0.0, f64::max);
    let items: Vec<ListItem> = state.ranking
        .iter()
        .map(|e| {
            let len = if max > 0.0 { (e.value / max * BAR_WIDTH as f64).round() as usize } else { 0 };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:<16.16} ", e.country)),
                Span::styled("█".repeat(len), Style::default().fg(Color::from_u32(0x28A29C))),
                Span::raw(format!(" {}", format_energy_value(e.value))),
            ]))
        })
        .collect();
    let mut list_state = ListState::default();
    if !state.ranking.is_empty() {
        list_state.select(Some(state.selected));
    }
    let list = List::new(items)
        .block(panel(title.to_string(), state.active_panel == Panel::Ranking))
        .highlight_symbol(">> ")
        .highlight_style(Style::default().fg(Color::Red));
    f.render_stateful_widget(list, parts[0], &mut list_state);

    // Strzałką oznaczamy przedziały, w które wpadają wartości bieżącego miesiąca
    let range = state.date()
        .and_then(|d| state.index.value_range(&d, &state.ranking_options.category));
    let legend: Vec<Line> = state.scale.legend()
        .into_iter()
        .map(|e| Line::from(vec![
            Span::raw(if e.overlaps(range) { "▸" } else { " " }),
            Span::styled("■ ", Style::default().fg(e.color)),
            Span::raw(e.label),
        ]))
        .collect();
    let legend = Paragraph::new(legend)
        .block(Block::default().borders(Borders::ALL).title("Zużycie (GWh)"));
    f.render_widget(legend, parts[1]);
}

/// Prawy panel: informacje, rozbicie produkcji i historia
fn draw_details(f: &mut Frame<'_>, area: Rect, state: &AppState) {
    let active = state.active_panel == Panel::Details;
    let Some(details) = state.details() else {
        let info = Paragraph::new(state.info.clone())
            .block(panel("Informacje".to_string(), active))
            .wrap(Wrap { trim: true });
        f.render_widget(info, area);
        return;
    };

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Percentage(45),
            Constraint::Min(6),
        ].as_ref())
        .split(area);

    // -- Informacje
    let total = details.total
        .map(format_energy_value)
        .unwrap_or_else(|| "Brak zgłoszonych danych".to_string());
    let info = Paragraph::new(format!("Całkowite zużycie: {}", total))
        .block(panel(details.name.clone(), active))
        .wrap(Wrap { trim: true });
    f.render_widget(info, right_chunks[0]);

    // -- Rozbicie
    let sum = details.total.unwrap_or(0.0);
    let lines: Vec<Line> = if details.breakdown.is_empty() {
        vec![Line::from("Brak rozbicia dla tego miesiąca")]
    } else {
        details.breakdown.iter()
            .map(|e| Line::from(format!(
                "{}: {} ({:.2}%)",
                e.category.trim_start_matches("P."),
                format_energy_value(e.value),
                e.share_of(sum)
            )))
            .collect()
    };
    let breakdown = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Rozkład produkcji"))
        .wrap(Wrap { trim: true });
    f.render_widget(breakdown, right_chunks[1]);

    draw_history(f, right_chunks[2], &details);
}

fn draw_history(f: &mut Frame<'_>, area: Rect, details: &CountryDetails) {
    let block = Block::default().borders(Borders::ALL).title("Historia zużycia");
    if details.history.is_empty() {
        f.render_widget(Paragraph::new("Brak historii").block(block), area);
        return;
    }

    let x_max = (details.history.len() as f64 - 1.0).max(1.0);
    let y_max = details.history.iter().map(|p| p.1).fold(0.0, f64::max).max(1.0);
    let dataset = Dataset::default()
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&details.history);

    let first = details.first.map(|d| d.to_string()).unwrap_or_default();
    let last = details.last.map(|d| d.to_string()).unwrap_or_default();
    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(Axis::default().bounds([0.0, x_max]).labels(vec![first, last]))
        .y_axis(Axis::default().bounds([0.0, y_max]).labels(vec![
            "0".to_string(),
            format_energy_value(y_max),
        ]));
    f.render_widget(chart, area);
}
