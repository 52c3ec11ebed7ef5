use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use energy_atlas::{
    config::AppConfig,
    data::DataCache,
    energy_reader::MonthYear,
    error::AtlasError,
    state::AppState,
    ui,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, path::PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Mapa zużycia energii elektrycznej w terminalu
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Katalog z danymi (CSV, geojson, aliasy, atlas.toml)
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Plik konfiguracji TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Plik CSV z danymi, zamiast tego z konfiguracji
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Miesiąc na start, np. "December 2020"
    #[arg(long)]
    date: Option<String>,
}

/// Logi idą do pliku, bo ekran należy do TUI
fn init_logging(dir: &std::path::Path, config: &AppConfig) -> WorkerGuard {
    let appender = tracing_appender::rolling::never(dir, &config.log.file);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(&cli.data_dir, cli.config.as_deref())?;
    if let Some(dataset) = &cli.dataset {
        config.data.dataset = dataset.to_string_lossy().into_owned();
    }
    let start_date = cli.date.clone().or_else(|| config.data.start_date.clone());
    let start = start_date
        .map(|d| d.parse::<MonthYear>().map_err(|e| AtlasError::Date(e.to_string())))
        .transpose()?;

    let cache = DataCache::new(&cli.data_dir, config.data.clone())?;
    let _guard = init_logging(cache.base(), &config);
    match &config.source {
        Some(path) => info!(path = %path.display(), "wczytano konfigurację"),
        None => info!("konfiguracja domyślna"),
    }
    let dataset = cache.load()?;
    let mut state = AppState::new(dataset, &config, start);
    info!(date = ?state.date(), "start");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    loop {
        terminal.draw(|f| ui::draw(f, &mut state))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => {
                    if state.handle_input(code) {
                        break;
                    }
                }
                Event::Mouse(mouse) => state.handle_mouse(mouse),
                Event::FocusLost => state.map.controller_mut().pointer_leave(),
                _ => {}
            }
        }
    }

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    info!("koniec");
    Ok(())
}
