use std::path::PathBuf;
use thiserror::Error;

/// Błędy startu aplikacji (wczytywanie plików, konfiguracja, terminal)
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("nie można odczytać {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("błąd CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("błąd GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("błąd JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("błąd konfiguracji: {0}")]
    Config(#[from] toml::de::Error),

    #[error("niepoprawna data: {0}")]
    Date(String),

    #[error("brak obiektów w {0}")]
    EmptyGeometry(PathBuf),
}

impl AtlasError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Powód odrzucenia pojedynczego wiersza danych
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedRecordError {
    #[error("brak pola {0}")]
    MissingField(&'static str),

    #[error("wartość {0:?} nie jest liczbą")]
    BadValue(String),

    #[error("wartość {0} nie jest skończona")]
    NonFinite(f64),

    #[error("ujemna wartość {value} dla bilansu {balance}")]
    Negative { value: f64, balance: String },

    #[error("nieznany format daty {0:?}")]
    BadTime(String),

    #[error("wiersz CSV nieczytelny: {0}")]
    Unreadable(String),
}
