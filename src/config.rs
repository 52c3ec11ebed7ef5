use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}};
use crate::{
    aggregation::{RankingOptions, DEFAULT_RANKING_CATEGORY},
    error::AtlasError,
    projection::ProjectionKind,
    transform::{AffineTransform, PanMode, ScaleBounds},
};

/// Nazwa pliku konfiguracji szukanego w katalogu danych
pub const CONFIG_FILE: &str = "atlas.toml";

/// Kategorie pokazywane w rozbiciu produkcji kraju
pub const BREAKDOWN_CATEGORIES: &[&str] = &[
    "P.Coal, Peat and Manufactured Gases",
    "P.Combustible Renewables",
    "P.Geothermal",
    "P.Hydro",
    "P.Nuclear",
    "P.Oil and Petroleum Products",
    "P.Other Renewables",
    "P.Solar",
    "P.Wind",
    "P.Natural Gas",
];

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub ranking: RankingConfig,
    pub map: MapConfig,
    pub log: LogConfig,
    /// Plik, z którego wczytano konfigurację; `None` dla wartości domyślnych
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dataset: String,
    pub world: String,
    pub aliases: String,
    /// Linie wstępu przed nagłówkiem CSV
    pub header_lines: usize,
    /// Jeśli ustawione, brane są tylko wiersze z tym bilansem
    pub balance: Option<String>,
    pub name_property: String,
    /// Miesiąc pokazywany na starcie, np. "December 2020"
    pub start_date: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dataset: "energy.csv".into(),
            world: "world.geojson".into(),
            aliases: "country_aliases.json".into(),
            header_lines: 0,
            balance: None,
            name_property: "ADMIN".into(),
            start_date: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub category: String,
    pub limit: usize,
    pub ascending_skip: usize,
    pub breakdown: Vec<String>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            category: DEFAULT_RANKING_CATEGORY.into(),
            limit: 20,
            ascending_skip: 1,
            breakdown: BREAKDOWN_CATEGORIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RankingConfig {
    pub fn options(&self) -> RankingOptions {
        RankingOptions { category: self.category.clone(), ascending_skip: self.ascending_skip }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub projection: ProjectionKind,
    pub scale: ScaleBounds,
    pub zoom_step: f64,
    pub pan_mode: PanMode,
    /// Co ile punktów braille'a próbkować wypełnienie krajów; 0 wyłącza wypełnienie
    pub fill_step: u16,
    /// Odstęp siatki w stopniach; 0 wyłącza siatkę
    pub graticule_step: f64,
    pub initial: AffineTransform,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionKind::Mercator,
            scale: ScaleBounds::default(),
            zoom_step: 1.1,
            pan_mode: PanMode::Screen,
            fill_step: 2,
            graticule_step: 30.0,
            initial: AffineTransform::identity(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub file: String,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { file: "energy_atlas.log".into(), level: "info".into() }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self, AtlasError> {
        Ok(toml::from_str(text)?)
    }

    /// Wczytuje `explicit` albo `<data_dir>/atlas.toml`; brak pliku daje wartości domyślne
    pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<Self, AtlasError> {
        let path: PathBuf = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let default = data_dir.join(CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = fs::read_to_string(&path).map_err(|e| AtlasError::io(&path, e))?;
        let mut config = Self::from_toml(&text)?;
        config.source = Some(path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.ranking.limit, 20);
        assert_eq!(cfg.ranking.ascending_skip, 1);
        assert_eq!(cfg.ranking.breakdown.len(), 10);
        assert_eq!(cfg.map.scale, ScaleBounds { min: 0.5, max: 4.0 });
        assert_eq!(cfg.map.initial, AffineTransform::identity());
        assert_eq!(cfg.data.name_property, "ADMIN");
    }

    #[test]
    fn partial_sections_override_defaults() {
        let cfg = AppConfig::from_toml(r#"
            [data]
            header_lines = 8
            balance = "Net Electricity Production"

            [ranking]
            category = "P.Wind"
            ascending_skip = 0

            [map]
            projection = "equirectangular"
            pan_mode = "scale_adjusted"
            scale = { min = 0.25, max = 8.0 }
            initial = { scale_x = 1.27, scale_y = 1.27, translate_x = -211.62, translate_y = 162.59 }
        "#).unwrap();

        assert_eq!(cfg.data.header_lines, 8);
        assert_eq!(cfg.data.dataset, "energy.csv");
        assert_eq!(cfg.ranking.options(), RankingOptions { category: "P.Wind".into(), ascending_skip: 0 });
        assert_eq!(cfg.map.projection, ProjectionKind::Equirectangular);
        assert_eq!(cfg.map.pan_mode, PanMode::ScaleAdjusted);
        assert_eq!(cfg.map.scale.max, 8.0);
        assert_eq!(cfg.map.initial.skew_x, 0.0);
        assert_eq!(cfg.map.initial.translate_y, 162.59);
        assert_eq!(cfg.map.zoom_step, 1.1);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        assert!(matches!(AppConfig::from_toml("[map]\nzoom_step = \"fast\""), Err(AtlasError::Config(_))));
    }

    #[test]
    fn remembers_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[log]\nlevel = \"debug\"").unwrap();
        let cfg = AppConfig::load(dir.path(), None).unwrap();
        assert_eq!(cfg.log.level, "debug");
        assert_eq!(cfg.source, Some(path));
    }

    #[test]
    fn missing_default_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load(dir.path(), None).unwrap();
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.source, None);
        assert!(AppConfig::load(dir.path(), Some(&dir.path().join("nope.toml"))).is_err());
    }
}
