use serde_json::from_slice;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
    str::FromStr,
};
use geojson::GeoJson;
use tracing::{info, warn};
use crate::{
    aggregation::AggregationIndex,
    config::DataConfig,
    energy_reader::{ingest, BalanceDirection, Normalized},
    error::AtlasError,
    projection::{features_from_geojson, GeoFeature},
};

/// Podsumowanie wczytania zbioru danych
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
    pub kept: usize,
    pub dropped: usize,
    pub unknown_categories: usize,
    pub filtered_out: usize,
}

/// Dopasowanie nazw krajów z geometrii do nazw w zbiorze danych
#[derive(Clone, Debug, Default)]
pub struct CountryNames {
    aliases: BTreeMap<String, String>,
    // Nazwa → nazwa oryginalna oraz wersja małymi literami
    known: BTreeMap<String, String>,
    names: Vec<String>,
}

impl CountryNames {
    pub fn new<'a, I>(dataset_countries: I, aliases: BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut known = BTreeMap::new();
        let mut names = Vec::new();
        for name in dataset_countries {
            known.insert(name.to_string(), name.to_string());
            known.insert(name.to_lowercase(), name.to_string());
            names.push(name.to_string());
        }
        names.sort();
        names.dedup();
        Self { aliases, known, names }
    }

    pub fn resolve(&self, geometry_name: &str) -> Option<String> {
        if geometry_name.is_empty() {
            return None;
        }
        if let Some(alias) = self.aliases.get(geometry_name) {
            return Some(alias.clone());
        }

        // Najpierw dokładnie, potem bez wielkości liter
        let found = self.known.get(geometry_name)
            .or_else(|| self.known.get(&geometry_name.to_lowercase()));
        if let Some(name) = found {
            return Some(name.clone());
        }

        // Na końcu dopasowanie przybliżone, ale tylko jednoznaczne
        let mut candidates = self.names.iter()
            .filter(|n| contains_words(n, geometry_name) || contains_words(geometry_name, n));
        match (candidates.next(), candidates.next()) {
            (Some(name), None) => Some(name.clone()),
            _ => None,
        }
    }
}

/// `needle` występuje w `hay` jako całe słowa ("Sudan" w "South Sudan", ale nie "Niger" w "Nigeria")
fn contains_words(hay: &str, needle: &str) -> bool {
    hay.match_indices(needle).any(|(i, _)| {
        let before = hay[..i].chars().next_back();
        let after = hay[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Wszystko, czego potrzebuje widok po starcie
#[derive(Clone, Debug)]
pub struct Dataset {
    pub index: AggregationIndex,
    pub features: Vec<GeoFeature>,
    pub report: LoadReport,
}

/// Ładowanie CSV z danymi, geojson świata i aliasów krajów z katalogu danych
pub struct DataCache {
    base: PathBuf,
    config: DataConfig,
    aliases: BTreeMap<String, String>,
}

impl DataCache {
    pub fn new<P: AsRef<Path>>(base: P, config: DataConfig) -> Result<Self, AtlasError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base).map_err(|e| AtlasError::io(&base, e))?;

        let aliases = match fs::read(base.join(&config.aliases)) {
            Ok(bytes) => from_slice::<BTreeMap<String, String>>(&bytes)?,
            Err(_) => BTreeMap::new(),
        };

        Ok(Self { base, config, aliases })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path(&self, name: &str) -> PathBuf {
        let p = Path::new(name);
        if p.is_absolute() { p.to_path_buf() } else { self.base.join(p) }
    }

    pub fn load_records(&self) -> Result<Normalized, AtlasError> {
        let path = self.path(&self.config.dataset);
        let file = File::open(&path).map_err(|e| AtlasError::io(&path, e))?;
        ingest(file, self.config.header_lines)
    }

    pub fn load_geojson(&self) -> Result<GeoJson, AtlasError> {
        let path = self.path(&self.config.world);
        let txt = fs::read_to_string(&path).map_err(|e| AtlasError::io(&path, e))?;
        Ok(GeoJson::from_str(&txt)?)
    }

    /// Wczytuje dane, buduje indeks i dopasowuje kraje z mapy do danych
    pub fn load(&self) -> Result<Dataset, AtlasError> {
        let normalized = self.load_records()?;
        let mut report = LoadReport {
            dropped: normalized.rejected.len(),
            unknown_categories: normalized.warnings.len(),
            ..LoadReport::default()
        };

        let wanted = self.config.balance.as_deref().map(BalanceDirection::classify);
        let records: Vec<_> = normalized.records.iter()
            .filter(|r| wanted.as_ref().is_none_or(|w| &r.balance == w))
            .collect();
        report.kept = records.len();
        report.filtered_out = normalized.records.len() - records.len();

        let index = AggregationIndex::build(records.iter().copied());

        let mut features = features_from_geojson(self.load_geojson()?, &self.config.name_property)?;
        if features.is_empty() {
            return Err(AtlasError::EmptyGeometry(self.path(&self.config.world)));
        }

        let names = CountryNames::new(
            records.iter().map(|r| r.country.as_str()),
            self.aliases.clone(),
        );
        let mut unmatched = 0;
        for feature in &mut features {
            feature.dataset_key = names.resolve(&feature.name);
            if feature.dataset_key.is_none() {
                unmatched += 1;
            }
        }
        if unmatched > 0 {
            warn!(unmatched, "kraje z mapy bez danych");
        }

        info!(
            records = report.kept,
            dropped = report.dropped,
            dates = index.date_count(),
            features = features.len(),
            "wczytano zbiór danych"
        );
        Ok(Dataset { index, features, report })
    }
}
