//! Indeks data → kraj → kategoria → wartość, budowany raz na wczytany zbiór danych.

use std::collections::HashMap;
use std::cmp::Ordering;
use tracing::debug;
use crate::energy_reader::{MonthYear, Record};

/// Kategoria, według której liczone są rankingi i historia
pub const DEFAULT_RANKING_CATEGORY: &str = "P.Electricity";

type CategoryValues = HashMap<String, f64>;
type CountryBucket = HashMap<String, CategoryValues>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Parametry rankingu przekazywane jawnie przy każdym zapytaniu
#[derive(Clone, Debug, PartialEq)]
pub struct RankingOptions {
    pub category: String,
    /// Ile najniższych pozycji pominąć w rankingu rosnącym
    pub ascending_skip: usize,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self { category: DEFAULT_RANKING_CATEGORY.to_string(), ascending_skip: 1 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankingEntry {
    pub country: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CountryHistoryPoint {
    pub timestamp: MonthYear,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BreakdownEntry {
    pub category: String,
    pub value: f64,
}

impl BreakdownEntry {
    /// Udział procentowy w sumie; zero gdy suma nie jest dodatnia
    pub fn share_of(&self, total: f64) -> f64 {
        if total > 0.0 { self.value / total * 100.0 } else { 0.0 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AggregationIndex {
    buckets: HashMap<MonthYear, CountryBucket>,
    /// Kolejność pierwszego wystąpienia dat
    dates: Vec<MonthYear>,
    duplicates: usize,
}

impl AggregationIndex {
    /// Jedno przejście po rekordach; przy duplikatach wygrywa ostatni zapis
    pub fn build<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut index = Self::default();
        for record in records {
            let bucket = index.buckets.entry(record.timestamp).or_insert_with(|| {
                index.dates.push(record.timestamp);
                HashMap::new()
            });
            let previous = bucket
                .entry(record.country.clone())
                .or_default()
                .insert(record.category.clone(), record.value);
            if previous.is_some() {
                index.duplicates += 1;
            }
        }
        debug!(dates = index.dates.len(), duplicates = index.duplicates, "zbudowano indeks");
        index
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn date_count(&self) -> usize {
        self.dates.len()
    }

    /// Daty w kolejności pierwszego wystąpienia w danych
    pub fn dates(&self) -> &[MonthYear] {
        &self.dates
    }

    pub fn dates_chronological(&self) -> Vec<MonthYear> {
        let mut dates = self.dates.clone();
        dates.sort();
        dates
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Kraje obecne w danym miesiącu, posortowane alfabetycznie
    pub fn countries(&self, date: &MonthYear) -> Vec<&str> {
        let mut names: Vec<&str> = self.buckets.get(date)
            .map(|b| b.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    fn lookup(&self, date: &MonthYear, country: &str, category: &str) -> Option<f64> {
        self.buckets.get(date)?.get(country)?.get(category).copied()
    }

    /// Brak danych na dowolnym poziomie daje 0
    pub fn value_for(&self, date: &MonthYear, country: &str, category: &str) -> f64 {
        self.lookup(date, country, category).unwrap_or(0.0)
    }

    /// Czy kraj zgłosił daną kategorię w danym miesiącu
    pub fn has_value(&self, date: &MonthYear, country: &str, category: &str) -> bool {
        self.lookup(date, country, category).is_some()
    }

    /// Najmniejsza i największa wartość kategorii wśród krajów, które ją zgłosiły
    pub fn value_range(&self, date: &MonthYear, category: &str) -> Option<(f64, f64)> {
        self.buckets.get(date)?
            .values()
            .filter_map(|c| c.get(category).copied())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Ranking krajów według `options.category`; remisy rozstrzyga nazwa kraju
    pub fn top_n(
        &self,
        date: &MonthYear,
        n: usize,
        direction: SortDirection,
        options: &RankingOptions,
    ) -> Vec<RankingEntry> {
        let Some(bucket) = self.buckets.get(date) else {
            return Vec::new();
        };

        let mut entries: Vec<RankingEntry> = bucket
            .iter()
            .filter_map(|(country, values)| {
                values.get(&options.category).map(|&value| RankingEntry {
                    country: country.clone(),
                    value,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            let by_value = match direction {
                SortDirection::Descending => b.value.total_cmp(&a.value),
                SortDirection::Ascending => a.value.total_cmp(&b.value),
            };
            match by_value {
                Ordering::Equal => a.country.cmp(&b.country),
                other => other,
            }
        });

        let skip = match direction {
            SortDirection::Descending => 0,
            SortDirection::Ascending => options.ascending_skip,
        };
        entries.into_iter().skip(skip).take(n).collect()
    }

    /// Leniwy przebieg wartości kraju po wszystkich datach indeksu
    pub fn history<'a>(&'a self, country: &'a str, category: &'a str) -> History<'a> {
        History { index: self, country, category, position: 0 }
    }

    /// Wartości kraju ograniczone do `allowed`, w kolejności `allowed`
    pub fn category_breakdown(
        &self,
        date: &MonthYear,
        country: &str,
        allowed: &[String],
    ) -> Vec<BreakdownEntry> {
        let Some(values) = self.buckets.get(date).and_then(|b| b.get(country)) else {
            return Vec::new();
        };

        let mut out: Vec<BreakdownEntry> = Vec::new();
        for category in allowed {
            if out.iter().any(|e| &e.category == category) {
                continue;
            }
            if let Some(&value) = values.get(category) {
                out.push(BreakdownEntry { category: category.clone(), value });
            }
        }
        out
    }
}

/// Iterator historii kraju; `clone()` zaczyna od bieżącej pozycji, `history()` od początku
#[derive(Clone, Debug)]
pub struct History<'a> {
    index: &'a AggregationIndex,
    country: &'a str,
    category: &'a str,
    position: usize,
}

impl Iterator for History<'_> {
    type Item = CountryHistoryPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let timestamp = *self.index.dates.get(self.position)?;
        self.position += 1;
        Some(CountryHistoryPoint {
            timestamp,
            value: self.index.value_for(&timestamp, self.country, self.category),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.index.dates.len() - self.position;
        (left, Some(left))
    }
}

impl ExactSizeIterator for History<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy_reader::{normalize, RawRow};

    fn date(s: &str) -> MonthYear {
        s.parse().unwrap()
    }

    fn index_of(rows: &[(&str, &str, &str, f64)]) -> AggregationIndex {
        let raw: Vec<RawRow> = rows
            .iter()
            .map(|(c, t, p, v)| RawRow::new(c, t, "Net Electricity Production", p, &v.to_string(), "GWh"))
            .collect();
        let normalized = normalize(&raw);
        AggregationIndex::build(&normalized.records)
    }

    fn wind() -> RankingOptions {
        RankingOptions { category: "P.Wind".into(), ..RankingOptions::default() }
    }

    #[test]
    fn two_country_scenario() {
        let raw = vec![
            RawRow::new("A", "Jan 2020", "Consumption", "P.Wind", "10", "GWh"),
            RawRow::new("B", "Jan 2020", "Consumption", "P.Wind", "20", "GWh"),
        ];
        let idx = AggregationIndex::build(&normalize(&raw).records);
        let jan = date("Jan 2020");

        let top = idx.top_n(&jan, 2, SortDirection::Descending, &wind());
        assert_eq!(top, vec![
            RankingEntry { country: "B".into(), value: 20.0 },
            RankingEntry { country: "A".into(), value: 10.0 },
        ]);
        assert_eq!(idx.value_for(&jan, "C", "P.Wind"), 0.0);
    }

    #[test]
    fn value_for_is_zero_on_any_missing_level() {
        let idx = index_of(&[("A", "Jan 2020", "P.Wind", 0.125)]);
        let jan = date("Jan 2020");
        assert_eq!(idx.value_for(&jan, "A", "P.Wind"), 0.125);
        assert_eq!(idx.value_for(&date("Feb 2020"), "A", "P.Wind"), 0.0);
        assert_eq!(idx.value_for(&jan, "B", "P.Wind"), 0.0);
        assert_eq!(idx.value_for(&jan, "A", "P.Solar"), 0.0);
        assert!(!idx.has_value(&jan, "A", "P.Solar"));
    }

    #[test]
    fn last_write_wins_on_duplicates() {
        let idx = index_of(&[
            ("A", "Jan 2020", "P.Wind", 1.0),
            ("A", "January 2020", "P.Wind", 2.0),
        ]);
        assert_eq!(idx.value_for(&date("Jan 2020"), "A", "P.Wind"), 2.0);
        assert_eq!(idx.duplicates(), 1);
        assert_eq!(idx.date_count(), 1);
    }

    #[test]
    fn ascending_skips_lowest_entry_by_default() {
        let idx = index_of(&[
            ("A", "Jan 2020", "P.Wind", 5.0),
            ("B", "Jan 2020", "P.Wind", 1.0),
            ("C", "Jan 2020", "P.Wind", 3.0),
            ("D", "Jan 2020", "P.Wind", 3.0),
        ]);
        let jan = date("Jan 2020");

        let names = |v: Vec<RankingEntry>| v.into_iter().map(|e| e.country).collect::<Vec<_>>();
        assert_eq!(names(idx.top_n(&jan, 2, SortDirection::Ascending, &wind())), vec!["C", "D"]);

        let no_skip = RankingOptions { ascending_skip: 0, ..wind() };
        assert_eq!(names(idx.top_n(&jan, 2, SortDirection::Ascending, &no_skip)), vec!["B", "C"]);
        assert_eq!(names(idx.top_n(&jan, 10, SortDirection::Descending, &wind())), vec!["A", "C", "D", "B"]);
    }

    #[test]
    fn ranking_ignores_countries_without_the_category() {
        let idx = index_of(&[
            ("A", "Jan 2020", "P.Wind", 5.0),
            ("B", "Jan 2020", "P.Solar", 9.0),
        ]);
        let top = idx.top_n(&date("Jan 2020"), 5, SortDirection::Descending, &wind());
        assert_eq!(top.len(), 1);
        assert!(idx.top_n(&date("Mar 2020"), 5, SortDirection::Descending, &wind()).is_empty());
    }

    #[test]
    fn history_zero_fills_and_keeps_insertion_order() {
        let idx = index_of(&[
            ("A", "Mar 2020", "P.Electricity", 3.0),
            ("B", "Jan 2020", "P.Electricity", 1.0),
            ("A", "Feb 2020", "P.Electricity", 2.0),
        ]);
        let history: Vec<_> = idx.history("A", "P.Electricity").collect();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].timestamp, date("Mar 2020"));
        assert_eq!(history[1].value, 0.0);
        assert_eq!(history[2].value, 2.0);

        let again = idx.history("A", "P.Electricity");
        assert_eq!(again.len(), 3);
        assert_eq!(idx.history("Nowhere", "P.Electricity").count(), 3);
        assert_eq!(idx.dates_chronological()[0], date("Jan 2020"));
    }

    #[test]
    fn value_range_covers_reporting_countries() {
        let idx = index_of(&[
            ("A", "Jan 2020", "P.Wind", 7.0),
            ("B", "Jan 2020", "P.Wind", 3.0),
            ("C", "Jan 2020", "P.Solar", 100.0),
            ("D", "Feb 2020", "P.Wind", 50.0),
        ]);
        assert_eq!(idx.value_range(&date("Jan 2020"), "P.Wind"), Some((3.0, 7.0)));
        assert_eq!(idx.value_range(&date("Feb 2020"), "P.Wind"), Some((50.0, 50.0)));
        assert_eq!(idx.value_range(&date("Feb 2020"), "P.Solar"), None);
    }

    #[test]
    fn breakdown_follows_allowed_order() {
        let idx = index_of(&[
            ("A", "Jan 2020", "P.Wind", 1.0),
            ("A", "Jan 2020", "P.Solar", 2.0),
            ("A", "Jan 2020", "P.Electricity", 10.0),
        ]);
        let allowed: Vec<String> = ["P.Solar", "P.Hydro", "P.Wind", "P.Solar"]
            .iter().map(|s| s.to_string()).collect();
        let breakdown = idx.category_breakdown(&date("Jan 2020"), "A", &allowed);
        let cats: Vec<&str> = breakdown.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(cats, vec!["P.Solar", "P.Wind"]);
        assert_eq!(breakdown[0].share_of(10.0), 20.0);
        assert_eq!(breakdown[0].share_of(0.0), 0.0);
        assert!(idx.category_breakdown(&date("Jan 2020"), "B", &allowed).is_empty());
    }

    #[test]
    fn empty_index_answers_everything() {
        let records: Vec<Record> = Vec::new();
        let idx = AggregationIndex::build(&records);
        let jan = date("Jan 2020");
        assert!(idx.is_empty());
        assert_eq!(idx.value_for(&jan, "A", "P.Wind"), 0.0);
        assert!(idx.top_n(&jan, 20, SortDirection::Ascending, &RankingOptions::default()).is_empty());
        assert_eq!(idx.history("A", "P.Wind").count(), 0);
        assert!(idx.countries(&jan).is_empty());
        assert_eq!(idx.value_range(&jan, "P.Wind"), None);
    }
}
