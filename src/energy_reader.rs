use serde::Deserialize;
use std::{fmt, io::Read, str::FromStr};
use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};
use crate::error::{AtlasError, MalformedRecordError};

/// Zamknięty słownik kategorii produktów
pub const KNOWN_CATEGORIES: &[&str] = &[
    "P.Electricity",
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
    "P.Total Combustible Fuels",
    "P.Total Renewables",
    "P.Non-Renewables",
    "P.Others",
    "P.Low Carbon",
];

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

/// Klucz czasu: miesiąc i rok, wyświetlany jako "December 2020"
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthYear {
    pub year: i32,
    pub month: u8,
}

impl MonthYear {
    pub fn new(year: i32, month: u8) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn month_name(&self) -> &'static str {
        MONTHS[(self.month - 1) as usize]
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

fn month_from_name(name: &str) -> Option<u8> {
    let lower = name.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS.iter()
        .position(|m| {
            let m = m.to_lowercase();
            m == lower || (lower.len() == 3 && m.starts_with(&lower))
        })
        .map(|i| i as u8 + 1)
}

impl FromStr for MonthYear {
    type Err = MalformedRecordError;

    /// Akceptuje "December 2020", "Dec 2020", "2020-12", "2020-12-01" oraz "12/2020"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || MalformedRecordError::BadTime(s.to_string());

        let parsed = if let Some((month, year)) = s.split_once(char::is_whitespace) {
            month_from_name(month).zip(year.trim().parse::<i32>().ok())
                .map(|(m, y)| (y, m))
        } else if let Some((month, year)) = s.split_once('/') {
            month.parse::<u8>().ok().zip(year.parse::<i32>().ok())
                .map(|(m, y)| (y, m))
        } else {
            let mut parts = s.split('-');
            let year = parts.next().and_then(|y| y.parse::<i32>().ok());
            let month = parts.next().and_then(|m| m.parse::<u8>().ok());
            year.zip(month)
        };

        parsed
            .and_then(|(year, month)| MonthYear::new(year, month))
            .ok_or_else(bad)
    }
}

/// Kierunek bilansu z kolumny "Balance"
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BalanceDirection {
    Production,
    Consumption,
    Import,
    Export,
    Losses,
    Supply,
    Net,
    Other(String),
}

impl BalanceDirection {
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.contains("production") {
            Self::Production
        } else if lower.contains("consumption") {
            Self::Consumption
        } else if lower.contains("net") {
            Self::Net
        } else if lower.contains("import") {
            Self::Import
        } else if lower.contains("export") {
            Self::Export
        } else if lower.contains("loss") {
            Self::Losses
        } else if lower.contains("supply") {
            Self::Supply
        } else {
            Self::Other(raw.to_string())
        }
    }

    /// Tylko bilanse netto mogą być ujemne
    pub fn allows_negative(&self) -> bool {
        matches!(self, Self::Net)
    }
}

/// Surowy wiersz tabeli w kształcie pliku CSV
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Country")]
    pub country: Option<String>,
    #[serde(rename = "Time")]
    pub time: Option<String>,
    #[serde(rename = "Balance")]
    pub balance: Option<String>,
    #[serde(rename = "Product")]
    pub product: Option<String>,
    #[serde(rename = "Value")]
    pub value: Option<String>,
    #[serde(rename = "Unit")]
    pub unit: Option<String>,
}

impl RawRow {
    pub fn new(country: &str, time: &str, balance: &str, product: &str, value: &str, unit: &str) -> Self {
        let field = |s: &str| Some(s.to_string());
        Self {
            country: field(country),
            time: field(time),
            balance: field(balance),
            product: field(product),
            value: field(value),
            unit: field(unit),
        }
    }
}

/// Zwalidowany rekord, jedyna postać danych widziana przez resztę programu
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub country: String,
    pub timestamp: MonthYear,
    pub category: String,
    pub balance: BalanceDirection,
    pub value: f64,
    pub unit: String,
    pub known_category: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RejectedRow {
    pub row: usize,
    pub error: MalformedRecordError,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnknownCategoryWarning {
    pub row: usize,
    pub category: String,
}

/// Wynik normalizacji: rekordy, odrzucone wiersze i ostrzeżenia
#[derive(Clone, Debug, Default)]
pub struct Normalized {
    pub records: Vec<Record>,
    pub rejected: Vec<RejectedRow>,
    pub warnings: Vec<UnknownCategoryWarning>,
}

impl Normalized {
    fn push(&mut self, row: usize, result: Result<Record, MalformedRecordError>) {
        match result {
            Ok(record) => {
                if !record.known_category {
                    self.warnings.push(UnknownCategoryWarning { row, category: record.category.clone() });
                }
                self.records.push(record);
            }
            Err(error) => {
                debug!(row, %error, "odrzucony wiersz");
                self.rejected.push(RejectedRow { row, error });
            }
        }
    }

    fn report(&self) {
        if !self.rejected.is_empty() {
            warn!(dropped = self.rejected.len(), kept = self.records.len(), "pominięto błędne wiersze danych");
        }
        if !self.warnings.is_empty() {
            warn!(rows = self.warnings.len(), "wiersze z nieznaną kategorią produktu");
        }
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, MalformedRecordError> {
    field.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(MalformedRecordError::MissingField(name))
}

fn normalize_row(row: &RawRow) -> Result<Record, MalformedRecordError> {
    let country = required(&row.country, "Country")?;
    let time = required(&row.time, "Time")?;
    let balance = required(&row.balance, "Balance")?;
    let category = required(&row.product, "Product")?;
    let raw_value = required(&row.value, "Value")?;

    let timestamp: MonthYear = time.parse()?;
    let value: f64 = raw_value.parse()
        .map_err(|_| MalformedRecordError::BadValue(raw_value.to_string()))?;
    if !value.is_finite() {
        return Err(MalformedRecordError::NonFinite(value));
    }

    let direction = BalanceDirection::classify(balance);
    if value < 0.0 && !direction.allows_negative() {
        return Err(MalformedRecordError::Negative { value, balance: balance.to_string() });
    }

    Ok(Record {
        country: country.to_string(),
        timestamp,
        category: category.to_string(),
        balance: direction,
        value,
        unit: row.unit.as_deref().unwrap_or("").trim().to_string(),
        known_category: KNOWN_CATEGORIES.contains(&category),
    })
}

/// Zamienia surowe wiersze na rekordy; błędny wiersz jest pomijany, reszta idzie dalej
pub fn normalize<'a, I>(rows: I) -> Normalized
where
    I: IntoIterator<Item = &'a RawRow>,
{
    let mut out = Normalized::default();
    for (i, row) in rows.into_iter().enumerate() {
        out.push(i + 1, normalize_row(row));
    }
    out.report();
    out
}

fn skip_lines(bytes: &[u8], n: usize) -> &[u8] {
    let mut rest = bytes;
    for _ in 0..n {
        match rest.iter().position(|b| *b == b'\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return &[],
        }
    }
    rest
}

/// Czyta CSV (pomijając `header_lines` linii wstępu) i od razu normalizuje wiersze
pub fn ingest<R: Read>(mut reader: R, header_lines: usize) -> Result<Normalized, AtlasError> {
    // Surowe bajty: błędne UTF-8 odrzuca tylko swój wiersz
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| AtlasError::io("<dataset>", e))?;
    let body = skip_lines(&bytes, header_lines);

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body);
    // Brak nagłówków to błąd całego pliku, nie pojedynczego wiersza
    rdr.headers()?;

    let mut out = Normalized::default();
    for (i, result) in rdr.deserialize::<RawRow>().enumerate() {
        let row = i + 1;
        let record = result
            .map_err(|e| MalformedRecordError::Unreadable(e.to_string()))
            .and_then(|raw| normalize_row(&raw));
        out.push(row, record);
    }
    out.report();
    Ok(out)
}

/// Formatuje wartość w GWh do czytelnej postaci
pub fn format_energy_value(gwh: f64) -> String {
    if gwh.abs() >= 1_000_000.0 {
        format!("{:.2} PWh", gwh / 1_000_000.0)
    } else if gwh.abs() >= 1_000.0 {
        format!("{:.2} TWh", gwh / 1_000.0)
    } else {
        format!("{:.2} GWh", gwh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_month_year_variants() {
        let expected = MonthYear::new(2020, 12).unwrap();
        for s in ["December 2020", "Dec 2020", "dec 2020", "2020-12", "2020-12-01", "12/2020"] {
            assert_eq!(s.parse::<MonthYear>().unwrap(), expected, "{s}");
        }
        assert_eq!(expected.to_string(), "December 2020");
        assert!("Smarch 2020".parse::<MonthYear>().is_err());
        assert!("2020-13".parse::<MonthYear>().is_err());
        assert!("2020".parse::<MonthYear>().is_err());
    }

    #[test]
    fn month_year_orders_chronologically() {
        let a: MonthYear = "December 2019".parse().unwrap();
        let b: MonthYear = "January 2020".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn classifies_balances() {
        assert_eq!(BalanceDirection::classify("Net Electricity Production"), BalanceDirection::Production);
        assert_eq!(BalanceDirection::classify("Final Consumption (Calculated)"), BalanceDirection::Consumption);
        assert_eq!(BalanceDirection::classify("Total Imports"), BalanceDirection::Import);
        assert_eq!(BalanceDirection::classify("Total Exports"), BalanceDirection::Export);
        assert_eq!(BalanceDirection::classify("Net Imports"), BalanceDirection::Net);
        assert_eq!(BalanceDirection::classify("Distribution Losses"), BalanceDirection::Losses);
        assert!(matches!(BalanceDirection::classify("Stock"), BalanceDirection::Other(_)));
    }

    #[test]
    fn drops_malformed_rows_and_keeps_going() {
        let rows = vec![
            RawRow::new("A", "Jan 2020", "Consumption", "P.Wind", "10", "GWh"),
            RawRow::new("B", "Jan 2020", "Consumption", "P.Wind", "x", "GWh"),
            RawRow::new("", "Jan 2020", "Consumption", "P.Wind", "3", "GWh"),
            RawRow::new("C", "Jan 2020", "Consumption", "P.Wind", "-4", "GWh"),
            RawRow::new("D", "Jan 2020", "Net Imports", "P.Electricity", "-4", "GWh"),
            RawRow { value: None, ..RawRow::new("E", "Jan 2020", "Consumption", "P.Wind", "", "") },
        ];
        let out = normalize(&rows);

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].country, "A");
        assert_eq!(out.records[1].value, -4.0);
        let rejected: Vec<usize> = out.rejected.iter().map(|r| r.row).collect();
        assert_eq!(rejected, vec![2, 3, 4, 6]);
        assert_eq!(out.rejected[0].error, MalformedRecordError::BadValue("x".into()));
        assert_eq!(out.rejected[1].error, MalformedRecordError::MissingField("Country"));
        assert_eq!(out.rejected[3].error, MalformedRecordError::MissingField("Value"));
    }

    #[test]
    fn flags_unknown_categories_without_dropping() {
        let rows = vec![
            RawRow::new("A", "Jan 2020", "Consumption", "P.Tidal", "1", "GWh"),
            RawRow::new("A", "Jan 2020", "Consumption", "p.wind", "1", "GWh"),
            RawRow::new("A", "Jan 2020", "Consumption", "P.Wind", "1", "GWh"),
        ];
        let out = normalize(&rows);
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.warnings.len(), 2);
        assert_eq!(out.warnings[0].category, "P.Tidal");
        assert!(out.records[2].known_category);
    }

    #[test]
    fn ingests_csv_with_preamble() {
        let text = "\
Monthly Electricity Statistics
Notes line
Country,Time,Balance,Product,Value,Unit
Poland,December 2020,Net Electricity Production,P.Electricity,14000.5,GWh
Poland,December 2020,Net Electricity Production,P.Wind,..,GWh
Chile,Dec 2020,Net Electricity Production,P.Solar, 700 ,GWh
";
        let out = ingest(text.as_bytes(), 2).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].row, 2);
        assert_eq!(out.records[1].value, 700.0);
        assert_eq!(out.records[1].timestamp.to_string(), "December 2020");
    }

    #[test]
    fn non_utf8_row_is_rejected_alone() {
        let bytes: &[u8] = b"Country,Time,Balance,Product,Value,Unit\n\
Poland,December 2020,Net Electricity Production,P.Electricity,10,GWh\n\
C\xF4te d'Ivoire,December 2020,Net Electricity Production,P.Electricity,5,GWh\n\
Chile,December 2020,Net Electricity Production,P.Electricity,7,GWh\n";
        let out = ingest(bytes, 0).unwrap();
        let names: Vec<&str> = out.records.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(names, vec!["Poland", "Chile"]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].row, 2);
        assert!(matches!(out.rejected[0].error, MalformedRecordError::Unreadable(_)));
    }

    #[test]
    fn formats_energy_values() {
        assert_eq!(format_energy_value(12.0), "12.00 GWh");
        assert_eq!(format_energy_value(14000.5), "14.00 TWh");
        assert_eq!(format_energy_value(2_500_000.0), "2.50 PWh");
    }
}
