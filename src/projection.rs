use geo::{BoundingRect, Contains, Coord, Geometry, MultiPolygon, Point, Rect};
use geojson::{feature::Id, GeoJson};
use serde::Deserialize;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use tracing::debug;
use crate::error::AtlasError;

/// Granica szerokości dla Merkatora (jak w d3), żeby bieguny nie uciekały w nieskończoność
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_6;

/// Kraj z geometrią w stopniach (długość, szerokość)
#[derive(Clone, Debug)]
pub struct GeoFeature {
    pub id: String,
    pub name: String,
    pub shape: MultiPolygon<f64>,
    pub bbox: Option<Rect<f64>>,
    /// Nazwa kraju w zbiorze danych, jeśli udało się ją dopasować
    pub dataset_key: Option<String>,
}

impl GeoFeature {
    pub fn new(id: String, name: String, shape: MultiPolygon<f64>) -> Self {
        let bbox = shape.bounding_rect();
        Self { id, name, shape, bbox, dataset_key: None }
    }

    /// Wszystkie pierścienie: zewnętrzne i dziury
    pub fn rings(&self) -> impl Iterator<Item = &[Coord<f64>]> + '_ {
        self.shape.0.iter().flat_map(|poly| {
            std::iter::once(poly.exterior().0.as_slice())
                .chain(poly.interiors().iter().map(|r| r.0.as_slice()))
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.rings().map(<[Coord<f64>]>::len).sum()
    }

    pub fn contains(&self, lonlat: Coord<f64>) -> bool {
        let inside_bbox = self.bbox.is_some_and(|b| {
            lonlat.x >= b.min().x && lonlat.x <= b.max().x
                && lonlat.y >= b.min().y && lonlat.y <= b.max().y
        });
        inside_bbox && self.shape.contains(&Point::from(lonlat))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    #[default]
    Mercator,
    Equirectangular,
}

/// Rzutowanie kartograficzne ze skalą i przesunięciem do widoku
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub kind: ProjectionKind,
    pub scale: f64,
    pub translate: (f64, f64),
}

impl Projection {
    pub fn new(kind: ProjectionKind, scale: f64, translate: (f64, f64)) -> Self {
        Self { kind, scale, translate }
    }

    /// Dopasowanie do widoku: cały świat mieści się mniej więcej w szerokości
    pub fn fit(kind: ProjectionKind, width: f64, height: f64) -> Self {
        Self::new(kind, width / 630.0 * 100.0, (width / 2.0, height / 2.0))
    }

    /// (lon, lat) w stopniach → punkt widoku (y rośnie w dół)
    pub fn project(&self, lonlat: Coord<f64>) -> Coord<f64> {
        let lambda = lonlat.x.to_radians();
        let y = match self.kind {
            ProjectionKind::Mercator => {
                let phi = lonlat.y.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
                (FRAC_PI_4 + phi / 2.0).tan().ln()
            }
            ProjectionKind::Equirectangular => lonlat.y.to_radians(),
        };
        Coord {
            x: self.translate.0 + lambda * self.scale,
            y: self.translate.1 - y * self.scale,
        }
    }

    /// Odwrotność `project` (w zakresie szerokości, które nie zostały przycięte)
    pub fn invert(&self, point: Coord<f64>) -> Coord<f64> {
        let lambda = (point.x - self.translate.0) / self.scale;
        let y = (self.translate.1 - point.y) / self.scale;
        let phi = match self.kind {
            ProjectionKind::Mercator => 2.0 * y.exp().atan() - FRAC_PI_2,
            ProjectionKind::Equirectangular => y,
        };
        Coord { x: lambda.to_degrees(), y: phi.to_degrees() }
    }
}

/// Ścieżki jednego kraju w przestrzeni widoku
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenPath {
    pub feature: usize,
    pub rings: Vec<Vec<Coord<f64>>>,
}

/// Rzutuje wszystkie pierścienie; koszt liniowy względem liczby wierzchołków
pub fn project(features: &[GeoFeature], projection: &Projection) -> Vec<ScreenPath> {
    let mut out = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        let rings = feature.rings()
            .map(|ring| ring.iter().map(|c| projection.project(*c)).collect())
            .collect();
        out.push(ScreenPath { feature: i, rings });
    }
    out
}

/// Siatka południków i równoleżników co `step` stopni, jako linie (lon, lat)
pub fn graticule(step: f64) -> Vec<Vec<Coord<f64>>> {
    const RESOLUTION: f64 = 2.5;
    let mut lines = Vec::new();
    if step <= 0.0 {
        return lines;
    }

    let samples = |from: f64, to: f64| {
        let n = ((to - from) / RESOLUTION).round() as usize;
        (0..=n).map(move |i| from + i as f64 * RESOLUTION)
    };

    let mut lon = -180.0;
    while lon <= 180.0 {
        lines.push(samples(-80.0, 80.0).map(|lat| Coord { x: lon, y: lat }).collect());
        lon += step;
    }
    let mut lat = -80.0;
    while lat <= 80.0 {
        lines.push(samples(-180.0, 180.0).map(|lon| Coord { x: lon, y: lat }).collect());
        lat += step;
    }
    lines
}

/// Indeks kraju zawierającego punkt (lon, lat)
pub fn hit_test(features: &[GeoFeature], lonlat: Coord<f64>) -> Option<usize> {
    features.iter().position(|f| f.contains(lonlat))
}

fn feature_id(feature: &geojson::Feature) -> String {
    match &feature.id {
        Some(Id::String(s)) => s.clone(),
        Some(Id::Number(n)) => n.to_string(),
        None => feature
            .property("ISO_A3")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    }
}

/// Zamienia FeatureCollection na listę krajów; inne geometrie niż wielokąty są pomijane
pub fn features_from_geojson(raw: GeoJson, name_property: &str) -> Result<Vec<GeoFeature>, AtlasError> {
    let mut items = Vec::new();

    if let GeoJson::FeatureCollection(fc) = raw {
        for feature in fc.features {
            let id = feature_id(&feature);
            let name = feature
                .properties
                .as_ref()
                .and_then(|p| p.get(name_property).and_then(|v| v.as_str()))
                .unwrap_or("")
                .to_string();

            if let Some(gj) = feature.geometry {
                let geom: Geometry<f64> = gj.value.try_into()?;
                let mp = match geom {
                    Geometry::Polygon(p) => p.into(),
                    Geometry::MultiPolygon(m) => m,
                    _ => {
                        debug!(%name, "pominięto geometrię inną niż wielokąt");
                        continue;
                    }
                };
                items.push(GeoFeature::new(id, name, mp));
            }
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use std::str::FromStr;

    fn square(name: &str, x0: f64, y0: f64, size: f64) -> GeoFeature {
        let ring = LineString::from(vec![
            (x0, y0), (x0 + size, y0), (x0 + size, y0 + size), (x0, y0 + size), (x0, y0),
        ]);
        GeoFeature::new(name.to_string(), name.to_string(), MultiPolygon(vec![Polygon::new(ring, vec![])]))
    }

    fn close(a: Coord<f64>, b: Coord<f64>) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn origin_lands_on_translate() {
        for kind in [ProjectionKind::Mercator, ProjectionKind::Equirectangular] {
            let p = Projection::new(kind, 100.0, (320.0, 240.0));
            assert!(close(p.project(Coord { x: 0.0, y: 0.0 }), Coord { x: 320.0, y: 240.0 }));
        }
    }

    #[test]
    fn north_is_up_and_east_is_right() {
        let p = Projection::fit(ProjectionKind::Mercator, 630.0, 400.0);
        let a = p.project(Coord { x: 10.0, y: 50.0 });
        let b = p.project(Coord { x: 20.0, y: 40.0 });
        assert!(b.x > a.x);
        assert!(b.y > a.y);
        assert!((p.scale - 100.0).abs() < 1e-12);
    }

    #[test]
    fn invert_undoes_project() {
        for kind in [ProjectionKind::Mercator, ProjectionKind::Equirectangular] {
            let p = Projection::new(kind, 87.3, (12.0, -40.0));
            for c in [Coord { x: -179.0, y: -84.0 }, Coord { x: 21.0, y: 52.2 }, Coord { x: 0.0, y: 0.0 }] {
                assert!(close(p.invert(p.project(c)), c), "{kind:?} {c:?}");
            }
        }
    }

    #[test]
    fn mercator_clamps_poles() {
        let p = Projection::new(ProjectionKind::Mercator, 100.0, (0.0, 0.0));
        let pole = p.project(Coord { x: 0.0, y: 90.0 });
        assert!(pole.y.is_finite());
        assert_eq!(pole, p.project(Coord { x: 0.0, y: MERCATOR_MAX_LAT }));
    }

    #[test]
    fn project_keeps_vertex_count() {
        let features = vec![square("A", 0.0, 0.0, 10.0), square("B", 20.0, 20.0, 5.0)];
        let p = Projection::fit(ProjectionKind::Mercator, 630.0, 400.0);
        let paths = project(&features, &p);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].feature, 1);
        let projected: usize = paths.iter().flat_map(|s| &s.rings).map(Vec::len).sum();
        let source: usize = features.iter().map(GeoFeature::vertex_count).sum();
        assert_eq!(projected, source);
    }

    #[test]
    fn hit_test_finds_containing_feature() {
        let features = vec![square("A", 0.0, 0.0, 10.0), square("B", 20.0, 20.0, 5.0)];
        assert_eq!(hit_test(&features, Coord { x: 22.0, y: 21.0 }), Some(1));
        assert_eq!(hit_test(&features, Coord { x: 5.0, y: 5.0 }), Some(0));
        assert_eq!(hit_test(&features, Coord { x: 15.0, y: 15.0 }), None);
    }

    #[test]
    fn graticule_covers_the_globe() {
        let lines = graticule(30.0);
        // 13 południków i 6 równoleżników
        assert_eq!(lines.len(), 13 + 6);
        assert!(graticule(0.0).is_empty());
    }

    #[test]
    fn reads_feature_collection() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "POL", "properties": {"ADMIN": "Poland"},
                 "geometry": {"type": "Polygon", "coordinates": [[[14,49],[24,49],[24,55],[14,55],[14,49]]]}},
                {"type": "Feature", "properties": {"ADMIN": "Nowhere", "ISO_A3": "NWH"},
                 "geometry": {"type": "Point", "coordinates": [0, 0]}},
                {"type": "Feature", "properties": {"ADMIN": "Chile", "ISO_A3": "CHL"},
                 "geometry": {"type": "MultiPolygon", "coordinates": [[[[-75,-50],[-70,-50],[-70,-20],[-75,-20],[-75,-50]]]]}}
            ]
        }"#;
        let features = features_from_geojson(GeoJson::from_str(text).unwrap(), "ADMIN").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "POL");
        assert_eq!(features[1].id, "CHL");
        assert_eq!(features[1].name, "Chile");
        assert!(features[0].contains(Coord { x: 21.0, y: 52.0 }));
    }
}
