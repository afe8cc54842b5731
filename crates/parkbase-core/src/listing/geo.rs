//! GeoJSON-style points and great-circle distance helpers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PointKind {
    #[default]
    Point,
}

/// A GeoJSON point. `coordinates` is `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub kind: PointKind,
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GeoPoint {
    #[must_use]
    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    #[must_use]
    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    #[must_use]
    pub fn position(&self) -> LatLng {
        LatLng {
            lat: self.lat(),
            lng: self.lng(),
        }
    }
}

/// A stop on a listing's itinerary; `day` is the offset from the start date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(flatten)]
    pub point: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub fn is_valid(self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// Parse the `"lat,lng"` form used in URLs.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (lat, lng) = raw.split_once(',')?;
        let point = Self {
            lat: lat.trim().parse().ok()?,
            lng: lng.trim().parse().ok()?,
        };
        point.is_valid().then_some(point)
    }

    /// Central angle between two points in radians (haversine).
    #[must_use]
    pub fn angle_to(self, other: LatLng) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng - self.lng).to_radians();
        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Kilometers,
}

impl DistanceUnit {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mi" => Some(DistanceUnit::Miles),
            "km" => Some(DistanceUnit::Kilometers),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceUnit::Miles => "mi",
            DistanceUnit::Kilometers => "km",
        }
    }

    #[must_use]
    pub fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Miles => 3963.2,
            DistanceUnit::Kilometers => 6378.1,
        }
    }

    /// Convert a distance in this unit into a central angle in radians.
    #[must_use]
    pub fn to_radians(self, distance: f64) -> f64 {
        distance / self.earth_radius()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lat_lng_pairs() {
        let p = LatLng::parse("34.111745,-118.113491").expect("valid");
        assert!((p.lat - 34.111_745).abs() < 1e-9);
        assert!((p.lng + 118.113_491).abs() < 1e-9);
        assert!(LatLng::parse("95,10").is_none());
        assert!(LatLng::parse("34.1").is_none());
        assert!(LatLng::parse("abc,def").is_none());
    }

    #[test]
    fn distance_between_los_angeles_and_san_francisco() {
        let la = LatLng { lat: 34.0522, lng: -118.2437 };
        let sf = LatLng { lat: 37.7749, lng: -122.4194 };
        let miles = la.angle_to(sf) * DistanceUnit::Miles.earth_radius();
        assert!((340.0..350.0).contains(&miles), "got {miles}");
    }

    #[test]
    fn point_serializes_with_geojson_type() {
        let point = GeoPoint {
            kind: PointKind::Point,
            coordinates: [-80.185_942, 25.774_772],
            address: Some("301 Biscayne Blvd, Miami".to_string()),
            description: None,
        };
        let json = serde_json::to_value(&point).expect("serialize");
        assert_eq!(json["type"], "Point");
        assert!(json.get("description").is_none());
        let stop: Stop = serde_json::from_value(serde_json::json!({
            "coordinates": [-80.128_473, 25.781_842],
            "description": "Lummus Park Beach",
            "day": 1
        }))
        .expect("deserialize");
        assert_eq!(stop.point.kind, PointKind::Point);
        assert_eq!(stop.day, Some(1));
    }
}
