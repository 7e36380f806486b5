use crate::models::{Commune, Listing, BRUSSELS_CENTER};
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

/// Max offset in degrees applied to co-located pins
pub const JITTER_DEGREES: f64 = 0.004;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapMarker {
    pub id: String,
    pub title: String,
    pub price: Option<f64>,
    pub source_url: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Place each listing at its commune centroid plus a fresh random offset.
/// The offset only separates pins visually; it is never persisted.
pub fn place_markers<R: Rng>(listings: &[&Listing], rng: &mut R) -> Vec<MapMarker> {
    listings
        .iter()
        .map(|listing| {
            let (lat, lon) = Commune::from_name(&listing.commune)
                .map(Commune::centroid)
                .unwrap_or(BRUSSELS_CENTER);
            MapMarker {
                id: listing.id.clone(),
                title: listing.title.clone(),
                price: listing.price,
                source_url: listing.source_url.clone(),
                latitude: lat + rng.random_range(-JITTER_DEGREES..=JITTER_DEGREES),
                longitude: lon + rng.random_range(-JITTER_DEGREES..=JITTER_DEGREES),
            }
        })
        .collect()
}

/// GeoJSON coordinates are `[longitude, latitude]`.
pub fn to_geojson(markers: &[MapMarker]) -> Value {
    let features: Vec<Value> = markers
        .iter()
        .map(|m| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [m.longitude, m.latitude],
                },
                "properties": {
                    "id": m.id,
                    "title": m.title,
                    "price": m.price,
                    "source_url": m.source_url,
                },
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::listing;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn markers_stay_near_their_commune() {
        let mut forest = listing("f", "Abri-Europe");
        forest.commune = "Forest".to_string();
        let mut unknown = listing("u", "Immoweb");
        unknown.commune = "Bruxelles".to_string();
        let gilles = listing("g", "Viabilis");

        let mut rng = StdRng::seed_from_u64(7);
        let markers = place_markers(&[&forest, &unknown, &gilles], &mut rng);

        let expected = [Commune::Forest.centroid(), BRUSSELS_CENTER, Commune::SaintGilles.centroid()];
        for (marker, (lat, lon)) in markers.iter().zip(expected) {
            assert!((marker.latitude - lat).abs() <= JITTER_DEGREES);
            assert!((marker.longitude - lon).abs() <= JITTER_DEGREES);
        }
    }

    #[test]
    fn jitter_is_recomputed_each_render() {
        let a = listing("a", "Viabilis");
        let b = listing("b", "Viabilis");
        let mut rng = StdRng::seed_from_u64(42);

        let first = place_markers(&[&a, &b], &mut rng);
        let second = place_markers(&[&a, &b], &mut rng);
        assert_ne!(first[0].latitude, first[1].latitude);
        assert_ne!(first, second);
    }

    #[test]
    fn geojson_uses_lon_lat_order() {
        let marker = MapMarker {
            id: "a".to_string(),
            title: "Appartement".to_string(),
            price: Some(350_000.0),
            source_url: "https://example.be/a".to_string(),
            latitude: 50.83,
            longitude: 4.35,
        };
        let geojson = to_geojson(&[marker]);
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"][0]["geometry"]["coordinates"], json!([4.35, 50.83]));
        assert_eq!(geojson["features"][0]["properties"]["price"], json!(350_000.0));
    }
}
