//! Output collaborator: GeoJSON feature sink

use std::io::{self, Write};

use serde_json::{json, Value};

use crate::emit::RouteFeature;

/// Receives emitted features one by one; `finish` is the final
/// build-index step that persists everything. An I/O failure here is
/// fatal to the run.
pub trait FeatureSink {
    fn write_feature(&mut self, feature: &RouteFeature) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()>;
}

/// Collects features and writes one GeoJSON FeatureCollection on finish.
pub struct GeoJsonWriter<W: Write> {
    out: W,
    features: Vec<Value>,
}

impl<W: Write> GeoJsonWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, features: Vec::new() }
    }
}

impl<W: Write> FeatureSink for GeoJsonWriter<W> {
    fn write_feature(&mut self, feature: &RouteFeature) -> io::Result<()> {
        let coordinates: Vec<[f64; 3]> =
            feature.geometry.iter().map(|p| [p.x, p.y, p.z]).collect();
        self.features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": coordinates,
            },
            "properties": Value::Object(feature.properties.clone()),
        }));
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let collection = json!({
            "type": "FeatureCollection",
            "features": std::mem::take(&mut self.features),
        });
        serde_json::to_writer_pretty(&mut self.out, &collection).map_err(io::Error::from)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Point;
    use serde_json::Map;

    #[test]
    fn writes_feature_collection() {
        let mut props = Map::new();
        props.insert("id".to_string(), json!(4));
        let feature = RouteFeature {
            geometry: vec![Point::xy(0.0, 0.0), Point::new(1.0, 0.0, 2.0)],
            properties: props,
        };

        let mut buf = Vec::new();
        {
            let mut writer = GeoJsonWriter::new(&mut buf);
            writer.write_feature(&feature).unwrap();
            writer.finish().unwrap();
        }

        let parsed: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["type"], "FeatureCollection");
        assert_eq!(parsed["features"].as_array().unwrap().len(), 1);
        let f = &parsed["features"][0];
        assert_eq!(f["properties"]["id"], 4);
        assert_eq!(f["geometry"]["coordinates"][1][2], 2.0);
    }
}
