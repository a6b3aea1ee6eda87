//! Vector features: geometry + attributes, read from GeoJSON

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::crs::{reproject_geometry, CRS};
use crate::error::{Error, Result};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Text form of the value, used for label columns. `Null` has none.
    pub fn as_label(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(b) => Some(b.to_string()),
            AttributeValue::Int(i) => Some(i.to_string()),
            AttributeValue::Float(f) => Some(f.to_string()),
            AttributeValue::String(s) => Some(s.clone()),
        }
    }
}

impl From<&serde_json::Value> for AttributeValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => AttributeValue::String(s.clone()),
            other => AttributeValue::String(other.to_string()),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Attribute as label text
    pub fn label(&self, key: &str) -> Option<String> {
        self.get_property(key).and_then(AttributeValue::as_label)
    }
}

/// Collection of features with the CRS their coordinates are expressed in
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<CRS>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            crs: None,
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Reproject every geometry into `target`.
    ///
    /// The collection must carry a CRS; features without geometry are kept as-is.
    pub fn to_crs(&self, target: &CRS) -> Result<FeatureCollection> {
        let source = self
            .crs
            .as_ref()
            .ok_or_else(|| Error::Vector("feature collection has no CRS".into()))?;

        let features = self
            .features
            .iter()
            .map(|f| {
                let geometry = f
                    .geometry
                    .as_ref()
                    .map(|g| reproject_geometry(g, source, target))
                    .transpose()?;
                Ok(Feature {
                    geometry,
                    properties: f.properties.clone(),
                    id: f.id.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureCollection {
            features,
            crs: Some(target.clone()),
        })
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Read a GeoJSON file (FeatureCollection, Feature or bare Geometry).
///
/// The CRS comes from the legacy `crs` member when present, otherwise
/// `default_crs` is used (GeoJSON defaults to WGS84).
pub fn read_geojson<P: AsRef<Path>>(path: P, default_crs: Option<CRS>) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_geojson(&text, default_crs)
}

/// Parse GeoJSON text. See [`read_geojson`].
pub fn parse_geojson(text: &str, default_crs: Option<CRS>) -> Result<FeatureCollection> {
    let parsed: geojson::GeoJson = text.parse()?;

    let mut collection = FeatureCollection::new();
    match parsed {
        geojson::GeoJson::FeatureCollection(fc) => {
            collection.crs = fc.foreign_members.as_ref().and_then(crs_member);
            for feature in fc.features {
                collection.push(convert_feature(feature)?);
            }
        }
        geojson::GeoJson::Feature(feature) => {
            collection.crs = feature.foreign_members.as_ref().and_then(crs_member);
            collection.push(convert_feature(feature)?);
        }
        geojson::GeoJson::Geometry(geometry) => {
            collection.push(Feature::new(Geometry::<f64>::try_from(geometry)?));
        }
    }

    if collection.crs.is_none() {
        collection.crs = default_crs;
    }
    Ok(collection)
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(Geometry::<f64>::try_from)
        .transpose()?;

    let properties = feature
        .properties
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), AttributeValue::from(v)))
        .collect();

    let id = feature.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

/// `{"crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32648"}}}`
fn crs_member(members: &geojson::JsonObject) -> Option<CRS> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    let code = name.rsplit(':').next()?;
    code.parse::<u32>().ok().map(CRS::from_epsg)
}
