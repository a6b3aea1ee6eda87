//! Per-polygon comparison of a prediction raster against reference polygons
//!
//! For every configured category, each reference polygon is clipped out of
//! the prediction. The polygon's truth label gives an expected code; the
//! rule table then decides which predicted codes are masked from the clip.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use lcfuse_core::vector::FeatureCollection;
use lcfuse_core::{Error, Raster, Result};

use super::clip::clip;
use crate::batch::BatchOutcome;

/// A land-cover category and the prediction codes that belong to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Short key, also the output file stem
    pub key: String,
    pub name: String,
    pub codes: Vec<f64>,
}

/// Codes masked from a clip when the polygon's expected code is `expected`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskRule {
    pub expected: f64,
    pub mask: Vec<f64>,
}

/// Masking policy for the comparison.
///
/// A polygon whose expected code is not in the category's code set is
/// discarded (its clip becomes all NaN). Otherwise the first rule matching
/// the expected code gives the codes to mask; with no matching rule the
/// expected code itself is masked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRules {
    /// Code used for truth labels missing from the code map
    pub other_code: f64,
    pub rules: Vec<MaskRule>,
}

impl CompareRules {
    /// The standard table: the competing category masks its own code, the
    /// generic "other" category masks the competing code and `extra_other_code`.
    pub fn standard(other_code: f64, competing_code: f64, extra_other_code: f64) -> Self {
        Self {
            other_code,
            rules: vec![
                MaskRule {
                    expected: competing_code,
                    mask: vec![competing_code],
                },
                MaskRule {
                    expected: other_code,
                    mask: vec![competing_code, extra_other_code],
                },
            ],
        }
    }

    /// Build the standard table from category keys: each code is the first
    /// code of the named category.
    pub fn from_categories(
        categories: &[Category],
        other_key: &str,
        competing_key: &str,
        extra_other_code: f64,
    ) -> Result<Self> {
        let first_code = |key: &str| -> Result<f64> {
            categories
                .iter()
                .find(|c| c.key == key)
                .and_then(|c| c.codes.first().copied())
                .ok_or_else(|| Error::InvalidParameter {
                    name: "categories",
                    value: key.to_string(),
                    reason: "category missing or has no codes".into(),
                })
        };
        Ok(Self::standard(first_code(other_key)?, first_code(competing_key)?, extra_other_code))
    }

    /// Codes to mask for a polygon expected to be `expected`
    pub fn codes_to_mask(&self, expected: f64) -> Vec<f64> {
        self.rules
            .iter()
            .find(|r| r.expected == expected)
            .map(|r| r.mask.clone())
            .unwrap_or_else(|| vec![expected])
    }

    /// Expected code for a truth label
    pub fn expected_code(&self, label: Option<&str>, code_map: &BTreeMap<String, f64>) -> f64 {
        label
            .and_then(|l| code_map.get(l).copied())
            .unwrap_or(self.other_code)
    }
}

/// All clips for one category, in polygon order
#[derive(Debug, Clone)]
pub struct CategoryClips {
    pub key: String,
    pub name: String,
    pub rasters: Vec<Raster<f64>>,
}

/// Apply the rules to one clip in place
fn apply_rules(clip: &mut Raster<f64>, category: &Category, expected: f64, rules: &CompareRules) {
    if !category.codes.contains(&expected) {
        clip.data_mut().fill(f64::NAN);
        return;
    }
    let masked = rules.codes_to_mask(expected);
    clip.data_mut().mapv_inplace(|v| if masked.contains(&v) { f64::NAN } else { v });
}

/// Compare `prediction` with every reference polygon, category by category.
///
/// `reference` must already be in the prediction's CRS. Categories come out
/// in the order given. A polygon that cannot be clipped is recorded in
/// `skipped` under `<category>/polygon_<n>` and never aborts the run.
pub fn compare(
    prediction: &Raster<f64>,
    reference: &FeatureCollection,
    label_field: &str,
    categories: &[Category],
    code_map: &BTreeMap<String, f64>,
    rules: &CompareRules,
) -> BatchOutcome<CategoryClips> {
    let mut outcome = BatchOutcome::new();

    for category in categories {
        tracing::info!("comparing category {}", category.key);
        let mut rasters = Vec::new();

        for (i, feature) in reference.iter().enumerate() {
            let key = format!("{}/polygon_{}", category.key, i + 1);
            let label = feature.label(label_field);
            let expected = rules.expected_code(label.as_deref(), code_map);

            let clipped = feature
                .geometry
                .as_ref()
                .ok_or_else(|| Error::Vector("feature has no geometry".into()))
                .and_then(|geom| clip(prediction, geom, true));
            match clipped {
                Ok(mut raster) => {
                    apply_rules(&mut raster, category, expected, rules);
                    rasters.push(raster);
                }
                Err(e) => {
                    tracing::debug!("{} skipped: {}", key, e);
                    outcome.skip(key, e);
                }
            }
        }

        outcome.push(CategoryClips {
            key: category.key.clone(),
            name: category.name.clone(),
            rasters,
        });
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};
    use lcfuse_core::vector::{AttributeValue, Feature};
    use lcfuse_core::GeoTransform;
    use ndarray::Array2;

    const OTHER: f64 = 0.0;
    const COMPETING: f64 = 1.0;

    fn categories() -> Vec<Category> {
        vec![
            Category {
                key: "TQ".into(),
                name: "other".into(),
                codes: vec![OTHER, 3.0],
            },
            Category {
                key: "PNN".into(),
                name: "farmland".into(),
                codes: vec![COMPETING],
            },
            Category {
                key: "RSX".into(),
                name: "forest".into(),
                codes: vec![2.0],
            },
        ]
    }

    fn rules() -> CompareRules {
        CompareRules::from_categories(&categories(), "TQ", "PNN", 3.0).unwrap()
    }

    #[test]
    fn test_rule_table() {
        let r = rules();
        assert_eq!(r.other_code, OTHER);
        assert_eq!(r.codes_to_mask(COMPETING), vec![COMPETING]);
        assert_eq!(r.codes_to_mask(OTHER), vec![COMPETING, 3.0]);
        assert_eq!(r.codes_to_mask(2.0), vec![2.0]);
        assert!(CompareRules::from_categories(&categories(), "TQ", "missing", 3.0).is_err());
    }

    #[test]
    fn test_unknown_label_falls_back_to_other() {
        let map: BTreeMap<String, f64> = [("forest".to_string(), 2.0)].into_iter().collect();
        let r = rules();
        assert_eq!(r.expected_code(Some("forest"), &map), 2.0);
        assert_eq!(r.expected_code(Some("lake"), &map), OTHER);
        assert_eq!(r.expected_code(None, &map), OTHER);
    }

    fn prediction() -> Raster<f64> {
        // codes laid out column by column: 0 1 2 3
        let mut r = Raster::from_array(Array2::from_shape_fn((2, 4), |(_, c)| c as f64));
        r.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        r
    }

    fn reference(label: &str) -> FeatureCollection {
        let mut fc = FeatureCollection::new();
        let mut f = Feature::new(Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)
        ]));
        f.set_property("tenchu", AttributeValue::String(label.into()));
        fc.push(f);
        // polygon far away from the raster
        fc.push(Feature::new(Geometry::Polygon(polygon![
            (x: 50.0, y: 50.0), (x: 51.0, y: 50.0), (x: 51.0, y: 51.0), (x: 50.0, y: 50.0)
        ])));
        fc
    }

    fn row(r: &Raster<f64>) -> Vec<f64> {
        r.data().row(0).to_vec()
    }

    fn assert_nan_eq(actual: Vec<f64>, expected: [f64; 4]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a.is_nan() && e.is_nan()) || a == &e, "{:?} vs {:?}", actual, expected);
        }
    }

    #[test]
    fn test_compare_literal_behaviour() {
        let map: BTreeMap<String, f64> = [
            ("farmland".to_string(), COMPETING),
            ("forest".to_string(), 2.0),
        ]
        .into_iter()
        .collect();
        let nan = f64::NAN;

        // truth = forest (2): only RSX keeps values, with code 2 masked
        let out = compare(&prediction(), &reference("forest"), "tenchu", &categories(), &map, &rules());
        let keys: Vec<_> = out.items.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["TQ", "PNN", "RSX"]);
        assert_nan_eq(row(&out.items[0].rasters[0]), [nan; 4]);
        assert_nan_eq(row(&out.items[1].rasters[0]), [nan; 4]);
        assert_nan_eq(row(&out.items[2].rasters[0]), [0.0, 1.0, nan, 3.0]);
        // the far polygon is skipped once per category
        assert_eq!(out.skipped.len(), 3);
        assert_eq!(out.skipped[0].key, "TQ/polygon_2");

        // truth = farmland: competing code masked inside PNN
        let out = compare(&prediction(), &reference("farmland"), "tenchu", &categories(), &map, &rules());
        assert_nan_eq(row(&out.items[1].rasters[0]), [0.0, nan, 2.0, 3.0]);

        // unmapped truth: "other" masks the competing code and 3
        let out = compare(&prediction(), &reference("lake"), "tenchu", &categories(), &map, &rules());
        assert_nan_eq(row(&out.items[0].rasters[0]), [0.0, nan, 2.0, nan]);
        assert_nan_eq(row(&out.items[2].rasters[0]), [nan; 4]);
    }
}
