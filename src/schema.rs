//! Process samples, target vectors and the column schema that ties them to
//! dataset columns.
//!
//! The feature order defined by [`FEATURES`] is the positional order used by
//! the scaler and the forest. It is persisted with every artifact as a
//! [`FeatureSchema`] so a model can never be fed columns in a different order.

use crate::error::{Result, WireRodError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// Number of process parameters per sample
pub const N_FEATURES: usize = 9;

/// Number of predicted rod properties
pub const N_TARGETS: usize = 3;

/// Description of one process parameter
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    /// Dataset column and API field name
    pub name: &'static str,
    /// Human readable label used by the console prompt
    pub label: &'static str,
    pub unit: &'static str,
    /// Expected operating range (informational, not enforced)
    pub min: f64,
    pub max: f64,
    /// Alternative field names accepted from web forms
    pub aliases: &'static [&'static str],
}

impl FeatureSpec {
    /// Prompt text, e.g. `Casting Temperature (600 to 700 °C)`
    pub fn prompt(&self) -> String {
        if self.unit.is_empty() {
            format!("{} ({} to {})", self.label, self.min, self.max)
        } else {
            format!("{} ({} to {} {})", self.label, self.min, self.max, self.unit)
        }
    }

    pub fn in_expected_range(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Parse one raw entry for this field, failing with `InvalidInput`
    pub fn parse(&self, raw: &str) -> Result<f64> {
        parse_value(self.name, raw)
    }

    fn accepts(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }
}

pub const FEATURES: [FeatureSpec; N_FEATURES] = [
    FeatureSpec {
        name: "chemical_composition",
        label: "Chemical Composition",
        unit: "",
        min: 0.1,
        max: 1.0,
        aliases: &[],
    },
    FeatureSpec {
        name: "casting_temp",
        label: "Casting Temperature",
        unit: "°C",
        min: 600.0,
        max: 700.0,
        aliases: &["casting_temperature"],
    },
    FeatureSpec {
        name: "cooling_water_temp",
        label: "Cooling Water Temperature",
        unit: "°C",
        min: 10.0,
        max: 30.0,
        aliases: &["cooling_water_temperature"],
    },
    FeatureSpec {
        name: "casting_speed",
        label: "Casting Speed",
        unit: "m/min",
        min: 20.0,
        max: 30.0,
        aliases: &[],
    },
    FeatureSpec {
        name: "entry_temp_rolling_mill",
        label: "Entry Temp at Rolling Mill",
        unit: "°C",
        min: 300.0,
        max: 400.0,
        aliases: &["entry_temperature_rolling_mill"],
    },
    FeatureSpec {
        name: "emulsion_temp",
        label: "Emulsion Temperature",
        unit: "°C",
        min: 50.0,
        max: 80.0,
        aliases: &["emulsion_temperature"],
    },
    FeatureSpec {
        name: "emulsion_pressure",
        label: "Emulsion Pressure",
        unit: "bar",
        min: 3.0,
        max: 6.0,
        aliases: &[],
    },
    FeatureSpec {
        name: "emulsion_concentration",
        label: "Emulsion Concentration",
        unit: "%",
        min: 0.5,
        max: 2.0,
        aliases: &[],
    },
    FeatureSpec {
        name: "quench_water_pressure",
        label: "Quench Water Pressure",
        unit: "bar",
        min: 1.0,
        max: 3.0,
        aliases: &[],
    },
];

/// Dataset column names of the predicted properties, in output order
pub const TARGET_NAMES: [&str; N_TARGETS] = ["UTS", "elongation", "conductivity"];

/// Feature column names in model order
pub fn feature_names() -> Vec<String> {
    FEATURES.iter().map(|f| f.name.to_string()).collect()
}

/// Target column names in model order
pub fn target_names() -> Vec<String> {
    TARGET_NAMES.iter().map(|t| t.to_string()).collect()
}

/// Column ordering persisted alongside fitted artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<String>,
    pub targets: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            features: feature_names(),
            targets: target_names(),
        }
    }
}

impl FeatureSchema {
    /// Fails unless `other` uses exactly the same columns in the same order.
    pub fn ensure_matches(&self, other: &FeatureSchema) -> Result<()> {
        if self.features != other.features {
            return Err(WireRodError::ArtifactMismatch(format!(
                "feature order differs: {:?} vs {:?}",
                self.features, other.features
            )));
        }
        if self.targets != other.targets {
            return Err(WireRodError::ArtifactMismatch(format!(
                "target order differs: {:?} vs {:?}",
                self.targets, other.targets
            )));
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }
}

/// One wire-rod run's process parameters.
///
/// Every value is finite; the only way to build one is through the validating
/// constructors below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSample {
    values: [f64; N_FEATURES],
}

impl ProcessSample {
    /// Build from values already in model order.
    pub fn from_array(values: [f64; N_FEATURES]) -> Result<Self> {
        for (spec, value) in FEATURES.iter().zip(values.iter()) {
            check_finite(spec.name, *value)?;
        }
        Ok(Self { values })
    }

    /// Build from a slice in model order (e.g. a dataset row).
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let array: [f64; N_FEATURES] =
            values.try_into().map_err(|_| WireRodError::ShapeError {
                expected: format!("{} process parameters", N_FEATURES),
                actual: format!("{} values", values.len()),
            })?;
        Self::from_array(array)
    }

    /// Build from raw textual fields, looked up by name or alias.
    ///
    /// Fails on the first field (in model order) that is missing, empty, or
    /// not a finite number.
    pub fn from_fields<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = [0.0; N_FEATURES];
        for (slot, spec) in values.iter_mut().zip(FEATURES.iter()) {
            let raw = std::iter::once(spec.name)
                .chain(spec.aliases.iter().copied())
                .find_map(|key| lookup(key))
                .ok_or_else(|| WireRodError::invalid_input(spec.name, "missing value"))?;
            *slot = parse_value(spec.name, &raw)?;
        }
        Ok(Self { values })
    }

    /// Build from a form-encoded body.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self> {
        Self::from_fields(|key| form.get(key).cloned())
    }

    /// Build from a JSON object. Numbers and numeric strings are accepted.
    pub fn from_json(body: &serde_json::Value) -> Result<Self> {
        let object = body.as_object().ok_or_else(|| {
            WireRodError::invalid_input("body", "expected a JSON object of process parameters")
        })?;

        let mut values = [0.0; N_FEATURES];
        for (slot, spec) in values.iter_mut().zip(FEATURES.iter()) {
            let value = object
                .iter()
                .find(|(key, _)| spec.accepts(key))
                .map(|(_, v)| v)
                .ok_or_else(|| WireRodError::invalid_input(spec.name, "missing value"))?;

            *slot = match value {
                serde_json::Value::Number(n) => {
                    let v = n
                        .as_f64()
                        .ok_or_else(|| WireRodError::invalid_input(spec.name, "not a number"))?;
                    check_finite(spec.name, v)?
                }
                serde_json::Value::String(s) => parse_value(spec.name, s)?,
                other => {
                    return Err(WireRodError::invalid_input(
                        spec.name,
                        format!("expected a number, got {}", json_kind(other)),
                    ))
                }
            };
        }
        Ok(Self { values })
    }

    pub fn as_array(&self) -> &[f64; N_FEATURES] {
        &self.values
    }

    /// Value of a feature by canonical name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURES
            .iter()
            .position(|f| f.name == name)
            .map(|i| self.values[i])
    }

    /// Names of the parameters that fall outside their documented range
    pub fn out_of_range(&self) -> Vec<&'static str> {
        FEATURES
            .iter()
            .zip(self.values.iter())
            .filter(|(spec, v)| !spec.in_expected_range(**v))
            .map(|(spec, _)| spec.name)
            .collect()
    }
}

impl Serialize for ProcessSample {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(N_FEATURES))?;
        for (spec, value) in FEATURES.iter().zip(self.values.iter()) {
            map.serialize_entry(spec.name, value)?;
        }
        map.end()
    }
}

fn parse_value(field: &str, raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WireRodError::invalid_input(field, "missing value"));
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| WireRodError::invalid_input(field, format!("not a number: '{}'", trimmed)))?;
    check_finite(field, value)
}

fn check_finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(WireRodError::invalid_input(field, format!("not a finite number: {}", value)))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Predicted (or measured) rod properties
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetVector {
    /// Ultimate tensile strength
    pub uts: f64,
    pub elongation: f64,
    pub conductivity: f64,
}

impl TargetVector {
    pub fn new(uts: f64, elongation: f64, conductivity: f64) -> Self {
        Self {
            uts,
            elongation,
            conductivity,
        }
    }

    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [uts, elongation, conductivity] => Ok(Self::new(*uts, *elongation, *conductivity)),
            _ => Err(WireRodError::ShapeError {
                expected: format!("{} target values", N_TARGETS),
                actual: format!("{} values", values.len()),
            }),
        }
    }

    pub fn to_array(&self) -> [f64; N_TARGETS] {
        [self.uts, self.elongation, self.conductivity]
    }

    /// Copy with every value rounded to `decimals` places
    pub fn rounded(&self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        let round = |v: f64| (v * factor).round() / factor;
        Self::new(round(self.uts), round(self.elongation), round(self.conductivity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> [f64; N_FEATURES] {
        [0.5, 650.0, 20.0, 25.0, 350.0, 65.0, 4.5, 1.2, 2.0]
    }

    #[test]
    fn test_schema_default_order() {
        let schema = FeatureSchema::default();
        assert_eq!(schema.n_features(), N_FEATURES);
        assert_eq!(schema.features[1], "casting_temp");
        assert_eq!(schema.targets, vec!["UTS", "elongation", "conductivity"]);
    }

    #[test]
    fn test_schema_mismatch_detected() {
        let schema = FeatureSchema::default();
        let mut swapped = schema.clone();
        swapped.features.swap(0, 1);
        assert!(matches!(
            schema.ensure_matches(&swapped),
            Err(WireRodError::ArtifactMismatch(_))
        ));
        assert!(schema.ensure_matches(&FeatureSchema::default()).is_ok());
    }

    #[test]
    fn test_from_fields_accepts_aliases() {
        let mut form = HashMap::new();
        for (spec, value) in FEATURES.iter().zip(nominal().iter()) {
            let key = spec.aliases.first().copied().unwrap_or(spec.name);
            form.insert(key.to_string(), value.to_string());
        }
        let sample = ProcessSample::from_form(&form).unwrap();
        assert_eq!(sample.as_array(), &nominal());
    }

    #[test]
    fn test_non_numeric_casting_temp_rejected() {
        let mut form: HashMap<String, String> = FEATURES
            .iter()
            .zip(nominal().iter())
            .map(|(spec, v)| (spec.name.to_string(), v.to_string()))
            .collect();
        form.insert("casting_temp".to_string(), "hot".to_string());

        match ProcessSample::from_form(&form) {
            Err(WireRodError::InvalidInput { field, .. }) => assert_eq!(field, "casting_temp"),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut form: HashMap<String, String> = FEATURES
            .iter()
            .zip(nominal().iter())
            .map(|(spec, v)| (spec.name.to_string(), v.to_string()))
            .collect();
        form.remove("quench_water_pressure");

        let err = ProcessSample::from_form(&form).unwrap_err();
        assert!(err.to_string().contains("quench_water_pressure"));
    }

    #[test]
    fn test_from_json_numbers_and_strings() {
        let body = serde_json::json!({
            "chemical_composition": 0.5,
            "casting_temperature": "650",
            "cooling_water_temperature": 20,
            "casting_speed": 25.0,
            "entry_temp_rolling_mill": 350,
            "emulsion_temperature": 65,
            "emulsion_pressure": 4.5,
            "emulsion_concentration": 1.2,
            "quench_water_pressure": 2
        });
        let sample = ProcessSample::from_json(&body).unwrap();
        assert_eq!(sample.as_array(), &nominal());
        assert_eq!(sample.get("casting_temp"), Some(650.0));
    }

    #[test]
    fn test_from_json_rejects_null() {
        let mut body = serde_json::to_value(ProcessSample::from_array(nominal()).unwrap()).unwrap();
        body["casting_temp"] = serde_json::Value::Null;
        let err = ProcessSample::from_json(&body).unwrap_err();
        assert!(matches!(err, WireRodError::InvalidInput { ref field, .. } if field == "casting_temp"));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut values = nominal();
        values[4] = f64::NAN;
        let err = ProcessSample::from_array(values).unwrap_err();
        assert!(err.to_string().contains("entry_temp_rolling_mill"));
    }

    #[test]
    fn test_feature_parse_names_field() {
        let casting_temp = &FEATURES[1];
        assert_eq!(casting_temp.parse(" 650.5 ").unwrap(), 650.5);
        match casting_temp.parse("65o") {
            Err(WireRodError::InvalidInput { field, .. }) => assert_eq!(field, "casting_temp"),
            other => panic!("expected invalid input, got {:?}", other),
        }
        assert!(casting_temp.parse("").is_err());
        assert!(casting_temp.parse("inf").is_err());
    }

    #[test]
    fn test_out_of_range_is_reported_not_enforced() {
        let mut values = nominal();
        values[1] = 750.0;
        let sample = ProcessSample::from_array(values).unwrap();
        assert_eq!(sample.out_of_range(), vec!["casting_temp"]);
    }

    #[test]
    fn test_target_rounding() {
        let t = TargetVector::new(181.23456, 15.005, 60.0);
        let r = t.rounded(2);
        assert_eq!(r.uts, 181.23);
        assert_eq!(r.conductivity, 60.0);
    }
}
