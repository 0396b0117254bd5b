//! Client-side form validation.
//!
//! Everything here is pure. A field is valid exactly when its name is absent
//! from the returned [`ValidationErrors`].

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| panic!("email pattern: {e}"))
});

const MIN_PHONE_DIGITS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Present and non-blank after trimming.
    RequiredText,
    /// Required; must coerce to an integer >= 0.
    Count,
    /// Optional; `local@domain.tld` shaped when given.
    Email,
    /// Optional; at least seven digits when given.
    Phone,
    /// Optional; finite number in [-90, 90] when given.
    Latitude,
    /// Optional; finite number in [-180, 180] when given.
    Longitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub rule: FieldRule,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, label: &'static str, rule: FieldRule) -> Self {
        Self { name, label, rule }
    }

    /// Validate one raw value. `None` means the field was never filled in.
    pub fn check(&self, raw: Option<&str>) -> Option<String> {
        let label = self.label;
        match self.rule {
            FieldRule::RequiredText => {
                is_blank(raw).then(|| format!("{label} is required."))
            }
            FieldRule::Count => match raw {
                None | Some("") => Some(format!("{label} is required.")),
                Some(value) => (!is_non_negative_integer(coerce_number(value)))
                    .then(|| format!("{label} must be a non-negative integer.")),
            },
            FieldRule::Email => raw
                .filter(|v| !v.trim().is_empty())
                .filter(|v| !EMAIL_RE.is_match(v))
                .map(|_| "Enter a valid email address.".to_string()),
            FieldRule::Phone => raw
                .filter(|v| !v.trim().is_empty())
                .filter(|v| v.chars().filter(char::is_ascii_digit).count() < MIN_PHONE_DIGITS)
                .map(|_| "Enter a valid phone number.".to_string()),
            FieldRule::Latitude => check_range(label, raw, -90.0, 90.0),
            FieldRule::Longitude => check_range(label, raw, -180.0, 180.0),
        }
    }
}

fn is_blank(raw: Option<&str>) -> bool {
    raw.is_none_or(|v| v.trim().is_empty())
}

fn check_range(label: &str, raw: Option<&str>, min: f64, max: f64) -> Option<String> {
    if is_blank(raw) {
        return None;
    }
    let n = coerce_number(raw.unwrap_or_default());
    (!(n.is_finite() && (min..=max).contains(&n)))
        .then(|| format!("{label} must be a number between {min} and {max}."))
}

/// Coerce form text to a number the way a browser's `Number()` does for the
/// decimal inputs these forms accept: blank is 0, garbage is NaN.
pub fn coerce_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Largest integer a JSON number carries exactly (2^53 - 1).
const MAX_EXACT_COUNT: f64 = 9_007_199_254_740_991.0;

#[allow(clippy::float_cmp)]
fn is_non_negative_integer(n: f64) -> bool {
    n.is_finite() && n.trunc() == n && (0.0..=MAX_EXACT_COUNT).contains(&n)
}

/// Raw form input keyed by field name. A missing key is an unset field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues(BTreeMap<String, String>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Field name to message, for invalid fields only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    fields: Vec<FieldDescriptor>,
}

impl FormSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// The create/update charging-station form.
    pub fn station() -> Self {
        use FieldRule::{Count, Email, Latitude, Longitude, Phone, RequiredText};
        Self::new(vec![
            FieldDescriptor::new("stationName", "Station name", RequiredText),
            FieldDescriptor::new("type", "Type", RequiredText),
            FieldDescriptor::new("address", "Address", RequiredText),
            FieldDescriptor::new("city", "City", RequiredText),
            FieldDescriptor::new("stateProvince", "State/Province", RequiredText),
            FieldDescriptor::new("totalSlots", "Total slots", Count),
            FieldDescriptor::new("contactEmail", "Contact email", Email),
            FieldDescriptor::new("contactPhone", "Contact phone", Phone),
            FieldDescriptor::new("latitude", "Latitude", Latitude),
            FieldDescriptor::new("longitude", "Longitude", Longitude),
        ])
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Per-field check, as run when a field loses focus. Unknown fields are
    /// always valid.
    pub fn validate_field(&self, name: &str, raw: Option<&str>) -> Option<String> {
        self.field(name)?.check(raw)
    }

    /// Run every rule and collect all failures.
    pub fn validate_form(&self, values: &FormValues) -> ValidationErrors {
        ValidationErrors(
            self.fields
                .iter()
                .filter_map(|f| f.check(values.get(f.name)).map(|m| (f.name.to_string(), m)))
                .collect(),
        )
    }

    /// Validate, then build the typed JSON body the backend expects.
    ///
    /// Text fields pass through untouched (unset becomes `""`), counts become
    /// integers, and coordinates become numbers or `null` when blank. Fields
    /// outside the schema are dropped.
    pub fn to_payload(&self, values: &FormValues) -> Result<Value, ValidationErrors> {
        let errors = self.validate_form(values);
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut body = Map::new();
        for field in &self.fields {
            let raw = values.get(field.name);
            let value = match field.rule {
                FieldRule::RequiredText | FieldRule::Email | FieldRule::Phone => {
                    Value::String(raw.unwrap_or_default().to_string())
                }
                FieldRule::Count => {
                    // Validated above: integral and within [0, 2^53 - 1], so the cast is exact.
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let n = coerce_number(raw.unwrap_or_default()) as u64;
                    Value::from(n)
                }
                FieldRule::Latitude | FieldRule::Longitude => {
                    if is_blank(raw) {
                        Value::Null
                    } else {
                        Number::from_f64(coerce_number(raw.unwrap_or_default()))
                            .map_or(Value::Null, Value::Number)
                    }
                }
            };
            body.insert(field.name.to_string(), value);
        }
        Ok(Value::Object(body))
    }
}
