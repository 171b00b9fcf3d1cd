use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys of a recognizer `data` object that describe the object itself rather than a field.
pub const HOUSEKEEPING_KEYS: [&str; 2] = ["rows_count", "enough_data"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub id: String,
    pub series: String,
    pub number: String,
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub issue_date: String,
    pub issuing_authority: String,
}

/// Raw output of one recognizer for one record, as written by the recognizer harness.
///
/// Sections are read field by field: a section of the wrong shape (a string `time`,
/// a non-object `data`) is coerced or dropped on its own. Only a root that is not a
/// JSON object fails to deserialize.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "Value")]
pub struct RecognitionOutput {
    pub data: Option<Map<String, Value>>,
    pub matches: Option<Vec<Value>>,
    pub failure: Option<Value>,
    pub time: Option<f64>,
}

impl TryFrom<Value> for RecognitionOutput {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut root) = value else {
            return Err(format!("expected a JSON object, found {}", kind_of(&value)));
        };

        let data = match root.remove("data") {
            Some(Value::Object(data)) => Some(data),
            _ => None,
        };
        let matches = match root.remove("matches") {
            Some(Value::Array(matches)) => Some(matches),
            _ => None,
        };
        let failure = root.remove("failure").filter(|failure| !failure.is_null());
        let time = root.get("time").and_then(value_as_f64);

        Ok(Self {
            data,
            matches,
            failure,
            time,
        })
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl RecognitionOutput {
    pub fn is_failure(&self) -> bool {
        self.failure.as_ref().is_some_and(is_truthy)
    }

    pub fn matches_count(&self) -> usize {
        self.matches.as_ref().map_or(0, Vec::len)
    }

    /// Extracted fields, without the housekeeping keys.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data
            .iter()
            .flat_map(|data| data.iter())
            .filter(|(key, _)| !HOUSEKEEPING_KEYS.contains(&key.as_str()))
    }

    pub fn stated_rows_count(&self) -> Option<i64> {
        self.data
            .as_ref()
            .and_then(|data| data.get("rows_count"))
            .and_then(value_as_i64)
    }

    /// Recognized `value` of a field, empty when the field or its value is absent.
    pub fn field_value(&self, key: &str) -> String {
        self.data
            .as_ref()
            .and_then(|data| data.get(key))
            .and_then(|field| field.get("value"))
            .map(|value| match value {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ImageSize {
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// Image properties reported by the image inspection tool for a record's source scan.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageMetadata {
    #[serde(default)]
    pub size: Option<ImageSize>,
    #[serde(rename = "Resolution", default)]
    pub resolution: Option<String>,
    #[serde(rename = "JPEG-Quality", default)]
    pub jpeg_quality: Option<Value>,
    #[serde(rename = "Filesize", default)]
    pub filesize: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPresence {
    pub present: usize,
    pub missing: usize,
    pub malformed: usize,
    #[serde(default)]
    pub malformed_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInventory {
    pub source: String,
    pub directory: String,
    pub presence: DocumentPresence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub dataset: String,
    pub ground_truth_path: String,
    pub ground_truth_sha256: String,
    pub record_count: usize,
    #[serde(default)]
    pub duplicate_ids: Vec<String>,
    pub sources: Vec<SourceInventory>,
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|n| n.trunc() as i64)),
        Value::String(text) => leading_integer(text),
        _ => None,
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Integer prefix of a string, ignoring leading whitespace (`"12abc"` is 12).
fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(idx, ch)| !(ch.is_ascii_digit() || (*idx == 0 && (*ch == '-' || *ch == '+'))))
        .map_or(trimmed.len(), |(idx, _)| idx);
    trimmed[..end].parse::<i64>().ok()
}
