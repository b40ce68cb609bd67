use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::constants::catalog::{FIELD_ANSWER, FIELD_OPTIONS, FIELD_QUESTION, FIELD_VIDEO_URL};

pub use crate::types::{CategoryName, DatasetName, Position, Rank};

/// Composite identity of one catalog sample.
///
/// `position` is the sample's index in its dataset's catalog sequence at read
/// time. It is never a field stored on the sample itself.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleRef {
    /// Dataset the sample belongs to.
    #[serde(alias = "original_dataset")]
    pub dataset: DatasetName,
    /// 0-based index within the dataset.
    #[serde(rename = "sample_index", alias = "original_index")]
    pub position: Position,
}

impl SampleRef {
    /// Create a reference to `position` within `dataset`.
    pub fn new(dataset: impl Into<DatasetName>, position: Position) -> Self {
        Self {
            dataset: dataset.into(),
            position,
        }
    }
}

impl fmt::Display for SampleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.dataset, self.position)
    }
}

/// Records that belong to exactly one sample.
pub trait Anchored {
    /// The sample this record was made against.
    fn sample(&self) -> &SampleRef;
}

/// One catalog sample.
///
/// Only `question`, `options`, `answer` and `video_url` are read by the
/// annotator; every other field is carried through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleRecord(pub Map<String, Value>);

impl SampleRecord {
    /// Raw field value, or an empty string when absent.
    pub fn field(&self, name: &str) -> Value {
        self.0
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    /// Field rendered as text. Strings are returned verbatim, `null` and
    /// missing fields as `""`, anything else as compact JSON.
    pub fn text(&self, name: &str) -> String {
        match self.0.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Video URL with surrounding whitespace removed.
    pub fn video_url(&self) -> String {
        self.text(FIELD_VIDEO_URL).trim().to_string()
    }

    /// Copy of this sample with its `video_url` trimmed (if it is a string).
    pub fn normalized(&self) -> Self {
        let mut fields = self.0.clone();
        if let Some(Value::String(url)) = fields.get_mut(FIELD_VIDEO_URL) {
            *url = url.trim().to_string();
        }
        Self(fields)
    }

    /// Snapshot of the fields copied into a selection record.
    pub fn snapshot(&self) -> SampleSnapshot {
        SampleSnapshot {
            video_url: self.video_url(),
            question: self.field(FIELD_QUESTION),
            options: self.field(FIELD_OPTIONS),
            answer: self.field(FIELD_ANSWER),
        }
    }
}

impl From<Value> for SampleRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }
}

/// Source fields denormalized into a selection record when it is created.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSnapshot {
    /// Trimmed video URL of the sample.
    pub video_url: String,
    /// Question as stored in the catalog.
    pub question: Value,
    /// Answer options as stored in the catalog.
    pub options: Value,
    /// Reference answer as stored in the catalog.
    pub answer: Value,
}

/// Editable content of a repurposed VQA item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepurposedFields {
    /// Rewritten question.
    #[serde(rename = "new_question")]
    pub question: String,
    /// Rewritten answer options.
    #[serde(rename = "new_options")]
    pub options: String,
    /// Rewritten reference answer.
    #[serde(rename = "new_answer")]
    pub answer: String,
}

impl RepurposedFields {
    /// Bundle the three editable fields.
    pub fn new(
        question: impl Into<String>,
        options: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            options: options.into(),
            answer: answer.into(),
        }
    }
}

/// A question/answer variant derived from one sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepurposedItem {
    /// Sample the item was derived from.
    #[serde(flatten)]
    pub sample: SampleRef,
    /// Video URL of the source sample when the item was created.
    pub video_url: String,
    /// Question, options and answer of the item.
    #[serde(flatten)]
    pub fields: RepurposedFields,
}

impl Anchored for RepurposedItem {
    fn sample(&self) -> &SampleRef {
        &self.sample
    }
}

/// Marker that a sample was selected, with a snapshot of its source fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionRecord {
    /// Selected sample.
    #[serde(flatten)]
    pub sample: SampleRef,
    /// Source fields copied at selection time.
    #[serde(flatten)]
    pub snapshot: SampleSnapshot,
}

impl Anchored for SelectionRecord {
    fn sample(&self) -> &SampleRef {
        &self.sample
    }
}

/// Free-text caption attached to a sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionItem {
    /// Captioned sample.
    #[serde(flatten)]
    pub sample: SampleRef,
    /// Video URL of the source sample when the caption was added.
    pub video_url: String,
    /// Caption text.
    pub caption: String,
}

impl Anchored for CaptionItem {
    fn sample(&self) -> &SampleRef {
        &self.sample
    }
}

/// A catalog sample paired with its position, as returned by listing views.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionedSample {
    /// Position within the dataset.
    pub position: Position,
    /// Sample with its video URL trimmed.
    pub sample: SampleRecord,
}

/// A flagged sample joined with the catalog.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorSampleView {
    /// Position within the dataset.
    pub position: Position,
    /// Whether the sample has at least one repurposed item.
    pub has_repurposed: bool,
    /// Sample with its video URL trimmed.
    pub sample: SampleRecord,
}

/// A sample that has repurposed items, joined with those items.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RepurposedSampleView {
    /// Position within the dataset.
    pub position: Position,
    /// Sample with its video URL trimmed.
    pub sample: SampleRecord,
    /// Repurposed items of the sample, in rank order.
    pub items: Vec<RepurposedItem>,
}

/// Summary of one dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetInfo {
    /// Dataset name.
    pub name: DatasetName,
    /// Number of samples in the dataset.
    pub total_samples: usize,
    /// Every sample, with video URLs trimmed.
    pub samples: Vec<SampleRecord>,
}

/// Everything recorded against one sample, across all stores.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleAnnotations {
    /// The sample described.
    pub sample: SampleRef,
    /// Categories the sample is flagged under, in declaration order.
    pub error_categories: Vec<CategoryName>,
    /// Whether any repurposed item exists.
    pub has_repurposed: bool,
    /// Repurposed items in rank order.
    pub repurposed: Vec<RepurposedItem>,
    /// Whether the sample is selected.
    pub is_selected: bool,
    /// Captions in rank order.
    pub captions: Vec<CaptionItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repurposed_item_accepts_legacy_field_names() {
        let raw = json!({
            "original_dataset": "d1",
            "original_index": 3,
            "video_url": "u",
            "new_question": "Q?",
            "new_options": "A/B",
            "new_answer": "A"
        });
        let item: RepurposedItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.sample, SampleRef::new("d1", 3));
        assert_eq!(item.fields, RepurposedFields::new("Q?", "A/B", "A"));

        let written = serde_json::to_value(&item).unwrap();
        assert_eq!(written["dataset"], "d1");
        assert_eq!(written["sample_index"], 3);
        assert_eq!(written["new_answer"], "A");
    }

    #[test]
    fn sample_record_text_handles_missing_and_structured_fields() {
        let record = SampleRecord::from(json!({
            "question": "What happens?",
            "options": ["A. up", "B. down"],
            "video_url": "  https://example.com/v.mp4 \n",
            "meta_data": {"dim": "direction"}
        }));
        assert_eq!(record.text("question"), "What happens?");
        assert_eq!(record.text("answer"), "");
        assert_eq!(record.text("options"), r#"["A. up","B. down"]"#);
        assert_eq!(record.video_url(), "https://example.com/v.mp4");

        let normalized = record.normalized();
        assert_eq!(normalized.0["video_url"], "https://example.com/v.mp4");
        assert_eq!(normalized.0["meta_data"], json!({"dim": "direction"}));
    }

    #[test]
    fn snapshot_keeps_structured_options() {
        let record = SampleRecord::from(json!({
            "question": "Q",
            "options": ["x", "y"],
            "answer": "x",
            "video_url": "u"
        }));
        let snapshot = record.snapshot();
        assert_eq!(snapshot.options, json!(["x", "y"]));
        assert_eq!(snapshot.video_url, "u");
    }

    #[test]
    fn sample_ref_orders_by_dataset_then_position() {
        let mut refs = vec![
            SampleRef::new("b", 0),
            SampleRef::new("a", 5),
            SampleRef::new("a", 1),
        ];
        refs.sort();
        assert_eq!(refs[0], SampleRef::new("a", 1));
        assert_eq!(refs[2].to_string(), "b[0]");
    }
}
