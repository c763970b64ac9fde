//! External analysis contract
//!
//! Serde model of the result produced by the document-analysis collaborator.
//! The wire schema is the richer boxed form; `box_2d`/`page` are optional on
//! findings and absent fields mean "not locatable on the document".

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::geometry::NormalizedBox;

/// 1-based page index, matching the contract's `page` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageIndex(pub usize);

impl Default for PageIndex {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target language for the spoken explanation, with the voice each maps to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
    Hindi,
    Arabic,
    Mandarin,
}

impl Language {
    /// Display label in the language itself.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Spanish => "Español",
            Self::French => "Français",
            Self::Hindi => "हिंदी",
            Self::Arabic => "العربية",
            Self::Mandarin => "普通话",
        }
    }

    /// Prebuilt voice name for the speech collaborator.
    #[must_use]
    pub fn voice_name(self) -> &'static str {
        match self {
            Self::English | Self::Mandarin => "Puck",
            Self::Spanish => "Kore",
            Self::French => "Charon",
            Self::Hindi => "Fenrir",
            Self::Arabic => "Zephyr",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(Self::English),
            "spanish" | "es" => Ok(Self::Spanish),
            "french" | "fr" => Ok(Self::French),
            "hindi" | "hi" => Ok(Self::Hindi),
            "arabic" | "ar" => Ok(Self::Arabic),
            "mandarin" | "zh" => Ok(Self::Mandarin),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

/// How urgently the letter needs a response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

// Unknown urgency strings degrade to Medium rather than failing the parse.
impl<'de> Deserialize<'de> for Urgency {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(de)?;
        Ok(match raw.as_str() {
            "Low" => Self::Low,
            "High" => Self::High,
            "Critical" => Self::Critical,
            _ => Self::Medium,
        })
    }
}

/// Category of a persistent field marker on the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationCategory {
    Signature,
    Date,
    #[default]
    Input,
    Warning,
}

// The category mapping must be total: an unknown string from the analysis
// collaborator falls back to the Input treatment instead of failing.
fn category_or_input<'de, D>(de: D) -> Result<AnnotationCategory, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    Ok(match raw.to_ascii_lowercase().as_str() {
        "signature" => AnnotationCategory::Signature,
        "date" => AnnotationCategory::Date,
        "warning" => AnnotationCategory::Warning,
        _ => AnnotationCategory::Input,
    })
}

/// Persistent field marker placed over the document.
#[derive(Clone, Debug, Deserialize)]
pub struct Annotation {
    pub label: String,
    #[serde(rename = "type", deserialize_with = "category_or_input", default)]
    pub category: AnnotationCategory,
    pub box_2d: [f32; 4],
    #[serde(default)]
    pub page: PageIndex,
}

impl Annotation {
    /// Validated bounds. `None` when the reported coordinates are malformed;
    /// such an annotation is skipped at render time rather than erroring.
    #[must_use]
    pub fn bounds(&self) -> Option<NormalizedBox> {
        NormalizedBox::from_array(self.box_2d)
    }
}

/// Something the user must do, per the analysis.
#[derive(Clone, Debug, Deserialize)]
pub struct ActionItem {
    pub what: String,
    #[serde(default)]
    pub when: Option<String>,
    pub how: String,
    #[serde(default)]
    pub box_2d: Option<[f32; 4]>,
    #[serde(default)]
    pub page: Option<PageIndex>,
}

/// A hazard the analysis spotted in the letter.
#[derive(Clone, Debug, Deserialize)]
pub struct Risk {
    pub description: String,
    #[serde(default)]
    pub box_2d: Option<[f32; 4]>,
    #[serde(default)]
    pub page: Option<PageIndex>,
}

/// A right the recipient holds against the sender.
#[derive(Clone, Debug, Deserialize)]
pub struct Right {
    pub description: String,
    #[serde(default)]
    pub box_2d: Option<[f32; 4]>,
    #[serde(default)]
    pub page: Option<PageIndex>,
}

/// Viewer-side generalization of a risk, a right, or an action item.
///
/// A finding without validated bounds is not locatable on the document and
/// never produces a highlight.
#[derive(Clone, Debug, PartialEq)]
pub struct Finding {
    pub text: String,
    pub bounds: Option<NormalizedBox>,
    pub page: Option<PageIndex>,
}

impl Finding {
    fn from_parts(text: &str, box_2d: Option<[f32; 4]>, page: Option<PageIndex>) -> Self {
        // Malformed coordinates degrade to "not locatable" here, once, so
        // everything downstream only sees validated boxes.
        let bounds = box_2d.and_then(NormalizedBox::from_array);
        Self {
            text: text.to_string(),
            bounds,
            page,
        }
    }

    #[must_use]
    pub fn locatable(&self) -> bool {
        self.bounds.is_some()
    }
}

impl From<&ActionItem> for Finding {
    fn from(item: &ActionItem) -> Self {
        Self::from_parts(&item.what, item.box_2d, item.page)
    }
}

impl From<&Risk> for Finding {
    fn from(risk: &Risk) -> Self {
        Self::from_parts(&risk.description, risk.box_2d, risk.page)
    }
}

impl From<&Right> for Finding {
    fn from(right: &Right) -> Self {
        Self::from_parts(&right.description, right.box_2d, right.page)
    }
}

/// Full result of the external document analysis.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub sender: String,
    pub summary: String,
    pub urgency: Urgency,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub rights: Vec<Right>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    pub translated_speech_text: String,
}

impl AnalysisResult {
    /// Parse the collaborator's JSON payload.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// All risks, rights and action items as uniform findings, in the order
    /// the result view lists them.
    #[must_use]
    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = Vec::with_capacity(
            self.risks.len() + self.rights.len() + self.action_items.len(),
        );
        findings.extend(self.risks.iter().map(Finding::from));
        findings.extend(self.rights.iter().map(Finding::from));
        findings.extend(self.action_items.iter().map(Finding::from));
        findings
    }

    /// Annotations that belong to the given page.
    pub fn annotations_for_page(&self, page: PageIndex) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.page == page)
    }
}
