use serde::{Deserialize, Serialize};

/// Category of blocking UI the classifier can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayType {
    CookieConsent,
    SignIn,
    Newsletter,
    Paywall,
    AgeVerification,
    Other,
}

impl OverlayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayType::CookieConsent => "cookie-consent",
            OverlayType::SignIn => "sign-in",
            OverlayType::Newsletter => "newsletter",
            OverlayType::Paywall => "paywall",
            OverlayType::AgeVerification => "age-verification",
            OverlayType::Other => "other",
        }
    }
}

/// Classifier self-reported certainty
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// One detection verdict, produced per pipeline iteration and consumed immediately
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub found: bool,
    #[serde(default)]
    pub overlay_type: Option<OverlayType>,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    pub confidence: Confidence,
    #[serde(default)]
    pub reason: String,
}

impl Detection {
    /// The "nothing detected" verdict, also used when the classifier call fails
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self {
            found: false,
            overlay_type: None,
            button_text: None,
            selector: None,
            confidence: Confidence::Low,
            reason: reason.into(),
        }
    }
}

/// Answer from the navigation-help call: which single button returns to the
/// main consent view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationHint {
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    pub confidence: Confidence,
    #[serde(default)]
    pub reason: String,
}
