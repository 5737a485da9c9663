//! Button-purpose classification and frame-host filtering tables.
//!
//! Every button the engine considers is matched against one of these intents,
//! so the "what is this button for" question stays exhaustive and extensible.

/// What a button is for, as far as the overlay engine is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonIntent {
    /// "Manage options", "Cookie settings", "Privacy settings"
    ManageSettings,
    /// "Our partners", "Vendors", "View all", "IAB vendors"
    PartnerList,
    /// "Legitimate interest"
    LegitimateInterest,
    /// "Load more", "Show more"
    LoadMore,
    /// Back/close controls that return to the main consent view
    CloseReturn,
    /// Generic accept/dismiss texts used by the close-button heuristics
    GenericAccept,
}

const MANAGE_SETTINGS: &[&str] = &[
    "manage options",
    "manage settings",
    "manage preferences",
    "manage cookies",
    "cookie settings",
    "cookies settings",
    "privacy settings",
    "privacy options",
    "more options",
    "customize",
    "customise",
    "personalize",
    "settings",
    "options",
    "preferences",
];

const PARTNER_LIST: &[&str] = &[
    "partners",
    "our partners",
    "vendors",
    "vendor list",
    "iab vendors",
    "view all",
    "see all",
    "list of partners",
    "third parties",
    "third-party",
];

const LEGITIMATE_INTEREST: &[&str] = &["legitimate interest", "legitimate interests"];

const LOAD_MORE: &[&str] = &["load more", "show more", "view more", "see more"];

/// Ranked by priority: the close protocol tries these in order
const CLOSE_RETURN: &[&str] = &[
    "back to consent",
    "go back",
    "←",
    "back",
    "return",
    "close",
    "×",
    "✕",
    "x",
    "dismiss",
    "save preferences",
    "save settings",
    "save & exit",
    "save and exit",
    "confirm choices",
    "confirm my choices",
    "done",
    "ok",
    "okay",
    "continue",
    "got it",
];

const GENERIC_ACCEPT: &[&str] = &[
    "accept all",
    "accept cookies",
    "accept",
    "allow all",
    "allow",
    "i agree",
    "agree",
    "got it",
    "ok",
    "okay",
    "i understand",
    "continue",
    "close",
    "dismiss",
    "no thanks",
    "reject all",
];

/// CSS fallbacks for the generic close heuristics, tried after text matching
pub const GENERIC_CLOSE_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "button[id*='accept']",
    "button[class*='accept']",
    "button[class*='agree']",
    "[aria-label*='close' i]",
    "[aria-label*='accept' i]",
    "[aria-label*='dismiss' i]",
    "[class*='cookie'] button",
    "[id*='cookie'] button",
    "[class*='consent'] button",
    ".cc-dismiss",
    ".cc-allow",
];

/// Hostname fragments identifying consent-manager frames
const CONSENT_HOST_KEYWORDS: &[&str] = &[
    "consent",
    "cmp",
    "cookie",
    "onetrust",
    "cookielaw",
    "cookiebot",
    "didomi",
    "quantcast",
    "sourcepoint",
    "sp-prod",
    "trustarc",
    "truste",
    "usercentrics",
    "privacy-mgmt",
    "privacymanager",
    "consensu",
    "iubenda",
    "osano",
];

/// Hostname fragments identifying ad-tech sync pixels, which also carry
/// consent-ish tokens in their URLs but never render dismissable UI
const SYNC_PIXEL_EXCLUSIONS: &[&str] = &[
    "doubleclick",
    "adnxs",
    "pubmatic",
    "casalemedia",
    "rubiconproject",
    "criteo",
    "adsrvr",
    "adsystem",
    "bidswitch",
    "demdex",
    "everesttech",
    "mathtag",
    "pixel",
];

impl ButtonIntent {
    /// Pattern set for this intent. `CloseReturn` patterns are ranked:
    /// earlier entries are tried first by the close/return protocol.
    pub fn patterns(&self) -> &'static [&'static str] {
        match self {
            ButtonIntent::ManageSettings => MANAGE_SETTINGS,
            ButtonIntent::PartnerList => PARTNER_LIST,
            ButtonIntent::LegitimateInterest => LEGITIMATE_INTEREST,
            ButtonIntent::LoadMore => LOAD_MORE,
            ButtonIntent::CloseReturn => CLOSE_RETURN,
            ButtonIntent::GenericAccept => GENERIC_ACCEPT,
        }
    }

    /// Whether a button text carries this intent
    pub fn matches(&self, text: &str) -> bool {
        let normalized = normalize(text);
        self.patterns()
            .iter()
            .any(|p| pattern_matches(p, &normalized))
    }

    /// First pattern of this intent that the text matches, by rank
    pub fn match_rank(&self, text: &str) -> Option<usize> {
        let normalized = normalize(text);
        self.patterns()
            .iter()
            .position(|p| pattern_matches(p, &normalized))
    }
}

/// Lowercase, trim, collapse runs of whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether a button text matches one specific pattern
pub fn matches_pattern(pattern: &str, text: &str) -> bool {
    pattern_matches(pattern, &normalize(text))
}

/// Short tokens must match exactly; longer phrases also match as substrings.
/// The exact rule keeps one-character close glyphs ("×", "x") from matching
/// inside unrelated labels.
fn pattern_matches(pattern: &str, normalized_text: &str) -> bool {
    if normalized_text == pattern {
        return true;
    }
    pattern.len() >= 6 && normalized_text.contains(pattern)
}

/// Hostname of a URL, without scheme, userinfo, port, path, or query.
/// Hostname-only matching avoids false positives from query strings
/// like `?gdpr=1`.
pub fn hostname_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let rest = rest.rsplit_once('@').map(|(_, r)| r).unwrap_or(rest);
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("");

    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// Whether a frame hostname looks like a consent-manager frame worth
/// searching: matches a CMP keyword and no sync-pixel exclusion
pub fn is_consent_host(hostname: &str) -> bool {
    let host = hostname.to_lowercase();
    if SYNC_PIXEL_EXCLUSIONS.iter().any(|f| host.contains(f)) {
        return false;
    }
    CONSENT_HOST_KEYWORDS.iter().any(|f| host.contains(f))
}
