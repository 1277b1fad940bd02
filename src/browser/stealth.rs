//! Anti-detection helpers shared by the browsing engines
//!
//! Each session picks a desktop user agent and viewport at random, and
//! Chromium sessions hide the most common automation markers.

use rand::seq::SliceRandom;
use rand::Rng;

/// Desktop user agents rotated across sessions
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Common desktop viewport sizes
const VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1536, 864), (1440, 900), (1366, 768)];

/// Command-line switches passed to Chromium at launch
pub const CHROMIUM_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-infobars",
];

/// Script evaluated before any page script in Chromium sessions;
/// `__LANGUAGES__` is replaced with the session's language list
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => __LANGUAGES__ });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
window.chrome = window.chrome || { runtime: {} };
"#;

/// Language preferences a session advertises, derived from the crawl locale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePrefs {
    language: String,
    tag: String,
}

impl LanguagePrefs {
    /// Builds preferences for `language` as spoken in `country`, e.g. `sv` + `se` gives `sv-SE`
    pub fn new(language: &str, country: &str) -> Self {
        let language = language.trim().to_ascii_lowercase();
        let tag = format!("{}-{}", language, country.trim().to_ascii_uppercase());
        Self { language, tag }
    }

    /// Primary language tag, e.g. `sv-SE`
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `Accept-Language` header value
    pub fn accept_language(&self) -> String {
        format!("{},{};q=0.9", self.tag, self.language)
    }

    /// Chromium `--lang` switch
    pub fn lang_arg(&self) -> String {
        format!("--lang={},{}", self.tag, self.language)
    }

    /// Anti-detection script reporting these languages through `navigator.languages`
    pub fn stealth_script(&self) -> String {
        let languages = serde_json::json!([self.tag, self.language]).to_string();
        STEALTH_SCRIPT.replace("__LANGUAGES__", &languages)
    }
}

impl Default for LanguagePrefs {
    fn default() -> Self {
        Self::new("en", "us")
    }
}

/// Picks a user agent for a new session
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Picks a viewport for a new session, with a little per-session noise
pub fn random_viewport() -> (u32, u32) {
    let mut rng = rand::thread_rng();
    let (width, height) = VIEWPORTS.choose(&mut rng).copied().unwrap_or(VIEWPORTS[0]);
    (width - rng.gen_range(0..32), height - rng.gen_range(0..32))
}
