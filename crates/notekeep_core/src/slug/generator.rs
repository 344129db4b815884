//! Title-to-slug normalization.
//!
//! # Responsibility
//! - Normalize text into `[a-z0-9-]` fragments within configured bounds.
//! - Provide a random fallback for inputs with no usable characters.
//!
//! # Invariants
//! - Output is non-empty, matches `^[a-z0-9-]+$`, and its length lies in
//!   `[min_len, max_len]`.
//! - Output is deterministic except for the empty-input fallback.

use crate::config::SlugRules;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

const FALLBACK_PREFIX: &str = "note";
const RANDOM_HEX_LEN: usize = 32;
/// Smallest `max_len` that keeps every random fallback at full length.
pub const MIN_SLUG_MAX_LEN: usize = FALLBACK_PREFIX.len() + 1 + RANDOM_HEX_LEN;
/// Pad character for slugs shorter than `min_len`.
const PAD_CHAR: char = '0';

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static DISALLOWED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\-]").expect("valid disallowed-char regex"));
static HYPHEN_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid hyphen regex"));
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid slug regex"));

/// Returns whether `value` is a non-empty slug in the allowed charset.
pub fn is_valid_slug(value: &str) -> bool {
    SLUG_RE.is_match(value)
}

/// `RANDOM_HEX_LEN` lowercase hex characters from a fresh v4 UUID.
pub fn random_hex() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Slug generator bound to a set of length rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlugGenerator {
    rules: SlugRules,
}

impl SlugGenerator {
    /// `rules` are expected to have passed `CoreConfig::validate()`.
    pub fn new(rules: SlugRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> SlugRules {
        self.rules
    }

    /// Generates a slug fragment for `text`.
    ///
    /// Inputs that normalize to nothing get `note-<random hex>`, so two calls
    /// with the same degenerate input return different values.
    pub fn generate(&self, text: &str) -> String {
        let normalized = normalize(text);
        let slug = if normalized.is_empty() {
            format!("{FALLBACK_PREFIX}-{}", random_hex())
        } else {
            normalized
        };
        self.fit_length(slug)
    }

    /// Joins `base` and `suffix` with a hyphen, shortening `base` so the
    /// result still fits `max_len`.
    pub fn with_suffix(&self, base: &str, suffix: &str) -> String {
        let room = self.rules.max_len.saturating_sub(suffix.len() + 1);
        let head = base
            .get(..room.min(base.len()))
            .unwrap_or_default()
            .trim_end_matches('-');
        let joined = if head.is_empty() {
            suffix.to_string()
        } else {
            format!("{head}-{suffix}")
        };
        self.fit_length(joined)
    }

    fn fit_length(&self, mut slug: String) -> String {
        if slug.len() > self.rules.max_len {
            // Slugs are ASCII at this point, so byte truncation is char-safe.
            slug.truncate(self.rules.max_len);
            let trimmed_len = slug.trim_end_matches('-').len();
            slug.truncate(trimmed_len);
        }
        while slug.len() < self.rules.min_len {
            slug.push(PAD_CHAR);
        }
        slug
    }
}

/// Lowercases, hyphenates whitespace, strips disallowed characters, collapses
/// hyphen runs and trims edge hyphens. May return an empty string.
pub(crate) fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let hyphenated = WHITESPACE_RE.replace_all(&lowered, "-");
    let stripped = DISALLOWED_RE.replace_all(&hyphenated, "");
    let collapsed = HYPHEN_RUN_RE.replace_all(&stripped, "-");
    collapsed.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::{is_valid_slug, normalize, random_hex, SlugGenerator, MIN_SLUG_MAX_LEN};
    use crate::config::SlugRules;

    const SAMPLES: &[&str] = &[
        "Hello World",
        "  Rust -- is   FUN!! ",
        "",
        "!!!",
        "   ",
        "a",
        "Ünïcödé Straße",
        "日本語のタイトル",
        "---leading and trailing---",
        "tab\tseparated\nlines",
        "x",
        "already-a-slug-123",
    ];

    fn generator() -> SlugGenerator {
        SlugGenerator::new(SlugRules::default())
    }

    #[test]
    fn normalize_applies_every_rule() {
        assert_eq!(normalize("Hello World"), "hello-world");
        assert_eq!(normalize("  Rust -- is   FUN!! "), "rust-is-fun");
        assert_eq!(normalize("tab\tseparated\nlines"), "tab-separated-lines");
        assert_eq!(normalize("Ünïcödé Straße"), "ncd-strae");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn generate_always_matches_charset_and_bounds() {
        let long = "word ".repeat(40);
        let rule_sets = [
            SlugRules::default(),
            SlugRules {
                min_len: 1,
                max_len: 8,
            },
            SlugRules {
                min_len: 10,
                max_len: 12,
            },
        ];

        for rules in rule_sets {
            let generator = SlugGenerator::new(rules);
            for input in SAMPLES.iter().copied().chain([long.as_str()]) {
                let slug = generator.generate(input);
                assert!(is_valid_slug(&slug), "invalid slug `{slug}` for `{input}`");
                assert!(
                    (rules.min_len..=rules.max_len).contains(&slug.len()),
                    "slug `{slug}` out of bounds for {rules:?}"
                );
                assert!(!slug.ends_with('-'), "slug `{slug}` ends with a hyphen");
            }
        }
    }

    #[test]
    fn degenerate_inputs_fall_back_to_random_values() {
        let generator = generator();
        for input in ["", "!!!", "   "] {
            let first = generator.generate(input);
            let second = generator.generate(input);
            assert!(first.starts_with("note-"));
            assert_ne!(first, second);
        }
    }

    #[test]
    fn short_slugs_are_padded_without_hyphens() {
        assert_eq!(generator().generate("a"), "a00");
        assert_eq!(generator().generate("Go"), "go0");
    }

    #[test]
    fn long_slugs_are_truncated_without_trailing_hyphen() {
        let generator = SlugGenerator::new(SlugRules {
            min_len: 3,
            max_len: 6,
        });
        assert_eq!(generator.generate("hello world"), "hello");
    }

    #[test]
    fn with_suffix_keeps_result_within_max_len() {
        let generator = SlugGenerator::new(SlugRules {
            min_len: 3,
            max_len: 10,
        });
        assert_eq!(generator.with_suffix("hello", "1"), "hello-1");
        assert_eq!(generator.with_suffix("hello-world", "12"), "hello-w-12");
        assert_eq!(generator.with_suffix("abc", "0123456789abcdef"), "0123456789");
    }

    #[test]
    fn smallest_allowed_max_len_keeps_random_fallbacks_whole() {
        let generator = SlugGenerator::new(SlugRules {
            min_len: 1,
            max_len: MIN_SLUG_MAX_LEN,
        });
        let hex = random_hex();

        let suffixed = generator.with_suffix("some-long-base-title", &hex);
        assert!(suffixed.ends_with(&hex), "suffix cut in `{suffixed}`");
        assert!(suffixed.len() <= MIN_SLUG_MAX_LEN);

        let fallback = generator.generate("!!!");
        assert_eq!(fallback.len(), MIN_SLUG_MAX_LEN);
        assert!(fallback.starts_with("note-"));
    }
}
