//! Fitness topic classifier.
//!
//! Layered keyword matching, first match wins:
//!
//! 1. **Phrase**: multi-word terms ("bench press", "calorie deficit"),
//!    whitespace-tolerant, with an optional trailing `s` / `es` / `ing`.
//! 2. **Token**: single words checked against a vocabulary, directly or
//!    after stripping a trailing `ing` / `es` / `s`.
//! 3. **Deferred**: nothing matched. The decision carries the canned
//!    redirect reply; escalating to a smarter judgment is the caller's call.
//!
//! Words that are only fitness terms inside a compound ("press", "row",
//! "rest", "back", "form", "core", "machine") appear in phrases only, so
//! "press release" is not in scope.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Reply for queries outside the fitness domain.
pub const OUT_OF_SCOPE_REPLY: &str = "I'm FitBot, specialized in fitness and gym topics. I can help with workouts, nutrition, exercise form, supplements, and health-related questions. What fitness topic would you like to know about?";

/// Suffixes tolerated after a phrase or stripped from a token, longest first.
const SUFFIXES: [&str; 3] = ["ing", "es", "s"];

/// Ordered: longer phrases precede the shorter phrases they contain.
pub const DEFAULT_PHRASES: &[&str] = &[
    "high intensity interval training",
    "resting heart rate",
    "time under tension",
    "one rep max",
    "progressive overload",
    "bench press",
    "overhead press",
    "shoulder press",
    "military press",
    "leg press",
    "chest press",
    "bent over row",
    "barbell row",
    "cable row",
    "calorie deficit",
    "calorie surplus",
    "body fat",
    "fat loss",
    "weight loss",
    "weight gain",
    "lose weight",
    "gain weight",
    "lose fat",
    "burn fat",
    "build muscle",
    "gain muscle",
    "sleep schedule",
    "core workout",
    "back day",
    "lower back",
    "upper back",
    "cable machine",
    "smith machine",
    "good form",
    "proper form",
    "muscle building",
    "muscle gain",
    "lean mass",
    "lean bulk",
    "push up",
    "pull up",
    "chin up",
    "sit up",
    "warm up",
    "cool down",
    "pre workout",
    "post workout",
    "drop set",
    "super set",
    "rest day",
    "leg day",
    "rep range",
    "olympic lift",
    "physical therapy",
    "personal trainer",
    "meal prep",
    "heart rate",
    "strength training",
    "weight training",
    "resistance band",
];

pub const DEFAULT_TOKENS: &[&str] = &[
    // core training
    "workout", "exercise", "training", "gym", "fitness", "rep", "repetition", "set",
    "hypertrophy", "strength", "endurance", "warmup", "cooldown", "crossfit", "hiit",
    "calisthenics", "powerlifting", "bodybuilding", "weightlifting", "yoga", "pilates",
    "routine", "technique", "posture",
    // exercises
    "squat", "squatting", "bench", "deadlift", "curl", "plank", "pushup", "pullup",
    "chinup", "situp", "lunge", "burpee", "crunch",
    // cardio
    "cardio", "cardiovascular", "aerobic", "anaerobic", "run", "running", "jog", "jogging",
    "treadmill", "cycle", "cycling", "bike", "biking", "rowing", "elliptical", "sprint",
    "marathon",
    // equipment
    "dumbbell", "barbell", "kettlebell", "bodyweight", "weight", "lift", "lifting",
    // muscles
    "glute", "quad", "quadricep", "hamstring", "lat", "delt", "deltoid", "pec",
    "pectoral", "bicep", "tricep", "abs", "abdominal", "calf", "calves", "forearm",
    "chest", "shoulder", "arm", "leg", "thigh",
    // nutrition & supplements
    "protein", "creatine", "bcaa", "supplement", "diet", "nutrition", "calorie",
    "macro", "macronutrient", "carb", "carbohydrate", "fat", "keto", "bulk", "bulking",
    // training concepts
    "mobility", "flexibility", "stretch", "stretching", "muscle", "muscular",
    // health & recovery
    "recovery", "hydration", "sleep", "injury", "pain", "rehab", "sore", "soreness", "doms",
];

/// Which tier decided a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Phrase,
    Token,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDecision {
    pub in_scope: bool,
    pub matched_term: Option<String>,
    pub match_source: MatchSource,
    pub fallback_reply: Option<String>,
}

impl ScopeDecision {
    fn matched(term: &str, source: MatchSource) -> Self {
        Self {
            in_scope: true,
            matched_term: Some(term.to_string()),
            match_source: source,
            fallback_reply: None,
        }
    }

    pub fn deferred() -> Self {
        Self {
            in_scope: false,
            matched_term: None,
            match_source: MatchSource::Deferred,
            fallback_reply: Some(OUT_OF_SCOPE_REPLY.to_string()),
        }
    }
}

/// Phrase and token tables as plain data.
#[derive(Debug, Clone)]
pub struct ScopeVocabulary {
    pub phrases: Vec<String>,
    pub tokens: Vec<String>,
}

impl Default for ScopeVocabulary {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_PHRASES.iter().map(|s| s.to_string()).collect(),
            tokens: DEFAULT_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

struct PhrasePattern {
    phrase: String,
    regex: Regex,
}

/// Compiled classifier. Build once at start-up and share.
pub struct ScopeClassifier {
    phrases: Vec<PhrasePattern>,
    tokens: HashSet<String>,
}

impl Default for ScopeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeClassifier")
            .field("phrases", &self.phrases.len())
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl ScopeClassifier {
    pub fn new() -> Self {
        Self::with_vocabulary(&ScopeVocabulary::default())
    }

    pub fn with_vocabulary(vocabulary: &ScopeVocabulary) -> Self {
        let phrases = vocabulary
            .phrases
            .iter()
            .filter_map(|phrase| {
                let normalized = normalize_query(phrase);
                if normalized.is_empty() {
                    return None;
                }
                match compile_phrase(&normalized) {
                    Ok(regex) => Some(PhrasePattern {
                        phrase: normalized,
                        regex,
                    }),
                    Err(e) => {
                        tracing::warn!("Skipping scope phrase {:?}: {}", phrase, e);
                        None
                    }
                }
            })
            .collect();

        let tokens = vocabulary
            .tokens
            .iter()
            .map(|t| normalize_query(t))
            .filter(|t| !t.is_empty())
            .collect();

        Self { phrases, tokens }
    }

    pub fn classify(&self, raw_query: &str) -> ScopeDecision {
        let text = normalize_query(raw_query);
        if text.is_empty() {
            return ScopeDecision::deferred();
        }

        for pattern in &self.phrases {
            if let Some(caps) = pattern.regex.captures(&text) {
                let term = caps.get(1).map_or(pattern.phrase.as_str(), |m| m.as_str());
                return ScopeDecision::matched(term, MatchSource::Phrase);
            }
        }

        for token in text.split(|c: char| !c.is_alphanumeric()) {
            if !token.is_empty() && self.token_matches(token) {
                return ScopeDecision::matched(token, MatchSource::Token);
            }
        }

        ScopeDecision::deferred()
    }

    fn token_matches(&self, token: &str) -> bool {
        if self.tokens.contains(token) {
            return true;
        }
        SUFFIXES.iter().any(|suffix| {
            token
                .strip_suffix(suffix)
                .is_some_and(|stem| !stem.is_empty() && self.tokens.contains(stem))
        })
    }
}

/// Lowercase, fold accents, drop apostrophes and quotes, turn hyphen-like
/// separators into spaces, collapse whitespace.
pub fn normalize_query(raw: &str) -> String {
    // Quotes go first: NFKD would split U+00B4 into a space plus a mark.
    let unquoted: String = raw.chars().filter(|c| !is_quote(*c)).collect();
    let folded: String = unquoted
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if is_separator(c) { ' ' } else { c })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_quote(c: char) -> bool {
    matches!(
        c,
        '\'' | '\u{2019}' | '\u{2018}' | '`' | '\u{00B4}' | '"' | '\u{201C}' | '\u{201D}'
    )
}

fn is_separator(c: char) -> bool {
    matches!(
        c,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '_' | '/'
    )
}

fn compile_phrase(phrase: &str) -> Result<Regex, regex::Error> {
    let body = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    let pattern = format!(r"(?:^|[^\p{{L}}\p{{N}}])({body}(?:ing|es|s)?)(?:$|[^\p{{L}}\p{{N}}])");
    Regex::new(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(q: &str) -> ScopeDecision {
        ScopeClassifier::new().classify(q)
    }

    #[test]
    fn test_normalize_query_folds_and_collapses() {
        assert_eq!(normalize_query("  Push-Ups   AND  Café\tcurls "), "push ups and cafe curls");
        assert_eq!(normalize_query("What\u{2019}s a pull\u{2013}up?"), "whats a pull up?");
        assert_eq!(normalize_query("warm_up/cool-down"), "warm up cool down");
    }

    #[test]
    fn test_phrase_match() {
        let d = classify("Best bench press variations for beginners");
        assert!(d.in_scope);
        assert_eq!(d.match_source, MatchSource::Phrase);
        assert_eq!(d.matched_term.as_deref(), Some("bench press"));
        assert!(d.fallback_reply.is_none());
    }

    #[test]
    fn test_phrase_match_with_suffix_and_whitespace() {
        let d = classify("doing push ups daily");
        assert_eq!(d.match_source, MatchSource::Phrase);
        assert_eq!(d.matched_term.as_deref(), Some("push ups"));

        let d = classify("how many bench \t presses a week");
        assert_eq!(d.match_source, MatchSource::Phrase);
        assert_eq!(d.matched_term.as_deref(), Some("bench presses"));
    }

    #[test]
    fn test_phrase_match_through_hyphen() {
        let d = classify("Is a calorie-deficit safe?");
        assert_eq!(d.match_source, MatchSource::Phrase);
        assert_eq!(d.matched_term.as_deref(), Some("calorie deficit"));
    }

    #[test]
    fn test_phrase_requires_word_boundaries() {
        // "leg pressure" must not hit "leg press"
        let d = classify("leg pressure when sitting");
        assert_ne!(d.match_source, MatchSource::Phrase);
    }

    #[test]
    fn test_token_match() {
        let d = classify("need new dumbbells");
        assert!(d.in_scope);
        assert_eq!(d.match_source, MatchSource::Token);
        assert_eq!(d.matched_term.as_deref(), Some("dumbbells"));
    }

    #[test]
    fn test_token_match_gerund() {
        let d = classify("I love benching");
        assert!(d.in_scope);
        assert_eq!(d.match_source, MatchSource::Token);
        assert_eq!(d.matched_term.as_deref(), Some("benching"));
    }

    #[test]
    fn test_everyday_fitness_questions_in_scope() {
        let cases = [
            ("how do I lose weight", MatchSource::Phrase, "lose weight"),
            ("how to burn fat", MatchSource::Phrase, "burn fat"),
            ("what is a good sleep schedule", MatchSource::Phrase, "sleep schedule"),
            ("tips for lower back strength", MatchSource::Phrase, "lower back"),
            ("how far should I run", MatchSource::Token, "run"),
            ("how to get bigger arms", MatchSource::Token, "arms"),
            ("skinny legs", MatchSource::Token, "legs"),
            ("my chest feels flat", MatchSource::Token, "chest"),
            ("shoulder pain after swimming", MatchSource::Token, "shoulder"),
            ("how do I sleep better", MatchSource::Token, "sleep"),
            ("improve my posture", MatchSource::Token, "posture"),
            ("a beginner routine", MatchSource::Token, "routine"),
            ("should I lift every day", MatchSource::Token, "lift"),
        ];
        for (query, source, term) in cases {
            let d = classify(query);
            assert!(d.in_scope, "{query:?}");
            assert_eq!(d.match_source, source, "{query:?}");
            assert_eq!(d.matched_term.as_deref(), Some(term), "{query:?}");
        }
    }

    #[test]
    fn test_ambiguous_words_alone_are_deferred() {
        for query in [
            "fill out the application form",
            "back up my laptop",
            "apple core",
            "washing machine broke",
        ] {
            assert_eq!(classify(query).match_source, MatchSource::Deferred, "{query:?}");
        }
    }

    #[test]
    fn test_first_token_in_query_order_wins() {
        let d = classify("protein or creatine first?");
        assert_eq!(d.matched_term.as_deref(), Some("protein"));
    }

    #[test]
    fn test_out_of_scope_is_deferred() {
        let d = classify("what's the capital of France");
        assert!(!d.in_scope);
        assert_eq!(d.match_source, MatchSource::Deferred);
        assert!(d.matched_term.is_none());
        assert_eq!(d.fallback_reply.as_deref(), Some(OUT_OF_SCOPE_REPLY));
    }

    #[test]
    fn test_compound_only_word_alone_is_deferred() {
        let d = classify("draft a press release for our launch");
        assert_eq!(d.match_source, MatchSource::Deferred);
    }

    #[test]
    fn test_empty_query_is_deferred() {
        assert_eq!(classify("   ").match_source, MatchSource::Deferred);
        assert_eq!(classify("").match_source, MatchSource::Deferred);
    }

    #[test]
    fn test_custom_vocabulary() {
        let classifier = ScopeClassifier::with_vocabulary(&ScopeVocabulary {
            phrases: vec!["box jump".to_string()],
            tokens: vec!["rower".to_string()],
        });

        assert_eq!(
            classifier.classify("Box-Jumps for power").match_source,
            MatchSource::Phrase
        );
        assert_eq!(classifier.classify("used rowers").match_source, MatchSource::Token);
        // default vocabulary is not consulted
        assert_eq!(
            classifier.classify("bench press").match_source,
            MatchSource::Deferred
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let classifier = ScopeClassifier::new();
        let q = "Squatting twice a week with a barbell";
        assert_eq!(classifier.classify(q), classifier.classify(q));
    }
}
