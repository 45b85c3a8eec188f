//! Reasoning engine — regex-based intent classification.
//!
//! Runs before any LLM call: a message matching one of the catalog patterns
//! can be answered by the personality fast path without spending tokens.
//! Patterns are case-insensitive, anchored at the string start, and accept
//! both Portuguese and English phrasings.

use once_cell::sync::Lazy;
use regex::Regex;

/// The recognized intent catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    Farewell,
    Gratitude,
    TimeGreeting,
    HowAreYou,
    WhoAreYou,
    HelpRequest,
    TimeRequest,
    DateRequest,
    /// No pattern matched — needs full LLM processing.
    Complex,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::Gratitude => "gratitude",
            Intent::TimeGreeting => "time_greeting",
            Intent::HowAreYou => "how_are_you",
            Intent::WhoAreYou => "who_are_you",
            Intent::HelpRequest => "help_request",
            Intent::TimeRequest => "time_request",
            Intent::DateRequest => "date_request",
            Intent::Complex => "complex",
        };
        write!(f, "{s}")
    }
}

struct PatternMatcher {
    pattern: &'static Lazy<Regex>,
    intent: Intent,
    confidence: f64,
}

macro_rules! intent_regex {
    ($name:ident, $re:literal) => {
        static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($re).expect("intent pattern is valid"));
    };
}

intent_regex!(GREETING, r"(?i)^oi$|^ol[aá]$|^eai$|^hey$|^hi$|^hello$");
intent_regex!(FAREWELL, r"(?i)^tchau$|^adeus$|^at[eé] logo$|^bye$|^see ya$");
intent_regex!(GRATITUDE, r"(?i)^obrigad[oa]|^valeu|^thanks|^thank you");
intent_regex!(TIME_GREETING, r"(?i)^bom dia$|^boa tarde$|^boa noite$");
intent_regex!(HOW_ARE_YOU, r"(?i)^como voc[eê] est[aá]|^tudo bem|^how are you");
intent_regex!(WHO_ARE_YOU, r"(?i)^quem [eé] voc[eê]|^o que [eé] voc[eê]|^what are you");
intent_regex!(HELP_REQUEST, r"(?i)^ajuda|^help|^socorro|^me ajude");
intent_regex!(TIME_REQUEST, r"(?i)^hora|^que horas|^time");
intent_regex!(DATE_REQUEST, r"(?i)^data|^que dia|^date");

static MATCHERS: Lazy<Vec<PatternMatcher>> = Lazy::new(|| {
    vec![
        PatternMatcher { pattern: &GREETING, intent: Intent::Greeting, confidence: 0.95 },
        PatternMatcher { pattern: &FAREWELL, intent: Intent::Farewell, confidence: 0.95 },
        PatternMatcher { pattern: &GRATITUDE, intent: Intent::Gratitude, confidence: 0.90 },
        PatternMatcher { pattern: &TIME_GREETING, intent: Intent::TimeGreeting, confidence: 0.95 },
        PatternMatcher { pattern: &HOW_ARE_YOU, intent: Intent::HowAreYou, confidence: 0.90 },
        PatternMatcher { pattern: &WHO_ARE_YOU, intent: Intent::WhoAreYou, confidence: 0.90 },
        PatternMatcher { pattern: &HELP_REQUEST, intent: Intent::HelpRequest, confidence: 0.85 },
        PatternMatcher { pattern: &TIME_REQUEST, intent: Intent::TimeRequest, confidence: 0.85 },
        PatternMatcher { pattern: &DATE_REQUEST, intent: Intent::DateRequest, confidence: 0.85 },
    ]
});

/// Classifies a message into `(intent, confidence)` by first match.
pub struct ReasoningEngine {
    enabled: bool,
}

impl ReasoningEngine {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    /// Analyze a message. Returns `(Complex, 0.5)` when nothing matches.
    pub fn analyze(&self, message: &str) -> (Intent, f64) {
        if !self.enabled {
            return (Intent::Complex, 0.0);
        }

        for matcher in MATCHERS.iter() {
            if matcher.pattern.is_match(message) {
                return (matcher.intent, matcher.confidence);
            }
        }

        (Intent::Complex, 0.5)
    }
}

impl Default for ReasoningEngine {
    fn default() -> Self {
        Self::new()
    }
}
