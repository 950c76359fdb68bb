use std::sync::OnceLock;

use regex::Regex;

use super::{Guidance, GuidanceKind};

/// Optional polite lead-in before an action verb.
const LEAD_IN: &str =
    r"^(?:(?:please|pls|can\s+you|could\s+you|would\s+you|will\s+you|i\s+want\s+you\s+to|i\s+need\s+you\s+to)\s+)*";

const CAPABILITY_EXAMPLES: [&str; 5] = [
    "Add a task to buy groceries tomorrow",
    "Show my tasks",
    "Mark task 3 as complete",
    "Change the priority of task 2 to high",
    "Delete task 5",
];

/// Action families the task assistant cannot perform itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedCategory {
    Communication,
    Calendar,
    Device,
    Media,
    Search,
    System,
    File,
    Commerce,
}

impl UnsupportedCategory {
    fn description(self) -> &'static str {
        match self {
            Self::Communication => "send messages or make calls",
            Self::Calendar => "manage your calendar",
            Self::Device => "control devices, alarms or timers",
            Self::Media => "play media",
            Self::Search => "search the web",
            Self::System => "change system settings or software",
            Self::File => "work with files",
            Self::Commerce => "make purchases or bookings",
        }
    }
}

const UNSUPPORTED_TABLE: [(UnsupportedCategory, &str); 8] = [
    (
        UnsupportedCategory::Communication,
        r"(?:send|email|e-mail|text|call|phone|message|dm|tweet)\b",
    ),
    (
        UnsupportedCategory::Calendar,
        r"(?:schedule|book|reschedule)\s+(?:a\s+|an\s+|the\s+|my\s+)?(?:meeting|appointment|call|event|flight|table)\b",
    ),
    (
        UnsupportedCategory::Device,
        r"(?:(?:set|start)\s+(?:an?\s+|my\s+)?(?:alarm|timer)\b|(?:turn|switch)\s+(?:(?:the\s+|my\s+)?[\w-]+\s+)?(?:on|off)\b|(?:dim|brighten|lock|unlock)\s+(?:the|my)\b)",
    ),
    (
        UnsupportedCategory::Media,
        r"(?:play|pause|shuffle|stream)\b|skip\s+(?:this\s+|the\s+)?(?:song|track)\b",
    ),
    (
        UnsupportedCategory::Search,
        r"(?:search(?:\s+for)?|google|look\s+up|browse)\b|what(?:'s|\s+is)\s+the\s+(?:weather|news|score)\b",
    ),
    (
        UnsupportedCategory::System,
        r"(?:(?:restart|reboot|shut\s*down|install|uninstall|update)\s+(?:the\s+|my\s+)?(?:computer|laptop|phone|system|apps?|software|os)\b|(?:change|adjust)\s+(?:the\s+|my\s+)?(?:settings|volume|brightness|wallpaper)\b)",
    ),
    (
        UnsupportedCategory::File,
        r"(?:open|download|upload|save|print|attach|rename)\s+(?:the\s+|my\s+|a\s+|this\s+|that\s+)?(?:[\w-]+\s+)?(?:file|document|folder|pdf|photo|picture|attachment|spreadsheet)s?\b",
    ),
    (
        UnsupportedCategory::Commerce,
        r"(?:order|purchase)\b|(?:buy|pay(?:\s+for)?)\b.*\b(?:online|for\s+me|on\s+amazon)\b|(?:reserve|book)\s+(?:a\s+)?(?:hotel|room|tickets?)\b",
    ),
];

fn greeting_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:hi|hello|hey|hiya|howdy|greetings|yo|good\s+(?:morning|afternoon|evening|day)|help|help\s+me|what\s+can\s+you\s+do|what\s+do\s+you\s+do|how\s+does\s+this\s+work|how\s+do\s+i\s+use\s+(?:this|you)|what\s+are\s+your\s+commands|commands)(?:\s+there)?[\s!.,?]*$",
        )
        .expect("greeting regex must compile")
    })
}

fn unclear_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(?:what|huh|hmm+|um+|uh+|ok(?:ay)?|yes|no|yep|nope|maybe|idk|i\s+don'?t\s+know|something|stuff|things?|do\s+it|do\s+something|task|asdf\w*|test(?:ing)?)[\s!.,?]*|[^\p{L}\p{N}]+)$",
        )
        .expect("unclear regex must compile")
    })
}

fn lead_in_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(&format!("(?i){LEAD_IN}")).expect("lead-in regex must compile")
    })
}

fn unsupported_table() -> &'static [(UnsupportedCategory, Regex)] {
    static CACHED: OnceLock<Vec<(UnsupportedCategory, Regex)>> = OnceLock::new();
    CACHED.get_or_init(|| {
        UNSUPPORTED_TABLE
            .iter()
            .map(|(category, pattern)| {
                let regex = Regex::new(&format!("(?i){LEAD_IN}(?:{pattern})"))
                    .expect("unsupported-action regex must compile");
                (*category, regex)
            })
            .collect()
    })
}

pub(super) fn is_greeting_or_help(input: &str) -> bool {
    greeting_regex().is_match(input)
}

pub(super) fn is_unclear(input: &str) -> bool {
    unclear_regex().is_match(input)
}

pub(super) fn unsupported_category(input: &str) -> Option<UnsupportedCategory> {
    unsupported_table()
        .iter()
        .find(|(_, regex)| regex.is_match(input))
        .map(|(category, _)| *category)
}

/// Example commands shown with capability guidance.
#[must_use]
pub fn capability_examples() -> &'static [&'static str] {
    &CAPABILITY_EXAMPLES
}

pub(super) fn capability_guidance() -> Guidance {
    Guidance {
        kind: GuidanceKind::Capabilities,
        message: "Hi! I can help you manage your tasks. Tell me what you need in plain language."
            .to_string(),
        examples: CAPABILITY_EXAMPLES.iter().map(|s| (*s).to_string()).collect(),
    }
}

pub(super) fn unclear_guidance() -> Guidance {
    Guidance {
        kind: GuidanceKind::Unclear,
        message: "I'm not sure what you'd like to do. Try describing what should happen to your tasks."
            .to_string(),
        examples: CAPABILITY_EXAMPLES[..3]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
    }
}

pub(super) fn too_short_guidance() -> Guidance {
    Guidance {
        kind: GuidanceKind::TooShort,
        message: "That message is too short to act on. Could you tell me a bit more?".to_string(),
        examples: CAPABILITY_EXAMPLES[..3]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
    }
}

pub(super) fn redirect_guidance(category: UnsupportedCategory, input: &str) -> Guidance {
    let action = task_phrase(input);
    Guidance {
        kind: GuidanceKind::Unsupported(category),
        message: format!(
            "I can't {} directly, but I can add it to your task list.",
            category.description()
        ),
        examples: vec![
            format!("Add a task to {action}"),
            format!("Add a high priority task to {action} tomorrow"),
            "Show my tasks".to_string(),
        ],
    }
}

/// The requested action as a task title: lead-in removed, trailing
/// punctuation dropped, first letter lowercased.
fn task_phrase(input: &str) -> String {
    let without_lead_in = lead_in_regex().replace(input.trim(), "");
    let action = without_lead_in.trim_end_matches(['.', '!', '?', ' ']);
    let mut chars = action.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{is_greeting_or_help, is_unclear, task_phrase, unsupported_category, UnsupportedCategory};

    #[test]
    fn greetings_and_help_requests_match() {
        for input in [
            "hello",
            "hi",
            "Hi there!",
            "good morning",
            "Good Evening.",
            "help",
            "what can you do?",
        ] {
            assert!(is_greeting_or_help(input), "{input}");
        }
        assert!(!is_greeting_or_help("hi, add milk to my list"));
    }

    #[test]
    fn unclear_inputs_match_whole_message_only() {
        for input in ["hmm", "ok", "what?", "idk", "!!!", "do it"] {
            assert!(is_unclear(input), "{input}");
        }
        assert!(!is_unclear("ok add a task to call the bank"));
    }

    #[test]
    fn unsupported_actions_are_categorized() {
        let cases = [
            ("text John that I'm late", UnsupportedCategory::Communication),
            ("please schedule a meeting with Ana", UnsupportedCategory::Calendar),
            ("set an alarm for 7am", UnsupportedCategory::Device),
            ("turn off the lights", UnsupportedCategory::Device),
            ("play some jazz", UnsupportedCategory::Media),
            ("what's the weather today", UnsupportedCategory::Search),
            ("restart my computer", UnsupportedCategory::System),
            ("open the budget spreadsheet", UnsupportedCategory::File),
            ("order a pizza", UnsupportedCategory::Commerce),
        ];
        for (input, expected) in cases {
            assert_eq!(unsupported_category(input), Some(expected), "{input}");
        }
    }

    #[test]
    fn task_phrased_requests_are_not_unsupported() {
        for input in [
            "remind me to call mom",
            "add a task to send the invoice",
            "add buy milk",
            "show my tasks",
            "delete task 4",
        ] {
            assert_eq!(unsupported_category(input), None, "{input}");
        }
    }

    #[test]
    fn task_phrase_drops_lead_in_and_punctuation() {
        assert_eq!(task_phrase("Could you call the dentist?"), "call the dentist");
        assert_eq!(task_phrase("Play my workout playlist!"), "play my workout playlist");
    }
}
