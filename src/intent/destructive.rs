use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestructiveOperation {
    Delete,
    Clear,
    Remove,
    Purge,
}

impl DestructiveOperation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Clear => "clear",
            Self::Remove => "remove",
            Self::Purge => "purge",
        }
    }

    fn from_verb(verb: &str) -> Self {
        match verb.to_ascii_lowercase().as_str() {
            "clear" | "wipe" => Self::Clear,
            "remove" => Self::Remove,
            "purge" => Self::Purge,
            _ => Self::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestructiveScope {
    All,
    Multiple,
    Bulk,
}

/// Task subsets a bulk command can name. Declaration order is match precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestructiveCategory {
    Completed,
    Old,
    HighPriority,
    LowPriority,
}

impl DestructiveCategory {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Old => "old",
            Self::HighPriority => "high priority",
            Self::LowPriority => "low priority",
        }
    }
}

/// A bulk mutation that needs explicit confirmation. Derived per input, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestructiveIntent {
    pub operation: DestructiveOperation,
    pub scope: DestructiveScope,
    pub category: Option<DestructiveCategory>,
    pub confirmation_message: String,
    pub estimated_affected: String,
}

struct ScopePattern {
    regex: Regex,
    scope: DestructiveScope,
    /// A detected category turns an `All` match into `Multiple`.
    narrows: bool,
}

/// Keyword alternations per category. Also feeds the "<category> tasks"
/// scope pattern, so every keyword that names a category gates a bulk delete.
const CATEGORY_TABLE: [(DestructiveCategory, &str); 4] = [
    (
        DestructiveCategory::Completed,
        r"completed|complete|done|finished",
    ),
    (DestructiveCategory::Old, r"old|older|stale|expired|past"),
    (
        DestructiveCategory::HighPriority,
        r"high[\s-]?priority|urgent|important",
    ),
    (DestructiveCategory::LowPriority, r"low[\s-]?priority"),
];

fn category_words() -> String {
    CATEGORY_TABLE
        .iter()
        .map(|(_, words)| *words)
        .collect::<Vec<_>>()
        .join("|")
}

fn verb_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)\b(delete|remove|clear|purge|erase|wipe)\b")
            .expect("destructive verb regex must compile")
    })
}

fn category_table() -> &'static [(DestructiveCategory, Regex)] {
    static CACHED: OnceLock<Vec<(DestructiveCategory, Regex)>> = OnceLock::new();
    CACHED.get_or_init(|| {
        CATEGORY_TABLE
            .iter()
            .map(|(category, pattern)| {
                (
                    *category,
                    Regex::new(&format!(r"(?i)\b(?:{pattern})\b"))
                        .expect("category regex must compile"),
                )
            })
            .collect()
    })
}

fn scope_table() -> &'static [ScopePattern] {
    static CACHED: OnceLock<Vec<ScopePattern>> = OnceLock::new();
    CACHED.get_or_init(|| {
        let entry = |pattern: &str, scope, narrows| ScopePattern {
            regex: Regex::new(&format!("(?i){pattern}")).expect("scope regex must compile"),
            scope,
            narrows,
        };
        vec![
            entry(
                r"\b(?:all|every|each)\b(?:\s+(?:of\s+)?(?:my|the|your)\b)?(?:\s+[\w-]+){0,3}?\s+tasks?\b",
                DestructiveScope::All,
                true,
            ),
            entry(
                r"\ball\s+of\s+them\b|\beverything\b|\ball\b[\s!.?]*$",
                DestructiveScope::All,
                true,
            ),
            entry(
                r"\b(?:clear|wipe)\s+(?:out\s+)?(?:my\s+|the\s+)?(?:(?:task|todo|to-do)\s+)?list\b",
                DestructiveScope::All,
                false,
            ),
            entry(
                &format!(r"\b(?:{})\s+(?:[\w-]+\s+)?tasks\b", category_words()),
                DestructiveScope::Multiple,
                true,
            ),
            entry(
                r"\btasks\s+(?:that\s+are|which\s+are|marked)(?:\s+as)?\s+(?:completed|done|finished)\b",
                DestructiveScope::Multiple,
                true,
            ),
            entry(
                r"\b(?:multiple|several|many|some|these|those)\s+tasks\b|\btasks\s+#?\d+\s*(?:,|and|&|-|to|through|thru)\s*#?\d+",
                DestructiveScope::Multiple,
                true,
            ),
            entry(r"\b(?:bulk|mass|batch)\b", DestructiveScope::Bulk, true),
            entry(r"\bpurge\b", DestructiveScope::Bulk, true),
        ]
    })
}

fn detect_category(input: &str) -> Option<DestructiveCategory> {
    category_table()
        .iter()
        .find(|(_, regex)| regex.is_match(input))
        .map(|(category, _)| *category)
}

/// Matches a bulk mutation signature. Single-item commands return `None`.
///
/// Scope patterns are tried in table order and the first match wins; when
/// several categories appear, the first in [`DestructiveCategory`] order is used.
#[must_use]
pub fn detect_destructive(input: &str) -> Option<DestructiveIntent> {
    let verb = verb_regex().captures(input)?.get(1)?.as_str();
    let operation = DestructiveOperation::from_verb(verb);
    let pattern = scope_table()
        .iter()
        .find(|pattern| pattern.regex.is_match(input))?;

    let category = if pattern.narrows {
        detect_category(input)
    } else {
        None
    };
    let scope = match (pattern.scope, category) {
        (DestructiveScope::All, Some(_)) => DestructiveScope::Multiple,
        (scope, _) => scope,
    };

    Some(describe(operation, scope, category))
}

fn describe(
    operation: DestructiveOperation,
    scope: DestructiveScope,
    category: Option<DestructiveCategory>,
) -> DestructiveIntent {
    let verb = operation.as_str();
    let (confirmation_message, estimated_affected) = match (scope, category) {
        (DestructiveScope::All, _) => (
            format!("Are you sure you want to {verb} ALL tasks? This cannot be undone."),
            "All tasks in your list".to_string(),
        ),
        (_, Some(category)) => (
            format!(
                "Are you sure you want to {verb} all {} tasks? This cannot be undone.",
                category.label()
            ),
            format!("All {} tasks", category.label()),
        ),
        (_, None) => (
            format!("Are you sure you want to {verb} multiple tasks? This cannot be undone."),
            "Multiple tasks".to_string(),
        ),
    };

    DestructiveIntent {
        operation,
        scope,
        category,
        confirmation_message,
        estimated_affected,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{detect_destructive, DestructiveCategory, DestructiveOperation, DestructiveScope};

    #[test]
    fn delete_all_tasks_targets_everything() {
        let intent = detect_destructive("delete all tasks").expect("destructive");
        assert_eq!(intent.operation, DestructiveOperation::Delete);
        assert_eq!(intent.scope, DestructiveScope::All);
        assert_eq!(intent.category, None);
        assert_eq!(intent.estimated_affected, "All tasks in your list");
        assert_eq!(
            intent.confirmation_message,
            "Are you sure you want to delete ALL tasks? This cannot be undone."
        );
    }

    #[test]
    fn category_narrows_all_to_multiple() {
        let intent = detect_destructive("delete all completed tasks").expect("destructive");
        assert_eq!(intent.scope, DestructiveScope::Multiple);
        assert_eq!(intent.category, Some(DestructiveCategory::Completed));
        assert_eq!(intent.estimated_affected, "All completed tasks");
    }

    #[test]
    fn overlapping_categories_resolve_in_table_order() {
        let intent =
            detect_destructive("delete all old high-priority tasks").expect("destructive");
        assert_eq!(intent.category, Some(DestructiveCategory::Old));
        assert_eq!(intent.estimated_affected, "All old tasks");
    }

    #[test]
    fn bulk_phrasings_are_detected() {
        let cases = [
            ("clear my task list", DestructiveOperation::Clear, DestructiveScope::All),
            ("remove everything", DestructiveOperation::Remove, DestructiveScope::All),
            ("wipe all my tasks", DestructiveOperation::Clear, DestructiveScope::All),
            ("remove completed tasks", DestructiveOperation::Remove, DestructiveScope::Multiple),
            ("delete old tasks", DestructiveOperation::Delete, DestructiveScope::Multiple),
            ("delete past tasks", DestructiveOperation::Delete, DestructiveScope::Multiple),
            ("delete tasks 3-7", DestructiveOperation::Delete, DestructiveScope::Multiple),
            ("delete tasks 1, 2 and 3", DestructiveOperation::Delete, DestructiveScope::Multiple),
            ("bulk delete my tasks", DestructiveOperation::Delete, DestructiveScope::Bulk),
            ("purge low priority stuff", DestructiveOperation::Purge, DestructiveScope::Bulk),
        ];
        for (input, operation, scope) in cases {
            let intent = detect_destructive(input).unwrap_or_else(|| panic!("{input}"));
            assert_eq!((intent.operation, intent.scope), (operation, scope), "{input}");
        }
        assert_eq!(
            detect_destructive("delete past tasks").and_then(|intent| intent.category),
            Some(DestructiveCategory::Old)
        );
    }

    #[test]
    fn generic_multiple_names_no_category() {
        let intent = detect_destructive("delete several tasks").expect("destructive");
        assert_eq!(intent.estimated_affected, "Multiple tasks");
        assert_eq!(
            intent.confirmation_message,
            "Are you sure you want to delete multiple tasks? This cannot be undone."
        );
    }

    #[test]
    fn single_item_and_non_destructive_commands_pass() {
        for input in [
            "delete task number 5",
            "remove the dentist task",
            "delete the task called all hands",
            "show all tasks",
            "mark all my tasks as complete",
        ] {
            assert_eq!(detect_destructive(input), None, "{input}");
        }
    }
}
