//! Deterministic keyword classification.
//!
//! Used whenever the language model is absent, fails, or answers with
//! something that does not validate.

use std::collections::BTreeMap;

use ticketbuddy_core::{Importance, TicketDraft};

/// Words that force the highest priority.
const URGENT_WORDS: &[&str] = &[
    "urgent",
    "critical",
    "emergency",
    "asap",
    "security",
    "payment",
    "payments",
    "outage",
];

/// Words that raise priority to at least medium.
const IMPORTANT_WORDS: &[&str] = &["important", "soon", "core"];

/// Number of leading words used for generated titles.
const TITLE_WORDS: usize = 6;

/// Problem areas, in the order they are tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Authentication,
    Database,
    Api,
    Frontend,
    Mobile,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Authentication,
        Domain::Database,
        Domain::Api,
        Domain::Frontend,
        Domain::Mobile,
    ];

    /// Key used in `[classifier] owners`.
    pub fn key(self) -> &'static str {
        match self {
            Domain::Authentication => "authentication",
            Domain::Database => "database",
            Domain::Api => "api",
            Domain::Frontend => "frontend",
            Domain::Mobile => "mobile",
        }
    }

    /// Title prefix of drafts in this domain.
    pub fn label(self) -> &'static str {
        match self {
            Domain::Authentication => "Authentication",
            Domain::Database => "Database",
            Domain::Api => "API",
            Domain::Frontend => "UI",
            Domain::Mobile => "Mobile",
        }
    }

    fn base_priority(self) -> Importance {
        match self {
            Domain::Authentication => Importance::HIGH,
            Domain::Database | Domain::Api | Domain::Mobile => Importance::MEDIUM,
            Domain::Frontend => Importance::LOW,
        }
    }

    /// Keywords and phrases; phrases match consecutive words.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Domain::Authentication => &[
                "auth",
                "authentication",
                "login",
                "log in",
                "logout",
                "sign in",
                "signin",
                "sign up",
                "signup",
                "password",
                "passwords",
                "oauth",
                "sso",
                "2fa",
                "mfa",
                "session",
                "sessions",
                "credentials",
            ],
            Domain::Database => &[
                "database",
                "db",
                "sql",
                "query",
                "queries",
                "migration",
                "migrations",
                "postgres",
                "mysql",
                "sqlite",
                "table",
                "deadlock",
                "data loss",
            ],
            Domain::Api => &[
                "api",
                "endpoint",
                "endpoints",
                "server",
                "backend",
                "timeout",
                "timeouts",
                "latency",
                "webhook",
                "webhooks",
                "graphql",
                "500",
                "502",
                "503",
            ],
            Domain::Frontend => &[
                "ui",
                "button",
                "page",
                "layout",
                "css",
                "style",
                "frontend",
                "screen",
                "modal",
                "form",
                "dashboard",
                "display",
                "render",
                "font",
                "color",
                "colour",
            ],
            Domain::Mobile => &[
                "mobile", "ios", "android", "iphone", "ipad", "tablet", "phone", "app store",
            ],
        }
    }
}

/// Who owns each domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRoster {
    pub authentication: String,
    pub database: String,
    pub api: String,
    pub frontend: String,
    pub mobile: String,
    /// Receives tickets that match no domain
    pub triage: String,
}

impl Default for OwnerRoster {
    fn default() -> Self {
        Self {
            authentication: "Alex Rivera".to_string(),
            database: "Priya Patel".to_string(),
            api: "Marcus Chen".to_string(),
            frontend: "Sofia Martinez".to_string(),
            mobile: "Jordan Kim".to_string(),
            triage: "Triage Team".to_string(),
        }
    }
}

impl OwnerRoster {
    /// Default roster with `[classifier] owners` entries applied. Unknown keys
    /// are ignored.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut roster = Self::default();
        for (key, owner) in overrides {
            let slot = match key.as_str() {
                "authentication" | "auth" => &mut roster.authentication,
                "database" => &mut roster.database,
                "api" | "backend" => &mut roster.api,
                "frontend" | "ui" => &mut roster.frontend,
                "mobile" => &mut roster.mobile,
                "triage" => &mut roster.triage,
                _ => continue,
            };
            *slot = owner.clone();
        }
        roster
    }

    pub fn owner(&self, domain: Domain) -> &str {
        match domain {
            Domain::Authentication => &self.authentication,
            Domain::Database => &self.database,
            Domain::Api => &self.api,
            Domain::Frontend => &self.frontend,
            Domain::Mobile => &self.mobile,
        }
    }
}

/// Lowercased alphanumeric words of `text`.
fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_keyword(words: &[String], keyword: &str) -> bool {
    let phrase: Vec<&str> = keyword.split(' ').collect();
    words
        .windows(phrase.len())
        .any(|window| window.iter().zip(&phrase).all(|(w, p)| w == p))
}

fn contains_any(words: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|k| contains_keyword(words, k))
}

/// Domains mentioned in `description`, in test order.
pub fn matching_domains(description: &str) -> Vec<Domain> {
    let words = words(description);
    Domain::ALL
        .into_iter()
        .filter(|d| contains_any(&words, d.keywords()))
        .collect()
}

/// First six words with punctuation stripped.
pub fn short_title(description: &str) -> String {
    let title = description
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .take(TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        "Untitled ticket".to_string()
    } else {
        title
    }
}

fn adjust_priority(base: Importance, words: &[String]) -> Importance {
    if contains_any(words, URGENT_WORDS) {
        Importance::HIGH
    } else if contains_any(words, IMPORTANT_WORDS) {
        base.max(Importance::MEDIUM)
    } else {
        base
    }
}

/// Keyword classification: one draft per matching domain, or a single
/// triage draft when nothing matches. Never returns an empty list.
pub fn classify(description: &str, roster: &OwnerRoster) -> Vec<TicketDraft> {
    let words = words(description);
    let title = short_title(description);
    let domains = matching_domains(description);

    if domains.is_empty() {
        return vec![TicketDraft {
            title,
            description: description.to_string(),
            priority: adjust_priority(Importance::LOW, &words),
            assignee: roster.triage.clone(),
        }];
    }

    domains
        .into_iter()
        .map(|domain| TicketDraft {
            title: format!("{}: {}", domain.label(), title),
            description: description.to_string(),
            priority: adjust_priority(domain.base_priority(), &words),
            assignee: roster.owner(domain).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_goes_to_authentication() {
        let drafts = classify("Users cannot log in after password reset", &OwnerRoster::default());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].assignee, "Alex Rivera");
        assert_eq!(drafts[0].priority, Importance::HIGH);
        assert_eq!(
            drafts[0].title,
            "Authentication: Users cannot log in after password"
        );
    }

    #[test]
    fn test_multiple_domains_in_order() {
        let drafts = classify(
            "The mobile app button overlaps and the database query is slow",
            &OwnerRoster::default(),
        );
        let owners: Vec<&str> = drafts.iter().map(|d| d.assignee.as_str()).collect();
        assert_eq!(owners, vec!["Priya Patel", "Sofia Martinez", "Jordan Kim"]);
    }

    #[test]
    fn test_urgency_forces_high() {
        let drafts = classify("Checkout button broken, payment failing", &OwnerRoster::default());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].assignee, "Sofia Martinez");
        assert_eq!(drafts[0].priority, Importance::HIGH);
    }

    #[test]
    fn test_importance_words_raise_to_medium() {
        let drafts = classify(
            "Please fix the page layout soon",
            &OwnerRoster::default(),
        );
        assert_eq!(drafts[0].priority, Importance::MEDIUM);

        let drafts = classify("Tweak the page layout", &OwnerRoster::default());
        assert_eq!(drafts[0].priority, Importance::LOW);
    }

    #[test]
    fn test_no_domain_goes_to_triage() {
        let drafts = classify(
            "Something feels off, not sure what exactly happened!",
            &OwnerRoster::default(),
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].assignee, "Triage Team");
        assert_eq!(drafts[0].priority, Importance::LOW);
        assert_eq!(drafts[0].title, "Something feels off not sure what");
    }

    #[test]
    fn test_no_domain_but_urgent() {
        let drafts = classify("URGENT: everything is on fire", &OwnerRoster::default());
        assert_eq!(drafts[0].priority, Importance::HIGH);
        assert_eq!(drafts[0].title, "URGENT everything is on fire");
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        // "author" contains "auth" and "uid" contains "ui"
        assert!(matching_domains("author uid tablecloth").is_empty());
        assert_eq!(matching_domains("table"), vec![Domain::Database]);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let text = "API timeout on the server during sign in";
        let roster = OwnerRoster::default();
        assert_eq!(classify(text, &roster), classify(text, &roster));
    }

    #[test]
    fn test_roster_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("database".to_string(), "Dana Scully".to_string());
        overrides.insert("unknown".to_string(), "Nobody".to_string());

        let roster = OwnerRoster::with_overrides(&overrides);
        assert_eq!(roster.database, "Dana Scully");
        assert_eq!(roster.api, "Marcus Chen");

        let drafts = classify("sql migration failed", &roster);
        assert_eq!(drafts[0].assignee, "Dana Scully");
    }
}
