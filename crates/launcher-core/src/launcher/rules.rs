use regex::Regex;

use super::manifest::{Rule, RuleAction, RuleOs};
use crate::platform::Platform;

/// Evaluates `rules` in order; the last matching rule decides.
///
/// No rules at all means allowed. Feature gates are not considered.
pub fn applies(rules: Option<&[Rule]>, platform: &Platform) -> bool {
    let rules = match rules {
        Some(rules) if !rules.is_empty() => rules,
        _ => return true,
    };

    let mut last = RuleAction::Disallow;
    for rule in rules {
        match &rule.os {
            None => last = rule.action,
            Some(os) if os_matches(os, platform) => last = rule.action,
            Some(_) => {}
        }
    }
    last == RuleAction::Allow
}

fn os_matches(os: &RuleOs, platform: &Platform) -> bool {
    if os.name.as_deref() == Some(platform.os.key()) {
        return true;
    }
    if let Some(pattern) = os.version.as_deref().filter(|value| !value.is_empty()) {
        if version_matches(pattern, &platform.os_version) {
            return true;
        }
    }
    os.arch.as_deref() == Some(platform.arch.as_str())
}

fn version_matches(pattern: &str, version: &str) -> bool {
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(regex) => regex.is_match(version),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OsKind;

    fn rule(action: RuleAction, os: Option<RuleOs>) -> Rule {
        Rule { action, os }
    }

    fn os_named(name: &str) -> Option<RuleOs> {
        Some(RuleOs {
            name: Some(name.to_string()),
            ..RuleOs::default()
        })
    }

    fn windows() -> Platform {
        Platform::new(OsKind::Windows, "10.0", "x86_64")
    }

    fn linux() -> Platform {
        Platform::new(OsKind::Linux, "6.1.0", "x86_64")
    }

    #[test]
    fn absent_or_empty_rules_allow() {
        assert!(applies(None, &linux()));
        assert!(applies(Some(&[]), &linux()));
    }

    #[test]
    fn last_matching_rule_wins() {
        let rules = vec![
            rule(RuleAction::Allow, None),
            rule(RuleAction::Disallow, os_named("windows")),
        ];
        assert!(!applies(Some(&rules), &windows()));
        assert!(applies(Some(&rules), &linux()));
    }

    #[test]
    fn single_os_allow_defaults_to_disallow_elsewhere() {
        let rules = vec![rule(RuleAction::Allow, os_named("osx"))];
        assert!(!applies(Some(&rules), &linux()));
        assert!(applies(
            Some(&rules),
            &Platform::new(OsKind::Osx, "14.0", "aarch64")
        ));
    }

    #[test]
    fn version_regex_must_match_whole_string() {
        let rules = vec![rule(
            RuleAction::Allow,
            Some(RuleOs {
                version: Some("^10\\.".to_string()),
                ..RuleOs::default()
            }),
        )];
        assert!(!applies(Some(&rules), &windows()));

        let rules = vec![rule(
            RuleAction::Allow,
            Some(RuleOs {
                version: Some("10\\..*".to_string()),
                ..RuleOs::default()
            }),
        )];
        assert!(applies(Some(&rules), &windows()));
    }

    #[test]
    fn invalid_regex_is_a_non_match() {
        let rules = vec![rule(
            RuleAction::Allow,
            Some(RuleOs {
                version: Some("(".to_string()),
                ..RuleOs::default()
            }),
        )];
        assert!(!applies(Some(&rules), &windows()));
    }

    #[test]
    fn arch_filter_matches_current_cpu() {
        let rules = vec![rule(
            RuleAction::Allow,
            Some(RuleOs {
                arch: Some("x86".to_string()),
                ..RuleOs::default()
            }),
        )];
        assert!(applies(Some(&rules), &Platform::new(OsKind::Windows, "10.0", "x86")));
        assert!(!applies(Some(&rules), &windows()));
    }
}
