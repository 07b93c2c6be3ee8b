//! Access rule aggregation
//!
//! Rules are kept exactly as declared on the Role or ClusterRole. The only
//! normalization is de-duplication of fully identical rules; near-identical
//! rules are never merged and wildcards are never expanded, so the rendered
//! text never over-states what a role grants.

use std::collections::BTreeSet;

use k8s_openapi::api::rbac::v1::PolicyRule;

/// A single access rule
///
/// Field order defines the render order: verbs first, then API groups,
/// then resources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rule {
    /// Verbs (get, list, watch, ...)
    pub verbs: BTreeSet<String>,
    /// API groups; the core group is the empty string
    pub api_groups: BTreeSet<String>,
    /// Resources, possibly with subresources (pods/log)
    pub resources: BTreeSet<String>,
    /// Restricts the rule to named objects when non-empty
    pub resource_names: BTreeSet<String>,
    /// Non-resource URLs (/healthz, /metrics)
    pub non_resource_urls: BTreeSet<String>,
}

fn to_set(values: Option<&Vec<String>>) -> BTreeSet<String> {
    values.map(|v| v.iter().cloned().collect()).unwrap_or_default()
}

impl From<&PolicyRule> for Rule {
    fn from(rule: &PolicyRule) -> Self {
        Self {
            verbs: rule.verbs.iter().cloned().collect(),
            api_groups: to_set(rule.api_groups.as_ref()),
            resources: to_set(rule.resources.as_ref()),
            resource_names: to_set(rule.resource_names.as_ref()),
            non_resource_urls: to_set(rule.non_resource_urls.as_ref()),
        }
    }
}

impl Rule {
    /// Render as one line: `<verbs> <targets>`
    ///
    /// Targets use the kubectl `resource.group` form; core-group resources
    /// are bare. Resource names follow in brackets.
    pub fn render(&self) -> String {
        let verbs = if self.verbs.is_empty() {
            "<none>".to_string()
        } else {
            join(&self.verbs)
        };

        let mut targets: Vec<String> = Vec::new();
        if !self.resources.is_empty() {
            let groups: Vec<&str> = if self.api_groups.is_empty() {
                vec![""]
            } else {
                self.api_groups.iter().map(String::as_str).collect()
            };
            for group in &groups {
                for resource in &self.resources {
                    if group.is_empty() {
                        targets.push(resource.clone());
                    } else {
                        targets.push(format!("{}.{}", resource, group));
                    }
                }
            }
        }
        targets.extend(self.non_resource_urls.iter().cloned());

        let mut line = format!("{} {}", verbs, targets.join(","));
        if !self.resource_names.is_empty() {
            line.push_str(&format!(" [{}]", join(&self.resource_names)));
        }
        line.trim_end().to_string()
    }
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(",")
}

/// De-duplicated, deterministically ordered rules of one role
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: BTreeSet<Rule>,
}

impl RuleSet {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `rules` field of a Role or ClusterRole
    pub fn from_policy_rules(rules: Option<&Vec<PolicyRule>>) -> Self {
        let mut set = Self::new();
        for rule in rules.into_iter().flatten() {
            set.insert(Rule::from(rule));
        }
        set
    }

    /// Add a rule; returns false if an identical rule was already present
    pub fn insert(&mut self, rule: Rule) -> bool {
        self.rules.insert(rule)
    }

    /// Union with another rule set (used when two objects share an identity)
    pub fn merge(&mut self, other: RuleSet) {
        self.rules.extend(other.rules);
    }

    /// Number of distinct rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the role grants nothing
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// One rendered line per rule, in render order
    pub fn render_lines(&self) -> Vec<String> {
        self.rules.iter().map(Rule::render).collect()
    }
}
