//! Permission evaluator.
//!
//! Pure decision functions over a rule snapshot:
//! - No IO
//! - No panics
//! - Same inputs, same answer, until the rule table changes

use std::collections::HashMap;

use serde::Serialize;

use rolegate_core::RoleId;

use crate::permissions::{Action, CapabilityPair, Capabilities};

/// Breadth of access granted for a scoped action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadScope {
    /// Every record.
    All,
    /// Only records the requester owns.
    OwnOnly,
}

impl ReadScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadScope::All => "all",
            ReadScope::OwnOnly => "own_only",
        }
    }
}

/// Decide a single request against the rule found for (role, element).
///
/// `rule` is `None` when the role is absent or no rule exists; both deny.
/// `is_owner` is ignored for [`Action::Create`].
pub fn decide(rule: Option<&Capabilities>, action: Action, is_owner: bool) -> bool {
    let Some(caps) = rule else {
        return false;
    };

    match caps.scoped(action) {
        None => caps.create,
        Some(CapabilityPair { own, all }) => all || (is_owner && own),
    }
}

/// Classify access before any specific record is known.
///
/// Probes with `is_owner = false` then `is_owner = true`. `None` means no
/// access at all.
pub fn scope(rule: Option<&Capabilities>, action: Action) -> Option<ReadScope> {
    if decide(rule, action, false) {
        Some(ReadScope::All)
    } else if decide(rule, action, true) {
        Some(ReadScope::OwnOnly)
    } else {
        None
    }
}

/// Scope of the `read` action, used by collection endpoints.
pub fn read_scope(rule: Option<&Capabilities>) -> Option<ReadScope> {
    scope(rule, Action::Read)
}

/// Immutable (role, element) → capabilities table.
///
/// Evaluates the full `decide(role, element, action, is_owner)` contract
/// without touching storage.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    rules: HashMap<(RoleId, String), Capabilities>,
}

impl RuleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. Returns `false` (and keeps the existing rule) if the pair
    /// is already present.
    pub fn insert(&mut self, role: RoleId, element: impl Into<String>, caps: Capabilities) -> bool {
        use std::collections::hash_map::Entry;

        match self.rules.entry((role, element.into())) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(caps);
                true
            }
        }
    }

    pub fn rule(&self, role: Option<RoleId>, element: &str) -> Option<&Capabilities> {
        let role = role?;
        self.rules.get(&(role, element.to_string()))
    }

    pub fn decide(&self, role: Option<RoleId>, element: &str, action: Action, is_owner: bool) -> bool {
        decide(self.rule(role, element), action, is_owner)
    }

    pub fn scope(&self, role: Option<RoleId>, element: &str, action: Action) -> Option<ReadScope> {
        scope(self.rule(role, element), action)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<(RoleId, String, Capabilities)> for RuleSnapshot {
    fn from_iter<T: IntoIterator<Item = (RoleId, String, Capabilities)>>(iter: T) -> Self {
        let mut snapshot = RuleSnapshot::new();
        for (role, element, caps) in iter {
            snapshot.insert(role, element, caps);
        }
        snapshot
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Answers "why was this request allowed/denied?" without changing the
/// decision itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub element: String,
    pub action: Action,
    pub is_owner: bool,

    /// Whether the authorization was granted.
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Role name of the requester, if any.
    pub role: Option<String>,

    /// Flags of the matching rule, if one exists.
    pub capabilities: Option<Capabilities>,

    /// Scope the requester would get for this action on a collection.
    pub scope: Option<ReadScope>,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NoRole,
    NoRule,
    MissingCapability,
    NotOwner,
}

/// Explain the decision `decide(rule, action, is_owner)` would make.
pub fn explain(
    role: Option<&str>,
    element: &str,
    rule: Option<&Capabilities>,
    action: Action,
    is_owner: bool,
) -> AuthorizationExplanation {
    let granted = decide(rule, action, is_owner);
    let base = AuthorizationExplanation {
        element: element.to_string(),
        action,
        is_owner,
        granted,
        reason: String::new(),
        role: role.map(str::to_string),
        capabilities: rule.copied(),
        scope: scope(rule, action),
        denial_reason: None,
    };

    let Some(role) = role else {
        return AuthorizationExplanation {
            reason: "Requester has no role; roleless users hold no permissions".to_string(),
            denial_reason: Some(DenialReason {
                kind: DenialKind::NoRole,
                message: "No role assigned".to_string(),
                suggestions: vec!["Assign a role to the user".to_string()],
            }),
            ..base
        };
    };

    let Some(caps) = rule else {
        return AuthorizationExplanation {
            reason: format!("No rule defined for role '{role}' on element '{element}'"),
            denial_reason: Some(DenialReason {
                kind: DenialKind::NoRule,
                message: format!("Missing rule ({role}, {element})"),
                suggestions: vec![format!(
                    "Create an access rule for role '{role}' on element '{element}'"
                )],
            }),
            ..base
        };
    };

    match caps.scoped(action) {
        None if granted => AuthorizationExplanation {
            reason: format!("Role '{role}' may create '{element}'"),
            ..base
        },
        None => AuthorizationExplanation {
            reason: format!("Role '{role}' lacks the create flag on '{element}'"),
            denial_reason: Some(DenialReason {
                kind: DenialKind::MissingCapability,
                message: "create flag is false".to_string(),
                suggestions: vec![format!("Set create=true on the ({role}, {element}) rule")],
            }),
            ..base
        },
        Some(pair) if pair.all => AuthorizationExplanation {
            reason: format!("Role '{role}' may {action} every '{element}' record"),
            ..base
        },
        Some(pair) if pair.own && is_owner => AuthorizationExplanation {
            reason: format!("Role '{role}' may {action} its own '{element}' record"),
            ..base
        },
        Some(pair) if pair.own => AuthorizationExplanation {
            reason: format!("Role '{role}' may only {action} its own '{element}' records"),
            denial_reason: Some(DenialReason {
                kind: DenialKind::NotOwner,
                message: "Target record belongs to another user".to_string(),
                suggestions: vec![format!("Set {action}_all=true on the ({role}, {element}) rule")],
            }),
            ..base
        },
        Some(_) => AuthorizationExplanation {
            reason: format!("Role '{role}' has neither {action} nor {action}_all on '{element}'"),
            denial_reason: Some(DenialReason {
                kind: DenialKind::MissingCapability,
                message: format!("{action} and {action}_all flags are false"),
                suggestions: vec![format!(
                    "Set {action} or {action}_all on the ({role}, {element}) rule"
                )],
            }),
            ..base
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
