use super::node::{AccessControlNode, Permission, Principal};
use crate::Result;
use ohno::bail;

/// Log target for `evaluator`
const LOG_TARGET: &str = " evaluator";

/// Permissions that count as an affirmative grant of read access or broader.
const READ_OR_BROADER: [Permission; 4] = [
    Permission::Read,
    Permission::Write,
    Permission::ChangePermission,
    Permission::All,
];

/// How a resource is embargoed. "Not embargoed" is `Option::<EmbargoCategory>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbargoCategory {
    /// Established by an affirmative `deny(public, read)` rule.
    Explicit,
    /// Established by the absence of an affirmative public-read grant.
    Implicit,
}

impl EmbargoCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Implicit => "implicit",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "explicit" => Ok(Self::Explicit),
            "implicit" => Ok(Self::Implicit),
            other => bail!("unknown embargo category: {other}"),
        }
    }
}

/// The evaluator's decision for one access-control node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub category: Option<EmbargoCategory>,
    pub allows_authenticated: bool,
}

/// Decide the embargo category for a node, honoring a category inherited from the
/// enclosing package.
///
/// An explicit package-level embargo propagates unconditionally to every contained
/// entity. An implicit one can be opted out of by an entity node that affirmatively
/// grants `public` read access or broader. With no inherited category, the node is
/// explicit on a `deny(public, read)` rule, not embargoed on a public grant of
/// read-or-broader, and implicit otherwise, including when the node is entirely
/// absent (silence means embargoed).
#[must_use]
pub fn classify(node: Option<&AccessControlNode>, inherited: Option<EmbargoCategory>) -> Verdict {
    let category = match inherited {
        Some(EmbargoCategory::Explicit) => Some(EmbargoCategory::Explicit),
        Some(EmbargoCategory::Implicit) => {
            if grants_public_read(node) {
                None
            } else {
                Some(EmbargoCategory::Implicit)
            }
        }
        None => {
            if denies_public_read(node) {
                Some(EmbargoCategory::Explicit)
            } else if grants_public_read(node) {
                None
            } else {
                Some(EmbargoCategory::Implicit)
            }
        }
    };

    Verdict {
        category,
        allows_authenticated: allows_authenticated(node),
    }
}

/// `true` if the node grants the `authenticated` principal read access or broader.
///
/// A grant broader than `read` is a policy smell and is logged, but the outcome is
/// the same.
#[must_use]
pub fn allows_authenticated(node: Option<&AccessControlNode>) -> bool {
    let Some(node) = node else {
        return false;
    };

    let mut allowed = false;
    for rule in &node.allows {
        if rule.matches(&Principal::Authenticated, &READ_OR_BROADER) {
            allowed = true;
            if !rule.matches(&Principal::Authenticated, &[Permission::Read]) {
                log::warn!(target: LOG_TARGET, "Over-privileged authenticated grant: {:?}", rule.permissions);
            }
        }
    }

    allowed
}

/// Only an exact `public` + `read` deny counts as an explicit embargo.
fn denies_public_read(node: Option<&AccessControlNode>) -> bool {
    node.is_some_and(|n| n.denies.iter().any(|rule| rule.matches(&Principal::Public, &[Permission::Read])))
}

/// An affirmative public grant of read-or-broader; absent nodes grant nothing.
fn grants_public_read(node: Option<&AccessControlNode>) -> bool {
    node.is_some_and(|n| n.allows.iter().any(|rule| rule.matches(&Principal::Public, &READ_OR_BROADER)))
}
