/// The subject of an access rule.
///
/// The distinguished principals `public` and `authenticated` are matched exactly;
/// anything else is a named account or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Public,
    Authenticated,
    Named(Box<str>),
}

impl Principal {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "public" => Self::Public,
            "authenticated" => Self::Authenticated,
            other => Self::Named(Box::from(other)),
        }
    }
}

/// A permission named by an access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    ChangePermission,
    All,
}

impl Permission {
    /// Parse a permission string; unrecognized values yield `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "changePermission" => Some(Self::ChangePermission),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// One allow or deny rule: a set of principals crossed with a set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessRule {
    pub principals: Vec<Principal>,
    pub permissions: Vec<Permission>,
}

impl AccessRule {
    /// A rule contributes only if it names the target principal AND grants at
    /// least one of the target permissions.
    #[must_use]
    pub fn matches(&self, principal: &Principal, permissions: &[Permission]) -> bool {
        self.principals.contains(principal) && self.permissions.iter().any(|p| permissions.contains(p))
    }
}

/// The access rules attached to a package or to one entity distribution.
///
/// An entirely absent node is represented as `Option::<&AccessControlNode>::None`
/// by callers; absence is a meaningful input to the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessControlNode {
    pub allows: Vec<AccessRule>,
    pub denies: Vec<AccessRule>,
}

impl AccessControlNode {
    #[must_use]
    pub fn new(allows: Vec<AccessRule>, denies: Vec<AccessRule>) -> Self {
        Self { allows, denies }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_parsing_distinguishes_special_values() {
        assert_eq!(Principal::parse("public"), Principal::Public);
        assert_eq!(Principal::parse(" authenticated "), Principal::Authenticated);
        assert_eq!(
            Principal::parse("uid=EDI,o=EDI,dc=edirepository,dc=org"),
            Principal::Named(Box::from("uid=EDI,o=EDI,dc=edirepository,dc=org"))
        );
    }

    #[test]
    fn permission_parsing_skips_unknown_values() {
        assert_eq!(Permission::parse("read"), Some(Permission::Read));
        assert_eq!(Permission::parse("changePermission"), Some(Permission::ChangePermission));
        assert_eq!(Permission::parse("execute"), None);
    }

    #[test]
    fn rule_matching_is_conjunctive() {
        let rule = AccessRule {
            principals: vec![Principal::Public, Principal::Named(Box::from("uid=x"))],
            permissions: vec![Permission::Write],
        };

        assert!(rule.matches(&Principal::Public, &[Permission::Read, Permission::Write]));
        assert!(!rule.matches(&Principal::Public, &[Permission::Read]));
        assert!(!rule.matches(&Principal::Authenticated, &[Permission::Write]));
    }
}
