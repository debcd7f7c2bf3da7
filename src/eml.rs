//! One-shot parse of an EML document into the typed access-control model.
//!
//! The evaluator never touches XML; everything it needs is extracted here into a
//! `PackageDocument` so rule evaluation can be tested with hand-built nodes.

use crate::Result;
use crate::access::{AccessControlNode, AccessRule, Permission, Principal};
use ohno::IntoAppError;
use roxmltree::{Document, Node};

/// Log target for `eml`
const LOG_TARGET: &str = "       eml";

/// One physical-data-entity distribution that is reachable online.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDistribution {
    /// The entity's online-access URL, which doubles as its resource identifier.
    pub url: String,
    pub access: Option<AccessControlNode>,
}

/// The access-control structure of one package's metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageDocument {
    /// The package-level access node, if the document carries one.
    pub package_access: Option<AccessControlNode>,
    /// Entity distributions in document order.
    pub entities: Vec<EntityDistribution>,
}

/// Parse an EML document.
///
/// The package-level node is the `access` element directly under the document
/// root. Entity nodes are the `access` children of each `distribution` under
/// `dataset//physical`; distributions without an `online/url` are not resources
/// and are skipped.
///
/// # Errors
///
/// Returns an error if the document is not well-formed XML.
pub fn parse(document: &str) -> Result<PackageDocument> {
    let doc = Document::parse(document).into_app_err("unable to parse EML document")?;
    let root = doc.root_element();

    let package_access = child_element(root, "access").map(parse_access);

    let mut entities = Vec::new();
    if let Some(dataset) = child_element(root, "dataset") {
        for physical in dataset.descendants().filter(|n| is_element(n, "physical")) {
            for distribution in physical.children().filter(|n| is_element(n, "distribution")) {
                let url = child_element(distribution, "online")
                    .and_then(|online| child_element(online, "url"))
                    .and_then(|url| url.text())
                    .map(str::trim)
                    .filter(|url| !url.is_empty());

                if let Some(url) = url {
                    entities.push(EntityDistribution {
                        url: url.to_owned(),
                        access: child_element(distribution, "access").map(parse_access),
                    });
                }
            }
        }
    }

    Ok(PackageDocument { package_access, entities })
}

fn parse_access(access: Node<'_, '_>) -> AccessControlNode {
    let mut node = AccessControlNode::default();
    for child in access.children() {
        match child.tag_name().name() {
            "allow" => node.allows.push(parse_rule(child)),
            "deny" => node.denies.push(parse_rule(child)),
            _ => {}
        }
    }

    node
}

fn parse_rule(rule: Node<'_, '_>) -> AccessRule {
    let mut parsed = AccessRule::default();
    for child in rule.children() {
        match child.tag_name().name() {
            "principal" => {
                if let Some(text) = child.text() {
                    parsed.principals.push(Principal::parse(text));
                }
            }
            "permission" => {
                if let Some(text) = child.text() {
                    match Permission::parse(text) {
                        Some(permission) => parsed.permissions.push(permission),
                        None => {
                            log::debug!(target: LOG_TARGET, "Skipping unrecognized permission '{}'", text.trim());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    parsed
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_element(n, name))
}

fn is_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}
