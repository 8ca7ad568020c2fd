use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Public identifier of a node (conceptually its public key).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque DID identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DidId(String);

impl DidId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DidId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Personal,
    Business,
    Government,
}

impl NodeType {
    /// Roles a freshly created node of this type starts with.
    pub fn default_capabilities(self) -> BTreeSet<Capability> {
        use Capability::*;
        let caps: &[Capability] = match self {
            NodeType::Personal => &[TransferValue, ProduceBlocks],
            NodeType::Business => &[TransferValue, ProduceBlocks, RegisterAffiliates],
            NodeType::Government => &[
                TransferValue,
                ProduceBlocks,
                RegisterAffiliates,
                IssueDids,
                GovernmentAction,
                ResolveConflicts,
            ],
        };
        caps.iter().copied().collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    TransferValue,
    ProduceBlocks,
    RegisterAffiliates,
    IssueDids,
    GovernmentAction,
    ResolveConflicts,
}

/// An identity participating in the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub address: Address,
    pub title: String,
    pub node_type: NodeType,
    /// DIDs or free-form identifiers controlling this node.
    pub owners: BTreeSet<String>,
    pub affiliated_nodes: Vec<Address>,
    pub did_list: Vec<DidId>,
    /// Non-negative; only grows through recorded DID contributions.
    pub contribution: f64,
    pub capabilities: BTreeSet<Capability>,
}

impl Node {
    pub fn new<I, S>(
        title: impl Into<String>,
        address: impl Into<Address>,
        node_type: NodeType,
        owners: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            address: address.into(),
            title: title.into(),
            node_type,
            owners: owners.into_iter().map(Into::into).collect(),
            affiliated_nodes: Vec::new(),
            did_list: Vec::new(),
            contribution: 0.0,
            capabilities: node_type.default_capabilities(),
        }
    }

    /// Builder-style override of the starting contribution score.
    pub fn with_contribution(mut self, contribution: f64) -> Self {
        self.contribution = contribution;
        self
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Issuer-attested identifier binding a holder to a civil-contribution score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Did {
    pub did_id: DidId,
    pub civil_contribution: f64,
    pub contribution_history: Vec<f64>,
    pub current_contribution: f64,
    pub issuer_address: Address,
    pub holder_address: Address,
    is_valid: bool,
}

impl Did {
    /// Build a DID and fix its validity against the root node at this moment.
    ///
    /// The issuer is legitimate when it is the root itself or one of the root's
    /// own DIDs. Delegation is one level deep.
    pub fn new(
        did_id: DidId,
        civil_contribution: f64,
        issuer_address: Address,
        holder_address: Address,
        root_address: &Address,
        root_did_list: &[DidId],
    ) -> Self {
        let is_valid = issuer_address == *root_address
            || root_did_list.iter().any(|d| d.as_str() == issuer_address.as_str());

        Self {
            did_id,
            civil_contribution,
            contribution_history: vec![civil_contribution],
            current_contribution: 0.0,
            issuer_address,
            holder_address,
            is_valid,
        }
    }

    /// Validity as computed at construction. Never re-evaluated.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_equal_to_root_is_valid() {
        let root = Address::from("BCBOOK");
        let did = Did::new(
            DidId::from("did:1"),
            100.0,
            root.clone(),
            Address::from("alice"),
            &root,
            &[],
        );
        assert!(did.is_valid());
        assert_eq!(did.contribution_history, vec![100.0]);
        assert_eq!(did.current_contribution, 0.0);
    }

    #[test]
    fn issuer_in_root_did_list_is_valid() {
        let root = Address::from("BCBOOK");
        let did = Did::new(
            DidId::from("did:2"),
            5.0,
            Address::from("did:root-principal"),
            Address::from("bob"),
            &root,
            &[DidId::from("did:root-principal")],
        );
        assert!(did.is_valid());
    }

    #[test]
    fn unknown_issuer_is_invalid() {
        let root = Address::from("BCBOOK");
        let did = Did::new(
            DidId::from("did:3"),
            5.0,
            Address::from("mallory"),
            Address::from("bob"),
            &root,
            &[DidId::from("did:root-principal")],
        );
        assert!(!did.is_valid());
    }

    #[test]
    fn capabilities_follow_node_type() {
        let p = Node::new("Alice", "a", NodeType::Personal, ["x"]);
        let g = Node::new("Gov", "g", NodeType::Government, Vec::<String>::new());
        assert!(!p.can(Capability::IssueDids));
        assert!(g.can(Capability::IssueDids));
        assert!(g.can(Capability::ProduceBlocks));
    }

    #[test]
    fn node_type_serializes_lowercase() {
        let s = serde_json::to_string(&NodeType::Government).unwrap();
        assert_eq!(s, "\"government\"");
    }
}
