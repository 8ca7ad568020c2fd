//! Node and DID catalogs.
//!
//! The registry is the only owner of [`Node`] and [`Did`] records. Everyone
//! else refers to them by [`Address`] / [`DidId`] or reads cloned snapshots.

use std::collections::BTreeMap;

use pocc_types::{Address, Did, DidId, Node, NodeType};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("identity {0} is already registered")]
    DuplicateIdentity(String),
    #[error("parent node {0} is not registered")]
    UnknownParent(Address),
    #[error("issuer node {0} is not registered")]
    UnknownIssuer(Address),
    #[error("node {0} is not registered")]
    UnknownNode(Address),
    #[error("DID {0} is not registered")]
    UnknownDid(DidId),
    #[error("DID {0} was not issued by the root or one of its principals")]
    InvalidDid(DidId),
    #[error("node {0} cannot be its own affiliate")]
    SelfAffiliation(Address),
    #[error("government node {0} must have at least one owner")]
    OwnerlessNode(Address),
    #[error("contribution {0} must be finite and non-negative")]
    InvalidContribution(f64),
}

fn check_contribution(amount: f64) -> Result<(), RegistryError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(RegistryError::InvalidContribution(amount))
    }
}

/// Catalog of nodes keyed by address and DIDs keyed by id.
#[derive(Debug)]
pub struct IdentityRegistry {
    root: Address,
    nodes: BTreeMap<Address, Node>,
    dids: BTreeMap<DidId, Did>,
}

impl IdentityRegistry {
    /// Empty registry whose designated root will be `root`.
    ///
    /// The root node itself is registered like any other node.
    pub fn new(root: Address) -> Self {
        Self {
            root,
            nodes: BTreeMap::new(),
            dids: BTreeMap::new(),
        }
    }

    pub fn root_address(&self) -> &Address {
        &self.root
    }

    /// DID list of the root node; empty until the root is registered.
    pub fn root_did_list(&self) -> &[DidId] {
        self.nodes
            .get(&self.root)
            .map(|n| n.did_list.as_slice())
            .unwrap_or(&[])
    }

    /// Insert a node. Leaves the registry unchanged on error.
    ///
    /// `affiliated_nodes` and `did_list` belong to the registry: whatever the
    /// caller put there is discarded. The DID list is rebuilt from DIDs
    /// already registered for this address.
    pub fn insert_node(&mut self, mut node: Node) -> Result<(), RegistryError> {
        if self.nodes.contains_key(&node.address) {
            return Err(RegistryError::DuplicateIdentity(node.address.to_string()));
        }
        if node.node_type == NodeType::Government
            && node.owners.is_empty()
            && node.address != self.root
        {
            return Err(RegistryError::OwnerlessNode(node.address));
        }
        check_contribution(node.contribution)?;

        node.affiliated_nodes.clear();
        node.did_list = self
            .dids
            .values()
            .filter(|d| d.holder_address == node.address)
            .map(|d| d.did_id.clone())
            .collect();

        debug!(address = %node.address, node_type = ?node.node_type, "node registered");
        self.nodes.insert(node.address.clone(), node);
        Ok(())
    }

    /// Register `child` and record it under `parent`.
    pub fn insert_affiliate(&mut self, parent: &Address, child: Node) -> Result<(), RegistryError> {
        if !self.nodes.contains_key(parent) {
            return Err(RegistryError::UnknownParent(parent.clone()));
        }
        if child.address == *parent {
            return Err(RegistryError::SelfAffiliation(child.address));
        }

        let child_address = child.address.clone();
        self.insert_node(child)?;
        if let Some(p) = self.nodes.get_mut(parent) {
            p.affiliated_nodes.push(child_address);
        }
        Ok(())
    }

    /// Both parties of a DID application must already be known.
    pub fn check_application(
        &self,
        applicant: &Address,
        issuer: &Address,
    ) -> Result<(), RegistryError> {
        if !self.nodes.contains_key(applicant) {
            return Err(RegistryError::UnknownNode(applicant.clone()));
        }
        if !self.nodes.contains_key(issuer) {
            return Err(RegistryError::UnknownIssuer(issuer.clone()));
        }
        Ok(())
    }

    /// Build a DID whose validity is judged against the current root.
    pub fn mint_did(
        &self,
        did_id: DidId,
        civil_contribution: f64,
        issuer: Address,
        holder: Address,
    ) -> Result<Did, RegistryError> {
        check_contribution(civil_contribution)?;
        Ok(Did::new(
            did_id,
            civil_contribution,
            issuer,
            holder,
            &self.root,
            self.root_did_list(),
        ))
    }

    /// Insert a DID without looking at its validity.
    ///
    /// If the holder is registered the id is appended to its `did_list`.
    pub fn insert_did(&mut self, did: Did) -> Result<(), RegistryError> {
        if self.dids.contains_key(&did.did_id) {
            return Err(RegistryError::DuplicateIdentity(did.did_id.to_string()));
        }

        match self.nodes.get_mut(&did.holder_address) {
            Some(holder) => holder.did_list.push(did.did_id.clone()),
            None => debug!(holder = %did.holder_address, "DID holder not registered"),
        }
        debug!(
            did = %did.did_id,
            issuer = %did.issuer_address,
            valid = did.is_valid(),
            "DID registered"
        );
        self.dids.insert(did.did_id.clone(), did);
        Ok(())
    }

    /// Insert a DID only if it was validly issued.
    pub fn approve_did(&mut self, did: Did) -> Result<(), RegistryError> {
        if !did.is_valid() {
            return Err(RegistryError::InvalidDid(did.did_id));
        }
        self.insert_did(did)
    }

    /// True iff the DID exists, is valid and is held by `expected_holder`.
    pub fn verify_did(&self, did_id: &DidId, expected_holder: &Address) -> bool {
        self.dids
            .get(did_id)
            .is_some_and(|d| d.is_valid() && d.holder_address == *expected_holder)
    }

    /// Record later activity against a DID.
    ///
    /// Returns the holder's updated contribution, or `None` if the holder is
    /// not a registered node.
    pub fn record_contribution(
        &mut self,
        did_id: &DidId,
        amount: f64,
    ) -> Result<Option<f64>, RegistryError> {
        check_contribution(amount)?;
        let did = self
            .dids
            .get_mut(did_id)
            .ok_or_else(|| RegistryError::UnknownDid(did_id.clone()))?;

        did.contribution_history.push(amount);
        did.current_contribution += amount;

        let updated = self.nodes.get_mut(&did.holder_address).map(|node| {
            node.contribution += amount;
            node.contribution
        });
        Ok(updated)
    }

    pub fn node(&self, address: &Address) -> Option<&Node> {
        self.nodes.get(address)
    }

    pub fn did(&self, did_id: &DidId) -> Option<&Did> {
        self.dids.get(did_id)
    }

    pub fn contains_node(&self, address: &Address) -> bool {
        self.nodes.contains_key(address)
    }

    pub fn contribution_of(&self, address: &Address) -> Option<f64> {
        self.nodes.get(address).map(|n| n.contribution)
    }

    /// Nodes ordered by address.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// DIDs ordered by id.
    pub fn dids(&self) -> impl Iterator<Item = &Did> {
        self.dids.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn did_count(&self) -> usize {
        self.dids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn root() -> Node {
        Node::new("UBC", "BCBOOK", NodeType::Government, Vec::<String>::new())
    }

    fn registry() -> IdentityRegistry {
        let mut r = IdentityRegistry::new(Address::from("BCBOOK"));
        r.insert_node(root()).unwrap();
        r
    }

    fn personal(addr: &str) -> Node {
        Node::new(addr, addr, NodeType::Personal, Vec::<String>::new())
    }

    #[test]
    fn duplicate_address_rejected_and_first_kept() {
        let mut r = registry();
        r.insert_node(personal("alice")).unwrap();

        let mut imposter = personal("alice");
        imposter.title = "Imposter".into();
        let err = r.insert_node(imposter).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateIdentity("alice".into()));
        assert_eq!(r.node(&"alice".into()).unwrap().title, "alice");
        assert_eq!(r.node_count(), 2);
    }

    #[test]
    fn only_root_government_node_may_be_ownerless() {
        let mut r = registry();
        let gov = Node::new("Ministry", "gov", NodeType::Government, Vec::<String>::new());
        assert_eq!(
            r.insert_node(gov).unwrap_err(),
            RegistryError::OwnerlessNode("gov".into())
        );

        let owned = Node::new("Ministry", "gov", NodeType::Government, ["did:minister"]);
        r.insert_node(owned).unwrap();
    }

    #[test]
    fn affiliate_requires_parent_and_is_recorded() {
        let mut r = registry();
        let err = r.insert_affiliate(&"nope".into(), personal("a")).unwrap_err();
        assert_eq!(err, RegistryError::UnknownParent("nope".into()));
        assert!(!r.contains_node(&"a".into()));

        r.insert_affiliate(&"BCBOOK".into(), personal("a")).unwrap();
        assert_eq!(
            r.node(&"BCBOOK".into()).unwrap().affiliated_nodes,
            vec![Address::from("a")]
        );
    }

    #[test]
    fn node_cannot_affiliate_itself() {
        let mut r = registry();
        let err = r.insert_affiliate(&"BCBOOK".into(), root()).unwrap_err();
        assert_eq!(err, RegistryError::SelfAffiliation("BCBOOK".into()));
        assert!(r.node(&"BCBOOK".into()).unwrap().affiliated_nodes.is_empty());
    }

    #[test]
    fn caller_supplied_affiliations_are_discarded() {
        let mut r = registry();
        let mut selfie = personal("selfie");
        selfie.affiliated_nodes = vec!["selfie".into(), "other".into()];
        r.insert_node(selfie).unwrap();
        assert!(r.node(&"selfie".into()).unwrap().affiliated_nodes.is_empty());
    }

    #[test]
    fn caller_supplied_did_list_grants_no_delegation() {
        let mut r = IdentityRegistry::new(Address::from("BCBOOK"));
        let mut root = root();
        root.did_list = vec!["mallory".into()];
        r.insert_node(root).unwrap();

        assert!(r.root_did_list().is_empty());
        let forged = r
            .mint_did("did:m".into(), 1.0, "mallory".into(), "alice".into())
            .unwrap();
        assert!(!forged.is_valid());
    }

    #[test]
    fn late_registered_holder_picks_up_its_dids() {
        let mut r = registry();
        let did = r
            .mint_did("did:a".into(), 1.0, "BCBOOK".into(), "alice".into())
            .unwrap();
        r.insert_did(did).unwrap();

        r.insert_node(personal("alice")).unwrap();
        assert_eq!(r.node(&"alice".into()).unwrap().did_list, vec![DidId::from("did:a")]);
    }

    #[test]
    fn duplicate_affiliate_leaves_parent_untouched() {
        let mut r = registry();
        r.insert_node(personal("a")).unwrap();
        assert!(r.insert_affiliate(&"BCBOOK".into(), personal("a")).is_err());
        assert!(r.node(&"BCBOOK".into()).unwrap().affiliated_nodes.is_empty());
    }

    #[test]
    fn did_registration_links_holder_and_rejects_collision() {
        let mut r = registry();
        r.insert_node(personal("alice")).unwrap();
        let did = r
            .mint_did("did:a".into(), 100.0, "BCBOOK".into(), "alice".into())
            .unwrap();
        assert!(did.is_valid());

        r.insert_did(did.clone()).unwrap();
        assert_eq!(r.node(&"alice".into()).unwrap().did_list, vec![DidId::from("did:a")]);
        assert_eq!(
            r.insert_did(did).unwrap_err(),
            RegistryError::DuplicateIdentity("did:a".into())
        );
    }

    #[test]
    fn root_principal_can_issue_one_level_down() {
        let mut r = registry();
        let principal = r
            .mint_did("did:principal".into(), 1.0, "BCBOOK".into(), "BCBOOK".into())
            .unwrap();
        r.insert_did(principal).unwrap();

        let delegated = r
            .mint_did("did:bob".into(), 1.0, "did:principal".into(), "bob".into())
            .unwrap();
        assert!(delegated.is_valid());
        r.insert_did(delegated).unwrap();

        // did:bob is not in the root's list, so it cannot delegate further.
        let second_hop = r
            .mint_did("did:carol".into(), 1.0, "did:bob".into(), "carol".into())
            .unwrap();
        assert!(!second_hop.is_valid());
    }

    #[test]
    fn approval_rejects_invalid_did() {
        let mut r = registry();
        let forged = r
            .mint_did("did:x".into(), 1.0, "mallory".into(), "alice".into())
            .unwrap();
        assert_eq!(
            r.approve_did(forged).unwrap_err(),
            RegistryError::InvalidDid("did:x".into())
        );
        assert_eq!(r.did_count(), 0);
    }

    #[test]
    fn invalid_did_is_still_recorded_but_fails_verification() {
        let mut r = registry();
        let forged = r
            .mint_did("did:x".into(), 1.0, "mallory".into(), "alice".into())
            .unwrap();
        r.insert_did(forged).unwrap();
        assert!(!r.verify_did(&"did:x".into(), &"alice".into()));
    }

    #[test]
    fn verify_checks_holder() {
        let mut r = registry();
        let did = r
            .mint_did("did:a".into(), 1.0, "BCBOOK".into(), "alice".into())
            .unwrap();
        r.insert_did(did).unwrap();
        assert!(r.verify_did(&"did:a".into(), &"alice".into()));
        assert!(!r.verify_did(&"did:a".into(), &"bob".into()));
        assert!(!r.verify_did(&"did:missing".into(), &"alice".into()));
    }

    #[test]
    fn contribution_flows_to_did_and_holder() {
        let mut r = registry();
        r.insert_node(personal("alice")).unwrap();
        let did = r
            .mint_did("did:a".into(), 100.0, "BCBOOK".into(), "alice".into())
            .unwrap();
        r.insert_did(did).unwrap();

        assert_eq!(r.record_contribution(&"did:a".into(), 0.25).unwrap(), Some(0.25));
        assert_eq!(r.record_contribution(&"did:a".into(), 0.5).unwrap(), Some(0.75));

        let did = r.did(&"did:a".into()).unwrap();
        assert_eq!(did.contribution_history, vec![100.0, 0.25, 0.5]);
        assert_eq!(did.current_contribution, 0.75);
        assert_eq!(did.civil_contribution, 100.0);

        assert!(matches!(
            r.record_contribution(&"did:a".into(), -1.0),
            Err(RegistryError::InvalidContribution(_))
        ));
        assert_eq!(
            r.record_contribution(&"did:none".into(), 1.0).unwrap_err(),
            RegistryError::UnknownDid("did:none".into())
        );
    }

    #[test]
    fn application_requires_known_parties() {
        let mut r = registry();
        r.insert_node(personal("alice")).unwrap();
        assert!(r.check_application(&"alice".into(), &"BCBOOK".into()).is_ok());
        assert_eq!(
            r.check_application(&"bob".into(), &"BCBOOK".into()).unwrap_err(),
            RegistryError::UnknownNode("bob".into())
        );
        assert_eq!(
            r.check_application(&"alice".into(), &"nobody".into()).unwrap_err(),
            RegistryError::UnknownIssuer("nobody".into())
        );
    }

    proptest! {
        #[test]
        fn addresses_stay_unique(addrs in proptest::collection::vec("[a-e]", 1..40)) {
            let mut r = IdentityRegistry::new(Address::from("root"));
            let mut seen = std::collections::BTreeSet::new();
            for a in &addrs {
                let res = r.insert_node(personal(a));
                prop_assert_eq!(res.is_ok(), seen.insert(a.clone()));
            }
            prop_assert_eq!(r.node_count(), seen.len());
        }
    }
}
