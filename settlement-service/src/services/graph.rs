//! Referral graph accessor.
//!
//! The referral graph is not structurally acyclic: `referred_by` is a
//! loosely-validated pointer by code. Every traversal therefore carries a
//! visited set, and the tree report additionally caps depth.

use crate::services::store::ReferralStore;
use futures::future::BoxFuture;
use serde::Serialize;
use service_core::error::AppError;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Depth cap for the tree report, guarding alongside the visited set.
pub const MAX_TREE_DEPTH: u32 = 10;

/// One node of the referral tree report.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralTreeNode {
    pub user_id: Uuid,
    pub name: String,
    pub referral_code: String,
    pub approved: bool,
    /// Direct referrals of this node.
    pub direct_count: u64,
    /// Descendants beyond the direct referrals.
    pub indirect_count: u64,
    /// Approved users among the direct referrals.
    pub approved_count: u64,
    pub children: Vec<ReferralTreeNode>,
}

/// Resolves direct and transitive referral relationships from a referral
/// code.
#[derive(Clone)]
pub struct ReferralGraph {
    store: Arc<dyn ReferralStore>,
}

impl ReferralGraph {
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        Self { store }
    }

    /// All users directly referred by the given code.
    pub async fn direct_referrals(
        &self,
        referral_code: &str,
    ) -> Result<Vec<crate::models::User>, AppError> {
        self.store.direct_referrals(referral_code).await
    }

    /// Breadth-first walk of the full downstream subtree.
    ///
    /// Returns the flat set of discovered user ids, each exactly once. The
    /// visited set is keyed by referral code so cyclic data terminates.
    #[instrument(skip(self))]
    pub async fn transitive_referrals(&self, referral_code: &str) -> Result<Vec<Uuid>, AppError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<String> = VecDeque::new();
        let mut discovered: Vec<Uuid> = Vec::new();
        let mut discovered_ids: HashSet<Uuid> = HashSet::new();

        visited.insert(referral_code.to_string());
        frontier.push_back(referral_code.to_string());

        while let Some(current) = frontier.pop_front() {
            for child in self.store.direct_referrals(&current).await? {
                if discovered_ids.insert(child.id) {
                    discovered.push(child.id);
                }
                if visited.insert(child.referral_code.clone()) {
                    frontier.push_back(child.referral_code);
                }
            }
        }

        Ok(discovered)
    }

    /// Referral tree report rooted at the given code, capped at
    /// [`MAX_TREE_DEPTH`]. Returns `None` when the code resolves to no user.
    #[instrument(skip(self))]
    pub async fn build_tree(
        &self,
        root_code: &str,
    ) -> Result<Option<ReferralTreeNode>, AppError> {
        let root = match self.store.user_by_code(root_code).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root.referral_code.clone());
        let node = self.build_node(root, 0, &mut visited).await?;
        Ok(Some(node))
    }

    fn build_node<'a>(
        &'a self,
        user: crate::models::User,
        depth: u32,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<ReferralTreeNode, AppError>> {
        Box::pin(async move {
            let mut children = Vec::new();

            if depth < MAX_TREE_DEPTH {
                for child in self.store.direct_referrals(&user.referral_code).await? {
                    if !visited.insert(child.referral_code.clone()) {
                        continue;
                    }
                    children.push(self.build_node(child, depth + 1, visited).await?);
                }
            }

            let direct_count = children.len() as u64;
            let indirect_count = children
                .iter()
                .map(|c| c.direct_count + c.indirect_count)
                .sum();
            let approved_count = children.iter().filter(|c| c.approved).count() as u64;

            Ok(ReferralTreeNode {
                user_id: user.id,
                name: user.name,
                referral_code: user.referral_code,
                approved: user.approved,
                direct_count,
                indirect_count,
                approved_count,
                children,
            })
        })
    }
}
