//! Referral graph read handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::graph::ReferralTreeNode;
use crate::startup::AppState;

/// Flat downline of a referral code.
#[derive(Debug, Serialize)]
pub struct DownlineResponse {
    pub referral_code: String,
    pub total: u64,
    pub user_ids: Vec<Uuid>,
}

/// All transitive referrals of a code.
pub async fn downline(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<DownlineResponse>, AppError> {
    let root = state
        .referrals
        .user_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("unknown referral code {}", code)))?;

    let user_ids = state.graph.transitive_referrals(&root.referral_code).await?;

    Ok(Json(DownlineResponse {
        referral_code: code,
        total: user_ids.len() as u64,
        user_ids,
    }))
}

/// Referral tree report rooted at a code.
pub async fn tree(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ReferralTreeNode>, AppError> {
    let node = state
        .graph
        .build_tree(&code)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("unknown referral code {}", code)))?;

    Ok(Json(node))
}
