//! Which articles may join a new batch of a phase
//!
//! An article is eligible for phase P when it is not in any non-discarded
//! batch of P and, if P has a non-annulled predecessor, it sits in one of
//! that predecessor's completed batches. The first non-annulled phase draws
//! from every project article.

use litrev_common::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db;
use crate::models::{Article, Phase};

pub async fn eligible_articles(pool: &SqlitePool, phase: &Phase) -> Result<Vec<Article>> {
    let predecessor = db::phases::nearest_predecessor(pool, phase.project_id, phase.phase_number).await?;
    db::articles::eligible_articles(pool, phase.project_id, phase.id, predecessor.map(|p| p.id)).await
}

pub async fn eligible_article_ids(pool: &SqlitePool, phase: &Phase) -> Result<HashSet<Uuid>> {
    Ok(eligible_articles(pool, phase)
        .await?
        .into_iter()
        .map(|article| article.id)
        .collect())
}
