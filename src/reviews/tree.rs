//! Forest assembly for a book's review threads.
//!
//! The input is the flat review list in load order (oldest first). Nodes live in
//! an arena indexed by load position; links are child-index lists, so children
//! never point back at their parents. Assembly is an iterative post-order walk,
//! which keeps stack usage flat however deep a thread grows.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::Review;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewNode {
    pub id: i64,
    pub book_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
    pub comment: String,
    pub display_name: String,
    pub avatar_url: String,
    pub created_at: i64,
    pub children: Vec<ReviewNode>,
}

impl From<Review> for ReviewNode {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            book_id: review.book_id,
            parent_id: review.parent_id,
            user_id: review.user_id,
            enrollment_id: review.enrollment_id,
            rating: review.rating,
            comment: review.comment,
            display_name: review.display_name,
            avatar_url: review.avatar_url,
            created_at: review.created_at,
            children: Vec::new(),
        }
    }
}

/// Builds the ordered forest from reviews already sorted oldest first.
///
/// A review is a root when it has no parent, when its parent is not part of
/// `reviews` (orphans are surfaced, not dropped), or when it names itself.
pub fn build_forest(reviews: Vec<Review>) -> Vec<ReviewNode> {
    let index: HashMap<i64, usize> = reviews.iter().enumerate().map(|(i, r)| (r.id, i)).collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); reviews.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (i, review) in reviews.iter().enumerate() {
        match review.parent_id.and_then(|pid| index.get(&pid).copied()) {
            Some(parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let mut pending: Vec<Option<ReviewNode>> = reviews.into_iter().map(|r| Some(ReviewNode::from(r))).collect();
    let mut built: Vec<Option<ReviewNode>> = vec![None; pending.len()];

    let mut forest = Vec::with_capacity(roots.len());
    for root in roots {
        // (node, children already built?)
        let mut stack = vec![(root, false)];
        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                if let Some(mut node) = pending[idx].take() {
                    node.children = children[idx].iter().filter_map(|&c| built[c].take()).collect();
                    built[idx] = Some(node);
                }
            } else {
                stack.push((idx, true));
                for &child in children[idx].iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        if let Some(node) = built[root].take() {
            forest.push(node);
        }
    }
    forest
}

/// Number of nodes in a forest, counted iteratively.
pub fn count_nodes(forest: &[ReviewNode]) -> usize {
    let mut stack: Vec<&ReviewNode> = forest.iter().collect();
    let mut count = 0;
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}
