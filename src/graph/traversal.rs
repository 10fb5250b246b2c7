//! Multi-hop traversals over the e-commerce graph
//!
//! These are the graph-side access patterns: each starts from a vertex found
//! through the unique key index (or a label scan) and walks relationship
//! edges. Results come back as canonical entities.

use super::mapping::{to_entity, vertex_key};
use super::property::PropertyValue;
use super::store::GraphStore;
use super::types::{EdgeLabel, Label, VertexId};
use super::vertex::Vertex;
use super::GraphResult;
use crate::binding::StoreBinding;
use crate::model::{Entity, EntityKind};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// Rating at or above which a review counts as "liked"
pub const LIKED_RATING: i64 = 4;

pub struct GraphTraversal<'a> {
    store: &'a GraphStore,
    binding: &'a StoreBinding,
}

impl<'a> GraphTraversal<'a> {
    pub fn new(store: &'a GraphStore, binding: &'a StoreBinding) -> Self {
        Self { store, binding }
    }

    /// Edge label running `from -> holder`
    fn edge(&self, from: EntityKind, holder: EntityKind) -> EdgeLabel {
        self.binding
            .for_kind(holder)
            .references
            .iter()
            .find(|r| r.from_kind == from)
            .map(|r| EdgeLabel::new(r.edge_label.as_str()))
            .unwrap_or_else(|| EdgeLabel::new(""))
    }

    fn label(&self, kind: EntityKind) -> Label {
        Label::new(self.binding.for_kind(kind).vertex_label.as_str())
    }

    fn vertex(&self, kind: EntityKind, key: &str) -> Option<&'a Vertex> {
        self.store.lookup(&vertex_key(self.binding, kind, key))
    }

    fn entity(&self, kind: EntityKind, vertex: &Vertex) -> GraphResult<Entity> {
        to_entity(self.binding, kind, vertex)
    }

    fn entities(&self, kind: EntityKind, vertices: Vec<&Vertex>) -> GraphResult<Vec<Entity>> {
        vertices.into_iter().map(|v| self.entity(kind, v)).collect()
    }

    /// Reviews authored by `user`
    fn reviews_by(&self, user: VertexId) -> Vec<&'a Vertex> {
        self.store
            .out_neighbors(user, &self.edge(EntityKind::User, EntityKind::Review))
    }

    /// The product a review belongs to
    fn product_of(&self, review: VertexId) -> Option<&'a Vertex> {
        self.store
            .in_neighbors(review, &self.edge(EntityKind::Product, EntityKind::Review))
            .into_iter()
            .next()
    }

    /// The author of a review
    fn author_of(&self, review: VertexId) -> Option<&'a Vertex> {
        self.store
            .in_neighbors(review, &self.edge(EntityKind::User, EntityKind::Review))
            .into_iter()
            .next()
    }

    fn rating(review: &Vertex) -> i64 {
        review
            .get_property("rating")
            .and_then(PropertyValue::as_integer)
            .unwrap_or(0)
    }

    pub fn find_user_by_username(&self, username: &str) -> GraphResult<Option<Entity>> {
        let property = self
            .binding
            .user
            .field("username")
            .map(|f| f.property.as_str())
            .unwrap_or("username");
        self.store
            .find_by_property(&self.label(EntityKind::User), property, &username.into())
            .into_iter()
            .next()
            .map(|v| self.entity(EntityKind::User, v))
            .transpose()
    }

    /// A user's orders, newest first
    pub fn user_orders(&self, user_key: &str, limit: usize) -> GraphResult<Vec<Entity>> {
        let Some(user) = self.vertex(EntityKind::User, user_key) else {
            return Ok(vec![]);
        };
        let orders = self
            .store
            .out_neighbors(user.id, &self.edge(EntityKind::User, EntityKind::Order));
        let mut orders = self.entities(EntityKind::Order, orders)?;
        newest_first(&mut orders, "order_date");
        orders.truncate(limit);
        Ok(orders)
    }

    /// A product's reviews, newest first
    pub fn product_reviews(&self, product_key: &str, limit: usize) -> GraphResult<Vec<Entity>> {
        let Some(product) = self.vertex(EntityKind::Product, product_key) else {
            return Ok(vec![]);
        };
        let reviews = self
            .store
            .out_neighbors(product.id, &self.edge(EntityKind::Product, EntityKind::Review));
        let mut reviews = self.entities(EntityKind::Review, reviews)?;
        newest_first(&mut reviews, "review_date");
        reviews.truncate(limit);
        Ok(reviews)
    }

    /// Distinct users who reviewed a product
    pub fn reviewers_of_product(&self, product_key: &str) -> GraphResult<Vec<Entity>> {
        let Some(product) = self.vertex(EntityKind::Product, product_key) else {
            return Ok(vec![]);
        };
        let mut seen = HashSet::new();
        let reviewers: Vec<&Vertex> = self
            .store
            .out_neighbors(product.id, &self.edge(EntityKind::Product, EntityKind::Review))
            .into_iter()
            .filter_map(|review| self.author_of(review.id))
            .filter(|user| seen.insert(user.id))
            .collect();
        self.entities(EntityKind::User, reviewers)
    }

    /// Products liked by users who reviewed the same products as `user_key`,
    /// excluding products the user already reviewed. Ranked by the number of
    /// liking co-reviewers.
    pub fn recommendations(&self, user_key: &str, limit: usize) -> GraphResult<Vec<(Entity, usize)>> {
        let Some(user) = self.vertex(EntityKind::User, user_key) else {
            return Ok(vec![]);
        };

        let own_products: HashSet<VertexId> = self
            .reviews_by(user.id)
            .into_iter()
            .filter_map(|r| self.product_of(r.id))
            .map(|p| p.id)
            .collect();

        let mut co_reviewers = HashSet::new();
        for product in &own_products {
            for review in self
                .store
                .out_neighbors(*product, &self.edge(EntityKind::Product, EntityKind::Review))
            {
                if let Some(author) = self.author_of(review.id) {
                    if author.id != user.id {
                        co_reviewers.insert(author.id);
                    }
                }
            }
        }

        let mut scores: HashMap<VertexId, usize> = HashMap::new();
        for reviewer in co_reviewers {
            for review in self.reviews_by(reviewer) {
                if Self::rating(review) < LIKED_RATING {
                    continue;
                }
                if let Some(product) = self.product_of(review.id) {
                    if !own_products.contains(&product.id) {
                        *scores.entry(product.id).or_default() += 1;
                    }
                }
            }
        }

        self.ranked(EntityKind::Product, scores, limit)
    }

    /// Products in `category` with at least one review rated `min_rating` or more
    pub fn high_rated_in_category(
        &self,
        category: &str,
        min_rating: i64,
        limit: usize,
    ) -> GraphResult<Vec<Entity>> {
        let has_review = self.edge(EntityKind::Product, EntityKind::Review);
        let mut products: Vec<&Vertex> = self
            .store
            .find_by_property(&self.label(EntityKind::Product), "category", &category.into())
            .into_iter()
            .filter(|p| {
                self.store
                    .out_neighbors(p.id, &has_review)
                    .into_iter()
                    .any(|r| Self::rating(r) >= min_rating)
            })
            .collect();
        products.sort_by_key(|p| p.id);
        products.truncate(limit);
        self.entities(EntityKind::Product, products)
    }

    /// Users who reviewed at least one product in common with `user_key`,
    /// with the number of shared products
    pub fn co_review_network(&self, user_key: &str) -> GraphResult<Vec<(Entity, usize)>> {
        let Some(user) = self.vertex(EntityKind::User, user_key) else {
            return Ok(vec![]);
        };

        let products: HashSet<VertexId> = self
            .reviews_by(user.id)
            .into_iter()
            .filter_map(|r| self.product_of(r.id))
            .map(|p| p.id)
            .collect();

        let mut shared: HashMap<VertexId, HashSet<VertexId>> = HashMap::new();
        for product in products {
            for review in self
                .store
                .out_neighbors(product, &self.edge(EntityKind::Product, EntityKind::Review))
            {
                if let Some(author) = self.author_of(review.id) {
                    if author.id != user.id {
                        shared.entry(author.id).or_default().insert(product);
                    }
                }
            }
        }

        let counts = shared.into_iter().map(|(id, p)| (id, p.len())).collect();
        self.ranked(EntityKind::User, counts, usize::MAX)
    }

    /// Products ranked by review count
    pub fn product_popularity(&self, limit: usize) -> GraphResult<Vec<(Entity, usize)>> {
        let has_review = self.edge(EntityKind::Product, EntityKind::Review);
        let counts = self
            .store
            .vertices_with_label(&self.label(EntityKind::Product))
            .into_iter()
            .map(|p| (p.id, self.store.out_neighbors(p.id, &has_review).len()))
            .collect();
        self.ranked(EntityKind::Product, counts, limit)
    }

    /// Sort by score descending (ties by id) and convert
    fn ranked(
        &self,
        kind: EntityKind,
        scores: HashMap<VertexId, usize>,
        limit: usize,
    ) -> GraphResult<Vec<(Entity, usize)>> {
        let mut scores: Vec<(VertexId, usize)> = scores.into_iter().collect();
        scores.sort_by_key(|(id, score)| (Reverse(*score), *id));
        scores
            .into_iter()
            .take(limit)
            .filter_map(|(id, score)| self.store.get_vertex(id).map(|v| (v, score)))
            .map(|(v, score)| Ok((self.entity(kind, v)?, score)))
            .collect()
    }
}

fn newest_first(entities: &mut [Entity], field: &str) {
    entities.sort_by_key(|e| {
        (
            Reverse(e.get(field).and_then(|v| v.as_timestamp()).unwrap_or(i64::MIN)),
            e.key.as_str().to_string(),
        )
    });
}
