//! Synthetic e-commerce data
//!
//! Produces referentially consistent users, products, orders and reviews.
//! A seeded generator is fully reproducible, keys included.

use crate::model::records::round_cents;
use crate::model::{Entity, EntityKey, ModelResult, Order, OrderStatus, Product, Record, Review, User};
use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use tracing::info;

const CATEGORIES: [&str; 10] = [
    "Electronics",
    "Clothing",
    "Books",
    "Home & Kitchen",
    "Sports & Outdoors",
    "Beauty & Personal Care",
    "Automotive",
    "Toys & Games",
    "Health & Wellness",
    "Food & Grocery",
];

fn brands(category: &str) -> &'static [&'static str] {
    match category {
        "Electronics" => &["Apple", "Samsung", "Sony", "LG", "Dell", "HP", "Lenovo", "Microsoft"],
        "Clothing" => &["Nike", "Adidas", "Zara", "H&M", "Levi's", "Gap", "Uniqlo", "Puma"],
        "Books" => &["Penguin", "Harper Collins", "Simon & Schuster", "Random House", "Macmillan"],
        "Home & Kitchen" => &["KitchenAid", "Cuisinart", "Hamilton Beach", "Black & Decker", "Instant Pot"],
        "Sports & Outdoors" => &["Under Armour", "Reebok", "Columbia", "The North Face", "Patagonia"],
        "Beauty & Personal Care" => &["L'Oreal", "Maybelline", "Clinique", "MAC", "Neutrogena"],
        "Automotive" => &["Bosch", "Mobil 1", "Castrol", "Michelin", "Goodyear"],
        "Toys & Games" => &["LEGO", "Mattel", "Hasbro", "Fisher-Price", "Playmobil"],
        "Health & Wellness" => &["Johnson & Johnson", "Pfizer", "Bayer", "Tylenol", "Advil"],
        _ => &["Kraft", "Nestle", "General Mills", "Kellogg's", "Campbell's"],
    }
}

fn price_range(category: &str) -> (f64, f64) {
    match category {
        "Electronics" => (50.0, 2000.0),
        "Clothing" => (15.0, 200.0),
        "Books" => (8.0, 50.0),
        "Home & Kitchen" => (20.0, 300.0),
        "Sports & Outdoors" => (25.0, 500.0),
        "Beauty & Personal Care" => (10.0, 100.0),
        "Automotive" => (20.0, 200.0),
        "Toys & Games" => (15.0, 150.0),
        "Health & Wellness" => (10.0, 80.0),
        "Food & Grocery" => (5.0, 50.0),
        _ => (10.0, 100.0),
    }
}

const FIRST_NAMES: [&str; 16] = [
    "Alice", "Bob", "Carol", "David", "Erin", "Frank", "Grace", "Hector", "Ines", "James",
    "Keiko", "Liam", "Maria", "Noah", "Olivia", "Priya",
];

const LAST_NAMES: [&str; 12] = [
    "Smith", "Johnson", "Garcia", "Chen", "Okafor", "Novak", "Silva", "Kim", "Muller", "Rossi",
    "Nguyen", "Patel",
];

const STREETS: [&str; 6] = ["Oak St", "Maple Ave", "Pine Rd", "Cedar Ln", "Elm St", "Lake Dr"];

const CITIES: [&str; 6] = ["Springfield", "Riverside", "Fairview", "Madison", "Georgetown", "Salem"];

const ADJECTIVES: [&str; 10] = [
    "Adaptive", "Balanced", "Compact", "Durable", "Essential", "Fresh", "Intuitive", "Premium",
    "Smart", "Versatile",
];

const NOUNS: [&str; 10] = [
    "Solution", "Collection", "Edition", "Kit", "Series", "Set", "System", "Bundle", "Classic",
    "Essentials",
];

const PAYMENT_METHODS: [&str; 6] = [
    "Credit Card",
    "Debit Card",
    "PayPal",
    "Apple Pay",
    "Google Pay",
    "Bank Transfer",
];

/// Skewed towards 4 and 5 stars
const RATINGS: [i64; 8] = [1, 2, 3, 4, 4, 5, 5, 5];

const GOOD_TITLES: [&str; 6] = [
    "Great product!",
    "Love it!",
    "Excellent quality",
    "Highly recommend",
    "Perfect!",
    "Amazing purchase",
];
const MIXED_TITLES: [&str; 5] = [
    "It's okay",
    "Average product",
    "Could be better",
    "Mixed feelings",
    "Decent for the price",
];
const BAD_TITLES: [&str; 5] = [
    "Disappointed",
    "Not as expected",
    "Poor quality",
    "Would not recommend",
    "Waste of money",
];

const GOOD_COMMENTS: [&str; 5] = [
    "This product exceeded my expectations. Great quality and fast shipping!",
    "I'm very satisfied with this purchase. Works exactly as described.",
    "Excellent value for money. Would definitely buy again.",
    "Perfect product! Easy to use and great build quality.",
    "Outstanding quality and design. Highly recommended!",
];
const MIXED_COMMENTS: [&str; 4] = [
    "The product is decent but nothing special. Does what it's supposed to do.",
    "It's okay for the price, but I've seen better quality elsewhere.",
    "Average product. Some good points and some not so good.",
    "Works as expected but could be improved in some areas.",
];
const BAD_COMMENTS: [&str; 4] = [
    "Product quality was much lower than expected. Not satisfied with this purchase.",
    "Broke after just a few uses. Very disappointed.",
    "Not worth the money. Would not recommend to others.",
    "Poor build quality and doesn't work as advertised.",
];

/// One generated data set, in dependency order
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    pub reviews: Vec<Review>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.users.len() + self.products.len() + self.orders.len() + self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical entities: users and products before the orders and reviews
    /// that reference them
    pub fn entities(&self) -> ModelResult<Vec<Entity>> {
        let mut entities = Vec::with_capacity(self.len());
        for user in &self.users {
            entities.push(user.to_entity()?);
        }
        for product in &self.products {
            entities.push(product.to_entity()?);
        }
        for order in &self.orders {
            entities.push(order.to_entity()?);
        }
        for review in &self.reviews {
            entities.push(review.to_entity()?);
        }
        Ok(entities)
    }
}

pub struct DataGenerator {
    rng: StdRng,
    /// "Now" for generated timestamps; whole milliseconds
    anchor: DateTime<Utc>,
}

impl Default for DataGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DataGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            anchor: whole_millis(Utc::now()),
        }
    }

    /// Reproducible generator: the same seed and anchor give the same data
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            anchor: whole_millis(Utc::now()),
        }
    }

    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = whole_millis(anchor);
        self
    }

    fn key(&mut self) -> EntityKey {
        let uuid = uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid();
        EntityKey::new(uuid.to_string())
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.rng.gen_range(0..items.len())]
    }

    /// Uniform instant in `[from, anchor]`
    fn between(&mut self, from: DateTime<Utc>) -> DateTime<Utc> {
        let span = (self.anchor - from).num_milliseconds();
        if span <= 0 {
            return from;
        }
        from + Duration::milliseconds(self.rng.gen_range(0..=span))
    }

    fn days_ago(&self, days: i64) -> DateTime<Utc> {
        self.anchor - Duration::days(days)
    }

    pub fn generate_users(&mut self, count: usize) -> Vec<User> {
        let users: Vec<User> = (0..count).map(|_| self.user()).collect();
        info!(count = users.len(), "Generated users");
        users
    }

    fn user(&mut self) -> User {
        let first_name = self.pick(&FIRST_NAMES).to_string();
        let last_name = self.pick(&LAST_NAMES).to_string();
        let username = format!(
            "{}{}{}",
            first_name.to_lowercase(),
            &last_name[..1].to_lowercase(),
            self.rng.gen_range(10..10_000)
        );
        let email = format!("{}@example.com", username);

        let age_days = self.rng.gen_range(18 * 365..80 * 365);
        let date_of_birth = self.days_ago(age_days).format("%Y-%m-%d").to_string();
        let registration_date = self.between(self.days_ago(5 * 365));
        let address = format!(
            "{} {}, {}",
            self.rng.gen_range(1..9999),
            self.pick(&STREETS),
            self.pick(&CITIES)
        );
        let phone = format!(
            "+1-{:03}-{:03}-{:04}",
            self.rng.gen_range(200..999),
            self.rng.gen_range(100..999),
            self.rng.gen_range(0..10_000)
        );

        User {
            user_id: self.key(),
            username,
            email,
            first_name,
            last_name,
            date_of_birth: Some(date_of_birth),
            registration_date,
            is_active: self.rng.gen_bool(0.9),
            address: Some(address),
            phone: Some(phone),
        }
    }

    pub fn generate_products(&mut self, count: usize) -> Vec<Product> {
        let products: Vec<Product> = (0..count).map(|_| self.product()).collect();
        info!(count = products.len(), "Generated products");
        products
    }

    fn product(&mut self) -> Product {
        let category = self.pick(&CATEGORIES);
        let brand = self.pick(brands(category));
        let (low, high) = price_range(category);
        let price = round_cents(self.rng.gen_range(low..high));
        let name = self.product_name(category);
        let description = format!("{} {} from {}. {}", brand, name, category, self.pick(&GOOD_COMMENTS));
        let sku = format!(
            "{}{}{}-{:04}",
            self.letter(),
            self.letter(),
            self.letter(),
            self.rng.gen_range(0..10_000)
        );

        Product {
            product_id: self.key(),
            name,
            description: Some(description),
            price,
            category: category.to_string(),
            brand: brand.to_string(),
            sku,
            stock_quantity: self.rng.gen_range(0..=1000),
            created_date: self.between(self.days_ago(2 * 365)),
            is_active: self.rng.gen_bool(0.95),
        }
    }

    fn letter(&mut self) -> char {
        self.rng.gen_range(b'A'..=b'Z') as char
    }

    fn product_name(&mut self, category: &str) -> String {
        let named: &[&str] = match category {
            "Electronics" => &["Smart TV", "Laptop", "Smartphone", "Tablet", "Headphones", "Camera", "Gaming Console"],
            "Clothing" => &["T-Shirt", "Jeans", "Sneakers", "Jacket", "Dress", "Shirt", "Pants"],
            "Home & Kitchen" => &["Blender", "Coffee Maker", "Microwave", "Toaster", "Cookware Set", "Vacuum Cleaner"],
            _ => &[],
        };
        if named.is_empty() {
            format!("{} {}", self.pick(&ADJECTIVES), self.pick(&NOUNS))
        } else {
            self.pick(named).to_string()
        }
    }

    /// Between zero and `max_per_user` orders per user, placed after the
    /// user registered
    pub fn generate_orders(&mut self, users: &[User], max_per_user: usize) -> Vec<Order> {
        let mut orders = Vec::new();
        for user in users {
            for _ in 0..self.rng.gen_range(0..=max_per_user) {
                orders.push(Order {
                    order_id: self.key(),
                    user_id: user.user_id.clone(),
                    order_date: self.between(user.registration_date),
                    status: self.pick(&OrderStatus::ALL),
                    total_amount: round_cents(self.rng.gen_range(10.0..500.0)),
                    shipping_address: user.address.clone(),
                    payment_method: Some(self.pick(&PAYMENT_METHODS).to_string()),
                });
            }
        }
        info!(count = orders.len(), users = users.len(), "Generated orders");
        orders
    }

    /// Between zero and `max_per_product` reviews per product, each from a
    /// different user
    pub fn generate_reviews(
        &mut self,
        users: &[User],
        products: &[Product],
        max_per_product: usize,
    ) -> Vec<Review> {
        let mut reviews = Vec::new();
        for product in products {
            let wanted = self.rng.gen_range(0..=max_per_product).min(users.len());
            let reviewers: Vec<&User> = users.choose_multiple(&mut self.rng, wanted).collect();
            for user in reviewers {
                let rating = self.pick(&RATINGS);
                let (titles, comments): (&[&str], &[&str]) = match rating {
                    4..=5 => (&GOOD_TITLES[..], &GOOD_COMMENTS[..]),
                    3 => (&MIXED_TITLES[..], &MIXED_COMMENTS[..]),
                    _ => (&BAD_TITLES[..], &BAD_COMMENTS[..]),
                };
                reviews.push(Review {
                    review_id: self.key(),
                    product_id: product.product_id.clone(),
                    user_id: user.user_id.clone(),
                    rating,
                    title: self.pick(titles).to_string(),
                    comment: Some(self.pick(comments).to_string()),
                    review_date: self.between(product.created_date),
                    is_verified_purchase: self.rng.gen_bool(0.7),
                });
            }
        }
        info!(count = reviews.len(), products = products.len(), "Generated reviews");
        reviews
    }

    /// Full data set from explicit sizes
    pub fn generate_dataset(
        &mut self,
        users: usize,
        products: usize,
        max_orders_per_user: usize,
        max_reviews_per_product: usize,
    ) -> Dataset {
        let users = self.generate_users(users);
        let products = self.generate_products(products);
        let orders = self.generate_orders(&users, max_orders_per_user);
        let reviews = self.generate_reviews(&users, &products, max_reviews_per_product);
        Dataset {
            users,
            products,
            orders,
            reviews,
        }
    }

    /// Exactly `count` entities, referenced entities first
    pub fn generate(&mut self, count: usize) -> ModelResult<Vec<Entity>> {
        let users = (count * 3 / 10).max(1);
        let products = (count / 5).max(1);
        let mut entities = self.generate_dataset(users, products, 3, 5).entities()?;
        while entities.len() < count {
            // Small data sets keep references resolvable
            let extra = self.generate_dataset(1, 1, 2, 1).entities()?;
            entities.extend(extra);
        }
        entities.truncate(count);
        Ok(entities)
    }
}

fn whole_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    let sub_ms = at.timestamp_subsec_nanos() as i64 % 1_000_000;
    at - Duration::nanoseconds(sub_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let a = DataGenerator::seeded(7).with_anchor(anchor()).generate(50).unwrap();
        let b = DataGenerator::seeded(7).with_anchor(anchor()).generate(50).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
    }

    #[test]
    fn test_records_validate_and_references_resolve() {
        let mut generator = DataGenerator::seeded(42).with_anchor(anchor());
        let dataset = generator.generate_dataset(20, 10, 4, 6);
        let entities = dataset.entities().unwrap();
        assert_eq!(entities.len(), dataset.len());

        let users: HashSet<_> = dataset.users.iter().map(|u| u.user_id.clone()).collect();
        let products: HashSet<_> = dataset.products.iter().map(|p| p.product_id.clone()).collect();
        assert!(dataset.orders.iter().all(|o| users.contains(&o.user_id)));
        assert!(dataset
            .reviews
            .iter()
            .all(|r| users.contains(&r.user_id) && products.contains(&r.product_id)));

        for order in &dataset.orders {
            let user = dataset.users.iter().find(|u| u.user_id == order.user_id).unwrap();
            assert!(order.order_date >= user.registration_date);
            assert!(order.order_date <= anchor());
        }
    }

    #[test]
    fn test_reviewers_are_distinct_per_product() {
        let mut generator = DataGenerator::seeded(3).with_anchor(anchor());
        let users = generator.generate_users(5);
        let products = generator.generate_products(8);
        let reviews = generator.generate_reviews(&users, &products, 10);

        for product in &products {
            let reviewers: Vec<_> = reviews
                .iter()
                .filter(|r| r.product_id == product.product_id)
                .map(|r| &r.user_id)
                .collect();
            let distinct: HashSet<_> = reviewers.iter().collect();
            assert_eq!(reviewers.len(), distinct.len());
            assert!(reviewers.len() <= users.len());
        }
        assert!(reviews.iter().all(|r| (1..=5).contains(&r.rating)));
    }

    #[test]
    fn test_generate_places_referenced_users_first() {
        let entities = DataGenerator::seeded(11).with_anchor(anchor()).generate(40).unwrap();
        for (pos, entity) in entities.iter().enumerate() {
            if entity.kind != EntityKind::Order {
                continue;
            }
            let user = entity.get("user_id").and_then(|v| v.as_text()).unwrap();
            assert!(entities[..pos]
                .iter()
                .any(|e| e.kind == EntityKind::User && e.key.as_str() == user));
        }
    }
}
