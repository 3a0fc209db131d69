//! Persistence handle.
//!
//! Every operation goes through an explicitly passed [`Store`]. [`PgStore`] is the
//! production implementation (its queries live next to each domain in `repo.rs`),
//! [`MemoryStore`] keeps the same constraints in process.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StoreResult;
use crate::orders::repo_types::{
    CustomerPreferenceTag, NewOrder, NewOrderItem, NewPreferenceTag, Order, OrderItemLine,
};
use crate::restaurants::repo_types::{Item, NewItem, NewRestaurant, Restaurant, Tag};
use crate::users::repo_types::{Customer, NewCustomer, NewUser, User, UserUpdate};

pub mod memory;

pub use memory::MemoryStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn get_user(&self, id: i64) -> StoreResult<User>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn create_user(&self, new: &NewUser) -> StoreResult<User>;
    async fn update_user(&self, id: i64, update: &UserUpdate) -> StoreResult<User>;
    /// Cascades to the customer profile, owned restaurants and everything under them.
    async fn delete_user(&self, id: i64) -> StoreResult<()>;

    async fn list_customers(&self) -> StoreResult<Vec<Customer>>;
    async fn get_customer(&self, id: i64) -> StoreResult<Customer>;
    async fn find_customer_by_user(&self, user_id: i64) -> StoreResult<Option<Customer>>;
    async fn create_customer(&self, new: &NewCustomer) -> StoreResult<Customer>;
    async fn update_customer(&self, id: i64, update: &NewCustomer) -> StoreResult<Customer>;
    async fn delete_customer(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_restaurants(&self) -> StoreResult<Vec<Restaurant>>;
    async fn get_restaurant(&self, id: i64) -> StoreResult<Restaurant>;
    async fn find_restaurant_by_place_id(&self, place_id: &str)
        -> StoreResult<Option<Restaurant>>;
    async fn create_restaurant(&self, new: &NewRestaurant) -> StoreResult<Restaurant>;
    async fn update_restaurant(&self, id: i64, update: &NewRestaurant)
        -> StoreResult<Restaurant>;
    async fn delete_restaurant(&self, id: i64) -> StoreResult<()>;

    /// Ordered by name.
    async fn list_tags(&self) -> StoreResult<Vec<Tag>>;
    async fn get_tag(&self, id: i64) -> StoreResult<Tag>;
    async fn find_tag_by_name(&self, name: &str) -> StoreResult<Option<Tag>>;
    async fn find_tags_by_names(&self, names: &[&str]) -> StoreResult<Vec<Tag>>;
    async fn create_tag(&self, name: &str) -> StoreResult<Tag>;
    async fn rename_tag(&self, id: i64, name: &str) -> StoreResult<Tag>;
    async fn delete_tag(&self, id: i64) -> StoreResult<()>;

    async fn list_items(&self) -> StoreResult<Vec<Item>>;
    async fn get_item(&self, id: i64) -> StoreResult<Item>;
    async fn find_item(&self, restaurant_id: i64, name: &str) -> StoreResult<Option<Item>>;
    async fn create_item(&self, new: &NewItem) -> StoreResult<Item>;
    async fn update_item(&self, id: i64, update: &NewItem) -> StoreResult<Item>;
    async fn delete_item(&self, id: i64) -> StoreResult<()>;
    /// Replaces the item's tag set.
    async fn set_item_tags(&self, item_id: i64, tag_ids: &[i64]) -> StoreResult<()>;
    async fn item_tag_ids(&self, item_id: i64) -> StoreResult<Vec<i64>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Newest first.
    async fn list_orders(&self) -> StoreResult<Vec<Order>>;
    async fn get_order(&self, id: i64) -> StoreResult<Order>;
    async fn create_order(&self, new: &NewOrder) -> StoreResult<Order>;
    /// Never touches `ordertime`.
    async fn update_order(&self, id: i64, update: &NewOrder) -> StoreResult<Order>;
    async fn delete_order(&self, id: i64) -> StoreResult<()>;

    async fn list_order_items(&self, order_id: Option<i64>) -> StoreResult<Vec<OrderItemLine>>;
    async fn get_order_item(&self, id: i64) -> StoreResult<OrderItemLine>;
    async fn create_order_item(&self, new: &NewOrderItem) -> StoreResult<OrderItemLine>;
    async fn update_order_item(&self, id: i64, update: &NewOrderItem)
        -> StoreResult<OrderItemLine>;
    async fn delete_order_item(&self, id: i64) -> StoreResult<()>;

    /// Most frequent first.
    async fn list_preference_tags(&self) -> StoreResult<Vec<CustomerPreferenceTag>>;
    async fn get_preference_tag(&self, id: i64) -> StoreResult<CustomerPreferenceTag>;
    /// Fails with `Conflict` when the (customer, tag) pair already exists.
    async fn create_preference_tag(
        &self,
        new: &NewPreferenceTag,
    ) -> StoreResult<CustomerPreferenceTag>;
    async fn update_preference_tag(
        &self,
        id: i64,
        update: &NewPreferenceTag,
    ) -> StoreResult<CustomerPreferenceTag>;
    async fn delete_preference_tag(&self, id: i64) -> StoreResult<()>;
    /// Inserts the pair with count 1, or bumps the existing row's count.
    async fn record_preference(
        &self,
        customer_id: i64,
        tag_id: i64,
    ) -> StoreResult<CustomerPreferenceTag>;
}

pub trait Store: UserStore + CatalogStore + OrderStore {}

impl<T: UserStore + CatalogStore + OrderStore> Store for T {}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
