use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::{StoreError, StoreResult};
use crate::orders::repo_types::{
    CustomerPreferenceTag, NewOrder, NewOrderItem, NewPreferenceTag, Order, OrderItemLine,
};
use crate::restaurants::repo_types::{Item, NewItem, NewRestaurant, Restaurant, Tag};
use crate::store::{CatalogStore, OrderStore, UserStore};
use crate::users::repo_types::{Customer, NewCustomer, NewUser, User, UserUpdate};

#[derive(Debug, Clone, Copy)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    item_id: i64,
    quantity: i32,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    customers: BTreeMap<i64, Customer>,
    restaurants: BTreeMap<i64, Restaurant>,
    tags: BTreeMap<i64, Tag>,
    items: BTreeMap<i64, Item>,
    /// (item_id, tag_id)
    item_tags: BTreeSet<(i64, i64)>,
    orders: BTreeMap<i64, Order>,
    order_items: BTreeMap<i64, OrderItemRow>,
    preferences: BTreeMap<i64, CustomerPreferenceTag>,
}

/// In-process store with the same unique, foreign key and cascade rules as the
/// Postgres schema. Ids come from one shared sequence.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn missing(entity: &str, id: i64) -> StoreError {
    StoreError::Invalid(format!("{entity} {id} does not exist"))
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_username(&self, username: &str, except: Option<i64>) -> StoreResult<()> {
        if self
            .users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
        {
            return Err(StoreError::Conflict(format!(
                "username {username:?} already exists"
            )));
        }
        Ok(())
    }

    fn check_customer(&self, new: &NewCustomer, except: Option<i64>) -> StoreResult<()> {
        if !self.users.contains_key(&new.user_id) {
            return Err(missing("user", new.user_id));
        }
        if self
            .customers
            .values()
            .any(|c| c.user_id == new.user_id && Some(c.id) != except)
        {
            return Err(StoreError::Conflict(format!(
                "user {} already has a customer profile",
                new.user_id
            )));
        }
        Ok(())
    }

    fn check_restaurant(&self, new: &NewRestaurant, except: Option<i64>) -> StoreResult<()> {
        if !self.users.contains_key(&new.user_id) {
            return Err(missing("user", new.user_id));
        }
        if let Some(place_id) = &new.google_place_id {
            if self.restaurants.values().any(|r| {
                r.google_place_id.as_ref() == Some(place_id) && Some(r.id) != except
            }) {
                return Err(StoreError::Conflict(format!(
                    "google_place_id {place_id:?} already exists"
                )));
            }
        }
        Ok(())
    }

    fn check_tag_name(&self, name: &str, except: Option<i64>) -> StoreResult<()> {
        if self
            .tags
            .values()
            .any(|t| t.name == name && Some(t.id) != except)
        {
            return Err(StoreError::Conflict(format!("tag {name:?} already exists")));
        }
        Ok(())
    }

    fn check_order(&self, new: &NewOrder) -> StoreResult<()> {
        if !self.customers.contains_key(&new.customer_id) {
            return Err(missing("customer", new.customer_id));
        }
        if !self.restaurants.contains_key(&new.restaurant_id) {
            return Err(missing("restaurant", new.restaurant_id));
        }
        Ok(())
    }

    fn check_order_item(&self, new: &NewOrderItem) -> StoreResult<()> {
        if !self.orders.contains_key(&new.order_id) {
            return Err(missing("order", new.order_id));
        }
        if !self.items.contains_key(&new.item_id) {
            return Err(missing("item", new.item_id));
        }
        if new.quantity < 0 {
            return Err(StoreError::Invalid("quantity must not be negative".into()));
        }
        Ok(())
    }

    fn check_preference(&self, new: &NewPreferenceTag, except: Option<i64>) -> StoreResult<()> {
        if !self.customers.contains_key(&new.customer_id) {
            return Err(missing("customer", new.customer_id));
        }
        if !self.tags.contains_key(&new.tag_id) {
            return Err(missing("tag", new.tag_id));
        }
        if self.preferences.values().any(|p| {
            p.customer_id == new.customer_id && p.tag_id == new.tag_id && Some(p.id) != except
        }) {
            return Err(StoreError::Conflict(format!(
                "customer {} already has tag {}",
                new.customer_id, new.tag_id
            )));
        }
        Ok(())
    }

    fn line(&self, row: OrderItemRow) -> StoreResult<OrderItemLine> {
        let item = self
            .items
            .get(&row.item_id)
            .ok_or_else(|| missing("item", row.item_id))?;
        Ok(OrderItemLine {
            id: row.id,
            order_id: row.order_id,
            item_id: row.item_id,
            quantity: row.quantity,
            item_name: item.name.clone(),
            item_price: item.price,
        })
    }

    // Cascading removals, mirroring ON DELETE CASCADE in the migrations.

    fn remove_user(&mut self, id: i64) -> bool {
        let customers: Vec<i64> = self
            .customers
            .values()
            .filter(|c| c.user_id == id)
            .map(|c| c.id)
            .collect();
        for customer_id in customers {
            self.remove_customer(customer_id);
        }
        let restaurants: Vec<i64> = self
            .restaurants
            .values()
            .filter(|r| r.user_id == id)
            .map(|r| r.id)
            .collect();
        for restaurant_id in restaurants {
            self.remove_restaurant(restaurant_id);
        }
        self.users.remove(&id).is_some()
    }

    fn remove_customer(&mut self, id: i64) -> bool {
        let orders: Vec<i64> = self
            .orders
            .values()
            .filter(|o| o.customer_id == id)
            .map(|o| o.id)
            .collect();
        for order_id in orders {
            self.remove_order(order_id);
        }
        self.preferences.retain(|_, p| p.customer_id != id);
        self.customers.remove(&id).is_some()
    }

    fn remove_restaurant(&mut self, id: i64) -> bool {
        let orders: Vec<i64> = self
            .orders
            .values()
            .filter(|o| o.restaurant_id == id)
            .map(|o| o.id)
            .collect();
        for order_id in orders {
            self.remove_order(order_id);
        }
        let items: Vec<i64> = self
            .items
            .values()
            .filter(|i| i.restaurant_id == id)
            .map(|i| i.id)
            .collect();
        for item_id in items {
            self.remove_item(item_id);
        }
        self.restaurants.remove(&id).is_some()
    }

    fn remove_order(&mut self, id: i64) -> bool {
        self.order_items.retain(|_, oi| oi.order_id != id);
        self.orders.remove(&id).is_some()
    }

    fn remove_item(&mut self, id: i64) -> bool {
        self.order_items.retain(|_, oi| oi.item_id != id);
        self.item_tags.retain(|(item_id, _)| *item_id != id);
        self.items.remove(&id).is_some()
    }

    fn remove_tag(&mut self, id: i64) -> bool {
        self.item_tags.retain(|(_, tag_id)| *tag_id != id);
        self.preferences.retain(|_, p| p.tag_id != id);
        self.tags.remove(&id).is_some()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.lock().users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        self.lock()
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("user", id))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        let mut t = self.lock();
        t.check_username(&new.username, None)?;
        let user = User {
            id: t.next_id(),
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            kind: new.kind,
            is_staff: new.is_staff,
            is_superuser: new.is_superuser,
            date_joined: OffsetDateTime::now_utc(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> StoreResult<User> {
        let mut t = self.lock();
        t.check_username(&update.username, Some(id))?;
        let user = t
            .users
            .get_mut(&id)
            .ok_or(StoreError::not_found("user", id))?;
        user.username = update.username.clone();
        user.email = update.email.clone();
        user.kind = update.kind;
        user.is_staff = update.is_staff;
        user.is_superuser = update.is_superuser;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        if !self.lock().remove_user(id) {
            return Err(StoreError::not_found("user", id));
        }
        Ok(())
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        Ok(self.lock().customers.values().cloned().collect())
    }

    async fn get_customer(&self, id: i64) -> StoreResult<Customer> {
        self.lock()
            .customers
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("customer", id))
    }

    async fn find_customer_by_user(&self, user_id: i64) -> StoreResult<Option<Customer>> {
        Ok(self
            .lock()
            .customers
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn create_customer(&self, new: &NewCustomer) -> StoreResult<Customer> {
        let mut t = self.lock();
        t.check_customer(new, None)?;
        let customer = Customer {
            id: t.next_id(),
            user_id: new.user_id,
            firstname: new.firstname.clone(),
            lastname: new.lastname.clone(),
            age: new.age,
            gender: new.gender.clone(),
            weight: new.weight,
            memo: new.memo.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        t.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(&self, id: i64, update: &NewCustomer) -> StoreResult<Customer> {
        let mut t = self.lock();
        if !t.customers.contains_key(&id) {
            return Err(StoreError::not_found("customer", id));
        }
        t.check_customer(update, Some(id))?;
        let customer = t
            .customers
            .get_mut(&id)
            .ok_or(StoreError::not_found("customer", id))?;
        customer.user_id = update.user_id;
        customer.firstname = update.firstname.clone();
        customer.lastname = update.lastname.clone();
        customer.age = update.age;
        customer.gender = update.gender.clone();
        customer.weight = update.weight;
        customer.memo = update.memo.clone();
        Ok(customer.clone())
    }

    async fn delete_customer(&self, id: i64) -> StoreResult<()> {
        if !self.lock().remove_customer(id) {
            return Err(StoreError::not_found("customer", id));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_restaurants(&self) -> StoreResult<Vec<Restaurant>> {
        Ok(self.lock().restaurants.values().cloned().collect())
    }

    async fn get_restaurant(&self, id: i64) -> StoreResult<Restaurant> {
        self.lock()
            .restaurants
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("restaurant", id))
    }

    async fn find_restaurant_by_place_id(
        &self,
        place_id: &str,
    ) -> StoreResult<Option<Restaurant>> {
        Ok(self
            .lock()
            .restaurants
            .values()
            .find(|r| r.google_place_id.as_deref() == Some(place_id))
            .cloned())
    }

    async fn create_restaurant(&self, new: &NewRestaurant) -> StoreResult<Restaurant> {
        let mut t = self.lock();
        t.check_restaurant(new, None)?;
        let now = OffsetDateTime::now_utc();
        let restaurant = Restaurant {
            id: t.next_id(),
            user_id: new.user_id,
            name: new.name.clone(),
            google_place_id: new.google_place_id.clone(),
            latitude: new.latitude,
            longitude: new.longitude,
            address: new.address.clone(),
            description: new.description.clone(),
            photo: new.photo.clone(),
            created_at: now,
            updated_at: now,
        };
        t.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(restaurant)
    }

    async fn update_restaurant(
        &self,
        id: i64,
        update: &NewRestaurant,
    ) -> StoreResult<Restaurant> {
        let mut t = self.lock();
        if !t.restaurants.contains_key(&id) {
            return Err(StoreError::not_found("restaurant", id));
        }
        t.check_restaurant(update, Some(id))?;
        let r = t
            .restaurants
            .get_mut(&id)
            .ok_or(StoreError::not_found("restaurant", id))?;
        r.user_id = update.user_id;
        r.name = update.name.clone();
        r.google_place_id = update.google_place_id.clone();
        r.latitude = update.latitude;
        r.longitude = update.longitude;
        r.address = update.address.clone();
        r.description = update.description.clone();
        r.photo = update.photo.clone();
        r.updated_at = OffsetDateTime::now_utc();
        Ok(r.clone())
    }

    async fn delete_restaurant(&self, id: i64) -> StoreResult<()> {
        if !self.lock().remove_restaurant(id) {
            return Err(StoreError::not_found("restaurant", id));
        }
        Ok(())
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self.lock().tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn get_tag(&self, id: i64) -> StoreResult<Tag> {
        self.lock()
            .tags
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("tag", id))
    }

    async fn find_tag_by_name(&self, name: &str) -> StoreResult<Option<Tag>> {
        Ok(self.lock().tags.values().find(|t| t.name == name).cloned())
    }

    async fn find_tags_by_names(&self, names: &[&str]) -> StoreResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self
            .lock()
            .tags
            .values()
            .filter(|t| names.contains(&t.name.as_str()))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn create_tag(&self, name: &str) -> StoreResult<Tag> {
        let mut t = self.lock();
        t.check_tag_name(name, None)?;
        let tag = Tag {
            id: t.next_id(),
            name: name.to_string(),
        };
        t.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn rename_tag(&self, id: i64, name: &str) -> StoreResult<Tag> {
        let mut t = self.lock();
        t.check_tag_name(name, Some(id))?;
        let tag = t.tags.get_mut(&id).ok_or(StoreError::not_found("tag", id))?;
        tag.name = name.to_string();
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: i64) -> StoreResult<()> {
        if !self.lock().remove_tag(id) {
            return Err(StoreError::not_found("tag", id));
        }
        Ok(())
    }

    async fn list_items(&self) -> StoreResult<Vec<Item>> {
        Ok(self.lock().items.values().cloned().collect())
    }

    async fn get_item(&self, id: i64) -> StoreResult<Item> {
        self.lock()
            .items
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("item", id))
    }

    async fn find_item(&self, restaurant_id: i64, name: &str) -> StoreResult<Option<Item>> {
        Ok(self
            .lock()
            .items
            .values()
            .find(|i| i.restaurant_id == restaurant_id && i.name == name)
            .cloned())
    }

    async fn create_item(&self, new: &NewItem) -> StoreResult<Item> {
        let mut t = self.lock();
        if !t.restaurants.contains_key(&new.restaurant_id) {
            return Err(missing("restaurant", new.restaurant_id));
        }
        let now = OffsetDateTime::now_utc();
        let item = Item {
            id: t.next_id(),
            restaurant_id: new.restaurant_id,
            name: new.name.clone(),
            description: new.description.clone(),
            photo: new.photo.clone(),
            price: new.price,
            totalprotein: new.totalprotein,
            totalgreens: new.totalgreens,
            totalcarb: new.totalcarb,
            totalfat: new.totalfat,
            totalcalories: new.totalcalories,
            created_at: now,
            updated_at: now,
        };
        t.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item(&self, id: i64, update: &NewItem) -> StoreResult<Item> {
        let mut t = self.lock();
        if !t.restaurants.contains_key(&update.restaurant_id) {
            return Err(missing("restaurant", update.restaurant_id));
        }
        let item = t.items.get_mut(&id).ok_or(StoreError::not_found("item", id))?;
        item.restaurant_id = update.restaurant_id;
        item.name = update.name.clone();
        item.description = update.description.clone();
        item.photo = update.photo.clone();
        item.price = update.price;
        item.totalprotein = update.totalprotein;
        item.totalgreens = update.totalgreens;
        item.totalcarb = update.totalcarb;
        item.totalfat = update.totalfat;
        item.totalcalories = update.totalcalories;
        item.updated_at = OffsetDateTime::now_utc();
        Ok(item.clone())
    }

    async fn delete_item(&self, id: i64) -> StoreResult<()> {
        if !self.lock().remove_item(id) {
            return Err(StoreError::not_found("item", id));
        }
        Ok(())
    }

    async fn set_item_tags(&self, item_id: i64, tag_ids: &[i64]) -> StoreResult<()> {
        let mut t = self.lock();
        if !t.items.contains_key(&item_id) {
            return Err(StoreError::not_found("item", item_id));
        }
        if let Some(tag_id) = tag_ids.iter().find(|id| !t.tags.contains_key(*id)) {
            return Err(missing("tag", *tag_id));
        }
        t.item_tags.retain(|(i, _)| *i != item_id);
        t.item_tags
            .extend(tag_ids.iter().map(|tag_id| (item_id, *tag_id)));
        Ok(())
    }

    async fn item_tag_ids(&self, item_id: i64) -> StoreResult<Vec<i64>> {
        Ok(self
            .lock()
            .item_tags
            .iter()
            .filter(|(i, _)| *i == item_id)
            .map(|(_, tag_id)| *tag_id)
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.lock().orders.values().cloned().collect();
        orders.sort_by(|a, b| b.ordertime.cmp(&a.ordertime).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn get_order(&self, id: i64) -> StoreResult<Order> {
        self.lock()
            .orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("order", id))
    }

    async fn create_order(&self, new: &NewOrder) -> StoreResult<Order> {
        let mut t = self.lock();
        t.check_order(new)?;
        let order = Order {
            id: t.next_id(),
            customer_id: new.customer_id,
            restaurant_id: new.restaurant_id,
            totalprice: new.totalprice,
            ordertime: OffsetDateTime::now_utc(),
            isrecommended: new.isrecommended,
            aiexplanation: new.aiexplanation.clone(),
        };
        t.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn update_order(&self, id: i64, update: &NewOrder) -> StoreResult<Order> {
        let mut t = self.lock();
        t.check_order(update)?;
        let order = t
            .orders
            .get_mut(&id)
            .ok_or(StoreError::not_found("order", id))?;
        order.customer_id = update.customer_id;
        order.restaurant_id = update.restaurant_id;
        order.totalprice = update.totalprice;
        order.isrecommended = update.isrecommended;
        order.aiexplanation = update.aiexplanation.clone();
        Ok(order.clone())
    }

    async fn delete_order(&self, id: i64) -> StoreResult<()> {
        if !self.lock().remove_order(id) {
            return Err(StoreError::not_found("order", id));
        }
        Ok(())
    }

    async fn list_order_items(&self, order_id: Option<i64>) -> StoreResult<Vec<OrderItemLine>> {
        let t = self.lock();
        let lines = t
            .order_items
            .values()
            .filter(|oi| order_id.map_or(true, |id| oi.order_id == id))
            .map(|oi| t.line(*oi))
            .collect();
        lines
    }

    async fn get_order_item(&self, id: i64) -> StoreResult<OrderItemLine> {
        let t = self.lock();
        let row = *t
            .order_items
            .get(&id)
            .ok_or(StoreError::not_found("orderitem", id))?;
        t.line(row)
    }

    async fn create_order_item(&self, new: &NewOrderItem) -> StoreResult<OrderItemLine> {
        let mut t = self.lock();
        t.check_order_item(new)?;
        let row = OrderItemRow {
            id: t.next_id(),
            order_id: new.order_id,
            item_id: new.item_id,
            quantity: new.quantity,
        };
        t.order_items.insert(row.id, row);
        t.line(row)
    }

    async fn update_order_item(
        &self,
        id: i64,
        update: &NewOrderItem,
    ) -> StoreResult<OrderItemLine> {
        let mut t = self.lock();
        if !t.order_items.contains_key(&id) {
            return Err(StoreError::not_found("orderitem", id));
        }
        t.check_order_item(update)?;
        let row = OrderItemRow {
            id,
            order_id: update.order_id,
            item_id: update.item_id,
            quantity: update.quantity,
        };
        t.order_items.insert(id, row);
        t.line(row)
    }

    async fn delete_order_item(&self, id: i64) -> StoreResult<()> {
        if self.lock().order_items.remove(&id).is_none() {
            return Err(StoreError::not_found("orderitem", id));
        }
        Ok(())
    }

    async fn list_preference_tags(&self) -> StoreResult<Vec<CustomerPreferenceTag>> {
        let mut rows: Vec<CustomerPreferenceTag> =
            self.lock().preferences.values().cloned().collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_preference_tag(&self, id: i64) -> StoreResult<CustomerPreferenceTag> {
        self.lock()
            .preferences
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("customerpreferencetag", id))
    }

    async fn create_preference_tag(
        &self,
        new: &NewPreferenceTag,
    ) -> StoreResult<CustomerPreferenceTag> {
        let mut t = self.lock();
        t.check_preference(new, None)?;
        let row = CustomerPreferenceTag {
            id: t.next_id(),
            customer_id: new.customer_id,
            tag_id: new.tag_id,
            count: new.count,
        };
        t.preferences.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_preference_tag(
        &self,
        id: i64,
        update: &NewPreferenceTag,
    ) -> StoreResult<CustomerPreferenceTag> {
        let mut t = self.lock();
        if !t.preferences.contains_key(&id) {
            return Err(StoreError::not_found("customerpreferencetag", id));
        }
        t.check_preference(update, Some(id))?;
        let row = CustomerPreferenceTag {
            id,
            customer_id: update.customer_id,
            tag_id: update.tag_id,
            count: update.count,
        };
        t.preferences.insert(id, row.clone());
        Ok(row)
    }

    async fn delete_preference_tag(&self, id: i64) -> StoreResult<()> {
        if self.lock().preferences.remove(&id).is_none() {
            return Err(StoreError::not_found("customerpreferencetag", id));
        }
        Ok(())
    }

    async fn record_preference(
        &self,
        customer_id: i64,
        tag_id: i64,
    ) -> StoreResult<CustomerPreferenceTag> {
        let mut t = self.lock();
        if let Some(row) = t
            .preferences
            .values_mut()
            .find(|p| p.customer_id == customer_id && p.tag_id == tag_id)
        {
            row.count += 1;
            return Ok(row.clone());
        }
        let new = NewPreferenceTag {
            customer_id,
            tag_id,
            count: 1,
        };
        t.check_preference(&new, None)?;
        let row = CustomerPreferenceTag {
            id: t.next_id(),
            customer_id,
            tag_id,
            count: 1,
        };
        t.preferences.insert(row.id, row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::users::repo_types::UserType;

    fn new_user(username: &str, kind: UserType) -> NewUser {
        NewUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            password_hash: "hash".into(),
            kind,
            is_staff: false,
            is_superuser: false,
        }
    }

    fn new_customer(user_id: i64) -> NewCustomer {
        NewCustomer {
            user_id,
            firstname: "John".into(),
            lastname: "Doe".into(),
            age: Some(25),
            gender: "Male".into(),
            weight: Some(70),
            memo: String::new(),
        }
    }

    fn new_restaurant(user_id: i64, place_id: Option<&str>) -> NewRestaurant {
        NewRestaurant {
            user_id,
            name: "Thai Spice".into(),
            google_place_id: place_id.map(str::to_string),
            latitude: Decimal::new(47_610_100, 6),
            longitude: Decimal::new(-122_201_500, 6),
            address: String::new(),
            description: String::new(),
            photo: None,
        }
    }

    fn new_item(restaurant_id: i64, price: Decimal) -> NewItem {
        NewItem {
            restaurant_id,
            name: "Pad Thai".into(),
            description: String::new(),
            photo: None,
            price,
            totalprotein: 25,
            totalgreens: 60,
            totalcarb: 55,
            totalfat: 15,
            totalcalories: 480,
        }
    }

    struct Fixture {
        owner: User,
        customer: Customer,
        restaurant: Restaurant,
        item: Item,
        order: Order,
        tag: Tag,
    }

    async fn fixture(store: &MemoryStore) -> Fixture {
        let owner = store
            .create_user(&new_user("owner1", UserType::Owner))
            .await
            .unwrap();
        let customer_user = store
            .create_user(&new_user("customer1", UserType::Customer))
            .await
            .unwrap();
        let customer = store
            .create_customer(&new_customer(customer_user.id))
            .await
            .unwrap();
        let restaurant = store
            .create_restaurant(&new_restaurant(owner.id, Some("ChIJ_x")))
            .await
            .unwrap();
        let item = store
            .create_item(&new_item(restaurant.id, Decimal::new(1399, 2)))
            .await
            .unwrap();
        let tag = store.create_tag("Thai").await.unwrap();
        store.set_item_tags(item.id, &[tag.id]).await.unwrap();
        let order = store
            .create_order(&NewOrder {
                customer_id: customer.id,
                restaurant_id: restaurant.id,
                totalprice: Decimal::new(2798, 2),
                isrecommended: true,
                aiexplanation: "High protein".into(),
            })
            .await
            .unwrap();
        store
            .create_order_item(&NewOrderItem {
                order_id: order.id,
                item_id: item.id,
                quantity: 2,
            })
            .await
            .unwrap();
        Fixture {
            owner,
            customer,
            restaurant,
            item,
            order,
            tag,
        }
    }

    #[tokio::test]
    async fn deleting_owner_cascades_through_catalog_and_orders() {
        let store = MemoryStore::new();
        let f = fixture(&store).await;

        store.delete_user(f.owner.id).await.unwrap();

        assert!(store.list_restaurants().await.unwrap().is_empty());
        assert!(store.list_items().await.unwrap().is_empty());
        assert!(store.list_orders().await.unwrap().is_empty());
        assert!(store.list_order_items(None).await.unwrap().is_empty());
        assert!(store.item_tag_ids(f.item.id).await.unwrap().is_empty());
        // the customer and the tag are not owned by the owner
        assert!(store.get_customer(f.customer.id).await.is_ok());
        assert!(store.get_tag(f.tag.id).await.is_ok());
    }

    #[tokio::test]
    async fn deleting_customer_user_drops_profile_orders_and_preferences() {
        let store = MemoryStore::new();
        let f = fixture(&store).await;
        store.record_preference(f.customer.id, f.tag.id).await.unwrap();

        store.delete_user(f.customer.user_id).await.unwrap();

        assert!(matches!(
            store.get_customer(f.customer.id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.list_orders().await.unwrap().is_empty());
        assert!(store.list_preference_tags().await.unwrap().is_empty());
        assert!(store.get_restaurant(f.restaurant.id).await.is_ok());
    }

    #[tokio::test]
    async fn order_update_keeps_ordertime() {
        let store = MemoryStore::new();
        let f = fixture(&store).await;

        let updated = store
            .update_order(
                f.order.id,
                &NewOrder {
                    customer_id: f.customer.id,
                    restaurant_id: f.restaurant.id,
                    totalprice: Decimal::new(1000, 2),
                    isrecommended: false,
                    aiexplanation: String::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.ordertime, f.order.ordertime);
        assert_eq!(updated.totalprice, Decimal::new(1000, 2));
        assert!(!updated.isrecommended);
    }

    #[tokio::test]
    async fn order_lines_carry_subtotal() {
        let store = MemoryStore::new();
        let f = fixture(&store).await;

        let lines = store.list_order_items(Some(f.order.id)).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].subtotal(), Decimal::new(2798, 2));
        assert_eq!(lines[0].to_string(), "2x Pad Thai");

        // price changes flow into the derived subtotal
        let mut item = NewItem::from(&f.item);
        item.price = Decimal::new(1500, 2);
        store.update_item(f.item.id, &item).await.unwrap();
        let line = store.get_order_item(lines[0].id).await.unwrap();
        assert_eq!(line.subtotal(), Decimal::new(3000, 2));
    }

    #[tokio::test]
    async fn preference_pair_is_unique() {
        let store = MemoryStore::new();
        let f = fixture(&store).await;
        let pair = NewPreferenceTag {
            customer_id: f.customer.id,
            tag_id: f.tag.id,
            count: 1,
        };

        store.create_preference_tag(&pair).await.unwrap();
        let err = store.create_preference_tag(&pair).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let merged = store.record_preference(f.customer.id, f.tag.id).await.unwrap();
        assert_eq!(merged.count, 2);
        assert_eq!(store.list_preference_tags().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unique_keys_are_enforced() {
        let store = MemoryStore::new();
        let f = fixture(&store).await;

        let err = store
            .create_user(&new_user("owner1", UserType::Customer))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = store
            .create_restaurant(&new_restaurant(f.owner.id, Some("ChIJ_x")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // NULL place ids never collide
        store
            .create_restaurant(&new_restaurant(f.owner.id, None))
            .await
            .unwrap();
        store
            .create_restaurant(&new_restaurant(f.owner.id, None))
            .await
            .unwrap();

        let err = store
            .create_customer(&new_customer(f.customer.user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert!(matches!(
            store.create_tag("Thai").await.unwrap_err(),
            StoreError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn dangling_foreign_keys_are_invalid() {
        let store = MemoryStore::new();
        let err = store
            .create_restaurant(&new_restaurant(404, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));

        let err = store
            .create_item(&new_item(404, Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn orders_are_listed_newest_first() {
        let store = MemoryStore::new();
        let f = fixture(&store).await;
        let second = store.create_order(&NewOrder::from(&f.order)).await.unwrap();

        let ids: Vec<i64> = store
            .list_orders()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![second.id, f.order.id]);
    }
}
