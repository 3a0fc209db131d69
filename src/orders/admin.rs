use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::repo_types::{
    CustomerPreferenceTag, NewOrder, NewOrderItem, NewPreferenceTag, Order, OrderItemLine,
};
use crate::admin::{
    site::{display_row, parse_form, to_row},
    AdminResource, AdminSite, InlineAdmin, ModelAdmin, Row,
};
use crate::error::AppError;
use crate::restaurants::repo_types::{Item, Restaurant, Tag};
use crate::store::{CatalogStore, OrderStore, Store, UserStore};
use crate::users::repo_types::Customer;

pub fn register(site: &mut AdminSite) {
    site.register(OrderAdmin::new());
    site.register(OrderItemAdmin::new());
    site.register(CustomerPreferenceTagAdmin::new());
}

/// Related records needed to render order rows.
struct Lookups {
    customers: HashMap<i64, Customer>,
    restaurants: HashMap<i64, Restaurant>,
}

impl Lookups {
    async fn load(store: &dyn Store) -> Result<Self, AppError> {
        Ok(Self {
            customers: store
                .list_customers()
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            restaurants: store
                .list_restaurants()
                .await?
                .into_iter()
                .map(|r| (r.id, r))
                .collect(),
        })
    }

    fn firstname(&self, customer_id: i64) -> &str {
        self.customers
            .get(&customer_id)
            .map(|c| c.firstname.as_str())
            .unwrap_or_default()
    }

    fn restaurant(&self, restaurant_id: i64) -> &str {
        self.restaurants
            .get(&restaurant_id)
            .map(|r| r.name.as_str())
            .unwrap_or_default()
    }

    fn order_label(&self, order: &Order) -> String {
        order.label(
            self.firstname(order.customer_id),
            self.restaurant(order.restaurant_id),
        )
    }

    fn order_row(&self, order: &Order) -> Result<Row, AppError> {
        let mut row = display_row(order, self.order_label(order))?;
        if let Some(c) = self.customers.get(&order.customer_id) {
            row.insert("customer".into(), json!(c.to_string()));
            row.insert("customer__firstname".into(), json!(c.firstname));
            row.insert("customer__lastname".into(), json!(c.lastname));
        }
        let restaurant = self.restaurant(order.restaurant_id);
        row.insert("restaurant".into(), json!(restaurant));
        row.insert("restaurant__name".into(), json!(restaurant));
        Ok(row)
    }
}

async fn order_record(store: &dyn Store, order: &Order) -> Result<Row, AppError> {
    let customer = store.get_customer(order.customer_id).await?;
    let restaurant = store.get_restaurant(order.restaurant_id).await?;
    display_row(order, order.label(&customer.firstname, &restaurant.name))
}

fn line_row(line: &OrderItemLine) -> Result<Row, AppError> {
    let mut row = display_row(line, line.to_string())?;
    row.insert("subtotal".into(), json!(line.subtotal()));
    Ok(row)
}

pub struct OrderAdmin {
    admin: ModelAdmin,
}

impl OrderAdmin {
    pub fn new() -> Self {
        let admin = ModelAdmin::new("order", "Orders")
            .list_display([
                "id",
                "customer",
                "restaurant",
                "totalprice",
                "isrecommended",
                "ordertime",
            ])
            .list_filter(["isrecommended", "ordertime", "restaurant"])
            .search_fields(["customer__firstname", "customer__lastname", "restaurant__name"])
            .decimal_fields(["totalprice"])
            .ordering(["-ordertime"])
            .readonly_fields(["ordertime"])
            .fieldset(
                "Order Info",
                ["customer", "restaurant", "totalprice", "ordertime"],
            )
            .collapsed_fieldset("AI Recommendation", ["isrecommended", "aiexplanation"])
            .inline(
                InlineAdmin::tabular("orderitem", "order")
                    .fields(["item", "quantity"])
                    .extra(1),
            );
        Self { admin }
    }
}

#[async_trait]
impl AdminResource for OrderAdmin {
    fn admin(&self) -> &ModelAdmin {
        &self.admin
    }

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError> {
        let lookups = Lookups::load(store).await?;
        store
            .list_orders()
            .await?
            .iter()
            .map(|o| lookups.order_row(o))
            .collect()
    }

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError> {
        order_record(store, &store.get_order(id).await?).await
    }

    async fn inline_rows(&self, store: &dyn Store, id: i64) -> Result<Vec<Vec<Row>>, AppError> {
        let lines = store
            .list_order_items(Some(id))
            .await?
            .iter()
            .map(line_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vec![lines])
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError> {
        let new: NewOrder = parse_form(form)?;
        let order = store.create_order(&new).await?;
        order_record(store, &order).await
    }

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError> {
        let update: NewOrder = parse_form(form)?;
        let order = store.update_order(id, &update).await?;
        order_record(store, &order).await
    }

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError> {
        Ok(store.delete_order(id).await?)
    }
}

pub struct OrderItemAdmin {
    admin: ModelAdmin,
}

impl OrderItemAdmin {
    pub fn new() -> Self {
        let admin = ModelAdmin::new("orderitem", "Order items")
            .list_display(["order", "item", "quantity", "subtotal"])
            .list_filter(["order__ordertime"])
            .search_fields(["item__name", "order__customer__firstname"])
            .decimal_fields(["subtotal"]);
        Self { admin }
    }
}

#[async_trait]
impl AdminResource for OrderItemAdmin {
    fn admin(&self) -> &ModelAdmin {
        &self.admin
    }

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError> {
        let lookups = Lookups::load(store).await?;
        let orders: HashMap<i64, Order> = store
            .list_orders()
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();
        let items: HashMap<i64, Item> = store
            .list_items()
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();

        store
            .list_order_items(None)
            .await?
            .iter()
            .map(|line| -> Result<Row, AppError> {
                let mut row = line_row(line)?;
                row.insert("item__name".into(), json!(line.item_name));
                if let Some(item) = items.get(&line.item_id) {
                    let label = item.label(lookups.restaurant(item.restaurant_id));
                    row.insert("item".into(), json!(label));
                }
                if let Some(order) = orders.get(&line.order_id) {
                    let order_row = to_row(order)?;
                    row.insert("order".into(), json!(lookups.order_label(order)));
                    row.insert(
                        "order__ordertime".into(),
                        order_row.get("ordertime").cloned().unwrap_or(Value::Null),
                    );
                    row.insert(
                        "order__customer__firstname".into(),
                        json!(lookups.firstname(order.customer_id)),
                    );
                }
                Ok(row)
            })
            .collect()
    }

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError> {
        line_row(&store.get_order_item(id).await?)
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError> {
        let new: NewOrderItem = parse_form(form)?;
        line_row(&store.create_order_item(&new).await?)
    }

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError> {
        let update: NewOrderItem = parse_form(form)?;
        line_row(&store.update_order_item(id, &update).await?)
    }

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError> {
        Ok(store.delete_order_item(id).await?)
    }
}

pub struct CustomerPreferenceTagAdmin {
    admin: ModelAdmin,
}

impl CustomerPreferenceTagAdmin {
    pub fn new() -> Self {
        let admin = ModelAdmin::new("customerpreferencetag", "Customer preference tags")
            .list_display(["customer", "tag", "count"])
            .list_filter(["tag"])
            .search_fields(["customer__firstname", "customer__lastname", "tag__name"])
            .ordering(["-count"]);
        Self { admin }
    }
}

async fn preference_record(
    store: &dyn Store,
    pref: &CustomerPreferenceTag,
) -> Result<Row, AppError> {
    let customer = store.get_customer(pref.customer_id).await?;
    let tag = store.get_tag(pref.tag_id).await?;
    display_row(pref, pref.label(&customer.firstname, &tag.name))
}

#[async_trait]
impl AdminResource for CustomerPreferenceTagAdmin {
    fn admin(&self) -> &ModelAdmin {
        &self.admin
    }

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError> {
        let lookups = Lookups::load(store).await?;
        let tags: HashMap<i64, Tag> = store
            .list_tags()
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        store
            .list_preference_tags()
            .await?
            .iter()
            .map(|pref| -> Result<Row, AppError> {
                let tag = tags.get(&pref.tag_id).map(|t| t.name.as_str()).unwrap_or_default();
                let label = pref.label(lookups.firstname(pref.customer_id), tag);
                let mut row = display_row(pref, label)?;
                if let Some(c) = lookups.customers.get(&pref.customer_id) {
                    row.insert("customer".into(), json!(c.to_string()));
                    row.insert("customer__firstname".into(), json!(c.firstname));
                    row.insert("customer__lastname".into(), json!(c.lastname));
                }
                row.insert("tag".into(), json!(tag));
                row.insert("tag__name".into(), json!(tag));
                Ok(row)
            })
            .collect()
    }

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError> {
        preference_record(store, &store.get_preference_tag(id).await?).await
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError> {
        let new: NewPreferenceTag = parse_form(form)?;
        let pref = store.create_preference_tag(&new).await?;
        preference_record(store, &pref).await
    }

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError> {
        let update: NewPreferenceTag = parse_form(form)?;
        let pref = store.update_preference_tag(id, &update).await?;
        preference_record(store, &pref).await
    }

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError> {
        Ok(store.delete_preference_tag(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::admin::changelist::{self, ChangeListParams};
    use crate::admin::DISPLAY;
    use crate::store::MemoryStore;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        crate::seed::run(&store, &mut std::io::sink()).await.unwrap();
        store
    }

    async fn place_order(store: &MemoryStore, restaurant: &str, ai: bool) -> Order {
        let customer = store.list_customers().await.unwrap().remove(0);
        let restaurant = store
            .list_restaurants()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.name == restaurant)
            .unwrap();
        store
            .create_order(&NewOrder {
                customer_id: customer.id,
                restaurant_id: restaurant.id,
                totalprice: Default::default(),
                isrecommended: ai,
                aiexplanation: String::new(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn order_rows_render_labels_and_lookups() {
        let store = seeded().await;
        let order = place_order(&store, "Thai Spice", true).await;
        let rows = OrderAdmin::new().rows(&store).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(
            row[DISPLAY],
            json!(format!("🤖 Order #{} - John @ Thai Spice", order.id))
        );
        assert_eq!(row["customer"], "John Doe");
        assert_eq!(row["restaurant__name"], "Thai Spice");
    }

    #[tokio::test]
    async fn order_item_rows_expose_subtotal_and_order_time() {
        let store = seeded().await;
        let order = place_order(&store, "Thai Spice", false).await;
        let curry = store
            .list_items()
            .await
            .unwrap()
            .into_iter()
            .find(|i| i.name == "Green Curry")
            .unwrap();
        OrderItemAdmin::new()
            .create(&store, json!({ "order": order.id, "item": curry.id, "quantity": 3 }))
            .await
            .unwrap();

        let admin = OrderItemAdmin::new();
        let rows = admin.rows(&store).await.unwrap();
        let row = &rows[0];
        assert_eq!(row[DISPLAY], "3x Green Curry");
        assert_eq!(row["subtotal"], "38.97");
        assert_eq!(row["item"], "Green Curry - Thai Spice");
        assert_eq!(row["order__customer__firstname"], "John");

        let date = row["order__ordertime"].as_str().unwrap()[..10].to_string();
        let query = HashMap::from([
            ("order__ordertime".to_string(), date),
            ("q".to_string(), "curry john".to_string()),
        ]);
        let params = ChangeListParams::parse(admin.admin(), query).unwrap();
        let list = changelist::build(admin.admin(), rows, &params).unwrap();
        assert_eq!(list.count, 1);
    }

    #[tokio::test]
    async fn preference_rows_sort_by_count() {
        let store = seeded().await;
        let customer = store.list_customers().await.unwrap().remove(0);
        let spicy = store.find_tag_by_name("Spicy").await.unwrap().unwrap();
        let thai = store.find_tag_by_name("Thai").await.unwrap().unwrap();
        store.record_preference(customer.id, spicy.id).await.unwrap();
        for _ in 0..3 {
            store.record_preference(customer.id, thai.id).await.unwrap();
        }

        let admin = CustomerPreferenceTagAdmin::new();
        let rows = admin.rows(&store).await.unwrap();
        let params = ChangeListParams::parse(admin.admin(), HashMap::new()).unwrap();
        let list = changelist::build(admin.admin(), rows, &params).unwrap();
        assert_eq!(list.results[0]["tag"], "Thai");
        assert_eq!(list.results[0]["count"], 3);
        assert_eq!(list.results[1]["tag"], "Spicy");

        let rows = admin.rows(&store).await.unwrap();
        let thai_row = rows.iter().find(|r| r["tag"] == "Thai").unwrap();
        assert_eq!(thai_row[DISPLAY], "John - Thai (3x)");
    }
}
