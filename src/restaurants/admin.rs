use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::repo_types::{Item, NewItem, NewRestaurant, Restaurant};
use crate::admin::{
    site::{display_row, parse_form},
    AdminResource, AdminSite, ModelAdmin, Row,
};
use crate::error::{AppError, StoreError};
use crate::store::{CatalogStore, Store, UserStore};

pub fn register(site: &mut AdminSite) {
    site.register(RestaurantAdmin::new());
    site.register(TagAdmin::new());
    site.register(ItemAdmin::new());
}

pub struct RestaurantAdmin {
    admin: ModelAdmin,
}

impl RestaurantAdmin {
    pub fn new() -> Self {
        let admin = ModelAdmin::new("restaurant", "Restaurants")
            .list_display(["name", "user", "google_place_id", "address", "created_at"])
            .list_filter(["created_at"])
            .search_fields(["name", "google_place_id", "address"])
            .readonly_fields(["photo"])
            .fieldset("Basic Info", ["user", "name", "description"])
            .fieldset("Location", ["google_place_id", "latitude", "longitude", "address"])
            .fieldset("Media", ["photo"]);
        Self { admin }
    }
}

fn restaurant_row(r: &Restaurant) -> Result<Row, AppError> {
    display_row(r, r.to_string())
}

#[async_trait]
impl AdminResource for RestaurantAdmin {
    fn admin(&self) -> &ModelAdmin {
        &self.admin
    }

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError> {
        let owners: HashMap<i64, String> = store
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u.to_string()))
            .collect();
        store
            .list_restaurants()
            .await?
            .iter()
            .map(|r| -> Result<Row, AppError> {
                let mut row = restaurant_row(r)?;
                if let Some(owner) = owners.get(&r.user_id) {
                    row.insert("user".into(), json!(owner));
                }
                Ok(row)
            })
            .collect()
    }

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError> {
        restaurant_row(&store.get_restaurant(id).await?)
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError> {
        let new = NewRestaurant {
            photo: None,
            ..parse_form::<NewRestaurant>(form)?.normalized()
        };
        restaurant_row(&store.create_restaurant(&new).await?)
    }

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError> {
        let current = store.get_restaurant(id).await?;
        // the photo only changes through an upload
        let update = NewRestaurant {
            photo: current.photo,
            ..parse_form::<NewRestaurant>(form)?.normalized()
        };
        restaurant_row(&store.update_restaurant(id, &update).await?)
    }

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError> {
        Ok(store.delete_restaurant(id).await?)
    }

    fn upload_to(&self) -> Option<&'static str> {
        Some("restaurants")
    }

    async fn set_photo(&self, store: &dyn Store, id: i64, key: &str) -> Result<Row, AppError> {
        let current = store.get_restaurant(id).await?;
        let update = NewRestaurant {
            photo: Some(key.to_string()),
            ..NewRestaurant::from(&current)
        };
        restaurant_row(&store.update_restaurant(id, &update).await?)
    }
}

#[derive(Debug, Deserialize)]
struct TagForm {
    name: String,
}

pub struct TagAdmin {
    admin: ModelAdmin,
}

impl TagAdmin {
    pub fn new() -> Self {
        let admin = ModelAdmin::new("tag", "Tags")
            .list_display(["id", "name"])
            .search_fields(["name"])
            .ordering(["id"]);
        Self { admin }
    }
}

#[async_trait]
impl AdminResource for TagAdmin {
    fn admin(&self) -> &ModelAdmin {
        &self.admin
    }

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError> {
        store
            .list_tags()
            .await?
            .iter()
            .map(|t| display_row(t, t.to_string()))
            .collect()
    }

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError> {
        let tag = store.get_tag(id).await?;
        display_row(&tag, tag.to_string())
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError> {
        let form: TagForm = parse_form(form)?;
        let tag = store.create_tag(&form.name).await?;
        display_row(&tag, tag.to_string())
    }

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError> {
        let form: TagForm = parse_form(form)?;
        let tag = store.rename_tag(id, &form.name).await?;
        display_row(&tag, tag.to_string())
    }

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError> {
        Ok(store.delete_tag(id).await?)
    }
}

pub struct ItemAdmin {
    admin: ModelAdmin,
}

impl ItemAdmin {
    pub fn new() -> Self {
        let admin = ModelAdmin::new("item", "Items")
            .list_display(["name", "restaurant", "price", "totalcalories", "created_at"])
            .list_filter(["restaurant", "created_at"])
            .search_fields(["name", "description"])
            .decimal_fields(["price"])
            .readonly_fields(["photo"])
            .fieldset(
                "Basic Info",
                ["restaurant", "name", "description", "price", "photo"],
            )
            .fieldset(
                "Nutrition (grams)",
                [
                    "totalprotein",
                    "totalgreens",
                    "totalcarb",
                    "totalfat",
                    "totalcalories",
                ],
            )
            .fieldset("Tags", ["tags"]);
        Self { admin }
    }

    async fn item_row(&self, store: &dyn Store, item: &Item) -> Result<Row, AppError> {
        let restaurant = store.get_restaurant(item.restaurant_id).await?;
        let mut row = display_row(item, item.label(&restaurant.name))?;
        row.insert("tags".into(), json!(store.item_tag_ids(item.id).await?));
        Ok(row)
    }
}

/// Splits the tag selection off an item form. `None` leaves the tags untouched.
fn split_tags(mut form: Value) -> Result<(NewItem, Option<Vec<i64>>), AppError> {
    let tags = match form.as_object_mut().and_then(|m| m.remove("tags")) {
        None | Some(Value::Null) => None,
        Some(tags) => Some(parse_form::<Vec<i64>>(tags)?),
    };
    Ok((parse_form(form)?, tags))
}

/// Rejects unknown tag ids before anything is written.
async fn check_tags(store: &dyn Store, tags: Option<&[i64]>) -> Result<(), AppError> {
    for &id in tags.unwrap_or_default() {
        match store.get_tag(id).await {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => {
                return Err(StoreError::Invalid(format!("tag {id} does not exist")).into())
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[async_trait]
impl AdminResource for ItemAdmin {
    fn admin(&self) -> &ModelAdmin {
        &self.admin
    }

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError> {
        let restaurants: HashMap<i64, String> = store
            .list_restaurants()
            .await?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();
        store
            .list_items()
            .await?
            .iter()
            .map(|item| -> Result<Row, AppError> {
                let name = restaurants
                    .get(&item.restaurant_id)
                    .map(String::as_str)
                    .unwrap_or_default();
                let mut row = display_row(item, item.label(name))?;
                row.insert("restaurant".into(), json!(name));
                row.insert("restaurant__name".into(), json!(name));
                Ok(row)
            })
            .collect()
    }

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError> {
        let item = store.get_item(id).await?;
        self.item_row(store, &item).await
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError> {
        let (new, tags) = split_tags(form)?;
        check_tags(store, tags.as_deref()).await?;
        let item = store.create_item(&NewItem { photo: None, ..new }).await?;
        if let Some(tags) = tags {
            store.set_item_tags(item.id, &tags).await?;
        }
        self.item_row(store, &item).await
    }

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError> {
        let (update, tags) = split_tags(form)?;
        let current = store.get_item(id).await?;
        check_tags(store, tags.as_deref()).await?;
        let update = NewItem {
            photo: current.photo,
            ..update
        };
        let item = store.update_item(id, &update).await?;
        if let Some(tags) = tags {
            store.set_item_tags(item.id, &tags).await?;
        }
        self.item_row(store, &item).await
    }

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError> {
        Ok(store.delete_item(id).await?)
    }

    fn upload_to(&self) -> Option<&'static str> {
        Some("menu_items")
    }

    async fn set_photo(&self, store: &dyn Store, id: i64, key: &str) -> Result<Row, AppError> {
        let current = store.get_item(id).await?;
        let update = NewItem {
            photo: Some(key.to_string()),
            ..NewItem::from(&current)
        };
        let item = store.update_item(id, &update).await?;
        self.item_row(store, &item).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::store::MemoryStore;
    use crate::users::repo_types::{NewUser, UserType};

    async fn owner(store: &MemoryStore) -> i64 {
        store
            .create_user(&NewUser {
                username: "owner1".into(),
                email: "owner@example.com".into(),
                password_hash: "x".into(),
                kind: UserType::Owner,
                is_staff: false,
                is_superuser: false,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn restaurant_form_stores_blank_place_id_as_null() {
        let store = MemoryStore::new();
        let user_id = owner(&store).await;
        let admin = RestaurantAdmin::new();
        for name in ["A", "B"] {
            let row = admin
                .create(
                    &store,
                    json!({
                        "user": user_id,
                        "name": name,
                        "google_place_id": "",
                        "latitude": "1.000000",
                        "longitude": "2.000000",
                    }),
                )
                .await
                .unwrap();
            assert_eq!(row["google_place_id"], Value::Null);
        }
        let rows = admin.rows(&store).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["user"], "owner1 (owner)");
    }

    #[tokio::test]
    async fn item_form_sets_tags_and_photo() {
        let store = MemoryStore::new();
        let user_id = owner(&store).await;
        let restaurant = RestaurantAdmin::new()
            .create(
                &store,
                json!({ "user": user_id, "name": "Thai Spice", "latitude": 0, "longitude": 0 }),
            )
            .await
            .unwrap();
        let spicy = store.create_tag("Spicy").await.unwrap();
        let thai = store.create_tag("Thai").await.unwrap();

        let admin = ItemAdmin::new();
        let row = admin
            .create(
                &store,
                json!({
                    "restaurant": restaurant["id"],
                    "name": "Green Curry",
                    "price": "12.99",
                    "tags": [spicy.id, thai.id],
                }),
            )
            .await
            .unwrap();
        let id = row["id"].as_i64().unwrap();
        assert_eq!(row[crate::admin::DISPLAY], "Green Curry - Thai Spice");
        assert_eq!(row["tags"], json!([spicy.id, thai.id]));

        let row = admin.set_photo(&store, id, "menu_items/abc.jpg").await.unwrap();
        assert_eq!(row["photo"], "menu_items/abc.jpg");
        assert_eq!(row["tags"], json!([spicy.id, thai.id]));
        let item = store.get_item(id).await.unwrap();
        assert_eq!(item.price, Decimal::new(1299, 2));

        let err = admin
            .create(
                &store,
                json!({
                    "restaurant": restaurant["id"],
                    "name": "X",
                    "price": "1",
                    "tags": ["hot"],
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn unknown_tag_leaves_items_untouched() {
        let store = MemoryStore::new();
        let user_id = owner(&store).await;
        let restaurant = RestaurantAdmin::new()
            .create(
                &store,
                json!({ "user": user_id, "name": "Thai Spice", "latitude": 0, "longitude": 0 }),
            )
            .await
            .unwrap();
        let admin = ItemAdmin::new();
        let row = admin
            .create(
                &store,
                json!({ "restaurant": restaurant["id"], "name": "Pad Thai", "price": "13.99" }),
            )
            .await
            .unwrap();
        let id = row["id"].as_i64().unwrap();

        let err = admin
            .create(
                &store,
                json!({
                    "restaurant": restaurant["id"],
                    "name": "Ghost",
                    "price": "1.00",
                    "tags": [999_999],
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(store.list_items().await.unwrap().len(), 1);

        let err = admin
            .update(
                &store,
                id,
                json!({
                    "restaurant": restaurant["id"],
                    "name": "Renamed",
                    "price": "2.00",
                    "tags": [999_999],
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Invalid(_))));
        let item = store.get_item(id).await.unwrap();
        assert_eq!(item.name, "Pad Thai");
        assert_eq!(item.price, Decimal::new(1399, 2));
    }

    #[tokio::test]
    async fn photo_survives_form_saves() {
        let store = MemoryStore::new();
        let user_id = owner(&store).await;
        let admin = RestaurantAdmin::new();
        let row = admin
            .create(
                &store,
                json!({
                    "user": user_id,
                    "name": "Healthy Bites",
                    "latitude": 0,
                    "longitude": 0,
                    "photo": "other/secret.jpg",
                }),
            )
            .await
            .unwrap();
        assert_eq!(row["photo"], Value::Null);
        let id = row["id"].as_i64().unwrap();

        admin.set_photo(&store, id, "restaurants/a.jpg").await.unwrap();
        let row = admin
            .update(
                &store,
                id,
                json!({ "user": user_id, "name": "Renamed", "latitude": 0, "longitude": 0 }),
            )
            .await
            .unwrap();
        assert_eq!(row["name"], "Renamed");
        assert_eq!(row["photo"], "restaurants/a.jpg");

        let row = admin
            .update(
                &store,
                id,
                json!({
                    "user": user_id,
                    "name": "Renamed",
                    "latitude": 0,
                    "longitude": 0,
                    "photo": "other/secret.jpg",
                }),
            )
            .await
            .unwrap();
        assert_eq!(row["photo"], "restaurants/a.jpg");
        assert!(admin.admin().is_readonly("photo"));
        assert!(ItemAdmin::new().admin().is_readonly("photo"));
    }

    #[tokio::test]
    async fn tag_admin_renames_and_lists_by_id() {
        let store = MemoryStore::new();
        let admin = TagAdmin::new();
        let b = admin.create(&store, json!({ "name": "Vegan" })).await.unwrap();
        admin.create(&store, json!({ "name": "Asian" })).await.unwrap();
        let renamed = admin
            .update(&store, b["id"].as_i64().unwrap(), json!({ "name": "Vegetarian" }))
            .await
            .unwrap();
        assert_eq!(renamed["name"], "Vegetarian");

        let dup = admin.create(&store, json!({ "name": "Asian" })).await.unwrap_err();
        assert!(matches!(dup, AppError::Store(StoreError::Conflict(_))));
    }
}
