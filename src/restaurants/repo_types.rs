use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Restaurant {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub google_place_id: Option<String>,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub address: String,
    pub description: String,
    pub photo: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl fmt::Display for Restaurant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRestaurant {
    #[serde(alias = "user")]
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub google_place_id: Option<String>,
    pub latitude: Decimal,
    pub longitude: Decimal,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photo: Option<String>,
}

impl NewRestaurant {
    /// Blank place ids are stored as NULL so they never collide on the unique key.
    pub fn normalized(mut self) -> Self {
        if self
            .google_place_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            self.google_place_id = None;
        }
        self
    }
}

impl From<&Restaurant> for NewRestaurant {
    fn from(r: &Restaurant) -> Self {
        Self {
            user_id: r.user_id,
            name: r.name.clone(),
            google_place_id: r.google_place_id.clone(),
            latitude: r.latitude,
            longitude: r.longitude,
            address: r.address.clone(),
            description: r.description.clone(),
            photo: r.photo.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Menu item. Nutrition values are grams, calories are kcal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    pub description: String,
    pub photo: Option<String>,
    pub price: Decimal,
    pub totalprotein: i32,
    pub totalgreens: i32,
    pub totalcarb: i32,
    pub totalfat: i32,
    pub totalcalories: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Item {
    /// `"{item} - {restaurant}"`, the label used wherever an item is listed.
    pub fn label(&self, restaurant_name: &str) -> String {
        format!("{} - {}", self.name, restaurant_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    #[serde(alias = "restaurant")]
    pub restaurant_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photo: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub totalprotein: i32,
    #[serde(default)]
    pub totalgreens: i32,
    #[serde(default)]
    pub totalcarb: i32,
    #[serde(default)]
    pub totalfat: i32,
    #[serde(default)]
    pub totalcalories: i32,
}

impl From<&Item> for NewItem {
    fn from(i: &Item) -> Self {
        Self {
            restaurant_id: i.restaurant_id,
            name: i.name.clone(),
            description: i.description.clone(),
            photo: i.photo.clone(),
            price: i.price,
            totalprotein: i.totalprotein,
            totalgreens: i.totalgreens,
            totalcarb: i.totalcarb,
            totalfat: i.totalfat,
            totalcalories: i.totalcalories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_place_id_becomes_null() {
        let r: NewRestaurant = serde_json::from_value(serde_json::json!({
            "user": 1,
            "name": "Healthy Bites",
            "google_place_id": "  ",
            "latitude": "47.762300",
            "longitude": "-122.205400"
        }))
        .unwrap();
        let r = r.normalized();
        assert_eq!(r.user_id, 1);
        assert!(r.google_place_id.is_none());
        assert_eq!(r.latitude, Decimal::new(47_762_300, 6));
    }

    #[test]
    fn item_defaults_nutrition_to_zero() {
        let item: NewItem = serde_json::from_value(serde_json::json!({
            "restaurant_id": 3,
            "name": "Pad Thai",
            "price": "13.99"
        }))
        .unwrap();
        assert_eq!(item.price, Decimal::new(1399, 2));
        assert_eq!(item.totalcalories, 0);
        assert_eq!(item.totalprotein, 0);
        assert!(item.description.is_empty());
    }
}
