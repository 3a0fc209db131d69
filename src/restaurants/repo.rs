use async_trait::async_trait;
use tracing::instrument;

use crate::error::{StoreError, StoreResult};
use crate::restaurants::repo_types::{Item, NewItem, NewRestaurant, Restaurant, Tag};
use crate::store::{CatalogStore, PgStore};

const RESTAURANT_COLUMNS: &str = "id, user_id, name, google_place_id, latitude, longitude, \
     address, description, photo, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, restaurant_id, name, description, photo, price, \
     totalprotein, totalgreens, totalcarb, totalfat, totalcalories, created_at, updated_at";

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_restaurants(&self) -> StoreResult<Vec<Restaurant>> {
        let rows = sqlx::query_as::<_, Restaurant>(&format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurant ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_restaurant(&self, id: i64) -> StoreResult<Restaurant> {
        sqlx::query_as::<_, Restaurant>(&format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurant WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("restaurant", id))
    }

    async fn find_restaurant_by_place_id(
        &self,
        place_id: &str,
    ) -> StoreResult<Option<Restaurant>> {
        let row = sqlx::query_as::<_, Restaurant>(&format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurant WHERE google_place_id = $1"
        ))
        .bind(place_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    async fn create_restaurant(&self, new: &NewRestaurant) -> StoreResult<Restaurant> {
        let row = sqlx::query_as::<_, Restaurant>(&format!(
            r#"
            INSERT INTO restaurant
                (user_id, name, google_place_id, latitude, longitude, address, description, photo)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RESTAURANT_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(&new.name)
        .bind(&new.google_place_id)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(&new.address)
        .bind(&new.description)
        .bind(&new.photo)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_restaurant(
        &self,
        id: i64,
        update: &NewRestaurant,
    ) -> StoreResult<Restaurant> {
        sqlx::query_as::<_, Restaurant>(&format!(
            r#"
            UPDATE restaurant
            SET user_id = $2, name = $3, google_place_id = $4, latitude = $5, longitude = $6,
                address = $7, description = $8, photo = $9, updated_at = now()
            WHERE id = $1
            RETURNING {RESTAURANT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.user_id)
        .bind(&update.name)
        .bind(&update.google_place_id)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(&update.address)
        .bind(&update.description)
        .bind(&update.photo)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("restaurant", id))
    }

    #[instrument(skip(self))]
    async fn delete_restaurant(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM restaurant WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("restaurant", id));
        }
        Ok(())
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>("SELECT id, name FROM tag ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_tag(&self, id: i64) -> StoreResult<Tag> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tag WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::not_found("tag", id))
    }

    async fn find_tag_by_name(&self, name: &str) -> StoreResult<Option<Tag>> {
        let row = sqlx::query_as::<_, Tag>("SELECT id, name FROM tag WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_tags_by_names(&self, names: &[&str]) -> StoreResult<Vec<Tag>> {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let rows = sqlx::query_as::<_, Tag>(
            "SELECT id, name FROM tag WHERE name = ANY($1) ORDER BY name",
        )
        .bind(&names)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_tag(&self, name: &str) -> StoreResult<Tag> {
        let row = sqlx::query_as::<_, Tag>(
            "INSERT INTO tag (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn rename_tag(&self, id: i64, name: &str) -> StoreResult<Tag> {
        sqlx::query_as::<_, Tag>("UPDATE tag SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::not_found("tag", id))
    }

    async fn delete_tag(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM tag WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("tag", id));
        }
        Ok(())
    }

    async fn list_items(&self) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM item ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_item(&self, id: i64) -> StoreResult<Item> {
        sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM item WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::not_found("item", id))
    }

    async fn find_item(&self, restaurant_id: i64, name: &str) -> StoreResult<Option<Item>> {
        let row = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE restaurant_id = $1 AND name = $2 \
             ORDER BY id LIMIT 1"
        ))
        .bind(restaurant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, new), fields(name = %new.name, restaurant_id = new.restaurant_id))]
    async fn create_item(&self, new: &NewItem) -> StoreResult<Item> {
        let row = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO item
                (restaurant_id, name, description, photo, price,
                 totalprotein, totalgreens, totalcarb, totalfat, totalcalories)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(new.restaurant_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.photo)
        .bind(new.price)
        .bind(new.totalprotein)
        .bind(new.totalgreens)
        .bind(new.totalcarb)
        .bind(new.totalfat)
        .bind(new.totalcalories)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_item(&self, id: i64, update: &NewItem) -> StoreResult<Item> {
        sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE item
            SET restaurant_id = $2, name = $3, description = $4, photo = $5, price = $6,
                totalprotein = $7, totalgreens = $8, totalcarb = $9, totalfat = $10,
                totalcalories = $11, updated_at = now()
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.restaurant_id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.photo)
        .bind(update.price)
        .bind(update.totalprotein)
        .bind(update.totalgreens)
        .bind(update.totalcarb)
        .bind(update.totalfat)
        .bind(update.totalcalories)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("item", id))
    }

    async fn delete_item(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM item WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("item", id));
        }
        Ok(())
    }

    #[instrument(skip(self, tag_ids), fields(tags = tag_ids.len()))]
    async fn set_item_tags(&self, item_id: i64, tag_ids: &[i64]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM item WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("item", item_id));
        }
        sqlx::query("DELETE FROM item_tags WHERE item_id = $1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO item_tags (item_id, tag_id)
            SELECT $1, t FROM UNNEST($2::BIGINT[]) AS t
            ON CONFLICT (item_id, tag_id) DO NOTHING
            "#,
        )
        .bind(item_id)
        .bind(tag_ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn item_tag_ids(&self, item_id: i64) -> StoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT tag_id FROM item_tags WHERE item_id = $1 ORDER BY tag_id",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
