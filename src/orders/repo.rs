use async_trait::async_trait;
use tracing::instrument;

use crate::error::{StoreError, StoreResult};
use crate::orders::repo_types::{
    CustomerPreferenceTag, NewOrder, NewOrderItem, NewPreferenceTag, Order, OrderItemLine,
};
use crate::store::{OrderStore, PgStore};

const ORDER_COLUMNS: &str =
    "id, customer_id, restaurant_id, totalprice, ordertime, isrecommended, aiexplanation";

const LINE_SELECT: &str = "SELECT oi.id, oi.order_id, oi.item_id, oi.quantity, \
     i.name AS item_name, i.price AS item_price";

const PREFERENCE_COLUMNS: &str = "id, customer_id, tag_id, count";

#[async_trait]
impl OrderStore for PgStore {
    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM "order" ORDER BY ordertime DESC, id DESC"#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_order(&self, id: i64) -> StoreResult<Order> {
        sqlx::query_as::<_, Order>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM "order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("order", id))
    }

    #[instrument(
        skip(self, new),
        fields(customer_id = new.customer_id, restaurant_id = new.restaurant_id)
    )]
    async fn create_order(&self, new: &NewOrder) -> StoreResult<Order> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO "order" (customer_id, restaurant_id, totalprice, isrecommended, aiexplanation)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(new.customer_id)
        .bind(new.restaurant_id)
        .bind(new.totalprice)
        .bind(new.isrecommended)
        .bind(&new.aiexplanation)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_order(&self, id: i64, update: &NewOrder) -> StoreResult<Order> {
        sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE "order"
            SET customer_id = $2, restaurant_id = $3, totalprice = $4,
                isrecommended = $5, aiexplanation = $6
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.customer_id)
        .bind(update.restaurant_id)
        .bind(update.totalprice)
        .bind(update.isrecommended)
        .bind(&update.aiexplanation)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("order", id))
    }

    #[instrument(skip(self))]
    async fn delete_order(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query(r#"DELETE FROM "order" WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }
        Ok(())
    }

    async fn list_order_items(&self, order_id: Option<i64>) -> StoreResult<Vec<OrderItemLine>> {
        let rows = sqlx::query_as::<_, OrderItemLine>(&format!(
            "{LINE_SELECT} FROM orderitem oi JOIN item i ON i.id = oi.item_id \
             WHERE $1::BIGINT IS NULL OR oi.order_id = $1 \
             ORDER BY oi.id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_order_item(&self, id: i64) -> StoreResult<OrderItemLine> {
        sqlx::query_as::<_, OrderItemLine>(&format!(
            "{LINE_SELECT} FROM orderitem oi JOIN item i ON i.id = oi.item_id WHERE oi.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("orderitem", id))
    }

    async fn create_order_item(&self, new: &NewOrderItem) -> StoreResult<OrderItemLine> {
        let row = sqlx::query_as::<_, OrderItemLine>(&format!(
            r#"
            WITH oi AS (
                INSERT INTO orderitem (order_id, item_id, quantity)
                VALUES ($1, $2, $3)
                RETURNING id, order_id, item_id, quantity
            )
            {LINE_SELECT} FROM oi JOIN item i ON i.id = oi.item_id
            "#
        ))
        .bind(new.order_id)
        .bind(new.item_id)
        .bind(new.quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_order_item(
        &self,
        id: i64,
        update: &NewOrderItem,
    ) -> StoreResult<OrderItemLine> {
        sqlx::query_as::<_, OrderItemLine>(&format!(
            r#"
            WITH oi AS (
                UPDATE orderitem SET order_id = $2, item_id = $3, quantity = $4
                WHERE id = $1
                RETURNING id, order_id, item_id, quantity
            )
            {LINE_SELECT} FROM oi JOIN item i ON i.id = oi.item_id
            "#
        ))
        .bind(id)
        .bind(update.order_id)
        .bind(update.item_id)
        .bind(update.quantity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("orderitem", id))
    }

    async fn delete_order_item(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM orderitem WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("orderitem", id));
        }
        Ok(())
    }

    async fn list_preference_tags(&self) -> StoreResult<Vec<CustomerPreferenceTag>> {
        let rows = sqlx::query_as::<_, CustomerPreferenceTag>(&format!(
            "SELECT {PREFERENCE_COLUMNS} FROM customerpreferencetag ORDER BY count DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_preference_tag(&self, id: i64) -> StoreResult<CustomerPreferenceTag> {
        sqlx::query_as::<_, CustomerPreferenceTag>(&format!(
            "SELECT {PREFERENCE_COLUMNS} FROM customerpreferencetag WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("customerpreferencetag", id))
    }

    async fn create_preference_tag(
        &self,
        new: &NewPreferenceTag,
    ) -> StoreResult<CustomerPreferenceTag> {
        let row = sqlx::query_as::<_, CustomerPreferenceTag>(&format!(
            r#"
            INSERT INTO customerpreferencetag (customer_id, tag_id, count)
            VALUES ($1, $2, $3)
            RETURNING {PREFERENCE_COLUMNS}
            "#
        ))
        .bind(new.customer_id)
        .bind(new.tag_id)
        .bind(new.count)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_preference_tag(
        &self,
        id: i64,
        update: &NewPreferenceTag,
    ) -> StoreResult<CustomerPreferenceTag> {
        sqlx::query_as::<_, CustomerPreferenceTag>(&format!(
            r#"
            UPDATE customerpreferencetag SET customer_id = $2, tag_id = $3, count = $4
            WHERE id = $1
            RETURNING {PREFERENCE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.customer_id)
        .bind(update.tag_id)
        .bind(update.count)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("customerpreferencetag", id))
    }

    async fn delete_preference_tag(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM customerpreferencetag WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("customerpreferencetag", id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_preference(
        &self,
        customer_id: i64,
        tag_id: i64,
    ) -> StoreResult<CustomerPreferenceTag> {
        let row = sqlx::query_as::<_, CustomerPreferenceTag>(&format!(
            r#"
            INSERT INTO customerpreferencetag (customer_id, tag_id, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (customer_id, tag_id)
            DO UPDATE SET count = customerpreferencetag.count + 1
            RETURNING {PREFERENCE_COLUMNS}
            "#
        ))
        .bind(customer_id)
        .bind(tag_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
