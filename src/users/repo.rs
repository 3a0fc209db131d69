use async_trait::async_trait;
use tracing::instrument;

use crate::error::{StoreError, StoreResult};
use crate::store::{PgStore, UserStore};
use crate::users::repo_types::{Customer, NewCustomer, NewUser, User, UserUpdate};

const USER_COLUMNS: &str =
    r#"id, username, email, password_hash, "type" AS kind, is_staff, is_superuser, date_joined"#;

const CUSTOMER_COLUMNS: &str =
    "id, user_id, firstname, lastname, age, gender, weight, memo, created_at";

#[async_trait]
impl UserStore for PgStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::not_found("user", id))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, new), fields(username = %new.username))]
    async fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, "type", is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.kind.as_str())
        .bind(new.is_staff)
        .bind(new.is_superuser)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $2, email = $3, "type" = $4, is_staff = $5, is_superuser = $6
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.username)
        .bind(&update.email)
        .bind(update.kind.as_str())
        .bind(update.is_staff)
        .bind(update.is_superuser)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("user", id))
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("user", id));
        }
        Ok(())
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_customer(&self, id: i64) -> StoreResult<Customer> {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("customer", id))
    }

    async fn find_customer_by_user(&self, user_id: i64) -> StoreResult<Option<Customer>> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_customer(&self, new: &NewCustomer) -> StoreResult<Customer> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customer (user_id, firstname, lastname, age, gender, weight, memo)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(&new.firstname)
        .bind(&new.lastname)
        .bind(new.age)
        .bind(&new.gender)
        .bind(new.weight)
        .bind(&new.memo)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_customer(&self, id: i64, update: &NewCustomer) -> StoreResult<Customer> {
        sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customer
            SET user_id = $2, firstname = $3, lastname = $4, age = $5,
                gender = $6, weight = $7, memo = $8
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.user_id)
        .bind(&update.firstname)
        .bind(&update.lastname)
        .bind(update.age)
        .bind(&update.gender)
        .bind(update.weight)
        .bind(&update.memo)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("customer", id))
    }

    async fn delete_customer(&self, id: i64) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM customer WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::not_found("customer", id));
        }
        Ok(())
    }
}
