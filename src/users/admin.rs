use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    password::{hash_password, is_valid_email},
    repo_types::{NewCustomer, NewUser, User, UserType, UserUpdate},
};
use crate::admin::{
    site::{display_row, parse_form},
    AdminResource, AdminSite, ModelAdmin, Row,
};
use crate::error::AppError;
use crate::store::{Store, UserStore};

pub fn register(site: &mut AdminSite) {
    site.register(UserAdmin::new());
    site.register(CustomerAdmin::new());
}

/// Form for adding an account. The password is write-only.
#[derive(Debug, Deserialize)]
struct UserForm {
    username: String,
    password: String,
    #[serde(default)]
    email: String,
    #[serde(rename = "type", default)]
    kind: UserType,
    #[serde(default)]
    is_staff: bool,
    #[serde(default)]
    is_superuser: bool,
}

fn check_email(email: &str) -> Result<(), AppError> {
    if !email.is_empty() && !is_valid_email(email) {
        return Err(AppError::BadRequest(format!("invalid email {email:?}")));
    }
    Ok(())
}

fn user_row(user: &User) -> Result<Row, AppError> {
    display_row(user, user.to_string())
}

pub struct UserAdmin {
    admin: ModelAdmin,
}

impl UserAdmin {
    pub fn new() -> Self {
        let admin = ModelAdmin::new("user", "Users")
            .list_display(["username", "email", "type", "is_staff", "date_joined"])
            .list_filter(["type", "is_staff", "is_superuser"])
            .search_fields(["username", "email"])
            .ordering(["username"])
            .readonly_fields(["date_joined"])
            .fieldset("", ["username", "password"])
            .fieldset("Personal info", ["email"])
            .fieldset("Permissions", ["is_staff", "is_superuser"])
            .fieldset("Important dates", ["date_joined"])
            .fieldset("User Type", ["type"]);
        Self { admin }
    }
}

#[async_trait]
impl AdminResource for UserAdmin {
    fn admin(&self) -> &ModelAdmin {
        &self.admin
    }

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError> {
        store.list_users().await?.iter().map(user_row).collect()
    }

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError> {
        user_row(&store.get_user(id).await?)
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError> {
        let form: UserForm = parse_form(form)?;
        check_email(&form.email)?;
        if form.password.is_empty() {
            return Err(AppError::BadRequest("password is required".into()));
        }
        let user = store
            .create_user(&NewUser {
                username: form.username,
                email: form.email,
                password_hash: hash_password(&form.password)?,
                kind: form.kind,
                is_staff: form.is_staff,
                is_superuser: form.is_superuser,
            })
            .await?;
        user_row(&user)
    }

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError> {
        let update: UserUpdate = parse_form(form)?;
        check_email(&update.email)?;
        user_row(&store.update_user(id, &update).await?)
    }

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError> {
        Ok(store.delete_user(id).await?)
    }
}

pub struct CustomerAdmin {
    admin: ModelAdmin,
}

impl CustomerAdmin {
    pub fn new() -> Self {
        let admin = ModelAdmin::new("customer", "Customers")
            .list_display(["firstname", "lastname", "user", "age", "gender", "created_at"])
            .list_filter(["gender", "created_at"])
            .search_fields(["firstname", "lastname", "user__username"])
            .fieldset("Basic Info", ["user", "firstname", "lastname"])
            .fieldset("Details", ["age", "gender", "weight", "memo"]);
        Self { admin }
    }
}

#[async_trait]
impl AdminResource for CustomerAdmin {
    fn admin(&self) -> &ModelAdmin {
        &self.admin
    }

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError> {
        let users: HashMap<i64, User> = store
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        store
            .list_customers()
            .await?
            .iter()
            .map(|c| -> Result<Row, AppError> {
                let mut row = display_row(c, c.to_string())?;
                if let Some(user) = users.get(&c.user_id) {
                    row.insert("user".into(), json!(user.to_string()));
                    row.insert("user__username".into(), json!(user.username));
                }
                Ok(row)
            })
            .collect()
    }

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError> {
        let customer = store.get_customer(id).await?;
        display_row(&customer, customer.to_string())
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError> {
        let new: NewCustomer = parse_form(form)?;
        let customer = store.create_customer(&new).await?;
        display_row(&customer, customer.to_string())
    }

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError> {
        let update: NewCustomer = parse_form(form)?;
        let customer = store.update_customer(id, &update).await?;
        display_row(&customer, customer.to_string())
    }

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError> {
        Ok(store.delete_customer(id).await?)
    }
}
