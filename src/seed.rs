//! Idempotent database seeding: reference tags plus a small sample catalog.
//!
//! Every insert is a get-or-create, so running the seed again leaves existing rows alone.

use std::io::Write;

use anyhow::Context;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::restaurants::repo_types::{NewItem, NewRestaurant, Restaurant};
use crate::restaurants::tags::all_tag_names;
use crate::store::{CatalogStore, Store, UserStore};
use crate::users::password::hash_password;
use crate::users::repo_types::{NewCustomer, NewUser, User, UserType};

const SAMPLE_PASSWORD: &str = "password123";

struct SampleRestaurant {
    name: &'static str,
    google_place_id: &'static str,
    /// Degrees scaled by 10^4.
    latitude: i64,
    longitude: i64,
    address: &'static str,
    description: &'static str,
    items: &'static [SampleItem],
}

struct SampleItem {
    name: &'static str,
    description: &'static str,
    /// Cents.
    price: i64,
    protein: i32,
    greens: i32,
    carb: i32,
    fat: i32,
    calories: i32,
    tags: &'static [&'static str],
}

const RESTAURANTS: &[SampleRestaurant] = &[
    SampleRestaurant {
        name: "Healthy Bites",
        google_place_id: "ChIJ_sample_healthy_bites",
        latitude: 477_623,
        longitude: -1_222_054,
        address: "10116 Main St, Bothell, WA 98011",
        description: "Fresh, healthy meals with a focus on nutrition",
        items: &[
            SampleItem {
                name: "Grilled Chicken Salad",
                description: "Fresh greens with grilled chicken breast",
                price: 1299,
                protein: 35,
                greens: 150,
                carb: 20,
                fat: 10,
                calories: 320,
                tags: &["American", "High Protein", "Low Carb", "Chicken", "Main Course", "None"],
            },
            SampleItem {
                name: "Quinoa Buddha Bowl",
                description: "Quinoa with roasted vegetables and tahini",
                price: 1199,
                protein: 15,
                greens: 200,
                carb: 65,
                fat: 12,
                calories: 450,
                tags: &["American", "High Fiber", "Mainly Vegetable", "Main Course", "None"],
            },
        ],
    },
    SampleRestaurant {
        name: "Dragon Palace",
        google_place_id: "ChIJ_sample_dragon_palace",
        latitude: 476_062,
        longitude: -1_223_321,
        address: "456 Pike St, Seattle, WA 98101",
        description: "Authentic Chinese cuisine",
        items: &[
            SampleItem {
                name: "Kung Pao Chicken",
                description: "Spicy stir-fried chicken with peanuts",
                price: 1499,
                protein: 30,
                greens: 80,
                carb: 45,
                fat: 18,
                calories: 480,
                tags: &["Chinese", "Chicken", "Spicy", "Hot", "Peanuts", "Main Course"],
            },
            SampleItem {
                name: "Vegetable Fried Rice",
                description: "Classic fried rice with mixed vegetables",
                price: 999,
                protein: 8,
                greens: 100,
                carb: 70,
                fat: 10,
                calories: 400,
                tags: &["Chinese", "Mainly Vegetable", "Savory", "None", "Main Course"],
            },
        ],
    },
    SampleRestaurant {
        name: "Thai Spice",
        google_place_id: "ChIJ_sample_thai_spice",
        latitude: 476_101,
        longitude: -1_222_015,
        address: "789 Bellevue Way, Bellevue, WA 98004",
        description: "Traditional Thai dishes with authentic flavors",
        items: &[
            SampleItem {
                name: "Pad Thai",
                description: "Stir-fried rice noodles with shrimp",
                price: 1399,
                protein: 25,
                greens: 60,
                carb: 55,
                fat: 15,
                calories: 480,
                tags: &["Thai", "Shrimp", "Sweet", "Mild", "Peanuts", "Main Course"],
            },
            SampleItem {
                name: "Green Curry",
                description: "Spicy coconut curry with vegetables",
                price: 1299,
                protein: 20,
                greens: 120,
                carb: 40,
                fat: 20,
                calories: 440,
                tags: &["Thai", "Spicy", "Hot", "Mainly Vegetable", "Main Course"],
            },
        ],
    },
];

/// Seeds `store`, writing progress lines to `out`.
pub async fn run(store: &dyn Store, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "Starting database seeding...")?;
    create_tags(store, out).await?;
    create_sample_restaurants(store, out).await?;
    create_sample_customer(store, out).await?;
    writeln!(out, "✅ Database seeding completed!")?;
    info!("database seeding completed");
    Ok(())
}

async fn create_tags(store: &dyn Store, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "Creating tags...")?;
    let mut total = 0;
    for name in all_tag_names() {
        total += 1;
        if store.find_tag_by_name(name).await?.is_none() {
            store
                .create_tag(name)
                .await
                .with_context(|| format!("create tag {name}"))?;
            writeln!(out, "  ✓ Created tag: {name}")?;
        }
    }
    writeln!(out, "✅ Created {total} tags")?;
    Ok(())
}

/// Returns the account and whether it was created.
async fn get_or_create_user(
    store: &dyn Store,
    username: &str,
    email: &str,
    kind: UserType,
) -> anyhow::Result<(User, bool)> {
    if let Some(user) = store.find_user_by_username(username).await? {
        return Ok((user, false));
    }
    let user = store
        .create_user(&NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: hash_password(SAMPLE_PASSWORD)?,
            kind,
            is_staff: false,
            is_superuser: false,
        })
        .await
        .with_context(|| format!("create user {username}"))?;
    Ok((user, true))
}

async fn create_sample_restaurants(store: &dyn Store, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "Creating sample restaurants...")?;

    let (owner, created) =
        get_or_create_user(store, "owner1", "owner@example.com", UserType::Owner).await?;
    if created {
        writeln!(out, "  ✓ Created owner user")?;
    }

    for sample in RESTAURANTS {
        if store
            .find_restaurant_by_place_id(sample.google_place_id)
            .await?
            .is_some()
        {
            debug!(restaurant = sample.name, "restaurant already seeded");
            continue;
        }
        let restaurant = store
            .create_restaurant(&NewRestaurant {
                user_id: owner.id,
                name: sample.name.into(),
                google_place_id: Some(sample.google_place_id.into()),
                latitude: Decimal::new(sample.latitude, 4),
                longitude: Decimal::new(sample.longitude, 4),
                address: sample.address.into(),
                description: sample.description.into(),
                photo: None,
            })
            .await
            .with_context(|| format!("create restaurant {}", sample.name))?;
        writeln!(out, "  ✓ Created restaurant: {}", sample.name)?;
        create_menu_items(store, out, &restaurant, sample.items).await?;
    }

    writeln!(out, "✅ Created sample restaurants")?;
    Ok(())
}

async fn create_menu_items(
    store: &dyn Store,
    out: &mut dyn Write,
    restaurant: &Restaurant,
    items: &[SampleItem],
) -> anyhow::Result<()> {
    for sample in items {
        if store.find_item(restaurant.id, sample.name).await?.is_some() {
            continue;
        }
        let item = store
            .create_item(&NewItem {
                restaurant_id: restaurant.id,
                name: sample.name.into(),
                description: sample.description.into(),
                photo: None,
                price: Decimal::new(sample.price, 2),
                totalprotein: sample.protein,
                totalgreens: sample.greens,
                totalcarb: sample.carb,
                totalfat: sample.fat,
                totalcalories: sample.calories,
            })
            .await
            .with_context(|| format!("create item {}", sample.name))?;
        let tag_ids: Vec<i64> = store
            .find_tags_by_names(sample.tags)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        store.set_item_tags(item.id, &tag_ids).await?;
        writeln!(out, "    ✓ Created item: {}", item.name)?;
    }
    Ok(())
}

async fn create_sample_customer(store: &dyn Store, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "Creating sample customer...")?;

    let (user, created) =
        get_or_create_user(store, "customer1", "customer@example.com", UserType::Customer).await?;
    if created {
        store
            .create_customer(&NewCustomer {
                user_id: user.id,
                firstname: "John".into(),
                lastname: "Doe".into(),
                age: Some(25),
                gender: "Male".into(),
                weight: Some(70),
                memo: "I want to keep fit and build muscle".into(),
            })
            .await
            .context("create sample customer profile")?;
        writeln!(out, "  ✓ Created sample customer")?;
    }
    Ok(())
}
