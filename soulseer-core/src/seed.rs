// src/seed.rs
//
// Demo accounts for a fresh store: one admin, one funded client and a few
// approved readers. Skipped when the store already has an admin.

use rust_decimal::Decimal;
use tracing::info;

use soulseer_common::models::money::usd;
use soulseer_common::models::{Reader, ReaderRates, User, UserRole};
use crate::repositories::Stores;
use crate::Error;

#[derive(Debug, Clone)]
pub struct DemoAccounts {
    pub admin: User,
    pub client: User,
    pub readers: Vec<Reader>,
}

const DEMO_READERS: &[(&str, &str, &str, bool, (i64, i64, i64))] = &[
    ("luna_mystic", "luna@soulseer.com", "Luna Starweaver", true, (399, 499, 599)),
    ("mystic_raven", "raven@soulseer.com", "Raven Shadowmoon", true, (299, 399, 499)),
    ("sage_aurora", "aurora@soulseer.com", "Aurora Sage", false, (499, 599, 699)),
];

pub async fn seed_demo(stores: &Stores) -> Result<Option<DemoAccounts>, Error> {
    if !stores.users.list_users_by_role(UserRole::Admin).await?.is_empty() {
        info!("Store already seeded; skipping demo data.");
        return Ok(None);
    }

    let mut admin = User::new("admin", "admin@soulseer.com", UserRole::Admin);
    admin.full_name = Some("SoulSeer Admin".into());
    stores.users.create_user(&admin).await?;

    let mut client = User::new("seeker", "seeker@example.com", UserRole::Client);
    client.full_name = Some("Curious Seeker".into());
    client.balance = usd(5000);
    stores.users.create_user(&client).await?;

    let mut readers = Vec::with_capacity(DEMO_READERS.len());
    for (username, email, name, online, (chat, voice, video)) in DEMO_READERS {
        let mut user = User::new(username, email, UserRole::Reader);
        user.full_name = Some(name.to_string());
        user.balance = Decimal::ZERO;
        stores.users.create_user(&user).await?;

        let rates = ReaderRates {
            chat_rate: usd(*chat),
            voice_rate: usd(*voice),
            video_rate: usd(*video),
        };
        let mut reader = Reader::new(user.user_id, name, rates);
        reader.is_approved = true;
        reader.is_online = *online;
        stores.readers.create_reader(&reader).await?;
        readers.push(reader);
    }

    info!("Seeded demo data: admin, client and {} readers.", readers.len());
    Ok(Some(DemoAccounts { admin, client, readers }))
}
