//! Durable task state in SQLite. Records survive restarts; `stockhawk
//! run` resumes everything still marked active.

pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use rusqlite::{Connection, params};
use tokio::sync::Mutex;

use types::{CheckoutTaskRecord, MonitorRecord, PriceAlertRecord, Profile};

pub struct TaskStore {
    db: Arc<Mutex<Connection>>,
}

impl TaskStore {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir)?;
        }
        let db = Connection::open(data_dir.join("stockhawk.db"))?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL,
                address1 TEXT NOT NULL,
                address2 TEXT,
                city TEXT NOT NULL,
                zip TEXT NOT NULL,
                phone TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS monitors (
                id TEXT PRIMARY KEY,
                product_url TEXT NOT NULL,
                notify INTEGER NOT NULL DEFAULT 1,
                active INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS checkout_tasks (
                id TEXT PRIMARY KEY,
                product_url TEXT NOT NULL,
                profile_id TEXT NOT NULL,
                profile_name TEXT NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 1,
                auto_checkout INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS price_alerts (
                id TEXT PRIMARY KEY,
                product_url TEXT NOT NULL,
                target_price REAL NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    // --- Profiles ---

    /// Insert or update by name. Updating keeps the original row id, so
    /// checkout tasks that pinned this profile keep pointing at it.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO profiles (id, name, first_name, last_name, email, address1, address2, city, zip, phone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(name) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                email = excluded.email,
                address1 = excluded.address1,
                address2 = excluded.address2,
                city = excluded.city,
                zip = excluded.zip,
                phone = excluded.phone",
            params![
                profile.id,
                profile.name,
                profile.first_name,
                profile.last_name,
                profile.email,
                profile.address1,
                profile.address2,
                profile.city,
                profile.zip,
                profile.phone,
            ],
        )?;
        Ok(())
    }

    pub async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, name, first_name, last_name, email, address1, address2, city, zip, phone
             FROM profiles WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_profile)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn get_profile_by_name(&self, name: &str) -> Result<Option<Profile>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, name, first_name, last_name, email, address1, address2, city, zip, phone
             FROM profiles WHERE name = ?1",
        )?;
        let mut rows = stmt.query_map(params![name], row_to_profile)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, name, first_name, last_name, email, address1, address2, city, zip, phone
             FROM profiles ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_profile)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn remove_profile(&self, name: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_deleted = db.execute("DELETE FROM profiles WHERE name = ?1", params![name])?;
        Ok(rows_deleted > 0)
    }

    // --- Monitors ---

    pub async fn add_monitor(&self, record: &MonitorRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO monitors (id, product_url, notify, active) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.product_url,
                record.notify as i32,
                record.active as i32
            ],
        )?;
        Ok(())
    }

    pub async fn list_monitors(&self, active_only: bool) -> Result<Vec<MonitorRecord>> {
        let db = self.db.lock().await;
        let sql = if active_only {
            "SELECT id, product_url, notify, active, created_at FROM monitors WHERE active = 1 ORDER BY created_at"
        } else {
            "SELECT id, product_url, notify, active, created_at FROM monitors ORDER BY created_at"
        };
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(MonitorRecord {
                id: row.get(0)?,
                product_url: row.get(1)?,
                notify: row.get::<_, i32>(2)? != 0,
                active: row.get::<_, i32>(3)? != 0,
                created_at: row.get(4)?,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn set_monitor_active(&self, id: &str, active: bool) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_updated = db.execute(
            "UPDATE monitors SET active = ?1 WHERE id = ?2",
            params![active as i32, id],
        )?;
        Ok(rows_updated > 0)
    }

    // --- Checkout tasks ---

    pub async fn add_checkout_task(&self, record: &CheckoutTaskRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO checkout_tasks
                (id, product_url, profile_id, profile_name, quantity, auto_checkout, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.product_url,
                record.profile_id,
                record.profile_name,
                record.quantity,
                record.auto_checkout as i32,
                record.active as i32
            ],
        )?;
        Ok(())
    }

    pub async fn get_checkout_task(&self, id: &str) -> Result<Option<CheckoutTaskRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, product_url, profile_id, profile_name, quantity, auto_checkout, active, created_at
             FROM checkout_tasks WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_task)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn list_checkout_tasks(&self, active_only: bool) -> Result<Vec<CheckoutTaskRecord>> {
        let db = self.db.lock().await;
        let sql = if active_only {
            "SELECT id, product_url, profile_id, profile_name, quantity, auto_checkout, active, created_at
             FROM checkout_tasks WHERE active = 1 ORDER BY created_at"
        } else {
            "SELECT id, product_url, profile_id, profile_name, quantity, auto_checkout, active, created_at
             FROM checkout_tasks ORDER BY created_at"
        };
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map([], row_to_task)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn set_task_active(&self, id: &str, active: bool) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_updated = db.execute(
            "UPDATE checkout_tasks SET active = ?1 WHERE id = ?2",
            params![active as i32, id],
        )?;
        Ok(rows_updated > 0)
    }

    // --- Price alerts ---

    pub async fn add_price_alert(&self, record: &PriceAlertRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO price_alerts (id, product_url, target_price, active)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.product_url,
                record.target_price,
                record.active as i32
            ],
        )?;
        Ok(())
    }

    pub async fn list_price_alerts(&self, active_only: bool) -> Result<Vec<PriceAlertRecord>> {
        let db = self.db.lock().await;
        let sql = if active_only {
            "SELECT id, product_url, target_price, active, created_at FROM price_alerts WHERE active = 1 ORDER BY created_at"
        } else {
            "SELECT id, product_url, target_price, active, created_at FROM price_alerts ORDER BY created_at"
        };
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(PriceAlertRecord {
                id: row.get(0)?,
                product_url: row.get(1)?,
                target_price: row.get(2)?,
                active: row.get::<_, i32>(3)? != 0,
                created_at: row.get(4)?,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn set_alert_active(&self, id: &str, active: bool) -> Result<bool> {
        let db = self.db.lock().await;
        let rows_updated = db.execute(
            "UPDATE price_alerts SET active = ?1 WHERE id = ?2",
            params![active as i32, id],
        )?;
        Ok(rows_updated > 0)
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        name: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        address1: row.get(5)?,
        address2: row.get(6)?,
        city: row.get(7)?,
        zip: row.get(8)?,
        phone: row.get(9)?,
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckoutTaskRecord> {
    Ok(CheckoutTaskRecord {
        id: row.get(0)?,
        product_url: row.get(1)?,
        profile_id: row.get(2)?,
        profile_name: row.get(3)?,
        quantity: row.get(4)?,
        auto_checkout: row.get::<_, i32>(5)? != 0,
        active: row.get::<_, i32>(6)? != 0,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn sample_profile(name: &str) -> Profile {
        Profile {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            address1: "12 Analytical Way".to_string(),
            address2: None,
            city: "London".to_string(),
            zip: "N1 9GU".to_string(),
            phone: "+44 20 0000 0000".to_string(),
        }
    }

    // --- Profiles ---

    #[tokio::test]
    async fn profile_roundtrip() {
        let (_dir, store) = test_store();
        let profile = sample_profile("home");
        store.upsert_profile(&profile).await.unwrap();

        let by_name = store.get_profile_by_name("home").await.unwrap().unwrap();
        assert_eq!(by_name, profile);
        let by_id = store.get_profile(&profile.id).await.unwrap().unwrap();
        assert_eq!(by_id, profile);
        assert!(store.get_profile_by_name("office").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_update_keeps_stable_id() {
        let (_dir, store) = test_store();
        let original = sample_profile("home");
        store.upsert_profile(&original).await.unwrap();

        let mut edited = sample_profile("home");
        edited.address1 = "1 New Street".to_string();
        store.upsert_profile(&edited).await.unwrap();

        let stored = store.get_profile_by_name("home").await.unwrap().unwrap();
        // Same row id as the first insert, updated fields from the second.
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.address1, "1 New Street");
        assert_eq!(store.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn profile_remove() {
        let (_dir, store) = test_store();
        store.upsert_profile(&sample_profile("home")).await.unwrap();
        assert!(store.remove_profile("home").await.unwrap());
        assert!(!store.remove_profile("home").await.unwrap());
    }

    #[tokio::test]
    async fn profile_address2_is_nullable() {
        let (_dir, store) = test_store();
        let mut profile = sample_profile("apt");
        profile.address2 = Some("Flat 4".to_string());
        store.upsert_profile(&profile).await.unwrap();
        let stored = store.get_profile_by_name("apt").await.unwrap().unwrap();
        assert_eq!(stored.address2.as_deref(), Some("Flat 4"));
    }

    // --- Monitors ---

    #[tokio::test]
    async fn monitor_add_list_and_stop() {
        let (_dir, store) = test_store();
        let record = MonitorRecord {
            id: "m-1".to_string(),
            product_url: "https://shop.example.com/products/tee".to_string(),
            notify: true,
            active: true,
            created_at: String::new(),
        };
        store.add_monitor(&record).await.unwrap();

        let all = store.list_monitors(false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].notify);
        assert!(!all[0].created_at.is_empty());

        assert!(store.set_monitor_active("m-1", false).await.unwrap());
        assert!(store.list_monitors(true).await.unwrap().is_empty());
        assert_eq!(store.list_monitors(false).await.unwrap().len(), 1);
        assert!(!store.set_monitor_active("ghost", false).await.unwrap());
    }

    // --- Checkout tasks ---

    #[tokio::test]
    async fn checkout_task_pins_profile_id() {
        let (_dir, store) = test_store();
        let profile = sample_profile("home");
        store.upsert_profile(&profile).await.unwrap();

        let task = CheckoutTaskRecord {
            id: "t-1".to_string(),
            product_url: "https://shop.example.com/products/tee".to_string(),
            profile_id: profile.id.clone(),
            profile_name: profile.name.clone(),
            quantity: 2,
            auto_checkout: true,
            active: true,
            created_at: String::new(),
        };
        store.add_checkout_task(&task).await.unwrap();

        let stored = store.get_checkout_task("t-1").await.unwrap().unwrap();
        assert_eq!(stored.profile_id, profile.id);
        assert_eq!(stored.quantity, 2);
        assert!(stored.auto_checkout);

        // The pinned id keeps resolving even after a profile edit.
        let mut edited = sample_profile("home");
        edited.city = "Manchester".to_string();
        store.upsert_profile(&edited).await.unwrap();
        let resolved = store.get_profile(&stored.profile_id).await.unwrap().unwrap();
        assert_eq!(resolved.city, "Manchester");
    }

    #[tokio::test]
    async fn checkout_task_cancel_flips_active() {
        let (_dir, store) = test_store();
        let task = CheckoutTaskRecord {
            id: "t-2".to_string(),
            product_url: "https://shop.example.com/products/tee".to_string(),
            profile_id: "p-1".to_string(),
            profile_name: "home".to_string(),
            quantity: 1,
            auto_checkout: false,
            active: true,
            created_at: String::new(),
        };
        store.add_checkout_task(&task).await.unwrap();
        assert!(store.set_task_active("t-2", false).await.unwrap());
        assert!(store.list_checkout_tasks(true).await.unwrap().is_empty());
        let stored = store.get_checkout_task("t-2").await.unwrap().unwrap();
        assert!(!stored.active);
    }

    // --- Price alerts ---

    #[tokio::test]
    async fn price_alert_lifecycle() {
        let (_dir, store) = test_store();
        let alert = PriceAlertRecord {
            id: "a-1".to_string(),
            product_url: "https://shop.example.com/products/tee".to_string(),
            target_price: 49.99,
            active: true,
            created_at: String::new(),
        };
        store.add_price_alert(&alert).await.unwrap();

        let active = store.list_price_alerts(true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!((active[0].target_price - 49.99).abs() < f64::EPSILON);

        assert!(store.set_alert_active("a-1", false).await.unwrap());
        assert!(store.list_price_alerts(true).await.unwrap().is_empty());
        assert_eq!(store.list_price_alerts(false).await.unwrap().len(), 1);
    }
}
