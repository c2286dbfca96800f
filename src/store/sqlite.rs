use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::store::repo::StateStore;

pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                r#"SELECT value FROM meta WHERE key=?1"#,
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO meta (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute(r#"DELETE FROM meta WHERE key=?1"#, params![key])?;
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, Option<String>)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in entries {
            match value {
                Some(v) => {
                    tx.execute(
                        r#"
                        INSERT INTO meta (key, value) VALUES (?1, ?2)
                        ON CONFLICT(key) DO UPDATE SET value=excluded.value
                        "#,
                        params![key, v],
                    )?;
                }
                None => {
                    tx.execute(r#"DELETE FROM meta WHERE key=?1"#, params![key])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
