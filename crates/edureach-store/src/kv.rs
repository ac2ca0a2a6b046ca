//! String key/value storage shared with the session layer.
//!
//! The session token lives under [`TOKEN_KEY`] and the signed-in user, as
//! JSON, under [`USER_KEY`]; how they get there is the session layer's
//! business.
//!
//! [`TOKEN_KEY`]: edureach_shared::constants::TOKEN_KEY
//! [`USER_KEY`]: edureach_shared::constants::USER_KEY

use rusqlite::{params, OptionalExtension};

use edureach_shared::constants::{TOKEN_KEY, USER_KEY};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    /// The stored session token, if any.
    pub fn session_token(&self) -> Result<Option<String>> {
        self.get_item(TOKEN_KEY)
    }

    /// The signed-in user saved by the session layer, if any.
    pub fn session_user(&self) -> Result<Option<User>> {
        self.get_item(USER_KEY)?
            .map(|raw| serde_json::from_str(&raw).map_err(StoreError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.session_token().unwrap().is_none());

        db.set_item(TOKEN_KEY, "a.b.c").unwrap();
        db.set_item(TOKEN_KEY, "d.e.f").unwrap();
        assert_eq!(db.session_token().unwrap().as_deref(), Some("d.e.f"));

        assert!(db.remove_item(TOKEN_KEY).unwrap());
        assert!(!db.remove_item(TOKEN_KEY).unwrap());
    }

    #[test]
    fn session_user_decodes_saved_json() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.session_user().unwrap().is_none());

        db.set_item(
            USER_KEY,
            r#"{"id":3,"name":"Asha","email":"asha@school.test","role":"student"}"#,
        )
        .unwrap();
        let user = db.session_user().unwrap().unwrap();
        assert_eq!(user.id, Some(3));
        assert_eq!(user.role, "student");

        db.set_item(USER_KEY, "{not json").unwrap();
        assert!(db.session_user().is_err());
    }
}
