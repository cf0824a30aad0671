//! Users, permissions and an audit log, composed from the CRUD primitives.
//!
//! The tables are named by the caller and must already exist:
//! - users: `username`, `password`, `role`
//! - permissions: `username`, `permission`
//! - audit log: `action`, `details`
//! - roles: `role`, `description`
//!
//! Passwords are stored as the hex SHA-256 of the UTF-8 password, unsalted
//! and unstretched, so existing tables stay compatible. Do not use this for
//! anything facing untrusted users.

use super::DatabaseClient;
use crate::core::db::Value;
use crate::core::Result;
use crate::params;
use sha2::{Digest, Sha256};

/// Seed rows written by [`DatabaseClient::create_roles`].
pub const DEFAULT_ROLES: [(&str, &str); 4] = [
    ("admin", "Administrator with full access"),
    ("user", "Regular user with limited access"),
    ("remote", "Remote user with specific permissions"),
    ("localhost", "Local user with specific permissions"),
];

/// Lowercase hex SHA-256 of `password`.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

impl DatabaseClient {
    pub fn create_user(&mut self, table: &str, username: &str, password: &str, role: &str) -> Result<()> {
        self.insert(
            table,
            &["username", "password", "role"],
            &params![username, hash_password(password), role],
        )?;
        Ok(())
    }

    /// Returns the number of removed users (0 when unknown).
    pub fn delete_user(&mut self, table: &str, username: &str) -> Result<u64> {
        self.remove(table, "username = ?", &params![username])
    }

    pub fn set_password(&mut self, table: &str, username: &str, new_password: &str) -> Result<u64> {
        self.update(
            table,
            "password = ?",
            "username = ?",
            &params![hash_password(new_password), username],
        )
    }

    /// False when the user does not exist or the hash differs.
    pub fn verify_password(&mut self, table: &str, username: &str, password: &str) -> Result<bool> {
        let rows = self.fetch(table, &["password"], "username = ?", &params![username])?;
        let expected = hash_password(password);
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_str)
            .map_or(false, |stored| stored == expected))
    }

    /// The stored role of `username`, if the user exists.
    pub fn role_of(&mut self, table: &str, username: &str) -> Result<Option<String>> {
        let rows = self.fetch(table, &["role"], "username = ?", &params![username])?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .and_then(Value::into_string))
    }

    /// Adds a permission row. Duplicates are not checked.
    pub fn grant_permission(&mut self, table: &str, username: &str, permission: &str) -> Result<()> {
        self.insert(table, &["username", "permission"], &params![username, permission])?;
        Ok(())
    }

    pub fn revoke_permission(&mut self, table: &str, username: &str, permission: &str) -> Result<u64> {
        self.remove(
            table,
            "username = ? AND permission = ?",
            &params![username, permission],
        )
    }

    pub fn get_permissions(&mut self, table: &str, username: &str) -> Result<Vec<String>> {
        let rows = self.fetch(table, &["permission"], "username = ?", &params![username])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().and_then(Value::into_string))
            .collect())
    }

    pub fn log_action(&mut self, table: &str, action: &str, details: &str) -> Result<()> {
        self.insert(table, &["action", "details"], &params![action, details])?;
        Ok(())
    }

    /// Every `(action, details)` pair in storage order.
    pub fn get_audit_log(&mut self, table: &str) -> Result<Vec<(String, String)>> {
        let rows = self.fetch(table, &["action", "details"], "", &[])?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter().map(|v| match v {
                    Value::Text(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                });
                let action = cells.next().unwrap_or_default();
                let details = cells.next().unwrap_or_default();
                (action, details)
            })
            .collect())
    }

    /// Seeds the four fixed roles.
    pub fn create_roles(&mut self, table: &str) -> Result<u64> {
        let rows: Vec<Vec<Value>> = DEFAULT_ROLES
            .iter()
            .map(|(role, description)| params![*role, *description])
            .collect();
        self.batch_insert(table, &["role", "description"], &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> DatabaseClient {
        let mut client = DatabaseClient::open_in_memory().unwrap();
        client
            .create_table("users", &[("username", "TEXT"), ("password", "TEXT"), ("role", "TEXT")])
            .unwrap();
        client
            .create_table("permissions", &[("username", "TEXT"), ("permission", "TEXT")])
            .unwrap();
        client
            .create_table("audit", &[("action", "TEXT"), ("details", "TEXT")])
            .unwrap();
        client
            .create_table("roles", &[("role", "TEXT"), ("description", "TEXT")])
            .unwrap();
        client
    }

    #[test]
    fn test_hash_password_is_sha256_hex() {
        assert_eq!(
            hash_password("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
        assert_eq!(hash_password("secret").len(), 64);
    }

    #[test]
    fn test_create_and_verify_user() {
        let mut client = setup();
        client.create_user("users", "alice", "secret", "admin").unwrap();

        assert!(client.verify_password("users", "alice", "secret").unwrap());
        assert!(!client.verify_password("users", "alice", "wrong").unwrap());
        assert!(!client.verify_password("users", "nobody", "secret").unwrap());
        assert_eq!(client.role_of("users", "alice").unwrap().as_deref(), Some("admin"));

        // the plain password is never stored
        let stored = client.fetch("users", &["password"], "", &[]).unwrap();
        assert_eq!(stored, vec![params![hash_password("secret")]]);
    }

    #[test]
    fn test_set_password_and_delete_user() {
        let mut client = setup();
        client.create_user("users", "bob", "old", "user").unwrap();

        assert_eq!(client.set_password("users", "bob", "new").unwrap(), 1);
        assert!(!client.verify_password("users", "bob", "old").unwrap());
        assert!(client.verify_password("users", "bob", "new").unwrap());

        assert_eq!(client.delete_user("users", "bob").unwrap(), 1);
        assert!(!client.verify_password("users", "bob", "new").unwrap());
        assert_eq!(client.role_of("users", "bob").unwrap(), None);
    }

    #[test]
    fn test_permissions() {
        let mut client = setup();
        client.grant_permission("permissions", "alice", "read").unwrap();
        client.grant_permission("permissions", "alice", "write").unwrap();
        client.grant_permission("permissions", "alice", "read").unwrap();
        client.grant_permission("permissions", "bob", "read").unwrap();

        assert_eq!(
            client.get_permissions("permissions", "alice").unwrap(),
            vec!["read", "write", "read"]
        );

        // revoking removes every duplicate
        assert_eq!(client.revoke_permission("permissions", "alice", "read").unwrap(), 2);
        assert_eq!(client.get_permissions("permissions", "alice").unwrap(), vec!["write"]);
        assert!(client.get_permissions("permissions", "carol").unwrap().is_empty());
    }

    #[test]
    fn test_audit_log() {
        let mut client = setup();
        client.log_action("audit", "login", "alice from 10.0.0.1").unwrap();
        client.log_action("audit", "logout", "").unwrap();

        assert_eq!(
            client.get_audit_log("audit").unwrap(),
            vec![
                ("login".to_string(), "alice from 10.0.0.1".to_string()),
                ("logout".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_create_roles() {
        let mut client = setup();
        assert_eq!(client.create_roles("roles").unwrap(), 4);

        let roles = client.fetch("roles", &["role"], "", &[]).unwrap();
        let names: Vec<String> = roles
            .into_iter()
            .filter_map(|row| row.into_iter().next().and_then(Value::into_string))
            .collect();
        assert_eq!(names, vec!["admin", "user", "remote", "localhost"]);
    }
}
