use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{constraint_code, parse_column, LibraryStore, Result, StoreError};
use crate::model::{NewUser, User, UserUpdate};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, avatar, permissions, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    // Accounts provisioned without a password carry an empty hash.
    let password_hash: Option<String> = row.get("password_hash")?;

    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: password_hash.filter(|h| !h.is_empty()),
        role: parse_column(row, "role")?,
        avatar: row.get("avatar")?,
        permissions: row.get("permissions")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn get_user_by(conn: &Connection, column: &str, value: &dyn rusqlite::ToSql) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
        [value],
        user_from_row,
    )
    .optional()
}

fn map_conflict(e: rusqlite::Error) -> StoreError {
    match constraint_code(&e) {
        Some(_) => StoreError::UserConflict("Username or email already taken".to_string()),
        None => e.into(),
    }
}

impl LibraryStore {
    pub fn create_user(&self, user: NewUser) -> Result<User> {
        let conn = self.conn()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (username, email, password_hash, role, avatar, permissions, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.avatar,
                user.permissions,
                now,
            ],
        )
        .map_err(map_conflict)?;

        let id = conn.last_insert_rowid();
        debug!(user_id = id, username = %user.username, role = %user.role, "Created user");

        get_user_by(&conn, "id", &id)?.ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        Ok(get_user_by(&conn, "id", &id)?)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        Ok(get_user_by(&conn, "username", &username)?)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        Ok(get_user_by(&conn, "email", &email)?)
    }

    /// All users, newest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Apply profile changes. Returns `None` if the user does not exist.
    pub fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        let conn = self.conn()?;

        let changed = conn
            .execute(
                "UPDATE users SET
                    username   = COALESCE(?1, username),
                    email      = COALESCE(?2, email),
                    role       = COALESCE(?3, role),
                    updated_at = ?4
                 WHERE id = ?5",
                params![
                    update.username,
                    update.email,
                    update.role.map(|r| r.as_str()),
                    Utc::now(),
                    id,
                ],
            )
            .map_err(map_conflict)?;

        if changed == 0 {
            return Ok(None);
        }

        Ok(get_user_by(&conn, "id", &id)?)
    }
}
