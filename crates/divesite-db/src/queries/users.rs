use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use divesite_types::validation::ValidationError;

use super::{OWNER_COLUMNS, OptionalExt, is_constraint_violation, owner_join, read_owner};
use crate::Database;
use crate::models::{OwnerRow, ProfileImageRow, ProfileRow, ProfileStatsRow, UserRow};

impl Database {
    // -- Users --

    /// Create a user together with its profile.
    pub fn create_user(&self, email: &str, password_hash: &str, name: &str) -> Result<UserRow> {
        self.with_tx(|tx| {
            let id = Uuid::new_v4();
            let now = Utc::now();

            tx.execute(
                "INSERT INTO users (id, email, password, date_joined) VALUES (?1, ?2, ?3, ?4)",
                params![id, email, password_hash, now],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    anyhow::Error::new(ValidationError(format!("\"{email}\" is already registered.")))
                } else {
                    e.into()
                }
            })?;
            tx.execute(
                "INSERT INTO profiles (user_id, name) VALUES (?1, ?2)",
                params![id, name],
            )?;

            Ok(UserRow {
                id,
                email: email.to_string(),
                password: password_hash.to_string(),
                date_joined: now,
            })
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, date_joined FROM users WHERE email = ?1",
                [email],
                read_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, date_joined FROM users WHERE id = ?1",
                [id],
                read_user,
            )
            .optional()
        })
    }

    // -- Profiles --

    pub fn get_profile(&self, id: Uuid) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {OWNER_COLUMNS}, op.bio, u.email, u.date_joined
                 FROM users u {}
                 WHERE u.id = ?1",
                owner_join("u.id")
            );
            conn.query_row(&sql, [id], |row| {
                Ok(ProfileRow {
                    owner: read_owner(row, 0)?,
                    bio: row.get(5)?,
                    email: row.get(6)?,
                    date_joined: row.get(7)?,
                })
            })
            .optional()
        })
    }

    pub fn get_owner(&self, id: Uuid) -> Result<Option<OwnerRow>> {
        self.with_conn(|conn| query_owner(conn, id))
    }

    /// Returns false when the profile does not exist.
    pub fn update_profile(&self, id: Uuid, name: Option<&str>, bio: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET name = COALESCE(?2, name), bio = COALESCE(?3, bio) WHERE user_id = ?1",
                params![id, name, bio],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn profile_stats(&self, id: Uuid, now: DateTime<Utc>) -> Result<ProfileStatsRow> {
        self.with_conn(|conn| {
            let year_ago = now - Duration::days(365);
            let quarter_ago = now - Duration::days(90);
            let stats = conn.query_row(
                "SELECT
                    COALESCE(SUM(duration), 0),
                    COUNT(DISTINCT divesite_id),
                    COALESCE(SUM(start_time >= ?2), 0),
                    COALESCE(SUM(start_time >= ?3), 0)
                 FROM dives WHERE diver_id = ?1",
                params![id, year_ago, quarter_ago],
                |row| {
                    Ok(ProfileStatsRow {
                        total_dive_seconds: row.get(0)?,
                        divesites_visited: row.get(1)?,
                        dives_in_last_365_days: row.get(2)?,
                        dives_in_last_90_days: row.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    // -- Profile images --

    /// Replace the user's profile image with a new one.
    pub fn set_profile_image(&self, user_id: Uuid, asset: &str) -> Result<ProfileImageRow> {
        divesite_types::validation::validate_text("image", asset)?;
        self.with_conn(|conn| {
            let image = ProfileImageRow {
                id: Uuid::new_v4(),
                asset: asset.to_string(),
                creation_date: Utc::now(),
            };
            conn.execute(
                "INSERT OR REPLACE INTO profile_images (user_id, id, asset, creation_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, image.id, image.asset, image.creation_date],
            )?;
            Ok(image)
        })
    }

    pub fn get_profile_image(&self, user_id: Uuid) -> Result<Option<ProfileImageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, asset, creation_date FROM profile_images WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(ProfileImageRow {
                        id: row.get(0)?,
                        asset: row.get(1)?,
                        creation_date: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_profile_image(&self, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM profile_images WHERE user_id = ?1", [user_id])?;
            Ok(removed > 0)
        })
    }
}

pub(crate) fn query_owner(conn: &Connection, id: Uuid) -> Result<Option<OwnerRow>> {
    let sql = format!(
        "SELECT {OWNER_COLUMNS} FROM users u {} WHERE u.id = ?1",
        owner_join("u.id")
    );
    conn.query_row(&sql, [id], |row| read_owner(row, 0)).optional()
}

fn read_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        date_joined: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use divesite_types::models::SiteKind;

    use crate::queries::testutil::{db, dive_fields, new_dive, site, user};
    use crate::ValidationError;

    #[test]
    fn creating_a_user_creates_a_profile() {
        let db = db();
        let u = db.create_user("ann@example.com", "hash", "Ann").unwrap();
        let profile = db.get_profile(u.id).unwrap().unwrap();
        assert_eq!(profile.owner.name, "Ann");
        assert_eq!(profile.email, "ann@example.com");
        assert!(profile.owner.image.is_none());
    }

    #[test]
    fn email_is_unique_case_insensitively() {
        let db = db();
        user(&db, "bob@example.com");
        let err = db.create_user("BOB@example.com", "hash", "").unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());
        assert!(db.get_user_by_email("Bob@Example.com").unwrap().is_some());
    }

    #[test]
    fn profile_update_keeps_unspecified_fields() {
        let db = db();
        let u = user(&db, "cat@example.com");
        assert!(db.update_profile(u.id, None, Some("wreck diver")).unwrap());
        let p = db.get_profile(u.id).unwrap().unwrap();
        assert_eq!(p.owner.name, "cat");
        assert_eq!(p.bio, "wreck diver");
        assert!(!db.update_profile(uuid::Uuid::new_v4(), Some("x"), None).unwrap());
    }

    #[test]
    fn profile_stats_count_recent_dives() {
        let db = db();
        let owner = user(&db, "owner@example.com");
        let diver = user(&db, "diver@example.com");
        let a = site(&db, SiteKind::Divesite, owner.id, 50.0, -5.0);
        let b = site(&db, SiteKind::Divesite, owner.id, 51.0, -5.0);

        db.create_dive(&new_dive(a.id, diver.id, dive_fields(10, 3600, 20.0))).unwrap();
        db.create_dive(&new_dive(a.id, diver.id, dive_fields(100, 1800, 15.0))).unwrap();
        db.create_dive(&new_dive(b.id, diver.id, dive_fields(400, 5400, 30.0))).unwrap();

        let stats = db.profile_stats(diver.id, Utc::now()).unwrap();
        assert_eq!(stats.total_dive_seconds, 3600 + 1800 + 5400);
        assert_eq!(stats.divesites_visited, 2);
        assert_eq!(stats.dives_in_last_365_days, 2);
        assert_eq!(stats.dives_in_last_90_days, 1);

        let empty = db.profile_stats(owner.id, Utc::now()).unwrap();
        assert_eq!(empty.total_dive_seconds, 0);
        assert_eq!(empty.divesites_visited, 0);
    }

    #[test]
    fn profile_image_is_replaced() {
        let db = db();
        let u = user(&db, "dee@example.com");
        let first = db.set_profile_image(u.id, "avatars/one").unwrap();
        let second = db.set_profile_image(u.id, "avatars/two").unwrap();
        assert_ne!(first.id, second.id);

        let current = db.get_profile_image(u.id).unwrap().unwrap();
        assert_eq!(current.asset, "avatars/two");
        assert_eq!(db.get_owner(u.id).unwrap().unwrap().image.unwrap().id, second.id);

        assert!(db.delete_profile_image(u.id).unwrap());
        assert!(!db.delete_profile_image(u.id).unwrap());
    }
}
