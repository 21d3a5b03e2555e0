use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::Database;

impl Database {
    /// Returns true if a new follow was created, false if it already existed.
    /// Following yourself fails the table's CHECK constraint.
    pub fn follow(&self, follower_id: Uuid, target_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO follows (follower_id, target_id, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (follower_id, target_id) DO NOTHING",
                params![follower_id, target_id, Utc::now()],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn unfollow(&self, follower_id: Uuid, target_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND target_id = ?2",
                params![follower_id, target_id],
            )?;
            Ok(removed > 0)
        })
    }

    /// Users following `user_id`, in the order they started following.
    pub fn followers(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.follow_ids(
            "SELECT follower_id FROM follows WHERE target_id = ?1 ORDER BY created_at",
            user_id,
        )
    }

    /// Users `user_id` follows.
    pub fn follows(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.follow_ids(
            "SELECT target_id FROM follows WHERE follower_id = ?1 ORDER BY created_at",
            user_id,
        )
    }

    fn follow_ids(&self, sql: &str, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<Uuid>, _>>()?;
            Ok(ids)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::is_constraint_violation;
    use crate::queries::testutil::{db, user};

    #[test]
    fn following_is_asymmetric_and_idempotent() {
        let db = db();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");

        assert!(db.follow(a.id, b.id).unwrap());
        assert!(!db.follow(a.id, b.id).unwrap());

        assert_eq!(db.follows(a.id).unwrap(), vec![b.id]);
        assert_eq!(db.followers(b.id).unwrap(), vec![a.id]);
        assert!(db.followers(a.id).unwrap().is_empty());
        assert!(db.follows(b.id).unwrap().is_empty());

        assert!(db.unfollow(a.id, b.id).unwrap());
        assert!(!db.unfollow(a.id, b.id).unwrap());
        assert!(db.follows(a.id).unwrap().is_empty());
    }

    #[test]
    fn self_follow_violates_the_schema() {
        let db = db();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        db.follow(a.id, b.id).unwrap();

        let err = db.follow(a.id, a.id).unwrap_err();
        let sqlite = err.downcast_ref::<rusqlite::Error>().unwrap();
        assert!(is_constraint_violation(sqlite));
        assert_eq!(db.follows(a.id).unwrap(), vec![b.id]);
    }
}
