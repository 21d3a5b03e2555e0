//! The activity stream. Actions are written by the operations that cause
//! them, inside the same transaction, and read back as per-user timelines
//! and follow feeds.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use divesite_types::models::{ObjectKind, Verb};

use super::comments::query_comment;
use super::dives::query_dive;
use super::images::query_image;
use super::sites::query_site;
use super::users::query_owner;
use super::{OWNER_COLUMNS, get_parsed, get_parsed_opt, owner_join, read_owner};
use crate::Database;
use crate::models::{ActionRow, ObjectRef, ObjectRow};

const FEED_FILTER: &str = "a.actor_id = ?1 OR a.actor_id IN (SELECT target_id FROM follows WHERE follower_id = ?1)";

pub(crate) fn record_action(
    conn: &Connection,
    actor_id: Uuid,
    verb: Verb,
    action_object: Option<ObjectRef>,
    target: Option<ObjectRef>,
    timestamp: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO actions (actor_id, verb, action_object_kind, action_object_id,
                              target_kind, target_id, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            actor_id,
            verb.as_str(),
            action_object.map(|o| o.kind.as_str()),
            action_object.map(|o| o.id),
            target.map(|t| t.kind.as_str()),
            target.map(|t| t.id),
            timestamp,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Actions performed by `actor_id`, newest first, with the total count.
    pub fn actions_by_actor(&self, actor_id: Uuid, limit: u32, offset: u32) -> Result<(u64, Vec<ActionRow>)> {
        self.with_conn(|conn| page_actions(conn, "a.actor_id = ?1", actor_id, limit, offset))
    }

    /// Actions by `user_id` and everyone they follow, newest first.
    pub fn feed_for(&self, user_id: Uuid, limit: u32, offset: u32) -> Result<(u64, Vec<ActionRow>)> {
        self.with_conn(|conn| page_actions(conn, FEED_FILTER, user_id, limit, offset))
    }

    /// Load whatever an action points at. Deleted objects resolve to `None`.
    pub fn resolve_object(&self, object: ObjectRef) -> Result<Option<ObjectRow>> {
        self.with_conn(|conn| {
            let row = match object.kind {
                ObjectKind::Divesite | ObjectKind::Slipway | ObjectKind::Compressor => query_site(conn, object.id)?
                    .filter(|s| Some(s.kind) == object.kind.site_kind())
                    .map(ObjectRow::Site),
                ObjectKind::Dive => query_dive(conn, object.id)?.map(ObjectRow::Dive),
                ObjectKind::Comment => query_comment(conn, object.id)?.map(ObjectRow::Comment),
                ObjectKind::Image => query_image(conn, object.id)?.map(ObjectRow::Image),
                ObjectKind::Profile => query_owner(conn, object.id)?.map(ObjectRow::Profile),
            };
            Ok(row)
        })
    }
}

fn page_actions(conn: &Connection, filter: &str, id: Uuid, limit: u32, offset: u32) -> Result<(u64, Vec<ActionRow>)> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM actions a WHERE ({filter})"),
        [id],
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT a.id, a.verb, a.action_object_kind, a.action_object_id, a.target_kind, a.target_id,
                a.timestamp, {OWNER_COLUMNS}
         FROM actions a {}
         WHERE ({filter})
         ORDER BY a.id DESC
         LIMIT ?2 OFFSET ?3",
        owner_join("a.actor_id")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![id, limit, offset], read_action)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((u64::try_from(count).unwrap_or_default(), rows))
}

fn read_action(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionRow> {
    Ok(ActionRow {
        id: row.get(0)?,
        verb: get_parsed(row, 1)?,
        action_object: read_ref(row, 2)?,
        target: read_ref(row, 4)?,
        timestamp: row.get(6)?,
        actor: read_owner(row, 7)?,
    })
}

fn read_ref(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<ObjectRef>> {
    let kind: Option<ObjectKind> = get_parsed_opt(row, idx)?;
    let id: Option<Uuid> = row.get(idx + 1)?;
    Ok(kind.zip(id).map(|(kind, id)| ObjectRef { kind, id }))
}

#[cfg(test)]
mod tests {
    use divesite_types::models::{SiteKind, Verb};

    use crate::models::ObjectRow;
    use crate::queries::testutil::{db, site, user};

    #[test]
    fn feed_includes_own_and_followed_actions() {
        let db = db();
        let me = user(&db, "me@example.com");
        let friend = user(&db, "friend@example.com");
        let stranger = user(&db, "stranger@example.com");

        site(&db, SiteKind::Slipway, me.id, 1.0, 1.0);
        site(&db, SiteKind::Slipway, friend.id, 2.0, 2.0);
        site(&db, SiteKind::Slipway, stranger.id, 3.0, 3.0);

        let (count, _) = db.feed_for(me.id, 10, 0).unwrap();
        assert_eq!(count, 1);

        db.follow(me.id, friend.id).unwrap();
        let (count, actions) = db.feed_for(me.id, 10, 0).unwrap();
        assert_eq!(count, 2);
        // Newest first
        assert_eq!(actions[0].actor.id, friend.id);
        assert_eq!(actions[1].actor.id, me.id);
        assert!(actions.iter().all(|a| a.verb == Verb::Created));

        // Following is one-way
        let (count, _) = db.feed_for(friend.id, 10, 0).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn pages_through_actions() {
        let db = db();
        let u = user(&db, "a@example.com");
        for i in 0..25_i32 {
            site(&db, SiteKind::Compressor, u.id, f64::from(i), 0.0);
        }

        let (count, first) = db.actions_by_actor(u.id, 10, 0).unwrap();
        assert_eq!(count, 25);
        assert_eq!(first.len(), 10);
        let (_, last) = db.actions_by_actor(u.id, 10, 20).unwrap();
        assert_eq!(last.len(), 5);
        assert!(first[0].id > last[0].id);
    }

    #[test]
    fn deleted_objects_resolve_to_nothing() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);

        let (_, actions) = db.actions_by_actor(u.id, 1, 0).unwrap();
        let target = actions[0].target.unwrap();
        assert!(actions[0].action_object.is_none());
        assert!(matches!(db.resolve_object(target).unwrap(), Some(ObjectRow::Site(row)) if row.id == s.id));

        db.delete_site(SiteKind::Divesite, s.id).unwrap();
        assert!(db.resolve_object(target).unwrap().is_none());
        // The action itself is kept
        assert_eq!(db.actions_by_actor(u.id, 10, 0).unwrap().0, 1);
    }
}
