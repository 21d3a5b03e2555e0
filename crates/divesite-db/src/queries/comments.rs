use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use divesite_types::models::{ObjectKind, SiteKind, Verb};
use divesite_types::validation::{self, ValidationError};

use super::sites::query_site_kind;
use super::{OWNER_COLUMNS, OptionalExt, get_parsed, owner_join, read_owner, record_action};
use crate::Database;
use crate::models::{CommentRow, ObjectRef};

fn comment_select(filter: &str) -> String {
    format!(
        "SELECT c.id, c.site_id, s.kind, c.text, c.creation_date, {OWNER_COLUMNS}
         FROM comments c JOIN sites s ON s.id = c.site_id {} {filter}",
        owner_join("c.owner_id")
    )
}

impl Database {
    /// Comment on a site of the given kind and record a `commented on` action.
    pub fn create_comment(&self, kind: SiteKind, site_id: Uuid, owner_id: Uuid, text: &str) -> Result<CommentRow> {
        validation::validate_text("text", text)?;

        self.with_tx(|tx| {
            if query_site_kind(tx, site_id)? != Some(kind) {
                return Err(ValidationError(format!("Invalid {kind} \"{site_id}\" - object does not exist.")).into());
            }

            let id = Uuid::new_v4();
            let now = Utc::now();
            tx.execute(
                "INSERT INTO comments (id, site_id, owner_id, text, creation_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, site_id, owner_id, text, now],
            )?;

            record_action(
                tx,
                owner_id,
                Verb::Commented,
                Some(ObjectRef::new(ObjectKind::Comment, id)),
                Some(ObjectRef::new(kind, site_id)),
                now,
            )?;

            query_comment(tx, id)?.ok_or_else(|| anyhow!("comment {id} missing after insert"))
        })
    }

    /// Look up a comment, but only if it belongs to a site of `kind`.
    pub fn get_comment(&self, kind: SiteKind, id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| Ok(query_comment(conn, id)?.filter(|c| c.site_kind == kind)))
    }

    pub fn update_comment(&self, id: Uuid, text: &str) -> Result<Option<CommentRow>> {
        validation::validate_text("text", text)?;
        self.with_conn(|conn| {
            if conn.execute("UPDATE comments SET text = ?2 WHERE id = ?1", params![id, text])? == 0 {
                return Ok(None);
            }
            query_comment(conn, id)
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM comments WHERE id = ?1", [id])? > 0))
    }

    /// Comments on a site, oldest first.
    pub fn comments_for_site(&self, site_id: Uuid) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&comment_select("WHERE c.site_id = ?1 ORDER BY c.creation_date"))?;
            let rows = stmt
                .query_map([site_id], read_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn query_comment(conn: &Connection, id: Uuid) -> Result<Option<CommentRow>> {
    conn.query_row(&comment_select("WHERE c.id = ?1"), [id], read_comment)
        .optional()
}

fn read_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        site_id: row.get(1)?,
        site_kind: get_parsed(row, 2)?,
        text: row.get(3)?,
        creation_date: row.get(4)?,
        owner: read_owner(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use divesite_types::models::{SiteKind, Verb};

    use crate::ValidationError;
    use crate::queries::testutil::{action_count, db, site, user};

    #[test]
    fn one_comment_one_action() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Slipway, u.id, 1.0, 1.0);
        let before = action_count(&db);

        let c = db.create_comment(SiteKind::Slipway, s.id, u.id, "Steep at low tide").unwrap();
        assert_eq!(c.site_kind, SiteKind::Slipway);
        assert_eq!(c.owner.id, u.id);
        assert_eq!(action_count(&db), before + 1);

        let (_, actions) = db.actions_by_actor(u.id, 1, 0).unwrap();
        assert_eq!(actions[0].verb, Verb::Commented);
        assert_eq!(actions[0].target.unwrap().id, s.id);
    }

    #[test]
    fn comment_must_match_site_kind() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Compressor, u.id, 1.0, 1.0);

        let err = db.create_comment(SiteKind::Divesite, s.id, u.id, "hello").unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());

        let c = db.create_comment(SiteKind::Compressor, s.id, u.id, "hello").unwrap();
        assert!(db.get_comment(SiteKind::Divesite, c.id).unwrap().is_none());
        assert!(db.get_comment(SiteKind::Compressor, c.id).unwrap().is_some());
    }

    #[test]
    fn blank_comments_are_rejected() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Compressor, u.id, 1.0, 1.0);
        assert!(db.create_comment(SiteKind::Compressor, s.id, u.id, "  ").is_err());
        let c = db.create_comment(SiteKind::Compressor, s.id, u.id, "ok").unwrap();
        assert!(db.update_comment(c.id, "").is_err());
    }

    #[test]
    fn edit_list_and_delete() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        let first = db.create_comment(SiteKind::Divesite, s.id, u.id, "first").unwrap();
        db.create_comment(SiteKind::Divesite, s.id, u.id, "second").unwrap();

        let edited = db.update_comment(first.id, "first, edited").unwrap().unwrap();
        assert_eq!(edited.text, "first, edited");

        let texts: Vec<_> = db
            .comments_for_site(s.id)
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first, edited", "second"]);

        assert!(db.delete_comment(first.id).unwrap());
        assert!(db.update_comment(first.id, "gone").unwrap().is_none());
        assert_eq!(db.comments_for_site(s.id).unwrap().len(), 1);
    }
}
