use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

use divesite_types::models::{ObjectKind, SiteKind, Verb};
use divesite_types::validation::{self, ValidationError};

use super::sites::query_site_kind;
use super::{OWNER_COLUMNS, OptionalExt, get_parsed, owner_join, read_owner, record_action};
use crate::Database;
use crate::models::{ImageRow, NewImage, ObjectRef};

fn image_select(filter: &str) -> String {
    format!(
        "SELECT i.id, i.site_id, s.kind, i.asset, i.caption, i.is_header_image, i.creation_date,
                {OWNER_COLUMNS}
         FROM images i JOIN sites s ON s.id = i.site_id {} {filter}",
        owner_join("i.owner_id")
    )
}

impl Database {
    /// Attach an image to a site. If it is flagged as the header, any
    /// previous header of the site loses the flag in the same transaction.
    pub fn create_image(&self, kind: SiteKind, new: &NewImage) -> Result<ImageRow> {
        validation::validate_text("image", &new.asset)?;

        self.with_tx(|tx| {
            if query_site_kind(tx, new.site_id)? != Some(kind) {
                return Err(ValidationError(format!("Invalid {kind} \"{}\" - object does not exist.", new.site_id)).into());
            }

            let id = Uuid::new_v4();
            let now = Utc::now();
            tx.execute(
                "INSERT INTO images (id, site_id, owner_id, asset, caption, is_header_image, creation_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![id, new.site_id, new.owner_id, new.asset, new.caption, now],
            )?;
            if new.is_header_image {
                swap_header(tx, new.site_id, id)?;
            }

            record_action(
                tx,
                new.owner_id,
                Verb::AddedImage,
                Some(ObjectRef::new(ObjectKind::Image, id)),
                Some(ObjectRef::new(kind, new.site_id)),
                now,
            )?;

            query_image(tx, id)?.ok_or_else(|| anyhow!("image {id} missing after insert"))
        })
    }

    /// An image, only if it is attached to `site_id`.
    pub fn get_image(&self, site_id: Uuid, id: Uuid) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| Ok(query_image(conn, id)?.filter(|i| i.site_id == site_id)))
    }

    pub fn list_images(&self, site_id: Uuid) -> Result<Vec<ImageRow>> {
        self.list_image_rows("WHERE i.site_id = ?1 ORDER BY i.creation_date", site_id)
    }

    /// Every image a user has uploaded, newest first.
    pub fn images_by_owner(&self, owner_id: Uuid) -> Result<Vec<ImageRow>> {
        self.list_image_rows("WHERE i.owner_id = ?1 ORDER BY i.creation_date DESC", owner_id)
    }

    pub fn update_image(
        &self,
        site_id: Uuid,
        id: Uuid,
        caption: Option<&str>,
        is_header_image: Option<bool>,
    ) -> Result<Option<ImageRow>> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE images SET caption = COALESCE(?3, caption) WHERE id = ?1 AND site_id = ?2",
                params![id, site_id, caption],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            match is_header_image {
                Some(true) => swap_header(tx, site_id, id)?,
                Some(false) => {
                    tx.execute("UPDATE images SET is_header_image = 0 WHERE id = ?1", [id])?;
                }
                None => {}
            }

            query_image(tx, id)
        })
    }

    pub fn delete_image(&self, site_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM images WHERE id = ?1 AND site_id = ?2",
                params![id, site_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn header_image(&self, site_id: Uuid) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &image_select("WHERE i.site_id = ?1 AND i.is_header_image = 1"),
                [site_id],
                read_image,
            )
            .optional()
        })
    }

    /// Make an existing image of the site its header.
    /// Returns `None` if the image is not attached to the site.
    pub fn set_header_image(&self, site_id: Uuid, image_id: Uuid) -> Result<Option<ImageRow>> {
        self.with_tx(|tx| {
            let Some(image) = query_image(tx, image_id)? else {
                return Ok(None);
            };
            if image.site_id != site_id {
                return Ok(None);
            }
            swap_header(tx, site_id, image_id)?;
            query_image(tx, image_id)
        })
    }

    /// Returns false if the site had no header image.
    pub fn clear_header_image(&self, site_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let cleared = conn.execute(
                "UPDATE images SET is_header_image = 0 WHERE site_id = ?1 AND is_header_image = 1",
                [site_id],
            )?;
            Ok(cleared > 0)
        })
    }

    fn list_image_rows(&self, filter: &str, id: Uuid) -> Result<Vec<ImageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&image_select(filter))?;
            let rows = stmt
                .query_map([id], read_image)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Move the header flag of `site_id` onto `image_id`. The old header is
/// cleared first so the unique partial index never sees two flags.
fn swap_header(conn: &Connection, site_id: Uuid, image_id: Uuid) -> Result<()> {
    let cleared = conn.execute(
        "UPDATE images SET is_header_image = 0
         WHERE site_id = ?1 AND is_header_image = 1 AND id <> ?2",
        params![site_id, image_id],
    )?;
    if cleared > 0 {
        debug!("Replaced header image of site {site_id}");
    }
    conn.execute("UPDATE images SET is_header_image = 1 WHERE id = ?1", [image_id])?;
    Ok(())
}

pub(crate) fn query_image(conn: &Connection, id: Uuid) -> Result<Option<ImageRow>> {
    conn.query_row(&image_select("WHERE i.id = ?1"), [id], read_image)
        .optional()
}

fn read_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRow> {
    Ok(ImageRow {
        id: row.get(0)?,
        site_id: row.get(1)?,
        site_kind: get_parsed(row, 2)?,
        asset: row.get(3)?,
        caption: row.get(4)?,
        is_header_image: row.get(5)?,
        creation_date: row.get(6)?,
        owner: read_owner(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use divesite_types::models::{SiteKind, Verb};
    use uuid::Uuid;

    use crate::Database;
    use crate::models::NewImage;
    use crate::queries::testutil::{db, site, user};

    fn image(db: &Database, site_id: Uuid, owner: Uuid, header: bool) -> crate::models::ImageRow {
        db.create_image(
            SiteKind::Divesite,
            &NewImage {
                site_id,
                owner_id: owner,
                asset: format!("images/{}", Uuid::new_v4()),
                caption: String::new(),
                is_header_image: header,
            },
        )
        .unwrap()
    }

    fn header_ids(db: &Database, site_id: Uuid) -> Vec<Uuid> {
        db.list_images(site_id)
            .unwrap()
            .into_iter()
            .filter(|i| i.is_header_image)
            .map(|i| i.id)
            .collect()
    }

    #[test]
    fn only_the_last_header_survives() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);

        let mut last = None;
        for _ in 0..5 {
            last = Some(image(&db, s.id, u.id, true).id);
        }
        assert_eq!(header_ids(&db, s.id), vec![last.unwrap()]);
        assert_eq!(db.header_image(s.id).unwrap().unwrap().id, last.unwrap());
    }

    #[test]
    fn headers_are_per_site() {
        let db = db();
        let u = user(&db, "a@example.com");
        let a = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        let b = site(&db, SiteKind::Divesite, u.id, 2.0, 2.0);
        let ha = image(&db, a.id, u.id, true);
        let hb = image(&db, b.id, u.id, true);
        assert_eq!(header_ids(&db, a.id), vec![ha.id]);
        assert_eq!(header_ids(&db, b.id), vec![hb.id]);
    }

    #[test]
    fn set_and_clear_header() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        let other = site(&db, SiteKind::Divesite, u.id, 2.0, 2.0);
        let first = image(&db, s.id, u.id, true);
        let second = image(&db, s.id, u.id, false);
        let foreign = image(&db, other.id, u.id, false);

        assert!(db.set_header_image(s.id, foreign.id).unwrap().is_none());
        assert_eq!(header_ids(&db, s.id), vec![first.id]);

        let header = db.set_header_image(s.id, second.id).unwrap().unwrap();
        assert!(header.is_header_image);
        assert_eq!(header_ids(&db, s.id), vec![second.id]);

        assert!(db.clear_header_image(s.id).unwrap());
        assert!(db.header_image(s.id).unwrap().is_none());
        assert!(!db.clear_header_image(s.id).unwrap());
    }

    #[test]
    fn update_can_move_the_header() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        let first = image(&db, s.id, u.id, true);
        let second = image(&db, s.id, u.id, false);

        let updated = db
            .update_image(s.id, second.id, Some("Kelp forest"), Some(true))
            .unwrap()
            .unwrap();
        assert_eq!(updated.caption, "Kelp forest");
        assert_eq!(header_ids(&db, s.id), vec![second.id]);
        assert!(!db.get_image(s.id, first.id).unwrap().unwrap().is_header_image);

        db.update_image(s.id, second.id, None, Some(false)).unwrap();
        assert!(header_ids(&db, s.id).is_empty());
        assert!(db.update_image(s.id, Uuid::new_v4(), None, None).unwrap().is_none());
    }

    #[test]
    fn image_creation_is_an_action_and_wrong_kind_is_rejected() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        let img = image(&db, s.id, u.id, false);

        let (_, actions) = db.actions_by_actor(u.id, 1, 0).unwrap();
        assert_eq!(actions[0].verb, Verb::AddedImage);
        assert_eq!(actions[0].action_object.unwrap().id, img.id);

        let wrong = db.create_image(
            SiteKind::Slipway,
            &NewImage {
                site_id: s.id,
                owner_id: u.id,
                asset: "images/x".into(),
                caption: String::new(),
                is_header_image: false,
            },
        );
        assert!(wrong.is_err());

        assert_eq!(db.images_by_owner(u.id).unwrap().len(), 1);
        assert!(db.delete_image(s.id, img.id).unwrap());
        assert!(db.get_image(s.id, img.id).unwrap().is_none());
    }
}
