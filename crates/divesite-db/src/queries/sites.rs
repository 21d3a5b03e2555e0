use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::warn;
use uuid::Uuid;

use divesite_types::geo::{self, DIVESITE_EXCLUSION_DEGREES, NEARBY_SLIPWAY_KM, Point};
use divesite_types::models::{SiteKind, Verb};
use divesite_types::validation::{self, ValidationError};

use super::{OWNER_COLUMNS, OptionalExt, get_parsed, get_parsed_opt, get_small, owner_join, read_owner, record_action};
use crate::Database;
use crate::models::{DiveAggregates, DivesiteFields, NewSite, ObjectRef, SitePatch, SiteRow};

const SITE_COLUMNS: &str = "s.id, s.kind, s.name, s.description, s.latitude, s.longitude, \
     s.creation_date, s.geocoding_data, s.level, s.boat_entry, s.shore_entry, s.bottom_type";

fn site_select(filter: &str) -> String {
    format!(
        "SELECT {SITE_COLUMNS}, {OWNER_COLUMNS} FROM sites s {} {filter}",
        owner_join("s.owner_id")
    )
}

impl Database {
    /// Register a new site and record a `created` action for its owner.
    ///
    /// Divesites must have at least one entry and may not sit inside the
    /// exclusion box of another divesite.
    pub fn create_site(&self, new: &NewSite) -> Result<SiteRow> {
        validation::validate_name(&new.name)?;
        validation::validate_coordinates(new.latitude, new.longitude)?;
        if new.kind == SiteKind::Divesite {
            validation::validate_entry(new.divesite.boat_entry, new.divesite.shore_entry)?;
        }

        self.with_tx(|tx| {
            if new.kind == SiteKind::Divesite {
                ensure_not_too_close(tx, Point::new(new.latitude, new.longitude), None)?;
            }

            let id = Uuid::new_v4();
            let now = Utc::now();
            let fields = (new.kind == SiteKind::Divesite).then_some(&new.divesite);

            tx.execute(
                "INSERT INTO sites (id, kind, name, description, latitude, longitude, owner_id,
                                    creation_date, level, boat_entry, shore_entry, bottom_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id,
                    new.kind.as_str(),
                    new.name.trim(),
                    new.description,
                    new.latitude,
                    new.longitude,
                    new.owner_id,
                    now,
                    fields.map(|f| u8::from(f.level)),
                    fields.is_some_and(|f| f.boat_entry),
                    fields.is_some_and(|f| f.shore_entry),
                    fields.and_then(|f| f.bottom_type).map(|b| b.as_str()),
                ],
            )?;

            record_action(tx, new.owner_id, Verb::Created, None, Some(ObjectRef::new(new.kind, id)), now)?;

            query_site(tx, id)?.ok_or_else(|| anyhow!("site {id} missing after insert"))
        })
    }

    pub fn get_site(&self, kind: SiteKind, id: Uuid) -> Result<Option<SiteRow>> {
        self.with_conn(|conn| Ok(query_site(conn, id)?.filter(|s| s.kind == kind)))
    }

    pub fn list_sites(&self, kind: SiteKind) -> Result<Vec<SiteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&site_select("WHERE s.kind = ?1 ORDER BY s.creation_date"))?;
            let rows = stmt
                .query_map([kind.as_str()], read_site)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_sites_by_owner(&self, owner_id: Uuid, kind: SiteKind) -> Result<Vec<SiteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&site_select(
                "WHERE s.owner_id = ?1 AND s.kind = ?2 ORDER BY s.creation_date",
            ))?;
            let rows = stmt
                .query_map(params![owner_id, kind.as_str()], read_site)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply a partial update and re-check every site rule against the
    /// merged record. Moving a site drops its geocoding data.
    /// Returns `None` if no such site exists.
    pub fn update_site(&self, kind: SiteKind, id: Uuid, patch: &SitePatch) -> Result<Option<SiteRow>> {
        self.with_tx(|tx| {
            let Some(current) = query_site(tx, id)?.filter(|s| s.kind == kind) else {
                return Ok(None);
            };

            let name = patch.name.clone().unwrap_or(current.name);
            let description = patch.description.clone().unwrap_or(current.description);
            let latitude = patch.latitude.unwrap_or(current.latitude);
            let longitude = patch.longitude.unwrap_or(current.longitude);
            let moved = latitude != current.latitude || longitude != current.longitude;

            validation::validate_name(&name)?;
            validation::validate_coordinates(latitude, longitude)?;

            let divesite = current.divesite.map(|f| DivesiteFields {
                level: patch.level.unwrap_or(f.level),
                boat_entry: patch.boat_entry.unwrap_or(f.boat_entry),
                shore_entry: patch.shore_entry.unwrap_or(f.shore_entry),
                bottom_type: patch.bottom_type.or(f.bottom_type),
            });
            if let Some(f) = &divesite {
                validation::validate_entry(f.boat_entry, f.shore_entry)?;
                ensure_not_too_close(tx, Point::new(latitude, longitude), Some(id))?;
            }

            tx.execute(
                "UPDATE sites SET name = ?2, description = ?3, latitude = ?4, longitude = ?5,
                    level = ?6, boat_entry = ?7, shore_entry = ?8, bottom_type = ?9,
                    geocoding_data = CASE WHEN ?10 THEN NULL ELSE geocoding_data END
                 WHERE id = ?1",
                params![
                    id,
                    name.trim(),
                    description,
                    latitude,
                    longitude,
                    divesite.as_ref().map(|f| u8::from(f.level)),
                    divesite.as_ref().is_some_and(|f| f.boat_entry),
                    divesite.as_ref().is_some_and(|f| f.shore_entry),
                    divesite.as_ref().and_then(|f| f.bottom_type).map(|b| b.as_str()),
                    moved,
                ],
            )?;

            query_site(tx, id)
        })
    }

    /// Delete a site; dives, comments and images go with it.
    pub fn delete_site(&self, kind: SiteKind, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM sites WHERE id = ?1 AND kind = ?2",
                params![id, kind.as_str()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn set_geocoding_data(&self, id: Uuid, data: Option<&serde_json::Value>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sites SET geocoding_data = ?2 WHERE id = ?1",
                params![id, data],
            )?;
            Ok(())
        })
    }

    pub fn site_summary(&self, divesite_id: Uuid) -> Result<DiveAggregates> {
        self.with_conn(|conn| {
            let aggregates = conn.query_row(
                "SELECT COALESCE(AVG(depth), 0.0), COALESCE(AVG(duration), 0.0)
                 FROM dives WHERE divesite_id = ?1",
                [divesite_id],
                read_aggregates,
            )?;
            Ok(aggregates)
        })
    }

    /// Aggregates for every divesite that has at least one dive.
    pub fn site_summaries(&self) -> Result<HashMap<Uuid, DiveAggregates>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT AVG(depth), AVG(duration), divesite_id FROM dives GROUP BY divesite_id",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, Uuid>(2)?, read_aggregates(row)?)))?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(rows)
        })
    }

    /// Slipways within [`NEARBY_SLIPWAY_KM`] of the divesite, closest first,
    /// paired with their distance in kilometres.
    ///
    /// Scans every slipway; fine while there are only a few thousand.
    pub fn nearby_slipways(&self, divesite: &SiteRow) -> Result<Vec<(SiteRow, f64)>> {
        let origin = divesite.point();
        let mut nearby: Vec<(SiteRow, f64)> = self
            .list_sites(SiteKind::Slipway)?
            .into_iter()
            .map(|slipway| {
                let distance = geo::haversine_km(origin, slipway.point());
                (slipway, distance)
            })
            .filter(|(_, distance)| *distance <= NEARBY_SLIPWAY_KM)
            .collect();

        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(nearby)
    }
}

/// Reject `candidate` if another divesite sits inside its exclusion box.
fn ensure_not_too_close(conn: &Connection, candidate: Point, exclude: Option<Uuid>) -> Result<()> {
    let d = DIVESITE_EXCLUSION_DEGREES;
    let clash: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sites
            WHERE kind = 'divesite'
              AND latitude BETWEEN ?1 AND ?2
              AND longitude BETWEEN ?3 AND ?4
              AND (?5 IS NULL OR id <> ?5)
         )",
        params![
            candidate.latitude - d,
            candidate.latitude + d,
            candidate.longitude - d,
            candidate.longitude + d,
            exclude,
        ],
        |row| row.get(0),
    )?;

    if clash {
        warn!(
            "Rejected divesite at {},{}: too close to an existing divesite",
            candidate.latitude, candidate.longitude
        );
        return Err(ValidationError::new("Too close to an existing divesite").into());
    }
    Ok(())
}

pub(crate) fn query_site(conn: &Connection, id: Uuid) -> Result<Option<SiteRow>> {
    conn.query_row(&site_select("WHERE s.id = ?1"), [id], read_site)
        .optional()
}

/// Kind of the site with this id, if it exists.
pub(crate) fn query_site_kind(conn: &Connection, id: Uuid) -> Result<Option<SiteKind>> {
    conn.query_row("SELECT kind FROM sites WHERE id = ?1", [id], |row| get_parsed(row, 0))
        .optional()
}

fn read_site(row: &rusqlite::Row<'_>) -> rusqlite::Result<SiteRow> {
    let kind: SiteKind = get_parsed(row, 1)?;
    let divesite = if kind == SiteKind::Divesite {
        Some(DivesiteFields {
            level: get_small(row, 8)?.unwrap_or(divesite_types::models::Level::Beginner),
            boat_entry: row.get(9)?,
            shore_entry: row.get(10)?,
            bottom_type: get_parsed_opt(row, 11)?,
        })
    } else {
        None
    };

    Ok(SiteRow {
        id: row.get(0)?,
        kind,
        name: row.get(2)?,
        description: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        creation_date: row.get(6)?,
        geocoding_data: row.get(7)?,
        divesite,
        owner: read_owner(row, 12)?,
    })
}

fn read_aggregates(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiveAggregates> {
    let depth: f64 = row.get(0)?;
    let seconds: f64 = row.get(1)?;
    Ok(DiveAggregates {
        average_depth: depth,
        average_duration_minutes: seconds / 60.0,
    })
}

#[cfg(test)]
mod tests {
    use divesite_types::models::{Level, SiteKind};

    use crate::ValidationError;
    use crate::models::{DivesiteFields, NewSite, SitePatch};
    use crate::queries::testutil::{action_count, db, dive_fields, new_dive, site, user};

    fn new_site(kind: SiteKind, owner: uuid::Uuid, latitude: f64, longitude: f64) -> NewSite {
        NewSite {
            kind,
            name: "Test site".into(),
            description: String::new(),
            latitude,
            longitude,
            owner_id: owner,
            divesite: DivesiteFields::default(),
        }
    }

    fn is_validation(err: &anyhow::Error) -> bool {
        err.downcast_ref::<ValidationError>().is_some()
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let db = db();
        let u = user(&db, "a@example.com");
        for (lat, lng) in [(200.0, 0.0), (-90.01, 0.0), (0.0, -181.0), (0.0, 181.0)] {
            for kind in SiteKind::ALL {
                let err = db.create_site(&new_site(kind, u.id, lat, lng)).unwrap_err();
                assert!(is_validation(&err), "{kind} at {lat},{lng}");
            }
        }
        assert_eq!(action_count(&db), 0);
    }

    #[test]
    fn divesites_inside_exclusion_box_are_rejected() {
        let db = db();
        let u = user(&db, "a@example.com");
        site(&db, SiteKind::Divesite, u.id, 10.0, 10.0);

        let err = db.create_site(&new_site(SiteKind::Divesite, u.id, 10.0005, 10.0005)).unwrap_err();
        assert!(is_validation(&err));
        assert_eq!(err.to_string(), "Too close to an existing divesite");

        assert!(db.create_site(&new_site(SiteKind::Divesite, u.id, 10.01, 10.0)).is_ok());
        // Only divesites exclude each other
        assert!(db.create_site(&new_site(SiteKind::Slipway, u.id, 10.0, 10.0)).is_ok());
    }

    #[test]
    fn divesite_without_entry_is_rejected() {
        let db = db();
        let u = user(&db, "a@example.com");
        let mut s = new_site(SiteKind::Divesite, u.id, 1.0, 1.0);
        s.divesite.shore_entry = false;
        assert!(is_validation(&db.create_site(&s).unwrap_err()));

        // Non-divesites ignore entry fields
        s.kind = SiteKind::Compressor;
        assert!(db.create_site(&s).is_ok());
    }

    #[test]
    fn creating_a_site_records_one_action() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Compressor, u.id, 3.0, 3.0);
        assert_eq!(action_count(&db), 1);
        let (count, actions) = db.actions_by_actor(u.id, 10, 0).unwrap();
        assert_eq!(count, 1);
        let target = actions[0].target.unwrap();
        assert_eq!(target.id, s.id);
    }

    #[test]
    fn get_site_filters_by_kind() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Slipway, u.id, 3.0, 3.0);
        assert!(db.get_site(SiteKind::Slipway, s.id).unwrap().is_some());
        assert!(db.get_site(SiteKind::Divesite, s.id).unwrap().is_none());
        assert!(s.divesite.is_none());
    }

    #[test]
    fn update_may_keep_own_position_but_not_approach_another() {
        let db = db();
        let u = user(&db, "a@example.com");
        let a = site(&db, SiteKind::Divesite, u.id, 20.0, 20.0);
        site(&db, SiteKind::Divesite, u.id, 20.01, 20.0);

        let rename = SitePatch {
            name: Some("Renamed".into()),
            level: Some(Level::Advanced),
            ..SitePatch::default()
        };
        let updated = db.update_site(SiteKind::Divesite, a.id, &rename).unwrap().unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.divesite.unwrap().level, Level::Advanced);

        let approach = SitePatch {
            latitude: Some(20.0095),
            ..SitePatch::default()
        };
        let err = db.update_site(SiteKind::Divesite, a.id, &approach).unwrap_err();
        assert!(is_validation(&err));

        let no_entry = SitePatch {
            shore_entry: Some(false),
            ..SitePatch::default()
        };
        assert!(db.update_site(SiteKind::Divesite, a.id, &no_entry).is_err());

        assert!(db
            .update_site(SiteKind::Slipway, a.id, &SitePatch::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn moving_a_site_clears_geocoding_data() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 30.0, 30.0);
        let data = serde_json::json!({"results": [], "status": "ZERO_RESULTS"});
        db.set_geocoding_data(s.id, Some(&data)).unwrap();
        assert_eq!(db.get_site(SiteKind::Divesite, s.id).unwrap().unwrap().geocoding_data, Some(data));

        let moved = SitePatch {
            longitude: Some(31.0),
            ..SitePatch::default()
        };
        let s = db.update_site(SiteKind::Divesite, s.id, &moved).unwrap().unwrap();
        assert!(s.geocoding_data.is_none());
    }

    #[test]
    fn deleting_a_site_cascades_to_dives() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 40.0, 40.0);
        let d = db.create_dive(&new_dive(s.id, u.id, dive_fields(3, 600, 12.0))).unwrap();

        assert!(db.delete_site(SiteKind::Divesite, s.id).unwrap());
        assert!(db.get_dive(d.id).unwrap().is_none());
        assert!(!db.delete_site(SiteKind::Divesite, s.id).unwrap());
    }

    #[test]
    fn aggregates_average_depth_and_minutes() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 45.0, 45.0);
        let empty = site(&db, SiteKind::Divesite, u.id, 46.0, 46.0);
        for _ in 0..10 {
            db.create_dive(&new_dive(s.id, u.id, dive_fields(2, 120, 1.0))).unwrap();
        }

        let agg = db.site_summary(s.id).unwrap();
        assert_eq!(agg.average_depth, 1.0);
        assert_eq!(agg.average_duration_minutes, 2.0);
        assert_eq!(db.site_summary(empty.id).unwrap().average_duration_minutes, 0.0);

        let all = db.site_summaries().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[&s.id].average_depth, 1.0);
    }

    #[test]
    fn nearby_slipways_are_sorted_and_bounded() {
        let db = db();
        let u = user(&db, "a@example.com");
        let ds = site(&db, SiteKind::Divesite, u.id, 50.0, -5.0);
        let far = site(&db, SiteKind::Slipway, u.id, 50.1, -5.0); // ~11 km
        let near = site(&db, SiteKind::Slipway, u.id, 50.01, -5.0); // ~1 km
        site(&db, SiteKind::Slipway, u.id, 51.0, -5.0); // ~111 km

        let nearby = db.nearby_slipways(&ds).unwrap();
        let ids: Vec<_> = nearby.iter().map(|(s, _)| s.id).collect();
        assert_eq!(ids, vec![near.id, far.id]);
        assert!(nearby[0].1 < nearby[1].1);
    }
}
