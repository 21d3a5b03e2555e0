use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use divesite_types::models::{ObjectKind, SiteKind, Verb, Wind};
use divesite_types::validation::{self, ValidationError};

use super::sites::query_site_kind;
use super::{OWNER_COLUMNS, OptionalExt, get_small, owner_join, read_owner, record_action};
use crate::Database;
use crate::models::{DiveFields, DiveRow, NewDive, ObjectRef};

const DIVE_COLUMNS: &str = "d.id, d.divesite_id, d.start_time, d.duration, d.depth, d.average_depth, \
     d.comment, d.cylinder_capacity, d.pressure_in, d.pressure_out, d.gas_mix, \
     d.air_temperature, d.water_temperature, d.weather, d.wind, d.creation_date";

fn dive_select(filter: &str) -> String {
    format!(
        "SELECT {DIVE_COLUMNS}, {OWNER_COLUMNS} FROM dives d {} {filter}",
        owner_join("d.diver_id")
    )
}

fn validate_fields(fields: &DiveFields) -> Result<()> {
    validation::validate_dive_in_past(fields.start_time, fields.duration, Utc::now())?;
    validation::validate_depth(fields.depth)?;
    if let Some(average) = fields.average_depth {
        validation::validate_depth(average)?;
    }
    Ok(())
}

/// Dives may only be logged against divesites.
fn ensure_divesite(conn: &Connection, id: Uuid) -> Result<()> {
    match query_site_kind(conn, id)? {
        Some(SiteKind::Divesite) => Ok(()),
        _ => Err(ValidationError(format!("Invalid divesite \"{id}\" - object does not exist.")).into()),
    }
}

impl Database {
    pub fn create_dive(&self, new: &NewDive) -> Result<DiveRow> {
        validate_fields(&new.fields)?;

        self.with_tx(|tx| {
            ensure_divesite(tx, new.divesite_id)?;

            let id = Uuid::new_v4();
            let now = Utc::now();
            let f = &new.fields;
            tx.execute(
                "INSERT INTO dives (id, divesite_id, diver_id, start_time, duration, depth,
                                    average_depth, comment, cylinder_capacity, pressure_in,
                                    pressure_out, gas_mix, air_temperature, water_temperature,
                                    weather, wind, creation_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    id,
                    new.divesite_id,
                    new.diver_id,
                    f.start_time,
                    f.duration,
                    f.depth,
                    f.average_depth,
                    f.comment,
                    f.cylinder_capacity,
                    f.pressure_in,
                    f.pressure_out,
                    f.gas_mix,
                    f.air_temperature,
                    f.water_temperature,
                    f.weather,
                    f.wind.map(u8::from),
                    now,
                ],
            )?;

            record_action(
                tx,
                new.diver_id,
                Verb::LoggedDive,
                Some(ObjectRef::new(ObjectKind::Dive, id)),
                Some(ObjectRef::new(SiteKind::Divesite, new.divesite_id)),
                now,
            )?;

            query_dive(tx, id)?.ok_or_else(|| anyhow!("dive {id} missing after insert"))
        })
    }

    pub fn get_dive(&self, id: Uuid) -> Result<Option<DiveRow>> {
        self.with_conn(|conn| query_dive(conn, id))
    }

    /// Replace every editable field of a dive. Returns `None` if it does not exist.
    pub fn update_dive(&self, id: Uuid, divesite_id: Uuid, fields: &DiveFields) -> Result<Option<DiveRow>> {
        validate_fields(fields)?;

        self.with_tx(|tx| {
            ensure_divesite(tx, divesite_id)?;
            let changed = tx.execute(
                "UPDATE dives SET divesite_id = ?2, start_time = ?3, duration = ?4, depth = ?5,
                    average_depth = ?6, comment = ?7, cylinder_capacity = ?8, pressure_in = ?9,
                    pressure_out = ?10, gas_mix = ?11, air_temperature = ?12,
                    water_temperature = ?13, weather = ?14, wind = ?15
                 WHERE id = ?1",
                params![
                    id,
                    divesite_id,
                    fields.start_time,
                    fields.duration,
                    fields.depth,
                    fields.average_depth,
                    fields.comment,
                    fields.cylinder_capacity,
                    fields.pressure_in,
                    fields.pressure_out,
                    fields.gas_mix,
                    fields.air_temperature,
                    fields.water_temperature,
                    fields.weather,
                    fields.wind.map(u8::from),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_dive(tx, id)
        })
    }

    pub fn delete_dive(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM dives WHERE id = ?1", [id])? > 0))
    }

    /// Dives logged at a divesite, most recent first.
    pub fn dives_at_site(&self, divesite_id: Uuid) -> Result<Vec<DiveRow>> {
        self.list_dives("WHERE d.divesite_id = ?1 ORDER BY d.start_time DESC", divesite_id)
    }

    pub fn dives_by_diver(&self, diver_id: Uuid) -> Result<Vec<DiveRow>> {
        self.list_dives("WHERE d.diver_id = ?1 ORDER BY d.start_time DESC", diver_id)
    }

    fn list_dives(&self, filter: &str, id: Uuid) -> Result<Vec<DiveRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&dive_select(filter))?;
            let rows = stmt
                .query_map([id], read_dive)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn query_dive(conn: &Connection, id: Uuid) -> Result<Option<DiveRow>> {
    conn.query_row(&dive_select("WHERE d.id = ?1"), [id], read_dive)
        .optional()
}

fn read_dive(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiveRow> {
    Ok(DiveRow {
        id: row.get(0)?,
        divesite_id: row.get(1)?,
        fields: DiveFields {
            start_time: row.get(2)?,
            duration: row.get(3)?,
            depth: row.get(4)?,
            average_depth: row.get(5)?,
            comment: row.get(6)?,
            cylinder_capacity: row.get(7)?,
            pressure_in: row.get(8)?,
            pressure_out: row.get(9)?,
            gas_mix: row.get(10)?,
            air_temperature: row.get(11)?,
            water_temperature: row.get(12)?,
            weather: row.get(13)?,
            wind: get_small::<Wind>(row, 14)?,
        },
        creation_date: row.get(15)?,
        diver: read_owner(row, 16)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use divesite_types::models::{ObjectKind, SiteKind, Verb, Wind};

    use crate::ValidationError;
    use crate::queries::testutil::{action_count, db, dive_fields, new_dive, site, user};

    #[test]
    fn logging_a_dive_records_an_action_against_the_site() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);

        let mut fields = dive_fields(1, 2700, 18.5);
        fields.wind = Some(Wind::try_from(4u8).unwrap());
        fields.weather = Some("overcast".into());
        let dive = db.create_dive(&new_dive(s.id, u.id, fields)).unwrap();
        assert_eq!(dive.diver.id, u.id);
        assert_eq!(dive.fields.wind.unwrap().force(), 4);
        assert_eq!(dive.fields.weather.as_deref(), Some("overcast"));

        let (_, actions) = db.actions_by_actor(u.id, 10, 0).unwrap();
        assert_eq!(actions[0].verb, Verb::LoggedDive);
        assert_eq!(actions[0].action_object.unwrap().kind, ObjectKind::Dive);
        assert_eq!(actions[0].action_object.unwrap().id, dive.id);
        assert_eq!(actions[0].target.unwrap().id, s.id);
    }

    #[test]
    fn dives_must_be_over_and_positive() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        let before = action_count(&db);

        let mut ongoing = dive_fields(0, 3600, 10.0);
        ongoing.start_time = Utc::now() - Duration::minutes(10);
        let err = db.create_dive(&new_dive(s.id, u.id, ongoing)).unwrap_err();
        assert_eq!(err.to_string(), "Dive must have taken place in the past");

        let zero = dive_fields(1, 0, 10.0);
        let err = db.create_dive(&new_dive(s.id, u.id, zero)).unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());

        assert_eq!(action_count(&db), before);
    }

    #[test]
    fn dives_need_an_existing_divesite() {
        let db = db();
        let u = user(&db, "a@example.com");
        let slipway = site(&db, SiteKind::Slipway, u.id, 1.0, 1.0);

        for target in [slipway.id, uuid::Uuid::new_v4()] {
            let err = db.create_dive(&new_dive(target, u.id, dive_fields(1, 60, 5.0))).unwrap_err();
            assert!(err.downcast_ref::<ValidationError>().is_some());
        }
    }

    #[test]
    fn update_replaces_fields_and_revalidates() {
        let db = db();
        let u = user(&db, "a@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        let dive = db.create_dive(&new_dive(s.id, u.id, dive_fields(5, 600, 9.0))).unwrap();

        let mut fields = dive.fields.clone();
        fields.depth = 12.0;
        let updated = db.update_dive(dive.id, s.id, &fields).unwrap().unwrap();
        assert_eq!(updated.fields.depth, 12.0);
        assert_eq!(updated.creation_date, dive.creation_date);

        fields.duration = -1;
        assert!(db.update_dive(dive.id, s.id, &fields).is_err());
        assert!(db
            .update_dive(uuid::Uuid::new_v4(), s.id, &dive.fields)
            .unwrap()
            .is_none());
    }

    #[test]
    fn listings_are_newest_first() {
        let db = db();
        let u = user(&db, "a@example.com");
        let other = user(&db, "b@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        let old = db.create_dive(&new_dive(s.id, u.id, dive_fields(30, 600, 9.0))).unwrap();
        let new = db.create_dive(&new_dive(s.id, u.id, dive_fields(2, 600, 9.0))).unwrap();
        db.create_dive(&new_dive(s.id, other.id, dive_fields(3, 600, 9.0))).unwrap();

        let mine: Vec<_> = db.dives_by_diver(u.id).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(mine, vec![new.id, old.id]);
        assert_eq!(db.dives_at_site(s.id).unwrap().len(), 3);

        assert!(db.delete_dive(old.id).unwrap());
        assert_eq!(db.dives_by_diver(u.id).unwrap().len(), 1);
    }
}
