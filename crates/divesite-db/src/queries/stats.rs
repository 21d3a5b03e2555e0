use anyhow::Result;

use crate::Database;
use crate::models::StatisticsRow;

impl Database {
    /// Site-wide totals.
    pub fn statistics(&self) -> Result<StatisticsRow> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM sites WHERE kind = 'compressor'),
                    (SELECT COUNT(*) FROM dives),
                    (SELECT COUNT(*) FROM sites WHERE kind = 'divesite'),
                    (SELECT COUNT(*) FROM images),
                    (SELECT COUNT(*) FROM sites WHERE kind = 'slipway'),
                    (SELECT COALESCE(SUM(duration), 0) FROM dives),
                    (SELECT COUNT(*) FROM users)",
                [],
                |row| {
                    Ok(StatisticsRow {
                        compressors: row.get(0)?,
                        dives: row.get(1)?,
                        divesites: row.get(2)?,
                        images: row.get(3)?,
                        slipways: row.get(4)?,
                        total_dive_seconds: row.get(5)?,
                        users: row.get(6)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use divesite_types::models::SiteKind;

    use crate::queries::testutil::{db, dive_fields, new_dive, site, user};

    #[test]
    fn counts_everything() {
        let db = db();
        let empty = db.statistics().unwrap();
        assert_eq!(empty.users, 0);
        assert_eq!(empty.total_dive_seconds, 0);

        let u = user(&db, "a@example.com");
        user(&db, "b@example.com");
        let s = site(&db, SiteKind::Divesite, u.id, 1.0, 1.0);
        site(&db, SiteKind::Slipway, u.id, 1.0, 1.0);
        site(&db, SiteKind::Slipway, u.id, 2.0, 1.0);
        db.create_dive(&new_dive(s.id, u.id, dive_fields(1, 3600, 10.0))).unwrap();
        db.create_dive(&new_dive(s.id, u.id, dive_fields(2, 5400, 10.0))).unwrap();

        let stats = db.statistics().unwrap();
        assert_eq!(stats.users, 2);
        assert_eq!(stats.divesites, 1);
        assert_eq!(stats.slipways, 2);
        assert_eq!(stats.compressors, 0);
        assert_eq!(stats.dives, 2);
        assert_eq!(stats.images, 0);
        assert_eq!(stats.total_dive_seconds, 9000);
    }
}
