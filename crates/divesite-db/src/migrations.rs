use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id          BLOB PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                date_joined TEXT NOT NULL
            );

            CREATE TABLE profiles (
                user_id     BLOB PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                name        TEXT NOT NULL DEFAULT '',
                bio         TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE follows (
                follower_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                target_id   BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (follower_id, target_id),
                CHECK (follower_id <> target_id)
            );

            CREATE INDEX idx_follows_target ON follows(target_id);

            CREATE TABLE sites (
                id              BLOB PRIMARY KEY,
                kind            TEXT NOT NULL CHECK (kind IN ('divesite', 'slipway', 'compressor')),
                name            TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                latitude        REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
                longitude       REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
                owner_id        BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                creation_date   TEXT NOT NULL,
                level           INTEGER,
                boat_entry      INTEGER NOT NULL DEFAULT 0,
                shore_entry     INTEGER NOT NULL DEFAULT 0,
                bottom_type     TEXT,
                geocoding_data  TEXT
            );

            CREATE INDEX idx_sites_kind_position ON sites(kind, latitude, longitude);
            CREATE INDEX idx_sites_owner ON sites(owner_id);

            CREATE TABLE dives (
                id                  BLOB PRIMARY KEY,
                divesite_id         BLOB NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                diver_id            BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                start_time          TEXT NOT NULL,
                duration            INTEGER NOT NULL CHECK (duration > 0),
                depth               REAL NOT NULL,
                average_depth       REAL,
                comment             TEXT NOT NULL DEFAULT '',
                cylinder_capacity   INTEGER,
                pressure_in         INTEGER,
                pressure_out        INTEGER,
                gas_mix             INTEGER,
                air_temperature     INTEGER,
                water_temperature   INTEGER,
                weather             TEXT,
                wind                INTEGER CHECK (wind BETWEEN 0 AND 12),
                creation_date       TEXT NOT NULL
            );

            CREATE INDEX idx_dives_divesite ON dives(divesite_id);
            CREATE INDEX idx_dives_diver ON dives(diver_id, start_time);

            CREATE TABLE comments (
                id              BLOB PRIMARY KEY,
                site_id         BLOB NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                owner_id        BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text            TEXT NOT NULL,
                creation_date   TEXT NOT NULL
            );

            CREATE INDEX idx_comments_site ON comments(site_id, creation_date);

            CREATE TABLE images (
                id              BLOB PRIMARY KEY,
                site_id         BLOB NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                owner_id        BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                asset           TEXT NOT NULL,
                caption         TEXT NOT NULL DEFAULT '',
                is_header_image INTEGER NOT NULL DEFAULT 0,
                creation_date   TEXT NOT NULL
            );

            CREATE INDEX idx_images_site ON images(site_id);
            CREATE INDEX idx_images_owner ON images(owner_id, creation_date);

            -- At most one header image per site
            CREATE UNIQUE INDEX idx_images_one_header
                ON images(site_id) WHERE is_header_image = 1;

            CREATE TABLE profile_images (
                user_id         BLOB PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                id              BLOB NOT NULL UNIQUE,
                asset           TEXT NOT NULL,
                creation_date   TEXT NOT NULL
            );

            CREATE TABLE actions (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                actor_id            BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                verb                TEXT NOT NULL,
                action_object_kind  TEXT,
                action_object_id    BLOB,
                target_kind         TEXT,
                target_id           BLOB,
                timestamp           TEXT NOT NULL
            );

            CREATE INDEX idx_actions_actor ON actions(actor_id, id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
