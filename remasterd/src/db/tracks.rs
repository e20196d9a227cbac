//! Track database operations

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// One registered audio track
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub guid: Uuid,
    pub title: String,
    pub file_path: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i64>,
    pub isrc: Option<String>,
    pub comment: Option<String>,
    pub artwork_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering a track
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub title: String,
    pub file_path: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i64>,
    pub isrc: Option<String>,
    pub comment: Option<String>,
    pub artwork_path: Option<String>,
}

impl Track {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        let guid_str: String = row.get("guid");
        let guid = Uuid::parse_str(&guid_str)?;
        let created_at_str: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc);

        Ok(Track {
            guid,
            title: row.get("title"),
            file_path: row.get("file_path"),
            artist: row.get("artist"),
            album: row.get("album"),
            year: row.get("year"),
            isrc: row.get("isrc"),
            comment: row.get("comment"),
            artwork_path: row.get("artwork_path"),
            created_at,
        })
    }
}

const TRACK_COLUMNS: &str =
    "guid, title, file_path, artist, album, year, isrc, comment, artwork_path, created_at";

/// Insert a new track, returning the stored record
pub async fn insert_track(pool: &SqlitePool, new: NewTrack) -> Result<Track> {
    let track = Track {
        guid: Uuid::new_v4(),
        title: new.title,
        file_path: new.file_path,
        artist: new.artist,
        album: new.album,
        year: new.year,
        isrc: new.isrc,
        comment: new.comment,
        artwork_path: new.artwork_path,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO tracks (guid, title, file_path, artist, album, year, isrc, comment, artwork_path, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(track.guid.to_string())
    .bind(&track.title)
    .bind(&track.file_path)
    .bind(&track.artist)
    .bind(&track.album)
    .bind(track.year)
    .bind(&track.isrc)
    .bind(&track.comment)
    .bind(&track.artwork_path)
    .bind(track.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(track)
}

/// Fetch one track by id
pub async fn get_track(pool: &SqlitePool, guid: Uuid) -> Result<Option<Track>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tracks WHERE guid = ?",
        TRACK_COLUMNS
    ))
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(Track::from_row(&row)?)),
        None => Ok(None),
    }
}

/// List all tracks, newest first
pub async fn list_tracks(pool: &SqlitePool) -> Result<Vec<Track>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tracks ORDER BY created_at DESC, guid",
        TRACK_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(Track::from_row).collect()
}

/// Delete a track row. Returns true when a row existed.
pub async fn delete_track(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tracks WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
