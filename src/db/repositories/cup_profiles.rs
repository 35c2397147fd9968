use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_datetime, to_u32},
    models::CupProfile,
};

const PROFILE_COLUMNS: &str =
    "id, name, size_ml, sips_per_cup, color, is_default, created_at, updated_at";

fn row_to_cup_profile(row: &Row) -> Result<CupProfile> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(CupProfile {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        size_ml: to_u32(row.get("size_ml")?, "size_ml")?,
        sips_per_cup: to_u32(row.get("sips_per_cup")?, "sips_per_cup")?,
        color: row.get("color")?,
        is_default: row.get("is_default")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

pub(crate) fn select_cup_profile(conn: &Connection, profile_id: i64) -> Result<Option<CupProfile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM cup_profiles WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![profile_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_cup_profile(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn select_all_cup_profiles(conn: &Connection) -> Result<Vec<CupProfile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM cup_profiles ORDER BY created_at DESC, id DESC"
    ))?;
    let mut rows = stmt.query([])?;
    let mut profiles = Vec::new();
    while let Some(row) = rows.next()? {
        profiles.push(row_to_cup_profile(row)?);
    }
    Ok(profiles)
}

impl Database {
    /// Validates and inserts a profile, returning it with its assigned id.
    /// Keeping a single default profile is the caller's job.
    pub async fn create_cup_profile(&self, profile: &CupProfile) -> Result<CupProfile> {
        profile.validate()?;
        let record = profile.clone();
        self.execute(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO cup_profiles (name, size_ml, sips_per_cup, color, is_default, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.name,
                    record.size_ml,
                    record.sips_per_cup,
                    record.color,
                    record.is_default,
                    format_timestamp(&now),
                    format_timestamp(&now),
                ],
            )
            .with_context(|| "failed to insert cup profile")?;

            let profile_id = conn.last_insert_rowid();
            select_cup_profile(conn, profile_id)?
                .ok_or_else(|| anyhow!("Cup profile not found after insert"))
        })
        .await
    }

    pub async fn get_cup_profile(&self, profile_id: i64) -> Result<Option<CupProfile>> {
        self.execute(move |conn| select_cup_profile(conn, profile_id))
            .await
    }

    /// Newest first.
    pub async fn get_all_cup_profiles(&self) -> Result<Vec<CupProfile>> {
        self.execute(|conn| select_all_cup_profiles(conn)).await
    }

    pub async fn get_default_cup_profile(&self) -> Result<Option<CupProfile>> {
        self.execute(|conn| {
            conn.query_row(
                "SELECT id FROM cup_profiles WHERE is_default = 1 ORDER BY id ASC LIMIT 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .map(|profile_id| select_cup_profile(conn, profile_id))
            .transpose()
            .map(Option::flatten)
        })
        .await
    }

    /// Returns false when no profile has the given id.
    pub async fn update_cup_profile(&self, profile: &CupProfile) -> Result<bool> {
        profile.validate()?;
        let Some(profile_id) = profile.id else {
            bail!("cannot update a cup profile without an id");
        };
        let record = profile.clone();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE cup_profiles
                     SET name = ?1, size_ml = ?2, sips_per_cup = ?3, color = ?4, is_default = ?5, updated_at = ?6
                     WHERE id = ?7",
                    params![
                        record.name,
                        record.size_ml,
                        record.sips_per_cup,
                        record.color,
                        record.is_default,
                        format_timestamp(&Utc::now()),
                        profile_id,
                    ],
                )
                .with_context(|| "failed to update cup profile")?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// Fails while sip events still reference the profile.
    pub async fn delete_cup_profile(&self, profile_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected = conn
                .execute("DELETE FROM cup_profiles WHERE id = ?1", params![profile_id])
                .with_context(|| format!("failed to delete cup profile {profile_id}"))?;
            Ok(rows_affected > 0)
        })
        .await
    }
}
