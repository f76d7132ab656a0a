//! Entry (beat) queries: standings, likes and feedback

use sqlx::{sqlite::SqliteRow, Row, SqliteExecutor, SqlitePool};

use super::models::Entry;
use crate::ranking::{Placement, Rankable};
use crate::Result;

/// Longest feedback text accepted
pub const MAX_FEEDBACK_LEN: usize = 256;

/// Owner and contest of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOwner {
    pub battle_id: i64,
    pub artist_id: i64,
}

/// Whether an upsert created a new row or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

fn entry_from_row(row: &SqliteRow) -> Result<Entry> {
    let placement: i64 = row.try_get("placement")?;
    let disqualified: i64 = row.try_get("disqualified")?;
    let user_voted: i64 = row.try_get("user_voted")?;
    let user_liked: i64 = row.try_get("user_liked")?;

    let mut entry = Entry {
        id: row.try_get("id")?,
        battle_id: row.try_get("battle_id")?,
        artist_id: row.try_get("user_id")?,
        url: row.try_get("url")?,
        placement: None,
        disqualified: false,
        votes: row.try_get("votes")?,
        likes: row.try_get("likes")?,
        user_voted: user_voted != 0,
        user_liked: user_liked != 0,
        feedback: row.try_get("feedback")?,
    };
    entry.set_placement(Placement::from_columns(placement, disqualified != 0));
    Ok(entry)
}

/// Submit an entry, returning its id
pub async fn insert_entry(pool: &SqlitePool, battle_id: i64, user_id: i64, url: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO beats (battle_id, user_id, url) VALUES (?, ?, ?)")
        .bind(battle_id)
        .bind(user_id)
        .bind(url)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Look up which contest and artist an entry belongs to
pub async fn entry_owner<'e, E>(executor: E, beat_id: i64) -> Result<Option<EntryOwner>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query_as::<_, (i64, i64)>("SELECT battle_id, user_id FROM beats WHERE id = ?")
        .bind(beat_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(|(battle_id, artist_id)| EntryOwner { battle_id, artist_id }))
}

/// All entries of a contest as seen by `viewer`, in stored ranking order
///
/// Ranked entries come first by placement, then unranked ones by submission,
/// then disqualified ones.
pub async fn load_entries(pool: &SqlitePool, battle_id: i64, viewer: Option<i64>) -> Result<Vec<Entry>> {
    // -1 never matches a user, so anonymous viewers see no personal flags
    let viewer = viewer.unwrap_or(-1);

    let rows = sqlx::query(
        r#"
        SELECT b.id, b.battle_id, b.user_id, b.url, b.placement, b.disqualified,
               (SELECT COUNT(*) FROM votes v WHERE v.beat_id = b.id) AS votes,
               (SELECT COUNT(*) FROM likes l WHERE l.beat_id = b.id) AS likes,
               EXISTS (SELECT 1 FROM votes v WHERE v.beat_id = b.id AND v.user_id = ?) AS user_voted,
               EXISTS (SELECT 1 FROM likes l WHERE l.beat_id = b.id AND l.user_id = ?) AS user_liked,
               (SELECT f.feedback FROM feedback f WHERE f.beat_id = b.id AND f.user_id = ?) AS feedback
        FROM beats b
        WHERE b.battle_id = ?
        ORDER BY b.disqualified, b.placement = 0, b.placement, b.id
        "#,
    )
    .bind(viewer)
    .bind(viewer)
    .bind(viewer)
    .bind(battle_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Persist the placements of a whole contest in one transaction
///
/// Either every row is written or none is, so a failed write never leaves a
/// half-applied cascade behind.
pub async fn save_placements<T: Rankable>(pool: &SqlitePool, battle_id: i64, entries: &[T]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for entry in entries {
        let placement = entry.placement();
        sqlx::query("UPDATE beats SET placement = ?, disqualified = ? WHERE id = ? AND battle_id = ?")
            .bind(placement.column_value())
            .bind(placement.is_disqualified())
            .bind(entry.entry_id())
            .bind(battle_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Flip the user's like on an entry; returns true when the entry is now liked
pub async fn toggle_like(pool: &SqlitePool, user_id: i64, beat_id: i64, battle_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM likes WHERE user_id = ? AND beat_id = ?")
        .bind(user_id)
        .bind(beat_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        sqlx::query("INSERT INTO likes (user_id, beat_id, battle_id) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(beat_id)
            .bind(battle_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(removed == 0)
}

/// Create or replace the user's feedback on an entry
pub async fn upsert_feedback(pool: &SqlitePool, user_id: i64, beat_id: i64, feedback: &str) -> Result<Upsert> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE feedback SET feedback = ?, updated_at = CURRENT_TIMESTAMP WHERE user_id = ? AND beat_id = ?",
    )
    .bind(feedback)
    .bind(user_id)
    .bind(beat_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let outcome = if updated == 0 {
        sqlx::query("INSERT INTO feedback (feedback, user_id, beat_id) VALUES (?, ?, ?)")
            .bind(feedback)
            .bind(user_id)
            .bind(beat_id)
            .execute(&mut *tx)
            .await?;
        Upsert::Inserted
    } else {
        Upsert::Updated
    };

    tx.commit().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::battles::insert_contest;
    use crate::db::init::init_memory_database;
    use crate::db::models::NewContest;
    use crate::ranking;
    use chrono::{Duration, Utc};

    async fn seeded() -> (SqlitePool, i64, Vec<i64>) {
        let pool = init_memory_database().await.unwrap();
        let now = Utc::now();
        let battle = insert_contest(
            &pool,
            &NewContest {
                title: "Seeded".to_string(),
                host_id: 1,
                submission_deadline: now + Duration::days(1),
                voting_deadline: now + Duration::days(2),
                max_votes: 3,
                draft: false,
            },
        )
        .await
        .unwrap();

        let mut beats = Vec::new();
        for artist in 10..14 {
            let url = format!("https://soundcloud.com/artist{}/beat", artist);
            beats.push(insert_entry(&pool, battle, artist, &url).await.unwrap());
        }
        (pool, battle, beats)
    }

    #[tokio::test]
    async fn test_fresh_entries_are_unranked_in_submission_order() {
        let (pool, battle, beats) = seeded().await;
        let entries = load_entries(&pool, battle, None).await.unwrap();

        assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), beats);
        assert!(entries.iter().all(|e| e.placement() == Placement::Unranked));
    }

    #[tokio::test]
    async fn test_save_placements_round_trip() {
        let (pool, battle, beats) = seeded().await;

        let entries = ranking::normalize(load_entries(&pool, battle, None).await.unwrap());
        let entries = ranking::reorder(entries, beats[3], 1).unwrap();
        let entries = ranking::disqualify(entries, beats[1]).unwrap();
        save_placements(&pool, battle, &entries).await.unwrap();

        let stored = load_entries(&pool, battle, None).await.unwrap();
        assert_eq!(stored, entries);
        assert!(ranking::is_dense(&stored));
        assert_eq!(
            stored.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![beats[3], beats[0], beats[2], beats[1]]
        );
    }

    #[tokio::test]
    async fn test_toggle_like() {
        let (pool, battle, beats) = seeded().await;

        assert!(toggle_like(&pool, 99, beats[0], battle).await.unwrap());
        let entries = load_entries(&pool, battle, Some(99)).await.unwrap();
        assert_eq!(entries[0].likes, 1);
        assert!(entries[0].user_liked);

        assert!(!toggle_like(&pool, 99, beats[0], battle).await.unwrap());
        let entries = load_entries(&pool, battle, Some(99)).await.unwrap();
        assert_eq!(entries[0].likes, 0);
        assert!(!entries[0].user_liked);
    }

    #[tokio::test]
    async fn test_upsert_feedback() {
        let (pool, battle, beats) = seeded().await;

        assert_eq!(
            upsert_feedback(&pool, 99, beats[2], "nice drums").await.unwrap(),
            Upsert::Inserted
        );
        assert_eq!(
            upsert_feedback(&pool, 99, beats[2], "nice drums, mix the bass").await.unwrap(),
            Upsert::Updated
        );

        let entries = load_entries(&pool, battle, Some(99)).await.unwrap();
        assert_eq!(entries[2].feedback.as_deref(), Some("nice drums, mix the bass"));
        // Other viewers don't see it as their own feedback
        let entries = load_entries(&pool, battle, Some(98)).await.unwrap();
        assert_eq!(entries[2].feedback, None);
    }

    #[tokio::test]
    async fn test_entry_owner() {
        let (pool, battle, beats) = seeded().await;
        let owner = entry_owner(&pool, beats[1]).await.unwrap().unwrap();
        assert_eq!(owner, EntryOwner { battle_id: battle, artist_id: 11 });
        assert!(entry_owner(&pool, 12345).await.unwrap().is_none());
    }
}
