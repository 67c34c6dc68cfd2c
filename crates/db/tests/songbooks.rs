//! Integration tests for songbooks: entry ordering, revision bumps and
//! compilation against current song text.

use assert_matches::assert_matches;
use songbook_core::diff::compute_diff;
use songbook_core::document::{NewDocument, DEFAULT_ARRANGEMENT};
use songbook_core::error::CoreError;
use songbook_core::songbook::INITIAL_SONGBOOK_REVISION;
use songbook_db::models::group::{CreateGroup, Group};
use songbook_db::models::song::Song;
use songbook_db::models::song_edit::CreateSongEdit;
use songbook_db::models::songbook::{CreateSongbook, Songbook};
use songbook_db::repositories::{GroupRepo, SongEditRepo, SongRepo, SongbookRepo};
use songbook_db::DbError;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_group(pool: &PgPool, name: &str) -> Group {
    GroupRepo::create(pool, &CreateGroup { name: name.to_string() })
        .await
        .unwrap()
}

async fn new_song(pool: &PgPool, group_id: i64, title: &str) -> Song {
    SongRepo::create(
        pool,
        &NewDocument {
            group_id,
            title: title.to_string(),
            artist: None,
            arrangement: None,
            author_id: 1,
            initial_text: format!("{title} lyrics\n"),
        },
    )
    .await
    .unwrap()
}

async fn new_songbook(pool: &PgPool, group_id: i64, name: &str) -> Songbook {
    SongbookRepo::create(pool, &CreateSongbook { group_id, name: name.to_string() })
        .await
        .unwrap()
}

fn core(err: DbError) -> CoreError {
    match err {
        DbError::Core(core) => core,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_songbook_name_unique_per_group(pool: PgPool) {
    let a = new_group(&pool, "Choir").await;
    let b = new_group(&pool, "Band").await;
    let input = CreateSongbook { group_id: a.id, name: "Christmas".to_string() };

    let book = SongbookRepo::create(&pool, &input).await.unwrap();
    assert_eq!(book.revision, INITIAL_SONGBOOK_REVISION);

    assert_matches!(
        SongbookRepo::create(&pool, &input).await.map_err(core),
        Err(CoreError::Conflict(_))
    );
    new_songbook(&pool, b.id, "Christmas").await;

    assert_matches!(
        SongbookRepo::create(&pool, &CreateSongbook { group_id: a.id, name: String::new() })
            .await
            .map_err(core),
        Err(CoreError::Validation(_))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_songbook_in_unknown_group_not_found(pool: PgPool) {
    let input = CreateSongbook { group_id: 999, name: "Orphan".to_string() };
    assert_matches!(
        SongbookRepo::create(&pool, &input).await.map_err(core),
        Err(CoreError::NotFound { entity: "Group", id: 999 })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_for_group_sorted_by_name(pool: PgPool) {
    let choir = new_group(&pool, "Choir").await;
    let band = new_group(&pool, "Band").await;
    new_songbook(&pool, choir.id, "Summer").await;
    new_songbook(&pool, choir.id, "Advent").await;
    new_songbook(&pool, band.id, "Gigs").await;

    let names: Vec<String> = SongbookRepo::list_for_group(&pool, choir.id)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["Advent", "Summer"]);
    assert!(SongbookRepo::list_for_group(&pool, 999).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_entries_append_and_close_gaps(pool: PgPool) {
    let group = new_group(&pool, "Choir").await;
    let book = new_songbook(&pool, group.id, "Set").await;
    let songs = [
        new_song(&pool, group.id, "One").await,
        new_song(&pool, group.id, "Two").await,
        new_song(&pool, group.id, "Three").await,
    ];
    for song in &songs {
        SongbookRepo::add_entry(&pool, book.id, song.id).await.unwrap();
    }

    let updated = SongbookRepo::remove_entry(&pool, book.id, songs[0].id).await.unwrap();
    assert_eq!(updated.revision, 5);

    let entries = SongbookRepo::list_entries(&pool, book.id).await.unwrap();
    let layout: Vec<(i32, i64)> = entries.iter().map(|e| (e.position, e.song_id)).collect();
    assert_eq!(layout, vec![(0, songs[1].id), (1, songs[2].id)]);

    assert_matches!(
        SongbookRepo::remove_entry(&pool, book.id, songs[0].id).await.map_err(core),
        Err(CoreError::NotFound { entity: "SongbookEntry", .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_add_entry_rules(pool: PgPool) {
    let group = new_group(&pool, "Choir").await;
    let other = new_group(&pool, "Band").await;
    let book = new_songbook(&pool, group.id, "Set").await;
    let ours = new_song(&pool, group.id, "Ours").await;
    let theirs = new_song(&pool, other.id, "Theirs").await;

    SongbookRepo::add_entry(&pool, book.id, ours.id).await.unwrap();
    assert_matches!(
        SongbookRepo::add_entry(&pool, book.id, ours.id).await.map_err(core),
        Err(CoreError::Conflict(_))
    );
    assert_matches!(
        SongbookRepo::add_entry(&pool, book.id, theirs.id).await.map_err(core),
        Err(CoreError::Validation(_))
    );
    assert_matches!(
        SongbookRepo::add_entry(&pool, 999, ours.id).await.map_err(core),
        Err(CoreError::NotFound { entity: "Songbook", .. })
    );

    let book = SongbookRepo::get(&pool, book.id).await.unwrap();
    assert_eq!(book.revision, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_compile_uses_current_text(pool: PgPool) {
    let group = new_group(&pool, "Choir").await;
    let book = new_songbook(&pool, group.id, "Set").await;
    let first = new_song(&pool, group.id, "First").await;
    let second = new_song(&pool, group.id, "Second").await;
    SongbookRepo::add_entry(&pool, book.id, second.id).await.unwrap();
    SongbookRepo::add_entry(&pool, book.id, first.id).await.unwrap();

    let edit = SongEditRepo::propose(
        &pool,
        &CreateSongEdit {
            song_id: first.id,
            base_version_id: first.current_version_id,
            diff: compute_diff("First lyrics\n", "First lyrics, fixed\n"),
            proposer_id: 2,
        },
    )
    .await
    .unwrap();
    SongEditRepo::approve(&pool, edit.id, 3).await.unwrap();

    let compiled = SongbookRepo::compile(&pool, book.id).await.unwrap();
    assert_eq!(compiled.songbook.id, book.id);
    assert!(compiled.songs.iter().all(|s| s.arrangement == DEFAULT_ARRANGEMENT));
    let songs: Vec<(i64, i32, &str)> = compiled
        .songs
        .iter()
        .map(|s| (s.song_id, s.revision, s.body.as_str()))
        .collect();
    assert_eq!(
        songs,
        vec![
            (second.id, 1, "Second lyrics\n"),
            (first.id, 2, "First lyrics, fixed\n"),
        ]
    );
}
