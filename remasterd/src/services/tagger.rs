//! Tag embedding
//!
//! Before a source file is uploaded for mastering, the track's catalog
//! metadata (title, artist, album, year, ISRC, comment, cover art) is
//! written into the file itself so the remote copy stays identifiable.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};

use crate::db::tracks::Track;

/// Embed the track's metadata into the audio file at `path`.
///
/// Existing tag values for the fields we manage are overwritten; other
/// fields are left alone. Runs on the blocking pool since lofty is
/// synchronous I/O.
pub async fn embed_track_tags(path: &Path, track: &Track) -> Result<()> {
    let path = path.to_path_buf();
    let track = track.clone();

    tokio::task::spawn_blocking(move || write_tags(&path, &track))
        .await
        .map_err(|e| anyhow!("Tag task failed: {}", e))?
}

fn write_tags(path: &Path, track: &Track) -> Result<()> {
    let tagged_file = Probe::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?
        .read()
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;

    // Start from the existing primary tag so fields we don't manage survive.
    let mut tag = match tagged_file.primary_tag() {
        Some(existing) => existing.clone(),
        None => Tag::new(tagged_file.primary_tag_type()),
    };

    tag.set_title(track.title.clone());

    if let Some(artist) = &track.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &track.album {
        tag.set_album(album.clone());
    }
    if let Some(year) = track.year.and_then(|y| u32::try_from(y).ok()) {
        tag.set_year(year);
    }
    if let Some(comment) = &track.comment {
        tag.set_comment(comment.clone());
    }
    if let Some(isrc) = &track.isrc {
        tag.insert_text(ItemKey::Isrc, isrc.clone());
    }

    if let Some(artwork_path) = &track.artwork_path {
        let data = std::fs::read(artwork_path)
            .with_context(|| format!("Failed to read artwork: {}", artwork_path))?;
        let mime = artwork_mime(artwork_path);
        // Replace any cover we wrote on a previous pass.
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            mime,
            None,
            data,
        ));
    }

    tag.save_to_path(path, WriteOptions::default())
        .with_context(|| format!("Failed to write tags: {}", path.display()))?;

    tracing::debug!(path = %path.display(), title = %track.title, "Embedded track tags");
    Ok(())
}

fn artwork_mime(path: &str) -> Option<MimeType> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => Some(MimeType::Jpeg),
        Some("png") => Some(MimeType::Png),
        Some("gif") => Some(MimeType::Gif),
        Some("bmp") => Some(MimeType::Bmp),
        Some("tif") | Some("tiff") => Some(MimeType::Tiff),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn write_test_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..4410 {
            let sample = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn test_track(file_path: &Path) -> Track {
        Track {
            guid: Uuid::new_v4(),
            title: "Night Drive".to_string(),
            file_path: file_path.display().to_string(),
            artist: Some("Unit Circle".to_string()),
            album: Some("Test Pressings".to_string()),
            year: Some(2024),
            isrc: Some("USRC17607839".to_string()),
            comment: Some("Pre-master reference".to_string()),
            artwork_path: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_embed_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        write_test_wav(&path);

        let track = test_track(&path);
        embed_track_tags(&path, &track).await.unwrap();

        let tagged = Probe::open(&path).unwrap().read().unwrap();
        let tag = tagged.primary_tag().unwrap();
        assert_eq!(tag.title().as_deref(), Some("Night Drive"));
        assert_eq!(tag.artist().as_deref(), Some("Unit Circle"));
        assert_eq!(tag.album().as_deref(), Some("Test Pressings"));
        assert_eq!(tag.year(), Some(2024));
        assert_eq!(tag.get_string(&ItemKey::Isrc), Some("USRC17607839"));
    }

    #[tokio::test]
    async fn test_embed_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        write_test_wav(&path);

        let mut track = test_track(&path);
        embed_track_tags(&path, &track).await.unwrap();

        track.title = "Night Drive (v2)".to_string();
        embed_track_tags(&path, &track).await.unwrap();

        let tagged = Probe::open(&path).unwrap().read().unwrap();
        let tag = tagged.primary_tag().unwrap();
        assert_eq!(tag.title().as_deref(), Some("Night Drive (v2)"));
    }

    #[tokio::test]
    async fn test_embed_artwork() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        write_test_wav(&path);

        let artwork = dir.path().join("cover.png");
        std::fs::write(&artwork, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();

        let mut track = test_track(&path);
        track.artwork_path = Some(artwork.display().to_string());
        embed_track_tags(&path, &track).await.unwrap();

        let tagged = Probe::open(&path).unwrap().read().unwrap();
        let tag = tagged.primary_tag().unwrap();
        assert_eq!(tag.pictures().len(), 1);
        assert_eq!(tag.pictures()[0].pic_type(), PictureType::CoverFront);
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.wav");
        let track = test_track(&path);

        let result = embed_track_tags(&path, &track).await;
        assert!(result.is_err());
    }
}
