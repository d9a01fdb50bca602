// SPDX-License-Identifier: GPL-3.0-or-later
//! Mapping from provider catalog objects to library records.

use encore_domain::{Album, Artist};
use encore_spotify::models::first_image;
use encore_spotify as spotify;

pub fn artist_record(artist: &spotify::Artist) -> Artist {
    let mut record = Artist::new(artist.id.clone(), artist.name.clone());
    record.url = artist.external_urls.spotify.clone();
    record.image_url = first_image(&artist.images);
    record.genres = artist.genres.clone();
    record
}

/// `None` for artists without a catalog id (local files).
pub fn simplified_artist_record(artist: &spotify::SimplifiedArtist) -> Option<Artist> {
    let id = artist.id.as_deref().filter(|id| !id.is_empty())?;
    let mut record = Artist::new(id, artist.name.clone());
    record.url = artist.external_urls.spotify.clone();
    Some(record)
}

pub fn album_record(album: &spotify::Album) -> Album {
    let mut record = Album::new(album.id.clone(), album.name.clone());
    record.artist_id = album.artists.first().and_then(|a| a.id.clone());
    record.image_url = first_image(&album.images);
    record.url = album.external_urls.spotify.clone();
    record.release_date = album.release_date.clone();
    record.genre = (!album.genres.is_empty()).then(|| album.genres.join(", "));
    record.album_type = album.album_type.clone();
    record.total_tracks = album.total_tracks;
    record.popularity = album.popularity;
    record
}

/// The album embedded in a track, which lacks genres and popularity.
pub fn simplified_album_record(album: &spotify::SimplifiedAlbum) -> Album {
    let mut record = Album::new(album.id.clone(), album.name.clone());
    record.artist_id = album.artists.first().and_then(|a| a.id.clone());
    record.image_url = first_image(&album.images);
    record.url = album.external_urls.spotify.clone();
    record.release_date = album.release_date.clone();
    record.album_type = album.album_type.clone();
    record.total_tracks = album.total_tracks;
    record
}
