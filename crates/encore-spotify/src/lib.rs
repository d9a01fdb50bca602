// SPDX-License-Identifier: GPL-3.0-or-later

//! Spotify Web API client.
//!
//! Covers the catalog, library and player endpoints the dashboard needs plus
//! the authorization-code OAuth flow. Every catalog or player call takes the
//! caller's access token, so one client can serve many users.

pub mod client;
pub mod error;
pub mod models;

pub use client::{SpotifyClient, SpotifyClientBuilder, SCOPES};
pub use error::{Result, SpotifyError};
pub use models::{
    Album, Artist, CurrentlyPlaying, Device, Image, Paging, PlayingItem, SimplifiedAlbum,
    SimplifiedArtist, SimplifiedTrack, TokenResponse, Track,
};
