// SPDX-License-Identifier: GPL-3.0-or-later

//! Clients for the listening-history and generative-text services.

pub mod gemini;
pub mod lastfm;

pub use gemini::{ArtistSuggestion, CuratedPick, CurationProfile, GeminiClient, GeminiError};
pub use lastfm::{LastFmClient, LastFmError, UserPlayCounts};
