// SPDX-License-Identifier: GPL-3.0-or-later

//! Gemini generative-text client and the recommendation prompts built on it.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, trace};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// A similar artist proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSuggestion {
    pub name: String,
    #[serde(default)]
    pub reason: String,
}

/// A curated pick for a listening profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedPick {
    pub artist_name: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub representative_track: String,
    #[serde(default)]
    pub representative_album: String,
}

/// A genre profile the curator knows how to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenreProfile {
    pub key: &'static str,
    pub description: &'static str,
    pub mood: &'static str,
}

pub const GENRE_PROFILES: &[GenreProfile] = &[
    GenreProfile {
        key: "power-pop",
        description: "Power pop in the vein of Fountains of Wayne or Weezer: distorted guitars, catchy melodies and bittersweet harmonies.",
        mood: "Energetic, Catchy, Melodic",
    },
    GenreProfile {
        key: "mellow-pop",
        description: "Late-night pop with relaxed tempos and beautiful melodies, blending acoustic instruments with electronica.",
        mood: "Chill, Emotional, Night drive",
    },
    GenreProfile {
        key: "beautiful-emo",
        description: "Emo rock built on gorgeous melodies and emotional vocals, favouring beauty over aggression.",
        mood: "Emotional, Beautiful, Rock",
    },
    GenreProfile {
        key: "dance",
        description: "Vocal house and melodic dance music.",
        mood: "Dance, Melodic House, Groovy",
    },
    GenreProfile {
        key: "jangle-pop",
        description: "Guitar pop with the chamber-pop elegance of Belle and Sebastian or Camera Obscura, strings and horns, warm sunlit tones and clean Rickenbacker jangle.",
        mood: "Sunny, Twee, Orchestral Pop, Nostalgic",
    },
    GenreProfile {
        key: "indie-rock",
        description: "Introspective, literary indie rock like Death Cab for Cutie, with interlocking clean guitar arpeggios and songs that favour structure and emotional movement over flash.",
        mood: "Introspective, Storytelling, Clean Guitars, Melancholic",
    },
    GenreProfile {
        key: "melodic-death-metal",
        description: "Melodic death metal with the neoclassical keyboards and shredding of Children of Bodom, or the aggressive yet instantly memorable riffs of Arch Enemy.",
        mood: "Neoclassical, Technical, Aggressive but Catchy, Shredding",
    },
    GenreProfile {
        key: "indie-pop",
        description: "Indie pop that values songcraft and charm over rock weight, using synths and acoustic instruments for friendly, catchy melodies.",
        mood: "Sweet, Catchy, Lo-fi",
    },
    GenreProfile {
        key: "pop-punk",
        description: "Three chords, fast tempos and unforgettable choruses. Youthful, driving punk rock in the lineage of Green Day and Blink-182.",
        mood: "High Energy, Youthful, Anthemic",
    },
    GenreProfile {
        key: "melodic-hardcore",
        description: "Hardcore punk speed carrying tearful melodies: 90s skate punk and wistful fast punk like Hi-STANDARD.",
        mood: "Fast, Emotional, Skate Punk",
    },
    GenreProfile {
        key: "thrash-metal",
        description: "Metal defined by aggressive speed, chugging riffs and complex arrangements, rooted in Metallica and Slayer with a razor-sharp sound.",
        mood: "Aggressive, Fast, Technical Riffs",
    },
];

pub fn genre_profile(key: &str) -> Option<&'static GenreProfile> {
    GENRE_PROFILES.iter().find(|p| p.key.eq_ignore_ascii_case(key))
}

/// Slider values in 0..=100 that tune a curation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurationProfile {
    pub genre: &'static GenreProfile,
    pub melancholy: u8,
    pub energy: u8,
    pub obscurity: u8,
}

impl CurationProfile {
    /// Above this obscurity the prompt asks to steer clear of mainstream acts.
    pub const OBSCURE_THRESHOLD: u8 = 70;

    pub fn prompt(&self, count: usize) -> String {
        let mut prompt = format!(
            "You are a seasoned music curator.\n\
             Recommend {count} artists that match the following brief.\n\n\
             Core genre: {}\n\
             Mood keywords: {}\n\
             Excluded genres: Hip-Hop, Classical\n\n\
             Fine-tuning for the current mood:\n\
             - Melancholy: {}%\n\
             - Energy: {}%\n\
             - Obscurity: {}%\n",
            self.genre.description, self.genre.mood, self.melancholy, self.energy, self.obscurity
        );
        if self.obscurity > Self::OBSCURE_THRESHOLD {
            prompt.push_str(
                "\nSelection rules:\n\
                 - Strictly exclude mainstream acts (for example Weezer or Oasis).\n\
                 - Prefer bands with hidden gems that are not yet widely known.\n\
                 - Choose underrated artists.\n",
            );
        }
        prompt.push_str(
            "\nRespond with JSON only, shaped as:\n\
             [{\"artist_name\": \"...\", \"reason\": \"...\", \"representative_track\": \"...\", \"representative_album\": \"...\"}]\n",
        );
        prompt
    }
}

fn related_artists_prompt(artist_name: &str, count: usize) -> String {
    format!(
        "You are a music expert.\n\
         Name {count} artists that sound similar to \"{artist_name}\".\n\n\
         Respond with JSON only, shaped as:\n\
         [{{\"name\": \"artist name\", \"reason\": \"one short sentence on why they are similar\"}}]\n\n\
         Consider musical style, era, genre and lines of influence. \
         Include lesser-known artists alongside well-known ones, \
         and look for shared labels, scenes or producers."
    )
}

/// Struct representing the Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    client: Client,
    /// Base URL stored without a trailing slash.
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self::with_client(Client::new(), api_key, model, base_url)
    }

    pub fn with_client(
        client: Client,
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| GEMINI_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        debug!(target: "gemini", base_url = %base_url, model = %model, "Initialized Gemini client");
        Self {
            api_key,
            model,
            client,
            base_url,
        }
    }

    /// Up to `count` artists similar to `artist_name`.
    #[instrument(skip(self))]
    pub async fn related_artists(
        &self,
        artist_name: &str,
        count: usize,
    ) -> Result<Vec<ArtistSuggestion>, GeminiError> {
        let text = self
            .generate_text(&related_artists_prompt(artist_name, count))
            .await?;
        let mut suggestions: Vec<ArtistSuggestion> = parse_json_payload(&text)?;
        suggestions.retain(|s| !s.name.trim().is_empty());
        suggestions.truncate(count);
        Ok(suggestions)
    }

    /// Curated picks for a genre profile tuned by the sliders.
    #[instrument(skip(self))]
    pub async fn curate(
        &self,
        profile: &CurationProfile,
        count: usize,
    ) -> Result<Vec<CuratedPick>, GeminiError> {
        let text = self.generate_text(&profile.prompt(count)).await?;
        let mut picks: Vec<CuratedPick> = parse_json_payload(&text)?;
        picks.truncate(count);
        Ok(picks)
    }

    /// Single-shot prompt to text.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(target: "gemini", url = %url, "Requesting generation");

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(GeminiError::HttpStatus { status, body: raw });
        }

        let parsed: GenerateResponse = serde_json::from_str(&raw)?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or(GeminiError::EmptyResponse)?;

        trace!(target: "gemini", "raw generation: {}", text);
        Ok(text)
    }
}

/// Error type returned by the Gemini client.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
    #[error("model returned no text")]
    EmptyResponse,
    /// The model answered but the text was not the JSON we asked for.
    #[error("failed to parse model output: {0}")]
    Parse(String),
}

/// Remove Markdown code fences the model likes to wrap JSON in.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse a fenced or bare JSON payload. Any failure is fatal for the call.
pub fn parse_json_payload<T: DeserializeOwned>(text: &str) -> Result<T, GeminiError> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| GeminiError::Parse(e.to_string()))
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
