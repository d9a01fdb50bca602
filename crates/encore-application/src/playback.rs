// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::ports::PlaybackProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Next,
    Previous,
}

impl FromStr for PlaybackCommand {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play" => Ok(PlaybackCommand::Play),
            "pause" => Ok(PlaybackCommand::Pause),
            "next" => Ok(PlaybackCommand::Next),
            "previous" => Ok(PlaybackCommand::Previous),
            _ => Err(ServiceError::InvalidInput("Invalid action".into())),
        }
    }
}

impl fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackCommand::Play => "play",
            PlaybackCommand::Pause => "pause",
            PlaybackCommand::Next => "next",
            PlaybackCommand::Previous => "previous",
        };
        f.write_str(name)
    }
}

pub struct PlaybackService {
    provider: Arc<dyn PlaybackProvider>,
}

impl PlaybackService {
    pub fn new(provider: Arc<dyn PlaybackProvider>) -> Self {
        Self { provider }
    }

    /// The active device, if the provider reports one. Lookup failures are not fatal.
    async fn active_device(&self, token: &str) -> Option<String> {
        match self.provider.devices(token).await {
            Ok(devices) => devices
                .into_iter()
                .find(|d| d.is_active)
                .and_then(|d| d.id),
            Err(err) => {
                warn!(target: "playback", error = %err, "device lookup failed");
                None
            }
        }
    }

    /// Send a transport command to the active device.
    ///
    /// Play and pause retry once without a device when the targeted call
    /// fails, which resumes the current session.
    #[instrument(skip(self, token))]
    pub async fn control(&self, token: &str, command: PlaybackCommand) -> ServiceResult<()> {
        let device = self.active_device(token).await;
        let device = device.as_deref();
        debug!(target: "playback", device = ?device, "sending playback command");

        let result = match command {
            PlaybackCommand::Play => match self.provider.play(token, device).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    warn!(target: "playback", error = %err, "targeted play failed, retrying without device");
                    self.provider.play(token, None).await
                }
            },
            PlaybackCommand::Pause => match self.provider.pause(token, device).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    warn!(target: "playback", error = %err, "targeted pause failed, retrying without device");
                    self.provider.pause(token, None).await
                }
            },
            PlaybackCommand::Next => self.provider.next(token, device).await,
            PlaybackCommand::Previous => self.provider.previous(token, device).await,
        };

        result.map_err(ServiceError::from_playback)?;
        info!(target: "playback", %command, "playback command sent");
        Ok(())
    }

    #[instrument(skip(self, token))]
    pub async fn enqueue(&self, token: &str, uri: &str) -> ServiceResult<()> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(ServiceError::InvalidInput("Missing track URI".into()));
        }
        self.provider
            .add_to_queue(token, uri, None)
            .await
            .map_err(ServiceError::from_playback)?;
        info!(target: "playback", uri, "track queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{device, FakeProvider};

    fn service() -> (Arc<FakeProvider>, PlaybackService) {
        let provider = Arc::new(FakeProvider::default());
        (provider.clone(), PlaybackService::new(provider))
    }

    #[test]
    fn actions_parse_case_insensitively() {
        assert_eq!("Play".parse::<PlaybackCommand>().unwrap(), PlaybackCommand::Play);
        assert_eq!(" previous ".parse::<PlaybackCommand>().unwrap(), PlaybackCommand::Previous);
        assert!(matches!(
            "rewind".parse::<PlaybackCommand>(),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn commands_target_the_active_device() {
        let (provider, playback) = service();
        *provider.devices.lock().unwrap() = vec![device("phone", false), device("desk", true)];

        playback.control("tok", PlaybackCommand::Next).await.unwrap();
        assert!(provider.called("next:desk"));
    }

    #[tokio::test]
    async fn stale_device_play_falls_back_to_session() {
        let (provider, playback) = service();
        *provider.devices.lock().unwrap() = vec![device("stale", true)];
        provider.fail("play:stale", 404);

        playback.control("tok", PlaybackCommand::Play).await.unwrap();
        assert_eq!(
            provider.calls(),
            vec!["devices".to_string(), "play:stale".to_string(), "play:-".to_string()]
        );
    }

    #[tokio::test]
    async fn skip_has_no_fallback() {
        let (provider, playback) = service();
        *provider.devices.lock().unwrap() = vec![device("desk", true)];
        provider.fail("previous:desk", 404);

        let err = playback
            .control("tok", PlaybackCommand::Previous)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoActiveDevice));
        assert!(!provider.called("previous:-"));
    }

    #[tokio::test]
    async fn restricted_commands_carry_guidance() {
        let (provider, playback) = service();
        provider.fail("pause:-", 403);

        let err = playback.control("tok", PlaybackCommand::Pause).await.unwrap_err();
        match err {
            ServiceError::Forbidden(text) => assert!(text.contains("Private Session")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn device_lookup_failure_sends_untargeted_command() {
        let (provider, playback) = service();
        provider.fail("devices", 500);

        playback.control("tok", PlaybackCommand::Next).await.unwrap();
        assert!(provider.called("next:-"));
    }

    #[tokio::test]
    async fn enqueue_requires_uri_and_reports_missing_device() {
        let (provider, playback) = service();
        let err = playback.enqueue("tok", "  ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        provider.fail("queue:spotify:track:t1:-", 404);
        let err = playback.enqueue("tok", "spotify:track:t1").await.unwrap_err();
        assert!(matches!(err, ServiceError::NoActiveDevice));

        playback.enqueue("tok", "spotify:track:t2").await.unwrap();
        assert!(provider.called("queue:spotify:track:t2:-"));
    }
}
