//! Home Assistant REST backend: `POST /api/states/<entity_id>`.

use std::time::Duration;

use tracing::debug;

use crate::error::{MailError, Result};
use crate::model::sensor::SensorState;
use crate::publish::StatePublisher;

/// Pushes states to a Home Assistant instance with a long-lived access token.
pub struct HomeAssistantPublisher {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HomeAssistantPublisher {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn state_url(&self, entity_id: &str) -> String {
        format!("{}/api/states/{entity_id}", self.base_url)
    }
}

impl std::fmt::Debug for HomeAssistantPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantPublisher")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl StatePublisher for HomeAssistantPublisher {
    fn set_state(&self, state: &SensorState) -> Result<()> {
        let url = self.state_url(&state.entity_id);
        let publish_error = |reason: String| MailError::Publish {
            entity_id: state.entity_id.clone(),
            reason,
        };

        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .send_json(state);

        match response {
            Ok(resp) => {
                debug!(
                    entity_id = %state.entity_id,
                    status = resp.status(),
                    "Published state"
                );
                Ok(())
            }
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(publish_error(format!("HTTP {code}: {}", body.trim())))
            }
            Err(ureq::Error::Transport(transport)) => Err(publish_error(transport.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn publisher(url: &str) -> HomeAssistantPublisher {
        HomeAssistantPublisher::new(url, "test-token", Duration::from_secs(5))
    }

    #[test]
    fn test_posts_state_with_bearer_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/states/sensor.usps_letters")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "state": "3",
                "attributes": {
                    "icon": "mdi:email-outline",
                    "friendly_name": "USPS Mail"
                }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"entity_id":"sensor.usps_letters","state":"3"}"#)
            .create();

        publisher(&server.url())
            .set_state(&SensorState::letters(3))
            .expect("publish succeeds");
        mock.assert();
    }

    #[test]
    fn test_trailing_slash_in_base_url() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/states/sensor.usps_packages")
            .with_status(201)
            .create();

        publisher(&format!("{}/", server.url()))
            .set_state(&SensorState::packages(0))
            .expect("publish succeeds");
        mock.assert();
    }

    #[test]
    fn test_unauthorized_is_publish_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/states/sensor.usps_letters")
            .with_status(401)
            .with_body("401: Unauthorized")
            .create();

        let err = publisher(&server.url())
            .set_state(&SensorState::letters(1))
            .unwrap_err();
        match err {
            MailError::Publish { entity_id, reason } => {
                assert_eq!(entity_id, "sensor.usps_letters");
                assert!(reason.contains("401"), "unexpected reason: {reason}");
            }
            other => panic!("expected Publish error, got {other:?}"),
        }
    }
}
