//! # Authentication Flows
//!
//! The bearer credential guards every route except agent discovery.

#[cfg(test)]
mod tests {
    use builtin_agents::AgentKind;
    use serde_json::Value;

    use crate::integration::fixtures::RunningAgent;

    const PASSWORD: &str = "secret1";

    #[tokio::test]
    async fn test_wrong_token_is_rejected_before_the_agent() {
        let agent = RunningAgent::start(AgentKind::Calculator, Some(PASSWORD)).await;

        for token in [Some("wrong"), Some("secret2"), Some("Secret1"), None] {
            let response = agent
                .post(token, &crate::integration::fixtures::message_send("a", "10 * 11"))
                .await;
            assert_eq!(response.status().as_u16(), 401, "token {:?}", token);
            assert_eq!(
                response.headers().get("www-authenticate").unwrap(),
                "Bearer"
            );
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["error"], "Unauthorized");
            assert!(!body.to_string().contains(PASSWORD));
        }
        assert_eq!(agent.calls(), 0);

        let (status, body) = agent.send_text(Some(PASSWORD), "10 * 11").await;
        assert_eq!(status, 200);
        assert!(body["result"]["parts"][0]["text"].as_str().unwrap().contains("110"));
        assert_eq!(agent.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_closed() {
        let agent = RunningAgent::start(AgentKind::Factor, None).await;

        for token in [Some(""), Some("anything"), None] {
            let (status, _) = agent.send_text(token, "factors of 6").await;
            assert_eq!(status, 401);
        }
        let health = reqwest::get(agent.url("/health")).await.unwrap();
        assert_eq!(health.status().as_u16(), 401);
        assert_eq!(agent.calls(), 0);

        // Discovery still works without a credential.
        let card = reqwest::get(agent.card_url()).await.unwrap();
        assert_eq!(card.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_card_ignores_authorization_header() {
        let agent = RunningAgent::start(AgentKind::Calculator, Some(PASSWORD)).await;
        let client = reqwest::Client::new();

        for header in [None, Some("Bearer wrong"), Some("Basic Zm9vOmJhcg=="), Some("garbage")] {
            let mut request = client.get(agent.card_url());
            if let Some(value) = header {
                request = request.header("authorization", value);
            }
            let response = request.send().await.unwrap();
            assert_eq!(response.status().as_u16(), 200, "header {:?}", header);
            let card: Value = response.json().await.unwrap();
            assert_eq!(card["name"], "Calculator Agent");
        }
        assert_eq!(agent.calls(), 0);
    }

    #[tokio::test]
    async fn test_health_requires_token() {
        let agent = RunningAgent::start(AgentKind::Factor, Some(PASSWORD)).await;
        let client = reqwest::Client::new();

        let response = client.get(agent.url("/health")).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 401);

        let response = client
            .get(agent.url("/health"))
            .bearer_auth(PASSWORD)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["agent"], "Factor Agent");

        agent.stop().await.unwrap();
    }
}
