//! # Agent Flows
//!
//! `message/send` end to end: HTTP client → gateway → built-in agent → A2A
//! reply, plus the failure shapes a client sees.

#[cfg(test)]
mod tests {
    use agent_gateway::codes;
    use builtin_agents::AgentKind;
    use serde_json::{json, Value};

    use crate::integration::fixtures::{message_send, RunningAgent};

    const PASSWORD: &str = "secret1";

    // =========================================================================
    // CALCULATOR
    // =========================================================================

    #[tokio::test]
    async fn test_calculator_answers_over_the_wire() {
        let agent = RunningAgent::start(AgentKind::Calculator, Some(PASSWORD)).await;

        let (status, body) = agent.send_text(Some(PASSWORD), "What is 10 * 11?").await;

        assert_eq!(status, 200);
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], "req-1");
        assert!(body.get("error").is_none());

        let reply = &body["result"];
        assert_eq!(reply["kind"], "message");
        assert_eq!(reply["role"], "agent");
        assert!(!reply["messageId"].as_str().unwrap().is_empty());
        let text = reply["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("110"), "unexpected reply: {}", text);
        assert_eq!(agent.calls(), 1);

        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_context_id_is_echoed() {
        let agent = RunningAgent::start(AgentKind::Calculator, Some(PASSWORD)).await;
        let mut request = message_send("ctx", "1 + 1");
        request["params"]["message"]["contextId"] = json!("conversation-7");

        let body: Value = agent
            .post(Some(PASSWORD), &request)
            .await
            .json()
            .await
            .unwrap();

        assert_eq!(body["result"]["contextId"], "conversation-7");
        assert_eq!(body["result"]["parts"][0]["text"], "1 + 1 = 2");
    }

    #[tokio::test]
    async fn test_division_by_zero_is_handler_failure() {
        let agent = RunningAgent::start(AgentKind::Calculator, Some(PASSWORD)).await;

        let (status, body) = agent.send_text(Some(PASSWORD), "8 / 0").await;

        assert_eq!(status, 500);
        assert_eq!(body["id"], "req-1");
        assert_eq!(body["error"]["code"], codes::SERVER_ERROR);
        assert!(body.get("result").is_none());
    }

    // =========================================================================
    // FACTOR
    // =========================================================================

    #[tokio::test]
    async fn test_factor_answers_and_reports_failures() {
        let agent = RunningAgent::start(AgentKind::Factor, Some(PASSWORD)).await;

        let (status, body) = agent.send_text(Some(PASSWORD), "factors of 28").await;
        assert_eq!(status, 200);
        assert_eq!(
            body["result"]["parts"][0]["text"],
            "The factors of 28 are: 1, 2, 4, 7, 14, 28"
        );

        let (status, body) = agent.send_text(Some(PASSWORD), "no digits here").await;
        assert_eq!(status, 500);
        assert_eq!(body["error"]["message"], "No number found in the input text.");

        let (status, body) = agent.send_text(Some(PASSWORD), "0").await;
        assert_eq!(status, 500);
        assert_eq!(
            body["error"]["message"],
            "Please provide a positive integer greater than 0."
        );

        // The connection stays usable after failures.
        let (status, _) = agent.send_text(Some(PASSWORD), "factors of 9").await;
        assert_eq!(status, 200);
        assert_eq!(agent.calls(), 4);
    }

    // =========================================================================
    // ENVELOPE
    // =========================================================================

    #[tokio::test]
    async fn test_unknown_method_reaches_agent_as_failure() {
        let agent = RunningAgent::start(AgentKind::Factor, Some(PASSWORD)).await;

        let body = json!({"jsonrpc": "2.0", "id": 9, "method": "tasks/get", "params": {}});
        let response = agent.post(Some(PASSWORD), &body).await;
        assert_eq!(response.status().as_u16(), 500);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["id"], 9);
        assert_eq!(body["error"]["code"], codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_envelope_never_reaches_agent() {
        let agent = RunningAgent::start(AgentKind::Calculator, Some(PASSWORD)).await;

        let response = reqwest::Client::new()
            .post(agent.url("/"))
            .bearer_auth(PASSWORD)
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], codes::PARSE_ERROR);

        let response = agent
            .post(Some(PASSWORD), &json!({"jsonrpc": "1.0", "id": 1, "method": "message/send"}))
            .await;
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], codes::INVALID_REQUEST);

        assert_eq!(agent.calls(), 0);
    }

    // =========================================================================
    // DISCOVERY
    // =========================================================================

    #[tokio::test]
    async fn test_cards_describe_each_agent() {
        for (kind, skill) in [
            (AgentKind::Calculator, "arithmetic"),
            (AgentKind::Factor, "factorization"),
        ] {
            let agent = RunningAgent::start(kind, Some(PASSWORD)).await;
            let card: Value = reqwest::get(agent.card_url())
                .await
                .unwrap()
                .json()
                .await
                .unwrap();

            assert_eq!(card["name"], kind.display_name());
            assert_eq!(card["skills"][0]["id"], skill);
            let url = card["url"].as_str().unwrap();
            assert!(url.ends_with(&format!(":{}/", agent.addr.port())), "url: {}", url);
            assert!(card["securitySchemes"]["bearer"].is_object());
        }
    }
}
