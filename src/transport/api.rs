//! HTTP adapter for the paginated server fetch contract.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    domain::{chat::Chat, message::Message},
    infra::config::{ServerConfig, SessionConfig},
    transport::wire::{normalize_chat, normalize_message, RawChat, RawMessage},
    usecases::contracts::{
        ChatDirectory, ChatPage, ConversationScope, ConversationSource, FetchSourceError,
    },
};

pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
    tenant_id: String,
}

impl HttpApi {
    pub fn new(server: &ServerConfig, session: &SessionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: server.api_url.trim_end_matches('/').to_owned(),
            auth_token: session.auth_token.clone(),
            tenant_id: session.tenant_id.clone(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.auth_token)
            .header("x-tenant-id", &self.tenant_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChatsResponse {
    #[serde(alias = "items")]
    chats: Vec<RawChat>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct RawConversationResponse {
    #[serde(alias = "items")]
    messages: Vec<RawMessage>,
}

fn map_response_error(status: reqwest::StatusCode) -> FetchSourceError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        FetchSourceError::Unauthorized
    } else {
        FetchSourceError::Unavailable
    }
}

#[async_trait]
impl ChatDirectory for HttpApi {
    async fn list_chats(
        &self,
        filter: Option<&str>,
        cursor: Option<i64>,
    ) -> Result<ChatPage, FetchSourceError> {
        let mut request = self.get("/chats");
        if let Some(filter) = filter {
            request = request.query(&[("filter", filter)]);
        }
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor.to_string().as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|_| FetchSourceError::Unavailable)?;
        if !response.status().is_success() {
            return Err(map_response_error(response.status()));
        }

        let body: RawChatsResponse = response
            .json()
            .await
            .map_err(|_| FetchSourceError::InvalidData)?;
        let chats: Vec<Chat> = body
            .chats
            .into_iter()
            .map(|raw| normalize_chat(raw).chat)
            .collect();

        Ok(ChatPage {
            chats,
            has_more: body.has_more,
        })
    }
}

#[async_trait]
impl ConversationSource for HttpApi {
    async fn fetch_conversation(
        &self,
        chat_id: &str,
        scope: ConversationScope,
    ) -> Result<Vec<Message>, FetchSourceError> {
        let mut request = self.get(&format!("/chats/{chat_id}/messages"));
        request = match scope {
            ConversationScope::All => request.query(&[("scope", "all")]),
            ConversationScope::Window { limit, skip } => request.query(&[
                ("limit", limit.to_string().as_str()),
                ("skip", skip.to_string().as_str()),
            ]),
        };

        let response = request
            .send()
            .await
            .map_err(|_| FetchSourceError::Unavailable)?;
        if !response.status().is_success() {
            return Err(map_response_error(response.status()));
        }

        let body: RawConversationResponse = response
            .json()
            .await
            .map_err(|_| FetchSourceError::InvalidData)?;

        Ok(body.messages.into_iter().map(normalize_message).collect())
    }
}
