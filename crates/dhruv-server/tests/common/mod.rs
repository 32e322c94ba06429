//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use dhruv_agent::{MemoryClassifier, MemoryExtractor, MemoryPipeline};
use dhruv_llm::{MockBackend, SharedBackend};
use dhruv_server::{AppState, ChatModels, ModelHandle, Server, ServerConfig};
use dhruv_store::{Store, User};
use dhruv_types::UserKind;

/// A server running in the background against an on-disk store.
pub struct TestServer {
    pub addr: SocketAddr,
    /// Token of the default test user.
    pub token: String,
    pub user: User,
    pub store: Arc<Store>,
    pub client: Client,
    _handle: JoinHandle<()>,
    pub temp_dir: TempDir,
}

/// Knobs for [`TestServer::start_with`].
pub struct TestOptions {
    pub chat: MockBackend,
    /// Backend for the memory pipeline; `None` leaves it disabled.
    pub memory: Option<MockBackend>,
    pub config: ServerConfig,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            chat: MockBackend::with_text("Test response"),
            memory: None,
            config: ServerConfig::default().with_request_logging(false),
        }
    }
}

impl TestServer {
    /// Start a server whose chat model answers with `responses` in order.
    pub async fn start_with_responses(responses: Vec<&str>) -> Result<Self> {
        Self::start_with(TestOptions {
            chat: MockBackend::with_texts(responses),
            ..Default::default()
        })
        .await
    }

    pub async fn start() -> Result<Self> {
        Self::start_with(TestOptions::default()).await
    }

    pub async fn start_with(options: TestOptions) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let store = Arc::new(Store::open(temp_dir.path().join("dhruv.db"))?);
        let user = store.create_user("asha@example.com", UserKind::Regular)?;
        let token = store.issue_token(user.id)?;

        let chat: SharedBackend = Arc::new(options.chat);
        let title: SharedBackend = Arc::new(MockBackend::failing("no titles in tests"));
        let models = ChatModels {
            chat: ModelHandle::new(chat.clone(), "mock-chat"),
            reasoning: ModelHandle::new(chat, "mock-reasoning"),
            title: ModelHandle::new(title, "mock-title"),
        };

        let mut state = AppState::new(store.clone(), models, options.config);
        if let Some(memory) = options.memory {
            let backend: SharedBackend = Arc::new(memory);
            state = state.with_memory_pipeline(MemoryPipeline::new(
                MemoryClassifier::new(backend.clone(), "mock-memory"),
                MemoryExtractor::new(backend, "mock-memory"),
                store.clone(),
            ));
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            token,
            user,
            store,
            client,
            _handle: handle,
            temp_dir,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    pub async fn health(&self) -> Result<bool> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url()))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}

/// A `POST /api/chat` body with a single text part.
pub fn chat_body(chat_id: uuid::Uuid, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": chat_id,
        "message": {
            "id": uuid::Uuid::new_v4(),
            "parts": [{"type": "text", "text": text}],
        },
        "selectedChatModel": "chat-model",
        "selectedVisibilityType": "private",
    })
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/ping", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
