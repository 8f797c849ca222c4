use std::sync::Arc;
use tracing::{error, info, warn};

use super::history::HistoryStore;
use super::models::ModelRouter;
use super::{ChatMessage, Model};

/// Chat operations over the router and the history store
pub struct ChatService {
    router: ModelRouter,
    store: Arc<HistoryStore>,
}

impl ChatService {
    pub fn new(router: ModelRouter, store: Arc<HistoryStore>) -> Self {
        Self { router, store }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn history(&self, model: Model) -> Vec<ChatMessage> {
        self.store.history(model)
    }

    /// Send a prompt and record both sides
    ///
    /// Returns the messages appended to the history: the user message and the
    /// reply (or an error message). Blank prompts are ignored.
    pub async fn send_message(&self, model: Model, prompt: &str) -> Vec<ChatMessage> {
        if prompt.trim().is_empty() {
            return Vec::new();
        }

        let user_message = ChatMessage::user(prompt);
        self.store.append(model, vec![user_message.clone()]);

        let reply = match self.router.send_message(prompt, model).await {
            Ok(response) => ChatMessage {
                sources: response.sources,
                plan_executed: response.plan.as_ref().map(|_| false),
                plan: response.plan,
                ..ChatMessage::bot(response.text, model)
            },
            Err(e) => {
                error!("{} failed: {:#}", model, e);
                ChatMessage::error(format!("An error occurred with {}: {}", model, e), model)
            }
        };

        self.store.append(model, vec![reply.clone()]);
        vec![user_message, reply]
    }

    /// Run a previously proposed research plan
    ///
    /// Returns `None` when the message has no plan or it already ran.
    pub async fn execute_plan(&self, model: Model, message_id: u64) -> Option<ChatMessage> {
        let claimed = self.store.update_message(model, message_id, |message| {
            match (&message.plan, message.plan_executed) {
                (Some(plan), executed) if executed != Some(true) => {
                    message.plan_executed = Some(true);
                    Some(plan.original_prompt.clone())
                }
                _ => None,
            }
        });

        let Some(original_prompt) = claimed.flatten() else {
            warn!("Message {} has no pending plan", message_id);
            return None;
        };

        let reply = match self.router.execute_research_plan(&original_prompt).await {
            Ok(response) => ChatMessage {
                sources: response.sources,
                ..ChatMessage::bot(response.text, model)
            },
            Err(e) => {
                error!("Plan execution failed: {:#}", e);
                ChatMessage::error(
                    format!("An error occurred while executing the plan: {}", e),
                    model,
                )
            }
        };

        self.store.append(model, vec![reply.clone()]);
        Some(reply)
    }

    /// Clear a model's history; Gemini Flash also starts a fresh conversation
    pub async fn new_chat(&self, model: Model) {
        if model == Model::Gemini {
            self.router.reset_chat().await;
        }
        self.store.clear(model);
        info!("Started new chat for {}", model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::gemini::{GenerateRequest, Generated, GenerativeClient};
    use crate::chat::{Sender, Source};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingClient {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl GenerativeClient for CountingClient {
        async fn generate(&self, request: GenerateRequest) -> anyhow::Result<Generated> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("quota exceeded");
            }
            let sources = if request.google_search {
                vec![Source {
                    uri: "https://example.com".into(),
                    title: "Example".into(),
                }]
            } else {
                Vec::new()
            };
            Ok(Generated {
                text: "answer".into(),
                sources,
            })
        }
    }

    fn service(fail: bool) -> (ChatService, Arc<CountingClient>) {
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
            fail,
        });
        let router = ModelRouter::new(client.clone(), Duration::ZERO);
        (
            ChatService::new(router, Arc::new(HistoryStore::in_memory())),
            client,
        )
    }

    #[tokio::test]
    async fn test_blank_prompt_ignored() {
        let (service, client) = service(false);
        assert!(service.send_message(Model::Gemini, "   \n").await.is_empty());
        assert!(service.history(Model::Gemini).is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_records_both_sides() {
        let (service, _) = service(false);
        service.send_message(Model::Gemini, "hello").await;

        let history = service.history(Model::Gemini);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sender, Sender::User);
        assert_eq!(history[1].text, "answer");
        assert_eq!(history[1].model, Some(Model::Gemini));
    }

    #[tokio::test]
    async fn test_failure_becomes_error_message() {
        let (service, _) = service(true);
        service.send_message(Model::Gemini, "hello").await;

        let history = service.history(Model::Gemini);
        assert!(history[1].is_error);
        assert_eq!(
            history[1].text,
            "An error occurred with Gemini Flash: quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_plan_executes_once() {
        let (service, client) = service(false);
        let appended = service.send_message(Model::NexziIvision1o, "topic").await;
        let plan_id = appended[1].id;
        assert_eq!(appended[1].plan_executed, Some(false));

        let result = service.execute_plan(Model::NexziIvision1o, plan_id).await.unwrap();
        assert_eq!(result.sources.as_ref().map(Vec::len), Some(1));
        assert!(service.execute_plan(Model::NexziIvision1o, plan_id).await.is_none());

        let history = service.history(Model::NexziIvision1o);
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].plan_executed, Some(true));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_plan_failure_message() {
        let (service, _) = service(false);
        let appended = service.send_message(Model::NexziIvision1o, "topic").await;

        let (failing, _) = self::service(true);
        failing
            .store()
            .append(Model::NexziIvision1o, vec![appended[1].clone()]);
        let reply = failing
            .execute_plan(Model::NexziIvision1o, appended[1].id)
            .await
            .unwrap();

        assert!(reply.is_error);
        assert_eq!(
            reply.text,
            "An error occurred while executing the plan: quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_new_chat_clears_history() {
        let (service, _) = service(false);
        service.send_message(Model::CoreNexzi, "x").await;
        service.new_chat(Model::CoreNexzi).await;
        assert!(service.history(Model::CoreNexzi).is_empty());
    }
}
