use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use super::gemini::{Content, GenerateRequest, GenerativeClient, Role};
use super::{Model, Plan, Source};

const CHAT_SYSTEM_INSTRUCTION: &str = "You are a helpful and concise chatbot. IMPORTANT: Do not use any markdown formatting like asterisks (*) or hashes (#). Use simple text and line breaks.";

/// A model's reply before it becomes a chat message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
    pub sources: Option<Vec<Source>>,
    pub plan: Option<Plan>,
}

/// Routes prompts to the responder behind each model
///
/// - Gemini Flash: multi-turn chat on the generative API
/// - NexziIvision1o: two-step research (propose a plan, then execute it with search)
/// - InsanityV1, CoreNexzi: local mock responders
pub struct ModelRouter {
    client: Arc<dyn GenerativeClient>,
    mock_delay: Duration,
    chat_history: Mutex<Vec<Content>>,
}

impl ModelRouter {
    pub fn new(client: Arc<dyn GenerativeClient>, mock_delay: Duration) -> Self {
        Self {
            client,
            mock_delay,
            chat_history: Mutex::new(Vec::new()),
        }
    }

    pub async fn send_message(&self, prompt: &str, model: Model) -> Result<ModelResponse> {
        match model {
            Model::Gemini => self.send_to_gemini(prompt).await,
            Model::InsanityV1 => self.send_to_insanity(prompt).await,
            Model::NexziIvision1o => self.propose_research_plan(prompt).await,
            Model::CoreNexzi => self.send_to_core_nexzi(prompt).await,
        }
    }

    /// Forget the Gemini conversation
    pub async fn reset_chat(&self) {
        self.chat_history.lock().await.clear();
    }

    async fn send_to_gemini(&self, prompt: &str) -> Result<ModelResponse> {
        let mut history = self.chat_history.lock().await;

        let mut contents = history.clone();
        contents.push(Content::text(Role::User, prompt));

        let generated = self
            .client
            .generate(GenerateRequest {
                contents: contents.clone(),
                system_instruction: Some(CHAT_SYSTEM_INSTRUCTION.to_string()),
                google_search: false,
            })
            .await?;

        // Only successful exchanges become part of the conversation
        contents.push(Content::text(Role::Model, generated.text.clone()));
        *history = contents;

        Ok(ModelResponse {
            text: generated.text,
            ..ModelResponse::default()
        })
    }

    /// Research step 1: propose a plan without performing it
    async fn propose_research_plan(&self, prompt: &str) -> Result<ModelResponse> {
        info!("Proposing research plan for: {}", prompt);

        let request = format!(
            "You are a research assistant. A user has asked for research on the following topic: \"{prompt}\".\n\
             Your task is to create a structured research plan. Do not perform the research yet, just propose the plan.\n\
             The plan should be a series of clear steps.\n\
             IMPORTANT: Do not use any markdown formatting like asterisks (*) or hashes (#). Use simple text and line breaks."
        );

        let generated = self.client.generate(GenerateRequest::prompt(request)).await?;

        Ok(ModelResponse {
            text: generated.text,
            sources: None,
            plan: Some(Plan {
                original_prompt: prompt.to_string(),
            }),
        })
    }

    /// Research step 2: run the query with web search grounding
    pub async fn execute_research_plan(&self, original_prompt: &str) -> Result<ModelResponse> {
        info!("Executing research plan for: {}", original_prompt);

        let request = format!(
            "You are a research assistant. Execute the following research query based on a Google search: \"{original_prompt}\".\n\
             Provide a comprehensive answer based on the search results.\n\
             IMPORTANT: Do not use any markdown formatting like asterisks (*) or hashes (#). Use simple text and line breaks."
        );

        let generated = self
            .client
            .generate(GenerateRequest {
                google_search: true,
                ..GenerateRequest::prompt(request)
            })
            .await?;

        Ok(ModelResponse {
            text: generated.text,
            sources: Some(unique_sources(generated.sources)),
            plan: None,
        })
    }

    async fn send_to_insanity(&self, prompt: &str) -> Result<ModelResponse> {
        info!("Sending to mock InsanityV1 (Coding): {}", prompt);
        tokio::time::sleep(self.mock_delay).await;

        Ok(ModelResponse {
            text: format!(
                "// Mock response from InsanityV1 for your prompt:\n// \"{prompt}\"\n\n\
                 function helloWorld() {{\n  console.log(\"Hello, World!\");\n}}\n\nhelloWorld();"
            ),
            ..ModelResponse::default()
        })
    }

    async fn send_to_core_nexzi(&self, prompt: &str) -> Result<ModelResponse> {
        info!("Sending to mock CoreNexzi (Complex Tasks): {}", prompt);
        tokio::time::sleep(self.mock_delay).await;

        Ok(ModelResponse {
            text: format!(
                "Analyzing the complex task: \"{prompt}\"\n\n\
                 Here is a detailed breakdown:\n\
                 - Step 1: Deconstruct the primary components of the request.\n\
                 - Step 2: Analyze the interdependencies and potential challenges.\n\
                 - Step 3: Formulate a multi-faceted solution strategy.\n\n\
                 Conclusion: The task is feasible with the right approach."
            ),
            ..ModelResponse::default()
        })
    }
}

/// One source per URI, in first-seen order; a later duplicate replaces the
/// earlier entry's title
pub fn unique_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Source> = Vec::new();
    for source in sources {
        match index.get(&source.uri) {
            Some(&at) => unique[at] = source,
            None => {
                index.insert(source.uri.clone(), unique.len());
                unique.push(source);
            }
        }
    }
    unique
}
