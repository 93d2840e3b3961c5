//! Agent loop - drives model rounds and tool dispatch

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use sandpit_provider::{FunctionCall, GenerateParams, GenerateResponse, ModelTurn, Provider, Turn};

use crate::context::system_prompt;
use crate::conversation::{Conversation, IterationBudget};
use crate::tools::{Sandbox, ToolRegistry};
use crate::AgentError;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model answered without requesting tools
    Done(String),
    /// The API reported a rate limit or exhausted quota (429)
    RateLimited(String),
    /// A non-retryable provider error
    Failed(String),
    /// Every round was used without a final answer
    BudgetExhausted { iterations: u32 },
}

impl AgentOutcome {
    /// Process exit status for this outcome. A rate-limit stop is not a failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentOutcome::Done(_) | AgentOutcome::RateLimited(_) => 0,
            AgentOutcome::Failed(_) | AgentOutcome::BudgetExhausted { .. } => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Result of one run, including the conversation it produced
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub outcome: AgentOutcome,
    pub conversation: Conversation,
    pub model_calls: u32,
}

enum LoopState {
    AwaitingModel,
    DispatchingTools(Vec<FunctionCall>),
    Finished(AgentOutcome),
}

/// The agent loop processes one prompt and handles tool calls
pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    tools: Arc<ToolRegistry>,
    model: String,
    max_iterations: u32,
    verbose: bool,
}

impl<P: Provider> AgentLoop<P> {
    /// Create a loop over an explicit registry
    pub fn new(provider: P, tools: ToolRegistry, model: String, max_iterations: u32) -> Self {
        Self {
            provider: Arc::new(provider),
            tools: Arc::new(tools),
            model,
            max_iterations,
            verbose: false,
        }
    }

    /// Create a loop with the default toolkit over `sandbox`
    pub fn with_sandbox(provider: P, sandbox: Sandbox, model: String, max_iterations: u32) -> Self {
        Self::new(provider, ToolRegistry::new(sandbox), model, max_iterations)
    }

    /// Print token usage and per-call diagnostics to stdout
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the loop for one prompt
    pub async fn run(&self, prompt: &str) -> AgentRun {
        info!("starting run with budget of {} rounds", self.max_iterations);

        let mut conversation = Conversation::new(prompt);
        let mut budget = IterationBudget::new(self.max_iterations);
        let mut model_calls = 0;
        let mut state = LoopState::AwaitingModel;

        let outcome = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if budget.is_exhausted() {
                        warn!("iteration budget of {} exhausted", budget.limit());
                        break AgentOutcome::BudgetExhausted {
                            iterations: budget.limit(),
                        };
                    }

                    debug!("round {} of {}", budget.used() + 1, budget.limit());
                    model_calls += 1;
                    match self.request(&conversation).await {
                        Ok(response) => Self::accept(response, &mut conversation),
                        Err(e) if e.is_rate_limited() => {
                            warn!("stopping: {}", e);
                            LoopState::Finished(AgentOutcome::RateLimited(e.to_string()))
                        }
                        Err(e) if e.is_retryable() => {
                            warn!("round {} failed, retrying: {}", budget.used() + 1, e);
                            budget.consume();
                            LoopState::AwaitingModel
                        }
                        Err(e) => {
                            error!("fatal provider error: {}", e);
                            LoopState::Finished(AgentOutcome::Failed(e.to_string()))
                        }
                    }
                }
                LoopState::DispatchingTools(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        if self.verbose {
                            println!("Calling function: {}({})", call.name, call.args);
                        } else {
                            println!(" - Calling function: {}", call.name);
                        }

                        let result = self.tools.dispatch(call).await;

                        if self.verbose {
                            println!("-> {}", result.payload);
                        }
                        results.push(result);
                    }
                    conversation.push(Turn::ToolResults(results));
                    budget.consume();
                    LoopState::AwaitingModel
                }
                LoopState::Finished(outcome) => break outcome,
            };
        };

        info!("run finished after {} model calls", model_calls);
        AgentRun {
            outcome,
            conversation,
            model_calls,
        }
    }

    /// One model call; a response without usage metadata counts as malformed
    async fn request(&self, conversation: &Conversation) -> crate::Result<GenerateResponse> {
        let tools = self.tools.definitions();
        let params = GenerateParams {
            model: self.model.clone(),
            turns: conversation.turns().to_vec(),
            system_instruction: system_prompt(&tools),
            tools,
        };

        let response = self.provider.generate(params).await?;
        let usage = response.usage.ok_or(AgentError::MissingUsage)?;

        if self.verbose {
            println!("Prompt tokens: {}", usage.prompt_tokens);
            println!("Response tokens: {}", usage.response_tokens);
        }
        Ok(response)
    }

    fn accept(response: GenerateResponse, conversation: &mut Conversation) -> LoopState {
        if response.has_function_calls() {
            if let Some(text) = &response.text {
                debug!("model commentary alongside calls: {}", text);
            }
            let calls = response.function_calls;
            conversation.push(Turn::Model(ModelTurn::Calls(calls.clone())));
            LoopState::DispatchingTools(calls)
        } else {
            let text = response.text.unwrap_or_default();
            conversation.push(Turn::Model(ModelTurn::Text(text.clone())));
            LoopState::Finished(AgentOutcome::Done(text))
        }
    }
}
