//! Named agent registry.
//!
//! Agents are declared in a static table at startup; there is no runtime
//! registration. Registration order is user-visible: the unknown-agent
//! error lists names in this order.

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful, honest AI assistant.

Your capabilities:
- Engaging in natural, helpful conversation
- Answering questions clearly and accurately
- Helping with a wide variety of tasks
- Asking clarifying questions when something is ambiguous

Be helpful while staying truthful. If you are unsure about something, say so.";

const RESEARCH_SYSTEM_PROMPT: &str = "\
You are a research assistant that helps users find and synthesize information.

Your capabilities:
- Searching for relevant information with the tools available to you
- Summarizing findings clearly
- Citing sources when available
- Asking clarifying questions when the request is underspecified

Provide accurate, well-organized answers. If you are unsure, say so.";

const CODE_REVIEW_SYSTEM_PROMPT: &str = "\
You are an expert code reviewer. Your role:

1. Analyze code for bugs, security issues, and performance problems
2. Suggest improvements that follow established practice
3. Explain your reasoning clearly
4. Keep feedback constructive and educational

When reviewing code:
- Check for common vulnerabilities (injection, XSS, and similar)
- Identify logic errors and unhandled edge cases
- Suggest cleaner, more readable alternatives
- Note missing error handling";

/// A named, pre-built agent: prompt, tool bundle, model, delivery mode.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    pub name: String,
    pub display_name: String,
    /// Model override; `None` uses the request's model.
    pub model: Option<String>,
    pub system_prompt: String,
    pub tools: Vec<String>,
    /// When false the agent runs the upstream call to completion and
    /// replays the result as a short event burst.
    pub streaming: bool,
}

/// Process-wide map of agent name to descriptor. Ordered, immutable.
pub struct AgentRegistry {
    agents: Vec<AgentDescriptor>,
}

impl AgentRegistry {
    /// The agents shipped by default: `main`, `research`, `code_review`.
    pub fn builtin() -> Self {
        Self {
            agents: vec![
                AgentDescriptor {
                    name: "main".into(),
                    display_name: "General assistant".into(),
                    model: None,
                    system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
                    tools: Vec::new(),
                    streaming: true,
                },
                AgentDescriptor {
                    name: "research".into(),
                    display_name: "Research assistant".into(),
                    model: None,
                    system_prompt: RESEARCH_SYSTEM_PROMPT.into(),
                    tools: vec!["searchNotes".into()],
                    streaming: true,
                },
                AgentDescriptor {
                    name: "code_review".into(),
                    display_name: "Code reviewer".into(),
                    model: None,
                    system_prompt: CODE_REVIEW_SYSTEM_PROMPT.into(),
                    tools: vec!["analyzeComplexity".into()],
                    streaming: false,
                },
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    /// In-band error text for a lookup miss, listing what is available.
    pub fn unknown_agent_message(&self, name: &str) -> String {
        format!(
            "unknown agent '{name}'; available: [{}]",
            self.names().join(", ")
        )
    }
}
