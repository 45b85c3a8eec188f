//! Context builder — assembles the message list sent to the provider.
//!
//! The system prompt layers identity, workspace location, current time,
//! available tools, the rolling conversation summary, and the originating
//! channel, then the stored history and the fresh user message follow.

use chrono::Local;
use std::path::PathBuf;

use hermitclaw_core::message::Message;

pub struct ContextBuilder {
    workspace: PathBuf,
    agent_name: String,
    tool_names: Vec<String>,
}

impl ContextBuilder {
    pub fn new(workspace: impl Into<PathBuf>, agent_name: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            agent_name: agent_name.into(),
            tool_names: Vec::new(),
        }
    }

    /// Record the registered tool names for the system prompt.
    pub fn with_tools(mut self, tool_names: Vec<String>) -> Self {
        self.tool_names = tool_names;
        self
    }

    /// Build the system prompt for one turn.
    pub fn build_system_prompt(&self, summary: &str, channel: &str, chat_id: &str) -> String {
        let mut prompt = format!(
            "You are {}, a personal AI agent. You run as a single local process \
             and talk to your user over chat channels.\n\n\
             Workspace: {}\n\
             Current time: {}\n",
            self.agent_name,
            self.workspace.display(),
            Local::now().format("%Y-%m-%d %H:%M:%S %Z"),
        );

        if !channel.is_empty() {
            prompt.push_str(&format!("Current channel: {channel} (chat {chat_id})\n"));
        }

        if !self.tool_names.is_empty() {
            prompt.push_str(&format!(
                "\nAvailable tools: {}.\n\
                 Use tools when they help accomplish the task. Use the message tool \
                 for progress updates during long work.\n",
                self.tool_names.join(", ")
            ));
        }

        if !summary.is_empty() {
            prompt.push_str(&format!(
                "\n## Conversation summary\nEarlier parts of this conversation were \
                 summarized:\n{summary}\n"
            ));
        }

        prompt
    }

    /// Build the full provider message list:
    /// `[system, …history, user]`.
    pub fn build_messages(
        &self,
        history: &[Message],
        summary: &str,
        user_message: &str,
        channel: &str,
        chat_id: &str,
    ) -> Vec<Message> {
        let mut messages =
            Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.build_system_prompt(summary, channel, chat_id)));
        messages.extend_from_slice(history);
        messages.push(Message::user(user_message));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermitclaw_core::message::Role;

    fn builder() -> ContextBuilder {
        ContextBuilder::new("/tmp/ws", "Hermit")
            .with_tools(vec!["exec".into(), "message".into(), "read_file".into()])
    }

    #[test]
    fn message_list_shape() {
        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let messages = builder().build_messages(&history, "", "what now?", "cli", "direct");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "earlier");
        assert_eq!(messages[3].role, Role::User);
        assert_eq!(messages[3].content, "what now?");
    }

    #[test]
    fn system_prompt_includes_summary_when_present() {
        let prompt = builder().build_system_prompt("user likes terse answers", "cli", "direct");
        assert!(prompt.contains("Conversation summary"));
        assert!(prompt.contains("user likes terse answers"));

        let without = builder().build_system_prompt("", "cli", "direct");
        assert!(!without.contains("Conversation summary"));
    }

    #[test]
    fn system_prompt_lists_tools_and_channel() {
        let prompt = builder().build_system_prompt("", "telegram", "42");
        assert!(prompt.contains("exec"));
        assert!(prompt.contains("telegram"));
        assert!(prompt.contains("Hermit"));
    }
}
