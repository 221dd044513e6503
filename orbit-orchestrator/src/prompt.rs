//! ABOUTME: Prompt assembly - merged context + chat history collapsed into one completion prompt

use orbit_core::ContextItem;

use crate::types::ChatMessage;

const NO_CONTEXT_NOTE: &str = "(no retrieved context for this turn)";

/// Builds the single prompt string handed to the inference provider. There's
/// no tool-call loop here - one prompt in, one completion out (streamed or
/// not) - so history and context are flattened into plain text rather than
/// a structured message array.
#[must_use]
pub fn assemble(history: &[ChatMessage], context: &[ContextItem]) -> String {
    format!(
        "# Role\n\n\
        You are a helpful assistant. Answer the user's latest message using the \
        retrieved context below when it is relevant; say so plainly when the \
        context doesn't answer the question instead of guessing.\n\n\
        # Retrieved Context\n\n\
        {}\n\n\
        # Conversation\n\n\
        {}",
        render_context(context),
        render_history(history),
    )
}

fn render_context(context: &[ContextItem]) -> String {
    if context.is_empty() {
        return NO_CONTEXT_NOTE.to_string();
    }
    context
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let source = item.source_adapter.as_deref().unwrap_or("unknown");
            format!("{}. [{source}, confidence {:.2}] {}", i + 1, item.confidence(), item.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_history(history: &[ChatMessage]) -> String {
    history.iter().map(|m| format!("{}: {}", m.role, m.content)).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_renders_a_placeholder_not_an_empty_section() {
        let prompt = assemble(&[ChatMessage::user("hi")], &[]);
        assert!(prompt.contains(NO_CONTEXT_NOTE));
    }

    #[test]
    fn context_items_are_numbered_and_carry_their_source_adapter() {
        let items = vec![ContextItem::new("paris is the capital", 0.9).with_source_adapter("kb")];
        let prompt = assemble(&[], &items);
        assert!(prompt.contains("1. [kb, confidence 0.90] paris is the capital"));
    }

    #[test]
    fn history_is_rendered_in_order_with_roles() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let prompt = assemble(&history, &[]);
        let user_pos = prompt.find("user: hi").unwrap();
        let assistant_pos = prompt.find("assistant: hello").unwrap();
        assert!(user_pos < assistant_pos);
    }
}
