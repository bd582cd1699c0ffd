//! Local token counting, used both to answer `count-tokens` requests
//! without an upstream round trip and to estimate prompt size for
//! rate-limit accounting before a request is dispatched.
//!
//! Every provider gets the same counting behavior: an exact count isn't
//! possible without each vendor's own tokenizer, so we standardize on
//! `cl100k_base` (GPT-4/3.5's encoding) as a consistent approximation,
//! the same tradeoff the wider ecosystem makes when counting tokens for
//! non-OpenAI models.

use schema::message::UnifiedMessage;
use schema::request::CountTokensInput;
use schema::ErrorField;
use tiktoken_rs::CoreBPE;

/// Counts tokens in a single string using the shared `cl100k_base`
/// encoding.
pub fn count_text(bpe: &CoreBPE, text: &str) -> usize {
    bpe.encode_ordinary(text).len()
}

/// Counts tokens across a chat-style message list, approximating the
/// per-message overhead (role + separators) OpenAI's own guidance uses:
/// 4 tokens of framing per message plus the rendered content.
pub fn count_messages(bpe: &CoreBPE, messages: &[UnifiedMessage]) -> usize {
    messages.iter().map(|message| 4 + count_text(bpe, &message.content.as_text())).sum()
}

pub fn count_tokens(input: &CountTokensInput) -> Result<usize, ErrorField> {
    let bpe = tiktoken_rs::cl100k_base().map_err(|err| ErrorField::new(schema::ErrorCategory::BifrostInternal, format!("failed to load tokenizer: {err}")))?;
    Ok(count_messages(&bpe, &input.messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::message::UnifiedRole;

    #[test]
    fn counts_grow_with_message_count() {
        let bpe = tiktoken_rs::cl100k_base().unwrap();
        let one = vec![UnifiedMessage::text(UnifiedRole::User, "hello there")];
        let two = vec![
            UnifiedMessage::text(UnifiedRole::User, "hello there"),
            UnifiedMessage::text(UnifiedRole::Assistant, "hello there"),
        ];
        assert!(count_messages(&bpe, &two) > count_messages(&bpe, &one));
    }

    #[test]
    fn empty_text_has_zero_tokens() {
        let bpe = tiktoken_rs::cl100k_base().unwrap();
        assert_eq!(count_text(&bpe, ""), 0);
    }
}
