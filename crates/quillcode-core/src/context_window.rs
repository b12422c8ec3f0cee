//! Context-window fitting.
//!
//! Before each provider request the history is shrunk to fit the model's
//! context window. The first three messages (the task seed and the opening
//! exchange) are always kept so the model never loses the task statement;
//! beyond that, user/assistant pairs are kept newest-first until the budget
//! runs out. Dropping whole pairs preserves the tool_use/tool_result
//! adjacency the provider requires.

use quillcode_provider::{ContentBlock, Message, ResultContent};

/// Fraction of the window available to the request; the rest is headroom for
/// the response and estimation error.
const WINDOW_FRACTION: f64 = 0.85;

/// Estimated characters per token for prose and JSON.
const CHARS_PER_TOKEN: f64 = 3.5;

/// Flat estimate for an image block.
const IMAGE_TOKENS: u64 = 1028;

/// Flat estimate for an image nested inside a tool result.
const NESTED_IMAGE_TOKENS: u64 = 100;

/// Messages this short are never truncated.
const MIN_UNTRUNCATED: usize = 3;

/// Number of leading messages always kept.
const KEPT_HEAD: usize = 3;

/// Shrink `history` to fit within `context_window` tokens.
///
/// The result is always a prefix-plus-suffix of the input, so fitting an
/// already-fitted history returns it unchanged.
pub fn fit(history: &[Message], context_window: u32) -> Vec<Message> {
    if history.len() <= MIN_UNTRUNCATED {
        return history.to_vec();
    }

    let budget = (f64::from(context_window) * WINDOW_FRACTION).floor() as u64;
    let head = &history[..KEPT_HEAD];
    let tail = &history[KEPT_HEAD..];

    let mut used: u64 = head.iter().map(estimate_tokens).sum();
    let mut kept_from = tail.len();
    let mut index = tail.len();
    while index > 0 {
        let pair_start = index.saturating_sub(2);
        let pair_tokens: u64 = tail[pair_start..index].iter().map(estimate_tokens).sum();
        if used + pair_tokens > budget {
            break;
        }
        used += pair_tokens;
        kept_from = pair_start;
        index = pair_start;
    }

    head.iter().chain(&tail[kept_from..]).cloned().collect()
}

/// Estimate the token footprint of one message.
pub fn estimate_tokens(message: &Message) -> u64 {
    message.content.iter().map(estimate_block).sum()
}

fn estimate_block(block: &ContentBlock) -> u64 {
    match block {
        ContentBlock::Text { text } => chars_to_tokens(text.len()),
        ContentBlock::Image { .. } => IMAGE_TOKENS,
        ContentBlock::ToolUse { id, name, input } => {
            chars_to_tokens(id.len() + name.len() + input.to_string().len())
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => {
            let mut tokens = chars_to_tokens(tool_use_id.len());
            for item in content {
                tokens += match item {
                    ResultContent::Text { text } => chars_to_tokens(text.len()),
                    ResultContent::Image { .. } => NESTED_IMAGE_TOKENS,
                };
            }
            tokens
        }
    }
}

fn chars_to_tokens(chars: usize) -> u64 {
    (chars as f64 / CHARS_PER_TOKEN).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillcode_provider::{ImageSource, Role};

    fn text_message(role: Role, chars: usize) -> Message {
        let text = "x".repeat(chars);
        match role {
            Role::User => Message::user(text),
            Role::Assistant => Message::assistant(text),
        }
    }

    fn alternating(count: usize, chars: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    text_message(Role::User, chars)
                } else {
                    text_message(Role::Assistant, chars)
                }
            })
            .collect()
    }

    #[test]
    fn test_short_history_untouched() {
        let history = alternating(3, 100_000);
        let fitted = fit(&history, 100);
        assert_eq!(fitted.len(), 3);
    }

    #[test]
    fn test_fitting_history_keeps_head_and_newest_pairs() {
        // 3500 chars = 1000 tokens per message. Window 10000 gives a budget
        // of 8500: the head (3000) plus two full pairs (4000) fit, a third
        // pair would not.
        let history = alternating(13, 3500);
        let fitted = fit(&history, 10_000);

        assert_eq!(fitted.len(), 7);
        assert_eq!(fitted[..3], history[..3]);
        assert_eq!(fitted[3..], history[9..]);
    }

    #[test]
    fn test_fitted_history_stays_within_budget() {
        let history = alternating(40, 3500);
        let fitted = fit(&history, 20_000);

        let total: u64 = fitted.iter().map(estimate_tokens).sum();
        assert!(total <= 17_000, "used {total} of a 17000-token budget");
        assert!(fitted.len() < history.len());
    }

    #[test]
    fn test_fit_is_idempotent() {
        let history = alternating(25, 3500);
        let once = fit(&history, 15_000);
        let twice = fit(&once, 15_000);
        assert_eq!(once.len(), twice.len());
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn test_everything_fits_when_window_is_large() {
        let history = alternating(10, 350);
        let fitted = fit(&history, 200_000);
        assert_eq!(fitted.len(), 10);
    }

    #[test]
    fn test_image_blocks_have_flat_cost() {
        let image = Message {
            role: Role::User,
            content: vec![ContentBlock::Image {
                source: ImageSource::Url {
                    url: "https://example.com/a.png".to_string(),
                },
            }],
        };
        assert_eq!(estimate_tokens(&image), 1028);
    }

    #[test]
    fn test_nested_result_image_is_cheap() {
        let message = Message {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: "cal_1".to_string(),
                content: vec![ResultContent::Image {
                    source: ImageSource::Url {
                        url: "https://example.com/shot.png".to_string(),
                    },
                }],
                is_error: None,
            }],
        };
        // id (2 tokens) + nested image (100)
        assert_eq!(estimate_tokens(&message), 102);
    }

    #[test]
    fn test_text_estimate_rounds_up() {
        let message = Message::user("x");
        assert_eq!(estimate_tokens(&message), 1);
    }
}
