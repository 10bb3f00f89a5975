//! Reply strategies for the conversation store.
//!
//! [`CannedResponder`] stands in for a backend: keyword matching with a
//! random generic fallback. A networked responder implements the same trait.

use async_trait::async_trait;
use rand::seq::SliceRandom;

/// Produces the system reply to the latest user message.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, last_user_message: &str) -> String;
}

pub const GREETING_REPLY: &str = "Hello! Welcome to our chat support. How can I assist you today?";
pub const HELP_REPLY: &str = "I'm here to help! What can I assist you with today?";
pub const PRICING_REPLY: &str =
    "I'd be happy to help you with pricing information. What specific product or service are you interested in?";
pub const GRATITUDE_REPLY: &str = "You're very welcome! Is there anything else I can help you with?";

pub const GENERIC_REPLIES: [&str; 5] = [
    "Thanks for your message! I'm here to help you with any questions you have.",
    "I understand your concern. Let me help you find the right solution.",
    "That's a great question! I'd be happy to assist you with that.",
    "I can definitely help you with that. What specific information are you looking for?",
    "Thanks for reaching out! I'm here to provide you with the support you need.",
];

/// Keyword groups, checked in order; first hit wins.
const KEYWORD_REPLIES: [(&[&str], &str); 4] = [
    (&["hello", "hi"], GREETING_REPLY),
    (&["help"], HELP_REPLY),
    (&["price", "cost"], PRICING_REPLY),
    (&["thanks", "thank you"], GRATITUDE_REPLY),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CannedResponder;

impl CannedResponder {
    pub fn new() -> Self {
        Self
    }

    /// Substring match on the lower-cased message, so "hi" also matches
    /// inside longer words.
    pub fn reply_for(message: &str) -> &'static str {
        let lower = message.to_lowercase();
        KEYWORD_REPLIES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(_, reply)| *reply)
            .unwrap_or_else(|| {
                GENERIC_REPLIES
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(GENERIC_REPLIES[0])
            })
    }
}

#[async_trait]
impl Responder for CannedResponder {
    async fn respond(&self, last_user_message: &str) -> String {
        Self::reply_for(last_user_message).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_replies() {
        assert_eq!(CannedResponder::reply_for("hello there"), GREETING_REPLY);
        assert_eq!(CannedResponder::reply_for("HI"), GREETING_REPLY);
        assert_eq!(CannedResponder::reply_for("I need help"), HELP_REPLY);
        assert_eq!(CannedResponder::reply_for("what does it cost"), PRICING_REPLY);
        assert_eq!(CannedResponder::reply_for("Price list?"), PRICING_REPLY);
        assert_eq!(CannedResponder::reply_for("thanks a lot"), GRATITUDE_REPLY);
    }

    #[test]
    fn test_keyword_precedence() {
        // Greeting is checked before pricing
        assert_eq!(CannedResponder::reply_for("hello, what's the price"), GREETING_REPLY);
        assert_eq!(CannedResponder::reply_for("help with cost"), HELP_REPLY);
    }

    #[test]
    fn test_fallback_is_from_generic_pool() {
        for _ in 0..50 {
            let reply = CannedResponder::reply_for("xyz");
            assert!(GENERIC_REPLIES.contains(&reply));
        }
    }

    #[tokio::test]
    async fn test_responder_trait() {
        let responder: Box<dyn Responder> = Box::new(CannedResponder::new());
        assert_eq!(responder.respond("hello").await, GREETING_REPLY);
    }
}
