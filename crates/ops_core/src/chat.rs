//! Keyword-matching advisory responder.

use crate::{ChatExchange, DashboardContent, DashboardState};

const STAFF_KEYWORDS: &[&str] = &["staff", "employee", "team"];
const MONEY_KEYWORDS: &[&str] = &["money", "savings", "profit"];
const MACHINE_KEYWORDS: &[&str] = &["machine", "broken", "status"];

pub const HELP_REPLY: &str =
    "I can answer questions about: Staff Fatigue, Machine Status, or Savings.";

/// Canned reply for `question`, referencing current state. Stateless.
pub fn respond(question: &str, state: &DashboardState, content: &DashboardContent) -> String {
    let question = question.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| question.contains(k));
    let constants = &content.constants;

    if mentions(STAFF_KEYWORDS) {
        return match state
            .staff
            .iter()
            .find(|member| member.fatigue > constants.fatigue_risk_threshold)
        {
            Some(tired) => format!(
                "Warning: {} is very tired ({:.0}% fatigue).",
                tired.name, tired.fatigue
            ),
            None => "Your team is doing great. No high fatigue detected.".to_string(),
        };
    }
    if mentions(MONEY_KEYWORDS) {
        return format!(
            "We have saved {} so far.",
            crate::format_currency(state.savings)
        );
    }
    if mentions(MACHINE_KEYWORDS) {
        return match state
            .assets
            .iter()
            .find(|asset| asset.health < constants.health_risk_threshold)
        {
            Some(broken) => format!(
                "Alert: {} is in bad health ({:.0}%). Fix it in Maintenance.",
                broken.name,
                broken.health.floor()
            ),
            None => "All machines are running normally.".to_string(),
        };
    }
    HELP_REPLY.to_string()
}

/// Answer a submitted message and remember it as the last exchange.
/// Blank input is ignored.
pub fn send_chat_message(
    state: &mut DashboardState,
    content: &DashboardContent,
    text: &str,
) -> Option<ChatExchange> {
    let question = text.trim();
    if question.is_empty() {
        return None;
    }
    let exchange = ChatExchange {
        question: question.to_string(),
        reply: respond(question, state, content),
    };
    state.chat = Some(exchange.clone());
    Some(exchange)
}
