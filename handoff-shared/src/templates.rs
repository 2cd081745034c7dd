//! # Message Templates
//!
//! Three pure functions producing the greeting, ping, and closure bodies.
//! The copy is literal and in Portuguese per §6.4 — this is a handoff
//! product for a Brazilian-market messaging deployment, not placeholder
//! text.

/// Greeting sent once a handoff is assigned and ready to notify the
/// customer. `operator` is the display name of the operator taking over;
/// flex tasks always have one (resolved via worker identity), internal
/// tasks require `operatorName` to be set before `startHandoff`/auto
/// processing sends it.
pub fn greeting_body(customer: &str, operator: &str) -> String {
    format!("Olá, {customer}. Meu nome é {operator} e irei dar continuidade ao seu atendimento.😉❤")
}

/// Sent at T+5s after the greeting if the customer hasn't replied.
pub fn ping_body(customer: &str) -> String {
    format!("Olá, {customer}. Você ainda está no chat?")
}

/// Sent at T+30s after the greeting (or ping) if the customer still hasn't
/// replied; the conversation is torn down immediately after.
pub fn closure_body(customer: &str) -> String {
    format!(
        "Olá, {customer}. Identificamos que você está inativo e seu chat será encerrado por inatividade."
    )
}
