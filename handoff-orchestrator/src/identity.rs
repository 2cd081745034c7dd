//! # Worker-Participant Identity Resolution (§4.5)
//!
//! Picks one participant identity string out of a conversation's
//! participant list, given a worker sid and a few naming hints. Priority
//! order is fixed; rule 5 (sole non-customer participant) only applies when
//! exactly one candidate qualifies — ambiguity means "not resolved," not
//! "guess."

use handoff_provider::Participant;

/// Hints available when resolving identity, beyond the provider's
/// participant list itself.
#[derive(Debug, Clone, Default)]
pub struct IdentityHints<'a> {
    pub worker_sid: Option<&'a str>,
    pub worker_name: Option<&'a str>,
    pub customer_address: Option<&'a str>,
    pub customer_from: Option<&'a str>,
}

fn eq_ci_trim(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn is_customer(participant: &Participant, hints: &IdentityHints) -> bool {
    let identity = participant.identity.as_deref();
    let binding = participant.messaging_binding_address.as_deref();
    for candidate in [hints.customer_address, hints.customer_from] {
        let Some(candidate) = candidate else { continue };
        if identity.is_some_and(|i| eq_ci_trim(i, candidate))
            || binding.is_some_and(|b| eq_ci_trim(b, candidate))
        {
            return true;
        }
    }
    false
}

fn attributes_worker_sid(attributes: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(attributes).ok()?;
    for key in ["workerSid", "worker_sid", "worker_id", "workerId"] {
        if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
            return Some(s.to_string());
        }
    }
    None
}

/// Resolve a single worker-participant identity, per §4.5's priority list.
/// Returns `None` when no rule matches (caller decides to warn and retry).
pub fn resolve_worker_identity(participants: &[Participant], hints: &IdentityHints) -> Option<String> {
    // Rule 1: identity == workerSid (case-insensitive, trimmed).
    if let Some(worker_sid) = hints.worker_sid {
        if let Some(p) = participants
            .iter()
            .find(|p| p.identity.as_deref().is_some_and(|i| eq_ci_trim(i, worker_sid)))
        {
            return p.identity.clone();
        }
    }

    // Rule 2: identity == workerName.
    if let Some(worker_name) = hints.worker_name {
        if let Some(p) = participants
            .iter()
            .find(|p| p.identity.as_deref().is_some_and(|i| eq_ci_trim(i, worker_name)))
        {
            return p.identity.clone();
        }
    }

    // Rule 3: attributes JSON contains a workerSid-shaped field equal to workerSid.
    if let Some(worker_sid) = hints.worker_sid {
        if let Some(p) = participants.iter().find(|p| {
            p.attributes
                .as_deref()
                .and_then(attributes_worker_sid)
                .is_some_and(|found| eq_ci_trim(&found, worker_sid))
        }) {
            return p.identity.clone();
        }
    }

    // Rule 4: raw attributes string contains workerSid as a substring.
    if let Some(worker_sid) = hints.worker_sid {
        if let Some(p) = participants
            .iter()
            .find(|p| p.attributes.as_deref().is_some_and(|raw| raw.contains(worker_sid)))
        {
            return p.identity.clone();
        }
    }

    // Rule 5: exactly one non-customer candidate.
    let mut non_customers = participants.iter().filter(|p| !is_customer(p, hints));
    let first = non_customers.next()?;
    if non_customers.next().is_some() {
        return None;
    }
    first.identity.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(identity: Option<&str>, binding: Option<&str>, attributes: Option<&str>) -> Participant {
        Participant {
            identity: identity.map(str::to_string),
            messaging_binding_address: binding.map(str::to_string),
            attributes: attributes.map(str::to_string),
        }
    }

    #[test]
    fn rule1_matches_identity_equal_to_worker_sid_case_insensitive() {
        let participants = vec![
            participant(Some("WK123"), None, None),
            participant(Some("+5511900000000"), None, None),
        ];
        let hints = IdentityHints {
            worker_sid: Some("wk123"),
            ..Default::default()
        };
        assert_eq!(resolve_worker_identity(&participants, &hints), Some("WK123".to_string()));
    }

    #[test]
    fn rule2_falls_back_to_worker_name_match() {
        let participants = vec![participant(Some("Bia"), None, None)];
        let hints = IdentityHints {
            worker_sid: Some("WK999"),
            worker_name: Some("Bia"),
            ..Default::default()
        };
        assert_eq!(resolve_worker_identity(&participants, &hints), Some("Bia".to_string()));
    }

    #[test]
    fn rule3_matches_worker_sid_in_attributes_json() {
        let participants = vec![participant(
            Some("op-identity"),
            None,
            Some(r#"{"worker_sid": "WK123"}"#),
        )];
        let hints = IdentityHints {
            worker_sid: Some("WK123"),
            ..Default::default()
        };
        assert_eq!(
            resolve_worker_identity(&participants, &hints),
            Some("op-identity".to_string())
        );
    }

    #[test]
    fn rule4_matches_worker_sid_as_raw_substring() {
        let participants = vec![participant(
            Some("op-identity"),
            None,
            Some("blob-containing-WK123-somewhere"),
        )];
        let hints = IdentityHints {
            worker_sid: Some("WK123"),
            ..Default::default()
        };
        assert_eq!(
            resolve_worker_identity(&participants, &hints),
            Some("op-identity".to_string())
        );
    }

    #[test]
    fn rule5_resolves_sole_non_customer_candidate() {
        let participants = vec![
            participant(None, Some("+5511900000000"), None),
            participant(Some("op-identity"), None, None),
        ];
        let hints = IdentityHints {
            customer_address: Some("+5511900000000"),
            ..Default::default()
        };
        assert_eq!(
            resolve_worker_identity(&participants, &hints),
            Some("op-identity".to_string())
        );
    }

    #[test]
    fn rule5_refuses_to_guess_with_multiple_non_customer_candidates() {
        let participants = vec![
            participant(None, Some("+5511900000000"), None),
            participant(Some("op-a"), None, None),
            participant(Some("op-b"), None, None),
        ];
        let hints = IdentityHints {
            customer_address: Some("+5511900000000"),
            ..Default::default()
        };
        assert_eq!(resolve_worker_identity(&participants, &hints), None);
    }

    #[test]
    fn no_rule_matches_returns_none() {
        let participants = vec![participant(None, Some("+5511900000000"), None)];
        let hints = IdentityHints {
            customer_address: Some("+5511900000000"),
            ..Default::default()
        };
        assert_eq!(resolve_worker_identity(&participants, &hints), None);
    }
}
