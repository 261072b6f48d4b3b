//! Ordered policy attachment for applications.

use crate::cloudflare::types::PolicyLink;

/// Attach policies in reference order: the first ID gets precedence 1
pub fn policy_links(ids: &[String]) -> Vec<PolicyLink> {
    ids.iter()
        .zip(1u32..)
        .map(|(id, precedence)| PolicyLink {
            id: id.clone(),
            precedence,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_follows_reference_order() {
        let links = policy_links(&["a".to_string(), "b".to_string(), "c".to_string()]);
        let pairs: Vec<(&str, u32)> = links
            .iter()
            .map(|link| (link.id.as_str(), link.precedence))
            .collect();
        assert_eq!(pairs, vec![("a", 1), ("b", 2), ("c", 3)]);
    }

    #[test]
    fn test_no_policies() {
        assert!(policy_links(&[]).is_empty());
    }
}
