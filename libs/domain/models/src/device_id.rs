// [libs/domain/models/src/device_id.rs]
//! Device id generator and validator (§6.3). Derives an id from hostname
//! when none is configured, using a short random disambiguator in place
//! of a hardware MAC — reading one portably would mean pulling in extra
//! platform dependencies for a detail this deployment doesn't need.

use rand::Rng;

/// `^[A-Za-z][A-Za-z0-9_-]{0,63}$`
pub fn is_valid_device_id(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() {
        return false;
    }
    candidate.len() <= 64
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn sanitize_hostname(hostname: &str) -> String {
    let sanitized: String = hostname
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    sanitized.trim_matches('-').to_lowercase()
}

/// Produces `<role>-<sanitized-hostname>-<ordinal>`, matching §6.3's
/// disambiguator-from-hostname scheme.
pub fn generate_device_id(role: &str, hostname: &str) -> String {
    let sanitized = sanitize_hostname(hostname);
    let sanitized = if sanitized.is_empty() { "host".to_string() } else { sanitized };
    let ordinal: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{role}-{sanitized}-{ordinal:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid() {
        for _ in 0..50 {
            let id = generate_device_id("worker", "some.Weird_Host!!42");
            assert!(is_valid_device_id(&id), "invalid id: {id}");
        }
    }

    #[test]
    fn validator_rejects_leading_digit_and_oversize() {
        assert!(!is_valid_device_id("1worker-a"));
        assert!(!is_valid_device_id(""));
        assert!(!is_valid_device_id(&"a".repeat(65)));
        assert!(is_valid_device_id("worker-a_1"));
    }
}
