//! Routing key convention shared by publishers and subscribers.
//!
//! Publishers and subscribers are deployed independently, so the mapping from
//! a message type to its topic must be deterministic and stable.

/// Suffixes dropped from a type name before it becomes a topic.
const STRIPPED_SUFFIXES: [&str; 3] = ["IntegrationEvent", "Event", "Request"];

/// Returns the topic for a message type, derived from its type name.
pub fn topic_for<T: ?Sized>() -> String {
    topic_from_type_name(std::any::type_name::<T>())
}

/// Converts a (possibly path-qualified, possibly generic) type name into a topic.
///
/// `students::events::UserRegisteredIntegrationEvent` becomes `user.registered`.
pub fn topic_from_type_name(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    let short = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);

    let base = STRIPPED_SUFFIXES
        .iter()
        .find_map(|suffix| short.strip_suffix(suffix).filter(|rest| !rest.is_empty()))
        .unwrap_or(short);

    split_words(base).join(".")
}

fn split_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // "HTTPServer" splits as "http" + "server"
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }

        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserRegisteredIntegrationEvent;
    struct Wrapper<T>(T);

    #[test]
    fn strips_integration_event_suffix() {
        assert_eq!(
            topic_from_type_name("UserRegisteredIntegrationEvent"),
            "user.registered"
        );
    }

    #[test]
    fn strips_module_path() {
        assert_eq!(
            topic_from_type_name("students::events::StudentEnrolledIntegrationEvent"),
            "student.enrolled"
        );
    }

    #[test]
    fn strips_generic_arguments() {
        assert_eq!(
            topic_from_type_name("app::PaymentRequest<app::Money>"),
            "payment"
        );
    }

    #[test]
    fn keeps_name_that_is_only_a_suffix() {
        assert_eq!(topic_from_type_name("Event"), "event");
    }

    #[test]
    fn splits_acronyms() {
        assert_eq!(topic_from_type_name("HTTPServerStarted"), "http.server.started");
    }

    #[test]
    fn splits_snake_case() {
        assert_eq!(topic_from_type_name("course_published"), "course.published");
    }

    #[test]
    fn derives_from_rust_type() {
        assert_eq!(topic_for::<UserRegisteredIntegrationEvent>(), "user.registered");
        assert_eq!(topic_for::<Wrapper<u8>>(), "wrapper");
    }
}
