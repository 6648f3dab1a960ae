use crate::types::Prompt;

/// Prompts carrying at least one of `tags` (any prompt when `tags` is empty)
/// whose title or content contains `query`, ignoring case. Results keep
/// collection order.
pub fn search<'a, T: AsRef<str>>(prompts: &'a [Prompt], query: &str, tags: &[T]) -> Vec<&'a Prompt> {
    let needle = query.trim().to_lowercase();
    prompts
        .iter()
        .filter(|p| tags.is_empty() || p.has_any_tag(tags))
        .filter(|p| needle.is_empty() || matches_text(p, &needle))
        .collect()
}

fn matches_text(prompt: &Prompt, needle: &str) -> bool {
    prompt.title.to_lowercase().contains(needle) || prompt.content.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(id: &str, title: &str, content: &str, tags: &[&str]) -> Prompt {
        Prompt {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn ids(found: Vec<&Prompt>) -> Vec<&str> {
        found.into_iter().map(|p| p.id.as_str()).collect()
    }

    fn sample() -> Vec<Prompt> {
        vec![
            prompt("1", "Refactor FOO module", "split it", &["Coding & Development"]),
            prompt("2", "Blog post", "write about foo", &["Writing & Content"]),
            prompt("3", "Review", "look for Foo bugs", &["Coding & Development", "Productivity"]),
            prompt("4", "Unit tests", "cover the parser", &["Coding & Development"]),
        ]
    }

    #[test]
    fn tag_and_query_both_apply() {
        let prompts = sample();
        let found = search(&prompts, "foo", &["Coding & Development"]);
        assert_eq!(ids(found), vec!["1", "3"]);
    }

    #[test]
    fn empty_filters_return_everything() {
        let prompts = sample();
        let none: [&str; 0] = [];
        assert_eq!(search(&prompts, "", &none).len(), prompts.len());
        assert_eq!(search(&prompts, "   ", &none).len(), prompts.len());
    }

    #[test]
    fn any_requested_tag_matches() {
        let prompts = sample();
        let found = search(&prompts, "", &["Productivity", "Writing & Content"]);
        assert_eq!(ids(found), vec!["2", "3"]);
    }

    #[test]
    fn query_only_is_case_insensitive() {
        let prompts = sample();
        let none: [&str; 0] = [];
        assert_eq!(ids(search(&prompts, "PARSER", &none)), vec!["4"]);
    }
}
