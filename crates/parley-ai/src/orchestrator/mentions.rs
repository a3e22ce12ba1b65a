//! `@document` mentions in user input.

/// URI of the document index on a resource session.
pub(crate) const DOCUMENT_INDEX_URI: &str = "docs://documents";

pub(crate) fn document_uri(id: &str) -> String {
    format!("{DOCUMENT_INDEX_URI}/{id}")
}

/// Words of the form `@name`, without the `@`, first occurrence order.
pub(crate) fn extract_mentions(input: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    for word in input.split_whitespace() {
        let Some(name) = word.strip_prefix('@') else {
            continue;
        };
        let name = name.trim_end_matches(|c: char| matches!(c, ',' | '?' | '!' | ';' | ':'));
        if !name.is_empty() && !mentions.iter().any(|m| m == name) {
            mentions.push(name.to_string());
        }
    }
    mentions
}

/// Wrap a query with the content of the documents it mentions.
pub(crate) fn wrap_with_context(query: &str, documents: &[(String, String)]) -> String {
    let context: String = documents
        .iter()
        .map(|(id, content)| format!("<document id=\"{id}\">\n{content}\n</document>\n"))
        .collect();

    format!(
        "The user has a question:\n\
         <query>\n{query}\n</query>\n\n\
         Context that may help answer it:\n\
         <context>\n{context}</context>\n\n\
         Documents are mentioned with a leading \"@\" (\"@report.pdf\" refers to \
         \"report.pdf\"). Documents included above do not need to be read again \
         with a tool. Answer directly and concisely without referring to the \
         provided context."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_mentions_in_order() {
        assert_eq!(
            extract_mentions("compare @b.md with @a.md, and @b.md again"),
            vec!["b.md", "a.md"]
        );
        assert!(extract_mentions("email me at x@y.com").is_empty());
        assert!(extract_mentions("just @").is_empty());
    }

    #[test]
    fn wraps_documents() {
        let wrapped = wrap_with_context(
            "what does @plan.md say?",
            &[("plan.md".into(), "Ship in May.".into())],
        );
        assert!(wrapped.contains("<query>\nwhat does @plan.md say?\n</query>"));
        assert!(wrapped.contains("<document id=\"plan.md\">\nShip in May.\n</document>"));
    }

    #[test]
    fn document_uris() {
        assert_eq!(document_uri("plan.md"), "docs://documents/plan.md");
    }
}
