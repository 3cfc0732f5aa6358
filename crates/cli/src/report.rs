use forum_store::model::{Discussion, Post, User};
use forum_store::{ResourceKey, ResourceRegistry};
use serde::Serialize;

const TEXT_PREVIEW_CHARS: usize = 240;

#[derive(Debug, Serialize)]
pub struct ShowOutput {
    pub discussion: DiscussionSummary,
    pub near: Option<u64>,
    pub visible: Option<(u64, u64)>,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Serialize)]
pub struct DiscussionSummary {
    pub id: String,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub comment_count: Option<u64>,
    pub last_post_number: Option<u64>,
    pub last_read_post_number: u64,
}

#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: String,
    pub number: u64,
    pub author: Option<String>,
    pub created_at: Option<String>,
    pub text: String,
}

/// Snapshot of an open discussion page. `None` if the discussion is not in
/// the registry.
pub fn build_show_output(
    registry: &ResourceRegistry,
    discussion: &ResourceKey,
    posts: &[ResourceKey],
    near: Option<u64>,
    visible: Option<(u64, u64)>,
) -> Option<ShowOutput> {
    let entry = registry.get(discussion).and_then(Discussion::from_resource)?;
    let summary = DiscussionSummary {
        id: discussion.id.clone(),
        title: entry.title().map(str::to_string),
        slug: entry.slug().map(str::to_string),
        comment_count: entry.comment_count(),
        last_post_number: entry.last_post_number(),
        last_read_post_number: entry.last_read_post_number(),
    };

    let posts = posts
        .iter()
        .filter_map(|key| {
            let post = registry.get(key).and_then(Post::from_resource)?;
            let author = registry
                .related(key, "user")
                .and_then(User::from_resource)
                .and_then(|user| user.display_name().or(user.username()))
                .map(str::to_string);
            Some(PostSummary {
                id: key.id.clone(),
                number: post.number()?,
                author,
                created_at: post.created_at().map(str::to_string),
                text: truncate_one_line(
                    &strip_html(post.content_html().unwrap_or_default()),
                    TEXT_PREVIEW_CHARS,
                ),
            })
        })
        .collect();

    Some(ShowOutput {
        discussion: summary,
        near,
        visible,
        posts,
    })
}

pub fn render_text(out: &ShowOutput) -> String {
    let discussion = &out.discussion;
    let mut text = String::new();
    text.push_str(&format!(
        "# {} (discussion {}",
        discussion.title.as_deref().unwrap_or("untitled"),
        discussion.id
    ));
    if let Some(slug) = &discussion.slug {
        text.push_str(&format!(", {slug}"));
    }
    text.push_str(")\n");
    text.push_str(&format!(
        "posts: {} | read up to: {}\n\n",
        discussion
            .last_post_number
            .map_or("?".to_string(), |n| n.to_string()),
        discussion.last_read_post_number
    ));

    if out.posts.is_empty() {
        text.push_str("(no posts loaded)\n");
    }
    for post in &out.posts {
        let marker = if out
            .visible
            .is_some_and(|(start, end)| start <= post.number && post.number <= end)
        {
            ">"
        } else {
            " "
        };
        text.push_str(&format!(
            "{marker} #{} {}",
            post.number,
            post.author.as_deref().unwrap_or("[deleted]")
        ));
        if let Some(created_at) = &post.created_at {
            text.push_str(&format!(" | {created_at}"));
        }
        text.push('\n');
        if !post.text.is_empty() {
            text.push_str(&format!("    {}\n", post.text));
        }
    }
    text
}

/// Drops markup and decodes the handful of entities the formatter emits.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forum_store::Store;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> Store {
        let store = Store::new();
        store
            .push_json(&json!({
                "data": {
                    "type": "discussions",
                    "id": "1",
                    "attributes": {"title": "Hello", "slug": "1-hello", "lastPostNumber": 2, "lastReadPostNumber": 1}
                },
                "included": [
                    {"type": "users", "id": "7", "attributes": {"username": "ada", "displayName": "Ada"}},
                    {
                        "type": "posts",
                        "id": "10",
                        "attributes": {"number": 1, "contentHtml": "<p>Hi &amp; welcome</p>\n<p>all</p>", "createdAt": "2024-01-01T00:00:00+00:00"},
                        "relationships": {"user": {"data": {"type": "users", "id": "7"}}}
                    },
                    {"type": "posts", "id": "11", "attributes": {"number": 2}}
                ]
            }))
            .expect("document");
        store
    }

    #[test]
    fn output_resolves_authors_and_strips_markup() {
        let store = store();
        let posts = [ResourceKey::new("posts", "10"), ResourceKey::new("posts", "11")];
        let out = store
            .read(|registry| {
                build_show_output(
                    registry,
                    &ResourceKey::new("discussions", "1"),
                    &posts,
                    Some(1),
                    Some((1, 1)),
                )
            })
            .expect("output");

        assert_eq!(out.discussion.title.as_deref(), Some("Hello"));
        assert_eq!(out.discussion.last_read_post_number, 1);
        assert_eq!(out.posts.len(), 2);
        assert_eq!(out.posts[0].author.as_deref(), Some("Ada"));
        assert_eq!(out.posts[0].text, "Hi & welcome all");
        assert_eq!(out.posts[1].author, None);

        let text = render_text(&out);
        assert!(text.starts_with("# Hello (discussion 1, 1-hello)\n"));
        assert!(text.contains("> #1 Ada | 2024-01-01T00:00:00+00:00\n    Hi & welcome all\n"));
        assert!(text.contains("  #2 [deleted]\n"));
    }

    #[test]
    fn missing_discussion_has_no_output() {
        let store = Store::new();
        let out = store.read(|registry| {
            build_show_output(registry, &ResourceKey::new("discussions", "9"), &[], None, None)
        });
        assert!(out.is_none());
    }

    #[test]
    fn long_text_is_truncated_on_one_line() {
        let text = truncate_one_line("a\n\nb   c", 10);
        assert_eq!(text, "a b c");
        let long = "x".repeat(20);
        assert_eq!(truncate_one_line(&long, 5).chars().count(), 5);
    }
}
