//! Blog post model

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Format of the `date` column, e.g. "October 19, 2026".
pub const POST_DATE_FORMAT: &str = "%B %d, %Y";

/// Blog post entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: i64,
    /// Title (unique)
    pub title: String,
    pub subtitle: String,
    /// Creation date, stored pre-formatted with [`POST_DATE_FORMAT`]
    pub date: String,
    /// Body as HTML
    pub body: String,
    pub img_url: String,
    pub author_id: i64,
}

impl BlogPost {
    /// Create a new, not yet persisted post stamped with today's date.
    pub fn new(input: PostInput, author_id: i64) -> Self {
        Self {
            id: 0, // Will be set by the database
            title: input.title,
            subtitle: input.subtitle,
            date: Self::format_date(Local::now().date_naive()),
            body: input.body,
            img_url: input.img_url,
            author_id,
        }
    }

    /// Format a calendar date the way it is stored on posts.
    pub fn format_date(date: NaiveDate) -> String {
        date.format(POST_DATE_FORMAT).to_string()
    }

    /// Overwrite the editable fields. Id, date and author are preserved.
    pub fn apply(&mut self, input: PostInput) {
        self.title = input.title;
        self.subtitle = input.subtitle;
        self.body = input.body;
        self.img_url = input.img_url;
    }
}

/// Post joined with its author's display name
#[derive(Debug, Clone, Serialize)]
pub struct BlogPostWithAuthor {
    #[serde(flatten)]
    pub post: BlogPost,
    pub author_name: String,
}

/// Editable post fields as submitted by the post form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub img_url: String,
    #[serde(default)]
    pub body: String,
}

impl PostInput {
    pub fn new(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        img_url: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            img_url: img_url.into(),
            body: body.into(),
        }
    }

    /// Copy the editable fields of an existing post, for pre-filling the edit form.
    pub fn from_post(post: &BlogPost) -> Self {
        Self {
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            img_url: post.img_url.clone(),
            body: post.body.clone(),
        }
    }

    /// Trim surrounding whitespace from the single-line fields.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            subtitle: self.subtitle.trim().to_string(),
            img_url: self.img_url.trim().to_string(),
            body: self.body,
        }
    }
}
