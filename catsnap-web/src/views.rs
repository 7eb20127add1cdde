//! HTML rendering for formatted routes

use axum::http::StatusCode;
use std::fmt::Write;

use crate::api::albums::AlbumView;
use crate::api::find::FoundImage;
use crate::api::images::ImageView;

/// Escape text for use in HTML bodies and attribute values
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - catsnap</title>
    <style>
        body {{ font-family: system-ui, -apple-system, sans-serif; max-width: 960px; margin: 40px auto; padding: 0 20px; }}
        h1 {{ color: #333; border-bottom: 2px solid #0066cc; padding-bottom: 10px; }}
        .images {{ display: flex; flex-wrap: wrap; gap: 16px; }}
        .image img {{ max-width: 280px; max-height: 280px; }}
        .tags {{ color: #666; font-size: 0.9em; }}
        .error {{ color: #b00020; }}
    </style>
</head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    page(
        title,
        &format!(r#"<p class="error">{}</p>"#, escape(message)),
    )
}

/// Search results; tags are shown joined with spaces
pub fn find_page(tags: &[String], images: &[FoundImage]) -> String {
    let mut body = String::new();
    if images.is_empty() {
        body.push_str("<p>No images found.</p>\n");
    }

    body.push_str("<div class=\"images\">\n");
    for image in images {
        let _ = writeln!(
            body,
            r#"<div class="image"><a href="{url}"><img src="{src}"></a><div class="tags">{tags}</div></div>"#,
            url = escape(&image.url),
            src = escape(&image.source_url),
            tags = escape(&image.tags.join(" ")),
        );
    }
    body.push_str("</div>\n");

    page(&format!("Images tagged {}", tags.join(" ")), &body)
}

pub fn image_page(image: &ImageView) -> String {
    let title = image.title.clone().unwrap_or_else(|| image.filename.clone());

    let mut body = format!(
        r#"<div class="image"><img src="{}"></div>"#,
        escape(&image.source_url)
    );
    if let Some(description) = &image.description {
        let _ = write!(body, "\n<p>{}</p>", escape(description));
    }
    let _ = write!(
        body,
        "\n<p class=\"tags\">{}</p>",
        escape(&image.tags.join(" "))
    );
    if let Some(album) = &image.album {
        let _ = write!(
            body,
            "\n<p>Album: <a href=\"/album/{}\">{}</a></p>",
            album.album_id,
            escape(&album.name)
        );
    }

    page(&title, &body)
}

pub fn album_page(album: &AlbumView) -> String {
    let mut body = String::from("<div class=\"images\">\n");
    for image in &album.images {
        let _ = writeln!(
            body,
            r#"<div class="image"><a href="{url}"><img src="{src}"></a></div>"#,
            url = escape(&image.url),
            src = escape(&image.source_url),
        );
    }
    body.push_str("</div>\n");

    page(&album.name, &body)
}

pub fn added_page(image_url: &str, source_url: &str) -> String {
    page(
        "Image added",
        &format!(
            r#"<div class="image"><a href="{}"><img src="{}"></a></div>"#,
            escape(image_url),
            escape(source_url)
        ),
    )
}
