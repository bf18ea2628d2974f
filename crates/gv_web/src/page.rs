use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gv_inference::Classification;

pub const PAGE_TITLE: &str = "Grapevine Leaf Classifier";
pub const UPLOAD_PROMPT: &str = "Drag and drop an image here or click to select one";
pub const UPLOAD_SUCCESS: &str = "Image loaded successfully";

/// What to show below the upload form.
pub enum Outcome<'a> {
    Empty,
    Classified {
        classification: &'a Classification,
        chart_svg: &'a str,
    },
    Failed(&'a str),
}

pub fn render_page(outcome: &Outcome<'_>) -> String {
    let body = match outcome {
        Outcome::Empty => String::new(),
        Outcome::Classified {
            classification,
            chart_svg,
        } => render_result(classification, chart_svg),
        Outcome::Failed(message) => format!(
            r#"<div class="error" role="alert">{}</div>"#,
            escape_html(message)
        ),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="icon" href="data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>🍇</text></svg>">
<style>
body {{ font-family: sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; color: #262730; }}
form {{ border: 1px dashed #aaa; border-radius: 8px; padding: 1.5rem; margin: 1.5rem 0; }}
.success {{ background: #e8f9ee; color: #177233; padding: .75rem 1rem; border-radius: 6px; }}
.error {{ background: #ffecec; color: #9b1c1c; padding: .75rem 1rem; border-radius: 6px; }}
figure {{ margin: 1rem 0; }}
figure img {{ width: 100%; height: auto; }}
</style>
</head>
<body>
<h1>🍇 {title}</h1>
<p>This app identifies <strong>diseases in grapevine leaves</strong> from an image.</p>
<form method="post" action="/" enctype="multipart/form-data">
<label for="file">{prompt}</label><br>
<input id="file" type="file" name="file" accept="image/png,image/jpeg" required>
<button type="submit">Classify</button>
</form>
{body}
</body>
</html>
"#,
        title = PAGE_TITLE,
        prompt = UPLOAD_PROMPT,
        body = body,
    )
}

fn render_result(classification: &Classification, chart_svg: &str) -> String {
    let (width, height) = classification.preview_size;
    format!(
        r#"<figure>
<img src="data:image/png;base64,{preview}" width="{width}" height="{height}" alt="Uploaded image">
<figcaption>Uploaded image</figcaption>
</figure>
<div class="success">{success}</div>
<section class="chart">
{chart}
</section>"#,
        preview = STANDARD.encode(&classification.preview_png),
        width = width,
        height = height,
        success = UPLOAD_SUCCESS,
        chart = chart_svg,
    )
}

fn escape_html(text: &str) -> String {
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
