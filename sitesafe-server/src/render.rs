//! HTML pages
//!
//! Pages are plain server-rendered HTML sharing one layout with the
//! navigation sidebar. Anything that came from a user or the detector is
//! escaped before it is written into a page.

use axum::http::StatusCode;
use sitesafe_eye::{MediaKind, PipelineState, PpeVerdict, RunRecord, VideoVerdictScope};
use std::fmt::Write;

/// Sidebar entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Video,
    Image,
    Blog,
}

impl Page {
    const ALL: [Page; 3] = [Page::Video, Page::Image, Page::Blog];

    fn href(self) -> &'static str {
        match self {
            Page::Video => "/video",
            Page::Image => "/image",
            Page::Blog => "/blog",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Page::Video => "Detection (Video)",
            Page::Image => "Image Detection",
            Page::Blog => "Safety Measures Blog",
        }
    }

    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => Page::Video,
            MediaKind::Image => Page::Image,
        }
    }
}

const STYLE: &str = r#"
body { margin: 0; font-family: sans-serif; display: flex; min-height: 100vh; }
nav { width: 14rem; padding: 1.5rem 1rem; background: #f0f2f6; }
nav h2 { font-size: 1rem; margin-top: 0; }
nav a { display: block; padding: 0.4rem 0; color: #262730; text-decoration: none; }
nav a.active { font-weight: bold; }
main { flex: 1; padding: 2rem 3rem; max-width: 60rem; }
img, video { max-width: 100%; }
.success { background: #e6f4ea; color: #1e7b34; padding: 0.75rem 1rem; border-radius: 0.25rem; }
.warning { background: #fff8e1; color: #8a6d00; padding: 0.75rem 1rem; border-radius: 0.25rem; }
.error { background: #fdecea; color: #b3261e; padding: 0.75rem 1rem; border-radius: 0.25rem; }
.detail { font-family: monospace; font-size: 0.85rem; white-space: pre-wrap; }
figure { margin: 1rem 0; }
figcaption { font-size: 0.85rem; color: #666; }
"#;

/// Wrap `body` in the shared page layout
pub fn layout(title: &str, active: Option<Page>, body: &str) -> String {
    let mut nav = String::new();
    for page in Page::ALL {
        let class = if Some(page) == active { " class=\"active\"" } else { "" };
        let _ = write!(nav, "<a href=\"{}\"{}>{}</a>", page.href(), class, page.label());
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<nav><h2>Navigation</h2>{nav}</nav>\n<main>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape(title),
    )
}

fn title_for(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "PPE Detection on Construction Sites - Video",
        MediaKind::Image => "🦺 PPE Detection System - Image",
    }
}

fn failure_message(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "Error: Could not locate the processed video. Please try again.",
        MediaKind::Image => "Error: Could not process the image. Please try again.",
    }
}

/// Upload form for `kind`
pub fn upload_page(kind: MediaKind, video_scope: VideoVerdictScope) -> String {
    let mut body = String::new();
    let _ = write!(body, "<h1>{}</h1>", escape(title_for(kind)));
    body.push_str(&upload_form(kind));
    if kind == MediaKind::Video && video_scope == VideoVerdictScope::Off {
        body.push_str("<p>PPE checks are reported for images only.</p>");
    }
    layout(title_for(kind), Some(Page::for_kind(kind)), &body)
}

fn upload_form(kind: MediaKind) -> String {
    let (intro, prompt) = match kind {
        MediaKind::Video => (
            "Upload a video file (mp4 or avi) to detect PPE using the YOLO model.",
            "Choose a video file",
        ),
        MediaKind::Image => (
            "Upload an image file (jpg or png) to detect PPE using the YOLO model.",
            "Choose an image file",
        ),
    };
    let accept: Vec<String> = kind.upload_extensions().iter().map(|e| format!(".{}", e)).collect();

    format!(
        "<p>{intro}</p>\n<form method=\"post\" action=\"{action}\" enctype=\"multipart/form-data\">\n<label for=\"file\">{prompt}</label>\n<input type=\"file\" id=\"file\" name=\"file\" accept=\"{accept}\" required>\n<button type=\"submit\">Detect</button>\n</form>",
        action = Page::for_kind(kind).href(),
        accept = accept.join(","),
    )
}

/// Result page for a finished (or failed) run
pub fn result_page(run: &RunRecord) -> String {
    let mut body = String::new();
    let _ = write!(body, "<h1>{}</h1>", escape(title_for(run.kind)));
    body.push_str(&upload_form(run.kind));

    let input = format!("/runs/{}/input", run.id);
    match run.kind {
        MediaKind::Video => {
            body.push_str("<h2>Original Uploaded Video</h2>");
            let _ = write!(body, "<video controls src=\"{}\"></video>", input);
        }
        MediaKind::Image => {
            body.push_str("<h4>📸 Uploaded Image:</h4>");
            let _ = write!(body, "<img src=\"{}\" alt=\"Uploaded image\">", input);
        }
    }

    match run.state {
        PipelineState::Ready => match run.kind {
            MediaKind::Video => video_result(run, &mut body),
            MediaKind::Image => image_result(run, &mut body),
        },
        PipelineState::Failed => {
            let _ = write!(body, "<p class=\"error\">{}</p>", failure_message(run.kind));
            if let Some(error) = &run.error {
                let _ = write!(body, "<p class=\"detail\">{}</p>", escape(error));
            }
        }
        PipelineState::Idle | PipelineState::Processing => {
            let _ = write!(
                body,
                "<p class=\"warning\">Processing, please wait... <a href=\"/api/v1/runs/{}\">status</a></p>",
                run.id
            );
        }
    }

    layout(title_for(run.kind), Some(Page::for_kind(run.kind)), &body)
}

fn video_result(run: &RunRecord, body: &mut String) {
    body.push_str("<p class=\"success\">Video processed successfully!</p>");
    let _ = write!(
        body,
        "<p><a href=\"/runs/{}/download\" download=\"processed_video.mp4\">Download Processed Video</a></p>",
        run.id
    );

    let samples = run
        .result
        .as_ref()
        .map(|r| r.sample_frame_paths.as_slice())
        .unwrap_or_default();
    if samples.is_empty() {
        body.push_str("<p class=\"warning\">No processed images found to display.</p>");
    } else {
        body.push_str("<h2>Sample Processed Images</h2>");
        for (index, path) in samples.iter().enumerate() {
            let caption = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = write!(
                body,
                "<figure><img src=\"/runs/{}/samples/{}\" alt=\"{caption}\"><figcaption>{caption}</figcaption></figure>",
                run.id,
                index,
                caption = escape(&caption),
            );
        }
    }

    if let Some(verdict) = &run.verdict {
        verdict_block(verdict, body);
    }

    body.push_str(RECOMMENDATIONS);
}

fn image_result(run: &RunRecord, body: &mut String) {
    body.push_str("<h4>🔍 Detected Results:</h4>");
    let _ = write!(body, "<img src=\"/runs/{}/output\" alt=\"Detected results\">", run.id);
    if let Some(verdict) = &run.verdict {
        verdict_block(verdict, body);
    }
}

fn verdict_block(verdict: &PpeVerdict, body: &mut String) {
    let class = if verdict.is_compliant() { "success" } else { "error" };
    let _ = write!(body, "<p class=\"{}\">{}</p>", class, escape(&verdict.message()));
}

const RECOMMENDATIONS: &str = "<h2>Recommendations</h2>
<ul>
<li><strong>Lighting &amp; Angle:</strong> Ensure the camera angle and lighting provide a clear view of the personnel.</li>
<li><strong>Model Calibration:</strong> Adjust the detection confidence threshold if you experience too many false positives/negatives.</li>
<li><strong>Training Data:</strong> Consider including more varied examples of PPE in different environments to improve detection accuracy.</li>
<li><strong>Regular Updates:</strong> Update the model periodically with new data to adapt to changing conditions on the site.</li>
</ul>";

/// Page shown for rejected requests
pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<h1>{}</h1>\n<p class=\"error\">{}</p>\n<p><a href=\"/video\">Back to detection</a></p>",
        escape(title),
        escape(message)
    );
    layout(title, None, &body)
}

/// Escape text for use in HTML content and attribute values
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
