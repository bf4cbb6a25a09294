//! SMILES entry form and the prediction results page.

use axum::{extract::State, response::Html, Form};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use cholinease_bioactivity::report::{format_value, PredictionReport, SMILES_HEADER};
use cholinease_bioactivity::SmilesBatch;

use crate::handlers::{describe_error, escape_html};
use crate::state::SharedState;

/// Title block shared by every render of the page
pub const HEADER_HTML: &str = include_str!("../../templates/header.html");

const PLACEHOLDER: &str = "e.g. C1CCCCC1\nCC(=O)O\nO=C(C)O";

#[derive(Debug, Deserialize, Default)]
pub struct PredictForm {
    #[serde(default)]
    pub smiles: String,
    /// Chosen by the page so it can follow progress while the request runs
    #[serde(default)]
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn class(&self) -> &'static str {
        match self {
            Level::Info => "alert-info",
            Level::Success => "alert-success",
            Level::Warning => "alert-warning",
            Level::Error => "alert-danger",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    fn new(level: Level, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }
}

/// Everything the page shows besides its fixed text.
#[derive(Debug, Default)]
pub struct PageView {
    pub java_check: String,
    /// Banner image URL, or the error shown in its place
    pub banner: Option<Result<String, String>>,
    pub max_compounds: usize,
    /// Id the next submission runs under
    pub job_id: Uuid,
    pub smiles_input: String,
    pub notices: Vec<Notice>,
    pub report: Option<PredictionReport>,
}

fn base_view(state: &SharedState) -> PageView {
    let server = &state.config.server;
    let banner = if server.static_dir.join(&server.banner_image).exists() {
        Ok(format!("/static/{}", server.banner_image))
    } else {
        Err(format!(
            "Error: '{}' not found. Please ensure the file exists.",
            server.banner_image
        ))
    };

    PageView {
        java_check: state.java_check.clone(),
        banner: Some(banner),
        max_compounds: state.pipeline.max_compounds(),
        job_id: Uuid::new_v4(),
        ..PageView::default()
    }
}

pub async fn predict_page(State(state): State<SharedState>) -> Html<String> {
    Html(render_page(&base_view(&state)))
}

pub async fn predict_submit(
    State(state): State<SharedState>,
    Form(form): Form<PredictForm>,
) -> Html<String> {
    let mut view = base_view(&state);
    view.smiles_input = form.smiles.clone();

    let batch = match SmilesBatch::parse(&form.smiles, state.pipeline.max_compounds()) {
        Ok(batch) => batch,
        Err(e) => {
            view.notices.push(Notice::new(Level::Warning, describe_error(&e)));
            return Html(render_page(&view));
        }
    };

    if batch.truncated() > 0 {
        view.notices.push(Notice::new(
            Level::Info,
            format!(
                "Only the first {} compounds are predicted; {} were left out.",
                batch.len(),
                batch.truncated()
            ),
        ));
    }

    let job_id = form.job_id.unwrap_or_else(Uuid::new_v4);
    let outcome = state.pipeline.predict_job(job_id, &batch).await;
    for fp in &outcome.fingerprints {
        view.notices.push(Notice::new(Level::Info, format!("Generating descriptors for: {}", fp.fingerprint)));
        let level = if fp.ok { Level::Success } else { Level::Error };
        view.notices.push(Notice::new(level, fp.message.clone()));
    }

    match outcome.result {
        Ok(report) => {
            info!("Job {} predicted {} compounds", outcome.job_id, report.rows.len());
            view.report = Some(report);
        }
        Err(e) => view.notices.push(Notice::new(Level::Error, describe_error(&e))),
    }

    Html(render_page(&view))
}

fn render_report(report: &PredictionReport) -> String {
    let rows: String = report
        .rows
        .iter()
        .map(|row| {
            format!(
                r#"<tr><td>{}</td><td class="smiles">{}</td><td>{}</td></tr>"#,
                row.index,
                escape_html(&row.smiles),
                format_value(row.value)
            )
        })
        .collect();

    let download = match report.download_link() {
        Ok(link) => link,
        Err(e) => format!(
            r#"<div class="alert alert-danger">{}</div>"#,
            escape_html(&describe_error(&e))
        ),
    };

    format!(
        r#"<section class="results">
    <h2><strong>Predicted Output</strong></h2>
    <table class="table">
        <thead><tr><th></th><th>{}</th><th>{}</th></tr></thead>
        <tbody>{}</tbody>
    </table>
    {}
</section>"#,
        SMILES_HEADER,
        escape_html(&report.target),
        rows,
        download
    )
}

pub fn render_page(view: &PageView) -> String {
    let banner = match &view.banner {
        Some(Ok(src)) => format!(r#"<img class="banner" src="{}" alt="Drug discovery">"#, escape_html(src)),
        Some(Err(msg)) => format!(r#"<div class="alert alert-danger">{}</div>"#, escape_html(msg)),
        None => String::new(),
    };

    let notices: String = view
        .notices
        .iter()
        .map(|n| format!(r#"<div class="alert {}">{}</div>"#, n.level.class(), escape_html(&n.message)))
        .collect();

    let results = view.report.as_ref().map(render_report).unwrap_or_default();

    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>CholinEase - Bioactivity Prediction App</title>
    <link rel="stylesheet" href="/static/css/main.css">
</head>
<body>
<main class="main-content">
    <pre class="java-check">Java Check:
{}</pre>
{}
    {}
    <ul>
        <li>App built in <code>Rust</code> + <code>axum</code> by Miron Shah</li>
    </ul>
    <hr>

    <h2>Predict pIC50</h2>
    <form method="POST" action="/predict" id="predict-form">
        <label for="smiles">Please enter SMILES notations below (One per Line, Up to {} Compounds)</label>
        <input type="hidden" name="job_id" value="{}">
        <textarea id="smiles" name="smiles" placeholder="{}">
{}</textarea>
        <button type="submit" class="btn">Predict</button>
    </form>
    <div id="progress"></div>

    {}
    {}
</main>
<script>
document.getElementById('predict-form').addEventListener('submit', function () {{
    var progress = document.getElementById('progress');
    progress.textContent = 'Predicting...';
    var job = this.elements['job_id'].value;
    var source = new EventSource('/api/events?job=' + encodeURIComponent(job));
    source.addEventListener('progress', function (e) {{
        var ev = JSON.parse(e.data);
        if (ev.type === 'fingerprint_started') {{
            progress.textContent = 'Generating descriptors for: ' + ev.fingerprint;
        }} else if (ev.type === 'fingerprint_finished') {{
            progress.textContent = ev.message;
        }} else if (ev.type === 'predicted' || ev.type === 'failed') {{
            source.close();
        }}
    }});
}});
</script>
</body>
</html>"#,
        escape_html(&view.java_check),
        HEADER_HTML,
        banner,
        view.max_compounds,
        view.job_id,
        escape_html(PLACEHOLDER),
        escape_html(&view.smiles_input),
        notices,
        results,
    )
}
