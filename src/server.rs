//! Embedded HTTP server presenting the upload-and-ask interface.
//!
//! Serves a single-page form UI plus a small JSON API: document upload
//! (multipart, multiple PDFs per request), query, and index statistics.
//! Per-document ingest failures are reported inline and never abort the
//! batch or the process.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::rag::{IngestReport, PipelineError, RagEngine};

/// Maximum accepted upload size across all files in one request.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the application router.
pub fn router(engine: Arc<RagEngine>) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/documents", post(upload_documents))
        .route("/api/query", post(run_query))
        .route("/api/stats", get(stats))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Bind and serve until the process exits.
pub async fn serve(engine: Arc<RagEngine>, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(engine)).await
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

/// Per-file result within one upload batch.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentResult {
    source_file: String,
    ok: bool,
    pages: usize,
    chunks: usize,
    skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DocumentResult {
    fn success(report: IngestReport) -> Self {
        Self {
            source_file: report.source_file,
            ok: true,
            pages: report.pages,
            chunks: report.chunks,
            skipped: report.skipped,
            error: None,
        }
    }

    fn failure(source_file: &str, message: String) -> Self {
        Self {
            source_file: source_file.to_string(),
            ok: false,
            pages: 0,
            chunks: 0,
            skipped: false,
            error: Some(message),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    documents: Vec<DocumentResult>,
}

async fn upload_documents(
    State(engine): State<Arc<RagEngine>>,
    mut multipart: Multipart,
) -> Response {
    let mut documents = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload.pdf".to_string());
                let data = match field.bytes().await {
                    Ok(data) => data,
                    Err(e) => {
                        documents
                            .push(DocumentResult::failure(&name, format!("failed to read upload: {e}")));
                        continue;
                    }
                };
                match engine.ingest_pdf(&name, &data).await {
                    Ok(report) => documents.push(DocumentResult::success(report)),
                    Err(e) => {
                        log::warn!("failed to ingest {name}: {e}");
                        documents.push(DocumentResult::failure(&name, e.to_string()));
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid multipart payload: {e}"),
                )
            }
        }
    }

    Json(UploadResponse { documents }).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
}

async fn run_query(
    State(engine): State<Arc<RagEngine>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    match engine.answer(&request.query).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            log::error!("query failed: {e}");
            let status = match e {
                PipelineError::EmptyIndex => StatusCode::CONFLICT,
                PipelineError::Embedding(_) | PipelineError::Model(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, e.to_string())
        }
    }
}

async fn stats(State(engine): State<Arc<RagEngine>>) -> Response {
    match engine.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>lectern</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 44rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
  h1 { font-size: 1.4rem; }
  section { margin: 1.5rem 0; }
  input[type="text"] { width: 70%; padding: 0.4rem; }
  button { padding: 0.4rem 0.9rem; }
  #answer { white-space: pre-wrap; background: #f6f6f6; padding: 0.8rem; border-radius: 4px; }
  #sources li { margin: 0.3rem 0; }
  .error { color: #b00020; }
  .muted { color: #777; font-size: 0.9rem; }
</style>
</head>
<body>
<h1>lectern</h1>
<section>
  <h2>Documents</h2>
  <input type="file" id="files" accept=".pdf,application/pdf" multiple>
  <button id="upload">Upload</button>
  <div id="upload-status" class="muted"></div>
</section>
<section>
  <h2>Ask</h2>
  <input type="text" id="query" placeholder="Ask a question about the uploaded documents">
  <button id="ask">Ask</button>
  <div id="answer"></div>
  <ul id="sources"></ul>
</section>
<script>
const uploadStatus = document.getElementById('upload-status');
const answerBox = document.getElementById('answer');
const sourcesList = document.getElementById('sources');

document.getElementById('upload').addEventListener('click', async () => {
  const files = document.getElementById('files').files;
  if (!files.length) { uploadStatus.textContent = 'Choose at least one PDF first.'; return; }
  const form = new FormData();
  for (const file of files) form.append('documents', file, file.name);
  uploadStatus.textContent = 'Processing…';
  try {
    const resp = await fetch('/api/documents', { method: 'POST', body: form });
    const body = await resp.json();
    if (!resp.ok) { uploadStatus.textContent = body.error; uploadStatus.className = 'error'; return; }
    uploadStatus.className = 'muted';
    uploadStatus.textContent = body.documents.map(d =>
      d.ok ? (d.skipped ? d.sourceFile + ': already indexed'
                        : d.sourceFile + ': ' + d.chunks + ' chunks from ' + d.pages + ' pages')
           : d.sourceFile + ': ' + d.error
    ).join(' · ');
  } catch (e) {
    uploadStatus.textContent = String(e); uploadStatus.className = 'error';
  }
});

document.getElementById('ask').addEventListener('click', async () => {
  const query = document.getElementById('query').value.trim();
  if (!query) return;
  answerBox.textContent = 'Thinking…';
  sourcesList.innerHTML = '';
  try {
    const resp = await fetch('/api/query', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ query })
    });
    const body = await resp.json();
    if (!resp.ok) { answerBox.textContent = body.error; answerBox.className = 'error'; return; }
    answerBox.className = '';
    answerBox.textContent = body.answer;
    for (const source of body.sources) {
      const li = document.createElement('li');
      li.innerHTML = '<strong></strong> (page ' + source.page + ')<br><em></em>';
      li.querySelector('strong').textContent = source.file;
      li.querySelector('em').textContent = source.snippet;
      sourcesList.appendChild(li);
    }
  } catch (e) {
    answerBox.textContent = String(e); answerBox.className = 'error';
  }
});
</script>
</body>
</html>
"#;
