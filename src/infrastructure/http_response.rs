// HTTP response utilities for exported documents: Brotli and chunked delivery
use crate::domain::document::ComposedDocument;
use async_compression::tokio::bufread::BrotliEncoder;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Response, StatusCode},
};
use bytes::Bytes;
use tokio::io::AsyncReadExt;

/// True when `Accept-Encoding` lists `br` without a zero quality.
pub fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| {
            let mut parts = token.split(';').map(str::trim);
            let coding = parts.next().unwrap_or_default();
            let quality = parts
                .find_map(|p| p.strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            coding.eq_ignore_ascii_case("br") && quality > 0.0
        })
}

/// `attachment` disposition with an ASCII fallback name and the exact
/// UTF-8 name in `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

async fn brotli(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = BrotliEncoder::new(data);
    let mut compressed = Vec::with_capacity(data.len() / 2);
    encoder.read_to_end(&mut compressed).await?;
    Ok(compressed)
}

/// Body that yields `bytes` in slices of at most `chunk_size`.
fn chunked_body(bytes: Bytes, chunk_size: usize) -> Body {
    let chunk_size = chunk_size.max(1);
    let stream = async_stream::stream! {
        let mut offset = 0;
        while offset < bytes.len() {
            let end = (offset + chunk_size).min(bytes.len());
            yield Ok::<Bytes, std::io::Error>(bytes.slice(offset..end));
            offset = end;
        }
    };
    Body::from_stream(stream)
}

/// Build the download response for a composed document. Bodies larger than
/// `chunk_size` are streamed with chunked transfer encoding.
pub async fn document_response(
    document: ComposedDocument,
    compress: bool,
    chunk_size: usize,
) -> Result<Response<Body>, StatusCode> {
    let original = document.len();
    let (body_bytes, content_encoding) = if compress {
        let compressed = brotli(&document.bytes).await.map_err(|e| {
            tracing::error!(error = %e, "brotli compression failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tracing::debug!(original, compressed = compressed.len(), "compressed document");
        (Bytes::from(compressed), Some("br"))
    } else {
        (document.bytes, None)
    };

    let disposition = HeaderValue::from_str(&content_disposition(&document.filename)).map_err(|e| {
        tracing::error!(error = %e, filename = %document.filename, "invalid content disposition");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut response_builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, document.content_type)
        .header(header::CONTENT_DISPOSITION, disposition);

    if let Some(encoding) = content_encoding {
        response_builder = response_builder
            .header(header::CONTENT_ENCODING, encoding)
            .header(header::VARY, "accept-encoding");
    }

    let body = if body_bytes.len() > chunk_size {
        response_builder = response_builder.header(header::TRANSFER_ENCODING, "chunked");
        chunked_body(body_bytes, chunk_size)
    } else {
        response_builder = response_builder.header(header::CONTENT_LENGTH, body_bytes.len());
        Body::from(body_bytes)
    };

    response_builder.body(body).map_err(|e| {
        tracing::error!(error = %e, "response build failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
