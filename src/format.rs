//! Plain-text rendering helpers for command output.

use chrono::{DateTime, Local, Utc};

use crate::api::types::{Annotation, Document, SavedSignature, SavedStamp};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Human-readable byte count, e.g. `1.5 KB`
pub fn human_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", size, UNITS[unit])
}

/// Timestamp in the local timezone, minute precision
pub fn local_date(at: &DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn document_line(document: &Document) -> String {
  let size = document
    .file_size_bytes()
    .map(human_size)
    .unwrap_or_else(|| document.file_size.clone());
  format!(
    "{:<24} {:<40} {:>10}  {}",
    document.id,
    truncate(&document.name, 40),
    size,
    local_date(&document.updated_at)
  )
}

pub fn document_detail(document: &Document) -> String {
  let mut lines = vec![
    format!("Name:     {}", document.name),
    format!("Id:       {}", document.id),
    format!("Type:     {}", document.mime_type),
  ];
  let size = match document.file_size_bytes() {
    Some(bytes) => format!("{} ({} bytes)", human_size(bytes), bytes),
    None => document.file_size.clone(),
  };
  lines.push(format!("Size:     {}", size));
  lines.push(format!("Created:  {}", local_date(&document.created_at)));
  lines.push(format!("Updated:  {}", local_date(&document.updated_at)));
  lines.push(format!("Url:      {}", document.url));
  if let Some(description) = &document.description {
    lines.push(String::new());
    lines.push(description.clone());
  }
  lines.join("\n")
}

pub fn annotation_line(annotation: &Annotation) -> String {
  let page = annotation
    .page
    .map(|p| format!("p.{}", p))
    .unwrap_or_else(|| "-".to_string());
  format!(
    "{:<16} {:<10} {:>5}  {}  {}",
    annotation.id,
    truncate(&annotation.kind, 10),
    page,
    local_date(&annotation.created_at),
    truncate(annotation.text.as_deref().unwrap_or(""), 60)
  )
}

pub fn signature_line(signature: &SavedSignature) -> String {
  format!(
    "{:<16} {:<17} {}",
    signature.id,
    signature
      .created_at
      .as_ref()
      .map(local_date)
      .unwrap_or_default(),
    data_url_summary(&signature.data_url)
  )
}

pub fn stamp_line(stamp: &SavedStamp) -> String {
  format!(
    "{:<16} {:<16} {:<17} {}",
    stamp.id,
    truncate(&stamp.stamp_type, 16),
    stamp.created_at.as_ref().map(local_date).unwrap_or_default(),
    data_url_summary(&stamp.preview)
  )
}

/// `image/png, 2.1 KB` instead of the whole payload
fn data_url_summary(data_url: &str) -> String {
  let Some((header, payload)) = data_url
    .strip_prefix("data:")
    .and_then(|rest| rest.split_once(','))
  else {
    return truncate(data_url, 32);
  };
  let mime = header.split(';').next().unwrap_or(header);
  format!("{}, {}", mime, human_size(payload.len() as u64))
}
