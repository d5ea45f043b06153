//! `multipart/form-data` decoding
//!
//! Parses a fully buffered body into text fields and uploaded files. Any
//! structural problem is reported as [`Error::Multipart`]; parsing never panics
//! on client input.

use crate::{Error, Result};
use bytes::Bytes;
use memchr::memmem;
use std::collections::HashMap;

/// An uploaded file
#[derive(Debug, Clone)]
pub struct FormFile {
    /// Form field the file was sent under
    pub field: String,
    /// Client-supplied file name
    pub filename: String,
    /// Part `content-type`, if sent
    pub content_type: Option<String>,
    /// All part headers, names lower-cased
    pub headers: Vec<(String, String)>,
    /// File contents
    pub data: Bytes,
}

impl FormFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A decoded multipart body
#[derive(Debug, Default, Clone)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: Vec<FormFile>,
}

/// Extract the boundary parameter from a `multipart/form-data` content type
pub fn boundary(content_type: &str) -> Option<&str> {
    let mut parts = content_type.split(';');
    let mime = parts.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    parts
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"'))
        .filter(|b| !b.is_empty())
}

impl MultipartForm {
    /// Parse `body` using the boundary declared in `content_type`
    pub fn parse(content_type: &str, body: &Bytes) -> Result<Self> {
        let boundary = boundary(content_type)
            .ok_or_else(|| Error::Multipart("missing multipart boundary".to_string()))?;
        let delimiter = format!("--{}", boundary);
        let part_end = format!("\r\n--{}", boundary);
        let mut form = MultipartForm::default();

        let mut pos = memmem::find(body, delimiter.as_bytes())
            .ok_or_else(|| Error::Multipart("boundary not found in body".to_string()))?
            + delimiter.len();

        loop {
            let rest = &body[pos..];
            if rest.starts_with(b"--") {
                return Ok(form);
            }
            if !rest.starts_with(b"\r\n") {
                return Err(Error::Multipart("malformed boundary line".to_string()));
            }
            pos += 2;

            let header_len = memmem::find(&body[pos..], b"\r\n\r\n")
                .ok_or_else(|| Error::Multipart("unterminated part headers".to_string()))?;
            let headers = parse_part_headers(&body[pos..pos + header_len])?;
            let data_start = pos + header_len + 4;

            let data_len = memmem::find(&body[data_start..], part_end.as_bytes())
                .ok_or_else(|| Error::Multipart("unexpected end of body".to_string()))?;
            let data = body.slice(data_start..data_start + data_len);
            pos = data_start + data_len + part_end.len();

            form.push_part(headers, data)?;
        }
    }

    fn push_part(&mut self, headers: Vec<(String, String)>, data: Bytes) -> Result<()> {
        let disposition = headers
            .iter()
            .find(|(k, _)| k == "content-disposition")
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| Error::Multipart("part without content-disposition".to_string()))?;

        let mut name = None;
        let mut filename = None;
        for param in disposition.split(';').skip(1) {
            if let Some((key, value)) = param.trim().split_once('=') {
                let value = value.trim().trim_matches('"').to_string();
                match key.trim().to_ascii_lowercase().as_str() {
                    "name" => name = Some(value),
                    "filename" => filename = Some(value),
                    _ => {}
                }
            }
        }
        let field = name.ok_or_else(|| Error::Multipart("part without a name".to_string()))?;

        match filename {
            Some(filename) => {
                let content_type = headers
                    .iter()
                    .find(|(k, _)| k == "content-type")
                    .map(|(_, v)| v.clone());
                self.files.push(FormFile {
                    field,
                    filename,
                    content_type,
                    headers,
                    data,
                });
            }
            None => {
                let value = String::from_utf8_lossy(&data).into_owned();
                self.fields.entry(field).or_insert(value);
            }
        }
        Ok(())
    }

    /// First text value sent under `name`
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    /// First file sent under `field`
    pub fn file(&self, field: &str) -> Option<&FormFile> {
        self.files.iter().find(|f| f.field == field)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn files(&self) -> &[FormFile] {
        &self.files
    }
}

fn parse_part_headers(block: &[u8]) -> Result<Vec<(String, String)>> {
    let text = std::str::from_utf8(block)
        .map_err(|_| Error::Multipart("part headers are not UTF-8".to_string()))?;
    text.split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                .ok_or_else(|| Error::Multipart(format!("malformed part header: {}", line)))
        })
        .collect()
}
