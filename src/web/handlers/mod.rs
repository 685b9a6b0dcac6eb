// Route handlers, one module per API area.
//
// Handlers stay thin: pull the request apart, call `Social`, shape the JSON.
// Every failure is a `SocialError`, which renders itself as a response.

pub mod auth;
pub mod posts;
pub mod stream;
pub mod users;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::Multipart;
use axum::response::Response;
use axum::Json;

use crate::media::Upload;
use crate::social::SocialError;

pub type ApiResult = Result<Response, SocialError>;

/// Unwrap a JSON body, turning a malformed one into a 400 `{message}`.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, SocialError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| SocialError::BadRequest(rejection.body_text()))
}

/// A multipart form split into text fields and files, in arrival order.
#[derive(Debug, Default)]
pub(crate) struct FormData {
    pub texts: Vec<(String, String)>,
    pub files: Vec<(String, Upload)>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Remove and return every file sent under `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<Upload> {
        let (matching, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        matching.into_iter().map(|(_, upload)| upload).collect()
    }
}

/// Read a whole multipart form. Browsers send an empty file part when no
/// file was picked; those parts are dropped.
pub(crate) async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<FormData, SocialError> {
    let mut multipart =
        multipart.map_err(|rejection| SocialError::BadRequest(rejection.body_text()))?;
    let mut form = FormData::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_form)?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.files.push((
                    name,
                    Upload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    },
                ));
            }
            None => {
                let value = field.text().await.map_err(bad_form)?;
                form.texts.push((name, value));
            }
        }
    }
    Ok(form)
}

fn bad_form(e: MultipartError) -> SocialError {
    SocialError::BadRequest(e.body_text())
}
