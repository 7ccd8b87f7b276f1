use std::collections::HashMap;

use axum::extract::Multipart;

use crate::core::errors::ApiError;

/// A file part of a multipart form.
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Text fields by name plus the part named `file`, if any.
#[derive(Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl FormData {
    pub fn required(&self, name: &str) -> Result<&str, ApiError> {
        self.fields
            .get(name)
            .map(|value| value.as_str())
            .ok_or_else(|| ApiError::BadRequest(format!("Missing form field: {}", name)))
    }

    pub fn optional(&self, name: &str) -> &str {
        self.fields.get(name).map(|value| value.as_str()).unwrap_or_default()
    }
}

pub async fn read_form(mut multipart: Multipart) -> Result<FormData, ApiError> {
    let mut form = FormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
            form.file = Some(UploadedFile {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Invalid form field {}: {}", name, e)))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
