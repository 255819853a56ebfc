use axum::extract::{Multipart, State};
use axum::Json;
use std::sync::Arc;

use crate::error::Error;
use crate::models::ImageCandidate;
use crate::pipeline::input::SubmissionForm;
use crate::pipeline::respond::SubmissionResponse;
use crate::state::AppState;

pub async fn validate_submission(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SubmissionResponse>, Error> {
    let form = read_form(multipart).await?;
    let request = form.into_request()?;
    let response = state.pipeline.submit(request).await?;
    Ok(Json(response))
}

async fn read_form(mut multipart: Multipart) -> Result<SubmissionForm, Error> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "images" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("image_{}", form.images.len() + 1));
                let mime_type = field
                    .content_type()
                    .filter(|ct| *ct != "application/octet-stream")
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&filename)
                            .first_raw()
                            .unwrap_or("application/octet-stream")
                            .to_string()
                    });
                let bytes = field.bytes().await.map_err(malformed)?;
                form.images.push(ImageCandidate {
                    filename,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            "orderNumber" => form.order_number = field.text().await.map_err(malformed)?,
            "orderEmail" => form.order_email = field.text().await.map_err(malformed)?,
            "textReview" => form.text_review = field.text().await.map_err(malformed)?,
            "customerName" => form.customer_name = field.text().await.map_err(malformed)?,
            "starRating" => form.star_rating = field.text().await.map_err(malformed)?,
            "fixMode" => form.fix_mode = field.text().await.map_err(malformed)?,
            "rejectedImages" => {
                form.rejected_images = Some(field.text().await.map_err(malformed)?)
            }
            "acceptedImages" => {
                form.accepted_images = Some(field.text().await.map_err(malformed)?)
            }
            other => tracing::debug!("Ignoring unknown form field {}", other),
        }
    }

    Ok(form)
}

fn malformed(e: axum::extract::multipart::MultipartError) -> Error {
    Error::validation(format!("Malformed upload: {}", e.body_text()))
}
