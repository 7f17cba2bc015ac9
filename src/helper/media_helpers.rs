use crate::helper::blog_helpers::BlogError;
use crate::helper::form_helpers::PostForm;
use actix_csrf::extractor::{CsrfGuarded, CsrfToken};
use actix_multipart::{Field, Multipart};
use actix_web::error::ErrorBadRequest;
use actix_web::{dev, web, web::BytesMut, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use futures_util::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Largest accepted post image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_TEXT_FIELD_BYTES: usize = 256 * 1024;

/// Only these types are stored, under an extension we pick ourselves.
fn image_extension(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/gif" => Some("gif"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[derive(Debug)]
pub struct UploadedImage {
    pub extension: &'static str,
    pub bytes: BytesMut,
}

/// A post form sent as `multipart/form-data`. Problems with the image are
/// kept in `image_error` so the form can be shown again with the message.
pub struct PostSubmission {
    pub csrf_token: CsrfToken,
    pub form: PostForm,
    pub image: Option<UploadedImage>,
    pub image_error: Option<String>,
    /// The "remove image" box on the edit form.
    pub clear_image: bool,
}

impl CsrfGuarded for PostSubmission {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

impl FromRequest for PostSubmission {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut dev::Payload) -> Self::Future {
        let multipart = Multipart::new(req.headers(), payload.take());
        Box::pin(read_submission(multipart))
    }
}

/// Reads a field up to `limit` bytes. `None` means it was larger; the rest
/// of the field is drained so the following fields can still be read.
async fn read_field(field: &mut Field, limit: usize) -> Result<Option<BytesMut>, actix_web::Error> {
    let mut data = BytesMut::new();
    let mut too_large = false;
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        if too_large {
            continue;
        }
        if data.len() + chunk.len() > limit {
            too_large = true;
            data.clear();
            continue;
        }
        data.extend_from_slice(&chunk);
    }
    Ok(if too_large { None } else { Some(data) })
}

async fn read_submission(mut multipart: Multipart) -> Result<PostSubmission, actix_web::Error> {
    let mut csrf_token = None;
    let mut form = PostForm::default();
    let mut image = None;
    let mut image_error = None;
    let mut clear_image = false;

    while let Some(item) = multipart.next().await {
        let mut field = item?;
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let content_type = field.content_type().map(|mime| mime.essence_str().to_string());
            match read_field(&mut field, MAX_IMAGE_BYTES).await? {
                // An empty file input still sends a part.
                Some(bytes) if bytes.is_empty() => {}
                Some(bytes) => match content_type.as_deref().and_then(image_extension) {
                    Some(extension) => image = Some(UploadedImage { extension, bytes }),
                    None => {
                        image_error = Some("Unsupported image type. Upload a JPEG, PNG, GIF or WebP file.".to_string())
                    }
                },
                None => image_error = Some("Image is too large. Maximum size is 5MB.".to_string()),
            }
            continue;
        }

        let bytes = read_field(&mut field, MAX_TEXT_FIELD_BYTES)
            .await?
            .ok_or_else(|| ErrorBadRequest(format!("Form field '{}' is too large.", name)))?;
        let value = String::from_utf8(bytes.to_vec()).map_err(|_| ErrorBadRequest("Invalid UTF-8 in form field."))?;
        match name.as_str() {
            "csrf_token" => csrf_token = Some(value),
            "title" => form.title = value,
            "text" => form.text = value,
            "pub_date" => form.pub_date = value,
            "category" => form.category = value,
            "location" => form.location = value,
            "clear_image" => clear_image = !value.is_empty(),
            _ => (),
        }
    }

    let raw_token = csrf_token.ok_or_else(|| ErrorBadRequest("Missing CSRF token."))?;
    let csrf_token: CsrfToken = serde_json::from_value(serde_json::Value::String(raw_token))
        .map_err(|_| ErrorBadRequest("Malformed CSRF token."))?;

    Ok(PostSubmission { csrf_token, form, image, image_error, clear_image })
}

/// Stores an image under `<media_root>/posts/<aa>/<bb>/<uuid>.<ext>` and
/// returns the path relative to the media root.
pub async fn save_post_image(media_root: &str, image: UploadedImage) -> Result<String, BlogError> {
    let file_id = Uuid::new_v4().to_string();
    let relative = format!("posts/{}/{}/{}.{}", &file_id[0..2], &file_id[2..4], file_id, image.extension);
    let full_path = PathBuf::from(media_root).join(&relative);

    web::block(move || -> std::io::Result<()> {
        if let Some(dir) = full_path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&full_path, &image.bytes)
    })
    .await
    .map_err(|e| BlogError::Media(e.to_string()))?
    .map_err(|e| BlogError::Media(e.to_string()))?;

    Ok(relative)
}

/// Best effort: a file that is already gone is only logged.
pub async fn remove_post_image(media_root: &str, relative: &str) {
    if !is_stored_image_path(relative) {
        log::warn!("Refusing to delete unexpected media path '{}'", relative);
        return;
    }
    let full_path = Path::new(media_root).join(relative);
    let shown = full_path.display().to_string();
    match web::block(move || fs::remove_file(full_path)).await {
        Ok(Ok(())) => log::debug!("Removed post image '{}'", shown),
        Ok(Err(e)) => log::warn!("Could not remove post image '{}': {}", shown, e),
        Err(e) => log::warn!("Could not remove post image '{}': {}", shown, e),
    }
}

fn is_stored_image_path(relative: &str) -> bool {
    relative.starts_with("posts/") && !relative.split('/').any(|part| part == ".." || part.is_empty())
}
