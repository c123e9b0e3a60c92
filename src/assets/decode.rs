use crate::foundation::core::Raster;
use crate::foundation::error::{MergeError, MergeResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use base64::Engine as _;

/// Decode an encoded image (JPEG, PNG, WebP, ...) into a premultiplied [`Raster`].
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn decode_image(bytes: &[u8]) -> MergeResult<Raster> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| MergeError::visual_unavailable(format!("failed to decode image: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    Raster::new(width, height, rgba8_premul)
}

/// Decode an image delivered as raw bytes, bare base64, or a `data:` URL.
///
/// The decoded bytes of bare base64 are format-sniffed, so no media type is needed.
pub fn decode_image_payload(payload: &[u8]) -> MergeResult<Raster> {
    if image::guess_format(payload).is_ok() {
        return decode_image(payload);
    }

    let text = std::str::from_utf8(payload).map_err(|_| {
        MergeError::visual_unavailable("image payload is neither a known image format nor text")
    })?;
    let encoded = match text.trim().strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest.split_once(',').ok_or_else(|| {
                MergeError::visual_unavailable("data URL is missing its ',' separator")
            })?;
            if !meta.ends_with(";base64") {
                return Err(MergeError::visual_unavailable(
                    "only base64-encoded data URLs are supported",
                ));
            }
            data
        }
        None => text,
    };

    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| MergeError::visual_unavailable(format!("image is not valid base64: {e}")))?;
    decode_image(&bytes)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
