use common_services::database::{DbError, PhotoRepository};
use common_types::Photo;
use tracing::debug;
use uuid::Uuid;

/// Lists every photo of a session in creation order, one page at a time.
///
/// Starts at `start_offset` and stops after the first page shorter than `page_size`.
pub async fn load_session_photos(
    photos: &dyn PhotoRepository,
    session_id: Uuid,
    start_offset: i64,
    page_size: i64,
) -> Result<Vec<Photo>, DbError> {
    let page_size = page_size.max(1);
    let mut offset = start_offset.max(0);
    let mut out = Vec::new();

    loop {
        let page = photos.list_page(session_id, offset, page_size).await?;
        let len = page.len();
        out.extend(page);
        if (len as i64) < page_size {
            break;
        }
        offset += page_size;
    }

    debug!("Loaded {} photos for session {}", out.len(), session_id);
    Ok(out)
}
