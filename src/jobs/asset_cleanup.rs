// ==================== ORPHANED IMAGE CLEANUP ====================
// Removes a replaced profile/cover image from the image host once the new
// reference is safely stored. Runs detached from the request.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::services::cloudinary_service::{extract_public_id, ImageHost};

/// Spawns the cleanup and returns immediately. The task owns everything it
/// touches, so dropping the request does not cancel it.
pub fn schedule_cleanup(host: Arc<dyn ImageHost>, old_reference: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        cleanup(host.as_ref(), &old_reference).await;
    })
}

async fn cleanup(host: &dyn ImageHost, old_reference: &str) {
    if old_reference.starts_with("data:") {
        log::debug!("🧹 Dropped inline image ({} bytes), nothing to delete", old_reference.len());
        return;
    }

    if !host.owns(old_reference) {
        log::debug!("🧹 Old image is not hosted by us, skipping: {}", old_reference);
        return;
    }

    let Some(public_id) = extract_public_id(old_reference) else {
        log::warn!("⚠️  Could not extract public id from {}", old_reference);
        return;
    };

    match host.destroy(&public_id).await {
        Ok(()) => log::info!("✅ Deleted old image from Cloudinary: {}", public_id),
        Err(e) => log::error!("❌ Failed to delete old image {}: {}", public_id, e),
    }
}
