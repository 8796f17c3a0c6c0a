use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::models::{AppUpdate, Item, NewItem, UserItem};
use crate::services::{BackendClient, UploadFile};

/// Static directory that item artwork is uploaded into.
pub const ITEM_IMAGE_DIRECTORY: &str = "items";

/// Everything needed to provision a catalog item.
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub name: String,
    pub description: String,
    pub source: String,
    pub icon_path: PathBuf,
    pub image_path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum GrantOutcome {
    Granted(UserItem),
    /// The user already owned the item; its quantity was raised to this value.
    QuantityUpdated(i32),
}

/// Admin provisioning flows: catalog items, releases and item grants.
pub struct AdminProvisioner {
    backend: Arc<BackendClient>,
}

impl AdminProvisioner {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    /// Upload icon and image, then create the item pointing at them.
    /// Both files are read before anything is uploaded.
    pub async fn upload_item(&self, spec: &ItemSpec) -> ClientResult<Item> {
        let icon = UploadFile::read(&spec.icon_path)?;
        let image = UploadFile::read(&spec.image_path)?;

        log::info!("📦 Provisioning item: {}", spec.name);
        let icon_url = self.backend.upload_image(&icon, ITEM_IMAGE_DIRECTORY, None).await?;
        let image_url = self.backend.upload_image(&image, ITEM_IMAGE_DIRECTORY, None).await?;

        let item = self
            .backend
            .create_item(&NewItem {
                name: spec.name.clone(),
                description: spec.description.clone(),
                source: spec.source.clone(),
                icon_url,
                image_url,
            })
            .await?;

        log::info!("✅ Item created: {} (ID: {})", item.name, item.id);
        Ok(item)
    }

    pub async fn publish_apk(
        &self,
        path: &Path,
        version: &str,
        platform: &str,
        force_update: bool,
        update_notes: &str,
    ) -> ClientResult<AppUpdate> {
        check_apk(path)?;
        let apk = UploadFile::read(path)?;
        log::info!(
            "📱 Uploading {} {} ({:.2} MB)",
            platform,
            version,
            apk.bytes.len() as f64 / (1024.0 * 1024.0)
        );

        let update = self
            .backend
            .upload_apk(&apk, version, platform, force_update, update_notes)
            .await?;
        log::info!("✅ Release published: {} {} (force: {})", update.platform, update.version, update.force_update);
        Ok(update)
    }

    /// Give `quantity` of an item to a user, topping up an existing stack.
    pub async fn grant_item(
        &self,
        user_id: u64,
        item_id: u64,
        quantity: i32,
        source: &str,
    ) -> ClientResult<GrantOutcome> {
        if self.backend.user_has_item(user_id, item_id).await? {
            let owned = self
                .backend
                .list_user_items(user_id)
                .await?
                .into_iter()
                .find(|u| u.item_id == item_id)
                .ok_or_else(|| ClientError::ResourceMissing {
                    body: format!("user {} item {} reported owned but not listed", user_id, item_id),
                })?;

            let total = owned.quantity.checked_add(quantity).ok_or_else(|| {
                ClientError::Config(format!(
                    "quantity overflow: user {} holds {} of item {}, cannot add {}",
                    user_id, owned.quantity, item_id, quantity
                ))
            })?;
            self.backend
                .update_user_item_quantity(user_id, item_id, total)
                .await?;
            log::info!("🎁 User {} now has {} of item {}", user_id, total, item_id);
            return Ok(GrantOutcome::QuantityUpdated(total));
        }

        let granted = self
            .backend
            .grant_item(
                user_id,
                &UserItem {
                    user_id,
                    item_id,
                    quantity,
                    obtained_from: source.to_string(),
                    ..Default::default()
                },
            )
            .await?;
        log::info!("🎁 Granted item {} x{} to user {}", item_id, quantity, user_id);
        Ok(GrantOutcome::Granted(granted))
    }
}

/// An APK release must have the `.apk` extension and be a readable file.
pub fn check_apk(path: &Path) -> ClientResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if !extension.eq_ignore_ascii_case("apk") {
        return Err(ClientError::UnsupportedFormat {
            input: path.display().to_string(),
            format: extension.to_string(),
        });
    }
    UploadFile::inspect(path)
}
