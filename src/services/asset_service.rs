use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    database::{UserFilter, UserStore, UserUpdate},
    jobs::asset_cleanup,
    services::cloudinary_service::ImageHost,
    utils::AppError,
};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Profile,
    Cover,
}

impl AssetKind {
    fn prefix(self) -> &'static str {
        match self {
            AssetKind::Profile => "profile",
            AssetKind::Cover => "cover",
        }
    }

    fn folder(self) -> &'static str {
        match self {
            AssetKind::Profile => "trademinutes/profiles",
            AssetKind::Cover => "trademinutes/covers",
        }
    }

    fn transformation(self) -> &'static str {
        match self {
            AssetKind::Profile => "f_auto,q_auto,w_400,h_400,c_fill,g_face",
            AssetKind::Cover => "f_auto,q_auto,w_1200,h_400,c_fill",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            AssetKind::Profile => "Profile picture uploaded successfully",
            AssetKind::Cover => "Cover image uploaded successfully",
        }
    }

    fn current<'a>(self, user: &'a crate::models::User) -> &'a str {
        match self {
            AssetKind::Profile => &user.profile_picture_url,
            AssetKind::Cover => &user.cover_image_url,
        }
    }

    fn update(self, reference: String) -> UserUpdate {
        match self {
            AssetKind::Profile => UserUpdate {
                profile_picture_url: Some(reference),
                ..Default::default()
            },
            AssetKind::Cover => UserUpdate {
                cover_image_url: Some(reference),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    fn extension(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    /// Declared content type, else one guessed from the extension.
    fn mime(&self) -> String {
        if let Some(ct) = self.content_type.as_deref().filter(|ct| ct.starts_with("image/")) {
            return ct.to_string();
        }
        match self.extension().as_deref() {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        }
        .to_string()
    }
}

pub fn validate_image(file: &UploadedFile) -> Result<(), AppError> {
    let allowed = file
        .extension()
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !allowed {
        return Err(AppError::Validation(
            "Invalid file type. Only JPG, PNG, GIF, and WebP are allowed".to_string(),
        ));
    }
    if file.bytes.is_empty() {
        return Err(AppError::Validation("Image file is empty".to_string()));
    }
    if file.bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation(
            "File too large. Maximum size is 5MB".to_string(),
        ));
    }
    Ok(())
}

fn public_id(kind: AssetKind, email: &str) -> String {
    let safe: String = email
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "{}/{}_{}_{}",
        kind.folder(),
        kind.prefix(),
        safe,
        chrono::Utc::now().timestamp()
    )
}

/// Profile and cover image uploads. The remote host is best effort; inline
/// `data:` URIs are stored when it cannot be reached.
pub struct AssetService {
    store: Arc<dyn UserStore>,
    host: Arc<dyn ImageHost>,
}

impl AssetService {
    pub fn new(store: Arc<dyn UserStore>, host: Arc<dyn ImageHost>) -> Self {
        Self { store, host }
    }

    pub async fn upload(
        &self,
        email: &str,
        kind: AssetKind,
        file: UploadedFile,
    ) -> Result<String, AppError> {
        validate_image(&file)?;

        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let previous = kind.current(&user).to_string();

        let mime = file.mime();
        let reference = match self
            .host
            .upload(
                file.bytes.clone(),
                &mime,
                &public_id(kind, email),
                kind.transformation(),
            )
            .await
        {
            Ok(url) => {
                log::info!("✅ {} image uploaded to Cloudinary for {}", kind.prefix(), email);
                url
            }
            Err(e) => {
                log::warn!(
                    "⚠️  Cloudinary upload failed for {}: {}, falling back to base64",
                    email,
                    e
                );
                format!("data:{};base64,{}", mime, STANDARD.encode(&file.bytes))
            }
        };

        let matched = self
            .store
            .update_fields(&UserFilter::by_id(user.id), &kind.update(reference.clone()))
            .await?;
        if !matched {
            // Account vanished between the lookup and the write
            asset_cleanup::schedule_cleanup(self.host.clone(), reference);
            return Err(AppError::NotFound("User not found".to_string()));
        }

        if !previous.is_empty() && previous != reference {
            asset_cleanup::schedule_cleanup(self.host.clone(), previous);
        }

        Ok(reference)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::memory_store::MemoryUserStore;
    use crate::models::User;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records calls; uploads succeed unless `fail` is set.
    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub fail: bool,
        pub uploads: Mutex<Vec<String>>,
        pub destroyed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageHost for FakeHost {
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            _content_type: &str,
            public_id: &str,
            _transformation: &str,
        ) -> Result<String, String> {
            if self.fail {
                return Err("host down".to_string());
            }
            self.uploads.lock().unwrap().push(public_id.to_string());
            Ok(format!(
                "https://res.cloudinary.com/demo/image/upload/v1/{}.jpg",
                public_id
            ))
        }

        async fn destroy(&self, public_id: &str) -> Result<(), String> {
            self.destroyed.lock().unwrap().push(public_id.to_string());
            Ok(())
        }
    }

    fn png(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    async fn setup(fail: bool) -> (AssetService, Arc<MemoryUserStore>, Arc<FakeHost>) {
        let store = Arc::new(MemoryUserStore::new());
        store
            .insert(&User::new("ana@bu.edu".into(), "Ana".into(), None, "local"))
            .await
            .unwrap();
        let host = Arc::new(FakeHost {
            fail,
            ..Default::default()
        });
        (AssetService::new(store.clone(), host.clone()), store, host)
    }

    #[tokio::test]
    async fn executable_is_rejected_without_mutation() {
        let (svc, store, host) = setup(false).await;
        let err = svc
            .upload("ana@bu.edu", AssetKind::Profile, png("virus.exe"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.snapshot("ana@bu.edu").unwrap().profile_picture_url.is_empty());
        assert!(host.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_and_empty_files_are_rejected() {
        let (svc, _, _) = setup(false).await;
        let mut big = png("a.png");
        big.bytes = vec![0; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            svc.upload("ana@bu.edu", AssetKind::Cover, big).await,
            Err(AppError::Validation(_))
        ));
        let mut empty = png("a.png");
        empty.bytes.clear();
        assert!(matches!(
            svc.upload("ana@bu.edu", AssetKind::Cover, empty).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn upload_stores_host_url_with_folder_and_prefix() {
        let (svc, store, host) = setup(false).await;
        let url = svc
            .upload("ana@bu.edu", AssetKind::Cover, png("Cover.PNG"))
            .await
            .unwrap();
        assert_eq!(store.snapshot("ana@bu.edu").unwrap().cover_image_url, url);
        let ids = host.uploads.lock().unwrap();
        assert!(ids[0].starts_with("trademinutes/covers/cover_ana_bu_edu_"));
    }

    #[tokio::test]
    async fn host_failure_falls_back_to_data_uri() {
        let (svc, store, _) = setup(true).await;
        let url = svc
            .upload("ana@bu.edu", AssetKind::Profile, png("me.png"))
            .await
            .unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(store.snapshot("ana@bu.edu").unwrap().profile_picture_url, url);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let (svc, _, host) = setup(false).await;
        let err = svc
            .upload("ghost@bu.edu", AssetKind::Profile, png("me.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(host.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replacing_an_image_cleans_up_the_old_one() {
        let (svc, _, host) = setup(false).await;
        let first = svc
            .upload("ana@bu.edu", AssetKind::Profile, png("a.png"))
            .await
            .unwrap();
        // Timestamps are per-second; make sure the second id differs
        tokio::time::sleep(Duration::from_millis(1100)).await;
        svc.upload("ana@bu.edu", AssetKind::Profile, png("b.png"))
            .await
            .unwrap();

        let expected = crate::services::cloudinary_service::extract_public_id(&first).unwrap();
        for _ in 0..50 {
            if !host.destroyed.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*host.destroyed.lock().unwrap(), vec![expected]);
    }
}
