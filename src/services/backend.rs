use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::BackendConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    AnalysisResult, AnalysisType, AppUpdate, CheckInOutcome, CheckInPage, CheckInStatus, DataEnvelope,
    FoodRecord, HealthAnalysisRequest, HealthState, ImageInfo, Item, ItemCheck, ItemsPage, LoginResponse,
    MealType, MessageResponse, NewItem, RecordEnvelope, RecordsEnvelope, SavedAnalysis, SystemStats,
    UpdateCheck, UploadedFile, User, UserItem,
};
use crate::services::extractor;
use crate::services::image::unreadable;
use crate::services::session::SessionManager;

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Debug, Deserialize)]
struct UsersEnvelope {
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct HealthAnalysisEnvelope {
    analysis: String,
}

#[derive(Debug, Deserialize)]
struct SavedEnvelope {
    record: FoodRecord,
    analysis: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SuccessEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// A file read into memory for multipart upload, so the body can be rebuilt
/// when the session layer replays a request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Check that `path` is a readable file without loading it.
    pub fn inspect(path: &Path) -> ClientResult<()> {
        if !path.is_file() {
            return Err(ClientError::NotFound {
                path: path.to_path_buf(),
            });
        }
        std::fs::File::open(path).map_err(|e| unreadable(path, e))?;
        Ok(())
    }

    pub fn read(path: &Path) -> ClientResult<Self> {
        Self::inspect(path)?;
        let bytes = std::fs::read(path).map_err(|e| unreadable(path, e))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self { file_name, bytes })
    }

    fn part(&self) -> Part {
        Part::bytes(self.bytes.clone()).file_name(self.file_name.clone())
    }
}

/// Typed client for the health-tracking backend REST API.
pub struct BackendClient {
    base_url: String,
    session: Arc<SessionManager>,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &BackendConfig, session: Arc<SessionManager>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            base_url: config.base_url.clone(),
            session,
            client,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    // ---- Auth ----

    pub async fn login(&self) -> ClientResult<LoginResponse> {
        self.session.login().await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ClientResult<MessageResponse> {
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
        let response = self
            .client
            .post(self.api_url("/register"))
            .json(&body)
            .send()
            .await
            .map_err(ClientError::Transport)?;
        read_json(response).await
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> ClientResult<MessageResponse> {
        let body = serde_json::json!({ "email": email, "code": code });
        let response = self
            .client
            .post(self.api_url("/verify-email"))
            .json(&body)
            .send()
            .await
            .map_err(ClientError::Transport)?;
        read_json(response).await
    }

    pub async fn resend_verification(&self, email: &str) -> ClientResult<MessageResponse> {
        let body = serde_json::json!({ "email": email });
        let response = self
            .client
            .post(self.api_url("/resend-verification"))
            .json(&body)
            .send()
            .await
            .map_err(ClientError::Transport)?;
        read_json(response).await
    }

    pub async fn me(&self) -> ClientResult<User> {
        let url = self.api_url("/me");
        let response = self.session.execute(|http| http.get(&url)).await?;
        let envelope: UserEnvelope = read_json(response).await?;
        Ok(envelope.user)
    }

    // ---- Food records ----

    pub async fn create_food_record(&self, record: &FoodRecord) -> ClientResult<FoodRecord> {
        let url = self.api_url("/food-records");
        let response = self.session.execute(|http| http.post(&url).json(record)).await?;
        let envelope: RecordEnvelope<FoodRecord> = read_json(response).await?;
        log::info!("✅ Food record saved: {} ({:.0} kcal)", envelope.record.food_name, envelope.record.calories);
        Ok(envelope.record)
    }

    /// Records in an optional inclusive date range (YYYY-MM-DD on the wire).
    pub async fn list_food_records(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> ClientResult<RecordsEnvelope<FoodRecord>> {
        let url = self.api_url("/food-records");
        let query = date_range(start_date, end_date);
        let response = self.session.execute(|http| http.get(&url).query(&query)).await?;
        read_json(response).await
    }

    pub async fn get_food_record(&self, id: u64) -> ClientResult<FoodRecord> {
        let url = self.api_url(&format!("/food-records/{}", id));
        let response = self.session.execute(|http| http.get(&url)).await?;
        let envelope: RecordEnvelope<FoodRecord> = read_json(response).await?;
        Ok(envelope.record)
    }

    pub async fn update_food_record(&self, id: u64, record: &FoodRecord) -> ClientResult<FoodRecord> {
        let url = self.api_url(&format!("/food-records/{}", id));
        let response = self.session.execute(|http| http.put(&url).json(record)).await?;
        let envelope: RecordEnvelope<FoodRecord> = read_json(response).await?;
        Ok(envelope.record)
    }

    pub async fn delete_food_record(&self, id: u64) -> ClientResult<MessageResponse> {
        let url = self.api_url(&format!("/food-records/{}", id));
        let response = self.session.execute(|http| http.delete(&url)).await?;
        read_json(response).await
    }

    /// Let the backend run the analysis itself. The answer is validated
    /// against the same schema as a locally extracted one.
    pub async fn analyze_food_remote(&self, image: &UploadFile, description: Option<&str>) -> ClientResult<AnalysisResult> {
        let url = self.api_url("/analyze-food");
        let description = description.unwrap_or_default().to_string();
        let response = self
            .session
            .execute(|http| {
                let form = Form::new()
                    .part("image", image.part())
                    .text("image_description", description.clone());
                http.post(&url).multipart(form)
            })
            .await?;

        let body = read_text(response).await?;
        extractor::parse(&body).map_err(|reason| ClientError::MalformedAnalysis { reason, raw: body })
    }

    /// Server-side analysis that also stores the record. The returned
    /// analysis is validated like a local one.
    pub async fn analyze_and_save_remote(
        &self,
        image: &UploadFile,
        meal_type: &MealType,
        notes: &str,
        description: Option<&str>,
    ) -> ClientResult<SavedAnalysis> {
        let url = self.api_url("/analyze-and-save");
        let fields = [
            ("meal_type", meal_type.to_string()),
            ("notes", notes.to_string()),
            ("image_description", description.unwrap_or_default().to_string()),
        ];
        let response = self
            .session
            .execute(|http| {
                let form = fields
                    .iter()
                    .fold(Form::new().part("image", image.part()), |form, (name, value)| {
                        form.text(*name, value.clone())
                    });
                http.post(&url).multipart(form)
            })
            .await?;

        let saved: SavedEnvelope = read_json(response).await?;
        let raw = saved.analysis.to_string();
        let analysis = extractor::parse(&raw).map_err(|reason| ClientError::MalformedAnalysis { reason, raw })?;
        log::info!("✅ Backend analyzed and saved: {}", saved.record.food_name);
        Ok(SavedAnalysis {
            record: saved.record,
            analysis,
        })
    }

    // ---- Health analysis ----

    /// Ask the backend for a written analysis of the food records in an
    /// inclusive date range.
    pub async fn analyze_health(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        analysis_type: AnalysisType,
        description: Option<&str>,
    ) -> ClientResult<String> {
        let url = self.api_url("/health-analysis");
        let body = HealthAnalysisRequest::new(start_date, end_date, analysis_type, description);
        let response = self.session.execute(|http| http.post(&url).json(&body)).await?;
        let envelope: HealthAnalysisEnvelope = read_json(response).await?;
        Ok(envelope.analysis)
    }

    // ---- Health states ----

    pub async fn create_health_state(&self, state: &HealthState) -> ClientResult<HealthState> {
        let url = self.api_url("/health-states");
        let response = self.session.execute(|http| http.post(&url).json(state)).await?;
        let envelope: RecordEnvelope<HealthState> = read_json(response).await?;
        Ok(envelope.record)
    }

    pub async fn list_health_states(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> ClientResult<RecordsEnvelope<HealthState>> {
        let url = self.api_url("/health-states");
        let query = date_range(start_date, end_date);
        let response = self.session.execute(|http| http.get(&url).query(&query)).await?;
        read_json(response).await
    }

    pub async fn get_health_state(&self, id: u64) -> ClientResult<HealthState> {
        let url = self.api_url(&format!("/health-states/{}", id));
        let response = self.session.execute(|http| http.get(&url)).await?;
        let envelope: RecordEnvelope<HealthState> = read_json(response).await?;
        Ok(envelope.record)
    }

    pub async fn latest_health_state(&self) -> ClientResult<HealthState> {
        let url = self.api_url("/health-states/latest");
        let response = self.session.execute(|http| http.get(&url)).await?;
        let envelope: RecordEnvelope<HealthState> = read_json(response).await?;
        Ok(envelope.record)
    }

    pub async fn update_health_state(&self, id: u64, state: &HealthState) -> ClientResult<HealthState> {
        let url = self.api_url(&format!("/health-states/{}", id));
        let response = self.session.execute(|http| http.put(&url).json(state)).await?;
        let envelope: RecordEnvelope<HealthState> = read_json(response).await?;
        Ok(envelope.record)
    }

    pub async fn delete_health_state(&self, id: u64) -> ClientResult<MessageResponse> {
        let url = self.api_url(&format!("/health-states/{}", id));
        let response = self.session.execute(|http| http.delete(&url)).await?;
        read_json(response).await
    }

    // ---- Check-ins ----

    /// Check in for today. A refusal (no food logged yet, already checked
    /// in) comes back as 400 with the same outcome body and is not an error.
    pub async fn check_in(&self, content: &str) -> ClientResult<CheckInOutcome> {
        let url = self.api_url("/check-in");
        let body = serde_json::json!({ "content": content });
        let response = self.session.execute(|http| http.post(&url).json(&body)).await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let text = read_body(response).await?;
            return serde_json::from_str(&text).map_err(|_| ClientError::Api {
                status: StatusCode::BAD_REQUEST,
                body: text,
            });
        }
        read_json(response).await
    }

    pub async fn check_in_today(&self) -> ClientResult<CheckInStatus> {
        let url = self.api_url("/check-in/today");
        let response = self.session.execute(|http| http.get(&url)).await?;
        unwrap_success(read_json(response).await?)
    }

    pub async fn check_ins(&self, page: u32, page_size: u32) -> ClientResult<CheckInPage> {
        let url = self.api_url("/check-ins");
        let query = [("page", page.to_string()), ("page_size", page_size.to_string())];
        let response = self.session.execute(|http| http.get(&url).query(&query)).await?;
        unwrap_success(read_json(response).await?)
    }

    // ---- Items ----

    pub async fn list_items(&self, page: u32, page_size: u32) -> ClientResult<ItemsPage> {
        let url = self.api_url("/items");
        let query = [("page", page.to_string()), ("page_size", page_size.to_string())];
        let response = self.session.execute(|http| http.get(&url).query(&query)).await?;
        read_json(response).await
    }

    pub async fn get_item(&self, id: u64) -> ClientResult<Item> {
        let url = self.api_url(&format!("/items/{}", id));
        let response = self.session.execute(|http| http.get(&url)).await?;
        read_data(response).await
    }

    pub async fn search_items(&self, name: Option<&str>, source: Option<&str>) -> ClientResult<Vec<Item>> {
        let url = self.api_url("/items/search");
        let mut query = Vec::new();
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        if let Some(source) = source {
            query.push(("source", source.to_string()));
        }
        let response = self.session.execute(|http| http.get(&url).query(&query)).await?;
        read_data(response).await
    }

    pub async fn item_sources(&self) -> ClientResult<Vec<String>> {
        let url = self.api_url("/items/sources");
        let response = self.session.execute(|http| http.get(&url)).await?;
        read_data(response).await
    }

    /// Metadata of an image stored in the backend's `images` directory.
    pub async fn image_info(&self, filename: &str) -> ClientResult<ImageInfo> {
        let url = self.api_url(&format!("/image/{}", filename));
        let response = self.session.execute(|http| http.get(&url)).await?;
        read_json(response).await
    }

    // ---- User items ----

    pub async fn list_user_items(&self, user_id: u64) -> ClientResult<Vec<UserItem>> {
        let url = self.api_url(&format!("/user-items/{}", user_id));
        let response = self.session.execute(|http| http.get(&url)).await?;
        read_data(response).await
    }

    pub async fn user_has_item(&self, user_id: u64, item_id: u64) -> ClientResult<bool> {
        let url = self.api_url(&format!("/user-items/{}/check/{}", user_id, item_id));
        let response = self.session.execute(|http| http.get(&url)).await?;
        let check: ItemCheck = read_json(response).await?;
        Ok(check.has_item)
    }

    pub async fn grant_item(&self, user_id: u64, grant: &UserItem) -> ClientResult<UserItem> {
        let url = self.api_url(&format!("/user-items/{}", user_id));
        let response = self.session.execute(|http| http.post(&url).json(grant)).await?;
        read_data(response).await
    }

    pub async fn update_user_item_quantity(
        &self,
        user_id: u64,
        item_id: u64,
        quantity: i32,
    ) -> ClientResult<MessageResponse> {
        let url = self.api_url(&format!("/user-items/{}/{}/quantity", user_id, item_id));
        let body = serde_json::json!({ "quantity": quantity });
        let response = self.session.execute(|http| http.put(&url).json(&body)).await?;
        read_json(response).await
    }

    pub async fn remove_user_item(&self, user_id: u64, item_id: u64) -> ClientResult<MessageResponse> {
        let url = self.api_url(&format!("/user-items/{}/{}", user_id, item_id));
        let response = self.session.execute(|http| http.delete(&url)).await?;
        read_json(response).await
    }

    // ---- Admin ----

    /// Upload an image into a static directory and return its public URL.
    pub async fn upload_image(
        &self,
        file: &UploadFile,
        directory: &str,
        file_name: Option<&str>,
    ) -> ClientResult<String> {
        let url = self.api_url("/admin/upload/image");
        let directory = directory.to_string();
        let file_name = file_name.map(str::to_string);
        let response = self
            .session
            .execute(|http| {
                let mut form = Form::new()
                    .part("file", file.part())
                    .text("directory", directory.clone());
                if let Some(name) = &file_name {
                    form = form.text("filename", name.clone());
                }
                http.post(&url).multipart(form)
            })
            .await?;

        let uploaded: UploadedFile = read_json(response).await?;
        log::info!("📤 Uploaded {} -> {}", file.file_name, uploaded.url);
        Ok(uploaded.url)
    }

    pub async fn list_users(&self) -> ClientResult<Vec<User>> {
        let url = self.api_url("/admin/users");
        let response = self.session.execute(|http| http.get(&url)).await?;
        let envelope: UsersEnvelope = read_json(response).await?;
        Ok(envelope.users)
    }

    pub async fn system_stats(&self) -> ClientResult<SystemStats> {
        let url = self.api_url("/admin/stats");
        let response = self.session.execute(|http| http.get(&url)).await?;
        read_json(response).await
    }

    pub async fn create_item(&self, item: &NewItem) -> ClientResult<Item> {
        let url = self.api_url("/admin/items");
        let response = self.session.execute(|http| http.post(&url).json(item)).await?;
        read_data(response).await
    }

    pub async fn update_item(&self, id: u64, item: &NewItem) -> ClientResult<Item> {
        let url = self.api_url(&format!("/admin/items/{}", id));
        let response = self.session.execute(|http| http.put(&url).json(item)).await?;
        read_data(response).await
    }

    pub async fn delete_item(&self, id: u64) -> ClientResult<MessageResponse> {
        let url = self.api_url(&format!("/admin/items/{}", id));
        let response = self.session.execute(|http| http.delete(&url)).await?;
        read_json(response).await
    }

    pub async fn upload_apk(
        &self,
        apk: &UploadFile,
        version: &str,
        platform: &str,
        force_update: bool,
        update_notes: &str,
    ) -> ClientResult<AppUpdate> {
        let url = self.api_url("/app-updates/upload");
        let fields = [
            ("version", version.to_string()),
            ("platform", platform.to_string()),
            ("force_update", force_update.to_string()),
            ("update_notes", update_notes.to_string()),
        ];
        let response = self
            .session
            .execute(|http| {
                let form = fields
                    .iter()
                    .fold(Form::new().part("file", apk.part()), |form, (name, value)| {
                        form.text(*name, value.clone())
                    });
                http.post(&url).multipart(form)
            })
            .await?;
        read_data(response).await
    }

    pub async fn delete_update(&self, id: u64) -> ClientResult<MessageResponse> {
        let url = self.api_url(&format!("/app-updates/{}", id));
        let response = self.session.execute(|http| http.delete(&url)).await?;
        read_json(response).await
    }

    // ---- App updates (public) ----

    pub async fn list_updates(&self, platform: Option<&str>) -> ClientResult<Vec<AppUpdate>> {
        let mut request = self.client.get(self.api_url("/app-updates"));
        if let Some(platform) = platform {
            request = request.query(&[("platform", platform)]);
        }
        let response = request.send().await.map_err(ClientError::Transport)?;
        read_data(response).await
    }

    pub async fn check_update(&self, platform: &str, current_version: &str) -> ClientResult<UpdateCheck> {
        let response = self
            .client
            .get(self.api_url("/app-updates/check"))
            .query(&[("platform", platform), ("current_version", current_version)])
            .send()
            .await
            .map_err(ClientError::Transport)?;
        read_json(response).await
    }

    /// Download a release package to `dest`, returning the number of bytes written.
    pub async fn download_update(&self, platform: &str, version: &str, dest: &Path) -> ClientResult<u64> {
        let url = self.api_url(&format!("/app-updates/download/{}/{}", platform, version));
        log::info!("📥 Downloading {} {} from {}", platform, version, url);

        let response = self.client.get(&url).send().await.map_err(ClientError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = read_body(response).await?;
            return Err(ClientError::from_status(status, body));
        }

        let bytes = response.bytes().await.map_err(ClientError::Transport)?;
        std::fs::write(dest, &bytes)?;

        log::info!("✅ Update saved to: {}", dest.display());
        Ok(bytes.len() as u64)
    }
}

fn date_range(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(start) = start_date {
        query.push(("start_date", start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = end_date {
        query.push(("end_date", end.format("%Y-%m-%d").to_string()));
    }
    query
}

async fn read_body(response: Response) -> ClientResult<String> {
    response.text().await.map_err(ClientError::Transport)
}

/// Body of a successful response; any other status becomes its classified error.
async fn read_text(response: Response) -> ClientResult<String> {
    let status = response.status();
    let body = read_body(response).await?;
    if !status.is_success() {
        log::error!("❌ Backend error ({}): {}", status, body);
        return Err(ClientError::from_status(status, body));
    }
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let body = read_text(response).await?;
    serde_json::from_str(&body).map_err(|e| ClientError::Decode {
        reason: e.to_string(),
        body,
    })
}

async fn read_data<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let envelope: DataEnvelope<T> = read_json(response).await?;
    Ok(envelope.data)
}

fn unwrap_success<T>(envelope: SuccessEnvelope<T>) -> ClientResult<T> {
    match envelope.data {
        Some(data) if envelope.success => Ok(data),
        _ => Err(ClientError::Decode {
            reason: "response reported failure or carried no data".to_string(),
            body: envelope.message,
        }),
    }
}
