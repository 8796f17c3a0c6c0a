use std::fs;
use std::path::Path;

use base64::{engine::general_purpose, Engine};

use crate::error::{ClientError, ClientResult};
use crate::models::{AnalysisRequest, ImageFormat, MAX_IMAGE_BYTES};

/// Base64 payload ready to be inlined into a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data: String,
    pub format: ImageFormat,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.data)
    }

    pub fn decode(&self) -> ClientResult<Vec<u8>> {
        general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| ClientError::Decode {
                reason: e.to_string(),
                body: format!("{} bytes of base64", self.data.len()),
            })
    }
}

#[derive(Debug, Clone)]
pub struct ImageEncoder {
    max_bytes: u64,
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self {
            max_bytes: MAX_IMAGE_BYTES,
        }
    }
}

impl ImageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `path` is a readable jpg/jpeg/png within the size limit.
    /// Nothing is read until every check has passed.
    pub fn inspect(&self, path: &Path) -> ClientResult<ImageFormat> {
        let metadata = fs::metadata(path).map_err(|_| ClientError::NotFound {
            path: path.to_path_buf(),
        })?;
        if !metadata.is_file() {
            return Err(ClientError::NotFound {
                path: path.to_path_buf(),
            });
        }
        fs::File::open(path).map_err(|e| unreadable(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = ImageFormat::from_extension(extension).ok_or_else(|| ClientError::UnsupportedFormat {
            input: path.display().to_string(),
            format: extension.to_string(),
        })?;

        if metadata.len() > self.max_bytes {
            return Err(ClientError::TooLarge {
                size: metadata.len(),
                limit: self.max_bytes,
            });
        }

        Ok(format)
    }

    /// Read an image file into a validated request.
    pub fn read_request(&self, path: &Path, user_description: Option<String>) -> ClientResult<AnalysisRequest> {
        let format = self.inspect(path)?;
        let image = fs::read(path).map_err(|e| unreadable(path, e))?;

        log::debug!("📊 Image file size: {} bytes ({})", image.len(), format.mime_type());
        AnalysisRequest::new(image, format, user_description)
    }

    pub fn encode(&self, request: &AnalysisRequest) -> EncodedImage {
        let data = general_purpose::STANDARD.encode(request.image());
        log::debug!("🔄 Base64 encoded size: {} bytes", data.len());
        EncodedImage {
            data,
            format: request.format(),
        }
    }

    pub fn encode_file(&self, path: &Path) -> ClientResult<EncodedImage> {
        let request = self.read_request(path, None)?;
        Ok(self.encode(&request))
    }
}

/// Any failure to open or read an input file means there is no readable file at `path`.
pub(crate) fn unreadable(path: &Path, err: std::io::Error) -> ClientError {
    log::debug!("🚫 Cannot read {}: {}", path.display(), err);
    ClientError::NotFound {
        path: path.to_path_buf(),
    }
}
