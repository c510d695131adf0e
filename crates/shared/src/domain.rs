use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(SubmissionId);
id_newtype!(PreviewId);

/// Raw bytes of a user-selected image plus the name it was selected under.
///
/// The payload is reference counted so the controller state and an
/// in-flight prediction can share one copy.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    filename: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl ImageAsset {
    /// Captures an image. The MIME type is guessed from the filename
    /// extension and falls back to `application/octet-stream`.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let mime_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            filename,
            mime_type,
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionLabel {
    #[serde(rename = "TB Detected")]
    TbDetected,
    #[serde(rename = "TB Not Detected")]
    TbNotDetected,
}

impl PredictionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TbDetected => "TB Detected",
            Self::TbNotDetected => "TB Not Detected",
        }
    }

    /// Parses the label string used on the wire. Matching is exact.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "TB Detected" => Some(Self::TbDetected),
            "TB Not Detected" => Some(Self::TbNotDetected),
            _ => None,
        }
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one classification. Confidence is kept in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    label: PredictionLabel,
    confidence: f64,
    simulated: bool,
}

impl PredictionResult {
    /// Builds a result, clamping `confidence` into `[0, 1]`. NaN maps to 0.
    pub fn new(label: PredictionLabel, confidence: f64, simulated: bool) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label,
            confidence,
            simulated,
        }
    }

    pub fn label(&self) -> PredictionLabel {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// True when the result came from the local fallback instead of the
    /// classification endpoint.
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }
}
