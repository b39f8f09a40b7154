use serde::{Deserialize, Serialize};

pub const RESULT_CODE_SUCCESS: u8 = 0;
pub const RESULT_CODE_FAILED: u8 = 1;

/// Acknowledgement body for command and property-set requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub result_code: u8,
    pub result_desc: String,
}

impl Acknowledgement {
    pub fn success() -> Self {
        Self {
            result_code: RESULT_CODE_SUCCESS,
            result_desc: "SUCCESS".to_string(),
        }
    }

    pub fn failed() -> Self {
        Self {
            result_code: RESULT_CODE_FAILED,
            result_desc: "FAILED".to_string(),
        }
    }

    /// Map an aggregated handler verdict onto the fixed result pair.
    pub fn from_verdict(approved: bool) -> Self {
        if approved {
            Self::success()
        } else {
            Self::failed()
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_CODE_SUCCESS
    }
}
