use super::DataNodeId;

/// The code of a mutation status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success = 200,
    StorageGroupAlreadyExists = 301,
    StorageGroupNotExist = 302,
    IllegalPath = 303,
    IllegalParameter = 304,
}

impl StatusCode {
    /// The numeric value of this code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// The outcome of applying a mutation plan.
///
/// Every mutation plan produces exactly one status. Validation failures are reported here
/// rather than as errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: Option<String>,
    /// The data node which a registration resolved to, new or existing.
    pub data_node_id: Option<DataNodeId>,
}

impl Status {
    /// A bare success status.
    pub fn success() -> Self {
        Self {
            code: StatusCode::Success,
            message: None,
            data_node_id: None,
        }
    }

    /// A failure status with the given code and message.
    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data_node_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data_node_id(mut self, id: DataNodeId) -> Self {
        self.data_node_id = Some(id);
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }
}
