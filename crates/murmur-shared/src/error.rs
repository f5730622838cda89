use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyError {
    #[error("Access key must start with the WSP prefix")]
    BadPrefix,

    #[error("Access key group {0} must be four uppercase alphanumerics")]
    BadGroup(usize),

    #[error("Access key must have exactly three groups, found {0}")]
    WrongGroupCount(usize),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LabelError {
    #[error("Unknown status label: {0}")]
    Unknown(String),
}
