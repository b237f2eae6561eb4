use serde::{Deserialize, Serialize};

/// How the parsers treat `$`-prefixed keys they do not recognize.
///
/// `Permissive` ignores unknown query operators, update operators and
/// pipeline stages (an ignored query operator holds for every document).
/// `Strict` rejects them with [`QueryError::UnknownOperator`].
///
/// [`QueryError::UnknownOperator`]: crate::QueryError::UnknownOperator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    #[default]
    Permissive,
    Strict,
}

impl Strictness {
    pub(crate) fn unknown(self, key: &str) -> Result<(), crate::QueryError> {
        match self {
            Strictness::Permissive => Ok(()),
            Strictness::Strict => Err(crate::QueryError::UnknownOperator(key.to_string())),
        }
    }
}
