//! Error types for IR construction

use crate::compiler::ir::DeclareKind;
use thiserror::Error;

/// IR construction errors
///
/// Every variant except [`Error::Config`] is a contract violation: the unit
/// being built cannot be completed and nothing partially built is left
/// reachable. Analysis queries (alignment, alias walking, pool lookups) never
/// produce these; they answer with `bool`/`Option` instead.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Contract violations
    /// Opcode routed through a constructor that does not handle its class
    ///
    /// **Triggered by:** `math` through the generic constructor, `jmpi`
    /// through the non-flow constructor, `send` without a message descriptor
    /// **Prevention:** use `create_math`, `create_cf_instruction`, `create_send`
    #[error("Wrong constructor for opcode {opcode}: use {expected}")]
    WrongConstructor {
        /// Offending opcode mnemonic
        opcode: String,
        /// Constructor that handles this opcode class
        expected: &'static str,
    },

    /// Saturation requested on a flow-control instruction
    #[error("Saturation is illegal on flow-control opcode {opcode}")]
    SaturationOnFlowControl {
        /// Offending opcode mnemonic
        opcode: String,
    },

    /// Raw register-binding kind outside the known set
    #[error("Unknown register binding kind: {0}")]
    UnknownBindingKind(u8),

    /// Binding kind created without the companion it needs
    ///
    /// **Triggered by:** `Tmp` without a base declare, `Spill` without a
    /// destination-region representative, `Fill` without a source-region one
    #[error("{kind:?} declare requires a {what}")]
    MissingBindingOperand {
        /// Requested binding kind
        kind: DeclareKind,
        /// Missing companion
        what: &'static str,
    },

    /// Alias link that would close a cycle
    #[error("Alias cycle: {declare} cannot alias {target}")]
    AliasCycle {
        /// Declare being linked
        declare: String,
        /// Requested alias target
        target: String,
    },

    /// Operand of the wrong kind for the slot it was passed to
    #[error("Invalid operand: expected {expected}, got {got}")]
    InvalidOperand {
        /// Expected operand kind
        expected: &'static str,
        /// Actual operand kind
        got: &'static str,
    },

    // Resource errors
    /// Input or predefined variable placed past the usable register file
    ///
    /// **Triggered by:** kernel inputs whose payload reaches into the
    /// reserved GRFs, or stack-call blocks that do not fit
    #[error("{name} needs r{grf} but r{limit} and above are reserved")]
    InputOutOfRange {
        /// Variable name
        name: String,
        /// Highest GRF the variable would occupy
        grf: u32,
        /// First unusable GRF
        limit: u32,
    },

    // Configuration
    /// Builder options could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker pool or other infrastructure failure
    #[error("Compiler error: {0}")]
    CompilerError(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Fatal error that cannot be recovered from
    Fatal,
    /// Recoverable error that may be retried
    Recoverable,
    /// Warning that doesn't prevent execution
    Warning,
}

impl Error {
    /// Create a compiler error with a message
    pub fn compiler(msg: impl Into<String>) -> Self {
        Error::CompilerError(msg.into())
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::WrongConstructor { .. } => ErrorSeverity::Fatal,
            Error::SaturationOnFlowControl { .. } => ErrorSeverity::Fatal,
            Error::UnknownBindingKind(_) => ErrorSeverity::Fatal,
            Error::MissingBindingOperand { .. } => ErrorSeverity::Fatal,
            Error::AliasCycle { .. } => ErrorSeverity::Fatal,
            Error::InvalidOperand { .. } => ErrorSeverity::Fatal,
            Error::InputOutOfRange { .. } => ErrorSeverity::Fatal,

            Error::Config(_) => ErrorSeverity::Recoverable,
            Error::CompilerError(_) => ErrorSeverity::Recoverable,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for IR construction
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violations_are_fatal() {
        let err = Error::WrongConstructor {
            opcode: "math".to_string(),
            expected: "create_math",
        };
        assert_eq!(err.classify(), ErrorSeverity::Fatal);
        assert_eq!(Error::UnknownBindingKind(9).classify(), ErrorSeverity::Fatal);
        assert_eq!(
            Error::Config("bad".to_string()).classify(),
            ErrorSeverity::Recoverable
        );
    }

    #[test]
    fn test_messages_name_the_violation() {
        let err = Error::InputOutOfRange {
            name: "arg0".to_string(),
            grf: 130,
            limit: 127,
        };
        assert_eq!(err.to_string(), "arg0 needs r130 but r127 and above are reserved");
    }
}
