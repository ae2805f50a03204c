use std::fmt;

/// Rejection of a binary module file. Unrecoverable for that file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before the structure it promised.
    UnexpectedEof,
    /// The eight magic bytes did not spell the expected signature.
    BadMagic,
    /// The file's format version is newer than this reader understands.
    UnsupportedVersion { major: u64, minor: u64 },
    /// A variable-length integer was malformed or overflowed.
    InvalidVarint,
    /// An index pointed past the end of one of the pools.
    PoolIndexOutOfRange { pool: &'static str, index: u64 },
    /// An opcode byte outside the instruction set.
    UnknownOpcode(u8),
    /// A tag byte outside the grammar for the named construct.
    UnknownTag { what: &'static str, tag: u8 },
    /// An opcode's pooled type was not of the kind the opcode requires
    /// (e.g. `dereference` with a non-reference type).
    TypeMismatch { opcode: &'static str, expected: &'static str },
    /// A branch operand resolved to an entry that defines no label.
    BadBranchTarget { from: usize, target: usize },
    /// A string was not decodable.
    InvalidString,
    /// A char constant held an invalid code point.
    InvalidChar(u32),
    /// The decoded block violated a structural invariant.
    InvalidBlock(BlockError),
    /// The decoded declarations violated a module invariant.
    InvalidModule(ModuleError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of input"),
            Self::BadMagic => write!(f, "bad magic number"),
            Self::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported format version {major}.{minor}")
            }
            Self::InvalidVarint => write!(f, "invalid variable-length integer"),
            Self::PoolIndexOutOfRange { pool, index } => {
                write!(f, "{pool} pool index {index} out of range")
            }
            Self::UnknownOpcode(op) => write!(f, "unknown opcode encountered ({op})"),
            Self::UnknownTag { what, tag } => write!(f, "unknown {what} tag ({tag})"),
            Self::TypeMismatch { opcode, expected } => {
                write!(f, "{opcode} requires a {expected} type")
            }
            Self::BadBranchTarget { from, target } => {
                write!(f, "branch at {from} targets non-label entry {target}")
            }
            Self::InvalidString => write!(f, "invalid string encoding"),
            Self::InvalidChar(cp) => write!(f, "invalid character code point {cp:#x}"),
            Self::InvalidBlock(e) => write!(f, "invalid code block: {e}"),
            Self::InvalidModule(e) => write!(f, "invalid module: {e}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<BlockError> for DecodeError {
    fn from(e: BlockError) -> Self {
        DecodeError::InvalidBlock(e)
    }
}

impl From<ModuleError> for DecodeError {
    fn from(e: ModuleError) -> Self {
        DecodeError::InvalidModule(e)
    }
}

/// Failure to encode an in-memory module into the binary format.
///
/// The format fixes registers and branch offsets at one byte; a module that
/// exceeds those widths is rejected rather than truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A block used a register outside the one-byte range.
    RegisterOverflow(usize),
    /// A branch span did not fit the one-byte forward offset.
    BranchOffsetOverflow { from: usize, target: usize },
    /// A length or index exceeded its fixed-width field.
    FieldOverflow(&'static str),
    /// A qualified name with a root module cannot be pooled.
    RootModuleName,
    /// A char constant outside the basic multilingual plane.
    UnencodableChar(char),
    /// The block being encoded violated a structural invariant.
    InvalidBlock(BlockError),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegisterOverflow(r) => write!(f, "register {r} exceeds encodable range"),
            Self::BranchOffsetOverflow { from, target } => {
                write!(f, "branch from {from} to {target} exceeds encodable offset")
            }
            Self::FieldOverflow(what) => write!(f, "{what} exceeds encodable range"),
            Self::RootModuleName => write!(f, "qualified name with root module cannot be encoded"),
            Self::UnencodableChar(c) => write!(f, "char constant {c:?} cannot be encoded"),
            Self::InvalidBlock(e) => write!(f, "invalid code block: {e}"),
        }
    }
}

impl std::error::Error for EncodeError {}

impl From<BlockError> for EncodeError {
    fn from(e: BlockError) -> Self {
        EncodeError::InvalidBlock(e)
    }
}

/// Structurally ill-formed types passed by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// A union requires at least one summand.
    EmptyUnion,
    /// An intersection requires at least one operand.
    EmptyIntersection,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyUnion => write!(f, "union type requires at least one summand"),
            Self::EmptyIntersection => {
                write!(f, "intersection type requires at least one operand")
            }
        }
    }
}

impl std::error::Error for TypeError {}

/// Violation of a block-local structural invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// Two entries defined the same label.
    DuplicateLabel(String),
    /// A branch referenced a label no entry defines.
    UnknownLabel(String),
    /// A branch targeted an index at or before itself.
    BackwardBranch { from: usize, target: usize },
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateLabel(l) => write!(f, "duplicate label \"{l}\""),
            Self::UnknownLabel(l) => write!(f, "unknown label \"{l}\""),
            Self::BackwardBranch { from, target } => {
                write!(f, "branch at {from} targets earlier index {target}")
            }
        }
    }
}

impl std::error::Error for BlockError {}

/// Violation of a module-construction invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// Two declarations of the same kind shared a name (and, for functions
    /// and methods, a signature).
    DuplicateDeclaration { kind: &'static str, name: String },
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDeclaration { kind, name } => {
                write!(f, "multiple {kind} declarations named \"{name}\"")
            }
        }
    }
}

impl std::error::Error for ModuleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        assert_eq!(DecodeError::BadMagic.to_string(), "bad magic number");
        assert_eq!(
            DecodeError::PoolIndexOutOfRange { pool: "type", index: 9 }.to_string(),
            "type pool index 9 out of range"
        );
        assert_eq!(
            DecodeError::TypeMismatch { opcode: "dereference", expected: "reference" }.to_string(),
            "dereference requires a reference type"
        );
    }

    #[test]
    fn encode_error_display() {
        assert_eq!(
            EncodeError::RegisterOverflow(300).to_string(),
            "register 300 exceeds encodable range"
        );
        assert_eq!(
            EncodeError::BranchOffsetOverflow { from: 1, target: 400 }.to_string(),
            "branch from 1 to 400 exceeds encodable offset"
        );
    }

    #[test]
    fn block_error_converts_to_decode_error() {
        let err: DecodeError = BlockError::UnknownLabel("l0".to_string()).into();
        assert!(matches!(err, DecodeError::InvalidBlock(_)));
    }

    #[test]
    fn module_error_display() {
        let err = ModuleError::DuplicateDeclaration { kind: "type", name: "nat".to_string() };
        assert_eq!(err.to_string(), "multiple type declarations named \"nat\"");
    }
}
