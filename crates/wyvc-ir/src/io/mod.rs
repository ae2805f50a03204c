//! The pooled binary module format.
//!
//! A module file is a header, five deduplication pools (strings, paths,
//! names, constants, types), and the declaration blocks. The reader and
//! writer are a matched pair: `read(write(f))` reproduces `f` up to the
//! label bijection that block equality already ignores, and
//! `write(read(bytes))` is byte-exact for files this writer produced.
//!
//! Labels are not persisted by name. Label-defining entries are opcodes in
//! the instruction stream, branch operands are one-byte forward offsets, and
//! the reader materializes a fresh label at every branch target.

pub mod binary;
pub mod reader;
pub mod writer;

pub use reader::{read_module, WyilFileReader};
pub use writer::{write_module, WyilFileWriter};

/// Magic bytes opening every module file.
pub const MAGIC: [u8; 8] = *b"WYILFILE";

/// Format version understood by this reader/writer pair.
pub const MAJOR_VERSION: u64 = 1;
pub const MINOR_VERSION: u64 = 0;

// === Declaration block kinds ===
pub(crate) const BLOCK_CONSTANT: u64 = 0;
pub(crate) const BLOCK_TYPE: u64 = 1;
pub(crate) const BLOCK_FUNCTION: u64 = 2;
pub(crate) const BLOCK_METHOD: u64 = 3;

// === Case sub-block kinds ===
pub(crate) const BLOCK_PRECONDITION: u64 = 4;
pub(crate) const BLOCK_POSTCONDITION: u64 = 5;
pub(crate) const BLOCK_BODY: u64 = 6;

// === Constant tags ===
pub(crate) const CONSTANT_NULL: u8 = 0;
pub(crate) const CONSTANT_FALSE: u8 = 1;
pub(crate) const CONSTANT_TRUE: u8 = 2;
pub(crate) const CONSTANT_BYTE: u8 = 3;
pub(crate) const CONSTANT_CHAR: u8 = 4;
pub(crate) const CONSTANT_INT: u8 = 5;
pub(crate) const CONSTANT_REAL: u8 = 6;
pub(crate) const CONSTANT_STRING: u8 = 7;
pub(crate) const CONSTANT_LIST: u8 = 8;
pub(crate) const CONSTANT_SET: u8 = 9;
pub(crate) const CONSTANT_TUPLE: u8 = 10;
pub(crate) const CONSTANT_RECORD: u8 = 11;

// === Type tags ===
pub(crate) const TYPE_VOID: u8 = 0;
pub(crate) const TYPE_ANY: u8 = 1;
pub(crate) const TYPE_NULL: u8 = 2;
pub(crate) const TYPE_BOOL: u8 = 3;
pub(crate) const TYPE_BYTE: u8 = 4;
pub(crate) const TYPE_CHAR: u8 = 5;
pub(crate) const TYPE_INT: u8 = 6;
pub(crate) const TYPE_REAL: u8 = 7;
pub(crate) const TYPE_STRING: u8 = 8;
pub(crate) const TYPE_LIST: u8 = 9;
pub(crate) const TYPE_SET: u8 = 10;
pub(crate) const TYPE_MAP: u8 = 11;
pub(crate) const TYPE_TUPLE: u8 = 12;
pub(crate) const TYPE_RECORD: u8 = 13;
pub(crate) const TYPE_REFERENCE: u8 = 14;
pub(crate) const TYPE_FUNCTION: u8 = 15;
pub(crate) const TYPE_METHOD: u8 = 16;
pub(crate) const TYPE_UNION: u8 = 17;
pub(crate) const TYPE_INTERSECTION: u8 = 18;
pub(crate) const TYPE_NEGATION: u8 = 19;
pub(crate) const TYPE_NOMINAL: u8 = 20;
pub(crate) const TYPE_RECURSIVE: u8 = 21;

// === Opcodes ===
pub(crate) const OPCODE_NOP: u8 = 0;
pub(crate) const OPCODE_GOTO: u8 = 1;
pub(crate) const OPCODE_FAIL: u8 = 2;
pub(crate) const OPCODE_ASSERT: u8 = 3;
pub(crate) const OPCODE_ASSUME: u8 = 4;
pub(crate) const OPCODE_TRYCATCH: u8 = 5;
pub(crate) const OPCODE_LOOP: u8 = 6;
pub(crate) const OPCODE_FORALL: u8 = 7;
pub(crate) const OPCODE_LOOPEND: u8 = 8;
pub(crate) const OPCODE_LABEL: u8 = 9;
pub(crate) const OPCODE_RETURN: u8 = 10;
pub(crate) const OPCODE_RETURNV: u8 = 11;
pub(crate) const OPCODE_THROW: u8 = 12;
pub(crate) const OPCODE_DEBUG: u8 = 13;
pub(crate) const OPCODE_CONST: u8 = 14;
pub(crate) const OPCODE_IF: u8 = 15;
pub(crate) const OPCODE_IFIS: u8 = 16;
pub(crate) const OPCODE_SWITCH: u8 = 17;
pub(crate) const OPCODE_ASSIGN: u8 = 18;
pub(crate) const OPCODE_CONVERT: u8 = 19;
pub(crate) const OPCODE_DEREFERENCE: u8 = 20;
pub(crate) const OPCODE_FIELDLOAD: u8 = 21;
pub(crate) const OPCODE_INVERT: u8 = 22;
pub(crate) const OPCODE_LENGTHOF: u8 = 23;
pub(crate) const OPCODE_MOVE: u8 = 24;
pub(crate) const OPCODE_NEWOBJECT: u8 = 25;
pub(crate) const OPCODE_NOT: u8 = 26;
pub(crate) const OPCODE_TUPLELOAD: u8 = 27;
pub(crate) const OPCODE_NEG: u8 = 28;
pub(crate) const OPCODE_NUMERATOR: u8 = 29;
pub(crate) const OPCODE_DENOMINATOR: u8 = 30;
pub(crate) const OPCODE_ADD: u8 = 31;
pub(crate) const OPCODE_SUB: u8 = 32;
pub(crate) const OPCODE_MUL: u8 = 33;
pub(crate) const OPCODE_DIV: u8 = 34;
pub(crate) const OPCODE_REM: u8 = 35;
pub(crate) const OPCODE_RANGE: u8 = 36;
pub(crate) const OPCODE_BITOR: u8 = 37;
pub(crate) const OPCODE_BITXOR: u8 = 38;
pub(crate) const OPCODE_BITAND: u8 = 39;
pub(crate) const OPCODE_SHL: u8 = 40;
pub(crate) const OPCODE_SHR: u8 = 41;
pub(crate) const OPCODE_INDEXOF: u8 = 42;
pub(crate) const OPCODE_LISTAPPEND: u8 = 43;
pub(crate) const OPCODE_LISTAPPENDL: u8 = 44;
pub(crate) const OPCODE_LISTAPPENDR: u8 = 45;
pub(crate) const OPCODE_SETUNION: u8 = 46;
pub(crate) const OPCODE_SETUNIONL: u8 = 47;
pub(crate) const OPCODE_SETUNIONR: u8 = 48;
pub(crate) const OPCODE_SETINTERSECT: u8 = 49;
pub(crate) const OPCODE_SETINTERSECTL: u8 = 50;
pub(crate) const OPCODE_SETINTERSECTR: u8 = 51;
pub(crate) const OPCODE_SETDIFF: u8 = 52;
pub(crate) const OPCODE_SETDIFFL: u8 = 53;
pub(crate) const OPCODE_STRAPPEND: u8 = 54;
pub(crate) const OPCODE_STRAPPENDL: u8 = 55;
pub(crate) const OPCODE_STRAPPENDR: u8 = 56;
pub(crate) const OPCODE_INVOKE: u8 = 57;
pub(crate) const OPCODE_INVOKEV: u8 = 58;
pub(crate) const OPCODE_INDIRECTINVOKE: u8 = 59;
pub(crate) const OPCODE_INDIRECTINVOKEV: u8 = 60;
pub(crate) const OPCODE_NEWLIST: u8 = 61;
pub(crate) const OPCODE_NEWSET: u8 = 62;
pub(crate) const OPCODE_NEWMAP: u8 = 63;
pub(crate) const OPCODE_NEWRECORD: u8 = 64;
pub(crate) const OPCODE_NEWTUPLE: u8 = 65;
pub(crate) const OPCODE_SUBLIST: u8 = 66;
pub(crate) const OPCODE_SUBSTRING: u8 = 67;
pub(crate) const OPCODE_UPDATEINDEX: u8 = 68;
pub(crate) const OPCODE_UPDATEFIELD: u8 = 69;
