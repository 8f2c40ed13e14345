//! POF type and value identifiers.
//!
//! ## Format
//!
//! Every value in a POF stream is preceded by a packed int32 identifier
//! unless the enclosing complex is uniform. Non-negative identifiers name
//! user types registered with a [`PofContext`](crate::PofContext). Negative
//! identifiers are either intrinsic *type* ids (`T_*`, -1..=-32), which are
//! followed by a value body, or self-contained *value* ids (`V_*`, -33..=-64),
//! which are the entire value.

// ============================================================================
// Type identifiers
// ============================================================================

/// 16-bit signed integer
pub const T_INT16: i32 = -1;
/// 32-bit signed integer
pub const T_INT32: i32 = -2;
/// 64-bit signed integer
pub const T_INT64: i32 = -3;
/// 128-bit signed integer
pub const T_INT128: i32 = -4;
/// 32-bit IEEE-754 float
pub const T_FLOAT32: i32 = -5;
/// 64-bit IEEE-754 float
pub const T_FLOAT64: i32 = -6;
/// 128-bit IEEE-754 float
pub const T_FLOAT128: i32 = -7;
/// 32-bit decimal
pub const T_DECIMAL32: i32 = -8;
/// 64-bit decimal
pub const T_DECIMAL64: i32 = -9;
/// 128-bit decimal
pub const T_DECIMAL128: i32 = -10;
/// Boolean
pub const T_BOOLEAN: i32 = -11;
/// Single octet
pub const T_OCTET: i32 = -12;
/// Length-prefixed octets
pub const T_OCTET_STRING: i32 = -13;
/// 16-bit character
pub const T_CHAR: i32 = -14;
/// Length-prefixed UTF-8 string
pub const T_CHAR_STRING: i32 = -15;
/// Year, month, day
pub const T_DATE: i32 = -16;
/// Years and months
pub const T_YEAR_MONTH_INTERVAL: i32 = -17;
/// Time of day with zone
pub const T_TIME: i32 = -18;
/// Hours, minutes, seconds, nanos
pub const T_TIME_INTERVAL: i32 = -19;
/// Date followed by time
pub const T_DATETIME: i32 = -20;
/// Days, hours, minutes, seconds, nanos
pub const T_DAY_TIME_INTERVAL: i32 = -21;
/// Collection of typed values
pub const T_COLLECTION: i32 = -22;
/// Collection of values sharing one type id
pub const T_UNIFORM_COLLECTION: i32 = -23;
/// Array of typed values
pub const T_ARRAY: i32 = -24;
/// Array of values sharing one type id
pub const T_UNIFORM_ARRAY: i32 = -25;
/// Array with positional entries
pub const T_SPARSE_ARRAY: i32 = -26;
/// Sparse array of values sharing one type id
pub const T_UNIFORM_SPARSE_ARRAY: i32 = -27;
/// Map of typed keys and values
pub const T_MAP: i32 = -28;
/// Map whose keys share one type id
pub const T_UNIFORM_KEYS_MAP: i32 = -29;
/// Map whose keys and values each share one type id
pub const T_UNIFORM_MAP: i32 = -30;
/// Identity prefix of a referenceable value
pub const T_IDENTITY: i32 = -31;
/// Back-reference to an identity
pub const T_REFERENCE: i32 = -32;

// ============================================================================
// Value identifiers
// ============================================================================

/// `false`
pub const V_BOOLEAN_FALSE: i32 = -33;
/// `true`
pub const V_BOOLEAN_TRUE: i32 = -34;
/// Empty string or binary
pub const V_STRING_ZERO_LENGTH: i32 = -35;
/// Empty collection, array or map
pub const V_COLLECTION_EMPTY: i32 = -36;
/// Null reference
pub const V_REFERENCE_NULL: i32 = -37;
/// Positive infinity
pub const V_FP_POS_INFINITY: i32 = -38;
/// Negative infinity
pub const V_FP_NEG_INFINITY: i32 = -39;
/// Not a number
pub const V_FP_NAN: i32 = -40;
/// Integer -1
pub const V_INT_NEG_1: i32 = -41;
/// Integer 0; tiny ints run down to [`V_INT_22`]
pub const V_INT_0: i32 = -42;
/// Integer 22
pub const V_INT_22: i32 = -64;

/// Type of a value whose type is not known
pub const T_UNKNOWN: i32 = -65;

/// Terminator for sparse complexes and user-type property lists
pub const PROPERTY_END: i32 = -1;

// ============================================================================
// Tiny integers
// ============================================================================

/// True if `n` fits in a single tiny-int value id.
pub fn is_tiny_int(n: i64) -> bool {
    (-1..=22).contains(&n)
}

/// Value id for a tiny int; `n` must satisfy [`is_tiny_int`].
pub fn encode_tiny_int(n: i32) -> i32 {
    debug_assert!(is_tiny_int(n as i64));
    V_INT_0 - n
}

/// Integer value of a tiny-int value id.
pub fn decode_tiny_int(id: i32) -> i32 {
    V_INT_0 - id
}

/// True if `id` is one of the tiny-int value ids.
pub fn is_tiny_int_id(id: i32) -> bool {
    (V_INT_22..=V_INT_NEG_1).contains(&id)
}

/// True if `id` names a user type.
pub fn is_user_type(id: i32) -> bool {
    id >= 0
}

/// True if `id` is an intrinsic type id (`T_INT16` through `T_REFERENCE`).
pub fn is_intrinsic_type(id: i32) -> bool {
    (T_REFERENCE..=T_INT16).contains(&id)
}
